// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Error types for parsing and per-entity lookups

use crate::EntityId;
use thiserror::Error;

/// Result type alias for parser and lookup operations
pub type Result<T> = std::result::Result<T, ParseError>;

/// Errors raised by a parser backend
#[derive(Error, Debug)]
pub enum ParseError {
    /// Content is not a STEP physical file
    #[error("Invalid IFC format: {0}")]
    InvalidFormat(String),

    /// Header section is missing or malformed
    #[error("Invalid header: {0}")]
    InvalidHeader(String),

    /// A single entity line could not be decoded
    #[error("Failed to parse entity {0}: {1}")]
    EntityParse(EntityId, String),

    /// No entity with this handle exists in the model
    #[error("Entity {0} not found")]
    EntityNotFound(EntityId),

    /// Entity exists but lacks an attribute the lookup needs
    #[error("Missing required attribute {attribute} on entity {entity}")]
    MissingAttribute { entity: EntityId, attribute: usize },

    /// Schema named in FILE_SCHEMA is not handled
    #[error("Unsupported schema version: {0}")]
    UnsupportedSchema(String),

    /// Content is not valid UTF-8 text
    #[error("Content is not valid UTF-8: {0}")]
    Encoding(#[from] std::str::Utf8Error),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Generic error with message
    #[error("{0}")]
    Other(String),
}

impl ParseError {
    /// Create a new format error
    pub fn format(msg: impl Into<String>) -> Self {
        ParseError::InvalidFormat(msg.into())
    }

    /// Create a new entity parse error
    pub fn entity_parse(id: EntityId, msg: impl Into<String>) -> Self {
        ParseError::EntityParse(id, msg.into())
    }

    /// Create a missing attribute error
    pub fn missing(entity: EntityId, attribute: usize) -> Self {
        ParseError::MissingAttribute { entity, attribute }
    }

    /// Create a generic error
    pub fn other(msg: impl Into<String>) -> Self {
        ParseError::Other(msg.into())
    }
}
