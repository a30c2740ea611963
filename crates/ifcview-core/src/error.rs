// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Error types for viewer operations

use crate::state::ModelId;
use ifcview_model::ParseError;
use thiserror::Error;

/// Result type alias for viewer operations
pub type Result<T> = std::result::Result<T, ViewerError>;

/// Errors that end a viewer operation
///
/// Per-element lookup failures never surface here; they are defaulted
/// inside the record loader.
#[derive(Error, Debug)]
pub enum ViewerError {
    /// The model could not be parsed
    #[error("{0}")]
    Parse(#[from] ParseError),

    /// Export was requested with no model loaded
    #[error("Nothing to export")]
    NothingToExport,

    /// A static asset needed for export is missing
    #[error("Missing export asset: {0}")]
    MissingAsset(String),

    /// A pass was cancelled through its token
    #[error("Operation cancelled")]
    Cancelled,

    /// No loaded model has this id
    #[error("Unknown model {0}")]
    UnknownModel(ModelId),

    /// Archive could not be written or read
    #[error("Archive error: {0}")]
    Archive(#[from] zip::result::ZipError),

    /// JSON serialization failed
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Configuration file is malformed
    #[error("Invalid configuration: {0}")]
    Config(#[from] toml::de::Error),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl ViewerError {
    /// Create a missing asset error
    pub fn missing_asset(name: impl Into<String>) -> Self {
        ViewerError::MissingAsset(name.into())
    }

    /// Whether the error came from a cancelled pass
    pub fn is_cancelled(&self) -> bool {
        matches!(self, ViewerError::Cancelled)
    }
}
