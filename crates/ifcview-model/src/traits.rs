// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Core traits for parser backends

use crate::{DecodedEntity, EntityId, ModelMetadata, PropertyReader, Result, SpatialQuery};
use std::sync::Arc;

/// Entry point of a parser backend
///
/// # Example
///
/// ```ignore
/// use ifcview_model::IfcParser;
///
/// let model = parser.parse(content)?;
/// println!("Schema: {}", model.metadata().schema_version);
/// ```
pub trait IfcParser: Send + Sync {
    /// Parse IFC content and return a model
    fn parse(&self, content: &str) -> Result<Arc<dyn IfcModel>>;

    /// Parse raw file bytes
    ///
    /// The default implementation requires UTF-8 content.
    fn parse_bytes(&self, bytes: &[u8]) -> Result<Arc<dyn IfcModel>> {
        self.parse(std::str::from_utf8(bytes)?)
    }
}

/// Handle enumeration and entity decoding
pub trait EntityResolver: Send + Sync {
    /// Every entity handle in file order
    fn all_ids(&self) -> Vec<EntityId>;

    /// Decode one entity
    ///
    /// Fails with `EntityNotFound` for unknown handles and `EntityParse`
    /// for lines that do not decode.
    fn get(&self, id: EntityId) -> Result<Arc<DecodedEntity>>;

    /// Number of entities in the model
    fn entity_count(&self) -> usize {
        self.all_ids().len()
    }
}

/// Read-only access to one loaded model
///
/// Models are `Send + Sync` so they can be shared behind an `Arc` between a
/// running pass and the code that renders its results.
pub trait IfcModel: Send + Sync {
    fn resolver(&self) -> &dyn EntityResolver;

    fn properties(&self) -> &dyn PropertyReader;

    fn spatial(&self) -> &dyn SpatialQuery;

    fn metadata(&self) -> &ModelMetadata;
}
