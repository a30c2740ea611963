// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! EntityResolver implementation over the scanned source text

use crate::scanner::EntityIndex;
use crate::tokenizer::parse_entity;
use ifcview_model::{DecodedEntity, EntityId, EntityResolver, IfcType, ParseError, Result};
use rustc_hash::FxHashMap;
use std::sync::{Arc, RwLock};

/// Lazily decoding resolver with a decoded-entity cache
pub struct ResolverImpl {
    content: String,
    index: EntityIndex,
    cache: RwLock<FxHashMap<u32, Arc<DecodedEntity>>>,
}

impl ResolverImpl {
    pub fn new(content: String, index: EntityIndex) -> Self {
        Self {
            content,
            index,
            cache: RwLock::new(FxHashMap::default()),
        }
    }

    /// Decode every entity of a type, skipping lines that fail to decode
    pub fn entities_by_type(&self, ifc_type: &IfcType) -> Vec<Arc<DecodedEntity>> {
        self.index
            .ids_of(ifc_type)
            .iter()
            .filter_map(|id| self.get(*id).ok())
            .collect()
    }

    /// Source text of one instance line
    pub fn raw_line(&self, id: EntityId) -> Option<&str> {
        let (start, end) = self.index.offsets.get(&id.0)?;
        self.content.get(*start..*end)
    }

    fn decode(&self, id: EntityId) -> Result<Arc<DecodedEntity>> {
        let line = self.raw_line(id).ok_or(ParseError::EntityNotFound(id))?;
        let entity = parse_entity(line).map_err(|e| ParseError::entity_parse(id, e))?;
        Ok(Arc::new(entity))
    }
}

impl EntityResolver for ResolverImpl {
    fn all_ids(&self) -> Vec<EntityId> {
        self.index.order.clone()
    }

    fn get(&self, id: EntityId) -> Result<Arc<DecodedEntity>> {
        if let Ok(cache) = self.cache.read() {
            if let Some(cached) = cache.get(&id.0) {
                return Ok(Arc::clone(cached));
            }
        }

        let entity = self.decode(id)?;
        if let Ok(mut cache) = self.cache.write() {
            cache.insert(id.0, Arc::clone(&entity));
        }
        Ok(entity)
    }

    fn entity_count(&self) -> usize {
        self.index.len()
    }
}
