// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Element metadata index
//!
//! [`IndexPass`] walks every entity handle of a model in file order, keeps
//! the ones that carry a GlobalId and records them by GlobalId and by
//! handle. Entities that fail to decode count as "no data" and are skipped.

use crate::cancel::CancellationToken;
use crate::error::Result;
use crate::pass::{BatchCursor, Pass, Step};
use ifcview_model::{DecodedEntity, EntityId, IfcModel, IfcType, ObjectAttributes};
use rustc_hash::FxHashMap;
use serde::Serialize;
use std::collections::BTreeMap;
use std::sync::Arc;

/// One indexed element
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct IndexEntry {
    pub global_id: String,
    pub express_id: EntityId,
    pub ifc_type: IfcType,
    /// Name, falling back to ObjectType, or empty
    pub name: String,
    /// Decoded attribute bag
    #[serde(skip)]
    pub attributes: Arc<DecodedEntity>,
}

/// Counters gathered while indexing
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
pub struct IndexStats {
    /// Handles visited
    pub scanned: usize,
    /// Entries added to the GlobalId map
    pub indexed: usize,
    /// Entities without a GlobalId
    pub without_id: usize,
    /// Entities the backend failed to decode
    pub failed: usize,
    /// Entities whose GlobalId was already indexed
    pub duplicates: usize,
}

/// GlobalId and handle lookups over one model's elements
#[derive(Clone, Debug, Default, PartialEq)]
pub struct ElementIndex {
    entries: Vec<IndexEntry>,
    by_guid: FxHashMap<String, usize>,
    by_handle: FxHashMap<EntityId, usize>,
    stats: IndexStats,
}

impl ElementIndex {
    /// Entry for a GlobalId
    pub fn get(&self, global_id: &str) -> Option<&IndexEntry> {
        self.by_guid.get(global_id).map(|&i| &self.entries[i])
    }

    /// Entry for a handle
    ///
    /// A handle whose GlobalId duplicates an earlier one resolves to the
    /// earlier entry.
    pub fn by_handle(&self, id: EntityId) -> Option<&IndexEntry> {
        self.by_handle.get(&id).map(|&i| &self.entries[i])
    }

    /// GlobalId for a handle
    pub fn global_id_of(&self, id: EntityId) -> Option<&str> {
        self.by_handle(id).map(|e| e.global_id.as_str())
    }

    pub fn contains(&self, global_id: &str) -> bool {
        self.by_guid.contains_key(global_id)
    }

    /// Entries in file order
    pub fn iter(&self) -> impl Iterator<Item = &IndexEntry> {
        self.entries.iter()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Number of handles mapped, duplicates included
    pub fn handle_count(&self) -> usize {
        self.by_handle.len()
    }

    pub fn stats(&self) -> &IndexStats {
        &self.stats
    }

    /// Element count per display type name
    pub fn type_counts(&self) -> BTreeMap<String, usize> {
        let mut counts = BTreeMap::new();
        for entry in &self.entries {
            *counts.entry(entry.ifc_type.display_name()).or_insert(0) += 1;
        }
        counts
    }

    fn insert(&mut self, entity: Arc<DecodedEntity>) {
        let attrs = ObjectAttributes::from_entity(&entity);
        let Some(global_id) = attrs.global_id else {
            self.stats.without_id += 1;
            return;
        };

        if let Some(&existing) = self.by_guid.get(&global_id) {
            log::warn!(
                "Duplicate GlobalId {} on {} (first seen on {})",
                global_id,
                entity.id,
                self.entries[existing].express_id
            );
            self.stats.duplicates += 1;
            self.by_handle.insert(entity.id, existing);
            return;
        }

        let position = self.entries.len();
        self.by_guid.insert(global_id.clone(), position);
        self.by_handle.insert(entity.id, position);
        self.entries.push(IndexEntry {
            global_id,
            express_id: entity.id,
            ifc_type: entity.ifc_type.clone(),
            name: attrs.name.or(attrs.object_type).unwrap_or_default(),
            attributes: entity,
        });
        self.stats.indexed += 1;
    }
}

/// Batched indexing pass over one model
pub struct IndexPass {
    model: Arc<dyn IfcModel>,
    ids: Vec<EntityId>,
    cursor: BatchCursor,
    index: ElementIndex,
}

impl IndexPass {
    pub const DEFAULT_BATCH_SIZE: usize = 400;

    pub fn new(model: Arc<dyn IfcModel>) -> Self {
        let ids = model.resolver().all_ids();
        let cursor = BatchCursor::new(ids.len(), Self::DEFAULT_BATCH_SIZE);
        Self {
            model,
            ids,
            cursor,
            index: ElementIndex::default(),
        }
    }

    pub fn with_batch_size(mut self, batch_size: usize) -> Self {
        self.cursor.set_batch_size(batch_size);
        self
    }

    pub fn with_cancel(mut self, cancel: CancellationToken) -> Self {
        self.cursor.set_cancel(cancel);
        self
    }

    /// Report `(done, total)` after every batch
    pub fn on_progress(mut self, report: impl FnMut(usize, usize) + 'static) -> Self {
        self.cursor.set_progress(Box::new(report));
        self
    }

    pub fn stats(&self) -> &IndexStats {
        &self.index.stats
    }
}

impl Pass for IndexPass {
    type Output = ElementIndex;

    fn step(&mut self) -> Result<Step> {
        let Some(batch) = self.cursor.next_batch()? else {
            return Ok(Step::Done);
        };
        if batch.start == 0 {
            log::info!("Indexing {} entities", self.ids.len());
        }

        for &id in &self.ids[batch.clone()] {
            self.index.stats.scanned += 1;
            match self.model.resolver().get(id) {
                Ok(entity) => self.index.insert(entity),
                Err(e) => {
                    log::debug!("Skipping {}: {}", id, e);
                    self.index.stats.failed += 1;
                }
            }
        }

        let step = self.cursor.complete(batch);
        if step == Step::Done {
            let stats = &self.index.stats;
            log::info!(
                "Indexed {} elements ({} without GlobalId, {} failed, {} duplicates)",
                stats.indexed,
                stats.without_id,
                stats.failed,
                stats.duplicates
            );
        }
        Ok(step)
    }

    fn progress(&self) -> (usize, usize) {
        self.cursor.progress()
    }

    fn into_output(self) -> ElementIndex {
        self.index
    }
}
