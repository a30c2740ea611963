// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Full element records, loaded on demand and memoized

use crate::cancel::CancellationToken;
use crate::error::Result;
use crate::index::ElementIndex;
use crate::pass::{BatchCursor, Pass, Step};
use crate::spatial_index::{AncestorNode, SpatialIndex};
use ifcview_model::{
    EntityId, IfcModel, IfcType, Material, ObjectAttributes, PropertySet, QuantitySet, TypeObject,
};
use rustc_hash::FxHashMap;
use serde::Serialize;
use std::sync::Arc;

/// Backend lookups made for one record
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize)]
pub enum LookupCategory {
    Attributes,
    PropertySets,
    QuantitySets,
    Materials,
    TypeObject,
}

/// Everything the property panel shows for one element
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct FullRecord {
    pub global_id: String,
    pub express_id: EntityId,
    pub ifc_type: IfcType,
    pub attributes: ObjectAttributes,
    pub property_sets: Vec<PropertySet>,
    pub quantity_sets: Vec<QuantitySet>,
    pub materials: Vec<Material>,
    pub type_object: Option<TypeObject>,
    /// Root-to-element spatial path
    pub spatial: Vec<AncestorNode>,
    /// Lookups that failed and were replaced by empty values
    pub failures: Vec<LookupCategory>,
}

impl FullRecord {
    pub fn is_complete(&self) -> bool {
        self.failures.is_empty()
    }
}

/// Lazy, memoizing record loader for one model
///
/// Records are computed on first request and kept for the lifetime of the
/// loader; there is no eviction.
pub struct RecordLoader {
    model: Arc<dyn IfcModel>,
    index: Arc<ElementIndex>,
    spatial: Arc<SpatialIndex>,
    cache: FxHashMap<String, Arc<FullRecord>>,
}

impl RecordLoader {
    pub fn new(
        model: Arc<dyn IfcModel>,
        index: Arc<ElementIndex>,
        spatial: Arc<SpatialIndex>,
    ) -> Self {
        Self {
            model,
            index,
            spatial,
            cache: FxHashMap::default(),
        }
    }

    pub fn index(&self) -> &ElementIndex {
        &self.index
    }

    pub fn spatial(&self) -> &SpatialIndex {
        &self.spatial
    }

    pub fn model(&self) -> &Arc<dyn IfcModel> {
        &self.model
    }

    /// Record for a GlobalId, or `None` if the index has no such element
    pub fn load(&mut self, global_id: &str) -> Option<Arc<FullRecord>> {
        if let Some(record) = self.cache.get(global_id) {
            return Some(Arc::clone(record));
        }
        let entry = self.index.get(global_id)?;
        let record = Arc::new(self.compute(global_id, entry.express_id, entry.ifc_type.clone()));
        self.cache.insert(global_id.to_string(), Arc::clone(&record));
        Some(record)
    }

    /// Number of memoized records
    pub fn cached(&self) -> usize {
        self.cache.len()
    }

    fn compute(&self, global_id: &str, id: EntityId, ifc_type: IfcType) -> FullRecord {
        let mut failures = Vec::new();
        let model = self.model.as_ref();

        let attributes = lookup(LookupCategory::Attributes, id, &mut failures, || {
            model
                .resolver()
                .get(id)
                .map(|entity| ObjectAttributes::from_entity(&entity))
        });
        let property_sets = lookup(LookupCategory::PropertySets, id, &mut failures, || {
            model.properties().property_sets(id)
        });
        let quantity_sets = lookup(LookupCategory::QuantitySets, id, &mut failures, || {
            model.properties().quantity_sets(id)
        });
        let materials = lookup(LookupCategory::Materials, id, &mut failures, || {
            model.properties().materials(id)
        });
        let type_object = lookup(LookupCategory::TypeObject, id, &mut failures, || {
            model.properties().type_object(id)
        });

        FullRecord {
            global_id: global_id.to_string(),
            express_id: id,
            ifc_type,
            attributes,
            property_sets,
            quantity_sets,
            materials,
            type_object,
            spatial: self.spatial.path(id).to_vec(),
            failures,
        }
    }
}

/// Run one lookup, replacing a failure with the empty value
fn lookup<T: Default>(
    category: LookupCategory,
    id: EntityId,
    failures: &mut Vec<LookupCategory>,
    f: impl FnOnce() -> ifcview_model::Result<T>,
) -> T {
    match f() {
        Ok(value) => value,
        Err(e) => {
            log::debug!("{:?} lookup failed for {}: {}", category, id, e);
            failures.push(category);
            T::default()
        }
    }
}

/// Bulk record extraction over every indexed element
pub struct RecordPass<'a> {
    loader: &'a mut RecordLoader,
    global_ids: Vec<String>,
    cursor: BatchCursor,
    records: Vec<Arc<FullRecord>>,
}

impl<'a> RecordPass<'a> {
    pub const DEFAULT_BATCH_SIZE: usize = 100;

    pub fn new(loader: &'a mut RecordLoader) -> Self {
        let global_ids: Vec<String> = loader.index.iter().map(|e| e.global_id.clone()).collect();
        let cursor = BatchCursor::new(global_ids.len(), Self::DEFAULT_BATCH_SIZE);
        Self {
            loader,
            records: Vec::with_capacity(global_ids.len()),
            global_ids,
            cursor,
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

    pub fn on_progress(mut self, report: impl FnMut(usize, usize) + 'static) -> Self {
        self.cursor.set_progress(Box::new(report));
        self
    }
}

impl Pass for RecordPass<'_> {
    type Output = RecordSet;

    fn step(&mut self) -> Result<Step> {
        let Some(batch) = self.cursor.next_batch()? else {
            return Ok(Step::Done);
        };
        for global_id in &self.global_ids[batch.clone()] {
            if let Some(record) = self.loader.load(global_id) {
                self.records.push(record);
            }
        }
        Ok(self.cursor.complete(batch))
    }

    fn progress(&self) -> (usize, usize) {
        self.cursor.progress()
    }

    fn into_output(self) -> RecordSet {
        RecordSet(self.records)
    }
}

/// Records produced by a [`RecordPass`], in index order
#[derive(Clone, Debug, Default)]
pub struct RecordSet(pub Vec<Arc<FullRecord>>);

impl RecordSet {
    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// JSON object keyed by GlobalId
    pub fn to_json(&self) -> Result<serde_json::Value> {
        let mut map = serde_json::Map::new();
        for record in &self.0 {
            map.insert(record.global_id.clone(), serde_json::to_value(record.as_ref())?);
        }
        Ok(serde_json::Value::Object(map))
    }
}
