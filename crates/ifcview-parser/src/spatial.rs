// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Spatial structure builder and query implementation

use crate::resolver::ResolverImpl;
use ifcview_model::{
    DecodedEntity, EntityId, EntityResolver, IfcType, SpatialNode, SpatialQuery,
};
use rustc_hash::{FxHashMap, FxHashSet};

/// Spatial query over a tree built once at load time
pub struct SpatialQueryImpl {
    tree: Option<SpatialNode>,
}

impl SpatialQueryImpl {
    /// Build the tree from IfcRelAggregates and IfcRelContainedInSpatialStructure
    pub fn build(resolver: &ResolverImpl) -> Self {
        let mut builder = SpatialBuilder::new(resolver);
        let tree = resolver
            .entities_by_type(&IfcType::IfcProject)
            .first()
            .map(|project| builder.node(project));
        Self { tree }
    }

    pub fn empty() -> Self {
        Self { tree: None }
    }
}

impl SpatialQuery for SpatialQueryImpl {
    fn spatial_tree(&self) -> Option<&SpatialNode> {
        self.tree.as_ref()
    }
}

struct SpatialBuilder<'a> {
    resolver: &'a ResolverImpl,
    /// whole -> parts (IfcRelAggregates: RelatingObject 4, RelatedObjects 5)
    parts: FxHashMap<EntityId, Vec<EntityId>>,
    /// structure -> elements (IfcRelContainedInSpatialStructure: RelatedElements 4,
    /// RelatingStructure 5)
    contained: FxHashMap<EntityId, Vec<EntityId>>,
    visited: FxHashSet<EntityId>,
}

impl<'a> SpatialBuilder<'a> {
    fn new(resolver: &'a ResolverImpl) -> Self {
        let mut parts: FxHashMap<EntityId, Vec<EntityId>> = FxHashMap::default();
        for rel in resolver.entities_by_type(&IfcType::IfcRelAggregates) {
            if let Some(whole) = rel.get_ref(4) {
                parts.entry(whole).or_default().extend(rel.get_refs(5));
            }
        }

        let mut contained: FxHashMap<EntityId, Vec<EntityId>> = FxHashMap::default();
        for rel in resolver.entities_by_type(&IfcType::IfcRelContainedInSpatialStructure) {
            if let Some(structure) = rel.get_ref(5) {
                contained.entry(structure).or_default().extend(rel.get_refs(4));
            }
        }

        Self {
            resolver,
            parts,
            contained,
            visited: FxHashSet::default(),
        }
    }

    fn node(&mut self, entity: &DecodedEntity) -> SpatialNode {
        self.visited.insert(entity.id);

        let mut node = SpatialNode::new(
            entity.id,
            entity.ifc_type.clone(),
            entity.get_string(2).unwrap_or_default(),
        );
        // Elevation at index 9
        if entity.ifc_type == IfcType::IfcBuildingStorey {
            if let Some(elevation) = entity.get_float(9) {
                node = node.with_elevation(elevation);
            }
        }

        // Decomposition first (site -> building -> storey), then containment
        let children: Vec<EntityId> = self
            .parts
            .get(&entity.id)
            .into_iter()
            .chain(self.contained.get(&entity.id))
            .flatten()
            .copied()
            .collect();

        for child_id in children {
            if self.visited.contains(&child_id) {
                continue;
            }
            if let Ok(child) = self.resolver.get(child_id) {
                let child_node = self.node(&child);
                node.add_child(child_node);
            }
        }
        node
    }
}
