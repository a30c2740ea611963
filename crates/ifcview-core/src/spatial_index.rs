// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Handle -> ancestor path index over the spatial tree

use ifcview_model::{EntityId, IfcType, SpatialNode, SpatialQuery, StoreyInfo};
use rustc_hash::FxHashMap;
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;

/// One node on an element's spatial path
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct AncestorNode {
    pub express_id: EntityId,
    pub ifc_type: IfcType,
    pub name: String,
}

impl AncestorNode {
    fn from_node(node: &SpatialNode) -> Self {
        Self {
            express_id: node.id,
            ifc_type: node.ifc_type.clone(),
            name: node.name.clone(),
        }
    }
}

/// Ancestor paths for every node of the spatial tree
///
/// Paths run from the root to the node itself, so the last entry is always
/// the node that was looked up.
#[derive(Debug, Default)]
pub struct SpatialIndex {
    paths: FxHashMap<EntityId, Vec<AncestorNode>>,
    storeys: Vec<StoreyInfo>,
}

impl SpatialIndex {
    /// Build from a model's spatial structure
    pub fn build(spatial: &dyn SpatialQuery) -> Self {
        let Some(root) = spatial.spatial_tree() else {
            log::warn!("Model has no spatial structure; element paths will be empty");
            return Self::default();
        };

        let mut paths = FxHashMap::default();
        let mut stack = Vec::new();
        collect_paths(root, &mut stack, &mut paths);

        Self {
            paths,
            storeys: spatial.storeys(),
        }
    }

    /// Root-to-node path for a handle; empty when the handle is not placed
    pub fn path(&self, id: EntityId) -> &[AncestorNode] {
        self.paths.get(&id).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Nearest storey on the path, including the node itself
    pub fn containing_storey(&self, id: EntityId) -> Option<&AncestorNode> {
        self.path(id)
            .iter()
            .rev()
            .find(|n| n.ifc_type == IfcType::IfcBuildingStorey)
    }

    /// Storeys ordered by elevation, unknown elevations last, ties by name
    pub fn storey_levels(&self) -> Vec<StoreyInfo> {
        let mut levels = self.storeys.clone();
        levels.sort_by(|a, b| match (a.elevation, b.elevation) {
            (Some(x), Some(y)) => x.total_cmp(&y).then_with(|| a.name.cmp(&b.name)),
            (Some(_), None) => Ordering::Less,
            (None, Some(_)) => Ordering::Greater,
            (None, None) => a.name.cmp(&b.name),
        });
        levels
    }

    pub fn len(&self) -> usize {
        self.paths.len()
    }

    pub fn is_empty(&self) -> bool {
        self.paths.is_empty()
    }
}

fn collect_paths(
    node: &SpatialNode,
    stack: &mut Vec<AncestorNode>,
    paths: &mut FxHashMap<EntityId, Vec<AncestorNode>>,
) {
    stack.push(AncestorNode::from_node(node));
    // a handle reached twice keeps its first path
    paths.entry(node.id).or_insert_with(|| stack.clone());
    for child in &node.children {
        collect_paths(child, stack, paths);
    }
    stack.pop();
}
