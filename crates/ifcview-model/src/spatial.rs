// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Spatial structure tree

use crate::{EntityId, IfcType};
use serde::{Deserialize, Serialize};

/// Type of spatial structure node
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SpatialNodeType {
    Project,
    Site,
    Building,
    Storey,
    Space,
    /// Building element (wall, door, etc.)
    Element,
}

impl SpatialNodeType {
    pub fn from_ifc_type(ifc_type: &IfcType) -> Self {
        match ifc_type {
            IfcType::IfcProject => SpatialNodeType::Project,
            IfcType::IfcSite => SpatialNodeType::Site,
            IfcType::IfcBuilding => SpatialNodeType::Building,
            IfcType::IfcBuildingStorey => SpatialNodeType::Storey,
            IfcType::IfcSpace => SpatialNodeType::Space,
            _ => SpatialNodeType::Element,
        }
    }
}

/// Node in the spatial hierarchy tree
///
/// The tree follows Project → Site → Building → Storey → Elements, with
/// aggregated parts nested under their whole.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct SpatialNode {
    pub id: EntityId,
    pub node_type: SpatialNodeType,
    pub name: String,
    pub ifc_type: IfcType,
    /// Elevation (storeys only)
    pub elevation: Option<f64>,
    pub children: Vec<SpatialNode>,
}

impl SpatialNode {
    pub fn new(id: EntityId, ifc_type: IfcType, name: impl Into<String>) -> Self {
        Self {
            id,
            node_type: SpatialNodeType::from_ifc_type(&ifc_type),
            name: name.into(),
            ifc_type,
            elevation: None,
            children: Vec::new(),
        }
    }

    pub fn with_elevation(mut self, elevation: f64) -> Self {
        self.elevation = Some(elevation);
        self
    }

    pub fn add_child(&mut self, child: SpatialNode) {
        self.children.push(child);
    }

    pub fn find(&self, id: EntityId) -> Option<&SpatialNode> {
        self.iter().find(|n| n.id == id)
    }

    /// Iterate all nodes (depth-first, pre-order)
    pub fn iter(&self) -> SpatialNodeIter<'_> {
        SpatialNodeIter { stack: vec![self] }
    }
}

/// Iterator over spatial nodes (depth-first)
pub struct SpatialNodeIter<'a> {
    stack: Vec<&'a SpatialNode>,
}

impl<'a> Iterator for SpatialNodeIter<'a> {
    type Item = &'a SpatialNode;

    fn next(&mut self) -> Option<Self::Item> {
        let node = self.stack.pop()?;
        // Reverse so the first child comes out first
        self.stack.extend(node.children.iter().rev());
        Some(node)
    }
}

/// Building storey summary
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct StoreyInfo {
    pub id: EntityId,
    pub name: String,
    pub elevation: Option<f64>,
    /// Number of element nodes below this storey
    pub element_count: usize,
}

/// Spatial structure access
pub trait SpatialQuery: Send + Sync {
    /// Root of the spatial tree (normally the IfcProject), if the model has one
    fn spatial_tree(&self) -> Option<&SpatialNode>;

    /// All storeys in tree order
    fn storeys(&self) -> Vec<StoreyInfo> {
        let Some(tree) = self.spatial_tree() else {
            return Vec::new();
        };
        tree.iter()
            .filter(|n| n.node_type == SpatialNodeType::Storey)
            .map(|n| StoreyInfo {
                id: n.id,
                name: n.name.clone(),
                elevation: n.elevation,
                element_count: n
                    .iter()
                    .filter(|c| c.node_type == SpatialNodeType::Element)
                    .count(),
            })
            .collect()
    }
}
