// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Property, quantity, material and type records attached to elements

use crate::{format_float, EntityId, IfcType, Result};
use serde::{Deserialize, Serialize};

/// A single property value with optional unit
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Property {
    pub name: String,
    /// Value formatted for display
    pub value: String,
    pub unit: Option<String>,
}

impl Property {
    pub fn new(name: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            value: value.into(),
            unit: None,
        }
    }

    pub fn with_unit(
        name: impl Into<String>,
        value: impl Into<String>,
        unit: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            value: value.into(),
            unit: Some(unit.into()),
        }
    }

    /// Value followed by its unit, if any
    pub fn formatted(&self) -> String {
        match &self.unit {
            Some(unit) if !unit.is_empty() => format!("{} {}", self.value, unit),
            _ => self.value.clone(),
        }
    }
}

/// A named group of properties (IfcPropertySet)
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct PropertySet {
    /// Property set name (e.g. "Pset_WallCommon")
    pub name: String,
    pub properties: Vec<Property>,
}

impl PropertySet {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            properties: Vec::new(),
        }
    }

    pub fn add(&mut self, property: Property) {
        self.properties.push(property);
    }

    pub fn get(&self, name: &str) -> Option<&Property> {
        self.properties.iter().find(|p| p.name == name)
    }
}

/// Quantity kinds supported in IFC
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum QuantityType {
    Length,
    Area,
    Volume,
    Count,
    Weight,
    Time,
}

impl QuantityType {
    /// Map an IfcQuantity* entity type to its kind
    pub fn from_ifc_type(ifc_type: &IfcType) -> Option<Self> {
        match ifc_type {
            IfcType::IfcQuantityLength => Some(QuantityType::Length),
            IfcType::IfcQuantityArea => Some(QuantityType::Area),
            IfcType::IfcQuantityVolume => Some(QuantityType::Volume),
            IfcType::IfcQuantityCount => Some(QuantityType::Count),
            IfcType::IfcQuantityWeight => Some(QuantityType::Weight),
            IfcType::IfcQuantityTime => Some(QuantityType::Time),
            _ => None,
        }
    }

    pub fn default_unit(&self) -> &'static str {
        match self {
            QuantityType::Length => "m",
            QuantityType::Area => "m²",
            QuantityType::Volume => "m³",
            QuantityType::Count => "",
            QuantityType::Weight => "kg",
            QuantityType::Time => "s",
        }
    }
}

/// A quantity value with type and unit
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Quantity {
    pub name: String,
    pub value: f64,
    pub unit: String,
    pub quantity_type: QuantityType,
}

impl Quantity {
    pub fn new(name: impl Into<String>, value: f64, quantity_type: QuantityType) -> Self {
        Self {
            name: name.into(),
            value,
            unit: quantity_type.default_unit().to_string(),
            quantity_type,
        }
    }

    pub fn formatted(&self) -> String {
        if self.unit.is_empty() {
            format_float(self.value)
        } else {
            format!("{} {}", format_float(self.value), self.unit)
        }
    }
}

/// A named group of quantities (IfcElementQuantity)
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct QuantitySet {
    /// Quantity set name (e.g. "Qto_WallBaseQuantities")
    pub name: String,
    pub quantities: Vec<Quantity>,
}

/// A material associated with an element
///
/// Layered materials produce one entry per layer, carrying the layer
/// thickness.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Material {
    pub name: String,
    pub category: Option<String>,
    pub thickness: Option<f64>,
}

impl Material {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            category: None,
            thickness: None,
        }
    }
}

/// The type object an element is defined by (IfcRelDefinesByType)
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct TypeObject {
    pub id: EntityId,
    pub ifc_type: IfcType,
    pub name: Option<String>,
    /// Property sets declared on the type (HasPropertySets)
    pub property_sets: Vec<PropertySet>,
}

/// Property, quantity, material and type lookups
///
/// Every lookup is per element and may fail independently; callers decide
/// how to treat a failure. An element that simply has no data of a category
/// returns an empty collection (or `None` for the type), not an error.
pub trait PropertyReader: Send + Sync {
    /// Property sets linked via IfcRelDefinesByProperties
    fn property_sets(&self, id: EntityId) -> Result<Vec<PropertySet>>;

    /// Quantity sets linked via IfcRelDefinesByProperties
    fn quantity_sets(&self, id: EntityId) -> Result<Vec<QuantitySet>>;

    /// Materials linked via IfcRelAssociatesMaterial
    fn materials(&self, id: EntityId) -> Result<Vec<Material>>;

    /// Type object linked via IfcRelDefinesByType
    fn type_object(&self, id: EntityId) -> Result<Option<TypeObject>>;
}
