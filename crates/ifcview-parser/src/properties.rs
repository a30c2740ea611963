// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! PropertyReader implementation
//!
//! Relationship entities are indexed once when the model loads; the
//! definitions they point to are decoded per lookup.

use crate::resolver::ResolverImpl;
use ifcview_model::{
    AttributeValue, DecodedEntity, EntityId, EntityResolver, IfcType, Material, ParseError,
    Property, PropertyReader, PropertySet, Quantity, QuantitySet, QuantityType, Result, TypeObject,
};
use rustc_hash::FxHashMap;
use std::sync::Arc;

type Links = FxHashMap<u32, Vec<EntityId>>;

/// Property reader over IfcRelDefinesByProperties, IfcRelDefinesByType and
/// IfcRelAssociatesMaterial
pub struct PropertyReaderImpl {
    resolver: Arc<ResolverImpl>,
    /// element -> IfcPropertySet ids
    pset_links: Links,
    /// element -> IfcElementQuantity ids
    qset_links: Links,
    /// element -> material select ids
    material_links: Links,
    /// element -> type object id
    type_links: FxHashMap<u32, EntityId>,
}

impl PropertyReaderImpl {
    pub fn new(resolver: Arc<ResolverImpl>) -> Self {
        let mut pset_links = Links::default();
        let mut qset_links = Links::default();
        let mut material_links = Links::default();
        let mut type_links = FxHashMap::default();

        // RelatedObjects at index 4, the relating definition at index 5
        for rel in resolver.entities_by_type(&IfcType::IfcRelDefinesByProperties) {
            let Some(definition) = rel.get_ref(5) else {
                continue;
            };
            let links = match resolver.get(definition).map(|d| d.ifc_type.clone()) {
                Ok(IfcType::IfcPropertySet) => &mut pset_links,
                Ok(IfcType::IfcElementQuantity) => &mut qset_links,
                _ => continue,
            };
            for related in rel.get_refs(4) {
                links.entry(related.0).or_default().push(definition);
            }
        }

        for rel in resolver.entities_by_type(&IfcType::IfcRelAssociatesMaterial) {
            let Some(material) = rel.get_ref(5) else {
                continue;
            };
            for related in rel.get_refs(4) {
                material_links.entry(related.0).or_default().push(material);
            }
        }

        for rel in resolver.entities_by_type(&IfcType::IfcRelDefinesByType) {
            let Some(type_id) = rel.get_ref(5) else {
                continue;
            };
            for related in rel.get_refs(4) {
                type_links.entry(related.0).or_insert(type_id);
            }
        }

        Self {
            resolver,
            pset_links,
            qset_links,
            material_links,
            type_links,
        }
    }

    /// Decode an IfcPropertySet
    ///
    /// Name at index 2, HasProperties at index 4. Property kinds the viewer
    /// does not render are skipped; lines that fail to decode fail the set.
    fn read_property_set(&self, id: EntityId) -> Result<PropertySet> {
        let pset = self.resolver.get(id)?;
        let mut set = PropertySet::new(pset.get_string(2).unwrap_or("Unnamed"));
        for prop_id in pset.get_refs(4) {
            let prop = self.resolver.get(prop_id)?;
            if let Some(property) = self.read_property(&prop) {
                set.add(property);
            }
        }
        Ok(set)
    }

    fn read_property(&self, prop: &DecodedEntity) -> Option<Property> {
        let name = prop.get_string(0)?.to_string();
        let joined = |index: usize| {
            prop.get_list(index).map(|list| {
                list.iter()
                    .map(AttributeValue::display)
                    .collect::<Vec<_>>()
                    .join(", ")
            })
        };

        match prop.ifc_type {
            IfcType::IfcPropertySingleValue => {
                // NominalValue at index 2, Unit at index 3
                let value = prop.get(2).map(AttributeValue::display).unwrap_or_default();
                let unit = prop.get_ref(3).and_then(|u| self.unit_label(u));
                Some(Property { name, value, unit })
            }
            IfcType::IfcPropertyEnumeratedValue => Some(Property::new(name, joined(2)?)),
            IfcType::IfcPropertyListValue => Some(Property::new(name, joined(2)?)),
            IfcType::IfcPropertyBoundedValue => {
                let upper = prop.get(2).map(AttributeValue::display).filter(|s| !s.is_empty());
                let lower = prop.get(3).map(AttributeValue::display).filter(|s| !s.is_empty());
                let value = match (lower, upper) {
                    (Some(l), Some(u)) => format!("{} - {}", l, u),
                    (Some(l), None) => format!(">= {}", l),
                    (None, Some(u)) => format!("<= {}", u),
                    (None, None) => return None,
                };
                Some(Property::new(name, value))
            }
            _ => None,
        }
    }

    /// Short label for an IfcSIUnit or IfcConversionBasedUnit
    fn unit_label(&self, unit_id: EntityId) -> Option<String> {
        let unit = self.resolver.get(unit_id).ok()?;
        match unit.ifc_type {
            IfcType::IfcSIUnit => {
                let prefix = match unit.get_enum(2).unwrap_or("") {
                    "MILLI" => "m",
                    "CENTI" => "c",
                    "DECI" => "d",
                    "KILO" => "k",
                    _ => "",
                };
                let name = match unit.get_enum(3)? {
                    "METRE" => "m",
                    "SQUARE_METRE" => "m²",
                    "CUBIC_METRE" => "m³",
                    "GRAM" => "g",
                    "SECOND" => "s",
                    "DEGREE_CELSIUS" => "°C",
                    "KELVIN" => "K",
                    "WATT" => "W",
                    "PASCAL" => "Pa",
                    other => other,
                };
                Some(format!("{}{}", prefix, name))
            }
            IfcType::IfcConversionBasedUnit => unit.get_string(2).map(str::to_string),
            _ => None,
        }
    }

    /// Decode an IfcElementQuantity
    ///
    /// Name at index 2, Quantities at index 5, each quantity's value at
    /// index 3.
    fn read_quantity_set(&self, id: EntityId) -> Result<QuantitySet> {
        let qset = self.resolver.get(id)?;
        let mut quantities = Vec::new();
        for qty_id in qset.get_refs(5) {
            let qty = self.resolver.get(qty_id)?;
            let Some(kind) = QuantityType::from_ifc_type(&qty.ifc_type) else {
                continue;
            };
            if let (Some(name), Some(value)) = (qty.get_string(0), qty.get_float(3)) {
                quantities.push(Quantity::new(name, value, kind));
            }
        }
        Ok(QuantitySet {
            name: qset.get_string(2).unwrap_or("Unnamed").to_string(),
            quantities,
        })
    }

    /// Flatten a material select into plain materials
    ///
    /// `path` holds the selects currently being expanded; meeting one of
    /// them again is a reference cycle and fails the lookup.
    fn collect_materials(
        &self,
        id: EntityId,
        thickness: Option<f64>,
        path: &mut Vec<EntityId>,
        out: &mut Vec<Material>,
    ) -> Result<()> {
        if path.contains(&id) {
            return Err(ParseError::entity_parse(id, "cyclic material reference"));
        }
        let entity = self.resolver.get(id)?;
        path.push(id);
        match entity.ifc_type {
            IfcType::IfcMaterial => {
                let mut material = Material::new(entity.get_string(0).unwrap_or("Unnamed"));
                material.category = entity.get_string(2).map(str::to_string);
                material.thickness = thickness;
                out.push(material);
            }
            IfcType::IfcMaterialLayerSetUsage => {
                // ForLayerSet is required
                let set = entity.get_ref(0).ok_or_else(|| ParseError::missing(id, 0))?;
                self.collect_materials(set, None, path, out)?;
            }
            IfcType::IfcMaterialLayerSet | IfcType::IfcMaterialList => {
                for layer in entity.get_refs(0) {
                    self.collect_materials(layer, None, path, out)?;
                }
            }
            IfcType::IfcMaterialLayer => {
                if let Some(material) = entity.get_ref(0) {
                    self.collect_materials(material, entity.get_float(1), path, out)?;
                }
            }
            IfcType::IfcMaterialConstituentSet => {
                for constituent in entity.get_refs(2) {
                    self.collect_materials(constituent, None, path, out)?;
                }
            }
            IfcType::IfcMaterialConstituent => {
                let material = entity.get_ref(2).ok_or_else(|| ParseError::missing(id, 2))?;
                self.collect_materials(material, None, path, out)?;
            }
            _ => {}
        }
        path.pop();
        Ok(())
    }

    /// Fail with `EntityNotFound` for handles outside the model
    fn ensure_exists(&self, id: EntityId) -> Result<()> {
        self.resolver.get(id).map(|_| ())
    }
}

impl PropertyReader for PropertyReaderImpl {
    fn property_sets(&self, id: EntityId) -> Result<Vec<PropertySet>> {
        self.ensure_exists(id)?;
        let ids = self.pset_links.get(&id.0).map(Vec::as_slice).unwrap_or(&[]);
        ids.iter()
            .map(|pset| self.read_property_set(*pset))
            .collect()
    }

    fn quantity_sets(&self, id: EntityId) -> Result<Vec<QuantitySet>> {
        self.ensure_exists(id)?;
        let ids = self.qset_links.get(&id.0).map(Vec::as_slice).unwrap_or(&[]);
        ids.iter()
            .map(|qset| self.read_quantity_set(*qset))
            .collect()
    }

    fn materials(&self, id: EntityId) -> Result<Vec<Material>> {
        self.ensure_exists(id)?;
        let mut materials = Vec::new();
        let mut path = Vec::new();
        for select in self.material_links.get(&id.0).map(Vec::as_slice).unwrap_or(&[]) {
            self.collect_materials(*select, None, &mut path, &mut materials)?;
        }
        Ok(materials)
    }

    fn type_object(&self, id: EntityId) -> Result<Option<TypeObject>> {
        self.ensure_exists(id)?;
        let Some(type_id) = self.type_links.get(&id.0).copied() else {
            return Ok(None);
        };
        let entity = self.resolver.get(type_id)?;
        // HasPropertySets at index 5
        let property_sets = entity
            .get_refs(5)
            .into_iter()
            .map(|pset| self.read_property_set(pset))
            .collect::<Result<Vec<_>>>()?;
        Ok(Some(TypeObject {
            id: type_id,
            ifc_type: entity.ifc_type.clone(),
            name: entity.get_string(2).map(str::to_string),
            property_sets,
        }))
    }
}
