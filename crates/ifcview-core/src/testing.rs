// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Test fixtures: an in-memory backend with fault injection and a small
//! STEP file for the real parser

use crate::record::LookupCategory;
use ifcview_model::{
    AttributeValue, DecodedEntity, EntityId, EntityResolver, IfcModel, IfcParser, IfcType,
    Material, ModelMetadata, ParseError, PropertyReader, PropertySet, QuantitySet, Result,
    SpatialNode, SpatialQuery, TypeObject,
};
use ifcview_parser::StepParser;
use rustc_hash::{FxHashMap, FxHashSet};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

pub(crate) const TEST_IFC: &str = r#"ISO-10303-21;
HEADER;
FILE_DESCRIPTION(('ViewDefinition [ReferenceView]'),'2;1');
FILE_NAME('house.ifc','2024-05-02T10:00:00',('Ada'),('Acme'),'pre','Modeller 3',$);
FILE_SCHEMA(('IFC4'));
ENDSEC;
DATA;
#1=IFCPROJECT('0YvctVUKr0kugbFTf53O9L',$,'Project',$,$,$,$,$,$);
#4=IFCBUILDINGSTOREY('3YvctVUKr0kugbFTf53O9L',$,'Plan 1',$,$,$,$,$,.ELEMENT.,0.);
#5=IFCRELAGGREGATES('5YvctVUKr0kugbFTf53O9L',$,$,$,#1,(#4));
#6=IFCRELCONTAINEDINSPATIALSTRUCTURE('8YvctVUKr0kugbFTf53O9L',$,$,$,(#20,#21),#4);
#20=IFCWALL('2O2Fr$t4X7Zf8NOew3FLOH',$,'V\X2\00E4\X0\gg 1',$,'Basic Wall:200',$,$,'W1',.SOLIDWALL.);
#21=IFCDOOR('1hqIFTRjfV6AWq_bMtnZwI',$,'Door 1',$,$,$,$,$,2100.,900.,.DOOR.,$,$);
#30=IFCPROPERTYSET('0aqIFTRjfV6AWq_bMtnZwI',$,'Pset_WallCommon',$,(#31,#32));
#31=IFCPROPERTYSINGLEVALUE('IsExternal',$,IFCBOOLEAN(.T.),$);
#32=IFCPROPERTYSINGLEVALUE('Width',$,IFCLENGTHMEASURE(200.),#90);
#34=IFCRELDEFINESBYPROPERTIES('1aqIFTRjfV6AWq_bMtnZwI',$,$,$,(#20),#30);
#40=IFCELEMENTQUANTITY('2aqIFTRjfV6AWq_bMtnZwI',$,'Qto_WallBaseQuantities',$,$,(#41,#42));
#41=IFCQUANTITYLENGTH('Length',$,$,5000.,$);
#42=IFCQUANTITYAREA('NetSideArea',$,$,12.5,$);
#43=IFCRELDEFINESBYPROPERTIES('3aqIFTRjfV6AWq_bMtnZwI',$,$,$,(#20),#40);
#50=IFCMATERIAL('Concrete',$,'Structural');
#52=IFCMATERIALLAYER(#50,150.,$,$,$,$,$);
#54=IFCMATERIALLAYERSET((#52),'Wall 200',$);
#56=IFCRELASSOCIATESMATERIAL('4aqIFTRjfV6AWq_bMtnZwI',$,$,$,(#20),#54);
#60=IFCWALLTYPE('5aqIFTRjfV6AWq_bMtnZwI',$,'Basic Wall 200',$,$,(#61),$,$,$,.STANDARD.);
#61=IFCPROPERTYSET('6aqIFTRjfV6AWq_bMtnZwI',$,'Pset_WallTypeCommon',$,(#62));
#62=IFCPROPERTYSINGLEVALUE('Manufacturer',$,IFCLABEL('Acme'),$);
#63=IFCRELDEFINESBYTYPE('7aqIFTRjfV6AWq_bMtnZwI',$,$,$,(#20),#60);
#70=IFCPROPERTYSET('8aqIFTRjfV6AWq_bMtnZwI',$,'Pset_DoorCommon',$,(#71));
#71=IFCPROPERTYSINGLEVALUE('FireRating',$,IFCLABEL('EI30'),$;
#72=IFCRELDEFINESBYPROPERTIES('9aqIFTRjfV6AWq_bMtnZwI',$,$,$,(#21),#70);
#90=IFCSIUNIT(*,.LENGTHUNIT.,.MILLI.,.METRE.);
ENDSEC;
END-ISO-10303-21;
"#;

/// Parse a fixture with the real STEP backend
pub(crate) fn parsed(content: &str) -> Arc<dyn IfcModel> {
    StepParser::new().parse(content).unwrap()
}

/// Per-category call counters
#[derive(Debug, Default)]
pub(crate) struct CallCounts {
    pub entities: AtomicUsize,
    pub property_sets: AtomicUsize,
    pub quantity_sets: AtomicUsize,
    pub materials: AtomicUsize,
    pub type_object: AtomicUsize,
}

fn bump(counter: &AtomicUsize) {
    counter.fetch_add(1, Ordering::SeqCst);
}

/// In-memory backend
///
/// Entities come back in insertion order. Lookups for a handle can be made
/// to fail per category, or entirely with [`MockModel::fail_entity`].
#[derive(Default)]
pub(crate) struct MockModel {
    order: Vec<EntityId>,
    entities: FxHashMap<EntityId, Arc<DecodedEntity>>,
    broken: FxHashSet<EntityId>,
    failing: FxHashSet<(EntityId, LookupCategory)>,
    property_sets: FxHashMap<EntityId, Vec<PropertySet>>,
    quantity_sets: FxHashMap<EntityId, Vec<QuantitySet>>,
    materials: FxHashMap<EntityId, Vec<Material>>,
    types: FxHashMap<EntityId, TypeObject>,
    tree: Option<SpatialNode>,
    metadata: ModelMetadata,
    pub calls: CallCounts,
}

impl MockModel {
    pub fn new() -> Self {
        Self {
            metadata: ModelMetadata {
                schema_version: "IFC4".to_string(),
                ..Default::default()
            },
            ..Default::default()
        }
    }

    /// Add a rooted object with GlobalId and Name
    pub fn element(&mut self, id: u32, ifc_type: IfcType, global_id: &str, name: &str) {
        let mut attributes = vec![AttributeValue::Null; 8];
        attributes[0] = AttributeValue::String(global_id.to_string());
        attributes[2] = AttributeValue::String(name.to_string());
        self.push(id, ifc_type, attributes);
    }

    /// Add an entity without a GlobalId
    pub fn raw(&mut self, id: u32, ifc_type: IfcType) {
        self.push(id, ifc_type, vec![AttributeValue::String("Width".to_string())]);
    }

    fn push(&mut self, id: u32, ifc_type: IfcType, attributes: Vec<AttributeValue>) {
        let id = EntityId(id);
        self.order.push(id);
        self.entities.insert(
            id,
            Arc::new(DecodedEntity {
                id,
                ifc_type,
                attributes,
            }),
        );
    }

    pub fn fail_entity(&mut self, id: u32) {
        self.broken.insert(EntityId(id));
    }

    pub fn fail(&mut self, id: u32, category: LookupCategory) {
        self.failing.insert((EntityId(id), category));
    }

    pub fn property_set(&mut self, id: u32, pset: PropertySet) {
        self.property_sets.entry(EntityId(id)).or_default().push(pset);
    }

    pub fn quantity_set(&mut self, id: u32, qset: QuantitySet) {
        self.quantity_sets.entry(EntityId(id)).or_default().push(qset);
    }

    pub fn material(&mut self, id: u32, material: Material) {
        self.materials.entry(EntityId(id)).or_default().push(material);
    }

    pub fn type_object(&mut self, id: u32, type_object: TypeObject) {
        self.types.insert(EntityId(id), type_object);
    }

    pub fn tree(&mut self, root: SpatialNode) {
        self.tree = Some(root);
    }

    fn check(&self, id: EntityId, category: LookupCategory) -> Result<()> {
        if self.failing.contains(&(id, category)) || self.broken.contains(&id) {
            return Err(ParseError::other(format!("injected {:?} failure", category)));
        }
        if !self.entities.contains_key(&id) {
            return Err(ParseError::EntityNotFound(id));
        }
        Ok(())
    }

    fn listed<T: Clone>(map: &FxHashMap<EntityId, Vec<T>>, id: EntityId) -> Vec<T> {
        map.get(&id).cloned().unwrap_or_default()
    }
}

impl EntityResolver for MockModel {
    fn all_ids(&self) -> Vec<EntityId> {
        self.order.clone()
    }

    fn get(&self, id: EntityId) -> Result<Arc<DecodedEntity>> {
        bump(&self.calls.entities);
        self.check(id, LookupCategory::Attributes)?;
        self.entities
            .get(&id)
            .cloned()
            .ok_or(ParseError::EntityNotFound(id))
    }
}

impl PropertyReader for MockModel {
    fn property_sets(&self, id: EntityId) -> Result<Vec<PropertySet>> {
        bump(&self.calls.property_sets);
        self.check(id, LookupCategory::PropertySets)?;
        Ok(Self::listed(&self.property_sets, id))
    }

    fn quantity_sets(&self, id: EntityId) -> Result<Vec<QuantitySet>> {
        bump(&self.calls.quantity_sets);
        self.check(id, LookupCategory::QuantitySets)?;
        Ok(Self::listed(&self.quantity_sets, id))
    }

    fn materials(&self, id: EntityId) -> Result<Vec<Material>> {
        bump(&self.calls.materials);
        self.check(id, LookupCategory::Materials)?;
        Ok(Self::listed(&self.materials, id))
    }

    fn type_object(&self, id: EntityId) -> Result<Option<TypeObject>> {
        bump(&self.calls.type_object);
        self.check(id, LookupCategory::TypeObject)?;
        Ok(self.types.get(&id).cloned())
    }
}

impl SpatialQuery for MockModel {
    fn spatial_tree(&self) -> Option<&SpatialNode> {
        self.tree.as_ref()
    }
}

impl IfcModel for MockModel {
    fn resolver(&self) -> &dyn EntityResolver {
        self
    }

    fn properties(&self) -> &dyn PropertyReader {
        self
    }

    fn spatial(&self) -> &dyn SpatialQuery {
        self
    }

    fn metadata(&self) -> &ModelMetadata {
        &self.metadata
    }
}
