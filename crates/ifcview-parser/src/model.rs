// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! ParsedModel - the `IfcModel` implementation

use crate::properties::PropertyReaderImpl;
use crate::resolver::ResolverImpl;
use crate::scanner::{parse_header, EntityIndex};
use crate::spatial::SpatialQueryImpl;

use ifcview_model::{
    EntityResolver, IfcModel, ModelMetadata, PropertyReader, Result, SpatialQuery,
};
use std::sync::Arc;

/// A parsed STEP file
///
/// Owns the source text; entities are decoded on first access and cached.
pub struct ParsedModel {
    resolver: Arc<ResolverImpl>,
    properties: PropertyReaderImpl,
    spatial: SpatialQueryImpl,
    metadata: ModelMetadata,
}

impl ParsedModel {
    /// Parse IFC content and index it
    pub fn parse(content: &str, build_spatial: bool) -> Result<Self> {
        let metadata = parse_header(content)?;
        let index = EntityIndex::build(content);
        let resolver = Arc::new(ResolverImpl::new(content.to_string(), index));
        let properties = PropertyReaderImpl::new(Arc::clone(&resolver));
        let spatial = if build_spatial {
            SpatialQueryImpl::build(&resolver)
        } else {
            SpatialQueryImpl::empty()
        };

        Ok(Self {
            resolver,
            properties,
            spatial,
            metadata,
        })
    }

    /// Source text of one instance, as written in the file
    pub fn raw_line(&self, id: ifcview_model::EntityId) -> Option<&str> {
        self.resolver.raw_line(id)
    }
}

impl IfcModel for ParsedModel {
    fn resolver(&self) -> &dyn EntityResolver {
        self.resolver.as_ref()
    }

    fn properties(&self) -> &dyn PropertyReader {
        &self.properties
    }

    fn spatial(&self) -> &dyn SpatialQuery {
        &self.spatial
    }

    fn metadata(&self) -> &ModelMetadata {
        &self.metadata
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ifcview_model::{EntityId, IfcType, ParseError, QuantityType};

    const TEST_IFC: &str = r#"ISO-10303-21;
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
#30=IFCPROPERTYSET('0aqIFTRjfV6AWq_bMtnZwI',$,'Pset_WallCommon',$,(#31,#32,#33));
#31=IFCPROPERTYSINGLEVALUE('IsExternal',$,IFCBOOLEAN(.T.),$);
#32=IFCPROPERTYSINGLEVALUE('Width',$,IFCLENGTHMEASURE(200.),#90);
#33=IFCPROPERTYENUMERATEDVALUE('Status',$,(IFCLABEL('New'),IFCLABEL('Existing')),$);
#34=IFCRELDEFINESBYPROPERTIES('1aqIFTRjfV6AWq_bMtnZwI',$,$,$,(#20),#30);
#40=IFCELEMENTQUANTITY('2aqIFTRjfV6AWq_bMtnZwI',$,'Qto_WallBaseQuantities',$,$,(#41,#42));
#41=IFCQUANTITYLENGTH('Length',$,$,5000.,$);
#42=IFCQUANTITYAREA('NetSideArea',$,$,12.5,$);
#43=IFCRELDEFINESBYPROPERTIES('3aqIFTRjfV6AWq_bMtnZwI',$,$,$,(#20),#40);
#50=IFCMATERIAL('Concrete',$,'Structural');
#51=IFCMATERIAL('Insulation',$,$);
#52=IFCMATERIALLAYER(#50,150.,$,$,$,$,$);
#53=IFCMATERIALLAYER(#51,50.,$,$,$,$,$);
#54=IFCMATERIALLAYERSET((#52,#53),'Wall 200',$);
#55=IFCMATERIALLAYERSETUSAGE(#54,.AXIS2.,.POSITIVE.,0.,$);
#56=IFCRELASSOCIATESMATERIAL('4aqIFTRjfV6AWq_bMtnZwI',$,$,$,(#20),#55);
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

    fn model() -> ParsedModel {
        ParsedModel::parse(TEST_IFC, true).unwrap()
    }

    #[test]
    fn test_metadata() {
        let model = model();
        let meta = model.metadata();
        assert_eq!(meta.schema_version, "IFC4");
        assert_eq!(meta.file_name.as_deref(), Some("house.ifc"));
        assert_eq!(meta.originating_system.as_deref(), Some("Modeller 3"));
    }

    #[test]
    fn test_decoded_name_is_unescaped() {
        let model = model();
        let wall = model.resolver().get(EntityId(20)).unwrap();
        assert_eq!(wall.get_string(2), Some("Vägg 1"));
        assert!(model.raw_line(EntityId(20)).unwrap().contains("\\X2\\00E4\\X0\\"));
    }

    #[test]
    fn test_property_sets() {
        let model = model();
        let psets = model.properties().property_sets(EntityId(20)).unwrap();
        assert_eq!(psets.len(), 1);
        let pset = &psets[0];
        assert_eq!(pset.name, "Pset_WallCommon");
        assert_eq!(pset.get("IsExternal").unwrap().value, "true");
        assert_eq!(pset.get("Width").unwrap().formatted(), "200 mm");
        assert_eq!(pset.get("Status").unwrap().value, "New, Existing");
    }

    #[test]
    fn test_quantity_sets() {
        let model = model();
        let qsets = model.properties().quantity_sets(EntityId(20)).unwrap();
        assert_eq!(qsets.len(), 1);
        assert_eq!(qsets[0].name, "Qto_WallBaseQuantities");
        assert_eq!(qsets[0].quantities.len(), 2);
        assert_eq!(qsets[0].quantities[1].quantity_type, QuantityType::Area);
        assert_eq!(qsets[0].quantities[1].value, 12.5);
    }

    #[test]
    fn test_layered_materials() {
        let model = model();
        let materials = model.properties().materials(EntityId(20)).unwrap();
        let names: Vec<&str> = materials.iter().map(|m| m.name.as_str()).collect();
        assert_eq!(names, vec!["Concrete", "Insulation"]);
        assert_eq!(materials[0].category.as_deref(), Some("Structural"));
        assert_eq!(materials[0].thickness, Some(150.0));
        assert_eq!(materials[1].thickness, Some(50.0));
    }

    fn with_material(select: &str, extra: &str) -> ParsedModel {
        let content = TEST_IFC.replace(
            "#56=IFCRELASSOCIATESMATERIAL('4aqIFTRjfV6AWq_bMtnZwI',$,$,$,(#20),#55);",
            &format!(
                "#56=IFCRELASSOCIATESMATERIAL('4aqIFTRjfV6AWq_bMtnZwI',$,$,$,(#20),{});\n{}",
                select, extra
            ),
        );
        ParsedModel::parse(&content, true).unwrap()
    }

    #[test]
    fn test_cyclic_material_list_is_an_error() {
        let model = with_material("#57", "#57=IFCMATERIALLIST((#50,#57));");
        assert!(matches!(
            model.properties().materials(EntityId(20)),
            Err(ParseError::EntityParse(EntityId(57), _))
        ));
    }

    #[test]
    fn test_shared_material_is_not_a_cycle() {
        let model = with_material("#57", "#57=IFCMATERIALLIST((#50,#50));");
        let materials = model.properties().materials(EntityId(20)).unwrap();
        assert_eq!(materials.len(), 2);
        assert!(materials.iter().all(|m| m.name == "Concrete"));
    }

    #[test]
    fn test_layer_set_usage_without_set() {
        let model = with_material(
            "#57",
            "#57=IFCMATERIALLAYERSETUSAGE($,.AXIS2.,.POSITIVE.,0.,$);",
        );
        assert!(matches!(
            model.properties().materials(EntityId(20)),
            Err(ParseError::MissingAttribute {
                entity: EntityId(57),
                attribute: 0
            })
        ));
    }

    #[test]
    fn test_type_object() {
        let model = model();
        let wall_type = model.properties().type_object(EntityId(20)).unwrap().unwrap();
        assert_eq!(wall_type.id, EntityId(60));
        assert_eq!(wall_type.ifc_type, IfcType::Unknown("IFCWALLTYPE".to_string()));
        assert_eq!(wall_type.name.as_deref(), Some("Basic Wall 200"));
        assert_eq!(wall_type.property_sets[0].properties[0].value, "Acme");
        assert!(model.properties().type_object(EntityId(21)).unwrap().is_none());
    }

    #[test]
    fn test_broken_definition_fails_only_its_category() {
        let model = model();
        let props = model.properties();
        assert!(matches!(
            props.property_sets(EntityId(21)),
            Err(ParseError::EntityParse(EntityId(71), _))
        ));
        assert!(props.quantity_sets(EntityId(21)).unwrap().is_empty());
        assert!(props.materials(EntityId(21)).unwrap().is_empty());
    }

    #[test]
    fn test_unknown_handle_is_an_error() {
        let model = model();
        assert!(matches!(
            model.properties().materials(EntityId(999)),
            Err(ParseError::EntityNotFound(_))
        ));
    }

    #[test]
    fn test_spatial_tree() {
        let model = model();
        let tree = model.spatial().spatial_tree().unwrap();
        assert_eq!(tree.ifc_type, IfcType::IfcProject);
        let storey = tree.find(EntityId(4)).unwrap();
        assert_eq!(storey.children.len(), 2);
    }
}
