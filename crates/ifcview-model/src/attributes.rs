// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Named attributes of rooted IFC objects

use crate::{AttributeValue, DecodedEntity};
use serde::{Deserialize, Serialize};

/// Length of an IFC compressed GlobalId
pub const GLOBAL_ID_LEN: usize = 22;

/// Check whether a string is an IFC compressed GlobalId
///
/// GlobalIds are 22 characters from the IFC base64 alphabet
/// (`0-9 A-Z a-z _ $`).
pub fn is_global_id(s: &str) -> bool {
    s.len() == GLOBAL_ID_LEN
        && s
            .bytes()
            .all(|b| b.is_ascii_alphanumeric() || b == b'_' || b == b'$')
}

/// The IfcRoot/IfcObject attributes shown in the summary panel
///
/// Positions follow the IfcRoot/IfcObject/IfcProduct layout: GlobalId 0,
/// Name 2, Description 3, ObjectType 4, Tag 7. PredefinedType is the last
/// enumeration after Tag; spatial elements carry CompositionType there
/// instead, so they never report one.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ObjectAttributes {
    pub global_id: Option<String>,
    pub name: Option<String>,
    pub description: Option<String>,
    pub object_type: Option<String>,
    pub tag: Option<String>,
    pub predefined_type: Option<String>,
}

impl ObjectAttributes {
    /// Read the named attributes from a decoded entity
    ///
    /// Entities whose first attribute is not a GlobalId (property values,
    /// units, geometry) yield an empty record.
    pub fn from_entity(entity: &DecodedEntity) -> Self {
        let global_id = match entity.get_string(0) {
            Some(s) if is_global_id(s) => s.to_string(),
            _ => return Self::default(),
        };
        let text = |index: usize| {
            entity
                .get_string(index)
                .filter(|s| !s.is_empty())
                .map(str::to_string)
        };
        let predefined_type = if entity.ifc_type.is_spatial() {
            None
        } else {
            entity
                .attributes
                .iter()
                .skip(8)
                .rev()
                .find_map(AttributeValue::as_enum)
                .filter(|e| !matches!(*e, "NOTDEFINED" | "T" | "F" | "U"))
                .map(str::to_string)
        };

        Self {
            global_id: Some(global_id),
            name: text(2),
            description: text(3),
            object_type: text(4),
            tag: text(7),
            predefined_type,
        }
    }
}
