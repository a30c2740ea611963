// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Property panel tabs and their HTML table rendering

use crate::record::FullRecord;
use crate::spatial_index::AncestorNode;
use ifcview_model::format_float;
use serde::{Deserialize, Serialize};
use std::fmt;

/// One key/value row of a tab
pub type Row = (String, String);

/// Tabs of the property panel
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PropertyTab {
    #[default]
    Summary,
    Location,
    Material,
    PartOf,
    Conflicts,
    Psets,
    Qto,
    Type,
}

impl PropertyTab {
    /// Tabs in panel order
    pub const ALL: [PropertyTab; 8] = [
        PropertyTab::Summary,
        PropertyTab::Location,
        PropertyTab::Material,
        PropertyTab::PartOf,
        PropertyTab::Conflicts,
        PropertyTab::Psets,
        PropertyTab::Qto,
        PropertyTab::Type,
    ];

    pub fn key(&self) -> &'static str {
        match self {
            PropertyTab::Summary => "Summary",
            PropertyTab::Location => "Location",
            PropertyTab::Material => "Material",
            PropertyTab::PartOf => "PartOf",
            PropertyTab::Conflicts => "Conflicts",
            PropertyTab::Psets => "Psets",
            PropertyTab::Qto => "Qto",
            PropertyTab::Type => "Type",
        }
    }

    /// Tab for a key; unknown keys select Summary
    pub fn parse(key: &str) -> Self {
        Self::ALL
            .into_iter()
            .find(|tab| tab.key().eq_ignore_ascii_case(key))
            .unwrap_or_default()
    }

    /// Rows of this tab for a record
    pub fn rows(&self, record: &FullRecord) -> Vec<Row> {
        match self {
            PropertyTab::Summary => summary_rows(record),
            PropertyTab::Location => record.spatial.iter().map(ancestor_row).collect(),
            PropertyTab::Material => record
                .materials
                .iter()
                .map(|m| {
                    let mut parts = Vec::new();
                    if let Some(category) = &m.category {
                        parts.push(category.clone());
                    }
                    if let Some(thickness) = m.thickness {
                        parts.push(format_float(thickness));
                    }
                    (m.name.clone(), parts.join(" / "))
                })
                .collect(),
            PropertyTab::PartOf => record
                .spatial
                .iter()
                .filter(|n| n.express_id != record.express_id)
                .map(ancestor_row)
                .collect(),
            PropertyTab::Conflicts => {
                vec![("Status".to_string(), "No conflicts identified.".to_string())]
            }
            PropertyTab::Psets => record
                .property_sets
                .iter()
                .flat_map(|pset| {
                    pset.properties
                        .iter()
                        .map(move |p| (format!("{}.{}", pset.name, p.name), p.formatted()))
                })
                .collect(),
            PropertyTab::Qto => record
                .quantity_sets
                .iter()
                .flat_map(|qset| {
                    qset.quantities
                        .iter()
                        .map(move |q| (format!("{}.{}", qset.name, q.name), q.formatted()))
                })
                .collect(),
            PropertyTab::Type => {
                let Some(type_object) = &record.type_object else {
                    return Vec::new();
                };
                let mut rows = vec![(
                    "Entity".to_string(),
                    format!("{} ({})", type_object.ifc_type.display_name(), type_object.id),
                )];
                if let Some(name) = &type_object.name {
                    rows.push(("Name".to_string(), name.clone()));
                }
                for pset in &type_object.property_sets {
                    for p in &pset.properties {
                        rows.push((format!("{}.{}", pset.name, p.name), p.formatted()));
                    }
                }
                rows
            }
        }
    }
}

impl fmt::Display for PropertyTab {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.key())
    }
}

fn summary_rows(record: &FullRecord) -> Vec<Row> {
    let attrs = &record.attributes;
    [
        ("GlobalId", Some(record.global_id.clone())),
        ("IfcType", Some(record.ifc_type.display_name())),
        ("Name", attrs.name.clone()),
        ("Description", attrs.description.clone()),
        ("ObjectType", attrs.object_type.clone()),
        ("Tag", attrs.tag.clone()),
        ("PredefinedType", attrs.predefined_type.clone()),
    ]
    .into_iter()
    .filter_map(|(key, value)| {
        value
            .filter(|v| !v.is_empty())
            .map(|v| (key.to_string(), v))
    })
    .collect()
}

fn ancestor_row(node: &AncestorNode) -> Row {
    (
        node.ifc_type.display_name(),
        format!("{} ({})", node.name, node.express_id),
    )
}

/// Render rows as the panel's property table
pub fn render_table(rows: &[Row]) -> String {
    if rows.is_empty() {
        return r#"<p class="empty">No properties found.</p>"#.to_string();
    }
    let mut html = String::from(r#"<table class="prop-table">"#);
    for (key, value) in rows {
        html.push_str(r#"<tr><td class="prop-key">"#);
        html.push_str(&escape_html(key));
        html.push_str(r#"</td><td class="prop-value">"#);
        html.push_str(&escape_html(value));
        html.push_str("</td></tr>");
    }
    html.push_str("</table>");
    html
}

/// Escape text for HTML element content and attribute values
pub fn escape_html(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            _ => out.push(c),
        }
    }
    out
}
