// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Entity scanner for the DATA section
//!
//! Finds instance boundaries with memchr without decoding attributes, so a
//! model can be indexed up front and decoded lazily.

use crate::tokenizer::parse_arguments;
use ifcview_model::{AttributeValue, EntityId, IfcType, ModelMetadata, ParseError, Result};
use memchr::{memchr, memchr2};
use rustc_hash::FxHashMap;

/// Location of one instance in the source text
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct RawEntity<'a> {
    pub id: u32,
    pub type_name: &'a str,
    /// Byte offset of the leading `#`
    pub start: usize,
    /// Byte offset just past the terminating `;`
    pub end: usize,
}

/// Scanner over the instances of a STEP file
pub struct EntityScanner<'a> {
    content: &'a str,
    pos: usize,
}

impl<'a> EntityScanner<'a> {
    /// Start scanning after the `DATA;` keyword (or at the top if absent)
    pub fn new(content: &'a str) -> Self {
        let pos = content.find("DATA;").map(|p| p + 5).unwrap_or(0);
        Self { content, pos }
    }

    /// Next instance, or `None` at `ENDSEC;` or end of input
    ///
    /// Statements that are not `#id=TYPE(...)` are skipped.
    pub fn next_entity(&mut self) -> Option<RawEntity<'a>> {
        let bytes = self.content.as_bytes();
        loop {
            self.skip_trivia();
            if self.pos >= bytes.len() || self.content[self.pos..].starts_with("ENDSEC;") {
                return None;
            }

            if bytes[self.pos] != b'#' {
                self.skip_statement()?;
                continue;
            }

            let start = self.pos;
            self.pos += 1;
            let id_start = self.pos;
            while self.pos < bytes.len() && bytes[self.pos].is_ascii_digit() {
                self.pos += 1;
            }
            let Ok(id) = self.content[id_start..self.pos].parse::<u32>() else {
                self.skip_statement()?;
                continue;
            };

            self.skip_blanks();
            if bytes.get(self.pos) != Some(&b'=') {
                self.skip_statement()?;
                continue;
            }
            self.pos += 1;
            self.skip_blanks();

            let type_start = self.pos;
            while self.pos < bytes.len()
                && (bytes[self.pos].is_ascii_alphanumeric() || bytes[self.pos] == b'_')
            {
                self.pos += 1;
            }
            if self.pos == type_start {
                self.skip_statement()?;
                continue;
            }
            let type_name = &self.content[type_start..self.pos];

            self.skip_statement()?;
            return Some(RawEntity {
                id,
                type_name,
                start,
                end: self.pos,
            });
        }
    }

    fn skip_blanks(&mut self) {
        let bytes = self.content.as_bytes();
        while self.pos < bytes.len() && bytes[self.pos].is_ascii_whitespace() {
            self.pos += 1;
        }
    }

    /// Skip whitespace and `/* ... */` comments
    fn skip_trivia(&mut self) {
        loop {
            self.skip_blanks();
            if !self.content[self.pos..].starts_with("/*") {
                return;
            }
            match self.content[self.pos + 2..].find("*/") {
                Some(close) => self.pos += close + 4,
                None => self.pos = self.content.len(),
            }
        }
    }

    /// Move past the next `;` outside a quoted string
    fn skip_statement(&mut self) -> Option<()> {
        let bytes = self.content.as_bytes();
        loop {
            let hit = self.pos + memchr2(b'\'', b';', &bytes[self.pos..])?;
            if bytes[hit] == b';' {
                self.pos = hit + 1;
                return Some(());
            }
            // Inside a string: a doubled quote is an escape, a single one closes it
            let mut cursor = hit + 1;
            loop {
                cursor += memchr(b'\'', &bytes[cursor..])?;
                if bytes.get(cursor + 1) == Some(&b'\'') {
                    cursor += 2;
                    continue;
                }
                break;
            }
            self.pos = cursor + 1;
        }
    }
}

/// Handle offsets plus per-type and file-order listings
#[derive(Debug, Default)]
pub struct EntityIndex {
    pub offsets: FxHashMap<u32, (usize, usize)>,
    pub order: Vec<EntityId>,
    pub by_type: FxHashMap<IfcType, Vec<EntityId>>,
}

impl EntityIndex {
    /// Scan the whole DATA section once
    ///
    /// A repeated express id keeps its first definition.
    pub fn build(content: &str) -> Self {
        let mut index = EntityIndex::default();
        let mut scanner = EntityScanner::new(content);
        while let Some(raw) = scanner.next_entity() {
            if index.offsets.contains_key(&raw.id) {
                continue;
            }
            index.offsets.insert(raw.id, (raw.start, raw.end));
            index.order.push(EntityId(raw.id));
            index
                .by_type
                .entry(IfcType::parse(raw.type_name))
                .or_default()
                .push(EntityId(raw.id));
        }
        index
    }

    pub fn len(&self) -> usize {
        self.order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }

    pub fn ids_of(&self, ifc_type: &IfcType) -> &[EntityId] {
        self.by_type.get(ifc_type).map(Vec::as_slice).unwrap_or(&[])
    }
}

/// Read schema and FILE_NAME fields from the header section
///
/// Fails when the content is not a STEP exchange file or names a non-IFC
/// schema. A missing FILE_SCHEMA is tolerated.
pub fn parse_header(content: &str) -> Result<ModelMetadata> {
    if !content.trim_start().starts_with("ISO-10303-21") {
        return Err(ParseError::format("missing ISO-10303-21 signature"));
    }
    let header_start = content
        .find("HEADER;")
        .ok_or_else(|| ParseError::InvalidHeader("no HEADER section".to_string()))?;
    let header_end = content[header_start..]
        .find("ENDSEC;")
        .map(|p| header_start + p)
        .ok_or_else(|| ParseError::InvalidHeader("unterminated HEADER section".to_string()))?;
    let header = &content[header_start..header_end];

    let record = |name: &str| {
        header
            .find(name)
            .and_then(|p| parse_arguments(&header[p + name.len()..]))
    };

    let mut metadata = ModelMetadata::default();

    if let Some(args) = record("FILE_SCHEMA") {
        metadata.schema_version = args
            .first()
            .and_then(AttributeValue::as_list)
            .and_then(|list| list.first())
            .and_then(AttributeValue::as_string)
            .unwrap_or_default()
            .to_string();
        if !metadata.schema_version.is_empty()
            && !metadata.schema_version.to_ascii_uppercase().starts_with("IFC")
        {
            return Err(ParseError::UnsupportedSchema(metadata.schema_version));
        }
    }

    // FILE_NAME(name, time_stamp, (author), (organization), preprocessor,
    //           originating_system, authorization)
    if let Some(args) = record("FILE_NAME") {
        let text = |i: usize| {
            args.get(i)
                .and_then(AttributeValue::as_string)
                .filter(|s| !s.is_empty())
                .map(str::to_string)
        };
        let first_of = |i: usize| {
            args.get(i)
                .and_then(AttributeValue::as_list)
                .and_then(|l| l.iter().find_map(AttributeValue::as_string))
                .filter(|s| !s.is_empty())
                .map(str::to_string)
        };
        metadata.file_name = text(0);
        metadata.timestamp = text(1);
        metadata.author = first_of(2);
        metadata.organization = first_of(3);
        metadata.originating_system = text(5);
    }

    if content.find("DATA;").is_none() {
        return Err(ParseError::format("missing DATA section"));
    }

    Ok(metadata)
}

#[cfg(test)]
mod tests {
    use super::*;

    const TEST_IFC: &str = r#"ISO-10303-21;
HEADER;
FILE_DESCRIPTION(('ViewDefinition [CoordinationView]'),'2;1');
FILE_NAME('test.ifc','2024-01-01T00:00:00',('Author'),('Org'),'Preprocessor','App','');
FILE_SCHEMA(('IFC2X3'));
ENDSEC;
DATA;
#1=IFCPROJECT('0YvctVUKr0kugbFTf53O9L',$,'Project',$,$,$,$,$,#2);
/* a comment; with a semicolon */
  #2=IFCUNITASSIGNMENT((#3));
#3=IFCSIUNIT(*,.LENGTHUNIT.,.MILLI.,.METRE.);
#4=IFCWALL('2O2Fr$t4X7Zf8NOew3FLOH',$,'Wall; ''east''',$,$,#5,#6,$);
#4=IFCSLAB('duplicate',$,$,$,$,$,$,$);
ENDSEC;
END-ISO-10303-21;
"#;

    #[test]
    fn test_scanner_finds_entities() {
        let mut scanner = EntityScanner::new(TEST_IFC);
        let mut entities = Vec::new();
        while let Some(raw) = scanner.next_entity() {
            entities.push((raw.id, raw.type_name.to_string()));
        }

        assert_eq!(entities.len(), 5);
        assert_eq!(entities[0], (1, "IFCPROJECT".to_string()));
        assert_eq!(entities[1], (2, "IFCUNITASSIGNMENT".to_string()));
        assert_eq!(entities[3], (4, "IFCWALL".to_string()));
    }

    #[test]
    fn test_entity_span_covers_quoted_semicolons() {
        let mut scanner = EntityScanner::new(TEST_IFC);
        let wall = std::iter::from_fn(|| scanner.next_entity())
            .find(|raw| raw.type_name == "IFCWALL")
            .unwrap();
        let text = &TEST_IFC[wall.start..wall.end];
        assert!(text.starts_with("#4=IFCWALL("));
        assert!(text.ends_with(",$);"));
    }

    #[test]
    fn test_index_keeps_first_definition() {
        let index = EntityIndex::build(TEST_IFC);
        assert_eq!(index.len(), 4);
        assert_eq!(
            index.order,
            vec![EntityId(1), EntityId(2), EntityId(3), EntityId(4)]
        );
        assert_eq!(index.ids_of(&IfcType::IfcWall), &[EntityId(4)]);
        assert!(index.ids_of(&IfcType::IfcSlab).is_empty());
    }

    #[test]
    fn test_parse_header() {
        let meta = parse_header(TEST_IFC).unwrap();
        assert_eq!(meta.schema_version, "IFC2X3");
        assert_eq!(meta.file_name.as_deref(), Some("test.ifc"));
        assert_eq!(meta.author.as_deref(), Some("Author"));
        assert_eq!(meta.organization.as_deref(), Some("Org"));
        assert_eq!(meta.originating_system.as_deref(), Some("App"));
    }

    #[test]
    fn test_header_rejects_other_formats() {
        assert!(matches!(
            parse_header("PK\u{3}\u{4} not a step file"),
            Err(ParseError::InvalidFormat(_))
        ));
        let cad = TEST_IFC.replace("'IFC2X3'", "'AP214'");
        assert!(matches!(
            parse_header(&cad),
            Err(ParseError::UnsupportedSchema(s)) if s == "AP214"
        ));
    }
}
