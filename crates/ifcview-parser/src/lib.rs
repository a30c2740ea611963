// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! ifcview-parser - STEP/IFC parser backend
//!
//! Implements the traits of `ifcview-model` over the text of an IFC file.
//!
//! # Features
//!
//! - **Fast scanning** with `memchr` to index every instance up front
//! - **Lazy decoding** with `nom` combinators, cached per entity
//! - **Relationship indexes** for property sets, quantities, materials and
//!   types, built once at load
//!
//! # Example
//!
//! ```ignore
//! use ifcview_parser::StepParser;
//! use ifcview_model::IfcParser;
//!
//! let model = StepParser::new().parse(ifc_content)?;
//! println!("{} entities", model.resolver().entity_count());
//! ```

mod model;
mod properties;
mod resolver;
mod scanner;
mod spatial;
mod tokenizer;

pub use model::ParsedModel;
pub use scanner::{parse_header, EntityIndex, EntityScanner, RawEntity};
pub use tokenizer::{decode_step_string, parse_entity, Token};

use ifcview_model::{IfcModel, IfcParser, Result};
use std::sync::Arc;

/// STEP parser implementing [`IfcParser`]
#[derive(Clone, Debug)]
pub struct StepParser {
    /// Whether to build the spatial tree at load
    pub build_spatial_tree: bool,
}

impl Default for StepParser {
    fn default() -> Self {
        Self::new()
    }
}

impl StepParser {
    pub fn new() -> Self {
        Self {
            build_spatial_tree: true,
        }
    }

    pub fn with_spatial_tree(mut self, enabled: bool) -> Self {
        self.build_spatial_tree = enabled;
        self
    }
}

impl IfcParser for StepParser {
    fn parse(&self, content: &str) -> Result<Arc<dyn IfcModel>> {
        ParsedModel::parse(content, self.build_spatial_tree)
            .map(|m| Arc::new(m) as Arc<dyn IfcModel>)
    }
}

/// Quick parse with default settings
pub fn parse(content: &str) -> Result<Arc<dyn IfcModel>> {
    StepParser::new().parse(content)
}
