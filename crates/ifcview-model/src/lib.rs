// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! ifcview-model - shared types and backend traits for the IFC offline viewer
//!
//! Everything above the parser talks to a loaded model through the traits in
//! this crate, so the extraction passes, the record loader and the export code
//! never depend on a concrete STEP implementation.
//!
//! # Architecture
//!
//! - [`IfcParser`] - turns file content into a model
//! - [`IfcModel`] - read-only access to one loaded model
//! - [`EntityResolver`] - handle enumeration and entity decoding
//! - [`PropertyReader`] - property sets, quantities, materials and types
//! - [`SpatialQuery`] - spatial hierarchy and storeys
//!
//! Lookups that can fail for a single element return [`Result`], so callers
//! decide whether a failure is fatal or only means "no data".
//!
//! # Example
//!
//! ```ignore
//! use ifcview_model::{IfcParser, EntityId};
//!
//! let model = parser.parse(content)?;
//! let wall = model.resolver().get(EntityId(42))?;
//! println!("{} is an {}", wall.id, wall.ifc_type);
//! ```

pub mod attributes;
pub mod error;
pub mod properties;
pub mod spatial;
pub mod traits;
pub mod types;

pub use attributes::*;
pub use error::*;
pub use properties::*;
pub use spatial::*;
pub use traits::*;
pub use types::*;
