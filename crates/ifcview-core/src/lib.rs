// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! ifcview-core - indexing, record loading, viewer state and offline export
//!
//! Works against any backend implementing the `ifcview-model` traits.
//!
//! # Pipeline
//!
//! 1. [`IndexPass`] walks every entity in batches and builds the
//!    [`ElementIndex`] (by GlobalId and by handle)
//! 2. [`RecordLoader`] computes a [`FullRecord`] on first inspection and
//!    memoizes it
//! 3. [`Session`] ties the passes to a [`ViewerState`] through the
//!    [`Dispatcher`]
//! 4. [`Packager`] writes the offline archive, [`VirtualHost`] serves one
//!
//! Passes never block on their own: they return after each batch and the
//! caller decides whether to yield (see [`pass`]).

pub mod cancel;
pub mod config;
pub mod dispatch;
pub mod error;
pub mod export;
pub mod index;
pub mod launcher;
pub mod pass;
pub mod record;
pub mod session;
pub mod spatial_index;
pub mod state;
pub mod tabs;

#[cfg(test)]
mod testing;

pub use cancel::CancellationToken;
pub use config::{load_config_from, ExportConfig, ViewerConfig};
pub use dispatch::{Dispatcher, SubscriptionId};
pub use error::{Result, ViewerError};
pub use export::{
    safe_file_name, AssetSource, BundleEntry, BundleManifest, DirAssets, ExportModel,
    MemoryAssets, Packager,
};
pub use index::{ElementIndex, IndexEntry, IndexPass, IndexStats};
pub use launcher::{content_type_for, Response, VirtualHost};
pub use pass::{run_async, run_blocking, Pass, Step};
pub use record::{FullRecord, LookupCategory, RecordLoader, RecordPass, RecordSet};
pub use session::{IndexedModel, LoadJob, ModelWorkspace, Session};
pub use spatial_index::{AncestorNode, SpatialIndex};
pub use state::{update, LoadedModel, Message, ModelId, ViewerState};
pub use tabs::{render_table, PropertyTab};
