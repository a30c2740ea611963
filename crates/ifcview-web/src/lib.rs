// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! ifcview web front-end
//!
//! JavaScript API over an [`ifcview_core::Session`]. Index passes run on the
//! page's thread and hand control back to the browser between batches, so
//! the UI stays responsive while a large model loads.

use wasm_bindgen::prelude::*;

mod api;

pub use api::ViewerApi;

/// Initialize the WASM module
#[wasm_bindgen(start)]
pub fn init() {
    console_error_panic_hook::set_once();
    if console_log::init_with_level(log::Level::Info).is_err() {
        web_sys::console::warn_1(&"[ifcview] logger already initialized".into());
    }
}

/// Get the version of ifcview
#[wasm_bindgen]
pub fn version() -> String {
    env!("CARGO_PKG_VERSION").to_string()
}
