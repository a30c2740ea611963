// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! `ViewerApi`, the object the page script talks to

use std::cell::RefCell;
use std::rc::Rc;

use gloo_timers::future::TimeoutFuture;
use ifcview_core::{
    run_async, MemoryAssets, Message, ModelId, Session, ViewerConfig, ViewerError,
};
use ifcview_model::EntityId;
use ifcview_parser::StepParser;
use js_sys::{Function, Promise};
use wasm_bindgen::prelude::*;
use wasm_bindgen_futures::future_to_promise;

fn to_js(err: ViewerError) -> JsValue {
    JsValue::from_str(&err.to_string())
}

/// Browser-side viewer session
///
/// Holds every loaded model. Methods that touch a model take the numeric id
/// returned by `loadModel`.
#[wasm_bindgen]
pub struct ViewerApi {
    session: Rc<RefCell<Session>>,
}

#[wasm_bindgen]
impl ViewerApi {
    /// Create a session, optionally configured from TOML text
    #[wasm_bindgen(constructor)]
    pub fn new(config_toml: Option<String>) -> Result<ViewerApi, JsValue> {
        let config = match config_toml {
            Some(text) => ViewerConfig::from_toml(&text).map_err(to_js)?,
            None => ViewerConfig::default(),
        };
        Ok(Self {
            session: Rc::new(RefCell::new(Session::new(Box::new(StepParser::new()), config))),
        })
    }

    /// Parse and index a model
    ///
    /// Resolves to the model id. `onProgress(done, total)` is called after
    /// every batch; the browser gets a turn between batches.
    #[wasm_bindgen(js_name = loadModel)]
    pub fn load_model(
        &self,
        name: String,
        bytes: Vec<u8>,
        on_progress: Option<Function>,
    ) -> Promise {
        let session = Rc::clone(&self.session);
        future_to_promise(async move {
            let job = session.borrow_mut().begin_load(&name, bytes).map_err(to_js)?;
            let job_id = job.id();

            let sink = Rc::clone(&session);
            let job = job.on_progress(move |done, total| {
                sink.borrow_mut().dispatch(Message::LoadProgress {
                    id: job_id,
                    done,
                    total,
                });
                if let Some(callback) = &on_progress {
                    let _ = callback.call2(
                        &JsValue::NULL,
                        &JsValue::from(done as u32),
                        &JsValue::from(total as u32),
                    );
                }
            });

            match run_async(job, || TimeoutFuture::new(0)).await {
                Ok(indexed) => {
                    let id = session.borrow_mut().finish_load(indexed).map_err(to_js)?;
                    Ok(JsValue::from(id.0))
                }
                Err(e) => Err(to_js(session.borrow_mut().fail_load(job_id, e))),
            }
        })
    }

    /// Cancel every running load
    #[wasm_bindgen(js_name = cancelAll)]
    pub fn cancel_all(&self) {
        self.session.borrow_mut().cancel_all();
    }

    #[wasm_bindgen(js_name = removeModel)]
    pub fn remove_model(&self, id: u32) -> Result<(), JsValue> {
        self.session.borrow_mut().remove(ModelId(id)).map_err(to_js)
    }

    #[wasm_bindgen(js_name = setActive)]
    pub fn set_active(&self, id: u32) -> Result<(), JsValue> {
        self.session.borrow_mut().set_active(ModelId(id)).map_err(to_js)
    }

    /// Flip a model's visibility and return the new value
    #[wasm_bindgen(js_name = toggleVisibility)]
    pub fn toggle_visibility(&self, id: u32) -> Result<bool, JsValue> {
        self.session
            .borrow_mut()
            .toggle_visibility(ModelId(id))
            .map_err(to_js)
    }

    /// Select an element of the active model; `false` if the GlobalId is unknown
    pub fn select(&self, global_id: &str) -> Result<bool, JsValue> {
        let mut session = self.session.borrow_mut();
        let Some(active) = session.state().active else {
            return Ok(false);
        };
        let record = session.select(active, global_id).map_err(to_js)?;
        Ok(record.is_some())
    }

    /// Select by express id, as reported by a pick in the 3D scene
    #[wasm_bindgen(js_name = selectExpressId)]
    pub fn select_express_id(&self, model: u32, express_id: u32) -> Result<bool, JsValue> {
        let record = self
            .session
            .borrow_mut()
            .select_handle(ModelId(model), EntityId(express_id))
            .map_err(to_js)?;
        Ok(record.is_some())
    }

    #[wasm_bindgen(js_name = clearSelection)]
    pub fn clear_selection(&self) {
        self.session.borrow_mut().clear_selection();
    }

    /// Switch the property tab; returns the tab key actually selected
    #[wasm_bindgen(js_name = setTab)]
    pub fn set_tab(&self, key: &str) -> String {
        self.session.borrow_mut().set_tab(key).key().to_string()
    }

    /// Property panel HTML for the current selection and tab
    #[wasm_bindgen(js_name = propertyTable)]
    pub fn property_table(&self) -> String {
        self.session.borrow_mut().property_table()
    }

    /// Full record of the current selection, or `undefined`
    #[wasm_bindgen(js_name = selectedRecord)]
    pub fn selected_record(&self) -> Result<JsValue, JsValue> {
        match self.session.borrow_mut().selected_record() {
            Some(record) => Ok(serde_wasm_bindgen::to_value(&*record)?),
            None => Ok(JsValue::UNDEFINED),
        }
    }

    /// Package every model into an offline archive
    ///
    /// Returns `undefined` when there is nothing to export or packaging
    /// failed; `status` then says why.
    #[wasm_bindgen(js_name = exportArchive)]
    pub fn export_archive(&self, wasm: Vec<u8>, runtime: String) -> Option<Vec<u8>> {
        let mut session = self.session.borrow_mut();
        let assets = export_assets(session.config(), wasm, runtime);
        session.export_archive(&assets)
    }

    /// Render the active model as one self-contained HTML page
    #[wasm_bindgen(js_name = exportSingleHtml)]
    pub fn export_single_html(&self, wasm: Vec<u8>, runtime: String) -> Option<String> {
        let mut session = self.session.borrow_mut();
        let assets = export_assets(session.config(), wasm, runtime);
        session.export_single_html(&assets)
    }

    /// Suggested download name for `exportArchive`
    #[wasm_bindgen(getter, js_name = archiveName)]
    pub fn archive_name(&self) -> String {
        self.session.borrow().config().export.archive_name.clone()
    }

    /// Snapshot of the view state
    pub fn state(&self) -> Result<JsValue, JsValue> {
        Ok(serde_wasm_bindgen::to_value(self.session.borrow().state())?)
    }

    #[wasm_bindgen(getter)]
    pub fn status(&self) -> String {
        self.session.borrow().state().status.clone()
    }

    #[wasm_bindgen(getter, js_name = canExport)]
    pub fn can_export(&self) -> bool {
        self.session.borrow().state().can_export()
    }
}

fn export_assets(config: &ViewerConfig, wasm: Vec<u8>, runtime: String) -> MemoryAssets {
    MemoryAssets::new()
        .with(config.export.wasm_asset.clone(), wasm)
        .with(config.export.runtime_asset.clone(), runtime)
}
