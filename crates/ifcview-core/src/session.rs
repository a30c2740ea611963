// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Viewer session
//!
//! A [`Session`] owns the parser backend, the dispatcher and one workspace
//! per loaded model. Single-model use is the one-model case of the same
//! code path.
//!
//! Loading is split so front-ends can drive the index pass themselves:
//!
//! ```ignore
//! let job = session.begin_load("house.ifc", bytes)?;
//! let job_id = job.id();
//! let model_id = match run_async(job, || yield_to_browser()).await {
//!     Ok(indexed) => session.finish_load(indexed)?,
//!     Err(e) => return Err(session.fail_load(job_id, e)),
//! };
//! ```

use crate::cancel::CancellationToken;
use crate::config::ViewerConfig;
use crate::dispatch::{Dispatcher, SubscriptionId};
use crate::error::{Result, ViewerError};
use crate::export::{AssetSource, ExportModel, Packager};
use crate::index::{ElementIndex, IndexPass};
use crate::pass::{run_blocking, Pass, Step};
use crate::record::{FullRecord, RecordLoader, RecordPass, RecordSet};
use crate::spatial_index::SpatialIndex;
use crate::state::{Message, ModelId, ViewerState};
use crate::tabs::{render_table, PropertyTab};
use ifcview_model::{EntityId, IfcModel, IfcParser};
use rustc_hash::FxHashMap;
use std::sync::Arc;

/// Text shown in the property panel when nothing is selected
pub const NO_SELECTION_HTML: &str =
    r#"<p class="empty">Select an element to see all IFC properties.</p>"#;

/// One loaded model and everything derived from it
pub struct ModelWorkspace {
    id: ModelId,
    filename: String,
    bytes: Vec<u8>,
    loader: RecordLoader,
}

impl ModelWorkspace {
    pub fn id(&self) -> ModelId {
        self.id
    }

    pub fn filename(&self) -> &str {
        &self.filename
    }

    /// Source bytes as loaded
    pub fn bytes(&self) -> &[u8] {
        &self.bytes
    }

    pub fn model(&self) -> &Arc<dyn IfcModel> {
        self.loader.model()
    }

    pub fn index(&self) -> &ElementIndex {
        self.loader.index()
    }

    pub fn spatial(&self) -> &SpatialIndex {
        self.loader.spatial()
    }

    pub fn records(&mut self) -> &mut RecordLoader {
        &mut self.loader
    }
}

/// A parsed model whose index pass has not finished
pub struct LoadJob {
    id: ModelId,
    filename: String,
    bytes: Vec<u8>,
    model: Arc<dyn IfcModel>,
    pass: IndexPass,
}

impl LoadJob {
    pub fn id(&self) -> ModelId {
        self.id
    }

    /// Report `(done, total)` after every batch
    pub fn on_progress(mut self, report: impl FnMut(usize, usize) + 'static) -> Self {
        self.pass = self.pass.on_progress(report);
        self
    }
}

impl Pass for LoadJob {
    type Output = IndexedModel;

    fn step(&mut self) -> Result<Step> {
        self.pass.step()
    }

    fn progress(&self) -> (usize, usize) {
        self.pass.progress()
    }

    fn into_output(self) -> IndexedModel {
        IndexedModel {
            id: self.id,
            filename: self.filename,
            bytes: self.bytes,
            model: self.model,
            index: self.pass.into_output(),
        }
    }
}

/// Output of a finished [`LoadJob`]
pub struct IndexedModel {
    id: ModelId,
    filename: String,
    bytes: Vec<u8>,
    model: Arc<dyn IfcModel>,
    index: ElementIndex,
}

/// Multi-model viewer session
pub struct Session {
    parser: Box<dyn IfcParser>,
    config: ViewerConfig,
    dispatcher: Dispatcher,
    workspaces: Vec<ModelWorkspace>,
    pending: FxHashMap<ModelId, CancellationToken>,
    root_cancel: CancellationToken,
    next_id: u32,
}

impl Session {
    pub fn new(parser: Box<dyn IfcParser>, config: ViewerConfig) -> Self {
        Self {
            parser,
            config,
            dispatcher: Dispatcher::new(),
            workspaces: Vec::new(),
            pending: FxHashMap::default(),
            root_cancel: CancellationToken::new(),
            next_id: 1,
        }
    }

    pub fn config(&self) -> &ViewerConfig {
        &self.config
    }

    pub fn state(&self) -> &ViewerState {
        self.dispatcher.state()
    }

    pub fn dispatch(&mut self, message: Message) {
        self.dispatcher.dispatch(message);
    }

    pub fn subscribe(
        &mut self,
        subscriber: impl FnMut(&ViewerState, &Message) + 'static,
    ) -> SubscriptionId {
        self.dispatcher.subscribe(subscriber)
    }

    pub fn unsubscribe(&mut self, id: SubscriptionId) -> bool {
        self.dispatcher.unsubscribe(id)
    }

    pub fn workspace(&self, id: ModelId) -> Option<&ModelWorkspace> {
        self.workspaces.iter().find(|w| w.id == id)
    }

    pub fn workspace_mut(&mut self, id: ModelId) -> Option<&mut ModelWorkspace> {
        self.workspaces.iter_mut().find(|w| w.id == id)
    }

    pub fn workspaces(&self) -> &[ModelWorkspace] {
        &self.workspaces
    }

    fn require(&self, id: ModelId) -> Result<()> {
        if self.workspace(id).is_some() {
            Ok(())
        } else {
            Err(ViewerError::UnknownModel(id))
        }
    }

    // ---- loading ----

    /// Parse a file and return its index pass
    ///
    /// A parse failure is reported through the status and returned.
    pub fn begin_load(&mut self, filename: &str, bytes: Vec<u8>) -> Result<LoadJob> {
        let id = ModelId(self.next_id);
        self.next_id += 1;
        self.dispatch(Message::LoadStarted {
            id,
            filename: filename.to_string(),
        });
        log::info!("Loading {} as model {}", filename, id);

        let model = match self.parser.parse_bytes(&bytes) {
            Ok(model) => model,
            Err(e) => {
                let err = ViewerError::from(e);
                return Err(self.fail_load(id, err));
            }
        };

        let cancel = self.root_cancel.child();
        self.pending.insert(id, cancel.clone());
        let pass = IndexPass::new(Arc::clone(&model))
            .with_batch_size(self.config.index_batch_size)
            .with_cancel(cancel);

        Ok(LoadJob {
            id,
            filename: filename.to_string(),
            bytes,
            model,
            pass,
        })
    }

    /// Publish a job's current progress to the state
    pub fn report_progress(&mut self, job: &LoadJob) {
        let (done, total) = job.progress();
        self.dispatch(Message::LoadProgress {
            id: job.id,
            done,
            total,
        });
    }

    /// Install an indexed model
    ///
    /// Fails with `Cancelled` if the load was cancelled or its model removed
    /// while the pass was running.
    pub fn finish_load(&mut self, indexed: IndexedModel) -> Result<ModelId> {
        let Some(cancel) = self.pending.remove(&indexed.id) else {
            return Err(ViewerError::Cancelled);
        };
        if cancel.is_cancelled() {
            self.dispatch(Message::LoadCancelled { id: indexed.id });
            return Err(ViewerError::Cancelled);
        }

        let IndexedModel {
            id,
            filename,
            bytes,
            model,
            index,
        } = indexed;
        let element_count = index.len();
        let spatial = SpatialIndex::build(model.spatial());
        let loader = RecordLoader::new(model, Arc::new(index), Arc::new(spatial));
        self.workspaces.push(ModelWorkspace {
            id,
            filename,
            bytes,
            loader,
        });
        self.dispatch(Message::LoadFinished { id, element_count });
        Ok(id)
    }

    /// Record a failed or cancelled load and hand the error back
    pub fn fail_load(&mut self, id: ModelId, err: ViewerError) -> ViewerError {
        self.pending.remove(&id);
        if err.is_cancelled() {
            log::info!("Load of model {} cancelled", id);
            self.dispatch(Message::LoadCancelled { id });
        } else {
            log::error!("Load of model {} failed: {}", id, err);
            self.dispatch(Message::LoadFailed {
                id,
                reason: err.to_string(),
            });
        }
        err
    }

    /// Parse and index a file without yielding
    pub fn load_model(&mut self, filename: &str, bytes: Vec<u8>) -> Result<ModelId> {
        let mut job = self.begin_load(filename, bytes)?;
        loop {
            match job.step() {
                Ok(step) => {
                    self.report_progress(&job);
                    if step == Step::Done {
                        break;
                    }
                }
                Err(e) => return Err(self.fail_load(job.id, e)),
            }
        }
        self.finish_load(job.into_output())
    }

    /// Replace every loaded model with one file
    pub fn open(&mut self, filename: &str, bytes: Vec<u8>) -> Result<ModelId> {
        self.clear();
        self.load_model(filename, bytes)
    }

    /// Cancel every running load
    pub fn cancel_all(&mut self) {
        self.root_cancel.cancel();
        self.root_cancel = CancellationToken::new();
        let ids: Vec<ModelId> = self.pending.drain().map(|(id, _)| id).collect();
        for id in ids {
            self.dispatch(Message::LoadCancelled { id });
        }
    }

    /// Drop every model and cancel running loads
    pub fn clear(&mut self) {
        self.cancel_all();
        self.workspaces.clear();
        self.dispatch(Message::ModelsCleared);
    }

    /// Remove one model, cancelling its load if still running
    pub fn remove(&mut self, id: ModelId) -> Result<()> {
        if let Some(cancel) = self.pending.remove(&id) {
            cancel.cancel();
            self.dispatch(Message::ModelRemoved(id));
            return Ok(());
        }
        self.require(id)?;
        self.workspaces.retain(|w| w.id != id);
        self.dispatch(Message::ModelRemoved(id));
        Ok(())
    }

    // ---- selection and panel ----

    pub fn set_active(&mut self, id: ModelId) -> Result<()> {
        self.require(id)?;
        self.dispatch(Message::ActiveChanged(id));
        Ok(())
    }

    pub fn toggle_visibility(&mut self, id: ModelId) -> Result<bool> {
        self.require(id)?;
        self.dispatch(Message::VisibilityToggled(id));
        Ok(self.state().model(id).is_some_and(|m| m.visible))
    }

    pub fn set_tab(&mut self, key: &str) -> PropertyTab {
        let tab = PropertyTab::parse(key);
        self.dispatch(Message::TabChanged(tab));
        tab
    }

    /// Select an element by GlobalId and load its record
    ///
    /// Unknown GlobalIds leave the selection unchanged and return `None`.
    pub fn select(&mut self, model: ModelId, global_id: &str) -> Result<Option<Arc<FullRecord>>> {
        let workspace = self
            .workspace_mut(model)
            .ok_or(ViewerError::UnknownModel(model))?;
        let Some(record) = workspace.loader.load(global_id) else {
            return Ok(None);
        };
        self.dispatch(Message::ElementSelected {
            model,
            global_id: global_id.to_string(),
        });
        Ok(Some(record))
    }

    /// Select an element by handle, as a 3D pick reports it
    pub fn select_handle(
        &mut self,
        model: ModelId,
        id: EntityId,
    ) -> Result<Option<Arc<FullRecord>>> {
        let global_id = self
            .workspace(model)
            .ok_or(ViewerError::UnknownModel(model))?
            .index()
            .global_id_of(id)
            .map(str::to_string);
        match global_id {
            Some(global_id) => self.select(model, &global_id),
            None => Ok(None),
        }
    }

    pub fn clear_selection(&mut self) {
        self.dispatch(Message::SelectionCleared);
    }

    /// Record of the current selection
    pub fn selected_record(&mut self) -> Option<Arc<FullRecord>> {
        let selection = self.state().selection.clone()?;
        self.workspace_mut(selection.model)?
            .loader
            .load(&selection.global_id)
    }

    /// HTML of the property panel for the current selection and tab
    pub fn property_table(&mut self) -> String {
        let tab = self.state().tab;
        match self.selected_record() {
            Some(record) => render_table(&tab.rows(&record)),
            None => NO_SELECTION_HTML.to_string(),
        }
    }

    /// Bulk-extract every record of a model
    pub fn dump_records(&mut self, id: ModelId) -> Result<RecordSet> {
        let batch_size = self.config.record_batch_size;
        let cancel = self.root_cancel.child();
        let workspace = self.workspace_mut(id).ok_or(ViewerError::UnknownModel(id))?;
        let pass = RecordPass::new(&mut workspace.loader)
            .with_batch_size(batch_size)
            .with_cancel(cancel);
        run_blocking(pass)
    }

    // ---- export ----

    fn export_models(&self) -> Vec<ExportModel<'_>> {
        self.state()
            .models
            .iter()
            .filter_map(|m| {
                self.workspace(m.id).map(|w| ExportModel {
                    filename: &w.filename,
                    bytes: &w.bytes,
                    visible: m.visible,
                })
            })
            .collect()
    }

    /// Package every loaded model into an export archive
    ///
    /// Returns `None` when nothing was exported; the status says why.
    pub fn export_archive(&mut self, assets: &dyn AssetSource) -> Option<Vec<u8>> {
        if self.workspaces.is_empty() {
            self.dispatch(Message::NothingToExport);
            return None;
        }
        self.dispatch(Message::ExportStarted);
        let result = {
            let packager = Packager::new(assets, &self.config.export);
            packager.build_archive(&self.export_models())
        };
        self.finish_export(result)
    }

    /// Render the active model as one self-contained HTML page
    pub fn export_single_html(&mut self, assets: &dyn AssetSource) -> Option<String> {
        let Some(active) = self.state().active else {
            self.dispatch(Message::NothingToExport);
            return None;
        };
        self.dispatch(Message::ExportStarted);
        let result = match self.workspace(active) {
            Some(w) => Packager::new(assets, &self.config.export).single_html(&ExportModel {
                filename: &w.filename,
                bytes: &w.bytes,
                visible: true,
            }),
            None => Err(ViewerError::UnknownModel(active)),
        };
        self.finish_export(result)
    }

    fn finish_export<T>(&mut self, result: Result<T>) -> Option<T> {
        match result {
            Ok(output) => {
                self.dispatch(Message::ExportFinished);
                Some(output)
            }
            Err(ViewerError::NothingToExport) => {
                self.dispatch(Message::NothingToExport);
                None
            }
            Err(e) => {
                log::error!("Export failed: {}", e);
                self.dispatch(Message::ExportFailed(e.to_string()));
                None
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::export::MemoryAssets;
    use crate::pass::run_async;
    use crate::testing::TEST_IFC;
    use ifcview_parser::StepParser;
    use std::cell::RefCell;
    use std::rc::Rc;

    const WALL: &str = "2O2Fr$t4X7Zf8NOew3FLOH";

    fn session() -> Session {
        Session::new(Box::new(StepParser::new()), ViewerConfig::default())
    }

    fn assets() -> MemoryAssets {
        MemoryAssets::new()
            .with("web-ifc.wasm", b"\0asm".to_vec())
            .with("export-bundle.js", "var IFC_EXPORT_APP = {};")
    }

    #[test]
    fn test_load_and_select() {
        let mut session = session();
        let id = session.load_model("house.ifc", TEST_IFC.as_bytes().to_vec()).unwrap();
        let state = session.state();
        assert_eq!(state.active, Some(id));
        assert_eq!(state.models[0].filename, "house.ifc");
        assert!(state.models[0].element_count > 0);
        assert_eq!(state.status, "");

        let record = session.select(id, WALL).unwrap().unwrap();
        assert_eq!(record.attributes.name.as_deref(), Some("Vägg 1"));
        assert_eq!(session.state().selection.as_ref().unwrap().global_id, WALL);

        session.set_tab("Psets");
        let html = session.property_table();
        assert!(html.contains("Pset_WallCommon.IsExternal"));
        session.set_tab("Geometry");
        assert_eq!(session.state().tab, PropertyTab::Summary);
    }

    #[test]
    fn test_select_unknown_keeps_selection() {
        let mut session = session();
        let id = session.load_model("house.ifc", TEST_IFC.as_bytes().to_vec()).unwrap();
        assert!(session.select(id, "0000000000000000000000").unwrap().is_none());
        assert!(session.state().selection.is_none());
        assert_eq!(session.property_table(), NO_SELECTION_HTML);
        assert!(matches!(
            session.select(ModelId(99), WALL),
            Err(ViewerError::UnknownModel(_))
        ));
    }

    #[test]
    fn test_select_by_handle() {
        let mut session = session();
        let id = session.load_model("house.ifc", TEST_IFC.as_bytes().to_vec()).unwrap();
        let record = session.select_handle(id, EntityId(21)).unwrap().unwrap();
        assert_eq!(record.global_id, "1hqIFTRjfV6AWq_bMtnZwI");
        assert!(session.select_handle(id, EntityId(31)).unwrap().is_none());
    }

    #[test]
    fn test_parse_failure_sets_status() {
        let mut session = session();
        let err = session
            .load_model("notes.txt", b"hello".to_vec())
            .unwrap_err();
        assert!(matches!(err, ViewerError::Parse(_)));
        let status = &session.state().status;
        assert!(status.starts_with("Failed to load notes.txt: "), "{}", status);
        assert!(session.state().models.is_empty());
        assert!(!session.state().is_loading());
    }

    #[test]
    fn test_export_with_no_models() {
        let mut session = session();
        assert!(session.export_archive(&assets()).is_none());
        assert_eq!(session.state().status, "Nothing to export.");
    }

    #[test]
    fn test_export_all_models_with_visibility() {
        let mut session = session();
        session.load_model("a.ifc", TEST_IFC.as_bytes().to_vec()).unwrap();
        let b = session.load_model("b b.ifc", TEST_IFC.as_bytes().to_vec()).unwrap();
        assert!(!session.toggle_visibility(b).unwrap());

        let archive = session.export_archive(&assets()).unwrap();
        assert_eq!(session.state().status, "Export finished.");
        let host = crate::launcher::VirtualHost::unpack(&archive, "/__ifc_zip__/").unwrap();
        let bundle = host.serve("/__ifc_zip__/bundle.json").unwrap();
        let manifest: crate::export::BundleManifest =
            serde_json::from_slice(&bundle.body).unwrap();
        assert_eq!(manifest.models.len(), 2);
        assert_eq!(manifest.models[1].ifc_path, "models/1_b_b.ifc");
        assert!(!manifest.models[1].visible);
    }

    #[test]
    fn test_export_missing_asset_sets_status() {
        let mut session = session();
        session.load_model("a.ifc", TEST_IFC.as_bytes().to_vec()).unwrap();
        assert!(session.export_archive(&MemoryAssets::new()).is_none());
        assert_eq!(
            session.state().status,
            "Export failed: Missing export asset: web-ifc.wasm"
        );
    }

    #[test]
    fn test_single_html_uses_active_model() {
        let mut session = session();
        session.load_model("a.ifc", TEST_IFC.as_bytes().to_vec()).unwrap();
        let html = session.export_single_html(&assets()).unwrap();
        assert!(html.contains("<title>a.ifc</title>"));
    }

    #[test]
    fn test_single_html_filename_cannot_close_script() {
        let mut session = session();
        let name = "</script><script>alert(1)</script>.ifc";
        session.load_model(name, TEST_IFC.as_bytes().to_vec()).unwrap();
        let html = session.export_single_html(&assets()).unwrap();
        assert!(!html.contains("<script>alert(1)</script>"));
        assert_eq!(session.state().status, "Export finished.");
    }

    #[test]
    fn test_open_replaces_models() {
        let mut session = session();
        session.load_model("a.ifc", TEST_IFC.as_bytes().to_vec()).unwrap();
        let id = session.open("b.ifc", TEST_IFC.as_bytes().to_vec()).unwrap();
        assert_eq!(session.workspaces().len(), 1);
        assert_eq!(session.state().models.len(), 1);
        assert_eq!(session.state().active, Some(id));
    }

    #[test]
    fn test_remove_running_load_cancels_it() {
        let mut session = session();
        let mut job = session
            .begin_load("a.ifc", TEST_IFC.as_bytes().to_vec())
            .unwrap();
        let id = job.id();
        session.remove(id).unwrap();
        assert!(matches!(job.step(), Err(ViewerError::Cancelled)));
        assert!(!session.state().is_loading());
        assert!(session.workspaces().is_empty());
    }

    #[test]
    fn test_cancel_all_then_load_again() {
        let mut session = session();
        let job = session
            .begin_load("a.ifc", TEST_IFC.as_bytes().to_vec())
            .unwrap();
        session.cancel_all();
        assert!(matches!(run_blocking(job), Err(ViewerError::Cancelled)));
        assert!(session.load_model("b.ifc", TEST_IFC.as_bytes().to_vec()).is_ok());
    }

    #[test]
    fn test_remove_unknown_model() {
        let mut session = session();
        assert!(matches!(
            session.remove(ModelId(5)),
            Err(ViewerError::UnknownModel(ModelId(5)))
        ));
    }

    #[test]
    fn test_dump_records() {
        let mut session = session();
        let id = session.load_model("house.ifc", TEST_IFC.as_bytes().to_vec()).unwrap();
        let records = session.dump_records(id).unwrap();
        assert_eq!(records.len(), session.workspace(id).unwrap().index().len());
        assert!(records.to_json().unwrap().get(WALL).is_some());
    }

    #[tokio::test]
    async fn test_async_load_reports_progress() {
        let session = Rc::new(RefCell::new(Session::new(
            Box::new(StepParser::new()),
            ViewerConfig {
                index_batch_size: 5,
                ..ViewerConfig::default()
            },
        )));
        let job = session
            .borrow_mut()
            .begin_load("house.ifc", TEST_IFC.as_bytes().to_vec())
            .unwrap();
        let id = job.id();
        let sink = Rc::clone(&session);
        let job = job.on_progress(move |done, total| {
            sink.borrow_mut().dispatch(Message::LoadProgress { id, done, total });
        });

        let indexed = run_async(job, || std::future::ready(())).await.unwrap();
        let progress = session.borrow().state().loading[0].clone();
        assert_eq!(progress.done, progress.total);
        session.borrow_mut().finish_load(indexed).unwrap();
        assert!(!session.borrow().state().is_loading());
        assert_eq!(session.borrow().state().models.len(), 1);
    }
}
