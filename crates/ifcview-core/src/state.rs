// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Viewer state and its pure transitions
//!
//! `ViewerState` is plain data. Every change goes through [`update`], which
//! takes the current state and a [`Message`] and returns the next state
//! without touching anything else.

use crate::tabs::PropertyTab;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Session-local id of a loaded model
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ModelId(pub u32);

impl fmt::Display for ModelId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A model that finished indexing
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct LoadedModel {
    pub id: ModelId,
    pub filename: String,
    pub visible: bool,
    pub element_count: usize,
}

/// A model whose index pass is still running
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct LoadProgress {
    pub id: ModelId,
    pub filename: String,
    pub done: usize,
    pub total: usize,
}

/// Selected element
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Selection {
    pub model: ModelId,
    pub global_id: String,
}

/// Everything the UI renders from
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct ViewerState {
    pub models: Vec<LoadedModel>,
    pub active: Option<ModelId>,
    pub selection: Option<Selection>,
    pub tab: PropertyTab,
    pub loading: Vec<LoadProgress>,
    pub status: String,
}

impl ViewerState {
    pub fn model(&self, id: ModelId) -> Option<&LoadedModel> {
        self.models.iter().find(|m| m.id == id)
    }

    pub fn active_model(&self) -> Option<&LoadedModel> {
        self.active.and_then(|id| self.model(id))
    }

    pub fn is_loading(&self) -> bool {
        !self.loading.is_empty()
    }

    /// Export is offered once at least one model is loaded and nothing is
    /// still indexing
    pub fn can_export(&self) -> bool {
        !self.models.is_empty() && !self.is_loading()
    }
}

/// Intent or event applied to the state
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub enum Message {
    LoadStarted { id: ModelId, filename: String },
    LoadProgress { id: ModelId, done: usize, total: usize },
    LoadFinished { id: ModelId, element_count: usize },
    LoadFailed { id: ModelId, reason: String },
    LoadCancelled { id: ModelId },
    ModelRemoved(ModelId),
    ModelsCleared,
    ActiveChanged(ModelId),
    VisibilityToggled(ModelId),
    ElementSelected { model: ModelId, global_id: String },
    SelectionCleared,
    TabChanged(PropertyTab),
    ExportStarted,
    ExportFinished,
    ExportFailed(String),
    NothingToExport,
    Status(String),
}

/// Apply one message to a state
pub fn update(state: &ViewerState, message: &Message) -> ViewerState {
    let mut next = state.clone();
    match message {
        Message::LoadStarted { id, filename } => {
            next.loading.retain(|p| p.id != *id);
            next.loading.push(LoadProgress {
                id: *id,
                filename: filename.clone(),
                done: 0,
                total: 0,
            });
            next.status = format!("Loading {}...", filename);
        }
        Message::LoadProgress { id, done, total } => {
            if let Some(progress) = next.loading.iter_mut().find(|p| p.id == *id) {
                // progress never moves backwards
                progress.done = progress.done.max(*done);
                progress.total = *total;
                next.status = format!("Indexing IFC... {}/{}", progress.done, total);
            }
        }
        Message::LoadFinished { id, element_count } => {
            if let Some(pos) = next.loading.iter().position(|p| p.id == *id) {
                let progress = next.loading.remove(pos);
                next.models.push(LoadedModel {
                    id: *id,
                    filename: progress.filename,
                    visible: true,
                    element_count: *element_count,
                });
                if next.active.is_none() {
                    next.active = Some(*id);
                }
                next.status.clear();
            }
        }
        Message::LoadFailed { id, reason } => {
            if let Some(pos) = next.loading.iter().position(|p| p.id == *id) {
                let progress = next.loading.remove(pos);
                next.status = format!("Failed to load {}: {}", progress.filename, reason);
            }
        }
        Message::LoadCancelled { id } => {
            next.loading.retain(|p| p.id != *id);
        }
        Message::ModelRemoved(id) => {
            next.models.retain(|m| m.id != *id);
            next.loading.retain(|p| p.id != *id);
            if next.active == Some(*id) {
                next.active = next.models.first().map(|m| m.id);
            }
            if next.selection.as_ref().is_some_and(|s| s.model == *id) {
                next.selection = None;
            }
        }
        Message::ModelsCleared => {
            next.models.clear();
            next.loading.clear();
            next.active = None;
            next.selection = None;
        }
        Message::ActiveChanged(id) => {
            if next.model(*id).is_some() {
                next.active = Some(*id);
            }
        }
        Message::VisibilityToggled(id) => {
            if let Some(model) = next.models.iter_mut().find(|m| m.id == *id) {
                model.visible = !model.visible;
                let hidden = !model.visible;
                if hidden && next.selection.as_ref().is_some_and(|s| s.model == *id) {
                    next.selection = None;
                }
            }
        }
        Message::ElementSelected { model, global_id } => {
            if next.model(*model).is_some() {
                next.selection = Some(Selection {
                    model: *model,
                    global_id: global_id.clone(),
                });
            }
        }
        Message::SelectionCleared => next.selection = None,
        Message::TabChanged(tab) => next.tab = *tab,
        Message::ExportStarted => next.status = "Creating export...".to_string(),
        Message::ExportFinished => next.status = "Export finished.".to_string(),
        Message::ExportFailed(reason) => next.status = format!("Export failed: {}", reason),
        Message::NothingToExport => next.status = "Nothing to export.".to_string(),
        Message::Status(text) => next.status = text.clone(),
    }
    next
}
