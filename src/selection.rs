//! Which damage is highlighted on the dashboard.
//!
//! One selection is shared by the image overlay and the damage list: a click
//! in either writes it, and both read it to decide what to highlight. Last
//! writer wins.

use std::sync::{Arc, Mutex};

use tracing::debug;

use crate::api::AnalysisRecord;

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SelectionState {
    selected_damage_id: Option<String>,
}

impl SelectionState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Select a damage. There is no deselect; selecting replaces.
    pub fn select(&mut self, damage_id: &str) {
        debug!("Selected damage {}", damage_id);
        self.selected_damage_id = Some(damage_id.to_string());
    }

    /// Auto-select the first damage when a record loads, unless the current
    /// selection still names a damage in that record.
    pub fn on_analysis_loaded(&mut self, record: &AnalysisRecord) {
        let still_valid = self
            .selected_damage_id
            .as_deref()
            .is_some_and(|id| record.damage(id).is_some());
        if still_valid {
            return;
        }
        self.selected_damage_id = record.first_damage_id().map(str::to_string);
    }

    pub fn selected(&self) -> Option<&str> {
        self.selected_damage_id.as_deref()
    }

    pub fn is_selected(&self, damage_id: &str) -> bool {
        self.selected() == Some(damage_id)
    }
}

/// Cloneable handle to one [`SelectionState`], held by every sub-view.
#[derive(Debug, Clone, Default)]
pub struct SharedSelection {
    inner: Arc<Mutex<SelectionState>>,
}

impl SharedSelection {
    pub fn new() -> Self {
        Self::default()
    }

    fn with<R>(&self, f: impl FnOnce(&mut SelectionState) -> R) -> R {
        let mut state = self.inner.lock().unwrap_or_else(|e| e.into_inner());
        f(&mut state)
    }

    pub fn select(&self, damage_id: &str) {
        self.with(|s| s.select(damage_id))
    }

    pub fn on_analysis_loaded(&self, record: &AnalysisRecord) {
        self.with(|s| s.on_analysis_loaded(record))
    }

    pub fn selected(&self) -> Option<String> {
        self.with(|s| s.selected().map(str::to_string))
    }

    pub fn is_selected(&self, damage_id: &str) -> bool {
        self.with(|s| s.is_selected(damage_id))
    }

    /// Forget the selection, e.g. when the page switches analysis.
    pub fn clear(&self) {
        self.with(|s| s.selected_damage_id = None)
    }
}
