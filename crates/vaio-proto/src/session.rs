//! Persisted session state.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::layout::Layouts;

/// The authoritative `{gridLayout, activeModules}` pair.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionState {
    /// Grid layout for every breakpoint.
    #[serde(rename = "gridLayout", alias = "grid_layout", default)]
    pub grid_layout: Layouts,
    /// Pane ids currently rendered, in order.
    #[serde(rename = "activeModules", alias = "active_modules", default)]
    pub active_modules: Vec<String>,
}

impl SessionState {
    /// Create a session state.
    #[must_use]
    pub const fn new(grid_layout: Layouts, active_modules: Vec<String>) -> Self {
        Self {
            grid_layout,
            active_modules,
        }
    }
}

/// The ephemeral-tier session record, including per-pane state blobs.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SessionMirror {
    /// Grid layout for every breakpoint.
    #[serde(rename = "gridLayout", alias = "grid_layout", default)]
    pub grid_layout: Layouts,
    /// Pane ids currently rendered, in order.
    #[serde(rename = "activeModules", alias = "active_modules", default)]
    pub active_modules: Vec<String>,
    /// Opaque per-pane state keyed by pane id.
    #[serde(default)]
    pub pane_states: BTreeMap<String, Value>,
}

impl SessionMirror {
    /// The layout/modules pair without pane state.
    #[must_use]
    pub fn state(&self) -> SessionState {
        SessionState::new(self.grid_layout.clone(), self.active_modules.clone())
    }

    /// Replace the layout/modules pair, keeping pane state.
    pub fn set_state(&mut self, state: SessionState) {
        self.grid_layout = state.grid_layout;
        self.active_modules = state.active_modules;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn session_state_accepts_backend_names() {
        let json = r#"{"grid_layout":{"lg":[]},"active_modules":["SYSTEM-SupervisorPane-ab12c"]}"#;
        let state: SessionState = serde_json::from_str(json).expect("parse");
        assert_eq!(state.active_modules, vec!["SYSTEM-SupervisorPane-ab12c"]);

        let out = serde_json::to_value(&state).expect("serialize");
        assert!(out.get("gridLayout").is_some());
        assert!(out.get("activeModules").is_some());
    }

    #[test]
    fn mirror_keeps_pane_states_across_set_state() {
        let mut mirror = SessionMirror::default();
        mirror
            .pane_states
            .insert("USER-Notes-x1".into(), serde_json::json!({"text": "hi"}));
        mirror.set_state(SessionState::new(Layouts::empty(), vec!["USER-Notes-x1".into()]));

        assert_eq!(mirror.pane_states.len(), 1);
        assert_eq!(mirror.state().active_modules.len(), 1);
    }
}
