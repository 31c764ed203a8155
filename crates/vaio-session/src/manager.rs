//! The session synchronization manager.
//!
//! Session state lives in three tiers. The backend is authoritative; the
//! durable tier survives restarts; the ephemeral tier mirrors the last
//! synced session together with per-pane state. Writes go through all three
//! in that order (ephemeral, durable, backend). A backend failure after the
//! local writes leaves local state ahead until the next successful sync.

use std::sync::Arc;

use parking_lot::Mutex;
use serde_json::Value;
use tracing::{debug, error, info, warn};
use vaio_layout::{normalize_layouts, remove_item_from_all_breakpoints, validate_layout};
use vaio_proto::{Layouts, PaneId, SessionMirror, SessionState};
use vaio_registry::ComponentRegistry;
use vaio_storage::{LocalCache, SessionApi, StorageError};

use crate::config::SessionConfig;
use crate::error::SessionError;
use crate::retry::with_retry;

/// Tier a session was read from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionSource {
    /// The backend.
    Remote,
    /// The durable local tier.
    Durable,
    /// The ephemeral mirror.
    Ephemeral,
}

impl SessionSource {
    /// Lower-case name.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Remote => "remote",
            Self::Durable => "durable",
            Self::Ephemeral => "ephemeral",
        }
    }
}

/// Validate a raw backend session strictly.
///
/// Accepts `gridLayout`/`grid_layout` and `activeModules`/`active_modules`.
/// Nothing is repaired: a missing or malformed field is an error.
pub fn parse_session(raw: &Value) -> Result<SessionState, SessionError> {
    let obj = raw
        .as_object()
        .ok_or_else(|| SessionError::InvalidShape("session is not an object".into()))?;

    let grid = obj
        .get("gridLayout")
        .or_else(|| obj.get("grid_layout"))
        .filter(|v| !v.is_null())
        .ok_or_else(|| SessionError::InvalidShape("missing gridLayout".into()))?;
    if !validate_layout(grid) {
        return Err(SessionError::InvalidShape("gridLayout failed validation".into()));
    }

    let modules = obj
        .get("activeModules")
        .or_else(|| obj.get("active_modules"))
        .and_then(Value::as_array)
        .ok_or_else(|| SessionError::InvalidShape("activeModules must be an array".into()))?
        .iter()
        .map(|m| {
            m.as_str()
                .map(str::to_string)
                .ok_or_else(|| {
                    SessionError::InvalidShape(format!("active module {m} is not a string"))
                })
        })
        .collect::<Result<Vec<_>, _>>()?;

    Ok(SessionState::new(normalize_layouts(grid), modules))
}

fn pane_key(pane_id: &str) -> Result<String, SessionError> {
    PaneId::parse(pane_id)
        .map(|p| p.to_string())
        .map_err(|_| SessionError::InvalidPaneId(pane_id.to_string()))
}

fn log_local(tier: &'static str, what: &'static str, result: Result<(), StorageError>) -> bool {
    match result {
        Ok(()) => true,
        Err(e) => {
            warn!(tier, what, error = %e, "local session write failed");
            false
        }
    }
}

/// Keeps the backend, durable and ephemeral session tiers in step.
pub struct SessionManager {
    api: Arc<dyn SessionApi>,
    ephemeral: LocalCache,
    durable: LocalCache,
    components: Option<ComponentRegistry>,
    config: SessionConfig,
    /// Serializes read-modify-write of the ephemeral mirror.
    mirror_lock: Mutex<()>,
}

impl std::fmt::Debug for SessionManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionManager")
            .field("config", &self.config)
            .field("components", &self.components.is_some())
            .finish_non_exhaustive()
    }
}

impl SessionManager {
    /// Manager over a backend and two local tiers.
    #[must_use]
    pub fn new(api: Arc<dyn SessionApi>, ephemeral: LocalCache, durable: LocalCache) -> Self {
        Self {
            api,
            ephemeral,
            durable,
            components: None,
            config: SessionConfig::default(),
            mirror_lock: Mutex::new(()),
        }
    }

    /// Use `config`.
    #[must_use]
    pub const fn with_config(mut self, config: SessionConfig) -> Self {
        self.config = config;
        self
    }

    /// Tell `components` about every synced active-module list.
    #[must_use]
    pub fn with_components(mut self, components: ComponentRegistry) -> Self {
        self.components = Some(components);
        self
    }

    /// Current settings.
    #[must_use]
    pub const fn config(&self) -> &SessionConfig {
        &self.config
    }

    /// The backend.
    #[must_use]
    pub fn api(&self) -> &Arc<dyn SessionApi> {
        &self.api
    }

    /// The ephemeral tier.
    #[must_use]
    pub const fn ephemeral(&self) -> &LocalCache {
        &self.ephemeral
    }

    /// The durable tier.
    #[must_use]
    pub const fn durable(&self) -> &LocalCache {
        &self.durable
    }

    /// Fetch and validate the backend session, mirroring it to the
    /// ephemeral tier.
    pub async fn sync_session_data(&self) -> Result<SessionState, SessionError> {
        let raw =
            with_retry(&self.config.retry, "fetch_session", || self.api.fetch_session()).await?;
        let state = parse_session(&raw)?;
        self.update_mirror(|mirror| mirror.set_state(state.clone()));
        debug!(
            modules = state.active_modules.len(),
            items = state.grid_layout.item_count(),
            "session fetched"
        );
        Ok(state)
    }

    fn update_mirror(&self, apply: impl FnOnce(&mut SessionMirror)) {
        let _guard = self.mirror_lock.lock();
        let mut mirror = self.ephemeral.load_session().unwrap_or_default();
        apply(&mut mirror);
        log_local("ephemeral", "session", self.ephemeral.save_session(&mirror));
    }

    /// Persist layouts to every tier.
    ///
    /// Layouts are sanitized first. Local failures are logged; the backend
    /// result is returned.
    pub async fn save_layouts(&self, layouts: &Layouts) -> Result<(), SessionError> {
        let layouts = layouts.clone().sanitized();
        log_local("ephemeral", "layouts", self.ephemeral.save_layouts(&layouts));
        self.update_mirror(|mirror| mirror.grid_layout = layouts.clone());
        log_local("durable", "layouts", self.durable.save_layouts(&layouts));

        with_retry(&self.config.retry, "update_grid", || self.api.update_grid(&layouts)).await?;
        debug!(items = layouts.item_count(), "layouts saved");
        Ok(())
    }

    /// Persist the active-module list to every tier.
    pub async fn save_modules(&self, modules: &[String]) -> Result<(), SessionError> {
        log_local("ephemeral", "modules", self.ephemeral.save_active_modules(modules));
        self.update_mirror(|mirror| mirror.active_modules = modules.to_vec());
        log_local("durable", "modules", self.durable.save_active_modules(modules));

        with_retry(&self.config.retry, "update_modules", || {
            self.api.update_modules(modules)
        })
        .await?;
        debug!(count = modules.len(), "modules saved");
        Ok(())
    }

    /// Bootstrap entry: pull the backend session and hand it to the caller.
    ///
    /// On success the setters receive the session, the durable tier is
    /// updated and the component registry drops instances that are no
    /// longer active. On failure only `on_error` is called.
    pub async fn fetch_and_sync_session_data(
        &self,
        set_layout: impl FnOnce(Layouts),
        set_modules: impl FnOnce(Vec<String>),
        on_error: impl FnOnce(SessionError),
        context: &str,
    ) -> bool {
        match self.sync_session_data().await {
            Ok(state) => {
                log_local("durable", "layouts", self.durable.save_layouts(&state.grid_layout));
                log_local(
                    "durable",
                    "modules",
                    self.durable.save_active_modules(&state.active_modules),
                );
                if let Some(components) = &self.components {
                    components.sync_active_modules(&state.active_modules);
                }
                info!(context, modules = state.active_modules.len(), "session synchronized");
                set_layout(state.grid_layout);
                set_modules(state.active_modules);
                true
            }
            Err(e) => {
                error!(context, error = %e, "session synchronization failed");
                on_error(e);
                false
            }
        }
    }

    /// Best available session: backend, then durable, then ephemeral.
    ///
    /// Fails with the backend error when no tier has a session.
    pub async fn read_session(&self) -> Result<(SessionState, SessionSource), SessionError> {
        let remote_err = match self.sync_session_data().await {
            Ok(state) => return Ok((state, SessionSource::Remote)),
            Err(e) => e,
        };
        warn!(error = %remote_err, "backend session unavailable, using local tiers");

        if let Some(state) = self.load_durable_session() {
            return Ok((state, SessionSource::Durable));
        }
        if let Some(state) = self.load_cached_session() {
            return Ok((state, SessionSource::Ephemeral));
        }
        Err(remote_err)
    }

    /// Session held by the durable tier, if any part of it is present.
    #[must_use]
    pub fn load_durable_session(&self) -> Option<SessionState> {
        let layouts = self.durable.load_layouts();
        let modules = self.durable.load_active_modules();
        if layouts.is_none() && modules.is_none() {
            return None;
        }
        Some(SessionState::new(layouts.unwrap_or_default(), modules.unwrap_or_default()))
    }

    /// Session held by the ephemeral mirror.
    #[must_use]
    pub fn load_cached_session(&self) -> Option<SessionState> {
        self.ephemeral.load_session().map(|mirror| mirror.state())
    }

    /// Clear the local tiers and, if asked, the backend session.
    ///
    /// Returns whether the local tiers were cleared. Backend failures are
    /// logged. The durable module cache is left alone.
    pub async fn clear_cached_session(&self, clear_backend: bool) -> bool {
        let mut cleared = log_local("ephemeral", "all", self.ephemeral.store().clear());
        cleared &= log_local("durable", "layouts", self.durable.clear_layouts());
        cleared &= log_local("durable", "modules", self.durable.clear_active_modules());

        if clear_backend {
            if let Err(e) = self.clear_backend_session().await {
                warn!(error = %e, "failed to clear backend session");
            }
        }
        info!(cleared, clear_backend, "cached session cleared");
        cleared
    }

    /// Delete the backend grid and reset it to an empty session.
    pub async fn clear_backend_session(&self) -> Result<(), SessionError> {
        self.api.clear_grid().await?;
        let empty = Layouts::empty();
        if let Err(e) = self.api.update_grid(&empty).await {
            warn!(error = %e, "failed to reset backend grid");
        }
        if let Err(e) = self.api.update_modules(&[]).await {
            warn!(error = %e, "failed to reset backend modules");
        }
        Ok(())
    }

    /// Push the durable tier to the backend.
    pub async fn sync_local_to_backend(&self) -> Result<(), SessionError> {
        if let Some(layouts) = self.durable.load_layouts() {
            log_local("ephemeral", "layouts", self.ephemeral.save_layouts(&layouts));
            with_retry(&self.config.retry, "update_grid", || self.api.update_grid(&layouts)).await?;
        }
        if let Some(modules) = self.durable.load_active_modules() {
            log_local("ephemeral", "modules", self.ephemeral.save_active_modules(&modules));
            with_retry(&self.config.retry, "update_modules", || {
                self.api.update_modules(&modules)
            })
            .await?;
        }
        debug!("local session pushed to backend");
        Ok(())
    }

    /// Store a pane's state on the backend and in the mirror.
    pub async fn save_pane_state(&self, pane_id: &str, state: Value) -> Result<(), SessionError> {
        let key = pane_key(pane_id)?;
        with_retry(&self.config.retry, "put_pane_state", || {
            self.api.put_pane_state(&key, &state)
        })
        .await?;
        self.update_mirror(|mirror| {
            mirror.pane_states.insert(key, state);
        });
        Ok(())
    }

    /// A pane's state, from the backend or, when it is unreachable, the
    /// mirror.
    pub async fn load_pane_state(&self, pane_id: &str) -> Result<Option<Value>, SessionError> {
        let key = pane_key(pane_id)?;
        let fetched = with_retry(&self.config.retry, "get_pane_state", || {
            self.api.get_pane_state(&key)
        })
        .await;
        match fetched {
            Ok(Some(state)) => {
                let cached = state.clone();
                self.update_mirror(|mirror| {
                    mirror.pane_states.insert(key, cached);
                });
                Ok(Some(state))
            }
            Ok(None) => Ok(None),
            Err(e) => {
                let cached = self
                    .ephemeral
                    .load_session()
                    .and_then(|mut mirror| mirror.pane_states.remove(&key));
                match cached {
                    Some(state) => {
                        warn!(pane = %key, error = %e, "using cached pane state");
                        Ok(Some(state))
                    }
                    None => Err(e.into()),
                }
            }
        }
    }

    /// Remove a pane's state from the backend and the mirror.
    pub async fn delete_pane_state(&self, pane_id: &str) -> Result<(), SessionError> {
        let key = pane_key(pane_id)?;
        with_retry(&self.config.retry, "delete_pane_state", || {
            self.api.delete_pane_state(&key)
        })
        .await?;
        self.update_mirror(|mirror| {
            mirror.pane_states.remove(&key);
        });
        Ok(())
    }

    /// Drop a pane from the backend session.
    ///
    /// The backend also removes its layout items and state; the mirror is
    /// updated to match.
    pub async fn remove_module(&self, pane_id: &str) -> Result<(), SessionError> {
        let key = pane_key(pane_id)?;
        with_retry(&self.config.retry, "delete_module", || self.api.delete_module(&key)).await?;
        self.update_mirror(|mirror| {
            mirror.active_modules.retain(|m| m != &key);
            remove_item_from_all_breakpoints(&mut mirror.grid_layout, &key);
            mirror.pane_states.remove(&key);
        });
        info!(pane = %key, "module removed from session");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use test_case::test_case;

    #[test]
    fn test_parse_accepts_both_spellings() {
        let grid = json!({
            "lg": [{"i": "SYSTEM-SupervisorPane-ab12c", "x": 0, "y": 0, "w": 12, "h": 8}]
        });
        let camel = json!({
            "gridLayout": grid,
            "activeModules": ["SYSTEM-SupervisorPane-ab12c"]
        });
        let snake = json!({
            "grid_layout": grid,
            "active_modules": ["SYSTEM-SupervisorPane-ab12c"]
        });
        let a = parse_session(&camel).expect("camel");
        let b = parse_session(&snake).expect("snake");
        assert_eq!(a, b);
        assert_eq!(a.grid_layout.lg.len(), 1);
        assert!(a.grid_layout.xxs.is_empty());
    }

    #[test_case(json!([]) ; "not an object")]
    #[test_case(json!({"activeModules": []}) ; "missing grid")]
    #[test_case(json!({"gridLayout": null, "activeModules": []}) ; "null grid")]
    #[test_case(json!({"gridLayout": {"lg": [{"x": 0}]}, "activeModules": []}) ; "invalid item")]
    #[test_case(json!({"gridLayout": {}}) ; "missing modules")]
    #[test_case(json!({"gridLayout": {}, "activeModules": "SYSTEM-A-1"}) ; "modules not array")]
    #[test_case(json!({"gridLayout": {}, "activeModules": [1]}) ; "module not string")]
    fn test_parse_rejects_malformed(raw: Value) {
        assert!(matches!(parse_session(&raw), Err(SessionError::InvalidShape(_))));
    }

    #[test]
    fn test_pane_key_canonicalizes() {
        assert_eq!(
            pane_key("system-SupervisorPane-ab12c").expect("valid"),
            "SYSTEM-SupervisorPane-ab12c"
        );
        assert!(matches!(pane_key("nope"), Err(SessionError::InvalidPaneId(_))));
    }
}
