//! Component registry: which component renders which pane.
//!
//! Each key moves through `unregistered -> loading -> registered | errored`.
//! Concurrent loads of one key share a single in-flight future, so the
//! loader runs once and every caller gets the same component. Failures are
//! recorded per key and reported as `None`; nothing here returns an error.

use std::collections::{BTreeMap, HashMap, HashSet};
use std::panic::AssertUnwindSafe;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use futures::FutureExt;
use futures::future::Shared;
use parking_lot::Mutex;
use serde::Serialize;
use tracing::{debug, info, warn};
use vaio_proto::{ModuleType, PaneId, create_pane_id, parse_pane_id, segment_count};
use vaio_storage::BoxFuture;

use crate::component::{ComponentRef, ComponentResolver};
use crate::error::LoadError;
use crate::events::{
    ChangeReason, ListenerId, Listeners, RegistryEvent, RegistryEventKind, panic_message,
};
use crate::modules::ModuleRegistry;

/// The last failed load of a key.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LoadErrorRecord {
    /// Error text.
    pub message: String,
    /// When the load failed.
    pub timestamp: DateTime<Utc>,
}

type SharedLoad = Shared<BoxFuture<'static, Option<ComponentRef>>>;

#[derive(Default)]
struct State {
    components: HashMap<String, ComponentRef>,
    errors: BTreeMap<String, LoadErrorRecord>,
    loading: HashMap<String, SharedLoad>,
    logo_urls: HashMap<String, String>,
}

struct Inner {
    modules: Arc<ModuleRegistry>,
    resolver: Option<Arc<dyn ComponentResolver>>,
    state: Mutex<State>,
    listeners: Listeners,
}

/// Registry of loaded pane components. Cheap to clone.
#[derive(Clone)]
pub struct ComponentRegistry {
    inner: Arc<Inner>,
}

impl std::fmt::Debug for ComponentRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let state = self.inner.state.lock();
        f.debug_struct("ComponentRegistry")
            .field("components", &state.components.len())
            .field("errors", &state.errors.len())
            .field("loading", &state.loading.len())
            .finish_non_exhaustive()
    }
}

/// Canonical form of a registry key. Unparseable keys are kept verbatim.
fn registry_key(key: &str) -> String {
    parse_pane_id(key).map_or_else(
        || key.to_string(),
        |p| create_pane_id(p.module_type.as_str(), &p.static_identifier, p.instance_id.as_deref()),
    )
}

impl ComponentRegistry {
    /// Registry that loads through the module registry.
    #[must_use]
    pub fn new(modules: Arc<ModuleRegistry>) -> Self {
        Self::build(modules, None)
    }

    /// Registry that asks `resolver` for components.
    #[must_use]
    pub fn with_resolver(
        modules: Arc<ModuleRegistry>,
        resolver: Arc<dyn ComponentResolver>,
    ) -> Self {
        Self::build(modules, Some(resolver))
    }

    fn build(modules: Arc<ModuleRegistry>, resolver: Option<Arc<dyn ComponentResolver>>) -> Self {
        Self {
            inner: Arc::new(Inner {
                modules,
                resolver,
                state: Mutex::new(State::default()),
                listeners: Listeners::default(),
            }),
        }
    }

    /// The module registry components are looked up in.
    #[must_use]
    pub fn modules(&self) -> &Arc<ModuleRegistry> {
        &self.inner.modules
    }

    /// Register `component` under `key`. The first registration wins.
    pub fn register_component(
        &self,
        key: &str,
        component: ComponentRef,
        module_type: ModuleType,
    ) -> bool {
        let key = registry_key(key);
        let inserted = insert_if_absent(&mut self.inner.state.lock(), &key, component);
        if inserted {
            self.announce_registered(key, module_type);
        } else {
            debug!(key = %key, "component already registered");
        }
        inserted
    }

    fn announce_registered(&self, key: String, module_type: ModuleType) {
        info!(key = %key, module_type = %module_type, "component registered");
        self.inner.listeners.emit(&RegistryEvent::ComponentLoaded {
            key: key.clone(),
            module_type,
        });
        self.inner
            .listeners
            .emit(&RegistryEvent::RegistryChanged(ChangeReason::Registered { key }));
    }

    /// Component for a pane, loading it on first use.
    ///
    /// The key is `pane_id` when given, else `TYPE-static_identifier`.
    /// Returns `None` when the load fails; the failure is kept in
    /// [`errors`](Self::errors).
    pub async fn load_component(
        &self,
        module_type: ModuleType,
        static_identifier: &str,
        pane_id: Option<&PaneId>,
    ) -> Option<ComponentRef> {
        let key = pane_id.map_or_else(
            || create_pane_id(module_type.as_str(), static_identifier, None),
            ToString::to_string,
        );

        let load = {
            let mut state = self.inner.state.lock();
            if let Some(component) = state.components.get(&key) {
                return Some(Arc::clone(component));
            }
            if let Some(in_flight) = state.loading.get(&key) {
                debug!(key = %key, "joining in-flight component load");
                in_flight.clone()
            } else {
                state.errors.remove(&key);
                let load = self
                    .start_load(key.clone(), module_type, static_identifier.to_string())
                    .shared();
                state.loading.insert(key, load.clone());
                load
            }
        };

        load.await
    }

    /// Future that resolves, records and un-marks one load. Wrapped in
    /// `Shared`, so it runs once however many callers await it.
    fn start_load(
        &self,
        key: String,
        module_type: ModuleType,
        static_identifier: String,
    ) -> BoxFuture<'static, Option<ComponentRef>> {
        let registry = self.clone();
        Box::pin(async move {
            debug!(key = %key, "loading component");
            let resolved = AssertUnwindSafe(registry.resolve(module_type, &static_identifier))
                .catch_unwind()
                .await
                .unwrap_or_else(|payload| {
                    Err(LoadError::Failed(format!(
                        "loader panicked: {}",
                        panic_message(payload.as_ref())
                    )))
                });

            match resolved {
                Ok(component) => {
                    let (winner, inserted) = {
                        let mut state = registry.inner.state.lock();
                        state.loading.remove(&key);
                        let inserted = insert_if_absent(&mut state, &key, component);
                        (state.components.get(&key).cloned(), inserted)
                    };
                    if inserted {
                        registry.announce_registered(key, module_type);
                    }
                    winner
                }
                Err(e) => {
                    warn!(key = %key, error = %e, "component load failed");
                    let mut state = registry.inner.state.lock();
                    state.loading.remove(&key);
                    state.errors.insert(
                        key,
                        LoadErrorRecord {
                            message: e.to_string(),
                            timestamp: Utc::now(),
                        },
                    );
                    None
                }
            }
        })
    }

    async fn resolve(
        &self,
        module_type: ModuleType,
        static_identifier: &str,
    ) -> Result<ComponentRef, LoadError> {
        if let Some(resolver) = &self.inner.resolver {
            return resolver.resolve(module_type, static_identifier).await;
        }
        let loader = self.inner.modules.loader_for(module_type, static_identifier)?;
        loader.load().await
    }

    /// Remove a per-instance entry. Base keys are never removed.
    pub fn unregister_component(&self, key: &str) -> bool {
        let key = registry_key(key);
        if segment_count(&key) <= 2 {
            warn!(key = %key, "refusing to unregister a base component");
            return false;
        }

        let removed = {
            let mut state = self.inner.state.lock();
            state.errors.remove(&key);
            state.logo_urls.remove(&key);
            state.components.remove(&key).is_some()
        };
        if removed {
            info!(key = %key, "component unregistered");
            self.inner
                .listeners
                .emit(&RegistryEvent::ComponentUnloaded { key: key.clone() });
            self.inner
                .listeners
                .emit(&RegistryEvent::RegistryChanged(ChangeReason::Unregistered { key }));
        }
        removed
    }

    /// Registered component under `key`.
    #[must_use]
    pub fn get_component(&self, key: &str) -> Option<ComponentRef> {
        self.inner.state.lock().components.get(&registry_key(key)).cloned()
    }

    /// Whether a component is registered under `key`.
    #[must_use]
    pub fn has_component(&self, key: &str) -> bool {
        self.inner.state.lock().components.contains_key(&registry_key(key))
    }

    /// Whether a load of `key` is in flight.
    #[must_use]
    pub fn is_loading(&self, key: &str) -> bool {
        self.inner.state.lock().loading.contains_key(&registry_key(key))
    }

    /// Every recorded load failure.
    #[must_use]
    pub fn errors(&self) -> BTreeMap<String, LoadErrorRecord> {
        self.inner.state.lock().errors.clone()
    }

    /// Load failure recorded for `key`.
    #[must_use]
    pub fn error_for(&self, key: &str) -> Option<LoadErrorRecord> {
        self.inner.state.lock().errors.get(&registry_key(key)).cloned()
    }

    /// Forget the failure recorded for `key`.
    pub fn clear_error(&self, key: &str) -> bool {
        self.inner.state.lock().errors.remove(&registry_key(key)).is_some()
    }

    /// Category of a key.
    #[must_use]
    pub fn category_for(&self, key: &str) -> ModuleType {
        ModuleRegistry::module_type_of(key)
    }

    /// Keys of per-instance entries, sorted.
    #[must_use]
    pub fn registered_instance_keys(&self) -> Vec<String> {
        let mut keys: Vec<String> = self
            .inner
            .state
            .lock()
            .components
            .keys()
            .filter(|k| segment_count(k) > 2)
            .cloned()
            .collect();
        keys.sort();
        keys
    }

    /// Drop the entry and error of a pane, then load it again.
    pub async fn reload_component(
        &self,
        module_type: ModuleType,
        static_identifier: &str,
        pane_id: Option<&PaneId>,
    ) -> Option<ComponentRef> {
        let key = pane_id.map_or_else(
            || create_pane_id(module_type.as_str(), static_identifier, None),
            ToString::to_string,
        );
        {
            let mut state = self.inner.state.lock();
            state.components.remove(&key);
            state.errors.remove(&key);
        }
        info!(key = %key, "reloading component");
        self.inner
            .listeners
            .emit(&RegistryEvent::RegistryChanged(ChangeReason::Reloading { key }));
        self.load_component(module_type, static_identifier, pane_id).await
    }

    /// Drop instance entries whose pane is not in `active_modules`.
    ///
    /// Returns the removed keys.
    pub fn sync_active_modules(&self, active_modules: &[String]) -> Vec<String> {
        let active: HashSet<String> = active_modules.iter().map(|m| registry_key(m)).collect();
        let removed: Vec<String> = {
            let mut state = self.inner.state.lock();
            let mut stale: Vec<String> = state
                .components
                .keys()
                .filter(|k| segment_count(k) > 2 && !active.contains(*k))
                .cloned()
                .collect();
            stale.sort();
            for key in &stale {
                state.components.remove(key);
                state.errors.remove(key);
                state.logo_urls.remove(key);
            }
            stale
        };

        if !removed.is_empty() {
            info!(count = removed.len(), "dropped components of inactive panes");
            self.inner
                .listeners
                .emit(&RegistryEvent::RegistryChanged(ChangeReason::ActiveModulesSynced {
                    removed: removed.clone(),
                }));
        }
        removed
    }

    /// Subscribe to one kind of event. `name` identifies the listener in logs.
    pub fn add_listener(
        &self,
        kind: RegistryEventKind,
        name: impl Into<String>,
        callback: impl Fn(&RegistryEvent) + Send + Sync + 'static,
    ) -> ListenerId {
        self.inner.listeners.add(kind, name.into(), callback)
    }

    /// Unsubscribe.
    pub fn remove_listener(&self, id: ListenerId) -> bool {
        self.inner.listeners.remove(id)
    }

    /// Remember a logo for `key`.
    pub fn set_logo_url(&self, key: &str, url: impl Into<String>) {
        self.inner.state.lock().logo_urls.insert(registry_key(key), url.into());
    }

    /// Logo for `key`, falling back to the module's metadata.
    #[must_use]
    pub fn logo_url(&self, key: &str) -> Option<String> {
        let key = registry_key(key);
        if let Some(url) = self.inner.state.lock().logo_urls.get(&key) {
            return Some(url.clone());
        }
        let parsed = parse_pane_id(&key)?;
        self.inner
            .modules
            .find_module(parsed.module_type, &parsed.static_identifier)
            .and_then(|d| d.metadata.logo_url)
    }
}

fn insert_if_absent(state: &mut State, key: &str, component: ComponentRef) -> bool {
    if state.components.contains_key(key) {
        return false;
    }
    state.components.insert(key.to_string(), component);
    state.errors.remove(key);
    true
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::{BuiltinPane, ModuleCatalog};
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn registry() -> ComponentRegistry {
        ComponentRegistry::new(Arc::new(ModuleRegistry::new(ModuleCatalog::builtin())))
    }

    fn pane(name: &str) -> ComponentRef {
        Arc::new(BuiltinPane::new(name, name))
    }

    #[test]
    fn test_first_registration_wins() {
        let registry = registry();
        let first = pane("First");
        assert!(registry.register_component("SYSTEM-Foo", Arc::clone(&first), ModuleType::System));
        assert!(!registry.register_component("SYSTEM-Foo", pane("Second"), ModuleType::System));

        let stored = registry.get_component("SYSTEM-Foo").expect("registered");
        assert!(Arc::ptr_eq(&stored, &first));
    }

    #[test]
    fn test_keys_are_canonical() {
        let registry = registry();
        registry.register_component("system-Foo-ab12c", pane("Foo"), ModuleType::System);
        assert!(registry.has_component("SYSTEM-Foo-ab12c"));
        assert_eq!(registry.registered_instance_keys(), vec!["SYSTEM-Foo-ab12c"]);
    }

    #[test]
    fn test_base_keys_cannot_be_unregistered() {
        let registry = registry();
        registry.register_component("SYSTEM-Foo", pane("Foo"), ModuleType::System);
        registry.register_component("SYSTEM-Foo-ab12c", pane("Foo"), ModuleType::System);

        assert!(!registry.unregister_component("SYSTEM-Foo"));
        assert!(registry.has_component("SYSTEM-Foo"));
        assert!(registry.unregister_component("SYSTEM-Foo-ab12c"));
        assert!(!registry.has_component("SYSTEM-Foo-ab12c"));
        assert!(!registry.unregister_component("SYSTEM-Foo-ab12c"));
    }

    #[tokio::test]
    async fn test_load_through_module_registry() {
        let registry = registry();
        let pane_id = PaneId::parse("SERVICE-NvidiaPane-ab12c").expect("pane");
        let component = registry
            .load_component(ModuleType::Service, "NvidiaPane", Some(&pane_id))
            .await
            .expect("loaded");
        assert_eq!(component.name(), "NvidiaPane");
        assert!(registry.has_component("SERVICE-NvidiaPane-ab12c"));
        assert!(!registry.is_loading("SERVICE-NvidiaPane-ab12c"));
    }

    #[tokio::test]
    async fn test_unknown_module_records_error() {
        let registry = registry();
        let loaded = registry.load_component(ModuleType::User, "GhostPane", None).await;
        assert!(loaded.is_none());

        let record = registry.error_for("USER-GhostPane").expect("error recorded");
        assert!(record.message.contains("not found"));
        assert!(registry.clear_error("USER-GhostPane"));
        assert!(registry.errors().is_empty());
    }

    #[test]
    fn test_sync_active_modules_drops_inactive_instances() {
        let registry = registry();
        registry.register_component("SYSTEM-Foo", pane("Foo"), ModuleType::System);
        registry.register_component("SYSTEM-Foo-aaaaa", pane("Foo"), ModuleType::System);
        registry.register_component("SYSTEM-Foo-bbbbb", pane("Foo"), ModuleType::System);

        let changes = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&changes);
        registry.add_listener(RegistryEventKind::RegistryChanged, "counter", move |event| {
            if matches!(
                event,
                RegistryEvent::RegistryChanged(ChangeReason::ActiveModulesSynced { .. })
            ) {
                counter.fetch_add(1, Ordering::SeqCst);
            }
        });

        let removed = registry.sync_active_modules(&["system-Foo-aaaaa".to_string()]);

        assert_eq!(removed, vec!["SYSTEM-Foo-bbbbb"]);
        assert!(registry.has_component("SYSTEM-Foo"));
        assert!(registry.has_component("SYSTEM-Foo-aaaaa"));
        assert_eq!(changes.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_logo_url_override() {
        let registry = registry();
        assert!(registry.logo_url("SYSTEM-SupervisorPane").is_none());
        registry.set_logo_url("SYSTEM-SupervisorPane", "/logos/cpu.svg");
        assert_eq!(registry.logo_url("system-SupervisorPane").as_deref(), Some("/logos/cpu.svg"));
    }
}
