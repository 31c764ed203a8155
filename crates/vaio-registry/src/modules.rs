//! Module registry: which modules exist.
//!
//! Initialization tries three sources in order and stops at the first that
//! yields modules:
//!
//! 1. the durable module cache, when fresh and non-empty,
//! 2. the compiled-in [`ModuleCatalog`],
//! 3. the backend module list.
//!
//! If all of them fail the registry stays uninitialized and
//! [`RegistryError::InitializationExhausted`] lists why.

use std::sync::Arc;
use std::time::Duration;

use parking_lot::RwLock;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};
use vaio_proto::{ModuleRecord, ModuleType, ModulesByType, parse_pane_id};
use vaio_storage::{LocalCache, MODULE_CACHE_MAX_AGE, ModuleApi};

use crate::catalog::{ModuleCatalog, ModuleDefinition};
use crate::component::ComponentLoader;
use crate::error::{InitStrategy, LoadError, RegistryError, StrategyFailure};

fn failed(strategy: InitStrategy, reason: String) -> StrategyFailure {
    warn!(strategy = %strategy, reason = %reason, "module source unavailable");
    StrategyFailure { strategy, reason }
}

/// Result of [`ModuleRegistry::refresh_from_backend`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RefreshOutcome {
    /// Whether the backend answered and the registry was replaced.
    pub success: bool,
    /// Number of modules known after the call.
    pub total: usize,
}

/// Registry of known modules.
pub struct ModuleRegistry {
    catalog: ModuleCatalog,
    cache: Option<LocalCache>,
    backend: Option<Arc<dyn ModuleApi>>,
    cache_max_age: Duration,
    modules: RwLock<Option<ModulesByType<ModuleDefinition>>>,
    init_lock: Mutex<()>,
}

impl std::fmt::Debug for ModuleRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ModuleRegistry")
            .field("catalog", &self.catalog.len())
            .field("cache", &self.cache.is_some())
            .field("backend", &self.backend.is_some())
            .field("initialized", &self.is_initialized())
            .finish()
    }
}

impl ModuleRegistry {
    /// Registry over a compiled-in catalog, with no cache or backend.
    #[must_use]
    pub fn new(catalog: ModuleCatalog) -> Self {
        Self {
            catalog,
            cache: None,
            backend: None,
            cache_max_age: MODULE_CACHE_MAX_AGE,
            modules: RwLock::new(None),
            init_lock: Mutex::new(()),
        }
    }

    /// Use a durable module cache.
    #[must_use]
    pub fn with_cache(mut self, cache: LocalCache) -> Self {
        self.cache = Some(cache);
        self
    }

    /// Use a backend module source.
    #[must_use]
    pub fn with_backend(mut self, backend: Arc<dyn ModuleApi>) -> Self {
        self.backend = Some(backend);
        self
    }

    /// Age after which cached modules are ignored.
    #[must_use]
    pub const fn with_cache_max_age(mut self, max_age: Duration) -> Self {
        self.cache_max_age = max_age;
        self
    }

    /// The compiled-in catalog.
    #[must_use]
    pub const fn catalog(&self) -> &ModuleCatalog {
        &self.catalog
    }

    /// Whether a source has populated the registry.
    #[must_use]
    pub fn is_initialized(&self) -> bool {
        self.modules.read().is_some()
    }

    /// Populate the registry.
    ///
    /// Returns immediately when already initialized, unless `force_refresh`
    /// is set, in which case the cache is skipped. Concurrent callers wait
    /// for the first one to finish.
    ///
    /// # Errors
    ///
    /// Returns [`RegistryError::InitializationExhausted`] when no source
    /// produced modules.
    pub async fn initialize(&self, force_refresh: bool) -> Result<(), RegistryError> {
        let _guard = self.init_lock.lock().await;
        if !force_refresh && self.is_initialized() {
            return Ok(());
        }

        let mut failures = Vec::new();

        if force_refresh {
            debug!("forced refresh, skipping module cache");
        } else {
            match self.cached_modules() {
                Ok(modules) => {
                    self.install(InitStrategy::Cache, modules, false);
                    return Ok(());
                }
                Err(reason) => failures.push(failed(InitStrategy::Cache, reason)),
            }
        }

        match self.catalog_modules() {
            Ok(modules) => {
                self.install(InitStrategy::StaticDiscovery, modules, true);
                return Ok(());
            }
            Err(reason) => failures.push(failed(InitStrategy::StaticDiscovery, reason)),
        }

        match self.backend_modules().await {
            Ok(modules) => {
                self.install(InitStrategy::Backend, modules, true);
                return Ok(());
            }
            Err(reason) => failures.push(failed(InitStrategy::Backend, reason)),
        }

        Err(RegistryError::InitializationExhausted { failures })
    }

    fn cached_modules(&self) -> Result<ModulesByType<ModuleDefinition>, String> {
        let cache = self.cache.as_ref().ok_or("no cache configured")?;
        let entry = cache.load_module_cache().ok_or("no cached modules")?;
        if !entry.is_fresh(self.cache_max_age) {
            return Err(format!("cache from {} is stale", entry.timestamp));
        }
        if entry.data.is_empty() {
            return Err("cached module list is empty".to_string());
        }
        Ok(entry.data.map(|record| self.catalog.bind(record)))
    }

    fn catalog_modules(&self) -> Result<ModulesByType<ModuleDefinition>, String> {
        if self.catalog.is_empty() {
            return Err("no compiled-in modules".to_string());
        }
        let mut modules = ModulesByType::default();
        for definition in self.catalog.definitions() {
            modules.get_mut(definition.module_type).push(definition.clone());
        }
        Ok(modules)
    }

    async fn backend_modules(&self) -> Result<ModulesByType<ModuleDefinition>, String> {
        let backend = self.backend.as_ref().ok_or("no backend configured")?;
        let records = backend.list_modules(None).await.map_err(|e| e.to_string())?;
        if records.is_empty() {
            return Err("backend returned no modules".to_string());
        }
        Ok(self.bind_all(records))
    }

    fn bind_all(&self, records: Vec<ModuleRecord>) -> ModulesByType<ModuleDefinition> {
        ModulesByType::from_records(records).map(|record| self.catalog.bind(record))
    }

    fn install(
        &self,
        strategy: InitStrategy,
        modules: ModulesByType<ModuleDefinition>,
        write_cache: bool,
    ) {
        info!(strategy = %strategy, total = modules.total(), "module registry initialized");
        if write_cache {
            self.write_cache(&modules);
        }
        *self.modules.write() = Some(modules);
    }

    fn write_cache(&self, modules: &ModulesByType<ModuleDefinition>) {
        if let Some(cache) = &self.cache {
            if let Err(e) = cache.save_module_cache(&modules.map(ModuleDefinition::to_record)) {
                warn!(error = %e, "failed to write module cache");
            }
        }
    }

    /// Module of this type matching `identifier` by static identifier or
    /// module name.
    #[must_use]
    pub fn find_module(
        &self,
        module_type: ModuleType,
        identifier: &str,
    ) -> Option<ModuleDefinition> {
        self.modules
            .read()
            .as_ref()?
            .get(module_type)
            .iter()
            .find(|d| d.matches(identifier))
            .cloned()
    }

    /// Every known module, grouped by type. Empty groups when uninitialized.
    #[must_use]
    pub fn get_all_modules(&self) -> ModulesByType<ModuleDefinition> {
        self.modules.read().clone().unwrap_or_default()
    }

    /// Serializable form of every known module.
    #[must_use]
    pub fn records(&self) -> ModulesByType<ModuleRecord> {
        self.modules
            .read()
            .as_ref()
            .map(|m| m.map(ModuleDefinition::to_record))
            .unwrap_or_default()
    }

    /// Replace every module with the backend's list.
    ///
    /// On failure nothing changes.
    pub async fn refresh_from_backend(&self) -> RefreshOutcome {
        let current = || self.modules.read().as_ref().map_or(0, ModulesByType::total);

        let Some(backend) = &self.backend else {
            warn!("module refresh requested without a backend");
            return RefreshOutcome {
                success: false,
                total: current(),
            };
        };

        match backend.list_modules(None).await {
            Ok(records) => {
                let modules = self.bind_all(records);
                let total = modules.total();
                self.write_cache(&modules);
                *self.modules.write() = Some(modules);
                info!(total, "module registry refreshed from backend");
                RefreshOutcome { success: true, total }
            }
            Err(e) => {
                warn!(error = %e, "module refresh failed");
                RefreshOutcome {
                    success: false,
                    total: current(),
                }
            }
        }
    }

    /// Category of a base key or pane id. Unknown keys are USER.
    #[must_use]
    pub fn module_type_of(key: &str) -> ModuleType {
        parse_pane_id(key).map_or(ModuleType::User, |p| p.module_type)
    }

    /// Component loader for a module.
    ///
    /// Falls back to the compiled-in catalog when the module is not (yet)
    /// registered.
    ///
    /// # Errors
    ///
    /// [`LoadError::ModuleNotFound`] if nothing matches,
    /// [`LoadError::NoLoader`] if the module has no local implementation.
    pub fn loader_for(
        &self,
        module_type: ModuleType,
        static_identifier: &str,
    ) -> Result<ComponentLoader, LoadError> {
        if let Some(definition) = self.find_module(module_type, static_identifier) {
            return definition.loader.ok_or_else(|| {
                LoadError::NoLoader(format!("{}-{}", module_type, definition.static_identifier))
            });
        }
        self.catalog
            .loader_for(module_type, static_identifier)
            .ok_or_else(|| LoadError::ModuleNotFound {
                module_type,
                static_identifier: static_identifier.to_string(),
            })
    }
}
