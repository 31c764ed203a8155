//! Grid orchestration.
//!
//! [`Board`] owns the authoritative layout and active module list of one
//! dashboard and drives every change through the session manager, the
//! component registry and the socket channel.

use std::collections::{BTreeMap, VecDeque};
use std::fmt;
use std::panic::{AssertUnwindSafe, catch_unwind};
use std::sync::Arc;

use chrono::{DateTime, Utc};
use futures::future::join_all;
use parking_lot::{Mutex, RwLock};
use serde::Serialize;
use serde_json::Value;
use tokio::sync::broadcast;
use tracing::{debug, error, info, warn};
use vaio_layout::{
    add_item_to_all_breakpoints, normalize_layouts, prune_orphans, remove_item_from_all_breakpoints,
    synchronize_layout_and_modules, validate_layout,
};
use vaio_proto::{
    Breakpoint, Layouts, MetricsNamespace, ModuleType, PaneEventPayload, PaneId, SessionState,
    SocketEvent, generate_unique_instance_id, parse_pane_id,
};
use vaio_registry::{
    ComponentRef, ComponentRegistry, ComponentResolver, LoadErrorRecord, ModuleCatalog,
    ModuleDefinition, ModuleRegistry, RefreshOutcome, RenderContext, panic_message,
};
use vaio_session::{LayoutSaveDebouncer, SessionError, SessionManager, SessionSource};
use vaio_storage::{
    HttpBackend, HttpBackendConfig, JsonFileStore, KeyValueStore, LocalCache, MemoryStore,
    ModuleApi, SessionApi,
};

use crate::config::BoardConfig;
use crate::error::{BoardError, ErrorCategory};
use crate::socket::{ConnectionState, EventTransport, LocalBus, MetricsStore, WsTransport};
use crate::view::{ErrorPanel, PaneBody, PaneView};

/// How many of our own published events are remembered for echo
/// suppression.
const PUBLISHED_MEMORY: usize = 64;

/// Injected collaborators of a [`Board`].
pub struct BoardDeps {
    /// Session endpoints.
    pub session_api: Arc<dyn SessionApi>,
    /// Module catalog endpoints.
    pub module_api: Arc<dyn ModuleApi>,
    /// Per-process tier.
    pub ephemeral: LocalCache,
    /// Tier that survives restarts. Also holds the module cache.
    pub durable: LocalCache,
    /// Socket channel.
    pub transport: Arc<dyn EventTransport>,
    /// Compiled-in modules.
    pub catalog: ModuleCatalog,
    /// Optional component resolver consulted before module loaders.
    pub resolver: Option<Arc<dyn ComponentResolver>>,
}

#[derive(Debug, Clone, Default)]
struct BoardState {
    layouts: Layouts,
    active_modules: Vec<String>,
    source: Option<SessionSource>,
    last_error: Option<String>,
}

/// Snapshot of a board for status output.
#[derive(Debug, Clone, Serialize)]
pub struct BoardStatus {
    /// Where the current session came from.
    pub source: Option<&'static str>,
    /// Active panes in order.
    pub active_modules: Vec<String>,
    /// Layout items across all breakpoints.
    pub layout_items: usize,
    /// Modules known to the registry.
    pub known_modules: usize,
    /// Failed component loads.
    pub component_errors: BTreeMap<String, LoadErrorRecord>,
    /// Socket channel state.
    pub connection: ConnectionState,
    /// Namespaces with a metrics snapshot.
    pub metrics: Vec<MetricsNamespace>,
    /// Most recent orchestration error.
    pub last_error: Option<String>,
}

/// One dashboard.
pub struct Board {
    config: BoardConfig,
    modules: Arc<ModuleRegistry>,
    components: ComponentRegistry,
    session: Arc<SessionManager>,
    module_api: Arc<dyn ModuleApi>,
    debouncer: LayoutSaveDebouncer,
    transport: Arc<dyn EventTransport>,
    metrics: MetricsStore,
    state: RwLock<BoardState>,
    published: Mutex<VecDeque<(&'static str, DateTime<Utc>)>>,
}

impl fmt::Debug for Board {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = self.state.read();
        f.debug_struct("Board")
            .field("backend_url", &self.config.backend_url)
            .field("active_modules", &state.active_modules)
            .field("source", &state.source)
            .field("connection", &self.transport.state())
            .finish_non_exhaustive()
    }
}

impl Board {
    /// Wire a board from configuration: HTTP backend, in-memory ephemeral
    /// tier, file-backed durable tier when `state_dir` is set, and a
    /// websocket channel when `socket_url` is set.
    pub async fn bootstrap(
        config: BoardConfig,
        catalog: ModuleCatalog,
        resolver: Option<Arc<dyn ComponentResolver>>,
    ) -> Result<Self, BoardError> {
        let backend = Arc::new(HttpBackend::new(
            HttpBackendConfig::new(config.backend_url.as_str())
                .with_timeout(config.request_timeout),
        )?);

        let durable_store: Arc<dyn KeyValueStore> = match &config.state_dir {
            Some(dir) => Arc::new(JsonFileStore::open(dir)?),
            None => Arc::new(MemoryStore::new()),
        };
        let transport: Arc<dyn EventTransport> = match &config.socket_url {
            Some(url) => Arc::new(WsTransport::connect(url.as_str(), config.reconnect)),
            None => Arc::new(LocalBus::new()),
        };

        let deps = BoardDeps {
            session_api: Arc::clone(&backend) as Arc<dyn SessionApi>,
            module_api: backend,
            ephemeral: LocalCache::new(Arc::new(MemoryStore::new())),
            durable: LocalCache::new(durable_store),
            transport,
            catalog,
            resolver,
        };
        Self::from_parts(config, deps).await
    }

    /// Build a board from explicit collaborators.
    ///
    /// Fails only when the module registry cannot initialize. A session that
    /// cannot be fetched falls back to the durable tier, then the ephemeral
    /// tier, then an empty board.
    pub async fn from_parts(config: BoardConfig, deps: BoardDeps) -> Result<Self, BoardError> {
        let modules = Arc::new(
            ModuleRegistry::new(deps.catalog)
                .with_cache(deps.durable.clone())
                .with_backend(Arc::clone(&deps.module_api))
                .with_cache_max_age(config.module_cache_max_age),
        );
        modules.initialize(false).await?;

        let components = match deps.resolver {
            Some(resolver) => ComponentRegistry::with_resolver(Arc::clone(&modules), resolver),
            None => ComponentRegistry::new(Arc::clone(&modules)),
        };
        let session = Arc::new(
            SessionManager::new(deps.session_api, deps.ephemeral, deps.durable)
                .with_config(config.session)
                .with_components(components.clone()),
        );

        let (initial, source, fetch_error) = initial_session(&session).await;
        let synced = synchronize_layout_and_modules(&initial.grid_layout, &initial.active_modules);
        let reconciled =
            synced.layouts != initial.grid_layout || synced.modules != initial.active_modules;

        let debouncer = LayoutSaveDebouncer::new(Arc::clone(&session));
        let board = Self {
            config,
            modules,
            components,
            session,
            module_api: deps.module_api,
            debouncer,
            transport: deps.transport,
            metrics: MetricsStore::new(),
            state: RwLock::new(BoardState {
                layouts: synced.layouts.clone(),
                active_modules: synced.modules.clone(),
                source,
                last_error: fetch_error,
            }),
            published: Mutex::new(VecDeque::with_capacity(PUBLISHED_MEMORY)),
        };

        if reconciled {
            info!(modules = synced.modules.len(), "session reconciled with layout");
            board.save_modules_logged(&synced.modules).await;
            board.debouncer.schedule(synced.layouts);
        }
        board.preload().await;

        info!(
            source = source.map_or("none", SessionSource::as_str),
            panes = board.state.read().active_modules.len(),
            "board ready"
        );
        Ok(board)
    }

    async fn preload(&self) {
        let panes: Vec<PaneId> = self
            .active_modules()
            .iter()
            .filter_map(|id| PaneId::parse(id).ok())
            .collect();
        let loads = panes.iter().map(|pane| {
            self.components
                .load_component(pane.module_type(), pane.static_identifier(), Some(pane))
        });
        let loaded = join_all(loads).await.into_iter().flatten().count();
        debug!(loaded, total = panes.len(), "components preloaded");
    }

    /// Board configuration.
    #[must_use]
    pub const fn config(&self) -> &BoardConfig {
        &self.config
    }

    /// Module registry.
    #[must_use]
    pub fn modules(&self) -> &Arc<ModuleRegistry> {
        &self.modules
    }

    /// Component registry.
    #[must_use]
    pub const fn components(&self) -> &ComponentRegistry {
        &self.components
    }

    /// Session manager.
    #[must_use]
    pub fn session(&self) -> &Arc<SessionManager> {
        &self.session
    }

    /// Latest metrics snapshots.
    #[must_use]
    pub const fn metrics(&self) -> &MetricsStore {
        &self.metrics
    }

    /// Current layouts.
    #[must_use]
    pub fn layouts(&self) -> Layouts {
        self.state.read().layouts.clone()
    }

    /// Active panes in order.
    #[must_use]
    pub fn active_modules(&self) -> Vec<String> {
        self.state.read().active_modules.clone()
    }

    /// Where the current session came from; `None` for a fresh board.
    #[must_use]
    pub fn source(&self) -> Option<SessionSource> {
        self.state.read().source
    }

    /// Receive socket events.
    #[must_use]
    pub fn subscribe(&self) -> broadcast::Receiver<SocketEvent> {
        self.transport.subscribe()
    }

    /// Add a new instance of a module to the board.
    pub async fn launch_pane(
        &self,
        module_type: ModuleType,
        static_identifier: &str,
    ) -> Result<PaneId, BoardError> {
        let definition = self
            .modules
            .find_module(module_type, static_identifier)
            .ok_or_else(|| BoardError::ModuleNotFound {
                module_type,
                identifier: static_identifier.to_string(),
            })?;
        let base = PaneId::base(module_type, definition.static_identifier.as_str())?;

        let (pane_id, layouts, modules) = {
            let mut state = self.state.write();
            let instance = generate_unique_instance_id(|candidate| {
                state.active_modules.iter().any(|id| {
                    parse_pane_id(id).and_then(|p| p.instance_id).as_deref() == Some(candidate)
                })
            });
            let pane_id = base.with_instance(instance);
            add_item_to_all_breakpoints(&mut state.layouts, &pane_id);
            state.active_modules.push(pane_id.to_string());
            (pane_id, state.layouts.clone(), state.active_modules.clone())
        };
        info!(pane = %pane_id, "launching pane");

        if self
            .components
            .load_component(module_type, &definition.static_identifier, Some(&pane_id))
            .await
            .is_none()
        {
            warn!(pane = %pane_id, "pane launched without a component");
        }

        self.save_modules_logged(&modules).await;
        self.debouncer.schedule(layouts);
        self.publish(SocketEvent::PaneLaunched(PaneEventPayload::for_pane(&pane_id)));
        Ok(pane_id)
    }

    /// Remove a pane at a user's request.
    pub async fn remove_pane(&self, pane_id: &str) -> Result<(), BoardError> {
        let pane = self.drop_pane(pane_id).await?;
        self.publish(SocketEvent::PaneRemoved(PaneEventPayload::for_pane(&pane)));
        Ok(())
    }

    /// Remove a pane that closed itself.
    pub async fn close_pane(&self, pane_id: &str) -> Result<(), BoardError> {
        let pane = self.drop_pane(pane_id).await?;
        self.publish(SocketEvent::PaneClosed(PaneEventPayload::for_pane(&pane)));
        Ok(())
    }

    async fn drop_pane(&self, pane_id: &str) -> Result<PaneId, BoardError> {
        let pane = PaneId::parse(pane_id)?;
        let key = pane.to_string();

        let (layouts, modules) = {
            let mut state = self.state.write();
            let before = state.active_modules.len();
            state.active_modules.retain(|id| id != &key);
            if state.active_modules.len() == before {
                return Err(BoardError::PaneNotActive(key));
            }
            remove_item_from_all_breakpoints(&mut state.layouts, &key);
            (state.layouts.clone(), state.active_modules.clone())
        };
        info!(pane = %key, "removing pane");

        self.components.unregister_component(&key);
        if let Err(e) = self.session.delete_pane_state(&key).await {
            self.note_error(ErrorCategory::Session, &e);
        }
        if let Err(e) = self.session.remove_module(&key).await {
            self.note_error(ErrorCategory::Session, &e);
        }
        self.save_modules_logged(&modules).await;
        self.debouncer.schedule(layouts);
        Ok(pane)
    }

    /// Replace the layouts with an edited copy, e.g. after a drag.
    ///
    /// Items for panes that are not active are dropped and active panes
    /// missing from a breakpoint get a default item. Returns the stored
    /// layouts.
    pub fn update_layouts(&self, raw: &Value) -> Result<Layouts, BoardError> {
        if !validate_layout(raw) {
            return Err(BoardError::InvalidLayout(
                "expected an object of breakpoint arrays with i, x, y, w, h".to_string(),
            ));
        }
        let layouts = {
            let mut state = self.state.write();
            let pruned = prune_orphans(&normalize_layouts(raw), &state.active_modules);
            let synced = synchronize_layout_and_modules(&pruned, &state.active_modules);
            state.layouts.clone_from(&synced.layouts);
            synced.layouts
        };
        self.debouncer.schedule(layouts.clone());
        self.publish(SocketEvent::LayoutsUpdated(PaneEventPayload::now()));
        Ok(layouts)
    }

    /// Render every active pane in order.
    ///
    /// Components that are not loaded yet are loaded first. A pane whose
    /// component is missing, failed to load or panics while rendering is
    /// replaced by an [`ErrorPanel`]; the other panes are unaffected.
    pub async fn render(&self) -> Vec<PaneView> {
        let (layouts, modules) = {
            let state = self.state.read();
            (state.layouts.clone(), state.active_modules.clone())
        };
        let pane_states = self
            .session
            .ephemeral()
            .load_session()
            .map(|mirror| mirror.pane_states)
            .unwrap_or_default();

        let mut views = Vec::with_capacity(modules.len());
        for id in &modules {
            let item = layouts.get(Breakpoint::Lg).iter().find(|item| &item.i == id);
            let Ok(pane) = PaneId::parse(id) else {
                views.push(PaneView {
                    pane_id: id.clone(),
                    module_type: ModuleRegistry::module_type_of(id),
                    position: item.map(|i| i.position()),
                    size: item.map(|i| i.size()),
                    body: PaneBody::Error(ErrorPanel::ui(format!("invalid pane id {id}"))),
                });
                continue;
            };

            let body = match self.component_for(&pane).await {
                Ok(component) => {
                    let definition =
                        self.modules.find_module(pane.module_type(), pane.static_identifier());
                    let metrics = definition.as_ref().and_then(|d| self.metrics_for(d));
                    let ctx = RenderContext {
                        pane_id: &pane,
                        metrics: metrics.as_ref(),
                        state: pane_states.get(id),
                    };
                    render_isolated(&component, &ctx)
                }
                Err(panel) => PaneBody::Error(panel),
            };

            views.push(PaneView {
                pane_id: id.clone(),
                module_type: pane.module_type(),
                position: item.map(|i| i.position()),
                size: item.map(|i| i.size()),
                body,
            });
        }
        views
    }

    async fn component_for(&self, pane: &PaneId) -> Result<ComponentRef, ErrorPanel> {
        let key = pane.to_string();
        if let Some(component) = self.components.get_component(&key) {
            return Ok(component);
        }
        if let Some(record) = self.components.error_for(&key) {
            return Err(ErrorPanel::ui(record.message));
        }
        if let Some(component) = self
            .components
            .load_component(pane.module_type(), pane.static_identifier(), Some(pane))
            .await
        {
            return Ok(component);
        }
        let message = self
            .components
            .error_for(&key)
            .map_or_else(|| format!("component for {key} is unavailable"), |record| record.message);
        Err(ErrorPanel::ui(message))
    }

    fn metrics_for(&self, definition: &ModuleDefinition) -> Option<Value> {
        let namespace = definition
            .metadata
            .socket_namespace
            .as_deref()
            .and_then(MetricsNamespace::parse)?;
        self.metrics.latest(namespace)
    }

    /// Reload the component of an active pane. Returns whether it loaded.
    pub async fn retry_pane(&self, pane_id: &str) -> Result<bool, BoardError> {
        let pane = PaneId::parse(pane_id)?;
        let key = pane.to_string();
        if !self.state.read().active_modules.contains(&key) {
            return Err(BoardError::PaneNotActive(key));
        }
        let loaded = self
            .components
            .reload_component(pane.module_type(), pane.static_identifier(), Some(&pane))
            .await
            .is_some();
        info!(pane = %key, loaded, "pane retried");
        Ok(loaded)
    }

    /// React to a socket event.
    ///
    /// Metrics are stored; pane and layout events re-pull the session unless
    /// this board published them.
    pub async fn handle_event(&self, event: SocketEvent) -> Result<(), BoardError> {
        match event {
            SocketEvent::MetricsUpdate(update) => {
                self.metrics.record(update);
                Ok(())
            }
            SocketEvent::PaneLaunched(ref payload)
            | SocketEvent::PaneRemoved(ref payload)
            | SocketEvent::PaneClosed(ref payload)
            | SocketEvent::LayoutsUpdated(ref payload) => {
                if self.take_own_echo(event.name(), payload.timestamp) {
                    debug!(event = event.name(), "ignoring own event");
                    return Ok(());
                }
                debug!(event = event.name(), pane = ?payload.pane_id, "remote change, resyncing");
                self.resync().await
            }
        }
    }

    /// Pull the backend session and adopt it.
    ///
    /// The fetched session also replaces the durable tier, so a restart
    /// while the backend is down starts from the latest remote state.
    pub async fn resync(&self) -> Result<(), BoardError> {
        let mut layouts = None;
        let mut modules = None;
        let mut failure = None;
        let fetched = self
            .session
            .fetch_and_sync_session_data(
                |l| layouts = Some(l),
                |m| modules = Some(m),
                |e| failure = Some(e),
                "socket refresh",
            )
            .await;
        if !fetched {
            let err = failure
                .unwrap_or_else(|| SessionError::Unavailable("session refresh failed".into()));
            self.note_error(ErrorCategory::Session, &err);
            return Err(err.into());
        }

        let synced = synchronize_layout_and_modules(
            &layouts.unwrap_or_default(),
            &modules.unwrap_or_default(),
        );
        self.components.sync_active_modules(&synced.modules);
        let mut state = self.state.write();
        state.layouts = synced.layouts;
        state.active_modules = synced.modules;
        state.source = Some(SessionSource::Remote);
        state.last_error = None;
        Ok(())
    }

    /// Push the local tiers' session to the backend.
    pub async fn push_local(&self) -> Result<(), BoardError> {
        self.flush().await?;
        self.session.sync_local_to_backend().await?;
        Ok(())
    }

    /// Empty the board and its local tiers, and the backend session unless
    /// `local_only`. Returns whether the local tiers were cleared.
    pub async fn clear_session(&self, local_only: bool) -> bool {
        // A pending save landing after the clear would restore the layout.
        if let Err(e) = self.flush().await {
            debug!(error = %e, "pending layout save failed before clear");
        }
        let cleared = self.session.clear_cached_session(!local_only).await;
        let removed = self.components.sync_active_modules(&[]);
        *self.state.write() = BoardState::default();
        info!(cleared, components = removed.len(), "board cleared");
        cleared
    }

    /// Restore the backend's default module set and reload the registry.
    pub async fn reset_module_db(&self) -> Result<RefreshOutcome, BoardError> {
        self.module_api.reset_db().await?;
        Ok(self.modules.refresh_from_backend().await)
    }

    /// Remove every backend module and reload the registry.
    pub async fn clear_module_db(&self) -> Result<RefreshOutcome, BoardError> {
        self.module_api.clear_db().await?;
        Ok(self.modules.refresh_from_backend().await)
    }

    /// Save any scheduled layouts now.
    pub async fn flush(&self) -> Result<(), BoardError> {
        self.debouncer.flush().await?;
        Ok(())
    }

    /// Snapshot for status output.
    #[must_use]
    pub fn status(&self) -> BoardStatus {
        let state = self.state.read();
        BoardStatus {
            source: state.source.map(SessionSource::as_str),
            active_modules: state.active_modules.clone(),
            layout_items: state.layouts.item_count(),
            known_modules: self.modules.get_all_modules().total(),
            component_errors: self.components.errors(),
            connection: self.transport.state(),
            metrics: self.metrics.snapshot().into_keys().collect(),
            last_error: state.last_error.clone(),
        }
    }

    fn publish(&self, event: SocketEvent) {
        if let Some(timestamp) = event_timestamp(&event) {
            let mut published = self.published.lock();
            if published.len() == PUBLISHED_MEMORY {
                published.pop_front();
            }
            published.push_back((event.name(), timestamp));
        }
        let name = event.name();
        if let Err(e) = self.transport.publish(event) {
            self.note_error(ErrorCategory::Socket, &e);
        } else {
            debug!(event = name, "event published");
        }
    }

    fn take_own_echo(&self, name: &str, timestamp: DateTime<Utc>) -> bool {
        let mut published = self.published.lock();
        match published.iter().position(|(n, t)| *n == name && *t == timestamp) {
            Some(index) => {
                published.remove(index);
                true
            }
            None => false,
        }
    }

    async fn save_modules_logged(&self, modules: &[String]) {
        if let Err(e) = self.session.save_modules(modules).await {
            self.note_error(ErrorCategory::Session, &e);
        }
    }

    fn note_error(&self, category: ErrorCategory, err: &dyn fmt::Display) {
        error!(category = %category, error = %err, "board operation failed");
        self.state.write().last_error = Some(format!("[{category}] {err}"));
    }
}

fn event_timestamp(event: &SocketEvent) -> Option<DateTime<Utc>> {
    match event {
        SocketEvent::PaneLaunched(p)
        | SocketEvent::PaneRemoved(p)
        | SocketEvent::PaneClosed(p)
        | SocketEvent::LayoutsUpdated(p) => Some(p.timestamp),
        SocketEvent::MetricsUpdate(_) => None,
    }
}

fn render_isolated(component: &ComponentRef, ctx: &RenderContext<'_>) -> PaneBody {
    match catch_unwind(AssertUnwindSafe(|| component.render(ctx))) {
        Ok(view) => PaneBody::Component(view),
        Err(payload) => {
            let message = panic_message(&*payload);
            error!(
                pane = %ctx.pane_id,
                component = component.name(),
                panic = %message,
                "pane render panicked"
            );
            PaneBody::Error(ErrorPanel::ui(format!("{} crashed: {message}", component.name())))
        }
    }
}

async fn initial_session(
    session: &SessionManager,
) -> (SessionState, Option<SessionSource>, Option<String>) {
    let mut layouts = None;
    let mut modules = None;
    let mut failure = None;
    let fetched = session
        .fetch_and_sync_session_data(
            |l| layouts = Some(l),
            |m| modules = Some(m),
            |e| failure = Some(format!("[{}] {e}", ErrorCategory::Session)),
            "bootstrap",
        )
        .await;

    if fetched {
        let state = SessionState::new(layouts.unwrap_or_default(), modules.unwrap_or_default());
        return (state, Some(SessionSource::Remote), None);
    }
    if let Some(state) = session.load_durable_session() {
        warn!("starting from the durable session");
        return (state, Some(SessionSource::Durable), failure);
    }
    if let Some(state) = session.load_cached_session() {
        warn!("starting from the cached session");
        return (state, Some(SessionSource::Ephemeral), failure);
    }
    warn!("no session available, starting empty");
    (SessionState::default(), None, failure)
}
