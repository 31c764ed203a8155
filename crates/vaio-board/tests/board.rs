//! Board orchestration against in-memory backends.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::time::Duration;

use parking_lot::Mutex;
use serde_json::{Value, json};
use vaio_board::{
    Board, BoardConfig, BoardDeps, BoardError, CommandRunner, Commands, ErrorCategory,
    EventTransport, Format, LocalBus, OutputFormat, PaneBody,
};
use vaio_proto::{
    Breakpoint, Layouts, MetricsNamespace, MetricsUpdate, ModuleDraft, ModuleRecord, ModuleType,
    SocketEvent,
};
use vaio_registry::{
    BuiltinPane, ComponentLoader, ComponentRef, ComponentView, LoadError, ModuleCatalog,
    ModuleDefinition, ModuleMetadata, PaneComponent, RenderContext,
};
use vaio_session::{RetryPolicy, SessionConfig, SessionSource};
use vaio_storage::{
    ApiError, BoxFuture, JsonFileStore, LocalCache, MemoryStore, ModuleApi, SessionApi,
};

const SUPERVISOR: &str = "SYSTEM-SupervisorPane-ab12c";

fn refused(endpoint: &str) -> ApiError {
    ApiError::Transport {
        endpoint: endpoint.into(),
        message: "connection refused".into(),
    }
}

/// Session endpoints that keep the session in a JSON value, the way the
/// backend stores it.
#[derive(Default)]
struct FakeSession {
    session: Mutex<Value>,
    deleted: Mutex<Vec<String>>,
    grid_puts: AtomicUsize,
    fetches: AtomicUsize,
    offline: AtomicBool,
}

impl FakeSession {
    fn with_session(session: Value) -> Arc<Self> {
        let fake = Self::default();
        *fake.session.lock() = session;
        Arc::new(fake)
    }

    fn check(&self, endpoint: &str) -> Result<(), ApiError> {
        if self.offline.load(Ordering::SeqCst) {
            return Err(refused(endpoint));
        }
        Ok(())
    }
}

impl SessionApi for FakeSession {
    fn fetch_session(&self) -> BoxFuture<'_, Result<Value, ApiError>> {
        Box::pin(async move {
            self.fetches.fetch_add(1, Ordering::SeqCst);
            self.check("/api/user/session")?;
            Ok(self.session.lock().clone())
        })
    }

    fn update_grid<'a>(&'a self, layouts: &'a Layouts) -> BoxFuture<'a, Result<(), ApiError>> {
        Box::pin(async move {
            self.check("/api/user/session/grid")?;
            self.grid_puts.fetch_add(1, Ordering::SeqCst);
            let layouts = serde_json::to_value(layouts).map_err(|e| ApiError::Decode {
                endpoint: "/api/user/session/grid".into(),
                message: e.to_string(),
            })?;
            self.session.lock()["grid_layout"] = layouts;
            Ok(())
        })
    }

    fn update_modules<'a>(&'a self, modules: &'a [String]) -> BoxFuture<'a, Result<(), ApiError>> {
        Box::pin(async move {
            self.check("/api/user/session/modules")?;
            self.session.lock()["active_modules"] = json!(modules);
            Ok(())
        })
    }

    fn clear_grid(&self) -> BoxFuture<'_, Result<(), ApiError>> {
        Box::pin(async move {
            self.check("/api/user/session/grid")?;
            *self.session.lock() = json!({"grid_layout": {}, "active_modules": []});
            Ok(())
        })
    }

    fn delete_module<'a>(&'a self, module_id: &'a str) -> BoxFuture<'a, Result<(), ApiError>> {
        Box::pin(async move {
            self.check("/api/user/session/modules")?;
            self.deleted.lock().push(module_id.to_string());
            Ok(())
        })
    }

    fn get_pane_state<'a>(
        &'a self,
        _pane_id: &'a str,
    ) -> BoxFuture<'a, Result<Option<Value>, ApiError>> {
        Box::pin(async { Ok(None) })
    }

    fn put_pane_state<'a>(
        &'a self,
        _pane_id: &'a str,
        _state: &'a Value,
    ) -> BoxFuture<'a, Result<(), ApiError>> {
        Box::pin(async { Ok(()) })
    }

    fn delete_pane_state<'a>(&'a self, _pane_id: &'a str) -> BoxFuture<'a, Result<(), ApiError>> {
        Box::pin(async { Ok(()) })
    }
}

/// Module endpoints with no modules, or unreachable.
#[derive(Default)]
struct FakeModules {
    offline: bool,
    resets: AtomicUsize,
}

impl ModuleApi for FakeModules {
    fn list_modules(
        &self,
        _module_type: Option<ModuleType>,
    ) -> BoxFuture<'_, Result<Vec<ModuleRecord>, ApiError>> {
        Box::pin(async move {
            if self.offline {
                return Err(refused("/api/modules"));
            }
            Ok(vec![ModuleRecord::new(ModuleType::Service, "NvidiaPane", "Nvidia")])
        })
    }

    fn create_module<'a>(
        &'a self,
        _module_type: ModuleType,
        _draft: &'a ModuleDraft,
    ) -> BoxFuture<'a, Result<ModuleRecord, ApiError>> {
        Box::pin(async { Err(refused("/api/modules")) })
    }

    fn update_module<'a>(
        &'a self,
        _module_type: ModuleType,
        _id: i64,
        _draft: &'a ModuleDraft,
    ) -> BoxFuture<'a, Result<ModuleRecord, ApiError>> {
        Box::pin(async { Err(refused("/api/modules")) })
    }

    fn delete_module_definition(
        &self,
        _module_type: ModuleType,
        _id: i64,
    ) -> BoxFuture<'_, Result<(), ApiError>> {
        Box::pin(async { Ok(()) })
    }

    fn reset_db(&self) -> BoxFuture<'_, Result<(), ApiError>> {
        Box::pin(async move {
            self.resets.fetch_add(1, Ordering::SeqCst);
            Ok(())
        })
    }

    fn clear_db(&self) -> BoxFuture<'_, Result<(), ApiError>> {
        Box::pin(async { Ok(()) })
    }
}

struct Exploding;

impl PaneComponent for Exploding {
    fn name(&self) -> &str {
        "ExplodingPane"
    }

    #[allow(clippy::panic)]
    fn render(&self, _ctx: &RenderContext<'_>) -> ComponentView {
        panic!("render exploded");
    }
}

/// Builtin panes plus one that panics when rendered and one whose loader
/// fails while `broken` is set.
fn catalog(broken: &Arc<AtomicBool>) -> ModuleCatalog {
    let exploding: ComponentRef = Arc::new(Exploding);
    let broken = Arc::clone(broken);
    ModuleCatalog::builtin()
        .with(ModuleDefinition::new(
            ModuleType::User,
            "ExplodingPane",
            ModuleMetadata::named("Exploding"),
            ComponentLoader::ready(exploding),
        ))
        .with(ModuleDefinition::new(
            ModuleType::User,
            "FlakyPane",
            ModuleMetadata::named("Flaky"),
            ComponentLoader::new(move || {
                let broken = broken.load(Ordering::SeqCst);
                async move {
                    if broken {
                        return Err(LoadError::Failed("driver missing".into()));
                    }
                    let component: ComponentRef = Arc::new(BuiltinPane::new("FlakyPane", "Flaky"));
                    Ok(component)
                }
            }),
        ))
}

fn config() -> BoardConfig {
    BoardConfig::default().with_session(
        SessionConfig::new()
            .with_retry(RetryPolicy::none())
            .with_debounce_window(Duration::from_millis(20)),
    )
}

struct Harness {
    session: Arc<FakeSession>,
    modules: Arc<FakeModules>,
    bus: LocalBus,
    durable: LocalCache,
    broken: Arc<AtomicBool>,
}

impl Harness {
    fn new(session: Value) -> Self {
        Self {
            session: FakeSession::with_session(session),
            modules: Arc::new(FakeModules::default()),
            bus: LocalBus::new(),
            durable: LocalCache::new(Arc::new(MemoryStore::new())),
            broken: Arc::new(AtomicBool::new(false)),
        }
    }

    async fn board(&self) -> Result<Board, BoardError> {
        self.board_with(catalog(&self.broken)).await
    }

    async fn board_with(&self, catalog: ModuleCatalog) -> Result<Board, BoardError> {
        let deps = BoardDeps {
            session_api: Arc::clone(&self.session) as Arc<dyn SessionApi>,
            module_api: Arc::clone(&self.modules) as Arc<dyn ModuleApi>,
            ephemeral: LocalCache::new(Arc::new(MemoryStore::new())),
            durable: self.durable.clone(),
            transport: Arc::new(self.bus.clone()),
            catalog,
            resolver: None,
        };
        Board::from_parts(config(), deps).await
    }
}

fn backend_session() -> Value {
    json!({
        "grid_layout": {"lg": [{"i": SUPERVISOR, "x": 0, "y": 0, "w": 12, "h": 8}]},
        "active_modules": [SUPERVISOR]
    })
}

#[tokio::test]
async fn test_bootstrap_adopts_and_reconciles_backend_session() {
    let harness = Harness::new(backend_session());
    let board = harness.board().await.expect("board");

    assert_eq!(board.source(), Some(SessionSource::Remote));
    assert_eq!(board.active_modules(), vec![SUPERVISOR.to_string()]);
    let layouts = board.layouts();
    for bp in Breakpoint::ALL {
        assert_eq!(layouts.get(bp).len(), 1, "breakpoint {bp}");
    }

    // The reconciled layout is written back.
    board.flush().await.expect("flush");
    assert_eq!(harness.session.grid_puts.load(Ordering::SeqCst), 1);
    assert!(board.components().has_component(SUPERVISOR));
}

#[tokio::test]
async fn test_bootstrap_falls_back_to_durable_session() {
    let harness = Harness::new(backend_session());
    harness.session.offline.store(true, Ordering::SeqCst);
    harness
        .durable
        .save_active_modules(&[SUPERVISOR.to_string()])
        .expect("seed durable tier");

    let board = harness.board().await.expect("board");

    assert_eq!(board.source(), Some(SessionSource::Durable));
    assert_eq!(board.active_modules(), vec![SUPERVISOR.to_string()]);
    let status = board.status();
    assert!(status.last_error.as_deref().is_some_and(|e| e.starts_with("[SESSION]")));
}

#[tokio::test]
async fn test_bootstrap_without_any_session_starts_empty() {
    let harness = Harness::new(json!({}));
    harness.session.offline.store(true, Ordering::SeqCst);

    let board = harness.board().await.expect("board");

    assert!(board.source().is_none());
    assert!(board.active_modules().is_empty());
    assert!(board.render().await.is_empty());
}

#[tokio::test]
async fn test_bootstrap_fails_when_no_module_source_works() {
    let mut harness = Harness::new(backend_session());
    harness.modules = Arc::new(FakeModules {
        offline: true,
        ..FakeModules::default()
    });

    let err = harness.board_with(ModuleCatalog::new()).await.expect_err("must fail");
    assert!(matches!(err, BoardError::Registry(_)));
    assert_eq!(err.category(), ErrorCategory::System);
}

#[tokio::test]
async fn test_launch_pane_places_item_everywhere_and_publishes() {
    let harness = Harness::new(backend_session());
    let board = harness.board().await.expect("board");
    let mut events = harness.bus.subscribe();

    let pane = board
        .launch_pane(ModuleType::Service, "NvidiaPane")
        .await
        .expect("launch");

    let key = pane.to_string();
    assert!(pane.is_instance());
    assert_eq!(board.active_modules(), vec![SUPERVISOR.to_string(), key.clone()]);
    let layouts = board.layouts();
    for bp in Breakpoint::ALL {
        assert!(layouts.get(bp).iter().any(|item| item.i == key), "breakpoint {bp}");
    }
    assert!(board.components().has_component(&key));

    let SocketEvent::PaneLaunched(payload) = events.recv().await.expect("event") else {
        unreachable!("expected pane:launched");
    };
    assert_eq!(payload.pane_id.as_deref(), Some(key.as_str()));
    assert_eq!(payload.module_type, Some(ModuleType::Service));

    board.flush().await.expect("flush");
    let stored = harness.session.session.lock().clone();
    assert_eq!(stored["active_modules"][1], json!(key));
}

#[tokio::test]
async fn test_launch_gives_each_instance_its_own_id() {
    let harness = Harness::new(backend_session());
    let board = harness.board().await.expect("board");

    let first = board.launch_pane(ModuleType::Service, "NvidiaPane").await.expect("first");
    let second = board.launch_pane(ModuleType::Service, "NvidiaPane").await.expect("second");

    assert_ne!(first, second);
    assert_eq!(first.base_key(), second.base_key());
}

#[tokio::test]
async fn test_launch_unknown_module_is_rejected() {
    let harness = Harness::new(backend_session());
    let board = harness.board().await.expect("board");

    let err = board
        .launch_pane(ModuleType::User, "MissingPane")
        .await
        .expect_err("unknown module");
    assert!(matches!(err, BoardError::ModuleNotFound { .. }));
    assert_eq!(board.active_modules().len(), 1);
}

#[tokio::test]
async fn test_remove_pane_cleans_every_layer() {
    let harness = Harness::new(backend_session());
    let board = harness.board().await.expect("board");
    let pane = board.launch_pane(ModuleType::Service, "NvidiaPane").await.expect("launch");
    let key = pane.to_string();
    let mut events = harness.bus.subscribe();

    board.remove_pane(&key).await.expect("remove");

    assert_eq!(board.active_modules(), vec![SUPERVISOR.to_string()]);
    assert_eq!(board.layouts().item_count(), 5);
    assert!(!board.components().has_component(&key));
    assert_eq!(harness.session.deleted.lock().as_slice(), [key.clone()]);
    assert_eq!(events.recv().await.expect("event").name(), "pane:removed");

    let again = board.remove_pane(&key).await.expect_err("already removed");
    assert!(matches!(again, BoardError::PaneNotActive(_)));
    assert_eq!(again.category(), ErrorCategory::Ui);
}

#[tokio::test]
async fn test_close_pane_publishes_closed() {
    let harness = Harness::new(backend_session());
    let board = harness.board().await.expect("board");
    let mut events = harness.bus.subscribe();

    board.close_pane(SUPERVISOR).await.expect("close");

    assert!(board.active_modules().is_empty());
    assert_eq!(events.recv().await.expect("event").name(), "pane:closed");
}

#[tokio::test]
async fn test_update_layouts_prunes_and_fills() {
    let harness = Harness::new(backend_session());
    let board = harness.board().await.expect("board");
    let mut events = harness.bus.subscribe();

    let stored = board
        .update_layouts(&json!({
            "lg": [
                {"i": SUPERVISOR, "x": 0, "y": 4, "w": 6, "h": 6},
                {"i": "USER-GhostPane-zz999", "x": 6, "y": 0, "w": 6, "h": 6}
            ]
        }))
        .expect("update");

    let lg = stored.get(Breakpoint::Lg);
    assert_eq!(lg.len(), 1);
    assert_eq!((lg[0].y, lg[0].w), (4, 6));
    for bp in Breakpoint::ALL {
        assert_eq!(stored.get(bp).len(), 1, "breakpoint {bp}");
    }
    assert_eq!(board.layouts(), stored);
    assert_eq!(events.recv().await.expect("event").name(), "layouts:updated");

    let err = board
        .update_layouts(&json!({"lg": [{"i": SUPERVISOR}]}))
        .expect_err("invalid");
    assert!(matches!(err, BoardError::InvalidLayout(_)));
    assert_eq!(board.layouts(), stored);
}

#[tokio::test]
async fn test_render_isolates_failing_panes() {
    let harness = Harness::new(backend_session());
    harness.broken.store(true, Ordering::SeqCst);
    let board = harness.board().await.expect("board");

    let nvidia = board.launch_pane(ModuleType::Service, "NvidiaPane").await.expect("nvidia");
    let exploding = board.launch_pane(ModuleType::User, "ExplodingPane").await.expect("exploding");
    let flaky = board.launch_pane(ModuleType::User, "FlakyPane").await.expect("flaky");

    board
        .handle_event(SocketEvent::MetricsUpdate(MetricsUpdate {
            namespace: MetricsNamespace::Gpu,
            data: json!({"utilization": 73}),
        }))
        .await
        .expect("metrics");

    let views = board.render().await;
    assert_eq!(views.len(), 4);
    assert_eq!(views[0].pane_id, SUPERVISOR);
    assert!(views[0].position.is_some());

    let PaneBody::Component(view) = &views[1].body else {
        unreachable!("nvidia should render");
    };
    assert_eq!(views[1].pane_id, nvidia.to_string());
    assert_eq!(view.body["metrics"]["utilization"], 73);

    let PaneBody::Error(panel) = &views[2].body else {
        unreachable!("exploding pane should fail");
    };
    assert_eq!(views[2].pane_id, exploding.to_string());
    assert!(panel.message.contains("render exploded"));

    let PaneBody::Error(panel) = &views[3].body else {
        unreachable!("flaky pane should fail");
    };
    assert_eq!(views[3].pane_id, flaky.to_string());
    assert!(panel.message.contains("driver missing"));

    harness.broken.store(false, Ordering::SeqCst);
    assert!(board.retry_pane(&flaky.to_string()).await.expect("retry"));
    let views = board.render().await;
    assert!(!views[3].body.is_error());
}

#[tokio::test]
async fn test_retry_requires_active_pane() {
    let harness = Harness::new(backend_session());
    let board = harness.board().await.expect("board");

    let err = board
        .retry_pane("SERVICE-NvidiaPane-zzzzz")
        .await
        .expect_err("not active");
    assert!(matches!(err, BoardError::PaneNotActive(_)));
}

#[tokio::test]
async fn test_remote_events_resync_but_own_events_do_not() {
    let harness = Harness::new(backend_session());
    let first = harness.board().await.expect("first");
    let second = harness.board().await.expect("second");
    let mut first_events = first.subscribe();
    let mut second_events = second.subscribe();

    let pane = first.launch_pane(ModuleType::Service, "NvidiaPane").await.expect("launch");
    first.flush().await.expect("flush");
    let fetches = harness.session.fetches.load(Ordering::SeqCst);

    let own = first_events.recv().await.expect("own event");
    first.handle_event(own).await.expect("own");
    assert_eq!(harness.session.fetches.load(Ordering::SeqCst), fetches);

    let remote = second_events.recv().await.expect("remote event");
    second.handle_event(remote).await.expect("remote");
    assert_eq!(harness.session.fetches.load(Ordering::SeqCst), fetches + 1);
    assert!(second.active_modules().contains(&pane.to_string()));
    assert_eq!(second.source(), Some(SessionSource::Remote));
}

#[tokio::test]
async fn test_remote_removal_refreshes_durable_tier() {
    let harness = Harness::new(backend_session());
    let viewer_durable = LocalCache::new(Arc::new(MemoryStore::new()));
    let viewer_harness = Harness {
        session: Arc::clone(&harness.session),
        modules: Arc::clone(&harness.modules),
        bus: harness.bus.clone(),
        durable: viewer_durable.clone(),
        broken: Arc::clone(&harness.broken),
    };
    let editor = harness.board().await.expect("editor");
    let viewer = viewer_harness.board().await.expect("viewer");
    viewer.flush().await.expect("flush");
    assert_eq!(viewer_durable.load_active_modules(), Some(vec![SUPERVISOR.to_string()]));
    let mut viewer_events = viewer.subscribe();

    editor.remove_pane(SUPERVISOR).await.expect("remove");
    editor.flush().await.expect("flush");

    let removed = viewer_events.recv().await.expect("remote event");
    assert_eq!(removed.name(), "pane:removed");
    viewer.handle_event(removed).await.expect("resync");

    assert!(viewer.active_modules().is_empty());
    assert_eq!(viewer_durable.load_active_modules(), Some(Vec::new()));
    assert!(viewer_durable.load_layouts().expect("layouts").is_empty());

    drop(viewer);
    harness.session.offline.store(true, Ordering::SeqCst);
    let restarted = viewer_harness.board().await.expect("restarted viewer");
    assert_eq!(restarted.source(), Some(SessionSource::Durable));
    assert!(restarted.active_modules().is_empty());
}

#[tokio::test]
async fn test_clear_session_empties_board() {
    let harness = Harness::new(backend_session());
    let board = harness.board().await.expect("board");

    assert!(board.clear_session(false).await);

    assert!(board.active_modules().is_empty());
    assert!(board.layouts().is_empty());
    assert_eq!(harness.session.session.lock()["active_modules"], json!([]));
}

#[tokio::test]
async fn test_reset_module_db_reloads_registry() {
    let harness = Harness::new(backend_session());
    let board = harness.board().await.expect("board");

    let outcome = board.reset_module_db().await.expect("reset");

    assert!(outcome.success);
    assert_eq!(outcome.total, 1);
    assert_eq!(harness.modules.resets.load(Ordering::SeqCst), 1);
    assert!(board.modules().find_module(ModuleType::Service, "NvidiaPane").is_some());
}

#[tokio::test]
async fn test_durable_tier_survives_restart() {
    let dir = tempfile::tempdir().expect("tempdir");
    let mut harness = Harness::new(backend_session());
    harness.durable = LocalCache::new(Arc::new(JsonFileStore::open(dir.path()).expect("open")));

    let pane = {
        let board = harness.board().await.expect("board");
        let pane = board.launch_pane(ModuleType::Service, "NvidiaPane").await.expect("launch");
        board.flush().await.expect("flush");
        pane
    };

    harness.session.offline.store(true, Ordering::SeqCst);
    harness.durable = LocalCache::new(Arc::new(JsonFileStore::open(dir.path()).expect("reopen")));
    let board = harness.board().await.expect("restarted board");

    assert_eq!(board.source(), Some(SessionSource::Durable));
    assert_eq!(board.active_modules(), vec![SUPERVISOR.to_string(), pane.to_string()]);
    assert_eq!(board.layouts().get(Breakpoint::Lg).len(), 2);
}

#[tokio::test]
async fn test_command_runner_writes_json() {
    let harness = Harness::new(backend_session());
    let board = Arc::new(harness.board().await.expect("board"));
    let runner = CommandRunner::new(Arc::clone(&board), OutputFormat::new(Format::Json));

    let mut out = Vec::new();
    runner
        .execute(
            &mut out,
            &Commands::Launch {
                module_type: ModuleType::System,
                static_identifier: "TerminalPane".into(),
            },
        )
        .await
        .expect("launch");
    let launched: Value = serde_json::from_slice(&out).expect("json");
    assert_eq!(launched["action"], "launch");
    assert_eq!(launched["success"], true);
    let pane_id = launched["pane_id"].as_str().expect("pane id").to_string();
    assert!(pane_id.starts_with("SYSTEM-TerminalPane-"));

    let mut out = Vec::new();
    runner.execute(&mut out, &Commands::Status).await.expect("status");
    let status: Value = serde_json::from_slice(&out).expect("json");
    assert_eq!(status["source"], "remote");
    assert_eq!(status["connection"], "connected");
    assert_eq!(status["active_modules"][1], json!(pane_id));

    let mut out = Vec::new();
    runner
        .execute(
            &mut out,
            &Commands::Modules {
                module_type: Some(ModuleType::User),
            },
        )
        .await
        .expect("modules");
    let modules: Value = serde_json::from_slice(&out).expect("json");
    let names: Vec<&str> = modules
        .as_array()
        .expect("array")
        .iter()
        .filter_map(|m| m["static_identifier"].as_str())
        .collect();
    assert_eq!(names, ["ExplodingPane", "FlakyPane"]);
}
