//! Module definitions and the compiled-in catalog.

use std::sync::Arc;

use serde_json::{Value, json};
use vaio_proto::{ModuleRecord, ModuleType};

use crate::component::{ComponentLoader, ComponentRef, ComponentView, PaneComponent, RenderContext};

/// Descriptive data of a module.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModuleMetadata {
    /// Display name.
    pub name: String,
    /// Module key.
    pub module: String,
    /// Free-form description.
    pub description: Option<String>,
    /// Launcher grouping.
    pub category: Option<String>,
    /// Socket namespace streaming this module's data.
    pub socket_namespace: Option<String>,
    /// Size hint.
    pub default_size: Option<String>,
    /// Launcher icon.
    pub logo_url: Option<String>,
    /// Shown in the launcher.
    pub visible: bool,
    /// Launched on first start.
    pub autostart: bool,
    /// Reports a service status.
    pub supports_status: bool,
    /// Backend row id, if the module came from the backend.
    pub backend_id: Option<i64>,
}

impl ModuleMetadata {
    /// Metadata with just a name.
    #[must_use]
    pub fn named(name: impl Into<String>) -> Self {
        let name = name.into();
        Self {
            module: name.to_lowercase(),
            name,
            description: None,
            category: None,
            socket_namespace: None,
            default_size: None,
            logo_url: None,
            visible: true,
            autostart: false,
            supports_status: false,
            backend_id: None,
        }
    }
}

/// A known, loadable unit of functionality.
#[derive(Debug, Clone)]
pub struct ModuleDefinition {
    /// Category.
    pub module_type: ModuleType,
    /// Implementation name. Never contains `-`.
    pub static_identifier: String,
    /// Component factory; absent when no local implementation exists.
    pub loader: Option<ComponentLoader>,
    /// Descriptive data.
    pub metadata: ModuleMetadata,
}

impl ModuleDefinition {
    /// Definition with a loader.
    #[must_use]
    pub fn new(
        module_type: ModuleType,
        static_identifier: impl Into<String>,
        metadata: ModuleMetadata,
        loader: ComponentLoader,
    ) -> Self {
        Self {
            module_type,
            static_identifier: static_identifier.into(),
            loader: Some(loader),
            metadata,
        }
    }

    /// Definition built from a backend or cached record, without a loader.
    #[must_use]
    pub fn from_record(record: &ModuleRecord) -> Self {
        Self {
            module_type: record.module_type,
            static_identifier: record.resolved_static_identifier(),
            loader: None,
            metadata: ModuleMetadata {
                name: record.name.clone(),
                module: record.module.clone(),
                description: record.description.clone(),
                category: record.category.clone(),
                socket_namespace: record.socket_namespace.clone(),
                default_size: record.default_size.clone(),
                logo_url: record.logo_url.clone(),
                visible: record.visible,
                autostart: record.autostart,
                supports_status: record.supports_status,
                backend_id: record.id,
            },
        }
    }

    /// Serializable form, for caching.
    #[must_use]
    pub fn to_record(&self) -> ModuleRecord {
        let m = &self.metadata;
        ModuleRecord {
            id: m.backend_id,
            name: m.name.clone(),
            module: m.module.clone(),
            description: m.description.clone(),
            module_type: self.module_type,
            category: m.category.clone(),
            pane_component: None,
            static_identifier: Some(self.static_identifier.clone()),
            default_size: m.default_size.clone(),
            visible: m.visible,
            supports_status: m.supports_status,
            socket_namespace: m.socket_namespace.clone(),
            autostart: m.autostart,
            logo_url: m.logo_url.clone(),
            is_installed: true,
        }
    }

    /// Whether `identifier` names this module, by implementation or module
    /// name.
    #[must_use]
    pub fn matches(&self, identifier: &str) -> bool {
        self.static_identifier == identifier
            || self.metadata.module == identifier
            || self.metadata.name == identifier
    }
}

/// A generic pane that reports its namespace, metrics and state.
#[derive(Debug, Clone)]
pub struct BuiltinPane {
    name: String,
    title: String,
}

impl BuiltinPane {
    /// Create a pane.
    #[must_use]
    pub fn new(name: impl Into<String>, title: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            title: title.into(),
        }
    }
}

impl PaneComponent for BuiltinPane {
    fn name(&self) -> &str {
        &self.name
    }

    fn render(&self, ctx: &RenderContext<'_>) -> ComponentView {
        ComponentView {
            title: self.title.clone(),
            body: json!({
                "pane": ctx.pane_id.to_string(),
                "metrics": ctx.metrics.cloned().unwrap_or(Value::Null),
                "state": ctx.state.cloned().unwrap_or(Value::Null),
            }),
        }
    }
}

/// The set of modules compiled into this build.
#[derive(Debug, Clone, Default)]
pub struct ModuleCatalog {
    definitions: Vec<ModuleDefinition>,
}

impl ModuleCatalog {
    /// An empty catalog.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// The stock panes.
    #[must_use]
    pub fn builtin() -> Self {
        const PANES: &[(ModuleType, &str, &str, Option<&str>, &str)] = &[
            (ModuleType::System, "SupervisorPane", "Supervisor", Some("cpu"), "monitoring"),
            (ModuleType::System, "TerminalPane", "Terminal", None, "tools"),
            (ModuleType::Service, "NvidiaPane", "Nvidia", Some("gpu"), "monitoring"),
            (ModuleType::Service, "OllamaPane", "Ollama", None, "ai"),
            (ModuleType::Service, "ComfyUIPane", "ComfyUI", None, "ai"),
            (ModuleType::Service, "OpenWebUIPane", "OpenWebUI", None, "ai"),
            (ModuleType::Service, "PostgresPane", "Postgres", None, "database"),
            (ModuleType::Service, "QdrantPane", "Qdrant", None, "database"),
        ];

        let mut catalog = Self::new();
        for &(module_type, static_identifier, name, namespace, category) in PANES {
            let mut metadata = ModuleMetadata::named(name);
            metadata.socket_namespace = namespace.map(|ns| format!("/{ns}"));
            metadata.category = Some(category.to_string());
            metadata.supports_status = module_type == ModuleType::Service;
            let component: ComponentRef = Arc::new(BuiltinPane::new(static_identifier, name));
            catalog.register(ModuleDefinition::new(
                module_type,
                static_identifier,
                metadata,
                ComponentLoader::ready(component),
            ));
        }
        catalog
    }

    /// Add a definition, replacing one with the same type and identifier.
    pub fn register(&mut self, definition: ModuleDefinition) {
        self.definitions.retain(|d| {
            !(d.module_type == definition.module_type
                && d.static_identifier == definition.static_identifier)
        });
        self.definitions.push(definition);
    }

    /// Builder form of [`register`](Self::register).
    #[must_use]
    pub fn with(mut self, definition: ModuleDefinition) -> Self {
        self.register(definition);
        self
    }

    /// All definitions.
    #[must_use]
    pub fn definitions(&self) -> &[ModuleDefinition] {
        &self.definitions
    }

    /// Number of definitions.
    #[must_use]
    pub fn len(&self) -> usize {
        self.definitions.len()
    }

    /// Whether the catalog is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.definitions.is_empty()
    }

    /// Loader of the compiled-in module with this type and identifier.
    #[must_use]
    pub fn loader_for(
        &self,
        module_type: ModuleType,
        static_identifier: &str,
    ) -> Option<ComponentLoader> {
        self.definitions
            .iter()
            .find(|d| d.module_type == module_type && d.static_identifier == static_identifier)
            .and_then(|d| d.loader.clone())
    }

    /// Definition for a record, bound to the local loader when one exists.
    #[must_use]
    pub fn bind(&self, record: &ModuleRecord) -> ModuleDefinition {
        let mut definition = ModuleDefinition::from_record(record);
        definition.loader = self.loader_for(definition.module_type, &definition.static_identifier);
        definition
    }
}
