//! The component seam.
//!
//! Visual components live outside this workspace. A component is any
//! [`PaneComponent`] trait object; it turns a [`RenderContext`] into a
//! [`ComponentView`] description that a front end draws.

use std::fmt;
use std::future::Future;
use std::sync::Arc;

use serde::Serialize;
use serde_json::Value;
use vaio_proto::{ModuleType, PaneId};
use vaio_storage::BoxFuture;

use crate::error::LoadError;

/// Inputs to a component render.
#[derive(Debug, Clone, Copy)]
pub struct RenderContext<'a> {
    /// Pane being rendered.
    pub pane_id: &'a PaneId,
    /// Latest metrics snapshot for the module's namespace.
    pub metrics: Option<&'a Value>,
    /// Persisted pane state.
    pub state: Option<&'a Value>,
}

/// What a component produced for one pane.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ComponentView {
    /// Header text.
    pub title: String,
    /// Component-specific content.
    pub body: Value,
}

/// A renderable pane implementation.
pub trait PaneComponent: Send + Sync {
    /// Implementation name, e.g. `SupervisorPane`.
    fn name(&self) -> &str;

    /// Describe the pane for the given context.
    fn render(&self, ctx: &RenderContext<'_>) -> ComponentView;
}

/// Shared handle to a loaded component.
pub type ComponentRef = Arc<dyn PaneComponent>;

type LoaderFn = dyn Fn() -> BoxFuture<'static, Result<ComponentRef, LoadError>> + Send + Sync;

/// Deferred async factory for a component.
#[derive(Clone)]
pub struct ComponentLoader(Arc<LoaderFn>);

impl ComponentLoader {
    /// Wrap an async factory.
    pub fn new<F, Fut>(factory: F) -> Self
    where
        F: Fn() -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<ComponentRef, LoadError>> + Send + 'static,
    {
        Self(Arc::new(move || Box::pin(factory())))
    }

    /// A loader that hands out an already built component.
    #[must_use]
    pub fn ready(component: ComponentRef) -> Self {
        Self::new(move || {
            let component = Arc::clone(&component);
            async move { Ok(component) }
        })
    }

    /// Start a load.
    #[must_use]
    pub fn load(&self) -> BoxFuture<'static, Result<ComponentRef, LoadError>> {
        (self.0)()
    }
}

impl fmt::Debug for ComponentLoader {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("ComponentLoader(..)")
    }
}

/// Resolves components without going through the module registry.
///
/// When a resolver is configured the component registry asks it first.
pub trait ComponentResolver: Send + Sync {
    /// Load the component implementing `module_type`/`static_identifier`.
    fn resolve(
        &self,
        module_type: ModuleType,
        static_identifier: &str,
    ) -> BoxFuture<'static, Result<ComponentRef, LoadError>>;
}
