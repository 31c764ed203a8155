//! Backend API seams.
//!
//! Methods return boxed futures so the traits stay object safe and can be
//! held as `Arc<dyn SessionApi>`.

use std::future::Future;
use std::pin::Pin;

use serde_json::Value;
use vaio_proto::{Layouts, ModuleDraft, ModuleRecord, ModuleType};

use crate::error::ApiError;

/// A boxed, sendable future.
pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// The per-user session endpoints.
pub trait SessionApi: Send + Sync {
    /// `GET /api/user/session`. Returns the raw JSON body; callers validate
    /// its shape.
    fn fetch_session(&self) -> BoxFuture<'_, Result<Value, ApiError>>;

    /// `PUT /api/user/session/grid`.
    fn update_grid<'a>(&'a self, layouts: &'a Layouts) -> BoxFuture<'a, Result<(), ApiError>>;

    /// `PUT /api/user/session/modules`.
    fn update_modules<'a>(&'a self, modules: &'a [String]) -> BoxFuture<'a, Result<(), ApiError>>;

    /// `DELETE /api/user/session/grid`.
    fn clear_grid(&self) -> BoxFuture<'_, Result<(), ApiError>>;

    /// `DELETE /api/user/session/modules/{moduleId}`. Also drops the module
    /// from every breakpoint and its pane state on the backend.
    fn delete_module<'a>(&'a self, module_id: &'a str) -> BoxFuture<'a, Result<(), ApiError>>;

    /// `GET /api/user/session/pane/{paneId}`. `None` when no state is stored.
    fn get_pane_state<'a>(
        &'a self,
        pane_id: &'a str,
    ) -> BoxFuture<'a, Result<Option<Value>, ApiError>>;

    /// `PUT /api/user/session/pane/{paneId}`.
    fn put_pane_state<'a>(
        &'a self,
        pane_id: &'a str,
        state: &'a Value,
    ) -> BoxFuture<'a, Result<(), ApiError>>;

    /// `DELETE /api/user/session/pane/{paneId}`.
    fn delete_pane_state<'a>(&'a self, pane_id: &'a str) -> BoxFuture<'a, Result<(), ApiError>>;
}

/// The module catalog endpoints.
pub trait ModuleApi: Send + Sync {
    /// `GET /api/modules[?module_type=]`.
    fn list_modules(
        &self,
        module_type: Option<ModuleType>,
    ) -> BoxFuture<'_, Result<Vec<ModuleRecord>, ApiError>>;

    /// `POST /api/modules/{type}`.
    fn create_module<'a>(
        &'a self,
        module_type: ModuleType,
        draft: &'a ModuleDraft,
    ) -> BoxFuture<'a, Result<ModuleRecord, ApiError>>;

    /// `PUT /api/modules/{type}/{id}`.
    fn update_module<'a>(
        &'a self,
        module_type: ModuleType,
        id: i64,
        draft: &'a ModuleDraft,
    ) -> BoxFuture<'a, Result<ModuleRecord, ApiError>>;

    /// `DELETE /api/modules/{type}/{id}`.
    fn delete_module_definition(
        &self,
        module_type: ModuleType,
        id: i64,
    ) -> BoxFuture<'_, Result<(), ApiError>>;

    /// `POST /api/modules/reset-db`. Restores the default module set.
    fn reset_db(&self) -> BoxFuture<'_, Result<(), ApiError>>;

    /// `POST /api/modules/clear-db`. Removes every module.
    fn clear_db(&self) -> BoxFuture<'_, Result<(), ApiError>>;
}
