//! REST client for the board backend.

use std::time::Duration;

use reqwest::{Client, Method, RequestBuilder, Response};
use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::Value;
use tracing::{debug, warn};
use vaio_proto::{Layouts, ModuleDraft, ModuleRecord, ModuleType};

use crate::api::{BoxFuture, ModuleApi, SessionApi};
use crate::error::ApiError;

/// Longest response body kept in [`ApiError::Status`].
const MAX_ERROR_BODY: usize = 512;

/// Configuration for [`HttpBackend`].
#[derive(Debug, Clone)]
pub struct HttpBackendConfig {
    /// Base URL, e.g. `http://localhost:8000`.
    pub base_url: String,
    /// Per-request timeout.
    pub timeout: Duration,
    /// Value of the `User-Agent` header.
    pub user_agent: String,
}

impl Default for HttpBackendConfig {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:8000".to_string(),
            timeout: Duration::from_secs(10),
            user_agent: concat!("vaio-board/", env!("CARGO_PKG_VERSION")).to_string(),
        }
    }
}

impl HttpBackendConfig {
    /// Create a configuration for the given base URL.
    #[must_use]
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            ..Self::default()
        }
    }

    /// Set the per-request timeout.
    #[must_use]
    pub const fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Set the `User-Agent` header.
    #[must_use]
    pub fn with_user_agent(mut self, user_agent: impl Into<String>) -> Self {
        self.user_agent = user_agent.into();
        self
    }
}

/// Backend client over HTTP.
#[derive(Debug, Clone)]
pub struct HttpBackend {
    client: Client,
    base_url: String,
    timeout: Duration,
}

impl HttpBackend {
    /// Build a client.
    pub fn new(config: HttpBackendConfig) -> Result<Self, ApiError> {
        let client = Client::builder()
            .user_agent(config.user_agent)
            .build()
            .map_err(|e| ApiError::Transport {
                endpoint: config.base_url.clone(),
                message: e.to_string(),
            })?;
        Ok(Self {
            client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            timeout: config.timeout,
        })
    }

    /// Base URL without a trailing slash.
    #[must_use]
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn request(&self, method: Method, endpoint: &str) -> RequestBuilder {
        self.client
            .request(method, format!("{}{endpoint}", self.base_url))
            .timeout(self.timeout)
    }

    async fn send(&self, endpoint: &str, request: RequestBuilder) -> Result<Response, ApiError> {
        let response = request
            .send()
            .await
            .map_err(|e| classify(endpoint, &e))?;
        let status = response.status();
        if status.is_success() {
            debug!(endpoint, status = status.as_u16(), "backend request ok");
            return Ok(response);
        }

        let mut body = response.text().await.unwrap_or_default();
        if body.len() > MAX_ERROR_BODY {
            let mut cut = MAX_ERROR_BODY;
            while !body.is_char_boundary(cut) {
                cut -= 1;
            }
            body.truncate(cut);
        }
        warn!(endpoint, status = status.as_u16(), "backend request failed");
        Err(ApiError::Status {
            endpoint: endpoint.to_string(),
            status: status.as_u16(),
            body,
        })
    }

    async fn send_json<B: Serialize + ?Sized>(
        &self,
        method: Method,
        endpoint: &str,
        body: &B,
    ) -> Result<Response, ApiError> {
        self.send(endpoint, self.request(method, endpoint).json(body)).await
    }

    async fn decode<T: DeserializeOwned>(
        endpoint: &str,
        response: Response,
    ) -> Result<T, ApiError> {
        response.json::<T>().await.map_err(|e| {
            if e.is_timeout() {
                ApiError::Timeout {
                    endpoint: endpoint.to_string(),
                }
            } else {
                ApiError::Decode {
                    endpoint: endpoint.to_string(),
                    message: e.to_string(),
                }
            }
        })
    }
}

fn classify(endpoint: &str, error: &reqwest::Error) -> ApiError {
    if error.is_timeout() {
        ApiError::Timeout {
            endpoint: endpoint.to_string(),
        }
    } else {
        ApiError::Transport {
            endpoint: endpoint.to_string(),
            message: error.to_string(),
        }
    }
}

fn module_type_path(module_type: ModuleType) -> String {
    module_type.as_str().to_lowercase()
}

const SESSION: &str = "/api/user/session";
const SESSION_GRID: &str = "/api/user/session/grid";
const SESSION_MODULES: &str = "/api/user/session/modules";
const MODULES: &str = "/api/modules";

impl SessionApi for HttpBackend {
    fn fetch_session(&self) -> BoxFuture<'_, Result<Value, ApiError>> {
        Box::pin(async move {
            let response = self.send(SESSION, self.request(Method::GET, SESSION)).await?;
            Self::decode(SESSION, response).await
        })
    }

    fn update_grid<'a>(&'a self, layouts: &'a Layouts) -> BoxFuture<'a, Result<(), ApiError>> {
        Box::pin(async move {
            self.send_json(Method::PUT, SESSION_GRID, layouts).await?;
            Ok(())
        })
    }

    fn update_modules<'a>(&'a self, modules: &'a [String]) -> BoxFuture<'a, Result<(), ApiError>> {
        Box::pin(async move {
            self.send_json(Method::PUT, SESSION_MODULES, modules).await?;
            Ok(())
        })
    }

    fn clear_grid(&self) -> BoxFuture<'_, Result<(), ApiError>> {
        Box::pin(async move {
            self.send(SESSION_GRID, self.request(Method::DELETE, SESSION_GRID))
                .await?;
            Ok(())
        })
    }

    fn delete_module<'a>(&'a self, module_id: &'a str) -> BoxFuture<'a, Result<(), ApiError>> {
        Box::pin(async move {
            let endpoint = format!("{SESSION_MODULES}/{module_id}");
            self.send(&endpoint, self.request(Method::DELETE, &endpoint))
                .await?;
            Ok(())
        })
    }

    fn get_pane_state<'a>(
        &'a self,
        pane_id: &'a str,
    ) -> BoxFuture<'a, Result<Option<Value>, ApiError>> {
        Box::pin(async move {
            #[derive(serde::Deserialize)]
            struct Envelope {
                #[serde(default)]
                state: Value,
            }

            let endpoint = format!("{SESSION}/pane/{pane_id}");
            let response = self.send(&endpoint, self.request(Method::GET, &endpoint)).await?;
            let envelope: Envelope = Self::decode(&endpoint, response).await?;
            let empty = match &envelope.state {
                Value::Null => true,
                Value::Object(map) => map.is_empty(),
                _ => false,
            };
            Ok((!empty).then_some(envelope.state))
        })
    }

    fn put_pane_state<'a>(
        &'a self,
        pane_id: &'a str,
        state: &'a Value,
    ) -> BoxFuture<'a, Result<(), ApiError>> {
        Box::pin(async move {
            let endpoint = format!("{SESSION}/pane/{pane_id}");
            self.send_json(Method::PUT, &endpoint, state).await?;
            Ok(())
        })
    }

    fn delete_pane_state<'a>(&'a self, pane_id: &'a str) -> BoxFuture<'a, Result<(), ApiError>> {
        Box::pin(async move {
            let endpoint = format!("{SESSION}/pane/{pane_id}");
            self.send(&endpoint, self.request(Method::DELETE, &endpoint))
                .await?;
            Ok(())
        })
    }
}

impl ModuleApi for HttpBackend {
    fn list_modules(
        &self,
        module_type: Option<ModuleType>,
    ) -> BoxFuture<'_, Result<Vec<ModuleRecord>, ApiError>> {
        Box::pin(async move {
            let mut request = self.request(Method::GET, MODULES);
            if let Some(module_type) = module_type {
                request = request.query(&[("module_type", module_type.as_str())]);
            }
            let response = self.send(MODULES, request).await?;
            Self::decode(MODULES, response).await
        })
    }

    fn create_module<'a>(
        &'a self,
        module_type: ModuleType,
        draft: &'a ModuleDraft,
    ) -> BoxFuture<'a, Result<ModuleRecord, ApiError>> {
        Box::pin(async move {
            let endpoint = format!("{MODULES}/{}", module_type_path(module_type));
            let response = self.send_json(Method::POST, &endpoint, draft).await?;
            Self::decode(&endpoint, response).await
        })
    }

    fn update_module<'a>(
        &'a self,
        module_type: ModuleType,
        id: i64,
        draft: &'a ModuleDraft,
    ) -> BoxFuture<'a, Result<ModuleRecord, ApiError>> {
        Box::pin(async move {
            let endpoint = format!("{MODULES}/{}/{id}", module_type_path(module_type));
            let response = self.send_json(Method::PUT, &endpoint, draft).await?;
            Self::decode(&endpoint, response).await
        })
    }

    fn delete_module_definition(
        &self,
        module_type: ModuleType,
        id: i64,
    ) -> BoxFuture<'_, Result<(), ApiError>> {
        Box::pin(async move {
            let endpoint = format!("{MODULES}/{}/{id}", module_type_path(module_type));
            self.send(&endpoint, self.request(Method::DELETE, &endpoint))
                .await?;
            Ok(())
        })
    }

    fn reset_db(&self) -> BoxFuture<'_, Result<(), ApiError>> {
        Box::pin(async move {
            let endpoint = format!("{MODULES}/reset-db");
            self.send(&endpoint, self.request(Method::POST, &endpoint))
                .await?;
            Ok(())
        })
    }

    fn clear_db(&self) -> BoxFuture<'_, Result<(), ApiError>> {
        Box::pin(async move {
            let endpoint = format!("{MODULES}/clear-db");
            self.send(&endpoint, self.request(Method::POST, &endpoint))
                .await?;
            Ok(())
        })
    }
}
