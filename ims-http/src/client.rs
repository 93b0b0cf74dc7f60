use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use ims_core::{ImsConfig, ImsError, TenantContext};
use parking_lot::RwLock;
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;
use tracing::{debug, warn};

use crate::error::error_from_response;
use crate::hooks::RequestHook;
use crate::request::ApiRequest;

/// Supplies the bearer token for outgoing requests.
pub trait TokenProvider: Send + Sync {
    fn access_token(&self) -> Option<String>;
}

/// Provider for clients that never authenticate.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoToken;

impl TokenProvider for NoToken {
    fn access_token(&self) -> Option<String> {
        None
    }
}

/// JSON-over-HTTPS client for the IMS API.
///
/// Cloning is cheap; clones share the connection pool and the hook list.
#[derive(Clone)]
pub struct ApiClient {
    http: reqwest::Client,
    base_url: String,
    hooks: Arc<RwLock<Vec<Arc<dyn RequestHook>>>>,
    tokens: Arc<dyn TokenProvider>,
}

impl ApiClient {
    pub fn new(base_url: impl Into<String>, timeout: Duration) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| ImsError::general_error(format!("failed to build HTTP client: {e}")).into_anyhow())?;

        Ok(Self {
            http,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            hooks: Arc::new(RwLock::new(Vec::new())),
            tokens: Arc::new(NoToken),
        })
    }

    pub fn from_config(config: &ImsConfig) -> Result<Self> {
        Self::new(config.api_base_url.clone(), config.request_timeout)
    }

    pub fn with_token_provider(mut self, tokens: Arc<dyn TokenProvider>) -> Self {
        self.tokens = tokens;
        self
    }

    /// Append a hook to the pipeline. Hooks run in registration order.
    pub fn add_hook(&self, hook: Arc<dyn RequestHook>) {
        self.hooks.write().push(hook);
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Run the hook pipeline, send the request, and decode the JSON reply.
    ///
    /// Empty bodies decode as `Value::Null`.
    pub async fn send(&self, ctx: &TenantContext, mut req: ApiRequest) -> Result<Value> {
        let hooks: Vec<Arc<dyn RequestHook>> = self.hooks.read().clone();

        for h in &hooks {
            h.before(&mut req, ctx).await?;
        }

        match self.execute(ctx, &req).await {
            Ok(v) => Ok(v),
            Err(err) => {
                for h in &hooks {
                    h.on_error(&err, &req, ctx).await;
                }
                Err(err.into_anyhow())
            }
        }
    }

    async fn execute(&self, ctx: &TenantContext, req: &ApiRequest) -> std::result::Result<Value, ImsError> {
        let url = format!("{}{}", self.base_url, req.path);
        let request_id = ctx.request_id_or_new();

        let mut builder = self
            .http
            .request(req.method.clone(), &url)
            .header("X-Request-Id", &request_id)
            .header(http::header::ACCEPT, "application/json");

        if !req.query.is_empty() {
            builder = builder.query(&req.query);
        }
        if let Some(body) = &req.body {
            builder = builder.json(body);
        }
        if let Some(token) = self.tokens.access_token() {
            builder = builder.bearer_auth(token);
        }

        debug!(method = %req.method, path = %req.path, request_id = %request_id, "sending request");

        let response = builder.send().await.map_err(|e| {
            warn!(method = %req.method, path = %req.path, error = %e, "request failed before a response");
            if e.is_timeout() {
                ImsError::timeout("The request timed out")
            } else {
                ImsError::network(format!("Network error: {e}"))
            }
        })?;

        let status = response.status().as_u16();
        let text = response
            .text()
            .await
            .map_err(|e| ImsError::network(format!("failed to read response body: {e}")))?;

        if !(200..300).contains(&status) {
            let err = error_from_response(status, &text);
            warn!(method = %req.method, path = %req.path, status, message = %err.message, "request rejected");
            return Err(err);
        }

        if text.trim().is_empty() {
            return Ok(Value::Null);
        }

        serde_json::from_str(&text).map_err(|e| {
            ImsError::general_error(format!("invalid JSON in response from {}: {e}", req.path))
        })
    }

    /// Send and decode into `T`.
    pub async fn request<T: DeserializeOwned>(&self, ctx: &TenantContext, req: ApiRequest) -> Result<T> {
        let path = req.path.clone();
        let value = self.send(ctx, req).await?;
        serde_json::from_value(value).map_err(|e| {
            ImsError::general_error(format!("unexpected response shape from {path}: {e}")).into_anyhow()
        })
    }

    pub async fn get_json<T: DeserializeOwned>(
        &self,
        ctx: &TenantContext,
        path: &str,
        query: Vec<(String, String)>,
    ) -> Result<T> {
        let mut req = ApiRequest::get(path);
        req.query = query;
        self.request(ctx, req).await
    }

    pub async fn post_json<B: Serialize, T: DeserializeOwned>(
        &self,
        ctx: &TenantContext,
        path: &str,
        body: &B,
    ) -> Result<T> {
        let req = ApiRequest::post(path).with_json(body)?;
        self.request(ctx, req).await
    }

    pub async fn put_json<B: Serialize, T: DeserializeOwned>(
        &self,
        ctx: &TenantContext,
        path: &str,
        body: &B,
    ) -> Result<T> {
        let req = ApiRequest::put(path).with_json(body)?;
        self.request(ctx, req).await
    }

    pub async fn delete(&self, ctx: &TenantContext, path: &str) -> Result<()> {
        self.send(ctx, ApiRequest::delete(path)).await?;
        Ok(())
    }
}
