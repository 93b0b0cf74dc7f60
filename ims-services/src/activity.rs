use chrono::{DateTime, Utc};
use ims_core::TenantContext;
use ims_http::{endpoints, ApiClient, ApiRequest};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, warn};

/// One audit-trail entry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ActivityEntry {
    pub action: String,
    pub resource_type: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub resource_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<Value>,
    pub occurred_at: DateTime<Utc>,
}

impl ActivityEntry {
    pub fn new(action: impl Into<String>, resource_type: impl Into<String>) -> Self {
        Self {
            action: action.into(),
            resource_type: resource_type.into(),
            resource_id: None,
            details: None,
            occurred_at: Utc::now(),
        }
    }

    pub fn with_resource_id(mut self, id: impl Into<String>) -> Self {
        self.resource_id = Some(id.into());
        self
    }

    pub fn with_details(mut self, details: Value) -> Self {
        self.details = Some(details);
        self
    }
}

/// Best-effort activity logging. Failures are logged and dropped.
#[derive(Clone)]
pub struct ActivityLogger {
    api: ApiClient,
    enabled: bool,
}

impl ActivityLogger {
    pub fn new(api: ApiClient, enabled: bool) -> Self {
        Self { api, enabled }
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    /// Send `entry` and wait for the server. Returns whether it was accepted.
    pub async fn log(&self, ctx: &TenantContext, entry: ActivityEntry) -> bool {
        if !self.enabled {
            return false;
        }

        let req = match ApiRequest::post(endpoints::ACTIVITY_LOG).with_json(&entry) {
            Ok(r) => r,
            Err(e) => {
                warn!(error = %e, "activity entry not serializable");
                return false;
            }
        };

        match self.api.send(ctx, req).await {
            Ok(_) => {
                debug!(action = %entry.action, resource = %entry.resource_type, "activity logged");
                true
            }
            Err(e) => {
                warn!(action = %entry.action, error = %e, "activity log failed");
                false
            }
        }
    }

    /// Fire-and-forget variant of [`log`](Self::log). Needs a Tokio runtime.
    ///
    /// The post runs on a detached task: nothing awaits it, and a post still
    /// pending when the runtime shuts down or the process exits is dropped
    /// without a log line. Use [`log`](Self::log) where delivery matters.
    pub fn record(&self, ctx: &TenantContext, entry: ActivityEntry) {
        if !self.enabled {
            return;
        }
        let logger = self.clone();
        let ctx = ctx.clone();
        tokio::spawn(async move {
            logger.log(&ctx, entry).await;
        });
    }
}
