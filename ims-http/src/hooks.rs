use anyhow::Result;
use async_trait::async_trait;
use ims_core::{ImsError, TenantContext};

use crate::request::ApiRequest;

/// A step in the request pipeline.
///
/// `before` hooks run in registration order and may rewrite the request or
/// abort it. `on_error` hooks observe every failed request after its error has
/// been mapped; they cannot recover it.
#[async_trait]
pub trait RequestHook: Send + Sync {
    async fn before(&self, _req: &mut ApiRequest, _ctx: &TenantContext) -> Result<()> {
        Ok(())
    }

    async fn on_error(&self, _err: &ImsError, _req: &ApiRequest, _ctx: &TenantContext) {}
}
