use anyhow::{anyhow, Result};
use async_trait::async_trait;

use crate::events::ServiceEventKind;
use crate::models::Page;
use crate::tenant::TenantContext;

/// Standard record service methods.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum ServiceMethodKind {
    Find,
    Get,
    Create,
    Update,
    Remove,
}

impl ServiceMethodKind {
    /// Create, update and remove change server state and must invalidate caches.
    pub fn is_mutation(&self) -> bool {
        matches!(
            self,
            ServiceMethodKind::Create | ServiceMethodKind::Update | ServiceMethodKind::Remove
        )
    }

    /// Only mutations emit standard events.
    pub fn standard_event(&self) -> Option<ServiceEventKind> {
        match self {
            ServiceMethodKind::Create => Some(ServiceEventKind::Created),
            ServiceMethodKind::Update => Some(ServiceEventKind::Updated),
            ServiceMethodKind::Remove => Some(ServiceEventKind::Removed),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ServiceMethodKind::Find => "find",
            ServiceMethodKind::Get => "get",
            ServiceMethodKind::Create => "create",
            ServiceMethodKind::Update => "update",
            ServiceMethodKind::Remove => "remove",
        }
    }
}

/// Site-scoped CRUD over one record type.
///
/// - `find`   → one page of records
/// - `get`    → fetch one by id
/// - `create` → create one
/// - `update` → full replace
/// - `remove` → delete one
///
/// Every default returns "Method not implemented", so a service overrides
/// only what it supports.
#[async_trait]
pub trait RecordService<R, I = R, P = ()>: Send + Sync
where
    R: Send + 'static,
    I: Send + 'static,
    P: Send + 'static,
{
    async fn find(&self, _ctx: &TenantContext, _params: P) -> Result<Page<R>> {
        Err(anyhow!("Method not implemented: find"))
    }

    async fn get(&self, _ctx: &TenantContext, _id: &str) -> Result<R> {
        Err(anyhow!("Method not implemented: get"))
    }

    async fn create(&self, _ctx: &TenantContext, _data: I) -> Result<R> {
        Err(anyhow!("Method not implemented: create"))
    }

    async fn update(&self, _ctx: &TenantContext, _id: &str, _data: I) -> Result<R> {
        Err(anyhow!("Method not implemented: update"))
    }

    async fn remove(&self, _ctx: &TenantContext, _id: &str) -> Result<()> {
        Err(anyhow!("Method not implemented: remove"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct ReadOnly;

    #[async_trait]
    impl RecordService<String> for ReadOnly {
        async fn get(&self, _ctx: &TenantContext, id: &str) -> Result<String> {
            Ok(id.to_uppercase())
        }
    }

    #[tokio::test]
    async fn unimplemented_methods_fail() {
        let svc = ReadOnly;
        let ctx = TenantContext::new("A");

        assert_eq!(svc.get(&ctx, "abc").await.unwrap(), "ABC");
        let err = svc.create(&ctx, "x".to_string()).await.unwrap_err();
        assert!(err.to_string().contains("create"));
        let err = svc.remove(&ctx, "abc").await.unwrap_err();
        assert_eq!(err.to_string(), "Method not implemented: remove");
    }

    #[test]
    fn only_mutations_emit_events() {
        assert!(ServiceMethodKind::Update.is_mutation());
        assert_eq!(ServiceMethodKind::Find.standard_event(), None);
        assert_eq!(
            ServiceMethodKind::Remove.standard_event(),
            Some(ServiceEventKind::Removed)
        );
    }
}
