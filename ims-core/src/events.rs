use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use parking_lot::RwLock;

use crate::tenant::SiteId;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ListenerId(u64);

static LISTENER_ID: AtomicU64 = AtomicU64::new(1);

fn next_listener_id() -> ListenerId {
    ListenerId(LISTENER_ID.fetch_add(1, Ordering::Relaxed))
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum ServiceEventKind {
    Created,
    Updated,
    Removed,
    SiteChanged,
    Custom(String),
}

impl ServiceEventKind {
    pub fn custom(name: impl Into<String>) -> Self {
        ServiceEventKind::Custom(name.into())
    }
}

/// A notification emitted after a data-layer operation succeeds.
#[derive(Debug, Clone, PartialEq)]
pub struct ServiceEvent {
    pub service: String,
    pub kind: ServiceEventKind,
    pub site_id: Option<SiteId>,
    pub record_id: Option<String>,
}

impl ServiceEvent {
    pub fn new(service: impl Into<String>, kind: ServiceEventKind) -> Self {
        Self {
            service: service.into(),
            kind,
            site_id: None,
            record_id: None,
        }
    }

    pub fn for_site(mut self, site: Option<SiteId>) -> Self {
        self.site_id = site;
        self
    }

    pub fn for_record(mut self, id: impl Into<String>) -> Self {
        self.record_id = Some(id.into());
        self
    }
}

pub type EventListener = Arc<dyn Fn(&ServiceEvent) + Send + Sync>;

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum ServiceNamePat {
    Any,
    Exact(String),
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum EventPat {
    Any,
    Exact(ServiceEventKind),
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ServiceEventPattern {
    pub service: ServiceNamePat,
    pub event: EventPat,
}

impl ServiceEventPattern {
    pub fn exact(service: impl Into<String>, event: ServiceEventKind) -> Self {
        Self {
            service: ServiceNamePat::Exact(service.into()),
            event: EventPat::Exact(event),
        }
    }

    pub fn any() -> Self {
        Self {
            service: ServiceNamePat::Any,
            event: EventPat::Any,
        }
    }

    pub fn matches(&self, event: &ServiceEvent) -> bool {
        let service_ok = match &self.service {
            ServiceNamePat::Any => true,
            ServiceNamePat::Exact(s) => *s == event.service,
        };
        let event_ok = match &self.event {
            EventPat::Any => true,
            EventPat::Exact(e) => *e == event.kind,
        };
        service_ok && event_ok
    }
}

#[derive(Clone)]
struct ListenerEntry {
    id: ListenerId,
    pattern: ServiceEventPattern,
    listener: EventListener,
    once: bool,
}

/// Publish/subscribe hub between the data layer and whatever renders it.
///
/// Emission snapshots matching listeners under a read lock, calls them with
/// no lock held, then removes fired `once` listeners under a write lock.
/// Listeners may therefore register or remove listeners themselves.
#[derive(Default)]
pub struct EventHub {
    listeners: RwLock<Vec<ListenerEntry>>,
}

impl EventHub {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn on(&self, pattern: ServiceEventPattern, listener: EventListener) -> ListenerId {
        self.push(pattern, listener, false)
    }

    /// Sugar: `hub.on_str("interactions.created", ...)`.
    pub fn on_str(&self, pattern: &str, listener: EventListener) -> anyhow::Result<ListenerId> {
        let pat = parse_event_pattern(pattern)?;
        Ok(self.on(pat, listener))
    }

    pub fn once(&self, pattern: ServiceEventPattern, listener: EventListener) -> ListenerId {
        self.push(pattern, listener, true)
    }

    fn push(&self, pattern: ServiceEventPattern, listener: EventListener, once: bool) -> ListenerId {
        let id = next_listener_id();
        self.listeners.write().push(ListenerEntry {
            id,
            pattern,
            listener,
            once,
        });
        id
    }

    pub fn off(&self, id: ListenerId) -> bool {
        let mut listeners = self.listeners.write();
        let before = listeners.len();
        listeners.retain(|e| e.id != id);
        before != listeners.len()
    }

    pub fn remove_all(&self, pattern: Option<&ServiceEventPattern>) -> usize {
        let mut listeners = self.listeners.write();
        let before = listeners.len();
        match pattern {
            Some(p) => listeners.retain(|e| &e.pattern != p),
            None => listeners.clear(),
        }
        before - listeners.len()
    }

    pub fn listener_count(&self) -> usize {
        self.listeners.read().len()
    }

    /// Deliver `event` to every matching listener. Returns how many ran.
    pub fn emit(&self, event: &ServiceEvent) -> usize {
        let (to_call, once_ids): (Vec<EventListener>, Vec<ListenerId>) = {
            let listeners = self.listeners.read();
            let matching: Vec<&ListenerEntry> =
                listeners.iter().filter(|e| e.pattern.matches(event)).collect();
            (
                matching.iter().map(|e| e.listener.clone()).collect(),
                matching.iter().filter(|e| e.once).map(|e| e.id).collect(),
            )
        };

        for f in &to_call {
            f(event);
        }

        if !once_ids.is_empty() {
            self.listeners.write().retain(|e| !once_ids.contains(&e.id));
        }

        to_call.len()
    }
}

/// Parse sugar strings like "interactions.created", "interactions.*", "*.*".
pub fn parse_event_pattern(input: &str) -> anyhow::Result<ServiceEventPattern> {
    let s = input.trim();

    let (svc, ev) = if let Some((a, b)) = s.split_once(' ') {
        (a.trim(), b.trim())
    } else if let Some((a, b)) = s.split_once('.') {
        (a.trim(), b.trim())
    } else {
        return Err(anyhow::anyhow!(
            "Invalid event pattern '{s}'. Expected 'service event' or 'service.event'."
        ));
    };

    let service = if svc == "*" {
        ServiceNamePat::Any
    } else {
        ServiceNamePat::Exact(svc.to_string())
    };

    let event = if ev == "*" {
        EventPat::Any
    } else {
        EventPat::Exact(parse_event_kind(ev))
    };

    Ok(ServiceEventPattern { service, event })
}

pub fn parse_event_kind(s: &str) -> ServiceEventKind {
    let norm = s.trim().to_lowercase();
    match norm.as_str() {
        "created" => ServiceEventKind::Created,
        "updated" => ServiceEventKind::Updated,
        "removed" => ServiceEventKind::Removed,
        "site_changed" | "sitechanged" => ServiceEventKind::SiteChanged,
        _ => ServiceEventKind::Custom(norm),
    }
}
