use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use ims_cache::TenantCache;
use ims_core::models::{FilterOperator, InteractionInput, InteractionType, ListParams, SearchFilter, SearchQuery};
use ims_core::{ErrorKind, EventHub, ImsError, RecordService, ServiceEvent, ServiceEventPattern, TenantContext};
use ims_http::{ApiClient, SiteScopeHook};
use ims_services::{DashboardService, InteractionService, SearchOutcome, SearchService};
use serde_json::{json, Value};
use wiremock::matchers::{body_partial_json, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

const TTL: Duration = Duration::from_secs(60);

fn api(server: &MockServer) -> ApiClient {
    let api = ApiClient::new(server.uri(), Duration::from_secs(5)).unwrap();
    api.add_hook(Arc::new(SiteScopeHook::new()));
    api
}

fn hit(id: &str, title: &str) -> Value {
    json!({
        "id": id,
        "title": title,
        "type": "Meeting",
        "start_datetime": "2024-03-01T09:00:00",
        "end_datetime": "2024-03-01T10:00:00"
    })
}

fn record(id: &str, title: &str) -> Value {
    json!({
        "id": id,
        "site_id": "A",
        "title": title,
        "type": "Meeting",
        "start_datetime": "2024-03-01T09:00:00",
        "end_datetime": "2024-03-01T10:00:00",
        "timezone": "UTC",
        "created_at": "2024-02-01T00:00:00Z",
        "updated_at": "2024-02-01T00:00:00Z"
    })
}

fn input(title: &str) -> InteractionInput {
    serde_json::from_value(json!({
        "title": title,
        "type": "Call",
        "start_datetime": "2024-03-02T09:00:00",
        "end_datetime": "2024-03-02T09:30:00",
        "timezone": "UTC"
    }))
    .unwrap()
}

#[tokio::test]
async fn text_search_uses_get_and_is_cached() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/search/interactions"))
        .and(query_param("q", "kickoff"))
        .and(query_param("site_id", "A"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "items": [hit("i-1", "Kickoff")],
            "total": 1
        })))
        .expect(1)
        .mount(&server)
        .await;

    let search = SearchService::new(api(&server), Arc::new(TenantCache::new()), TTL, true);
    let ctx = TenantContext::new("A");

    let first = search.search(&ctx, SearchQuery::text("kickoff")).await.unwrap();
    let second = search.search(&ctx, SearchQuery::text(" kickoff ")).await.unwrap();

    assert_eq!(first.applied().unwrap().items[0].title, "Kickoff");
    assert_eq!(second.applied().unwrap().metadata.total, 1);
    assert_eq!(search.current().items.len(), 1);
}

#[tokio::test]
async fn filtered_search_posts_the_filters() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/search/advanced"))
        .and(body_partial_json(json!({
            "site_id": "A",
            "filters": [{"field": "type", "operator": "in", "value": ["Call"]}]
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"results": []})))
        .expect(1)
        .mount(&server)
        .await;

    let search = SearchService::new(api(&server), Arc::new(TenantCache::new()), TTL, true);
    let query = SearchQuery::default().with_filter(SearchFilter::new("type", FilterOperator::In, json!(["Call"])));

    let out = search.search(&TenantContext::new("A"), query).await.unwrap();
    assert!(out.applied().unwrap().items.is_empty());
}

#[tokio::test]
async fn disabled_advanced_search_rejects_filters_offline() {
    let server = MockServer::start().await;
    let search = SearchService::new(api(&server), Arc::new(TenantCache::new()), TTL, false);
    let query = SearchQuery::default().with_filter(SearchFilter::new("lead", FilterOperator::Contains, json!("x")));

    let err = search.search(&TenantContext::new("A"), query).await.unwrap_err();

    assert_eq!(ImsError::from_anyhow(&err).unwrap().kind, ErrorKind::BadRequest);
    assert!(server.received_requests().await.unwrap().is_empty());
}

#[tokio::test]
async fn late_response_for_an_older_query_is_discarded() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/search/interactions"))
        .and(query_param("q", "kic"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(json!({"items": [hit("old", "Old")]}))
                .set_delay(Duration::from_millis(400)),
        )
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/api/search/interactions"))
        .and(query_param("q", "kickoff"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"items": [hit("new", "Kickoff")]})))
        .mount(&server)
        .await;

    let search = SearchService::new(api(&server), Arc::new(TenantCache::new()), TTL, true);
    let ctx = TenantContext::new("A");

    let (slow, fast) = tokio::join!(search.search(&ctx, SearchQuery::text("kic")), async {
        tokio::time::sleep(Duration::from_millis(50)).await;
        search.search(&ctx, SearchQuery::text("kickoff")).await
    });

    assert!(slow.unwrap().is_stale());
    assert!(matches!(fast.unwrap(), SearchOutcome::Applied(_)));
    assert_eq!(search.current().items[0].id, "new");
}

#[tokio::test]
async fn failed_search_publishes_an_empty_result_with_a_message() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/search/interactions"))
        .respond_with(ResponseTemplate::new(500))
        .expect(1)
        .mount(&server)
        .await;

    let search = SearchService::new(api(&server), Arc::new(TenantCache::new()), TTL, true);
    let rx = search.subscribe();

    assert!(search.search(&TenantContext::new("A"), SearchQuery::text("x")).await.is_err());

    let published = rx.borrow().clone();
    assert!(published.items.is_empty());
    assert!(!published.loading);
    assert_eq!(published.error.as_deref(), Some("Something went wrong. Please try again."));
}

#[tokio::test]
async fn create_invalidates_cached_search_for_the_site() {
    let server = MockServer::start().await;
    let calls = Arc::new(AtomicUsize::new(0));
    let counter = calls.clone();
    Mock::given(method("GET"))
        .and(path("/api/search/interactions"))
        .respond_with(move |_: &wiremock::Request| {
            counter.fetch_add(1, Ordering::SeqCst);
            ResponseTemplate::new(200).set_body_json(json!({"items": []}))
        })
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/api/interactions"))
        .and(body_partial_json(json!({"site_id": "A", "title": "Follow-up"})))
        .respond_with(ResponseTemplate::new(201).set_body_json(record("i-9", "Follow-up")))
        .expect(1)
        .mount(&server)
        .await;

    let cache = Arc::new(TenantCache::new());
    let events = Arc::new(EventHub::new());
    let created_events = Arc::new(AtomicUsize::new(0));
    let seen = created_events.clone();
    events.on(
        ServiceEventPattern::any(),
        Arc::new(move |_: &ServiceEvent| {
            seen.fetch_add(1, Ordering::SeqCst);
        }),
    );

    let search = SearchService::new(api(&server), cache.clone(), TTL, true);
    let interactions = InteractionService::new(api(&server), cache.clone(), events, TTL);
    let ctx = TenantContext::new("A");

    search.search(&ctx, SearchQuery::text("follow")).await.unwrap();
    search.search(&ctx, SearchQuery::text("follow")).await.unwrap();
    assert_eq!(calls.load(Ordering::SeqCst), 1);

    let created = interactions.create(&ctx, input("Follow-up")).await.unwrap();
    assert_eq!(created.id, "i-9");
    assert_eq!(created_events.load(Ordering::SeqCst), 1);

    search.search(&ctx, SearchQuery::text("follow")).await.unwrap();
    assert_eq!(calls.load(Ordering::SeqCst), 2);
}

#[tokio::test]
async fn get_reads_through_the_cache() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/interactions/i-1"))
        .and(query_param("site_id", "A"))
        .respond_with(ResponseTemplate::new(200).set_body_json(record("i-1", "Kickoff")))
        .expect(1)
        .mount(&server)
        .await;

    let svc = InteractionService::new(api(&server), Arc::new(TenantCache::new()), Arc::new(EventHub::new()), TTL);
    let ctx = TenantContext::new("A");

    assert_eq!(svc.get(&ctx, "i-1").await.unwrap().title, "Kickoff");
    let again = svc.get(&ctx, "i-1").await.unwrap();
    assert_eq!(again.interaction_type, InteractionType::Meeting);
}

#[tokio::test]
async fn failed_delete_keeps_the_cache() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/interactions"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([record("i-1", "Kickoff")])))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("DELETE"))
        .and(path("/api/interactions/i-1"))
        .respond_with(ResponseTemplate::new(403).set_body_json(json!({"message": "no"})))
        .mount(&server)
        .await;

    let cache = Arc::new(TenantCache::new());
    let svc = InteractionService::new(api(&server), cache.clone(), Arc::new(EventHub::new()), TTL);
    let ctx = TenantContext::new("A");

    svc.list(&ctx, Default::default()).await.unwrap();
    let err = svc.remove(&ctx, "i-1").await.unwrap_err();
    assert_eq!(ImsError::from_anyhow(&err).unwrap().kind, ErrorKind::Forbidden);

    assert_eq!(cache.len(), 1);
    assert_eq!(svc.list(&ctx, Default::default()).await.unwrap().items.len(), 1);
}

#[tokio::test]
async fn activity_log_is_best_effort() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/activity/log"))
        .and(body_partial_json(json!({"action": "export", "resource_type": "interaction", "site_id": "A"})))
        .respond_with(ResponseTemplate::new(201))
        .expect(1)
        .mount(&server)
        .await;

    let ctx = TenantContext::new("A");
    let entry = ims_services::ActivityEntry::new("export", "interaction");

    let enabled = ims_services::ActivityLogger::new(api(&server), true);
    assert!(enabled.log(&ctx, entry.clone()).await);

    let disabled = ims_services::ActivityLogger::new(api(&server), false);
    assert!(!disabled.log(&ctx, entry.clone()).await);

    let unreachable = ApiClient::new("http://127.0.0.1:1", Duration::from_millis(200)).unwrap();
    assert!(!ims_services::ActivityLogger::new(unreachable, true).log(&ctx, entry).await);
}

#[tokio::test]
async fn search_in_flight_during_a_create_is_not_cached() {
    let server = MockServer::start().await;
    let calls = Arc::new(AtomicUsize::new(0));
    let counter = calls.clone();
    Mock::given(method("GET"))
        .and(path("/api/search/interactions"))
        .respond_with(move |_: &wiremock::Request| {
            counter.fetch_add(1, Ordering::SeqCst);
            ResponseTemplate::new(200)
                .set_body_json(json!({"items": [hit("i-1", "Before")]}))
                .set_delay(Duration::from_millis(400))
        })
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/api/interactions"))
        .respond_with(ResponseTemplate::new(201).set_body_json(record("i-9", "After")))
        .expect(1)
        .mount(&server)
        .await;

    let cache = Arc::new(TenantCache::new());
    let search = SearchService::new(api(&server), cache.clone(), TTL, true);
    let interactions = InteractionService::new(api(&server), cache.clone(), Arc::new(EventHub::new()), TTL);
    let ctx = TenantContext::new("A");

    let (searched, created) = tokio::join!(search.search(&ctx, SearchQuery::text("before")), async {
        tokio::time::sleep(Duration::from_millis(50)).await;
        interactions.create(&ctx, input("After")).await
    });
    assert_eq!(created.unwrap().id, "i-9");
    // Still the latest search, so it is shown; it just must not be kept.
    assert!(matches!(searched.unwrap(), SearchOutcome::Applied(_)));
    assert!(cache.is_empty());

    search.search(&ctx, SearchQuery::text("before")).await.unwrap();
    assert_eq!(calls.load(Ordering::SeqCst), 2);
}

/// Counts GETs on `route` per `site_id` query value.
async fn counted(server: &MockServer, route: &str, body: Value) -> [Arc<AtomicUsize>; 2] {
    let a = Arc::new(AtomicUsize::new(0));
    let b = Arc::new(AtomicUsize::new(0));
    let (on_a, on_b) = (a.clone(), b.clone());
    Mock::given(method("GET"))
        .and(path(route))
        .respond_with(move |req: &wiremock::Request| {
            let site = req
                .url
                .query_pairs()
                .find(|(k, _)| k == "site_id")
                .map(|(_, v)| v.into_owned());
            match site.as_deref() {
                Some("A") => on_a.fetch_add(1, Ordering::SeqCst),
                Some("B") => on_b.fetch_add(1, Ordering::SeqCst),
                _ => 0,
            };
            ResponseTemplate::new(200).set_body_json(body.clone())
        })
        .mount(server)
        .await;
    [a, b]
}

struct Views {
    search: SearchService,
    interactions: Arc<InteractionService>,
    dashboard: DashboardService,
}

impl Views {
    fn new(server: &MockServer) -> Self {
        let cache = Arc::new(TenantCache::new());
        let interactions = Arc::new(InteractionService::new(
            api(server),
            cache.clone(),
            Arc::new(EventHub::new()),
            TTL,
        ));
        Self {
            search: SearchService::new(api(server), cache.clone(), TTL, true),
            dashboard: DashboardService::new(interactions.clone(), cache, TTL),
            interactions,
        }
    }

    /// Search, first list page and dashboard summary for `ctx`.
    async fn read_all(&self, ctx: &TenantContext) {
        self.search.search(ctx, SearchQuery::text("kickoff")).await.unwrap();
        self.interactions.list(ctx, ListParams::default()).await.unwrap();
        self.dashboard.summary(ctx).await.unwrap();
    }
}

async fn views_with_counters(server: &MockServer) -> (Views, [Arc<AtomicUsize>; 2], [Arc<AtomicUsize>; 2]) {
    let searches = counted(server, "/api/search/interactions", json!({"items": [hit("i-1", "Kickoff")]})).await;
    let lists = counted(server, "/api/interactions", json!([record("i-1", "Kickoff")])).await;
    (Views::new(server), searches, lists)
}

fn load(counter: &Arc<AtomicUsize>) -> usize {
    counter.load(Ordering::SeqCst)
}

#[tokio::test]
async fn update_refetches_every_view_of_the_site_only() {
    let server = MockServer::start().await;
    Mock::given(method("PUT"))
        .and(path("/api/interactions/i-1"))
        .respond_with(ResponseTemplate::new(200).set_body_json(record("i-1", "Renamed")))
        .expect(1)
        .mount(&server)
        .await;
    let (views, [search_a, search_b], [list_a, list_b]) = views_with_counters(&server).await;
    let (a, b) = (TenantContext::new("A"), TenantContext::new("B"));

    views.read_all(&a).await;
    views.read_all(&b).await;
    views.read_all(&a).await;
    // list page + the dashboard's sample page
    assert_eq!((load(&search_a), load(&list_a)), (1, 2));
    assert_eq!((load(&search_b), load(&list_b)), (1, 2));

    views.interactions.update(&a, "i-1", input("Renamed")).await.unwrap();

    views.read_all(&a).await;
    views.read_all(&b).await;
    assert_eq!((load(&search_a), load(&list_a)), (2, 4));
    assert_eq!((load(&search_b), load(&list_b)), (1, 2));
}

#[tokio::test]
async fn remove_refetches_every_view_of_the_site_only() {
    let server = MockServer::start().await;
    Mock::given(method("DELETE"))
        .and(path("/api/interactions/i-1"))
        .respond_with(ResponseTemplate::new(204))
        .expect(1)
        .mount(&server)
        .await;
    let (views, [search_a, search_b], [list_a, list_b]) = views_with_counters(&server).await;
    let (a, b) = (TenantContext::new("A"), TenantContext::new("B"));

    views.read_all(&a).await;
    views.read_all(&b).await;

    views.interactions.remove(&a, "i-1").await.unwrap();

    views.read_all(&a).await;
    views.read_all(&b).await;
    assert_eq!((load(&search_a), load(&list_a)), (2, 4));
    assert_eq!((load(&search_b), load(&list_b)), (1, 2));
}

#[tokio::test]
async fn recorded_activity_is_posted_while_the_runtime_lives() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/activity/log"))
        .and(body_partial_json(json!({"action": "login"})))
        .respond_with(ResponseTemplate::new(201))
        .expect(1)
        .mount(&server)
        .await;

    let logger = ims_services::ActivityLogger::new(api(&server), true);
    logger.record(&TenantContext::new("A"), ims_services::ActivityEntry::new("login", "session"));

    for _ in 0..50 {
        if !server.received_requests().await.unwrap().is_empty() {
            break;
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
    assert_eq!(server.received_requests().await.unwrap().len(), 1);
}
