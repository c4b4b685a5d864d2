use std::num::NonZeroUsize;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;
use axum::{
    Router,
    body::Body,
    http::{
        Method, Request, StatusCode,
        header::{CACHE_CONTROL, CONTENT_TYPE, EXPIRES, PRAGMA},
    },
};
use http_body_util::BodyExt;
use remote_purge::application::{
    key_store::{DEFAULT_OPTION_NAME, KeyStore},
    purge::{PurgeAction, PurgeFanout, PurgeService},
    repos::{OptionStore, RepoError},
};
use remote_purge::infra::{
    cache::{ResponseCache, ResponseCachePurge},
    http::{PublicState, build_public_router},
    memory::MemoryOptionStore,
};
use remote_purge_api_types::{PurgeResponseBody, PurgeStatus};
use tower::ServiceExt;

#[derive(Default)]
struct CountingAction {
    calls: AtomicUsize,
}

impl CountingAction {
    fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl PurgeAction for CountingAction {
    async fn trigger(&self) {
        self.calls.fetch_add(1, Ordering::SeqCst);
    }
}

struct UnavailableStore;

#[async_trait]
impl OptionStore for UnavailableStore {
    async fn read_option(&self, _name: &str) -> Result<Option<String>, RepoError> {
        Err(RepoError::Timeout)
    }

    async fn write_option(&self, _name: &str, _value: &str) -> Result<(), RepoError> {
        Err(RepoError::Timeout)
    }

    async fn health_check(&self) -> Result<(), RepoError> {
        Err(RepoError::Timeout)
    }
}

struct Harness {
    router: Router,
    action: Arc<CountingAction>,
    cache: ResponseCache,
}

fn harness(store: Arc<dyn OptionStore>) -> Harness {
    harness_with_cache_limit(store, 64)
}

fn harness_with_cache_limit(store: Arc<dyn OptionStore>, limit: usize) -> Harness {
    let cache = ResponseCache::new(NonZeroUsize::new(limit).expect("non-zero limit"));
    let action = Arc::new(CountingAction::default());
    let fanout = PurgeFanout::new()
        .with(Arc::new(ResponseCachePurge::new(cache.clone())))
        .with(action.clone());

    let state = PublicState {
        purge: Arc::new(PurgeService::new(
            KeyStore::new(store.clone()),
            Arc::new(fanout),
        )),
        purge_param: Arc::from("purge"),
        cache: cache.clone(),
        store,
    };

    Harness {
        router: build_public_router(state),
        action,
        cache,
    }
}

fn keyed_harness(key: &str) -> Harness {
    harness(Arc::new(MemoryOptionStore::with_option(
        DEFAULT_OPTION_NAME,
        key,
    )))
}

async fn get(router: &Router, uri: &str) -> axum::response::Response {
    let request = Request::builder()
        .method(Method::GET)
        .uri(uri)
        .body(Body::empty())
        .expect("request should build");
    router
        .clone()
        .oneshot(request)
        .await
        .expect("router should respond")
}

async fn purge_body(response: axum::response::Response) -> PurgeResponseBody {
    let bytes = response
        .into_body()
        .collect()
        .await
        .expect("body should collect")
        .to_bytes();
    serde_json::from_slice(&bytes).expect("purge body should be json")
}

#[tokio::test]
async fn matching_key_purges_and_reports_success() {
    let harness = keyed_harness("abc123");

    let response = get(&harness.router, "/?purge=abc123").await;

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(response.headers()[CONTENT_TYPE], "application/json");
    assert!(
        response.headers()[CACHE_CONTROL]
            .to_str()
            .expect("ascii header")
            .contains("no-store")
    );
    assert_eq!(response.headers()[PRAGMA], "no-cache");
    assert!(response.headers().contains_key(EXPIRES));

    let body = purge_body(response).await;
    assert_eq!(body.status, PurgeStatus::Success);
    assert_eq!(body.message, "Cache purged.");
    assert_eq!(harness.action.calls(), 1);
}

#[tokio::test]
async fn wrong_key_is_rejected_without_purging() {
    let harness = keyed_harness("abc123");

    let response = get(&harness.router, "/?purge=xyz").await;

    assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(response.headers()[PRAGMA], "no-cache");
    let body = purge_body(response).await;
    assert_eq!(body.status, PurgeStatus::Fail);
    assert_eq!(body.message, "Invalid key.");
    assert_eq!(harness.action.calls(), 0);
}

#[tokio::test]
async fn empty_key_parameter_is_rejected() {
    let harness = keyed_harness("abc123");

    let response = get(&harness.router, "/?purge=").await;

    assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(purge_body(response).await.status, PurgeStatus::Fail);
    assert_eq!(harness.action.calls(), 0);
}

#[tokio::test]
async fn requests_without_the_parameter_fall_through() {
    let harness = keyed_harness("abc123");

    let response = get(&harness.router, "/?page=2").await;

    assert_eq!(response.status(), StatusCode::OK);
    let bytes = response
        .into_body()
        .collect()
        .await
        .expect("body should collect")
        .to_bytes();
    assert_eq!(&bytes[..], b"remote-purge is running\n");
    assert_eq!(harness.action.calls(), 0);
}

#[tokio::test]
async fn any_path_accepts_the_purge_parameter() {
    let harness = keyed_harness("abc123");

    let response = get(&harness.router, "/blog/some-post/?utm=x&purge=abc123").await;

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(purge_body(response).await.status, PurgeStatus::Success);
    assert_eq!(harness.action.calls(), 1);
}

#[tokio::test]
async fn successful_purge_empties_the_response_cache() {
    let harness = keyed_harness("abc123");

    get(&harness.router, "/").await;
    get(&harness.router, "/?page=2").await;
    assert_eq!(harness.cache.len().await, 2);

    let rejected = get(&harness.router, "/?purge=nope").await;
    assert_eq!(rejected.status(), StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(harness.cache.len().await, 2);

    let purged = get(&harness.router, "/?purge=abc123").await;
    assert_eq!(purged.status(), StatusCode::OK);
    assert!(harness.cache.is_empty().await);
}

#[tokio::test]
async fn distinct_query_strings_cannot_grow_the_cache_past_its_limit() {
    let harness = harness_with_cache_limit(
        Arc::new(MemoryOptionStore::with_option(DEFAULT_OPTION_NAME, "abc123")),
        4,
    );

    for i in 0..50 {
        let response = get(&harness.router, &format!("/?junk={i}")).await;
        assert_eq!(response.status(), StatusCode::OK);
    }

    assert_eq!(harness.cache.len().await, 4);
    assert_eq!(harness.action.calls(), 0);
}

#[tokio::test]
async fn purge_responses_are_never_cached() {
    let harness = keyed_harness("abc123");

    get(&harness.router, "/?purge=abc123").await;
    get(&harness.router, "/?purge=xyz").await;

    assert!(harness.cache.is_empty().await);
}

#[tokio::test]
async fn uninitialized_key_rejects_every_token() {
    let harness = harness(Arc::new(MemoryOptionStore::new()));

    let response = get(&harness.router, "/?purge=").await;

    assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(harness.action.calls(), 0);
}

#[tokio::test]
async fn unavailable_store_fails_closed() {
    let harness = harness(Arc::new(UnavailableStore));

    let response = get(&harness.router, "/?purge=abc123").await;

    assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
    assert_eq!(response.headers()[PRAGMA], "no-cache");
    let body = purge_body(response).await;
    assert_eq!(body.status, PurgeStatus::Fail);
    assert_eq!(body.message, "Purge key unavailable.");
    assert_eq!(harness.action.calls(), 0);
}

#[tokio::test]
async fn store_health_reflects_availability() {
    let healthy = keyed_harness("abc123");
    let response = get(&healthy.router, "/_health/store").await;
    assert_eq!(response.status(), StatusCode::NO_CONTENT);

    let broken = harness(Arc::new(UnavailableStore));
    let response = get(&broken.router, "/_health/store").await;
    assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
}
