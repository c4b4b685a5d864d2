use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use axum::{
    Router,
    body::Body,
    http::{Method, Request, StatusCode, header::LOCATION},
    response::Response,
};
use http_body_util::BodyExt;
use remote_purge::application::{
    key_store::{DEFAULT_OPTION_NAME, KeyStore},
    nonce::{NonceService, REGENERATE_SCOPE},
    panel::PurgePanel,
    purge::PurgeAction,
    regeneration::{KeyRegenerationGuard, RegenerationParams},
    repos::{OptionStore, RepoError},
};
use remote_purge::infra::{
    http::{AdminState, build_admin_router},
    memory::MemoryOptionStore,
    nonce::InMemoryNonceService,
};
use remote_purge_api_types::PurgePanelView;
use tower::ServiceExt;
use url::Url;

const SETTINGS: &str = "/settings/purge";

#[derive(Default)]
struct CountingAction {
    calls: AtomicUsize,
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
        Err(RepoError::from_persistence("connection refused"))
    }

    async fn write_option(&self, _name: &str, _value: &str) -> Result<(), RepoError> {
        Err(RepoError::from_persistence("connection refused"))
    }

    async fn health_check(&self) -> Result<(), RepoError> {
        Err(RepoError::from_persistence("connection refused"))
    }
}

struct Harness {
    router: Router,
    keys: KeyStore,
    nonces: Arc<InMemoryNonceService>,
    action: Arc<CountingAction>,
}

fn harness(store: Arc<dyn OptionStore>) -> Harness {
    let keys = KeyStore::new(store.clone());
    let nonces = Arc::new(InMemoryNonceService::new(Duration::from_secs(60), 32));
    let action = Arc::new(CountingAction::default());

    let state = AdminState {
        panel: Arc::new(PurgePanel::new(
            keys.clone(),
            Url::parse("https://blog.example.test/").expect("site url"),
            "purge",
        )),
        regeneration: Arc::new(KeyRegenerationGuard::new(
            keys.clone(),
            nonces.clone(),
            RegenerationParams::default(),
        )),
        purge_action: action.clone(),
        store,
    };

    Harness {
        router: build_admin_router(state),
        keys,
        nonces,
        action,
    }
}

fn seeded_harness() -> Harness {
    harness(Arc::new(MemoryOptionStore::with_option(
        DEFAULT_OPTION_NAME,
        "abc123",
    )))
}

async fn send(router: &Router, method: Method, uri: &str) -> Response {
    let request = Request::builder()
        .method(method)
        .uri(uri)
        .body(Body::empty())
        .expect("request should build");
    router
        .clone()
        .oneshot(request)
        .await
        .expect("router should respond")
}

async fn panel_view(router: &Router, uri: &str) -> PurgePanelView {
    let response = send(router, Method::GET, uri).await;
    assert_eq!(response.status(), StatusCode::OK);
    let bytes = response
        .into_body()
        .collect()
        .await
        .expect("body should collect")
        .to_bytes();
    serde_json::from_slice(&bytes).expect("panel view should be json")
}

fn location(response: &Response) -> &str {
    response.headers()[LOCATION]
        .to_str()
        .expect("ascii location")
}

#[tokio::test]
async fn settings_page_exposes_purge_url_and_regeneration_link() {
    let harness = seeded_harness();

    let view = panel_view(&harness.router, SETTINGS).await;

    assert_eq!(view.purge_url, "https://blog.example.test/?purge=abc123");
    assert!(view.regenerate_url.starts_with("/settings/purge?regen="));
    assert!(view.notice.is_none());
    assert!(view.error.is_none());
}

#[tokio::test]
async fn valid_nonce_rotates_key_and_redirects_with_success_marker() {
    let harness = seeded_harness();
    let view = panel_view(&harness.router, SETTINGS).await;

    let response = send(&harness.router, Method::GET, &view.regenerate_url).await;

    assert_eq!(response.status(), StatusCode::SEE_OTHER);
    assert_eq!(location(&response), "/settings/purge?regenerated=true");

    let key = harness.keys.get().await.expect("store").expect("key");
    assert_ne!(key.as_str(), "abc123");
    assert_eq!(key.as_str().len(), 64);

    let after = panel_view(&harness.router, location(&response)).await;
    assert_eq!(
        after.notice.as_deref(),
        Some("Purge key regenerated successfully!")
    );
    assert_eq!(
        after.purge_url,
        format!("https://blog.example.test/?purge={}", key.as_str())
    );
}

#[tokio::test]
async fn reused_nonce_is_rejected_and_key_is_kept() {
    let harness = seeded_harness();
    let view = panel_view(&harness.router, SETTINGS).await;

    let first = send(&harness.router, Method::GET, &view.regenerate_url).await;
    assert_eq!(first.status(), StatusCode::SEE_OTHER);
    let rotated = harness.keys.get().await.expect("store").expect("key");

    let replay = send(&harness.router, Method::GET, &view.regenerate_url).await;

    assert_eq!(replay.status(), StatusCode::SEE_OTHER);
    assert_eq!(
        location(&replay),
        "/settings/purge?regenerated=0&error=invalid_nonce"
    );
    assert_eq!(harness.keys.get().await.expect("store"), Some(rotated));

    let after = panel_view(&harness.router, location(&replay)).await;
    assert!(after.notice.is_none());
    assert_eq!(
        after.error.as_deref(),
        Some("The regeneration link is invalid or has expired.")
    );
}

#[tokio::test]
async fn forged_nonce_leaves_key_untouched() {
    let harness = seeded_harness();

    let response = send(
        &harness.router,
        Method::GET,
        "/settings/purge?regen=forged-value",
    )
    .await;

    assert_eq!(response.status(), StatusCode::SEE_OTHER);
    assert_eq!(
        location(&response),
        "/settings/purge?regenerated=0&error=invalid_nonce"
    );
    let key = harness.keys.get().await.expect("store").expect("key");
    assert_eq!(key.as_str(), "abc123");
}

#[tokio::test]
async fn unknown_error_codes_are_not_echoed() {
    let harness = seeded_harness();

    let view = panel_view(
        &harness.router,
        "/settings/purge?regenerated=0&error=%3Cscript%3E",
    )
    .await;

    assert!(view.error.is_none());
    assert!(view.notice.is_none());
}

#[tokio::test]
async fn store_failure_during_regeneration_is_not_reported_as_success() {
    let harness = harness(Arc::new(UnavailableStore));
    let nonce = harness.nonces.create(REGENERATE_SCOPE).await;

    let response = send(
        &harness.router,
        Method::GET,
        &format!("/settings/purge?regen={nonce}"),
    )
    .await;

    assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
    assert!(response.headers().get(LOCATION).is_none());
    assert!(!harness.nonces.verify(&nonce, REGENERATE_SCOPE).await);
}

#[tokio::test]
async fn settings_page_reports_unavailable_store() {
    let harness = harness(Arc::new(UnavailableStore));

    let response = send(&harness.router, Method::GET, SETTINGS).await;

    assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
}

#[tokio::test]
async fn operator_purge_fires_the_action() {
    let harness = seeded_harness();

    let response = send(&harness.router, Method::POST, "/cache/purge").await;

    assert_eq!(response.status(), StatusCode::NO_CONTENT);
    assert_eq!(harness.action.calls.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn admin_store_health_reflects_availability() {
    let healthy = seeded_harness();
    let response = send(&healthy.router, Method::GET, "/_health/store").await;
    assert_eq!(response.status(), StatusCode::NO_CONTENT);

    let broken = harness(Arc::new(UnavailableStore));
    let response = send(&broken.router, Method::GET, "/_health/store").await;
    assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
}
