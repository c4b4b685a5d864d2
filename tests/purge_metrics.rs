use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use metrics_util::debugging::{DebugValue, DebuggingRecorder};
use remote_purge::application::{
    key_store::{DEFAULT_OPTION_NAME, KeyStore},
    nonce::{NonceService, REGENERATE_SCOPE},
    purge::{PurgeAction, PurgeFanout, PurgeService},
    regeneration::{KeyRegenerationGuard, RegenerationParams},
    repos::{OptionStore, RepoError},
};
use remote_purge::infra::{memory::MemoryOptionStore, nonce::InMemoryNonceService};

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

#[tokio::test]
async fn purge_paths_emit_expected_metric_keys() {
    let recorder = DebuggingRecorder::new();
    let snapshotter = recorder.snapshotter();
    recorder
        .install()
        .expect("debug metrics recorder should install in this test process");

    let store = Arc::new(MemoryOptionStore::with_option(DEFAULT_OPTION_NAME, "abc123"));
    let keys = KeyStore::new(store);
    let action: Arc<dyn PurgeAction> = Arc::new(PurgeFanout::new());
    let purge = PurgeService::new(keys.clone(), action.clone());

    purge.handle(Some("abc123")).await;
    purge.handle(Some("xyz")).await;
    purge.handle(Some("")).await;

    let broken = PurgeService::new(KeyStore::new(Arc::new(UnavailableStore)), action);
    broken.handle(Some("abc123")).await;

    let nonces = Arc::new(InMemoryNonceService::new(Duration::from_secs(60), 8));
    let guard = KeyRegenerationGuard::new(keys, nonces.clone(), RegenerationParams::default());
    let nonce = nonces.create(REGENERATE_SCOPE).await;
    guard
        .maybe_regenerate(Some(&nonce))
        .await
        .expect("regeneration succeeds");
    guard
        .maybe_regenerate(Some(&nonce))
        .await
        .expect("replay is reported, not failed");

    let snapshot = snapshotter.snapshot().into_vec();

    let names: HashSet<String> = snapshot
        .iter()
        .map(|(composite_key, _, _, _)| composite_key.key().name().to_string())
        .collect();
    for metric in [
        "remote_purge_requests_total",
        "remote_purge_key_regenerations_total",
        "remote_purge_nonce_rejections_total",
    ] {
        assert!(names.contains(metric), "missing metric: {metric}");
    }

    let outcome_count = |outcome: &str| {
        snapshot
            .iter()
            .filter(|(composite_key, _, _, _)| {
                let key = composite_key.key();
                key.name() == "remote_purge_requests_total"
                    && key
                        .labels()
                        .any(|label| label.key() == "outcome" && label.value() == outcome)
            })
            .map(|(_, _, _, value)| match value {
                DebugValue::Counter(count) => *count,
                _ => 0,
            })
            .sum::<u64>()
    };

    assert_eq!(outcome_count("success"), 1);
    assert_eq!(outcome_count("invalid"), 2);
    assert_eq!(outcome_count("unavailable"), 1);
}
