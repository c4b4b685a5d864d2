//! Token verification for remote purge requests.

use std::sync::Arc;

use async_trait::async_trait;
use axum::http::StatusCode;
use metrics::counter;
use remote_purge_api_types::{PurgeResponseBody, PurgeStatus};
use tracing::{debug, error, info};

use crate::application::key_store::KeyStore;

pub const PURGED_MESSAGE: &str = "Cache purged.";
pub const INVALID_KEY_MESSAGE: &str = "Invalid key.";
pub const UNAVAILABLE_MESSAGE: &str = "Purge key unavailable.";

/// Cache-invalidation side effect fired on a verified purge request.
///
/// Implementations must not block the caller on downstream work; nothing is
/// reported back.
#[async_trait]
pub trait PurgeAction: Send + Sync {
    async fn trigger(&self);
}

/// Fires every wrapped action in registration order.
#[derive(Clone, Default)]
pub struct PurgeFanout {
    actions: Vec<Arc<dyn PurgeAction>>,
}

impl PurgeFanout {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, action: Arc<dyn PurgeAction>) -> Self {
        self.actions.push(action);
        self
    }
}

#[async_trait]
impl PurgeAction for PurgeFanout {
    async fn trigger(&self) {
        for action in &self.actions {
            action.trigger().await;
        }
    }
}

/// Result of a purge request that carried a token.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PurgeOutcome {
    pub status: PurgeStatus,
    pub message: &'static str,
    pub code: StatusCode,
}

impl PurgeOutcome {
    pub fn purged() -> Self {
        Self {
            status: PurgeStatus::Success,
            message: PURGED_MESSAGE,
            code: StatusCode::OK,
        }
    }

    pub fn invalid_key() -> Self {
        Self {
            status: PurgeStatus::Fail,
            message: INVALID_KEY_MESSAGE,
            code: StatusCode::UNPROCESSABLE_ENTITY,
        }
    }

    pub fn unavailable() -> Self {
        Self {
            status: PurgeStatus::Fail,
            message: UNAVAILABLE_MESSAGE,
            code: StatusCode::SERVICE_UNAVAILABLE,
        }
    }

    pub fn body(&self) -> PurgeResponseBody {
        PurgeResponseBody {
            status: self.status,
            message: self.message.to_string(),
        }
    }
}

#[derive(Clone)]
pub struct PurgeService {
    keys: KeyStore,
    action: Arc<dyn PurgeAction>,
}

impl PurgeService {
    pub fn new(keys: KeyStore, action: Arc<dyn PurgeAction>) -> Self {
        Self { keys, action }
    }

    /// Verify `token` and fire the purge action on a match.
    ///
    /// Returns `None` when no token was supplied; the request is not ours.
    pub async fn handle(&self, token: Option<&str>) -> Option<PurgeOutcome> {
        let token = token?;

        let stored = match self.keys.get().await {
            Ok(stored) => stored,
            Err(err) => {
                counter!("remote_purge_requests_total", "outcome" => "unavailable").increment(1);
                error!(
                    target = "remote_purge::purge",
                    error = %err,
                    "purge key could not be loaded; rejecting request"
                );
                return Some(PurgeOutcome::unavailable());
            }
        };

        let verified = stored.as_ref().is_some_and(|key| key.matches(token));
        if !verified {
            counter!("remote_purge_requests_total", "outcome" => "invalid").increment(1);
            debug!(
                target = "remote_purge::purge",
                key_initialized = stored.is_some(),
                "purge token rejected"
            );
            return Some(PurgeOutcome::invalid_key());
        }

        self.action.trigger().await;
        counter!("remote_purge_requests_total", "outcome" => "success").increment(1);
        info!(target = "remote_purge::purge", "remote purge triggered");
        Some(PurgeOutcome::purged())
    }
}
