use axum::{
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use tracing::info;

use super::AdminState;

/// Operator purge from the admin listener; no key required.
pub(super) async fn purge_now(State(state): State<AdminState>) -> Response {
    state.purge_action.trigger().await;
    info!(target = "remote_purge::http::admin", "cache purged by operator");
    StatusCode::NO_CONTENT.into_response()
}
