mod cache;
mod health;
mod settings;
mod state;

pub use state::AdminState;

use axum::{
    Router, middleware,
    routing::{get, post},
};

use super::middleware::{log_responses, set_request_context};

pub const PURGE_SETTINGS_PATH: &str = "/settings/purge";

/// Admin listener. Reaching it is the authorization boundary; bind it to a
/// private interface.
pub fn build_admin_router(state: AdminState) -> Router {
    Router::new()
        .route(PURGE_SETTINGS_PATH, get(settings::purge_settings))
        .route("/cache/purge", post(cache::purge_now))
        .route("/_health/store", get(health::admin_health))
        .with_state(state)
        .layer(middleware::from_fn(log_responses))
        .layer(middleware::from_fn(set_request_context))
}
