use std::sync::Arc;

use axum::{
    Router,
    extract::State,
    http::{StatusCode, header::CONTENT_TYPE},
    middleware,
    response::{IntoResponse, Response},
    routing::get,
};

use crate::{
    application::{purge::PurgeService, repos::OptionStore},
    infra::cache::ResponseCache,
};

use super::{
    middleware::{log_responses, response_cache_layer, set_request_context},
    purge::purge_interceptor,
    store_health_response,
};

#[derive(Clone)]
pub struct PublicState {
    pub purge: Arc<PurgeService>,
    pub purge_param: Arc<str>,
    pub cache: ResponseCache,
    pub store: Arc<dyn OptionStore>,
}

/// Public listener. The purge interceptor sits outside the logging layer so
/// rejected tokens are not reported as request failures.
pub fn build_public_router(state: PublicState) -> Router {
    let cached_routes = Router::new()
        .route("/", get(index))
        .fallback(not_found)
        .layer(middleware::from_fn_with_state(
            state.cache.clone(),
            response_cache_layer,
        ));

    let uncached_routes = Router::new().route("/_health/store", get(public_health));

    cached_routes
        .merge(uncached_routes)
        .with_state(state.clone())
        .layer(middleware::from_fn(log_responses))
        .layer(middleware::from_fn_with_state(state, purge_interceptor))
        .layer(middleware::from_fn(set_request_context))
}

async fn index() -> Response {
    (
        StatusCode::OK,
        [(CONTENT_TYPE, "text/plain; charset=utf-8")],
        "remote-purge is running\n",
    )
        .into_response()
}

async fn not_found() -> Response {
    (StatusCode::NOT_FOUND, "Not found").into_response()
}

async fn public_health(State(state): State<PublicState>) -> Response {
    store_health_response(state.store.health_check().await)
}
