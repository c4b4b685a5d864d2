use axum::{
    body::Body,
    extract::State,
    http::{
        HeaderValue, Request,
        header::{CACHE_CONTROL, CONTENT_TYPE, EXPIRES, PRAGMA},
    },
    middleware::Next,
    response::{IntoResponse, Response},
};
use thiserror::Error;
use tracing::warn;

use crate::application::purge::PurgeOutcome;

use super::{public::PublicState, query_param};

const NO_CACHE: &str = "no-cache, must-revalidate, max-age=0, no-store, private";
const EXPIRES_IN_PAST: &str = "Wed, 11 Jan 1984 05:00:00 GMT";

#[derive(Debug, Error)]
enum PurgeRenderError {
    #[error("failed to serialize purge response: {0}")]
    Json(#[from] serde_json::Error),
    #[error("failed to assemble purge response: {0}")]
    Http(#[from] axum::http::Error),
}

/// Intercepts any request carrying the purge parameter and answers it
/// directly; everything else continues down the router.
pub async fn purge_interceptor(
    State(state): State<PublicState>,
    request: Request<Body>,
    next: Next,
) -> Response {
    let token = query_param(request.uri().query(), &state.purge_param);

    match state.purge.handle(token.as_deref()).await {
        Some(outcome) => purge_response(&outcome),
        None => next.run(request).await,
    }
}

/// Non-cacheable JSON response for a purge outcome.
///
/// Falls back to a plain-text page with the same status and message when the
/// JSON response cannot be assembled.
pub fn purge_response(outcome: &PurgeOutcome) -> Response {
    match json_response(outcome) {
        Ok(response) => response,
        Err(err) => {
            warn!(
                target = "remote_purge::http::purge",
                error = %err,
                "falling back to plain purge response"
            );
            plain_response(outcome)
        }
    }
}

fn json_response(outcome: &PurgeOutcome) -> Result<Response, PurgeRenderError> {
    let body = serde_json::to_vec(&outcome.body())?;
    let response = Response::builder()
        .status(outcome.code)
        .header(CACHE_CONTROL, NO_CACHE)
        .header(PRAGMA, "no-cache")
        .header(EXPIRES, EXPIRES_IN_PAST)
        .header(CONTENT_TYPE, "application/json")
        .body(Body::from(body))?;
    Ok(response)
}

fn plain_response(outcome: &PurgeOutcome) -> Response {
    (
        outcome.code,
        [
            (CACHE_CONTROL, HeaderValue::from_static(NO_CACHE)),
            (
                CONTENT_TYPE,
                HeaderValue::from_static("text/plain; charset=utf-8"),
            ),
        ],
        format!("{}: {}", outcome.status, outcome.message),
    )
        .into_response()
}
