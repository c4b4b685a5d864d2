mod admin;
mod middleware;
mod public;
mod purge;

pub use admin::{AdminState, build_admin_router};
pub use middleware::{RequestContext, response_cache_layer};
pub use public::{PublicState, build_public_router};
pub use purge::{purge_interceptor, purge_response};

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use url::form_urlencoded;

use crate::application::error::ErrorReport;
use crate::application::repos::RepoError;

fn store_health_response(result: Result<(), RepoError>) -> Response {
    match result {
        Ok(()) => StatusCode::NO_CONTENT.into_response(),
        Err(err) => {
            let mut response = StatusCode::SERVICE_UNAVAILABLE.into_response();
            ErrorReport::from_error(
                "infra::http::store_health",
                StatusCode::SERVICE_UNAVAILABLE,
                &err,
            )
            .attach(&mut response);
            response
        }
    }
}

/// First value of `name` in a raw query string. Present-but-empty yields
/// `Some("")`.
pub(crate) fn query_param(query: Option<&str>, name: &str) -> Option<String> {
    form_urlencoded::parse(query?.as_bytes())
        .find(|(key, _)| key == name)
        .map(|(_, value)| value.into_owned())
}
