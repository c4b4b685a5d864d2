use axum::{
    Json,
    extract::State,
    http::{StatusCode, Uri, header::CACHE_CONTROL},
    response::{IntoResponse, Redirect, Response},
};
use remote_purge_api_types::PurgePanelView;

use crate::application::{
    error::{AppError, HttpError},
    panel::REGENERATED_NOTICE,
    regeneration::{ERROR_PARAM, INVALID_NONCE_ERROR},
};

use super::super::query_param;
use super::AdminState;

const INVALID_NONCE_MESSAGE: &str = "The regeneration link is invalid or has expired.";

pub(super) async fn purge_settings(State(state): State<AdminState>, uri: Uri) -> Response {
    match render_settings(&state, &uri).await {
        Ok(response) => response,
        Err(err) => err.into_response(),
    }
}

async fn render_settings(state: &AdminState, uri: &Uri) -> Result<Response, AppError> {
    let params = state.regeneration.params();
    let nonce = query_param(uri.query(), &params.nonce_param);

    if let Some(outcome) = state.regeneration.maybe_regenerate(nonce.as_deref()).await? {
        let target = state
            .regeneration
            .redirect_target(uri.path(), uri.query(), outcome);
        return Ok(Redirect::to(&target).into_response());
    }

    let Some(purge_url) = state.panel.purge_url().await? else {
        return Ok(HttpError::new(
            "infra::http::admin::purge_settings",
            StatusCode::INTERNAL_SERVER_ERROR,
            "Purge key not initialized",
            "purge key missing from the option store",
        )
        .into_response());
    };

    let notice = query_param(uri.query(), &params.status_param)
        .filter(|value| value == "true" || value == "1")
        .map(|_| REGENERATED_NOTICE.to_string());
    let error = query_param(uri.query(), ERROR_PARAM)
        .filter(|code| code == INVALID_NONCE_ERROR)
        .map(|_| INVALID_NONCE_MESSAGE.to_string());

    let view = PurgePanelView {
        purge_url: purge_url.to_string(),
        regenerate_url: state.regeneration.regenerate_url(uri.path()).await,
        notice,
        error,
    };

    Ok(([(CACHE_CONTROL, "no-store")], Json(view)).into_response())
}
