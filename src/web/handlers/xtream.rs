//! Xtream Codes player API
//!
//! Rejected credentials answer HTTP 200 with `{"user_info":{"auth":0}}`;
//! players read any other status as a network failure.

use axum::{
    Form, Json,
    extract::{Path, Query, State},
    response::{IntoResponse, Response},
};
use tracing::debug;

use crate::errors::AppError;
use crate::models::Subscription;
use crate::services::admission::RateLimitInfo;
use crate::utils::log_prefix;
use crate::web::{
    AppState,
    responses::{apply_rate_limit_headers, found},
};
use crate::xtream::{XtreamApiRequest, XtreamAuthFailure};

pub async fn player_api(
    State(state): State<AppState>,
    Query(request): Query<XtreamApiRequest>,
) -> Response {
    handle_player_api(&state, request).await
}

pub async fn player_api_form(
    State(state): State<AppState>,
    Form(request): Form<XtreamApiRequest>,
) -> Response {
    handle_player_api(&state, request).await
}

async fn handle_player_api(state: &AppState, request: XtreamApiRequest) -> Response {
    let (subscription, budget) = match admit(state, &request.username).await {
        Ok(admitted) => admitted,
        Err(AppError::AuthInvalid) => {
            debug!(token = %log_prefix(&request.username), "Xtream credentials rejected");
            return Json(XtreamAuthFailure::new()).into_response();
        }
        Err(e) => return e.into_response(),
    };

    let mut response = match state.xtream.respond(&subscription, &request).await {
        Ok(body) => Json(body).into_response(),
        Err(e) => e.into_response(),
    };
    apply_rate_limit_headers(response.headers_mut(), &budget);
    response
}

/// `GET /<prefix>/<username>/<password>/<stream_id>.<ext>`
pub async fn stream_redirect(
    State(state): State<AppState>,
    Path((username, _password, stream_file)): Path<(String, String, String)>,
) -> Response {
    let (subscription, budget) = match admit(&state, &username).await {
        Ok(admitted) => admitted,
        Err(e) => return e.into_response(),
    };

    let mut response = match state.xtream.stream_redirect(&subscription, &stream_file).await {
        Ok(grant) => found(&grant.url),
        Err(e) => e.into_response(),
    };
    apply_rate_limit_headers(response.headers_mut(), &budget);
    response
}

/// Authenticate the API token and charge one call to its budget
async fn admit(state: &AppState, api_token: &str) -> Result<(Subscription, RateLimitInfo), AppError> {
    let subscription = state.xtream.authenticate(api_token).await?;
    let budget = state.admission.api().check(api_token).await?;
    Ok((subscription, budget))
}
