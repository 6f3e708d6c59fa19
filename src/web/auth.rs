//! Session authentication for HTTP requests
//!
//! Tokens come from `Authorization: Bearer <token>`, falling back to a
//! `token` query parameter for clients that cannot set headers (players
//! loading a playlist).

use axum::{
    extract::{FromRequestParts, Request, State},
    http::{HeaderMap, request::Parts},
    middleware::Next,
    response::{IntoResponse, Response},
};
use axum_extra::headers::{Authorization, HeaderMapExt, authorization::Bearer};

use super::AppState;
use super::responses::apply_rate_limit_headers;
use crate::errors::AppError;
use crate::models::Session;

/// The caller's validated session, available to handlers behind [`session_auth_middleware`]
#[derive(Debug, Clone)]
pub struct SessionContext {
    pub token: String,
    pub session: Session,
}

impl<S> FromRequestParts<S> for SessionContext
where
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .extensions
            .get::<SessionContext>()
            .cloned()
            .ok_or(AppError::AuthInvalid)
    }
}

pub fn bearer_token(headers: &HeaderMap) -> Option<String> {
    headers
        .typed_get::<Authorization<Bearer>>()
        .map(|auth| auth.token().trim().to_string())
        .filter(|token| !token.is_empty())
}

pub fn query_token(query: Option<&str>) -> Option<String> {
    url::form_urlencoded::parse(query?.as_bytes())
        .find(|(key, _)| key == "token")
        .map(|(_, value)| value.trim().to_string())
        .filter(|token| !token.is_empty())
}

/// Header first, then query string
pub fn request_token(headers: &HeaderMap, query: Option<&str>) -> Option<String> {
    bearer_token(headers).or_else(|| query_token(query))
}

/// Validate the session and charge one call to its API budget.
///
/// Budget headers are attached to every response that got this far.
pub async fn session_auth_middleware(
    State(state): State<AppState>,
    mut request: Request,
    next: Next,
) -> Response {
    let Some(token) = request_token(request.headers(), request.uri().query()) else {
        return AppError::AuthInvalid.into_response();
    };

    let session = match state.sessions.validate(&token).await {
        Ok(session) => session,
        Err(e) => return e.into_response(),
    };

    let budget = match state.admission.api().check(&token).await {
        Ok(info) => info,
        Err(e) => return e.into_response(),
    };

    request
        .extensions_mut()
        .insert(SessionContext { token, session });

    let mut response = next.run(request).await;
    apply_rate_limit_headers(response.headers_mut(), &budget);
    response
}
