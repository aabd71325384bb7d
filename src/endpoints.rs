//! Contains all endpoint functions.
//!
//! The session endpoints and the liveness check live here; the collection endpoints are in the
//! `assignment` and `submission` submodules.

use axum::{
    Json,
    extract::{Request, State},
    http::Method,
    middleware::Next,
    response::{IntoResponse, Response},
};
use axum_extra::extract::CookieJar;
use uuid::Uuid;
use validator::Validate;

use crate::{
    error::{ApiError, ApiResult},
    model::{api_response::ApiResponse, identity::Identity},
    state::AppState,
};

pub mod assignment;
pub mod submission;

/// Liveness check.
pub async fn root() -> &'static str {
    "Server is Running."
}

/// Issues a session token for the posted identity and stores it in the `token` cookie.
pub async fn issue_token(
    State(state): State<AppState>,
    jar: CookieJar,
    Json(identity): Json<Identity>,
) -> ApiResult<impl IntoResponse> {
    identity.validate()?;
    let token = state.tokens.issue(&identity)?;

    tracing::info!("Issued session for {}", identity.email);
    Ok((
        jar.add(state.tokens.cookie(token)),
        Json(ApiResponse::success(None::<()>, "Session started")),
    ))
}

/// Clears the `token` cookie. The token itself stays valid until it expires.
pub async fn logout(State(state): State<AppState>, jar: CookieJar) -> impl IntoResponse {
    (
        jar.add(state.tokens.removal_cookie()),
        Json(ApiResponse::success(None::<()>, "Session ended")),
    )
}

/// Logs method, path and status of every non-preflight request.
pub async fn log_request(request: Request, next: Next) -> Response {
    if request.method() == Method::OPTIONS {
        return next.run(request).await;
    }

    let method = request.method().clone();
    let path = request.uri().path().to_owned();
    let response = next.run(request).await;

    tracing::info!(
        method = %method,
        path = %path,
        status = response.status().as_u16(),
        "Handled request"
    );
    response
}

/// Store ids are UUIDs; anything else is the client's mistake.
pub(crate) fn parse_id(raw: &str) -> ApiResult<Uuid> {
    Uuid::parse_str(raw).map_err(|_| ApiError::BadRequest(format!("Invalid id: {raw}")))
}
