//! Contains the session guard middleware and the owner-match authorization policy.

use axum::{
    extract::{Request, State},
    middleware::Next,
    response::Response,
};
use axum_extra::extract::CookieJar;

use crate::{
    error::{ApiError, ApiResult},
    model::{
        assignment::{Assignment, NewAssignment},
        identity::Identity,
        submission::{Grade, NewSubmission},
    },
    state::AppState,
};

pub mod token;

use token::TOKEN_COOKIE;

/// Rejects the request unless it carries a valid `token` cookie.
/// The decoded [`Identity`] is handed to the handler as a request extension.
pub async fn handle_session_auth(
    State(state): State<AppState>,
    jar: CookieJar,
    mut request: Request,
    next: Next,
) -> Result<Response, ApiError> {
    let Some(cookie) = jar.get(TOKEN_COOKIE) else {
        return Err(ApiError::Unauthorized);
    };

    let identity = state.tokens.verify(cookie.value())?;
    request.extensions_mut().insert(identity);

    Ok(next.run(request).await)
}

/// The email of whoever owns a resource.
pub trait Owned {
    fn owner_email(&self) -> &str;
}

impl Owned for NewAssignment {
    fn owner_email(&self) -> &str {
        &self.publisher.email
    }
}

impl Owned for Assignment {
    fn owner_email(&self) -> &str {
        &self.publisher.email
    }
}

impl Owned for NewSubmission {
    fn owner_email(&self) -> &str {
        &self.examinee.email
    }
}

impl Owned for Grade {
    fn owner_email(&self) -> &str {
        &self.examiner
    }
}

/// The requester may only act on resources whose owner email equals their own.
pub fn authorize_owner(identity: &Identity, owner_email: &str) -> ApiResult<()> {
    if identity.email == owner_email {
        Ok(())
    } else {
        tracing::warn!("{} denied access to a resource owned by {}", identity.email, owner_email);
        Err(ApiError::Forbidden)
    }
}

pub fn authorize(identity: &Identity, resource: &impl Owned) -> ApiResult<()> {
    authorize_owner(identity, resource.owner_email())
}
