use std::sync::Arc;

use axum::{
    extract::{Request, State},
    http::{header, HeaderValue},
    middleware::Next,
    response::Response,
};
use tracing::{debug, warn};

use super::{
    cookie,
    identity::{self, Identity},
    tokens::{self, validate_token_plaintext, SCOPE_AUTHENTICATION},
};
use crate::{
    error::{ApiError, ModelError},
    state::AppState,
    validator::Validator,
};

/// Resolves the session cookie into an [`Identity`] for every request.
///
/// No cookie yields `Anonymous`. A malformed, unknown or expired token is
/// rejected with 401 before any handler runs.
pub async fn authenticate(
    State(state): State<AppState>,
    req: Request,
    next: Next,
) -> Result<Response, ApiError> {
    let Some(plaintext) = cookie::session_token(req.headers()) else {
        return Ok(next.run(identity::attach(req, Identity::Anonymous)).await);
    };

    let mut v = Validator::new();
    validate_token_plaintext(&mut v, &plaintext);
    if !v.valid() {
        warn!(errors = ?v.errors, "malformed session token");
        return Err(ApiError::InvalidAuthenticationToken);
    }

    let user = match tokens::resolve(state.tokens.as_ref(), SCOPE_AUTHENTICATION, &plaintext).await {
        Ok(user) => user,
        Err(ModelError::NotFound) => {
            warn!("unknown or expired session token");
            return Err(ApiError::InvalidAuthenticationToken);
        }
        Err(e) => return Err(e.into()),
    };

    debug!(user_id = user.id, "request authenticated");
    let mut res = next
        .run(identity::attach(req, Identity::Authenticated(Arc::new(user))))
        .await;
    res.headers_mut()
        .append(header::VARY, HeaderValue::from_static("Cookie"));
    Ok(res)
}

/// Gate for routes that need a signed-in user. Reads the identity left by
/// [`authenticate`] and never looks at tokens itself.
pub async fn require_authenticated(req: Request, next: Next) -> Result<Response, ApiError> {
    if identity::resolve(req.extensions())?.is_anonymous() {
        return Err(ApiError::AuthenticationRequired);
    }
    Ok(next.run(req).await)
}
