//! Request-scoped identity.
//!
//! `authenticate` stores exactly one [`Identity`] in the request extensions
//! before any handler runs. Handlers and the `require_authenticated` gate read
//! it back with [`resolve`]; finding none means the middleware stack is
//! miswired, which is reported as [`InvariantViolation::MissingIdentity`].

use std::sync::Arc;

use axum::{
    async_trait,
    extract::FromRequestParts,
    http::{request::Parts, Extensions, Request},
};

use super::repo_types::User;
use crate::error::{ApiError, InvariantViolation};

#[derive(Debug, Clone)]
pub enum Identity {
    Anonymous,
    Authenticated(Arc<User>),
}

impl Identity {
    pub fn is_anonymous(&self) -> bool {
        matches!(self, Identity::Anonymous)
    }

    pub fn user(&self) -> Option<&User> {
        match self {
            Identity::Anonymous => None,
            Identity::Authenticated(user) => Some(user),
        }
    }
}

/// Returns `req` carrying `identity`, replacing any identity already attached.
pub fn attach<B>(mut req: Request<B>, identity: Identity) -> Request<B> {
    req.extensions_mut().insert(identity);
    req
}

pub fn resolve(extensions: &Extensions) -> Result<&Identity, InvariantViolation> {
    extensions
        .get::<Identity>()
        .ok_or(InvariantViolation::MissingIdentity)
}

/// Whatever identity the request carries, anonymous included.
pub struct CurrentIdentity(pub Identity);

#[async_trait]
impl<S> FromRequestParts<S> for CurrentIdentity
where
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        Ok(CurrentIdentity(resolve(&parts.extensions)?.clone()))
    }
}

/// The authenticated user; anonymous requests are rejected with 401.
pub struct AuthUser(pub User);

#[async_trait]
impl<S> FromRequestParts<S> for AuthUser
where
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        match resolve(&parts.extensions)? {
            Identity::Authenticated(user) => Ok(AuthUser(user.as_ref().clone())),
            Identity::Anonymous => Err(ApiError::AuthenticationRequired),
        }
    }
}
