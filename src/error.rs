use std::{collections::BTreeMap, time::Duration};

use axum::{
    extract::rejection::JsonRejection,
    http::{header, HeaderValue, Method, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use tracing::error;

use crate::auth::{password::PasswordError, repo_types::EMAIL_UNIQUE_CONSTRAINT, tokens::TokenError};

/// Storage-level failures. Driver errors are translated into this type once,
/// in `db::translate`, and never travel further up as `sqlx::Error`.
#[derive(Debug, thiserror::Error)]
pub enum ModelError {
    #[error("record not found")]
    NotFound,
    #[error("edit conflict")]
    EditConflict,
    #[error("duplicate key value violates unique constraint {0:?}")]
    DuplicateKey(String),
    #[error("storage operation timed out after {0:?}")]
    Timeout(Duration),
    #[error(transparent)]
    Fatal(#[from] anyhow::Error),
}

/// Broken programming invariants. These are bugs, not client errors; they
/// surface as a logged 500.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum InvariantViolation {
    #[error("missing identity in request extensions; is the authenticate middleware installed?")]
    MissingIdentity,
}

#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error("{0}")]
    BadRequest(String),
    #[error("the requested resource could not be found")]
    NotFound,
    #[error("the {0} method is not supported for this resource")]
    MethodNotAllowed(Method),
    #[error("failed validation")]
    FailedValidation(BTreeMap<String, String>),
    #[error("unable to update the record due to an edit conflict, please try again")]
    EditConflict,
    #[error("invalid authentication credentials")]
    InvalidCredentials,
    #[error("invalid or missing authentication token")]
    InvalidAuthenticationToken,
    #[error("you must be authenticated to access this resource")]
    AuthenticationRequired,
    #[error("request origin '{0}' is not allowed")]
    OriginNotAllowed(String),
    #[error(transparent)]
    Invariant(#[from] InvariantViolation),
    #[error(transparent)]
    Server(#[from] anyhow::Error),
}

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::BadRequest(_) => StatusCode::BAD_REQUEST,
            ApiError::NotFound => StatusCode::NOT_FOUND,
            ApiError::MethodNotAllowed(_) => StatusCode::METHOD_NOT_ALLOWED,
            ApiError::FailedValidation(_) => StatusCode::UNPROCESSABLE_ENTITY,
            ApiError::EditConflict => StatusCode::CONFLICT,
            ApiError::InvalidCredentials
            | ApiError::InvalidAuthenticationToken
            | ApiError::AuthenticationRequired => StatusCode::UNAUTHORIZED,
            ApiError::OriginNotAllowed(_) => StatusCode::FORBIDDEN,
            ApiError::Invariant(_) | ApiError::Server(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Single-field validation failure.
    pub fn field(key: &str, message: &str) -> Self {
        ApiError::FailedValidation(BTreeMap::from([(key.to_string(), message.to_string())]))
    }
}

impl From<ModelError> for ApiError {
    fn from(err: ModelError) -> Self {
        match err {
            ModelError::NotFound => ApiError::NotFound,
            ModelError::EditConflict => ApiError::EditConflict,
            ModelError::DuplicateKey(constraint) => {
                let (field, message) = unique_violation(&constraint);
                ApiError::field(field, message)
            }
            other => ApiError::Server(other.into()),
        }
    }
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        ApiError::BadRequest(rejection.body_text())
    }
}

impl From<PasswordError> for ApiError {
    fn from(err: PasswordError) -> Self {
        ApiError::Server(err.into())
    }
}

impl From<TokenError> for ApiError {
    fn from(err: TokenError) -> Self {
        match err {
            TokenError::Store(e) => e.into(),
            other => ApiError::Server(other.into()),
        }
    }
}

/// Maps a unique constraint name to the field a client can correct.
fn unique_violation(constraint: &str) -> (&str, &str) {
    match constraint {
        EMAIL_UNIQUE_CONSTRAINT => ("email", "a user with this email address already exists"),
        other => (other, "a record with this value already exists"),
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        let body = match &self {
            ApiError::FailedValidation(errors) => json!({ "error": errors }),
            ApiError::Invariant(violation) => {
                error!(error = %violation, "invariant violated");
                json!({ "error": SERVER_ERROR_MESSAGE })
            }
            ApiError::Server(e) => {
                error!(error = ?e, "request failed");
                json!({ "error": SERVER_ERROR_MESSAGE })
            }
            other => json!({ "error": other.to_string() }),
        };

        let mut res = (status, Json(body)).into_response();
        if matches!(self, ApiError::InvalidAuthenticationToken) {
            res.headers_mut()
                .insert(header::WWW_AUTHENTICATE, HeaderValue::from_static("Bearer"));
        }
        res
    }
}

const SERVER_ERROR_MESSAGE: &str =
    "the server encountered a problem and could not process your request";
