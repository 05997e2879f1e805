use axum::{
    extract::{rejection::JsonRejection, State},
    http::{header, StatusCode},
    response::IntoResponse,
    Json,
};
use tracing::{debug, info, instrument, warn};

use super::{
    cookie,
    dto::{LoginRequest, MessageResponse, RegisterRequest, UpdateMeRequest, UserResponse, WhoAmIResponse},
    identity::{AuthUser, CurrentIdentity},
    password::{self, validate_password_plaintext, validate_password_present, Password},
    repo_types::{validate_email, validate_name, validate_user, User},
    tokens::{self, SCOPE_AUTHENTICATION},
};
use crate::{
    error::{ApiError, ModelError},
    state::AppState,
    validator::Validator,
};

fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}

#[instrument(skip(state, payload))]
pub async fn register(
    State(state): State<AppState>,
    payload: Result<Json<RegisterRequest>, JsonRejection>,
) -> Result<(StatusCode, Json<UserResponse>), ApiError> {
    let Json(payload) = payload?;
    let email = normalize_email(&payload.email);

    let mut v = Validator::new();
    validate_name(&mut v, &payload.name);
    validate_email(&mut v, &email);
    validate_password_plaintext(&mut v, &payload.password);
    if !v.valid() {
        warn!(errors = ?v.errors, "registration rejected");
    }
    v.finish()?;

    let password = Password::new_blocking(payload.password).await?;
    let mut user = User::new(payload.name, email, password);
    state.users.insert_user(&mut user).await?;

    info!(user_id = user.id, email = %user.email, "user registered");
    Ok((StatusCode::CREATED, Json(UserResponse { user })))
}

#[instrument(skip(state, payload))]
pub async fn login(
    State(state): State<AppState>,
    payload: Result<Json<LoginRequest>, JsonRejection>,
) -> Result<impl IntoResponse, ApiError> {
    let Json(payload) = payload?;
    let email = normalize_email(&payload.email);

    let mut v = Validator::new();
    validate_email(&mut v, &email);
    validate_password_present(&mut v, &payload.password);
    v.finish()?;

    let user = match state.users.user_by_email(&email).await {
        Ok(user) => user,
        Err(ModelError::NotFound) => {
            password::verify_dummy(payload.password).await?;
            warn!(email = %email, "login unknown email");
            return Err(ApiError::InvalidCredentials);
        }
        Err(e) => return Err(e.into()),
    };

    if !user.password.matches_blocking(payload.password).await? {
        warn!(user_id = user.id, "login invalid password");
        return Err(ApiError::InvalidCredentials);
    }

    let token = tokens::issue(
        state.tokens.as_ref(),
        user.id,
        state.config.auth.token_ttl,
        SCOPE_AUTHENTICATION,
    )
    .await?;
    let set_cookie = cookie::session_cookie(&token.plaintext, token.expiry, state.config.auth.cookie_secure)?;

    info!(user_id = user.id, "user logged in");
    Ok((
        StatusCode::CREATED,
        [(header::SET_COOKIE, set_cookie)],
        Json(UserResponse { user }),
    ))
}

#[instrument(skip_all, fields(user_id = user.id))]
pub async fn logout(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
) -> Result<impl IntoResponse, ApiError> {
    match tokens::revoke_all(state.tokens.as_ref(), SCOPE_AUTHENTICATION, user.id).await {
        Ok(()) | Err(ModelError::NotFound) => {}
        Err(e) => return Err(e.into()),
    }
    let cleared = cookie::cleared_session_cookie(state.config.auth.cookie_secure)?;

    info!("user logged out");
    Ok((
        [(header::SET_COOKIE, cleared)],
        Json(MessageResponse {
            message: "tokens were successfully deleted".into(),
        }),
    ))
}

pub async fn whoami(CurrentIdentity(identity): CurrentIdentity) -> Json<WhoAmIResponse> {
    Json(WhoAmIResponse {
        anonymous: identity.is_anonymous(),
        user: identity.user().cloned(),
    })
}

pub async fn me(AuthUser(user): AuthUser) -> Json<UserResponse> {
    Json(UserResponse { user })
}

#[instrument(skip_all, fields(user_id = user.id))]
pub async fn update_me(
    State(state): State<AppState>,
    AuthUser(mut user): AuthUser,
    payload: Result<Json<UpdateMeRequest>, JsonRejection>,
) -> Result<Json<UserResponse>, ApiError> {
    let Json(input) = payload?;

    if let Some(version) = input.version {
        user.version = version;
    }
    if let Some(email) = input.email {
        user.email = normalize_email(&email);
    }
    if let Some(name) = input.name {
        user.name = name;
    }
    if let Some(profile_picture) = input.profile_picture {
        user.profile_picture = profile_picture;
    }
    if let Some(provider) = input.provider {
        user.provider = provider;
    }
    if let Some(role_id) = input.role_id {
        user.role_id = role_id;
    }
    if let Some(is_active) = input.is_active {
        user.is_active = is_active;
    }

    let mut v = Validator::new();
    validate_user(&mut v, &user);
    if let Some(password) = &input.password {
        validate_password_plaintext(&mut v, password);
    }
    v.finish()?;

    if let Some(password) = input.password {
        user.password.set_blocking(password).await?;
    }

    match state.users.update_user(&mut user).await {
        Ok(()) => {}
        Err(ModelError::EditConflict) => {
            debug!(version = user.version, "stale user version");
            return Err(ApiError::EditConflict);
        }
        Err(e) => return Err(e.into()),
    }

    info!(version = user.version, "user updated");
    Ok(Json(UserResponse { user }))
}
