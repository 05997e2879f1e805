use axum::{
    middleware::from_fn,
    routing::{get, post},
    Router,
};

use crate::state::AppState;

pub mod cookie;
mod dto;
pub mod handlers;
pub mod identity;
#[cfg(test)]
pub mod memory;
pub mod middleware;
pub mod password;
pub mod repo;
pub mod repo_types;
pub mod roles;
pub mod tokens;

/// Auth and current-user routes. Expects [`middleware::authenticate`] to be
/// layered over the whole API.
pub fn router() -> Router<AppState> {
    let private = Router::new()
        .route("/auth/logout", post(handlers::logout))
        .route("/users/me", get(handlers::me).patch(handlers::update_me))
        .route_layer(from_fn(middleware::require_authenticated));

    Router::new()
        .route("/auth/register", post(handlers::register))
        .route("/auth/login", post(handlers::login))
        .route("/auth/whoami", get(handlers::whoami))
        .merge(private)
}
