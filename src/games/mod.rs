use axum::{
    middleware::from_fn,
    routing::{get, post},
    Router,
};

use crate::{auth::middleware::require_authenticated, state::AppState};

mod dto;
pub mod handlers;
#[cfg(test)]
pub mod memory;
pub mod repo;
pub mod repo_types;

pub fn router() -> Router<AppState> {
    let private = Router::new()
        .route("/games/:id/scores", post(handlers::submit_score))
        .route("/games/:id/scores/me", get(handlers::my_scores))
        .route_layer(from_fn(require_authenticated));

    Router::new()
        .route("/games", get(handlers::list_games))
        .route("/games/:id", get(handlers::get_game))
        .route("/games/:id/scores", get(handlers::leaderboard))
        .merge(private)
}
