use axum::{
    extract::{
        rejection::{JsonRejection, PathRejection},
        Path, State,
    },
    http::StatusCode,
    Json,
};
use tracing::{info, instrument, warn};

use super::{
    dto::{GameResponse, GamesResponse, ScoreResponse, ScoresResponse, SubmitScoreRequest},
    repo_types::{validate_score, Game, Score},
};
use crate::{auth::identity::AuthUser, error::ApiError, state::AppState, validator::Validator};

/// Unparsable ids are treated like unknown ones.
fn game_id(path: Result<Path<i64>, PathRejection>) -> Result<i64, ApiError> {
    path.map(|Path(id)| id).map_err(|_| ApiError::NotFound)
}

async fn scored_game(state: &AppState, id: i64) -> Result<Game, ApiError> {
    let game = state.games.game_by_id(id).await?;
    if !game.has_score {
        warn!(game_id = game.id, "score request for a game without scores");
        return Err(ApiError::field(
            "game",
            &format!("{} does not track scores", game.name),
        ));
    }
    Ok(game)
}

#[instrument(skip(state))]
pub async fn list_games(State(state): State<AppState>) -> Result<Json<GamesResponse>, ApiError> {
    let games = state.games.games().await?;
    Ok(Json(GamesResponse { games }))
}

#[instrument(skip(state))]
pub async fn get_game(
    State(state): State<AppState>,
    path: Result<Path<i64>, PathRejection>,
) -> Result<Json<GameResponse>, ApiError> {
    let game = state.games.game_by_id(game_id(path)?).await?;
    Ok(Json(GameResponse { game }))
}

#[instrument(skip(state))]
pub async fn leaderboard(
    State(state): State<AppState>,
    path: Result<Path<i64>, PathRejection>,
) -> Result<Json<ScoresResponse>, ApiError> {
    let game = scored_game(&state, game_id(path)?).await?;
    let scores = state.games.leaderboard(game.id).await?;
    Ok(Json(ScoresResponse { scores }))
}

#[instrument(skip_all, fields(user_id = user.id))]
pub async fn my_scores(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
    path: Result<Path<i64>, PathRejection>,
) -> Result<Json<ScoresResponse>, ApiError> {
    let game = scored_game(&state, game_id(path)?).await?;
    let scores = state.games.user_scores(game.id, user.id).await?;
    Ok(Json(ScoresResponse { scores }))
}

#[instrument(skip_all, fields(user_id = user.id))]
pub async fn submit_score(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
    path: Result<Path<i64>, PathRejection>,
    payload: Result<Json<SubmitScoreRequest>, JsonRejection>,
) -> Result<(StatusCode, Json<ScoreResponse>), ApiError> {
    let Json(payload) = payload?;

    let mut v = Validator::new();
    validate_score(&mut v, payload.score);
    v.finish()?;

    let game = scored_game(&state, game_id(path)?).await?;
    let mut score = Score::new(game.id, user.id, payload.score);
    state.games.insert_score(&mut score).await?;

    info!(game_id = game.id, score = score.score, "score recorded");
    Ok((StatusCode::CREATED, Json(ScoreResponse { score })))
}
