use serde::{Deserialize, Serialize};

use super::repo_types::{Game, Score, ScoreEntry};

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SubmitScoreRequest {
    #[serde(default)]
    pub score: i64,
}

#[derive(Debug, Serialize)]
pub struct GamesResponse {
    pub games: Vec<Game>,
}

#[derive(Debug, Serialize)]
pub struct GameResponse {
    pub game: Game,
}

#[derive(Debug, Serialize)]
pub struct ScoresResponse {
    pub scores: Vec<ScoreEntry>,
}

#[derive(Debug, Serialize)]
pub struct ScoreResponse {
    pub score: Score,
}
