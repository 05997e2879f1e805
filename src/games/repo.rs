use async_trait::async_trait;
use time::OffsetDateTime;

use super::repo_types::{Game, Score, ScoreEntry};
use crate::{db::Database, error::ModelError};

/// Leaderboards are cut at this many entries.
pub const LEADERBOARD_LIMIT: i64 = 50;

#[async_trait]
pub trait GameStore: Send + Sync {
    #[cfg(test)]
    async fn insert_game(&self, game: &mut Game) -> Result<(), ModelError>;
    /// All games ordered by name.
    async fn games(&self) -> Result<Vec<Game>, ModelError>;
    async fn game_by_id(&self, id: i64) -> Result<Game, ModelError>;
    #[cfg(test)]
    async fn update_game(&self, game: &mut Game) -> Result<(), ModelError>;
    #[cfg(test)]
    async fn delete_game(&self, id: i64) -> Result<(), ModelError>;

    async fn insert_score(&self, score: &mut Score) -> Result<(), ModelError>;
    /// Best scores for a game, highest first, capped at [`LEADERBOARD_LIMIT`].
    async fn leaderboard(&self, game_id: i64) -> Result<Vec<ScoreEntry>, ModelError>;
    /// Every score `user_id` posted for a game, highest first.
    async fn user_scores(&self, game_id: i64, user_id: i64) -> Result<Vec<ScoreEntry>, ModelError>;
    #[cfg(test)]
    async fn update_score(&self, score: &mut Score) -> Result<(), ModelError>;
    #[cfg(test)]
    async fn delete_score(&self, id: i64) -> Result<(), ModelError>;
}

const GAME_COLUMNS: &str =
    "id, created_at, updated_at, version, is_active, name, description, logo, src, controls, has_score";

const SCORE_ENTRY_SELECT: &str = r#"
    SELECT s.id, s.created_at, s.updated_at, s.version, s.is_active, s.game_id, s.user_id, s.score,
           u.name AS user_name, u.profile_picture AS user_profile_picture
    FROM games_scores s
    INNER JOIN auth_users u ON s.user_id = u.id
"#;

#[async_trait]
impl GameStore for Database {
    #[cfg(test)]
    async fn insert_game(&self, game: &mut Game) -> Result<(), ModelError> {
        let (id, created_at, updated_at, version) = self
            .bounded(
                sqlx::query_as::<_, (i64, OffsetDateTime, OffsetDateTime, i32)>(
                    r#"
                    INSERT INTO games_list (name, description, logo, src, controls, has_score, is_active)
                    VALUES ($1, $2, $3, $4, $5, $6, $7)
                    RETURNING id, created_at, updated_at, version
                    "#,
                )
                .bind(&game.name)
                .bind(&game.description)
                .bind(&game.logo)
                .bind(&game.src)
                .bind(&game.controls)
                .bind(game.has_score)
                .bind(game.is_active)
                .fetch_one(self.pool()),
            )
            .await?;

        game.id = id;
        game.created_at = created_at;
        game.updated_at = updated_at;
        game.version = version;
        Ok(())
    }

    async fn games(&self) -> Result<Vec<Game>, ModelError> {
        let sql = format!("SELECT {GAME_COLUMNS} FROM games_list ORDER BY name");
        self.bounded(sqlx::query_as::<_, Game>(&sql).fetch_all(self.pool()))
            .await
    }

    async fn game_by_id(&self, id: i64) -> Result<Game, ModelError> {
        if id < 1 {
            return Err(ModelError::NotFound);
        }
        let sql = format!("SELECT {GAME_COLUMNS} FROM games_list WHERE id = $1");
        self.bounded(sqlx::query_as::<_, Game>(&sql).bind(id).fetch_one(self.pool()))
            .await
    }

    #[cfg(test)]
    async fn update_game(&self, game: &mut Game) -> Result<(), ModelError> {
        crate::versioned::update_versioned(self, game).await
    }

    #[cfg(test)]
    async fn delete_game(&self, id: i64) -> Result<(), ModelError> {
        delete_by_id(self, "DELETE FROM games_list WHERE id = $1", id).await
    }

    async fn insert_score(&self, score: &mut Score) -> Result<(), ModelError> {
        let (id, created_at, updated_at, version) = self
            .bounded(
                sqlx::query_as::<_, (i64, OffsetDateTime, OffsetDateTime, i32)>(
                    r#"
                    INSERT INTO games_scores (game_id, user_id, score, is_active)
                    VALUES ($1, $2, $3, $4)
                    RETURNING id, created_at, updated_at, version
                    "#,
                )
                .bind(score.game_id)
                .bind(score.user_id)
                .bind(score.score)
                .bind(score.is_active)
                .fetch_one(self.pool()),
            )
            .await?;

        score.id = id;
        score.created_at = created_at;
        score.updated_at = updated_at;
        score.version = version;
        Ok(())
    }

    async fn leaderboard(&self, game_id: i64) -> Result<Vec<ScoreEntry>, ModelError> {
        let sql = format!("{SCORE_ENTRY_SELECT} WHERE s.game_id = $1 ORDER BY s.score DESC LIMIT $2");
        self.bounded(
            sqlx::query_as::<_, ScoreEntry>(&sql)
                .bind(game_id)
                .bind(LEADERBOARD_LIMIT)
                .fetch_all(self.pool()),
        )
        .await
    }

    async fn user_scores(&self, game_id: i64, user_id: i64) -> Result<Vec<ScoreEntry>, ModelError> {
        let sql = format!(
            "{SCORE_ENTRY_SELECT} WHERE s.game_id = $1 AND s.user_id = $2 ORDER BY s.score DESC"
        );
        self.bounded(
            sqlx::query_as::<_, ScoreEntry>(&sql)
                .bind(game_id)
                .bind(user_id)
                .fetch_all(self.pool()),
        )
        .await
    }

    #[cfg(test)]
    async fn update_score(&self, score: &mut Score) -> Result<(), ModelError> {
        crate::versioned::update_versioned(self, score).await
    }

    #[cfg(test)]
    async fn delete_score(&self, id: i64) -> Result<(), ModelError> {
        delete_by_id(self, "DELETE FROM games_scores WHERE id = $1", id).await
    }
}

#[cfg(test)]
async fn delete_by_id(db: &Database, sql: &'static str, id: i64) -> Result<(), ModelError> {
    if id < 1 {
        return Err(ModelError::NotFound);
    }
    let done = db
        .bounded(sqlx::query(sql).bind(id).execute(db.pool()))
        .await?;
    if done.rows_affected() == 0 {
        return Err(ModelError::NotFound);
    }
    Ok(())
}
