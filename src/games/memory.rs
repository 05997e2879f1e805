use std::sync::Arc;

use async_trait::async_trait;

use super::{
    repo::{GameStore, LEADERBOARD_LIMIT},
    repo_types::{Game, Score, ScoreEntry},
};
use crate::{auth::memory::MemoryAuthStore, error::ModelError, versioned::MemoryTable};

/// In-process game store. Score owners are joined against the shared
/// in-memory user table.
pub struct MemoryGameStore {
    games: MemoryTable<Game>,
    scores: MemoryTable<Score>,
    users: Arc<MemoryAuthStore>,
}

impl MemoryGameStore {
    pub fn new(users: Arc<MemoryAuthStore>) -> Self {
        Self {
            games: MemoryTable::default(),
            scores: MemoryTable::default(),
            users,
        }
    }

    fn entries(&self, pred: impl Fn(&Score) -> bool) -> Vec<ScoreEntry> {
        let mut entries: Vec<ScoreEntry> = self
            .scores
            .find(pred)
            .into_iter()
            .filter_map(|score| {
                let user = self.users.user(score.user_id)?;
                Some(ScoreEntry {
                    user_name: user.name,
                    user_profile_picture: user.profile_picture,
                    score,
                })
            })
            .collect();
        entries.sort_by(|a, b| b.score.score.cmp(&a.score.score));
        entries
    }
}

#[async_trait]
impl GameStore for MemoryGameStore {
    async fn insert_game(&self, game: &mut Game) -> Result<(), ModelError> {
        self.games.insert(game)
    }

    async fn games(&self) -> Result<Vec<Game>, ModelError> {
        let mut games = self.games.find(|_| true);
        games.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(games)
    }

    async fn game_by_id(&self, id: i64) -> Result<Game, ModelError> {
        self.games.get(id)
    }

    async fn update_game(&self, game: &mut Game) -> Result<(), ModelError> {
        self.games.update(game)
    }

    async fn delete_game(&self, id: i64) -> Result<(), ModelError> {
        self.games.delete(id)?;
        for score in self.scores.find(|s| s.game_id == id) {
            self.scores.delete(score.id)?;
        }
        Ok(())
    }

    async fn insert_score(&self, score: &mut Score) -> Result<(), ModelError> {
        if self.games.get(score.game_id).is_err() || self.users.user(score.user_id).is_none() {
            return Err(ModelError::Fatal(anyhow::anyhow!(
                "score references missing game {} or user {}",
                score.game_id,
                score.user_id
            )));
        }
        self.scores.insert(score)
    }

    async fn leaderboard(&self, game_id: i64) -> Result<Vec<ScoreEntry>, ModelError> {
        let mut entries = self.entries(|s| s.game_id == game_id);
        entries.truncate(LEADERBOARD_LIMIT as usize);
        Ok(entries)
    }

    async fn user_scores(&self, game_id: i64, user_id: i64) -> Result<Vec<ScoreEntry>, ModelError> {
        Ok(self.entries(|s| s.game_id == game_id && s.user_id == user_id))
    }

    async fn update_score(&self, score: &mut Score) -> Result<(), ModelError> {
        self.scores.update(score)
    }

    async fn delete_score(&self, id: i64) -> Result<(), ModelError> {
        self.scores.delete(id).map(|_| ())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::{password::Password, repo::UserStore, repo_types::User};

    async fn store_with_game() -> (MemoryGameStore, Game) {
        let users = Arc::new(MemoryAuthStore::default());
        for (name, email) in [("mike", "mike@test.com"), ("jane", "jane@test.com")] {
            let mut user = User::new(name.into(), email.into(), Password::from_hash("hash".into()));
            users.insert_user(&mut user).await.unwrap();
        }
        let store = MemoryGameStore::new(users);
        let mut game = Game::new("snake", "/games/snake", true);
        store.insert_game(&mut game).await.unwrap();
        (store, game)
    }

    #[tokio::test]
    async fn games_are_listed_by_name() {
        let (store, _) = store_with_game().await;
        store
            .insert_game(&mut Game::new("asteroids", "/games/asteroids", true))
            .await
            .unwrap();
        let names: Vec<_> = store.games().await.unwrap().into_iter().map(|g| g.name).collect();
        assert_eq!(names, ["asteroids", "snake"]);
    }

    #[tokio::test]
    async fn leaderboard_is_sorted_and_capped() {
        let (store, game) = store_with_game().await;
        for i in 1..=60 {
            let user_id = if i % 2 == 0 { 1 } else { 2 };
            store
                .insert_score(&mut Score::new(game.id, user_id, i))
                .await
                .unwrap();
        }

        let board = store.leaderboard(game.id).await.unwrap();
        assert_eq!(board.len(), LEADERBOARD_LIMIT as usize);
        assert_eq!(board[0].score.score, 60);
        assert_eq!(board[0].user_name, "mike");
        assert!(board.windows(2).all(|w| w[0].score.score >= w[1].score.score));

        let mine = store.user_scores(game.id, 2).await.unwrap();
        assert_eq!(mine.len(), 30);
        assert!(mine.iter().all(|e| e.user_name == "jane"));
    }

    #[tokio::test]
    async fn scores_need_an_existing_game_and_user() {
        let (store, game) = store_with_game().await;
        assert!(store.insert_score(&mut Score::new(game.id + 1, 1, 5)).await.is_err());
        assert!(store.insert_score(&mut Score::new(game.id, 99, 5)).await.is_err());
    }

    #[tokio::test]
    async fn stale_game_update_conflicts() {
        let (store, game) = store_with_game().await;
        let mut first = game.clone();
        let mut second = game.clone();

        first.description = "eat apples".into();
        store.update_game(&mut first).await.unwrap();

        second.controls = "arrows".into();
        assert!(matches!(
            store.update_game(&mut second).await,
            Err(ModelError::EditConflict)
        ));
        assert_eq!(store.game_by_id(game.id).await.unwrap().description, "eat apples");
    }

    #[tokio::test]
    async fn score_updates_are_versioned_and_deletes_cascade() {
        let (store, game) = store_with_game().await;
        let mut score = Score::new(game.id, 1, 10);
        store.insert_score(&mut score).await.unwrap();

        score.score = 25;
        store.update_score(&mut score).await.unwrap();
        assert_eq!(score.version, 2);

        store.delete_game(game.id).await.unwrap();
        assert!(matches!(store.delete_score(score.id).await, Err(ModelError::NotFound)));
        assert!(matches!(store.game_by_id(game.id).await, Err(ModelError::NotFound)));
    }
}
