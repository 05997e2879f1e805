use serde::Serialize;
use sqlx::FromRow;
use time::OffsetDateTime;

use crate::{
    validator::Validator,
    versioned::{Field, Versioned},
};

/// Entry in `games_list`.
#[derive(Debug, Clone, Serialize, FromRow)]
pub struct Game {
    pub id: i64,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
    #[serde(with = "time::serde::rfc3339")]
    pub updated_at: OffsetDateTime,
    pub version: i32,
    pub is_active: bool,
    pub name: String,
    pub description: String,
    pub logo: String,
    pub src: String,
    pub controls: String,
    pub has_score: bool,
}

impl Game {
    #[cfg(test)]
    pub fn new(name: &str, src: &str, has_score: bool) -> Self {
        let now = OffsetDateTime::now_utc();
        Self {
            id: 0,
            created_at: now,
            updated_at: now,
            version: 0,
            is_active: true,
            name: name.to_string(),
            description: String::new(),
            logo: String::new(),
            src: src.to_string(),
            controls: String::new(),
            has_score,
        }
    }
}

impl Versioned for Game {
    const TABLE: &'static str = "games_list";

    fn id(&self) -> i64 {
        self.id
    }

    fn version(&self) -> i32 {
        self.version
    }

    fn fields(&self) -> Vec<(&'static str, Field)> {
        vec![
            ("name", Field::Text(self.name.clone())),
            ("description", Field::Text(self.description.clone())),
            ("logo", Field::Text(self.logo.clone())),
            ("src", Field::Text(self.src.clone())),
            ("controls", Field::Text(self.controls.clone())),
            ("has_score", Field::Bool(self.has_score)),
            ("is_active", Field::Bool(self.is_active)),
        ]
    }

    fn stamp(&mut self, updated_at: OffsetDateTime, version: i32) {
        self.updated_at = updated_at;
        self.version = version;
    }

    #[cfg(test)]
    fn created(&mut self, id: i64, at: OffsetDateTime) {
        self.id = id;
        self.created_at = at;
        self.updated_at = at;
        self.version = 1;
    }
}

/// One score posted by a user for a game (`games_scores`).
#[derive(Debug, Clone, Serialize, FromRow)]
pub struct Score {
    pub id: i64,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
    #[serde(with = "time::serde::rfc3339")]
    pub updated_at: OffsetDateTime,
    pub version: i32,
    pub is_active: bool,
    pub game_id: i64,
    pub user_id: i64,
    pub score: i64,
}

impl Score {
    pub fn new(game_id: i64, user_id: i64, score: i64) -> Self {
        let now = OffsetDateTime::now_utc();
        Self {
            id: 0,
            created_at: now,
            updated_at: now,
            version: 0,
            is_active: true,
            game_id,
            user_id,
            score,
        }
    }
}

impl Versioned for Score {
    const TABLE: &'static str = "games_scores";

    fn id(&self) -> i64 {
        self.id
    }

    fn version(&self) -> i32 {
        self.version
    }

    fn fields(&self) -> Vec<(&'static str, Field)> {
        vec![
            ("score", Field::BigInt(self.score)),
            ("is_active", Field::Bool(self.is_active)),
        ]
    }

    fn stamp(&mut self, updated_at: OffsetDateTime, version: i32) {
        self.updated_at = updated_at;
        self.version = version;
    }

    #[cfg(test)]
    fn created(&mut self, id: i64, at: OffsetDateTime) {
        self.id = id;
        self.created_at = at;
        self.updated_at = at;
        self.version = 1;
    }
}

/// A score joined with its owner's public profile.
#[derive(Debug, Clone, Serialize, FromRow)]
pub struct ScoreEntry {
    #[serde(flatten)]
    #[sqlx(flatten)]
    pub score: Score,
    pub user_name: String,
    pub user_profile_picture: String,
}

pub fn validate_score(v: &mut Validator, score: i64) {
    v.check(score > 0, "score", "must be non negative number");
}
