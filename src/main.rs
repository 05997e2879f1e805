use std::sync::Arc;

mod app;
mod auth;
mod config;
mod db;
mod error;
mod games;
mod health;
mod state;
#[cfg(test)]
mod testing;
mod validator;
mod versioned;

use crate::{config::AppConfig, db::Database, state::AppState};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    let env_filter = std::env::var("RUST_LOG")
        .unwrap_or_else(|_| "pixelarcade=debug,axum=info,tower_http=info".to_string());
    let json_logs = std::env::var("LOG_FORMAT")
        .map(|v| v == "json")
        .unwrap_or(false);

    if json_logs {
        tracing_subscriber::fmt()
            .with_env_filter(env_filter)
            .with_target(false)
            .json()
            .init();
    } else {
        tracing_subscriber::fmt().with_env_filter(env_filter).init();
    }

    let config = Arc::new(AppConfig::from_env()?);
    let pool = db::connect(&config.database).await?;
    tracing::info!("database connection pool established");

    sqlx::migrate!("./migrations").run(&pool).await?;

    let state = AppState::postgres(
        config.clone(),
        Database::new(pool, config.database.query_timeout),
    );
    let app = app::build_app(state);

    app::serve(app, &config).await
}
