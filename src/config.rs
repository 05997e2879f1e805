use std::{str::FromStr, time::Duration};

use anyhow::Context;

const DEFAULT_TRUSTED_ORIGIN: &str = "https://pixelarcade.dev";
/// Session lifetimes are capped at a year.
const MAX_TOKEN_TTL_HOURS: i64 = 24 * 366;

#[derive(Debug, Clone)]
pub struct DatabaseConfig {
    pub url: String,
    pub max_connections: u32,
    pub max_idle: Duration,
    /// Upper bound for a single storage statement.
    pub query_timeout: Duration,
}

#[derive(Debug, Clone)]
pub struct AuthConfig {
    pub token_ttl: time::Duration,
    /// Adds `Secure` to the session cookie; enable behind HTTPS.
    pub cookie_secure: bool,
}

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub env: String,
    pub version: String,
    pub host: String,
    pub port: u16,
    pub trusted_origins: Vec<String>,
    pub database: DatabaseConfig,
    pub auth: AuthConfig,
}

impl AppConfig {
    pub fn from_env() -> anyhow::Result<Self> {
        let url = std::env::var("DATABASE_URL").context("DATABASE_URL must be set")?;
        let database = DatabaseConfig {
            url,
            max_connections: env_or("DB_MAX_CONNECTIONS", 25),
            max_idle: Duration::from_secs(env_or("DB_MAX_IDLE_SECS", 15 * 60)),
            query_timeout: Duration::from_secs(env_or("DB_QUERY_TIMEOUT_SECS", 3)),
        };
        let auth = AuthConfig {
            token_ttl: token_ttl(env_or("AUTH_TOKEN_TTL_HOURS", 24))?,
            cookie_secure: env_or("AUTH_COOKIE_SECURE", false),
        };
        let trusted_origins = std::env::var("CORS_TRUSTED_ORIGINS")
            .map(|v| parse_origins(&v))
            .unwrap_or_else(|_| vec![DEFAULT_TRUSTED_ORIGIN.to_string()]);

        Ok(Self {
            env: std::env::var("APP_ENV").unwrap_or_else(|_| "prod".into()),
            version: env!("CARGO_PKG_VERSION").into(),
            host: std::env::var("APP_HOST").unwrap_or_else(|_| "0.0.0.0".into()),
            port: env_or("APP_PORT", 8080),
            trusted_origins,
            database,
            auth,
        })
    }
}

/// Reads `key` and parses it, falling back to `default` when unset or unparsable.
fn env_or<T: FromStr>(key: &str, default: T) -> T {
    std::env::var(key)
        .ok()
        .and_then(|v| v.trim().parse::<T>().ok())
        .unwrap_or(default)
}

fn token_ttl(hours: i64) -> anyhow::Result<time::Duration> {
    anyhow::ensure!(
        (1..=MAX_TOKEN_TTL_HOURS).contains(&hours),
        "AUTH_TOKEN_TTL_HOURS must be between 1 and {MAX_TOKEN_TTL_HOURS}, got {hours}"
    );
    Ok(time::Duration::hours(hours))
}

fn parse_origins(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|o| !o.is_empty())
        .map(String::from)
        .collect()
}
