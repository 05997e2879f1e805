use anyhow::Context;
use axum::http::{header, HeaderMap, HeaderValue};
use time::{macros::format_description, OffsetDateTime, UtcOffset};

pub const SESSION_COOKIE: &str = "auth_token";

/// Value of the session cookie, if the client sent a non-empty one.
pub fn session_token(headers: &HeaderMap) -> Option<String> {
    parse_cookie(headers, SESSION_COOKIE)
}

fn parse_cookie(headers: &HeaderMap, name: &str) -> Option<String> {
    headers
        .get_all(header::COOKIE)
        .iter()
        .filter_map(|v| v.to_str().ok())
        .flat_map(|s| s.split(';'))
        .filter_map(|pair| pair.trim().split_once('='))
        .find(|(k, _)| k.trim() == name)
        .map(|(_, v)| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

/// `Set-Cookie` value carrying a freshly issued session token.
pub fn session_cookie(plaintext: &str, expiry: OffsetDateTime, secure: bool) -> anyhow::Result<HeaderValue> {
    build(plaintext, expiry, secure)
}

/// `Set-Cookie` value that makes the client drop the session cookie.
pub fn cleared_session_cookie(secure: bool) -> anyhow::Result<HeaderValue> {
    build("", OffsetDateTime::UNIX_EPOCH, secure)
}

fn build(value: &str, expiry: OffsetDateTime, secure: bool) -> anyhow::Result<HeaderValue> {
    let http_date = format_description!(
        "[weekday repr:short], [day] [month repr:short] [year] [hour]:[minute]:[second] GMT"
    );
    let expires = expiry
        .to_offset(UtcOffset::UTC)
        .format(http_date)
        .context("format cookie expiry")?;
    let mut cookie =
        format!("{SESSION_COOKIE}={value}; Expires={expires}; HttpOnly; SameSite=Strict; Path=/");
    if secure {
        cookie.push_str("; Secure");
    }
    HeaderValue::from_str(&cookie).context("session cookie is not a valid header value")
}
