//! Request helpers shared by the handler tests.

use axum::{
    body::Body,
    http::{header, HeaderMap, Method, Request, StatusCode},
    Router,
};
use serde_json::{json, Value};
use tower::ServiceExt;

pub struct TestResponse {
    pub status: StatusCode,
    pub headers: HeaderMap,
    pub body: Value,
}

pub async fn send(
    app: &Router,
    method: Method,
    path: &str,
    cookie: Option<&str>,
    body: Option<Value>,
) -> TestResponse {
    let mut req = Request::builder().method(method).uri(path);
    if let Some(cookie) = cookie {
        req = req.header(header::COOKIE, cookie);
    }
    let req = match body {
        Some(body) => req
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(body.to_string()))
            .unwrap(),
        None => req.body(Body::empty()).unwrap(),
    };

    let res = app.clone().oneshot(req).await.unwrap();
    let status = res.status();
    let headers = res.headers().clone();
    let bytes = axum::body::to_bytes(res.into_body(), usize::MAX)
        .await
        .unwrap();
    let body = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap()
    };
    TestResponse { status, headers, body }
}

pub async fn register(app: &Router, name: &str, email: &str, password: &str) -> TestResponse {
    send(
        app,
        Method::POST,
        "/api/auth/register",
        None,
        Some(json!({ "name": name, "email": email, "password": password })),
    )
    .await
}

pub async fn login(app: &Router, email: &str, password: &str) -> TestResponse {
    send(
        app,
        Method::POST,
        "/api/auth/login",
        None,
        Some(json!({ "email": email, "password": password })),
    )
    .await
}

/// The `auth_token=...` pair from a login response, ready for a `Cookie` header.
pub fn session_cookie(res: &TestResponse) -> String {
    let raw = res.headers[header::SET_COOKIE].to_str().unwrap();
    raw.split(';').next().unwrap().trim().to_string()
}

mod tests {
    use super::*;
    use crate::{app::build_app, state::AppState};

    #[tokio::test]
    async fn session_lifecycle() {
        let app = build_app(AppState::fake());

        let res = register(&app, "mike", "mike@test.com", "SecurePass123!").await;
        assert_eq!(res.status, StatusCode::CREATED);
        assert!(res.body["user"].get("password").is_none());

        let res = login(&app, "mike@test.com", "WrongPass123!").await;
        assert_eq!(res.status, StatusCode::UNAUTHORIZED);
        assert_eq!(res.body["error"], "invalid authentication credentials");

        let res = send(&app, Method::GET, "/api/users/me", None, None).await;
        assert_eq!(res.status, StatusCode::UNAUTHORIZED);

        let res = login(&app, "mike@test.com", "SecurePass123!").await;
        assert_eq!(res.status, StatusCode::CREATED);
        let cookie = session_cookie(&res);
        assert_eq!(cookie.trim_start_matches("auth_token=").len(), 26);

        let res = send(&app, Method::GET, "/api/auth/whoami", Some(&cookie), None).await;
        assert_eq!(res.status, StatusCode::OK);
        assert_eq!(res.body["anonymous"], false);
        assert_eq!(res.body["user"]["name"], "mike");

        let res = send(&app, Method::POST, "/api/auth/logout", Some(&cookie), None).await;
        assert_eq!(res.status, StatusCode::OK);

        let res = send(&app, Method::GET, "/api/auth/whoami", Some(&cookie), None).await;
        assert_eq!(res.status, StatusCode::UNAUTHORIZED);
        assert_eq!(res.headers[header::WWW_AUTHENTICATE], "Bearer");
    }

    #[tokio::test]
    async fn stale_profile_updates_conflict() {
        let app = build_app(AppState::fake());
        register(&app, "mike", "mike@test.com", "SecurePass123!").await;
        let cookie = session_cookie(&login(&app, "mike@test.com", "SecurePass123!").await);

        let res = send(
            &app,
            Method::PATCH,
            "/api/users/me",
            Some(&cookie),
            Some(json!({ "name": "mike two", "version": 1 })),
        )
        .await;
        assert_eq!(res.status, StatusCode::OK);
        assert_eq!(res.body["user"]["version"], 2);

        let res = send(
            &app,
            Method::PATCH,
            "/api/users/me",
            Some(&cookie),
            Some(json!({ "name": "mike three", "version": 1 })),
        )
        .await;
        assert_eq!(res.status, StatusCode::CONFLICT);
        assert_eq!(
            res.body["error"],
            "unable to update the record due to an edit conflict, please try again"
        );

        let res = send(
            &app,
            Method::PATCH,
            "/api/users/me",
            Some(&cookie),
            Some(json!({ "name": "mike three", "version": 2 })),
        )
        .await;
        assert_eq!(res.status, StatusCode::OK);
        assert_eq!(res.body["user"]["name"], "mike three");
        assert_eq!(res.body["user"]["version"], 3);
    }
}
