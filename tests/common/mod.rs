#![allow(dead_code)]

use axum::{
    Router,
    body::Body,
    http::{Request, StatusCode},
};
use chrono::{TimeDelta, Utc};
use tokengate::{
    ServerConfig,
    auth::{SESSION_COOKIE_NAME, TokenAuthConfig},
    create_app,
    db::{Database, Principal, Token, TokenPolicy},
};
use tower::ServiceExt;

pub struct TestApp {
    pub db: Database,
    pub app: Router,
}

pub async fn setup() -> TestApp {
    setup_with_auth(TokenAuthConfig::default()).await
}

pub async fn setup_with_auth(auth: TokenAuthConfig) -> TestApp {
    let db = Database::open(":memory:")
        .await
        .expect("Failed to open test database");
    let config = ServerConfig {
        db: db.clone(),
        auth,
        token_policy: TokenPolicy::default(),
    };
    TestApp {
        app: create_app(&config),
        db,
    }
}

impl TestApp {
    /// Send a request and return the status and parsed JSON body
    /// (`Value::Null` for an empty body).
    pub async fn send(&self, request: Request<Body>) -> (StatusCode, serde_json::Value) {
        let (status, body) = self.send_raw(request).await;
        let json = if body.is_empty() {
            serde_json::Value::Null
        } else {
            serde_json::from_slice(&body).expect("Response body is not JSON")
        };
        (status, json)
    }

    pub async fn send_raw(&self, request: Request<Body>) -> (StatusCode, Vec<u8>) {
        let response = self.app.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let body = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        (status, body.to_vec())
    }

    /// Create a user and return its id.
    pub async fn create_user(&self, login: &str) -> i64 {
        self.db.users().create(login).await.unwrap()
    }

    /// Open a session for `uid` valid for an hour and return its cookie header.
    pub async fn login(&self, uid: i64) -> String {
        let session = self
            .db
            .sessions()
            .create(Some(uid), Utc::now() + TimeDelta::hours(1))
            .await
            .unwrap();
        session_cookie(&session.id)
    }

    pub async fn issue_user_token(&self, uid: i64) -> Token {
        self.db
            .tokens()
            .issue(&Principal::new("res.users", uid), TokenPolicy::default())
            .await
            .unwrap()
    }
}

pub fn session_cookie(session_id: &str) -> String {
    format!("{}={}", SESSION_COOKIE_NAME, session_id)
}

pub fn get(uri: &str) -> Request<Body> {
    Request::builder().uri(uri).body(Body::empty()).unwrap()
}

pub fn get_with(uri: &str, headers: &[(&str, &str)]) -> Request<Body> {
    request_with("GET", uri, headers, None)
}

pub fn request_with(
    method: &str,
    uri: &str,
    headers: &[(&str, &str)],
    json: Option<serde_json::Value>,
) -> Request<Body> {
    let mut builder = Request::builder().method(method).uri(uri);
    for (name, value) in headers {
        builder = builder.header(*name, *value);
    }
    match json {
        Some(json) => builder
            .header("content-type", "application/json")
            .body(Body::from(json.to_string()))
            .unwrap(),
        None => builder.body(Body::empty()).unwrap(),
    }
}
