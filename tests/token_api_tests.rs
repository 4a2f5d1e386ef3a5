mod common;

use axum::http::StatusCode;
use chrono::{DateTime, TimeDelta, Utc};
use common::{TestApp, get_with, request_with, setup};
use serde_json::json;
use tokengate::db::{Principal, TokenPolicy};

async fn logged_in(t: &TestApp, login: &str) -> (i64, String) {
    let uid = t.create_user(login).await;
    let cookie = t.login(uid).await;
    (uid, cookie)
}

fn parse_time(value: &serde_json::Value) -> DateTime<Utc> {
    value.as_str().unwrap().parse().unwrap()
}

#[tokio::test]
async fn test_issue_token_with_defaults() {
    let t = setup().await;
    let (uid, cookie) = logged_in(&t, "alice").await;

    let (status, json) = t
        .send(request_with("POST", "/api/tokens", &[("cookie", &cookie)], Some(json!({}))))
        .await;

    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(json["principal_kind"], "res.users");
    assert_eq!(json["principal_id"], uid);
    assert_eq!(json["expires"], true);
    assert_eq!(json["interval_days"], 30);
    assert_eq!(json["valid"], true);

    // The issued value works on token routes.
    let value = json["token"].as_str().unwrap();
    let (status, whoami) = t
        .send(get_with("/api/tokens/whoami", &[("token", value)]))
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(whoami["uid"], uid);
}

#[tokio::test]
async fn test_issue_token_with_policy() {
    let t = setup().await;
    let (_, cookie) = logged_in(&t, "alice").await;

    let (status, json) = t
        .send(request_with(
            "POST",
            "/api/tokens",
            &[("cookie", &cookie)],
            Some(json!({"expires": false, "interval_days": 7})),
        ))
        .await;

    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(json["expires"], false);
    assert_eq!(json["interval_days"], 7);
    let issued_at = parse_time(&json["issued_at"]);
    let expires_at = parse_time(&json["expires_at"]);
    assert_eq!(expires_at - issued_at, TimeDelta::days(7));
}

#[tokio::test]
async fn test_issue_token_rejects_bad_interval() {
    let t = setup().await;
    let (_, cookie) = logged_in(&t, "alice").await;

    let (status, _) = t
        .send(request_with(
            "POST",
            "/api/tokens",
            &[("cookie", &cookie)],
            Some(json!({"interval_days": 0})),
        ))
        .await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_issue_requires_session() {
    let t = setup().await;
    let uid = t.create_user("alice").await;
    let token = t.issue_user_token(uid).await;

    let (status, _) = t
        .send(request_with(
            "POST",
            "/api/tokens",
            &[("token", &token.value)],
            Some(json!({})),
        ))
        .await;

    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_list_tokens_hides_values_and_other_users() {
    let t = setup().await;
    let (uid, cookie) = logged_in(&t, "alice").await;
    let bob = t.create_user("bob").await;
    t.issue_user_token(uid).await;
    t.issue_user_token(uid).await;
    t.issue_user_token(bob).await;

    let (status, json) = t.send(get_with("/api/tokens", &[("cookie", &cookie)])).await;

    assert_eq!(status, StatusCode::OK);
    let tokens = json["tokens"].as_array().unwrap();
    assert_eq!(tokens.len(), 2);
    for token in tokens {
        assert_eq!(token["principal_id"], uid);
        assert!(token.get("token").is_none());
    }
}

#[tokio::test]
async fn test_renew_replaces_presented_token() {
    let t = setup().await;
    let uid = t.create_user("alice").await;
    let token = t
        .db
        .tokens()
        .issue_at(
            &Principal::new("res.users", uid),
            TokenPolicy::default(),
            Utc::now() - TimeDelta::days(10),
        )
        .await
        .unwrap();

    let (status, json) = t
        .send(request_with("POST", "/api/tokens/renew", &[("token", &token.value)], None))
        .await;

    assert_eq!(status, StatusCode::OK);
    let new_value = json["token"].as_str().unwrap();
    assert_ne!(new_value, token.value);
    assert_eq!(json["id"], token.id);
    assert_eq!(json["principal_id"], uid);
    assert!(parse_time(&json["expires_at"]) > token.expires_at);

    let (status, _) = t
        .send(get_with("/api/tokens/whoami", &[("token", &token.value)]))
        .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let (status, _) = t
        .send(get_with("/api/tokens/whoami", &[("token", new_value)]))
        .await;
    assert_eq!(status, StatusCode::OK);
}

#[tokio::test]
async fn test_renew_with_session_is_bad_request() {
    let t = setup().await;
    let (_, cookie) = logged_in(&t, "alice").await;

    let (status, _) = t
        .send(request_with("POST", "/api/tokens/renew", &[("cookie", &cookie)], None))
        .await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_update_token_policy() {
    let t = setup().await;
    let (uid, cookie) = logged_in(&t, "alice").await;
    let token = t.issue_user_token(uid).await;

    let uri = format!("/api/tokens/{}", token.id);
    let (status, json) = t
        .send(request_with(
            "PATCH",
            &uri,
            &[("cookie", &cookie)],
            Some(json!({"interval_days": 1})),
        ))
        .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["expires"], true);
    assert_eq!(json["interval_days"], 1);

    let stored = t.db.tokens().get_by_id(token.id).await.unwrap().unwrap();
    assert_eq!(stored.expires_at, stored.issued_at + TimeDelta::days(1));
    assert_eq!(stored.value, token.value);
}

#[tokio::test]
async fn test_cannot_manage_other_users_token() {
    let t = setup().await;
    let (_, cookie) = logged_in(&t, "alice").await;
    let bob = t.create_user("bob").await;
    let bob_token = t.issue_user_token(bob).await;

    let uri = format!("/api/tokens/{}", bob_token.id);
    let (status, _) = t
        .send(request_with(
            "PATCH",
            &uri,
            &[("cookie", &cookie)],
            Some(json!({"expires": false})),
        ))
        .await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, _) = t
        .send(request_with("DELETE", &uri, &[("cookie", &cookie)], None))
        .await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    assert!(t.db.tokens().get_by_id(bob_token.id).await.unwrap().is_some());
}

#[tokio::test]
async fn test_delete_token_revokes_it() {
    let t = setup().await;
    let (uid, cookie) = logged_in(&t, "alice").await;
    let token = t.issue_user_token(uid).await;

    let uri = format!("/api/tokens/{}", token.id);
    let (status, json) = t
        .send(request_with("DELETE", &uri, &[("cookie", &cookie)], None))
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["deleted"], true);

    let (status, json) = t
        .send(get_with("/api/tokens/whoami", &[("token", &token.value)]))
        .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(json["error"], "Invalid token, access denied");

    let (status, _) = t
        .send(request_with("DELETE", &uri, &[("cookie", &cookie)], None))
        .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}
