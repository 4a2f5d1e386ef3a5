//! Token management API endpoints.
//!
//! - GET `/whoami` - Identity bound by the presented token (token auth)
//! - POST `/renew` - Regenerate the presented token (token auth)
//! - GET `/` - List the session user's tokens
//! - POST `/` - Issue a token for the session user
//! - PATCH `/{id}` - Change the expiration policy of an own token
//! - DELETE `/{id}` - Delete an own token

use axum::{
    Json, Router,
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
    routing::{get, patch, post},
};
use chrono::{DateTime, TimeDelta, Utc};
use serde::{Deserialize, Serialize};
use tracing::info;

use super::error::{ApiError, ResultExt};
use crate::auth::{AuthContext, AuthMethod, AuthSource};
use crate::db::{Database, Principal, Token, TokenPolicy, TokenStoreError};
use crate::dispatch::DispatchGuard;

/// Longest expiration interval a client may ask for.
const MAX_INTERVAL_DAYS: i64 = 3650;

#[derive(Clone)]
pub struct TokensState {
    pub db: Database,
    /// Policy for tokens issued without explicit settings.
    pub token_policy: TokenPolicy,
}

pub fn router(state: TokensState, guard: &DispatchGuard) -> Router {
    Router::new()
        .route(
            "/",
            guard.require(AuthMethod::User, get(list_tokens).post(issue_token)),
        )
        .route("/whoami", guard.require(AuthMethod::Token, get(whoami)))
        .route("/renew", guard.require(AuthMethod::Token, post(renew_token)))
        .route(
            "/{id}",
            guard.require(AuthMethod::User, patch(update_token).delete(delete_token)),
        )
        .with_state(state)
}

#[derive(Serialize)]
struct WhoAmIResponse {
    source: AuthSource,
    principal_kind: Option<String>,
    principal_id: Option<i64>,
    uid: Option<i64>,
}

/// Token metadata. The value itself is only returned when a token is
/// issued or renewed.
#[derive(Serialize)]
struct TokenInfo {
    id: i64,
    principal_kind: String,
    principal_id: i64,
    expires: bool,
    interval_days: i64,
    issued_at: DateTime<Utc>,
    expires_at: DateTime<Utc>,
    valid: bool,
}

impl From<&Token> for TokenInfo {
    fn from(token: &Token) -> Self {
        Self {
            id: token.id,
            principal_kind: token.principal.kind.clone(),
            principal_id: token.principal.id,
            expires: token.expires,
            interval_days: token.expiration_interval.num_days(),
            issued_at: token.issued_at,
            expires_at: token.expires_at,
            valid: token.is_valid(Utc::now()),
        }
    }
}

#[derive(Serialize)]
struct IssuedTokenResponse {
    token: String,
    #[serde(flatten)]
    info: TokenInfo,
}

impl From<Token> for IssuedTokenResponse {
    fn from(token: Token) -> Self {
        let info = TokenInfo::from(&token);
        Self {
            token: token.value,
            info,
        }
    }
}

#[derive(Serialize)]
struct ListTokensResponse {
    tokens: Vec<TokenInfo>,
}

#[derive(Deserialize, Default)]
struct TokenPolicyRequest {
    expires: Option<bool>,
    interval_days: Option<i64>,
}

impl TokenPolicyRequest {
    /// Apply the requested fields on top of `base`.
    fn into_policy(self, base: TokenPolicy) -> Result<TokenPolicy, ApiError> {
        let interval = match self.interval_days {
            Some(days) if (1..=MAX_INTERVAL_DAYS).contains(&days) => TimeDelta::days(days),
            Some(_) => {
                return Err(ApiError::bad_request(format!(
                    "interval_days must be between 1 and {}",
                    MAX_INTERVAL_DAYS
                )));
            }
            None => base.interval,
        };

        Ok(TokenPolicy {
            expires: self.expires.unwrap_or(base.expires),
            interval,
        })
    }
}

fn store_err(context: &str, e: TokenStoreError) -> ApiError {
    match e {
        TokenStoreError::NotFound => ApiError::not_found("Token not found"),
        e => ApiError::db_error(context, e),
    }
}

fn require_principal(auth: &AuthContext) -> Result<&Principal, ApiError> {
    auth.principal()
        .ok_or_else(|| ApiError::unauthorized("Not authenticated"))
}

/// Load a token and check that it belongs to the caller.
async fn owned_token(db: &Database, auth: &AuthContext, id: i64) -> Result<Token, ApiError> {
    let principal = require_principal(auth)?;
    let token = db
        .tokens()
        .get_by_id(id)
        .await
        .db_err("Failed to get token")?
        .ok_or_else(|| ApiError::not_found("Token not found"))?;

    if &token.principal != principal {
        return Err(ApiError::forbidden("Cannot manage another principal's token"));
    }
    Ok(token)
}

/// Report the identity the request was authenticated as.
async fn whoami(auth: AuthContext) -> impl IntoResponse {
    Json(WhoAmIResponse {
        source: auth.source(),
        principal_kind: auth.principal().map(|p| p.kind.clone()),
        principal_id: auth.principal().map(|p| p.id),
        uid: auth.uid(),
    })
}

/// Regenerate the token the request was authenticated with.
/// The old value stops working immediately.
async fn renew_token(
    State(state): State<TokensState>,
    auth: AuthContext,
) -> Result<impl IntoResponse, ApiError> {
    let value = auth
        .token()
        .ok_or_else(|| ApiError::bad_request("Request was not authenticated by token"))?;

    let token = state
        .db
        .tokens()
        .find_by_value(value)
        .await
        .db_err("Failed to find token")?
        .ok_or_else(|| ApiError::not_found("Token not found"))?;

    let renewed = state
        .db
        .tokens()
        .renew(&token)
        .await
        .map_err(|e| store_err("Failed to renew token", e))?;

    info!(id = renewed.id, kind = %renewed.principal.kind, "Token renewed");
    Ok(Json(IssuedTokenResponse::from(renewed)))
}

async fn list_tokens(
    State(state): State<TokensState>,
    auth: AuthContext,
) -> Result<impl IntoResponse, ApiError> {
    let principal = require_principal(&auth)?;
    let tokens = state
        .db
        .tokens()
        .list_by_principal(principal)
        .await
        .db_err("Failed to list tokens")?;

    Ok(Json(ListTokensResponse {
        tokens: tokens.iter().map(TokenInfo::from).collect(),
    }))
}

async fn issue_token(
    State(state): State<TokensState>,
    auth: AuthContext,
    Json(payload): Json<TokenPolicyRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let principal = require_principal(&auth)?;
    let policy = payload.into_policy(state.token_policy)?;

    let token = state
        .db
        .tokens()
        .issue(principal, policy)
        .await
        .map_err(|e| store_err("Failed to issue token", e))?;

    info!(id = token.id, kind = %principal.kind, principal_id = principal.id, "Token issued");
    Ok((StatusCode::CREATED, Json(IssuedTokenResponse::from(token))))
}

async fn update_token(
    State(state): State<TokensState>,
    auth: AuthContext,
    Path(id): Path<i64>,
    Json(payload): Json<TokenPolicyRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let token = owned_token(&state.db, &auth, id).await?;
    let policy = payload.into_policy(TokenPolicy {
        expires: token.expires,
        interval: token.expiration_interval,
    })?;

    let updated = state
        .db
        .tokens()
        .set_expiration(token.id, policy)
        .await
        .map_err(|e| store_err("Failed to update token", e))?;

    Ok(Json(TokenInfo::from(&updated)))
}

#[derive(Serialize)]
struct DeleteResponse {
    deleted: bool,
}

async fn delete_token(
    State(state): State<TokensState>,
    auth: AuthContext,
    Path(id): Path<i64>,
) -> Result<impl IntoResponse, ApiError> {
    let token = owned_token(&state.db, &auth, id).await?;
    let deleted = state
        .db
        .tokens()
        .delete(token.id)
        .await
        .db_err("Failed to delete token")?;

    info!(id = token.id, "Token deleted");
    Ok(Json(DeleteResponse { deleted }))
}
