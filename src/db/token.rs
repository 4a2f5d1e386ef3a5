//! Opaque bearer tokens bound to a principal.
//!
//! A token authenticates any addressable resource (a principal kind plus an
//! id), not only users. Values come from the thread-local CSPRNG and are never
//! derived from principal data. Expiry is checked lazily by [`Token::is_valid`];
//! nothing sweeps expired rows.

use base64::{Engine as _, engine::general_purpose::URL_SAFE_NO_PAD};
use chrono::{DateTime, TimeDelta, Utc};
use rand::RngCore;
use sqlx::SqliteExecutor;
use sqlx::sqlite::SqlitePool;
use thiserror::Error;
use tracing::warn;

/// Random bytes per token value (160 bits before encoding).
pub const TOKEN_BYTES: usize = 20;

/// Default lifetime of an expiring token.
pub const DEFAULT_EXPIRATION_DAYS: i64 = 30;

/// How many fresh values to try before giving up on a uniqueness violation.
const MAX_GENERATION_ATTEMPTS: usize = 5;

const TOKEN_COLUMNS: &str = "id, principal_kind, principal_id, value, expires, expiration_interval_secs, issued_at, expires_at";

#[derive(Debug, Error)]
pub enum TokenStoreError {
    #[error("token value collided {0} times in a row")]
    ConstraintViolation(usize),
    #[error("token not found")]
    NotFound,
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
}

/// The resource a token authenticates as.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Principal {
    pub kind: String,
    pub id: i64,
}

impl Principal {
    pub fn new(kind: impl Into<String>, id: i64) -> Self {
        Self {
            kind: kind.into(),
            id,
        }
    }
}

/// Expiration policy applied when a token is issued or its policy changes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TokenPolicy {
    pub expires: bool,
    pub interval: TimeDelta,
}

impl Default for TokenPolicy {
    fn default() -> Self {
        Self {
            expires: true,
            interval: TimeDelta::days(DEFAULT_EXPIRATION_DAYS),
        }
    }
}

impl TokenPolicy {
    pub fn expiring_after(interval: TimeDelta) -> Self {
        Self {
            expires: true,
            interval,
        }
    }

    pub fn never_expires() -> Self {
        Self {
            expires: false,
            ..Self::default()
        }
    }
}

#[derive(Debug, Clone)]
pub struct Token {
    pub id: i64,
    pub principal: Principal,
    pub value: String,
    pub expires: bool,
    pub expiration_interval: TimeDelta,
    pub issued_at: DateTime<Utc>,
    /// Always `issued_at + expiration_interval`; only consulted when `expires`.
    pub expires_at: DateTime<Utc>,
}

impl Token {
    /// Whether the token may authenticate a request at `now`.
    ///
    /// Pure check: tokens are not consumed by use.
    pub fn is_valid(&self, now: DateTime<Utc>) -> bool {
        !self.expires || now < self.expires_at
    }
}

#[derive(sqlx::FromRow)]
struct TokenRow {
    id: i64,
    principal_kind: String,
    principal_id: i64,
    value: String,
    expires: i32,
    expiration_interval_secs: i64,
    issued_at: DateTime<Utc>,
    expires_at: DateTime<Utc>,
}

impl From<TokenRow> for Token {
    fn from(row: TokenRow) -> Self {
        Self {
            id: row.id,
            principal: Principal::new(row.principal_kind, row.principal_id),
            value: row.value,
            expires: row.expires != 0,
            expiration_interval: TimeDelta::seconds(row.expiration_interval_secs),
            issued_at: row.issued_at,
            expires_at: row.expires_at,
        }
    }
}

/// Generate a new unguessable token value (URL-safe base64, no padding).
pub fn generate_token_value() -> String {
    let mut bytes = [0u8; TOKEN_BYTES];
    rand::rng().fill_bytes(&mut bytes);
    URL_SAFE_NO_PAD.encode(bytes)
}

fn expiry(issued_at: DateTime<Utc>, interval: TimeDelta) -> DateTime<Utc> {
    issued_at
        .checked_add_signed(interval)
        .unwrap_or(DateTime::<Utc>::MAX_UTC)
}

fn is_unique_violation(e: &sqlx::Error) -> bool {
    e.as_database_error()
        .is_some_and(|db_err| db_err.is_unique_violation())
}

async fn fetch_by_id<'e, E>(executor: E, id: i64) -> Result<Option<Token>, sqlx::Error>
where
    E: SqliteExecutor<'e>,
{
    let sql = format!("SELECT {TOKEN_COLUMNS} FROM auth_tokens WHERE id = ?");
    let row = sqlx::query_as::<_, TokenRow>(&sql)
        .bind(id)
        .fetch_optional(executor)
        .await?;
    Ok(row.map(Token::from))
}

/// Store for authentication tokens.
#[derive(Clone)]
pub struct TokenStore {
    pool: SqlitePool,
}

impl TokenStore {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Issue a token for `principal` starting now.
    pub async fn issue(
        &self,
        principal: &Principal,
        policy: TokenPolicy,
    ) -> Result<Token, TokenStoreError> {
        self.issue_at(principal, policy, Utc::now()).await
    }

    /// Issue a token for `principal` as of `now`.
    pub async fn issue_at(
        &self,
        principal: &Principal,
        policy: TokenPolicy,
        now: DateTime<Utc>,
    ) -> Result<Token, TokenStoreError> {
        self.issue_with(principal, policy, now, generate_token_value)
            .await
    }

    async fn issue_with(
        &self,
        principal: &Principal,
        policy: TokenPolicy,
        now: DateTime<Utc>,
        mut next_value: impl FnMut() -> String,
    ) -> Result<Token, TokenStoreError> {
        let expires_at = expiry(now, policy.interval);
        let mut tx = self.pool.begin().await?;

        for attempt in 1..=MAX_GENERATION_ATTEMPTS {
            let value = next_value();
            let result = sqlx::query(
                "INSERT INTO auth_tokens (principal_kind, principal_id, value, expires, expiration_interval_secs, issued_at, expires_at) VALUES (?, ?, ?, ?, ?, ?, ?)",
            )
            .bind(&principal.kind)
            .bind(principal.id)
            .bind(&value)
            .bind(policy.expires as i32)
            .bind(policy.interval.num_seconds())
            .bind(now)
            .bind(expires_at)
            .execute(&mut *tx)
            .await;

            match result {
                Ok(done) => {
                    tx.commit().await?;
                    return Ok(Token {
                        id: done.last_insert_rowid(),
                        principal: principal.clone(),
                        value,
                        expires: policy.expires,
                        expiration_interval: policy.interval,
                        issued_at: now,
                        expires_at,
                    });
                }
                Err(e) if is_unique_violation(&e) => {
                    warn!(attempt, kind = %principal.kind, "Token value collision, regenerating");
                }
                Err(e) => return Err(e.into()),
            }
        }

        Err(TokenStoreError::ConstraintViolation(MAX_GENERATION_ATTEMPTS))
    }

    /// Regenerate the value of `token` and restart its lifetime now.
    pub async fn renew(&self, token: &Token) -> Result<Token, TokenStoreError> {
        self.renew_at(token, Utc::now()).await
    }

    /// Regenerate the value of `token` and restart its lifetime at `now`.
    ///
    /// The stored interval is used, not the one on the passed-in value.
    pub async fn renew_at(
        &self,
        token: &Token,
        now: DateTime<Utc>,
    ) -> Result<Token, TokenStoreError> {
        self.renew_with(token.id, now, generate_token_value).await
    }

    async fn renew_with(
        &self,
        token_id: i64,
        now: DateTime<Utc>,
        mut next_value: impl FnMut() -> String,
    ) -> Result<Token, TokenStoreError> {
        let mut tx = self.pool.begin().await?;
        let current = fetch_by_id(&mut *tx, token_id)
            .await?
            .ok_or(TokenStoreError::NotFound)?;
        let expires_at = expiry(now, current.expiration_interval);

        for attempt in 1..=MAX_GENERATION_ATTEMPTS {
            let value = next_value();
            let result = sqlx::query(
                "UPDATE auth_tokens SET value = ?, issued_at = ?, expires_at = ? WHERE id = ?",
            )
            .bind(&value)
            .bind(now)
            .bind(expires_at)
            .bind(token_id)
            .execute(&mut *tx)
            .await;

            match result {
                Ok(_) => {
                    tx.commit().await?;
                    return Ok(Token {
                        value,
                        issued_at: now,
                        expires_at,
                        ..current
                    });
                }
                Err(e) if is_unique_violation(&e) => {
                    warn!(attempt, token_id, "Token value collision on renewal, regenerating");
                }
                Err(e) => return Err(e.into()),
            }
        }

        Err(TokenStoreError::ConstraintViolation(MAX_GENERATION_ATTEMPTS))
    }

    /// Change the expiration policy of a token. `expires_at` is recomputed
    /// from the original issuance time.
    pub async fn set_expiration(
        &self,
        token_id: i64,
        policy: TokenPolicy,
    ) -> Result<Token, TokenStoreError> {
        let mut tx = self.pool.begin().await?;
        let current = fetch_by_id(&mut *tx, token_id)
            .await?
            .ok_or(TokenStoreError::NotFound)?;
        let expires_at = expiry(current.issued_at, policy.interval);

        sqlx::query(
            "UPDATE auth_tokens SET expires = ?, expiration_interval_secs = ?, expires_at = ? WHERE id = ?",
        )
        .bind(policy.expires as i32)
        .bind(policy.interval.num_seconds())
        .bind(expires_at)
        .bind(token_id)
        .execute(&mut *tx)
        .await?;
        tx.commit().await?;

        Ok(Token {
            expires: policy.expires,
            expiration_interval: policy.interval,
            expires_at,
            ..current
        })
    }

    /// Look a token up by its exact value.
    ///
    /// The caller strips any scheme prefix first. Uniqueness only holds per
    /// principal, so a value shared by two principals matches nothing.
    pub async fn find_by_value(&self, value: &str) -> Result<Option<Token>, sqlx::Error> {
        let sql = format!("SELECT {TOKEN_COLUMNS} FROM auth_tokens WHERE value = ? LIMIT 2");
        let mut rows = sqlx::query_as::<_, TokenRow>(&sql)
            .bind(value)
            .fetch_all(&self.pool)
            .await?;

        match rows.len() {
            0 => Ok(None),
            1 => Ok(rows.pop().map(Token::from)),
            _ => {
                warn!("Token value matches more than one principal, refusing it");
                Ok(None)
            }
        }
    }

    pub async fn get_by_id(&self, id: i64) -> Result<Option<Token>, sqlx::Error> {
        fetch_by_id(&self.pool, id).await
    }

    /// List the tokens of a principal, newest first.
    pub async fn list_by_principal(
        &self,
        principal: &Principal,
    ) -> Result<Vec<Token>, sqlx::Error> {
        let sql = format!(
            "SELECT {TOKEN_COLUMNS} FROM auth_tokens WHERE principal_kind = ? AND principal_id = ? ORDER BY issued_at DESC, id DESC"
        );
        let rows = sqlx::query_as::<_, TokenRow>(&sql)
            .bind(&principal.kind)
            .bind(principal.id)
            .fetch_all(&self.pool)
            .await?;
        Ok(rows.into_iter().map(Token::from).collect())
    }

    /// Delete a token (revocation).
    pub async fn delete(&self, id: i64) -> Result<bool, sqlx::Error> {
        let result = sqlx::query("DELETE FROM auth_tokens WHERE id = ?")
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }
}
