//! Server-side sessions addressed by the session cookie.
//!
//! A session may outlive its login: logging out clears the bound `uid` but
//! keeps the row and its data.

use chrono::{DateTime, Utc};
use sqlx::sqlite::SqlitePool;
use uuid::Uuid;

#[derive(Debug, Clone)]
pub struct Session {
    pub id: String,
    /// The user bound to this session, if anyone is logged in.
    pub uid: Option<i64>,
    pub data: serde_json::Value,
    pub created_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
}

impl Session {
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        now >= self.expires_at
    }
}

#[derive(sqlx::FromRow)]
struct SessionRow {
    id: String,
    uid: Option<i64>,
    data: String,
    created_at: DateTime<Utc>,
    expires_at: DateTime<Utc>,
}

impl TryFrom<SessionRow> for Session {
    type Error = sqlx::Error;

    fn try_from(row: SessionRow) -> Result<Self, Self::Error> {
        let data =
            serde_json::from_str(&row.data).map_err(|e| sqlx::Error::Decode(Box::new(e)))?;
        Ok(Self {
            id: row.id,
            uid: row.uid,
            data,
            created_at: row.created_at,
            expires_at: row.expires_at,
        })
    }
}

#[derive(Clone)]
pub struct SessionStore {
    pool: SqlitePool,
}

impl SessionStore {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Open a session bound to `uid` (or anonymous) valid until `expires_at`.
    pub async fn create(
        &self,
        uid: Option<i64>,
        expires_at: DateTime<Utc>,
    ) -> Result<Session, sqlx::Error> {
        let session = Session {
            id: Uuid::new_v4().to_string(),
            uid,
            data: serde_json::json!({}),
            created_at: Utc::now(),
            expires_at,
        };

        sqlx::query(
            "INSERT INTO sessions (id, uid, data, created_at, expires_at) VALUES (?, ?, ?, ?, ?)",
        )
        .bind(&session.id)
        .bind(session.uid)
        .bind(session.data.to_string())
        .bind(session.created_at)
        .bind(session.expires_at)
        .execute(&self.pool)
        .await?;

        Ok(session)
    }

    pub async fn get(&self, id: &str) -> Result<Option<Session>, sqlx::Error> {
        let row: Option<SessionRow> = sqlx::query_as(
            "SELECT id, uid, data, created_at, expires_at FROM sessions WHERE id = ?",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;
        row.map(Session::try_from).transpose()
    }

    /// Replace the data blob of a session.
    pub async fn set_data(&self, id: &str, data: &serde_json::Value) -> Result<bool, sqlx::Error> {
        let result = sqlx::query("UPDATE sessions SET data = ? WHERE id = ?")
            .bind(data.to_string())
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    /// Unbind the user from a session, keeping the session and its data.
    pub async fn logout(&self, id: &str) -> Result<bool, sqlx::Error> {
        let result = sqlx::query("UPDATE sessions SET uid = NULL WHERE id = ?")
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::Database;
    use chrono::TimeDelta;

    #[tokio::test]
    async fn test_create_and_get() {
        let db = Database::open(":memory:").await.unwrap();
        let uid = db.users().create("alice").await.unwrap();
        let expires_at = Utc::now() + TimeDelta::hours(1);

        let session = db.sessions().create(Some(uid), expires_at).await.unwrap();
        let loaded = db.sessions().get(&session.id).await.unwrap().unwrap();

        assert_eq!(loaded.uid, Some(uid));
        assert_eq!(loaded.expires_at, expires_at);
        assert!(!loaded.is_expired(Utc::now()));
    }

    #[tokio::test]
    async fn test_logout_keeps_session_data() {
        let db = Database::open(":memory:").await.unwrap();
        let uid = db.users().create("alice").await.unwrap();
        let session = db
            .sessions()
            .create(Some(uid), Utc::now() + TimeDelta::hours(1))
            .await
            .unwrap();
        let data = serde_json::json!({ "lang": "en_US" });
        db.sessions().set_data(&session.id, &data).await.unwrap();

        assert!(db.sessions().logout(&session.id).await.unwrap());

        let loaded = db.sessions().get(&session.id).await.unwrap().unwrap();
        assert_eq!(loaded.uid, None);
        assert_eq!(loaded.data, data);
    }

    #[tokio::test]
    async fn test_unknown_session() {
        let db = Database::open(":memory:").await.unwrap();
        assert!(db.sessions().get("nope").await.unwrap().is_none());
        assert!(!db.sessions().logout("nope").await.unwrap());
    }
}
