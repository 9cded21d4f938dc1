use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{FromRow, SqlitePool};
use uuid::Uuid;

/// Server-side record of a signed-in session. Tokens carry the session id so a
/// sign-out can invalidate them before they expire.
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct CoachSessionRecord {
    pub id: Uuid,
    pub coach_id: Uuid,
    pub created_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
    pub revoked_at: Option<DateTime<Utc>>,
}

impl CoachSessionRecord {
    pub fn is_active(&self, now: DateTime<Utc>) -> bool {
        self.revoked_at.is_none() && self.expires_at > now
    }

    pub async fn create(
        pool: &SqlitePool,
        coach_id: Uuid,
        expires_at: DateTime<Utc>,
    ) -> Result<Self, sqlx::Error> {
        sqlx::query_as::<_, CoachSessionRecord>(
            r#"INSERT INTO coach_sessions (id, coach_id, created_at, expires_at)
               VALUES ($1, $2, $3, $4)
               RETURNING *"#,
        )
        .bind(Uuid::new_v4())
        .bind(coach_id)
        .bind(Utc::now())
        .bind(expires_at)
        .fetch_one(pool)
        .await
    }

    pub async fn find_by_id(pool: &SqlitePool, id: Uuid) -> Result<Option<Self>, sqlx::Error> {
        sqlx::query_as::<_, CoachSessionRecord>("SELECT * FROM coach_sessions WHERE id = $1")
            .bind(id)
            .fetch_optional(pool)
            .await
    }

    /// Returns the number of sessions revoked (0 if already revoked).
    pub async fn revoke(pool: &SqlitePool, id: Uuid) -> Result<u64, sqlx::Error> {
        let result = sqlx::query(
            "UPDATE coach_sessions SET revoked_at = $2 WHERE id = $1 AND revoked_at IS NULL",
        )
        .bind(id)
        .bind(Utc::now())
        .execute(pool)
        .await?;
        Ok(result.rows_affected())
    }
}
