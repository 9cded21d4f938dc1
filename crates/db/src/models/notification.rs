use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{Executor, FromRow, Sqlite, SqlitePool, Type};
use strum_macros::{Display, EnumString};
use ts_rs::TS;
use uuid::Uuid;

#[derive(
    Debug, Clone, Copy, Type, Serialize, Deserialize, PartialEq, Eq, TS, EnumString, Display, Default,
)]
#[sqlx(type_name = "notification_kind", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum NotificationKind {
    WorkoutCompleted,
    NewMessage,
    PortalAccessed,
    #[default]
    General,
}

/// Coach-facing alert raised by something a client did.
#[derive(Debug, Clone, FromRow, Serialize, Deserialize, TS)]
pub struct Notification {
    pub id: Uuid,
    pub coach_id: Uuid,
    pub client_id: Option<Uuid>,
    pub kind: NotificationKind,
    pub title: String,
    pub message: String,
    pub read: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct CreateNotification {
    pub coach_id: Uuid,
    pub client_id: Option<Uuid>,
    pub kind: NotificationKind,
    pub title: String,
    pub message: String,
}

impl Notification {
    pub async fn create<'e, E>(executor: E, data: &CreateNotification) -> Result<Self, sqlx::Error>
    where
        E: Executor<'e, Database = Sqlite>,
    {
        let now = Utc::now();
        sqlx::query_as::<_, Notification>(
            r#"INSERT INTO notifications (id, coach_id, client_id, kind, title, message, read, created_at, updated_at)
               VALUES ($1, $2, $3, $4, $5, $6, 0, $7, $7)
               RETURNING *"#,
        )
        .bind(Uuid::new_v4())
        .bind(data.coach_id)
        .bind(data.client_id)
        .bind(data.kind)
        .bind(&data.title)
        .bind(&data.message)
        .bind(now)
        .fetch_one(executor)
        .await
    }

    pub async fn find_by_coach_id(
        pool: &SqlitePool,
        coach_id: Uuid,
        unread_only: bool,
    ) -> Result<Vec<Self>, sqlx::Error> {
        sqlx::query_as::<_, Notification>(
            r#"SELECT * FROM notifications
               WHERE coach_id = $1 AND ($2 = 0 OR read = 0)
               ORDER BY created_at DESC, rowid DESC"#,
        )
        .bind(coach_id)
        .bind(unread_only)
        .fetch_all(pool)
        .await
    }

    pub async fn mark_read(
        pool: &SqlitePool,
        coach_id: Uuid,
        id: Uuid,
    ) -> Result<Option<Self>, sqlx::Error> {
        sqlx::query_as::<_, Notification>(
            r#"UPDATE notifications
               SET read = 1, updated_at = $3
               WHERE id = $1 AND coach_id = $2
               RETURNING *"#,
        )
        .bind(id)
        .bind(coach_id)
        .bind(Utc::now())
        .fetch_optional(pool)
        .await
    }

    pub async fn mark_all_read(
        pool: &SqlitePool,
        coach_id: Uuid,
    ) -> Result<Vec<Self>, sqlx::Error> {
        sqlx::query_as::<_, Notification>(
            r#"UPDATE notifications
               SET read = 1, updated_at = $2
               WHERE coach_id = $1 AND read = 0
               RETURNING *"#,
        )
        .bind(coach_id)
        .bind(Utc::now())
        .fetch_all(pool)
        .await
    }

    pub async fn delete(pool: &SqlitePool, coach_id: Uuid, id: Uuid) -> Result<u64, sqlx::Error> {
        let result = sqlx::query("DELETE FROM notifications WHERE id = $1 AND coach_id = $2")
            .bind(id)
            .bind(coach_id)
            .execute(pool)
            .await?;
        Ok(result.rows_affected())
    }

    pub async fn delete_all_for_coach(pool: &SqlitePool, coach_id: Uuid) -> Result<u64, sqlx::Error> {
        let result = sqlx::query("DELETE FROM notifications WHERE coach_id = $1")
            .bind(coach_id)
            .execute(pool)
            .await?;
        Ok(result.rows_affected())
    }

    /// Returns the ids of the removed rows.
    pub async fn delete_by_client_id<'e, E>(executor: E, client_id: Uuid) -> Result<Vec<Uuid>, sqlx::Error>
    where
        E: Executor<'e, Database = Sqlite>,
    {
        sqlx::query_scalar::<_, Uuid>("DELETE FROM notifications WHERE client_id = $1 RETURNING id")
            .bind(client_id)
            .fetch_all(executor)
            .await
    }

    pub async fn count_unread(pool: &SqlitePool, coach_id: Uuid) -> Result<i64, sqlx::Error> {
        sqlx::query_scalar::<_, i64>(
            "SELECT COUNT(*) FROM notifications WHERE coach_id = $1 AND read = 0",
        )
        .bind(coach_id)
        .fetch_one(pool)
        .await
    }
}
