use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{Executor, FromRow, Sqlite, SqlitePool, Type};
use strum_macros::{Display, EnumString};
use ts_rs::TS;
use uuid::Uuid;

#[derive(
    Debug, Clone, Copy, Type, Serialize, Deserialize, PartialEq, Eq, TS, EnumString, Display,
)]
#[sqlx(type_name = "email_status", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum EmailStatus {
    Sent,
    Failed,
}

#[derive(Debug, Clone, FromRow, Serialize, Deserialize, TS)]
pub struct EmailLog {
    pub id: Uuid,
    pub coach_id: Uuid,
    pub client_id: Option<Uuid>,
    pub recipient: String,
    pub subject: String,
    pub status: EmailStatus,
    pub provider_message_id: Option<String>,
    pub error_message: Option<String>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct CreateEmailLog {
    pub coach_id: Uuid,
    pub client_id: Option<Uuid>,
    pub recipient: String,
    pub subject: String,
    pub status: EmailStatus,
    pub provider_message_id: Option<String>,
    pub error_message: Option<String>,
}

impl EmailLog {
    pub async fn create(pool: &SqlitePool, data: &CreateEmailLog) -> Result<Self, sqlx::Error> {
        sqlx::query_as::<_, EmailLog>(
            r#"INSERT INTO email_logs (id, coach_id, client_id, recipient, subject, status, provider_message_id, error_message, created_at)
               VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
               RETURNING *"#,
        )
        .bind(Uuid::new_v4())
        .bind(data.coach_id)
        .bind(data.client_id)
        .bind(&data.recipient)
        .bind(&data.subject)
        .bind(data.status)
        .bind(&data.provider_message_id)
        .bind(&data.error_message)
        .bind(Utc::now())
        .fetch_one(pool)
        .await
    }

    pub async fn find_by_coach_id(
        pool: &SqlitePool,
        coach_id: Uuid,
        limit: i64,
    ) -> Result<Vec<Self>, sqlx::Error> {
        sqlx::query_as::<_, EmailLog>(
            r#"SELECT * FROM email_logs
               WHERE coach_id = $1
               ORDER BY created_at DESC, rowid DESC
               LIMIT $2"#,
        )
        .bind(coach_id)
        .bind(limit)
        .fetch_all(pool)
        .await
    }

    /// Keep the delivery history of a deleted client but drop the reference.
    pub async fn detach_client<'e, E>(executor: E, client_id: Uuid) -> Result<u64, sqlx::Error>
    where
        E: Executor<'e, Database = Sqlite>,
    {
        let result = sqlx::query("UPDATE email_logs SET client_id = NULL WHERE client_id = $1")
            .bind(client_id)
            .execute(executor)
            .await?;
        Ok(result.rows_affected())
    }
}
