use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{Executor, FromRow, Sqlite, SqlitePool, Type};
use strum_macros::{Display, EnumString};
use ts_rs::TS;
use uuid::Uuid;
use validator::Validate;

#[derive(
    Debug, Clone, Copy, Type, Serialize, Deserialize, PartialEq, Eq, TS, EnumString, Display, Default,
)]
#[sqlx(type_name = "client_status", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum ClientStatus {
    #[default]
    Active,
    Inactive,
}

#[derive(Debug, Clone, FromRow, Serialize, Deserialize, TS)]
pub struct Client {
    pub id: Uuid,
    pub coach_id: Uuid, // Foreign key to Coach
    pub name: String,
    pub email: String,
    pub phone: Option<String>,
    pub status: ClientStatus,
    pub goals: Option<String>,
    pub notes: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize, TS, Validate)]
pub struct CreateClient {
    #[validate(length(min = 1, max = 200, message = "Name is required"))]
    pub name: String,
    #[validate(email(message = "Invalid email address"))]
    pub email: String,
    #[validate(length(max = 40))]
    pub phone: Option<String>,
    pub status: Option<ClientStatus>,
    #[validate(length(max = 2000))]
    pub goals: Option<String>,
    #[validate(length(max = 5000))]
    pub notes: Option<String>,
}

/// Partial update; absent fields keep their current value.
#[derive(Debug, Clone, Default, Serialize, Deserialize, TS, Validate)]
pub struct UpdateClient {
    #[validate(length(min = 1, max = 200, message = "Name is required"))]
    pub name: Option<String>,
    #[validate(email(message = "Invalid email address"))]
    pub email: Option<String>,
    #[validate(length(max = 40))]
    pub phone: Option<String>,
    pub status: Option<ClientStatus>,
    #[validate(length(max = 2000))]
    pub goals: Option<String>,
    #[validate(length(max = 5000))]
    pub notes: Option<String>,
}

impl Client {
    pub fn apply(&mut self, patch: UpdateClient) {
        if let Some(name) = patch.name {
            self.name = name;
        }
        if let Some(email) = patch.email {
            self.email = email;
        }
        if patch.phone.is_some() {
            self.phone = patch.phone;
        }
        if let Some(status) = patch.status {
            self.status = status;
        }
        if patch.goals.is_some() {
            self.goals = patch.goals;
        }
        if patch.notes.is_some() {
            self.notes = patch.notes;
        }
    }

    pub async fn find_by_coach_id(
        pool: &SqlitePool,
        coach_id: Uuid,
    ) -> Result<Vec<Self>, sqlx::Error> {
        sqlx::query_as::<_, Client>(
            r#"SELECT * FROM clients
               WHERE coach_id = $1
               ORDER BY name COLLATE NOCASE ASC, created_at ASC"#,
        )
        .bind(coach_id)
        .fetch_all(pool)
        .await
    }

    pub async fn find_by_id(pool: &SqlitePool, id: Uuid) -> Result<Option<Self>, sqlx::Error> {
        sqlx::query_as::<_, Client>("SELECT * FROM clients WHERE id = $1")
            .bind(id)
            .fetch_optional(pool)
            .await
    }

    /// Look up a client only if it belongs to `coach_id`.
    pub async fn find_for_coach(
        pool: &SqlitePool,
        coach_id: Uuid,
        id: Uuid,
    ) -> Result<Option<Self>, sqlx::Error> {
        sqlx::query_as::<_, Client>("SELECT * FROM clients WHERE id = $1 AND coach_id = $2")
            .bind(id)
            .bind(coach_id)
            .fetch_optional(pool)
            .await
    }

    pub async fn create(
        pool: &SqlitePool,
        coach_id: Uuid,
        data: &CreateClient,
        client_id: Uuid,
    ) -> Result<Self, sqlx::Error> {
        let now = Utc::now();
        let status = data.status.unwrap_or_default();
        sqlx::query_as::<_, Client>(
            r#"INSERT INTO clients (id, coach_id, name, email, phone, status, goals, notes, created_at, updated_at)
               VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $9)
               RETURNING *"#,
        )
        .bind(client_id)
        .bind(coach_id)
        .bind(data.name.trim())
        .bind(data.email.trim())
        .bind(&data.phone)
        .bind(status)
        .bind(&data.goals)
        .bind(&data.notes)
        .bind(now)
        .fetch_one(pool)
        .await
    }

    /// Write every mutable column of `client` back to its row.
    pub async fn update(pool: &SqlitePool, client: &Client) -> Result<Self, sqlx::Error> {
        sqlx::query_as::<_, Client>(
            r#"UPDATE clients
               SET name = $3, email = $4, phone = $5, status = $6, goals = $7, notes = $8, updated_at = $9
               WHERE id = $1 AND coach_id = $2
               RETURNING *"#,
        )
        .bind(client.id)
        .bind(client.coach_id)
        .bind(&client.name)
        .bind(&client.email)
        .bind(&client.phone)
        .bind(client.status)
        .bind(&client.goals)
        .bind(&client.notes)
        .bind(Utc::now())
        .fetch_one(pool)
        .await
    }

    pub async fn delete<'e, E>(executor: E, id: Uuid) -> Result<u64, sqlx::Error>
    where
        E: Executor<'e, Database = Sqlite>,
    {
        let result = sqlx::query("DELETE FROM clients WHERE id = $1")
            .bind(id)
            .execute(executor)
            .await?;
        Ok(result.rows_affected())
    }

    /// (active, inactive) client counts for a coach.
    pub async fn count_by_status(
        pool: &SqlitePool,
        coach_id: Uuid,
    ) -> Result<(i64, i64), sqlx::Error> {
        sqlx::query_as::<_, (i64, i64)>(
            r#"SELECT
                 COALESCE(SUM(CASE WHEN status = 'active' THEN 1 ELSE 0 END), 0),
                 COALESCE(SUM(CASE WHEN status = 'inactive' THEN 1 ELSE 0 END), 0)
               FROM clients
               WHERE coach_id = $1"#,
        )
        .bind(coach_id)
        .fetch_one(pool)
        .await
    }
}
