use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{FromRow, SqlitePool};
use ts_rs::TS;
use uuid::Uuid;

/// A coach account. Coaches own every other row in the system.
#[derive(Debug, Clone, FromRow, Serialize, Deserialize, TS)]
pub struct Coach {
    pub id: Uuid,
    pub email: String,
    #[serde(skip)]
    #[ts(skip)]
    pub password_hash: String,
    pub full_name: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct CreateCoach {
    pub email: String,
    pub password_hash: String,
    pub full_name: String,
}

impl Coach {
    pub async fn create(
        pool: &SqlitePool,
        id: Uuid,
        data: &CreateCoach,
    ) -> Result<Self, sqlx::Error> {
        let now = Utc::now();
        sqlx::query_as::<_, Coach>(
            r#"INSERT INTO coaches (id, email, password_hash, full_name, created_at, updated_at)
               VALUES ($1, $2, $3, $4, $5, $5)
               RETURNING *"#,
        )
        .bind(id)
        .bind(&data.email)
        .bind(&data.password_hash)
        .bind(&data.full_name)
        .bind(now)
        .fetch_one(pool)
        .await
    }

    pub async fn find_by_id(pool: &SqlitePool, id: Uuid) -> Result<Option<Self>, sqlx::Error> {
        sqlx::query_as::<_, Coach>("SELECT * FROM coaches WHERE id = $1")
            .bind(id)
            .fetch_optional(pool)
            .await
    }

    pub async fn find_by_email(
        pool: &SqlitePool,
        email: &str,
    ) -> Result<Option<Self>, sqlx::Error> {
        sqlx::query_as::<_, Coach>("SELECT * FROM coaches WHERE email = $1")
            .bind(email)
            .fetch_optional(pool)
            .await
    }
}
