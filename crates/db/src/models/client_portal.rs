use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{Executor, FromRow, Sqlite, SqlitePool};
use ts_rs::TS;
use uuid::Uuid;

/// Shareable, access-code gated view of a client's plan. At most one per client.
#[derive(Debug, Clone, FromRow, Serialize, Deserialize, TS)]
pub struct ClientPortal {
    pub id: Uuid,
    pub client_id: Uuid,
    pub coach_id: Uuid,
    pub access_code: String,
    pub portal_url: String,
    pub last_accessed: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl ClientPortal {
    pub async fn find_by_client_id(
        pool: &SqlitePool,
        client_id: Uuid,
    ) -> Result<Option<Self>, sqlx::Error> {
        sqlx::query_as::<_, ClientPortal>("SELECT * FROM client_portals WHERE client_id = $1")
            .bind(client_id)
            .fetch_optional(pool)
            .await
    }

    /// Insert a portal unless the client already has one, then return whichever
    /// row is stored. Concurrent callers all observe the same portal.
    pub async fn insert_or_get(
        pool: &SqlitePool,
        client_id: Uuid,
        coach_id: Uuid,
        access_code: &str,
        portal_url: &str,
    ) -> Result<Self, sqlx::Error> {
        let now = Utc::now();
        sqlx::query(
            r#"INSERT INTO client_portals (id, client_id, coach_id, access_code, portal_url, created_at, updated_at)
               VALUES ($1, $2, $3, $4, $5, $6, $6)
               ON CONFLICT(client_id) DO NOTHING"#,
        )
        .bind(Uuid::new_v4())
        .bind(client_id)
        .bind(coach_id)
        .bind(access_code)
        .bind(portal_url)
        .bind(now)
        .execute(pool)
        .await?;

        Self::find_by_client_id(pool, client_id)
            .await?
            .ok_or(sqlx::Error::RowNotFound)
    }

    pub async fn update_access_code(
        pool: &SqlitePool,
        client_id: Uuid,
        access_code: &str,
        portal_url: &str,
    ) -> Result<Option<Self>, sqlx::Error> {
        sqlx::query_as::<_, ClientPortal>(
            r#"UPDATE client_portals
               SET access_code = $2, portal_url = $3, updated_at = $4
               WHERE client_id = $1
               RETURNING *"#,
        )
        .bind(client_id)
        .bind(access_code)
        .bind(portal_url)
        .bind(Utc::now())
        .fetch_optional(pool)
        .await
    }

    pub async fn touch_last_accessed(
        pool: &SqlitePool,
        id: Uuid,
    ) -> Result<Self, sqlx::Error> {
        sqlx::query_as::<_, ClientPortal>(
            "UPDATE client_portals SET last_accessed = $2 WHERE id = $1 RETURNING *",
        )
        .bind(id)
        .bind(Utc::now())
        .fetch_one(pool)
        .await
    }

    pub async fn delete_by_client_id<'e, E>(executor: E, client_id: Uuid) -> Result<u64, sqlx::Error>
    where
        E: Executor<'e, Database = Sqlite>,
    {
        let result = sqlx::query("DELETE FROM client_portals WHERE client_id = $1")
            .bind(client_id)
            .execute(executor)
            .await?;
        Ok(result.rows_affected())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        DBService,
        models::{
            client::{Client, CreateClient},
            coach::{Coach, CreateCoach},
        },
    };

    async fn seed(db: &DBService) -> Client {
        let coach = Coach::create(
            &db.pool,
            Uuid::new_v4(),
            &CreateCoach {
                email: "coach@example.com".to_string(),
                password_hash: "x".to_string(),
                full_name: "Coach".to_string(),
            },
        )
        .await
        .unwrap();
        Client::create(
            &db.pool,
            coach.id,
            &CreateClient {
                name: "Jane Doe".to_string(),
                email: "jane@x.com".to_string(),
                phone: None,
                status: None,
                goals: None,
                notes: None,
            },
            Uuid::new_v4(),
        )
        .await
        .unwrap()
    }

    #[tokio::test]
    async fn second_insert_returns_existing_portal() {
        let db = DBService::new_in_memory().await.unwrap();
        let client = seed(&db).await;

        let first = ClientPortal::insert_or_get(&db.pool, client.id, client.coach_id, "AAAA1111", "u1")
            .await
            .unwrap();
        let second = ClientPortal::insert_or_get(&db.pool, client.id, client.coach_id, "BBBB2222", "u2")
            .await
            .unwrap();

        assert_eq!(first.id, second.id);
        assert_eq!(second.access_code, "AAAA1111");
    }

    #[tokio::test]
    async fn touching_sets_last_accessed() {
        let db = DBService::new_in_memory().await.unwrap();
        let client = seed(&db).await;
        let portal = ClientPortal::insert_or_get(&db.pool, client.id, client.coach_id, "CODE", "u")
            .await
            .unwrap();
        assert!(portal.last_accessed.is_none());

        let touched = ClientPortal::touch_last_accessed(&db.pool, portal.id).await.unwrap();
        assert!(touched.last_accessed.is_some());
    }
}
