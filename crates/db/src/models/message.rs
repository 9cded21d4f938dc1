use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{Executor, FromRow, Sqlite, SqlitePool, Type};
use strum_macros::{Display, EnumString};
use ts_rs::TS;
use uuid::Uuid;

/// Which party of the coach/client conversation wrote a message.
#[derive(
    Debug, Clone, Copy, Type, Serialize, Deserialize, PartialEq, Eq, TS, EnumString, Display,
)]
#[sqlx(type_name = "message_sender", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum MessageSender {
    Coach,
    Client,
}

impl MessageSender {
    pub fn other(self) -> Self {
        match self {
            MessageSender::Coach => MessageSender::Client,
            MessageSender::Client => MessageSender::Coach,
        }
    }
}

#[derive(Debug, Clone, FromRow, Serialize, Deserialize, TS)]
pub struct Message {
    pub id: Uuid,
    pub client_id: Uuid,
    pub coach_id: Uuid,
    pub sender: MessageSender,
    pub content: String,
    pub read: bool,
    pub read_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Message {
    pub async fn create(
        pool: &SqlitePool,
        client_id: Uuid,
        coach_id: Uuid,
        sender: MessageSender,
        content: &str,
    ) -> Result<Self, sqlx::Error> {
        let now = Utc::now();
        sqlx::query_as::<_, Message>(
            r#"INSERT INTO messages (id, client_id, coach_id, sender, content, read, created_at, updated_at)
               VALUES ($1, $2, $3, $4, $5, 0, $6, $6)
               RETURNING *"#,
        )
        .bind(Uuid::new_v4())
        .bind(client_id)
        .bind(coach_id)
        .bind(sender)
        .bind(content)
        .bind(now)
        .fetch_one(pool)
        .await
    }

    /// Whole conversation in commit order.
    pub async fn find_by_client_id(
        pool: &SqlitePool,
        client_id: Uuid,
    ) -> Result<Vec<Self>, sqlx::Error> {
        sqlx::query_as::<_, Message>(
            "SELECT * FROM messages WHERE client_id = $1 ORDER BY rowid ASC",
        )
        .bind(client_id)
        .fetch_all(pool)
        .await
    }

    /// Flip every unread message written by `sender` in one statement and
    /// return exactly the rows this call flipped.
    pub async fn mark_read_from(
        pool: &SqlitePool,
        client_id: Uuid,
        sender: MessageSender,
    ) -> Result<Vec<Self>, sqlx::Error> {
        let now = Utc::now();
        sqlx::query_as::<_, Message>(
            r#"UPDATE messages
               SET read = 1, read_at = $3, updated_at = $3
               WHERE client_id = $1 AND sender = $2 AND read = 0
               RETURNING *"#,
        )
        .bind(client_id)
        .bind(sender)
        .bind(now)
        .fetch_all(pool)
        .await
    }

    pub async fn count_unread_from_clients(
        pool: &SqlitePool,
        coach_id: Uuid,
    ) -> Result<i64, sqlx::Error> {
        sqlx::query_scalar::<_, i64>(
            "SELECT COUNT(*) FROM messages WHERE coach_id = $1 AND sender = 'client' AND read = 0",
        )
        .bind(coach_id)
        .fetch_one(pool)
        .await
    }

    pub async fn delete_by_client_id<'e, E>(executor: E, client_id: Uuid) -> Result<u64, sqlx::Error>
    where
        E: Executor<'e, Database = Sqlite>,
    {
        let result = sqlx::query("DELETE FROM messages WHERE client_id = $1")
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

    #[tokio::test]
    async fn mark_read_flips_each_row_once() {
        let db = DBService::new_in_memory().await.unwrap();
        let coach = Coach::create(
            &db.pool,
            Uuid::new_v4(),
            &CreateCoach {
                email: "c@example.com".to_string(),
                password_hash: "x".to_string(),
                full_name: "C".to_string(),
            },
        )
        .await
        .unwrap();
        let client = Client::create(
            &db.pool,
            coach.id,
            &CreateClient {
                name: "Sam".to_string(),
                email: "sam@example.com".to_string(),
                phone: None,
                status: None,
                goals: None,
                notes: None,
            },
            Uuid::new_v4(),
        )
        .await
        .unwrap();

        for body in ["hi", "are you there?"] {
            Message::create(&db.pool, client.id, coach.id, MessageSender::Client, body)
                .await
                .unwrap();
        }
        Message::create(&db.pool, client.id, coach.id, MessageSender::Coach, "yes")
            .await
            .unwrap();

        let (a, b) = tokio::join!(
            Message::mark_read_from(&db.pool, client.id, MessageSender::Client),
            Message::mark_read_from(&db.pool, client.id, MessageSender::Client),
        );
        assert_eq!(a.unwrap().len() + b.unwrap().len(), 2);

        let thread = Message::find_by_client_id(&db.pool, client.id).await.unwrap();
        assert_eq!(thread.len(), 3);
        assert_eq!(thread[0].content, "hi");
        assert!(!thread[2].read, "coach's own message stays unread");
    }
}
