use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{FromRow, SqlitePool};
use ts_rs::TS;
use uuid::Uuid;

/// Local mirror of a payment-provider subscription, kept current by webhooks.
#[derive(Debug, Clone, FromRow, Serialize, Deserialize, TS)]
pub struct Subscription {
    pub id: Uuid,
    pub coach_id: Option<Uuid>,
    pub provider_customer_id: String,
    pub provider_subscription_id: String,
    pub status: String,
    pub price_id: Option<String>,
    pub current_period_end: Option<DateTime<Utc>>,
    pub cancel_at_period_end: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct UpsertSubscription {
    pub coach_id: Option<Uuid>,
    pub provider_customer_id: String,
    pub provider_subscription_id: String,
    pub status: String,
    pub price_id: Option<String>,
    pub current_period_end: Option<DateTime<Utc>>,
    pub cancel_at_period_end: bool,
}

impl Subscription {
    pub async fn upsert(pool: &SqlitePool, data: &UpsertSubscription) -> Result<Self, sqlx::Error> {
        let now = Utc::now();
        sqlx::query_as::<_, Subscription>(
            r#"INSERT INTO subscriptions
                   (id, coach_id, provider_customer_id, provider_subscription_id, status, price_id,
                    current_period_end, cancel_at_period_end, created_at, updated_at)
               VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $9)
               ON CONFLICT(provider_subscription_id) DO UPDATE SET
                   coach_id = COALESCE(excluded.coach_id, subscriptions.coach_id),
                   provider_customer_id = excluded.provider_customer_id,
                   status = excluded.status,
                   price_id = excluded.price_id,
                   current_period_end = excluded.current_period_end,
                   cancel_at_period_end = excluded.cancel_at_period_end,
                   updated_at = excluded.updated_at
               RETURNING *"#,
        )
        .bind(Uuid::new_v4())
        .bind(data.coach_id)
        .bind(&data.provider_customer_id)
        .bind(&data.provider_subscription_id)
        .bind(&data.status)
        .bind(&data.price_id)
        .bind(data.current_period_end)
        .bind(data.cancel_at_period_end)
        .bind(now)
        .fetch_one(pool)
        .await
    }

    pub async fn find_latest_by_coach_id(
        pool: &SqlitePool,
        coach_id: Uuid,
    ) -> Result<Option<Self>, sqlx::Error> {
        sqlx::query_as::<_, Subscription>(
            r#"SELECT * FROM subscriptions
               WHERE coach_id = $1
               ORDER BY updated_at DESC
               LIMIT 1"#,
        )
        .bind(coach_id)
        .fetch_optional(pool)
        .await
    }
}

pub struct BillingEvent;

impl BillingEvent {
    /// Record a provider event id. Returns false when it was already recorded,
    /// i.e. the webhook is a redelivery.
    pub async fn record(pool: &SqlitePool, id: &str, event_type: &str) -> Result<bool, sqlx::Error> {
        let result = sqlx::query(
            "INSERT OR IGNORE INTO billing_events (id, event_type, received_at) VALUES ($1, $2, $3)",
        )
        .bind(id)
        .bind(event_type)
        .bind(Utc::now())
        .execute(pool)
        .await?;
        Ok(result.rows_affected() == 1)
    }

    /// Drop a recorded event so a redelivery gets processed again.
    pub async fn forget(pool: &SqlitePool, id: &str) -> Result<u64, sqlx::Error> {
        let result = sqlx::query("DELETE FROM billing_events WHERE id = $1")
            .bind(id)
            .execute(pool)
            .await?;
        Ok(result.rows_affected())
    }
}
