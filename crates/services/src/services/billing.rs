//! Mirror of payment-provider subscriptions, fed by signed webhooks.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use db::models::subscription::{BillingEvent, Subscription, UpsertSubscription};
use hmac::{Hmac, Mac};
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use sha2::Sha256;
use sqlx::SqlitePool;
use strum_macros::Display;
use thiserror::Error;
use tracing::{debug, info, warn};
use ts_rs::TS;
use uuid::Uuid;

type HmacSha256 = Hmac<Sha256>;

/// Maximum age of a signed webhook, in seconds.
pub const SIGNATURE_TOLERANCE_SECS: i64 = 300;

#[derive(Debug, Error)]
pub enum BillingError {
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
    #[error("billing webhooks are not configured")]
    NotConfigured,
    #[error("invalid webhook signature")]
    InvalidSignature,
    #[error("webhook timestamp outside tolerance window")]
    StaleSignature,
    #[error("invalid webhook payload: {0}")]
    Payload(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS, Display)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum WebhookOutcome {
    Applied,
    /// Already processed; acknowledged without side effects.
    Duplicate,
    /// Event type this service does not mirror.
    Ignored,
}

#[derive(Debug, Deserialize)]
struct WebhookEvent {
    id: String,
    #[serde(rename = "type")]
    event_type: String,
    data: EventData,
}

#[derive(Debug, Deserialize)]
struct EventData {
    object: serde_json::Value,
}

#[derive(Debug, Deserialize)]
struct SubscriptionObject {
    id: String,
    customer: String,
    status: String,
    #[serde(default)]
    cancel_at_period_end: bool,
    current_period_end: Option<i64>,
    #[serde(default)]
    metadata: HashMap<String, String>,
    items: Option<SubscriptionItems>,
}

#[derive(Debug, Deserialize)]
struct SubscriptionItems {
    data: Vec<SubscriptionItem>,
}

#[derive(Debug, Deserialize)]
struct SubscriptionItem {
    price: Price,
}

#[derive(Debug, Deserialize)]
struct Price {
    id: String,
}

impl SubscriptionObject {
    fn into_upsert(self) -> UpsertSubscription {
        let coach_id = self
            .metadata
            .get("coach_id")
            .and_then(|id| Uuid::parse_str(id).ok());
        let price_id = self
            .items
            .and_then(|items| items.data.into_iter().next())
            .map(|item| item.price.id);
        UpsertSubscription {
            coach_id,
            provider_customer_id: self.customer,
            provider_subscription_id: self.id,
            status: self.status,
            price_id,
            current_period_end: self
                .current_period_end
                .and_then(|secs| DateTime::<Utc>::from_timestamp(secs, 0)),
            cancel_at_period_end: self.cancel_at_period_end,
        }
    }
}

fn signed_mac(secret: &str, timestamp: i64, payload: &[u8]) -> Result<HmacSha256, BillingError> {
    let mut mac = HmacSha256::new_from_slice(secret.as_bytes())
        .map_err(|_| BillingError::InvalidSignature)?;
    mac.update(timestamp.to_string().as_bytes());
    mac.update(b".");
    mac.update(payload);
    Ok(mac)
}

/// `v1` signature over `"{timestamp}.{payload}"`, hex encoded.
pub fn compute_signature(secret: &str, timestamp: i64, payload: &[u8]) -> Result<String, BillingError> {
    let mac = signed_mac(secret, timestamp, payload)?;
    Ok(hex::encode(mac.finalize().into_bytes()))
}

/// Verify a `t=<unix>,v1=<hex>` header. Any one matching `v1` is accepted so
/// the secret can be rolled.
pub fn verify_signature(secret: &str, header: &str, payload: &[u8], now: i64) -> Result<(), BillingError> {
    let mut timestamp = None;
    let mut signatures = Vec::new();
    for part in header.split(',') {
        match part.trim().split_once('=') {
            Some(("t", value)) => timestamp = value.parse::<i64>().ok(),
            Some(("v1", value)) => signatures.push(value),
            _ => {}
        }
    }
    let timestamp = timestamp.ok_or(BillingError::InvalidSignature)?;
    if signatures.is_empty() {
        return Err(BillingError::InvalidSignature);
    }
    if (now - timestamp).abs() > SIGNATURE_TOLERANCE_SECS {
        return Err(BillingError::StaleSignature);
    }

    let mac = signed_mac(secret, timestamp, payload)?;
    let valid = signatures.iter().any(|signature| {
        hex::decode(signature)
            .map(|bytes| mac.clone().verify_slice(&bytes).is_ok())
            .unwrap_or(false)
    });
    if valid {
        Ok(())
    } else {
        Err(BillingError::InvalidSignature)
    }
}

#[derive(Clone)]
pub struct BillingService {
    webhook_secret: Option<SecretString>,
}

impl BillingService {
    pub fn new(webhook_secret: Option<SecretString>) -> Self {
        Self { webhook_secret }
    }

    pub async fn handle_webhook(
        &self,
        pool: &SqlitePool,
        signature_header: Option<&str>,
        payload: &[u8],
    ) -> Result<WebhookOutcome, BillingError> {
        let secret = self.webhook_secret.as_ref().ok_or(BillingError::NotConfigured)?;
        let header = signature_header.ok_or(BillingError::InvalidSignature)?;
        verify_signature(secret.expose_secret(), header, payload, Utc::now().timestamp())?;

        let event: WebhookEvent =
            serde_json::from_slice(payload).map_err(|e| BillingError::Payload(e.to_string()))?;
        if !event.event_type.starts_with("customer.subscription.") {
            debug!(event_type = %event.event_type, "Ignoring billing event");
            return Ok(WebhookOutcome::Ignored);
        }
        if !BillingEvent::record(pool, &event.id, &event.event_type).await? {
            info!(event_id = %event.id, "Duplicate billing event acknowledged");
            return Ok(WebhookOutcome::Duplicate);
        }

        match self.apply(pool, &event).await {
            Ok(subscription) => {
                info!(
                    event_id = %event.id,
                    event_type = %event.event_type,
                    subscription = %subscription.provider_subscription_id,
                    status = %subscription.status,
                    "Subscription mirror updated"
                );
                Ok(WebhookOutcome::Applied)
            }
            Err(e) => {
                // let the provider's retry reach us again
                if let Err(forget) = BillingEvent::forget(pool, &event.id).await {
                    warn!(event_id = %event.id, error = %forget, "Failed to release billing event");
                }
                Err(e)
            }
        }
    }

    async fn apply(&self, pool: &SqlitePool, event: &WebhookEvent) -> Result<Subscription, BillingError> {
        let object: SubscriptionObject = serde_json::from_value(event.data.object.clone())
            .map_err(|e| BillingError::Payload(e.to_string()))?;
        let mut upsert = object.into_upsert();
        if event.event_type == "customer.subscription.deleted" {
            upsert.status = "canceled".to_string();
        }
        Ok(Subscription::upsert(pool, &upsert).await?)
    }

    pub async fn subscription_for(pool: &SqlitePool, coach_id: Uuid) -> Result<Option<Subscription>, BillingError> {
        Ok(Subscription::find_latest_by_coach_id(pool, coach_id).await?)
    }
}

#[cfg(test)]
mod tests {
    use db::DBService;
    use serde_json::json;

    use super::*;
    use crate::services::testing::seed_coach;

    const SECRET: &str = "whsec_test";

    fn event(id: &str, event_type: &str, coach_id: Uuid, status: &str) -> Vec<u8> {
        serde_json::to_vec(&json!({
            "id": id,
            "type": event_type,
            "data": { "object": {
                "id": "sub_123",
                "customer": "cus_9",
                "status": status,
                "cancel_at_period_end": false,
                "current_period_end": 1_900_000_000,
                "metadata": { "coach_id": coach_id.to_string() },
                "items": { "data": [ { "price": { "id": "price_pro" } } ] }
            }}
        }))
        .unwrap()
    }

    fn header(payload: &[u8]) -> String {
        let now = Utc::now().timestamp();
        format!("t={},v1={}", now, compute_signature(SECRET, now, payload).unwrap())
    }

    #[test]
    fn signature_checks() {
        let payload = br#"{"id":"evt_1"}"#;
        let now = 1_700_000_000;
        let good = format!("t={},v1={}", now, compute_signature(SECRET, now, payload).unwrap());

        assert!(verify_signature(SECRET, &good, payload, now + 10).is_ok());
        assert!(matches!(
            verify_signature(SECRET, &good, payload, now + SIGNATURE_TOLERANCE_SECS + 1),
            Err(BillingError::StaleSignature)
        ));
        assert!(matches!(
            verify_signature("other", &good, payload, now),
            Err(BillingError::InvalidSignature)
        ));
        assert!(matches!(
            verify_signature(SECRET, &good, br#"{"id":"evt_2"}"#, now),
            Err(BillingError::InvalidSignature)
        ));
        assert!(verify_signature(SECRET, "garbage", payload, now).is_err());
    }

    #[tokio::test]
    async fn subscription_events_update_the_mirror_once() {
        let db = DBService::new_in_memory().await.unwrap();
        let coach = seed_coach(&db.pool, "a@example.com").await;
        let billing = BillingService::new(Some(SecretString::from(SECRET.to_string())));

        let created = event("evt_1", "customer.subscription.created", coach.id, "active");
        let outcome = billing
            .handle_webhook(&db.pool, Some(&header(&created)), &created)
            .await
            .unwrap();
        assert_eq!(outcome, WebhookOutcome::Applied);

        let again = billing
            .handle_webhook(&db.pool, Some(&header(&created)), &created)
            .await
            .unwrap();
        assert_eq!(again, WebhookOutcome::Duplicate);

        let deleted = event("evt_2", "customer.subscription.deleted", coach.id, "active");
        billing
            .handle_webhook(&db.pool, Some(&header(&deleted)), &deleted)
            .await
            .unwrap();

        let mirror = BillingService::subscription_for(&db.pool, coach.id)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(mirror.status, "canceled");
        assert_eq!(mirror.price_id.as_deref(), Some("price_pro"));
        assert!(mirror.current_period_end.is_some());
    }

    #[tokio::test]
    async fn unsigned_or_unconfigured_webhooks_are_refused() {
        let db = DBService::new_in_memory().await.unwrap();
        let payload = event("evt_1", "customer.subscription.created", Uuid::new_v4(), "active");

        let unconfigured = BillingService::new(None);
        assert!(matches!(
            unconfigured.handle_webhook(&db.pool, Some(&header(&payload)), &payload).await,
            Err(BillingError::NotConfigured)
        ));

        let billing = BillingService::new(Some(SecretString::from(SECRET.to_string())));
        assert!(matches!(
            billing.handle_webhook(&db.pool, None, &payload).await,
            Err(BillingError::InvalidSignature)
        ));
    }

    #[tokio::test]
    async fn other_event_types_are_ignored() {
        let db = DBService::new_in_memory().await.unwrap();
        let billing = BillingService::new(Some(SecretString::from(SECRET.to_string())));
        let payload = serde_json::to_vec(&json!({
            "id": "evt_9",
            "type": "invoice.paid",
            "data": { "object": {} }
        }))
        .unwrap();

        let outcome = billing
            .handle_webhook(&db.pool, Some(&header(&payload)), &payload)
            .await
            .unwrap();
        assert_eq!(outcome, WebhookOutcome::Ignored);
    }
}
