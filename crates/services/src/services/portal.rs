//! Access-code gated client portals.
//!
//! A portal is a capability URL: whoever holds the code sees the client's plan.
//! Codes are compared exactly and in constant time, and guessing is throttled
//! per client.

use std::{
    num::NonZeroU32,
    sync::{
        Arc,
        atomic::{AtomicU64, Ordering},
    },
};

use chrono::{Duration, Utc};
use db::models::{
    client::Client,
    client_portal::ClientPortal,
    coach_profile::CoachProfile,
    notification::NotificationKind,
    progress_metric::ProgressMetric,
    workout::{Workout, WorkoutWithExercises},
};
use governor::{DefaultKeyedRateLimiter, Quota, RateLimiter};
use rand::Rng;
use serde::{Deserialize, Serialize};
use sqlx::SqlitePool;
use subtle::ConstantTimeEq;
use thiserror::Error;
use tracing::{info, warn};
use ts_rs::TS;
use uuid::Uuid;

use super::{
    notification::NotificationService,
    profile::{Lookup, ProfileError, ProfileService},
};

/// No 0/O or 1/I so codes survive being read aloud or retyped.
const ACCESS_CODE_ALPHABET: &[u8] = b"ABCDEFGHJKLMNPQRSTUVWXYZ23456789";
pub const ACCESS_CODE_LEN: usize = 8;
const DEFAULT_ATTEMPTS_PER_MINUTE: NonZeroU32 = NonZeroU32::new(10).unwrap();
/// Idle limiter entries are dropped once per this many access checks.
const PRUNE_LIMITER_EVERY: u64 = 256;
/// Minimum quiet period before another portal visit notifies the coach.
const VISIT_NOTIFY_AFTER_HOURS: i64 = 1;

#[derive(Debug, Error)]
pub enum PortalError {
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
    #[error(transparent)]
    Profile(#[from] ProfileError),
    #[error("client not found")]
    ClientNotFound,
    #[error("portal not found")]
    NotFound,
    #[error("invalid access code")]
    InvalidAccessCode,
    #[error("too many access attempts, try again later")]
    RateLimited,
}

/// Everything the client sees in their portal.
#[derive(Debug, Clone, Serialize, Deserialize, TS)]
pub struct PortalView {
    pub client: Client,
    pub coach: Lookup<CoachProfile>,
    pub workouts: Vec<WorkoutWithExercises>,
    pub metrics: Vec<ProgressMetric>,
}

pub fn generate_access_code() -> String {
    let mut rng = rand::thread_rng();
    (0..ACCESS_CODE_LEN)
        .map(|_| ACCESS_CODE_ALPHABET[rng.gen_range(0..ACCESS_CODE_ALPHABET.len())] as char)
        .collect()
}

/// Byte-for-byte comparison that takes the same time for any input of a given
/// length pair. No trimming or case folding. An empty expected code never
/// matches.
pub fn access_codes_match(expected: &str, provided: &str) -> bool {
    if expected.is_empty() {
        return false;
    }
    let expected = expected.as_bytes();
    let provided = provided.as_bytes();
    let max_len = expected.len().max(provided.len());
    let mut padded_expected = vec![0u8; max_len];
    let mut padded_provided = vec![0u8; max_len];
    padded_expected[..expected.len()].copy_from_slice(expected);
    padded_provided[..provided.len()].copy_from_slice(provided);

    let bytes_match: bool = padded_expected.ct_eq(&padded_provided).into();
    bytes_match && expected.len() == provided.len()
}

#[derive(Clone)]
pub struct PortalService {
    public_app_url: String,
    limiter: Arc<DefaultKeyedRateLimiter<Uuid>>,
    checks: Arc<AtomicU64>,
    notifications: NotificationService,
}

impl PortalService {
    pub fn new(public_app_url: &str, attempts_per_minute: u32, notifications: NotificationService) -> Self {
        let per_minute = NonZeroU32::new(attempts_per_minute).unwrap_or(DEFAULT_ATTEMPTS_PER_MINUTE);
        Self {
            public_app_url: public_app_url.trim_end_matches('/').to_string(),
            limiter: Arc::new(RateLimiter::keyed(Quota::per_minute(per_minute))),
            checks: Arc::new(AtomicU64::new(0)),
            notifications,
        }
    }

    /// Forget clients whose attempt budget has fully refilled. Unknown client
    /// ids would otherwise accumulate without bound.
    pub fn prune_idle_limits(&self) {
        self.limiter.retain_recent();
        self.limiter.shrink_to_fit();
    }

    pub fn portal_url(&self, client_id: Uuid, access_code: &str) -> String {
        format!(
            "{}/client-portal/{}?code={}",
            self.public_app_url, client_id, access_code
        )
    }

    pub async fn get(pool: &SqlitePool, coach_id: Uuid, client_id: Uuid) -> Result<ClientPortal, PortalError> {
        owned_client(pool, coach_id, client_id).await?;
        ClientPortal::find_by_client_id(pool, client_id)
            .await?
            .ok_or(PortalError::NotFound)
    }

    /// Return the client's portal, creating it on first use. Concurrent calls
    /// converge on a single row.
    pub async fn create_or_get(
        &self,
        pool: &SqlitePool,
        coach_id: Uuid,
        client_id: Uuid,
    ) -> Result<ClientPortal, PortalError> {
        owned_client(pool, coach_id, client_id).await?;
        if let Some(existing) = ClientPortal::find_by_client_id(pool, client_id).await? {
            return Ok(existing);
        }
        let code = generate_access_code();
        let url = self.portal_url(client_id, &code);
        let portal = ClientPortal::insert_or_get(pool, client_id, coach_id, &code, &url).await?;
        info!(coach_id = %coach_id, client_id = %client_id, "Client portal created");
        Ok(portal)
    }

    /// Replace the access code; links sent earlier stop working.
    pub async fn rotate(
        &self,
        pool: &SqlitePool,
        coach_id: Uuid,
        client_id: Uuid,
    ) -> Result<ClientPortal, PortalError> {
        owned_client(pool, coach_id, client_id).await?;
        let code = generate_access_code();
        let url = self.portal_url(client_id, &code);
        let portal = ClientPortal::update_access_code(pool, client_id, &code, &url)
            .await?
            .ok_or(PortalError::NotFound)?;
        info!(coach_id = %coach_id, client_id = %client_id, "Client portal access code rotated");
        Ok(portal)
    }

    pub async fn revoke(pool: &SqlitePool, coach_id: Uuid, client_id: Uuid) -> Result<(), PortalError> {
        owned_client(pool, coach_id, client_id).await?;
        if ClientPortal::delete_by_client_id(pool, client_id).await? == 0 {
            return Err(PortalError::NotFound);
        }
        info!(coach_id = %coach_id, client_id = %client_id, "Client portal revoked");
        Ok(())
    }

    /// Check an access code for a client's portal. A missing portal and a
    /// wrong code fail identically.
    pub async fn authenticate(
        &self,
        pool: &SqlitePool,
        client_id: Uuid,
        code: &str,
    ) -> Result<ClientPortal, PortalError> {
        let limited = self.limiter.check_key(&client_id).is_err();
        if (self.checks.fetch_add(1, Ordering::Relaxed) + 1) % PRUNE_LIMITER_EVERY == 0 {
            self.prune_idle_limits();
        }
        if limited {
            warn!(client_id = %client_id, "Portal access attempts rate limited");
            return Err(PortalError::RateLimited);
        }

        let portal = ClientPortal::find_by_client_id(pool, client_id).await?;
        let expected = portal.as_ref().map(|p| p.access_code.as_str()).unwrap_or("");
        let matches = access_codes_match(expected, code);
        let Some(portal) = portal.filter(|_| matches) else {
            warn!(client_id = %client_id, "Rejected portal access code");
            return Err(PortalError::InvalidAccessCode);
        };

        let quiet_since = Utc::now() - Duration::hours(VISIT_NOTIFY_AFTER_HOURS);
        let notify = portal.last_accessed.is_none_or(|at| at < quiet_since);
        let portal = ClientPortal::touch_last_accessed(pool, portal.id).await?;

        if notify {
            if let Some(client) = Client::find_by_id(pool, client_id).await? {
                if let Err(e) = self
                    .notifications
                    .notify(
                        pool,
                        portal.coach_id,
                        Some(client_id),
                        NotificationKind::PortalAccessed,
                        "Portal opened",
                        format!("{} opened their client portal", client.name),
                    )
                    .await
                {
                    warn!(client_id = %client_id, error = %e, "Failed to raise portal notification");
                }
            }
        }
        Ok(portal)
    }

    pub async fn view(pool: &SqlitePool, portal: &ClientPortal) -> Result<PortalView, PortalError> {
        let client = Client::find_by_id(pool, portal.client_id)
            .await?
            .ok_or(PortalError::ClientNotFound)?;
        let coach = ProfileService::lookup_for_client(pool, client.id).await?;
        let mut workouts = Vec::new();
        for workout in Workout::find_by_client_id(pool, client.id).await? {
            workouts.push(workout.with_exercises(pool).await?);
        }
        let metrics = ProgressMetric::find_by_client_id(pool, client.id, None).await?;
        Ok(PortalView {
            client,
            coach,
            workouts,
            metrics,
        })
    }
}

async fn owned_client(pool: &SqlitePool, coach_id: Uuid, client_id: Uuid) -> Result<Client, PortalError> {
    Client::find_for_coach(pool, coach_id, client_id)
        .await?
        .ok_or(PortalError::ClientNotFound)
}

#[cfg(test)]
mod tests {
    use db::{DBService, models::notification::Notification};

    use super::*;
    use crate::services::{
        events::EventService,
        testing::{seed_client, seed_coach},
    };

    fn service(attempts: u32) -> PortalService {
        PortalService::new(
            "https://coach.app/",
            attempts,
            NotificationService::new(EventService::default()),
        )
    }

    #[test]
    fn generated_codes_use_the_unambiguous_alphabet() {
        for _ in 0..50 {
            let code = generate_access_code();
            assert_eq!(code.len(), ACCESS_CODE_LEN);
            assert!(code.bytes().all(|b| ACCESS_CODE_ALPHABET.contains(&b)));
        }
    }

    #[test]
    fn codes_match_exactly() {
        assert!(access_codes_match("AB23CD45", "AB23CD45"));
        assert!(!access_codes_match("AB23CD45", "ab23cd45"));
        assert!(!access_codes_match("AB23CD45", "AB23CD45 "));
        assert!(!access_codes_match("AB23CD45", " AB23CD45"));
        assert!(!access_codes_match("AB23CD45", "AB23CD4"));
        assert!(!access_codes_match("AB23CD45", ""));
        assert!(!access_codes_match("", ""));
    }

    #[tokio::test]
    async fn create_is_idempotent_and_builds_the_url() {
        let db = DBService::new_in_memory().await.unwrap();
        let coach = seed_coach(&db.pool, "a@example.com").await;
        let client = seed_client(&db.pool, coach.id, "Sam").await;
        let portals = service(10);

        let first = portals.create_or_get(&db.pool, coach.id, client.id).await.unwrap();
        let second = portals.create_or_get(&db.pool, coach.id, client.id).await.unwrap();

        assert_eq!(first.id, second.id);
        assert_eq!(first.access_code, second.access_code);
        assert_eq!(
            first.portal_url,
            format!("https://coach.app/client-portal/{}?code={}", client.id, first.access_code)
        );
    }

    #[tokio::test]
    async fn authenticate_is_exact_and_rotation_invalidates_old_codes() {
        let db = DBService::new_in_memory().await.unwrap();
        let coach = seed_coach(&db.pool, "a@example.com").await;
        let client = seed_client(&db.pool, coach.id, "Sam").await;
        let portals = service(100);
        let portal = portals.create_or_get(&db.pool, coach.id, client.id).await.unwrap();

        for wrong in [
            portal.access_code.to_lowercase(),
            format!("{} ", portal.access_code),
            String::new(),
        ] {
            assert!(matches!(
                portals.authenticate(&db.pool, client.id, &wrong).await,
                Err(PortalError::InvalidAccessCode)
            ));
        }
        let opened = portals
            .authenticate(&db.pool, client.id, &portal.access_code)
            .await
            .unwrap();
        assert!(opened.last_accessed.is_some());

        let rotated = portals.rotate(&db.pool, coach.id, client.id).await.unwrap();
        assert_ne!(rotated.access_code, portal.access_code);
        assert!(matches!(
            portals.authenticate(&db.pool, client.id, &portal.access_code).await,
            Err(PortalError::InvalidAccessCode)
        ));
        assert!(portals.authenticate(&db.pool, client.id, &rotated.access_code).await.is_ok());
    }

    #[tokio::test]
    async fn first_visit_notifies_the_coach_once() {
        let db = DBService::new_in_memory().await.unwrap();
        let coach = seed_coach(&db.pool, "a@example.com").await;
        let client = seed_client(&db.pool, coach.id, "Sam").await;
        let portals = service(100);
        let portal = portals.create_or_get(&db.pool, coach.id, client.id).await.unwrap();

        portals.authenticate(&db.pool, client.id, &portal.access_code).await.unwrap();
        portals.authenticate(&db.pool, client.id, &portal.access_code).await.unwrap();

        let alerts = Notification::find_by_coach_id(&db.pool, coach.id, false).await.unwrap();
        assert_eq!(alerts.len(), 1);
        assert_eq!(alerts[0].kind, NotificationKind::PortalAccessed);
    }

    #[tokio::test]
    async fn unknown_client_and_wrong_code_fail_the_same_way() {
        let db = DBService::new_in_memory().await.unwrap();
        let portals = service(10);
        assert!(matches!(
            portals.authenticate(&db.pool, Uuid::new_v4(), "ABCDEFGH").await,
            Err(PortalError::InvalidAccessCode)
        ));
    }

    #[tokio::test]
    async fn guessing_is_throttled_per_client() {
        let db = DBService::new_in_memory().await.unwrap();
        let coach = seed_coach(&db.pool, "a@example.com").await;
        let client = seed_client(&db.pool, coach.id, "Sam").await;
        let other = seed_client(&db.pool, coach.id, "Alex").await;
        let portals = service(3);
        let portal = portals.create_or_get(&db.pool, coach.id, client.id).await.unwrap();

        for _ in 0..3 {
            let _ = portals.authenticate(&db.pool, client.id, "WRONG234").await;
        }
        assert!(matches!(
            portals.authenticate(&db.pool, client.id, &portal.access_code).await,
            Err(PortalError::RateLimited)
        ));
        assert!(matches!(
            portals.authenticate(&db.pool, other.id, "WRONG234").await,
            Err(PortalError::InvalidAccessCode)
        ));
    }

    #[tokio::test]
    async fn idle_limiter_entries_are_pruned() {
        let db = DBService::new_in_memory().await.unwrap();
        // One attempt per millisecond so a single check refills almost at once.
        let portals = service(60_000);

        for _ in 0..10 {
            let _ = portals.authenticate(&db.pool, Uuid::new_v4(), "ABCDEFGH").await;
        }
        assert_eq!(portals.limiter.len(), 10);

        tokio::time::sleep(std::time::Duration::from_millis(20)).await;
        let regular = Uuid::new_v4();
        for _ in 10..PRUNE_LIMITER_EVERY {
            let _ = portals.authenticate(&db.pool, regular, "ABCDEFGH").await;
        }
        assert_eq!(portals.limiter.len(), 1);

        tokio::time::sleep(std::time::Duration::from_millis(
            PRUNE_LIMITER_EVERY + 50,
        ))
        .await;
        portals.prune_idle_limits();
        assert!(portals.limiter.is_empty());
    }

    #[tokio::test]
    async fn view_shows_workouts_metrics_and_coach() {
        let db = DBService::new_in_memory().await.unwrap();
        let coach = seed_coach(&db.pool, "a@example.com").await;
        let client = seed_client(&db.pool, coach.id, "Sam").await;
        let portals = service(10);
        let portal = portals.create_or_get(&db.pool, coach.id, client.id).await.unwrap();

        let view = PortalService::view(&db.pool, &portal).await.unwrap();
        assert_eq!(view.client.id, client.id);
        assert!(view.workouts.is_empty());
        assert!(matches!(view.coach, Lookup::Fallback(ref p) if p.coach_id == coach.id));
    }
}
