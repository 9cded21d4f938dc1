use db::models::{
    client::Client,
    coach::Coach,
    coach_profile::{CoachProfile, UpsertCoachProfile},
};
use serde::{Deserialize, Serialize};
use sqlx::SqlitePool;
use thiserror::Error;
use ts_rs::TS;
use uuid::Uuid;
use validator::Validate;

#[derive(Debug, Error)]
pub enum ProfileError {
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
    #[error("validation error: {0}")]
    Validation(#[from] validator::ValidationErrors),
    #[error("coach not found")]
    CoachNotFound,
}

/// Outcome of looking up a row that may be substituted when absent.
#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[serde(tag = "kind", content = "value", rename_all = "snake_case")]
pub enum Lookup<T> {
    Found(T),
    /// The row is missing and a value derived from related data stands in.
    Fallback(T),
    None,
}

impl<T> Lookup<T> {
    pub fn into_option(self) -> Option<T> {
        match self {
            Lookup::Found(value) | Lookup::Fallback(value) => Some(value),
            Lookup::None => None,
        }
    }

    pub fn is_found(&self) -> bool {
        matches!(self, Lookup::Found(_))
    }
}

pub struct ProfileService;

impl ProfileService {
    pub async fn get_own(pool: &SqlitePool, coach_id: Uuid) -> Result<Lookup<CoachProfile>, ProfileError> {
        Self::lookup_for_coach(pool, coach_id).await
    }

    pub async fn upsert_own(
        pool: &SqlitePool,
        coach_id: Uuid,
        data: &UpsertCoachProfile,
    ) -> Result<CoachProfile, ProfileError> {
        data.validate()?;
        Coach::find_by_id(pool, coach_id)
            .await?
            .ok_or(ProfileError::CoachNotFound)?;
        let data = UpsertCoachProfile {
            display_name: data.display_name.trim().to_string(),
            ..data.clone()
        };
        Ok(CoachProfile::upsert(pool, coach_id, &data).await?)
    }

    /// The profile a client's portal shows: the client's own coach, never
    /// some other coach.
    pub async fn lookup_for_client(
        pool: &SqlitePool,
        client_id: Uuid,
    ) -> Result<Lookup<CoachProfile>, ProfileError> {
        match Client::find_by_id(pool, client_id).await? {
            Some(client) => Self::lookup_for_coach(pool, client.coach_id).await,
            None => Ok(Lookup::None),
        }
    }

    async fn lookup_for_coach(pool: &SqlitePool, coach_id: Uuid) -> Result<Lookup<CoachProfile>, ProfileError> {
        if let Some(profile) = CoachProfile::find_by_coach_id(pool, coach_id).await? {
            return Ok(Lookup::Found(profile));
        }
        Ok(match Coach::find_by_id(pool, coach_id).await? {
            Some(coach) => Lookup::Fallback(CoachProfile::from_account(&coach)),
            None => Lookup::None,
        })
    }
}

#[cfg(test)]
mod tests {
    use db::DBService;

    use super::*;
    use crate::services::testing::{seed_client, seed_coach};

    fn profile(name: &str) -> UpsertCoachProfile {
        UpsertCoachProfile {
            display_name: name.to_string(),
            bio: Some("Strength coach".to_string()),
            specialties: None,
            avatar_url: None,
            phone: None,
            website: Some("https://coach.example.com".to_string()),
        }
    }

    #[tokio::test]
    async fn client_sees_own_coach_or_fallback_never_another_coach() {
        let db = DBService::new_in_memory().await.unwrap();
        let coach = seed_coach(&db.pool, "a@example.com").await;
        let other = seed_coach(&db.pool, "b@example.com").await;
        ProfileService::upsert_own(&db.pool, other.id, &profile("Other Coach"))
            .await
            .unwrap();
        let client = seed_client(&db.pool, coach.id, "Sam").await;

        let lookup = ProfileService::lookup_for_client(&db.pool, client.id).await.unwrap();
        match lookup {
            Lookup::Fallback(p) => {
                assert_eq!(p.coach_id, coach.id);
                assert_eq!(p.display_name, "Casey Coach");
            }
            other => panic!("expected fallback, got {other:?}"),
        }

        ProfileService::upsert_own(&db.pool, coach.id, &profile(" Coach Casey "))
            .await
            .unwrap();
        let lookup = ProfileService::lookup_for_client(&db.pool, client.id).await.unwrap();
        assert!(lookup.is_found());
        assert_eq!(lookup.into_option().unwrap().display_name, "Coach Casey");

        assert!(matches!(
            ProfileService::lookup_for_client(&db.pool, Uuid::new_v4()).await.unwrap(),
            Lookup::None
        ));
    }

    #[tokio::test]
    async fn upsert_validates_urls() {
        let db = DBService::new_in_memory().await.unwrap();
        let coach = seed_coach(&db.pool, "a@example.com").await;
        let mut data = profile("Casey");
        data.website = Some("not a url".to_string());

        let err = ProfileService::upsert_own(&db.pool, coach.id, &data).await.unwrap_err();
        assert!(matches!(err, ProfileError::Validation(_)));
    }
}
