use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{FromRow, SqlitePool};
use ts_rs::TS;
use uuid::Uuid;
use validator::Validate;

use super::coach::Coach;

#[derive(Debug, Clone, FromRow, Serialize, Deserialize, TS)]
pub struct CoachProfile {
    pub coach_id: Uuid,
    pub display_name: String,
    pub bio: Option<String>,
    pub specialties: Option<String>,
    pub avatar_url: Option<String>,
    pub phone: Option<String>,
    pub website: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize, TS, Validate)]
pub struct UpsertCoachProfile {
    #[validate(length(min = 1, max = 120, message = "Display name is required"))]
    pub display_name: String,
    #[validate(length(max = 2000))]
    pub bio: Option<String>,
    #[validate(length(max = 500))]
    pub specialties: Option<String>,
    #[validate(url(message = "Invalid avatar URL"))]
    pub avatar_url: Option<String>,
    #[validate(length(max = 40))]
    pub phone: Option<String>,
    #[validate(url(message = "Invalid website URL"))]
    pub website: Option<String>,
}

impl CoachProfile {
    /// A profile derived from the account itself, for coaches that never
    /// filled in their profile.
    pub fn from_account(coach: &Coach) -> Self {
        Self {
            coach_id: coach.id,
            display_name: coach.full_name.clone(),
            bio: None,
            specialties: None,
            avatar_url: None,
            phone: None,
            website: None,
            created_at: coach.created_at,
            updated_at: coach.updated_at,
        }
    }

    pub async fn find_by_coach_id(
        pool: &SqlitePool,
        coach_id: Uuid,
    ) -> Result<Option<Self>, sqlx::Error> {
        sqlx::query_as::<_, CoachProfile>("SELECT * FROM coach_profiles WHERE coach_id = $1")
            .bind(coach_id)
            .fetch_optional(pool)
            .await
    }

    pub async fn upsert(
        pool: &SqlitePool,
        coach_id: Uuid,
        data: &UpsertCoachProfile,
    ) -> Result<Self, sqlx::Error> {
        let now = Utc::now();
        sqlx::query_as::<_, CoachProfile>(
            r#"INSERT INTO coach_profiles
                   (coach_id, display_name, bio, specialties, avatar_url, phone, website, created_at, updated_at)
               VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $8)
               ON CONFLICT(coach_id) DO UPDATE SET
                   display_name = excluded.display_name,
                   bio = excluded.bio,
                   specialties = excluded.specialties,
                   avatar_url = excluded.avatar_url,
                   phone = excluded.phone,
                   website = excluded.website,
                   updated_at = excluded.updated_at
               RETURNING *"#,
        )
        .bind(coach_id)
        .bind(&data.display_name)
        .bind(&data.bio)
        .bind(&data.specialties)
        .bind(&data.avatar_url)
        .bind(&data.phone)
        .bind(&data.website)
        .bind(now)
        .fetch_one(pool)
        .await
    }
}
