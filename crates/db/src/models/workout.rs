use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{Executor, FromRow, Sqlite, SqlitePool, Type};
use strum_macros::{Display, EnumString};
use ts_rs::TS;
use uuid::Uuid;

use super::exercise::Exercise;

#[derive(
    Debug, Clone, Copy, Type, Serialize, Deserialize, PartialEq, Eq, TS, EnumString, Display, Default,
)]
#[sqlx(type_name = "workout_status", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum WorkoutStatus {
    #[default]
    Assigned,
    InProgress,
    Completed,
}

impl WorkoutStatus {
    /// Lifecycle is assigned -> in_progress -> completed; a client may also
    /// complete an assigned workout directly. Nothing moves backwards.
    pub fn can_transition_to(self, next: WorkoutStatus) -> bool {
        matches!(
            (self, next),
            (WorkoutStatus::Assigned, WorkoutStatus::InProgress)
                | (WorkoutStatus::Assigned, WorkoutStatus::Completed)
                | (WorkoutStatus::InProgress, WorkoutStatus::Completed)
        )
    }
}

#[derive(Debug, Clone, FromRow, Serialize, Deserialize, TS)]
pub struct Workout {
    pub id: Uuid,
    pub client_id: Uuid, // Foreign key to Client
    pub coach_id: Uuid,
    pub name: String,
    pub description: Option<String>,
    pub scheduled_date: Option<NaiveDate>,
    pub status: WorkoutStatus,
    pub feedback: Option<String>,
    pub completed_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize, TS)]
pub struct WorkoutWithExercises {
    #[serde(flatten)]
    #[ts(flatten)]
    pub workout: Workout,
    pub exercises: Vec<Exercise>,
}

impl std::ops::Deref for WorkoutWithExercises {
    type Target = Workout;
    fn deref(&self) -> &Self::Target {
        &self.workout
    }
}

#[derive(Debug, Clone)]
pub struct CreateWorkout {
    pub client_id: Uuid,
    pub coach_id: Uuid,
    pub name: String,
    pub description: Option<String>,
    pub scheduled_date: Option<NaiveDate>,
}

impl Workout {
    pub async fn insert<'e, E>(
        executor: E,
        id: Uuid,
        data: &CreateWorkout,
    ) -> Result<Self, sqlx::Error>
    where
        E: Executor<'e, Database = Sqlite>,
    {
        let now = Utc::now();
        sqlx::query_as::<_, Workout>(
            r#"INSERT INTO workouts (id, client_id, coach_id, name, description, scheduled_date, status, created_at, updated_at)
               VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $8)
               RETURNING *"#,
        )
        .bind(id)
        .bind(data.client_id)
        .bind(data.coach_id)
        .bind(&data.name)
        .bind(&data.description)
        .bind(data.scheduled_date)
        .bind(WorkoutStatus::Assigned)
        .bind(now)
        .fetch_one(executor)
        .await
    }

    pub async fn find_by_id(pool: &SqlitePool, id: Uuid) -> Result<Option<Self>, sqlx::Error> {
        sqlx::query_as::<_, Workout>("SELECT * FROM workouts WHERE id = $1")
            .bind(id)
            .fetch_optional(pool)
            .await
    }

    pub async fn find_for_coach(
        pool: &SqlitePool,
        coach_id: Uuid,
        id: Uuid,
    ) -> Result<Option<Self>, sqlx::Error> {
        sqlx::query_as::<_, Workout>("SELECT * FROM workouts WHERE id = $1 AND coach_id = $2")
            .bind(id)
            .bind(coach_id)
            .fetch_optional(pool)
            .await
    }

    pub async fn find_by_client_id(
        pool: &SqlitePool,
        client_id: Uuid,
    ) -> Result<Vec<Self>, sqlx::Error> {
        sqlx::query_as::<_, Workout>(
            r#"SELECT * FROM workouts
               WHERE client_id = $1
               ORDER BY scheduled_date IS NULL, scheduled_date DESC, created_at DESC"#,
        )
        .bind(client_id)
        .fetch_all(pool)
        .await
    }

    pub async fn with_exercises(self, pool: &SqlitePool) -> Result<WorkoutWithExercises, sqlx::Error> {
        let exercises = Exercise::find_by_workout_id(pool, self.id).await?;
        Ok(WorkoutWithExercises {
            workout: self,
            exercises,
        })
    }

    /// Move a workout from `from` to `to`. Returns `None` when the stored
    /// status is no longer `from`.
    pub async fn update_status(
        pool: &SqlitePool,
        id: Uuid,
        from: WorkoutStatus,
        to: WorkoutStatus,
    ) -> Result<Option<Self>, sqlx::Error> {
        // completed_at is stamped on entering Completed and left alone otherwise
        let now = Utc::now();
        sqlx::query_as::<_, Workout>(
            r#"UPDATE workouts
               SET status = $3,
                   completed_at = CASE WHEN $3 = 'completed' THEN $4 ELSE completed_at END,
                   updated_at = $4
               WHERE id = $1 AND status = $2
               RETURNING *"#,
        )
        .bind(id)
        .bind(from)
        .bind(to)
        .bind(now)
        .fetch_optional(pool)
        .await
    }

    /// Mark a workout completed with the client's feedback. Returns `None` when
    /// the workout does not belong to `client_id` or is already completed.
    pub async fn complete<'e, E>(
        executor: E,
        id: Uuid,
        client_id: Uuid,
        feedback: Option<&str>,
    ) -> Result<Option<Self>, sqlx::Error>
    where
        E: Executor<'e, Database = Sqlite>,
    {
        let now = Utc::now();
        sqlx::query_as::<_, Workout>(
            r#"UPDATE workouts
               SET status = 'completed', completed_at = $3, feedback = $4, updated_at = $3
               WHERE id = $1 AND client_id = $2 AND status != 'completed'
               RETURNING *"#,
        )
        .bind(id)
        .bind(client_id)
        .bind(now)
        .bind(feedback)
        .fetch_optional(executor)
        .await
    }

    pub async fn delete<'e, E>(executor: E, id: Uuid) -> Result<u64, sqlx::Error>
    where
        E: Executor<'e, Database = Sqlite>,
    {
        let result = sqlx::query("DELETE FROM workouts WHERE id = $1")
            .bind(id)
            .execute(executor)
            .await?;
        Ok(result.rows_affected())
    }

    pub async fn delete_by_client_id<'e, E>(executor: E, client_id: Uuid) -> Result<u64, sqlx::Error>
    where
        E: Executor<'e, Database = Sqlite>,
    {
        let result = sqlx::query("DELETE FROM workouts WHERE client_id = $1")
            .bind(client_id)
            .execute(executor)
            .await?;
        Ok(result.rows_affected())
    }

    pub async fn count_by_status(
        pool: &SqlitePool,
        coach_id: Uuid,
    ) -> Result<Vec<(WorkoutStatus, i64)>, sqlx::Error> {
        sqlx::query_as::<_, (WorkoutStatus, i64)>(
            r#"SELECT status, COUNT(*) FROM workouts
               WHERE coach_id = $1
               GROUP BY status"#,
        )
        .bind(coach_id)
        .fetch_all(pool)
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lifecycle_only_moves_forward() {
        use WorkoutStatus::*;
        assert!(Assigned.can_transition_to(InProgress));
        assert!(Assigned.can_transition_to(Completed));
        assert!(InProgress.can_transition_to(Completed));
        assert!(!Completed.can_transition_to(Assigned));
        assert!(!Completed.can_transition_to(InProgress));
        assert!(!InProgress.can_transition_to(Assigned));
        assert!(!Assigned.can_transition_to(Assigned));
    }

    #[test]
    fn status_round_trips_through_strum() {
        assert_eq!(WorkoutStatus::InProgress.to_string(), "in_progress");
        assert_eq!(
            "completed".parse::<WorkoutStatus>().unwrap(),
            WorkoutStatus::Completed
        );
    }
}
