use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{Executor, FromRow, Sqlite};
use ts_rs::TS;
use uuid::Uuid;
use validator::Validate;

#[derive(Debug, Clone, FromRow, Serialize, Deserialize, TS)]
pub struct Exercise {
    pub id: Uuid,
    pub workout_id: Uuid, // Foreign key to Workout
    pub name: String,
    pub sets: i32,
    pub reps: i32,
    pub rest_seconds: i32,
    pub notes: Option<String>,
    pub order_index: i32,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS, Validate)]
pub struct CreateExercise {
    #[validate(length(min = 1, max = 200, message = "Exercise name is required"))]
    pub name: String,
    #[validate(range(min = 1, max = 100, message = "Sets must be between 1 and 100"))]
    pub sets: i32,
    #[validate(range(min = 1, max = 1000, message = "Reps must be between 1 and 1000"))]
    pub reps: i32,
    #[serde(default = "default_rest_seconds")]
    #[validate(range(min = 0, max = 3600, message = "Rest must be between 0 and 3600 seconds"))]
    pub rest_seconds: i32,
    #[validate(length(max = 1000))]
    pub notes: Option<String>,
}

fn default_rest_seconds() -> i32 {
    60
}

impl Exercise {
    pub async fn insert<'e, E>(
        executor: E,
        workout_id: Uuid,
        order_index: i32,
        data: &CreateExercise,
    ) -> Result<Self, sqlx::Error>
    where
        E: Executor<'e, Database = Sqlite>,
    {
        sqlx::query_as::<_, Exercise>(
            r#"INSERT INTO exercises (id, workout_id, name, sets, reps, rest_seconds, notes, order_index, created_at)
               VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
               RETURNING *"#,
        )
        .bind(Uuid::new_v4())
        .bind(workout_id)
        .bind(data.name.trim())
        .bind(data.sets)
        .bind(data.reps)
        .bind(data.rest_seconds)
        .bind(&data.notes)
        .bind(order_index)
        .bind(Utc::now())
        .fetch_one(executor)
        .await
    }

    pub async fn find_by_workout_id<'e, E>(
        executor: E,
        workout_id: Uuid,
    ) -> Result<Vec<Self>, sqlx::Error>
    where
        E: Executor<'e, Database = Sqlite>,
    {
        sqlx::query_as::<_, Exercise>(
            "SELECT * FROM exercises WHERE workout_id = $1 ORDER BY order_index ASC",
        )
        .bind(workout_id)
        .fetch_all(executor)
        .await
    }

    /// Move every index of a workout out of the non-negative range so that a
    /// subsequent rewrite can't collide with UNIQUE(workout_id, order_index).
    pub async fn park_order_indices<'e, E>(executor: E, workout_id: Uuid) -> Result<u64, sqlx::Error>
    where
        E: Executor<'e, Database = Sqlite>,
    {
        let result = sqlx::query(
            "UPDATE exercises SET order_index = -1 - order_index WHERE workout_id = $1",
        )
        .bind(workout_id)
        .execute(executor)
        .await?;
        Ok(result.rows_affected())
    }

    pub async fn set_order_index<'e, E>(
        executor: E,
        id: Uuid,
        order_index: i32,
    ) -> Result<u64, sqlx::Error>
    where
        E: Executor<'e, Database = Sqlite>,
    {
        let result = sqlx::query("UPDATE exercises SET order_index = $2 WHERE id = $1")
            .bind(id)
            .bind(order_index)
            .execute(executor)
            .await?;
        Ok(result.rows_affected())
    }

    pub async fn delete_by_workout_id<'e, E>(executor: E, workout_id: Uuid) -> Result<u64, sqlx::Error>
    where
        E: Executor<'e, Database = Sqlite>,
    {
        let result = sqlx::query("DELETE FROM exercises WHERE workout_id = $1")
            .bind(workout_id)
            .execute(executor)
            .await?;
        Ok(result.rows_affected())
    }

    /// Delete the exercises of every workout assigned to a client.
    pub async fn delete_by_client_id<'e, E>(executor: E, client_id: Uuid) -> Result<u64, sqlx::Error>
    where
        E: Executor<'e, Database = Sqlite>,
    {
        let result = sqlx::query(
            "DELETE FROM exercises WHERE workout_id IN (SELECT id FROM workouts WHERE client_id = $1)",
        )
        .bind(client_id)
        .execute(executor)
        .await?;
        Ok(result.rows_affected())
    }
}
