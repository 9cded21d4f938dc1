//! Building workouts from an ordered exercise draft and managing them after.

use std::collections::HashSet;

use chrono::NaiveDate;
use db::models::{
    client::Client,
    exercise::{CreateExercise, Exercise},
    workout::{CreateWorkout, Workout, WorkoutStatus, WorkoutWithExercises},
};
use serde::{Deserialize, Serialize};
use sqlx::SqlitePool;
use thiserror::Error;
use tracing::info;
use ts_rs::TS;
use uuid::Uuid;
use validator::Validate;

#[derive(Debug, Error)]
pub enum WorkoutError {
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
    #[error("validation error: {0}")]
    Validation(#[from] validator::ValidationErrors),
    #[error("{0}")]
    InvalidDraft(String),
    #[error("a workout needs at least one exercise")]
    NoExercises,
    #[error("client not found")]
    ClientNotFound,
    #[error("workout not found")]
    NotFound,
    #[error("cannot move a workout from {from} to {to}")]
    InvalidTransition { from: WorkoutStatus, to: WorkoutStatus },
    #[error("exercise order must list every exercise of the workout exactly once")]
    NotAPermutation,
}

pub type ExerciseDraft = CreateExercise;

/// A workout being composed in the builder. Nothing is written until
/// [`WorkoutService::submit`].
#[derive(Debug, Clone, Serialize, Deserialize, TS, Validate)]
pub struct WorkoutDraft {
    pub client_id: Uuid,
    #[validate(length(min = 1, max = 200, message = "Workout name is required"))]
    pub name: String,
    #[validate(length(max = 2000))]
    pub description: Option<String>,
    pub scheduled_date: Option<NaiveDate>,
    #[serde(default)]
    #[validate(nested)]
    pub exercises: Vec<ExerciseDraft>,
}

impl WorkoutDraft {
    pub fn new(client_id: Uuid, name: impl Into<String>) -> Self {
        Self {
            client_id,
            name: name.into(),
            description: None,
            scheduled_date: None,
            exercises: Vec::new(),
        }
    }

    pub fn push(&mut self, exercise: ExerciseDraft) {
        self.exercises.push(exercise);
    }

    pub fn remove(&mut self, index: usize) -> Option<ExerciseDraft> {
        (index < self.exercises.len()).then(|| self.exercises.remove(index))
    }

    pub fn swap(&mut self, a: usize, b: usize) -> bool {
        let len = self.exercises.len();
        if a >= len || b >= len {
            return false;
        }
        self.exercises.swap(a, b);
        true
    }

    /// Move one exercise to `to`, shifting the ones in between.
    pub fn move_to(&mut self, from: usize, to: usize) -> bool {
        let len = self.exercises.len();
        if from >= len || to >= len {
            return false;
        }
        let exercise = self.exercises.remove(from);
        self.exercises.insert(to, exercise);
        true
    }

    pub fn check(&self) -> Result<(), WorkoutError> {
        if self.name.trim().is_empty() {
            return Err(WorkoutError::InvalidDraft("Workout name is required".to_string()));
        }
        if self.exercises.is_empty() {
            return Err(WorkoutError::NoExercises);
        }
        if let Some(position) = self.exercises.iter().position(|e| e.name.trim().is_empty()) {
            return Err(WorkoutError::InvalidDraft(format!(
                "Exercise {} needs a name",
                position + 1
            )));
        }
        self.validate()?;
        Ok(())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, TS)]
pub struct UpdateWorkoutStatus {
    pub status: WorkoutStatus,
}

#[derive(Debug, Clone, Serialize, Deserialize, TS)]
pub struct ReorderExercises {
    pub exercise_ids: Vec<Uuid>,
}

pub struct WorkoutService;

impl WorkoutService {
    /// Validate the draft and write the workout with its exercises atomically,
    /// numbering them 0..n in draft order.
    pub async fn submit(
        pool: &SqlitePool,
        coach_id: Uuid,
        draft: &WorkoutDraft,
    ) -> Result<WorkoutWithExercises, WorkoutError> {
        draft.check()?;
        Client::find_for_coach(pool, coach_id, draft.client_id)
            .await?
            .ok_or(WorkoutError::ClientNotFound)?;

        let mut tx = pool.begin().await?;
        let workout = Workout::insert(
            &mut *tx,
            Uuid::new_v4(),
            &CreateWorkout {
                client_id: draft.client_id,
                coach_id,
                name: draft.name.trim().to_string(),
                description: draft.description.clone(),
                scheduled_date: draft.scheduled_date,
            },
        )
        .await?;
        let mut exercises = Vec::with_capacity(draft.exercises.len());
        for (index, exercise) in draft.exercises.iter().enumerate() {
            exercises.push(Exercise::insert(&mut *tx, workout.id, index as i32, exercise).await?);
        }
        tx.commit().await?;

        info!(
            coach_id = %coach_id,
            client_id = %workout.client_id,
            workout_id = %workout.id,
            exercises = exercises.len(),
            "Workout assigned"
        );
        Ok(WorkoutWithExercises { workout, exercises })
    }

    pub async fn list_for_client(
        pool: &SqlitePool,
        coach_id: Uuid,
        client_id: Uuid,
    ) -> Result<Vec<WorkoutWithExercises>, WorkoutError> {
        Client::find_for_coach(pool, coach_id, client_id)
            .await?
            .ok_or(WorkoutError::ClientNotFound)?;
        let mut workouts = Vec::new();
        for workout in Workout::find_by_client_id(pool, client_id).await? {
            workouts.push(workout.with_exercises(pool).await?);
        }
        Ok(workouts)
    }

    pub async fn get(
        pool: &SqlitePool,
        coach_id: Uuid,
        workout_id: Uuid,
    ) -> Result<WorkoutWithExercises, WorkoutError> {
        let workout = Workout::find_for_coach(pool, coach_id, workout_id)
            .await?
            .ok_or(WorkoutError::NotFound)?;
        Ok(workout.with_exercises(pool).await?)
    }

    pub async fn update_status(
        pool: &SqlitePool,
        coach_id: Uuid,
        workout_id: Uuid,
        status: WorkoutStatus,
    ) -> Result<Workout, WorkoutError> {
        let workout = Workout::find_for_coach(pool, coach_id, workout_id)
            .await?
            .ok_or(WorkoutError::NotFound)?;
        if !workout.status.can_transition_to(status) {
            return Err(WorkoutError::InvalidTransition {
                from: workout.status,
                to: status,
            });
        }
        if let Some(updated) = Workout::update_status(pool, workout_id, workout.status, status).await? {
            return Ok(updated);
        }
        // someone else moved it between the read and the write
        let current = Workout::find_for_coach(pool, coach_id, workout_id)
            .await?
            .ok_or(WorkoutError::NotFound)?;
        Err(WorkoutError::InvalidTransition {
            from: current.status,
            to: status,
        })
    }

    /// Rewrite the order of a saved workout. `exercise_ids` must be a
    /// permutation of the workout's exercises.
    pub async fn reorder(
        pool: &SqlitePool,
        coach_id: Uuid,
        workout_id: Uuid,
        exercise_ids: &[Uuid],
    ) -> Result<Vec<Exercise>, WorkoutError> {
        Workout::find_for_coach(pool, coach_id, workout_id)
            .await?
            .ok_or(WorkoutError::NotFound)?;

        let mut tx = pool.begin().await?;
        let current: HashSet<Uuid> = Exercise::find_by_workout_id(&mut *tx, workout_id)
            .await?
            .into_iter()
            .map(|e| e.id)
            .collect();
        let requested: HashSet<Uuid> = exercise_ids.iter().copied().collect();
        if requested.len() != exercise_ids.len() || requested != current {
            return Err(WorkoutError::NotAPermutation);
        }

        Exercise::park_order_indices(&mut *tx, workout_id).await?;
        for (index, id) in exercise_ids.iter().enumerate() {
            Exercise::set_order_index(&mut *tx, *id, index as i32).await?;
        }
        let exercises = Exercise::find_by_workout_id(&mut *tx, workout_id).await?;
        tx.commit().await?;
        Ok(exercises)
    }

    pub async fn delete(pool: &SqlitePool, coach_id: Uuid, workout_id: Uuid) -> Result<(), WorkoutError> {
        Workout::find_for_coach(pool, coach_id, workout_id)
            .await?
            .ok_or(WorkoutError::NotFound)?;

        let mut tx = pool.begin().await?;
        Exercise::delete_by_workout_id(&mut *tx, workout_id).await?;
        Workout::delete(&mut *tx, workout_id).await?;
        tx.commit().await?;

        info!(coach_id = %coach_id, workout_id = %workout_id, "Workout deleted");
        Ok(())
    }
}
