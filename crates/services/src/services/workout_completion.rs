//! A client marks a workout done from their portal.

use db::models::{
    client::Client,
    notification::{CreateNotification, Notification, NotificationKind},
    workout::Workout,
};
use serde::{Deserialize, Serialize};
use sqlx::SqlitePool;
use thiserror::Error;
use tracing::info;
use ts_rs::TS;
use uuid::Uuid;

use super::notification::NotificationService;

const MAX_FEEDBACK_CHARS: usize = 5000;

#[derive(Debug, Error)]
pub enum CompletionError {
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
    #[error("workout not found or already completed")]
    NotCompletable,
    #[error("client not found")]
    ClientNotFound,
    #[error("feedback is longer than 5000 characters")]
    FeedbackTooLong,
}

/// Body of the `workout-completion` function.
#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[serde(rename_all = "camelCase")]
pub struct WorkoutCompletionRequest {
    pub workout_id: Uuid,
    pub client_id: Uuid,
    #[serde(default)]
    pub feedback: Option<String>,
}

#[derive(Clone)]
pub struct WorkoutCompletionService {
    notifications: NotificationService,
}

impl WorkoutCompletionService {
    pub fn new(notifications: NotificationService) -> Self {
        Self { notifications }
    }

    /// Complete the workout and alert the coach in one transaction.
    pub async fn complete(
        &self,
        pool: &SqlitePool,
        request: &WorkoutCompletionRequest,
    ) -> Result<Workout, CompletionError> {
        let feedback = request
            .feedback
            .as_deref()
            .map(str::trim)
            .filter(|f| !f.is_empty());
        if feedback.is_some_and(|f| f.chars().count() > MAX_FEEDBACK_CHARS) {
            return Err(CompletionError::FeedbackTooLong);
        }
        let client = Client::find_by_id(pool, request.client_id)
            .await?
            .ok_or(CompletionError::ClientNotFound)?;

        let mut tx = pool.begin().await?;
        let workout = Workout::complete(&mut *tx, request.workout_id, client.id, feedback)
            .await?
            .ok_or(CompletionError::NotCompletable)?;
        let message = match feedback {
            Some(feedback) => format!("{} completed \"{}\": {}", client.name, workout.name, feedback),
            None => format!("{} completed \"{}\"", client.name, workout.name),
        };
        let notification = Notification::create(
            &mut *tx,
            &CreateNotification {
                coach_id: workout.coach_id,
                client_id: Some(client.id),
                kind: NotificationKind::WorkoutCompleted,
                title: "Workout completed".to_string(),
                message,
            },
        )
        .await?;
        tx.commit().await?;

        self.notifications.published(&notification);
        info!(client_id = %client.id, workout_id = %workout.id, "Workout completed");
        Ok(workout)
    }
}

#[cfg(test)]
mod tests {
    use db::{DBService, models::workout::WorkoutStatus};

    use super::*;
    use crate::services::{
        events::EventService,
        testing::{seed_client, seed_coach},
        workout_builder::{ExerciseDraft, WorkoutDraft, WorkoutService},
    };

    async fn assigned_workout(pool: &SqlitePool, coach_id: Uuid, client_id: Uuid) -> Uuid {
        let mut draft = WorkoutDraft::new(client_id, "Legs");
        draft.push(ExerciseDraft {
            name: "Squat".to_string(),
            sets: 5,
            reps: 5,
            rest_seconds: 120,
            notes: None,
        });
        WorkoutService::submit(pool, coach_id, &draft).await.unwrap().id
    }

    fn service() -> WorkoutCompletionService {
        WorkoutCompletionService::new(NotificationService::new(EventService::default()))
    }

    #[tokio::test]
    async fn completion_stores_feedback_and_notifies() {
        let db = DBService::new_in_memory().await.unwrap();
        let coach = seed_coach(&db.pool, "a@example.com").await;
        let client = seed_client(&db.pool, coach.id, "Sam").await;
        let workout_id = assigned_workout(&db.pool, coach.id, client.id).await;

        let workout = service()
            .complete(
                &db.pool,
                &WorkoutCompletionRequest {
                    workout_id,
                    client_id: client.id,
                    feedback: Some(" Tough but good ".to_string()),
                },
            )
            .await
            .unwrap();

        assert_eq!(workout.status, WorkoutStatus::Completed);
        assert!(workout.completed_at.is_some());
        assert_eq!(workout.feedback.as_deref(), Some("Tough but good"));
        let alerts = Notification::find_by_coach_id(&db.pool, coach.id, true).await.unwrap();
        assert_eq!(alerts.len(), 1);
        assert_eq!(alerts[0].kind, NotificationKind::WorkoutCompleted);
    }

    #[tokio::test]
    async fn completing_twice_is_rejected_without_second_notification() {
        let db = DBService::new_in_memory().await.unwrap();
        let coach = seed_coach(&db.pool, "a@example.com").await;
        let client = seed_client(&db.pool, coach.id, "Sam").await;
        let workout_id = assigned_workout(&db.pool, coach.id, client.id).await;
        let request = WorkoutCompletionRequest {
            workout_id,
            client_id: client.id,
            feedback: None,
        };

        service().complete(&db.pool, &request).await.unwrap();
        let err = service().complete(&db.pool, &request).await.unwrap_err();

        assert!(matches!(err, CompletionError::NotCompletable));
        assert_eq!(Notification::count_unread(&db.pool, coach.id).await.unwrap(), 1);
    }

    #[tokio::test]
    async fn another_clients_workout_cannot_be_completed() {
        let db = DBService::new_in_memory().await.unwrap();
        let coach = seed_coach(&db.pool, "a@example.com").await;
        let owner = seed_client(&db.pool, coach.id, "Sam").await;
        let intruder = seed_client(&db.pool, coach.id, "Alex").await;
        let workout_id = assigned_workout(&db.pool, coach.id, owner.id).await;

        let err = service()
            .complete(
                &db.pool,
                &WorkoutCompletionRequest {
                    workout_id,
                    client_id: intruder.id,
                    feedback: None,
                },
            )
            .await
            .unwrap_err();
        assert!(matches!(err, CompletionError::NotCompletable));
        let workout = Workout::find_by_id(&db.pool, workout_id).await.unwrap().unwrap();
        assert_eq!(workout.status, WorkoutStatus::Assigned);
    }
}
