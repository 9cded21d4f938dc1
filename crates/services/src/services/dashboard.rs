use db::models::{
    client::Client,
    message::Message,
    notification::Notification,
    workout::{Workout, WorkoutStatus},
};
use serde::{Deserialize, Serialize};
use sqlx::SqlitePool;
use ts_rs::TS;
use uuid::Uuid;

/// Counters for the coach's landing screen.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, TS)]
pub struct DashboardSummary {
    pub active_clients: i64,
    pub inactive_clients: i64,
    pub workouts_assigned: i64,
    pub workouts_in_progress: i64,
    pub workouts_completed: i64,
    pub unread_messages: i64,
    pub unread_notifications: i64,
}

pub struct DashboardService;

impl DashboardService {
    pub async fn summary(pool: &SqlitePool, coach_id: Uuid) -> Result<DashboardSummary, sqlx::Error> {
        let ((active_clients, inactive_clients), workouts, unread_messages, unread_notifications) = tokio::try_join!(
            Client::count_by_status(pool, coach_id),
            Workout::count_by_status(pool, coach_id),
            Message::count_unread_from_clients(pool, coach_id),
            Notification::count_unread(pool, coach_id),
        )?;

        let mut summary = DashboardSummary {
            active_clients,
            inactive_clients,
            unread_messages,
            unread_notifications,
            ..Default::default()
        };
        for (status, count) in workouts {
            match status {
                WorkoutStatus::Assigned => summary.workouts_assigned = count,
                WorkoutStatus::InProgress => summary.workouts_in_progress = count,
                WorkoutStatus::Completed => summary.workouts_completed = count,
            }
        }
        Ok(summary)
    }
}

#[cfg(test)]
mod tests {
    use db::{
        DBService,
        models::{client::UpdateClient, client::ClientStatus, message::MessageSender},
    };

    use super::*;
    use crate::services::{
        client_roster::ClientRosterService,
        testing::{seed_client, seed_coach},
        workout_builder::{ExerciseDraft, WorkoutDraft, WorkoutService},
    };

    #[tokio::test]
    async fn summary_counts_per_coach() {
        let db = DBService::new_in_memory().await.unwrap();
        let coach = seed_coach(&db.pool, "a@example.com").await;
        let sam = seed_client(&db.pool, coach.id, "Sam").await;
        let alex = seed_client(&db.pool, coach.id, "Alex").await;
        ClientRosterService::update(
            &db.pool,
            coach.id,
            alex.id,
            UpdateClient {
                status: Some(ClientStatus::Inactive),
                ..Default::default()
            },
        )
        .await
        .unwrap();
        let mut draft = WorkoutDraft::new(sam.id, "Legs");
        draft.push(ExerciseDraft {
            name: "Squat".to_string(),
            sets: 3,
            reps: 8,
            rest_seconds: 90,
            notes: None,
        });
        let workout = WorkoutService::submit(&db.pool, coach.id, &draft).await.unwrap();
        WorkoutService::submit(&db.pool, coach.id, &draft).await.unwrap();
        WorkoutService::update_status(&db.pool, coach.id, workout.id, WorkoutStatus::InProgress)
            .await
            .unwrap();
        Message::create(&db.pool, sam.id, coach.id, MessageSender::Client, "hi")
            .await
            .unwrap();
        Message::create(&db.pool, sam.id, coach.id, MessageSender::Coach, "hello")
            .await
            .unwrap();

        let summary = DashboardService::summary(&db.pool, coach.id).await.unwrap();
        assert_eq!(
            summary,
            DashboardSummary {
                active_clients: 1,
                inactive_clients: 1,
                workouts_assigned: 1,
                workouts_in_progress: 1,
                workouts_completed: 0,
                unread_messages: 1,
                unread_notifications: 0,
            }
        );
    }
}
