use db::models::{
    client::{Client, CreateClient, UpdateClient},
    client_portal::ClientPortal,
    email_log::EmailLog,
    exercise::Exercise,
    message::Message,
    notification::Notification,
    progress_metric::ProgressMetric,
    workout::Workout,
};
use serde::{Deserialize, Serialize};
use sqlx::SqlitePool;
use thiserror::Error;
use tracing::info;
use ts_rs::TS;
use uuid::Uuid;
use validator::Validate;

use super::events::{EventService, RecordChange};

#[derive(Debug, Error)]
pub enum RosterError {
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
    #[error("validation error: {0}")]
    Validation(#[from] validator::ValidationErrors),
    #[error("client not found")]
    NotFound,
}

/// Rows removed (or detached) by a client delete.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, TS)]
pub struct ClientDeletion {
    pub exercises: u64,
    pub workouts: u64,
    pub progress_metrics: u64,
    pub messages: u64,
    pub notifications: u64,
    pub portals: u64,
    pub email_logs_detached: u64,
}

pub struct ClientRosterService;

impl ClientRosterService {
    pub async fn list(pool: &SqlitePool, coach_id: Uuid) -> Result<Vec<Client>, RosterError> {
        Ok(Client::find_by_coach_id(pool, coach_id).await?)
    }

    pub async fn create(
        pool: &SqlitePool,
        coach_id: Uuid,
        data: &CreateClient,
    ) -> Result<Client, RosterError> {
        let data = CreateClient {
            name: data.name.trim().to_string(),
            email: data.email.trim().to_string(),
            ..data.clone()
        };
        data.validate()?;
        let client = Client::create(pool, coach_id, &data, Uuid::new_v4()).await?;
        info!(coach_id = %coach_id, client_id = %client.id, "Client created");
        Ok(client)
    }

    pub async fn get(pool: &SqlitePool, coach_id: Uuid, client_id: Uuid) -> Result<Client, RosterError> {
        Client::find_for_coach(pool, coach_id, client_id)
            .await?
            .ok_or(RosterError::NotFound)
    }

    pub async fn update(
        pool: &SqlitePool,
        coach_id: Uuid,
        client_id: Uuid,
        patch: UpdateClient,
    ) -> Result<Client, RosterError> {
        let patch = UpdateClient {
            name: patch.name.map(|name| name.trim().to_string()),
            email: patch.email.map(|email| email.trim().to_string()),
            ..patch
        };
        patch.validate()?;
        let mut client = Self::get(pool, coach_id, client_id).await?;
        client.apply(patch);
        Ok(Client::update(pool, &client).await?)
    }

    /// Delete a client and everything hanging off it in one transaction.
    /// Email logs are kept for the delivery history with the client detached.
    /// Removed notifications are announced on the feed after commit.
    pub async fn delete(
        pool: &SqlitePool,
        events: &EventService,
        coach_id: Uuid,
        client_id: Uuid,
    ) -> Result<ClientDeletion, RosterError> {
        Self::get(pool, coach_id, client_id).await?;

        let mut tx = pool.begin().await?;
        let deleted_notifications = Notification::delete_by_client_id(&mut *tx, client_id).await?;
        let deletion = ClientDeletion {
            exercises: Exercise::delete_by_client_id(&mut *tx, client_id).await?,
            workouts: Workout::delete_by_client_id(&mut *tx, client_id).await?,
            progress_metrics: ProgressMetric::delete_by_client_id(&mut *tx, client_id).await?,
            messages: Message::delete_by_client_id(&mut *tx, client_id).await?,
            notifications: deleted_notifications.len() as u64,
            portals: ClientPortal::delete_by_client_id(&mut *tx, client_id).await?,
            email_logs_detached: EmailLog::detach_client(&mut *tx, client_id).await?,
        };
        Client::delete(&mut *tx, client_id).await?;
        tx.commit().await?;

        for id in deleted_notifications {
            events.publish(RecordChange::notification_deleted(id, coach_id));
        }

        info!(
            coach_id = %coach_id,
            client_id = %client_id,
            workouts = deletion.workouts,
            messages = deletion.messages,
            "Client deleted"
        );
        Ok(deletion)
    }
}
