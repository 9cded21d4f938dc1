//! Coach-facing notifications and their live feed.

use db::models::notification::{CreateNotification, Notification, NotificationKind};
use sqlx::SqlitePool;
use thiserror::Error;
use tracing::debug;
use uuid::Uuid;

use super::events::{ChangeKind, EventService, RecordChange};

#[derive(Debug, Error)]
pub enum NotificationError {
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
    #[error("notification not found")]
    NotFound,
}

#[derive(Clone)]
pub struct NotificationService {
    events: EventService,
}

impl NotificationService {
    pub fn new(events: EventService) -> Self {
        Self { events }
    }

    pub async fn notify(
        &self,
        pool: &SqlitePool,
        coach_id: Uuid,
        client_id: Option<Uuid>,
        kind: NotificationKind,
        title: impl Into<String>,
        message: impl Into<String>,
    ) -> Result<Notification, NotificationError> {
        let notification = Notification::create(
            pool,
            &CreateNotification {
                coach_id,
                client_id,
                kind,
                title: title.into(),
                message: message.into(),
            },
        )
        .await?;
        self.published(&notification);
        Ok(notification)
    }

    /// Announce a notification inserted elsewhere, e.g. inside a transaction,
    /// once it has committed.
    pub fn published(&self, notification: &Notification) {
        debug!(
            coach_id = %notification.coach_id,
            kind = %notification.kind,
            "Notification raised"
        );
        self.events
            .publish(RecordChange::notification(ChangeKind::Insert, notification));
    }

    pub async fn list(
        pool: &SqlitePool,
        coach_id: Uuid,
        unread_only: bool,
    ) -> Result<Vec<Notification>, NotificationError> {
        Ok(Notification::find_by_coach_id(pool, coach_id, unread_only).await?)
    }

    pub async fn mark_read(
        &self,
        pool: &SqlitePool,
        coach_id: Uuid,
        id: Uuid,
    ) -> Result<Notification, NotificationError> {
        let notification = Notification::mark_read(pool, coach_id, id)
            .await?
            .ok_or(NotificationError::NotFound)?;
        self.events
            .publish(RecordChange::notification(ChangeKind::Update, &notification));
        Ok(notification)
    }

    pub async fn mark_all_read(
        &self,
        pool: &SqlitePool,
        coach_id: Uuid,
    ) -> Result<Vec<Notification>, NotificationError> {
        let flipped = Notification::mark_all_read(pool, coach_id).await?;
        for notification in &flipped {
            self.events
                .publish(RecordChange::notification(ChangeKind::Update, notification));
        }
        Ok(flipped)
    }

    pub async fn delete(&self, pool: &SqlitePool, coach_id: Uuid, id: Uuid) -> Result<(), NotificationError> {
        if Notification::delete(pool, coach_id, id).await? == 0 {
            return Err(NotificationError::NotFound);
        }
        self.events
            .publish(RecordChange::notification_deleted(id, coach_id));
        Ok(())
    }

    pub async fn delete_all(&self, pool: &SqlitePool, coach_id: Uuid) -> Result<u64, NotificationError> {
        let existing = Notification::find_by_coach_id(pool, coach_id, false).await?;
        let deleted = Notification::delete_all_for_coach(pool, coach_id).await?;
        for notification in existing {
            self.events
                .publish(RecordChange::notification_deleted(notification.id, coach_id));
        }
        Ok(deleted)
    }
}
