//! Coach/client conversation per client.

use db::models::{
    client::Client,
    message::{Message, MessageSender},
    notification::NotificationKind,
};
use sqlx::SqlitePool;
use thiserror::Error;
use tracing::{info, warn};
use uuid::Uuid;

use super::{
    events::{ChangeKind, EventService, RecordChange},
    notification::NotificationService,
};

pub const MAX_MESSAGE_CHARS: usize = 5000;
const PREVIEW_CHARS: usize = 100;

#[derive(Debug, Error)]
pub enum MessagingError {
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
    #[error("message cannot be empty")]
    Empty,
    #[error("message is longer than 5000 characters")]
    TooLong,
}

#[derive(Clone)]
pub struct MessagingService {
    events: EventService,
    notifications: NotificationService,
}

impl MessagingService {
    pub fn new(events: EventService, notifications: NotificationService) -> Self {
        Self {
            events,
            notifications,
        }
    }

    pub async fn thread(pool: &SqlitePool, client_id: Uuid) -> Result<Vec<Message>, MessagingError> {
        Ok(Message::find_by_client_id(pool, client_id).await?)
    }

    pub async fn send(
        &self,
        pool: &SqlitePool,
        client: &Client,
        sender: MessageSender,
        content: &str,
    ) -> Result<Message, MessagingError> {
        let content = content.trim();
        if content.is_empty() {
            return Err(MessagingError::Empty);
        }
        if content.chars().count() > MAX_MESSAGE_CHARS {
            return Err(MessagingError::TooLong);
        }

        let message = Message::create(pool, client.id, client.coach_id, sender, content).await?;
        self.events
            .publish(RecordChange::message(ChangeKind::Insert, &message));
        info!(client_id = %client.id, sender = %sender, "Message sent");

        if sender == MessageSender::Client {
            let preview: String = content.chars().take(PREVIEW_CHARS).collect();
            // the message is already stored; a failed alert must not fail the send
            if let Err(e) = self
                .notifications
                .notify(
                    pool,
                    client.coach_id,
                    Some(client.id),
                    NotificationKind::NewMessage,
                    format!("New message from {}", client.name),
                    preview,
                )
                .await
            {
                warn!(client_id = %client.id, error = %e, "Failed to raise new message notification");
            }
        }
        Ok(message)
    }

    /// Mark everything the other party wrote as read. Returns the ids this call
    /// flipped; a concurrent call never reports the same id.
    pub async fn mark_read(
        &self,
        pool: &SqlitePool,
        client_id: Uuid,
        reader: MessageSender,
    ) -> Result<Vec<Uuid>, MessagingError> {
        let flipped = Message::mark_read_from(pool, client_id, reader.other()).await?;
        for message in &flipped {
            self.events
                .publish(RecordChange::message(ChangeKind::Update, message));
        }
        Ok(flipped.into_iter().map(|m| m.id).collect())
    }
}

#[cfg(test)]
mod tests {
    use db::{DBService, models::notification::Notification};
    use futures::StreamExt;

    use super::*;
    use crate::services::{
        events::{FeedFilter, FeedTable},
        testing::{seed_client, seed_coach},
    };

    fn service(events: &EventService) -> MessagingService {
        MessagingService::new(events.clone(), NotificationService::new(events.clone()))
    }

    #[tokio::test]
    async fn client_message_reaches_coach_subscription_and_notifies() {
        let db = DBService::new_in_memory().await.unwrap();
        let coach = seed_coach(&db.pool, "a@example.com").await;
        let client = seed_client(&db.pool, coach.id, "Sam").await;
        let events = EventService::default();
        let mut feed = events.subscribe(FeedFilter::for_coach(FeedTable::Messages, coach.id));

        let sent = service(&events)
            .send(&db.pool, &client, MessageSender::Client, "  Done with legs!  ")
            .await
            .unwrap();
        assert_eq!(sent.content, "Done with legs!");

        let change = feed.next().await.unwrap();
        assert_eq!(change.row_id, sent.id);
        let alerts = Notification::find_by_coach_id(&db.pool, coach.id, true).await.unwrap();
        assert_eq!(alerts.len(), 1);
        assert_eq!(alerts[0].kind, NotificationKind::NewMessage);
    }

    #[tokio::test]
    async fn coach_message_raises_no_notification() {
        let db = DBService::new_in_memory().await.unwrap();
        let coach = seed_coach(&db.pool, "a@example.com").await;
        let client = seed_client(&db.pool, coach.id, "Sam").await;
        let events = EventService::default();

        service(&events)
            .send(&db.pool, &client, MessageSender::Coach, "Nice work")
            .await
            .unwrap();
        assert!(Notification::find_by_coach_id(&db.pool, coach.id, false).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn content_bounds_are_enforced() {
        let db = DBService::new_in_memory().await.unwrap();
        let coach = seed_coach(&db.pool, "a@example.com").await;
        let client = seed_client(&db.pool, coach.id, "Sam").await;
        let messaging = service(&EventService::default());

        assert!(matches!(
            messaging.send(&db.pool, &client, MessageSender::Coach, "   ").await,
            Err(MessagingError::Empty)
        ));
        let long = "x".repeat(MAX_MESSAGE_CHARS + 1);
        assert!(matches!(
            messaging.send(&db.pool, &client, MessageSender::Coach, &long).await,
            Err(MessagingError::TooLong)
        ));
        let exact = "y".repeat(MAX_MESSAGE_CHARS);
        assert!(messaging.send(&db.pool, &client, MessageSender::Coach, &exact).await.is_ok());
    }

    #[tokio::test]
    async fn racing_mark_read_counts_each_row_once() {
        let db = DBService::new_in_memory().await.unwrap();
        let coach = seed_coach(&db.pool, "a@example.com").await;
        let client = seed_client(&db.pool, coach.id, "Sam").await;
        let messaging = service(&EventService::default());
        for body in ["one", "two", "three"] {
            messaging
                .send(&db.pool, &client, MessageSender::Client, body)
                .await
                .unwrap();
        }

        let (a, b) = tokio::join!(
            messaging.mark_read(&db.pool, client.id, MessageSender::Coach),
            messaging.mark_read(&db.pool, client.id, MessageSender::Coach),
        );
        let (a, b) = (a.unwrap(), b.unwrap());
        assert_eq!(a.len() + b.len(), 3);
        assert!(a.iter().all(|id| !b.contains(id)));
    }
}
