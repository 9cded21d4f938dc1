//! In-process change feed for the tables the browser watches live.
//!
//! Writers publish a [`RecordChange`] after their statement commits; readers
//! subscribe with a [`FeedFilter`]. A subscriber that falls more than the
//! channel capacity behind loses the oldest items and logs a warning.

use chrono::{DateTime, Utc};
use db::models::{email_log::EmailLog, message::Message, notification::Notification};
use futures::{
    StreamExt,
    future::ready,
    stream::{self, BoxStream},
};
use serde::{Deserialize, Serialize};
use strum_macros::{Display, EnumString};
use tokio::sync::broadcast;
use tokio_stream::wrappers::{BroadcastStream, errors::BroadcastStreamRecvError};
use tracing::{trace, warn};
use ts_rs::TS;
use utils::live_rows::{LiveRow, LiveRows};
use uuid::Uuid;

pub const FEED_CAPACITY: usize = 1024;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, TS, Display, EnumString)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum FeedTable {
    Messages,
    Notifications,
    EmailLogs,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS, Display)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum ChangeKind {
    Insert,
    Update,
    Delete,
}

#[derive(Debug, Clone, Serialize, Deserialize, TS)]
pub struct RecordChange {
    pub table: FeedTable,
    pub kind: ChangeKind,
    pub row_id: Uuid,
    pub coach_id: Uuid,
    pub client_id: Option<Uuid>,
    pub version: DateTime<Utc>,
    #[ts(type = "unknown")]
    pub record: serde_json::Value,
}

impl RecordChange {
    pub fn message(kind: ChangeKind, message: &Message) -> Self {
        Self {
            table: FeedTable::Messages,
            kind,
            row_id: message.id,
            coach_id: message.coach_id,
            client_id: Some(message.client_id),
            version: message.updated_at,
            record: serde_json::to_value(message).unwrap_or_default(),
        }
    }

    pub fn notification(kind: ChangeKind, notification: &Notification) -> Self {
        Self {
            table: FeedTable::Notifications,
            kind,
            row_id: notification.id,
            coach_id: notification.coach_id,
            client_id: notification.client_id,
            version: notification.updated_at,
            record: serde_json::to_value(notification).unwrap_or_default(),
        }
    }

    /// Deletions carry no row; their version is the moment of deletion so they
    /// win over any earlier insert or update of the same id.
    pub fn notification_deleted(id: Uuid, coach_id: Uuid) -> Self {
        Self {
            table: FeedTable::Notifications,
            kind: ChangeKind::Delete,
            row_id: id,
            coach_id,
            client_id: None,
            version: Utc::now(),
            record: serde_json::Value::Null,
        }
    }

    pub fn email_log(kind: ChangeKind, log: &EmailLog) -> Self {
        Self {
            table: FeedTable::EmailLogs,
            kind,
            row_id: log.id,
            coach_id: log.coach_id,
            client_id: log.client_id,
            version: log.created_at,
            record: serde_json::to_value(log).unwrap_or_default(),
        }
    }
}

impl LiveRow for RecordChange {
    type Key = (FeedTable, Uuid);

    fn key(&self) -> Self::Key {
        (self.table, self.row_id)
    }

    fn version(&self) -> DateTime<Utc> {
        self.version
    }
}

/// Which changes a subscriber wants. `None` fields match anything.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FeedFilter {
    pub table: FeedTable,
    pub coach_id: Option<Uuid>,
    pub client_id: Option<Uuid>,
}

impl FeedFilter {
    pub fn for_client(table: FeedTable, client_id: Uuid) -> Self {
        Self {
            table,
            coach_id: None,
            client_id: Some(client_id),
        }
    }

    pub fn for_coach(table: FeedTable, coach_id: Uuid) -> Self {
        Self {
            table,
            coach_id: Some(coach_id),
            client_id: None,
        }
    }

    pub fn matches(&self, change: &RecordChange) -> bool {
        change.table == self.table
            && self.coach_id.is_none_or(|id| change.coach_id == id)
            && self.client_id.is_none_or(|id| change.client_id == Some(id))
    }
}

#[derive(Clone)]
pub struct EventService {
    tx: broadcast::Sender<RecordChange>,
}

impl Default for EventService {
    fn default() -> Self {
        Self::new(FEED_CAPACITY)
    }
}

impl EventService {
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity);
        Self { tx }
    }

    pub fn publish(&self, change: RecordChange) {
        let table = change.table;
        let row_id = change.row_id;
        match self.tx.send(change) {
            Ok(receivers) => trace!(%table, %row_id, receivers, "Published change"),
            // no subscribers right now
            Err(_) => trace!(%table, %row_id, "Dropped change with no subscribers"),
        }
    }

    pub fn subscriber_count(&self) -> usize {
        self.tx.receiver_count()
    }

    /// Live changes matching `filter`, starting from the moment of the call.
    pub fn subscribe(&self, filter: FeedFilter) -> BoxStream<'static, RecordChange> {
        BroadcastStream::new(self.tx.subscribe())
            .filter_map(move |item| {
                let change = match item {
                    Ok(change) if filter.matches(&change) => Some(change),
                    Ok(_) => None,
                    Err(BroadcastStreamRecvError::Lagged(skipped)) => {
                        warn!(table = %filter.table, skipped, "Feed subscriber lagged, changes dropped");
                        None
                    }
                };
                ready(change)
            })
            .boxed()
    }
}

/// Snapshot rows followed by live changes, with duplicates and stale versions
/// removed. Subscribe before reading the snapshot so nothing falls in between.
pub fn merge_feed(
    snapshot: Vec<RecordChange>,
    live: BoxStream<'static, RecordChange>,
) -> BoxStream<'static, RecordChange> {
    let mut seen = LiveRows::new();
    stream::iter(snapshot)
        .chain(live)
        .filter_map(move |change| {
            let fresh = seen.apply(change.clone()).is_fresh();
            ready(fresh.then_some(change))
        })
        .boxed()
}

#[cfg(test)]
mod tests {
    use chrono::Duration;
    use db::models::message::MessageSender;

    use super::*;

    fn message(client_id: Uuid, coach_id: Uuid, content: &str) -> Message {
        let now = Utc::now();
        Message {
            id: Uuid::new_v4(),
            client_id,
            coach_id,
            sender: MessageSender::Client,
            content: content.to_string(),
            read: false,
            read_at: None,
            created_at: now,
            updated_at: now,
        }
    }

    #[tokio::test]
    async fn subscribers_only_see_their_client() {
        let events = EventService::default();
        let coach = Uuid::new_v4();
        let mine = Uuid::new_v4();
        let theirs = Uuid::new_v4();
        let mut feed = events.subscribe(FeedFilter::for_client(FeedTable::Messages, mine));

        events.publish(RecordChange::message(ChangeKind::Insert, &message(theirs, coach, "no")));
        events.publish(RecordChange::message(ChangeKind::Insert, &message(mine, coach, "yes")));

        let change = feed.next().await.unwrap();
        assert_eq!(change.client_id, Some(mine));
        assert_eq!(change.record["content"], "yes");
    }

    #[tokio::test]
    async fn merge_drops_rows_already_in_snapshot() {
        let events = EventService::default();
        let coach = Uuid::new_v4();
        let client = Uuid::new_v4();
        let live = events.subscribe(FeedFilter::for_coach(FeedTable::Messages, coach));

        let first = message(client, coach, "first");
        let snapshot = vec![RecordChange::message(ChangeKind::Insert, &first)];

        // the same insert arrives again live, then a newer read update
        events.publish(RecordChange::message(ChangeKind::Insert, &first));
        let mut read = first.clone();
        read.read = true;
        read.updated_at = first.updated_at + Duration::seconds(1);
        events.publish(RecordChange::message(ChangeKind::Update, &read));

        let merged: Vec<_> = merge_feed(snapshot, live).take(2).collect().await;
        assert_eq!(merged[0].kind, ChangeKind::Insert);
        assert_eq!(merged[1].kind, ChangeKind::Update);
        assert_eq!(merged[1].record["read"], true);
    }
}
