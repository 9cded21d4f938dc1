//! Server-Sent Events rendering of the change feed.

use std::{convert::Infallible, time::Duration};

use axum::response::sse::{Event, KeepAlive, KeepAliveStream, Sse};
use futures_util::{StreamExt, stream::BoxStream};
use services::services::events::RecordChange;

pub type FeedStream = Sse<KeepAliveStream<BoxStream<'static, Result<Event, Infallible>>>>;

const KEEP_ALIVE: Duration = Duration::from_secs(15);

/// Each change becomes one event named after its kind (`insert`, `update`,
/// `delete`) with the change as JSON data.
pub fn sse(changes: BoxStream<'static, RecordChange>) -> FeedStream {
    let events = changes
        .filter_map(|change| async move {
            match Event::default()
                .event(change.kind.to_string())
                .id(change.row_id.to_string())
                .json_data(&change)
            {
                Ok(event) => Some(Ok(event)),
                Err(e) => {
                    tracing::warn!(row_id = %change.row_id, error = %e, "Dropping unserializable change");
                    None
                }
            }
        })
        .boxed();
    Sse::new(events).keep_alive(KeepAlive::new().interval(KEEP_ALIVE))
}
