//! Coach notification center.

use axum::{
    Router,
    extract::{Path, Query, State},
    response::Json as ResponseJson,
    routing::{delete, get, post},
};
use db::models::notification::Notification;
use deployment::Deployment;
use serde::{Deserialize, Serialize};
use services::services::{
    events::{ChangeKind, FeedFilter, FeedTable, RecordChange, merge_feed},
    notification::NotificationService,
};
use ts_rs::TS;
use utils::response::ApiResponse;
use uuid::Uuid;

use crate::{
    DeploymentImpl,
    error::ApiError,
    middleware::auth::CurrentCoach,
    routes::feed::{FeedStream, sse},
};

#[derive(Debug, Default, Deserialize)]
pub struct NotificationQuery {
    #[serde(default)]
    pub unread_only: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize, TS)]
pub struct ClearedNotifications {
    pub deleted: u64,
}

pub async fn list_notifications(
    State(deployment): State<DeploymentImpl>,
    CurrentCoach(session): CurrentCoach,
    Query(query): Query<NotificationQuery>,
) -> Result<ResponseJson<ApiResponse<Vec<Notification>>>, ApiError> {
    let notifications =
        NotificationService::list(&deployment.db().pool, session.coach_id, query.unread_only)
            .await?;
    Ok(ResponseJson(ApiResponse::success(notifications)))
}

pub async fn mark_notification_read(
    State(deployment): State<DeploymentImpl>,
    CurrentCoach(session): CurrentCoach,
    Path(notification_id): Path<Uuid>,
) -> Result<ResponseJson<ApiResponse<Notification>>, ApiError> {
    let notification = deployment
        .notifications()
        .mark_read(&deployment.db().pool, session.coach_id, notification_id)
        .await?;
    Ok(ResponseJson(ApiResponse::success(notification)))
}

pub async fn mark_all_read(
    State(deployment): State<DeploymentImpl>,
    CurrentCoach(session): CurrentCoach,
) -> Result<ResponseJson<ApiResponse<Vec<Notification>>>, ApiError> {
    let flipped = deployment
        .notifications()
        .mark_all_read(&deployment.db().pool, session.coach_id)
        .await?;
    Ok(ResponseJson(ApiResponse::success(flipped)))
}

pub async fn delete_notification(
    State(deployment): State<DeploymentImpl>,
    CurrentCoach(session): CurrentCoach,
    Path(notification_id): Path<Uuid>,
) -> Result<ResponseJson<ApiResponse<()>>, ApiError> {
    deployment
        .notifications()
        .delete(&deployment.db().pool, session.coach_id, notification_id)
        .await?;
    Ok(ResponseJson(ApiResponse::success(())))
}

pub async fn clear_notifications(
    State(deployment): State<DeploymentImpl>,
    CurrentCoach(session): CurrentCoach,
) -> Result<ResponseJson<ApiResponse<ClearedNotifications>>, ApiError> {
    let deleted = deployment
        .notifications()
        .delete_all(&deployment.db().pool, session.coach_id)
        .await?;
    Ok(ResponseJson(ApiResponse::success(ClearedNotifications {
        deleted,
    })))
}

pub async fn stream_notifications(
    State(deployment): State<DeploymentImpl>,
    CurrentCoach(session): CurrentCoach,
) -> Result<FeedStream, ApiError> {
    let live = deployment.events().subscribe(FeedFilter::for_coach(
        FeedTable::Notifications,
        session.coach_id,
    ));
    let snapshot = NotificationService::list(&deployment.db().pool, session.coach_id, false)
        .await?
        .iter()
        .map(|n| RecordChange::notification(ChangeKind::Insert, n))
        .collect();
    Ok(sse(merge_feed(snapshot, live)))
}

pub fn router(_deployment: &DeploymentImpl) -> Router<DeploymentImpl> {
    Router::new().nest(
        "/notifications",
        Router::new()
            .route("/", get(list_notifications).delete(clear_notifications))
            .route("/read-all", post(mark_all_read))
            .route("/stream", get(stream_notifications))
            .route("/{notification_id}", delete(delete_notification))
            .route("/{notification_id}/read", post(mark_notification_read)),
    )
}
