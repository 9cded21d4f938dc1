//! Coach side of the coach/client message thread.

use axum::{
    Json, Router,
    extract::{Path, State},
    response::Json as ResponseJson,
    routing::{get, post},
};
use db::models::message::{Message, MessageSender};
use deployment::Deployment;
use serde::{Deserialize, Serialize};
use services::services::{
    client_roster::ClientRosterService,
    events::{ChangeKind, FeedFilter, FeedTable, RecordChange, merge_feed},
    messaging::MessagingService,
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

#[derive(Debug, Clone, Serialize, Deserialize, TS)]
pub struct SendMessage {
    pub content: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, TS)]
pub struct MarkedRead {
    pub message_ids: Vec<Uuid>,
}

/// Live thread for one client: subscribe, then snapshot, then merge.
pub(crate) async fn message_feed(
    deployment: &DeploymentImpl,
    client_id: Uuid,
) -> Result<FeedStream, ApiError> {
    let live = deployment
        .events()
        .subscribe(FeedFilter::for_client(FeedTable::Messages, client_id));
    let snapshot = MessagingService::thread(&deployment.db().pool, client_id)
        .await?
        .iter()
        .map(|m| RecordChange::message(ChangeKind::Insert, m))
        .collect();
    Ok(sse(merge_feed(snapshot, live)))
}

pub async fn get_thread(
    State(deployment): State<DeploymentImpl>,
    CurrentCoach(session): CurrentCoach,
    Path(client_id): Path<Uuid>,
) -> Result<ResponseJson<ApiResponse<Vec<Message>>>, ApiError> {
    let client =
        ClientRosterService::get(&deployment.db().pool, session.coach_id, client_id).await?;
    let messages = MessagingService::thread(&deployment.db().pool, client.id).await?;
    Ok(ResponseJson(ApiResponse::success(messages)))
}

pub async fn send_message(
    State(deployment): State<DeploymentImpl>,
    CurrentCoach(session): CurrentCoach,
    Path(client_id): Path<Uuid>,
    Json(payload): Json<SendMessage>,
) -> Result<ResponseJson<ApiResponse<Message>>, ApiError> {
    let client =
        ClientRosterService::get(&deployment.db().pool, session.coach_id, client_id).await?;
    let message = deployment
        .messaging()
        .send(
            &deployment.db().pool,
            &client,
            MessageSender::Coach,
            &payload.content,
        )
        .await?;
    Ok(ResponseJson(ApiResponse::success(message)))
}

pub async fn mark_thread_read(
    State(deployment): State<DeploymentImpl>,
    CurrentCoach(session): CurrentCoach,
    Path(client_id): Path<Uuid>,
) -> Result<ResponseJson<ApiResponse<MarkedRead>>, ApiError> {
    let client =
        ClientRosterService::get(&deployment.db().pool, session.coach_id, client_id).await?;
    let message_ids = deployment
        .messaging()
        .mark_read(&deployment.db().pool, client.id, MessageSender::Coach)
        .await?;
    Ok(ResponseJson(ApiResponse::success(MarkedRead { message_ids })))
}

pub async fn stream_thread(
    State(deployment): State<DeploymentImpl>,
    CurrentCoach(session): CurrentCoach,
    Path(client_id): Path<Uuid>,
) -> Result<FeedStream, ApiError> {
    let client =
        ClientRosterService::get(&deployment.db().pool, session.coach_id, client_id).await?;
    message_feed(&deployment, client.id).await
}

pub fn router(_deployment: &DeploymentImpl) -> Router<DeploymentImpl> {
    Router::new().nest(
        "/clients/{client_id}/messages",
        Router::new()
            .route("/", get(get_thread).post(send_message))
            .route("/read", post(mark_thread_read))
            .route("/stream", get(stream_thread)),
    )
}
