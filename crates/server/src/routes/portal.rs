//! Client portal: coach-side management plus the public, access-code gated
//! surface the client uses.

use axum::{
    Json, Router,
    extract::{Path, Query, State},
    response::Json as ResponseJson,
    routing::{get, post},
};
use db::models::{
    client::Client,
    client_portal::ClientPortal,
    message::{Message, MessageSender},
};
use deployment::Deployment;
use serde::Deserialize;
use services::services::{
    messaging::MessagingService,
    portal::{PortalError, PortalService, PortalView},
};
use utils::response::ApiResponse;
use uuid::Uuid;

use crate::{
    DeploymentImpl,
    error::ApiError,
    middleware::auth::CurrentCoach,
    routes::{
        feed::FeedStream,
        messages::{MarkedRead, SendMessage, message_feed},
    },
};

#[derive(Debug, Deserialize)]
pub struct AccessCode {
    #[serde(default)]
    pub code: String,
}

/// Checks the access code and loads the client it unlocks.
pub(crate) async fn unlock(
    deployment: &DeploymentImpl,
    client_id: Uuid,
    code: &str,
) -> Result<(ClientPortal, Client), ApiError> {
    let pool = &deployment.db().pool;
    let portal = deployment
        .portals()
        .authenticate(pool, client_id, code)
        .await?;
    let client = Client::find_by_id(pool, portal.client_id)
        .await?
        .ok_or(PortalError::ClientNotFound)?;
    Ok((portal, client))
}

pub async fn get_portal(
    State(deployment): State<DeploymentImpl>,
    CurrentCoach(session): CurrentCoach,
    Path(client_id): Path<Uuid>,
) -> Result<ResponseJson<ApiResponse<ClientPortal>>, ApiError> {
    let portal = PortalService::get(&deployment.db().pool, session.coach_id, client_id).await?;
    Ok(ResponseJson(ApiResponse::success(portal)))
}

/// Idempotent: an existing portal is returned unchanged.
pub async fn create_portal(
    State(deployment): State<DeploymentImpl>,
    CurrentCoach(session): CurrentCoach,
    Path(client_id): Path<Uuid>,
) -> Result<ResponseJson<ApiResponse<ClientPortal>>, ApiError> {
    let portal = deployment
        .portals()
        .create_or_get(&deployment.db().pool, session.coach_id, client_id)
        .await?;
    Ok(ResponseJson(ApiResponse::success(portal)))
}

pub async fn rotate_portal_code(
    State(deployment): State<DeploymentImpl>,
    CurrentCoach(session): CurrentCoach,
    Path(client_id): Path<Uuid>,
) -> Result<ResponseJson<ApiResponse<ClientPortal>>, ApiError> {
    let portal = deployment
        .portals()
        .rotate(&deployment.db().pool, session.coach_id, client_id)
        .await?;
    Ok(ResponseJson(ApiResponse::success(portal)))
}

pub async fn revoke_portal(
    State(deployment): State<DeploymentImpl>,
    CurrentCoach(session): CurrentCoach,
    Path(client_id): Path<Uuid>,
) -> Result<ResponseJson<ApiResponse<()>>, ApiError> {
    PortalService::revoke(&deployment.db().pool, session.coach_id, client_id).await?;
    Ok(ResponseJson(ApiResponse::success(())))
}

pub async fn view_portal(
    State(deployment): State<DeploymentImpl>,
    Path(client_id): Path<Uuid>,
    Query(access): Query<AccessCode>,
) -> Result<ResponseJson<ApiResponse<PortalView>>, ApiError> {
    let (portal, _) = unlock(&deployment, client_id, &access.code).await?;
    let view = PortalService::view(&deployment.db().pool, &portal).await?;
    Ok(ResponseJson(ApiResponse::success(view)))
}

pub async fn portal_thread(
    State(deployment): State<DeploymentImpl>,
    Path(client_id): Path<Uuid>,
    Query(access): Query<AccessCode>,
) -> Result<ResponseJson<ApiResponse<Vec<Message>>>, ApiError> {
    let (_, client) = unlock(&deployment, client_id, &access.code).await?;
    let messages = MessagingService::thread(&deployment.db().pool, client.id).await?;
    Ok(ResponseJson(ApiResponse::success(messages)))
}

pub async fn portal_send_message(
    State(deployment): State<DeploymentImpl>,
    Path(client_id): Path<Uuid>,
    Query(access): Query<AccessCode>,
    Json(payload): Json<SendMessage>,
) -> Result<ResponseJson<ApiResponse<Message>>, ApiError> {
    let (_, client) = unlock(&deployment, client_id, &access.code).await?;
    let message = deployment
        .messaging()
        .send(
            &deployment.db().pool,
            &client,
            MessageSender::Client,
            &payload.content,
        )
        .await?;
    Ok(ResponseJson(ApiResponse::success(message)))
}

pub async fn portal_mark_read(
    State(deployment): State<DeploymentImpl>,
    Path(client_id): Path<Uuid>,
    Query(access): Query<AccessCode>,
) -> Result<ResponseJson<ApiResponse<MarkedRead>>, ApiError> {
    let (_, client) = unlock(&deployment, client_id, &access.code).await?;
    let message_ids = deployment
        .messaging()
        .mark_read(&deployment.db().pool, client.id, MessageSender::Client)
        .await?;
    Ok(ResponseJson(ApiResponse::success(MarkedRead { message_ids })))
}

pub async fn portal_stream(
    State(deployment): State<DeploymentImpl>,
    Path(client_id): Path<Uuid>,
    Query(access): Query<AccessCode>,
) -> Result<FeedStream, ApiError> {
    let (_, client) = unlock(&deployment, client_id, &access.code).await?;
    message_feed(&deployment, client.id).await
}

pub fn router(_deployment: &DeploymentImpl) -> Router<DeploymentImpl> {
    let manage = Router::new()
        .route(
            "/",
            get(get_portal).post(create_portal).delete(revoke_portal),
        )
        .route("/rotate", post(rotate_portal_code));

    let public = Router::new()
        .route("/", get(view_portal))
        .route("/messages", get(portal_thread).post(portal_send_message))
        .route("/messages/read", post(portal_mark_read))
        .route("/messages/stream", get(portal_stream));

    Router::new()
        .nest("/clients/{client_id}/portal", manage)
        .nest("/portal/{client_id}", public)
}
