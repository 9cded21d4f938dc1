//! The coach's client roster.

use axum::{
    Json, Router,
    extract::{Path, State},
    response::Json as ResponseJson,
    routing::get,
};
use db::models::client::{Client, CreateClient, UpdateClient};
use deployment::Deployment;
use services::services::client_roster::{ClientDeletion, ClientRosterService};
use utils::response::ApiResponse;
use uuid::Uuid;

use crate::{DeploymentImpl, error::ApiError, middleware::auth::CurrentCoach};

pub async fn list_clients(
    State(deployment): State<DeploymentImpl>,
    CurrentCoach(session): CurrentCoach,
) -> Result<ResponseJson<ApiResponse<Vec<Client>>>, ApiError> {
    let clients = ClientRosterService::list(&deployment.db().pool, session.coach_id).await?;
    Ok(ResponseJson(ApiResponse::success(clients)))
}

pub async fn create_client(
    State(deployment): State<DeploymentImpl>,
    CurrentCoach(session): CurrentCoach,
    Json(payload): Json<CreateClient>,
) -> Result<ResponseJson<ApiResponse<Client>>, ApiError> {
    let client =
        ClientRosterService::create(&deployment.db().pool, session.coach_id, &payload).await?;
    Ok(ResponseJson(ApiResponse::success(client)))
}

pub async fn get_client(
    State(deployment): State<DeploymentImpl>,
    CurrentCoach(session): CurrentCoach,
    Path(client_id): Path<Uuid>,
) -> Result<ResponseJson<ApiResponse<Client>>, ApiError> {
    let client =
        ClientRosterService::get(&deployment.db().pool, session.coach_id, client_id).await?;
    Ok(ResponseJson(ApiResponse::success(client)))
}

pub async fn update_client(
    State(deployment): State<DeploymentImpl>,
    CurrentCoach(session): CurrentCoach,
    Path(client_id): Path<Uuid>,
    Json(payload): Json<UpdateClient>,
) -> Result<ResponseJson<ApiResponse<Client>>, ApiError> {
    let client =
        ClientRosterService::update(&deployment.db().pool, session.coach_id, client_id, payload)
            .await?;
    Ok(ResponseJson(ApiResponse::success(client)))
}

/// Removes the client and everything hanging off it; answers with per-table
/// counts.
pub async fn delete_client(
    State(deployment): State<DeploymentImpl>,
    CurrentCoach(session): CurrentCoach,
    Path(client_id): Path<Uuid>,
) -> Result<ResponseJson<ApiResponse<ClientDeletion>>, ApiError> {
    let deletion =
        ClientRosterService::delete(
            &deployment.db().pool,
            deployment.events(),
            session.coach_id,
            client_id,
        )
        .await?;
    Ok(ResponseJson(ApiResponse::success(deletion)))
}

pub fn router(_deployment: &DeploymentImpl) -> Router<DeploymentImpl> {
    Router::new().nest(
        "/clients",
        Router::new()
            .route("/", get(list_clients).post(create_client))
            .route(
                "/{client_id}",
                get(get_client).put(update_client).delete(delete_client),
            ),
    )
}
