use axum::{Router, extract::State, response::Json as ResponseJson, routing::get};
use deployment::Deployment;
use services::services::config::PublicConfig;
use utils::response::ApiResponse;

use crate::DeploymentImpl;

/// Settings the SPA may read before sign-in. Secrets never leave the server.
pub async fn get_public_config(
    State(deployment): State<DeploymentImpl>,
) -> ResponseJson<ApiResponse<PublicConfig>> {
    ResponseJson(ApiResponse::success(deployment.config().public()))
}

pub fn router(_deployment: &DeploymentImpl) -> Router<DeploymentImpl> {
    Router::new().route("/config", get(get_public_config))
}
