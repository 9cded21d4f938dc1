use axum::{Router, extract::State, response::Json as ResponseJson, routing::get};
use deployment::Deployment;
use services::services::dashboard::{DashboardService, DashboardSummary};
use utils::response::ApiResponse;

use crate::{DeploymentImpl, error::ApiError, middleware::auth::CurrentCoach};

pub async fn get_dashboard(
    State(deployment): State<DeploymentImpl>,
    CurrentCoach(session): CurrentCoach,
) -> Result<ResponseJson<ApiResponse<DashboardSummary>>, ApiError> {
    let summary = DashboardService::summary(&deployment.db().pool, session.coach_id).await?;
    Ok(ResponseJson(ApiResponse::success(summary)))
}

pub fn router(_deployment: &DeploymentImpl) -> Router<DeploymentImpl> {
    Router::new().route("/dashboard", get(get_dashboard))
}
