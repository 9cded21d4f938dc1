use axum::{
    Json, Router,
    extract::State,
    response::Json as ResponseJson,
    routing::get,
};
use db::models::coach_profile::{CoachProfile, UpsertCoachProfile};
use deployment::Deployment;
use services::services::profile::{Lookup, ProfileService};
use utils::response::ApiResponse;

use crate::{DeploymentImpl, error::ApiError, middleware::auth::CurrentCoach};

pub async fn get_profile(
    State(deployment): State<DeploymentImpl>,
    CurrentCoach(session): CurrentCoach,
) -> Result<ResponseJson<ApiResponse<Lookup<CoachProfile>>>, ApiError> {
    let profile = ProfileService::get_own(&deployment.db().pool, session.coach_id).await?;
    Ok(ResponseJson(ApiResponse::success(profile)))
}

pub async fn upsert_profile(
    State(deployment): State<DeploymentImpl>,
    CurrentCoach(session): CurrentCoach,
    Json(payload): Json<UpsertCoachProfile>,
) -> Result<ResponseJson<ApiResponse<CoachProfile>>, ApiError> {
    let profile =
        ProfileService::upsert_own(&deployment.db().pool, session.coach_id, &payload).await?;
    Ok(ResponseJson(ApiResponse::success(profile)))
}

pub fn router(_deployment: &DeploymentImpl) -> Router<DeploymentImpl> {
    Router::new().route("/profile", get(get_profile).put(upsert_profile))
}
