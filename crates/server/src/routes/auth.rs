//! Coach sign-up, sign-in and sign-out.

use axum::{
    Json, Router,
    extract::State,
    response::Json as ResponseJson,
    routing::{get, post},
};
use db::models::coach::Coach;
use deployment::Deployment;
use serde::{Deserialize, Serialize};
use services::services::auth::{AuthError, CoachSession, LoginRequest, SignedIn, SignupRequest};
use ts_rs::TS;
use utils::response::ApiResponse;

use crate::{DeploymentImpl, error::ApiError, middleware::auth::CurrentCoach};

#[derive(Debug, Clone, Serialize, Deserialize, TS)]
pub struct Me {
    pub session: CoachSession,
    pub coach: Coach,
}

pub async fn signup(
    State(deployment): State<DeploymentImpl>,
    Json(payload): Json<SignupRequest>,
) -> Result<ResponseJson<ApiResponse<SignedIn>>, ApiError> {
    let signed_in = deployment
        .auth()
        .signup(&deployment.db().pool, &payload)
        .await?;
    Ok(ResponseJson(ApiResponse::success(signed_in)))
}

pub async fn login(
    State(deployment): State<DeploymentImpl>,
    Json(payload): Json<LoginRequest>,
) -> Result<ResponseJson<ApiResponse<SignedIn>>, ApiError> {
    let signed_in = deployment
        .auth()
        .login(&deployment.db().pool, &payload)
        .await?;
    Ok(ResponseJson(ApiResponse::success(signed_in)))
}

pub async fn logout(
    State(deployment): State<DeploymentImpl>,
    CurrentCoach(session): CurrentCoach,
) -> Result<ResponseJson<ApiResponse<()>>, ApiError> {
    deployment
        .auth()
        .logout(&deployment.db().pool, &session)
        .await?;
    Ok(ResponseJson(ApiResponse::success(())))
}

/// The session behind the presented token, with the coach account.
pub async fn me(
    State(deployment): State<DeploymentImpl>,
    CurrentCoach(session): CurrentCoach,
) -> Result<ResponseJson<ApiResponse<Me>>, ApiError> {
    let coach = Coach::find_by_id(&deployment.db().pool, session.coach_id)
        .await?
        .ok_or(AuthError::InvalidSession)?;
    Ok(ResponseJson(ApiResponse::success(Me { session, coach })))
}

pub fn router(_deployment: &DeploymentImpl) -> Router<DeploymentImpl> {
    Router::new().nest(
        "/auth",
        Router::new()
            .route("/signup", post(signup))
            .route("/login", post(login))
            .route("/logout", post(logout))
            .route("/me", get(me)),
    )
}
