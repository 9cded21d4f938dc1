//! Function-style endpoints called by the SPA. They answer with a flat
//! `{success, message | error}` body instead of the `ApiResponse` envelope.

use axum::{
    Json, Router,
    extract::{
        Query, State,
        rejection::{JsonRejection, QueryRejection},
    },
    http::StatusCode,
    response::Json as ResponseJson,
    routing::post,
};
use deployment::Deployment;
use serde::{Deserialize, Serialize};
use services::services::{
    email::PortalEmailRequest, workout_completion::WorkoutCompletionRequest,
};
use ts_rs::TS;

use crate::{
    DeploymentImpl,
    error::ApiError,
    middleware::auth::CurrentCoach,
    routes::portal::{AccessCode, unlock},
};

#[derive(Debug, Clone, Serialize, Deserialize, TS)]
pub struct FunctionResponse {
    pub success: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    #[ts(optional)]
    pub message: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    #[ts(optional)]
    pub error: Option<String>,
}

type FunctionResult = (StatusCode, ResponseJson<FunctionResponse>);

fn succeeded(message: Option<&str>) -> FunctionResult {
    (
        StatusCode::OK,
        ResponseJson(FunctionResponse {
            success: true,
            message: message.map(str::to_string),
            error: None,
        }),
    )
}

fn failed(error: String) -> FunctionResult {
    (
        StatusCode::BAD_REQUEST,
        ResponseJson(FunctionResponse {
            success: false,
            message: None,
            error: Some(error),
        }),
    )
}

fn failed_with(err: ApiError) -> FunctionResult {
    failed(err.public_message())
}

/// Emails a client the link to their portal and logs the delivery.
pub async fn send_portal_email(
    State(deployment): State<DeploymentImpl>,
    CurrentCoach(session): CurrentCoach,
    payload: Result<Json<PortalEmailRequest>, JsonRejection>,
) -> FunctionResult {
    let Json(request) = match payload {
        Ok(payload) => payload,
        Err(rejection) => return failed(rejection.body_text()),
    };
    match deployment
        .portal_email()
        .send_portal_email(&deployment.db().pool, session.coach_id, &request)
        .await
    {
        Ok(_) => succeeded(Some("Portal email sent")),
        Err(e) => failed_with(e.into()),
    }
}

/// Called from the client portal, so it is gated by the access code rather
/// than a coach session.
pub async fn workout_completion(
    State(deployment): State<DeploymentImpl>,
    access: Result<Query<AccessCode>, QueryRejection>,
    payload: Result<Json<WorkoutCompletionRequest>, JsonRejection>,
) -> FunctionResult {
    let Query(access) = match access {
        Ok(access) => access,
        Err(rejection) => return failed(rejection.body_text()),
    };
    let Json(request) = match payload {
        Ok(payload) => payload,
        Err(rejection) => return failed(rejection.body_text()),
    };
    if let Err(e) = unlock(&deployment, request.client_id, &access.code).await {
        return failed_with(e);
    }
    match deployment
        .workout_completion()
        .complete(&deployment.db().pool, &request)
        .await
    {
        Ok(_) => succeeded(None),
        Err(e) => failed_with(e.into()),
    }
}

pub fn router(_deployment: &DeploymentImpl) -> Router<DeploymentImpl> {
    Router::new()
        .route("/send-portal-email", post(send_portal_email))
        .route("/workout-completion", post(workout_completion))
}
