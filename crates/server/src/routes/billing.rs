//! Payment-provider webhooks and the coach's subscription mirror.

use axum::{
    Router,
    body::Bytes,
    extract::State,
    http::HeaderMap,
    response::Json as ResponseJson,
    routing::{get, post},
};
use db::models::subscription::Subscription;
use deployment::Deployment;
use services::services::billing::{BillingService, WebhookOutcome};
use utils::response::ApiResponse;

use crate::{DeploymentImpl, error::ApiError, middleware::auth::CurrentCoach};

pub const SIGNATURE_HEADER: &str = "stripe-signature";

/// Verified against the raw body, so the payload is taken as bytes.
pub async fn billing_webhook(
    State(deployment): State<DeploymentImpl>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<ResponseJson<ApiResponse<WebhookOutcome>>, ApiError> {
    let signature = headers
        .get(SIGNATURE_HEADER)
        .and_then(|v| v.to_str().ok());
    let outcome = deployment
        .billing()
        .handle_webhook(&deployment.db().pool, signature, &body)
        .await?;
    Ok(ResponseJson(ApiResponse::success(outcome)))
}

pub async fn get_subscription(
    State(deployment): State<DeploymentImpl>,
    CurrentCoach(session): CurrentCoach,
) -> Result<ResponseJson<ApiResponse<Option<Subscription>>>, ApiError> {
    let subscription =
        BillingService::subscription_for(&deployment.db().pool, session.coach_id).await?;
    Ok(ResponseJson(ApiResponse::success(subscription)))
}

pub fn router(_deployment: &DeploymentImpl) -> Router<DeploymentImpl> {
    Router::new()
        .route("/webhooks/billing", post(billing_webhook))
        .route("/billing/subscription", get(get_subscription))
}
