//! Delivery history of portal emails.

use axum::{
    Router,
    extract::{Query, State},
    response::Json as ResponseJson,
    routing::get,
};
use db::models::email_log::EmailLog;
use deployment::Deployment;
use serde::Deserialize;
use services::services::{
    email::PortalEmailService,
    events::{ChangeKind, FeedFilter, FeedTable, RecordChange, merge_feed},
};
use utils::response::ApiResponse;

use crate::{
    DeploymentImpl,
    error::ApiError,
    middleware::auth::CurrentCoach,
    routes::feed::{FeedStream, sse},
};

const DEFAULT_HISTORY: i64 = 50;

#[derive(Debug, Deserialize)]
pub struct HistoryQuery {
    pub limit: Option<i64>,
}

pub async fn list_email_logs(
    State(deployment): State<DeploymentImpl>,
    CurrentCoach(session): CurrentCoach,
    Query(query): Query<HistoryQuery>,
) -> Result<ResponseJson<ApiResponse<Vec<EmailLog>>>, ApiError> {
    let logs = PortalEmailService::history(
        &deployment.db().pool,
        session.coach_id,
        query.limit.unwrap_or(DEFAULT_HISTORY),
    )
    .await?;
    Ok(ResponseJson(ApiResponse::success(logs)))
}

pub async fn stream_email_logs(
    State(deployment): State<DeploymentImpl>,
    CurrentCoach(session): CurrentCoach,
) -> Result<FeedStream, ApiError> {
    let live = deployment
        .events()
        .subscribe(FeedFilter::for_coach(FeedTable::EmailLogs, session.coach_id));
    let snapshot =
        PortalEmailService::history(&deployment.db().pool, session.coach_id, DEFAULT_HISTORY)
            .await?
            .iter()
            .rev()
            .map(|log| RecordChange::email_log(ChangeKind::Insert, log))
            .collect();
    Ok(sse(merge_feed(snapshot, live)))
}

pub fn router(_deployment: &DeploymentImpl) -> Router<DeploymentImpl> {
    Router::new()
        .route("/email-logs", get(list_email_logs))
        .route("/email-logs/stream", get(stream_email_logs))
}
