//! Progress metrics recorded by the coach.

use axum::{
    Json, Router,
    extract::{Path, Query, State},
    response::Json as ResponseJson,
    routing::{delete, get},
};
use db::models::progress_metric::{CreateProgressMetric, MetricType, ProgressMetric};
use deployment::Deployment;
use serde::Deserialize;
use services::services::progress::{MetricSeries, ProgressService};
use utils::response::ApiResponse;
use uuid::Uuid;

use crate::{DeploymentImpl, error::ApiError, middleware::auth::CurrentCoach};

#[derive(Debug, Deserialize)]
pub struct MetricFilter {
    pub metric_type: Option<MetricType>,
}

pub async fn list_metrics(
    State(deployment): State<DeploymentImpl>,
    CurrentCoach(session): CurrentCoach,
    Path(client_id): Path<Uuid>,
    Query(filter): Query<MetricFilter>,
) -> Result<ResponseJson<ApiResponse<Vec<ProgressMetric>>>, ApiError> {
    let metrics = ProgressService::list(
        &deployment.db().pool,
        session.coach_id,
        client_id,
        filter.metric_type,
    )
    .await?;
    Ok(ResponseJson(ApiResponse::success(metrics)))
}

pub async fn record_metric(
    State(deployment): State<DeploymentImpl>,
    CurrentCoach(session): CurrentCoach,
    Path(client_id): Path<Uuid>,
    Json(payload): Json<CreateProgressMetric>,
) -> Result<ResponseJson<ApiResponse<ProgressMetric>>, ApiError> {
    let metric =
        ProgressService::record(&deployment.db().pool, session.coach_id, client_id, &payload)
            .await?;
    Ok(ResponseJson(ApiResponse::success(metric)))
}

pub async fn metric_series(
    State(deployment): State<DeploymentImpl>,
    CurrentCoach(session): CurrentCoach,
    Path(client_id): Path<Uuid>,
) -> Result<ResponseJson<ApiResponse<Vec<MetricSeries>>>, ApiError> {
    let series =
        ProgressService::series(&deployment.db().pool, session.coach_id, client_id).await?;
    Ok(ResponseJson(ApiResponse::success(series)))
}

pub async fn delete_metric(
    State(deployment): State<DeploymentImpl>,
    CurrentCoach(session): CurrentCoach,
    Path(metric_id): Path<Uuid>,
) -> Result<ResponseJson<ApiResponse<()>>, ApiError> {
    ProgressService::delete(&deployment.db().pool, session.coach_id, metric_id).await?;
    Ok(ResponseJson(ApiResponse::success(())))
}

pub fn router(_deployment: &DeploymentImpl) -> Router<DeploymentImpl> {
    Router::new()
        .route(
            "/clients/{client_id}/metrics",
            get(list_metrics).post(record_metric),
        )
        .route("/clients/{client_id}/metrics/series", get(metric_series))
        .route("/metrics/{metric_id}", delete(delete_metric))
}
