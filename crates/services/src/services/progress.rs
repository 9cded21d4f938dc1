use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use db::models::{
    client::Client,
    progress_metric::{CreateProgressMetric, MetricType, ProgressMetric},
};
use serde::{Deserialize, Serialize};
use sqlx::SqlitePool;
use thiserror::Error;
use ts_rs::TS;
use uuid::Uuid;
use validator::Validate;

#[derive(Debug, Error)]
pub enum ProgressError {
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
    #[error("validation error: {0}")]
    Validation(#[from] validator::ValidationErrors),
    #[error("value must be a finite, non-negative number")]
    InvalidValue,
    #[error("client not found")]
    ClientNotFound,
    #[error("metric not found")]
    NotFound,
}

/// First and latest reading of one metric type, for the progress screen.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
pub struct MetricSeries {
    pub metric_type: MetricType,
    pub unit: String,
    pub first_value: f64,
    pub latest_value: f64,
    pub change: f64,
    pub readings: usize,
    pub latest_recorded_at: DateTime<Utc>,
}

pub struct ProgressService;

impl ProgressService {
    pub async fn record(
        pool: &SqlitePool,
        coach_id: Uuid,
        client_id: Uuid,
        data: &CreateProgressMetric,
    ) -> Result<ProgressMetric, ProgressError> {
        if !data.value.is_finite() || data.value < 0.0 {
            return Err(ProgressError::InvalidValue);
        }
        data.validate()?;
        Self::owned_client(pool, coach_id, client_id).await?;
        Ok(ProgressMetric::create(pool, client_id, coach_id, data).await?)
    }

    pub async fn list(
        pool: &SqlitePool,
        coach_id: Uuid,
        client_id: Uuid,
        metric_type: Option<MetricType>,
    ) -> Result<Vec<ProgressMetric>, ProgressError> {
        Self::owned_client(pool, coach_id, client_id).await?;
        Ok(ProgressMetric::find_by_client_id(pool, client_id, metric_type).await?)
    }

    pub async fn delete(pool: &SqlitePool, coach_id: Uuid, metric_id: Uuid) -> Result<(), ProgressError> {
        ProgressMetric::find_for_coach(pool, coach_id, metric_id)
            .await?
            .ok_or(ProgressError::NotFound)?;
        ProgressMetric::delete(pool, metric_id).await?;
        Ok(())
    }

    pub async fn series(
        pool: &SqlitePool,
        coach_id: Uuid,
        client_id: Uuid,
    ) -> Result<Vec<MetricSeries>, ProgressError> {
        let metrics = Self::list(pool, coach_id, client_id, None).await?;
        Ok(summarize(&metrics))
    }

    async fn owned_client(pool: &SqlitePool, coach_id: Uuid, client_id: Uuid) -> Result<Client, ProgressError> {
        Client::find_for_coach(pool, coach_id, client_id)
            .await?
            .ok_or(ProgressError::ClientNotFound)
    }
}

/// `metrics` must be ordered by `recorded_at`.
pub fn summarize(metrics: &[ProgressMetric]) -> Vec<MetricSeries> {
    let mut by_type: BTreeMap<MetricType, Vec<&ProgressMetric>> = BTreeMap::new();
    for metric in metrics {
        by_type.entry(metric.metric_type).or_default().push(metric);
    }
    by_type
        .into_iter()
        .filter_map(|(metric_type, readings)| {
            let first = readings.first()?;
            let latest = readings.last()?;
            Some(MetricSeries {
                metric_type,
                unit: latest.unit.clone(),
                first_value: first.value,
                latest_value: latest.value,
                change: latest.value - first.value,
                readings: readings.len(),
                latest_recorded_at: latest.recorded_at,
            })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use chrono::Duration;
    use db::DBService;

    use super::*;
    use crate::services::testing::{seed_client, seed_coach};

    fn reading(metric_type: MetricType, value: f64, days_ago: i64) -> CreateProgressMetric {
        CreateProgressMetric {
            metric_type,
            value,
            unit: None,
            notes: None,
            recorded_at: Some(Utc::now() - Duration::days(days_ago)),
        }
    }

    #[tokio::test]
    async fn record_defaults_unit_and_rejects_negative_values() {
        let db = DBService::new_in_memory().await.unwrap();
        let coach = seed_coach(&db.pool, "a@example.com").await;
        let client = seed_client(&db.pool, coach.id, "Sam").await;

        let metric = ProgressService::record(&db.pool, coach.id, client.id, &reading(MetricType::BodyFat, 18.0, 0))
            .await
            .unwrap();
        assert_eq!(metric.unit, "%");

        let err = ProgressService::record(&db.pool, coach.id, client.id, &reading(MetricType::Weight, -1.0, 0))
            .await
            .unwrap_err();
        assert!(matches!(err, ProgressError::InvalidValue));
    }

    #[tokio::test]
    async fn series_summarizes_each_type() {
        let db = DBService::new_in_memory().await.unwrap();
        let coach = seed_coach(&db.pool, "a@example.com").await;
        let client = seed_client(&db.pool, coach.id, "Sam").await;
        for data in [
            reading(MetricType::Weight, 82.0, 30),
            reading(MetricType::Waist, 90.0, 20),
            reading(MetricType::Weight, 79.5, 1),
        ] {
            ProgressService::record(&db.pool, coach.id, client.id, &data).await.unwrap();
        }

        let series = ProgressService::series(&db.pool, coach.id, client.id).await.unwrap();
        assert_eq!(series.len(), 2);
        let weight = &series[0];
        assert_eq!(weight.metric_type, MetricType::Weight);
        assert_eq!(weight.unit, "kg");
        assert_eq!(weight.readings, 2);
        assert!((weight.change - -2.5).abs() < f64::EPSILON);
        assert_eq!(series[1].metric_type, MetricType::Waist);

        let only_waist = ProgressService::list(&db.pool, coach.id, client.id, Some(MetricType::Waist))
            .await
            .unwrap();
        assert_eq!(only_waist.len(), 1);
    }

    #[tokio::test]
    async fn another_coach_cannot_delete_a_metric() {
        let db = DBService::new_in_memory().await.unwrap();
        let coach = seed_coach(&db.pool, "a@example.com").await;
        let other = seed_coach(&db.pool, "b@example.com").await;
        let client = seed_client(&db.pool, coach.id, "Sam").await;
        let metric = ProgressService::record(&db.pool, coach.id, client.id, &reading(MetricType::Arms, 35.0, 0))
            .await
            .unwrap();

        let err = ProgressService::delete(&db.pool, other.id, metric.id).await.unwrap_err();
        assert!(matches!(err, ProgressError::NotFound));
        ProgressService::delete(&db.pool, coach.id, metric.id).await.unwrap();
    }
}
