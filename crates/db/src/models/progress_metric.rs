use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{Executor, FromRow, Sqlite, SqlitePool, Type};
use strum_macros::{Display, EnumIter, EnumString};
use ts_rs::TS;
use uuid::Uuid;
use validator::Validate;

#[derive(
    Debug,
    Clone,
    Copy,
    Type,
    Serialize,
    Deserialize,
    PartialEq,
    Eq,
    Hash,
    PartialOrd,
    Ord,
    TS,
    EnumString,
    EnumIter,
    Display,
)]
#[sqlx(type_name = "metric_type", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum MetricType {
    Weight,
    BodyFat,
    Chest,
    Waist,
    Hips,
    Arms,
    Thighs,
}

impl MetricType {
    pub fn default_unit(self) -> &'static str {
        match self {
            MetricType::Weight => "kg",
            MetricType::BodyFat => "%",
            _ => "cm",
        }
    }
}

#[derive(Debug, Clone, FromRow, Serialize, Deserialize, TS)]
pub struct ProgressMetric {
    pub id: Uuid,
    pub client_id: Uuid,
    pub coach_id: Uuid,
    pub metric_type: MetricType,
    pub value: f64,
    pub unit: String,
    pub notes: Option<String>,
    pub recorded_at: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize, TS, Validate)]
pub struct CreateProgressMetric {
    pub metric_type: MetricType,
    #[validate(range(min = 0.0, max = 10000.0, message = "Value must be a non-negative number"))]
    pub value: f64,
    #[validate(length(min = 1, max = 16))]
    pub unit: Option<String>,
    #[validate(length(max = 1000))]
    pub notes: Option<String>,
    pub recorded_at: Option<DateTime<Utc>>,
}

impl ProgressMetric {
    pub async fn create(
        pool: &SqlitePool,
        client_id: Uuid,
        coach_id: Uuid,
        data: &CreateProgressMetric,
    ) -> Result<Self, sqlx::Error> {
        let now = Utc::now();
        let unit = data
            .unit
            .clone()
            .unwrap_or_else(|| data.metric_type.default_unit().to_string());
        sqlx::query_as::<_, ProgressMetric>(
            r#"INSERT INTO progress_metrics (id, client_id, coach_id, metric_type, value, unit, notes, recorded_at, created_at)
               VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
               RETURNING *"#,
        )
        .bind(Uuid::new_v4())
        .bind(client_id)
        .bind(coach_id)
        .bind(data.metric_type)
        .bind(data.value)
        .bind(unit)
        .bind(&data.notes)
        .bind(data.recorded_at.unwrap_or(now))
        .bind(now)
        .fetch_one(pool)
        .await
    }

    pub async fn find_by_client_id(
        pool: &SqlitePool,
        client_id: Uuid,
        metric_type: Option<MetricType>,
    ) -> Result<Vec<Self>, sqlx::Error> {
        sqlx::query_as::<_, ProgressMetric>(
            r#"SELECT * FROM progress_metrics
               WHERE client_id = $1
                 AND ($2 IS NULL OR metric_type = $2)
               ORDER BY recorded_at ASC, rowid ASC"#,
        )
        .bind(client_id)
        .bind(metric_type)
        .fetch_all(pool)
        .await
    }

    pub async fn find_for_coach(
        pool: &SqlitePool,
        coach_id: Uuid,
        id: Uuid,
    ) -> Result<Option<Self>, sqlx::Error> {
        sqlx::query_as::<_, ProgressMetric>(
            "SELECT * FROM progress_metrics WHERE id = $1 AND coach_id = $2",
        )
        .bind(id)
        .bind(coach_id)
        .fetch_optional(pool)
        .await
    }

    pub async fn delete(pool: &SqlitePool, id: Uuid) -> Result<u64, sqlx::Error> {
        let result = sqlx::query("DELETE FROM progress_metrics WHERE id = $1")
            .bind(id)
            .execute(pool)
            .await?;
        Ok(result.rows_affected())
    }

    pub async fn delete_by_client_id<'e, E>(executor: E, client_id: Uuid) -> Result<u64, sqlx::Error>
    where
        E: Executor<'e, Database = Sqlite>,
    {
        let result = sqlx::query("DELETE FROM progress_metrics WHERE client_id = $1")
            .bind(client_id)
            .execute(executor)
            .await?;
        Ok(result.rows_affected())
    }
}
