//! Startup check that the schema the services rely on is in place.

use sqlx::SqlitePool;
use thiserror::Error;
use tracing::{info, warn};

/// Tables every service expects to exist.
pub const REQUIRED_TABLES: &[&str] = &[
    "coaches",
    "coach_sessions",
    "coach_profiles",
    "clients",
    "workouts",
    "exercises",
    "progress_metrics",
    "client_portals",
    "messages",
    "notifications",
    "email_logs",
    "subscriptions",
    "billing_events",
];

#[derive(Debug, Error)]
pub enum DatabaseValidationError {
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
}

pub struct DatabaseValidator {
    pool: SqlitePool,
}

impl DatabaseValidator {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Check that migrations ran and every required table exists.
    pub async fn validate(&self) -> Result<ValidationResult, DatabaseValidationError> {
        let migrations_table_exists = sqlx::query_scalar::<_, i64>(
            "SELECT COUNT(*) FROM sqlite_master WHERE type='table' AND name='_sqlx_migrations'",
        )
        .fetch_one(&self.pool)
        .await?
            > 0;

        if !migrations_table_exists {
            warn!("Database not initialized - _sqlx_migrations table does not exist");
            return Ok(ValidationResult {
                is_initialized: false,
                migrations_applied: 0,
                latest_migration: None,
                missing_tables: REQUIRED_TABLES.iter().map(|t| t.to_string()).collect(),
            });
        }

        let migrations_applied = sqlx::query_scalar::<_, i64>(
            "SELECT COUNT(*) FROM _sqlx_migrations WHERE success = 1",
        )
        .fetch_one(&self.pool)
        .await?;
        let latest_migration = self.get_latest_migration().await?;
        let missing_tables = self.validate_tables(REQUIRED_TABLES).await?;

        if missing_tables.is_empty() {
            info!(
                migrations_applied,
                latest_migration = latest_migration.as_deref().unwrap_or("none"),
                "Database validation complete"
            );
        } else {
            warn!(missing = ?missing_tables, "Database is missing required tables");
        }

        Ok(ValidationResult {
            is_initialized: true,
            migrations_applied: migrations_applied as usize,
            latest_migration,
            missing_tables,
        })
    }

    /// Names from `required_tables` that do not exist.
    pub async fn validate_tables(
        &self,
        required_tables: &[&str],
    ) -> Result<Vec<String>, DatabaseValidationError> {
        let mut missing_tables = Vec::new();

        for table in required_tables {
            let exists = sqlx::query_scalar::<_, i64>(
                "SELECT COUNT(*) FROM sqlite_master WHERE type='table' AND name=?",
            )
            .bind(table)
            .fetch_one(&self.pool)
            .await?
                > 0;

            if !exists {
                missing_tables.push(table.to_string());
            }
        }

        Ok(missing_tables)
    }

    pub async fn get_latest_migration(&self) -> Result<Option<String>, DatabaseValidationError> {
        let migration = sqlx::query_scalar::<_, String>(
            "SELECT description FROM _sqlx_migrations WHERE success = 1 ORDER BY version DESC LIMIT 1",
        )
        .fetch_optional(&self.pool)
        .await?;

        Ok(migration)
    }
}

#[derive(Debug, Clone)]
pub struct ValidationResult {
    pub is_initialized: bool,
    pub migrations_applied: usize,
    pub latest_migration: Option<String>,
    pub missing_tables: Vec<String>,
}

impl ValidationResult {
    pub fn is_ok(&self) -> bool {
        self.is_initialized && self.missing_tables.is_empty()
    }

    pub fn summary(&self) -> String {
        if !self.is_initialized {
            "Database not initialized - migrations need to be run".to_string()
        } else if !self.missing_tables.is_empty() {
            format!("Database is missing tables: {}", self.missing_tables.join(", "))
        } else {
            format!("Database OK - {} migrations applied", self.migrations_applied)
        }
    }
}

#[cfg(test)]
mod tests {
    use db::DBService;

    use super::*;

    #[tokio::test]
    async fn migrated_database_passes() {
        let db = DBService::new_in_memory().await.unwrap();
        let result = DatabaseValidator::new(db.pool.clone()).validate().await.unwrap();

        assert!(result.is_ok(), "{}", result.summary());
        assert_eq!(result.migrations_applied, 2);
        assert_eq!(result.latest_migration.as_deref(), Some("billing mirror"));
    }

    #[tokio::test]
    async fn dropped_table_is_reported() {
        let db = DBService::new_in_memory().await.unwrap();
        sqlx::query("DROP TABLE billing_events")
            .execute(&db.pool)
            .await
            .unwrap();

        let result = DatabaseValidator::new(db.pool.clone()).validate().await.unwrap();
        assert!(!result.is_ok());
        assert_eq!(result.missing_tables, vec!["billing_events".to_string()]);
    }
}
