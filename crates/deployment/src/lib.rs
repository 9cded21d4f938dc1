use async_trait::async_trait;
use db::DBService;
use services::services::{
    auth::AuthService,
    billing::BillingService,
    config::{Config, ConfigError},
    database_validator::{DatabaseValidationError, DatabaseValidator},
    email::{EmailError, PortalEmailService},
    events::EventService,
    messaging::MessagingService,
    notification::NotificationService,
    portal::PortalService,
    workout_completion::WorkoutCompletionService,
};
use thiserror::Error;
use tracing::info;

#[derive(Debug, Error)]
pub enum DeploymentError {
    #[error(transparent)]
    Database(#[from] sqlx::Error),
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error(transparent)]
    Email(#[from] EmailError),
    #[error(transparent)]
    DatabaseValidation(#[from] DatabaseValidationError),
    #[error("database schema check failed: {0}")]
    Schema(String),
}

/// Everything a running server hands to its routes.
#[async_trait]
pub trait Deployment: Clone + Send + Sync + 'static {
    async fn new(config: Config) -> Result<Self, DeploymentError>;

    fn config(&self) -> &Config;

    fn db(&self) -> &DBService;

    fn events(&self) -> &EventService;

    fn auth(&self) -> &AuthService;

    fn notifications(&self) -> &NotificationService;

    fn messaging(&self) -> &MessagingService;

    fn portals(&self) -> &PortalService;

    fn portal_email(&self) -> &PortalEmailService;

    fn workout_completion(&self) -> &WorkoutCompletionService;

    fn billing(&self) -> &BillingService;

    /// Refuse to serve against a database missing tables the routes need.
    async fn validate_database(&self) -> Result<(), DeploymentError> {
        let result = DatabaseValidator::new(self.db().pool.clone()).validate().await?;
        if !result.is_ok() {
            return Err(DeploymentError::Schema(result.summary()));
        }
        info!("{}", result.summary());
        Ok(())
    }
}
