use std::sync::Arc;

use async_trait::async_trait;
use db::DBService;
use deployment::{Deployment, DeploymentError};
use services::services::{
    auth::AuthService,
    billing::BillingService,
    config::Config,
    email::{EmailClient, Mailer, PortalEmailService},
    events::EventService,
    messaging::MessagingService,
    notification::NotificationService,
    portal::PortalService,
    workout_completion::WorkoutCompletionService,
};
use tracing::{info, warn};

/// Single-process deployment: one SQLite database, an in-process change feed
/// and the HTTP mailer.
#[derive(Clone)]
pub struct LocalDeployment {
    config: Arc<Config>,
    db: DBService,
    events: EventService,
    auth: AuthService,
    notifications: NotificationService,
    messaging: MessagingService,
    portals: PortalService,
    portal_email: PortalEmailService,
    workout_completion: WorkoutCompletionService,
    billing: BillingService,
}

impl LocalDeployment {
    /// Wire the services around an already opened database and a mailer.
    pub fn with_parts(config: Config, db: DBService, mailer: Arc<dyn Mailer>) -> Self {
        let events = EventService::default();
        let notifications = NotificationService::new(events.clone());
        Self {
            auth: AuthService::new(config.jwt_secret.clone(), config.session_ttl_hours),
            messaging: MessagingService::new(events.clone(), notifications.clone()),
            portals: PortalService::new(
                &config.public_app_url,
                config.portal_attempts_per_minute,
                notifications.clone(),
            ),
            portal_email: PortalEmailService::new(mailer, config.email.from.clone(), events.clone()),
            workout_completion: WorkoutCompletionService::new(notifications.clone()),
            billing: BillingService::new(config.billing_webhook_secret.clone()),
            notifications,
            events,
            db,
            config: Arc::new(config),
        }
    }
}

#[async_trait]
impl Deployment for LocalDeployment {
    async fn new(config: Config) -> Result<Self, DeploymentError> {
        let db = DBService::new(&config.database_url).await?;
        if config.email.api_key.is_none() {
            warn!("EMAIL_API_KEY is not set; portal emails will be logged as failed");
        }
        let mailer = Arc::new(EmailClient::new(&config.email)?);
        let deployment = Self::with_parts(config, db, mailer);
        info!(database_url = %deployment.config.database_url, "Local deployment ready");
        Ok(deployment)
    }

    fn config(&self) -> &Config {
        &self.config
    }

    fn db(&self) -> &DBService {
        &self.db
    }

    fn events(&self) -> &EventService {
        &self.events
    }

    fn auth(&self) -> &AuthService {
        &self.auth
    }

    fn notifications(&self) -> &NotificationService {
        &self.notifications
    }

    fn messaging(&self) -> &MessagingService {
        &self.messaging
    }

    fn portals(&self) -> &PortalService {
        &self.portals
    }

    fn portal_email(&self) -> &PortalEmailService {
        &self.portal_email
    }

    fn workout_completion(&self) -> &WorkoutCompletionService {
        &self.workout_completion
    }

    fn billing(&self) -> &BillingService {
        &self.billing
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn opens_a_file_database_and_validates_it() {
        let dir = tempfile::tempdir().unwrap();
        let url = format!("sqlite://{}", dir.path().join("coaching.db").display());
        let config = Config::from_lookup(|key| match key {
            "JWT_SECRET" => Some("test".to_string()),
            "DATABASE_URL" => Some(url.clone()),
            _ => None,
        })
        .unwrap();

        let deployment = LocalDeployment::new(config).await.unwrap();
        deployment.validate_database().await.unwrap();
        assert!(dir.path().join("coaching.db").exists());
    }
}
