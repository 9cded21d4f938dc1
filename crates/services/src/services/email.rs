//! Transactional email: an HTTP client for a Resend-compatible API and the
//! portal invitation email built on top of it.

use std::{sync::Arc, time::Duration};

use async_trait::async_trait;
use backon::{ExponentialBuilder, Retryable};
use db::models::{
    client::Client,
    email_log::{CreateEmailLog, EmailLog, EmailStatus},
};
use reqwest::StatusCode;
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use sqlx::SqlitePool;
use thiserror::Error;
use tokio::sync::Mutex;
use tracing::{info, warn};
use ts_rs::TS;
use uuid::Uuid;
use validator::Validate;

use super::{
    config::EmailConfig,
    events::{ChangeKind, EventService, RecordChange},
};

#[derive(Debug, Clone, Error)]
pub enum EmailError {
    #[error("network error: {0}")]
    Transport(String),
    #[error("timeout")]
    Timeout,
    #[error("http {status}: {body}")]
    Http { status: u16, body: String },
    #[error("rate limited")]
    RateLimited,
    #[error("invalid email api key")]
    InvalidApiKey,
    #[error("json error: {0}")]
    Serde(String),
    #[error("email delivery is not configured: EMAIL_API_KEY is not set")]
    MissingApiKey,
}

impl EmailError {
    /// Returns true if the error is transient and should be retried.
    pub fn should_retry(&self) -> bool {
        match self {
            Self::Transport(_) | Self::Timeout | Self::RateLimited => true,
            Self::Http { status, .. } => (500..=599).contains(status),
            _ => false,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct OutgoingEmail {
    pub from: String,
    pub to: Vec<String>,
    pub subject: String,
    pub html: String,
}

#[derive(Debug, Deserialize)]
struct SendResponse {
    id: String,
}

#[async_trait]
pub trait Mailer: Send + Sync {
    /// Deliver one email and return the provider's message id. Calls with the
    /// same `idempotency_key` deliver at most once.
    async fn send(&self, email: &OutgoingEmail, idempotency_key: &str) -> Result<String, EmailError>;
}

#[derive(Debug, Clone)]
pub struct EmailClient {
    http: reqwest::Client,
    api_url: String,
    api_key: Option<SecretString>,
}

impl EmailClient {
    const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

    pub fn new(config: &EmailConfig) -> Result<Self, EmailError> {
        let http = reqwest::Client::builder()
            .timeout(Self::REQUEST_TIMEOUT)
            .user_agent(concat!("coaching-server/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| EmailError::Transport(e.to_string()))?;

        Ok(Self {
            http,
            api_url: config.api_url.clone(),
            api_key: config.api_key.clone(),
        })
    }

    async fn send_request(
        &self,
        api_key: &SecretString,
        email: &OutgoingEmail,
        idempotency_key: &str,
    ) -> Result<String, EmailError> {
        let res = self
            .http
            .post(format!("{}/emails", self.api_url))
            .bearer_auth(api_key.expose_secret())
            .header("Idempotency-Key", idempotency_key)
            .json(email)
            .send()
            .await
            .map_err(map_reqwest_error)?;

        match res.status() {
            s if s.is_success() => res
                .json::<SendResponse>()
                .await
                .map(|r| r.id)
                .map_err(|e| EmailError::Serde(e.to_string())),
            StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => Err(EmailError::InvalidApiKey),
            StatusCode::TOO_MANY_REQUESTS => Err(EmailError::RateLimited),
            s => {
                let status = s.as_u16();
                let body = res.text().await.unwrap_or_default();
                Err(EmailError::Http { status, body })
            }
        }
    }
}

#[async_trait]
impl Mailer for EmailClient {
    async fn send(&self, email: &OutgoingEmail, idempotency_key: &str) -> Result<String, EmailError> {
        let api_key = self.api_key.as_ref().ok_or(EmailError::MissingApiKey)?;

        (|| async { self.send_request(api_key, email, idempotency_key).await })
            .retry(
                ExponentialBuilder::default()
                    .with_min_delay(Duration::from_millis(500))
                    .with_max_delay(Duration::from_secs(10))
                    .with_max_times(3)
                    .with_jitter(),
            )
            .when(|e: &EmailError| e.should_retry())
            .notify(|e, dur| {
                warn!(
                    "Email API call failed, retrying after {:.2}s: {}",
                    dur.as_secs_f64(),
                    e
                )
            })
            .await
    }
}

fn map_reqwest_error(e: reqwest::Error) -> EmailError {
    if e.is_timeout() {
        EmailError::Timeout
    } else {
        EmailError::Transport(e.to_string())
    }
}

/// Records every email instead of sending it. Used by tests and local setups.
#[derive(Debug, Clone, Default)]
pub struct MemoryMailer {
    sent: Arc<Mutex<Vec<OutgoingEmail>>>,
    fail_with: Option<EmailError>,
}

impl MemoryMailer {
    pub fn failing(error: EmailError) -> Self {
        Self {
            sent: Arc::default(),
            fail_with: Some(error),
        }
    }

    pub async fn sent(&self) -> Vec<OutgoingEmail> {
        self.sent.lock().await.clone()
    }
}

#[async_trait]
impl Mailer for MemoryMailer {
    async fn send(&self, email: &OutgoingEmail, idempotency_key: &str) -> Result<String, EmailError> {
        if let Some(error) = &self.fail_with {
            return Err(error.clone());
        }
        self.sent.lock().await.push(email.clone());
        Ok(format!("memory-{idempotency_key}"))
    }
}

/// Body of the `send-portal-email` function.
#[derive(Debug, Clone, Serialize, Deserialize, TS, Validate)]
#[serde(rename_all = "camelCase")]
pub struct PortalEmailRequest {
    pub client_id: Uuid,
    #[validate(email(message = "Invalid client email"))]
    pub client_email: String,
    #[validate(length(min = 1, max = 200, message = "Client name is required"))]
    pub client_name: String,
    #[validate(url(message = "Invalid portal URL"))]
    pub portal_url: String,
    #[validate(length(min = 1, max = 200, message = "Coach name is required"))]
    pub coach_name: String,
}

#[derive(Debug, Error)]
pub enum PortalEmailError {
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
    #[error("validation error: {0}")]
    Validation(#[from] validator::ValidationErrors),
    #[error("client not found")]
    ClientNotFound,
    #[error("failed to send email: {0}")]
    Delivery(EmailError),
}

pub fn render_portal_email(request: &PortalEmailRequest) -> (String, String) {
    let coach = html_escape::encode_text(request.coach_name.trim());
    let client = html_escape::encode_text(request.client_name.trim());
    let href = html_escape::encode_double_quoted_attribute(&request.portal_url);
    let subject = format!("{} shared your client portal", request.coach_name.trim());
    let html = format!(
        r#"<!DOCTYPE html>
<html>
  <body style="font-family: Arial, sans-serif; color: #1f2937; max-width: 560px; margin: 0 auto;">
    <h1 style="font-size: 22px;">Hi {client},</h1>
    <p>{coach} has set up your personal client portal. Use it to see your workouts, log completions and follow your progress.</p>
    <p style="margin: 32px 0;">
      <a href="{href}" style="background: #2563eb; color: #ffffff; padding: 12px 20px; border-radius: 6px; text-decoration: none;">Open my portal</a>
    </p>
    <p style="font-size: 13px; color: #6b7280;">This link contains your access code. Keep it private.</p>
  </body>
</html>"#
    );
    (subject, html)
}

#[derive(Clone)]
pub struct PortalEmailService {
    mailer: Arc<dyn Mailer>,
    from: String,
    events: EventService,
}

impl PortalEmailService {
    pub fn new(mailer: Arc<dyn Mailer>, from: impl Into<String>, events: EventService) -> Self {
        Self {
            mailer,
            from: from.into(),
            events,
        }
    }

    /// Send the portal link to a client and log the outcome either way.
    pub async fn send_portal_email(
        &self,
        pool: &SqlitePool,
        coach_id: Uuid,
        request: &PortalEmailRequest,
    ) -> Result<EmailLog, PortalEmailError> {
        request.validate()?;
        let client: Client = Client::find_for_coach(pool, coach_id, request.client_id)
            .await?
            .ok_or(PortalEmailError::ClientNotFound)?;

        let (subject, html) = render_portal_email(request);
        let email = OutgoingEmail {
            from: self.from.clone(),
            to: vec![request.client_email.trim().to_string()],
            subject: subject.clone(),
            html,
        };
        let idempotency_key = format!("portal-email-{}", Uuid::new_v4());
        let outcome = self.mailer.send(&email, &idempotency_key).await;

        let (status, provider_message_id, error_message) = match &outcome {
            Ok(id) => (EmailStatus::Sent, Some(id.clone()), None),
            Err(e) => (EmailStatus::Failed, None, Some(e.to_string())),
        };
        let log = EmailLog::create(
            pool,
            &CreateEmailLog {
                coach_id,
                client_id: Some(client.id),
                recipient: request.client_email.trim().to_string(),
                subject,
                status,
                provider_message_id,
                error_message,
            },
        )
        .await?;
        self.events
            .publish(RecordChange::email_log(ChangeKind::Insert, &log));

        match outcome {
            Ok(_) => {
                info!(coach_id = %coach_id, client_id = %client.id, "Portal email sent");
                Ok(log)
            }
            Err(e) => {
                warn!(coach_id = %coach_id, client_id = %client.id, error = %e, "Portal email failed");
                Err(PortalEmailError::Delivery(e))
            }
        }
    }

    pub async fn history(pool: &SqlitePool, coach_id: Uuid, limit: i64) -> Result<Vec<EmailLog>, PortalEmailError> {
        Ok(EmailLog::find_by_coach_id(pool, coach_id, limit.clamp(1, 500)).await?)
    }
}

#[cfg(test)]
mod tests {
    use db::DBService;

    use super::*;
    use crate::services::testing::{seed_client, seed_coach};

    fn request(client_id: Uuid) -> PortalEmailRequest {
        PortalEmailRequest {
            client_id,
            client_email: "sam@example.com".to_string(),
            client_name: "Sam <script>".to_string(),
            portal_url: "https://coach.app/client-portal/x?code=AB23CD45".to_string(),
            coach_name: "Casey & Co".to_string(),
        }
    }

    #[test]
    fn errors_retry_only_when_transient() {
        assert!(EmailError::Timeout.should_retry());
        assert!(EmailError::Http { status: 503, body: String::new() }.should_retry());
        assert!(!EmailError::Http { status: 422, body: String::new() }.should_retry());
        assert!(!EmailError::InvalidApiKey.should_retry());
    }

    #[test]
    fn rendered_email_escapes_names() {
        let (subject, html) = render_portal_email(&request(Uuid::new_v4()));
        assert_eq!(subject, "Casey & Co shared your client portal");
        assert!(html.contains("Sam &lt;script&gt;"));
        assert!(html.contains("Casey &amp; Co"));
        assert!(html.contains(r#"href="https://coach.app/client-portal/x?code=AB23CD45""#));
    }

    #[test]
    fn request_uses_camel_case() {
        let body = serde_json::json!({
            "clientId": Uuid::nil(),
            "clientEmail": "sam@example.com",
            "clientName": "Sam",
            "portalUrl": "https://coach.app/p",
            "coachName": "Casey",
        });
        let parsed: PortalEmailRequest = serde_json::from_value(body).unwrap();
        assert_eq!(parsed.client_name, "Sam");
    }

    #[tokio::test]
    async fn sent_email_is_logged() {
        let db = DBService::new_in_memory().await.unwrap();
        let coach = seed_coach(&db.pool, "a@example.com").await;
        let client = seed_client(&db.pool, coach.id, "Sam").await;
        let mailer = MemoryMailer::default();
        let service = PortalEmailService::new(Arc::new(mailer.clone()), "Coach <c@x.com>", EventService::default());

        let log = service
            .send_portal_email(&db.pool, coach.id, &request(client.id))
            .await
            .unwrap();

        assert_eq!(log.status, EmailStatus::Sent);
        assert!(log.provider_message_id.unwrap().starts_with("memory-"));
        let sent = mailer.sent().await;
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].to, vec!["sam@example.com".to_string()]);
    }

    #[tokio::test]
    async fn failed_delivery_is_logged_as_failed() {
        let db = DBService::new_in_memory().await.unwrap();
        let coach = seed_coach(&db.pool, "a@example.com").await;
        let client = seed_client(&db.pool, coach.id, "Sam").await;
        let service = PortalEmailService::new(
            Arc::new(MemoryMailer::failing(EmailError::InvalidApiKey)),
            "Coach <c@x.com>",
            EventService::default(),
        );

        let err = service
            .send_portal_email(&db.pool, coach.id, &request(client.id))
            .await
            .unwrap_err();
        assert!(matches!(err, PortalEmailError::Delivery(EmailError::InvalidApiKey)));

        let history = PortalEmailService::history(&db.pool, coach.id, 10).await.unwrap();
        assert_eq!(history.len(), 1);
        assert_eq!(history[0].status, EmailStatus::Failed);
        assert!(history[0].error_message.is_some());
    }

    #[tokio::test]
    async fn client_of_another_coach_is_refused_without_sending() {
        let db = DBService::new_in_memory().await.unwrap();
        let coach = seed_coach(&db.pool, "a@example.com").await;
        let other = seed_coach(&db.pool, "b@example.com").await;
        let client = seed_client(&db.pool, other.id, "Sam").await;
        let mailer = MemoryMailer::default();
        let service = PortalEmailService::new(Arc::new(mailer.clone()), "c@x.com", EventService::default());

        let err = service
            .send_portal_email(&db.pool, coach.id, &request(client.id))
            .await
            .unwrap_err();
        assert!(matches!(err, PortalEmailError::ClientNotFound));
        assert!(mailer.sent().await.is_empty());
    }

    #[tokio::test]
    async fn missing_api_key_fails_without_network() {
        let client = EmailClient::new(&EmailConfig {
            api_url: "http://127.0.0.1:9".to_string(),
            api_key: None,
            from: "c@x.com".to_string(),
        })
        .unwrap();
        let email = OutgoingEmail {
            from: "c@x.com".to_string(),
            to: vec!["sam@example.com".to_string()],
            subject: "Hi".to_string(),
            html: "<p>Hi</p>".to_string(),
        };
        assert!(matches!(
            client.send(&email, "k").await,
            Err(EmailError::MissingApiKey)
        ));
    }
}
