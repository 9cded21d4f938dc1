//! Coach accounts and sign-in sessions.
//!
//! A session is a row in `coach_sessions` plus an HS256 token that names it.
//! Routes receive the resolved [`CoachSession`] explicitly; nothing about the
//! signed-in coach lives in global state.

use argon2::{
    Argon2,
    password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString},
};
use chrono::{DateTime, Duration, Utc};
use db::models::{
    coach::{Coach, CreateCoach},
    coach_profile::{CoachProfile, UpsertCoachProfile},
    coach_session::CoachSessionRecord,
};
use jsonwebtoken::{Algorithm, DecodingKey, EncodingKey, Header, Validation, decode, encode};
use rand::RngCore;
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use sqlx::SqlitePool;
use thiserror::Error;
use tracing::{info, warn};
use ts_rs::TS;
use uuid::Uuid;
use validator::Validate;

#[derive(Debug, Error)]
pub enum AuthError {
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
    #[error("validation error: {0}")]
    Validation(#[from] validator::ValidationErrors),
    #[error("an account with this email already exists")]
    EmailTaken,
    #[error("invalid email or password")]
    InvalidCredentials,
    #[error("invalid or expired session")]
    InvalidSession,
    #[error("password hashing failed: {0}")]
    Hash(String),
    #[error("token error: {0}")]
    Token(String),
}

/// The signed-in coach, resolved from a bearer token.
#[derive(Debug, Clone, Serialize, Deserialize, TS)]
pub struct CoachSession {
    pub coach_id: Uuid,
    pub session_id: Uuid,
    pub email: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, TS, Validate)]
pub struct SignupRequest {
    #[validate(email(message = "Invalid email address"))]
    pub email: String,
    #[validate(length(min = 8, max = 256, message = "Password must be at least 8 characters"))]
    pub password: String,
    #[validate(length(min = 1, max = 200, message = "Name is required"))]
    pub full_name: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, TS)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, TS)]
pub struct SignedIn {
    pub token: String,
    pub expires_at: DateTime<Utc>,
    pub coach: Coach,
}

#[derive(Debug, Serialize, Deserialize)]
struct Claims {
    sub: Uuid,
    sid: Uuid,
    email: String,
    iat: i64,
    exp: i64,
}

#[derive(Clone)]
pub struct AuthService {
    jwt_secret: SecretString,
    session_ttl: Duration,
}

impl AuthService {
    pub fn new(jwt_secret: SecretString, session_ttl_hours: i64) -> Self {
        Self {
            jwt_secret,
            session_ttl: Duration::hours(session_ttl_hours.max(1)),
        }
    }

    pub async fn signup(
        &self,
        pool: &SqlitePool,
        request: &SignupRequest,
    ) -> Result<SignedIn, AuthError> {
        request.validate()?;
        let email = normalize_email(&request.email);
        if Coach::find_by_email(pool, &email).await?.is_some() {
            return Err(AuthError::EmailTaken);
        }

        let password_hash = hash_password(&request.password)?;
        let full_name = request.full_name.trim().to_string();
        let coach = Coach::create(
            pool,
            Uuid::new_v4(),
            &CreateCoach {
                email,
                password_hash,
                full_name: full_name.clone(),
            },
        )
        .await
        .map_err(|e| match &e {
            sqlx::Error::Database(db) if db.is_unique_violation() => AuthError::EmailTaken,
            _ => AuthError::Database(e),
        })?;

        CoachProfile::upsert(
            pool,
            coach.id,
            &UpsertCoachProfile {
                display_name: full_name,
                bio: None,
                specialties: None,
                avatar_url: None,
                phone: None,
                website: None,
            },
        )
        .await?;

        info!(coach_id = %coach.id, "Coach signed up");
        self.open_session(pool, coach).await
    }

    pub async fn login(
        &self,
        pool: &SqlitePool,
        request: &LoginRequest,
    ) -> Result<SignedIn, AuthError> {
        let email = normalize_email(&request.email);
        let Some(coach) = Coach::find_by_email(pool, &email).await? else {
            return Err(AuthError::InvalidCredentials);
        };
        if !verify_password(&request.password, &coach.password_hash) {
            warn!(coach_id = %coach.id, "Rejected sign-in with wrong password");
            return Err(AuthError::InvalidCredentials);
        }
        self.open_session(pool, coach).await
    }

    pub async fn logout(&self, pool: &SqlitePool, session: &CoachSession) -> Result<(), AuthError> {
        let revoked = CoachSessionRecord::revoke(pool, session.session_id).await?;
        info!(coach_id = %session.coach_id, revoked, "Coach signed out");
        Ok(())
    }

    /// Resolve a bearer token into a live session.
    pub async fn authenticate(
        &self,
        pool: &SqlitePool,
        token: &str,
    ) -> Result<CoachSession, AuthError> {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.leeway = 0;
        let claims = decode::<Claims>(
            token,
            &DecodingKey::from_secret(self.jwt_secret.expose_secret().as_bytes()),
            &validation,
        )
        .map_err(|_| AuthError::InvalidSession)?
        .claims;

        let record = CoachSessionRecord::find_by_id(pool, claims.sid)
            .await?
            .filter(|s| s.coach_id == claims.sub && s.is_active(Utc::now()))
            .ok_or(AuthError::InvalidSession)?;

        Ok(CoachSession {
            coach_id: record.coach_id,
            session_id: record.id,
            email: claims.email,
        })
    }

    async fn open_session(&self, pool: &SqlitePool, coach: Coach) -> Result<SignedIn, AuthError> {
        let now = Utc::now();
        let expires_at = now + self.session_ttl;
        let record = CoachSessionRecord::create(pool, coach.id, expires_at).await?;
        let claims = Claims {
            sub: coach.id,
            sid: record.id,
            email: coach.email.clone(),
            iat: now.timestamp(),
            exp: expires_at.timestamp(),
        };
        let token = encode(
            &Header::new(Algorithm::HS256),
            &claims,
            &EncodingKey::from_secret(self.jwt_secret.expose_secret().as_bytes()),
        )
        .map_err(|e| AuthError::Token(e.to_string()))?;

        Ok(SignedIn {
            token,
            expires_at,
            coach,
        })
    }
}

fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}

fn hash_password(password: &str) -> Result<String, AuthError> {
    let mut salt_bytes = [0u8; 16];
    rand::thread_rng().fill_bytes(&mut salt_bytes);
    let salt = SaltString::encode_b64(&salt_bytes).map_err(|e| AuthError::Hash(e.to_string()))?;
    Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map(|hash| hash.to_string())
        .map_err(|e| AuthError::Hash(e.to_string()))
}

fn verify_password(password: &str, hash: &str) -> bool {
    PasswordHash::new(hash)
        .map(|parsed| {
            Argon2::default()
                .verify_password(password.as_bytes(), &parsed)
                .is_ok()
        })
        .unwrap_or(false)
}

#[cfg(test)]
mod tests {
    use db::DBService;

    use super::*;

    fn service() -> AuthService {
        AuthService::new(SecretString::from("test-secret".to_string()), 24)
    }

    fn signup_request() -> SignupRequest {
        SignupRequest {
            email: "Coach@Example.com".to_string(),
            password: "correct horse".to_string(),
            full_name: "Casey Coach".to_string(),
        }
    }

    #[tokio::test]
    async fn signup_then_authenticate() {
        let db = DBService::new_in_memory().await.unwrap();
        let auth = service();

        let signed_in = auth.signup(&db.pool, &signup_request()).await.unwrap();
        assert_eq!(signed_in.coach.email, "coach@example.com");

        let session = auth.authenticate(&db.pool, &signed_in.token).await.unwrap();
        assert_eq!(session.coach_id, signed_in.coach.id);

        let profile = CoachProfile::find_by_coach_id(&db.pool, signed_in.coach.id)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(profile.display_name, "Casey Coach");
    }

    #[tokio::test]
    async fn duplicate_email_is_rejected() {
        let db = DBService::new_in_memory().await.unwrap();
        let auth = service();
        auth.signup(&db.pool, &signup_request()).await.unwrap();

        let err = auth.signup(&db.pool, &signup_request()).await.unwrap_err();
        assert!(matches!(err, AuthError::EmailTaken));
    }

    #[tokio::test]
    async fn wrong_password_and_unknown_email_look_the_same() {
        let db = DBService::new_in_memory().await.unwrap();
        let auth = service();
        auth.signup(&db.pool, &signup_request()).await.unwrap();

        let wrong = auth
            .login(
                &db.pool,
                &LoginRequest {
                    email: "coach@example.com".to_string(),
                    password: "nope nope".to_string(),
                },
            )
            .await
            .unwrap_err();
        let unknown = auth
            .login(
                &db.pool,
                &LoginRequest {
                    email: "ghost@example.com".to_string(),
                    password: "correct horse".to_string(),
                },
            )
            .await
            .unwrap_err();
        assert_eq!(wrong.to_string(), unknown.to_string());
    }

    #[tokio::test]
    async fn logout_revokes_the_token() {
        let db = DBService::new_in_memory().await.unwrap();
        let auth = service();
        let signed_in = auth.signup(&db.pool, &signup_request()).await.unwrap();
        let session = auth.authenticate(&db.pool, &signed_in.token).await.unwrap();

        auth.logout(&db.pool, &session).await.unwrap();

        let err = auth.authenticate(&db.pool, &signed_in.token).await.unwrap_err();
        assert!(matches!(err, AuthError::InvalidSession));
    }

    #[tokio::test]
    async fn token_signed_with_another_secret_is_rejected() {
        let db = DBService::new_in_memory().await.unwrap();
        let signed_in = service().signup(&db.pool, &signup_request()).await.unwrap();
        let other = AuthService::new(SecretString::from("other".to_string()), 24);

        assert!(other.authenticate(&db.pool, &signed_in.token).await.is_err());
    }
}
