//! Runtime configuration read from the environment.

use std::str::FromStr;

use secrecy::SecretString;
use serde::{Deserialize, Serialize};
use strum_macros::{Display, EnumString};
use thiserror::Error;
use ts_rs::TS;

const DEFAULT_DATABASE_URL: &str = "sqlite://coaching.db";
const DEFAULT_EMAIL_API_URL: &str = "https://api.resend.com";
const DEFAULT_EMAIL_FROM: &str = "Coaching <noreply@coaching.app>";
const DEFAULT_PUBLIC_APP_URL: &str = "http://localhost:5173";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("missing required environment variable {0}")]
    Missing(&'static str),
    #[error("invalid value for {key}: {value}")]
    Invalid { key: &'static str, value: String },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, EnumString, Display)]
#[strum(serialize_all = "lowercase", ascii_case_insensitive)]
pub enum LogFormat {
    #[default]
    Text,
    Json,
}

#[derive(Debug, Clone)]
pub struct EmailConfig {
    pub api_url: String,
    /// Without a key every send is logged as failed instead of attempted.
    pub api_key: Option<SecretString>,
    pub from: String,
}

#[derive(Debug, Clone)]
pub struct Config {
    pub database_url: String,
    pub host: String,
    pub port: u16,
    pub jwt_secret: SecretString,
    pub session_ttl_hours: i64,
    pub public_app_url: String,
    pub email: EmailConfig,
    pub billing_webhook_secret: Option<SecretString>,
    pub route_preview_enabled: bool,
    pub cors_origins: Vec<String>,
    /// Requests per second across the API; 0 disables the limiter.
    pub rate_limit: u32,
    pub portal_attempts_per_minute: u32,
    pub log_format: LogFormat,
    pub sentry_dsn: Option<String>,
}

/// The part of the configuration the browser app is allowed to see.
#[derive(Debug, Clone, Serialize, Deserialize, TS)]
pub struct PublicConfig {
    pub route_preview_enabled: bool,
    pub public_app_url: String,
}

impl Config {
    /// Load `.env` if present, then read the process environment.
    pub fn from_env() -> Result<Self, ConfigError> {
        let _ = dotenvy::dotenv();
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        let jwt_secret = get("JWT_SECRET").ok_or(ConfigError::Missing("JWT_SECRET"))?;
        let public_app_url = get("PUBLIC_APP_URL")
            .unwrap_or_else(|| DEFAULT_PUBLIC_APP_URL.to_string())
            .trim_end_matches('/')
            .to_string();

        Ok(Self {
            database_url: get("DATABASE_URL").unwrap_or_else(|| DEFAULT_DATABASE_URL.to_string()),
            host: get("HOST").unwrap_or_else(|| "127.0.0.1".to_string()),
            port: parse_or(get("PORT"), "PORT", 3000)?,
            jwt_secret: SecretString::from(jwt_secret),
            session_ttl_hours: parse_or(get("SESSION_TTL_HOURS"), "SESSION_TTL_HOURS", 168)?,
            public_app_url,
            email: EmailConfig {
                api_url: get("EMAIL_API_URL")
                    .unwrap_or_else(|| DEFAULT_EMAIL_API_URL.to_string())
                    .trim_end_matches('/')
                    .to_string(),
                api_key: get("EMAIL_API_KEY").map(SecretString::from),
                from: get("EMAIL_FROM").unwrap_or_else(|| DEFAULT_EMAIL_FROM.to_string()),
            },
            billing_webhook_secret: get("BILLING_WEBHOOK_SECRET").map(SecretString::from),
            route_preview_enabled: parse_bool(get("ROUTE_PREVIEW_ENABLED"), "ROUTE_PREVIEW_ENABLED")?,
            cors_origins: get("CORS_ORIGINS")
                .map(|v| {
                    v.split(',')
                        .map(|o| o.trim().to_string())
                        .filter(|o| !o.is_empty())
                        .collect()
                })
                .unwrap_or_default(),
            rate_limit: parse_or(get("RATE_LIMIT"), "RATE_LIMIT", 0)?,
            portal_attempts_per_minute: parse_or(
                get("PORTAL_ATTEMPTS_PER_MINUTE"),
                "PORTAL_ATTEMPTS_PER_MINUTE",
                10,
            )?,
            log_format: parse_or(get("LOG_FORMAT"), "LOG_FORMAT", LogFormat::Text)?,
            sentry_dsn: get("SENTRY_DSN"),
        })
    }

    pub fn public(&self) -> PublicConfig {
        PublicConfig {
            route_preview_enabled: self.route_preview_enabled,
            public_app_url: self.public_app_url.clone(),
        }
    }

    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

fn parse_or<T: FromStr>(value: Option<String>, key: &'static str, default: T) -> Result<T, ConfigError> {
    match value {
        None => Ok(default),
        Some(v) => v
            .trim()
            .parse()
            .map_err(|_| ConfigError::Invalid { key, value: v }),
    }
}

fn parse_bool(value: Option<String>, key: &'static str) -> Result<bool, ConfigError> {
    match value.as_deref().map(|v| v.trim().to_ascii_lowercase()) {
        None => Ok(false),
        Some(v) => match v.as_str() {
            "1" | "true" | "yes" | "on" => Ok(true),
            "0" | "false" | "no" | "off" => Ok(false),
            _ => Err(ConfigError::Invalid { key, value: v }),
        },
    }
}
