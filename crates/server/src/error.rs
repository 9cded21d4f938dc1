use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use services::services::{
    auth::AuthError, billing::BillingError, client_roster::RosterError,
    email::PortalEmailError, messaging::MessagingError, notification::NotificationError,
    portal::PortalError, profile::ProfileError, progress::ProgressError,
    workout_builder::WorkoutError, workout_completion::CompletionError,
};
use thiserror::Error;
use utils::response::ApiResponse;

#[derive(Debug, Error)]
pub enum ApiError {
    #[error(transparent)]
    Auth(#[from] AuthError),
    #[error(transparent)]
    Roster(#[from] RosterError),
    #[error(transparent)]
    Workout(#[from] WorkoutError),
    #[error(transparent)]
    Progress(#[from] ProgressError),
    #[error(transparent)]
    Messaging(#[from] MessagingError),
    #[error(transparent)]
    Notification(#[from] NotificationError),
    #[error(transparent)]
    Profile(#[from] ProfileError),
    #[error(transparent)]
    Portal(#[from] PortalError),
    #[error(transparent)]
    PortalEmail(#[from] PortalEmailError),
    #[error(transparent)]
    Completion(#[from] CompletionError),
    #[error(transparent)]
    Billing(#[from] BillingError),
    #[error(transparent)]
    Database(#[from] sqlx::Error),
    #[error("unauthorized")]
    Unauthorized,
}

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::Auth(err) => match err {
                AuthError::Validation(_) => StatusCode::BAD_REQUEST,
                AuthError::EmailTaken => StatusCode::CONFLICT,
                AuthError::InvalidCredentials | AuthError::InvalidSession => {
                    StatusCode::UNAUTHORIZED
                }
                AuthError::Database(_) | AuthError::Hash(_) | AuthError::Token(_) => {
                    StatusCode::INTERNAL_SERVER_ERROR
                }
            },
            ApiError::Roster(err) => match err {
                RosterError::Validation(_) => StatusCode::BAD_REQUEST,
                RosterError::NotFound => StatusCode::NOT_FOUND,
                RosterError::Database(_) => StatusCode::INTERNAL_SERVER_ERROR,
            },
            ApiError::Workout(err) => match err {
                WorkoutError::Validation(_)
                | WorkoutError::InvalidDraft(_)
                | WorkoutError::NoExercises
                | WorkoutError::NotAPermutation => StatusCode::BAD_REQUEST,
                WorkoutError::ClientNotFound | WorkoutError::NotFound => StatusCode::NOT_FOUND,
                WorkoutError::InvalidTransition { .. } => StatusCode::CONFLICT,
                WorkoutError::Database(_) => StatusCode::INTERNAL_SERVER_ERROR,
            },
            ApiError::Progress(err) => match err {
                ProgressError::Validation(_) | ProgressError::InvalidValue => {
                    StatusCode::BAD_REQUEST
                }
                ProgressError::ClientNotFound | ProgressError::NotFound => StatusCode::NOT_FOUND,
                ProgressError::Database(_) => StatusCode::INTERNAL_SERVER_ERROR,
            },
            ApiError::Messaging(err) => match err {
                MessagingError::Empty | MessagingError::TooLong => StatusCode::BAD_REQUEST,
                MessagingError::Database(_) => StatusCode::INTERNAL_SERVER_ERROR,
            },
            ApiError::Notification(err) => match err {
                NotificationError::NotFound => StatusCode::NOT_FOUND,
                NotificationError::Database(_) => StatusCode::INTERNAL_SERVER_ERROR,
            },
            ApiError::Profile(err) => profile_status(err),
            ApiError::Portal(err) => match err {
                PortalError::ClientNotFound | PortalError::NotFound => StatusCode::NOT_FOUND,
                PortalError::InvalidAccessCode => StatusCode::UNAUTHORIZED,
                PortalError::RateLimited => StatusCode::TOO_MANY_REQUESTS,
                PortalError::Profile(inner) => profile_status(inner),
                PortalError::Database(_) => StatusCode::INTERNAL_SERVER_ERROR,
            },
            ApiError::PortalEmail(err) => match err {
                PortalEmailError::Validation(_) | PortalEmailError::Delivery(_) => {
                    StatusCode::BAD_REQUEST
                }
                PortalEmailError::ClientNotFound => StatusCode::NOT_FOUND,
                PortalEmailError::Database(_) => StatusCode::INTERNAL_SERVER_ERROR,
            },
            ApiError::Completion(err) => match err {
                CompletionError::NotCompletable | CompletionError::FeedbackTooLong => {
                    StatusCode::BAD_REQUEST
                }
                CompletionError::ClientNotFound => StatusCode::NOT_FOUND,
                CompletionError::Database(_) => StatusCode::INTERNAL_SERVER_ERROR,
            },
            ApiError::Billing(err) => match err {
                BillingError::NotConfigured => StatusCode::SERVICE_UNAVAILABLE,
                BillingError::InvalidSignature
                | BillingError::StaleSignature
                | BillingError::Payload(_) => StatusCode::BAD_REQUEST,
                BillingError::Database(_) => StatusCode::INTERNAL_SERVER_ERROR,
            },
            ApiError::Database(_) => StatusCode::INTERNAL_SERVER_ERROR,
            ApiError::Unauthorized => StatusCode::UNAUTHORIZED,
        }
    }

    /// Message safe to show a caller. Server-side failures are logged, not echoed.
    pub fn public_message(&self) -> String {
        if self.status().is_server_error() {
            tracing::error!(error = %self, "Request failed");
            "Internal server error".to_string()
        } else {
            self.to_string()
        }
    }
}

fn profile_status(err: &ProfileError) -> StatusCode {
    match err {
        ProfileError::Validation(_) => StatusCode::BAD_REQUEST,
        ProfileError::CoachNotFound => StatusCode::NOT_FOUND,
        ProfileError::Database(_) => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        let message = self.public_message();
        (status, Json(ApiResponse::<()>::error(&message))).into_response()
    }
}
