use axum::Router;

use crate::DeploymentImpl;

pub mod auth;
pub mod billing;
pub mod clients;
pub mod config;
pub mod dashboard;
pub mod email_logs;
pub mod feed;
pub mod functions;
pub mod health;
pub mod messages;
pub mod metrics;
pub mod notifications;
pub mod portal;
pub mod profile;
pub mod workouts;

pub fn router(deployment: &DeploymentImpl) -> Router<DeploymentImpl> {
    let api = Router::new()
        .merge(health::router(deployment))
        .merge(config::router(deployment))
        .merge(auth::router(deployment))
        .merge(clients::router(deployment))
        .merge(workouts::router(deployment))
        .merge(metrics::router(deployment))
        .merge(messages::router(deployment))
        .merge(notifications::router(deployment))
        .merge(portal::router(deployment))
        .merge(profile::router(deployment))
        .merge(email_logs::router(deployment))
        .merge(billing::router(deployment))
        .merge(dashboard::router(deployment));

    Router::new()
        .nest("/api", api)
        .nest("/functions/v1", functions::router(deployment))
}
