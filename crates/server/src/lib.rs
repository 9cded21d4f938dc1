pub mod error;
pub mod middleware;
pub mod routes;

use axum::{
    Router,
    extract::DefaultBodyLimit,
    http::{HeaderValue, Method, header},
    middleware as axum_middleware,
};
use deployment::Deployment;
use local_deployment::LocalDeployment;
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing::{info, warn};

pub type DeploymentImpl = LocalDeployment;

const BODY_LIMIT_BYTES: usize = 2 * 1024 * 1024;

/// The full HTTP surface: coach API, public portal API, function endpoints.
pub fn app(deployment: DeploymentImpl) -> Router {
    let config = deployment.config();
    let cors = if config.cors_origins.is_empty() {
        cors_layer(std::slice::from_ref(&config.public_app_url))
    } else {
        cors_layer(&config.cors_origins)
    };
    let rate_limit = config.rate_limit;

    let mut router = routes::router(&deployment);

    if rate_limit > 0 {
        info!(requests_per_second = rate_limit, "Rate limiting enabled");
        router = router.layer(axum_middleware::from_fn_with_state(
            middleware::rate_limit::create_rate_limiter(rate_limit),
            middleware::rate_limit::rate_limit_middleware,
        ));
    }

    router
        .layer(DefaultBodyLimit::max(BODY_LIMIT_BYTES))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(deployment)
}

fn cors_layer(origins: &[String]) -> CorsLayer {
    let allowed: Vec<HeaderValue> = origins
        .iter()
        .filter_map(|origin| match origin.parse::<HeaderValue>() {
            Ok(value) => Some(value),
            Err(e) => {
                warn!(%origin, error = %e, "Ignoring invalid CORS origin");
                None
            }
        })
        .collect();

    CorsLayer::new()
        .allow_origin(allowed)
        .allow_methods([
            Method::GET,
            Method::POST,
            Method::PUT,
            Method::DELETE,
            Method::OPTIONS,
        ])
        .allow_headers([header::CONTENT_TYPE, header::AUTHORIZATION])
}
