//! Resolves the signed-in coach for coach-only routes.

use axum::{
    extract::{FromRequestParts, Query},
    http::{header, request::Parts},
};
use deployment::Deployment;
use serde::Deserialize;
use services::services::auth::CoachSession;

use crate::{DeploymentImpl, error::ApiError};

/// The authenticated coach. Taking it as a handler argument makes the route
/// coach-only.
#[derive(Debug, Clone)]
pub struct CurrentCoach(pub CoachSession);

#[derive(Debug, Deserialize)]
struct AccessTokenQuery {
    access_token: Option<String>,
}

/// Bearer header first; `?access_token=` for EventSource, which cannot set
/// headers.
fn bearer_token(parts: &Parts) -> Option<String> {
    let from_header = parts
        .headers
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
        .map(str::trim)
        .filter(|t| !t.is_empty())
        .map(str::to_string);

    from_header.or_else(|| {
        Query::<AccessTokenQuery>::try_from_uri(&parts.uri)
            .ok()
            .and_then(|q| q.0.access_token)
            .filter(|t| !t.is_empty())
    })
}

impl FromRequestParts<DeploymentImpl> for CurrentCoach {
    type Rejection = ApiError;

    async fn from_request_parts(
        parts: &mut Parts,
        deployment: &DeploymentImpl,
    ) -> Result<Self, Self::Rejection> {
        let Some(token) = bearer_token(parts) else {
            tracing::debug!(path = %parts.uri.path(), "Missing bearer token");
            return Err(ApiError::Unauthorized);
        };
        let session = deployment
            .auth()
            .authenticate(&deployment.db().pool, &token)
            .await?;
        Ok(CurrentCoach(session))
    }
}

#[cfg(test)]
mod tests {
    use axum::http::Request;

    use super::*;

    fn parts(request: Request<()>) -> Parts {
        request.into_parts().0
    }

    #[test]
    fn reads_the_bearer_header() {
        let p = parts(
            Request::get("/api/clients")
                .header(header::AUTHORIZATION, "Bearer abc.def")
                .body(())
                .unwrap(),
        );
        assert_eq!(bearer_token(&p).as_deref(), Some("abc.def"));
    }

    #[test]
    fn falls_back_to_the_query_string() {
        let p = parts(
            Request::get("/api/notifications/stream?access_token=xyz")
                .body(())
                .unwrap(),
        );
        assert_eq!(bearer_token(&p).as_deref(), Some("xyz"));
    }

    #[test]
    fn rejects_other_schemes() {
        let p = parts(
            Request::get("/api/clients")
                .header(header::AUTHORIZATION, "Basic Zm9v")
                .body(())
                .unwrap(),
        );
        assert_eq!(bearer_token(&p), None);
    }
}
