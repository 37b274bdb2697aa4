//! Bearer-token guard for the admin API.

use crate::config::AdminConfig;
use axum::async_trait;
use axum::extract::{FromRef, FromRequestParts};
use axum::http::{header::AUTHORIZATION, request::Parts};
use secrecy::ExposeSecret;
use service_core::error::AppError;
use subtle::ConstantTimeEq;

/// Proof that the request carried the configured admin token.
#[derive(Debug, Clone, Copy)]
pub struct AdminContext;

fn bearer_token(parts: &Parts) -> Option<&str> {
    parts
        .headers
        .get(AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
        .map(str::trim)
}

#[async_trait]
impl<S> FromRequestParts<S> for AdminContext
where
    S: Send + Sync,
    AdminConfig: FromRef<S>,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let config = AdminConfig::from_ref(state);
        let expected = config.api_token.expose_secret();

        // An unset token disables the admin API entirely.
        if expected.is_empty() {
            return Err(AppError::Unauthorized(anyhow::anyhow!(
                "Admin API is not enabled"
            )));
        }

        let provided = bearer_token(parts).ok_or_else(|| {
            AppError::Unauthorized(anyhow::anyhow!("Missing admin bearer token"))
        })?;

        if provided.as_bytes().ct_eq(expected.as_bytes()).into() {
            Ok(AdminContext)
        } else {
            tracing::warn!("Rejected admin request with invalid token");
            Err(AppError::Unauthorized(anyhow::anyhow!("Invalid admin token")))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::Request;
    use secrecy::Secret;

    #[derive(Clone)]
    struct State(AdminConfig);

    impl FromRef<State> for AdminConfig {
        fn from_ref(state: &State) -> Self {
            state.0.clone()
        }
    }

    async fn extract(token: &str, header: Option<&str>) -> Result<AdminContext, AppError> {
        let state = State(AdminConfig {
            api_token: Secret::new(token.to_string()),
        });
        let mut builder = Request::builder().uri("/admin/subscriptions/sync");
        if let Some(value) = header {
            builder = builder.header(AUTHORIZATION, value);
        }
        let (mut parts, _) = builder.body(()).unwrap().into_parts();
        AdminContext::from_request_parts(&mut parts, &state).await
    }

    #[tokio::test]
    async fn accepts_matching_token() {
        assert!(extract("s3cret", Some("Bearer s3cret")).await.is_ok());
    }

    #[tokio::test]
    async fn rejects_wrong_or_missing_token() {
        assert!(extract("s3cret", Some("Bearer nope")).await.is_err());
        assert!(extract("s3cret", Some("s3cret")).await.is_err());
        assert!(extract("s3cret", None).await.is_err());
    }

    #[tokio::test]
    async fn empty_configured_token_disables_admin() {
        let err = extract("", Some("Bearer ")).await.unwrap_err();
        assert!(matches!(err, AppError::Unauthorized(_)));
    }
}
