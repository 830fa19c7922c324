//! Caller identity.
//!
//! The router asks an [`AuthService`] to resolve each request into an
//! [`AuthContext`] and stores it as a request extension. Handlers only ever
//! see the resolved context.
//!
//! The shipped [`GatewayHeaderAuth`] trusts identity headers set by an
//! upstream gateway that has already verified the caller:
//!
//! ```text
//! x-tenant-id: 5f1c...      (UUID)
//! x-user-roles: portfolio.viewer,portfolio.admin
//! x-user-id: user-123       (optional)
//! x-gateway-token: ...      (required when auth.gateway_token is set)
//! ```

use async_trait::async_trait;
use axum::{
    extract::{Request, State},
    http::HeaderMap,
    middleware::Next,
    response::{IntoResponse, Response},
};
use refdata_core::AuthContext;
use thiserror::Error;
use tracing::warn;
use uuid::Uuid;

use crate::error::ApiError;
use crate::state::AppState;

pub const TENANT_HEADER: &str = "x-tenant-id";
pub const ROLES_HEADER: &str = "x-user-roles";
pub const USER_HEADER: &str = "x-user-id";
pub const GATEWAY_TOKEN_HEADER: &str = "x-gateway-token";

#[derive(Debug, Error, PartialEq, Eq)]
pub enum AuthError {
    #[error("missing {0} header")]
    MissingHeader(&'static str),
    #[error("{0} is not a valid tenant id")]
    InvalidTenant(String),
    #[error("gateway token rejected")]
    GatewayToken,
}

#[async_trait]
pub trait AuthService: Send + Sync {
    async fn verify(&self, headers: &HeaderMap) -> Result<AuthContext, AuthError>;
}

#[derive(Debug, Clone, Default)]
pub struct GatewayHeaderAuth {
    gateway_token: Option<String>,
}

impl GatewayHeaderAuth {
    /// `gateway_token`, when set, must match the `x-gateway-token` header.
    #[must_use]
    pub fn new(gateway_token: Option<String>) -> Self {
        Self { gateway_token }
    }
}

fn header<'a>(headers: &'a HeaderMap, name: &'static str) -> Option<&'a str> {
    headers
        .get(name)
        .and_then(|v| v.to_str().ok())
        .map(str::trim)
        .filter(|v| !v.is_empty())
}

#[async_trait]
impl AuthService for GatewayHeaderAuth {
    async fn verify(&self, headers: &HeaderMap) -> Result<AuthContext, AuthError> {
        if let Some(expected) = &self.gateway_token {
            match header(headers, GATEWAY_TOKEN_HEADER) {
                Some(token) if token == expected => {}
                _ => return Err(AuthError::GatewayToken),
            }
        }

        let raw_tenant =
            header(headers, TENANT_HEADER).ok_or(AuthError::MissingHeader(TENANT_HEADER))?;
        let tenant_id = Uuid::parse_str(raw_tenant)
            .map_err(|_| AuthError::InvalidTenant(raw_tenant.to_string()))?;

        let roles = header(headers, ROLES_HEADER)
            .map(|v| {
                v.split(',')
                    .map(str::trim)
                    .filter(|r| !r.is_empty())
                    .map(String::from)
                    .collect()
            })
            .unwrap_or_default();

        let mut ctx = AuthContext::new(tenant_id, roles);
        if let Some(user) = header(headers, USER_HEADER) {
            ctx = ctx.with_user(user);
        }
        Ok(ctx)
    }
}

/// Resolves the caller or answers 401.
pub async fn require_auth(State(state): State<AppState>, mut request: Request, next: Next) -> Response {
    match state.auth.verify(request.headers()).await {
        Ok(ctx) => {
            request.extensions_mut().insert(ctx);
            next.run(request).await
        }
        Err(err) => {
            warn!(path = %request.uri().path(), reason = %err, "Rejected unauthenticated request");
            ApiError::Unauthorized.into_response()
        }
    }
}

/// # Errors
/// Returns [`ApiError::Forbidden`] unless the caller is a viewer or admin.
pub fn ensure_viewer(ctx: &AuthContext) -> Result<(), ApiError> {
    if ctx.can_view() {
        Ok(())
    } else {
        Err(ApiError::Forbidden)
    }
}

/// # Errors
/// Returns [`ApiError::Forbidden`] unless the caller is an admin.
pub fn ensure_admin(ctx: &AuthContext) -> Result<(), ApiError> {
    if ctx.is_admin() {
        Ok(())
    } else {
        Err(ApiError::Forbidden)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    fn headers(pairs: &[(&'static str, &str)]) -> HeaderMap {
        let mut map = HeaderMap::new();
        for (name, value) in pairs {
            map.insert(*name, HeaderValue::from_str(value).unwrap());
        }
        map
    }

    #[tokio::test]
    async fn resolves_tenant_roles_and_user() {
        let tenant = Uuid::new_v4().to_string();
        let ctx = GatewayHeaderAuth::default()
            .verify(&headers(&[
                (TENANT_HEADER, &tenant),
                (ROLES_HEADER, "portfolio.viewer, portfolio.admin"),
                (USER_HEADER, "user-7"),
            ]))
            .await
            .unwrap();
        assert_eq!(ctx.tenant_id.to_string(), tenant);
        assert!(ctx.is_admin());
        assert_eq!(ctx.user_id.as_deref(), Some("user-7"));
    }

    #[tokio::test]
    async fn rejects_missing_or_malformed_tenant() {
        let auth = GatewayHeaderAuth::default();
        assert_eq!(
            auth.verify(&HeaderMap::new()).await,
            Err(AuthError::MissingHeader(TENANT_HEADER))
        );
        assert!(matches!(
            auth.verify(&headers(&[(TENANT_HEADER, "acme")])).await,
            Err(AuthError::InvalidTenant(_))
        ));
    }

    #[tokio::test]
    async fn enforces_gateway_token_when_configured() {
        let auth = GatewayHeaderAuth::new(Some("s3cret".to_string()));
        let tenant = Uuid::new_v4().to_string();
        assert_eq!(
            auth.verify(&headers(&[(TENANT_HEADER, &tenant)])).await,
            Err(AuthError::GatewayToken)
        );
        assert!(auth
            .verify(&headers(&[(TENANT_HEADER, &tenant), (GATEWAY_TOKEN_HEADER, "s3cret")]))
            .await
            .is_ok());
    }

    #[test]
    fn role_checks() {
        let viewer = AuthContext::new(Uuid::new_v4(), vec!["portfolio.viewer".to_string()]);
        assert!(ensure_viewer(&viewer).is_ok());
        assert!(matches!(ensure_admin(&viewer), Err(ApiError::Forbidden)));
    }
}
