/*!
 * # Authentication and Authorization
 *
 * Bearer JWT validation and role checks for the admin API. Tokens are issued by the
 * identity service; this crate only verifies them and exposes the caller as [`AuthUser`].
 */

use axum::{
    extract::{Request, State},
    http::{header, HeaderMap, StatusCode},
    middleware::Next,
    response::{IntoResponse, Response},
    Json,
};
use chrono::{Duration as ChronoDuration, Utc};
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use thiserror::Error;
use tracing::debug;
use uuid::Uuid;

pub mod roles {
    pub const SUPER_ADMIN: &str = "SUPER_ADMIN";
    pub const ADMIN: &str = "ADMIN";

    /// Roles allowed to manage orders and shipments
    pub const ORDER_MANAGERS: &[&str] = &[SUPER_ADMIN, ADMIN];
}

/// Claim structure for JWT tokens
#[derive(Debug, Serialize, Deserialize)]
pub struct Claims {
    pub sub: String,
    pub name: Option<String>,
    pub roles: Vec<String>,
    pub jti: String,
    pub iat: i64,
    pub exp: i64,
}

/// Authenticated caller extracted from the JWT
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuthUser {
    /// Actor id recorded in audit columns
    pub user_id: String,
    pub name: Option<String>,
    pub roles: Vec<String>,
    pub token_id: String,
}

impl AuthUser {
    pub fn has_role(&self, role: &str) -> bool {
        self.roles.iter().any(|r| r.eq_ignore_ascii_case(role))
    }

    pub fn has_any_role(&self, roles: &[&str]) -> bool {
        roles.iter().any(|role| self.has_role(role))
    }
}

#[derive(Clone, Debug)]
pub struct AuthConfig {
    pub jwt_secret: String,
    pub access_token_expiration: ChronoDuration,
}

impl AuthConfig {
    pub fn new(jwt_secret: impl Into<String>) -> Self {
        Self {
            jwt_secret: jwt_secret.into(),
            access_token_expiration: ChronoDuration::hours(1),
        }
    }
}

#[derive(Clone, Debug)]
pub struct AuthService {
    config: AuthConfig,
}

impl AuthService {
    pub fn new(config: AuthConfig) -> Self {
        Self { config }
    }

    /// Validate a JWT token and extract the claims
    pub fn validate_token(&self, token: &str) -> Result<Claims, AuthError> {
        let claims = decode::<Claims>(
            token,
            &DecodingKey::from_secret(self.config.jwt_secret.as_bytes()),
            &Validation::new(Algorithm::HS256),
        )
        .map_err(|e| match e.kind() {
            jsonwebtoken::errors::ErrorKind::ExpiredSignature => AuthError::TokenExpired,
            _ => AuthError::InvalidToken,
        })?
        .claims;

        if claims.sub.trim().is_empty() {
            return Err(AuthError::InvalidToken);
        }

        Ok(claims)
    }

    /// Signs an access token. Used by operational tooling and tests.
    pub fn issue_token(
        &self,
        user_id: &str,
        name: Option<&str>,
        roles: &[&str],
    ) -> Result<String, AuthError> {
        let now = Utc::now();
        let claims = Claims {
            sub: user_id.to_string(),
            name: name.map(str::to_string),
            roles: roles.iter().map(|r| r.to_string()).collect(),
            jti: Uuid::new_v4().to_string(),
            iat: now.timestamp(),
            exp: (now + self.config.access_token_expiration).timestamp(),
        };

        encode(
            &Header::new(Algorithm::HS256),
            &claims,
            &EncodingKey::from_secret(self.config.jwt_secret.as_bytes()),
        )
        .map_err(|e| AuthError::TokenCreation(e.to_string()))
    }
}

#[derive(Debug, Error)]
pub enum AuthError {
    #[error("Missing authentication")]
    MissingAuth,

    #[error("Invalid token")]
    InvalidToken,

    #[error("Token has expired")]
    TokenExpired,

    #[error("Token creation failed: {0}")]
    TokenCreation(String),

    #[error("Insufficient permissions")]
    InsufficientPermissions,
}

impl IntoResponse for AuthError {
    fn into_response(self) -> Response {
        let (status, error_code, error_message) = match &self {
            Self::MissingAuth => (
                StatusCode::UNAUTHORIZED,
                "AUTH_MISSING",
                "Authentication required".to_string(),
            ),
            Self::InvalidToken => (
                StatusCode::UNAUTHORIZED,
                "AUTH_INVALID_TOKEN",
                "Invalid authentication token".to_string(),
            ),
            Self::TokenExpired => (
                StatusCode::UNAUTHORIZED,
                "AUTH_TOKEN_EXPIRED",
                "Token has expired".to_string(),
            ),
            Self::TokenCreation(msg) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                "AUTH_TOKEN_CREATION_FAILED",
                msg.clone(),
            ),
            Self::InsufficientPermissions => (
                StatusCode::FORBIDDEN,
                "AUTH_INSUFFICIENT_PERMISSIONS",
                "Insufficient permissions".to_string(),
            ),
        };

        let body = Json(serde_json::json!({
            "error": {
                "code": error_code,
                "message": error_message,
            }
        }));

        (status, body).into_response()
    }
}

/// Requires the authenticated user to hold at least one of the given roles
pub async fn role_middleware(
    State(required_roles): State<Arc<Vec<String>>>,
    request: Request,
    next: Next,
) -> Result<Response, AuthError> {
    let user = request
        .extensions()
        .get::<AuthUser>()
        .ok_or(AuthError::MissingAuth)?;

    if !required_roles.iter().any(|role| user.has_role(role)) {
        debug!(user_id = %user.user_id, "role check failed");
        return Err(AuthError::InsufficientPermissions);
    }

    Ok(next.run(request).await)
}

/// Validates the bearer token and stores the caller as an [`AuthUser`] extension.
/// The [`AuthService`] is expected as an `Extension<Arc<AuthService>>` on the router.
pub async fn auth_middleware(mut request: Request, next: Next) -> Response {
    let auth_service = match request.extensions().get::<Arc<AuthService>>() {
        Some(service) => service.clone(),
        None => {
            return (
                StatusCode::INTERNAL_SERVER_ERROR,
                "Authentication service not available",
            )
                .into_response();
        }
    };

    match extract_auth_from_headers(request.headers(), &auth_service) {
        Ok(user) => {
            request.extensions_mut().insert(user);
            next.run(request).await
        }
        Err(e) => e.into_response(),
    }
}

fn extract_auth_from_headers(
    headers: &HeaderMap,
    auth_service: &AuthService,
) -> Result<AuthUser, AuthError> {
    let token = headers
        .get(header::AUTHORIZATION)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.strip_prefix("Bearer "))
        .map(str::trim)
        .filter(|token| !token.is_empty())
        .ok_or(AuthError::MissingAuth)?;

    let claims = auth_service.validate_token(token)?;

    Ok(AuthUser {
        user_id: claims.sub,
        name: claims.name,
        roles: claims.roles,
        token_id: claims.jti,
    })
}

/// Extension methods for Router to add auth middleware
pub trait AuthRouterExt {
    fn with_auth(self) -> Self;
    fn with_roles(self, roles: &[&str]) -> Self;
}

impl<S> AuthRouterExt for axum::Router<S>
where
    S: Clone + Send + Sync + 'static,
{
    fn with_auth(self) -> Self {
        self.layer(axum::middleware::from_fn(auth_middleware))
    }

    fn with_roles(self, roles: &[&str]) -> Self {
        let roles = Arc::new(roles.iter().map(|r| r.to_string()).collect::<Vec<_>>());
        self.layer(axum::middleware::from_fn_with_state(roles, role_middleware))
            .with_auth()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::{body::Body, http::Request as HttpRequest, routing::get, Extension, Router};
    use tower::ServiceExt;

    fn service() -> Arc<AuthService> {
        Arc::new(AuthService::new(AuthConfig::new(
            "unit_test_secret_with_enough_entropy_42",
        )))
    }

    fn app(auth: Arc<AuthService>) -> Router {
        Router::new()
            .route(
                "/",
                get(|Extension(user): Extension<AuthUser>| async move { user.user_id }),
            )
            .with_roles(roles::ORDER_MANAGERS)
            .layer(Extension(auth))
    }

    async fn status_for(auth: Arc<AuthService>, token: Option<String>) -> StatusCode {
        let mut builder = HttpRequest::builder().uri("/");
        if let Some(token) = token {
            builder = builder.header(header::AUTHORIZATION, format!("Bearer {}", token));
        }
        app(auth)
            .oneshot(builder.body(Body::empty()).unwrap())
            .await
            .unwrap()
            .status()
    }

    #[test]
    fn issued_token_round_trips_claims() {
        let auth = service();
        let token = auth
            .issue_token("user-1", Some("Rina"), &[roles::ADMIN])
            .unwrap();
        let claims = auth.validate_token(&token).unwrap();
        assert_eq!(claims.sub, "user-1");
        assert_eq!(claims.roles, vec!["ADMIN".to_string()]);
    }

    #[test]
    fn token_signed_with_other_secret_is_rejected() {
        let other = AuthService::new(AuthConfig::new("another_secret_value_that_differs_0987"));
        let token = other.issue_token("user-1", None, &[roles::ADMIN]).unwrap();
        assert!(matches!(
            service().validate_token(&token),
            Err(AuthError::InvalidToken)
        ));
    }

    #[tokio::test]
    async fn missing_token_is_unauthorized() {
        assert_eq!(status_for(service(), None).await, StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn wrong_role_is_forbidden() {
        let auth = service();
        let token = auth.issue_token("user-2", None, &["CASHIER"]).unwrap();
        assert_eq!(status_for(auth, Some(token)).await, StatusCode::FORBIDDEN);
    }

    #[tokio::test]
    async fn admin_role_is_allowed() {
        let auth = service();
        let token = auth.issue_token("user-3", None, &[roles::SUPER_ADMIN]).unwrap();
        assert_eq!(status_for(auth, Some(token)).await, StatusCode::OK);
    }
}
