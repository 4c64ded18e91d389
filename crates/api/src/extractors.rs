//! Request extractors.

use axum::{
    async_trait,
    extract::FromRequestParts,
    http::{header, request::Parts},
};

use analytics_core::{Role, UserIdentity};

use crate::response::ApiError;
use crate::state::AppState;

/// Authenticated context from request.
///
/// Verifies the bearer token from the `Authorization` header against the
/// shared signing keys; the same verification backs the realtime handshake.
#[derive(Debug, Clone)]
pub struct AuthContext {
    pub identity: UserIdentity,
}

impl AuthContext {
    pub fn require_admin(&self) -> Result<(), ApiError> {
        if self.identity.role == Role::Admin {
            Ok(())
        } else {
            Err(ApiError::forbidden("Admin role required"))
        }
    }
}

#[async_trait]
impl FromRequestParts<AppState> for AuthContext {
    type Rejection = ApiError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let token = parts
            .headers
            .get(header::AUTHORIZATION)
            .and_then(|h| h.to_str().ok())
            .ok_or_else(|| ApiError::unauthorized("Missing Authorization header"))?;

        let identity = state.keys.verify(token)?;

        Ok(AuthContext { identity })
    }
}

/// Client IP address, used to backfill location data the client omitted.
#[derive(Debug, Clone)]
pub struct ClientIp(pub Option<String>);

#[async_trait]
impl<S> FromRequestParts<S> for ClientIp
where
    S: Send + Sync,
{
    type Rejection = std::convert::Infallible;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        // X-Forwarded-For first (proxied requests), first hop in the chain
        if let Some(xff) = parts.headers.get("X-Forwarded-For") {
            if let Ok(xff_str) = xff.to_str() {
                if let Some(ip) = xff_str.split(',').next() {
                    return Ok(ClientIp(Some(ip.trim().to_string())));
                }
            }
        }

        if let Some(real_ip) = parts.headers.get("X-Real-IP") {
            if let Ok(ip) = real_ip.to_str() {
                return Ok(ClientIp(Some(ip.to_string())));
            }
        }

        Ok(ClientIp(None))
    }
}
