//! Bearer-credential verification shared by REST and the realtime channel.

use chrono::{Duration, Utc};
use jsonwebtoken::{decode, encode, DecodingKey, EncodingKey, Header, Validation};

use analytics_core::{AuthClaims, Error, Result, UserIdentity};

/// JWT keys for the shared bearer credential.
///
/// The identity provider issuing these tokens is an external collaborator;
/// this side only needs to verify them (and mint them in tests and local
/// runs).
pub struct AuthKeys {
    encoding: EncodingKey,
    decoding: DecodingKey,
    validation: Validation,
}

impl AuthKeys {
    pub fn new(secret: &str) -> Self {
        Self {
            encoding: EncodingKey::from_secret(secret.as_bytes()),
            decoding: DecodingKey::from_secret(secret.as_bytes()),
            validation: Validation::default(),
        }
    }

    /// Verifies a raw token (with or without a `Bearer ` prefix) and returns
    /// the identity it carries.
    pub fn verify(&self, token: &str) -> Result<UserIdentity> {
        let token = token.strip_prefix("Bearer ").unwrap_or(token).trim();
        if token.is_empty() {
            return Err(Error::unauthorized("missing token"));
        }
        let data = decode::<AuthClaims>(token, &self.decoding, &self.validation)
            .map_err(|e| Error::unauthorized(format!("invalid or expired token: {e}")))?;
        Ok(data.claims.identity())
    }

    /// Mints a token for the given identity.
    pub fn issue(&self, identity: &UserIdentity, ttl: Duration) -> Result<String> {
        let claims = AuthClaims {
            sub: identity.id.clone(),
            email: identity.email.clone(),
            role: identity.role,
            exp: (Utc::now() + ttl).timestamp(),
        };
        encode(&Header::default(), &claims, &self.encoding)
            .map_err(|e| Error::internal(format!("failed to sign token: {e}")))
    }
}
