//! Identity types resolved by the external auth collaborator.

use serde::{Deserialize, Serialize};

/// Role carried by the bearer credential.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Admin,
    User,
}

impl Role {
    pub fn is_admin(&self) -> bool {
        matches!(self, Self::Admin)
    }
}

/// Verified identity attached to an authenticated request or channel.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UserIdentity {
    /// External-identity id (canonical key for distinct-user aggregation)
    pub id: String,
    pub email: String,
    pub role: Role,
}

/// JWT claims for the bearer credential shared by REST and the realtime
/// channel.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuthClaims {
    /// User id
    pub sub: String,
    pub email: String,
    pub role: Role,
    /// Expiry (seconds since epoch)
    pub exp: i64,
}

impl AuthClaims {
    pub fn identity(&self) -> UserIdentity {
        UserIdentity {
            id: self.sub.clone(),
            email: self.email.clone(),
            role: self.role,
        }
    }
}
