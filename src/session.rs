//! Session resolution: bearer token to request-scoped [`Identity`]
//!
//! Token issuance lives outside this crate. This side only decodes: a token is
//! the URL-safe base64 encoding of a JSON claims object. Claims are read
//! verbatim into the identity with no re-derivation from the database, so a
//! role or active-flag change after issuance is invisible until re-login.

use crate::error::{GateError, Result};
use crate::types::{Identity, OrgScope, Role, UserId};
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine as _;
use chrono::Utc;
use serde::{Deserialize, Serialize};
use tracing::debug;

/// Claims carried by a portal session token
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionClaims {
    /// Subject: the user the session was issued for
    pub sub: UserId,

    /// Role at issuance time
    pub role: Role,

    /// Active flag at issuance time
    pub active: bool,

    /// Organizational scope, absent for top-level accounts
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub org_scope: Option<OrgScope>,

    /// Expiry as seconds since epoch; absent means no expiry
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub exp: Option<i64>,
}

impl SessionClaims {
    /// Claims for a fresh identity without expiry
    pub fn new(sub: UserId, role: Role, active: bool) -> Self {
        Self {
            sub,
            role,
            active,
            org_scope: None,
            exp: None,
        }
    }

    /// Attach an organizational scope
    pub fn with_org_scope(mut self, scope: impl Into<OrgScope>) -> Self {
        self.org_scope = Some(scope.into());
        self
    }

    /// Attach an expiry timestamp (seconds since epoch)
    pub fn with_expiry(mut self, exp: i64) -> Self {
        self.exp = Some(exp);
        self
    }

    /// Encode these claims as a wire token.
    ///
    /// Used by tests and local tooling; production tokens come from the
    /// external session issuer.
    pub fn encode(&self) -> String {
        let json = serde_json::to_vec(self).expect("claims serialize to JSON");
        URL_SAFE_NO_PAD.encode(json)
    }
}

/// Resolve a bearer token into a request-scoped identity.
///
/// Fails with [`GateError::Unauthenticated`] when the token is absent, cannot
/// be decoded, or carries an expiry in the past. Pure read, no side effects.
pub fn resolve(token: Option<&str>) -> Result<Identity> {
    let token = token.ok_or(GateError::Unauthenticated)?;

    let bytes = URL_SAFE_NO_PAD.decode(token).map_err(|e| {
        debug!("session token base64 decode failed: {}", e);
        GateError::Unauthenticated
    })?;

    let claims: SessionClaims = serde_json::from_slice(&bytes).map_err(|e| {
        debug!("session claims parse failed: {}", e);
        GateError::Unauthenticated
    })?;

    if let Some(exp) = claims.exp {
        if exp <= Utc::now().timestamp() {
            debug!("session token expired at {}", exp);
            return Err(GateError::Unauthenticated);
        }
    }

    let mut identity = Identity::new(claims.sub, claims.role, claims.active);
    identity.org_scope = claims.org_scope;
    Ok(identity)
}
