//! Access gate: the single authorization check every route goes through
//!
//! The portal used to repeat "check role, else redirect" on every page; this
//! module is that check collapsed into one contract. The check order is fixed
//! and load-bearing: unauthenticated, then inactive, then role membership.
//! When several reasons apply at once, the earliest one is the reason
//! surfaced — an inactive super admin is reported as `Inactive`, not
//! `InsufficientRole`.

use crate::error::{GateError, Result};
use crate::session;
use crate::types::{Identity, RoleRequirement};
use tracing::debug;

/// Decide whether the identity may proceed against the required role set.
///
/// Returns `Ok(())` on allow; the deny reason otherwise. Check order must not
/// be changed (see module docs).
pub fn authorize(identity: Option<&Identity>, required: &RoleRequirement) -> Result<()> {
    let identity = match identity {
        Some(identity) => identity,
        None => {
            debug!("gate deny: unauthenticated");
            return Err(GateError::Unauthenticated);
        }
    };

    if !identity.active {
        debug!(user_id = %identity.user_id, "gate deny: inactive account");
        return Err(GateError::Inactive);
    }

    if !required.accepts(identity.role) {
        debug!(
            user_id = %identity.user_id,
            role = %identity.role,
            required = ?required.roles(),
            "gate deny: insufficient role"
        );
        return Err(GateError::InsufficientRole {
            actual: identity.role,
        });
    }

    Ok(())
}

/// Resolve the bearer token and authorize it in one step.
///
/// This is the per-route entry point: callers terminate the request on `Err`
/// (page routes redirect, API routes map the reason to 401/403).
pub fn require_role(token: Option<&str>, required: &RoleRequirement) -> Result<Identity> {
    let identity = session::resolve(token)?;
    authorize(Some(&identity), required)?;
    Ok(identity)
}
