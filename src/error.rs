//! Error types for the authorization core

use crate::types::{Role, UserId};
use thiserror::Error;

/// Authorization and mutation failures.
///
/// Every variant except `Persistence` is a deny reason with a fixed meaning;
/// all are terminal for the current request and never retried.
#[derive(Debug, Error)]
pub enum GateError {
    /// No valid session token was presented
    #[error("authentication required")]
    Unauthenticated,

    /// The session's account is deactivated
    #[error("account is inactive")]
    Inactive,

    /// The identity's role is not in the route's required set
    #[error("role {actual} is not permitted for this action")]
    InsufficientRole {
        /// Role the identity actually carries
        actual: Role,
    },

    /// The mutation target does not exist
    #[error("user not found: {0}")]
    TargetNotFound(UserId),

    /// The target's current rank exceeds the actor's rank
    #[error("target role {target} outranks actor role {actor}")]
    TargetOutranksActor {
        /// Actor's role
        actor: Role,
        /// Target's current role
        target: Role,
    },

    /// Only a super admin may grant the super admin role
    #[error("only a super admin may grant super admin")]
    CannotGrantSuperAdmin,

    /// Underlying store failure
    #[error("persistence failure: {0}")]
    Persistence(String),
}

impl GateError {
    /// Message safe to show an end user.
    ///
    /// Store error detail must never leak past the action boundary, so
    /// `Persistence` collapses to a generic message; deny reasons are already
    /// user-facing.
    pub fn public_message(&self) -> String {
        match self {
            GateError::Persistence(_) => "an internal error occurred".to_string(),
            other => other.to_string(),
        }
    }

    /// Whether this is an authorization deny, as opposed to a store failure
    pub fn is_deny(&self) -> bool {
        !matches!(self, GateError::Persistence(_))
    }
}

/// Result type for authorization operations
pub type Result<T> = std::result::Result<T, GateError>;
