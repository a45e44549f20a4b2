//! # Portal Authorization Core
//!
//! Request-scoped authorization for the municipal administrative portal.
//! Every inbound request flows through the same pipeline:
//!
//! ```text
//! Session Resolver → Access Gate → Scope Filter → Mutation Guard
//!       ↓                ↓              ↓               ↓
//!   Identity        Allow/Deny    scoped query    guarded write
//! ```
//!
//! - **Session Resolver** decodes the bearer token into an [`Identity`]
//!   carrying role, active flag, and optional organizational scope.
//! - **Access Gate** checks the identity against a route's [`RoleRequirement`]
//!   in a fixed order: unauthenticated, then inactive, then role membership.
//! - **Scope Filter** narrows listing predicates to the identity's
//!   organizational scope unless the role is top-level.
//! - **Mutation Guard** enforces the rank relation on writes: no actor may
//!   touch a record that outranks it, and only a super admin may grant
//!   super admin.
//!
//! ## Example
//!
//! ```rust
//! use portal_gate::{authorize, Identity, Role, RoleRequirement};
//!
//! let admin = Identity::new(uuid::Uuid::new_v4(), Role::Admin, true)
//!     .with_org_scope("GP-12");
//!
//! assert!(authorize(Some(&admin), &RoleRequirement::admin_and_above()).is_ok());
//! assert!(authorize(Some(&admin), &RoleRequirement::super_admin_only()).is_err());
//! ```

pub mod error;
pub mod gate;
pub mod guard;
pub mod scope;
pub mod service;
pub mod session;
pub mod store;
pub mod types;

// Re-export commonly used items
pub use error::{GateError, Result};
pub use gate::{authorize, require_role};
pub use guard::{guard_mutation, RequestedChange};
pub use scope::{scope_query, OrderBy, UserPredicate};
pub use service::{AdminService, RevalidationSink, TracingRevalidator, USERS_LISTING_PATH};
pub use session::{resolve, SessionClaims};
pub use store::{InMemoryUserStore, UserChanges, UserStore};
pub use types::{Identity, OrgScope, Role, RoleRequirement, UserId, UserRecord};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
