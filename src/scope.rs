//! Scope filter: narrows listing predicates to the identity's org partition
//!
//! Super admins see everything; everyone else is constrained to their own
//! organizational scope. An admin without a scope falls through unfiltered —
//! that matches the portal's observed behavior and is flagged rather than
//! silently tightened (see DESIGN.md).

use crate::types::{Identity, OrgScope, Role, UserRecord};
use serde::{Deserialize, Serialize};
use tracing::warn;

/// Listing predicate over user records.
///
/// Built fresh per request from query parameters; the scope filter may add an
/// `org_scope` constraint before the predicate reaches the store.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserPredicate {
    /// Restrict to one role
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub role: Option<Role>,

    /// Restrict by active flag
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub active: Option<bool>,

    /// Case-insensitive substring match on name or email
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub search: Option<String>,

    /// Organizational scope constraint, normally injected by [`scope_query`]
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub org_scope: Option<OrgScope>,
}

impl UserPredicate {
    /// Unconstrained predicate
    pub fn all() -> Self {
        Self::default()
    }

    /// Restrict to one role
    pub fn with_role(mut self, role: Role) -> Self {
        self.role = Some(role);
        self
    }

    /// Restrict by active flag
    pub fn with_active(mut self, active: bool) -> Self {
        self.active = Some(active);
        self
    }

    /// Restrict by name/email substring
    pub fn with_search(mut self, search: impl Into<String>) -> Self {
        self.search = Some(search.into());
        self
    }

    /// Whether a record satisfies this predicate
    pub fn matches(&self, record: &UserRecord) -> bool {
        if let Some(role) = self.role {
            if record.role != role {
                return false;
            }
        }
        if let Some(active) = self.active {
            if record.active != active {
                return false;
            }
        }
        if let Some(search) = &self.search {
            let needle = search.to_lowercase();
            if !record.name.to_lowercase().contains(&needle)
                && !record.email.to_lowercase().contains(&needle)
            {
                return false;
            }
        }
        if let Some(scope) = &self.org_scope {
            if record.org_scope.as_deref() != Some(scope.as_str()) {
                return false;
            }
        }
        true
    }
}

/// Listing order accepted by `find_many`
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OrderBy {
    /// Name ascending
    Name,
    /// Newest record first
    #[default]
    Newest,
}

/// Derive the effective predicate for an identity.
///
/// Deterministic: for a fixed identity and base predicate the output is always
/// identical. Super admin gets the base predicate unchanged; any scoped
/// identity gets the base predicate AND its own org scope.
pub fn scope_query(identity: &Identity, base: UserPredicate) -> UserPredicate {
    if identity.role == Role::SuperAdmin {
        return base;
    }

    match &identity.org_scope {
        Some(scope) => UserPredicate {
            org_scope: Some(scope.clone()),
            ..base
        },
        None => {
            // Observed portal behavior: a scoped role with no scope set sees
            // everything. Likely unintended privilege breadth; surfaced in
            // the logs, not changed here.
            warn!(
                user_id = %identity.user_id,
                role = %identity.role,
                "identity has no org scope, predicate left unfiltered"
            );
            base
        }
    }
}
