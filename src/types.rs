//! Core identity, role, and user-record types

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

/// Unique user identifier
pub type UserId = Uuid;

/// Organizational partition key (e.g., a gram panchayat code like "GP-12")
pub type OrgScope = String;

/// Portal role, totally ordered: `Staff < Admin < SuperAdmin`.
///
/// The derived `Ord` is the rank relation the mutation guard uses to decide
/// whether an actor may touch a target record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Role {
    /// Field staff: data entry, document verification
    Staff,
    /// Organization-level administrator, scoped to one org partition
    Admin,
    /// Platform-level administrator with global visibility
    SuperAdmin,
}

impl Role {
    /// Numeric rank used by the mutation guard (`Staff`=0, `Admin`=1, `SuperAdmin`=2)
    pub fn rank(self) -> u8 {
        self as u8
    }

    /// All roles, lowest rank first
    pub const ALL: [Role; 3] = [Role::Staff, Role::Admin, Role::SuperAdmin];
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Role::Staff => "STAFF",
            Role::Admin => "ADMIN",
            Role::SuperAdmin => "SUPER_ADMIN",
        };
        write!(f, "{}", s)
    }
}

impl FromStr for Role {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "STAFF" => Ok(Role::Staff),
            "ADMIN" => Ok(Role::Admin),
            "SUPER_ADMIN" => Ok(Role::SuperAdmin),
            other => Err(format!("unknown role: {}", other)),
        }
    }
}

/// The resolved, request-scoped representation of "who is making this call".
///
/// Built once per request from decoded session claims and immutable afterwards.
/// The `active` flag and `role` are read verbatim from the claims; staleness
/// between token issuance and current database state is an accepted limitation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Identity {
    /// User this identity was issued for
    pub user_id: UserId,

    /// Role claim carried by the session
    pub role: Role,

    /// Active flag carried by the session
    pub active: bool,

    /// Organizational scope, absent for top-level identities
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub org_scope: Option<OrgScope>,
}

impl Identity {
    /// Create a new identity without organizational scope
    pub fn new(user_id: UserId, role: Role, active: bool) -> Self {
        Self {
            user_id,
            role,
            active,
            org_scope: None,
        }
    }

    /// Attach an organizational scope
    pub fn with_org_scope(mut self, scope: impl Into<OrgScope>) -> Self {
        self.org_scope = Some(scope.into());
        self
    }
}

/// A non-empty set of roles a route or action accepts.
///
/// Defined statically per route and never mutated at runtime. The portal uses
/// exactly three ceilings, exposed as the constructors below.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RoleRequirement {
    roles: &'static [Role],
}

impl RoleRequirement {
    /// Any authenticated portal role
    pub fn staff_and_above() -> Self {
        Self {
            roles: &[Role::Staff, Role::Admin, Role::SuperAdmin],
        }
    }

    /// Organization administrators and above
    pub fn admin_and_above() -> Self {
        Self {
            roles: &[Role::Admin, Role::SuperAdmin],
        }
    }

    /// Platform administrators only
    pub fn super_admin_only() -> Self {
        Self {
            roles: &[Role::SuperAdmin],
        }
    }

    /// Whether the requirement accepts the given role
    pub fn accepts(&self, role: Role) -> bool {
        self.roles.contains(&role)
    }

    /// Accepted roles, lowest rank first
    pub fn roles(&self) -> &[Role] {
        self.roles
    }
}

/// Persisted user-like record that listings render and mutations target
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserRecord {
    /// Record identifier
    pub id: UserId,

    /// Display name
    pub name: String,

    /// Login email, unique across the portal
    pub email: String,

    /// Current role
    pub role: Role,

    /// Whether the account may sign in
    pub active: bool,

    /// Organizational scope, absent for top-level accounts
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub org_scope: Option<OrgScope>,

    /// Creation timestamp
    pub created_at: DateTime<Utc>,

    /// Last mutation timestamp
    pub updated_at: DateTime<Utc>,
}

impl UserRecord {
    /// Create a new active record with a fresh id and current timestamps
    pub fn new(name: impl Into<String>, email: impl Into<String>, role: Role) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            name: name.into(),
            email: email.into(),
            role,
            active: true,
            org_scope: None,
            created_at: now,
            updated_at: now,
        }
    }

    /// Attach an organizational scope
    pub fn with_org_scope(mut self, scope: impl Into<OrgScope>) -> Self {
        self.org_scope = Some(scope.into());
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_role_rank_order() {
        assert!(Role::Staff < Role::Admin);
        assert!(Role::Admin < Role::SuperAdmin);
        assert_eq!(Role::Staff.rank(), 0);
        assert_eq!(Role::Admin.rank(), 1);
        assert_eq!(Role::SuperAdmin.rank(), 2);
    }

    #[test]
    fn test_role_string_roundtrip() {
        for role in Role::ALL {
            let parsed: Role = role.to_string().parse().unwrap();
            assert_eq!(parsed, role);
        }
        assert!("VIEWER".parse::<Role>().is_err());
    }

    #[test]
    fn test_role_serde_names() {
        assert_eq!(
            serde_json::to_string(&Role::SuperAdmin).unwrap(),
            "\"SUPER_ADMIN\""
        );
        let role: Role = serde_json::from_str("\"STAFF\"").unwrap();
        assert_eq!(role, Role::Staff);
    }

    #[test]
    fn test_requirement_ceilings() {
        let staff_up = RoleRequirement::staff_and_above();
        assert!(staff_up.accepts(Role::Staff));
        assert!(staff_up.accepts(Role::SuperAdmin));

        let admin_up = RoleRequirement::admin_and_above();
        assert!(!admin_up.accepts(Role::Staff));
        assert!(admin_up.accepts(Role::Admin));
        assert!(admin_up.accepts(Role::SuperAdmin));

        let super_only = RoleRequirement::super_admin_only();
        assert!(!super_only.accepts(Role::Admin));
        assert!(super_only.accepts(Role::SuperAdmin));
    }

    #[test]
    fn test_identity_builder() {
        let identity = Identity::new(Uuid::new_v4(), Role::Admin, true).with_org_scope("GP-12");
        assert_eq!(identity.org_scope.as_deref(), Some("GP-12"));
        assert!(identity.active);
    }

    #[test]
    fn test_user_record_creation() {
        let record = UserRecord::new("Asha Verma", "asha@example.gov", Role::Staff)
            .with_org_scope("GP-07");
        assert!(record.active);
        assert_eq!(record.role, Role::Staff);
        assert_eq!(record.org_scope.as_deref(), Some("GP-07"));
        assert_eq!(record.created_at, record.updated_at);
    }
}
