//! Mutation guard: rank checks on privileged writes
//!
//! Role membership alone is not enough for state-changing operations on user
//! records. Two invariants hold regardless of which route performs the write:
//! an actor may never mutate a target whose current rank exceeds its own, and
//! only a super admin may grant the super admin role.

use crate::error::{GateError, Result};
use crate::types::{Identity, Role, UserRecord};
use serde::{Deserialize, Serialize};
use tracing::debug;

/// State change requested against a user record
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum RequestedChange {
    /// Replace the target's role
    SetRole {
        /// Role to assign
        role: Role,
    },
    /// Negate the target's active flag
    ToggleActive,
}

/// Decide whether the actor may apply the change to the target.
///
/// The target has already been loaded; a missing target is reported as
/// [`GateError::TargetNotFound`] by the caller before rank can be evaluated.
/// Outranking is checked before the grant rule, so an admin poking a super
/// admin record always reads as `TargetOutranksActor`.
pub fn guard_mutation(
    actor: &Identity,
    target: &UserRecord,
    change: RequestedChange,
) -> Result<()> {
    if target.role.rank() > actor.role.rank() {
        debug!(
            actor = %actor.role,
            target = %target.role,
            "mutation deny: target outranks actor"
        );
        return Err(GateError::TargetOutranksActor {
            actor: actor.role,
            target: target.role,
        });
    }

    if let RequestedChange::SetRole {
        role: Role::SuperAdmin,
    } = change
    {
        if actor.role != Role::SuperAdmin {
            debug!(actor = %actor.role, "mutation deny: cannot grant super admin");
            return Err(GateError::CannotGrantSuperAdmin);
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use uuid::Uuid;

    fn actor(role: Role) -> Identity {
        Identity::new(Uuid::new_v4(), role, true)
    }

    fn target(role: Role) -> UserRecord {
        UserRecord::new("Target User", "target@example.gov", role)
    }

    #[test]
    fn test_admin_may_mutate_staff_and_admin() {
        let admin = actor(Role::Admin);
        for role in [Role::Staff, Role::Admin] {
            assert!(guard_mutation(&admin, &target(role), RequestedChange::ToggleActive).is_ok());
            assert!(guard_mutation(
                &admin,
                &target(role),
                RequestedChange::SetRole { role: Role::Admin }
            )
            .is_ok());
        }
    }

    #[test]
    fn test_admin_cannot_touch_super_admin() {
        let admin = actor(Role::Admin);
        let super_target = target(Role::SuperAdmin);

        assert!(matches!(
            guard_mutation(&admin, &super_target, RequestedChange::ToggleActive),
            Err(GateError::TargetOutranksActor {
                actor: Role::Admin,
                target: Role::SuperAdmin
            })
        ));
        assert!(matches!(
            guard_mutation(
                &admin,
                &super_target,
                RequestedChange::SetRole { role: Role::Staff }
            ),
            Err(GateError::TargetOutranksActor { .. })
        ));
    }

    #[test]
    fn test_non_super_admin_cannot_grant_super_admin() {
        for role in [Role::Staff, Role::Admin] {
            let result = guard_mutation(
                &actor(role),
                &target(Role::Staff),
                RequestedChange::SetRole {
                    role: Role::SuperAdmin,
                },
            );
            assert!(matches!(result, Err(GateError::CannotGrantSuperAdmin)));
        }
    }

    #[test]
    fn test_super_admin_may_grant_super_admin() {
        let result = guard_mutation(
            &actor(Role::SuperAdmin),
            &target(Role::Admin),
            RequestedChange::SetRole {
                role: Role::SuperAdmin,
            },
        );
        assert!(result.is_ok());
    }

    #[test]
    fn test_outrank_reported_before_grant_rule() {
        // Both reasons apply; the outrank check wins.
        let result = guard_mutation(
            &actor(Role::Admin),
            &target(Role::SuperAdmin),
            RequestedChange::SetRole {
                role: Role::SuperAdmin,
            },
        );
        assert!(matches!(result, Err(GateError::TargetOutranksActor { .. })));
    }

    fn any_role() -> impl Strategy<Value = Role> {
        prop::sample::select(Role::ALL.to_vec())
    }

    fn any_change() -> impl Strategy<Value = RequestedChange> {
        prop_oneof![
            Just(RequestedChange::ToggleActive),
            any_role().prop_map(|role| RequestedChange::SetRole { role }),
        ]
    }

    proptest! {
        #[test]
        fn prop_super_admin_target_immune_to_lower_actors(
            actor_role in prop::sample::select(vec![Role::Staff, Role::Admin]),
            change in any_change(),
        ) {
            let result = guard_mutation(&actor(actor_role), &target(Role::SuperAdmin), change);
            prop_assert!(result.is_err());
        }

        #[test]
        fn prop_grant_super_admin_requires_super_admin(
            actor_role in any_role(),
            target_role in any_role(),
        ) {
            let result = guard_mutation(
                &actor(actor_role),
                &target(target_role),
                RequestedChange::SetRole { role: Role::SuperAdmin },
            );
            if actor_role != Role::SuperAdmin {
                prop_assert!(result.is_err());
            }
        }

        #[test]
        fn prop_allow_iff_rank_and_grant_rules_hold(
            actor_role in any_role(),
            target_role in any_role(),
            change in any_change(),
        ) {
            let result = guard_mutation(&actor(actor_role), &target(target_role), change);
            let outranked = target_role.rank() > actor_role.rank();
            let bad_grant = matches!(
                change,
                RequestedChange::SetRole { role: Role::SuperAdmin }
            ) && actor_role != Role::SuperAdmin;
            prop_assert_eq!(result.is_ok(), !outranked && !bad_grant);
        }
    }
}
