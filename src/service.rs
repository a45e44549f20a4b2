//! Admin service: gate → scope → guard → store orchestration
//!
//! One request is one logical task: every decision is computed fresh from the
//! request-scoped identity, and the only suspension points are the store
//! calls. Persistence failures are logged here, at the action boundary, and
//! flow upward as [`GateError::Persistence`] so callers surface a generic
//! message instead of store detail.

use crate::error::{GateError, Result};
use crate::gate;
use crate::guard::{self, RequestedChange};
use crate::scope::{self, OrderBy, UserPredicate};
use crate::store::{UserChanges, UserStore};
use crate::types::{Identity, Role, RoleRequirement, UserId, UserRecord};
use std::sync::Arc;
use tracing::{error, info};

/// Listing path whose cached rendering goes stale after a user mutation
pub const USERS_LISTING_PATH: &str = "/admin/users";

/// Receiver for "this listing view is now stale" signals.
///
/// Successful mutations report the affected listing path; denied mutations
/// report nothing.
pub trait RevalidationSink: Send + Sync {
    /// Mark the cached rendering of `path` stale
    fn revalidate(&self, path: &str);
}

/// Production sink: the staleness signal is a log line for the rendering layer
pub struct TracingRevalidator;

impl RevalidationSink for TracingRevalidator {
    fn revalidate(&self, path: &str) {
        info!(path, "listing marked stale");
    }
}

/// Admin operations over user records, uniformly gated and scoped
pub struct AdminService {
    store: Arc<dyn UserStore>,
    revalidator: Arc<dyn RevalidationSink>,
}

impl AdminService {
    /// Build the service over a store and a revalidation sink
    pub fn new(store: Arc<dyn UserStore>, revalidator: Arc<dyn RevalidationSink>) -> Self {
        Self { store, revalidator }
    }

    /// List user records visible to the actor.
    ///
    /// Staff and above; the predicate is narrowed by the scope filter before
    /// it reaches the store.
    pub async fn list_users(
        &self,
        actor: &Identity,
        base: UserPredicate,
        order: OrderBy,
    ) -> Result<Vec<UserRecord>> {
        gate::authorize(Some(actor), &RoleRequirement::staff_and_above())?;

        let effective = scope::scope_query(actor, base);
        self.store
            .find_many(&effective, order)
            .await
            .map_err(|e| self.log_persistence("list_users", e))
    }

    /// Change a target's role.
    ///
    /// Admin and above, subject to the mutation guard. Setting the role the
    /// target already has is a permitted no-op write.
    pub async fn set_role(
        &self,
        actor: &Identity,
        target_id: UserId,
        new_role: Role,
    ) -> Result<UserRecord> {
        gate::authorize(Some(actor), &RoleRequirement::admin_and_above())?;

        let target = self.load_target(target_id).await?;
        guard::guard_mutation(actor, &target, RequestedChange::SetRole { role: new_role })?;

        let updated = self
            .store
            .update(target_id, UserChanges::role(new_role))
            .await
            .map_err(|e| self.log_persistence("set_role", e))?;

        info!(
            actor = %actor.user_id,
            target = %target_id,
            role = %new_role,
            "role updated"
        );
        self.revalidator.revalidate(USERS_LISTING_PATH);
        Ok(updated)
    }

    /// Negate a target's active flag.
    ///
    /// Admin and above, subject to the mutation guard. Applying it twice with
    /// no interleaved mutation restores the original state.
    pub async fn toggle_active(&self, actor: &Identity, target_id: UserId) -> Result<UserRecord> {
        gate::authorize(Some(actor), &RoleRequirement::admin_and_above())?;

        let target = self.load_target(target_id).await?;
        guard::guard_mutation(actor, &target, RequestedChange::ToggleActive)?;

        let updated = self
            .store
            .update(target_id, UserChanges::active(!target.active))
            .await
            .map_err(|e| self.log_persistence("toggle_active", e))?;

        info!(
            actor = %actor.user_id,
            target = %target_id,
            active = updated.active,
            "active flag toggled"
        );
        self.revalidator.revalidate(USERS_LISTING_PATH);
        Ok(updated)
    }

    /// Load a mutation target, turning a miss into the not-found deny.
    ///
    /// Checked before any rank evaluation, since rank cannot be read off a
    /// missing record.
    async fn load_target(&self, id: UserId) -> Result<UserRecord> {
        self.store
            .find_unique(id)
            .await
            .map_err(|e| self.log_persistence("load_target", e))?
            .ok_or(GateError::TargetNotFound(id))
    }

    fn log_persistence(&self, action: &str, err: GateError) -> GateError {
        if let GateError::Persistence(detail) = &err {
            error!(action, detail = %detail, "store operation failed");
        }
        err
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::InMemoryUserStore;
    use std::sync::Mutex;
    use uuid::Uuid;

    /// Test sink that records every revalidated path
    struct RecordingRevalidator {
        paths: Mutex<Vec<String>>,
    }

    impl RecordingRevalidator {
        fn new() -> Self {
            Self {
                paths: Mutex::new(Vec::new()),
            }
        }

        fn paths(&self) -> Vec<String> {
            self.paths.lock().unwrap().clone()
        }
    }

    impl RevalidationSink for RecordingRevalidator {
        fn revalidate(&self, path: &str) {
            self.paths.lock().unwrap().push(path.to_string());
        }
    }

    struct Fixture {
        service: AdminService,
        store: Arc<InMemoryUserStore>,
        sink: Arc<RecordingRevalidator>,
        staff: UserRecord,
        super_admin: UserRecord,
    }

    async fn fixture() -> Fixture {
        let store = Arc::new(InMemoryUserStore::new());
        let sink = Arc::new(RecordingRevalidator::new());

        let staff = UserRecord::new("Asha Verma", "asha@example.gov", Role::Staff)
            .with_org_scope("GP-12");
        let in_other_scope = UserRecord::new("Meena Das", "meena@example.gov", Role::Staff)
            .with_org_scope("GP-07");
        let super_admin = UserRecord::new("Root", "root@example.gov", Role::SuperAdmin);
        store.insert(staff.clone()).await;
        store.insert(in_other_scope).await;
        store.insert(super_admin.clone()).await;

        let service = AdminService::new(store.clone(), sink.clone());
        Fixture {
            service,
            store,
            sink,
            staff,
            super_admin,
        }
    }

    fn admin_in(scope: &str) -> Identity {
        Identity::new(Uuid::new_v4(), Role::Admin, true).with_org_scope(scope)
    }

    #[tokio::test]
    async fn test_listing_is_scope_filtered() {
        let f = fixture().await;

        let seen = f
            .service
            .list_users(&admin_in("GP-12"), UserPredicate::all(), OrderBy::Name)
            .await
            .unwrap();
        assert_eq!(seen.len(), 1);
        assert_eq!(seen[0].id, f.staff.id);

        let super_id = Identity::new(Uuid::new_v4(), Role::SuperAdmin, true);
        let all = f
            .service
            .list_users(&super_id, UserPredicate::all(), OrderBy::Name)
            .await
            .unwrap();
        assert_eq!(all.len(), 3);
    }

    #[tokio::test]
    async fn test_listing_denied_for_inactive() {
        let f = fixture().await;
        let inactive = Identity::new(Uuid::new_v4(), Role::SuperAdmin, false);
        let result = f
            .service
            .list_users(&inactive, UserPredicate::all(), OrderBy::Newest)
            .await;
        assert!(matches!(result, Err(GateError::Inactive)));
    }

    #[tokio::test]
    async fn test_set_role_revalidates_listing() {
        let f = fixture().await;

        let updated = f
            .service
            .set_role(&admin_in("GP-12"), f.staff.id, Role::Admin)
            .await
            .unwrap();
        assert_eq!(updated.role, Role::Admin);
        assert_eq!(f.sink.paths(), vec![USERS_LISTING_PATH.to_string()]);
    }

    #[tokio::test]
    async fn test_denied_grant_performs_no_write() {
        let f = fixture().await;

        let result = f
            .service
            .set_role(&admin_in("GP-12"), f.staff.id, Role::SuperAdmin)
            .await;
        assert!(matches!(result, Err(GateError::CannotGrantSuperAdmin)));

        // No write, no staleness signal
        let unchanged = f.store.find_unique(f.staff.id).await.unwrap().unwrap();
        assert_eq!(unchanged.role, Role::Staff);
        assert!(f.sink.paths().is_empty());
    }

    #[tokio::test]
    async fn test_admin_cannot_toggle_super_admin() {
        let f = fixture().await;

        let result = f
            .service
            .toggle_active(&admin_in("GP-12"), f.super_admin.id)
            .await;
        assert!(matches!(result, Err(GateError::TargetOutranksActor { .. })));

        let unchanged = f.store.find_unique(f.super_admin.id).await.unwrap().unwrap();
        assert!(unchanged.active);
        assert!(f.sink.paths().is_empty());
    }

    #[tokio::test]
    async fn test_mutation_on_missing_target() {
        let f = fixture().await;
        let id = Uuid::new_v4();
        let result = f.service.toggle_active(&admin_in("GP-12"), id).await;
        assert!(matches!(result, Err(GateError::TargetNotFound(missing)) if missing == id));
        assert!(f.sink.paths().is_empty());
    }

    #[tokio::test]
    async fn test_staff_cannot_mutate() {
        let f = fixture().await;
        let staff_actor = Identity::new(Uuid::new_v4(), Role::Staff, true);
        let result = f.service.toggle_active(&staff_actor, f.staff.id).await;
        assert!(matches!(result, Err(GateError::InsufficientRole { .. })));
    }

    #[tokio::test]
    async fn test_double_toggle_restores_state() {
        let f = fixture().await;
        let actor = admin_in("GP-12");

        let once = f.service.toggle_active(&actor, f.staff.id).await.unwrap();
        assert!(!once.active);
        let twice = f.service.toggle_active(&actor, f.staff.id).await.unwrap();
        assert!(twice.active);
        assert_eq!(f.sink.paths().len(), 2);
    }

    #[tokio::test]
    async fn test_set_role_same_role_is_noop_write() {
        let f = fixture().await;

        let updated = f
            .service
            .set_role(&admin_in("GP-12"), f.staff.id, Role::Staff)
            .await
            .unwrap();
        assert_eq!(updated.role, Role::Staff);
        // Still a write, still revalidates
        assert_eq!(f.sink.paths().len(), 1);
    }
}
