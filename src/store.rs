//! User record storage
//!
//! The core issues exactly three operation shapes against the store:
//! `find_unique`, `find_many`, and `update`. It never issues raw queries;
//! predicates are composed upstream by the scope filter. Individual operations
//! rely on the store's native atomicity — there are no transactions or retries
//! here, and two concurrent writes to the same record are last-write-wins.

use crate::error::{GateError, Result};
use crate::scope::{OrderBy, UserPredicate};
use crate::types::{Role, UserId, UserRecord};
use async_trait::async_trait;
use chrono::Utc;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;

#[cfg(feature = "postgres")]
pub mod postgres;

#[cfg(feature = "postgres")]
pub use postgres::PostgresUserStore;

/// Field changes applied by `update`. Unset fields are left untouched.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct UserChanges {
    /// New role, if changing
    pub role: Option<Role>,
    /// New active flag, if changing
    pub active: Option<bool>,
}

impl UserChanges {
    /// Change only the role
    pub fn role(role: Role) -> Self {
        Self {
            role: Some(role),
            ..Self::default()
        }
    }

    /// Change only the active flag
    pub fn active(active: bool) -> Self {
        Self {
            active: Some(active),
            ..Self::default()
        }
    }
}

/// User record store trait
#[async_trait]
pub trait UserStore: Send + Sync {
    /// Load a record by id
    async fn find_unique(&self, id: UserId) -> Result<Option<UserRecord>>;

    /// List records matching the predicate in the given order
    async fn find_many(&self, predicate: &UserPredicate, order: OrderBy) -> Result<Vec<UserRecord>>;

    /// Apply field changes to a record, returning the updated record.
    ///
    /// Fails with [`GateError::TargetNotFound`] when the id does not exist.
    async fn update(&self, id: UserId, changes: UserChanges) -> Result<UserRecord>;
}

/// In-memory user store used by tests and the default server configuration
pub struct InMemoryUserStore {
    records: Arc<RwLock<HashMap<UserId, UserRecord>>>,
}

impl InMemoryUserStore {
    /// Create an empty store
    pub fn new() -> Self {
        Self {
            records: Arc::new(RwLock::new(HashMap::new())),
        }
    }

    /// Seed a record (not part of the [`UserStore`] contract)
    pub async fn insert(&self, record: UserRecord) {
        let mut records = self.records.write().await;
        records.insert(record.id, record);
    }

    /// Number of stored records
    pub async fn len(&self) -> usize {
        self.records.read().await.len()
    }

    /// Whether the store holds no records
    pub async fn is_empty(&self) -> bool {
        self.records.read().await.is_empty()
    }
}

impl Default for InMemoryUserStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl UserStore for InMemoryUserStore {
    async fn find_unique(&self, id: UserId) -> Result<Option<UserRecord>> {
        let records = self.records.read().await;
        Ok(records.get(&id).cloned())
    }

    async fn find_many(&self, predicate: &UserPredicate, order: OrderBy) -> Result<Vec<UserRecord>> {
        let records = self.records.read().await;
        let mut matching: Vec<UserRecord> = records
            .values()
            .filter(|r| predicate.matches(r))
            .cloned()
            .collect();

        match order {
            OrderBy::Name => matching.sort_by(|a, b| a.name.cmp(&b.name)),
            OrderBy::Newest => matching.sort_by(|a, b| b.created_at.cmp(&a.created_at)),
        }

        Ok(matching)
    }

    async fn update(&self, id: UserId, changes: UserChanges) -> Result<UserRecord> {
        let mut records = self.records.write().await;
        let record = records.get_mut(&id).ok_or(GateError::TargetNotFound(id))?;

        if let Some(role) = changes.role {
            record.role = role;
        }
        if let Some(active) = changes.active {
            record.active = active;
        }
        record.updated_at = Utc::now();

        Ok(record.clone())
    }
}
