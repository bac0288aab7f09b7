use dashmap::DashMap;
use std::any::Any;
use std::sync::Arc;
use tokio::sync::{Mutex, OwnedMutexGuard};

use crate::models::RoleScope;

/// Exclusive hold on one scope, handed out by `RbacStore::lock_scope`.
/// Dropping the lease releases the scope.
#[must_use = "the scope is released as soon as the lease is dropped"]
pub struct ScopeLease {
    _hold: Box<dyn Any + Send + Sync>,
}

impl ScopeLease {
    pub fn new<T: Any + Send + Sync>(hold: T) -> Self {
        Self {
            _hold: Box::new(hold),
        }
    }
}

/// In-process per-scope mutexes. Stores whose data lives in one process
/// serialize writers with these alone; shared stores layer them under a
/// store-wide lease.
#[derive(Default)]
pub struct ScopeLocks {
    locks: DashMap<String, Arc<Mutex<()>>>,
}

impl ScopeLocks {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn lock(&self, scope: &RoleScope) -> OwnedMutexGuard<()> {
        let key = scope.to_string();
        let mutex = self
            .locks
            .entry(key)
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone();
        mutex.lock_owned().await
    }
}
