//! [`StoreHandle`]: async-safe handle over a blocking [`CredentialStore`].
//!
//! Every call is dispatched with `tokio::task::spawn_blocking` and bounded by
//! `tokio::time::timeout`.  A call that overruns surfaces as
//! [`ServiceError::StorageTimeout`]; the handle never retries.

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use tracing::warn;

use super::CredentialStore;
use crate::domain::{Item, ItemId, List, ListId, RefreshGrant, User, UserId};
use crate::error::ServiceError;

pub const DEFAULT_STORE_TIMEOUT: Duration = Duration::from_secs(3);

/// Cheaply cloneable (`Arc`-backed).
#[derive(Clone)]
pub struct StoreHandle {
    store: Arc<dyn CredentialStore>,
    timeout: Duration,
}

impl StoreHandle {
    pub fn new(store: Arc<dyn CredentialStore>, timeout: Duration) -> Self {
        Self { store, timeout }
    }

    pub fn backend(&self) -> &str {
        self.store.backend()
    }

    async fn call<T, F>(&self, op: &'static str, f: F) -> Result<T, ServiceError>
    where
        T: Send + 'static,
        F: FnOnce(&dyn CredentialStore) -> Result<T, ServiceError> + Send + 'static,
    {
        let store = Arc::clone(&self.store);
        let task = tokio::task::spawn_blocking(move || f(store.as_ref()));
        match tokio::time::timeout(self.timeout, task).await {
            Err(_) => {
                warn!(op, timeout_ms = self.timeout.as_millis() as u64, "credential store call timed out");
                Err(ServiceError::StorageTimeout)
            }
            Ok(Err(e)) => Err(ServiceError::Storage(format!("{op} join: {e}"))),
            Ok(Ok(result)) => result,
        }
    }

    // ── Users ─────────────────────────────────────────────────────────

    pub async fn get_user(&self, id: UserId) -> Result<User, ServiceError> {
        self.call("get_user", move |s| s.get_user(id)).await
    }

    pub async fn get_user_id_by_name(&self, name: &str) -> Result<UserId, ServiceError> {
        let name = name.to_string();
        self.call("get_user_id_by_name", move |s| s.get_user_id_by_name(&name)).await
    }

    pub async fn create_user(&self, user: User) -> Result<(), ServiceError> {
        self.call("create_user", move |s| s.create_user(user)).await
    }

    pub async fn delete_user(&self, id: UserId) -> Result<(), ServiceError> {
        self.call("delete_user", move |s| s.delete_user(id)).await
    }

    pub async fn update_password(&self, id: UserId, password_hash: String) -> Result<(), ServiceError> {
        self.call("update_password", move |s| s.update_password(id, &password_hash)).await
    }

    pub async fn update_name(&self, id: UserId, name: String) -> Result<(), ServiceError> {
        self.call("update_name", move |s| s.update_name(id, &name)).await
    }

    // ── Refresh grants ────────────────────────────────────────────────

    pub async fn set_refresh_grant(&self, id: UserId, grant: Option<RefreshGrant>) -> Result<(), ServiceError> {
        self.call("set_refresh_grant", move |s| s.set_refresh_grant(id, grant)).await
    }

    pub async fn get_user_by_refresh_digest(
        &self,
        digest: String,
    ) -> Result<(UserId, DateTime<Utc>), ServiceError> {
        self.call("get_user_by_refresh_digest", move |s| s.get_user_by_refresh_digest(&digest))
            .await
    }

    // ── Lists ─────────────────────────────────────────────────────────

    pub async fn get_list(&self, id: ListId) -> Result<List, ServiceError> {
        self.call("get_list", move |s| s.get_list(id)).await
    }

    pub async fn create_list(&self, list: List) -> Result<(), ServiceError> {
        self.call("create_list", move |s| s.create_list(list)).await
    }

    pub async fn list_ids_by_owner(&self, owner: UserId) -> Result<Vec<ListId>, ServiceError> {
        self.call("list_ids_by_owner", move |s| s.list_ids_by_owner(owner)).await
    }

    pub async fn delete_list(&self, id: ListId) -> Result<(), ServiceError> {
        self.call("delete_list", move |s| s.delete_list(id)).await
    }

    // ── Items ─────────────────────────────────────────────────────────

    pub async fn get_item(&self, id: ItemId) -> Result<Item, ServiceError> {
        self.call("get_item", move |s| s.get_item(id)).await
    }

    pub async fn add_item(&self, list: ListId, item: Item) -> Result<(), ServiceError> {
        self.call("add_item", move |s| s.add_item(list, item)).await
    }

    pub async fn delete_item(&self, list: ListId, item: ItemId) -> Result<(), ServiceError> {
        self.call("delete_item", move |s| s.delete_item(list, item)).await
    }

    pub async fn rename_item(&self, list: ListId, item: ItemId, value: String) -> Result<(), ServiceError> {
        self.call("rename_item", move |s| s.rename_item(list, item, &value)).await
    }

    pub async fn set_item_status(&self, list: ListId, item: ItemId, done: bool) -> Result<(), ServiceError> {
        self.call("set_item_status", move |s| s.set_item_status(list, item, done)).await
    }

    pub async fn toggle_item_status(&self, list: ListId, item: ItemId) -> Result<bool, ServiceError> {
        self.call("toggle_item_status", move |s| s.toggle_item_status(list, item)).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Resource;
    use crate::store::MemoryStore;

    #[tokio::test]
    async fn forwards_to_backend() {
        let handle = StoreHandle::new(Arc::new(MemoryStore::new()), DEFAULT_STORE_TIMEOUT);
        let user = User::new(UserId::new(), "alice", "$argon2id$stub".into()).unwrap();
        let id = user.id();
        handle.create_user(user).await.unwrap();
        assert_eq!(handle.get_user_id_by_name("alice").await.unwrap(), id);
        assert_eq!(
            handle.get_user_id_by_name("bob").await,
            Err(ServiceError::NotFound(Resource::User))
        );
        assert_eq!(handle.backend(), "memory");
    }

    /// Delegates to a [`MemoryStore`] but stalls on user lookups.
    struct SlowStore {
        inner: MemoryStore,
        delay: Duration,
    }

    impl CredentialStore for SlowStore {
        fn backend(&self) -> &str {
            "slow"
        }
        fn get_user(&self, id: UserId) -> Result<User, ServiceError> {
            std::thread::sleep(self.delay);
            self.inner.get_user(id)
        }
        fn get_user_id_by_name(&self, name: &str) -> Result<UserId, ServiceError> {
            self.inner.get_user_id_by_name(name)
        }
        fn create_user(&self, user: User) -> Result<(), ServiceError> {
            self.inner.create_user(user)
        }
        fn delete_user(&self, id: UserId) -> Result<(), ServiceError> {
            self.inner.delete_user(id)
        }
        fn update_password(&self, id: UserId, hash: &str) -> Result<(), ServiceError> {
            self.inner.update_password(id, hash)
        }
        fn update_name(&self, id: UserId, name: &str) -> Result<(), ServiceError> {
            self.inner.update_name(id, name)
        }
        fn set_refresh_grant(&self, id: UserId, grant: Option<RefreshGrant>) -> Result<(), ServiceError> {
            self.inner.set_refresh_grant(id, grant)
        }
        fn get_user_by_refresh_digest(&self, digest: &str) -> Result<(UserId, DateTime<Utc>), ServiceError> {
            self.inner.get_user_by_refresh_digest(digest)
        }
        fn get_list(&self, id: ListId) -> Result<List, ServiceError> {
            self.inner.get_list(id)
        }
        fn create_list(&self, list: List) -> Result<(), ServiceError> {
            self.inner.create_list(list)
        }
        fn list_ids_by_owner(&self, owner: UserId) -> Result<Vec<ListId>, ServiceError> {
            self.inner.list_ids_by_owner(owner)
        }
        fn delete_list(&self, id: ListId) -> Result<(), ServiceError> {
            self.inner.delete_list(id)
        }
        fn get_item(&self, id: ItemId) -> Result<Item, ServiceError> {
            self.inner.get_item(id)
        }
        fn add_item(&self, list: ListId, item: Item) -> Result<(), ServiceError> {
            self.inner.add_item(list, item)
        }
        fn delete_item(&self, list: ListId, item: ItemId) -> Result<(), ServiceError> {
            self.inner.delete_item(list, item)
        }
        fn rename_item(&self, list: ListId, item: ItemId, value: &str) -> Result<(), ServiceError> {
            self.inner.rename_item(list, item, value)
        }
        fn set_item_status(&self, list: ListId, item: ItemId, done: bool) -> Result<(), ServiceError> {
            self.inner.set_item_status(list, item, done)
        }
        fn toggle_item_status(&self, list: ListId, item: ItemId) -> Result<bool, ServiceError> {
            self.inner.toggle_item_status(list, item)
        }
    }

    #[tokio::test]
    async fn slow_call_times_out() {
        let slow = SlowStore { inner: MemoryStore::new(), delay: Duration::from_millis(300) };
        let handle = StoreHandle::new(Arc::new(slow), Duration::from_millis(20));

        let err = handle.get_user(UserId::new()).await.unwrap_err();
        assert_eq!(err, ServiceError::StorageTimeout);
        assert!(err.is_retryable());

        // Calls that return in time are unaffected.
        assert!(handle.list_ids_by_owner(UserId::new()).await.unwrap().is_empty());
    }
}
