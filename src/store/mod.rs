//! Credential store: the persistence contract consumed by the services.
//!
//! Backends are `Send + Sync` and blocking.  Services never call them
//! directly: they go through [`StoreHandle`], which runs every call on the
//! blocking pool under a per-call timeout.
//!
//! Two backends ship with the crate:
//! - [`MemoryStore`]: process memory, discarded on exit
//! - [`JsonFileStore`]: one JSON snapshot under the data directory

mod handle;
mod json;
mod memory;
mod tables;

pub use handle::{StoreHandle, DEFAULT_STORE_TIMEOUT};
pub use json::JsonFileStore;
pub use memory::MemoryStore;

use std::path::Path;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use tracing::info;

use crate::domain::{Item, ItemId, List, ListId, RefreshGrant, User, UserId};
use crate::error::{AppError, ServiceError};

/// Lookup/mutate contract for users, lists and items.
///
/// Every method is atomic with respect to the others on the same backend.
/// Missing records surface as [`ServiceError::NotFound`]; duplicate ids or
/// names as [`ServiceError::AlreadyExists`].
pub trait CredentialStore: Send + Sync {
    /// Backend name for logs (e.g. `"memory"`).
    fn backend(&self) -> &str;

    // ── Users ─────────────────────────────────────────────────────────

    fn get_user(&self, id: UserId) -> Result<User, ServiceError>;

    fn get_user_id_by_name(&self, name: &str) -> Result<UserId, ServiceError>;

    fn create_user(&self, user: User) -> Result<(), ServiceError>;

    fn delete_user(&self, id: UserId) -> Result<(), ServiceError>;

    fn update_password(&self, id: UserId, password_hash: &str) -> Result<(), ServiceError>;

    fn update_name(&self, id: UserId, name: &str) -> Result<(), ServiceError>;

    // ── Refresh grants ────────────────────────────────────────────────

    /// Replace (or with `None`, clear) the user's single refresh grant.
    fn set_refresh_grant(&self, id: UserId, grant: Option<RefreshGrant>) -> Result<(), ServiceError>;

    fn get_user_by_refresh_digest(&self, digest: &str) -> Result<(UserId, DateTime<Utc>), ServiceError>;

    // ── Lists ─────────────────────────────────────────────────────────

    fn get_list(&self, id: ListId) -> Result<List, ServiceError>;

    fn create_list(&self, list: List) -> Result<(), ServiceError>;

    fn list_ids_by_owner(&self, owner: UserId) -> Result<Vec<ListId>, ServiceError>;

    /// Deletes the list and every item it references.
    fn delete_list(&self, id: ListId) -> Result<(), ServiceError>;

    // ── Items ─────────────────────────────────────────────────────────

    fn get_item(&self, id: ItemId) -> Result<Item, ServiceError>;

    fn add_item(&self, list: ListId, item: Item) -> Result<(), ServiceError>;

    fn delete_item(&self, list: ListId, item: ItemId) -> Result<(), ServiceError>;

    fn rename_item(&self, list: ListId, item: ItemId, value: &str) -> Result<(), ServiceError>;

    fn set_item_status(&self, list: ListId, item: ItemId, done: bool) -> Result<(), ServiceError>;

    /// Flip the done flag in one step and return the new value.
    fn toggle_item_status(&self, list: ListId, item: ItemId) -> Result<bool, ServiceError>;
}

/// Open the backend named in config.  `data_dir` is only used by `"json"`.
pub fn open_backend(backend: &str, data_dir: &Path) -> Result<Arc<dyn CredentialStore>, AppError> {
    let store: Arc<dyn CredentialStore> = match backend {
        "memory" => Arc::new(MemoryStore::new()),
        "json" => Arc::new(JsonFileStore::open(data_dir)?),
        other => return Err(AppError::Config(format!("unknown store backend: {other}"))),
    };
    info!(backend = store.backend(), "credential store opened");
    Ok(store)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn opens_known_backends() {
        let tmp = TempDir::new().unwrap();
        assert_eq!(open_backend("memory", tmp.path()).unwrap().backend(), "memory");
        assert_eq!(open_backend("json", tmp.path()).unwrap().backend(), "json");
    }

    #[test]
    fn unknown_backend_is_a_config_error() {
        let tmp = TempDir::new().unwrap();
        let err = open_backend("mongo", tmp.path()).err().unwrap();
        assert!(err.to_string().contains("unknown store backend"));
    }
}
