//! `memory` backend: tables held in process memory.
//!
//! Data is discarded when the process exits.  Used by tests and by the
//! binary when `[store].backend = "memory"`.

use std::sync::{Mutex, MutexGuard};

use chrono::{DateTime, Utc};

use super::tables::Tables;
use super::CredentialStore;
use crate::domain::{Item, ItemId, List, ListId, RefreshGrant, User, UserId};
use crate::error::ServiceError;

#[derive(Default)]
pub struct MemoryStore {
    tables: Mutex<Tables>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> Result<MutexGuard<'_, Tables>, ServiceError> {
        self.tables
            .lock()
            .map_err(|_| ServiceError::Storage("memory store lock poisoned".into()))
    }
}

impl CredentialStore for MemoryStore {
    fn backend(&self) -> &str {
        "memory"
    }

    fn get_user(&self, id: UserId) -> Result<User, ServiceError> {
        self.lock()?.get_user(id)
    }

    fn get_user_id_by_name(&self, name: &str) -> Result<UserId, ServiceError> {
        self.lock()?.get_user_id_by_name(name)
    }

    fn create_user(&self, user: User) -> Result<(), ServiceError> {
        self.lock()?.create_user(user)
    }

    fn delete_user(&self, id: UserId) -> Result<(), ServiceError> {
        self.lock()?.delete_user(id)
    }

    fn update_password(&self, id: UserId, password_hash: &str) -> Result<(), ServiceError> {
        self.lock()?.update_password(id, password_hash)
    }

    fn update_name(&self, id: UserId, name: &str) -> Result<(), ServiceError> {
        self.lock()?.update_name(id, name)
    }

    fn set_refresh_grant(&self, id: UserId, grant: Option<RefreshGrant>) -> Result<(), ServiceError> {
        self.lock()?.set_refresh_grant(id, grant)
    }

    fn get_user_by_refresh_digest(&self, digest: &str) -> Result<(UserId, DateTime<Utc>), ServiceError> {
        self.lock()?.get_user_by_refresh_digest(digest)
    }

    fn get_list(&self, id: ListId) -> Result<List, ServiceError> {
        self.lock()?.get_list(id)
    }

    fn create_list(&self, list: List) -> Result<(), ServiceError> {
        self.lock()?.create_list(list)
    }

    fn list_ids_by_owner(&self, owner: UserId) -> Result<Vec<ListId>, ServiceError> {
        Ok(self.lock()?.list_ids_by_owner(owner))
    }

    fn delete_list(&self, id: ListId) -> Result<(), ServiceError> {
        self.lock()?.delete_list(id)
    }

    fn get_item(&self, id: ItemId) -> Result<Item, ServiceError> {
        self.lock()?.get_item(id)
    }

    fn add_item(&self, list: ListId, item: Item) -> Result<(), ServiceError> {
        self.lock()?.add_item(list, item)
    }

    fn delete_item(&self, list: ListId, item: ItemId) -> Result<(), ServiceError> {
        self.lock()?.delete_item(list, item)
    }

    fn rename_item(&self, list: ListId, item: ItemId, value: &str) -> Result<(), ServiceError> {
        self.lock()?.rename_item(list, item, value)
    }

    fn set_item_status(&self, list: ListId, item: ItemId, done: bool) -> Result<(), ServiceError> {
        self.lock()?.set_item_status(list, item, done)
    }

    fn toggle_item_status(&self, list: ListId, item: ItemId) -> Result<bool, ServiceError> {
        self.lock()?.toggle_item_status(list, item)
    }
}
