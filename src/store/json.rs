//! `json` backend: tables persisted as a single JSON snapshot.
//!
//! File managed under the data directory:
//! - `store.json`: `{ "users": {...}, "lists": {...}, "items": {...} }`
//!
//! Every mutation rewrites the snapshot via `store.json.tmp` + rename, so a
//! crash mid-write leaves the previous snapshot intact.

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard};

use chrono::{DateTime, Utc};
use tracing::{debug, info};

use super::tables::Tables;
use super::CredentialStore;
use crate::domain::{Item, ItemId, List, ListId, RefreshGrant, User, UserId};
use crate::error::{AppError, ServiceError};

const STORE_FILENAME: &str = "store.json";
const TMP_FILENAME: &str = "store.json.tmp";

pub struct JsonFileStore {
    path: PathBuf,
    tables: Mutex<Tables>,
}

impl JsonFileStore {
    /// Open `{data_dir}/store.json`, creating the directory and an empty
    /// snapshot if needed.
    pub fn open(data_dir: &Path) -> Result<Self, AppError> {
        fs::create_dir_all(data_dir)
            .map_err(|e| AppError::Store(format!("cannot create {}: {e}", data_dir.display())))?;

        let path = data_dir.join(STORE_FILENAME);
        let tables = if path.exists() {
            let data = fs::read_to_string(&path)
                .map_err(|e| AppError::Store(format!("cannot read {}: {e}", path.display())))?;
            serde_json::from_str(&data)
                .map_err(|e| AppError::Store(format!("malformed {}: {e}", path.display())))?
        } else {
            let empty = Tables::default();
            write_snapshot(&path, &empty).map_err(|e| AppError::Store(e.to_string()))?;
            empty
        };

        info!(path = %path.display(), "json store opened");
        Ok(Self { path, tables: Mutex::new(tables) })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn lock(&self) -> Result<MutexGuard<'_, Tables>, ServiceError> {
        self.tables
            .lock()
            .map_err(|_| ServiceError::Storage("json store lock poisoned".into()))
    }

    fn read<T>(&self, f: impl FnOnce(&Tables) -> Result<T, ServiceError>) -> Result<T, ServiceError> {
        let tables = self.lock()?;
        f(&*tables)
    }

    /// Apply `f` to a copy of the tables and persist the copy.  The in-memory
    /// tables are replaced only once the snapshot is on disk, so a failed
    /// write leaves memory and file in agreement.
    fn write<T>(&self, f: impl FnOnce(&mut Tables) -> Result<T, ServiceError>) -> Result<T, ServiceError> {
        let mut tables = self.lock()?;
        let mut next = tables.clone();
        let out = f(&mut next)?;
        write_snapshot(&self.path, &next)?;
        *tables = next;
        Ok(out)
    }
}

fn write_snapshot(path: &Path, tables: &Tables) -> Result<(), ServiceError> {
    let data = serde_json::to_string_pretty(tables)
        .map_err(|e| ServiceError::Storage(format!("serialise store: {e}")))?;
    let tmp = path.with_file_name(TMP_FILENAME);
    fs::write(&tmp, data)
        .map_err(|e| ServiceError::Storage(format!("cannot write {}: {e}", tmp.display())))?;
    fs::rename(&tmp, path)
        .map_err(|e| ServiceError::Storage(format!("cannot replace {}: {e}", path.display())))?;
    debug!(path = %path.display(), "store snapshot written");
    Ok(())
}

impl CredentialStore for JsonFileStore {
    fn backend(&self) -> &str {
        "json"
    }

    fn get_user(&self, id: UserId) -> Result<User, ServiceError> {
        self.read(|t| t.get_user(id))
    }

    fn get_user_id_by_name(&self, name: &str) -> Result<UserId, ServiceError> {
        self.read(|t| t.get_user_id_by_name(name))
    }

    fn create_user(&self, user: User) -> Result<(), ServiceError> {
        self.write(|t| t.create_user(user))
    }

    fn delete_user(&self, id: UserId) -> Result<(), ServiceError> {
        self.write(|t| t.delete_user(id))
    }

    fn update_password(&self, id: UserId, password_hash: &str) -> Result<(), ServiceError> {
        self.write(|t| t.update_password(id, password_hash))
    }

    fn update_name(&self, id: UserId, name: &str) -> Result<(), ServiceError> {
        self.write(|t| t.update_name(id, name))
    }

    fn set_refresh_grant(&self, id: UserId, grant: Option<RefreshGrant>) -> Result<(), ServiceError> {
        self.write(|t| t.set_refresh_grant(id, grant))
    }

    fn get_user_by_refresh_digest(&self, digest: &str) -> Result<(UserId, DateTime<Utc>), ServiceError> {
        self.read(|t| t.get_user_by_refresh_digest(digest))
    }

    fn get_list(&self, id: ListId) -> Result<List, ServiceError> {
        self.read(|t| t.get_list(id))
    }

    fn create_list(&self, list: List) -> Result<(), ServiceError> {
        self.write(|t| t.create_list(list))
    }

    fn list_ids_by_owner(&self, owner: UserId) -> Result<Vec<ListId>, ServiceError> {
        self.read(|t| Ok(t.list_ids_by_owner(owner)))
    }

    fn delete_list(&self, id: ListId) -> Result<(), ServiceError> {
        self.write(|t| t.delete_list(id))
    }

    fn get_item(&self, id: ItemId) -> Result<Item, ServiceError> {
        self.read(|t| t.get_item(id))
    }

    fn add_item(&self, list: ListId, item: Item) -> Result<(), ServiceError> {
        self.write(|t| t.add_item(list, item))
    }

    fn delete_item(&self, list: ListId, item: ItemId) -> Result<(), ServiceError> {
        self.write(|t| t.delete_item(list, item))
    }

    fn rename_item(&self, list: ListId, item: ItemId, value: &str) -> Result<(), ServiceError> {
        self.write(|t| t.rename_item(list, item, value))
    }

    fn set_item_status(&self, list: ListId, item: ItemId, done: bool) -> Result<(), ServiceError> {
        self.write(|t| t.set_item_status(list, item, done))
    }

    fn toggle_item_status(&self, list: ListId, item: ItemId) -> Result<bool, ServiceError> {
        self.write(|t| t.toggle_item_status(list, item))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn open_creates_empty_snapshot() {
        let tmp = TempDir::new().unwrap();
        let store = JsonFileStore::open(&tmp.path().join("data")).unwrap();
        assert!(store.path().exists());
        assert!(!tmp.path().join("data").join(TMP_FILENAME).exists());
    }

    #[test]
    fn failed_mutation_does_not_touch_snapshot() {
        let tmp = TempDir::new().unwrap();
        let store = JsonFileStore::open(tmp.path()).unwrap();
        let before = fs::read_to_string(store.path()).unwrap();
        assert!(store.delete_user(UserId::new()).is_err());
        assert_eq!(fs::read_to_string(store.path()).unwrap(), before);
    }

    #[test]
    fn failed_snapshot_write_leaves_memory_unchanged() {
        let tmp = TempDir::new().unwrap();
        let store = JsonFileStore::open(tmp.path()).unwrap();
        // A directory in place of the temp file makes every write fail.
        let blocker = tmp.path().join(TMP_FILENAME);
        fs::create_dir(&blocker).unwrap();

        let user = User::new(UserId::new(), "alice", "$argon2id$stub".into()).unwrap();
        let err = store.create_user(user.clone()).unwrap_err();
        assert!(matches!(err, ServiceError::Storage(_)));
        assert!(store.get_user_id_by_name("alice").is_err());

        fs::remove_dir(&blocker).unwrap();
        store.create_user(user.clone()).unwrap();
        let reopened = JsonFileStore::open(tmp.path()).unwrap();
        assert_eq!(reopened.get_user_id_by_name("alice").unwrap(), user.id());
    }

    #[test]
    fn malformed_snapshot_is_a_store_error() {
        let tmp = TempDir::new().unwrap();
        fs::write(tmp.path().join(STORE_FILENAME), "{ not json").unwrap();
        let err = JsonFileStore::open(tmp.path()).err().unwrap();
        assert!(err.to_string().contains("malformed"));
    }
}
