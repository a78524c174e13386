//! In-memory tables shared by the reference backends.
//!
//! The backends wrap a [`Tables`] in a `Mutex`; the JSON backend also
//! serialises it after every mutation.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::domain::{Item, ItemId, List, ListId, RefreshGrant, User, UserId};
use crate::error::{Resource, ServiceError};

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub(super) struct Tables {
    #[serde(default)]
    users: HashMap<UserId, User>,
    #[serde(default)]
    lists: HashMap<ListId, List>,
    #[serde(default)]
    items: HashMap<ItemId, Item>,
}

impl Tables {
    // ── Users ─────────────────────────────────────────────────────────

    pub fn get_user(&self, id: UserId) -> Result<User, ServiceError> {
        self.users.get(&id).cloned().ok_or(ServiceError::NotFound(Resource::User))
    }

    pub fn get_user_id_by_name(&self, name: &str) -> Result<UserId, ServiceError> {
        self.users
            .values()
            .find(|u| u.name() == name)
            .map(User::id)
            .ok_or(ServiceError::NotFound(Resource::User))
    }

    pub fn create_user(&mut self, user: User) -> Result<(), ServiceError> {
        if self.users.contains_key(&user.id()) {
            return Err(ServiceError::AlreadyExists(format!("user {}", user.id())));
        }
        self.ensure_name_free(user.name(), None)?;
        self.users.insert(user.id(), user);
        Ok(())
    }

    pub fn delete_user(&mut self, id: UserId) -> Result<(), ServiceError> {
        self.users
            .remove(&id)
            .map(|_| ())
            .ok_or(ServiceError::NotFound(Resource::User))
    }

    pub fn update_password(&mut self, id: UserId, password_hash: &str) -> Result<(), ServiceError> {
        self.user_mut(id)?.set_password_hash(password_hash.to_string());
        Ok(())
    }

    pub fn update_name(&mut self, id: UserId, name: &str) -> Result<(), ServiceError> {
        self.ensure_name_free(name, Some(id))?;
        self.user_mut(id)?.set_name(name.to_string());
        Ok(())
    }

    fn user_mut(&mut self, id: UserId) -> Result<&mut User, ServiceError> {
        self.users.get_mut(&id).ok_or(ServiceError::NotFound(Resource::User))
    }

    fn ensure_name_free(&self, name: &str, except: Option<UserId>) -> Result<(), ServiceError> {
        let taken = self
            .users
            .values()
            .any(|u| u.name() == name && Some(u.id()) != except);
        if taken {
            return Err(ServiceError::AlreadyExists(format!("user name '{name}'")));
        }
        Ok(())
    }

    // ── Refresh grants ────────────────────────────────────────────────

    pub fn set_refresh_grant(&mut self, id: UserId, grant: Option<RefreshGrant>) -> Result<(), ServiceError> {
        self.user_mut(id)?.set_refresh(grant);
        Ok(())
    }

    pub fn get_user_by_refresh_digest(&self, digest: &str) -> Result<(UserId, DateTime<Utc>), ServiceError> {
        self.users
            .values()
            .find_map(|u| {
                u.refresh()
                    .filter(|g| g.token_digest == digest)
                    .map(|g| (u.id(), g.expires_at))
            })
            .ok_or(ServiceError::NotFound(Resource::User))
    }

    // ── Lists ─────────────────────────────────────────────────────────

    pub fn get_list(&self, id: ListId) -> Result<List, ServiceError> {
        self.lists.get(&id).cloned().ok_or(ServiceError::NotFound(Resource::List))
    }

    pub fn create_list(&mut self, list: List) -> Result<(), ServiceError> {
        if self.lists.contains_key(&list.id()) {
            return Err(ServiceError::AlreadyExists(format!("list {}", list.id())));
        }
        self.lists.insert(list.id(), list);
        Ok(())
    }

    /// Sorted so callers see a stable order.
    pub fn list_ids_by_owner(&self, owner: UserId) -> Vec<ListId> {
        let mut ids: Vec<ListId> = self
            .lists
            .values()
            .filter(|l| l.owner() == owner)
            .map(List::id)
            .collect();
        ids.sort();
        ids
    }

    pub fn delete_list(&mut self, id: ListId) -> Result<(), ServiceError> {
        let list = self.lists.remove(&id).ok_or(ServiceError::NotFound(Resource::List))?;
        for item in list.items() {
            self.items.remove(item);
        }
        Ok(())
    }

    // ── Items ─────────────────────────────────────────────────────────

    pub fn get_item(&self, id: ItemId) -> Result<Item, ServiceError> {
        self.items.get(&id).cloned().ok_or(ServiceError::NotFound(Resource::Item))
    }

    pub fn add_item(&mut self, list: ListId, item: Item) -> Result<(), ServiceError> {
        if self.items.contains_key(&item.id()) {
            return Err(ServiceError::AlreadyExists(format!("item {}", item.id())));
        }
        let target = self.lists.get_mut(&list).ok_or(ServiceError::NotFound(Resource::List))?;
        target.push_item(item.id());
        self.items.insert(item.id(), item);
        Ok(())
    }

    pub fn delete_item(&mut self, list: ListId, item: ItemId) -> Result<(), ServiceError> {
        let target = self.lists.get_mut(&list).ok_or(ServiceError::NotFound(Resource::List))?;
        if !target.remove_item(item) {
            return Err(ServiceError::NotFound(Resource::Item));
        }
        self.items.remove(&item);
        Ok(())
    }

    pub fn rename_item(&mut self, list: ListId, item: ItemId, value: &str) -> Result<(), ServiceError> {
        self.item_in_list_mut(list, item)?.set_value(value.to_string());
        Ok(())
    }

    pub fn set_item_status(&mut self, list: ListId, item: ItemId, done: bool) -> Result<(), ServiceError> {
        self.item_in_list_mut(list, item)?.set_done(done);
        Ok(())
    }

    pub fn toggle_item_status(&mut self, list: ListId, item: ItemId) -> Result<bool, ServiceError> {
        let target = self.item_in_list_mut(list, item)?;
        let done = !target.done();
        target.set_done(done);
        Ok(done)
    }

    fn item_in_list_mut(&mut self, list: ListId, item: ItemId) -> Result<&mut Item, ServiceError> {
        let owner_list = self.lists.get(&list).ok_or(ServiceError::NotFound(Resource::List))?;
        if !owner_list.contains(item) {
            return Err(ServiceError::NotFound(Resource::Item));
        }
        self.items.get_mut(&item).ok_or(ServiceError::NotFound(Resource::Item))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn user(name: &str) -> User {
        User::new(UserId::new(), name, "$argon2id$stub".into()).unwrap()
    }

    #[test]
    fn names_are_unique() {
        let mut t = Tables::default();
        t.create_user(user("alice")).unwrap();
        let err = t.create_user(user("alice")).unwrap_err();
        assert!(matches!(err, ServiceError::AlreadyExists(_)));
    }

    #[test]
    fn rename_to_own_name_is_allowed() {
        let mut t = Tables::default();
        let u = user("alice");
        let id = u.id();
        t.create_user(u).unwrap();
        t.update_name(id, "alice").unwrap();
        t.create_user(user("bob")).unwrap();
        assert!(t.update_name(id, "bob").is_err());
    }

    #[test]
    fn refresh_lookup_matches_digest_only() {
        let mut t = Tables::default();
        let u = user("alice");
        let id = u.id();
        t.create_user(u).unwrap();
        let expires_at = Utc::now() + Duration::days(1);
        t.set_refresh_grant(id, Some(RefreshGrant { token_digest: "abc".into(), expires_at }))
            .unwrap();

        assert_eq!(t.get_user_by_refresh_digest("abc").unwrap(), (id, expires_at));
        assert!(t.get_user_by_refresh_digest("abd").is_err());

        t.set_refresh_grant(id, None).unwrap();
        assert!(t.get_user_by_refresh_digest("abc").is_err());
    }

    #[test]
    fn deleting_a_list_deletes_its_items() {
        let mut t = Tables::default();
        let owner = UserId::new();
        let list = List::new("groceries", owner).unwrap();
        let list_id = list.id();
        t.create_list(list).unwrap();
        let item = Item::new("milk").unwrap();
        let item_id = item.id();
        t.add_item(list_id, item).unwrap();

        t.delete_list(list_id).unwrap();
        assert_eq!(t.get_item(item_id), Err(ServiceError::NotFound(Resource::Item)));
        assert!(t.list_ids_by_owner(owner).is_empty());
    }

    #[test]
    fn item_ops_require_membership() {
        let mut t = Tables::default();
        let owner = UserId::new();
        let a = List::new("a", owner).unwrap();
        let b = List::new("b", owner).unwrap();
        let (a_id, b_id) = (a.id(), b.id());
        t.create_list(a).unwrap();
        t.create_list(b).unwrap();
        let item = Item::new("x").unwrap();
        let item_id = item.id();
        t.add_item(a_id, item).unwrap();

        assert_eq!(t.set_item_status(b_id, item_id, true), Err(ServiceError::NotFound(Resource::Item)));
        assert_eq!(t.delete_item(b_id, item_id), Err(ServiceError::NotFound(Resource::Item)));
        t.set_item_status(a_id, item_id, true).unwrap();
        assert!(t.get_item(item_id).unwrap().done());

        assert_eq!(t.toggle_item_status(b_id, item_id), Err(ServiceError::NotFound(Resource::Item)));
        assert_eq!(t.toggle_item_status(a_id, item_id), Ok(false));
        assert_eq!(t.toggle_item_status(a_id, item_id), Ok(true));
    }

    #[test]
    fn add_item_to_missing_list_fails() {
        let mut t = Tables::default();
        let err = t.add_item(ListId::new(), Item::new("x").unwrap()).unwrap_err();
        assert_eq!(err, ServiceError::NotFound(Resource::List));
    }
}
