//! Todo service: list and item operations, each gated by ownership.

use tracing::{debug, info};

use super::gate::AccessGate;
use crate::domain::{non_empty, Item, ItemId, List, ListId};
use crate::error::ServiceError;
use crate::store::StoreHandle;

#[derive(Clone)]
pub struct TodoService {
    gate: AccessGate,
    store: StoreHandle,
}

impl TodoService {
    pub fn new(gate: AccessGate, store: StoreHandle) -> Self {
        Self { gate, store }
    }

    // ── Lists ─────────────────────────────────────────────────────────

    pub async fn create_list(&self, token: &str, name: &str) -> Result<ListId, ServiceError> {
        let user_id = self.gate.authenticate(token)?;
        let list = List::new(name, user_id)?;
        let list_id = list.id();
        self.store.create_list(list).await?;
        info!(user_id = %user_id, list_id = %list_id, "list created");
        Ok(list_id)
    }

    pub async fn get_list(&self, token: &str, list_id: ListId) -> Result<List, ServiceError> {
        let user_id = self.gate.authenticate(token)?;
        self.gate.authorize_list(user_id, list_id).await
    }

    /// Ids of every list the caller owns.
    pub async fn get_lists(&self, token: &str) -> Result<Vec<ListId>, ServiceError> {
        let user_id = self.gate.authenticate(token)?;
        self.store.list_ids_by_owner(user_id).await
    }

    /// Deletes the list together with its items.
    pub async fn delete_list(&self, token: &str, list_id: ListId) -> Result<(), ServiceError> {
        let user_id = self.gate.authenticate(token)?;
        self.gate.authorize_list(user_id, list_id).await?;
        self.store.delete_list(list_id).await?;
        info!(user_id = %user_id, list_id = %list_id, "list deleted");
        Ok(())
    }

    // ── Items ─────────────────────────────────────────────────────────

    pub async fn get_item(&self, token: &str, list_id: ListId, item_id: ItemId) -> Result<Item, ServiceError> {
        let user_id = self.gate.authenticate(token)?;
        self.gate.authorize_item(user_id, list_id, item_id).await?;
        self.store.get_item(item_id).await
    }

    pub async fn add_item(&self, token: &str, list_id: ListId, value: &str) -> Result<ItemId, ServiceError> {
        let user_id = self.gate.authenticate(token)?;
        self.gate.authorize_list(user_id, list_id).await?;
        let item = Item::new(value)?;
        let item_id = item.id();
        self.store.add_item(list_id, item).await?;
        debug!(user_id = %user_id, list_id = %list_id, item_id = %item_id, "item added");
        Ok(item_id)
    }

    pub async fn delete_item(&self, token: &str, list_id: ListId, item_id: ItemId) -> Result<(), ServiceError> {
        let user_id = self.gate.authenticate(token)?;
        self.gate.authorize_item(user_id, list_id, item_id).await?;
        self.store.delete_item(list_id, item_id).await?;
        debug!(user_id = %user_id, list_id = %list_id, item_id = %item_id, "item deleted");
        Ok(())
    }

    pub async fn set_item_status(
        &self,
        token: &str,
        list_id: ListId,
        item_id: ItemId,
        done: bool,
    ) -> Result<(), ServiceError> {
        let user_id = self.gate.authenticate(token)?;
        self.gate.authorize_item(user_id, list_id, item_id).await?;
        self.store.set_item_status(list_id, item_id, done).await
    }

    /// Flip the done flag and return the new value.  The read and the write
    /// happen in a single store call, so concurrent toggles do not lose an
    /// update.
    pub async fn toggle_item(&self, token: &str, list_id: ListId, item_id: ItemId) -> Result<bool, ServiceError> {
        let user_id = self.gate.authenticate(token)?;
        self.gate.authorize_item(user_id, list_id, item_id).await?;
        self.store.toggle_item_status(list_id, item_id).await
    }

    pub async fn rename_item(
        &self,
        token: &str,
        list_id: ListId,
        item_id: ItemId,
        value: &str,
    ) -> Result<(), ServiceError> {
        let user_id = self.gate.authenticate(token)?;
        let value = non_empty("item value", value)?;
        self.gate.authorize_item(user_id, list_id, item_id).await?;
        self.store.rename_item(list_id, item_id, value).await
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::auth::{OsRandom, TokenManager, TokenSettings};
    use crate::domain::UserId;
    use crate::error::Resource;
    use crate::store::{MemoryStore, DEFAULT_STORE_TIMEOUT};

    struct Fixture {
        todos: TodoService,
        tokens: Arc<TokenManager>,
    }

    impl Fixture {
        fn new() -> Self {
            let tokens = Arc::new(
                TokenManager::new(b"todo-test-key-todo-test-key-todo", TokenSettings::default(), Arc::new(OsRandom))
                    .unwrap(),
            );
            let store = StoreHandle::new(Arc::new(MemoryStore::new()), DEFAULT_STORE_TIMEOUT);
            let gate = AccessGate::new(Arc::clone(&tokens), store.clone());
            Self { todos: TodoService::new(gate, store), tokens }
        }

        fn token(&self) -> String {
            self.tokens.issue_access_token(UserId::new()).unwrap()
        }
    }

    #[tokio::test]
    async fn list_lifecycle() {
        let f = Fixture::new();
        let t = f.token();

        let list_id = f.todos.create_list(&t, "groceries").await.unwrap();
        assert_eq!(f.todos.get_lists(&t).await.unwrap(), vec![list_id]);
        assert_eq!(f.todos.get_list(&t, list_id).await.unwrap().name(), "groceries");

        f.todos.delete_list(&t, list_id).await.unwrap();
        assert!(f.todos.get_lists(&t).await.unwrap().is_empty());
        assert_eq!(
            f.todos.get_list(&t, list_id).await,
            Err(ServiceError::NotFound(Resource::List))
        );
    }

    #[tokio::test]
    async fn item_lifecycle() {
        let f = Fixture::new();
        let t = f.token();
        let list_id = f.todos.create_list(&t, "groceries").await.unwrap();

        let item_id = f.todos.add_item(&t, list_id, "milk").await.unwrap();
        let item = f.todos.get_item(&t, list_id, item_id).await.unwrap();
        assert_eq!(item.value(), "milk");
        assert!(!item.done());

        assert!(f.todos.toggle_item(&t, list_id, item_id).await.unwrap());
        assert!(!f.todos.toggle_item(&t, list_id, item_id).await.unwrap());

        f.todos.set_item_status(&t, list_id, item_id, true).await.unwrap();
        f.todos.rename_item(&t, list_id, item_id, "oat milk").await.unwrap();
        let item = f.todos.get_item(&t, list_id, item_id).await.unwrap();
        assert_eq!((item.value(), item.done()), ("oat milk", true));

        f.todos.delete_item(&t, list_id, item_id).await.unwrap();
        assert_eq!(
            f.todos.get_item(&t, list_id, item_id).await,
            Err(ServiceError::NotFound(Resource::Item))
        );
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn concurrent_toggles_are_not_lost() {
        let f = Fixture::new();
        let t = f.token();
        let list_id = f.todos.create_list(&t, "chores").await.unwrap();
        let item_id = f.todos.add_item(&t, list_id, "dishes").await.unwrap();

        let mut tasks = Vec::new();
        for _ in 0..10 {
            let todos = f.todos.clone();
            let t = t.clone();
            tasks.push(tokio::spawn(async move { todos.toggle_item(&t, list_id, item_id).await }));
        }
        for task in tasks {
            task.await.unwrap().unwrap();
        }

        // An even number of flips lands back on the starting value.
        assert!(!f.todos.get_item(&t, list_id, item_id).await.unwrap().done());
    }

    #[tokio::test]
    async fn empty_values_are_rejected() {
        let f = Fixture::new();
        let t = f.token();
        assert!(matches!(f.todos.create_list(&t, " ").await, Err(ServiceError::InvalidArgument(_))));

        let list_id = f.todos.create_list(&t, "chores").await.unwrap();
        assert!(matches!(f.todos.add_item(&t, list_id, "").await, Err(ServiceError::InvalidArgument(_))));
        let item_id = f.todos.add_item(&t, list_id, "dishes").await.unwrap();
        assert!(matches!(
            f.todos.rename_item(&t, list_id, item_id, "  ").await,
            Err(ServiceError::InvalidArgument(_))
        ));
    }

    #[tokio::test]
    async fn every_operation_requires_a_valid_token() {
        let f = Fixture::new();
        let (list_id, item_id) = (ListId::new(), ItemId::new());
        assert_eq!(f.todos.create_list("bad", "x").await, Err(ServiceError::InvalidToken));
        assert_eq!(f.todos.get_lists("bad").await, Err(ServiceError::InvalidToken));
        assert_eq!(f.todos.add_item("bad", list_id, "x").await, Err(ServiceError::InvalidToken));
        assert_eq!(f.todos.toggle_item("bad", list_id, item_id).await, Err(ServiceError::InvalidToken));
    }
}
