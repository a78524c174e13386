use serde::{Deserialize, Serialize};

use super::{non_empty, ItemId, ListId, UserId};
use crate::error::ServiceError;

/// A named, owned sequence of item ids.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct List {
    id: ListId,
    name: String,
    owner: UserId,
    #[serde(default)]
    items: Vec<ItemId>,
}

impl List {
    pub fn new(name: &str, owner: UserId) -> Result<Self, ServiceError> {
        if owner.is_nil() {
            return Err(ServiceError::InvalidArgument("list owner must not be nil".into()));
        }
        Ok(Self {
            id: ListId::new(),
            name: non_empty("list name", name)?,
            owner,
            items: Vec::new(),
        })
    }

    pub fn id(&self) -> ListId {
        self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn owner(&self) -> UserId {
        self.owner
    }

    pub fn items(&self) -> &[ItemId] {
        &self.items
    }

    pub fn contains(&self, item: ItemId) -> bool {
        self.items.contains(&item)
    }

    pub(crate) fn push_item(&mut self, item: ItemId) {
        self.items.push(item);
    }

    /// Returns `true` if the item was referenced.
    pub(crate) fn remove_item(&mut self, item: ItemId) -> bool {
        let before = self.items.len();
        self.items.retain(|i| *i != item);
        self.items.len() < before
    }
}

/// A single checklist entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Item {
    id: ItemId,
    value: String,
    done: bool,
}

impl Item {
    pub fn new(value: &str) -> Result<Self, ServiceError> {
        Ok(Self { id: ItemId::new(), value: non_empty("item value", value)?, done: false })
    }

    pub fn id(&self) -> ItemId {
        self.id
    }

    pub fn value(&self) -> &str {
        &self.value
    }

    pub fn done(&self) -> bool {
        self.done
    }

    pub(crate) fn set_value(&mut self, value: String) {
        self.value = value;
    }

    pub(crate) fn set_done(&mut self, done: bool) {
        self.done = done;
    }
}
