//! The volunteer/NGO user directory.

use anyhow::Result;

use crate::{
    events::{EventBus, StoreEvent},
    models::DirectoryUser,
    storage::{Storage, KEY_USERS},
};

/// Directory of reachable users, persisted as one partition. Entries are
/// inserted or replaced, never deleted.
#[derive(Clone)]
pub struct DirectoryStore {
    storage: Storage,
    events: EventBus,
}

impl DirectoryStore {
    /// Create a directory over the given storage.
    pub fn new(storage: Storage, events: EventBus) -> Self {
        Self { storage, events }
    }

    /// All directory entries. A missing or corrupt partition reads as empty.
    pub fn users(&self) -> Vec<DirectoryUser> {
        self.storage.read_list(KEY_USERS)
    }

    /// Look up one entry by user id.
    pub fn find(&self, id: &str) -> Option<DirectoryUser> {
        self.users().into_iter().find(|user| user.id == id)
    }

    /// Insert or replace an entry by id, then notify subscribers.
    pub fn upsert(&self, user: DirectoryUser) -> Result<DirectoryUser> {
        let mut users = self.users();
        match users.iter().position(|existing| existing.id == user.id) {
            Some(pos) => users[pos] = user.clone(),
            None => users.push(user.clone()),
        }
        self.storage.write_list(KEY_USERS, &users)?;
        self.events.emit(StoreEvent::UsersUpdated);
        Ok(user)
    }
}
