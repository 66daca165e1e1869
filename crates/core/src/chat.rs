//! Per-contact chat logs.

use chrono::Utc;
use thiserror::Error;

use crate::{
    directory::DirectoryStore,
    models::ChatMessage,
    storage::{Storage, CHAT_PREFIX},
};

/// Failures surfaced when working with conversation logs.
#[derive(Debug, Error)]
pub enum ChatError {
    /// The addressed contact is not in the user directory.
    #[error("unknown chat contact: {0}")]
    UnknownContact(String),
    /// The log could not be persisted.
    #[error(transparent)]
    Storage(#[from] anyhow::Error),
}

/// Conversation logs, one durable partition per contact.
#[derive(Clone)]
pub struct ChatStore {
    storage: Storage,
    directory: DirectoryStore,
}

impl ChatStore {
    /// Create a chat store validating contacts against the given directory.
    pub fn new(storage: Storage, directory: DirectoryStore) -> Self {
        Self { storage, directory }
    }

    /// Messages exchanged with one contact, oldest first. A missing or
    /// corrupt log reads as empty.
    pub fn messages(&self, contact_id: &str) -> Vec<ChatMessage> {
        self.storage.read_list(&chat_key(contact_id))
    }

    /// Append a message to a contact's log. The contact must exist in the
    /// directory; an unknown contact is surfaced as an error and nothing is
    /// persisted.
    pub fn send(
        &self,
        contact_id: &str,
        sender_id: &str,
        body: &str,
    ) -> Result<ChatMessage, ChatError> {
        if self.directory.find(contact_id).is_none() {
            return Err(ChatError::UnknownContact(contact_id.to_string()));
        }

        let now = Utc::now();
        let message = ChatMessage {
            id: now.timestamp_millis().to_string(),
            sender_id: sender_id.to_string(),
            body: body.to_string(),
            created_at: now,
        };

        let key = chat_key(contact_id);
        let mut log = self.messages(contact_id);
        log.push(message.clone());
        self.storage.write_list(&key, &log)?;
        Ok(message)
    }
}

fn chat_key(contact_id: &str) -> String {
    format!("{CHAT_PREFIX}{contact_id}")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{events::EventBus, models::DirectoryUser, session::UserRole};
    use tempfile::tempdir;

    fn contact(id: &str) -> DirectoryUser {
        DirectoryUser {
            id: id.to_string(),
            name: "Helper".to_string(),
            role: UserRole::Volunteer,
            location: None,
            contact: None,
        }
    }

    #[test]
    fn sending_to_a_known_contact_appends_to_the_log() -> anyhow::Result<()> {
        let dir = tempdir()?;
        let storage = Storage::new(dir.path());
        let directory = DirectoryStore::new(storage.clone(), EventBus::new());
        directory.upsert(contact("c1"))?;
        let chat = ChatStore::new(storage.clone(), directory);

        chat.send("c1", "u1", "Is the shelter still open?")
            .expect("send");
        chat.send("c1", "c1", "Yes, until 22:00.").expect("send");

        let log = chat.messages("c1");
        assert_eq!(log.len(), 2);
        assert_eq!(log[0].body, "Is the shelter still open?");
        assert_eq!(log[1].sender_id, "c1");

        let persisted: Vec<ChatMessage> = storage.read_list("chat_c1");
        assert_eq!(persisted.len(), 2);
        Ok(())
    }

    #[test]
    fn sending_to_an_unknown_contact_is_surfaced_not_persisted() -> anyhow::Result<()> {
        let dir = tempdir()?;
        let storage = Storage::new(dir.path());
        let directory = DirectoryStore::new(storage.clone(), EventBus::new());
        let chat = ChatStore::new(storage.clone(), directory);

        let err = chat.send("ghost", "u1", "hello?").unwrap_err();
        assert!(matches!(err, ChatError::UnknownContact(id) if id == "ghost"));
        assert!(chat.messages("ghost").is_empty());
        assert!(!storage.contains("chat_ghost"));
        Ok(())
    }

    #[test]
    fn corrupt_log_reads_as_empty() -> anyhow::Result<()> {
        let dir = tempdir()?;
        std::fs::write(dir.path().join("chat_c1.json"), "[oops")?;
        let storage = Storage::new(dir.path());
        let directory = DirectoryStore::new(storage.clone(), EventBus::new());
        let chat = ChatStore::new(storage, directory);

        assert!(chat.messages("c1").is_empty());
        Ok(())
    }
}
