//! External change notifications for the durable partitions.
//!
//! Another process writing the same store is observed through the
//! filesystem. The watcher classifies raw path events into partition-level
//! changes so consumers reload only what actually moved.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use notify::{Event, RecommendedWatcher, RecursiveMode, Watcher};
use tokio::sync::mpsc;
use tracing::warn;

use crate::storage::{
    CHAT_PREFIX, KEY_AUTH_USER, KEY_RESOURCES, KEY_RESOURCE_REQUESTS, KEY_USERS, RESPONSES_PREFIX,
};

/// A change to one known partition, observed on disk. Unknown files under
/// the store root are ignored.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PartitionChange {
    /// The resource collection (or its legacy partition) changed.
    Resources,
    /// One user's response partition changed.
    Responses {
        /// Owner of the changed partition.
        user_id: String,
    },
    /// The stored session changed.
    Session,
    /// The user directory changed.
    Users,
    /// One conversation log changed.
    Chat {
        /// Contact the changed log belongs to.
        contact_id: String,
    },
}

/// Watches the store root and forwards classified partition changes.
pub struct StoreWatcher {
    root: PathBuf,
}

impl StoreWatcher {
    /// Create a watcher for the given store root.
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Start watching. Changes arrive on the returned channel; the returned
    /// watcher handle must be kept alive for as long as events are wanted.
    pub fn spawn(self) -> Result<(mpsc::Receiver<PartitionChange>, RecommendedWatcher)> {
        let (tx, rx) = mpsc::channel(16);
        let mut watcher =
            notify::recommended_watcher(move |result: notify::Result<Event>| match result {
                Ok(event) => {
                    for path in &event.paths {
                        if let Some(change) = classify_path(path) {
                            let _ = tx.blocking_send(change);
                        }
                    }
                }
                Err(err) => warn!("store watch error: {err}"),
            })
            .context("failed to create store watcher")?;
        watcher
            .watch(&self.root, RecursiveMode::NonRecursive)
            .with_context(|| format!("failed to watch {}", self.root.display()))?;
        Ok((rx, watcher))
    }
}

fn classify_path(path: &Path) -> Option<PartitionChange> {
    if path.extension().and_then(|ext| ext.to_str()) != Some("json") {
        return None;
    }
    let key = path.file_stem()?.to_str()?;
    classify_key(key)
}

/// Map a partition key to the change it represents; `None` for keys this
/// store does not know about.
pub fn classify_key(key: &str) -> Option<PartitionChange> {
    if key == KEY_RESOURCES || key == KEY_RESOURCE_REQUESTS {
        return Some(PartitionChange::Resources);
    }
    if key == KEY_AUTH_USER {
        return Some(PartitionChange::Session);
    }
    if key == KEY_USERS {
        return Some(PartitionChange::Users);
    }
    if let Some(user_id) = key.strip_prefix(RESPONSES_PREFIX) {
        if !user_id.is_empty() {
            return Some(PartitionChange::Responses {
                user_id: user_id.to_string(),
            });
        }
    }
    if let Some(contact_id) = key.strip_prefix(CHAT_PREFIX) {
        if !contact_id.is_empty() {
            return Some(PartitionChange::Chat {
                contact_id: contact_id.to_string(),
            });
        }
    }
    None
}
