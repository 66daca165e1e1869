//! In-process change notifications.
//!
//! One bus is constructed at the composition root and handed to every
//! component that mutates or observes shared state. Events carry the affected
//! record id so subscribers can patch their view instead of reloading the
//! world.

use tokio::sync::broadcast;

/// Mutation notifications emitted by the stores and the session holder.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StoreEvent {
    /// A resource record was created.
    ResourceCreated {
        /// Id of the new record.
        id: String,
    },
    /// A resource record was updated in place.
    ResourceUpdated {
        /// Id of the patched record.
        id: String,
    },
    /// A response record was created.
    ResponseCreated {
        /// Owning user partition.
        user_id: String,
        /// Id of the new record.
        id: String,
    },
    /// A response record was updated in place.
    ResponseUpdated {
        /// Owning user partition.
        user_id: String,
        /// Id of the patched record.
        id: String,
    },
    /// The current session was established, replaced, or cleared.
    AuthStateChanged,
    /// The user directory changed.
    UsersUpdated,
}

/// Fan-out channel for [`StoreEvent`] notifications.
#[derive(Debug, Clone)]
pub struct EventBus {
    sender: broadcast::Sender<StoreEvent>,
}

impl EventBus {
    /// Create a bus with a bounded backlog per subscriber.
    pub fn new() -> Self {
        let (sender, _) = broadcast::channel(64);
        Self { sender }
    }

    /// Register a new subscriber. Slow subscribers that fall more than the
    /// backlog behind observe a lag error and can resynchronise by reloading.
    pub fn subscribe(&self) -> broadcast::Receiver<StoreEvent> {
        self.sender.subscribe()
    }

    /// Publish fire-and-forget; an event with no subscribers is dropped.
    pub fn emit(&self, event: StoreEvent) {
        let _ = self.sender.send(event);
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new()
    }
}
