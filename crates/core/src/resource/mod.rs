//! Resource records and their synchronisation.

/// Observable resource/response store.
pub mod store;
/// Durable-partition change watching.
pub mod watch;

pub use store::ResourceStore;
pub use watch::{PartitionChange, StoreWatcher};
