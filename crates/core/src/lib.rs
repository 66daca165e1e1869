#![warn(clippy::all, missing_docs)]

//! Core domain logic for the Relief coordination app.
//!
//! This crate hosts the data models, configuration handling,
//! durable partition storage, the observable resource store, chat and
//! directory partitions, and the auth session layer used by the CLI
//! frontend and any future frontends.

pub mod chat;
pub mod config;
pub mod directory;
pub mod events;
pub mod models;
pub mod resource;
pub mod session;
pub mod storage;

pub use chat::{ChatError, ChatStore};
pub use config::AppConfig;
pub use directory::DirectoryStore;
pub use events::{EventBus, StoreEvent};
pub use models::{Resource, ResourceDraft, ResourceResponse, ResponseDraft, ResponseUpdate};
pub use resource::{PartitionChange, ResourceStore, StoreWatcher};
pub use session::{
    AuthError, HttpIdentityService, IdentityService, ProfileUpdate, SessionHolder, UserProfile,
    UserRole,
};
pub use storage::Storage;
