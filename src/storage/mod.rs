// Copyright 2025 Cowboy AI, LLC.

//! Storage port and implementations

mod memory;
mod repository;
mod session;

pub use memory::{InMemorySession, InMemoryStorage, StorageStats};
pub use repository::{Repository, StoredEntity};
pub use session::{Storage, StorageError, StorageSession};
