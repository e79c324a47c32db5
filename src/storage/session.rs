// Copyright 2025 Cowboy AI, LLC.

//! Storage session contract consumed by the unit of work

use async_trait::async_trait;
use serde_json::Value;
use thiserror::Error;

/// Errors reported by a storage backend
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StorageError {
    /// Failed to reach the backend
    #[error("Storage connection error: {0}")]
    ConnectionError(String),

    /// A write or read was rejected by the backend
    #[error("Storage backend error: {0}")]
    Backend(String),

    /// The backend refused to commit the session
    #[error("Storage commit failed: {0}")]
    CommitFailed(String),

    /// The session was already committed or rolled back
    #[error("Storage session already closed")]
    SessionClosed,
}

/// Transactional storage backend
#[async_trait]
pub trait Storage: Send + Sync {
    /// Begin a new session; writes stay private to it until commit
    async fn begin(&self) -> Result<Box<dyn StorageSession>, StorageError>;
}

/// One open transaction against the storage backend.
///
/// Records are JSON documents addressed by collection and id.
#[async_trait]
pub trait StorageSession: Send + Sync {
    /// Find one record
    async fn find(&mut self, collection: &str, id: &str) -> Result<Option<Value>, StorageError>;

    /// Insert or replace one record
    async fn save(&mut self, collection: &str, id: &str, record: Value)
        -> Result<(), StorageError>;

    /// All records of a collection, ordered by id
    async fn list(&mut self, collection: &str) -> Result<Vec<Value>, StorageError>;

    /// Make the session's writes durable
    async fn commit(&mut self) -> Result<(), StorageError>;

    /// Drop the session's writes
    async fn rollback(&mut self) -> Result<(), StorageError>;
}
