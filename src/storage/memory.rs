// Copyright 2025 Cowboy AI, LLC.

//! In-memory transactional storage
//!
//! Each session stages its writes privately and applies them atomically on
//! commit. Counters and failure switches make it usable as a test double.

use crate::storage::{Storage, StorageError, StorageSession};
use async_trait::async_trait;
use serde_json::Value;
use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use tokio::sync::RwLock;

type Collections = HashMap<String, BTreeMap<String, Value>>;

/// Session counters
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct StorageStats {
    /// Sessions begun
    pub begun: usize,
    /// Sessions committed
    pub commits: usize,
    /// Sessions rolled back
    pub rollbacks: usize,
}

#[derive(Debug, Default)]
struct Counters {
    begun: AtomicUsize,
    commits: AtomicUsize,
    rollbacks: AtomicUsize,
}

/// In-memory storage backend
#[derive(Debug, Clone, Default)]
pub struct InMemoryStorage {
    committed: Arc<RwLock<Collections>>,
    counters: Arc<Counters>,
    failing_collections: Arc<RwLock<HashSet<String>>>,
    fail_next_commit: Arc<AtomicBool>,
}

impl InMemoryStorage {
    /// Create an empty storage
    pub fn new() -> Self {
        Self::default()
    }

    /// Write a committed record directly, outside any session
    pub async fn seed(&self, collection: &str, id: &str, record: Value) {
        self.committed
            .write()
            .await
            .entry(collection.to_string())
            .or_default()
            .insert(id.to_string(), record);
    }

    /// Read a committed record
    pub async fn committed_record(&self, collection: &str, id: &str) -> Option<Value> {
        self.committed
            .read()
            .await
            .get(collection)
            .and_then(|records| records.get(id))
            .cloned()
    }

    /// Make every save into `collection` fail
    pub async fn fail_saves_to(&self, collection: &str) {
        self.failing_collections
            .write()
            .await
            .insert(collection.to_string());
    }

    /// Make the next commit fail
    pub fn fail_next_commit(&self) {
        self.fail_next_commit.store(true, Ordering::SeqCst);
    }

    /// Current session counters
    pub fn stats(&self) -> StorageStats {
        StorageStats {
            begun: self.counters.begun.load(Ordering::SeqCst),
            commits: self.counters.commits.load(Ordering::SeqCst),
            rollbacks: self.counters.rollbacks.load(Ordering::SeqCst),
        }
    }
}

#[async_trait]
impl Storage for InMemoryStorage {
    async fn begin(&self) -> Result<Box<dyn StorageSession>, StorageError> {
        self.counters.begun.fetch_add(1, Ordering::SeqCst);
        Ok(Box::new(InMemorySession {
            storage: self.clone(),
            staged: Collections::new(),
            closed: false,
        }))
    }
}

/// A session over [`InMemoryStorage`]
#[derive(Debug)]
pub struct InMemorySession {
    storage: InMemoryStorage,
    staged: Collections,
    closed: bool,
}

impl InMemorySession {
    fn ensure_open(&self) -> Result<(), StorageError> {
        if self.closed {
            Err(StorageError::SessionClosed)
        } else {
            Ok(())
        }
    }
}

#[async_trait]
impl StorageSession for InMemorySession {
    async fn find(&mut self, collection: &str, id: &str) -> Result<Option<Value>, StorageError> {
        self.ensure_open()?;
        if let Some(record) = self.staged.get(collection).and_then(|r| r.get(id)) {
            return Ok(Some(record.clone()));
        }
        Ok(self.storage.committed_record(collection, id).await)
    }

    async fn save(
        &mut self,
        collection: &str,
        id: &str,
        record: Value,
    ) -> Result<(), StorageError> {
        self.ensure_open()?;
        if self
            .storage
            .failing_collections
            .read()
            .await
            .contains(collection)
        {
            return Err(StorageError::Backend(format!(
                "write to {collection} rejected"
            )));
        }
        self.staged
            .entry(collection.to_string())
            .or_default()
            .insert(id.to_string(), record);
        Ok(())
    }

    async fn list(&mut self, collection: &str) -> Result<Vec<Value>, StorageError> {
        self.ensure_open()?;
        let mut merged = self
            .storage
            .committed
            .read()
            .await
            .get(collection)
            .cloned()
            .unwrap_or_default();
        if let Some(staged) = self.staged.get(collection) {
            merged.extend(staged.iter().map(|(k, v)| (k.clone(), v.clone())));
        }
        Ok(merged.into_values().collect())
    }

    async fn commit(&mut self) -> Result<(), StorageError> {
        self.ensure_open()?;
        self.closed = true;
        if self.storage.fail_next_commit.swap(false, Ordering::SeqCst) {
            self.staged.clear();
            self.storage.counters.rollbacks.fetch_add(1, Ordering::SeqCst);
            return Err(StorageError::CommitFailed("injected commit failure".into()));
        }

        let mut committed = self.storage.committed.write().await;
        for (collection, records) in self.staged.drain() {
            committed.entry(collection).or_default().extend(records);
        }
        self.storage.counters.commits.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    async fn rollback(&mut self) -> Result<(), StorageError> {
        self.ensure_open()?;
        self.closed = true;
        self.staged.clear();
        self.storage.counters.rollbacks.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}
