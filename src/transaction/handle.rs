// Copyright 2025 Cowboy AI, LLC.

//! Transaction handles
//!
//! A [`TransactionHandle`] owns one storage session and the ordered buffer of
//! events queued while the transaction is active. Only the root scope that
//! opened the handle finalizes it.

use crate::errors::{DomainError, DomainResult};
use crate::events::EventRecord;
use crate::storage::StorageSession;
use crate::transaction::status::{TransactionInput, TransactionStatus};
use std::fmt;
use std::ops::{Deref, DerefMut};
use std::sync::{Mutex, MutexGuard, PoisonError};
use uuid::Uuid;

struct HandleState {
    status: TransactionStatus,
    buffer: Vec<EventRecord>,
    rollback_only: Option<String>,
}

/// One logical unit of work
pub struct TransactionHandle {
    id: Uuid,
    session: tokio::sync::Mutex<Box<dyn StorageSession>>,
    state: Mutex<HandleState>,
}

impl TransactionHandle {
    pub(crate) fn new(session: Box<dyn StorageSession>) -> Self {
        Self {
            id: Uuid::new_v4(),
            session: tokio::sync::Mutex::new(session),
            state: Mutex::new(HandleState {
                status: TransactionStatus::Active,
                buffer: Vec::new(),
                rollback_only: None,
            }),
        }
    }

    fn state(&self) -> MutexGuard<'_, HandleState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Unique transaction id
    pub fn id(&self) -> Uuid {
        self.id
    }

    /// Current status
    pub fn status(&self) -> TransactionStatus {
        self.state().status
    }

    /// Whether the handle still accepts work
    pub fn is_active(&self) -> bool {
        self.status() == TransactionStatus::Active
    }

    /// Number of events waiting for commit
    pub fn buffered_events(&self) -> usize {
        self.state().buffer.len()
    }

    /// Fail with `InvalidTransactionState` unless active
    pub(crate) fn ensure_active(&self, operation: &str) -> DomainResult<()> {
        let status = self.status();
        if status == TransactionStatus::Active {
            Ok(())
        } else {
            Err(DomainError::invalid_state(self.id, status, operation))
        }
    }

    /// Append an event to the buffer
    pub(crate) fn enqueue(&self, record: EventRecord) -> DomainResult<()> {
        let mut state = self.state();
        if state.status != TransactionStatus::Active {
            let status = state.status;
            drop(state);
            return Err(DomainError::invalid_state(self.id, status, "emit into"));
        }
        let sequence = state.buffer.len() as u64;
        state.buffer.push(record.queued_in(self.id, sequence));
        Ok(())
    }

    /// Force the root to roll back even if its work returns normally
    pub(crate) fn mark_rollback_only(&self, reason: String) {
        let mut state = self.state();
        if state.rollback_only.is_none() {
            state.rollback_only = Some(reason);
        }
    }

    /// Why the handle must roll back, if it was marked
    pub(crate) fn rollback_reason(&self) -> Option<String> {
        self.state().rollback_only.clone()
    }

    /// Move to a terminal status, handing back the buffered events
    pub(crate) fn finish(&self, input: TransactionInput) -> DomainResult<Vec<EventRecord>> {
        let mut state = self.state();
        match state.status.next(input) {
            Some(next) => {
                state.status = next;
                Ok(std::mem::take(&mut state.buffer))
            }
            None => {
                let status = state.status;
                drop(state);
                let operation = match input {
                    TransactionInput::Commit => "commit",
                    TransactionInput::Rollback => "roll back",
                };
                Err(DomainError::invalid_state(self.id, status, operation))
            }
        }
    }

    /// Exclusive access to the storage session while the handle is active
    pub(crate) async fn session(&self) -> DomainResult<SessionGuard<'_>> {
        if !self.is_active() {
            return Err(DomainError::NoActiveTransaction);
        }
        let guard = self.session.lock().await;
        // the root may have finalized the handle while we waited
        if !self.is_active() {
            return Err(DomainError::NoActiveTransaction);
        }
        Ok(SessionGuard { guard })
    }

    /// Session access for finalization, regardless of status
    pub(crate) async fn raw_session(&self) -> SessionGuard<'_> {
        SessionGuard {
            guard: self.session.lock().await,
        }
    }
}

impl fmt::Debug for TransactionHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = self.state();
        f.debug_struct("TransactionHandle")
            .field("id", &self.id)
            .field("status", &state.status)
            .field("buffered_events", &state.buffer.len())
            .field("rollback_only", &state.rollback_only)
            .finish()
    }
}

/// Exclusive borrow of a transaction's storage session
pub struct SessionGuard<'a> {
    guard: tokio::sync::MutexGuard<'a, Box<dyn StorageSession>>,
}

impl Deref for SessionGuard<'_> {
    type Target = dyn StorageSession;

    fn deref(&self) -> &Self::Target {
        &**self.guard
    }
}

impl DerefMut for SessionGuard<'_> {
    fn deref_mut(&mut self) -> &mut Self::Target {
        &mut **self.guard
    }
}
