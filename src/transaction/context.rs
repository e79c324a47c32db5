// Copyright 2025 Cowboy AI, LLC.

//! Service context: the explicit binding of a call chain to a transaction

use crate::errors::DomainResult;
use crate::events::{EmitOptions, EventRecord};
use crate::feature_flags::{FlagRouter, SharedFlagRouter};
use crate::transaction::handle::{SessionGuard, TransactionHandle};
use crate::transaction::status::TransactionStatus;
use serde::Serialize;
use std::fmt;
use std::sync::Arc;
use uuid::Uuid;

/// Binding of one call chain to a transaction handle and a flag router.
///
/// Contexts are threaded explicitly through service calls. Cloning one never
/// opens a new transaction; every clone refers to the same handle, and none of
/// them can commit or roll it back.
#[derive(Clone)]
pub struct ServiceContext {
    handle: Arc<TransactionHandle>,
    flags: SharedFlagRouter,
}

impl ServiceContext {
    pub(crate) fn new(handle: Arc<TransactionHandle>, flags: SharedFlagRouter) -> Self {
        Self { handle, flags }
    }

    pub(crate) fn handle(&self) -> &Arc<TransactionHandle> {
        &self.handle
    }

    /// Id of the bound transaction
    pub fn transaction_id(&self) -> Uuid {
        self.handle.id()
    }

    /// Status of the bound transaction
    pub fn status(&self) -> TransactionStatus {
        self.handle.status()
    }

    /// Whether the bound transaction is still active
    pub fn is_active(&self) -> bool {
        self.handle.is_active()
    }

    /// Flags in effect for this call chain
    pub fn flags(&self) -> &FlagRouter {
        &self.flags
    }

    /// Shared flag router
    pub fn shared_flags(&self) -> SharedFlagRouter {
        self.flags.clone()
    }

    /// Exclusive access to the transaction's storage session.
    ///
    /// Fails with `NoActiveTransaction` once the transaction was finalized.
    /// Release the guard before calling into another service on the same
    /// context; the session is not reentrant.
    pub async fn manager(&self) -> DomainResult<SessionGuard<'_>> {
        self.handle.session().await
    }

    /// Queue an event until the transaction commits
    pub fn emit<P: Serialize>(
        &self,
        event_name: impl Into<String>,
        payload: P,
        options: EmitOptions,
    ) -> DomainResult<()> {
        let payload = serde_json::to_value(payload)?;
        self.handle
            .enqueue(EventRecord::new(event_name, payload, options))
    }

    /// Number of events queued so far
    pub fn buffered_events(&self) -> usize {
        self.handle.buffered_events()
    }
}

impl fmt::Debug for ServiceContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ServiceContext")
            .field("handle", &self.handle)
            .field("enabled_flags", &self.flags.enabled_keys())
            .finish()
    }
}
