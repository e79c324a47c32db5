// Copyright 2025 Cowboy AI, LLC.

//! Unit of work
//!
//! [`UnitOfWork::with_transaction`] is the single entry point for running work
//! inside a transaction:
//!
//! - without a parent context it opens a **root** transaction, runs the work,
//!   and commits on success or rolls back on error, timeout or cancellation;
//! - with a parent context it **joins** the parent's transaction and never
//!   finalizes it.
//!
//! ```text
//! root ──begin──▶ Active ──work Ok──▶ commit ──▶ Committed ──▶ flush events
//!                   │
//!                   └──work Err / timeout / dropped──▶ RolledBack ──▶ discard events
//! ```

use crate::config::UnitOfWorkConfig;
use crate::errors::{DomainError, DomainResult};
use crate::events::EventBus;
use crate::feature_flags::{FlagRouter, SharedFlagRouter};
use crate::storage::Storage;
use crate::transaction::context::ServiceContext;
use crate::transaction::handle::TransactionHandle;
use crate::transaction::status::TransactionInput;
use std::future::Future;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Coordinates transactions, their storage sessions and event delivery
#[derive(Clone)]
pub struct UnitOfWork {
    storage: Arc<dyn Storage>,
    bus: Arc<EventBus>,
    flags: SharedFlagRouter,
    config: UnitOfWorkConfig,
}

impl UnitOfWork {
    /// Create a unit of work with its own event bus
    pub fn new(storage: Arc<dyn Storage>, flags: FlagRouter, config: UnitOfWorkConfig) -> Self {
        let bus = Arc::new(EventBus::from_config(&config));
        Self::with_event_bus(storage, bus, Arc::new(flags), config)
    }

    /// Create a unit of work sharing an existing bus and flag router
    pub fn with_event_bus(
        storage: Arc<dyn Storage>,
        bus: Arc<EventBus>,
        flags: SharedFlagRouter,
        config: UnitOfWorkConfig,
    ) -> Self {
        Self {
            storage,
            bus,
            flags,
            config,
        }
    }

    /// Event bus committed events are flushed to
    pub fn event_bus(&self) -> &Arc<EventBus> {
        &self.bus
    }

    /// Flags handed to every context
    pub fn flags(&self) -> &SharedFlagRouter {
        &self.flags
    }

    /// Configuration in effect
    pub fn config(&self) -> &UnitOfWorkConfig {
        &self.config
    }

    /// Run `work` inside a transaction.
    ///
    /// With `parent == None` a root transaction is opened and finalized here;
    /// the error returned by `work` is passed back unchanged after rollback.
    /// With a parent, `work` joins its transaction; a storage failure
    /// returned through the joined scope marks the transaction rollback-only.
    pub async fn with_transaction<T, F, Fut>(
        &self,
        parent: Option<&ServiceContext>,
        work: F,
    ) -> DomainResult<T>
    where
        F: FnOnce(ServiceContext) -> Fut + Send,
        Fut: Future<Output = DomainResult<T>> + Send,
        T: Send,
    {
        match parent {
            Some(ctx) => self.join(ctx, work).await,
            None => self.run_root(work).await,
        }
    }

    async fn join<T, F, Fut>(&self, ctx: &ServiceContext, work: F) -> DomainResult<T>
    where
        F: FnOnce(ServiceContext) -> Fut + Send,
        Fut: Future<Output = DomainResult<T>> + Send,
        T: Send,
    {
        let handle = ctx.handle().clone();
        handle.ensure_active("join")?;
        debug!(transaction_id = %handle.id(), "joining transaction");

        let result = work(ctx.clone()).await;
        if let Err(err) = &result {
            if err.is_storage_error() {
                handle.mark_rollback_only(err.to_string());
            }
        }
        result
    }

    async fn run_root<T, F, Fut>(&self, work: F) -> DomainResult<T>
    where
        F: FnOnce(ServiceContext) -> Fut + Send,
        Fut: Future<Output = DomainResult<T>> + Send,
        T: Send,
    {
        let session = self.storage.begin().await?;
        let handle = Arc::new(TransactionHandle::new(session));
        let transaction_id = handle.id();
        let guard = RootGuard {
            handle: handle.clone(),
            bus: self.bus.clone(),
        };
        debug!(%transaction_id, "transaction opened");

        let ctx = ServiceContext::new(handle.clone(), self.flags.clone());
        let outcome = tokio::time::timeout(self.config.transaction_timeout(), work(ctx)).await;

        let result = match outcome {
            Ok(Ok(value)) => match handle.rollback_reason() {
                None => self.commit(&handle).await.map(|()| value),
                Some(reason) => {
                    warn!(%transaction_id, reason = reason.as_str(), "transaction marked rollback-only");
                    self.rollback(&handle).await;
                    Err(DomainError::TransactionAborted {
                        transaction_id,
                        reason,
                    })
                }
            },
            Ok(Err(err)) => {
                debug!(%transaction_id, error = %err, "work failed");
                self.rollback(&handle).await;
                Err(err)
            }
            Err(_) => {
                warn!(
                    %transaction_id,
                    timeout_ms = self.config.transaction_timeout_ms,
                    "transaction timed out"
                );
                self.rollback(&handle).await;
                Err(DomainError::TransactionTimeout {
                    transaction_id,
                    timeout_ms: self.config.transaction_timeout_ms,
                })
            }
        };

        drop(guard);
        result
    }

    async fn commit(&self, handle: &TransactionHandle) -> DomainResult<()> {
        handle.ensure_active("commit")?;
        let committed = handle.raw_session().await.commit().await;

        match committed {
            Ok(()) => {
                let events = handle.finish(TransactionInput::Commit)?;
                info!(transaction_id = %handle.id(), events = events.len(), "transaction committed");
                self.bus.flush(handle.id(), events).await;
                Ok(())
            }
            Err(err) => {
                warn!(transaction_id = %handle.id(), error = %err, "commit failed");
                let events = handle.finish(TransactionInput::Rollback)?;
                self.bus.discard(handle.id(), events);
                Err(err.into())
            }
        }
    }

    async fn rollback(&self, handle: &TransactionHandle) {
        let Ok(events) = handle.finish(TransactionInput::Rollback) else {
            return;
        };
        self.bus.discard(handle.id(), events);

        if let Err(err) = handle.raw_session().await.rollback().await {
            warn!(transaction_id = %handle.id(), error = %err, "storage rollback failed");
        } else {
            debug!(transaction_id = %handle.id(), "transaction rolled back");
        }
    }
}

/// Rolls back a root transaction whose future was dropped before finishing
struct RootGuard {
    handle: Arc<TransactionHandle>,
    bus: Arc<EventBus>,
}

impl Drop for RootGuard {
    fn drop(&mut self) {
        if !self.handle.is_active() {
            return;
        }
        let Ok(events) = self.handle.finish(TransactionInput::Rollback) else {
            return;
        };
        warn!(transaction_id = %self.handle.id(), "transaction cancelled; rolling back");
        self.bus.discard(self.handle.id(), events);

        let handle = self.handle.clone();
        match tokio::runtime::Handle::try_current() {
            Ok(runtime) => {
                runtime.spawn(async move {
                    if let Err(err) = handle.raw_session().await.rollback().await {
                        warn!(transaction_id = %handle.id(), error = %err, "storage rollback failed");
                    }
                });
            }
            Err(_) => {
                warn!(
                    transaction_id = %handle.id(),
                    "no runtime available; storage session dropped without rollback"
                );
            }
        }
    }
}
