// Copyright 2025 Cowboy AI, LLC.

//! # CIM Unit of Work
//!
//! Transactional unit-of-work for domain services, with domain events that are
//! delivered only once the enclosing transaction commits.
//!
//! This crate provides:
//! - **Unit of Work**: root/join transaction scoping over a storage session
//! - **Service Context**: explicit binding of a call chain to one transaction
//! - **Event Bus**: commit-gated buffering and ordered, isolated delivery
//! - **Feature Flags**: read-only flag lookup resolved from defaults, project
//!   configuration and the environment
//! - **Domain Services**: retrieve / update / decorate over stored entities
//!
//! ## Guarantees
//!
//! 1. **No leaked events**: nothing emitted inside a rolled-back transaction
//!    reaches a subscriber
//! 2. **One transaction per call chain**: nested service calls join their
//!    caller's transaction and never commit it themselves
//! 3. **Exactly once**: every event of a committed transaction is dispatched
//!    once, in emission order
//!
//! ## Example
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use cim_unit_of_work::{
//!     CurrencyService, DomainService, FlagRouter, InMemoryStorage, UnitOfWork,
//!     UnitOfWorkConfig, UpdateCurrencyInput,
//! };
//!
//! # async fn run() -> cim_unit_of_work::DomainResult<()> {
//! let flags = FlagRouter::from([("tax_inclusive_pricing", true)]);
//! let uow = UnitOfWork::new(Arc::new(InMemoryStorage::new()), flags, UnitOfWorkConfig::default());
//!
//! uow.event_bus()
//!     .subscribe_fn("currency.updated", |payload, _| async move {
//!         println!("currency changed: {payload}");
//!         Ok(())
//!     })
//!     .await;
//!
//! let currencies = CurrencyService::new(uow);
//! currencies
//!     .update("usd", UpdateCurrencyInput { includes_tax: Some(true) })
//!     .await?;
//! # Ok(())
//! # }
//! ```

mod config;
mod errors;
pub mod events;
mod feature_flags;
pub mod services;
pub mod storage;
pub mod transaction;

pub use config::{DispatchMode, FlagsConfig, UnitOfWorkConfig};
pub use errors::{DomainError, DomainResult};
pub use events::{
    DispatchReport, EmitOptions, EventBus, EventMetadata, EventRecord, FnSubscriber, Subscriber,
    Subscription, SubscriptionId,
};
pub use feature_flags::{
    FeatureFlagDefinition, FlagRouter, SharedFlagRouter, BUILT_IN_FLAGS, SALES_CHANNELS,
    TAX_INCLUSIVE_PRICING,
};
pub use services::{
    project, CreateProductInput, CreateVariantInput, Currency, CurrencySelector,
    CurrencyService, CurrencyUpdated, Decoratable, DecoratedEntity, DomainService, FlagGate,
    Product, ProductEvent, ProductOption, ProductOptionValue, ProductService, ProductStatus,
    ProductVariant, ProductVariantEvent, ProductVariantService, TransactionalService,
    UpdateCurrencyInput, UpdateProductInput, UpdateVariantInput,
};
pub use storage::{
    InMemorySession, InMemoryStorage, Repository, Storage, StorageError, StorageSession,
    StorageStats, StoredEntity,
};
pub use transaction::{
    ServiceContext, SessionGuard, TransactionHandle, TransactionInput, TransactionStatus,
    UnitOfWork,
};
