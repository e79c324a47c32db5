// Copyright 2025 Cowboy AI, LLC.

//! Domain services
//!
//! Every service is a cheap, cloneable value holding the [`UnitOfWork`] and an
//! optional [`ServiceContext`]. An unscoped service opens a root transaction on
//! each entry point; `service.with_transaction(&ctx)` returns a copy that joins
//! `ctx` instead, which is how one service calls another inside the same unit
//! of work.

pub mod currency;
pub mod decorate;
pub mod product;
pub mod product_variant;

pub use currency::{Currency, CurrencySelector, CurrencyService, CurrencyUpdated, UpdateCurrencyInput};
pub use decorate::{project, Decoratable, DecoratedEntity, FlagGate};
pub use product::{
    CreateProductInput, Product, ProductEvent, ProductOption, ProductService, ProductStatus,
    UpdateProductInput,
};
pub use product_variant::{
    CreateVariantInput, ProductOptionValue, ProductVariant, ProductVariantEvent,
    ProductVariantService, UpdateVariantInput,
};

use crate::errors::{DomainError, DomainResult};
use crate::feature_flags::FlagRouter;
use crate::transaction::{ServiceContext, UnitOfWork};
use async_trait::async_trait;
use std::future::Future;

/// Capability shared by every service that runs inside a unit of work
pub trait TransactionalService: Clone + Send + Sync + Sized {
    /// Unit of work the service opens roots on
    fn unit_of_work(&self) -> &UnitOfWork;

    /// Context this copy is bound to, if any
    fn scope(&self) -> Option<&ServiceContext>;

    /// Copy of the service bound to `ctx`
    fn scoped(&self, ctx: ServiceContext) -> Self;

    /// Copy of the service joining the transaction of `ctx`
    fn with_transaction(&self, ctx: &ServiceContext) -> Self {
        self.scoped(ctx.clone())
    }

    /// Flags in effect for this copy
    fn flags(&self) -> &FlagRouter {
        match self.scope() {
            Some(ctx) => ctx.flags(),
            None => self.unit_of_work().flags().as_ref(),
        }
    }

    /// Run `work` in the bound transaction, or in a new root when unbound
    fn atomic<'a, T, F, Fut>(
        &'a self,
        work: F,
    ) -> impl Future<Output = DomainResult<T>> + Send + 'a
    where
        F: FnOnce(ServiceContext) -> Fut + Send + 'a,
        Fut: Future<Output = DomainResult<T>> + Send + 'a,
        T: Send + 'a,
    {
        self.unit_of_work().with_transaction(self.scope(), work)
    }
}

/// Retrieve / update / decorate contract of an entity service
#[async_trait]
pub trait DomainService: TransactionalService {
    /// Entity managed by the service
    type Entity: Decoratable + Send + Sync;

    /// Changes accepted by [`DomainService::update`]
    type Update: Send + 'static;

    /// Load an entity or fail with `NotFound`
    async fn retrieve(&self, id: &str) -> DomainResult<Self::Entity>;

    /// Apply validated changes, persist them and queue `<entity>.updated`
    async fn update(&self, id: &str, changes: Self::Update) -> DomainResult<Self::Entity>;

    /// Project an entity to the requested fields and relations under the
    /// flags in effect
    fn decorate(
        &self,
        entity: &Self::Entity,
        fields: &[&str],
        relations: &[&str],
    ) -> DomainResult<DecoratedEntity> {
        project(entity, fields, relations, self.flags())
    }
}

/// Slug check shared by entity handles: lowercase ascii alphanumerics and
/// single dashes, not starting or ending with a dash
pub(crate) fn validate_handle(handle: &str) -> DomainResult<()> {
    let valid = !handle.is_empty()
        && !handle.starts_with('-')
        && !handle.ends_with('-')
        && !handle.contains("--")
        && handle
            .chars()
            .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '-');
    if valid {
        Ok(())
    } else {
        Err(DomainError::ValidationError(format!(
            "Handle must be a lowercase slug, got {handle:?}"
        )))
    }
}

/// Fail unless `title` has visible characters
pub(crate) fn validate_title(entity_type: &str, title: &str) -> DomainResult<()> {
    if title.trim().is_empty() {
        Err(DomainError::ValidationError(format!(
            "{entity_type} title cannot be empty"
        )))
    } else {
        Ok(())
    }
}

/// Derive a slug from a title
pub(crate) fn slugify(title: &str) -> String {
    let mut slug = String::with_capacity(title.len());
    for c in title.trim().chars() {
        if c.is_ascii_alphanumeric() {
            slug.push(c.to_ascii_lowercase());
        } else if !slug.is_empty() && !slug.ends_with('-') {
            slug.push('-');
        }
    }
    while slug.ends_with('-') {
        slug.pop();
    }
    slug
}
