// Copyright 2025 Cowboy AI, LLC.

//! Product variants

use crate::errors::{DomainError, DomainResult};
use crate::events::EmitOptions;
use crate::services::{validate_title, Decoratable, DomainService, Product, TransactionalService};
use crate::storage::{Repository, StoredEntity};
use crate::transaction::{ServiceContext, UnitOfWork};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::debug;
use uuid::Uuid;

/// Value a variant takes for one product option
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProductOptionValue {
    pub option_id: String,
    pub value: String,
}

/// A purchasable variant of a product
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProductVariant {
    pub id: String,
    pub product_id: String,
    pub title: String,
    pub sku: Option<String>,
    #[serde(default)]
    pub options: Vec<ProductOptionValue>,
}

impl StoredEntity for ProductVariant {
    const COLLECTION: &'static str = "product_variants";
    const ENTITY_TYPE: &'static str = "ProductVariant";

    fn storage_id(&self) -> String {
        self.id.clone()
    }
}

impl Decoratable for ProductVariant {}

/// Input of [`ProductVariantService::create`]
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CreateVariantInput {
    pub title: String,
    pub sku: Option<String>,
    #[serde(default)]
    pub options: Vec<ProductOptionValue>,
}

/// Changes accepted by [`ProductVariantService::update`]
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct UpdateVariantInput {
    pub title: Option<String>,
    pub sku: Option<String>,
}

impl UpdateVariantInput {
    fn changed_fields(&self) -> Vec<String> {
        let mut fields = Vec::new();
        if self.title.is_some() {
            fields.push("title".to_string());
        }
        if self.sku.is_some() {
            fields.push("sku".to_string());
        }
        fields
    }
}

/// Payload of variant events
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProductVariantEvent {
    pub id: String,
    pub product_id: String,
    #[serde(default)]
    pub fields: Vec<String>,
}

/// Service over [`ProductVariant`] records
#[derive(Clone)]
pub struct ProductVariantService {
    uow: UnitOfWork,
    scope: Option<ServiceContext>,
}

impl ProductVariantService {
    pub const CREATED: &'static str = "product-variant.created";
    pub const UPDATED: &'static str = "product-variant.updated";

    pub fn new(uow: UnitOfWork) -> Self {
        Self { uow, scope: None }
    }

    /// Create a variant of an existing product.
    ///
    /// SKUs are unique across all variants.
    pub async fn create(
        &self,
        product_id: &str,
        input: CreateVariantInput,
    ) -> DomainResult<ProductVariant> {
        validate_title("Variant", &input.title)?;
        self.atomic(move |ctx| async move {
            let variant = {
                let mut session = ctx.manager().await?;
                Repository::<Product>::get(&mut *session, product_id).await?;
                if let Some(sku) = &input.sku {
                    ensure_unique_sku(&mut *session, sku, None).await?;
                }

                let variant = ProductVariant {
                    id: format!("variant_{}", Uuid::now_v7().simple()),
                    product_id: product_id.to_string(),
                    title: input.title,
                    sku: input.sku,
                    options: input.options,
                };
                Repository::save(&mut *session, &variant).await?;
                variant
            };

            ctx.emit(
                Self::CREATED,
                ProductVariantEvent {
                    id: variant.id.clone(),
                    product_id: variant.product_id.clone(),
                    fields: Vec::new(),
                },
                EmitOptions::default(),
            )?;
            debug!(variant_id = variant.id.as_str(), product_id, "variant created");
            Ok(variant)
        })
        .await
    }

    /// Variants of a product in creation order
    pub async fn list_by_product(&self, product_id: &str) -> DomainResult<Vec<ProductVariant>> {
        self.atomic(move |ctx| async move {
            let mut session = ctx.manager().await?;
            let mut variants =
                Repository::<ProductVariant>::list_where(&mut *session, |v| v.product_id == product_id)
                    .await?;
            variants.sort_by(|a, b| a.id.cmp(&b.id));
            Ok(variants)
        })
        .await
    }

    /// Give a variant a value for a product option
    pub async fn add_option_value(
        &self,
        variant_id: &str,
        option_id: &str,
        value: &str,
    ) -> DomainResult<ProductVariant> {
        self.atomic(move |ctx| async move {
            let mut session = ctx.manager().await?;
            let mut variant = Repository::<ProductVariant>::get(&mut *session, variant_id).await?;
            if variant.options.iter().any(|o| o.option_id == option_id) {
                return Err(DomainError::AlreadyExists(format!(
                    "Variant {variant_id} already has a value for option {option_id}"
                )));
            }

            variant.options.push(ProductOptionValue {
                option_id: option_id.to_string(),
                value: value.to_string(),
            });
            Repository::save(&mut *session, &variant).await?;
            Ok(variant)
        })
        .await
    }
}

async fn ensure_unique_sku(
    session: &mut dyn crate::storage::StorageSession,
    sku: &str,
    except_variant: Option<&str>,
) -> DomainResult<()> {
    let taken = Repository::<ProductVariant>::list_where(session, |v| {
        v.sku.as_deref() == Some(sku) && Some(v.id.as_str()) != except_variant
    })
    .await?;
    if taken.is_empty() {
        Ok(())
    } else {
        Err(DomainError::AlreadyExists(format!(
            "A variant with sku {sku} already exists"
        )))
    }
}

impl TransactionalService for ProductVariantService {
    fn unit_of_work(&self) -> &UnitOfWork {
        &self.uow
    }

    fn scope(&self) -> Option<&ServiceContext> {
        self.scope.as_ref()
    }

    fn scoped(&self, ctx: ServiceContext) -> Self {
        Self {
            uow: self.uow.clone(),
            scope: Some(ctx),
        }
    }
}

#[async_trait]
impl DomainService for ProductVariantService {
    type Entity = ProductVariant;
    type Update = UpdateVariantInput;

    async fn retrieve(&self, id: &str) -> DomainResult<ProductVariant> {
        self.atomic(move |ctx| async move {
            let mut session = ctx.manager().await?;
            let variant = Repository::<ProductVariant>::get(&mut *session, id).await?;
            Ok(variant)
        })
        .await
    }

    async fn update(&self, id: &str, changes: UpdateVariantInput) -> DomainResult<ProductVariant> {
        if let Some(title) = &changes.title {
            validate_title("Variant", title)?;
        }
        let fields = changes.changed_fields();

        self.atomic(move |ctx| async move {
            let variant = {
                let mut session = ctx.manager().await?;
                let mut variant = Repository::<ProductVariant>::get(&mut *session, id).await?;
                if let Some(sku) = &changes.sku {
                    ensure_unique_sku(&mut *session, sku, Some(id)).await?;
                }
                if let Some(title) = changes.title {
                    variant.title = title;
                }
                if let Some(sku) = changes.sku {
                    variant.sku = Some(sku);
                }
                Repository::save(&mut *session, &variant).await?;
                variant
            };

            ctx.emit(
                Self::UPDATED,
                ProductVariantEvent {
                    id: variant.id.clone(),
                    product_id: variant.product_id.clone(),
                    fields,
                },
                EmitOptions::default(),
            )?;
            Ok(variant)
        })
        .await
    }
}
