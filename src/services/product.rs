// Copyright 2025 Cowboy AI, LLC.

//! Products and their options

use crate::errors::{DomainError, DomainResult};
use crate::events::EmitOptions;
use crate::feature_flags::SALES_CHANNELS;
use crate::services::{
    slugify, validate_handle, validate_title, Decoratable, DomainService, FlagGate,
    ProductVariant, ProductVariantService, TransactionalService,
};
use crate::storage::{Repository, StorageSession, StoredEntity};
use crate::transaction::{ServiceContext, UnitOfWork};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};
use uuid::Uuid;

/// Publication state of a product
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProductStatus {
    #[default]
    Draft,
    Proposed,
    Published,
    Rejected,
}

/// An option every variant of a product takes a value for
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProductOption {
    pub id: String,
    pub title: String,
    pub product_id: String,
}

/// A product with its options and variants
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Product {
    pub id: String,
    pub title: String,
    pub subtitle: Option<String>,
    pub description: Option<String>,
    pub handle: Option<String>,
    #[serde(default)]
    pub status: ProductStatus,
    pub thumbnail: Option<String>,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default)]
    pub images: Vec<String>,
    #[serde(default)]
    pub options: Vec<ProductOption>,
    /// Loaded from the variant collection on retrieve; never stored here
    #[serde(default)]
    pub variants: Vec<ProductVariant>,
    /// Ids of the sales channels the product is available in
    #[serde(default)]
    pub sales_channels: Vec<String>,
}

impl StoredEntity for Product {
    const COLLECTION: &'static str = "products";
    const ENTITY_TYPE: &'static str = "Product";

    fn storage_id(&self) -> String {
        self.id.clone()
    }
}

impl Decoratable for Product {
    const FLAG_GATES: &'static [FlagGate] = &[FlagGate {
        key: "sales_channels",
        flag: SALES_CHANNELS.key,
    }];
}

/// Input of [`ProductService::create`]
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CreateProductInput {
    pub title: String,
    pub subtitle: Option<String>,
    pub description: Option<String>,
    /// Derived from the title when absent
    pub handle: Option<String>,
    pub status: ProductStatus,
    pub thumbnail: Option<String>,
    pub tags: Vec<String>,
    pub images: Vec<String>,
    /// Requires the sales channels flag when non-empty
    pub sales_channels: Vec<String>,
}

/// Changes accepted by [`ProductService::update`]
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct UpdateProductInput {
    pub title: Option<String>,
    pub subtitle: Option<String>,
    pub description: Option<String>,
    pub handle: Option<String>,
    pub status: Option<ProductStatus>,
    pub thumbnail: Option<String>,
    pub tags: Option<Vec<String>>,
    pub images: Option<Vec<String>>,
    /// Requires the sales channels flag
    pub sales_channels: Option<Vec<String>>,
}

impl UpdateProductInput {
    fn changed_fields(&self) -> Vec<String> {
        [
            ("title", self.title.is_some()),
            ("subtitle", self.subtitle.is_some()),
            ("description", self.description.is_some()),
            ("handle", self.handle.is_some()),
            ("status", self.status.is_some()),
            ("thumbnail", self.thumbnail.is_some()),
            ("tags", self.tags.is_some()),
            ("images", self.images.is_some()),
            ("sales_channels", self.sales_channels.is_some()),
        ]
        .into_iter()
        .filter(|(_, changed)| *changed)
        .map(|(field, _)| field.to_string())
        .collect()
    }

    fn apply(self, product: &mut Product) {
        if let Some(title) = self.title {
            product.title = title;
        }
        if let Some(subtitle) = self.subtitle {
            product.subtitle = Some(subtitle);
        }
        if let Some(description) = self.description {
            product.description = Some(description);
        }
        if let Some(handle) = self.handle {
            product.handle = Some(handle);
        }
        if let Some(status) = self.status {
            product.status = status;
        }
        if let Some(thumbnail) = self.thumbnail {
            product.thumbnail = Some(thumbnail);
        }
        if let Some(tags) = self.tags {
            product.tags = tags;
        }
        if let Some(images) = self.images {
            product.images = images;
        }
        if let Some(sales_channels) = self.sales_channels {
            product.sales_channels = sales_channels;
        }
    }
}

/// Payload of `product.created` and `product.updated`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProductEvent {
    pub id: String,
    #[serde(default)]
    pub fields: Vec<String>,
}

/// Service over [`Product`] records.
///
/// Variants are managed through a [`ProductVariantService`] joined to the
/// same transaction.
#[derive(Clone)]
pub struct ProductService {
    uow: UnitOfWork,
    variants: ProductVariantService,
    scope: Option<ServiceContext>,
}

impl ProductService {
    pub const CREATED: &'static str = "product.created";
    pub const UPDATED: &'static str = "product.updated";

    /// Value given to existing variants for a newly added option
    pub const DEFAULT_OPTION_VALUE: &'static str = "Default Value";

    pub fn new(uow: UnitOfWork, variants: ProductVariantService) -> Self {
        Self {
            uow,
            variants,
            scope: None,
        }
    }

    /// Variant service bound to the same scope as this copy
    pub fn variants(&self) -> &ProductVariantService {
        &self.variants
    }

    pub async fn create(&self, input: CreateProductInput) -> DomainResult<Product> {
        validate_title("Product", &input.title)?;
        let handle = match input.handle {
            Some(handle) => handle,
            None => {
                let derived = slugify(&input.title);
                if derived.is_empty() {
                    return Err(DomainError::ValidationError(format!(
                        "Cannot derive a handle from title {:?}; provide one explicitly",
                        input.title
                    )));
                }
                derived
            }
        };
        validate_handle(&handle)?;

        self.atomic(move |ctx| async move {
            if !input.sales_channels.is_empty() {
                ensure_sales_channels_enabled(&ctx)?;
            }

            let product = {
                let mut session = ctx.manager().await?;
                ensure_unique_handle(&mut *session, &handle, None).await?;

                let product = Product {
                    id: format!("prod_{}", Uuid::now_v7().simple()),
                    title: input.title,
                    subtitle: input.subtitle,
                    description: input.description,
                    handle: Some(handle),
                    status: input.status,
                    thumbnail: input.thumbnail,
                    tags: input.tags,
                    images: input.images,
                    options: Vec::new(),
                    variants: Vec::new(),
                    sales_channels: input.sales_channels,
                };
                persist(&mut *session, &product).await?;
                product
            };

            ctx.emit(
                Self::CREATED,
                ProductEvent {
                    id: product.id.clone(),
                    fields: Vec::new(),
                },
                EmitOptions::default(),
            )?;
            info!(product_id = product.id.as_str(), "product created");
            Ok(product)
        })
        .await
    }

    /// Add an option to a product and give every existing variant the
    /// default value for it
    pub async fn add_option(&self, product_id: &str, title: &str) -> DomainResult<Product> {
        validate_title("Option", title)?;

        self.atomic(move |ctx| async move {
            let scoped = self.with_transaction(&ctx);
            let mut product = scoped.retrieve(product_id).await?;

            if product
                .options
                .iter()
                .any(|option| option.title.eq_ignore_ascii_case(title))
            {
                return Err(DomainError::AlreadyExists(format!(
                    "An option with the title {title} already exists"
                )));
            }

            let option = ProductOption {
                id: format!("opt_{}", Uuid::now_v7().simple()),
                title: title.to_string(),
                product_id: product.id.clone(),
            };
            product.options.push(option.clone());
            {
                let mut session = ctx.manager().await?;
                persist(&mut *session, &product).await?;
            }

            let mut variants = Vec::with_capacity(product.variants.len());
            for variant in &product.variants {
                let variant = scoped
                    .variants
                    .add_option_value(&variant.id, &option.id, Self::DEFAULT_OPTION_VALUE)
                    .await?;
                variants.push(variant);
            }
            product.variants = variants;

            ctx.emit(
                Self::UPDATED,
                ProductEvent {
                    id: product.id.clone(),
                    fields: vec!["options".to_string()],
                },
                EmitOptions::default(),
            )?;
            debug!(
                product_id = product.id.as_str(),
                option_id = option.id.as_str(),
                "option added"
            );
            Ok(product)
        })
        .await
    }
}

fn ensure_sales_channels_enabled(ctx: &ServiceContext) -> DomainResult<()> {
    if ctx.flags().is_enabled(SALES_CHANNELS.key) {
        Ok(())
    } else {
        Err(DomainError::ValidationError(format!(
            "sales_channels can only be set while {} is enabled",
            SALES_CHANNELS.key
        )))
    }
}

async fn ensure_unique_handle(
    session: &mut dyn StorageSession,
    handle: &str,
    except_product: Option<&str>,
) -> DomainResult<()> {
    let taken = Repository::<Product>::list_where(session, |p| {
        p.handle.as_deref() == Some(handle) && Some(p.id.as_str()) != except_product
    })
    .await?;
    if taken.is_empty() {
        Ok(())
    } else {
        Err(DomainError::AlreadyExists(format!(
            "A product with handle {handle} already exists"
        )))
    }
}

/// Save a product without its variants, which live in their own collection
async fn persist(session: &mut dyn StorageSession, product: &Product) -> DomainResult<()> {
    let stored = Product {
        variants: Vec::new(),
        ..product.clone()
    };
    Repository::save(session, &stored).await?;
    Ok(())
}

impl TransactionalService for ProductService {
    fn unit_of_work(&self) -> &UnitOfWork {
        &self.uow
    }

    fn scope(&self) -> Option<&ServiceContext> {
        self.scope.as_ref()
    }

    fn scoped(&self, ctx: ServiceContext) -> Self {
        Self {
            uow: self.uow.clone(),
            variants: self.variants.scoped(ctx.clone()),
            scope: Some(ctx),
        }
    }
}

#[async_trait]
impl DomainService for ProductService {
    type Entity = Product;
    type Update = UpdateProductInput;

    async fn retrieve(&self, id: &str) -> DomainResult<Product> {
        self.atomic(move |ctx| async move {
            let mut product = {
                let mut session = ctx.manager().await?;
                let product = Repository::<Product>::get(&mut *session, id).await?;
                product
            };
            product.variants = self
                .variants
                .with_transaction(&ctx)
                .list_by_product(id)
                .await?;
            Ok(product)
        })
        .await
    }

    async fn update(&self, id: &str, changes: UpdateProductInput) -> DomainResult<Product> {
        if let Some(title) = &changes.title {
            validate_title("Product", title)?;
        }
        if let Some(handle) = &changes.handle {
            validate_handle(handle)?;
        }
        let fields = changes.changed_fields();

        self.atomic(move |ctx| async move {
            if changes.sales_channels.is_some() {
                ensure_sales_channels_enabled(&ctx)?;
            }

            let mut product = self.with_transaction(&ctx).retrieve(id).await?;
            {
                let mut session = ctx.manager().await?;
                if let Some(handle) = &changes.handle {
                    ensure_unique_handle(&mut *session, handle, Some(id)).await?;
                }
                changes.apply(&mut product);
                persist(&mut *session, &product).await?;
            }

            ctx.emit(
                Self::UPDATED,
                ProductEvent {
                    id: product.id.clone(),
                    fields,
                },
                EmitOptions::default(),
            )?;
            Ok(product)
        })
        .await
    }
}
