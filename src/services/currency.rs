// Copyright 2025 Cowboy AI, LLC.

//! Currencies

use crate::errors::{DomainError, DomainResult};
use crate::events::EmitOptions;
use crate::feature_flags::TAX_INCLUSIVE_PRICING;
use crate::services::{Decoratable, DomainService, FlagGate, TransactionalService};
use crate::storage::{Repository, StoredEntity};
use crate::transaction::{ServiceContext, UnitOfWork};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::debug;

/// A currency, addressed by its lowercase ISO code
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Currency {
    pub code: String,
    pub symbol: String,
    pub symbol_native: String,
    pub name: String,
    /// Whether prices in this currency include tax
    #[serde(default)]
    pub includes_tax: bool,
}

impl StoredEntity for Currency {
    const COLLECTION: &'static str = "currencies";
    const ENTITY_TYPE: &'static str = "Currency";

    fn storage_id(&self) -> String {
        self.code.clone()
    }
}

impl Currency {
    /// Derived key describing how prices in this currency treat tax
    pub const TAX_MODE: &'static str = "tax_mode";

    /// `"inclusive"` or `"exclusive"`
    pub fn tax_mode(&self) -> &'static str {
        if self.includes_tax {
            "inclusive"
        } else {
            "exclusive"
        }
    }
}

impl Decoratable for Currency {
    const FLAG_GATES: &'static [FlagGate] = &[
        FlagGate {
            key: "includes_tax",
            flag: TAX_INCLUSIVE_PRICING.key,
        },
        FlagGate {
            key: Currency::TAX_MODE,
            flag: TAX_INCLUSIVE_PRICING.key,
        },
    ];
    const DERIVED: &'static [&'static str] = &[Currency::TAX_MODE];

    fn derive(&self, key: &str) -> Option<Value> {
        (key == Self::TAX_MODE).then(|| Value::from(self.tax_mode()))
    }
}

/// Changes accepted by [`CurrencyService::update`]
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct UpdateCurrencyInput {
    /// Requires the tax-inclusive pricing flag
    pub includes_tax: Option<bool>,
}

/// Filter for [`CurrencyService::list_and_count`]
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CurrencySelector {
    /// Exact code, case-insensitive
    pub code: Option<String>,
    /// Substring of the code or name, case-insensitive
    pub q: Option<String>,
}

impl CurrencySelector {
    fn matches(&self, currency: &Currency) -> bool {
        let code_matches = self
            .code
            .as_ref()
            .map_or(true, |code| code.eq_ignore_ascii_case(&currency.code));
        let q_matches = self.q.as_ref().map_or(true, |q| {
            let q = q.to_lowercase();
            currency.code.to_lowercase().contains(&q) || currency.name.to_lowercase().contains(&q)
        });
        code_matches && q_matches
    }
}

/// Payload of `currency.updated`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CurrencyUpdated {
    pub code: String,
}

/// Service over [`Currency`] records
#[derive(Clone)]
pub struct CurrencyService {
    uow: UnitOfWork,
    scope: Option<ServiceContext>,
}

impl CurrencyService {
    /// Emitted after a currency was changed
    pub const UPDATED: &'static str = "currency.updated";

    pub fn new(uow: UnitOfWork) -> Self {
        Self { uow, scope: None }
    }

    /// Currencies matching `selector` in code order, paged by `skip` and
    /// `take`, together with the total number of matches
    pub async fn list_and_count(
        &self,
        selector: &CurrencySelector,
        skip: usize,
        take: Option<usize>,
    ) -> DomainResult<(Vec<Currency>, usize)> {
        self.atomic(move |ctx| async move {
            let matching = {
                let mut session = ctx.manager().await?;
                let matching =
                    Repository::<Currency>::list_where(&mut *session, |c| selector.matches(c))
                        .await?;
                matching
            };
            let count = matching.len();
            let page = matching
                .into_iter()
                .skip(skip)
                .take(take.unwrap_or(usize::MAX))
                .collect();
            Ok((page, count))
        })
        .await
    }
}

impl TransactionalService for CurrencyService {
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
impl DomainService for CurrencyService {
    type Entity = Currency;
    type Update = UpdateCurrencyInput;

    async fn retrieve(&self, code: &str) -> DomainResult<Currency> {
        let code = code.to_lowercase();
        self.atomic(move |ctx| async move {
            let mut session = ctx.manager().await?;
            let currency = Repository::<Currency>::get(&mut *session, &code).await?;
            Ok(currency)
        })
        .await
    }

    async fn update(&self, code: &str, changes: UpdateCurrencyInput) -> DomainResult<Currency> {
        let code = code.to_lowercase();
        self.atomic(move |ctx| async move {
            let mut currency = self.with_transaction(&ctx).retrieve(&code).await?;

            if let Some(includes_tax) = changes.includes_tax {
                if !ctx.flags().is_enabled(TAX_INCLUSIVE_PRICING.key) {
                    return Err(DomainError::ValidationError(format!(
                        "includes_tax can only be set while {} is enabled",
                        TAX_INCLUSIVE_PRICING.key
                    )));
                }
                currency.includes_tax = includes_tax;
            }

            {
                let mut session = ctx.manager().await?;
                Repository::save(&mut *session, &currency).await?;
            }
            ctx.emit(
                Self::UPDATED,
                CurrencyUpdated {
                    code: currency.code.clone(),
                },
                EmitOptions::default(),
            )?;
            debug!(code = currency.code.as_str(), "currency updated");
            Ok(currency)
        })
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{DispatchMode, UnitOfWorkConfig};
    use crate::feature_flags::FlagRouter;
    use crate::storage::InMemoryStorage;
    use pretty_assertions::assert_eq;
    use serde_json::json;
    use std::sync::Arc;

    async fn service(flags: FlagRouter) -> (CurrencyService, InMemoryStorage) {
        let storage = InMemoryStorage::new();
        for (code, name) in [("usd", "US Dollar"), ("eur", "Euro"), ("dkk", "Danish Krone")] {
            storage
                .seed(
                    "currencies",
                    code,
                    json!({
                        "code": code,
                        "symbol": code.to_uppercase(),
                        "symbol_native": code,
                        "name": name,
                        "includes_tax": false
                    }),
                )
                .await;
        }
        let config = UnitOfWorkConfig::default().with_dispatch_mode(DispatchMode::Awaited);
        let uow = UnitOfWork::new(Arc::new(storage.clone()), flags, config);
        (CurrencyService::new(uow), storage)
    }

    #[tokio::test]
    async fn test_retrieve_is_case_insensitive() {
        let (service, _) = service(FlagRouter::default()).await;
        let currency = service.retrieve("USD").await.unwrap();
        assert_eq!(currency.name, "US Dollar");
    }

    #[tokio::test]
    async fn test_retrieve_missing_currency() {
        let (service, storage) = service(FlagRouter::default()).await;
        let err = service.retrieve("xyz").await.unwrap_err();
        assert!(err.is_not_found());
        assert_eq!(storage.stats().rollbacks, 1);
    }

    #[tokio::test]
    async fn test_update_includes_tax_with_flag() {
        let (service, storage) =
            service(FlagRouter::from([(TAX_INCLUSIVE_PRICING.key, true)])).await;

        let updated = service
            .update(
                "usd",
                UpdateCurrencyInput {
                    includes_tax: Some(true),
                },
            )
            .await
            .unwrap();

        assert!(updated.includes_tax);
        assert_eq!(
            storage.committed_record("currencies", "usd").await.unwrap()["includes_tax"],
            json!(true)
        );
    }

    #[tokio::test]
    async fn test_update_includes_tax_without_flag_is_rejected() {
        let (service, storage) = service(FlagRouter::default()).await;

        let err = service
            .update(
                "usd",
                UpdateCurrencyInput {
                    includes_tax: Some(true),
                },
            )
            .await
            .unwrap_err();

        assert!(err.is_validation_error());
        assert_eq!(
            storage.committed_record("currencies", "usd").await.unwrap()["includes_tax"],
            json!(false)
        );
    }

    #[tokio::test]
    async fn test_list_and_count_pages_in_code_order() {
        let (service, _) = service(FlagRouter::default()).await;

        let (page, count) = service
            .list_and_count(&CurrencySelector::default(), 1, Some(1))
            .await
            .unwrap();
        assert_eq!(count, 3);
        assert_eq!(page.len(), 1);
        assert_eq!(page[0].code, "eur");

        let selector = CurrencySelector {
            q: Some("KRONE".into()),
            ..CurrencySelector::default()
        };
        let (page, count) = service.list_and_count(&selector, 0, None).await.unwrap();
        assert_eq!(count, 1);
        assert_eq!(page[0].code, "dkk");
    }

    #[tokio::test]
    async fn test_decorate_hides_includes_tax_without_flag() {
        let (service, _) = service(FlagRouter::default()).await;
        let currency = service.retrieve("usd").await.unwrap();

        let view = service
            .decorate(&currency, &["code", "includes_tax"], &[Currency::TAX_MODE])
            .unwrap();
        assert_eq!(view.keys().collect::<Vec<_>>(), vec!["code"]);
    }

    #[tokio::test]
    async fn test_decorate_attaches_tax_mode_with_flag() {
        let flags = FlagRouter::from([(TAX_INCLUSIVE_PRICING.key, true)]);
        let (service, _) = service(flags).await;
        let currency = service.retrieve("usd").await.unwrap();

        let view = service
            .decorate(&currency, &["code", Currency::TAX_MODE], &[])
            .unwrap();
        assert_eq!(
            view.to_value(),
            json!({"code": "usd", "tax_mode": "exclusive"})
        );
    }
}
