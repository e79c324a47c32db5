// Copyright 2025 Cowboy AI, LLC.

//! Shared fixtures for the integration tests
#![allow(dead_code)]

use cim_unit_of_work::{
    CurrencyService, DispatchMode, EventBus, FlagRouter, InMemoryStorage, ProductService,
    ProductVariantService, UnitOfWork, UnitOfWorkConfig,
};
use serde_json::{json, Value};
use std::sync::{Arc, Mutex};
use std::time::Duration;

/// Storage, unit of work and services wired together
pub struct Harness {
    pub storage: InMemoryStorage,
    pub uow: UnitOfWork,
}

impl Harness {
    /// Harness delivering events before `with_transaction` returns
    pub fn new(flags: FlagRouter) -> Self {
        Self::with_config(
            flags,
            UnitOfWorkConfig::default().with_dispatch_mode(DispatchMode::Awaited),
        )
    }

    pub fn with_config(flags: FlagRouter, config: UnitOfWorkConfig) -> Self {
        let storage = InMemoryStorage::new();
        let uow = UnitOfWork::new(Arc::new(storage.clone()), flags, config);
        Self { storage, uow }
    }

    pub fn bus(&self) -> &EventBus {
        self.uow.event_bus()
    }

    pub fn currencies(&self) -> CurrencyService {
        CurrencyService::new(self.uow.clone())
    }

    pub fn variants(&self) -> ProductVariantService {
        ProductVariantService::new(self.uow.clone())
    }

    pub fn products(&self) -> ProductService {
        ProductService::new(self.uow.clone(), self.variants())
    }

    pub async fn seed_currency(&self, code: &str, name: &str) {
        self.storage
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
}

/// Events seen by a recording subscriber, in delivery order
#[derive(Clone, Default)]
pub struct EventLog {
    entries: Arc<Mutex<Vec<(String, Value)>>>,
}

impl EventLog {
    /// Subscribe a recorder to every name in `names`
    pub async fn attach(bus: &EventBus, names: &[&str]) -> Self {
        let log = Self::default();
        for name in names {
            let entries = log.entries.clone();
            let event_name = name.to_string();
            bus.subscribe_fn(*name, move |payload, _| {
                let entries = entries.clone();
                let event_name = event_name.clone();
                async move {
                    entries
                        .lock()
                        .map_err(|e| e.to_string())?
                        .push((event_name, payload));
                    Ok(())
                }
            })
            .await;
        }
        log
    }

    pub fn entries(&self) -> Vec<(String, Value)> {
        self.entries.lock().unwrap().clone()
    }

    pub fn names(&self) -> Vec<String> {
        self.entries().into_iter().map(|(name, _)| name).collect()
    }

    pub fn len(&self) -> usize {
        self.entries.lock().unwrap().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Poll `condition` until it holds or `within` elapses
pub async fn eventually<F: Fn() -> bool>(within: Duration, condition: F) -> bool {
    let deadline = tokio::time::Instant::now() + within;
    while tokio::time::Instant::now() < deadline {
        if condition() {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
    condition()
}
