// Copyright 2025 Cowboy AI, LLC.

//! Subscribers for committed domain events

use crate::events::EventMetadata;
use async_trait::async_trait;
use serde_json::Value;
use std::future::Future;

/// Handler invoked for every delivered event of a subscribed name
#[async_trait]
pub trait Subscriber: Send + Sync {
    /// Handle one event
    async fn handle(&self, payload: &Value, metadata: &EventMetadata) -> Result<(), String>;

    /// Name used when reporting failures
    fn name(&self) -> &str {
        std::any::type_name::<Self>()
    }
}

/// Subscriber backed by a closure
pub struct FnSubscriber<F> {
    name: String,
    handler: F,
}

impl<F> FnSubscriber<F> {
    /// Wrap a closure under a reporting name
    pub fn new(name: impl Into<String>, handler: F) -> Self {
        Self {
            name: name.into(),
            handler,
        }
    }
}

#[async_trait]
impl<F, Fut> Subscriber for FnSubscriber<F>
where
    F: Fn(Value, EventMetadata) -> Fut + Send + Sync,
    Fut: Future<Output = Result<(), String>> + Send,
{
    async fn handle(&self, payload: &Value, metadata: &EventMetadata) -> Result<(), String> {
        (self.handler)(payload.clone(), metadata.clone()).await
    }

    fn name(&self) -> &str {
        &self.name
    }
}
