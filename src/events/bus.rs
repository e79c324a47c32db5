// Copyright 2025 Cowboy AI, LLC.

//! Event bus with commit-gated delivery
//!
//! Events emitted inside a transaction are buffered on its handle and reach
//! the bus only through [`EventBus::flush`] after the commit, or are dropped
//! by [`EventBus::discard`] after a rollback. Events emitted without a
//! transaction are dispatched right away.
//!
//! Within one batch, events are delivered in buffer order and, for each event,
//! to subscribers in registration order. A failing, panicking or slow
//! subscriber is reported and skipped; it never stops later deliveries.

use crate::config::{DispatchMode, UnitOfWorkConfig};
use crate::errors::{DomainError, DomainResult};
use crate::events::{EmitOptions, EventMetadata, EventRecord, FnSubscriber, Subscriber};
use crate::transaction::ServiceContext;
use futures::FutureExt;
use serde::Serialize;
use serde_json::Value;
use std::any::Any;
use std::collections::HashMap;
use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::sync::{Arc, Weak};
use std::time::Duration;
use tokio::sync::RwLock;
use tracing::{debug, error, info};
use uuid::Uuid;

/// Identifier of one registration
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriptionId(Uuid);

#[derive(Clone)]
struct Registration {
    id: SubscriptionId,
    subscriber: Arc<dyn Subscriber>,
}

type Registry = RwLock<HashMap<String, Vec<Registration>>>;

/// Handle returned by [`EventBus::subscribe`]
#[derive(Debug)]
pub struct Subscription {
    id: SubscriptionId,
    event_name: String,
    registry: Weak<Registry>,
}

impl Subscription {
    /// Registration id
    pub fn id(&self) -> SubscriptionId {
        self.id
    }

    /// Subscribed event name
    pub fn event_name(&self) -> &str {
        &self.event_name
    }

    /// Remove the registration; events dispatched afterwards skip it.
    ///
    /// Returns `false` if it was already gone.
    pub async fn unsubscribe(self) -> bool {
        let Some(registry) = self.registry.upgrade() else {
            return false;
        };
        let mut registry = registry.write().await;
        let Some(registrations) = registry.get_mut(&self.event_name) else {
            return false;
        };
        let before = registrations.len();
        registrations.retain(|r| r.id != self.id);
        let removed = registrations.len() < before;
        if registrations.is_empty() {
            registry.remove(&self.event_name);
        }
        debug!(event_name = self.event_name.as_str(), removed, "subscriber removed");
        removed
    }
}

/// Outcome of dispatching a batch
#[derive(Debug, Clone, Default)]
pub struct DispatchReport {
    /// Events processed
    pub events: usize,
    /// Successful subscriber invocations
    pub deliveries: usize,
    /// Failed subscriber invocations, as `SubscriberError`s
    pub failures: Vec<DomainError>,
}

impl DispatchReport {
    /// Whether every invocation succeeded
    pub fn is_clean(&self) -> bool {
        self.failures.is_empty()
    }
}

/// Subscriber registry and dispatcher
#[derive(Clone)]
pub struct EventBus {
    registry: Arc<Registry>,
    mode: DispatchMode,
    subscriber_timeout: Duration,
}

impl Default for EventBus {
    fn default() -> Self {
        Self::from_config(&UnitOfWorkConfig::default())
    }
}

impl EventBus {
    /// Create a bus with an explicit dispatch policy
    pub fn new(mode: DispatchMode, subscriber_timeout: Duration) -> Self {
        Self {
            registry: Arc::new(RwLock::new(HashMap::new())),
            mode,
            subscriber_timeout,
        }
    }

    /// Create a bus from unit of work configuration
    pub fn from_config(config: &UnitOfWorkConfig) -> Self {
        Self::new(config.dispatch_mode, config.subscriber_timeout())
    }

    /// Dispatch policy in effect
    pub fn dispatch_mode(&self) -> DispatchMode {
        self.mode
    }

    /// Register a subscriber for an event name.
    ///
    /// Registering the same subscriber twice yields two invocations per event.
    pub async fn subscribe(
        &self,
        event_name: impl Into<String>,
        subscriber: Arc<dyn Subscriber>,
    ) -> Subscription {
        let event_name = event_name.into();
        let id = SubscriptionId(Uuid::new_v4());
        debug!(
            event_name = event_name.as_str(),
            subscriber = subscriber.name(),
            "subscriber registered"
        );
        self.registry
            .write()
            .await
            .entry(event_name.clone())
            .or_default()
            .push(Registration { id, subscriber });
        Subscription {
            id,
            event_name,
            registry: Arc::downgrade(&self.registry),
        }
    }

    /// Register a closure for an event name
    pub async fn subscribe_fn<F, Fut>(&self, event_name: impl Into<String>, handler: F) -> Subscription
    where
        F: Fn(Value, EventMetadata) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<(), String>> + Send + 'static,
    {
        let event_name = event_name.into();
        let subscriber = FnSubscriber::new(format!("fn:{event_name}"), handler);
        self.subscribe(event_name, Arc::new(subscriber)).await
    }

    /// Number of registrations for an event name
    pub async fn subscriber_count(&self, event_name: &str) -> usize {
        self.registry
            .read()
            .await
            .get(event_name)
            .map_or(0, Vec::len)
    }

    /// Emit an event.
    ///
    /// With a scope, the event is queued on the scope's transaction and
    /// delivered only if it commits. Without one, it is dispatched now.
    pub async fn emit<P: Serialize + Send>(
        &self,
        scope: Option<&ServiceContext>,
        event_name: impl Into<String> + Send,
        payload: P,
        options: EmitOptions,
    ) -> DomainResult<()> {
        if let Some(ctx) = scope {
            return ctx.emit(event_name, payload, options);
        }

        let record = EventRecord::new(event_name, serde_json::to_value(payload)?, options);
        match self.mode {
            DispatchMode::Awaited => {
                self.dispatch(vec![record]).await;
            }
            DispatchMode::Detached => {
                let bus = self.clone();
                tokio::spawn(async move {
                    bus.dispatch(vec![record]).await;
                });
            }
        }
        Ok(())
    }

    /// Deliver records of a committed transaction
    pub(crate) async fn flush(&self, transaction_id: Uuid, records: Vec<EventRecord>) {
        if records.is_empty() {
            return;
        }
        info!(%transaction_id, events = records.len(), "flushing committed events");
        match self.mode {
            DispatchMode::Awaited => {
                self.dispatch(records).await;
            }
            DispatchMode::Detached => {
                let bus = self.clone();
                tokio::spawn(async move {
                    bus.dispatch(records).await;
                });
            }
        }
    }

    /// Drop records of a rolled back transaction
    pub(crate) fn discard(&self, transaction_id: Uuid, records: Vec<EventRecord>) {
        if !records.is_empty() {
            debug!(%transaction_id, events = records.len(), "discarding buffered events");
        }
    }

    /// Deliver a batch in order and wait for every subscriber
    pub async fn dispatch(&self, records: Vec<EventRecord>) -> DispatchReport {
        let mut report = DispatchReport::default();

        for record in records {
            report.events += 1;
            // registrations are read per event, so changes apply to later events only
            let registrations = self
                .registry
                .read()
                .await
                .get(record.name())
                .cloned()
                .unwrap_or_default();

            if registrations.is_empty() {
                debug!(event_name = record.name(), "no subscribers for event");
                continue;
            }

            let metadata = record.metadata();
            for registration in &registrations {
                match self.invoke(registration, &record, &metadata).await {
                    Ok(()) => report.deliveries += 1,
                    Err(err) => {
                        error!(
                            event_name = record.name(),
                            event_id = %record.id(),
                            subscriber = registration.subscriber.name(),
                            error = %err,
                            "subscriber failed"
                        );
                        report.failures.push(err);
                    }
                }
            }
        }

        report
    }

    async fn invoke(
        &self,
        registration: &Registration,
        record: &EventRecord,
        metadata: &EventMetadata,
    ) -> DomainResult<()> {
        let call = AssertUnwindSafe(registration.subscriber.handle(record.payload(), metadata))
            .catch_unwind();

        let message = match tokio::time::timeout(self.subscriber_timeout, call).await {
            Ok(Ok(Ok(()))) => return Ok(()),
            Ok(Ok(Err(message))) => message,
            Ok(Err(panic)) => format!("panicked: {}", panic_message(panic.as_ref())),
            Err(_) => format!(
                "timed out after {}ms",
                self.subscriber_timeout.as_millis()
            ),
        };

        Err(DomainError::SubscriberError {
            event_name: record.name().to_string(),
            subscriber: registration.subscriber.name().to_string(),
            message,
        })
    }
}

fn panic_message(panic: &(dyn Any + Send)) -> &str {
    if let Some(message) = panic.downcast_ref::<&str>() {
        message
    } else if let Some(message) = panic.downcast_ref::<String>() {
        message
    } else {
        "unknown panic"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use pretty_assertions::assert_eq;
    use serde_json::json;
    use std::sync::Mutex;

    #[derive(Default)]
    struct Recorder {
        label: &'static str,
        seen: Arc<Mutex<Vec<String>>>,
    }

    #[async_trait]
    impl Subscriber for Recorder {
        async fn handle(&self, payload: &Value, metadata: &EventMetadata) -> Result<(), String> {
            self.seen.lock().unwrap().push(format!(
                "{}:{}:{}",
                self.label, metadata.event_name, payload["n"]
            ));
            Ok(())
        }

        fn name(&self) -> &str {
            self.label
        }
    }

    struct Failing;

    #[async_trait]
    impl Subscriber for Failing {
        async fn handle(&self, _: &Value, _: &EventMetadata) -> Result<(), String> {
            Err("index offline".to_string())
        }
    }

    struct Panicking;

    #[async_trait]
    impl Subscriber for Panicking {
        async fn handle(&self, _: &Value, _: &EventMetadata) -> Result<(), String> {
            panic!("boom")
        }
    }

    struct Slow;

    #[async_trait]
    impl Subscriber for Slow {
        async fn handle(&self, _: &Value, _: &EventMetadata) -> Result<(), String> {
            tokio::time::sleep(Duration::from_secs(5)).await;
            Ok(())
        }
    }

    fn awaited_bus() -> EventBus {
        EventBus::new(DispatchMode::Awaited, Duration::from_millis(200))
    }

    fn record(name: &str, n: u32) -> EventRecord {
        EventRecord::new(name, json!({ "n": n }), EmitOptions::default())
    }

    #[tokio::test]
    async fn test_dispatch_orders_events_then_subscribers() {
        let bus = awaited_bus();
        let seen = Arc::new(Mutex::new(Vec::new()));
        for label in ["first", "second"] {
            bus.subscribe(
                "product.updated",
                Arc::new(Recorder { label, seen: seen.clone() }),
            )
            .await;
        }

        let report = bus
            .dispatch(vec![record("product.updated", 1), record("product.updated", 2)])
            .await;

        assert!(report.is_clean());
        assert_eq!(report.deliveries, 4);
        assert_eq!(
            *seen.lock().unwrap(),
            vec![
                "first:product.updated:1",
                "second:product.updated:1",
                "first:product.updated:2",
                "second:product.updated:2",
            ]
        );
    }

    #[tokio::test]
    async fn test_failures_do_not_stop_delivery() {
        let bus = awaited_bus();
        let seen = Arc::new(Mutex::new(Vec::new()));
        bus.subscribe("currency.updated", Arc::new(Failing)).await;
        bus.subscribe("currency.updated", Arc::new(Panicking)).await;
        bus.subscribe("currency.updated", Arc::new(Slow)).await;
        bus.subscribe(
            "currency.updated",
            Arc::new(Recorder { label: "after", seen: seen.clone() }),
        )
        .await;

        let report = bus
            .dispatch(vec![record("currency.updated", 1), record("currency.updated", 2)])
            .await;

        assert_eq!(report.events, 2);
        assert_eq!(report.deliveries, 2);
        assert_eq!(report.failures.len(), 6);
        assert_eq!(seen.lock().unwrap().len(), 2);

        let messages: Vec<String> = report.failures.iter().map(|f| f.to_string()).collect();
        assert!(messages[0].ends_with("index offline"));
        assert!(messages[1].ends_with("panicked: boom"));
        assert!(messages[2].ends_with("timed out after 200ms"));
    }

    #[tokio::test]
    async fn test_duplicate_registration_invoked_twice() {
        let bus = awaited_bus();
        let seen = Arc::new(Mutex::new(Vec::new()));
        let recorder: Arc<dyn Subscriber> = Arc::new(Recorder { label: "dup", seen: seen.clone() });
        bus.subscribe("ping", recorder.clone()).await;
        bus.subscribe("ping", recorder).await;

        bus.dispatch(vec![record("ping", 7)]).await;
        assert_eq!(seen.lock().unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_unsubscribe_applies_to_later_dispatch() {
        let bus = awaited_bus();
        let seen = Arc::new(Mutex::new(Vec::new()));
        let subscription = bus
            .subscribe("ping", Arc::new(Recorder { label: "r", seen: seen.clone() }))
            .await;
        bus.dispatch(vec![record("ping", 1)]).await;

        assert!(subscription.unsubscribe().await);
        assert_eq!(bus.subscriber_count("ping").await, 0);
        bus.dispatch(vec![record("ping", 2)]).await;

        assert_eq!(*seen.lock().unwrap(), vec!["r:ping:1"]);
    }

    #[tokio::test]
    async fn test_direct_emit_awaited() {
        let bus = awaited_bus();
        let seen = Arc::new(Mutex::new(Vec::<Value>::new()));
        let sink = seen.clone();
        bus.subscribe_fn("ping", move |payload, metadata| {
            let sink = sink.clone();
            async move {
                assert_eq!(metadata.transaction_id, None);
                sink.lock().unwrap().push(payload);
                Ok(())
            }
        })
        .await;

        bus.emit(None, "ping", json!({ "n": 1 }), EmitOptions::default())
            .await
            .unwrap();
        assert_eq!(*seen.lock().unwrap(), vec![json!({ "n": 1 })]);
    }

    #[tokio::test]
    async fn test_direct_emit_detached() {
        let bus = EventBus::new(DispatchMode::Detached, Duration::from_secs(1));
        let (tx, mut rx) = tokio::sync::mpsc::unbounded_channel();
        bus.subscribe_fn("ping", move |payload, _| {
            let tx = tx.clone();
            async move {
                tx.send(payload).map_err(|e| e.to_string())
            }
        })
        .await;

        bus.emit(None, "ping", json!("hello"), EmitOptions::default())
            .await
            .unwrap();
        let delivered = tokio::time::timeout(Duration::from_secs(1), rx.recv())
            .await
            .unwrap();
        assert_eq!(delivered, Some(json!("hello")));
    }

    #[tokio::test]
    async fn test_event_without_subscribers_is_counted() {
        let report = awaited_bus().dispatch(vec![record("nobody.listens", 1)]).await;
        assert_eq!(report.events, 1);
        assert_eq!(report.deliveries, 0);
        assert!(report.is_clean());
    }
}
