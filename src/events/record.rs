// Copyright 2025 Cowboy AI, LLC.

//! Event records and delivery metadata

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

/// Delivery hints attached to an emitted event.
///
/// Hints are forwarded to subscribers in [`EventMetadata`]; the bus itself
/// delivers every event once, in order, without delay.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EmitOptions {
    /// Key a subscriber may use to drop duplicate deliveries
    pub idempotency_key: Option<String>,
    /// Requested delivery delay in milliseconds
    pub delay_ms: Option<u64>,
}

impl EmitOptions {
    /// Options with an idempotency key
    pub fn idempotent(key: impl Into<String>) -> Self {
        Self {
            idempotency_key: Some(key.into()),
            ..Self::default()
        }
    }

    /// Set the delay hint
    pub fn with_delay_ms(mut self, delay_ms: u64) -> Self {
        self.delay_ms = Some(delay_ms);
        self
    }
}

/// A named event with its payload, immutable once created
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EventRecord {
    id: Uuid,
    name: String,
    payload: Value,
    options: EmitOptions,
    transaction_id: Option<Uuid>,
    sequence: u64,
    emitted_at: DateTime<Utc>,
}

impl EventRecord {
    /// Create a record outside any transaction
    pub fn new(name: impl Into<String>, payload: Value, options: EmitOptions) -> Self {
        Self {
            id: Uuid::new_v4(),
            name: name.into(),
            payload,
            options,
            transaction_id: None,
            sequence: 0,
            emitted_at: Utc::now(),
        }
    }

    /// Attach the record to a transaction buffer position
    pub(crate) fn queued_in(mut self, transaction_id: Uuid, sequence: u64) -> Self {
        self.transaction_id = Some(transaction_id);
        self.sequence = sequence;
        self
    }

    /// Unique event id
    pub fn id(&self) -> Uuid {
        self.id
    }

    /// Event name subscribers are keyed by
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Event payload
    pub fn payload(&self) -> &Value {
        &self.payload
    }

    /// Delivery hints
    pub fn options(&self) -> &EmitOptions {
        &self.options
    }

    /// Transaction the record was buffered in, if any
    pub fn transaction_id(&self) -> Option<Uuid> {
        self.transaction_id
    }

    /// Metadata handed to subscribers
    pub fn metadata(&self) -> EventMetadata {
        EventMetadata {
            event_id: self.id,
            event_name: self.name.clone(),
            transaction_id: self.transaction_id,
            sequence: self.sequence,
            emitted_at: self.emitted_at,
            options: self.options.clone(),
        }
    }
}

/// Metadata delivered alongside every payload
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EventMetadata {
    /// Unique event id
    pub event_id: Uuid,
    /// Event name
    pub event_name: String,
    /// Committed transaction that produced the event; `None` for direct emits
    pub transaction_id: Option<Uuid>,
    /// Position in the transaction buffer
    pub sequence: u64,
    /// When the event was emitted
    pub emitted_at: DateTime<Utc>,
    /// Delivery hints
    pub options: EmitOptions,
}
