// Copyright 2025 Cowboy AI, LLC.

//! Configuration for the unit of work and event dispatch

use crate::errors::DomainResult;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::time::Duration;

/// How committed events reach subscribers
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum DispatchMode {
    /// Dispatch runs on a spawned task; the committer returns immediately
    #[default]
    Detached,
    /// The committer awaits delivery to every subscriber
    Awaited,
}

/// Unit of work configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(default)]
pub struct UnitOfWorkConfig {
    /// A root transaction not finished within this window is rolled back
    pub transaction_timeout_ms: u64,
    /// Upper bound on a single subscriber invocation
    pub subscriber_timeout_ms: u64,
    /// Dispatch policy for committed and direct events
    pub dispatch_mode: DispatchMode,
}

impl Default for UnitOfWorkConfig {
    fn default() -> Self {
        Self {
            transaction_timeout_ms: 30_000,
            subscriber_timeout_ms: 5_000,
            dispatch_mode: DispatchMode::Detached,
        }
    }
}

impl UnitOfWorkConfig {
    /// Parse a configuration document; missing keys take their defaults
    pub fn from_json_str(raw: &str) -> DomainResult<Self> {
        Ok(serde_json::from_str(raw)?)
    }

    /// Set the dispatch mode
    pub fn with_dispatch_mode(mut self, mode: DispatchMode) -> Self {
        self.dispatch_mode = mode;
        self
    }

    /// Set the root transaction timeout
    pub fn with_transaction_timeout(mut self, timeout: Duration) -> Self {
        self.transaction_timeout_ms = saturating_millis(timeout);
        self
    }

    /// Set the per-subscriber timeout
    pub fn with_subscriber_timeout(mut self, timeout: Duration) -> Self {
        self.subscriber_timeout_ms = saturating_millis(timeout);
        self
    }

    /// Root transaction timeout
    pub fn transaction_timeout(&self) -> Duration {
        Duration::from_millis(self.transaction_timeout_ms)
    }

    /// Per-subscriber timeout
    pub fn subscriber_timeout(&self) -> Duration {
        Duration::from_millis(self.subscriber_timeout_ms)
    }

    /// JSON schema of the configuration document
    pub fn json_schema() -> serde_json::Value {
        let schema = schemars::schema_for!(UnitOfWorkConfig);
        serde_json::to_value(schema).unwrap_or(serde_json::Value::Null)
    }
}

fn saturating_millis(duration: Duration) -> u64 {
    u64::try_from(duration.as_millis()).unwrap_or(u64::MAX)
}

/// Project-level feature flag values, as loaded by the host application
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(default)]
pub struct FlagsConfig {
    /// Flag key to enabled state
    pub feature_flags: HashMap<String, bool>,
}

impl FlagsConfig {
    /// Parse a project flags document
    pub fn from_json_str(raw: &str) -> DomainResult<Self> {
        Ok(serde_json::from_str(raw)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = UnitOfWorkConfig::default();
        assert_eq!(config.transaction_timeout(), Duration::from_secs(30));
        assert_eq!(config.subscriber_timeout(), Duration::from_secs(5));
        assert_eq!(config.dispatch_mode, DispatchMode::Detached);
    }

    #[test]
    fn test_partial_document_keeps_defaults() {
        let config =
            UnitOfWorkConfig::from_json_str(r#"{ "dispatch_mode": "awaited" }"#).unwrap();
        assert_eq!(config.dispatch_mode, DispatchMode::Awaited);
        assert_eq!(config.transaction_timeout_ms, 30_000);
    }

    #[test]
    fn test_unknown_dispatch_mode_rejected() {
        let err = UnitOfWorkConfig::from_json_str(r#"{ "dispatch_mode": "eventually" }"#);
        assert!(err.is_err());
    }

    #[test]
    fn test_builders() {
        let config = UnitOfWorkConfig::default()
            .with_dispatch_mode(DispatchMode::Awaited)
            .with_transaction_timeout(Duration::from_millis(150))
            .with_subscriber_timeout(Duration::from_millis(20));
        assert_eq!(config.transaction_timeout_ms, 150);
        assert_eq!(config.subscriber_timeout_ms, 20);
    }

    #[test]
    fn test_huge_timeouts_saturate() {
        let config = UnitOfWorkConfig::default()
            .with_transaction_timeout(Duration::MAX)
            .with_subscriber_timeout(Duration::MAX);
        assert_eq!(config.transaction_timeout_ms, u64::MAX);
        assert_eq!(config.subscriber_timeout_ms, u64::MAX);
    }

    #[test]
    fn test_schema_lists_properties() {
        let schema = UnitOfWorkConfig::json_schema();
        let properties = schema["properties"].as_object().unwrap();
        assert!(properties.contains_key("transaction_timeout_ms"));
        assert!(properties.contains_key("dispatch_mode"));
    }

    #[test]
    fn test_flags_config() {
        let flags = FlagsConfig::from_json_str(
            r#"{ "feature_flags": { "tax_inclusive_pricing": true } }"#,
        )
        .unwrap();
        assert_eq!(flags.feature_flags.get("tax_inclusive_pricing"), Some(&true));
    }
}
