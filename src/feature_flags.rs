// Copyright 2025 Cowboy AI, LLC.

//! Feature flag routing
//!
//! A [`FlagRouter`] answers one question: is the flag with this key enabled?
//! It is built once at startup and shared read-only between every service and
//! call chain. Unknown keys are simply disabled.
//!
//! Flags are described by [`FeatureFlagDefinition`]s. [`FlagRouter::load`]
//! resolves each definition from, in order of precedence, an environment
//! variable, the project configuration and the definition's default.

use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, warn};

/// Static description of a feature flag
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FeatureFlagDefinition {
    /// Key used by services and project configuration
    pub key: &'static str,
    /// Environment variable that overrides the flag
    pub env_key: &'static str,
    /// State when neither environment nor configuration set it
    pub default_value: bool,
    /// Human-readable description
    pub description: &'static str,
}

/// Whether prices and currencies carry tax-inclusive information
pub const TAX_INCLUSIVE_PRICING: FeatureFlagDefinition = FeatureFlagDefinition {
    key: "tax_inclusive_pricing",
    env_key: "CIM_FF_TAX_INCLUSIVE_PRICING",
    default_value: false,
    description: "Enable tax inclusive pricing",
};

/// Whether products expose their sales channels
pub const SALES_CHANNELS: FeatureFlagDefinition = FeatureFlagDefinition {
    key: "sales_channels",
    env_key: "CIM_FF_SALES_CHANNELS",
    default_value: false,
    description: "Enable sales channels on products",
};

/// Every flag known to this crate
pub const BUILT_IN_FLAGS: &[FeatureFlagDefinition] = &[TAX_INCLUSIVE_PRICING, SALES_CHANNELS];

/// Read-only flag lookup
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FlagRouter {
    flags: HashMap<String, bool>,
}

/// Shared flag router type
pub type SharedFlagRouter = Arc<FlagRouter>;

impl FlagRouter {
    /// Create a router from a fixed mapping
    pub fn new(flags: HashMap<String, bool>) -> Self {
        Self { flags }
    }

    /// Whether the flag is enabled; unknown keys are disabled
    pub fn is_enabled(&self, key: &str) -> bool {
        self.flags.get(key).copied().unwrap_or(false)
    }

    /// Keys of all enabled flags, sorted
    pub fn enabled_keys(&self) -> Vec<&str> {
        let mut keys: Vec<&str> = self
            .flags
            .iter()
            .filter(|(_, enabled)| **enabled)
            .map(|(key, _)| key.as_str())
            .collect();
        keys.sort_unstable();
        keys
    }

    /// Resolve definitions against project configuration and an environment.
    ///
    /// Environment values win over project values, which win over defaults.
    /// Project keys without a definition are kept as-is.
    pub fn load<F>(
        definitions: &[FeatureFlagDefinition],
        project_flags: &HashMap<String, bool>,
        env_lookup: F,
    ) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut flags = project_flags.clone();

        for definition in definitions {
            let from_env = env_lookup(definition.env_key).and_then(|raw| {
                let parsed = parse_flag_value(&raw);
                if parsed.is_none() {
                    warn!(
                        flag = definition.key,
                        env_key = definition.env_key,
                        value = raw.as_str(),
                        "ignoring unparsable feature flag value"
                    );
                }
                parsed
            });

            let value = from_env
                .or_else(|| project_flags.get(definition.key).copied())
                .unwrap_or(definition.default_value);

            debug!(flag = definition.key, enabled = value, "feature flag resolved");
            flags.insert(definition.key.to_string(), value);
        }

        Self { flags }
    }

    /// Resolve definitions using the process environment
    pub fn from_env(
        definitions: &[FeatureFlagDefinition],
        project_flags: &HashMap<String, bool>,
    ) -> Self {
        Self::load(definitions, project_flags, |key| std::env::var(key).ok())
    }
}

impl<K: Into<String>, const N: usize> From<[(K, bool); N]> for FlagRouter {
    fn from(pairs: [(K, bool); N]) -> Self {
        Self::new(pairs.into_iter().map(|(k, v)| (k.into(), v)).collect())
    }
}

fn parse_flag_value(raw: &str) -> Option<bool> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "true" | "1" | "yes" | "on" => Some(true),
        "false" | "0" | "no" | "off" => Some(false),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use test_case::test_case;

    fn no_env(_: &str) -> Option<String> {
        None
    }

    #[test]
    fn test_unknown_key_is_disabled() {
        let router = FlagRouter::from([("tax_inclusive_pricing", true)]);
        assert!(router.is_enabled("tax_inclusive_pricing"));
        assert!(!router.is_enabled("does_not_exist"));
        assert!(!FlagRouter::default().is_enabled("tax_inclusive_pricing"));
    }

    #[test]
    fn test_enabled_keys_sorted() {
        let router = FlagRouter::from([("b", true), ("a", true), ("c", false)]);
        assert_eq!(router.enabled_keys(), vec!["a", "b"]);
    }

    #[test]
    fn test_load_uses_defaults() {
        let router = FlagRouter::load(BUILT_IN_FLAGS, &HashMap::new(), no_env);
        assert!(!router.is_enabled(TAX_INCLUSIVE_PRICING.key));
        assert!(!router.is_enabled(SALES_CHANNELS.key));
    }

    #[test]
    fn test_project_overrides_default() {
        let project = HashMap::from([(TAX_INCLUSIVE_PRICING.key.to_string(), true)]);
        let router = FlagRouter::load(BUILT_IN_FLAGS, &project, no_env);
        assert!(router.is_enabled(TAX_INCLUSIVE_PRICING.key));
    }

    #[test]
    fn test_env_overrides_project() {
        let project = HashMap::from([(TAX_INCLUSIVE_PRICING.key.to_string(), true)]);
        let router = FlagRouter::load(BUILT_IN_FLAGS, &project, |key| {
            (key == TAX_INCLUSIVE_PRICING.env_key).then(|| "false".to_string())
        });
        assert!(!router.is_enabled(TAX_INCLUSIVE_PRICING.key));
    }

    #[test]
    fn test_unparsable_env_falls_back_to_project() {
        let project = HashMap::from([(SALES_CHANNELS.key.to_string(), true)]);
        let router = FlagRouter::load(BUILT_IN_FLAGS, &project, |_| Some("maybe".to_string()));
        assert!(router.is_enabled(SALES_CHANNELS.key));
    }

    #[test]
    fn test_undefined_project_keys_are_kept() {
        let project = HashMap::from([("order_editing".to_string(), true)]);
        let router = FlagRouter::load(BUILT_IN_FLAGS, &project, no_env);
        assert!(router.is_enabled("order_editing"));
    }

    #[test_case("true", Some(true))]
    #[test_case("TRUE", Some(true))]
    #[test_case(" 1 ", Some(true))]
    #[test_case("on", Some(true))]
    #[test_case("no", Some(false))]
    #[test_case("0", Some(false))]
    #[test_case("Off", Some(false))]
    #[test_case("", None)]
    #[test_case("enabled", None)]
    fn test_parse_flag_value(raw: &str, expected: Option<bool>) {
        assert_eq!(parse_flag_value(raw), expected);
    }
}
