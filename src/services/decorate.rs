// Copyright 2025 Cowboy AI, LLC.

//! Decoration: projecting an entity to the fields and relations a caller asked for

use crate::errors::{DomainError, DomainResult};
use crate::feature_flags::FlagRouter;
use indexmap::IndexMap;
use serde::Serialize;
use serde_json::Value;

/// A serialized key that only appears while a feature flag is enabled
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FlagGate {
    /// Key of the serialized entity
    pub key: &'static str,
    /// Flag that must be enabled
    pub flag: &'static str,
}

/// Entity that can be projected by [`project`]
pub trait Decoratable: Serialize {
    /// Keys removed while their flag is disabled
    const FLAG_GATES: &'static [FlagGate] = &[];

    /// Keys computed at projection time; they are not part of the stored entity
    const DERIVED: &'static [&'static str] = &[];

    /// Whether `key` is visible under `flags`
    fn is_visible(key: &str, flags: &FlagRouter) -> bool {
        Self::FLAG_GATES
            .iter()
            .filter(|gate| gate.key == key)
            .all(|gate| flags.is_enabled(gate.flag))
    }

    /// Whether `key` is computed rather than stored
    fn is_derived(key: &str) -> bool {
        Self::DERIVED.contains(&key)
    }

    /// Value of the derived key `key`
    fn derive(&self, _key: &str) -> Option<Value> {
        None
    }
}

/// Ordered view of an entity restricted to the requested keys
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(transparent)]
pub struct DecoratedEntity(IndexMap<String, Value>);

impl DecoratedEntity {
    /// Value of a key, if present
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.0.get(key)
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.0.contains_key(key)
    }

    /// Keys in output order
    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.0.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// The projection as a JSON object
    pub fn to_value(&self) -> Value {
        Value::Object(self.0.clone().into_iter().collect())
    }

    pub fn into_inner(self) -> IndexMap<String, Value> {
        self.0
    }
}

/// Project `entity` to the requested `fields` and `relations`.
///
/// Both lists name keys of the serialized entity and are treated as one
/// requested set; output follows request order, `fields` first, with
/// duplicates collapsed. A requested key present on the entity is kept even
/// when its value is null. Unknown keys are left out. Derived keys are
/// computed through [`Decoratable::derive`]. Keys gated behind a disabled
/// flag are removed.
pub fn project<E: Decoratable>(
    entity: &E,
    fields: &[&str],
    relations: &[&str],
    flags: &FlagRouter,
) -> DomainResult<DecoratedEntity> {
    let Value::Object(mut source) = serde_json::to_value(entity)? else {
        return Err(DomainError::SerializationError(format!(
            "{} does not serialize to an object",
            std::any::type_name::<E>()
        )));
    };

    let mut projected = IndexMap::new();
    for &key in fields.iter().chain(relations) {
        if projected.contains_key(key) || !E::is_visible(key, flags) {
            continue;
        }
        let value = if E::is_derived(key) {
            entity.derive(key)
        } else {
            source.remove(key)
        };
        if let Some(value) = value {
            projected.insert(key.to_string(), value);
        }
    }
    Ok(DecoratedEntity(projected))
}
