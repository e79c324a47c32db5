// Copyright 2025 Cowboy AI, LLC.

//! Typed access to JSON records in a storage session

use crate::errors::{DomainError, DomainResult};
use crate::storage::StorageSession;
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::marker::PhantomData;

/// An entity persisted as one record in a collection
pub trait StoredEntity: Serialize + DeserializeOwned + Clone + Send + Sync + 'static {
    /// Collection holding records of this type
    const COLLECTION: &'static str;

    /// Name used in errors and logs
    const ENTITY_TYPE: &'static str;

    /// Record id
    fn storage_id(&self) -> String;
}

/// Typed repository over a storage session
pub struct Repository<E> {
    _entity: PhantomData<fn() -> E>,
}

impl<E: StoredEntity> Repository<E> {
    /// Find an entity, if present
    pub async fn find(session: &mut dyn StorageSession, id: &str) -> DomainResult<Option<E>> {
        match session.find(E::COLLECTION, id).await? {
            Some(record) => Ok(Some(serde_json::from_value(record)?)),
            None => Ok(None),
        }
    }

    /// Find an entity or fail with `NotFound`
    pub async fn get(session: &mut dyn StorageSession, id: &str) -> DomainResult<E> {
        Self::find(session, id)
            .await?
            .ok_or_else(|| DomainError::not_found(E::ENTITY_TYPE, id))
    }

    /// Insert or replace an entity
    pub async fn save(session: &mut dyn StorageSession, entity: &E) -> DomainResult<()> {
        let record = serde_json::to_value(entity)?;
        session
            .save(E::COLLECTION, &entity.storage_id(), record)
            .await?;
        Ok(())
    }

    /// All entities matching a predicate, in storage order
    pub async fn list_where<P>(session: &mut dyn StorageSession, predicate: P) -> DomainResult<Vec<E>>
    where
        P: Fn(&E) -> bool,
    {
        let mut found = Vec::new();
        for record in session.list(E::COLLECTION).await? {
            let entity: E = serde_json::from_value(record)?;
            if predicate(&entity) {
                found.push(entity);
            }
        }
        Ok(found)
    }
}
