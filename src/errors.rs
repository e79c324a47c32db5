// Copyright 2025 Cowboy AI, LLC.

//! Error types for unit-of-work and domain service operations

use crate::storage::StorageError;
use crate::transaction::TransactionStatus;
use thiserror::Error;
use uuid::Uuid;

/// Errors that can occur in domain operations
#[derive(Debug, Clone, Error)]
pub enum DomainError {
    /// Entity not found
    #[error("Entity not found: {entity_type} with id {id}")]
    NotFound {
        /// Type of entity that wasn't found
        entity_type: String,
        /// ID that was searched for
        id: String,
    },

    /// A transaction handle was used in a way its status does not allow.
    ///
    /// This is a programming error in the caller, not a recoverable condition.
    #[error("Invalid transaction state: cannot {operation} transaction {transaction_id} in status {status}")]
    InvalidTransactionState {
        /// Handle the operation was attempted on
        transaction_id: Uuid,
        /// Status the handle was in
        status: TransactionStatus,
        /// Operation that was attempted
        operation: String,
    },

    /// The storage session was requested after its transaction was finalized
    #[error("No active transaction")]
    NoActiveTransaction,

    /// A subscriber failed while handling a dispatched event
    #[error("Subscriber {subscriber} failed handling {event_name}: {message}")]
    SubscriberError {
        /// Event being delivered
        event_name: String,
        /// Name of the failing subscriber
        subscriber: String,
        /// Failure description
        message: String,
    },

    /// Failure reported by the storage session, passed through unchanged
    #[error(transparent)]
    Storage(#[from] StorageError),

    /// Validation error
    #[error("Validation error: {0}")]
    ValidationError(String),

    /// Already exists error (generic)
    #[error("Already exists: {0}")]
    AlreadyExists(String),

    /// The root transaction did not finish within its time budget
    #[error("Transaction {transaction_id} timed out after {timeout_ms}ms")]
    TransactionTimeout {
        /// Handle that was rolled back
        transaction_id: Uuid,
        /// Budget that elapsed
        timeout_ms: u64,
    },

    /// The root transaction was marked rollback-only by a nested scope
    #[error("Transaction {transaction_id} aborted: {reason}")]
    TransactionAborted {
        /// Handle that was rolled back
        transaction_id: Uuid,
        /// Failure that poisoned the transaction
        reason: String,
    },

    /// Serialization error
    #[error("Serialization error: {0}")]
    SerializationError(String),
}

/// Result type for domain operations
pub type DomainResult<T> = Result<T, DomainError>;

impl From<serde_json::Error> for DomainError {
    fn from(err: serde_json::Error) -> Self {
        DomainError::SerializationError(err.to_string())
    }
}

impl DomainError {
    /// Create a not found error for an entity type
    pub fn not_found(entity_type: impl Into<String>, id: impl Into<String>) -> Self {
        DomainError::NotFound {
            entity_type: entity_type.into(),
            id: id.into(),
        }
    }

    /// Create an invalid transaction state error and report it.
    ///
    /// Contract violations are always logged at error level when raised.
    pub fn invalid_state(
        transaction_id: Uuid,
        status: TransactionStatus,
        operation: impl Into<String>,
    ) -> Self {
        let operation = operation.into();
        tracing::error!(
            %transaction_id,
            %status,
            operation = operation.as_str(),
            "transaction contract violation"
        );
        DomainError::InvalidTransactionState {
            transaction_id,
            status,
            operation,
        }
    }

    /// Check if this is a not found error
    pub fn is_not_found(&self) -> bool {
        matches!(self, DomainError::NotFound { .. })
    }

    /// Check if this error originated in the storage session
    pub fn is_storage_error(&self) -> bool {
        matches!(self, DomainError::Storage(_))
    }

    /// Check if this is a validation error
    pub fn is_validation_error(&self) -> bool {
        matches!(
            self,
            DomainError::ValidationError(_) | DomainError::AlreadyExists(_)
        )
    }

    /// Check if this error is a misuse of the transaction contract
    pub fn is_contract_violation(&self) -> bool {
        matches!(
            self,
            DomainError::InvalidTransactionState { .. } | DomainError::NoActiveTransaction
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display_messages() {
        let err = DomainError::not_found("Currency", "usd");
        assert_eq!(err.to_string(), "Entity not found: Currency with id usd");

        let err = DomainError::NoActiveTransaction;
        assert_eq!(err.to_string(), "No active transaction");

        let err = DomainError::SubscriberError {
            event_name: "currency.updated".to_string(),
            subscriber: "search-indexer".to_string(),
            message: "index offline".to_string(),
        };
        assert_eq!(
            err.to_string(),
            "Subscriber search-indexer failed handling currency.updated: index offline"
        );

        let id = Uuid::nil();
        let err = DomainError::TransactionTimeout {
            transaction_id: id,
            timeout_ms: 250,
        };
        assert_eq!(
            err.to_string(),
            format!("Transaction {id} timed out after 250ms")
        );
    }

    #[test]
    fn test_storage_error_is_transparent() {
        let err: DomainError = StorageError::Backend("disk full".to_string()).into();
        assert!(err.is_storage_error());
        assert_eq!(err.to_string(), "Storage backend error: disk full");
    }

    #[test]
    fn test_invalid_state_display() {
        let id = Uuid::new_v4();
        let err = DomainError::invalid_state(id, TransactionStatus::Committed, "join");
        assert!(err.is_contract_violation());
        assert_eq!(
            err.to_string(),
            format!("Invalid transaction state: cannot join transaction {id} in status Committed")
        );
    }

    #[test]
    fn test_error_predicates() {
        assert!(DomainError::not_found("Product", "prod_1").is_not_found());
        assert!(DomainError::ValidationError("bad".into()).is_validation_error());
        assert!(DomainError::AlreadyExists("opt".into()).is_validation_error());
        assert!(DomainError::NoActiveTransaction.is_contract_violation());
        assert!(!DomainError::NoActiveTransaction.is_storage_error());
    }

    #[test]
    fn test_serde_json_error_conversion() {
        let err = serde_json::from_str::<serde_json::Value>("{not json").unwrap_err();
        let domain: DomainError = err.into();
        assert!(matches!(domain, DomainError::SerializationError(_)));
    }
}
