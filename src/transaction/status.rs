// Copyright 2025 Cowboy AI, LLC.

//! Transaction status machine
//!
//! A handle starts `Active` and moves exactly once to a terminal status. The
//! allowed moves are edges in a small graph; anything else is refused.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Status of a transaction handle
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TransactionStatus {
    /// Open; accepts work and buffered events
    Active,
    /// Committed (terminal); buffered events were flushed
    Committed,
    /// Rolled back (terminal); buffered events were discarded
    RolledBack,
}

/// Inputs that finalize a transaction
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TransactionInput {
    /// The storage session committed
    Commit,
    /// Work failed, timed out, or was cancelled
    Rollback,
}

impl TransactionStatus {
    /// Status name
    pub fn name(&self) -> &'static str {
        match self {
            TransactionStatus::Active => "Active",
            TransactionStatus::Committed => "Committed",
            TransactionStatus::RolledBack => "RolledBack",
        }
    }

    /// Whether no further transition is possible
    pub fn is_terminal(&self) -> bool {
        !matches!(self, TransactionStatus::Active)
    }

    /// Whether `input` moves this status to `target`
    pub fn can_transition_to(&self, target: &Self, input: &TransactionInput) -> bool {
        use TransactionInput as I;
        use TransactionStatus as S;
        matches!(
            (*self, *target, *input),
            (S::Active, S::Committed, I::Commit) | (S::Active, S::RolledBack, I::Rollback)
        )
    }

    /// Target status for `input`, if the move is allowed
    pub fn next(&self, input: TransactionInput) -> Option<Self> {
        let target = match input {
            TransactionInput::Commit => TransactionStatus::Committed,
            TransactionInput::Rollback => TransactionStatus::RolledBack,
        };
        self.can_transition_to(&target, &input).then_some(target)
    }
}

impl fmt::Display for TransactionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}
