// Copyright 2025 Cowboy AI, LLC.

//! Transactions: status machine, handles, contexts and the unit of work

mod context;
mod handle;
mod status;
mod unit_of_work;

pub use context::ServiceContext;
pub use handle::{SessionGuard, TransactionHandle};
pub use status::{TransactionInput, TransactionStatus};
pub use unit_of_work::UnitOfWork;
