//! Khata is a personal finance ledger core.
//!
//! It tracks accounts, income and expense entries, transfers between
//! accounts, and peer debts, deriving every balance from an explicit,
//! atomic state transition. The crate deliberately stops at the ledger:
//! authentication, HTTP handling, rendering, and exports belong to the
//! surrounding application, which calls in through [Ledger] with an
//! authenticated [OwnerId].
//!
//! The rules the core guarantees:
//! - creating an Income, Expense, Transfer, Debt, or DebtPayment record
//!   mutates the affected balances exactly once, atomically with the
//!   record write;
//! - a withdrawal can never push a balance below zero;
//! - a debt's remaining balance only ever decreases, and the settled flag
//!   holds exactly when it is zero;
//! - every operation either commits in full or leaves the store untouched.
//!
//! All monetary values are exact decimals ([rust_decimal::Decimal]);
//! binary floating point never touches money.

#![warn(missing_docs)]

pub mod account;
pub mod category;
pub mod contact;
mod database_id;
pub mod db;
pub mod debt;
pub mod entry;
mod error;
mod ledger;
pub mod money;
pub mod owner;
pub mod report;
pub mod transfer;

pub use database_id::DatabaseId;
pub use db::initialize as initialize_db;
pub use error::Error;
pub use ledger::Ledger;
pub use owner::{Owned, OwnerId, authorize};
