//! Defines the crate level error type shared by every ledger operation.

use rust_decimal::Decimal;

/// The errors that may occur while operating on the ledger.
///
/// Every variant maps to a rejected operation: when a function returns an
/// error, the persisted state is exactly as it was before the call.
#[derive(Debug, thiserror::Error, PartialEq)]
pub enum Error {
    /// A withdrawal was attempted for more money than the account holds.
    ///
    /// Raised by expense creation, transfers, receivable debt creation,
    /// payable debt payments, and income deactivation.
    #[error("insufficient funds in account \"{0}\"")]
    InsufficientFunds(String),

    /// A debt payment exceeded the debt's remaining balance.
    ///
    /// The remaining balance is checked at application time, so a settled
    /// debt rejects every further payment with this error.
    #[error("payment amount exceeds the remaining debt balance")]
    OverPayment,

    /// A transfer was attempted from an account to itself.
    #[error("cannot transfer between an account and itself")]
    SameAccount,

    /// A zero or negative amount was supplied where a positive amount is
    /// required.
    #[error("{0} is not a valid amount, amounts must be greater than zero")]
    InvalidAmount(Decimal),

    /// A referenced entity exists but belongs to a different owner.
    ///
    /// Boundary layers conventionally translate this to the same response
    /// as [Error::NotFound] so that clients cannot probe for other owners'
    /// records.
    #[error("the requested resource belongs to a different owner")]
    Forbidden,

    /// The requested resource could not be found.
    ///
    /// Internally, this error may occur when a query returns no rows.
    #[error("the requested resource could not be found")]
    NotFound,

    /// The specified account name already exists for this owner.
    #[error("the account \"{0}\" already exists")]
    DuplicateAccountName(String),

    /// The account is the settling account of an unsettled debt and cannot
    /// be deactivated until the debt is settled.
    #[error("the account \"{0}\" is the settling account of an unsettled debt")]
    AccountHasOpenDebt(String),

    /// Could not acquire the database lock.
    #[error("could not acquire the database lock")]
    DatabaseLockError,

    /// An unhandled/unexpected SQL error.
    #[error("an unexpected SQL error occurred: {0}")]
    SqlError(rusqlite::Error),
}

impl From<rusqlite::Error> for Error {
    fn from(value: rusqlite::Error) -> Self {
        match value {
            rusqlite::Error::QueryReturnedNoRows => Error::NotFound,
            error => {
                tracing::error!("an unhandled SQL error occurred: {}", error);
                Error::SqlError(error)
            }
        }
    }
}
