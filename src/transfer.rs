//! The transfer engine: moving money between two accounts of one owner.
//!
//! A transfer conserves the total balance across its two accounts. The
//! withdrawal, the deposit, and the record write happen in one SQL
//! transaction, so a failed withdrawal leaves no trace.

use rusqlite::{Connection, Row};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use time::OffsetDateTime;

use crate::{
    Error,
    account::{self, AccountId},
    database_id::DatabaseId,
    money,
    owner::{self, Owned, OwnerId},
};

/// Alias for the integer type used for transfer IDs.
pub type TransferId = DatabaseId;

/// A movement of money between two accounts of the same owner.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Transfer {
    /// The ID of the transfer.
    pub id: TransferId,
    /// The owner of both accounts.
    pub owner_id: OwnerId,
    /// The account the money left.
    pub from_account_id: AccountId,
    /// The account the money arrived in.
    pub to_account_id: AccountId,
    /// The amount moved, always positive.
    pub amount: Decimal,
    /// When the transfer was recorded.
    pub created_at: OffsetDateTime,
}

impl Owned for Transfer {
    fn owner(&self) -> OwnerId {
        self.owner_id
    }
}

pub(crate) fn create_transfer_table(connection: &Connection) -> Result<(), rusqlite::Error> {
    connection.execute(
        "CREATE TABLE IF NOT EXISTS transfer (
            id INTEGER PRIMARY KEY,
            owner_id INTEGER NOT NULL,
            from_account_id INTEGER NOT NULL,
            to_account_id INTEGER NOT NULL,
            amount TEXT NOT NULL,
            created_at TEXT NOT NULL,
            FOREIGN KEY(from_account_id) REFERENCES account(id) ON UPDATE CASCADE ON DELETE CASCADE,
            FOREIGN KEY(to_account_id) REFERENCES account(id) ON UPDATE CASCADE ON DELETE CASCADE
        )",
        (),
    )?;

    Ok(())
}

pub(crate) fn map_transfer_row(row: &Row) -> Result<Transfer, rusqlite::Error> {
    Ok(Transfer {
        id: row.get(0)?,
        owner_id: OwnerId::new(row.get(1)?),
        from_account_id: row.get(2)?,
        to_account_id: row.get(3)?,
        amount: money::decimal_from_row(row, 4)?,
        created_at: row.get(5)?,
    })
}

const TRANSFER_COLUMNS: &str = "id, owner_id, from_account_id, to_account_id, amount, created_at";

/// Move `amount` from one of `owner`'s accounts to another, as one atomic
/// unit.
///
/// # Errors
/// This function will return a:
/// - [Error::SameAccount] if both account IDs are the same,
/// - [Error::InvalidAmount] if the amount is zero or negative,
/// - [Error::NotFound] if either account does not exist,
/// - [Error::Forbidden] if either account belongs to a different owner,
/// - [Error::InsufficientFunds] if the source balance is less than the
///   amount, in which case neither balance changes and no record is
///   written,
/// - or [Error::SqlError] if there is some other SQL error.
pub fn transfer(
    owner: OwnerId,
    from_account_id: AccountId,
    to_account_id: AccountId,
    amount: Decimal,
    connection: &Connection,
) -> Result<Transfer, Error> {
    if from_account_id == to_account_id {
        return Err(Error::SameAccount);
    }

    let amount = money::require_positive(amount)?;

    let tx = connection.unchecked_transaction()?;

    let from_account = account::get_account(from_account_id, &tx)?;
    owner::authorize(owner, &from_account)?;

    let to_account = account::get_account(to_account_id, &tx)?;
    owner::authorize(owner, &to_account)?;

    account::withdraw(from_account_id, amount, &tx)?;
    account::deposit(to_account_id, amount, &tx)?;

    let transfer = tx
        .prepare(&format!(
            "INSERT INTO transfer (owner_id, from_account_id, to_account_id, amount, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5)
             RETURNING {TRANSFER_COLUMNS}"
        ))?
        .query_row(
            (
                owner.as_i64(),
                from_account_id,
                to_account_id,
                amount.to_string(),
                OffsetDateTime::now_utc(),
            ),
            map_transfer_row,
        )?;

    tx.commit()?;

    Ok(transfer)
}

/// Retrieve all transfers belonging to `owner`, newest first.
///
/// # Errors
/// This function will return an [Error::SqlError] if there is an SQL error.
pub fn get_transfers(owner: OwnerId, connection: &Connection) -> Result<Vec<Transfer>, Error> {
    connection
        .prepare(&format!(
            "SELECT {TRANSFER_COLUMNS} FROM transfer WHERE owner_id = :owner_id ORDER BY id DESC"
        ))?
        .query_map(&[(":owner_id", &owner.as_i64())], map_transfer_row)?
        .map(|maybe_transfer| maybe_transfer.map_err(Error::from))
        .collect()
}
