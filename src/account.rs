//! Account management for the ledger core.
//!
//! This module contains everything related to monetary accounts:
//! - The `Account` model and the `NewAccount` input type
//! - Database functions for creating, fetching, and deactivating accounts
//! - The deposit/withdraw primitives every engine posts balance changes
//!   through
//!
//! Balances are never written directly by callers outside this crate. The
//! only paths that change a balance are the entry, transfer, and debt
//! engines, each of which records why the balance moved.

use rusqlite::{Connection, Row};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use time::OffsetDateTime;

use crate::{
    Error,
    database_id::DatabaseId,
    money,
    owner::{Owned, OwnerId},
};

/// Alias for the integer type used for account IDs.
pub type AccountId = DatabaseId;

// ============================================================================
// MODELS
// ============================================================================

/// The kind of monetary account.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AccountType {
    /// A savings account.
    Savings,
    /// An everyday checking account.
    Checking,
    /// A credit card.
    Credit,
    /// Physical cash.
    Cash,
    /// A digital wallet.
    #[serde(rename = "e-wallet")]
    EWallet,
    /// Anything that does not fit the other kinds.
    Other,
}

impl AccountType {
    /// The text stored in the database for this account type.
    pub fn as_str(&self) -> &'static str {
        match self {
            AccountType::Savings => "savings",
            AccountType::Checking => "checking",
            AccountType::Credit => "credit",
            AccountType::Cash => "cash",
            AccountType::EWallet => "e-wallet",
            AccountType::Other => "other",
        }
    }

    fn parse(text: &str) -> Option<Self> {
        match text {
            "savings" => Some(AccountType::Savings),
            "checking" => Some(AccountType::Checking),
            "credit" => Some(AccountType::Credit),
            "cash" => Some(AccountType::Cash),
            "e-wallet" => Some(AccountType::EWallet),
            "other" => Some(AccountType::Other),
            _ => None,
        }
    }
}

/// A named pot of money belonging to one owner.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Account {
    /// The ID of the account.
    pub id: AccountId,
    /// The owner that holds exclusive rights over the account.
    pub owner_id: OwnerId,
    /// The name of the account, unique per owner.
    pub name: String,
    /// The kind of account.
    pub account_type: AccountType,
    /// The money currently available in the account.
    pub balance: Decimal,
    /// The currency code for amounts in this account.
    pub currency: String,
    /// Whether the account can take part in new operations.
    pub is_active: bool,
    /// When the account was created.
    pub created_at: OffsetDateTime,
}

impl Owned for Account {
    fn owner(&self) -> OwnerId {
        self.owner_id
    }
}

/// The data needed to create a new [Account].
#[derive(Debug, Clone, PartialEq)]
pub struct NewAccount {
    /// The name of the account, unique per owner.
    pub name: String,
    /// The kind of account.
    pub account_type: AccountType,
    /// The money the account starts with. Must not be negative.
    pub opening_balance: Decimal,
    /// The currency code for amounts in this account.
    pub currency: String,
}

// ============================================================================
// DATABASE FUNCTIONS
// ============================================================================

pub(crate) fn create_account_table(connection: &Connection) -> Result<(), rusqlite::Error> {
    connection.execute(
        "CREATE TABLE IF NOT EXISTS account (
            id INTEGER PRIMARY KEY,
            owner_id INTEGER NOT NULL,
            name TEXT NOT NULL,
            account_type TEXT NOT NULL,
            balance TEXT NOT NULL,
            currency TEXT NOT NULL,
            is_active INTEGER NOT NULL DEFAULT 1,
            created_at TEXT NOT NULL,
            UNIQUE(owner_id, name)
        )",
        (),
    )?;

    Ok(())
}

pub(crate) fn map_account_row(row: &Row) -> Result<Account, rusqlite::Error> {
    let id = row.get(0)?;
    let owner_id = OwnerId::new(row.get(1)?);
    let name = row.get(2)?;

    let raw_type: String = row.get(3)?;
    let account_type = AccountType::parse(&raw_type).ok_or_else(|| {
        rusqlite::Error::FromSqlConversionFailure(
            3,
            rusqlite::types::Type::Text,
            format!("unknown account type \"{raw_type}\"").into(),
        )
    })?;

    let balance = money::decimal_from_row(row, 4)?;
    let currency = row.get(5)?;
    let is_active = row.get(6)?;
    let created_at = row.get(7)?;

    Ok(Account {
        id,
        owner_id,
        name,
        account_type,
        balance,
        currency,
        is_active,
        created_at,
    })
}

const ACCOUNT_COLUMNS: &str =
    "id, owner_id, name, account_type, balance, currency, is_active, created_at";

/// Create a new account for `owner`.
///
/// # Errors
/// This function will return a:
/// - [Error::InvalidAmount] if the opening balance is negative,
/// - [Error::DuplicateAccountName] if the owner already has an account
///   with the same name,
/// - or [Error::SqlError] if there is some other SQL error.
pub fn create_account(
    owner: OwnerId,
    new_account: &NewAccount,
    connection: &Connection,
) -> Result<Account, Error> {
    let opening_balance = money::normalize(new_account.opening_balance);

    if opening_balance < Decimal::ZERO {
        return Err(Error::InvalidAmount(opening_balance));
    }

    let account = connection
        .prepare(&format!(
            "INSERT INTO account (owner_id, name, account_type, balance, currency, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)
             RETURNING {ACCOUNT_COLUMNS}"
        ))?
        .query_row(
            (
                owner.as_i64(),
                &new_account.name,
                new_account.account_type.as_str(),
                opening_balance.to_string(),
                &new_account.currency,
                OffsetDateTime::now_utc(),
            ),
            map_account_row,
        )
        .map_err(|error| match error {
            rusqlite::Error::SqliteFailure(sql_error, Some(ref desc))
                if sql_error.extended_code == 2067 && desc.contains("account.") =>
            {
                Error::DuplicateAccountName(new_account.name.clone())
            }
            error => error.into(),
        })?;

    Ok(account)
}

/// Retrieve an account by its `id`.
///
/// Callers acting on behalf of an owner must pass the result through
/// [crate::owner::authorize] before mutating anything.
///
/// # Errors
/// This function will return a:
/// - [Error::NotFound] if `id` does not refer to a valid account,
/// - or [Error::SqlError] if there is some other SQL error.
pub fn get_account(id: AccountId, connection: &Connection) -> Result<Account, Error> {
    let account = connection
        .prepare(&format!(
            "SELECT {ACCOUNT_COLUMNS} FROM account WHERE id = :id"
        ))?
        .query_row(&[(":id", &id)], map_account_row)?;

    Ok(account)
}

/// Retrieve all accounts belonging to `owner`.
///
/// # Errors
/// This function will return an [Error::SqlError] if there is an SQL error.
pub fn get_accounts(owner: OwnerId, connection: &Connection) -> Result<Vec<Account>, Error> {
    connection
        .prepare(&format!(
            "SELECT {ACCOUNT_COLUMNS} FROM account WHERE owner_id = :owner_id ORDER BY name"
        ))?
        .query_map(&[(":owner_id", &owner.as_i64())], map_account_row)?
        .map(|maybe_account| maybe_account.map_err(Error::from))
        .collect()
}

/// Add `amount` to an account's balance and persist the row.
///
/// The caller is responsible for validating that `amount` is positive and
/// for running this inside the SQL transaction of the operation that
/// explains the balance change.
///
/// # Errors
/// This function will return a:
/// - [Error::NotFound] if `id` does not refer to a valid account,
/// - or [Error::SqlError] if there is some other SQL error.
pub(crate) fn deposit(
    id: AccountId,
    amount: Decimal,
    connection: &Connection,
) -> Result<Account, Error> {
    let account = get_account(id, connection)?;
    let balance = account.balance + amount;

    set_balance(id, balance, connection)
}

/// Subtract `amount` from an account's balance and persist the row.
///
/// The comparison against the current balance uses exact decimals parsed
/// from the stored text, so there is no binary-float drift.
///
/// # Errors
/// This function will return a:
/// - [Error::InsufficientFunds] if the balance is less than `amount`,
/// - [Error::NotFound] if `id` does not refer to a valid account,
/// - or [Error::SqlError] if there is some other SQL error.
pub(crate) fn withdraw(
    id: AccountId,
    amount: Decimal,
    connection: &Connection,
) -> Result<Account, Error> {
    let account = get_account(id, connection)?;

    if account.balance < amount {
        return Err(Error::InsufficientFunds(account.name));
    }

    let balance = account.balance - amount;

    set_balance(id, balance, connection)
}

fn set_balance(
    id: AccountId,
    balance: Decimal,
    connection: &Connection,
) -> Result<Account, Error> {
    let account = connection
        .prepare(&format!(
            "UPDATE account SET balance = ?1 WHERE id = ?2 RETURNING {ACCOUNT_COLUMNS}"
        ))?
        .query_row((balance.to_string(), id), map_account_row)?;

    Ok(account)
}

/// Soft-disable an account so it no longer takes part in new operations.
///
/// The row is kept so existing entries, transfers, and debts retain their
/// history.
///
/// # Errors
/// This function will return a:
/// - [Error::NotFound] if `id` does not refer to a valid account,
/// - [Error::Forbidden] if the account belongs to a different owner,
/// - [Error::AccountHasOpenDebt] if an unsettled debt settles against the
///   account,
/// - or [Error::SqlError] if there is some other SQL error.
pub fn deactivate_account(
    owner: OwnerId,
    id: AccountId,
    connection: &Connection,
) -> Result<Account, Error> {
    let tx = connection.unchecked_transaction()?;

    let account = get_account(id, &tx)?;
    crate::owner::authorize(owner, &account)?;

    let has_open_debt: bool = tx.query_row(
        "SELECT EXISTS(SELECT 1 FROM debt WHERE account_id = :id AND is_settled = 0)",
        &[(":id", &id)],
        |row| row.get(0),
    )?;

    if has_open_debt {
        return Err(Error::AccountHasOpenDebt(account.name));
    }

    let account = tx
        .prepare(&format!(
            "UPDATE account SET is_active = 0 WHERE id = ?1 RETURNING {ACCOUNT_COLUMNS}"
        ))?
        .query_row([id], map_account_row)?;

    tx.commit()?;

    Ok(account)
}
