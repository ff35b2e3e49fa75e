//! The debt and settlement engine.
//!
//! A debt tracks money owed between the owner and a contact. Creating one
//! moves cash immediately: borrowing (payable) deposits into the settling
//! account, lending (receivable) withdraws from it. Payments then amortize
//! the remaining balance until it reaches exactly zero, at which point the
//! debt is settled for good. There is no way to un-settle a debt.

use rusqlite::{Connection, Row};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use time::OffsetDateTime;

use crate::{
    Error,
    account::{self, AccountId},
    contact::{self, ContactId},
    database_id::DatabaseId,
    money,
    owner::{self, Owned, OwnerId},
};

/// Alias for the integer type used for debt IDs.
pub type DebtId = DatabaseId;

/// Alias for the integer type used for debt payment IDs.
pub type DebtPaymentId = DatabaseId;

// ============================================================================
// MODELS
// ============================================================================

/// Which way a debt obligation points.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DebtDirection {
    /// The owner owes the contact. Borrowing brings money in, paying it
    /// back sends money out.
    Payable,
    /// The contact owes the owner. Lending sends money out, repayments
    /// bring money in.
    Receivable,
}

impl DebtDirection {
    /// The text stored in the database for this direction.
    pub fn as_str(&self) -> &'static str {
        match self {
            DebtDirection::Payable => "payable",
            DebtDirection::Receivable => "receivable",
        }
    }

    fn from_column(row: &Row, index: usize) -> Result<Self, rusqlite::Error> {
        let raw: String = row.get(index)?;

        match raw.as_str() {
            "payable" => Ok(DebtDirection::Payable),
            "receivable" => Ok(DebtDirection::Receivable),
            _ => Err(rusqlite::Error::FromSqlConversionFailure(
                index,
                rusqlite::types::Type::Text,
                format!("unknown debt direction \"{raw}\"").into(),
            )),
        }
    }
}

/// A debt obligation between the owner and a contact.
///
/// Invariants: `0 <= remaining_amount <= initial_amount`, and `is_settled`
/// holds exactly when the remaining amount is zero.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Debt {
    /// The ID of the debt.
    pub id: DebtId,
    /// The owner that holds exclusive rights over the debt.
    pub owner_id: OwnerId,
    /// The counterparty the debt is owed to or by.
    pub contact_id: ContactId,
    /// The account the debt's cash effects are posted against.
    pub account_id: AccountId,
    /// Which way the obligation points.
    pub direction: DebtDirection,
    /// The amount originally borrowed or lent.
    pub initial_amount: Decimal,
    /// The amount still outstanding, non-increasing over time.
    pub remaining_amount: Decimal,
    /// True once the remaining amount has reached exactly zero.
    pub is_settled: bool,
    /// When the debt was created.
    pub created_at: OffsetDateTime,
}

impl Debt {
    /// Whether the debt has been partially, but not fully, paid down.
    ///
    /// Derived from the amounts rather than stored.
    pub fn is_partially_paid(&self) -> bool {
        !self.is_settled && self.remaining_amount != self.initial_amount
    }
}

impl Owned for Debt {
    fn owner(&self) -> OwnerId {
        self.owner_id
    }
}

/// The data needed to create a new [Debt].
#[derive(Debug, Clone, PartialEq)]
pub struct NewDebt {
    /// The counterparty the debt is owed to or by.
    pub contact_id: ContactId,
    /// The account the initial cash movement and all payments post to.
    pub account_id: AccountId,
    /// Which way the obligation points.
    pub direction: DebtDirection,
    /// The amount borrowed or lent, must be positive.
    pub initial_amount: Decimal,
}

/// One payment made against a debt.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DebtPayment {
    /// The ID of the payment.
    pub id: DebtPaymentId,
    /// The debt this payment amortizes.
    pub debt_id: DebtId,
    /// The account the payment was posted against.
    pub account_id: AccountId,
    /// The amount paid, always positive.
    pub amount_paid: Decimal,
    /// When the payment was recorded.
    pub date: OffsetDateTime,
}

// ============================================================================
// DATABASE FUNCTIONS
// ============================================================================

pub(crate) fn create_debt_table(connection: &Connection) -> Result<(), rusqlite::Error> {
    connection.execute(
        "CREATE TABLE IF NOT EXISTS debt (
            id INTEGER PRIMARY KEY,
            owner_id INTEGER NOT NULL,
            contact_id INTEGER NOT NULL,
            account_id INTEGER NOT NULL,
            direction TEXT NOT NULL,
            initial_amount TEXT NOT NULL,
            remaining_amount TEXT NOT NULL,
            is_settled INTEGER NOT NULL DEFAULT 0,
            created_at TEXT NOT NULL,
            FOREIGN KEY(contact_id) REFERENCES contact(id) ON UPDATE CASCADE ON DELETE CASCADE,
            FOREIGN KEY(account_id) REFERENCES account(id) ON UPDATE CASCADE ON DELETE RESTRICT
        )",
        (),
    )?;

    Ok(())
}

pub(crate) fn create_debt_payment_table(connection: &Connection) -> Result<(), rusqlite::Error> {
    connection.execute(
        "CREATE TABLE IF NOT EXISTS debt_payment (
            id INTEGER PRIMARY KEY,
            debt_id INTEGER NOT NULL,
            account_id INTEGER NOT NULL,
            amount_paid TEXT NOT NULL,
            date TEXT NOT NULL,
            FOREIGN KEY(debt_id) REFERENCES debt(id) ON UPDATE CASCADE ON DELETE CASCADE,
            FOREIGN KEY(account_id) REFERENCES account(id) ON UPDATE CASCADE ON DELETE CASCADE
        )",
        (),
    )?;

    Ok(())
}

pub(crate) fn map_debt_row(row: &Row) -> Result<Debt, rusqlite::Error> {
    Ok(Debt {
        id: row.get(0)?,
        owner_id: OwnerId::new(row.get(1)?),
        contact_id: row.get(2)?,
        account_id: row.get(3)?,
        direction: DebtDirection::from_column(row, 4)?,
        initial_amount: money::decimal_from_row(row, 5)?,
        remaining_amount: money::decimal_from_row(row, 6)?,
        is_settled: row.get(7)?,
        created_at: row.get(8)?,
    })
}

pub(crate) fn map_debt_payment_row(row: &Row) -> Result<DebtPayment, rusqlite::Error> {
    Ok(DebtPayment {
        id: row.get(0)?,
        debt_id: row.get(1)?,
        account_id: row.get(2)?,
        amount_paid: money::decimal_from_row(row, 3)?,
        date: row.get(4)?,
    })
}

const DEBT_COLUMNS: &str = "id, owner_id, contact_id, account_id, direction, initial_amount, \
     remaining_amount, is_settled, created_at";

const DEBT_PAYMENT_COLUMNS: &str = "id, debt_id, account_id, amount_paid, date";

/// Create a new debt for `owner` and post its initial cash movement, as
/// one atomic unit.
///
/// A payable debt deposits the borrowed money into the settling account; a
/// receivable debt withdraws the lent money from it.
///
/// # Errors
/// This function will return a:
/// - [Error::InvalidAmount] if the initial amount is zero or negative,
/// - [Error::NotFound] if the contact or account does not exist,
/// - [Error::Forbidden] if the contact or account belongs to a different
///   owner,
/// - [Error::InsufficientFunds] if lending more than the account holds,
///   in which case no debt row is written,
/// - or [Error::SqlError] if there is some other SQL error.
pub fn create_debt(
    owner: OwnerId,
    new_debt: &NewDebt,
    connection: &Connection,
) -> Result<Debt, Error> {
    let initial_amount = money::require_positive(new_debt.initial_amount)?;

    let tx = connection.unchecked_transaction()?;

    let contact = contact::get_contact(new_debt.contact_id, &tx)?;
    owner::authorize(owner, &contact)?;

    let account = account::get_account(new_debt.account_id, &tx)?;
    owner::authorize(owner, &account)?;

    match new_debt.direction {
        // Borrowing brings money in, lending sends money out.
        DebtDirection::Payable => account::deposit(account.id, initial_amount, &tx)?,
        DebtDirection::Receivable => account::withdraw(account.id, initial_amount, &tx)?,
    };

    let debt = tx
        .prepare(&format!(
            "INSERT INTO debt (owner_id, contact_id, account_id, direction, initial_amount, \
             remaining_amount, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
             RETURNING {DEBT_COLUMNS}"
        ))?
        .query_row(
            (
                owner.as_i64(),
                new_debt.contact_id,
                new_debt.account_id,
                new_debt.direction.as_str(),
                initial_amount.to_string(),
                initial_amount.to_string(),
                OffsetDateTime::now_utc(),
            ),
            map_debt_row,
        )?;

    tx.commit()?;

    Ok(debt)
}

/// Retrieve a debt by its `id`.
///
/// # Errors
/// This function will return a:
/// - [Error::NotFound] if `id` does not refer to a valid debt,
/// - or [Error::SqlError] if there is some other SQL error.
pub fn get_debt(id: DebtId, connection: &Connection) -> Result<Debt, Error> {
    let debt = connection
        .prepare(&format!("SELECT {DEBT_COLUMNS} FROM debt WHERE id = :id"))?
        .query_row(&[(":id", &id)], map_debt_row)?;

    Ok(debt)
}

/// Retrieve all debts belonging to `owner`, newest first.
///
/// # Errors
/// This function will return an [Error::SqlError] if there is an SQL error.
pub fn get_debts(owner: OwnerId, connection: &Connection) -> Result<Vec<Debt>, Error> {
    connection
        .prepare(&format!(
            "SELECT {DEBT_COLUMNS} FROM debt WHERE owner_id = :owner_id ORDER BY id DESC"
        ))?
        .query_map(&[(":owner_id", &owner.as_i64())], map_debt_row)?
        .map(|maybe_debt| maybe_debt.map_err(Error::from))
        .collect()
}

/// Record a payment against a debt, as one atomic unit.
///
/// The payment decrements the remaining balance, marks the debt settled
/// when the balance reaches exactly zero, and posts the cash movement to
/// `account_id`: paying back a payable debt withdraws, collecting on a
/// receivable debt deposits.
///
/// # Errors
/// This function will return a:
/// - [Error::InvalidAmount] if the amount is zero or negative,
/// - [Error::OverPayment] if the amount exceeds the debt's remaining
///   balance (a settled debt therefore rejects every payment),
/// - [Error::NotFound] if the debt or account does not exist,
/// - [Error::Forbidden] if the debt or account belongs to a different
///   owner,
/// - [Error::InsufficientFunds] if paying back more than the account
///   holds, in which case the debt and the balance are unchanged,
/// - or [Error::SqlError] if there is some other SQL error.
pub fn record_payment(
    owner: OwnerId,
    debt_id: DebtId,
    account_id: AccountId,
    amount_paid: Decimal,
    connection: &Connection,
) -> Result<(Debt, DebtPayment), Error> {
    let amount_paid = money::require_positive(amount_paid)?;

    let tx = connection.unchecked_transaction()?;

    let debt = get_debt(debt_id, &tx)?;
    owner::authorize(owner, &debt)?;

    let account = account::get_account(account_id, &tx)?;
    owner::authorize(owner, &account)?;

    // Checked against the current remaining balance, not the initial one.
    if amount_paid > debt.remaining_amount {
        return Err(Error::OverPayment);
    }

    let remaining_amount = debt.remaining_amount - amount_paid;
    let is_settled = remaining_amount == Decimal::ZERO;

    let debt = tx
        .prepare(&format!(
            "UPDATE debt SET remaining_amount = ?1, is_settled = ?2 WHERE id = ?3
             RETURNING {DEBT_COLUMNS}"
        ))?
        .query_row(
            (remaining_amount.to_string(), is_settled, debt_id),
            map_debt_row,
        )?;

    match debt.direction {
        DebtDirection::Payable => account::withdraw(account_id, amount_paid, &tx)?,
        DebtDirection::Receivable => account::deposit(account_id, amount_paid, &tx)?,
    };

    let payment = tx
        .prepare(&format!(
            "INSERT INTO debt_payment (debt_id, account_id, amount_paid, date)
             VALUES (?1, ?2, ?3, ?4)
             RETURNING {DEBT_PAYMENT_COLUMNS}"
        ))?
        .query_row(
            (
                debt_id,
                account_id,
                amount_paid.to_string(),
                OffsetDateTime::now_utc(),
            ),
            map_debt_payment_row,
        )?;

    tx.commit()?;

    Ok((debt, payment))
}

/// Retrieve the payments recorded against a debt, oldest first.
///
/// # Errors
/// This function will return a:
/// - [Error::NotFound] if `debt_id` does not refer to a valid debt,
/// - [Error::Forbidden] if the debt belongs to a different owner,
/// - or [Error::SqlError] if there is some other SQL error.
pub fn get_payments(
    owner: OwnerId,
    debt_id: DebtId,
    connection: &Connection,
) -> Result<Vec<DebtPayment>, Error> {
    let debt = get_debt(debt_id, connection)?;
    owner::authorize(owner, &debt)?;

    connection
        .prepare(&format!(
            "SELECT {DEBT_PAYMENT_COLUMNS} FROM debt_payment WHERE debt_id = :debt_id ORDER BY id"
        ))?
        .query_map(&[(":debt_id", &debt_id)], map_debt_payment_row)?
        .map(|maybe_payment| maybe_payment.map_err(Error::from))
        .collect()
}
