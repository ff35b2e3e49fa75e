//! Read-only aggregate queries for dashboards, exports, and charts.
//!
//! Reporting collaborators consume these sums and never mutate balances.
//! Amounts are folded in Rust over exact decimals; SQL never does float
//! arithmetic on money.

use std::collections::HashMap;

use rusqlite::Connection;
use rust_decimal::Decimal;
use serde::Serialize;
use time::Date;

use crate::{Error, debt::DebtDirection, entry::EntryKind, money, owner::OwnerId};

/// The label used for entries that have no category.
pub const UNCATEGORIZED_LABEL: &str = "Uncategorized";

/// The total amount of active entries in one calendar month.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MonthlyTotal {
    /// The first day of the month.
    pub month: Date,
    /// The sum of entry amounts in the month.
    pub total: Decimal,
}

/// The total amount of active entries under one category label.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CategoryTotal {
    /// The category name, or [UNCATEGORIZED_LABEL].
    pub label: String,
    /// The sum of entry amounts under the label.
    pub total: Decimal,
}

/// Outstanding debt totals per direction.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DebtSummary {
    /// The remaining amount the owner still owes others.
    pub payable_outstanding: Decimal,
    /// The remaining amount others still owe the owner.
    pub receivable_outstanding: Decimal,
}

/// Sum the owner's active entries of `kind` per calendar month, in
/// chronological order.
///
/// # Errors
/// This function will return an [Error::SqlError] if there is an SQL error.
pub fn monthly_totals(
    owner: OwnerId,
    kind: EntryKind,
    connection: &Connection,
) -> Result<Vec<MonthlyTotal>, Error> {
    let rows: Vec<(Date, Decimal)> = connection
        .prepare(
            "SELECT date, amount FROM entry
             WHERE owner_id = ?1 AND kind = ?2 AND is_active = 1",
        )?
        .query_map(
            rusqlite::params![owner.as_i64(), kind.as_str()],
            |row| {
                let date: Date = row.get(0)?;
                let amount = money::decimal_from_row(row, 1)?;
                Ok((date, amount))
            },
        )?
        .collect::<Result<_, _>>()?;

    let mut totals: HashMap<Date, Decimal> = HashMap::new();
    for (date, amount) in rows {
        let month = date.replace_day(1).unwrap();
        *totals.entry(month).or_insert(Decimal::ZERO) += amount;
    }

    let mut months: Vec<MonthlyTotal> = totals
        .into_iter()
        .map(|(month, total)| MonthlyTotal { month, total })
        .collect();
    months.sort_by_key(|monthly| monthly.month);

    Ok(months)
}

/// Sum the owner's active entries of `kind` per category label, largest
/// total first. Entries without a category are grouped under
/// [UNCATEGORIZED_LABEL].
///
/// # Errors
/// This function will return an [Error::SqlError] if there is an SQL error.
pub fn category_totals(
    owner: OwnerId,
    kind: EntryKind,
    connection: &Connection,
) -> Result<Vec<CategoryTotal>, Error> {
    let rows: Vec<(Option<String>, Decimal)> = connection
        .prepare(
            "SELECT category.name, entry.amount FROM entry
             LEFT JOIN category ON category.id = entry.category_id
             WHERE entry.owner_id = ?1 AND entry.kind = ?2 AND entry.is_active = 1",
        )?
        .query_map(
            rusqlite::params![owner.as_i64(), kind.as_str()],
            |row| {
                let label: Option<String> = row.get(0)?;
                let amount = money::decimal_from_row(row, 1)?;
                Ok((label, amount))
            },
        )?
        .collect::<Result<_, _>>()?;

    let mut totals: HashMap<String, Decimal> = HashMap::new();
    for (label, amount) in rows {
        let label = label.unwrap_or_else(|| UNCATEGORIZED_LABEL.to_owned());
        *totals.entry(label).or_insert(Decimal::ZERO) += amount;
    }

    let mut categories: Vec<CategoryTotal> = totals
        .into_iter()
        .map(|(label, total)| CategoryTotal { label, total })
        .collect();
    categories.sort_by(|left, right| right.total.cmp(&left.total).then(left.label.cmp(&right.label)));

    Ok(categories)
}

/// The total balance across the owner's active accounts.
///
/// # Errors
/// This function will return an [Error::SqlError] if there is an SQL error.
pub fn net_worth(owner: OwnerId, connection: &Connection) -> Result<Decimal, Error> {
    let balances: Vec<Decimal> = connection
        .prepare("SELECT balance FROM account WHERE owner_id = :owner_id AND is_active = 1")?
        .query_map(&[(":owner_id", &owner.as_i64())], |row| {
            money::decimal_from_row(row, 0)
        })?
        .collect::<Result<_, _>>()?;

    Ok(balances.into_iter().sum())
}

/// The owner's outstanding debt totals, split by direction.
///
/// # Errors
/// This function will return an [Error::SqlError] if there is an SQL error.
pub fn debt_summary(owner: OwnerId, connection: &Connection) -> Result<DebtSummary, Error> {
    let rows: Vec<(DebtDirection, Decimal)> = connection
        .prepare(
            "SELECT direction, remaining_amount FROM debt
             WHERE owner_id = :owner_id AND is_settled = 0",
        )?
        .query_map(&[(":owner_id", &owner.as_i64())], |row| {
            let raw: String = row.get(0)?;
            let direction = match raw.as_str() {
                "payable" => DebtDirection::Payable,
                "receivable" => DebtDirection::Receivable,
                _ => {
                    return Err(rusqlite::Error::FromSqlConversionFailure(
                        0,
                        rusqlite::types::Type::Text,
                        format!("unknown debt direction \"{raw}\"").into(),
                    ));
                }
            };
            let remaining = money::decimal_from_row(row, 1)?;
            Ok((direction, remaining))
        })?
        .collect::<Result<_, _>>()?;

    let mut summary = DebtSummary {
        payable_outstanding: Decimal::ZERO,
        receivable_outstanding: Decimal::ZERO,
    };

    for (direction, remaining) in rows {
        match direction {
            DebtDirection::Payable => summary.payable_outstanding += remaining,
            DebtDirection::Receivable => summary.receivable_outstanding += remaining,
        }
    }

    Ok(summary)
}
