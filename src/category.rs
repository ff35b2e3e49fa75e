//! Categories label entries for budgeting and reporting.
//!
//! A category is a weak reference target: deleting one must never delete
//! the entries that pointed at it. The schema enforces this with an
//! `ON DELETE SET NULL` foreign key from the entry table.

use rusqlite::{Connection, Row};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use time::OffsetDateTime;

use crate::{
    Error,
    database_id::DatabaseId,
    entry::EntryKind,
    money,
    owner::{Owned, OwnerId},
};

/// Alias for the integer type used for category IDs.
pub type CategoryId = DatabaseId;

/// A label an owner uses to group their income or expenses.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Category {
    /// The ID of the category.
    pub id: CategoryId,
    /// The owner that holds exclusive rights over the category.
    pub owner_id: OwnerId,
    /// The display name, unique per owner and kind.
    pub name: String,
    /// Whether the category labels income or expenses.
    pub kind: EntryKind,
    /// An optional icon name for display purposes.
    pub icon: Option<String>,
    /// A monthly budget for the category, zero when unbudgeted.
    pub budget_limit: Decimal,
    /// Whether the category is offered for new entries.
    pub is_active: bool,
    /// When the category was created.
    pub created_at: OffsetDateTime,
}

impl Owned for Category {
    fn owner(&self) -> OwnerId {
        self.owner_id
    }
}

/// The data needed to create a new [Category].
#[derive(Debug, Clone, PartialEq)]
pub struct NewCategory {
    /// The display name, unique per owner and kind.
    pub name: String,
    /// Whether the category labels income or expenses.
    pub kind: EntryKind,
    /// An optional icon name for display purposes.
    pub icon: Option<String>,
    /// A monthly budget for the category, zero when unbudgeted.
    pub budget_limit: Decimal,
}

pub(crate) fn create_category_table(connection: &Connection) -> Result<(), rusqlite::Error> {
    connection.execute(
        "CREATE TABLE IF NOT EXISTS category (
            id INTEGER PRIMARY KEY,
            owner_id INTEGER NOT NULL,
            name TEXT NOT NULL,
            kind TEXT NOT NULL,
            icon TEXT,
            budget_limit TEXT NOT NULL DEFAULT '0',
            is_active INTEGER NOT NULL DEFAULT 1,
            created_at TEXT NOT NULL,
            UNIQUE(owner_id, name, kind)
        )",
        (),
    )?;

    Ok(())
}

pub(crate) fn map_category_row(row: &Row) -> Result<Category, rusqlite::Error> {
    let id = row.get(0)?;
    let owner_id = OwnerId::new(row.get(1)?);
    let name = row.get(2)?;
    let kind = EntryKind::from_column(row, 3)?;
    let icon = row.get(4)?;
    let budget_limit = money::decimal_from_row(row, 5)?;
    let is_active = row.get(6)?;
    let created_at = row.get(7)?;

    Ok(Category {
        id,
        owner_id,
        name,
        kind,
        icon,
        budget_limit,
        is_active,
        created_at,
    })
}

const CATEGORY_COLUMNS: &str =
    "id, owner_id, name, kind, icon, budget_limit, is_active, created_at";

/// Create a new category for `owner`.
///
/// # Errors
/// This function will return a:
/// - [Error::InvalidAmount] if the budget limit is negative,
/// - or [Error::SqlError] if there is some other SQL error.
pub fn create_category(
    owner: OwnerId,
    new_category: &NewCategory,
    connection: &Connection,
) -> Result<Category, Error> {
    let budget_limit = money::normalize(new_category.budget_limit);

    if budget_limit < Decimal::ZERO {
        return Err(Error::InvalidAmount(budget_limit));
    }

    let category = connection
        .prepare(&format!(
            "INSERT INTO category (owner_id, name, kind, icon, budget_limit, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)
             RETURNING {CATEGORY_COLUMNS}"
        ))?
        .query_row(
            (
                owner.as_i64(),
                &new_category.name,
                new_category.kind.as_str(),
                &new_category.icon,
                budget_limit.to_string(),
                OffsetDateTime::now_utc(),
            ),
            map_category_row,
        )?;

    Ok(category)
}

/// Retrieve a category by its `id`.
///
/// # Errors
/// This function will return a:
/// - [Error::NotFound] if `id` does not refer to a valid category,
/// - or [Error::SqlError] if there is some other SQL error.
pub fn get_category(id: CategoryId, connection: &Connection) -> Result<Category, Error> {
    let category = connection
        .prepare(&format!(
            "SELECT {CATEGORY_COLUMNS} FROM category WHERE id = :id"
        ))?
        .query_row(&[(":id", &id)], map_category_row)?;

    Ok(category)
}

/// Retrieve all categories belonging to `owner`.
///
/// # Errors
/// This function will return an [Error::SqlError] if there is an SQL error.
pub fn get_categories(owner: OwnerId, connection: &Connection) -> Result<Vec<Category>, Error> {
    connection
        .prepare(&format!(
            "SELECT {CATEGORY_COLUMNS} FROM category WHERE owner_id = :owner_id ORDER BY name"
        ))?
        .query_map(&[(":owner_id", &owner.as_i64())], map_category_row)?
        .map(|maybe_category| maybe_category.map_err(Error::from))
        .collect()
}

/// Delete a category.
///
/// Entries that referenced the category keep their rows, their category
/// reference is set to null by the schema's foreign key policy.
///
/// # Errors
/// This function will return a:
/// - [Error::NotFound] if `id` does not refer to a valid category,
/// - [Error::Forbidden] if the category belongs to a different owner,
/// - or [Error::SqlError] if there is some other SQL error.
pub fn delete_category(
    owner: OwnerId,
    id: CategoryId,
    connection: &Connection,
) -> Result<(), Error> {
    let tx = connection.unchecked_transaction()?;

    let category = get_category(id, &tx)?;
    crate::owner::authorize(owner, &category)?;

    tx.execute("DELETE FROM category WHERE id = :id", &[(":id", &id)])?;

    tx.commit()?;

    Ok(())
}

#[cfg(test)]
mod category_tests {
    use rusqlite::Connection;
    use rust_decimal_macros::dec;

    use crate::{
        Error,
        account::{AccountType, NewAccount, create_account},
        db::initialize,
        entry::{EntryKind, NewEntry, create_expense, get_entry},
        owner::OwnerId,
    };

    use super::{NewCategory, create_category, delete_category, get_categories, get_category};

    fn init_db() -> Connection {
        let connection = Connection::open_in_memory().unwrap();
        initialize(&connection).unwrap();
        connection
    }

    fn test_category(connection: &Connection, owner: OwnerId, name: &str) -> super::Category {
        create_category(
            owner,
            &NewCategory {
                name: name.to_owned(),
                kind: EntryKind::Expense,
                icon: None,
                budget_limit: dec!(0),
            },
            connection,
        )
        .unwrap()
    }

    #[test]
    fn create_and_get_category() {
        let connection = init_db();

        let created = test_category(&connection, OwnerId::new(1), "Food");

        assert_eq!(created, get_category(created.id, &connection).unwrap());
    }

    #[test]
    fn create_category_rejects_negative_budget() {
        let connection = init_db();

        let result = create_category(
            OwnerId::new(1),
            &NewCategory {
                name: "Food".to_owned(),
                kind: EntryKind::Expense,
                icon: None,
                budget_limit: dec!(-5),
            },
            &connection,
        );

        assert_eq!(result, Err(Error::InvalidAmount(dec!(-5))));
    }

    #[test]
    fn get_categories_is_scoped_to_owner() {
        let connection = init_db();
        let owner = OwnerId::new(1);
        let mine = test_category(&connection, owner, "Food");
        test_category(&connection, OwnerId::new(2), "Rent");

        assert_eq!(vec![mine], get_categories(owner, &connection).unwrap());
    }

    #[test]
    fn delete_category_rejects_other_owner() {
        let connection = init_db();
        let category = test_category(&connection, OwnerId::new(1), "Food");

        let result = delete_category(OwnerId::new(2), category.id, &connection);

        assert_eq!(result, Err(Error::Forbidden));
        assert!(get_category(category.id, &connection).is_ok());
    }

    #[test]
    fn delete_category_nulls_entry_references() {
        let connection = init_db();
        let owner = OwnerId::new(1);
        let category = test_category(&connection, owner, "Food");
        let account = create_account(
            owner,
            &NewAccount {
                name: "Everyday".to_owned(),
                account_type: AccountType::Checking,
                opening_balance: dec!(100.00),
                currency: "NPR".to_owned(),
            },
            &connection,
        )
        .unwrap();
        let entry = create_expense(
            owner,
            &NewEntry::new(account.id, "Momo", dec!(20.00), time::macros::date!(2026 - 01 - 15))
                .category(category.id),
            &connection,
        )
        .unwrap();

        delete_category(owner, category.id, &connection).unwrap();

        let entry = get_entry(entry.id, &connection).unwrap();
        assert_eq!(entry.category_id, None);
        assert_eq!(get_category(category.id, &connection), Err(Error::NotFound));
    }
}
