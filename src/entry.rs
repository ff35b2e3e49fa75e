//! The ledger entry engine: income and expense records.
//!
//! Creating an entry is the only time its full amount is applied to the
//! account balance. Later edits apply only the difference between the old
//! and new amounts, and deactivation applies the inverse of the original
//! mutation. Each of these runs as one SQL transaction: if any step fails,
//! no record is written and no balance moves.

use rusqlite::{Connection, Row};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use time::{Date, OffsetDateTime};

use crate::{
    Error,
    account::{self, AccountId},
    category::{self, CategoryId},
    database_id::DatabaseId,
    money,
    owner::{self, Owned, OwnerId},
};

/// Alias for the integer type used for entry IDs.
pub type EntryId = DatabaseId;

// ============================================================================
// MODELS
// ============================================================================

/// Whether a ledger entry records money earned or money spent.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EntryKind {
    /// Money coming in, deposited at creation.
    Income,
    /// Money going out, withdrawn at creation.
    Expense,
}

impl EntryKind {
    /// The text stored in the database for this kind.
    pub fn as_str(&self) -> &'static str {
        match self {
            EntryKind::Income => "income",
            EntryKind::Expense => "expense",
        }
    }

    pub(crate) fn from_column(row: &Row, index: usize) -> Result<Self, rusqlite::Error> {
        let raw: String = row.get(index)?;

        match raw.as_str() {
            "income" => Ok(EntryKind::Income),
            "expense" => Ok(EntryKind::Expense),
            _ => Err(rusqlite::Error::FromSqlConversionFailure(
                index,
                rusqlite::types::Type::Text,
                format!("unknown entry kind \"{raw}\"").into(),
            )),
        }
    }
}

/// How often a recurring entry repeats.
///
/// Descriptive metadata only: the core does not spawn repeat entries, a
/// scheduler outside the core reads this to decide when to call
/// [create_income]/[create_expense] again.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RecurringInterval {
    /// Not recurring.
    #[default]
    None,
    /// Repeats every day.
    Daily,
    /// Repeats every week.
    Weekly,
    /// Repeats every month.
    Monthly,
    /// Repeats every year.
    Yearly,
}

impl RecurringInterval {
    /// The text stored in the database for this interval.
    pub fn as_str(&self) -> &'static str {
        match self {
            RecurringInterval::None => "none",
            RecurringInterval::Daily => "daily",
            RecurringInterval::Weekly => "weekly",
            RecurringInterval::Monthly => "monthly",
            RecurringInterval::Yearly => "yearly",
        }
    }

    fn from_column(row: &Row, index: usize) -> Result<Self, rusqlite::Error> {
        let raw: String = row.get(index)?;

        match raw.as_str() {
            "none" => Ok(RecurringInterval::None),
            "daily" => Ok(RecurringInterval::Daily),
            "weekly" => Ok(RecurringInterval::Weekly),
            "monthly" => Ok(RecurringInterval::Monthly),
            "yearly" => Ok(RecurringInterval::Yearly),
            _ => Err(rusqlite::Error::FromSqlConversionFailure(
                index,
                rusqlite::types::Type::Text,
                format!("unknown recurring interval \"{raw}\"").into(),
            )),
        }
    }
}

/// An income or expense, i.e. an event where money was earned or spent.
///
/// The amount is always stored positive; the sign of its balance effect is
/// implied by [Entry::kind].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Entry {
    /// The ID of the entry.
    pub id: EntryId,
    /// The owner that holds exclusive rights over the entry.
    pub owner_id: OwnerId,
    /// The account the entry's balance effect is attributed to.
    pub account_id: AccountId,
    /// The category labelling the entry, if any.
    pub category_id: Option<CategoryId>,
    /// Whether the entry records income or an expense.
    pub kind: EntryKind,
    /// A short human readable title, e.g. "Salary" or "Groceries".
    pub title: String,
    /// The amount of money earned or spent, always positive.
    pub amount: Decimal,
    /// When the money moved.
    pub date: Date,
    /// Whether the entry repeats.
    pub is_recurring: bool,
    /// How often the entry repeats.
    pub recurring_interval: RecurringInterval,
    /// Free text comma separated tags.
    pub tags: Option<String>,
    /// Free text notes.
    pub notes: Option<String>,
    /// False once the entry has been deactivated and refunded.
    pub is_active: bool,
    /// When the entry row was created.
    pub created_at: OffsetDateTime,
}

impl Owned for Entry {
    fn owner(&self) -> OwnerId {
        self.owner_id
    }
}

/// The data needed to create a new [Entry].
///
/// # Examples
/// ```ignore
/// use rust_decimal_macros::dec;
/// use time::macros::date;
///
/// let new_entry = NewEntry::new(account_id, "Groceries", dec!(42.50), date!(2026 - 01 - 15))
///     .category(food_category_id)
///     .tags("weekly,market")
///     .notes("Saturday market run");
/// ```
#[derive(Debug, Clone, PartialEq)]
pub struct NewEntry {
    /// The account the entry's balance effect is attributed to.
    pub account_id: AccountId,
    /// The category labelling the entry, if any.
    pub category_id: Option<CategoryId>,
    /// A short human readable title.
    pub title: String,
    /// The amount of money earned or spent, must be positive.
    pub amount: Decimal,
    /// When the money moved.
    pub date: Date,
    /// How often the entry repeats, [RecurringInterval::None] by default.
    pub recurring_interval: RecurringInterval,
    /// Free text comma separated tags.
    pub tags: Option<String>,
    /// Free text notes.
    pub notes: Option<String>,
}

impl NewEntry {
    /// Create the input for a new entry with the required fields.
    pub fn new(account_id: AccountId, title: &str, amount: Decimal, date: Date) -> Self {
        Self {
            account_id,
            category_id: None,
            title: title.to_owned(),
            amount,
            date,
            recurring_interval: RecurringInterval::None,
            tags: None,
            notes: None,
        }
    }

    /// Label the entry with a category.
    pub fn category(mut self, category_id: CategoryId) -> Self {
        self.category_id = Some(category_id);
        self
    }

    /// Mark the entry as repeating at `interval`.
    pub fn recurring(mut self, interval: RecurringInterval) -> Self {
        self.recurring_interval = interval;
        self
    }

    /// Attach comma separated tags.
    pub fn tags(mut self, tags: &str) -> Self {
        self.tags = Some(tags.to_owned());
        self
    }

    /// Attach free text notes.
    pub fn notes(mut self, notes: &str) -> Self {
        self.notes = Some(notes.to_owned());
        self
    }
}

// ============================================================================
// DATABASE FUNCTIONS
// ============================================================================

pub(crate) fn create_entry_table(connection: &Connection) -> Result<(), rusqlite::Error> {
    connection.execute(
        "CREATE TABLE IF NOT EXISTS entry (
            id INTEGER PRIMARY KEY,
            owner_id INTEGER NOT NULL,
            account_id INTEGER NOT NULL,
            category_id INTEGER,
            kind TEXT NOT NULL,
            title TEXT NOT NULL,
            amount TEXT NOT NULL,
            date TEXT NOT NULL,
            is_recurring INTEGER NOT NULL DEFAULT 0,
            recurring_interval TEXT NOT NULL DEFAULT 'none',
            tags TEXT,
            notes TEXT,
            is_active INTEGER NOT NULL DEFAULT 1,
            created_at TEXT NOT NULL,
            FOREIGN KEY(account_id) REFERENCES account(id) ON UPDATE CASCADE ON DELETE CASCADE,
            FOREIGN KEY(category_id) REFERENCES category(id) ON UPDATE CASCADE ON DELETE SET NULL
        )",
        (),
    )?;

    Ok(())
}

pub(crate) fn map_entry_row(row: &Row) -> Result<Entry, rusqlite::Error> {
    Ok(Entry {
        id: row.get(0)?,
        owner_id: OwnerId::new(row.get(1)?),
        account_id: row.get(2)?,
        category_id: row.get(3)?,
        kind: EntryKind::from_column(row, 4)?,
        title: row.get(5)?,
        amount: money::decimal_from_row(row, 6)?,
        date: row.get(7)?,
        is_recurring: row.get(8)?,
        recurring_interval: RecurringInterval::from_column(row, 9)?,
        tags: row.get(10)?,
        notes: row.get(11)?,
        is_active: row.get(12)?,
        created_at: row.get(13)?,
    })
}

const ENTRY_COLUMNS: &str = "id, owner_id, account_id, category_id, kind, title, amount, date, \
     is_recurring, recurring_interval, tags, notes, is_active, created_at";

/// Record income for `owner` and deposit its amount into the account, as
/// one atomic unit.
///
/// # Errors
/// This function will return a:
/// - [Error::InvalidAmount] if the amount is zero or negative,
/// - [Error::NotFound] if the account or category does not exist,
/// - [Error::Forbidden] if the account or category belongs to a different
///   owner,
/// - or [Error::SqlError] if there is some other SQL error.
pub fn create_income(
    owner: OwnerId,
    new_entry: &NewEntry,
    connection: &Connection,
) -> Result<Entry, Error> {
    create_entry(owner, EntryKind::Income, new_entry, connection)
}

/// Record an expense for `owner` and withdraw its amount from the account,
/// as one atomic unit.
///
/// # Errors
/// This function will return a:
/// - [Error::InvalidAmount] if the amount is zero or negative,
/// - [Error::InsufficientFunds] if the account balance is less than the
///   amount, in which case no entry row is written,
/// - [Error::NotFound] if the account or category does not exist,
/// - [Error::Forbidden] if the account or category belongs to a different
///   owner,
/// - or [Error::SqlError] if there is some other SQL error.
pub fn create_expense(
    owner: OwnerId,
    new_entry: &NewEntry,
    connection: &Connection,
) -> Result<Entry, Error> {
    create_entry(owner, EntryKind::Expense, new_entry, connection)
}

fn create_entry(
    owner: OwnerId,
    kind: EntryKind,
    new_entry: &NewEntry,
    connection: &Connection,
) -> Result<Entry, Error> {
    let amount = money::require_positive(new_entry.amount)?;

    let tx = connection.unchecked_transaction()?;

    let account = account::get_account(new_entry.account_id, &tx)?;
    owner::authorize(owner, &account)?;

    if let Some(category_id) = new_entry.category_id {
        let category = category::get_category(category_id, &tx)?;
        owner::authorize(owner, &category)?;
    }

    // The balance mutation happens exactly once, here at creation.
    match kind {
        EntryKind::Income => account::deposit(account.id, amount, &tx)?,
        EntryKind::Expense => account::withdraw(account.id, amount, &tx)?,
    };

    let entry = tx
        .prepare(&format!(
            "INSERT INTO entry (owner_id, account_id, category_id, kind, title, amount, date, \
             is_recurring, recurring_interval, tags, notes, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12)
             RETURNING {ENTRY_COLUMNS}"
        ))?
        .query_row(
            (
                owner.as_i64(),
                new_entry.account_id,
                new_entry.category_id,
                kind.as_str(),
                &new_entry.title,
                amount.to_string(),
                new_entry.date,
                new_entry.recurring_interval != RecurringInterval::None,
                new_entry.recurring_interval.as_str(),
                &new_entry.tags,
                &new_entry.notes,
                OffsetDateTime::now_utc(),
            ),
            map_entry_row,
        )?;

    tx.commit()?;

    Ok(entry)
}

/// Retrieve an entry by its `id`.
///
/// # Errors
/// This function will return a:
/// - [Error::NotFound] if `id` does not refer to a valid entry,
/// - or [Error::SqlError] if there is some other SQL error.
pub fn get_entry(id: EntryId, connection: &Connection) -> Result<Entry, Error> {
    let entry = connection
        .prepare(&format!("SELECT {ENTRY_COLUMNS} FROM entry WHERE id = :id"))?
        .query_row(&[(":id", &id)], map_entry_row)?;

    Ok(entry)
}

/// Retrieve all entries belonging to `owner`, newest first.
///
/// # Errors
/// This function will return an [Error::SqlError] if there is an SQL error.
pub fn get_entries(owner: OwnerId, connection: &Connection) -> Result<Vec<Entry>, Error> {
    connection
        .prepare(&format!(
            "SELECT {ENTRY_COLUMNS} FROM entry WHERE owner_id = :owner_id ORDER BY date DESC, id DESC"
        ))?
        .query_map(&[(":owner_id", &owner.as_i64())], map_entry_row)?
        .map(|maybe_entry| maybe_entry.map_err(Error::from))
        .collect()
}

/// Change an entry's amount, applying only the difference to the account.
///
/// For an expense, growing the amount withdraws the difference and
/// shrinking it deposits the difference back; income is the mirror image.
/// The full new amount is never re-applied.
///
/// # Errors
/// This function will return a:
/// - [Error::InvalidAmount] if the new amount is zero or negative,
/// - [Error::NotFound] if `id` does not refer to an active entry,
/// - [Error::Forbidden] if the entry belongs to a different owner,
/// - [Error::InsufficientFunds] if the delta would overdraw the account,
///   in which case the entry and the balance are unchanged,
/// - or [Error::SqlError] if there is some other SQL error.
pub fn edit_entry_amount(
    owner: OwnerId,
    id: EntryId,
    new_amount: Decimal,
    connection: &Connection,
) -> Result<Entry, Error> {
    let new_amount = money::require_positive(new_amount)?;

    let tx = connection.unchecked_transaction()?;

    let entry = get_entry(id, &tx)?;
    owner::authorize(owner, &entry)?;

    if !entry.is_active {
        // Deactivated entries are history; their amounts are frozen.
        return Err(Error::NotFound);
    }

    let delta = new_amount - entry.amount;

    if delta != Decimal::ZERO {
        match entry.kind {
            EntryKind::Expense if delta > Decimal::ZERO => {
                account::withdraw(entry.account_id, delta, &tx)?
            }
            EntryKind::Expense => account::deposit(entry.account_id, -delta, &tx)?,
            EntryKind::Income if delta > Decimal::ZERO => {
                account::deposit(entry.account_id, delta, &tx)?
            }
            EntryKind::Income => account::withdraw(entry.account_id, -delta, &tx)?,
        };
    }

    let entry = tx
        .prepare(&format!(
            "UPDATE entry SET amount = ?1 WHERE id = ?2 RETURNING {ENTRY_COLUMNS}"
        ))?
        .query_row((new_amount.to_string(), id), map_entry_row)?;

    tx.commit()?;

    Ok(entry)
}

/// Deactivate an entry and reverse its original balance mutation in full.
///
/// The row is kept for history; only the active flag changes. Reversing an
/// income withdraws its amount, which fails with
/// [Error::InsufficientFunds] when the money has already been spent.
///
/// # Errors
/// This function will return a:
/// - [Error::NotFound] if `id` does not refer to an active entry,
/// - [Error::Forbidden] if the entry belongs to a different owner,
/// - [Error::InsufficientFunds] if reversing an income would overdraw the
///   account, in which case nothing changes,
/// - or [Error::SqlError] if there is some other SQL error.
pub fn deactivate_entry(
    owner: OwnerId,
    id: EntryId,
    connection: &Connection,
) -> Result<Entry, Error> {
    let tx = connection.unchecked_transaction()?;

    let entry = get_entry(id, &tx)?;
    owner::authorize(owner, &entry)?;

    if !entry.is_active {
        return Err(Error::NotFound);
    }

    match entry.kind {
        EntryKind::Income => account::withdraw(entry.account_id, entry.amount, &tx)?,
        EntryKind::Expense => account::deposit(entry.account_id, entry.amount, &tx)?,
    };

    let entry = tx
        .prepare(&format!(
            "UPDATE entry SET is_active = 0 WHERE id = ?1 RETURNING {ENTRY_COLUMNS}"
        ))?
        .query_row([id], map_entry_row)?;

    tx.commit()?;

    Ok(entry)
}


#[cfg(test)]
mod edit_entry_amount_tests {
    use rusqlite::Connection;
    use rust_decimal_macros::dec;
    use time::macros::date;

    use crate::{
        Error,
        account::{Account, AccountType, NewAccount, create_account, get_account},
        db::initialize,
        owner::OwnerId,
    };

    use super::{
        Entry, NewEntry, create_expense, create_income, deactivate_entry, edit_entry_amount,
        get_entry,
    };

    fn init_db() -> Connection {
        let connection = Connection::open_in_memory().unwrap();
        initialize(&connection).unwrap();
        connection
    }

    fn account_with_expense(connection: &Connection, owner: OwnerId) -> (Account, Entry) {
        let account = create_account(
            owner,
            &NewAccount {
                name: "Everyday".to_owned(),
                account_type: AccountType::Checking,
                opening_balance: dec!(500.00),
                currency: "NPR".to_owned(),
            },
            connection,
        )
        .unwrap();
        let entry = create_expense(
            owner,
            &NewEntry::new(account.id, "Groceries", dec!(100.00), date!(2026 - 01 - 15)),
            connection,
        )
        .unwrap();

        (account, entry)
    }

    #[test]
    fn edit_applies_only_the_delta() {
        let connection = init_db();
        let owner = OwnerId::new(1);
        let (account, entry) = account_with_expense(&connection, owner);
        // Balance is 400 after the 100 expense.

        let entry = edit_entry_amount(owner, entry.id, dec!(150.00), &connection).unwrap();
        assert_eq!(entry.amount, dec!(150.00));
        assert_eq!(
            get_account(account.id, &connection).unwrap().balance,
            dec!(350.00)
        );

        let entry = edit_entry_amount(owner, entry.id, dec!(100.00), &connection).unwrap();
        assert_eq!(entry.amount, dec!(100.00));
        assert_eq!(
            get_account(account.id, &connection).unwrap().balance,
            dec!(400.00)
        );
    }

    #[test]
    fn edit_income_is_the_mirror_image() {
        let connection = init_db();
        let owner = OwnerId::new(1);
        let account = create_account(
            owner,
            &NewAccount {
                name: "Everyday".to_owned(),
                account_type: AccountType::Checking,
                opening_balance: dec!(0),
                currency: "NPR".to_owned(),
            },
            &connection,
        )
        .unwrap();
        let entry = create_income(
            owner,
            &NewEntry::new(account.id, "Salary", dec!(1000.00), date!(2026 - 01 - 31)),
            &connection,
        )
        .unwrap();

        edit_entry_amount(owner, entry.id, dec!(1100.00), &connection).unwrap();
        assert_eq!(
            get_account(account.id, &connection).unwrap().balance,
            dec!(1100.00)
        );

        edit_entry_amount(owner, entry.id, dec!(900.00), &connection).unwrap();
        assert_eq!(
            get_account(account.id, &connection).unwrap().balance,
            dec!(900.00)
        );
    }

    #[test]
    fn edit_shortfall_changes_nothing() {
        let connection = init_db();
        let owner = OwnerId::new(1);
        let (account, entry) = account_with_expense(&connection, owner);

        // Growing the expense by more than the remaining 400 must fail.
        let result = edit_entry_amount(owner, entry.id, dec!(600.00), &connection);

        assert_eq!(
            result,
            Err(Error::InsufficientFunds("Everyday".to_owned()))
        );
        assert_eq!(
            get_entry(entry.id, &connection).unwrap().amount,
            dec!(100.00)
        );
        assert_eq!(
            get_account(account.id, &connection).unwrap().balance,
            dec!(400.00)
        );
    }

    #[test]
    fn edit_rejects_other_owner() {
        let connection = init_db();
        let owner = OwnerId::new(1);
        let (_, entry) = account_with_expense(&connection, owner);

        let result = edit_entry_amount(OwnerId::new(2), entry.id, dec!(1.00), &connection);

        assert_eq!(result, Err(Error::Forbidden));
    }

    #[test]
    fn edit_rejects_deactivated_entry() {
        let connection = init_db();
        let owner = OwnerId::new(1);
        let (_, entry) = account_with_expense(&connection, owner);
        deactivate_entry(owner, entry.id, &connection).unwrap();

        let result = edit_entry_amount(owner, entry.id, dec!(50.00), &connection);

        assert_eq!(result, Err(Error::NotFound));
    }
}

#[cfg(test)]
mod deactivate_entry_tests {
    use rusqlite::Connection;
    use rust_decimal_macros::dec;
    use time::macros::date;

    use crate::{
        Error,
        account::{AccountType, NewAccount, create_account, get_account},
        db::initialize,
        owner::OwnerId,
    };

    use super::{NewEntry, create_expense, create_income, deactivate_entry};

    fn init_db() -> Connection {
        let connection = Connection::open_in_memory().unwrap();
        initialize(&connection).unwrap();
        connection
    }

    #[test]
    fn deactivating_an_expense_refunds_it() {
        let connection = init_db();
        let owner = OwnerId::new(1);
        let account = create_account(
            owner,
            &NewAccount {
                name: "Everyday".to_owned(),
                account_type: AccountType::Checking,
                opening_balance: dec!(1000.00),
                currency: "NPR".to_owned(),
            },
            &connection,
        )
        .unwrap();
        let entry = create_expense(
            owner,
            &NewEntry::new(account.id, "Groceries", dec!(200.00), date!(2026 - 01 - 15)),
            &connection,
        )
        .unwrap();
        assert_eq!(
            get_account(account.id, &connection).unwrap().balance,
            dec!(800.00)
        );

        let entry = deactivate_entry(owner, entry.id, &connection).unwrap();

        assert!(!entry.is_active);
        assert_eq!(
            get_account(account.id, &connection).unwrap().balance,
            dec!(1000.00)
        );
    }

    #[test]
    fn deactivating_spent_income_fails_cleanly() {
        let connection = init_db();
        let owner = OwnerId::new(1);
        let account = create_account(
            owner,
            &NewAccount {
                name: "Everyday".to_owned(),
                account_type: AccountType::Checking,
                opening_balance: dec!(0),
                currency: "NPR".to_owned(),
            },
            &connection,
        )
        .unwrap();
        let income = create_income(
            owner,
            &NewEntry::new(account.id, "Salary", dec!(100.00), date!(2026 - 01 - 31)),
            &connection,
        )
        .unwrap();
        create_expense(
            owner,
            &NewEntry::new(account.id, "Groceries", dec!(80.00), date!(2026 - 01 - 31)),
            &connection,
        )
        .unwrap();

        // Only 20 is left, so reversing the 100 income must fail whole.
        let result = deactivate_entry(owner, income.id, &connection);

        assert_eq!(
            result,
            Err(Error::InsufficientFunds("Everyday".to_owned()))
        );
        let account = get_account(account.id, &connection).unwrap();
        assert_eq!(account.balance, dec!(20.00));
    }

    #[test]
    fn deactivating_twice_fails_without_double_refund() {
        let connection = init_db();
        let owner = OwnerId::new(1);
        let account = create_account(
            owner,
            &NewAccount {
                name: "Everyday".to_owned(),
                account_type: AccountType::Checking,
                opening_balance: dec!(1000.00),
                currency: "NPR".to_owned(),
            },
            &connection,
        )
        .unwrap();
        let entry = create_expense(
            owner,
            &NewEntry::new(account.id, "Groceries", dec!(200.00), date!(2026 - 01 - 15)),
            &connection,
        )
        .unwrap();
        deactivate_entry(owner, entry.id, &connection).unwrap();

        let result = deactivate_entry(owner, entry.id, &connection);

        assert_eq!(result, Err(Error::NotFound));
        assert_eq!(
            get_account(account.id, &connection).unwrap().balance,
            dec!(1000.00)
        );
    }
}
