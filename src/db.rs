//! Database initialization for the ledger core.

use rusqlite::{Connection, Transaction as SqlTransaction};

use crate::{Error, account, category, contact, debt, entry, transfer};

/// Create the ledger schema on `connection`.
///
/// All tables are created inside one exclusive transaction, so a partially
/// initialized database is never observable. Foreign key enforcement is
/// switched on because the schema relies on `ON DELETE SET NULL` for
/// category references and `ON DELETE RESTRICT` for debt settling
/// accounts.
///
/// # Errors
/// Returns an [Error::SqlError] if the schema could not be created.
pub fn initialize(connection: &Connection) -> Result<(), Error> {
    connection.pragma_update(None, "foreign_keys", true)?;

    let transaction =
        SqlTransaction::new_unchecked(connection, rusqlite::TransactionBehavior::Exclusive)?;

    account::create_account_table(&transaction)?;
    category::create_category_table(&transaction)?;
    contact::create_contact_table(&transaction)?;
    entry::create_entry_table(&transaction)?;
    transfer::create_transfer_table(&transaction)?;
    debt::create_debt_table(&transaction)?;
    debt::create_debt_payment_table(&transaction)?;

    transaction.commit()?;

    Ok(())
}

#[cfg(test)]
mod initialize_tests {
    use rusqlite::Connection;

    use super::initialize;

    #[test]
    fn sql_is_valid() {
        let connection =
            Connection::open_in_memory().expect("Could not initialise in-memory SQLite database");

        assert_eq!(Ok(()), initialize(&connection));
    }

    #[test]
    fn initialize_is_idempotent() {
        let connection = Connection::open_in_memory().unwrap();

        initialize(&connection).unwrap();

        assert_eq!(Ok(()), initialize(&connection));
    }
}
