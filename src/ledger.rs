//! The ledger facade: the narrow API the surrounding application calls.
//!
//! A [Ledger] wraps the shared database connection behind a mutex, the way
//! the rest of the application is expected to hold it. Every method locks
//! the connection for the duration of exactly one atomic unit, so two
//! concurrent operations on the same account can never both pass a
//! sufficient-funds check against a stale balance.
//!
//! The caller supplies the authenticated [OwnerId] with every mutating
//! call; the engines enforce ownership before touching any state.

use std::{
    path::Path,
    sync::{Arc, Mutex, MutexGuard},
};

use rusqlite::Connection;
use rust_decimal::Decimal;

use crate::{
    Error,
    account::{self, Account, AccountId, NewAccount},
    category::{self, Category, CategoryId, NewCategory},
    contact::{self, Contact, NewContact},
    db,
    debt::{self, Debt, DebtId, DebtPayment, NewDebt},
    entry::{self, Entry, EntryId, EntryKind, NewEntry},
    owner::OwnerId,
    report::{self, CategoryTotal, DebtSummary, MonthlyTotal},
    transfer::{self, Transfer},
};

/// The time to wait for a database lock held by another process before
/// giving up.
const BUSY_TIMEOUT: std::time::Duration = std::time::Duration::from_secs(5);

/// A personal finance ledger backed by a SQLite database.
#[derive(Debug, Clone)]
pub struct Ledger {
    connection: Arc<Mutex<Connection>>,
}

impl Ledger {
    /// Open (or create) the ledger database at `path`.
    ///
    /// # Errors
    /// Returns an [Error::SqlError] if the database could not be opened or
    /// its schema could not be created.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self, Error> {
        let connection = Connection::open(path.as_ref())?;
        connection.busy_timeout(BUSY_TIMEOUT)?;
        db::initialize(&connection)?;

        tracing::info!("opened ledger database at {}", path.as_ref().display());

        Ok(Self {
            connection: Arc::new(Mutex::new(connection)),
        })
    }

    /// Open an in-memory ledger, useful for tests and experiments.
    ///
    /// # Errors
    /// Returns an [Error::SqlError] if the schema could not be created.
    pub fn open_in_memory() -> Result<Self, Error> {
        let connection = Connection::open_in_memory()?;
        db::initialize(&connection)?;

        Ok(Self {
            connection: Arc::new(Mutex::new(connection)),
        })
    }

    /// Wrap an already initialized connection.
    ///
    /// The caller is responsible for having run [db::initialize] on it.
    pub fn from_connection(connection: Arc<Mutex<Connection>>) -> Self {
        Self { connection }
    }

    fn connection(&self) -> Result<MutexGuard<'_, Connection>, Error> {
        self.connection.lock().map_err(|error| {
            tracing::error!("could not acquire database lock: {error}");
            Error::DatabaseLockError
        })
    }

    // ========================================================================
    // ACCOUNTS
    // ========================================================================

    /// Create a new account. See [account::create_account].
    pub fn create_account(&self, owner: OwnerId, new_account: &NewAccount) -> Result<Account, Error> {
        account::create_account(owner, new_account, &*self.connection()?)
    }

    /// Retrieve one of the owner's accounts by ID.
    ///
    /// # Errors
    /// Returns [Error::NotFound] for a missing ID and [Error::Forbidden]
    /// for an account that belongs to someone else.
    pub fn account(&self, owner: OwnerId, id: AccountId) -> Result<Account, Error> {
        let connection = self.connection()?;
        let account = account::get_account(id, &connection)?;
        crate::owner::authorize(owner, &account)?;

        Ok(account)
    }

    /// Retrieve all of the owner's accounts. See [account::get_accounts].
    pub fn accounts(&self, owner: OwnerId) -> Result<Vec<Account>, Error> {
        account::get_accounts(owner, &*self.connection()?)
    }

    /// Soft-disable an account. See [account::deactivate_account].
    pub fn deactivate_account(&self, owner: OwnerId, id: AccountId) -> Result<Account, Error> {
        account::deactivate_account(owner, id, &*self.connection()?)
    }

    // ========================================================================
    // ENTRIES
    // ========================================================================

    /// Record income and deposit its amount. See [entry::create_income].
    pub fn create_income(&self, owner: OwnerId, new_entry: &NewEntry) -> Result<Entry, Error> {
        entry::create_income(owner, new_entry, &*self.connection()?)
    }

    /// Record an expense and withdraw its amount. See
    /// [entry::create_expense].
    pub fn create_expense(&self, owner: OwnerId, new_entry: &NewEntry) -> Result<Entry, Error> {
        entry::create_expense(owner, new_entry, &*self.connection()?)
    }

    /// Change an entry's amount, rebalancing by the difference only. See
    /// [entry::edit_entry_amount].
    pub fn edit_entry_amount(
        &self,
        owner: OwnerId,
        id: EntryId,
        new_amount: Decimal,
    ) -> Result<Entry, Error> {
        entry::edit_entry_amount(owner, id, new_amount, &*self.connection()?)
    }

    /// Deactivate an entry, reversing its balance effect. See
    /// [entry::deactivate_entry].
    pub fn deactivate_entry(&self, owner: OwnerId, id: EntryId) -> Result<Entry, Error> {
        entry::deactivate_entry(owner, id, &*self.connection()?)
    }

    /// Retrieve all of the owner's entries. See [entry::get_entries].
    pub fn entries(&self, owner: OwnerId) -> Result<Vec<Entry>, Error> {
        entry::get_entries(owner, &*self.connection()?)
    }

    // ========================================================================
    // TRANSFERS
    // ========================================================================

    /// Move money between two of the owner's accounts. See
    /// [transfer::transfer].
    pub fn transfer(
        &self,
        owner: OwnerId,
        from_account_id: AccountId,
        to_account_id: AccountId,
        amount: Decimal,
    ) -> Result<Transfer, Error> {
        transfer::transfer(
            owner,
            from_account_id,
            to_account_id,
            amount,
            &*self.connection()?,
        )
    }

    /// Retrieve all of the owner's transfers. See [transfer::get_transfers].
    pub fn transfers(&self, owner: OwnerId) -> Result<Vec<Transfer>, Error> {
        transfer::get_transfers(owner, &*self.connection()?)
    }

    // ========================================================================
    // DEBTS
    // ========================================================================

    /// Create a debt and post its initial cash movement. See
    /// [debt::create_debt].
    pub fn create_debt(&self, owner: OwnerId, new_debt: &NewDebt) -> Result<Debt, Error> {
        debt::create_debt(owner, new_debt, &*self.connection()?)
    }

    /// Record a payment against a debt. See [debt::record_payment].
    pub fn record_payment(
        &self,
        owner: OwnerId,
        debt_id: DebtId,
        account_id: AccountId,
        amount_paid: Decimal,
    ) -> Result<(Debt, DebtPayment), Error> {
        debt::record_payment(owner, debt_id, account_id, amount_paid, &*self.connection()?)
    }

    /// Retrieve all of the owner's debts. See [debt::get_debts].
    pub fn debts(&self, owner: OwnerId) -> Result<Vec<Debt>, Error> {
        debt::get_debts(owner, &*self.connection()?)
    }

    /// Retrieve the payments made against a debt. See [debt::get_payments].
    pub fn payments(&self, owner: OwnerId, debt_id: DebtId) -> Result<Vec<DebtPayment>, Error> {
        debt::get_payments(owner, debt_id, &*self.connection()?)
    }

    // ========================================================================
    // CONTACTS & CATEGORIES
    // ========================================================================

    /// Create a contact. See [contact::create_contact].
    pub fn create_contact(&self, owner: OwnerId, new_contact: &NewContact) -> Result<Contact, Error> {
        contact::create_contact(owner, new_contact, &*self.connection()?)
    }

    /// Retrieve all of the owner's contacts. See [contact::get_contacts].
    pub fn contacts(&self, owner: OwnerId) -> Result<Vec<Contact>, Error> {
        contact::get_contacts(owner, &*self.connection()?)
    }

    /// Create a category. See [category::create_category].
    pub fn create_category(
        &self,
        owner: OwnerId,
        new_category: &NewCategory,
    ) -> Result<Category, Error> {
        category::create_category(owner, new_category, &*self.connection()?)
    }

    /// Retrieve all of the owner's categories. See
    /// [category::get_categories].
    pub fn categories(&self, owner: OwnerId) -> Result<Vec<Category>, Error> {
        category::get_categories(owner, &*self.connection()?)
    }

    /// Delete a category, nulling entry references to it. See
    /// [category::delete_category].
    pub fn delete_category(&self, owner: OwnerId, id: CategoryId) -> Result<(), Error> {
        category::delete_category(owner, id, &*self.connection()?)
    }

    // ========================================================================
    // REPORTS
    // ========================================================================

    /// Monthly sums of active entries. See [report::monthly_totals].
    pub fn monthly_totals(
        &self,
        owner: OwnerId,
        kind: EntryKind,
    ) -> Result<Vec<MonthlyTotal>, Error> {
        report::monthly_totals(owner, kind, &*self.connection()?)
    }

    /// Per-category sums of active entries. See [report::category_totals].
    pub fn category_totals(
        &self,
        owner: OwnerId,
        kind: EntryKind,
    ) -> Result<Vec<CategoryTotal>, Error> {
        report::category_totals(owner, kind, &*self.connection()?)
    }

    /// The total balance across active accounts. See [report::net_worth].
    pub fn net_worth(&self, owner: OwnerId) -> Result<Decimal, Error> {
        report::net_worth(owner, &*self.connection()?)
    }

    /// Outstanding debt totals. See [report::debt_summary].
    pub fn debt_summary(&self, owner: OwnerId) -> Result<DebtSummary, Error> {
        report::debt_summary(owner, &*self.connection()?)
    }
}

#[cfg(test)]
mod scenario_tests {
    use rust_decimal::Decimal;
    use rust_decimal_macros::dec;
    use time::macros::date;

    use crate::{
        Error,
        account::{Account, AccountType, NewAccount},
        contact::NewContact,
        debt::{DebtDirection, NewDebt},
        entry::NewEntry,
        owner::OwnerId,
    };

    use super::Ledger;

    fn test_ledger() -> Ledger {
        Ledger::open_in_memory().expect("Could not initialise in-memory ledger")
    }

    fn test_account(ledger: &Ledger, owner: OwnerId, name: &str, balance: Decimal) -> Account {
        ledger
            .create_account(
                owner,
                &NewAccount {
                    name: name.to_owned(),
                    account_type: AccountType::Checking,
                    opening_balance: balance,
                    currency: "NPR".to_owned(),
                },
            )
            .unwrap()
    }

    #[test]
    fn expense_then_deactivate_restores_the_balance() {
        let ledger = test_ledger();
        let owner = OwnerId::new(1);
        let account = test_account(&ledger, owner, "Everyday", dec!(1000.00));

        let expense = ledger
            .create_expense(
                owner,
                &NewEntry::new(account.id, "Festival shopping", dec!(200.00), date!(2026 - 01 - 15)),
            )
            .unwrap();
        assert_eq!(
            ledger.account(owner, account.id).unwrap().balance,
            dec!(800.00)
        );

        ledger.deactivate_entry(owner, expense.id).unwrap();
        assert_eq!(
            ledger.account(owner, account.id).unwrap().balance,
            dec!(1000.00)
        );
    }

    #[test]
    fn failed_transfer_leaves_both_balances_alone() {
        let ledger = test_ledger();
        let owner = OwnerId::new(1);
        let account_a = test_account(&ledger, owner, "A", dec!(500.00));
        let account_b = test_account(&ledger, owner, "B", dec!(0));

        ledger
            .transfer(owner, account_a.id, account_b.id, dec!(200.00))
            .unwrap();
        assert_eq!(
            ledger.account(owner, account_a.id).unwrap().balance,
            dec!(300.00)
        );
        assert_eq!(
            ledger.account(owner, account_b.id).unwrap().balance,
            dec!(200.00)
        );

        let result = ledger.transfer(owner, account_a.id, account_b.id, dec!(400.00));
        assert_eq!(result, Err(Error::InsufficientFunds("A".to_owned())));
        assert_eq!(
            ledger.account(owner, account_a.id).unwrap().balance,
            dec!(300.00)
        );
        assert_eq!(
            ledger.account(owner, account_b.id).unwrap().balance,
            dec!(200.00)
        );
    }

    #[test]
    fn borrow_and_pay_back_a_debt_in_full() {
        let ledger = test_ledger();
        let owner = OwnerId::new(1);
        let account = test_account(&ledger, owner, "Everyday", dec!(0));
        let contact = ledger
            .create_contact(
                owner,
                &NewContact {
                    name: "Asha".to_owned(),
                    phone: String::new(),
                },
            )
            .unwrap();

        let debt = ledger
            .create_debt(
                owner,
                &NewDebt {
                    contact_id: contact.id,
                    account_id: account.id,
                    direction: DebtDirection::Payable,
                    initial_amount: dec!(1000.00),
                },
            )
            .unwrap();
        assert_eq!(debt.remaining_amount, dec!(1000.00));
        assert_eq!(
            ledger.account(owner, account.id).unwrap().balance,
            dec!(1000.00)
        );

        let (debt, _) = ledger
            .record_payment(owner, debt.id, account.id, dec!(400.00))
            .unwrap();
        assert_eq!(debt.remaining_amount, dec!(600.00));
        assert_eq!(
            ledger.account(owner, account.id).unwrap().balance,
            dec!(600.00)
        );

        let (debt, _) = ledger
            .record_payment(owner, debt.id, account.id, dec!(600.00))
            .unwrap();
        assert_eq!(debt.remaining_amount, dec!(0.00));
        assert!(debt.is_settled);
        assert_eq!(
            ledger.account(owner, account.id).unwrap().balance,
            dec!(0.00)
        );

        let result = ledger.record_payment(owner, debt.id, account.id, dec!(1.00));
        assert_eq!(result, Err(Error::OverPayment));
    }

    #[test]
    fn self_transfer_is_rejected_without_state_change() {
        let ledger = test_ledger();
        let owner = OwnerId::new(1);
        let account = test_account(&ledger, owner, "Everyday", dec!(500.00));

        let result = ledger.transfer(owner, account.id, account.id, dec!(100.00));

        assert_eq!(result, Err(Error::SameAccount));
        assert_eq!(
            ledger.account(owner, account.id).unwrap().balance,
            dec!(500.00)
        );
        assert_eq!(ledger.transfers(owner).unwrap(), vec![]);
    }

    #[test]
    fn foreign_account_reads_are_forbidden() {
        let ledger = test_ledger();
        let account = test_account(&ledger, OwnerId::new(1), "Everyday", dec!(500.00));

        let result = ledger.account(OwnerId::new(2), account.id);

        assert_eq!(result, Err(Error::Forbidden));
    }
}
