//! Contacts are the counterparties that debts are owed to or by.

use rusqlite::{Connection, Row};
use serde::{Deserialize, Serialize};

use crate::{
    Error,
    database_id::DatabaseId,
    owner::{Owned, OwnerId},
};

/// Alias for the integer type used for contact IDs.
pub type ContactId = DatabaseId;

/// A person or organization that the owner can hold a debt with.
///
/// Contacts hold no balance of their own, they are purely referential.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Contact {
    /// The ID of the contact.
    pub id: ContactId,
    /// The owner that holds exclusive rights over the contact.
    pub owner_id: OwnerId,
    /// The contact's name.
    pub name: String,
    /// The contact's phone number, may be empty.
    pub phone: String,
}

impl Owned for Contact {
    fn owner(&self) -> OwnerId {
        self.owner_id
    }
}

/// The data needed to create a new [Contact].
#[derive(Debug, Clone, PartialEq)]
pub struct NewContact {
    /// The contact's name.
    pub name: String,
    /// The contact's phone number, may be empty.
    pub phone: String,
}

pub(crate) fn create_contact_table(connection: &Connection) -> Result<(), rusqlite::Error> {
    connection.execute(
        "CREATE TABLE IF NOT EXISTS contact (
            id INTEGER PRIMARY KEY,
            owner_id INTEGER NOT NULL,
            name TEXT NOT NULL,
            phone TEXT NOT NULL DEFAULT ''
        )",
        (),
    )?;

    Ok(())
}

pub(crate) fn map_contact_row(row: &Row) -> Result<Contact, rusqlite::Error> {
    Ok(Contact {
        id: row.get(0)?,
        owner_id: OwnerId::new(row.get(1)?),
        name: row.get(2)?,
        phone: row.get(3)?,
    })
}

/// Create a new contact for `owner`.
///
/// # Errors
/// This function will return an [Error::SqlError] if there is an SQL error.
pub fn create_contact(
    owner: OwnerId,
    new_contact: &NewContact,
    connection: &Connection,
) -> Result<Contact, Error> {
    let contact = connection
        .prepare(
            "INSERT INTO contact (owner_id, name, phone)
             VALUES (?1, ?2, ?3)
             RETURNING id, owner_id, name, phone",
        )?
        .query_row(
            (owner.as_i64(), &new_contact.name, &new_contact.phone),
            map_contact_row,
        )?;

    Ok(contact)
}

/// Retrieve a contact by its `id`.
///
/// # Errors
/// This function will return a:
/// - [Error::NotFound] if `id` does not refer to a valid contact,
/// - or [Error::SqlError] if there is some other SQL error.
pub fn get_contact(id: ContactId, connection: &Connection) -> Result<Contact, Error> {
    let contact = connection
        .prepare("SELECT id, owner_id, name, phone FROM contact WHERE id = :id")?
        .query_row(&[(":id", &id)], map_contact_row)?;

    Ok(contact)
}

/// Retrieve all contacts belonging to `owner`.
///
/// # Errors
/// This function will return an [Error::SqlError] if there is an SQL error.
pub fn get_contacts(owner: OwnerId, connection: &Connection) -> Result<Vec<Contact>, Error> {
    connection
        .prepare("SELECT id, owner_id, name, phone FROM contact WHERE owner_id = :owner_id ORDER BY name")?
        .query_map(&[(":owner_id", &owner.as_i64())], map_contact_row)?
        .map(|maybe_contact| maybe_contact.map_err(Error::from))
        .collect()
}

#[cfg(test)]
mod contact_tests {
    use rusqlite::Connection;

    use crate::{Error, db::initialize, owner::OwnerId};

    use super::{NewContact, create_contact, get_contact, get_contacts};

    fn init_db() -> Connection {
        let connection = Connection::open_in_memory().unwrap();
        initialize(&connection).unwrap();
        connection
    }

    #[test]
    fn create_and_get_contact() {
        let connection = init_db();

        let created = create_contact(
            OwnerId::new(1),
            &NewContact {
                name: "Asha".to_owned(),
                phone: "9800000000".to_owned(),
            },
            &connection,
        )
        .unwrap();

        assert_eq!(created, get_contact(created.id, &connection).unwrap());
    }

    #[test]
    fn get_contact_fails_on_invalid_id() {
        let connection = init_db();

        assert_eq!(get_contact(1337, &connection), Err(Error::NotFound));
    }

    #[test]
    fn get_contacts_is_scoped_to_owner() {
        let connection = init_db();
        let owner = OwnerId::new(1);
        let mine = create_contact(
            owner,
            &NewContact {
                name: "Asha".to_owned(),
                phone: String::new(),
            },
            &connection,
        )
        .unwrap();
        create_contact(
            OwnerId::new(2),
            &NewContact {
                name: "Bibek".to_owned(),
                phone: String::new(),
            },
            &connection,
        )
        .unwrap();

        assert_eq!(vec![mine], get_contacts(owner, &connection).unwrap());
    }
}
