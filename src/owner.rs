//! The owner identity type and the ownership guard.
//!
//! The ledger core does not manage users itself: the surrounding
//! application authenticates a user and passes their [OwnerId] into every
//! mutating call. The guard in this module is the single place where
//! ownership is enforced, and every engine entry point must call it before
//! mutating any state.

use std::fmt::Display;

use serde::{Deserialize, Serialize};

use crate::Error;

/// The identity that holds exclusive rights over accounts, contacts,
/// categories, and debts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct OwnerId(i64);

impl OwnerId {
    /// Create an owner ID from its integer form.
    pub fn new(id: i64) -> Self {
        Self(id)
    }

    /// The integer form of the owner ID.
    pub fn as_i64(&self) -> i64 {
        self.0
    }
}

impl Display for OwnerId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        self.0.fmt(f)
    }
}

/// A record that belongs to a single owner.
pub trait Owned {
    /// The ID of the owner that holds exclusive rights over this record.
    fn owner(&self) -> OwnerId;
}

/// Check that `entity` belongs to `owner`.
///
/// This is a pure check with no side effects. Boundary layers should map
/// the returned [Error::Forbidden] to the same response as a missing
/// resource so clients cannot probe for records belonging to other owners.
///
/// # Errors
/// Returns [Error::Forbidden] when the entity's owner is not `owner`.
pub fn authorize<T: Owned>(owner: OwnerId, entity: &T) -> Result<(), Error> {
    if entity.owner() != owner {
        return Err(Error::Forbidden);
    }

    Ok(())
}
