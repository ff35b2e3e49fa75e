//! Helpers for exact-decimal money values and their SQLite representation.
//!
//! Balances and amounts are stored as TEXT and parsed back into
//! [rust_decimal::Decimal] so that arithmetic and comparisons are exact.
//! Binary floating point must never touch a monetary value.

use rust_decimal::{Decimal, RoundingStrategy};
use rusqlite::types::Type;

use crate::Error;

/// Normalize a monetary value to two fraction digits.
///
/// Midpoints round away from zero, so 0.005 becomes 0.01.
pub fn normalize(amount: Decimal) -> Decimal {
    amount.round_dp_with_strategy(2, RoundingStrategy::MidpointAwayFromZero)
}

/// Validate that `amount` is positive and normalize it to two fraction
/// digits.
///
/// # Errors
/// Returns [Error::InvalidAmount] when `amount` is zero or negative.
pub(crate) fn require_positive(amount: Decimal) -> Result<Decimal, Error> {
    if amount <= Decimal::ZERO {
        return Err(Error::InvalidAmount(amount));
    }

    Ok(normalize(amount))
}

/// Read a decimal column that was stored as TEXT.
///
/// # Errors
/// Returns a conversion error when the column text is not a valid decimal.
pub(crate) fn decimal_from_row(row: &rusqlite::Row, index: usize) -> Result<Decimal, rusqlite::Error> {
    let text: String = row.get(index)?;

    text.parse().map_err(|error: rust_decimal::Error| {
        rusqlite::Error::FromSqlConversionFailure(index, Type::Text, Box::new(error))
    })
}

#[cfg(test)]
mod money_tests {
    use rust_decimal_macros::dec;

    use crate::Error;

    use super::{normalize, require_positive};

    #[test]
    fn normalize_rounds_to_two_places() {
        assert_eq!(dec!(10.01), normalize(dec!(10.005)));
        assert_eq!(dec!(10.00), normalize(dec!(10.0049)));
    }

    #[test]
    fn require_positive_accepts_positive_amounts() {
        assert_eq!(Ok(dec!(42.50)), require_positive(dec!(42.50)));
    }

    #[test]
    fn require_positive_rejects_zero() {
        assert_eq!(
            Err(Error::InvalidAmount(dec!(0))),
            require_positive(dec!(0))
        );
    }

    #[test]
    fn require_positive_rejects_negative_amounts() {
        assert_eq!(
            Err(Error::InvalidAmount(dec!(-1.23))),
            require_positive(dec!(-1.23))
        );
    }
}
