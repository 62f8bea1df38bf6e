//! Price-string parsing and running min/max arithmetic.
//!
//! Scrapers hand back prices as strings. Everything past that boundary works
//! in [`Decimal`] so that repeated min/max comparisons never drift the way
//! binary floats do.

use std::str::FromStr;

use rust_decimal::Decimal;
use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum PriceParseError {
    #[error("price string is empty")]
    Empty,

    #[error("\"{raw}\" is not a decimal number")]
    Invalid { raw: String },

    #[error("price {raw} is negative")]
    Negative { raw: String },
}

/// Parses a scraper-returned price string into a non-negative decimal.
///
/// Surrounding whitespace is ignored. Thousands separators and currency
/// symbols are NOT stripped here; scrapers are expected to normalize them.
///
/// # Errors
///
/// Returns [`PriceParseError`] when the string is empty, not a decimal, or
/// negative.
pub fn parse_price(raw: &str) -> Result<Decimal, PriceParseError> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return Err(PriceParseError::Empty);
    }

    let value = Decimal::from_str(trimmed)
        .or_else(|_| Decimal::from_scientific(trimmed))
        .map_err(|_| PriceParseError::Invalid {
            raw: trimmed.to_string(),
        })?;

    if value.is_sign_negative() && !value.is_zero() {
        return Err(PriceParseError::Negative {
            raw: trimmed.to_string(),
        });
    }

    Ok(value.normalize())
}

/// Returns `(min, max)` after observing `current`.
///
/// A bound that is `None` or zero has seen no observation yet and collapses
/// to `current`. Otherwise the usual strict comparisons apply.
#[must_use]
pub fn next_bounds(
    min: Option<Decimal>,
    max: Option<Decimal>,
    current: Decimal,
) -> (Decimal, Decimal) {
    let min = match min {
        Some(m) if !m.is_zero() && m <= current => m,
        _ => current,
    };
    let max = match max {
        Some(m) if !m.is_zero() && m >= current => m,
        _ => current,
    };
    (min, max)
}
