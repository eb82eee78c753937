//! Money Parsing Module
//!
//! Unified conversion between wire-facing decimal strings and internal
//! `rust_decimal::Decimal` values. All amount parsing MUST go through
//! this module.
//!
//! ## Design Principles
//! 1. Explicit Error Handling: no silent truncation, no NaN leaking in
//! 2. Arbitrary precision: amounts and balances are `Decimal`, never floats
//! 3. Deterministic formatting: `format_amount` is the single way a
//!    `Decimal` becomes a store or wire string

use rust_decimal::Decimal;
use std::str::FromStr;
use thiserror::Error;

/// Amount parsing/validation errors
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum AmountError {
    #[error("amount is not a well-formed decimal: {0}")]
    Unparseable(String),

    #[error("amount must be strictly positive: {0}")]
    NotPositive(String),
}

/// Parse a wire amount into a strictly positive decimal.
///
/// NaN, infinity and exponent garbage all fail the decimal parse;
/// zero and negative values are rejected explicitly.
pub fn parse_positive(raw: &str) -> Result<Decimal, AmountError> {
    let value =
        Decimal::from_str(raw.trim()).map_err(|_| AmountError::Unparseable(raw.to_string()))?;
    if value <= Decimal::ZERO {
        return Err(AmountError::NotPositive(raw.to_string()));
    }
    Ok(value)
}

/// Parse a signed decimal (used for the persisted balance).
pub fn parse_signed(raw: &str) -> Result<Decimal, AmountError> {
    Decimal::from_str(raw.trim()).map_err(|_| AmountError::Unparseable(raw.to_string()))
}

/// Format a decimal for the store and the wire.
///
/// Trailing zeros are preserved as-is; the same `Decimal` always
/// renders to the same string.
pub fn format_amount(value: &Decimal) -> String {
    value.to_string()
}
