//! # Error Types
//!
//! Parse failures for the value types defined in this crate. Validation
//! failures live in [`crate::validation::ValidationErrors`] because they
//! carry a field map rather than a single cause.

use thiserror::Error;

/// Failure to parse or construct a [`crate::Money`] value.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum MoneyError {
    /// The input was empty or whitespace.
    #[error("amount must not be empty")]
    Empty,

    /// The input is not a decimal number.
    #[error("amount {0:?} is not a decimal number")]
    Invalid(String),

    /// More than two fractional digits were supplied.
    #[error("amount {0:?} has more than 2 decimal places")]
    TooPrecise(String),

    /// The amount does not fit in `NUMERIC(10, 2)`.
    #[error("amount {0:?} exceeds 8 integer digits")]
    OutOfRange(String),
}

/// Failure to decode a pagination cursor.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CursorError {
    /// The cursor is not valid base64url or not a valid payload.
    #[error("cursor is malformed")]
    Malformed,

    /// The cursor was issued for a different sort order.
    #[error("cursor was issued for a different sort order")]
    OrderMismatch,
}
