//! Inbound payload contract consumed by the HTTP boundary.

use serde_json::Value;
use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum PayloadError {
    #[error("no transaction data provided")]
    MissingTransactions,
}

/// Extracts the `transactions` value from a request payload.
///
/// A payload that is not an object or has no `transactions` key is the sole
/// hard failure in this crate; the boundary layer translates it into a
/// client-facing error response. Whatever the key holds is handed to
/// [`crate::preprocess`], which degrades malformed shapes to an empty table.
pub fn transactions_field(payload: &Value) -> Result<&Value, PayloadError> {
    payload
        .as_object()
        .and_then(|map| map.get("transactions"))
        .ok_or(PayloadError::MissingTransactions)
}
