//! Plugin Error Types
//!
//! Defines all error kinds surfaced by the ledger state machine.
//! A rejected incoming transfer is NOT an error - it is a normal
//! protocol outcome and never appears here.

use thiserror::Error;

use crate::connection::TransportError;
use crate::store::StoreError;

/// Plugin error taxonomy
///
/// Error codes are stable and suitable for peer-facing reject reasons
/// and structured log fields.
#[derive(Error, Debug, Clone)]
pub enum PluginError {
    // === Protocol Errors ===
    #[error("duplicate transfer id: {0}")]
    DuplicateTransfer(String),

    #[error("unknown transfer id: {0}")]
    UnknownTransfer(String),

    #[error("transfer {0} carries no execution condition")]
    NotConditional(String),

    #[error("fulfillment matches neither execution nor cancellation condition of {0}")]
    InvalidFulfillment(String),

    #[error("acknowledge does not match any open outgoing transfer: {0}")]
    FalseAcknowledge(String),

    #[error("unrecognized wire message: {0}")]
    InvalidMessage(String),

    // === Validation Errors ===
    #[error("invalid amount: {0}")]
    InvalidAmount(String),

    #[error("balance would exceed upper limit: {0}")]
    OverLimit(String),

    #[error("balance would fall below lower limit: {0}")]
    UnderLimit(String),

    // === External Collaborator Errors ===
    #[error("transport failure: {0}")]
    Transport(String),

    #[error("store failure: {0}")]
    Store(String),
}

impl PluginError {
    /// Get the stable error code for events and structured logs
    pub fn code(&self) -> &'static str {
        match self {
            PluginError::DuplicateTransfer(_) => "DUPLICATE_TRANSFER",
            PluginError::UnknownTransfer(_) => "UNKNOWN_TRANSFER",
            PluginError::NotConditional(_) => "NOT_CONDITIONAL",
            PluginError::InvalidFulfillment(_) => "INVALID_FULFILLMENT",
            PluginError::FalseAcknowledge(_) => "FALSE_ACKNOWLEDGE",
            PluginError::InvalidMessage(_) => "INVALID_MESSAGE",
            PluginError::InvalidAmount(_) => "INVALID_AMOUNT",
            PluginError::OverLimit(_) => "OVER_LIMIT",
            PluginError::UnderLimit(_) => "UNDER_LIMIT",
            PluginError::Transport(_) => "TRANSPORT",
            PluginError::Store(_) => "STORE",
        }
    }
}

impl From<StoreError> for PluginError {
    fn from(e: StoreError) -> Self {
        PluginError::Store(e.to_string())
    }
}

impl From<TransportError> for PluginError {
    fn from(e: TransportError) -> Self {
        PluginError::Transport(e.to_string())
    }
}

impl From<serde_json::Error> for PluginError {
    fn from(e: serde_json::Error) -> Self {
        PluginError::InvalidMessage(e.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_codes() {
        assert_eq!(
            PluginError::DuplicateTransfer("t1".into()).code(),
            "DUPLICATE_TRANSFER"
        );
        assert_eq!(
            PluginError::FalseAcknowledge("t2".into()).code(),
            "FALSE_ACKNOWLEDGE"
        );
        assert_eq!(PluginError::OverLimit("11".into()).code(), "OVER_LIMIT");
    }

    #[test]
    fn test_display() {
        let err = PluginError::UnknownTransfer("t9".into());
        assert_eq!(err.to_string(), "unknown transfer id: t9");
    }

    #[test]
    fn test_store_error_conversion() {
        let err: PluginError = StoreError("backend down".into()).into();
        assert!(matches!(err, PluginError::Store(_)));
        assert_eq!(err.code(), "STORE");
    }
}
