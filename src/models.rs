//! Transfer model types
//!
//! The `Transfer` value object as it travels on the wire, plus the
//! local-only bookkeeping types (`Direction`, `TransferState`,
//! `LogEntry`) that never leave this node.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::core_types::{AccountId, TransferId};

// ============================================================
// TRANSFER (wire value object)
// ============================================================

/// A unit of value movement between the two peers.
///
/// Immutable once created. `amount` stays a string at this layer;
/// validation happens in `money` so a malformed amount can be rejected
/// by the protocol instead of failing deserialization.
///
/// Canonical serialization is deterministic (lexicographically sorted
/// keys, absent fields omitted), so equality checks during acknowledge
/// validation are byte-stable.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct Transfer {
    /// Globally unique, assigned by the sending peer
    pub id: TransferId,
    /// Destination identifier (opaque)
    pub account: AccountId,
    /// Non-negative arbitrary-precision decimal, as a string
    pub amount: String,
    /// Opaque payload forwarded to the receiver
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<String>,
    /// Opaque payload surfaced back to the local caller
    #[serde(skip_serializing_if = "Option::is_none")]
    pub note_to_self: Option<String>,
    /// Cryptographic commitment gating the execute branch
    #[serde(skip_serializing_if = "Option::is_none")]
    pub execution_condition: Option<String>,
    /// Cryptographic commitment gating the cancel branch
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cancellation_condition: Option<String>,
    /// Advisory expiry timestamp; not enforced by the core
    #[serde(skip_serializing_if = "Option::is_none")]
    pub expires_at: Option<String>,
}

impl Transfer {
    pub fn new(
        id: impl Into<TransferId>,
        account: impl Into<AccountId>,
        amount: impl Into<String>,
    ) -> Self {
        Self {
            id: id.into(),
            account: account.into(),
            amount: amount.into(),
            data: None,
            note_to_self: None,
            execution_condition: None,
            cancellation_condition: None,
            expires_at: None,
        }
    }

    pub fn with_execution_condition(mut self, condition: impl Into<String>) -> Self {
        self.execution_condition = Some(condition.into());
        self
    }

    pub fn with_cancellation_condition(mut self, condition: impl Into<String>) -> Self {
        self.cancellation_condition = Some(condition.into());
        self
    }

    pub fn with_data(mut self, data: impl Into<String>) -> Self {
        self.data = Some(data.into());
        self
    }

    /// A transfer with an execution condition settles in two phases.
    #[inline]
    pub fn is_conditional(&self) -> bool {
        self.execution_condition.is_some()
    }

    /// Canonical byte-stable serialization.
    ///
    /// `serde_json::Value` maps are ordered, so re-encoding through a
    /// `Value` yields sorted keys regardless of field declaration order.
    pub fn canonical_json(&self) -> Result<String, serde_json::Error> {
        let value = serde_json::to_value(self)?;
        serde_json::to_string(&value)
    }
}

// ============================================================
// DIRECTION (local-only)
// ============================================================

/// Which side of the trustline originated a transfer.
///
/// Assigned by the local node when the transfer is first logged;
/// never transmitted on the wire.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Direction {
    Incoming,
    Outgoing,
}

impl Direction {
    pub fn as_str(&self) -> &'static str {
        match self {
            Direction::Incoming => "incoming",
            Direction::Outgoing => "outgoing",
        }
    }
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

// ============================================================
// TRANSFER STATE (local-only)
// ============================================================

/// Lifecycle state of a logged transfer.
///
/// Terminal state: `Completed` (covers accept-finalized as well as
/// reject/cancel). A completed entry never re-opens.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransferState {
    /// Logged, decision or fulfillment still pending
    Prepared,
    /// Terminal: settled, rejected or cancelled
    Completed,
}

impl TransferState {
    /// Check if this is a terminal state (no more transitions possible)
    #[inline]
    pub fn is_terminal(&self) -> bool {
        matches!(self, TransferState::Completed)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            TransferState::Prepared => "prepared",
            TransferState::Completed => "completed",
        }
    }

    /// Convert from the persisted store value
    pub fn from_str_value(value: &str) -> Option<Self> {
        match value {
            "prepared" => Some(TransferState::Prepared),
            "completed" => Some(TransferState::Completed),
            _ => None,
        }
    }
}

impl fmt::Display for TransferState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

// ============================================================
// LOG ENTRY (persisted record)
// ============================================================

/// Durable record of a transfer as first seen by this node.
///
/// Stored under `t:{id}`; the completion flag lives separately under
/// `t:{id}:state` so completing never rewrites the transfer body.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct LogEntry {
    pub direction: Direction,
    pub transfer: Transfer,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> Transfer {
        Transfer::new("t1", "peer.alice", "5")
            .with_data("memo")
            .with_execution_condition("cc:deadbeef")
    }

    #[test]
    fn test_serde_roundtrip() {
        let transfer = sample();
        let json = serde_json::to_string(&transfer).unwrap();
        let back: Transfer = serde_json::from_str(&json).unwrap();
        assert_eq!(back, transfer);
    }

    #[test]
    fn test_canonical_keys_sorted() {
        let canonical = sample().canonical_json().unwrap();
        let account = canonical.find("\"account\"").unwrap();
        let amount = canonical.find("\"amount\"").unwrap();
        let data = canonical.find("\"data\"").unwrap();
        let id = canonical.find("\"id\"").unwrap();
        assert!(account < amount && amount < data && data < id);
    }

    #[test]
    fn test_canonical_omits_absent_fields() {
        let canonical = Transfer::new("t2", "peer.bob", "1").canonical_json().unwrap();
        assert!(!canonical.contains("executionCondition"));
        assert!(!canonical.contains("expiresAt"));
        assert!(!canonical.contains("noteToSelf"));
    }

    #[test]
    fn test_canonical_is_byte_stable() {
        let a = sample().canonical_json().unwrap();
        let b = sample().canonical_json().unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn test_canonical_detects_tampering() {
        let mut tampered = sample();
        tampered.amount = "6".into();
        assert_ne!(
            sample().canonical_json().unwrap(),
            tampered.canonical_json().unwrap()
        );
    }

    #[test]
    fn test_conditional_flag() {
        assert!(sample().is_conditional());
        assert!(!Transfer::new("t3", "peer.bob", "1").is_conditional());
    }

    #[test]
    fn test_state_terminal() {
        assert!(TransferState::Completed.is_terminal());
        assert!(!TransferState::Prepared.is_terminal());
    }

    #[test]
    fn test_state_str_roundtrip() {
        for state in [TransferState::Prepared, TransferState::Completed] {
            assert_eq!(TransferState::from_str_value(state.as_str()), Some(state));
        }
        assert_eq!(TransferState::from_str_value("bogus"), None);
    }

    #[test]
    fn test_wire_field_names_are_camel_case() {
        let json = serde_json::to_string(&sample()).unwrap();
        assert!(json.contains("executionCondition"));
        assert!(!json.contains("execution_condition"));
    }
}
