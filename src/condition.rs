//! Condition Validation
//!
//! Crypto-condition checking is an external primitive to the ledger
//! core: given `(fulfillment, condition)` it answers yes or no. The
//! state machine only ever consumes the boolean.

use sha2::{Digest, Sha256};

/// Validation seam for conditional transfers.
///
/// Implementations MUST be pure: the same pair always yields the same
/// answer, with no side effects.
pub trait ConditionValidator: Send + Sync {
    fn validate(&self, fulfillment: &str, condition: &str) -> bool;
}

/// SHA-256 preimage validator.
///
/// A condition is the lowercase hex digest of its fulfillment's UTF-8
/// bytes. This is the default primitive for hash-time-lock style
/// transfers between in-process peers.
#[derive(Default)]
pub struct PreimageSha256;

impl PreimageSha256 {
    pub fn new() -> Self {
        Self
    }

    /// Derive the condition for a fulfillment (test and sender helper).
    pub fn condition_for(fulfillment: &str) -> String {
        let mut hasher = Sha256::new();
        hasher.update(fulfillment.as_bytes());
        let digest = hasher.finalize();
        digest.iter().map(|b| format!("{:02x}", b)).collect()
    }
}

impl ConditionValidator for PreimageSha256 {
    fn validate(&self, fulfillment: &str, condition: &str) -> bool {
        Self::condition_for(fulfillment) == condition.to_ascii_lowercase()
    }
}
