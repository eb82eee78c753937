//! Core types used throughout the plugin
//!
//! These are fundamental type aliases used by all modules.
//! They provide semantic meaning and enable future type evolution.

/// Transfer ID - globally unique, assigned by the sending peer.
///
/// # Constraints:
/// - **Immutable**: Once assigned, NEVER changes
/// - **Unique**: A second transfer carrying an already-seen ID is a
///   protocol error (replay) and is rejected
pub type TransferId = String;

/// Account identifier - opaque destination label for a transfer.
///
/// The core never interprets this; it is carried verbatim on the wire.
pub type AccountId = String;

/// Store key for the persisted trustline balance.
pub const BALANCE_KEY: &str = "balance";

/// Key prefix owned by the transfer log. No other component writes
/// under this prefix.
pub const TRANSFER_KEY_PREFIX: &str = "t:";
