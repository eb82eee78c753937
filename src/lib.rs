//! ilp-plugin-virtual - Bilateral Virtual Ledger Plugin
//!
//! Two peers maintain a shared trustline over a signalling channel:
//! each side tracks its own view of the running balance, and the
//! acknowledge/reject protocol makes both views converge.
//!
//! # Modules
//!
//! - [`core_types`] - Core type definitions (TransferId, AccountId)
//! - [`config`] - Plugin configuration (auth, currency info, logging)
//! - [`models`] - Transfer, direction and lifecycle state types
//! - [`money`] - Decimal amount parsing and formatting
//! - [`balance`] - Limit-guarded persistent balance
//! - [`transfer_log`] - Durable per-id transfer records
//! - [`messages`] - Wire message types
//! - [`store`] - Key-value persistence seam
//! - [`connection`] - Signalling channel seam
//! - [`condition`] - Crypto-condition validation seam
//! - [`events`] - Typed observer surface
//! - [`plugin`] - The ledger state machine

// Core types - must be first!
pub mod core_types;

// Configuration
pub mod config;
pub mod logging;

// Ledger components
pub mod balance;
pub mod condition;
pub mod connection;
pub mod error;
pub mod events;
pub mod messages;
pub mod models;
pub mod money;
pub mod plugin;
pub mod store;
pub mod transfer_log;

// Convenient re-exports at crate root
pub use balance::{Balance, BalanceLimits};
pub use condition::{ConditionValidator, PreimageSha256};
pub use connection::{Connection, PairedConnection, TransportError};
pub use config::PluginConfig;
pub use core_types::{AccountId, TransferId};
pub use error::PluginError;
pub use events::{EventBus, LedgerEvent};
pub use messages::{Payload, WireMessage};
pub use models::{Direction, LogEntry, Transfer, TransferState};
pub use plugin::{LedgerInfo, PluginVirtual};
pub use store::{MemoryStore, Store, StoreError};
pub use transfer_log::TransferLog;
