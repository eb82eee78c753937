//! Transfer Log
//!
//! Durable record of every transfer this node has seen, keyed by
//! transfer id. The log owns the `t:` keyspace of the store; the body
//! lives under `t:{id}` and the completion flag under `t:{id}:state`
//! so completing never rewrites the transfer itself.
//!
//! Within a single id all operations are serialized by the caller
//! (the plugin holds its state lock across every read-modify-write);
//! across ids they may interleave freely.

use std::sync::Arc;
use tracing::debug;

use crate::core_types::TRANSFER_KEY_PREFIX;
use crate::error::PluginError;
use crate::models::{Direction, LogEntry, Transfer, TransferState};
use crate::store::Store;

/// Persistent per-id transfer records over the opaque store.
pub struct TransferLog {
    store: Arc<dyn Store>,
}

impl TransferLog {
    pub fn new(store: Arc<dyn Store>) -> Self {
        Self { store }
    }

    fn record_key(id: &str) -> String {
        format!("{}{}", TRANSFER_KEY_PREFIX, id)
    }

    fn state_key(id: &str) -> String {
        format!("{}{}:state", TRANSFER_KEY_PREFIX, id)
    }

    /// Fetch the logged entry for an id, `None` if never seen.
    pub async fn get(&self, id: &str) -> Result<Option<LogEntry>, PluginError> {
        let raw = self.store.get(&Self::record_key(id)).await?;
        match raw {
            Some(json) => {
                let entry: LogEntry = serde_json::from_str(&json)
                    .map_err(|e| PluginError::Store(format!("corrupt log entry {}: {}", id, e)))?;
                Ok(Some(entry))
            }
            None => Ok(None),
        }
    }

    /// Record a transfer received from the peer, in `prepared` state.
    pub async fn store_incoming(&self, transfer: &Transfer) -> Result<(), PluginError> {
        self.store_with_direction(transfer, Direction::Incoming).await
    }

    /// Record a transfer this node is sending, in `prepared` state.
    pub async fn store_outgoing(&self, transfer: &Transfer) -> Result<(), PluginError> {
        self.store_with_direction(transfer, Direction::Outgoing).await
    }

    /// Idempotent create: re-storing the identical entry is a no-op,
    /// any divergence in direction or content is a replay.
    async fn store_with_direction(
        &self,
        transfer: &Transfer,
        direction: Direction,
    ) -> Result<(), PluginError> {
        if let Some(existing) = self.get(&transfer.id).await? {
            let same_body =
                existing.transfer.canonical_json()? == transfer.canonical_json()?;
            if existing.direction == direction && same_body {
                debug!(id = %transfer.id, direction = %direction, "identical re-store ignored");
                return Ok(());
            }
            return Err(PluginError::DuplicateTransfer(transfer.id.clone()));
        }

        let entry = LogEntry {
            direction,
            transfer: transfer.clone(),
        };
        let json = serde_json::to_string(&entry)
            .map_err(|e| PluginError::Store(format!("encode log entry: {}", e)))?;
        self.store.put(&Self::record_key(&transfer.id), &json).await?;
        self.store
            .put(&Self::state_key(&transfer.id), TransferState::Prepared.as_str())
            .await?;

        debug!(id = %transfer.id, direction = %direction, "transfer logged");
        Ok(())
    }

    /// Mark an entry completed. Idempotent; a completed entry never
    /// re-opens.
    pub async fn complete(&self, id: &str) -> Result<(), PluginError> {
        if self.get(id).await?.is_none() {
            return Err(PluginError::UnknownTransfer(id.to_string()));
        }
        self.store
            .put(&Self::state_key(id), TransferState::Completed.as_str())
            .await?;
        Ok(())
    }

    /// Whether the entry has reached its terminal state.
    pub async fn is_complete(&self, id: &str) -> Result<bool, PluginError> {
        let state = self.state(id).await?;
        Ok(matches!(state, Some(s) if s.is_terminal()))
    }

    /// Current lifecycle state, `None` if the id was never logged.
    pub async fn state(&self, id: &str) -> Result<Option<TransferState>, PluginError> {
        let raw = self.store.get(&Self::state_key(id)).await?;
        match raw {
            Some(value) => TransferState::from_str_value(&value)
                .map(Some)
                .ok_or_else(|| {
                    PluginError::Store(format!("corrupt state for {}: {}", id, value))
                }),
            None => Ok(None),
        }
    }

    /// Direction the entry was first logged with.
    pub async fn get_type(&self, id: &str) -> Result<Option<Direction>, PluginError> {
        Ok(self.get(id).await?.map(|entry| entry.direction))
    }
}
