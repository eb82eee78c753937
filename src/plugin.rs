//! Ledger State Machine
//!
//! The core of the plugin: consumes inbound wire messages, drives the
//! balance and the transfer log, and answers the peer with
//! acknowledge/reject. This is the component that preserves the
//! monetary invariants (no double-spend, no double-credit, no lost
//! funds on replay) across asynchronous peer messages with no trusted
//! coordinator.
//!
//! # Transfer Lifecycle
//!
//! ```text
//! outgoing: sent ──▶ acknowledge ⇒ completed (balance -= amount)
//!                └─▶ reject      ⇒ completed (no balance change)
//!
//! incoming: received ──▶ accepted ⇒ completed (balance += amount)
//!                    └─▶ rejected ⇒ completed (no balance change)
//!
//! conditional: acknowledge moves no funds; the entry stays prepared
//! until a fulfillment picks the execute or cancel branch.
//! ```
//!
//! # Safety Invariants
//!
//! 1. **One handler at a time**: every balance/log read-modify-write
//!    runs under the single state mutex, start to finish
//! 2. **Complete-before-send**: log completion must succeed before the
//!    corresponding protocol message leaves the node
//! 3. **Lazy escrow**: there is only one balance; money is not kept in
//!    escrow (although it behaves as though it were). Conditional
//!    transfers move the balance on execute-fulfillment only, so a
//!    cancel never has anything to refund

use serde::Serialize;
use serde_json::Value;
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{debug, error, info, warn};

use crate::balance::Balance;
use crate::condition::ConditionValidator;
use crate::config::PluginConfig;
use crate::connection::Connection;
use crate::error::PluginError;
use crate::events::{EventBus, LedgerEvent};
use crate::messages::{Payload, WireMessage};
use crate::models::{Direction, Transfer};
use crate::money;
use crate::store::Store;
use crate::transfer_log::TransferLog;

/// Protocol reject reasons sent to the peer (stable wire strings)
const REASON_REPEAT_ID: &str = "repeat transfer id";
const REASON_INVALID_AMOUNT: &str = "invalid amount";
const REASON_OVER_LIMIT: &str = "credit limit exceeded";

/// Acknowledge message body
const ACK_MESSAGE: &str = "transfer accepted";

/// Currency metadata surfaced to the connector layer (opaque here).
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct LedgerInfo {
    pub precision: u32,
    pub scale: u32,
    pub currency_code: String,
    pub currency_symbol: String,
}

/// Balance + transfer log behind the single state mutex.
///
/// Holding the `Mutex<LedgerCore>` guard IS the critical section; the
/// two fields are never reachable without it.
struct LedgerCore {
    balance: Balance,
    transfer_log: TransferLog,
}

struct Inner {
    account: String,
    core: Mutex<LedgerCore>,
    connection: Arc<dyn Connection>,
    validator: Arc<dyn ConditionValidator>,
    events: Arc<EventBus>,
    info: LedgerInfo,
}

/// Bilateral virtual ledger plugin.
///
/// Two of these, linked by a connection, converge on the same balance
/// provided no party acts maliciously and messages are delivered.
pub struct PluginVirtual {
    inner: Arc<Inner>,
}

impl PluginVirtual {
    pub fn new(
        config: &PluginConfig,
        store: Arc<dyn Store>,
        connection: Arc<dyn Connection>,
        validator: Arc<dyn ConditionValidator>,
    ) -> anyhow::Result<Self> {
        let limits = config.balance_limits()?;
        let events = Arc::new(EventBus::new());

        let core = LedgerCore {
            balance: Balance::new(store.clone(), events.clone(), limits),
            transfer_log: TransferLog::new(store),
        };

        Ok(Self {
            inner: Arc::new(Inner {
                account: config.auth.account.clone(),
                core: Mutex::new(core),
                connection,
                validator,
                events,
                info: LedgerInfo {
                    precision: config.info.precision,
                    scale: config.info.scale,
                    currency_code: config.info.currency_code.clone(),
                    currency_symbol: config.info.currency_symbol.clone(),
                },
            }),
        })
    }

    /// Register an observer for ledger events.
    pub fn subscribe(&self) -> tokio::sync::mpsc::UnboundedReceiver<LedgerEvent> {
        self.inner.events.subscribe()
    }

    /// Local account label.
    pub fn account(&self) -> &str {
        &self.inner.account
    }

    /// Currency metadata from configuration.
    pub fn get_info(&self) -> LedgerInfo {
        self.inner.info.clone()
    }

    /// Bring the transport up and start the receive loop.
    pub async fn connect(&self) -> Result<(), PluginError> {
        self.inner.connection.connect().await?;

        // The inbound receiver exists exactly once; on reconnect the
        // original receive loop keeps running.
        if let Some(mut rx) = self.inner.connection.take_incoming() {
            let inner = self.inner.clone();
            tokio::spawn(async move {
                while let Some(raw) = rx.recv().await {
                    inner.handle_raw(raw).await;
                }
                debug!(account = %inner.account, "receive loop ended");
            });
        }

        info!(account = %self.inner.account, "plugin connected");
        self.inner.events.emit(LedgerEvent::Connect);
        Ok(())
    }

    /// Tear the transport down.
    pub async fn disconnect(&self) -> Result<(), PluginError> {
        self.inner.connection.disconnect().await?;
        info!(account = %self.inner.account, "plugin disconnected");
        self.inner.events.emit(LedgerEvent::Disconnect);
        Ok(())
    }

    pub fn is_connected(&self) -> bool {
        self.inner.connection.is_connected()
    }

    /// Current trustline balance as a decimal string.
    pub async fn get_balance(&self) -> Result<String, PluginError> {
        let core = self.inner.core.lock().await;
        let balance = core.balance.get().await?;
        Ok(money::format_amount(&balance))
    }

    /// Propose an outgoing transfer to the peer.
    ///
    /// The balance is not touched here: the peer's acknowledge is
    /// authoritative (and conditional transfers settle only on
    /// execute-fulfillment).
    pub async fn send(&self, transfer: Transfer) -> Result<(), PluginError> {
        let core = self.inner.core.lock().await;
        core.transfer_log.store_outgoing(&transfer).await?;

        self.inner
            .send_wire(&WireMessage::Transfer {
                transfer: transfer.clone(),
            })
            .await?;
        info!(id = %transfer.id, amount = %transfer.amount, "outgoing transfer sent");
        Ok(())
    }

    /// Present a fulfillment for a conditional transfer: apply it
    /// locally, then forward it to the peer.
    pub async fn fulfill_condition(
        &self,
        id: &str,
        fulfillment: &str,
    ) -> Result<(), PluginError> {
        let core = self.inner.core.lock().await;
        let transfer = self.inner.resolve_condition(&core, id, fulfillment).await?;

        self.inner
            .send_wire(&WireMessage::Fulfillment {
                transfer: transfer.clone(),
                fulfillment: fulfillment.to_string(),
            })
            .await?;
        self.inner.events.emit(LedgerEvent::Fulfillment {
            transfer,
            fulfillment: fulfillment.to_string(),
        });
        Ok(())
    }

    /// Send an informational reply about a logged transfer.
    pub async fn reply_to_transfer(&self, id: &str, message: &str) -> Result<(), PluginError> {
        let core = self.inner.core.lock().await;
        let entry = core
            .transfer_log
            .get(id)
            .await?
            .ok_or_else(|| PluginError::UnknownTransfer(id.to_string()))?;

        self.inner
            .send_wire(&WireMessage::Reply {
                transfer: entry.transfer,
                message: Payload::new(message),
            })
            .await
    }
}

impl Inner {
    async fn send_wire(&self, msg: &WireMessage) -> Result<(), PluginError> {
        self.connection.send(msg.encode()?).await?;
        Ok(())
    }

    fn emit_error(&self, err: &PluginError) {
        self.events.emit(LedgerEvent::Error {
            code: err.code(),
            detail: err.to_string(),
        });
    }

    /// Decode and dispatch one inbound message. Handler failures are
    /// surfaced through the error event; the receive loop never dies.
    async fn handle_raw(&self, raw: Value) {
        let msg = match WireMessage::decode(&raw) {
            Ok(msg) => msg,
            Err(e) => {
                warn!(account = %self.account, error = %e, "undecodable wire message");
                self.emit_error(&e);
                return;
            }
        };

        let result = match msg {
            WireMessage::Transfer { transfer } => self.handle_transfer(transfer).await,
            WireMessage::Acknowledge { transfer, message } => {
                self.handle_acknowledge(transfer, message).await
            }
            WireMessage::Reject { transfer, message } => {
                self.handle_reject(transfer, message).await
            }
            WireMessage::Reply { transfer, message } => {
                self.handle_reply(transfer, message).await
            }
            WireMessage::Fulfillment {
                transfer,
                fulfillment,
            } => self.handle_fulfillment(transfer, fulfillment).await,
        };

        if let Err(e) = result {
            error!(account = %self.account, code = e.code(), error = %e, "handler failed");
            self.emit_error(&e);
        }
    }

    /// Incoming-handler: validate, then acknowledge (crediting self for
    /// unconditional transfers) or reject.
    async fn handle_transfer(&self, transfer: Transfer) -> Result<(), PluginError> {
        let core = self.core.lock().await;

        // Replay: the id was already seen; the original entry stays
        // exactly as it was.
        if core.transfer_log.get(&transfer.id).await?.is_some() {
            warn!(id = %transfer.id, "repeat transfer id");
            self.events
                .emit(LedgerEvent::RepeatTransfer(transfer.id.clone()));
            return self
                .reject_incoming(&core, &transfer, REASON_REPEAT_ID, false)
                .await;
        }

        core.transfer_log.store_incoming(&transfer).await?;

        // Observers see the transfer before the accept/reject decision
        // is acted on.
        self.events
            .emit(LedgerEvent::IncomingTransfer(transfer.clone()));

        let amount = match money::parse_positive(&transfer.amount) {
            Ok(amount) => amount,
            Err(e) => {
                debug!(id = %transfer.id, error = %e, "invalid incoming amount");
                return self
                    .reject_incoming(&core, &transfer, REASON_INVALID_AMOUNT, true)
                    .await;
            }
        };

        if !core.balance.can_credit(&amount).await? {
            return self
                .reject_incoming(&core, &transfer, REASON_OVER_LIMIT, true)
                .await;
        }

        if transfer.is_conditional() {
            // Acknowledge without moving funds; the entry stays
            // prepared awaiting a fulfillment.
            self.send_wire(&WireMessage::Acknowledge {
                transfer: transfer.clone(),
                message: Payload::new(ACK_MESSAGE),
            })
            .await?;
            info!(id = %transfer.id, amount = %transfer.amount, "conditional transfer held");
        } else {
            core.balance.add(amount).await?;
            core.transfer_log.complete(&transfer.id).await?;
            self.send_wire(&WireMessage::Acknowledge {
                transfer: transfer.clone(),
                message: Payload::new(ACK_MESSAGE),
            })
            .await?;
            info!(id = %transfer.id, amount = %transfer.amount, "incoming transfer accepted");
        }
        Ok(())
    }

    /// Decline an incoming transfer. Completion must succeed before
    /// the reject message leaves the node.
    async fn reject_incoming(
        &self,
        core: &LedgerCore,
        transfer: &Transfer,
        reason: &str,
        complete: bool,
    ) -> Result<(), PluginError> {
        if complete {
            core.transfer_log.complete(&transfer.id).await?;
        }
        self.send_wire(&WireMessage::Reject {
            transfer: transfer.clone(),
            message: Payload::new(reason),
        })
        .await?;
        info!(id = %transfer.id, reason, "incoming transfer rejected");
        Ok(())
    }

    /// Ack-handler: the peer accepted our outgoing transfer.
    async fn handle_acknowledge(
        &self,
        transfer: Transfer,
        message: Payload,
    ) -> Result<(), PluginError> {
        let core = self.core.lock().await;

        let mut acknowledged = None;
        if let Some(entry) = core.transfer_log.get(&transfer.id).await? {
            let genuine = entry.direction == Direction::Outgoing
                && entry.transfer.canonical_json()? == transfer.canonical_json()?
                && !core.transfer_log.is_complete(&transfer.id).await?;
            if genuine {
                acknowledged = Some(entry);
            }
        }
        let entry = match acknowledged {
            Some(entry) => entry,
            None => {
                // Unknown id, tampered body, wrong direction, or an
                // already-settled transfer.
                warn!(id = %transfer.id, "false acknowledge");
                self.events
                    .emit(LedgerEvent::FalseAcknowledge(transfer.clone()));
                return Err(PluginError::FalseAcknowledge(transfer.id));
            }
        };

        if entry.transfer.is_conditional() {
            // Funds move on execute-fulfillment; the entry stays
            // prepared.
            debug!(id = %transfer.id, "conditional outgoing acknowledged");
        } else {
            let amount = money::parse_positive(&entry.transfer.amount)
                .map_err(|e| PluginError::InvalidAmount(e.to_string()))?;
            core.balance.sub(amount).await?;
            core.transfer_log.complete(&transfer.id).await?;
            info!(id = %transfer.id, amount = %entry.transfer.amount, "outgoing transfer settled");
        }

        self.events.emit(LedgerEvent::Accept { transfer, message });
        Ok(())
    }

    /// Reject-handler: the peer declined our outgoing transfer. No
    /// balance was applied at send time, so there is nothing to undo.
    async fn handle_reject(
        &self,
        transfer: Transfer,
        message: Payload,
    ) -> Result<(), PluginError> {
        let core = self.core.lock().await;

        if core.transfer_log.get(&transfer.id).await?.is_some() {
            if core.transfer_log.is_complete(&transfer.id).await? {
                warn!(id = %transfer.id, "reject for completed transfer ignored");
            } else {
                core.transfer_log.complete(&transfer.id).await?;
                info!(id = %transfer.id, reason = %message, "outgoing transfer rejected by peer");
            }
        }

        self.events.emit(LedgerEvent::Reject { transfer, message });
        Ok(())
    }

    async fn handle_reply(
        &self,
        transfer: Transfer,
        message: Payload,
    ) -> Result<(), PluginError> {
        self.events.emit(LedgerEvent::Reply { transfer, message });
        Ok(())
    }

    /// Fulfillment-handler: the peer presented a preimage. Applied
    /// locally only; echoing it back would loop.
    async fn handle_fulfillment(
        &self,
        transfer: Transfer,
        fulfillment: String,
    ) -> Result<(), PluginError> {
        let core = self.core.lock().await;
        self.resolve_condition(&core, &transfer.id, &fulfillment)
            .await?;
        Ok(())
    }

    /// Condition resolution for a locally logged conditional transfer.
    ///
    /// Execute when the fulfillment matches the execution condition,
    /// cancel when it matches the cancellation condition, otherwise
    /// `InvalidFulfillment`. Under the lazy escrow policy the execute
    /// branch is the single point where a conditional transfer moves
    /// the balance, in either direction.
    async fn resolve_condition(
        &self,
        core: &LedgerCore,
        id: &str,
        fulfillment: &str,
    ) -> Result<Transfer, PluginError> {
        let entry = core
            .transfer_log
            .get(id)
            .await?
            .ok_or_else(|| PluginError::UnknownTransfer(id.to_string()))?;
        let transfer = entry.transfer.clone();

        let condition = transfer
            .execution_condition
            .clone()
            .ok_or_else(|| PluginError::NotConditional(id.to_string()))?;

        // Replayed fulfillment for a settled transfer: the balance
        // effect already happened exactly once.
        if core.transfer_log.is_complete(id).await? {
            debug!(id, "fulfillment for completed transfer ignored");
            return Ok(transfer);
        }

        let amount = money::parse_positive(&transfer.amount)
            .map_err(|e| PluginError::InvalidAmount(e.to_string()))?;

        if self.validator.validate(fulfillment, &condition) {
            match entry.direction {
                // Lazy escrow: the outgoing debit was deferred from
                // send until now.
                Direction::Outgoing => {
                    core.balance.sub(amount).await?;
                }
                Direction::Incoming => {
                    core.balance.add(amount).await?;
                }
            }
            core.transfer_log.complete(id).await?;
            info!(id, direction = %entry.direction, "execution condition fulfilled");
            self.events.emit(LedgerEvent::FulfillExecutionCondition {
                transfer: transfer.clone(),
                fulfillment: fulfillment.to_string(),
            });
            return Ok(transfer);
        }

        if let Some(cancel) = &transfer.cancellation_condition {
            if self.validator.validate(fulfillment, cancel) {
                // Nothing was ever applied, so cancel moves no funds.
                core.transfer_log.complete(id).await?;
                info!(id, direction = %entry.direction, "cancellation condition fulfilled");
                self.events.emit(LedgerEvent::FulfillCancellationCondition {
                    transfer: transfer.clone(),
                    fulfillment: fulfillment.to_string(),
                });
                return Ok(transfer);
            }
        }

        Err(PluginError::InvalidFulfillment(id.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::condition::PreimageSha256;
    use crate::config::{AuthConfig, InfoConfig, LogConfig};
    use crate::connection::PairedConnection;
    use crate::store::MemoryStore;
    use serde_json::json;
    use std::time::Duration;
    use tokio::sync::mpsc::UnboundedReceiver;
    use tokio::time::timeout;

    fn test_config(account: &str, limit: &str) -> PluginConfig {
        PluginConfig {
            auth: AuthConfig {
                account: account.into(),
                room: "test-room".into(),
                host: "mem://".into(),
                limit: limit.into(),
                max: None,
            },
            info: InfoConfig::default(),
            log: LogConfig::default(),
        }
    }

    /// Plugin wired to a raw peer endpoint so tests control the wire
    /// byte for byte.
    async fn plugin_with_raw_peer(
        limit: &str,
    ) -> (PluginVirtual, PairedConnection, UnboundedReceiver<Value>) {
        let (local, remote) = PairedConnection::pair();
        let plugin = PluginVirtual::new(
            &test_config("alice", limit),
            Arc::new(MemoryStore::new()),
            Arc::new(local),
            Arc::new(PreimageSha256::new()),
        )
        .unwrap();
        remote.connect().await.unwrap();
        let peer_rx = remote.take_incoming().unwrap();
        plugin.connect().await.unwrap();
        (plugin, remote, peer_rx)
    }

    async fn next_event(rx: &mut UnboundedReceiver<LedgerEvent>) -> LedgerEvent {
        timeout(Duration::from_secs(1), rx.recv())
            .await
            .expect("timed out waiting for event")
            .expect("event bus closed")
    }

    async fn next_wire(rx: &mut UnboundedReceiver<Value>) -> Value {
        timeout(Duration::from_secs(1), rx.recv())
            .await
            .expect("timed out waiting for wire message")
            .expect("wire channel closed")
    }

    fn transfer_msg(transfer: &Transfer) -> Value {
        WireMessage::Transfer {
            transfer: transfer.clone(),
        }
        .encode()
        .unwrap()
    }

    #[tokio::test]
    async fn test_unconditional_accept_credits_and_acks() {
        let (plugin, remote, mut peer_rx) = plugin_with_raw_peer("10").await;

        let t = Transfer::new("t1", "alice", "5");
        remote.send(transfer_msg(&t)).await.unwrap();

        let ack = next_wire(&mut peer_rx).await;
        assert_eq!(ack["type"], "acknowledge");
        assert_eq!(ack["message"], "transfer accepted");
        assert_eq!(plugin.get_balance().await.unwrap(), "5");
    }

    #[tokio::test]
    async fn test_over_limit_reject() {
        let (plugin, remote, mut peer_rx) = plugin_with_raw_peer("10").await;

        remote
            .send(transfer_msg(&Transfer::new("t1", "alice", "8")))
            .await
            .unwrap();
        assert_eq!(next_wire(&mut peer_rx).await["type"], "acknowledge");

        remote
            .send(transfer_msg(&Transfer::new("t2", "alice", "5")))
            .await
            .unwrap();
        let reject = next_wire(&mut peer_rx).await;
        assert_eq!(reject["type"], "reject");
        assert_eq!(reject["message"], "credit limit exceeded");
        assert_eq!(plugin.get_balance().await.unwrap(), "8");
    }

    #[tokio::test]
    async fn test_invalid_amount_reject() {
        let (plugin, remote, mut peer_rx) = plugin_with_raw_peer("10").await;

        for (id, amount) in [("t1", "NaN"), ("t2", "0"), ("t3", "-2")] {
            remote
                .send(transfer_msg(&Transfer::new(id, "alice", amount)))
                .await
                .unwrap();
            let reject = next_wire(&mut peer_rx).await;
            assert_eq!(reject["type"], "reject");
            assert_eq!(reject["message"], "invalid amount");
        }
        assert_eq!(plugin.get_balance().await.unwrap(), "0");
    }

    #[tokio::test]
    async fn test_repeat_transfer_rejected_once_credited() {
        let (plugin, remote, mut peer_rx) = plugin_with_raw_peer("10").await;
        let mut events = plugin.subscribe();

        let t = Transfer::new("t1", "alice", "5");
        remote.send(transfer_msg(&t)).await.unwrap();
        assert_eq!(next_wire(&mut peer_rx).await["type"], "acknowledge");

        remote.send(transfer_msg(&t)).await.unwrap();
        let reject = next_wire(&mut peer_rx).await;
        assert_eq!(reject["type"], "reject");
        assert_eq!(reject["message"], "repeat transfer id");

        // Exactly one balance effect
        assert_eq!(plugin.get_balance().await.unwrap(), "5");

        let mut saw_repeat = false;
        while let Ok(Some(event)) =
            timeout(Duration::from_millis(200), events.recv()).await
        {
            if matches!(event, LedgerEvent::RepeatTransfer(ref id) if id == "t1") {
                saw_repeat = true;
                break;
            }
        }
        assert!(saw_repeat, "expected RepeatTransfer debug event");
    }

    #[tokio::test]
    async fn test_false_acknowledge_on_tampered_amount() {
        let (plugin, remote, mut peer_rx) = plugin_with_raw_peer("10").await;
        let mut events = plugin.subscribe();

        plugin
            .send(Transfer::new("t3", "bob", "2"))
            .await
            .unwrap();
        assert_eq!(next_wire(&mut peer_rx).await["type"], "transfer");

        // Peer replies with a tampered amount
        let tampered = Transfer::new("t3", "bob", "3");
        remote
            .send(
                WireMessage::Acknowledge {
                    transfer: tampered,
                    message: Payload::new("transfer accepted"),
                }
                .encode()
                .unwrap(),
            )
            .await
            .unwrap();

        let mut saw_false_ack = false;
        while let Ok(Some(event)) =
            timeout(Duration::from_millis(200), events.recv()).await
        {
            if matches!(event, LedgerEvent::FalseAcknowledge(_)) {
                saw_false_ack = true;
                break;
            }
        }
        assert!(saw_false_ack, "expected FalseAcknowledge debug event");
        assert_eq!(plugin.get_balance().await.unwrap(), "0");
    }

    #[tokio::test]
    async fn test_acknowledge_for_completed_transfer_is_false() {
        let (plugin, remote, mut peer_rx) = plugin_with_raw_peer("10").await;
        let mut events = plugin.subscribe();

        let t = Transfer::new("t4", "bob", "2");
        plugin.send(t.clone()).await.unwrap();
        assert_eq!(next_wire(&mut peer_rx).await["type"], "transfer");

        let ack = WireMessage::Acknowledge {
            transfer: t,
            message: Payload::new("transfer accepted"),
        }
        .encode()
        .unwrap();

        remote.send(ack.clone()).await.unwrap();
        // First ack settles the transfer
        loop {
            match next_event(&mut events).await {
                LedgerEvent::Accept { .. } => break,
                _ => continue,
            }
        }
        assert_eq!(plugin.get_balance().await.unwrap(), "-2");

        // Replayed ack must not debit again
        remote.send(ack).await.unwrap();
        let mut saw_false_ack = false;
        while let Ok(Some(event)) =
            timeout(Duration::from_millis(200), events.recv()).await
        {
            if matches!(event, LedgerEvent::FalseAcknowledge(_)) {
                saw_false_ack = true;
                break;
            }
        }
        assert!(saw_false_ack);
        assert_eq!(plugin.get_balance().await.unwrap(), "-2");
    }

    #[tokio::test]
    async fn test_duplicate_send_fails() {
        let (plugin, _remote, mut peer_rx) = plugin_with_raw_peer("10").await;

        let t = Transfer::new("t5", "bob", "1");
        plugin.send(t.clone()).await.unwrap();
        assert_eq!(next_wire(&mut peer_rx).await["type"], "transfer");

        let err = plugin.send(Transfer::new("t5", "bob", "9")).await.unwrap_err();
        assert!(matches!(err, PluginError::DuplicateTransfer(_)));
    }

    #[tokio::test]
    async fn test_fulfill_unknown_transfer() {
        let (plugin, _remote, _peer_rx) = plugin_with_raw_peer("10").await;
        let err = plugin.fulfill_condition("ghost", "preimage").await.unwrap_err();
        assert!(matches!(err, PluginError::UnknownTransfer(_)));
    }

    #[tokio::test]
    async fn test_fulfill_unconditional_transfer() {
        let (plugin, _remote, mut peer_rx) = plugin_with_raw_peer("10").await;

        plugin.send(Transfer::new("t6", "bob", "1")).await.unwrap();
        assert_eq!(next_wire(&mut peer_rx).await["type"], "transfer");

        let err = plugin.fulfill_condition("t6", "preimage").await.unwrap_err();
        assert!(matches!(err, PluginError::NotConditional(_)));
    }

    #[tokio::test]
    async fn test_reply_unknown_transfer() {
        let (plugin, _remote, _peer_rx) = plugin_with_raw_peer("10").await;
        let err = plugin.reply_to_transfer("ghost", "hello").await.unwrap_err();
        assert!(matches!(err, PluginError::UnknownTransfer(_)));
    }

    #[tokio::test]
    async fn test_malformed_message_emits_error() {
        let (plugin, remote, _peer_rx) = plugin_with_raw_peer("10").await;
        let mut events = plugin.subscribe();

        remote.send(json!({"type": "settle"})).await.unwrap();
        loop {
            match next_event(&mut events).await {
                LedgerEvent::Error { code, .. } => {
                    assert_eq!(code, "INVALID_MESSAGE");
                    break;
                }
                _ => continue,
            }
        }
        // The receive loop survives and keeps processing
        remote
            .send(transfer_msg(&Transfer::new("t7", "alice", "1")))
            .await
            .unwrap();
        loop {
            match next_event(&mut events).await {
                LedgerEvent::IncomingTransfer(t) => {
                    assert_eq!(t.id, "t7");
                    break;
                }
                _ => continue,
            }
        }
    }

    #[tokio::test]
    async fn test_reject_after_accept_is_ignored() {
        let (plugin, remote, mut peer_rx) = plugin_with_raw_peer("10").await;

        let t = Transfer::new("t8", "bob", "2");
        plugin.send(t.clone()).await.unwrap();
        assert_eq!(next_wire(&mut peer_rx).await["type"], "transfer");

        remote
            .send(
                WireMessage::Acknowledge {
                    transfer: t.clone(),
                    message: Payload::new("transfer accepted"),
                }
                .encode()
                .unwrap(),
            )
            .await
            .unwrap();

        let mut events = plugin.subscribe();
        remote
            .send(
                WireMessage::Reject {
                    transfer: t,
                    message: Payload::new("changed my mind"),
                }
                .encode()
                .unwrap(),
            )
            .await
            .unwrap();
        loop {
            match next_event(&mut events).await {
                LedgerEvent::Reject { .. } => break,
                _ => continue,
            }
        }
        // Settled balance is untouched by the late reject
        assert_eq!(plugin.get_balance().await.unwrap(), "-2");
    }

    #[tokio::test]
    async fn test_get_info_reflects_config() {
        let (plugin, _remote, _peer_rx) = plugin_with_raw_peer("10").await;
        let info = plugin.get_info();
        assert_eq!(info.precision, 15);
        assert_eq!(info.currency_code, "USD");
    }
}
