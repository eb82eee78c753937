//! Ledger Events
//!
//! Typed observer surface of the state machine. Subscribers get every
//! event over an unbounded channel, so emission never blocks a
//! balance/log critical section.

use rust_decimal::Decimal;
use std::sync::Mutex;
use tokio::sync::mpsc;

use crate::core_types::TransferId;
use crate::messages::Payload;
use crate::models::Transfer;

/// Everything the ledger state machine tells its observers.
///
/// The `RepeatTransfer`, `FalseAcknowledge` and `BalanceChanged`
/// variants are debug hooks: observable for tests and diagnostics, not
/// part of the protocol outcome.
#[derive(Debug, Clone)]
pub enum LedgerEvent {
    /// Transport is up
    Connect,
    /// Transport is down
    Disconnect,
    /// A new incoming transfer entered the state machine (emitted
    /// before the accept/reject decision is acted on)
    IncomingTransfer(Transfer),
    /// The peer acknowledged an outgoing transfer
    Accept { transfer: Transfer, message: Payload },
    /// The peer rejected an outgoing transfer
    Reject { transfer: Transfer, message: Payload },
    /// Informational reply from the peer
    Reply { transfer: Transfer, message: Payload },
    /// A conditional transfer executed
    FulfillExecutionCondition {
        transfer: Transfer,
        fulfillment: String,
    },
    /// A conditional transfer cancelled
    FulfillCancellationCondition {
        transfer: Transfer,
        fulfillment: String,
    },
    /// A fulfillment was applied locally and forwarded to the peer
    Fulfillment {
        transfer: Transfer,
        fulfillment: String,
    },
    /// A handler failed; never swallowed silently
    Error { code: &'static str, detail: String },
    /// Debug: replayed transfer id observed
    RepeatTransfer(TransferId),
    /// Debug: acknowledge for an unknown, mismatched or completed transfer
    FalseAcknowledge(Transfer),
    /// Debug: the persisted balance moved
    BalanceChanged(Decimal),
}

/// Subscriber registry.
///
/// Fan-out over unbounded senders; subscribers that dropped their
/// receiver are pruned on the next emit.
#[derive(Default)]
pub struct EventBus {
    subscribers: Mutex<Vec<mpsc::UnboundedSender<LedgerEvent>>>,
}

impl EventBus {
    pub fn new() -> Self {
        Self {
            subscribers: Mutex::new(Vec::new()),
        }
    }

    /// Register a new observer.
    pub fn subscribe(&self) -> mpsc::UnboundedReceiver<LedgerEvent> {
        let (tx, rx) = mpsc::unbounded_channel();
        self.subscribers.lock().unwrap().push(tx);
        rx
    }

    /// Deliver an event to every live subscriber.
    pub fn emit(&self, event: LedgerEvent) {
        let mut subscribers = self.subscribers.lock().unwrap();
        subscribers.retain(|tx| tx.send(event.clone()).is_ok());
    }

    /// Number of live subscribers (test introspection).
    pub fn subscriber_count(&self) -> usize {
        self.subscribers.lock().unwrap().len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_subscribe_and_emit() {
        let bus = EventBus::new();
        let mut rx = bus.subscribe();

        bus.emit(LedgerEvent::Connect);
        assert!(matches!(rx.recv().await.unwrap(), LedgerEvent::Connect));
    }

    #[tokio::test]
    async fn test_fanout_to_all_subscribers() {
        let bus = EventBus::new();
        let mut rx1 = bus.subscribe();
        let mut rx2 = bus.subscribe();

        bus.emit(LedgerEvent::Disconnect);
        assert!(matches!(rx1.recv().await.unwrap(), LedgerEvent::Disconnect));
        assert!(matches!(rx2.recv().await.unwrap(), LedgerEvent::Disconnect));
    }

    #[tokio::test]
    async fn test_dropped_subscriber_pruned() {
        let bus = EventBus::new();
        let rx = bus.subscribe();
        let _rx2 = bus.subscribe();
        assert_eq!(bus.subscriber_count(), 2);

        drop(rx);
        bus.emit(LedgerEvent::Connect);
        assert_eq!(bus.subscriber_count(), 1);
    }

    #[tokio::test]
    async fn test_events_arrive_in_order() {
        let bus = EventBus::new();
        let mut rx = bus.subscribe();

        bus.emit(LedgerEvent::Connect);
        bus.emit(LedgerEvent::Disconnect);

        assert!(matches!(rx.recv().await.unwrap(), LedgerEvent::Connect));
        assert!(matches!(rx.recv().await.unwrap(), LedgerEvent::Disconnect));
    }
}
