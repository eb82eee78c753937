//! Signalling Connection
//!
//! Opaque message conduit between the two peers. The core only needs
//! connect/disconnect/send plus a stream of inbound JSON messages;
//! reliability and ordering come from the transport, not from here.

use async_trait::async_trait;
use serde_json::Value;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Mutex;
use thiserror::Error;
use tokio::sync::mpsc;

/// Transport delivery failure
#[derive(Error, Debug, Clone)]
#[error("transport failure: {0}")]
pub struct TransportError(pub String);

/// Message conduit contract.
///
/// `take_incoming` hands out the inbound receiver exactly once; the
/// plugin's receive loop owns it for the lifetime of the session.
#[async_trait]
pub trait Connection: Send + Sync {
    /// Bring the transport up.
    async fn connect(&self) -> Result<(), TransportError>;

    /// Tear the transport down. Sends fail afterwards; a receive loop
    /// already holding the inbound receiver drains what was delivered.
    async fn disconnect(&self) -> Result<(), TransportError>;

    fn is_connected(&self) -> bool;

    /// Enqueue one message for the peer.
    async fn send(&self, msg: Value) -> Result<(), TransportError>;

    /// Take the inbound message receiver. `None` once taken.
    fn take_incoming(&self) -> Option<mpsc::UnboundedReceiver<Value>>;
}

/// In-memory duplex connection linking two plugins directly.
///
/// `pair()` returns both endpoints; what one side sends, the other
/// receives. This is the signalling rendezvous for in-process peers
/// and the test suites.
pub struct PairedConnection {
    peer_tx: mpsc::UnboundedSender<Value>,
    incoming: Mutex<Option<mpsc::UnboundedReceiver<Value>>>,
    connected: AtomicBool,
}

impl PairedConnection {
    /// Build two linked endpoints.
    pub fn pair() -> (PairedConnection, PairedConnection) {
        let (a_tx, a_rx) = mpsc::unbounded_channel();
        let (b_tx, b_rx) = mpsc::unbounded_channel();

        let left = PairedConnection {
            peer_tx: b_tx,
            incoming: Mutex::new(Some(a_rx)),
            connected: AtomicBool::new(false),
        };
        let right = PairedConnection {
            peer_tx: a_tx,
            incoming: Mutex::new(Some(b_rx)),
            connected: AtomicBool::new(false),
        };
        (left, right)
    }
}

#[async_trait]
impl Connection for PairedConnection {
    async fn connect(&self) -> Result<(), TransportError> {
        self.connected.store(true, Ordering::Release);
        Ok(())
    }

    async fn disconnect(&self) -> Result<(), TransportError> {
        self.connected.store(false, Ordering::Release);
        Ok(())
    }

    fn is_connected(&self) -> bool {
        self.connected.load(Ordering::Acquire)
    }

    async fn send(&self, msg: Value) -> Result<(), TransportError> {
        if !self.is_connected() {
            return Err(TransportError("connection is down".into()));
        }
        self.peer_tx
            .send(msg)
            .map_err(|_| TransportError("peer endpoint dropped".into()))
    }

    fn take_incoming(&self) -> Option<mpsc::UnboundedReceiver<Value>> {
        self.incoming.lock().unwrap().take()
    }
}
