//! Wire Messages
//!
//! The five message types the two peers exchange over the signalling
//! channel, as a tagged JSON enum.
//!
//! # Message Flow
//!
//! ```text
//! sender ── transfer ──────────────▶ receiver
//! sender ◀─ acknowledge | reject ─── receiver
//! either ── reply | fulfillment ───▶ either
//! ```

use serde::de::{self, SeqAccess, Visitor};
use serde::{Deserialize, Deserializer, Serialize};
use std::fmt;

use crate::error::PluginError;
use crate::models::Transfer;

// ============================================================
// PAYLOAD (polymorphic message body)
// ============================================================

/// Opaque message payload.
///
/// Peers may send either a JSON string or an array of bytes; both are
/// normalized to a UTF-8 string at the boundary so the rest of the
/// core only ever sees one shape.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct Payload(String);

impl Payload {
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Payload {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for Payload {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

impl<'de> Deserialize<'de> for Payload {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        struct PayloadVisitor;

        impl<'de> Visitor<'de> for PayloadVisitor {
            type Value = Payload;

            fn expecting(&self, f: &mut fmt::Formatter) -> fmt::Result {
                f.write_str("a string or an array of bytes")
            }

            fn visit_str<E: de::Error>(self, value: &str) -> Result<Payload, E> {
                Ok(Payload(value.to_string()))
            }

            fn visit_seq<A: SeqAccess<'de>>(self, mut seq: A) -> Result<Payload, A::Error> {
                let mut bytes = Vec::new();
                while let Some(byte) = seq.next_element::<u8>()? {
                    bytes.push(byte);
                }
                Ok(Payload(String::from_utf8_lossy(&bytes).into_owned()))
            }
        }

        deserializer.deserialize_any(PayloadVisitor)
    }
}

// ============================================================
// WIRE MESSAGE (tagged enum)
// ============================================================

/// Every message the signalling channel can carry.
///
/// Anything that fails to decode into one of these variants is an
/// `InvalidMessage` protocol error, surfaced through the error event
/// rather than crashing the receive loop.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum WireMessage {
    /// A new transfer proposed by the sending peer
    Transfer { transfer: Transfer },
    /// Receiver accepted the transfer
    Acknowledge { transfer: Transfer, message: Payload },
    /// Receiver declined the transfer; `message` carries the reason
    Reject { transfer: Transfer, message: Payload },
    /// Informational, no state change
    Reply { transfer: Transfer, message: Payload },
    /// Preimage presentation for a conditional transfer
    Fulfillment { transfer: Transfer, fulfillment: String },
}

impl WireMessage {
    /// Decode a raw signalling message.
    pub fn decode(raw: &serde_json::Value) -> Result<Self, PluginError> {
        serde_json::from_value(raw.clone())
            .map_err(|e| PluginError::InvalidMessage(e.to_string()))
    }

    /// Encode for the signalling channel.
    pub fn encode(&self) -> Result<serde_json::Value, PluginError> {
        Ok(serde_json::to_value(self)?)
    }

    /// The transfer id this message is about (every variant has one).
    pub fn transfer_id(&self) -> &str {
        match self {
            WireMessage::Transfer { transfer }
            | WireMessage::Acknowledge { transfer, .. }
            | WireMessage::Reject { transfer, .. }
            | WireMessage::Reply { transfer, .. }
            | WireMessage::Fulfillment { transfer, .. } => &transfer.id,
        }
    }
}
