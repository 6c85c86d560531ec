//! Envelope - wire-level unit from the publish/subscribe channel
//!
//! Raw messages look like `{"msgClass": 4, "date": 1556445600000, "payload": {...}}`.
//! Only the classes the viewer consumes are decoded; everything else is
//! rejected so the caller can log and skip it.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::{ServiceList, StatePayload, TimingError};

/// Numeric message classes used on the wire
pub mod message_class {
    pub const SERVICE_DATA: u8 = 4;
    pub const DIRECTORY_LISTING: u8 = 5;
}

/// Undecoded wire message
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WireMessage {
    #[serde(rename = "msgClass")]
    pub msg_class: u8,

    /// Publish time, epoch milliseconds
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub date: Option<i64>,

    #[serde(default)]
    pub payload: Value,

    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub retain: bool,
}

impl WireMessage {
    pub fn new(msg_class: u8, payload: Value) -> Self {
        Self {
            msg_class,
            date: None,
            payload,
            retain: false,
        }
    }
}

/// Decoded envelope
#[derive(Debug, Clone, PartialEq)]
pub enum Envelope {
    /// Full state for the subscribed service
    StateDelta(StatePayload),
    /// New listing for the service directory
    ControlUpdate(ServiceList),
}

impl Envelope {
    /// Decode one raw message as delivered by a subscription
    pub fn decode(raw: Value) -> Result<Self, TimingError> {
        let wire: WireMessage = serde_json::from_value(raw)?;
        Self::try_from(wire)
    }

    /// Encode back into wire form
    pub fn to_wire(&self) -> Result<WireMessage, TimingError> {
        let wire = match self {
            Envelope::StateDelta(payload) => {
                WireMessage::new(message_class::SERVICE_DATA, serde_json::to_value(payload)?)
            }
            Envelope::ControlUpdate(services) => WireMessage::new(
                message_class::DIRECTORY_LISTING,
                serde_json::to_value(services)?,
            ),
        };
        Ok(wire)
    }
}

impl TryFrom<WireMessage> for Envelope {
    type Error = TimingError;

    fn try_from(wire: WireMessage) -> Result<Self, Self::Error> {
        match wire.msg_class {
            message_class::SERVICE_DATA => {
                Ok(Envelope::StateDelta(serde_json::from_value(wire.payload)?))
            }
            message_class::DIRECTORY_LISTING => {
                Ok(Envelope::ControlUpdate(serde_json::from_value(wire.payload)?))
            }
            other => Err(TimingError::UnsupportedMessageClass(other)),
        }
    }
}
