//! ViewState - canonical race state consumed by the renderer
//!
//! The wire shape is the full-state payload published by timing services:
//! `{"cars": [...], "session": {...}, "messages": [...]}`.

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;

/// Track flag state
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FlagState {
    Green,
    Yellow,
    Fcy,
    #[serde(rename = "code_60")]
    Code60,
    Sc,
    Red,
    Chequered,
    White,
    Vsc,
    #[default]
    None,
    /// Any flag this viewer does not know about
    #[serde(other)]
    Unknown,
}

/// Session-level timing data
///
/// Services send placeholder text such as `"-- : -- : --"` for clocks they
/// cannot read, and a computed lap count can go negative. Such values fall
/// back to the field default instead of failing the payload.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SessionInfo {
    #[serde(rename = "flagState", default)]
    pub flag_state: FlagState,

    #[serde(rename = "timeElapsed", default, deserialize_with = "lenient_seconds")]
    pub time_elapsed_seconds: f64,

    #[serde(rename = "timeRemain", default, deserialize_with = "lenient_seconds")]
    pub time_remain_seconds: f64,

    #[serde(
        rename = "lapsRemain",
        default,
        deserialize_with = "lenient_laps",
        skip_serializing_if = "Option::is_none"
    )]
    pub laps_remaining: Option<i32>,

    /// Values matching the service's `trackDataSpec`
    #[serde(rename = "trackData", default)]
    pub track_data: Vec<Value>,
}

fn numeric(value: &Value) -> Option<f64> {
    match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

/// Seconds, or 0 for anything that is not a number
fn lenient_seconds<'de, D>(deserializer: D) -> Result<f64, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Value::deserialize(deserializer)?;
    Ok(numeric(&value).filter(|n| n.is_finite()).unwrap_or_default())
}

fn lenient_laps<'de, D>(deserializer: D) -> Result<Option<i32>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Value::deserialize(deserializer)?;
    Ok(numeric(&value)
        .filter(|n| n.is_finite())
        .map(|n| n.round().clamp(f64::from(i32::MIN), f64::from(i32::MAX)) as i32))
}

/// One row of the timing table, laid out per the service's `colSpec`
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CarRow(pub Vec<Value>);

impl CarRow {
    /// Race number, always the first column
    pub fn number(&self) -> Option<&Value> {
        self.0.first()
    }
}

/// Message feed entry
///
/// Serialized as `[timestamp, category, text, messageType]` with an optional
/// trailing car number.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(from = "RawMessage", into = "RawMessage")]
pub struct TimingMessage {
    /// Epoch seconds
    pub timestamp: f64,
    pub category: String,
    pub text: String,
    pub message_type: String,
    pub car_number: Option<Value>,
}

impl TimingMessage {
    pub fn new(
        timestamp: f64,
        category: impl Into<String>,
        text: impl Into<String>,
        message_type: impl Into<String>,
    ) -> Self {
        Self {
            timestamp,
            category: category.into(),
            text: text.into(),
            message_type: message_type.into(),
            car_number: None,
        }
    }
}

#[derive(Clone, Serialize, Deserialize)]
#[serde(untagged)]
enum RawMessage {
    WithCar(f64, String, String, String, Value),
    Plain(f64, String, String, String),
}

impl From<RawMessage> for TimingMessage {
    fn from(raw: RawMessage) -> Self {
        match raw {
            RawMessage::WithCar(timestamp, category, text, message_type, car) => Self {
                timestamp,
                category,
                text,
                message_type,
                car_number: Some(car),
            },
            RawMessage::Plain(timestamp, category, text, message_type) => {
                Self::new(timestamp, category, text, message_type)
            }
        }
    }
}

impl From<TimingMessage> for RawMessage {
    fn from(msg: TimingMessage) -> Self {
        match msg.car_number {
            Some(car) => {
                RawMessage::WithCar(msg.timestamp, msg.category, msg.text, msg.message_type, car)
            }
            None => RawMessage::Plain(msg.timestamp, msg.category, msg.text, msg.message_type),
        }
    }
}

/// Full-state payload carried by a state delta or returned by a state request
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StatePayload {
    #[serde(default)]
    pub cars: Vec<CarRow>,
    #[serde(default)]
    pub session: SessionInfo,
    /// Newest first
    #[serde(default)]
    pub messages: Vec<TimingMessage>,
}

/// View state owned by the synchronization core
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ViewState {
    pub cars: Vec<CarRow>,
    pub session: SessionInfo,
    /// Newest first
    pub messages: Vec<TimingMessage>,
}
