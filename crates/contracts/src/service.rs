//! Service - one live or recorded timing feed
//!
//! Field names follow the service manifest published by timing services
//! (`uuid`, `colSpec`, `trackDataSpec`, ...).

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::ServiceId;

/// Ordered list of available services, as maintained by the service directory.
pub type ServiceList = Vec<Service>;

/// Service manifest
///
/// Immutable once fetched. A changed directory replaces records wholesale.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Service {
    /// Unique service id
    #[serde(rename = "uuid")]
    pub id: ServiceId,

    /// Display name
    pub name: String,

    /// Free-form description of the session
    #[serde(default)]
    pub description: String,

    /// Column layout of car rows; entries are column names or `[name, type]` pairs
    #[serde(rename = "colSpec", default)]
    pub column_spec: Vec<Value>,

    /// Labels of the session track data values
    #[serde(rename = "trackDataSpec", default)]
    pub track_data_spec: Vec<String>,

    /// Length of a recorded session, in seconds. Absent for live feeds.
    #[serde(
        rename = "duration",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub duration_seconds: Option<f64>,

    /// Epoch second of the first recorded frame
    #[serde(rename = "startTime", default, skip_serializing_if = "Option::is_none")]
    pub start_timestamp: Option<f64>,

    /// Plugin class that produced the feed
    #[serde(rename = "serviceClass", default, skip_serializing_if = "Option::is_none")]
    pub service_class: Option<String>,

    /// Publishing interval of the upstream service, in seconds
    #[serde(rename = "pollInterval", default, skip_serializing_if = "Option::is_none")]
    pub poll_interval: Option<f64>,

    /// Attribution for the upstream data source
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source: Option<Value>,

    /// Hidden services are not listed to end users
    #[serde(default)]
    pub hidden: bool,
}

impl Service {
    /// Minimal live service record
    pub fn live(id: impl Into<ServiceId>, name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            description: String::new(),
            column_spec: Vec::new(),
            track_data_spec: Vec::new(),
            duration_seconds: None,
            start_timestamp: None,
            service_class: None,
            poll_interval: None,
            source: None,
            hidden: false,
        }
    }

    /// Minimal recorded service record
    pub fn recorded(id: impl Into<ServiceId>, name: impl Into<String>, duration: f64) -> Self {
        Self {
            duration_seconds: Some(duration),
            ..Self::live(id, name)
        }
    }

    /// Whether this is a recording navigated with virtual time
    pub fn is_recorded(&self) -> bool {
        self.duration_seconds.is_some()
    }

    /// Clamp a playback position into `[0, duration]`
    pub fn clamp_time(&self, time_seconds: f64) -> f64 {
        let lower = time_seconds.max(0.0);
        match self.duration_seconds {
            Some(duration) => lower.min(duration.max(0.0)),
            None => lower,
        }
    }
}

/// Find a service by id in a directory listing
pub fn find_service<'a>(services: &'a [Service], id: &str) -> Option<&'a Service> {
    services.iter().find(|s| s.id == id)
}
