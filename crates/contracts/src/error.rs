//! Layered error definitions
//!
//! Categorized by source: config / session / sync / playback / decode

use thiserror::Error;

use crate::ServiceId;

/// Unified error type
#[derive(Debug, Error)]
pub enum TimingError {
    // ===== Configuration Errors =====
    /// Configuration parse error
    #[error("config parse error: {message}")]
    ConfigParse {
        message: String,
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    /// Configuration validation error
    #[error("config validation error at '{field}': {message}")]
    ConfigValidation { field: String, message: String },

    // ===== Session Errors =====
    /// Subscribe call rejected by the channel
    #[error("subscription to '{service_id}' failed: {message}")]
    SubscriptionFailure {
        service_id: ServiceId,
        message: String,
    },

    /// State fetch rejected
    #[error("request '{procedure}' failed: {message}")]
    RequestFailure { procedure: String, message: String },

    /// Time-indexed state fetch rejected during playback
    #[error("playback fetch for '{service_id}' at {time_seconds}s failed: {message}")]
    PlaybackFetchFailure {
        service_id: ServiceId,
        time_seconds: f64,
        message: String,
    },

    /// Bound service is missing from the directory
    #[error("service '{service_id}' is no longer available")]
    ServiceUnavailable { service_id: ServiceId },

    /// Transport-level error reported by a session implementation
    #[error("session error: {message}")]
    Session { message: String },

    // ===== Decode Errors =====
    /// Wire message carried a class this core does not consume
    #[error("unsupported message class {0}")]
    UnsupportedMessageClass(u8),

    /// Payload did not match the expected shape
    #[error("payload decode error: {message}")]
    PayloadDecode { message: String },

    // ===== General Errors =====
    /// IO error
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// Other error
    #[error("{0}")]
    Other(String),
}

impl TimingError {
    /// Create configuration parse error
    pub fn config_parse(message: impl Into<String>) -> Self {
        Self::ConfigParse {
            message: message.into(),
            source: None,
        }
    }

    /// Create configuration validation error
    pub fn config_validation(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self::ConfigValidation {
            field: field.into(),
            message: message.into(),
        }
    }

    /// Create subscription failure
    pub fn subscription(service_id: ServiceId, message: impl Into<String>) -> Self {
        Self::SubscriptionFailure {
            service_id,
            message: message.into(),
        }
    }

    /// Create request failure
    pub fn request(procedure: impl Into<String>, message: impl Into<String>) -> Self {
        Self::RequestFailure {
            procedure: procedure.into(),
            message: message.into(),
        }
    }

    /// Create session error
    pub fn session(message: impl Into<String>) -> Self {
        Self::Session {
            message: message.into(),
        }
    }

    /// Create payload decode error
    pub fn decode(message: impl Into<String>) -> Self {
        Self::PayloadDecode {
            message: message.into(),
        }
    }
}

impl From<serde_json::Error> for TimingError {
    fn from(err: serde_json::Error) -> Self {
        Self::decode(err.to_string())
    }
}
