//! State reducer.
//!
//! The only code that mutates [`ViewState`]. Every payload is a full
//! snapshot, so applying one replaces `cars`, `session` and `messages`
//! wholesale; nothing is merged across payloads.

use contracts::{StatePayload, SystemMessageConfig, TimingMessage, ViewState};

/// Locally generated availability notice
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SystemNotice {
    ServiceLost,
    ServiceRestored,
}

impl SystemNotice {
    pub fn text(self) -> &'static str {
        match self {
            SystemNotice::ServiceLost => "Service no longer available",
            SystemNotice::ServiceRestored => "Service now available",
        }
    }

    /// Build the message record, stamped with epoch seconds
    pub fn to_message(self, config: &SystemMessageConfig, timestamp: f64) -> TimingMessage {
        TimingMessage::new(
            timestamp,
            config.category.clone(),
            self.text(),
            config.message_type.clone(),
        )
    }
}

/// Replace the view with the payload's snapshot
pub fn apply(state: &mut ViewState, payload: StatePayload) {
    let StatePayload {
        cars,
        session,
        messages,
    } = payload;
    state.cars = cars;
    state.session = session;
    state.messages = messages;
}

/// Prepend a synthetic message, keeping existing messages in order
pub fn prepend_message(state: &mut ViewState, message: TimingMessage) {
    state.messages.insert(0, message);
}

/// Back to the empty view shown before any data arrives
pub fn reset(state: &mut ViewState) {
    *state = ViewState::default();
}
