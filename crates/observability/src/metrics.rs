//! Timing viewer metrics
//!
//! Thin helpers over the `metrics` facade so every crate records the same
//! metric names, plus the hold-time accumulator of the delay buffer.

use metrics::{counter, gauge, histogram};

/// Record a publication delivered by the live subscription
pub fn record_delivery_received(service_id: &str, messages: usize) {
    counter!(
        "timing_viewer_deliveries_total",
        "service_id" => service_id.to_string()
    )
    .increment(1);
    counter!(
        "timing_viewer_wire_messages_total",
        "service_id" => service_id.to_string()
    )
    .increment(messages as u64);
}

/// Record a wire message that could not be decoded
pub fn record_decode_failure(reason: &str) {
    counter!(
        "timing_viewer_decode_failures_total",
        "reason" => reason.to_string()
    )
    .increment(1);
}

/// Record payloads released by the delay buffer and how long each was held
pub fn record_delay_release(released: usize, hold_ms: f64) {
    counter!("timing_viewer_delay_released_total").increment(released as u64);
    histogram!("timing_viewer_delay_hold_ms").record(hold_ms);
}

/// Record the current delay buffer depth
pub fn record_delay_queue_depth(depth: usize) {
    gauge!("timing_viewer_delay_queue_depth").set(depth as f64);
}

/// Record the selected viewing delay
pub fn record_delay_seconds(seconds: u32) {
    gauge!("timing_viewer_delay_seconds").set(f64::from(seconds));
}

/// Record a time-indexed state request issued by playback
pub fn record_playback_request(service_id: &str, virtual_time: f64) {
    counter!(
        "timing_viewer_playback_requests_total",
        "service_id" => service_id.to_string()
    )
    .increment(1);
    gauge!("timing_viewer_playback_virtual_time_seconds").set(virtual_time);
}

/// Record a rejected subscribe / state request / playback fetch
pub fn record_failure(kind: &str) {
    counter!(
        "timing_viewer_failures_total",
        "kind" => kind.to_string()
    )
    .increment(1);
}

/// Record a service availability transition
pub fn record_availability_transition(service_id: &str, available: bool) {
    let direction = if available { "restored" } else { "lost" };
    counter!(
        "timing_viewer_availability_transitions_total",
        "service_id" => service_id.to_string(),
        "direction" => direction.to_string()
    )
    .increment(1);
}

/// Aggregate of the time payloads spent in the delay buffer
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct HoldSummary {
    pub count: u64,
    pub min_ms: f64,
    pub max_ms: f64,
    pub mean_ms: f64,
}

impl std::fmt::Display for HoldSummary {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if self.count == 0 {
            return f.write_str("N/A");
        }
        write!(
            f,
            "mean {:.0}ms (min {:.0}ms, max {:.0}ms, n={})",
            self.mean_ms, self.min_ms, self.max_ms, self.count
        )
    }
}

/// Running hold-time accumulator kept next to the delay queue
#[derive(Debug, Clone, Default)]
pub struct HoldTimes {
    count: u64,
    total_ms: f64,
    min_ms: Option<f64>,
    max_ms: f64,
}

impl HoldTimes {
    pub fn record(&mut self, held_ms: f64) {
        self.count += 1;
        self.total_ms += held_ms;
        self.min_ms = Some(self.min_ms.map_or(held_ms, |min| min.min(held_ms)));
        self.max_ms = self.max_ms.max(held_ms);
    }

    pub fn count(&self) -> u64 {
        self.count
    }

    pub fn summary(&self) -> HoldSummary {
        if self.count == 0 {
            return HoldSummary::default();
        }
        HoldSummary {
            count: self.count,
            min_ms: self.min_ms.unwrap_or_default(),
            max_ms: self.max_ms,
            mean_ms: self.total_ms / self.count as f64,
        }
    }
}
