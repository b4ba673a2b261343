//! Engine metrics collection.
//!
//! Thin helpers over the `metrics` macros so call sites stay terse and
//! metric names live in one place.

use metrics::counter;

use domain::models::{EventType, SampleSource};

/// Record a sample accepted under the monotonic-acceptance rule.
pub fn record_sample_accepted(source: SampleSource) {
    counter!("presence_samples_accepted_total", "source" => source.as_str()).increment(1);
}

/// Record a sample dropped as stale (older than stored state).
pub fn record_sample_stale(source: SampleSource) {
    counter!("presence_samples_stale_total", "source" => source.as_str()).increment(1);
}

/// Record a sample dropped for failing coordinate validation.
pub fn record_sample_invalid(source: SampleSource) {
    counter!("presence_samples_invalid_total", "source" => source.as_str()).increment(1);
}

/// Record a push subscription that could not be opened or dropped.
pub fn record_push_subscription_error() {
    counter!("presence_push_subscription_errors_total").increment(1);
}

/// Record a poll fetch failure (retried on the next tick).
pub fn record_poll_failure() {
    counter!("presence_poll_failures_total").increment(1);
}

/// Record a domain event produced by the dispatcher.
pub fn record_event_emitted(event_type: EventType) {
    counter!("dispatcher_events_emitted_total", "type" => event_type.as_str()).increment(1);
}

/// Record a delivery admitted by the notification gate.
pub fn record_delivery_admitted() {
    counter!("dispatcher_deliveries_admitted_total").increment(1);
}

/// Record a delivery suppressed by the notification gate.
pub fn record_delivery_suppressed() {
    counter!("dispatcher_deliveries_suppressed_total").increment(1);
}
