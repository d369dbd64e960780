// SPDX-FileCopyrightText: 2026 Threadlink Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Metric registration and recording helpers.
//!
//! Uses the metrics-rs facade so any installed recorder collects these.
//! Without a recorder every call is a no-op.

use metrics::{describe_counter, describe_gauge};

/// Register all bridge metric descriptions.
///
/// Called once at startup after the recorder is installed.
pub fn register_metrics() {
    describe_counter!(
        "threadlink_messages_bridged_total",
        "Messages forwarded between the Source and the Sink"
    );
    describe_counter!(
        "threadlink_messages_failed_total",
        "Messages dropped after a forwarding error"
    );
    describe_counter!("threadlink_topics_created_total", "Sink topics created");
    describe_counter!(
        "threadlink_topic_heals_total",
        "Topics recreated after the Sink reported them missing"
    );
    describe_counter!(
        "threadlink_calls_notified_total",
        "Incoming call notifications mirrored into the call-log topic"
    );
    describe_gauge!("threadlink_mapped_conversations", "Conversations with a live topic");
    describe_counter!(
        "threadlink_sink_api_errors_total",
        "Sink bot API calls that returned an error"
    );
    describe_counter!(
        "threadlink_webhook_rejected_total",
        "Source webhook requests rejected for a bad signature"
    );
}

/// Record a forwarded message. `direction` is `inbound` or `outbound`.
pub fn record_bridged(direction: &'static str, kind: &'static str) {
    metrics::counter!("threadlink_messages_bridged_total", "direction" => direction, "kind" => kind)
        .increment(1);
}

/// Record a message that could not be forwarded.
pub fn record_failed(direction: &'static str) {
    metrics::counter!("threadlink_messages_failed_total", "direction" => direction).increment(1);
}

pub fn record_topic_created() {
    metrics::counter!("threadlink_topics_created_total").increment(1);
}

pub fn record_topic_healed() {
    metrics::counter!("threadlink_topic_heals_total").increment(1);
}

pub fn record_call_notified() {
    metrics::counter!("threadlink_calls_notified_total").increment(1);
}

/// Set the number of mapped conversations.
pub fn set_mapped_conversations(count: usize) {
    metrics::gauge!("threadlink_mapped_conversations").set(count as f64);
}
