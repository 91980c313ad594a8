//! Metrics collection and exposition.
//!
//! # Metrics
//! - `stormcast_warnings_issued_total` (counter): issue/reissue commands
//!   accepted
//! - `stormcast_warnings_expired_total` (counter): expiries by trigger
//!   (`timer` | `command`)
//! - `stormcast_subscribers` (gauge): connected subscribers by transport
//! - `stormcast_broadcast_failures_total` (counter): dead-subscriber
//!   sends by transport

use std::net::SocketAddr;

use metrics::{counter, describe_counter, describe_gauge, gauge};
use metrics_exporter_prometheus::PrometheusBuilder;

use crate::fanout::TransportKind;

/// Install the Prometheus exporter on the given address.
///
/// Failure is logged, never fatal: the relay runs fine without a scrape
/// endpoint.
pub fn init_metrics(addr: SocketAddr) {
    match PrometheusBuilder::new().with_http_listener(addr).install() {
        Ok(()) => tracing::info!(address = %addr, "Metrics exporter listening"),
        Err(e) => tracing::error!(error = %e, "Failed to install metrics exporter"),
    }

    describe_counter!(
        "stormcast_warnings_issued_total",
        "Warnings issued or re-issued"
    );
    describe_counter!(
        "stormcast_warnings_expired_total",
        "Warnings expired, labelled by trigger"
    );
    describe_gauge!(
        "stormcast_subscribers",
        "Connected subscribers, labelled by transport"
    );
    describe_counter!(
        "stormcast_broadcast_failures_total",
        "Sends to subscribers whose writer was already gone"
    );
}

pub fn record_issue() {
    counter!("stormcast_warnings_issued_total").increment(1);
}

pub fn record_expire(trigger: &'static str) {
    counter!("stormcast_warnings_expired_total", "trigger" => trigger).increment(1);
}

pub fn set_subscribers(transport: TransportKind, count: usize) {
    gauge!("stormcast_subscribers", "transport" => transport.as_str()).set(count as f64);
}

pub fn record_broadcast_failure(transport: TransportKind) {
    counter!("stormcast_broadcast_failures_total", "transport" => transport.as_str()).increment(1);
}
