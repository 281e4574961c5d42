//! # Telemetry sink: latest-known metric per provider id.
//!
//! The data plane streams per-connection counters; the agent only ever
//! needs the most recent sample per provider, so the sink is a plain
//! upsert map. Listings pull from it to decorate connection statuses.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use dashmap::DashMap;
use serde_json::Value;

use crate::model::ConnectionStatus;

/// One metric sample as reported by a proxy.
#[derive(Clone, Debug, Default)]
pub struct Metric {
    pub timestamp_ms: i64,
    pub fields: HashMap<String, Value>,
}

impl Metric {
    pub fn new(timestamp_ms: i64) -> Self {
        Self {
            timestamp_ms,
            fields: HashMap::new(),
        }
    }
}

/// Latest-per-key metric store.
#[derive(Default)]
pub struct TelemetrySink {
    metrics: DashMap<String, Metric>,
}

impl TelemetrySink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replaces the stored sample for `id`.
    pub fn add_metric(&self, id: &str, metric: Metric) {
        self.metrics.insert(id.to_string(), metric);
    }

    pub fn get_metric(&self, id: &str) -> Option<Metric> {
        self.metrics.get(id).map(|m| m.clone())
    }

    /// Forgets a provider, used when its resource leaves the registry.
    pub fn remove_metric(&self, id: &str) {
        self.metrics.remove(id);
    }

    /// Overlays the latest sample for `id` onto a connection status.
    pub fn populate_conn_status(&self, status: &mut ConnectionStatus, id: &str) {
        let Some(metric) = self.get_metric(id) else {
            return;
        };
        status.updated_at = DateTime::<Utc>::from_timestamp_millis(metric.timestamp_ms);

        let fields = &metric.fields;
        if let Some(v) = fields.get("state").and_then(Value::as_str) {
            status.state = v.to_string();
        }
        if let Some(v) = fields.get("link").and_then(Value::as_bool) {
            status.linked = v;
        }
        if let Some(v) = fields.get("in").and_then(Value::as_u64) {
            status.inbound_bytes = v;
        }
        if let Some(v) = fields.get("out").and_then(Value::as_u64) {
            status.outbound_bytes = v;
        }
        if let Some(v) = fields.get("strn").and_then(Value::as_u64) {
            status.transactions_succeeded = v as u32;
        }
        if let Some(v) = fields.get("ftrn").and_then(Value::as_u64) {
            status.transactions_failed = v as u32;
        }
        if let Some(v) = fields.get("tps").and_then(Value::as_f64) {
            status.transactions_per_second = v;
        }
        if let Some(v) = fields.get("inbw").and_then(Value::as_f64) {
            status.inbound_bandwidth = v;
        }
        if let Some(v) = fields.get("outbw").and_then(Value::as_f64) {
            status.outbound_bandwidth = v;
        }
        if let Some(v) = fields.get("err").and_then(Value::as_u64) {
            status.errors = v as u32;
        }
        if let Some(v) = fields.get("errd").and_then(Value::as_u64) {
            status.errors_delta = v as u32;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn upsert_keeps_latest_sample() {
        let sink = TelemetrySink::new();
        sink.add_metric("c1", Metric::new(1));
        sink.add_metric("c1", Metric::new(2));
        assert_eq!(sink.get_metric("c1").unwrap().timestamp_ms, 2);
        assert!(sink.get_metric("c2").is_none());
    }

    #[test]
    fn populate_overlays_known_fields() {
        let sink = TelemetrySink::new();
        let mut metric = Metric::new(1_700_000_000_000);
        metric.fields.insert("state".into(), json!("active"));
        metric.fields.insert("link".into(), json!(true));
        metric.fields.insert("in".into(), json!(1024));
        metric.fields.insert("tps".into(), json!(59.94));
        sink.add_metric("c1", metric);

        let mut status = ConnectionStatus::active_now();
        sink.populate_conn_status(&mut status, "c1");
        assert!(status.linked);
        assert_eq!(status.inbound_bytes, 1024);
        assert_eq!(status.transactions_per_second, 59.94);
        assert!(status.updated_at.is_some());
    }
}
