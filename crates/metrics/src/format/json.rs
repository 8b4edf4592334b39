//! JSON metrics formatter
//!
//! # Example Output
//!
//! ```json
//! {"type":"engine","appended_per_sec":1200000,"flushed_per_sec":1190000,
//!  "rotations_per_sec":850,"avg_drain_wait_ns":140,"avg_dispatch_ns":3200,
//!  "dropped":0,"rejected":0,"retries":12,"failures":0,
//!  "lines":[{"name":"order_book","appended_per_sec":610000,"overflowed":0,"peak_fill":0.12}]}
//! ```

use serde::Serialize;

use super::MetricsFormatter;
use crate::{EngineRates, EngineSnapshot, LineRates};

/// JSON metrics formatter
#[derive(Debug, Clone, Default)]
pub struct JsonFormatter;

impl JsonFormatter {
    pub fn new() -> Self {
        Self
    }
}

#[derive(Serialize)]
struct EngineJson<'a> {
    #[serde(rename = "type")]
    report_type: &'static str,
    appended_per_sec: u64,
    flushed_per_sec: u64,
    rotations_per_sec: u64,
    avg_drain_wait_ns: u64,
    avg_dispatch_ns: u64,
    dropped: u64,
    rejected: u64,
    retries: u64,
    failures: u64,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    lines: Vec<LineJson<'a>>,
}

#[derive(Serialize)]
struct LineJson<'a> {
    name: &'a str,
    appended_per_sec: u64,
    overflowed: u64,
    peak_fill: f64,
}

impl<'a> From<&'a LineRates> for LineJson<'a> {
    fn from(line: &'a LineRates) -> Self {
        Self {
            name: &line.name,
            appended_per_sec: line.appended_per_sec as u64,
            overflowed: line.overflowed,
            peak_fill: line.peak_fill,
        }
    }
}

impl MetricsFormatter for JsonFormatter {
    fn format(
        &self,
        snapshot: &EngineSnapshot,
        rates: Option<&EngineRates>,
        include_lines: bool,
    ) -> String {
        let Some(rates) = rates else {
            return format!(
                r#"{{"type":"engine","status":"collecting_baseline","appended":{},"flushed":{}}}"#,
                snapshot.records_appended, snapshot.records_flushed
            );
        };

        let json = EngineJson {
            report_type: "engine",
            appended_per_sec: rates.appended_per_sec as u64,
            flushed_per_sec: rates.flushed_per_sec as u64,
            rotations_per_sec: rates.rotations_per_sec as u64,
            avg_drain_wait_ns: rates.avg_drain_wait.as_nanos() as u64,
            avg_dispatch_ns: rates.avg_dispatch.as_nanos() as u64,
            dropped: rates.dropped,
            rejected: rates.rejected,
            retries: rates.retries,
            failures: rates.failures,
            lines: if include_lines {
                rates.lines.iter().map(LineJson::from).collect()
            } else {
                Vec::new()
            },
        };

        serde_json::to_string(&json).unwrap_or_else(|e| {
            format!(r#"{{"type":"engine","error":"{}"}}"#, e)
        })
    }
}
