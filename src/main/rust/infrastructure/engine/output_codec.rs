use serde::Deserialize;

use crate::domain::value_objects::{Metrics, Stage};

/// One decoded line of the engine's stdout protocol.
///
/// The engine emits line-framed control records interleaved with raw
/// frame payloads:
///
/// ```text
/// READY input
/// READY config
/// METRICS {"detectedCount":5,"mode":"Face","fps":12.3}
/// FRAME 48213
/// <48213 raw JPEG bytes>
/// ```
#[derive(Debug, Clone, PartialEq)]
pub enum EngineLine {
    Ready(Stage),
    Metrics(Metrics),
    /// Header announcing a raw payload of the given length
    FrameHeader(usize),
    Unrecognized(String),
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct MetricsWire {
    detected_count: u64,
    mode: String,
    fps: f64,
}

/// Decode one stdout line. Unknown lines are surfaced rather than
/// dropped so the adapter can log them.
pub fn parse_line(line: &str) -> EngineLine {
    let line = line.trim_end();

    if let Some(stage) = line.strip_prefix("READY ") {
        return match stage {
            "input" => EngineLine::Ready(Stage::Input),
            "config" => EngineLine::Ready(Stage::Config),
            _ => EngineLine::Unrecognized(line.to_string()),
        };
    }

    if let Some(json) = line.strip_prefix("METRICS ") {
        return match serde_json::from_str::<MetricsWire>(json) {
            Ok(wire) => EngineLine::Metrics(Metrics::new(wire.detected_count, wire.mode, wire.fps)),
            Err(_) => EngineLine::Unrecognized(line.to_string()),
        };
    }

    if let Some(length) = line.strip_prefix("FRAME ") {
        return match length.parse::<usize>() {
            Ok(length) => EngineLine::FrameHeader(length),
            Err(_) => EngineLine::Unrecognized(line.to_string()),
        };
    }

    EngineLine::Unrecognized(line.to_string())
}
