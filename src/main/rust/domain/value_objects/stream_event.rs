use std::time::SystemTime;

use bytes::Bytes;
use serde::Serialize;

/// One captured frame from the native engine.
///
/// The payload is reference-counted and never mutated after creation,
/// so fan-out clones are cheap.
#[derive(Debug, Clone)]
pub struct Frame {
    pub sequence: u64,
    pub payload: Bytes,
    pub captured_at: SystemTime,
}

impl Frame {
    pub fn new(sequence: u64, payload: Bytes) -> Self {
        Self {
            sequence,
            payload,
            captured_at: SystemTime::now(),
        }
    }
}

/// One metrics record emitted by the native engine.
///
/// Serializes to the wire shape pushed to streaming clients:
/// `{"detectedCount":..,"mode":..,"fps":..}`.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Metrics {
    pub detected_count: u64,
    pub mode: String,
    pub fps: f64,
    #[serde(skip)]
    pub emitted_at: SystemTime,
}

impl Metrics {
    pub fn new(detected_count: u64, mode: impl Into<String>, fps: f64) -> Self {
        Self {
            detected_count,
            mode: mode.into(),
            fps,
            emitted_at: SystemTime::now(),
        }
    }
}

/// Event fanned out to subscribers: a frame or a metrics record.
#[derive(Debug, Clone)]
pub enum StreamEvent {
    Frame(Frame),
    Metrics(Metrics),
}

impl StreamEvent {
    pub fn is_frame(&self) -> bool {
        matches!(self, Self::Frame(_))
    }

    pub fn sequence(&self) -> Option<u64> {
        match self {
            Self::Frame(frame) => Some(frame.sequence),
            Self::Metrics(_) => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_metrics_wire_shape() {
        let metrics = Metrics::new(5, "Face", 12.5);
        let json = serde_json::to_value(&metrics).unwrap();

        assert_eq!(json["detectedCount"], 5);
        assert_eq!(json["mode"], "Face");
        assert_eq!(json["fps"], 12.5);
        assert!(json.get("emittedAt").is_none());
    }

    #[test]
    fn test_event_sequence() {
        let frame = StreamEvent::Frame(Frame::new(42, Bytes::from_static(b"jpeg")));
        assert!(frame.is_frame());
        assert_eq!(frame.sequence(), Some(42));

        let metrics = StreamEvent::Metrics(Metrics::new(1, "Body", 30.0));
        assert!(!metrics.is_frame());
        assert_eq!(metrics.sequence(), None);
    }

    #[test]
    fn test_frame_payload_clone_is_shallow() {
        let frame = Frame::new(1, Bytes::from(vec![0u8; 1024]));
        let copy = frame.clone();
        // Bytes clones share the same backing buffer
        assert_eq!(copy.payload.as_ptr(), frame.payload.as_ptr());
    }
}
