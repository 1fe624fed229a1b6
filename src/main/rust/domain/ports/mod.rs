mod detection_sink;
mod event_fanout;
mod metrics_reporter;
mod vision_engine;

pub use detection_sink::{DetectionRecord, DetectionSink};
pub use event_fanout::EventFanout;
pub use metrics_reporter::MetricsReporter;
pub use vision_engine::{EngineEvent, EngineHandle, VisionEngine};
