mod camera_descriptor;
mod pipeline_state;
mod region_of_interest;
mod restart_policy;
mod stage_status;
mod stream_event;

pub use camera_descriptor::CameraDescriptor;
pub use pipeline_state::PipelineState;
pub use region_of_interest::{RegionOfInterest, RoiSpec};
pub use restart_policy::{BackoffPolicy, RestartPolicy};
pub use stage_status::{Stage, StageStatus};
pub use stream_event::{Frame, Metrics, StreamEvent};
