mod output_codec;
mod process_engine;

pub use output_codec::{parse_line, EngineLine};
pub use process_engine::{EngineConfig, ProcessEngine};
