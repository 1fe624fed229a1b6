pub mod broadcast;
pub mod engine;
pub mod http;
pub mod metrics;
pub mod sink;
