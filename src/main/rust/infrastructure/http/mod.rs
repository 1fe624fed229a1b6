mod control_api;
mod stream_ws;

pub use control_api::routes;
