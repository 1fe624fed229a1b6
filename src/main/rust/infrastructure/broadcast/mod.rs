mod broadcaster;
mod subscriber;

pub use broadcaster::Broadcaster;
pub use subscriber::SubscriberHandle;
