//! Fan-out of progress events to connected observers.

mod hub;

pub use hub::{BroadcastHub, ChannelObserver, ObserverId, ProgressObserver};
