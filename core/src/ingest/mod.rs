pub mod snapshot;
pub mod stream;

pub use snapshot::{HttpSnapshotLoader, SnapshotSource};
pub use stream::{ChannelMessage, FallEventMessage, LiveStreamListener, LiveSubscription};
