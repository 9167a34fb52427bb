use std::time::Duration;

use frames::{FrameError, MessageType};

/// Error returned by the waiting helpers of [`crate::CrossFrameMessenger`].
#[derive(Debug, thiserror::Error)]
pub enum MessengerError {
    #[error("no `{message_type}` message received within {}ms", timeout.as_millis())]
    Timeout { message_type: MessageType, timeout: Duration },
    #[error("messenger unregistered while waiting for `{message_type}`")]
    Unregistered { message_type: MessageType },
    #[error(transparent)]
    Frame(#[from] FrameError),
}
