use std::time::Duration;

/// Errors returned by channel operations.
#[derive(Debug, thiserror::Error)]
pub enum ChannelError {
    /// Transport-level error.
    #[error("transport error: {0}")]
    Transport(#[from] volsync_transport::TransportError),

    /// Frame-level error.
    #[error("frame error: {0}")]
    Frame(#[from] volsync_frame::FrameError),

    /// No acknowledgment arrived in time.
    #[error("handshake timed out after {0:?}")]
    HandshakeTimeout(Duration),

    /// The peer broke the handshake.
    #[error("handshake failed: {0}")]
    HandshakeFailed(String),

    /// No link is established.
    #[error("not connected")]
    NotConnected,

    /// `start` was called on a running channel.
    #[error("channel already running")]
    AlreadyRunning,

    /// The channel was stopped while connecting.
    #[error("channel stopped")]
    Stopped,

    /// A worker thread could not be spawned.
    #[error("failed to spawn worker: {0}")]
    Spawn(std::io::Error),
}

/// Why a link went down, as carried by [`ChannelEvent::Error`].
///
/// [`ChannelEvent::Error`]: crate::events::ChannelEvent::Error
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum DisconnectReason {
    /// No acknowledgment arrived within the handshake timeout.
    #[error("handshake timed out after {0:?}")]
    HandshakeTimeout(Duration),

    /// The peer answered the handshake with something unusable.
    #[error("handshake failed: {0}")]
    HandshakeFailed(String),

    /// Discovery produced no candidate endpoint.
    #[error("no control surface available")]
    TransportUnavailable,

    /// Reading or writing the link failed.
    #[error("I/O failure: {0}")]
    Io(String),

    /// The peer closed the link.
    #[error("connection closed by peer")]
    ConnectionClosed,

    /// Nothing was received for longer than the liveness timeout.
    #[error("no traffic for {0:?}")]
    LivenessTimeout(Duration),
}

impl From<&ChannelError> for DisconnectReason {
    fn from(err: &ChannelError) -> Self {
        match err {
            ChannelError::HandshakeTimeout(timeout) => DisconnectReason::HandshakeTimeout(*timeout),
            ChannelError::HandshakeFailed(reason) => {
                DisconnectReason::HandshakeFailed(reason.clone())
            }
            ChannelError::Frame(volsync_frame::FrameError::ConnectionClosed) => {
                DisconnectReason::ConnectionClosed
            }
            other => DisconnectReason::Io(other.to_string()),
        }
    }
}

pub type Result<T> = std::result::Result<T, ChannelError>;
