use crate::message::MessageKind;

/// Errors that can occur during frame encoding/decoding.
#[derive(Debug, thiserror::Error)]
pub enum FrameError {
    /// The COBS code bytes are inconsistent with the frame length.
    #[error("corrupt frame (byte stuffing inconsistent with {len} byte buffer)")]
    FrameCorrupt { len: usize },

    /// The frame carries a discriminant with no registered kind.
    #[error("unknown message kind (discriminant {0})")]
    UnknownMessageKind(u8),

    /// The payload ends before every field of the kind was read.
    #[error("truncated {kind} payload (needed {needed} more bytes, {remaining} remaining)")]
    TruncatedPayload {
        kind: MessageKind,
        needed: usize,
        remaining: usize,
    },

    /// Encoding a kind that has no discriminant in the registry.
    #[error("message kind {0} is not registered")]
    UnregisteredKind(MessageKind),

    /// The discriminant is already taken by another kind.
    #[error("discriminant {discriminant} already registered for {existing}")]
    DuplicateDiscriminant {
        discriminant: u8,
        existing: MessageKind,
    },

    /// The kind already has a discriminant.
    #[error("message kind {kind} already registered as {discriminant}")]
    DuplicateKind { kind: MessageKind, discriminant: u8 },

    /// No delimiter arrived within the configured frame size.
    #[error("frame exceeds {max} bytes without a delimiter")]
    FrameTooLarge { max: usize },

    /// An I/O error occurred while reading or writing frames.
    #[error("frame I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The stream ended.
    #[error("connection closed")]
    ConnectionClosed,
}

impl FrameError {
    /// True for errors confined to a single frame.
    ///
    /// The stream is still usable afterwards: the reader resumes at the next
    /// delimiter.
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            FrameError::FrameCorrupt { .. }
                | FrameError::UnknownMessageKind(_)
                | FrameError::TruncatedPayload { .. }
                | FrameError::FrameTooLarge { .. }
        )
    }
}

pub type Result<T> = std::result::Result<T, FrameError>;
