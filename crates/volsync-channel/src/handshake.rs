use std::io::{ErrorKind, Read, Write};
use std::time::{Duration, Instant};

use volsync_frame::{FrameCodec, FrameError, FrameReader, FrameWriter, Message, MessageKind};

use crate::error::{ChannelError, Result};

/// Host side: send `HandshakeRequest` and wait for `Acknowledgment`.
///
/// The caller sets a read timeout on the stream so each blocking read
/// returns in time for the deadline check. Frames of other kinds and
/// undecodable frames arriving before the acknowledgment are skipped.
pub fn handshake_host<R: Read, W: Write>(
    reader: &mut FrameReader<R>,
    writer: &mut FrameWriter<W>,
    codec: &FrameCodec,
    timeout: Duration,
) -> Result<()> {
    writer.send(&Message::HandshakeRequest)?;
    let deadline = Instant::now() + timeout;
    recv_kind(reader, codec, MessageKind::Acknowledgment, deadline, timeout)?;
    tracing::debug!("handshake acknowledged");
    Ok(())
}

/// Device side: wait for `HandshakeRequest` and answer with `Acknowledgment`.
pub fn handshake_device<R: Read, W: Write>(
    reader: &mut FrameReader<R>,
    writer: &mut FrameWriter<W>,
    codec: &FrameCodec,
    timeout: Duration,
) -> Result<()> {
    let deadline = Instant::now() + timeout;
    recv_kind(reader, codec, MessageKind::HandshakeRequest, deadline, timeout)?;
    writer.send(&Message::Acknowledgment)?;
    Ok(())
}

fn recv_kind<R: Read>(
    reader: &mut FrameReader<R>,
    codec: &FrameCodec,
    expected: MessageKind,
    deadline: Instant,
    timeout: Duration,
) -> Result<()> {
    loop {
        if Instant::now() >= deadline {
            return Err(ChannelError::HandshakeTimeout(timeout));
        }

        match reader.read_frame() {
            Ok(frame) => match codec.decode(&frame) {
                Ok(message) if message.kind() == expected => return Ok(()),
                Ok(message) => {
                    tracing::debug!(
                        kind = %message.kind(),
                        expected = %expected,
                        "skipping frame during handshake"
                    );
                }
                Err(err) => {
                    tracing::debug!(error = %err, "skipping undecodable frame during handshake");
                }
            },
            Err(FrameError::Io(err))
                if err.kind() == ErrorKind::WouldBlock || err.kind() == ErrorKind::TimedOut =>
            {
                continue;
            }
            Err(FrameError::ConnectionClosed) => {
                return Err(ChannelError::HandshakeFailed(
                    "connection closed during handshake".to_string(),
                ));
            }
            Err(err) if err.is_recoverable() => continue,
            Err(err) => return Err(ChannelError::Frame(err)),
        }
    }
}
