use std::io::{ErrorKind, Read};

use bytes::{Bytes, BytesMut};

use crate::cobs::DELIMITER;
use crate::codec::DEFAULT_MAX_FRAME;
use crate::error::{FrameError, Result};

const INITIAL_BUFFER_CAPACITY: usize = 2 * 1024;
const READ_CHUNK_SIZE: usize = 512;

/// Splits a byte stream into delimiter-terminated frames.
///
/// Handles partial reads internally: callers always get one complete,
/// still-stuffed frame body (delimiter stripped) and decode it with
/// [`FrameCodec::decode`](crate::codec::FrameCodec::decode). Empty frames
/// produced by back-to-back delimiters are skipped.
pub struct FrameReader<T> {
    inner: T,
    buf: BytesMut,
    max_frame_size: usize,
    discarding: bool,
}

impl<T: Read> FrameReader<T> {
    /// Create a new frame reader with the default frame size limit.
    pub fn new(inner: T) -> Self {
        Self::with_max_frame_size(inner, DEFAULT_MAX_FRAME)
    }

    /// Create a new frame reader with an explicit frame size limit.
    pub fn with_max_frame_size(inner: T, max_frame_size: usize) -> Self {
        Self {
            inner,
            buf: BytesMut::with_capacity(INITIAL_BUFFER_CAPACITY),
            max_frame_size,
            discarding: false,
        }
    }

    /// Read the next complete frame body (blocking).
    ///
    /// Returns `Err(FrameError::FrameTooLarge)` once when the limit is
    /// exceeded without a delimiter; the reader then drops bytes up to the
    /// next delimiter and the following call resumes with the next frame.
    /// Returns `Err(FrameError::ConnectionClosed)` at EOF.
    pub fn read_frame(&mut self) -> Result<Bytes> {
        loop {
            if let Some(frame) = self.next_buffered()? {
                return Ok(frame);
            }

            let mut chunk = [0u8; READ_CHUNK_SIZE];
            let read = match self.inner.read(&mut chunk) {
                Ok(n) => n,
                Err(err) if err.kind() == ErrorKind::Interrupted => continue,
                Err(err) => return Err(FrameError::Io(err)),
            };

            if read == 0 {
                return Err(FrameError::ConnectionClosed);
            }

            self.buf.extend_from_slice(&chunk[..read]);
        }
    }

    fn next_buffered(&mut self) -> Result<Option<Bytes>> {
        while let Some(pos) = self.buf.iter().position(|byte| *byte == DELIMITER) {
            let mut frame = self.buf.split_to(pos + 1);
            frame.truncate(pos);

            if self.discarding {
                tracing::debug!(dropped = pos, "resynchronized at delimiter");
                self.discarding = false;
                continue;
            }
            if frame.is_empty() {
                continue;
            }
            return Ok(Some(frame.freeze()));
        }

        if self.buf.len() > self.max_frame_size {
            self.buf.clear();
            if !self.discarding {
                self.discarding = true;
                return Err(FrameError::FrameTooLarge {
                    max: self.max_frame_size,
                });
            }
        }

        Ok(None)
    }

    /// Borrow the underlying stream.
    pub fn get_ref(&self) -> &T {
        &self.inner
    }

    /// Mutably borrow the underlying stream.
    pub fn get_mut(&mut self) -> &mut T {
        &mut self.inner
    }

    /// Consume the reader and return the inner stream.
    pub fn into_inner(self) -> T {
        self.inner
    }

    /// Update the frame size limit for subsequent reads.
    pub fn set_max_frame_size(&mut self, max_frame_size: usize) {
        self.max_frame_size = max_frame_size;
    }

    pub fn max_frame_size(&self) -> usize {
        self.max_frame_size
    }
}
