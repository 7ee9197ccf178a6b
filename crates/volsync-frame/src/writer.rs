use std::io::{ErrorKind, Write};

use bytes::BytesMut;

use crate::codec::FrameCodec;
use crate::error::{FrameError, Result};
use crate::message::Message;

const INITIAL_BUFFER_CAPACITY: usize = 512;

/// Encodes messages and writes complete frames to any `Write` stream.
///
/// Each call writes one whole frame and flushes, so a writer shared behind a
/// lock never interleaves frames.
pub struct FrameWriter<T> {
    inner: T,
    codec: FrameCodec,
    buf: BytesMut,
}

impl<T: Write> FrameWriter<T> {
    /// Create a writer using the standard discriminant table.
    pub fn new(inner: T) -> Self {
        Self::with_codec(inner, FrameCodec::standard())
    }

    /// Create a writer with an explicit codec.
    pub fn with_codec(inner: T, codec: FrameCodec) -> Self {
        Self {
            inner,
            codec,
            buf: BytesMut::with_capacity(INITIAL_BUFFER_CAPACITY),
        }
    }

    /// Encode and write one message (blocking).
    ///
    /// A write timeout on the stream surfaces as `FrameError::Io` with
    /// `WouldBlock` or `TimedOut`; the frame may then be partially written
    /// and the link should be dropped.
    pub fn send(&mut self, message: &Message) -> Result<()> {
        self.buf.clear();
        self.codec.encode_into(message, &mut self.buf)?;
        self.write_buffered()
    }

    /// Write bytes that are already framed.
    ///
    /// Used by tests and the simulator to inject arbitrary traffic.
    pub fn send_raw(&mut self, frame: &[u8]) -> Result<()> {
        self.buf.clear();
        self.buf.extend_from_slice(frame);
        self.write_buffered()
    }

    fn write_buffered(&mut self) -> Result<()> {
        let mut offset = 0usize;
        while offset < self.buf.len() {
            match self.inner.write(&self.buf[offset..]) {
                Ok(0) => return Err(FrameError::ConnectionClosed),
                Ok(n) => offset += n,
                Err(err) if err.kind() == ErrorKind::Interrupted => continue,
                Err(err) => return Err(FrameError::Io(err)),
            }
        }

        self.flush()
    }

    /// Flush the underlying stream.
    pub fn flush(&mut self) -> Result<()> {
        loop {
            match self.inner.flush() {
                Ok(()) => return Ok(()),
                Err(err) if err.kind() == ErrorKind::Interrupted => continue,
                Err(err) => return Err(FrameError::Io(err)),
            }
        }
    }

    /// Borrow the underlying stream.
    pub fn get_ref(&self) -> &T {
        &self.inner
    }

    /// Consume the writer and return the inner stream.
    pub fn into_inner(self) -> T {
        self.inner
    }
}

#[cfg(test)]
mod tests {
    use std::io::Cursor;
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::sync::Arc;

    use super::*;
    use crate::message::{MessageKind, RemoveItem};
    use crate::reader::FrameReader;
    use crate::registry::KindRegistry;

    #[test]
    fn written_frames_read_back() {
        let mut writer = FrameWriter::new(Cursor::new(Vec::<u8>::new()));
        let remove = Message::RemoveItem(RemoveItem {
            id: 12,
            is_device: false,
            device_flow: 0,
        });
        writer.send(&Message::Heartbeat).unwrap();
        writer.send(&remove).unwrap();

        let wire = writer.into_inner().into_inner();
        let codec = FrameCodec::standard();
        let mut reader = FrameReader::new(Cursor::new(wire));
        assert_eq!(
            codec.decode(&reader.read_frame().unwrap()).unwrap(),
            Message::Heartbeat
        );
        assert_eq!(codec.decode(&reader.read_frame().unwrap()).unwrap(), remove);
    }

    #[test]
    fn unregistered_kind_writes_nothing() {
        let mut registry = KindRegistry::new();
        registry.register(MessageKind::Heartbeat, 7).unwrap();
        let mut writer =
            FrameWriter::with_codec(Cursor::new(Vec::<u8>::new()), FrameCodec::new(registry));

        let err = writer.send(&Message::HandshakeRequest).unwrap_err();
        assert!(matches!(err, FrameError::UnregisteredKind(_)));
        assert!(writer.get_ref().get_ref().is_empty());
    }

    #[test]
    fn flush_propagates() {
        let sink = FlushTrackingWriter::default();
        let flag = Arc::clone(&sink.flushed);
        let mut writer = FrameWriter::new(sink);

        writer.send(&Message::Acknowledgment).unwrap();

        assert!(flag.load(Ordering::SeqCst));
    }

    #[test]
    fn handles_interrupted_write() {
        let mut writer = FrameWriter::new(InterruptedOnce {
            interrupted: false,
            data: Vec::new(),
        });
        writer.send(&Message::Heartbeat).unwrap();
        assert_eq!(writer.into_inner().data, vec![0x02, 0x07, 0x00]);
    }

    #[test]
    fn connection_closed_when_write_returns_zero() {
        let mut writer = FrameWriter::new(ZeroWriter);
        let err = writer.send(&Message::Heartbeat).unwrap_err();
        assert!(matches!(err, FrameError::ConnectionClosed));
    }

    #[test]
    fn write_timeout_is_an_error() {
        let mut writer = FrameWriter::new(BlockedWriter);
        let err = writer.send(&Message::Heartbeat).unwrap_err();
        assert!(matches!(err, FrameError::Io(ref io) if io.kind() == ErrorKind::WouldBlock));
    }

    #[test]
    fn send_raw_passes_bytes_through() {
        let mut writer = FrameWriter::new(Cursor::new(Vec::<u8>::new()));
        writer.send_raw(&[0xFF, 0x00]).unwrap();
        assert_eq!(writer.into_inner().into_inner(), vec![0xFF, 0x00]);
    }

    #[derive(Default)]
    struct FlushTrackingWriter {
        flushed: Arc<AtomicBool>,
        data: Vec<u8>,
    }

    impl Write for FlushTrackingWriter {
        fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
            self.data.extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> std::io::Result<()> {
            self.flushed.store(true, Ordering::SeqCst);
            Ok(())
        }
    }

    struct InterruptedOnce {
        interrupted: bool,
        data: Vec<u8>,
    }

    impl Write for InterruptedOnce {
        fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
            if !self.interrupted {
                self.interrupted = true;
                return Err(std::io::Error::from(ErrorKind::Interrupted));
            }
            self.data.extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> std::io::Result<()> {
            Ok(())
        }
    }

    struct BlockedWriter;

    impl Write for BlockedWriter {
        fn write(&mut self, _buf: &[u8]) -> std::io::Result<usize> {
            Err(std::io::Error::from(ErrorKind::WouldBlock))
        }

        fn flush(&mut self) -> std::io::Result<()> {
            Ok(())
        }
    }

    struct ZeroWriter;

    impl Write for ZeroWriter {
        fn write(&mut self, _buf: &[u8]) -> std::io::Result<usize> {
            Ok(0)
        }

        fn flush(&mut self) -> std::io::Result<()> {
            Ok(())
        }
    }
}
