use std::io::ErrorKind;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use volsync_channel::{handshake_device, RepeatingTimer};
use volsync_frame::{FrameCodec, FrameError, FrameReader, FrameWriter, Message};
use volsync_transport::{LinkStream, TransportError, UnixDomainSocket};

use crate::cmd::{install_ctrlc_handler, parse_duration, SimulateArgs};
use crate::exit::{channel_error, frame_error, transport_error, CliResult, SUCCESS};
use crate::output::{print_message, OutputFormat};

/// Read timeout used to notice Ctrl-C between frames.
const POLL_INTERVAL: Duration = Duration::from_millis(250);

enum Outcome {
    CountReached,
    Disconnected,
    Interrupted,
}

struct Session<'a> {
    args: &'a SimulateArgs,
    codec: FrameCodec,
    heartbeat: Duration,
    handshake_timeout: Duration,
    running: Arc<AtomicBool>,
    format: OutputFormat,
    printed: usize,
}

pub fn run(args: SimulateArgs, format: OutputFormat) -> CliResult<i32> {
    let heartbeat = parse_duration(&args.heartbeat)?;
    let handshake_timeout = parse_duration(&args.handshake_timeout)?;
    let socket =
        UnixDomainSocket::bind(&args.path).map_err(|err| transport_error("bind failed", err))?;

    let running = Arc::new(AtomicBool::new(true));
    {
        let running = Arc::clone(&running);
        let wake = socket.path().to_path_buf();
        install_ctrlc_handler(move || {
            running.store(false, Ordering::SeqCst);
            // Unblock a pending accept.
            let _ = UnixDomainSocket::connect(&wake);
        })?;
    }

    let mut session = Session {
        args: &args,
        codec: FrameCodec::standard(),
        heartbeat,
        handshake_timeout,
        running: Arc::clone(&running),
        format,
        printed: 0,
    };

    while running.load(Ordering::SeqCst) {
        let link = socket
            .accept()
            .map_err(|err| transport_error("accept failed", err))?;
        if !running.load(Ordering::SeqCst) {
            break;
        }

        match session.serve(link) {
            Ok(Outcome::CountReached) => return Ok(SUCCESS),
            Ok(Outcome::Interrupted) => break,
            Ok(Outcome::Disconnected) => tracing::info!("host disconnected"),
            Err(err) => tracing::warn!(error = %err, "host session ended"),
        }
    }

    Ok(SUCCESS)
}

impl Session<'_> {
    fn serve(&mut self, link: LinkStream) -> CliResult<Outcome> {
        let configure = |err: TransportError| transport_error("link setup failed", err);
        link.set_read_timeout(Some(POLL_INTERVAL)).map_err(configure)?;
        link.set_write_timeout(Some(self.heartbeat)).map_err(configure)?;
        let mut reader = FrameReader::new(link.try_clone().map_err(configure)?);
        let mut writer = FrameWriter::new(link);

        handshake_device(&mut reader, &mut writer, &self.codec, self.handshake_timeout)
            .map_err(|err| channel_error("handshake failed", err))?;
        tracing::info!("host connected");

        let writer = Arc::new(Mutex::new(writer));
        let _heartbeat = {
            let writer = Arc::clone(&writer);
            RepeatingTimer::start("volsync-sim-heartbeat", self.heartbeat, move || {
                match writer.lock().send(&Message::Heartbeat) {
                    Ok(()) => true,
                    Err(err) => {
                        tracing::debug!(error = %err, "heartbeat send failed");
                        false
                    }
                }
            })
            .map_err(|err| channel_error("heartbeat timer failed", err))?
        };

        loop {
            if !self.running.load(Ordering::SeqCst) {
                return Ok(Outcome::Interrupted);
            }

            let frame = match reader.read_frame() {
                Ok(frame) => frame,
                Err(FrameError::Io(err))
                    if matches!(err.kind(), ErrorKind::WouldBlock | ErrorKind::TimedOut) =>
                {
                    continue;
                }
                Err(FrameError::ConnectionClosed) => return Ok(Outcome::Disconnected),
                Err(err) if err.is_recoverable() => {
                    tracing::warn!(error = %err, "resynchronizing");
                    continue;
                }
                Err(err) => return Err(frame_error("receive failed", err)),
            };

            let message = match self.codec.decode(&frame) {
                Ok(message) => message,
                Err(err) => {
                    tracing::warn!(error = %err, "dropping undecodable frame");
                    continue;
                }
            };

            match message {
                Message::Heartbeat if !self.args.show_heartbeats => {
                    tracing::trace!("heartbeat");
                    continue;
                }
                Message::HandshakeRequest => {
                    tracing::debug!("repeated handshake request");
                    writer
                        .lock()
                        .send(&Message::Acknowledgment)
                        .map_err(|err| frame_error("acknowledgment failed", err))?;
                }
                _ => {}
            }

            print_message(&message, &frame, self.format);
            self.printed = self.printed.saturating_add(1);
            if self.args.count.is_some_and(|count| self.printed >= count) {
                return Ok(Outcome::CountReached);
            }
        }
    }
}
