use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Weak};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use crossbeam_channel::Receiver;
use parking_lot::Mutex;
use volsync_frame::{
    FrameCodec, FrameError, FrameReader, FrameWriter, Message, DEFAULT_MAX_FRAME,
};
use volsync_transport::{Discovery, Endpoint, LinkStream};

use crate::error::{ChannelError, DisconnectReason, Result};
use crate::events::{ChannelEvent, ChannelHandler, Handlers, SubscriptionId};
use crate::handshake::handshake_host;
use crate::state::ConnectionState;
use crate::timer::RepeatingTimer;

/// Timing and sizing knobs for a [`Channel`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChannelConfig {
    /// How long to wait for `Acknowledgment` after `HandshakeRequest`.
    pub handshake_timeout: Duration,
    /// Interval between outbound heartbeats.
    pub heartbeat_interval: Duration,
    /// Maximum silence from the device before the link is declared dead.
    pub liveness_timeout: Duration,
    /// Pause between a failure and the next discovery attempt.
    pub reconnect_delay: Duration,
    /// Largest stuffed frame accepted from the device.
    pub max_frame_size: usize,
}

impl Default for ChannelConfig {
    fn default() -> Self {
        Self {
            handshake_timeout: Duration::from_secs(2),
            heartbeat_interval: Duration::from_secs(1),
            liveness_timeout: Duration::from_secs(5),
            reconnect_delay: Duration::from_secs(2),
            max_frame_size: DEFAULT_MAX_FRAME,
        }
    }
}

impl ChannelConfig {
    pub fn with_handshake_timeout(mut self, timeout: Duration) -> Self {
        self.handshake_timeout = timeout;
        self
    }

    pub fn with_heartbeat_interval(mut self, interval: Duration) -> Self {
        self.heartbeat_interval = interval;
        self
    }

    pub fn with_liveness_timeout(mut self, timeout: Duration) -> Self {
        self.liveness_timeout = timeout;
        self
    }

    pub fn with_reconnect_delay(mut self, delay: Duration) -> Self {
        self.reconnect_delay = delay;
        self
    }

    pub fn with_max_frame_size(mut self, max_frame_size: usize) -> Self {
        self.max_frame_size = max_frame_size;
        self
    }
}

/// A self-healing link to one control surface.
///
/// After [`start`](Channel::start) a worker thread repeatedly discovers an
/// endpoint, performs the handshake and then pumps inbound frames until the
/// link fails, publishing [`ChannelEvent`]s along the way. Outbound
/// [`send`](Channel::send) calls may come from any thread; frames are never
/// interleaved.
///
/// Handlers run on the worker thread. A handler that blocks stalls inbound
/// processing.
pub struct Channel {
    shared: Arc<Shared>,
    worker: Mutex<Option<JoinHandle<()>>>,
}

struct Shared {
    discovery: Box<dyn Discovery>,
    codec: FrameCodec,
    config: ChannelConfig,
    state: Mutex<ConnectionState>,
    writer: Mutex<Option<FrameWriter<LinkStream>>>,
    link: Mutex<Option<LinkStream>>,
    fault: Mutex<Option<DisconnectReason>>,
    last_inbound: Mutex<Instant>,
    running: AtomicBool,
    wake: Mutex<Option<crossbeam_channel::Sender<()>>>,
    handlers: Handlers,
}

impl Channel {
    pub fn new(
        discovery: impl Discovery + 'static,
        codec: FrameCodec,
        config: ChannelConfig,
    ) -> Self {
        Self {
            shared: Arc::new(Shared {
                discovery: Box::new(discovery),
                codec,
                config,
                state: Mutex::new(ConnectionState::Disconnected),
                writer: Mutex::new(None),
                link: Mutex::new(None),
                fault: Mutex::new(None),
                last_inbound: Mutex::new(Instant::now()),
                running: AtomicBool::new(false),
                wake: Mutex::new(None),
                handlers: Handlers::default(),
            }),
            worker: Mutex::new(None),
        }
    }

    /// Spawn the connection worker.
    pub fn start(&self) -> Result<()> {
        let mut worker = self.worker.lock();
        if worker.is_some() {
            return Err(ChannelError::AlreadyRunning);
        }

        let (wake_tx, wake_rx) = crossbeam_channel::bounded(0);
        *self.shared.wake.lock() = Some(wake_tx);
        self.shared.running.store(true, Ordering::SeqCst);

        let shared = Arc::clone(&self.shared);
        let spawned = thread::Builder::new()
            .name("volsync-channel".to_string())
            .spawn(move || shared.run(wake_rx));

        match spawned {
            Ok(handle) => {
                *worker = Some(handle);
                Ok(())
            }
            Err(err) => {
                self.shared.running.store(false, Ordering::SeqCst);
                self.shared.wake.lock().take();
                Err(ChannelError::Spawn(err))
            }
        }
    }

    /// Stop the worker and close the link.
    ///
    /// Blocked reads are interrupted by shutting the link down, so this
    /// returns promptly. No `Error` event is raised for a requested stop.
    pub fn stop(&self) {
        self.shared.running.store(false, Ordering::SeqCst);
        self.shared.wake.lock().take();
        self.shared.shutdown_link();

        let handle = self.worker.lock().take();
        if let Some(handle) = handle {
            if handle.thread().id() != thread::current().id() {
                let _ = handle.join();
            }
        }
        self.shared.set_state(ConnectionState::Disconnected);
    }

    /// Encode and write one message.
    ///
    /// Returns [`ChannelError::NotConnected`] unless the handshake has
    /// completed. A write failure takes the link down.
    pub fn send(&self, message: &Message) -> Result<()> {
        self.shared.write(message)
    }

    pub fn state(&self) -> ConnectionState {
        *self.shared.state.lock()
    }

    pub fn is_connected(&self) -> bool {
        self.state().is_connected()
    }

    pub fn config(&self) -> &ChannelConfig {
        &self.shared.config
    }

    pub fn codec(&self) -> &FrameCodec {
        &self.shared.codec
    }

    pub fn subscribe<F>(&self, handler: F) -> SubscriptionId
    where
        F: Fn(&ChannelEvent) + Send + Sync + 'static,
    {
        let handler: ChannelHandler = Arc::new(handler);
        self.shared.handlers.subscribe(handler)
    }

    pub fn unsubscribe(&self, id: SubscriptionId) -> bool {
        self.shared.handlers.unsubscribe(id)
    }
}

impl Drop for Channel {
    fn drop(&mut self) {
        self.stop();
    }
}

impl Shared {
    fn running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    fn run(self: Arc<Self>, wake: Receiver<()>) {
        while self.running() {
            self.set_state(ConnectionState::Discovering);

            let reason = match self.connect() {
                Ok((endpoint, reader)) => {
                    self.set_state(ConnectionState::Connected);
                    tracing::info!(%endpoint, "control surface connected");
                    self.handlers
                        .emit(&ChannelEvent::DeviceDiscovered(endpoint));
                    self.pump(reader)
                }
                Err(reason) => reason,
            };

            self.teardown();
            self.set_state(ConnectionState::Disconnected);
            if !self.running() {
                break;
            }

            tracing::warn!(reason = %reason, retry_in = ?self.config.reconnect_delay, "link down");
            self.handlers.emit(&ChannelEvent::Error(reason));

            // Returns early when stop() drops the sender.
            let _ = wake.recv_timeout(self.config.reconnect_delay);
        }
        tracing::debug!("channel worker exiting");
    }

    fn connect(
        &self,
    ) -> std::result::Result<(Endpoint, FrameReader<LinkStream>), DisconnectReason> {
        let candidates = self.discovery.candidates();
        if candidates.is_empty() {
            return Err(DisconnectReason::TransportUnavailable);
        }

        let mut last = DisconnectReason::TransportUnavailable;
        for endpoint in candidates {
            if !self.running() {
                break;
            }
            match self.try_endpoint(&endpoint) {
                Ok(reader) => return Ok((endpoint, reader)),
                Err(err) => {
                    tracing::debug!(%endpoint, error = %err, "endpoint rejected");
                    self.teardown();
                    last = DisconnectReason::from(&err);
                }
            }
        }
        Err(last)
    }

    fn try_endpoint(&self, endpoint: &Endpoint) -> Result<FrameReader<LinkStream>> {
        let stream = self.discovery.open(endpoint)?;
        let read_half = stream.try_clone()?;
        *self.link.lock() = Some(stream.try_clone()?);
        if !self.running() {
            return Err(ChannelError::Stopped);
        }

        self.set_state(ConnectionState::Handshaking);
        read_half.set_read_timeout(Some(self.config.handshake_timeout))?;
        stream.set_write_timeout(Some(self.config.handshake_timeout))?;

        let mut reader = FrameReader::with_max_frame_size(read_half, self.config.max_frame_size);
        let mut writer = FrameWriter::with_codec(stream, self.codec.clone());
        handshake_host(
            &mut reader,
            &mut writer,
            &self.codec,
            self.config.handshake_timeout,
        )?;

        reader.get_ref().set_read_timeout(None)?;
        writer
            .get_ref()
            .set_write_timeout(Some(self.config.liveness_timeout))?;

        *self.last_inbound.lock() = Instant::now();
        self.fault.lock().take();
        *self.writer.lock() = Some(writer);
        Ok(reader)
    }

    /// Read frames until the link fails. Returns why it failed.
    fn pump(self: &Arc<Self>, mut reader: FrameReader<LinkStream>) -> DisconnectReason {
        let heartbeat = match self.start_heartbeat() {
            Ok(timer) => timer,
            Err(err) => return DisconnectReason::Io(err.to_string()),
        };

        let reason = loop {
            match reader.read_frame() {
                Ok(frame) => {
                    *self.last_inbound.lock() = Instant::now();
                    match self.codec.decode(&frame) {
                        Ok(message) => {
                            tracing::trace!(kind = %message.kind(), "frame received");
                            self.handlers.emit(&ChannelEvent::MessageReceived(message));
                        }
                        Err(err) => {
                            tracing::warn!(
                                error = %err,
                                len = frame.len(),
                                "dropping undecodable frame, resynchronizing"
                            );
                        }
                    }
                }
                Err(err) if err.is_recoverable() => {
                    tracing::warn!(error = %err, "dropping oversized frame, resynchronizing");
                }
                Err(FrameError::ConnectionClosed) => {
                    break self.take_fault().unwrap_or(DisconnectReason::ConnectionClosed);
                }
                Err(err) => {
                    break self
                        .take_fault()
                        .unwrap_or_else(|| DisconnectReason::Io(err.to_string()));
                }
            }
        };

        drop(heartbeat);
        reason
    }

    fn start_heartbeat(self: &Arc<Self>) -> Result<RepeatingTimer> {
        let weak: Weak<Self> = Arc::downgrade(self);
        RepeatingTimer::start(
            "volsync-heartbeat",
            self.config.heartbeat_interval,
            move || match weak.upgrade() {
                Some(shared) => shared.heartbeat_tick(),
                None => false,
            },
        )
    }

    fn heartbeat_tick(&self) -> bool {
        let silence = self.last_inbound.lock().elapsed();
        if silence > self.config.liveness_timeout {
            tracing::warn!(silence = ?silence, "control surface went silent");
            self.fail(DisconnectReason::LivenessTimeout(self.config.liveness_timeout));
            return false;
        }
        self.write(&Message::Heartbeat).is_ok()
    }

    fn write(&self, message: &Message) -> Result<()> {
        let outcome = {
            let mut guard = self.writer.lock();
            let writer = guard.as_mut().ok_or(ChannelError::NotConnected)?;
            writer.send(message)
        };

        match outcome {
            Ok(()) => Ok(()),
            Err(err @ FrameError::UnregisteredKind(_)) => Err(err.into()),
            Err(err) => {
                tracing::warn!(kind = %message.kind(), error = %err, "send failed");
                self.fail(DisconnectReason::Io(err.to_string()));
                Err(err.into())
            }
        }
    }

    /// Record the first fault and force the reader to return.
    fn fail(&self, reason: DisconnectReason) {
        {
            let mut fault = self.fault.lock();
            if fault.is_none() {
                *fault = Some(reason);
            }
        }
        self.shutdown_link();
    }

    fn take_fault(&self) -> Option<DisconnectReason> {
        self.fault.lock().take()
    }

    fn shutdown_link(&self) {
        if let Some(link) = self.link.lock().as_ref() {
            if let Err(err) = link.shutdown() {
                tracing::debug!(error = %err, "link shutdown failed");
            }
        }
    }

    fn teardown(&self) {
        self.writer.lock().take();
        if let Some(link) = self.link.lock().take() {
            let _ = link.shutdown();
        }
    }

    fn set_state(&self, next: ConnectionState) {
        let changed = {
            let mut state = self.state.lock();
            if *state == next {
                false
            } else {
                *state = next;
                true
            }
        };
        if changed {
            tracing::debug!(state = %next, "connection state changed");
            self.handlers.emit(&ChannelEvent::StateChanged(next));
        }
    }
}
