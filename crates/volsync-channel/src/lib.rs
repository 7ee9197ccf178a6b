//! Connection lifecycle for a volsync control surface link.
//!
//! A [`Channel`] owns a single link and keeps it healthy:
//! discovery, handshake, periodic heartbeats, a liveness watchdog and
//! resynchronization after corrupt frames. State changes, discovered
//! devices, decoded messages and failures are published as
//! [`ChannelEvent`]s.

pub mod channel;
pub mod error;
pub mod events;
pub mod handshake;
pub mod state;
pub mod timer;

pub use channel::{Channel, ChannelConfig};
pub use error::{ChannelError, DisconnectReason, Result};
pub use events::{ChannelEvent, ChannelHandler, SubscriptionId};
pub use handshake::{handshake_device, handshake_host};
pub use state::ConnectionState;
pub use timer::RepeatingTimer;
