//! Mirror host audio devices and application sessions to a hardware
//! control surface.
//!
//! The surface is reached over a byte-stream link, speaks COBS-framed
//! binary messages, and drives volume, mute and default-endpoint changes in
//! both directions.
//!
//! # Crate Structure
//!
//! - [`transport`]: link streams, Unix sockets and endpoint discovery
//! - [`frame`]: COBS framing and the typed wire messages
//! - [`channel`]: connection lifecycle, handshake and heartbeat (behind `sync`)
//! - [`audio`]: control points, groups and the audio provider boundary (behind `sync`)
//! - [`sync`]: the controller tying a channel to an audio provider (behind `sync`)

/// Re-export transport types.
pub mod transport {
    pub use volsync_transport::*;
}

/// Re-export frame types.
pub mod frame {
    pub use volsync_frame::*;
}

/// Re-export channel types (requires `sync` feature).
#[cfg(feature = "sync")]
pub mod channel {
    pub use volsync_channel::*;
}

/// Re-export audio types (requires `sync` feature).
#[cfg(feature = "sync")]
pub mod audio {
    pub use volsync_audio::*;
}

/// Re-export the sync engine (requires `sync` feature).
#[cfg(feature = "sync")]
pub mod sync {
    pub use volsync_sync::*;
}
