//! The volsync synchronization engine.
//!
//! [`SyncController`] ties a [`Channel`](volsync_channel::Channel) to an
//! [`AudioProvider`](volsync_audio::AudioProvider): host audio changes go
//! out as wire messages, and volume or default-endpoint changes made on the
//! control surface are applied to the host.

pub mod blacklist;
pub mod config;
pub mod controller;
pub mod error;
pub mod settings;

pub use blacklist::Blacklist;
pub use config::SyncConfig;
pub use controller::{group_id, SyncController, SyncOptions};
pub use error::{ConfigError, Result, SettingsError, SyncError};
pub use settings::{DeviceSettings, JsonSettingsStore, MemorySettingsStore, SettingsStore};
