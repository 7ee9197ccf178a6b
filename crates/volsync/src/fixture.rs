//! JSON description of the host audio state replayed by `volsync run`.
//!
//! ```json
//! {
//!   "devices": [
//!     { "id": 1, "name": "Speakers", "flow": "render", "volume": 50, "default": true }
//!   ],
//!   "sessions": [
//!     { "id": 10, "name": "Browser", "volume": 30, "muted": false }
//!   ]
//! }
//! ```

use std::path::Path;

use serde::Deserialize;
use volsync_audio::{AudioProvider, DeviceFlow, InMemoryProvider, MAX_VOLUME};

use crate::exit::{audio_error, io_error, CliError, CliResult, DATA_INVALID};

#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Fixture {
    #[serde(default)]
    pub devices: Vec<FixtureDevice>,
    #[serde(default)]
    pub sessions: Vec<FixtureSession>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct FixtureDevice {
    pub id: i32,
    pub name: String,
    #[serde(default)]
    pub flow: FixtureFlow,
    #[serde(default = "default_volume")]
    pub volume: u8,
    #[serde(default)]
    pub muted: bool,
    /// Make this the default endpoint of its flow.
    #[serde(default)]
    pub default: bool,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct FixtureSession {
    pub id: i32,
    pub name: String,
    #[serde(default = "default_volume")]
    pub volume: u8,
    #[serde(default)]
    pub muted: bool,
}

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FixtureFlow {
    #[default]
    Render,
    Capture,
}

impl From<FixtureFlow> for DeviceFlow {
    fn from(value: FixtureFlow) -> Self {
        match value {
            FixtureFlow::Render => DeviceFlow::Render,
            FixtureFlow::Capture => DeviceFlow::Capture,
        }
    }
}

fn default_volume() -> u8 {
    MAX_VOLUME
}

impl Fixture {
    pub fn load(path: &Path) -> CliResult<Self> {
        let raw = std::fs::read_to_string(path)
            .map_err(|err| io_error(&format!("failed to read fixture {}", path.display()), err))?;
        Self::from_json(&raw)
    }

    pub fn from_json(raw: &str) -> CliResult<Self> {
        serde_json::from_str(raw)
            .map_err(|err| CliError::new(DATA_INVALID, format!("invalid fixture: {err}")))
    }

    /// Build a provider holding the fixture's devices and sessions.
    ///
    /// Nothing is announced until the provider is started.
    pub fn into_provider(self) -> CliResult<InMemoryProvider> {
        let provider = InMemoryProvider::new();

        for device in &self.devices {
            check_volume(&device.name, device.volume)?;
            provider.add_device(
                device.id,
                device.name.as_str(),
                device.flow.into(),
                device.volume,
                device.muted,
            );
        }
        for device in self.devices.iter().filter(|device| device.default) {
            provider
                .set_default_endpoint(device.id, device.flow.into())
                .map_err(|err| audio_error("fixture default endpoint", err))?;
        }
        for session in &self.sessions {
            check_volume(&session.name, session.volume)?;
            provider.add_session(session.id, session.name.as_str(), session.volume, session.muted);
        }

        tracing::debug!(
            devices = self.devices.len(),
            sessions = self.sessions.len(),
            "loaded fixture"
        );
        Ok(provider)
    }
}

fn check_volume(name: &str, volume: u8) -> CliResult<()> {
    if volume > MAX_VOLUME {
        return Err(CliError::new(
            DATA_INVALID,
            format!("fixture entry {name:?} has volume {volume}, max is {MAX_VOLUME}"),
        ));
    }
    Ok(())
}
