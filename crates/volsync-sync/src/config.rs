use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use volsync_channel::ChannelConfig;
use volsync_frame::DEFAULT_MAX_FRAME;
use volsync_transport::SocketDiscovery;

use crate::controller::SyncOptions;
use crate::error::ConfigError;
use crate::settings::{JsonSettingsStore, MemorySettingsStore, SettingsStore};

/// On-disk configuration for `volsync run`.
///
/// Every field is optional in the JSON file; missing fields take the
/// defaults below.
///
/// ```json
/// {
///   "endpoints": ["/run/volsync/surface.sock"],
///   "scan_dir": "/tmp",
///   "blacklist": ["System Sounds"],
///   "heartbeat_interval_ms": 1000
/// }
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct SyncConfig {
    /// Socket paths tried first, in order.
    pub endpoints: Vec<PathBuf>,
    /// Directory scanned for sockets named with `prefix`.
    pub scan_dir: Option<PathBuf>,
    pub prefix: String,
    pub blacklist: Vec<String>,
    pub handshake_timeout_ms: u64,
    pub heartbeat_interval_ms: u64,
    pub liveness_timeout_ms: u64,
    pub reconnect_delay_ms: u64,
    pub max_frame_size: usize,
    /// JSON file holding the device settings. In-memory defaults when unset.
    pub settings_path: Option<PathBuf>,
}

impl Default for SyncConfig {
    fn default() -> Self {
        let channel = ChannelConfig::default();
        Self {
            endpoints: Vec::new(),
            scan_dir: None,
            prefix: SocketDiscovery::DEFAULT_PREFIX.to_string(),
            blacklist: Vec::new(),
            handshake_timeout_ms: millis(channel.handshake_timeout),
            heartbeat_interval_ms: millis(channel.heartbeat_interval),
            liveness_timeout_ms: millis(channel.liveness_timeout),
            reconnect_delay_ms: millis(channel.reconnect_delay),
            max_frame_size: DEFAULT_MAX_FRAME,
            settings_path: None,
        }
    }
}

fn millis(duration: Duration) -> u64 {
    u64::try_from(duration.as_millis()).unwrap_or(u64::MAX)
}

impl SyncConfig {
    /// Read and validate a JSON config file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let raw = fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        let config = Self::from_json(&raw)?;
        tracing::debug!(path = %path.display(), "loaded config");
        Ok(config)
    }

    pub fn from_json(raw: &str) -> Result<Self, ConfigError> {
        let config: Self = serde_json::from_str(raw)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        let durations = [
            ("handshake_timeout_ms", self.handshake_timeout_ms),
            ("heartbeat_interval_ms", self.heartbeat_interval_ms),
            ("liveness_timeout_ms", self.liveness_timeout_ms),
        ];
        for (field, value) in durations {
            if value == 0 {
                return Err(ConfigError::Invalid {
                    field,
                    reason: "must be greater than zero".to_string(),
                });
            }
        }
        if self.liveness_timeout_ms <= self.heartbeat_interval_ms {
            return Err(ConfigError::Invalid {
                field: "liveness_timeout_ms",
                reason: format!(
                    "must exceed heartbeat_interval_ms ({})",
                    self.heartbeat_interval_ms
                ),
            });
        }
        if self.max_frame_size < 16 {
            return Err(ConfigError::Invalid {
                field: "max_frame_size",
                reason: "must be at least 16 bytes".to_string(),
            });
        }
        if self.prefix.is_empty() && self.scan_dir.is_some() {
            return Err(ConfigError::Invalid {
                field: "prefix",
                reason: "must not be empty when scan_dir is set".to_string(),
            });
        }
        Ok(())
    }

    pub fn channel_config(&self) -> ChannelConfig {
        ChannelConfig::default()
            .with_handshake_timeout(Duration::from_millis(self.handshake_timeout_ms))
            .with_heartbeat_interval(Duration::from_millis(self.heartbeat_interval_ms))
            .with_liveness_timeout(Duration::from_millis(self.liveness_timeout_ms))
            .with_reconnect_delay(Duration::from_millis(self.reconnect_delay_ms))
            .with_max_frame_size(self.max_frame_size)
    }

    pub fn discovery(&self) -> SocketDiscovery {
        let mut discovery = SocketDiscovery::new();
        for endpoint in &self.endpoints {
            discovery = discovery.with_path(endpoint);
        }
        if let Some(dir) = &self.scan_dir {
            discovery = discovery.with_scan_dir(dir, self.prefix.clone());
        }
        discovery
    }

    pub fn options(&self) -> SyncOptions {
        SyncOptions::default().with_blacklist(self.blacklist.iter())
    }

    pub fn settings_store(&self) -> Arc<dyn SettingsStore> {
        match &self.settings_path {
            Some(path) => Arc::new(JsonSettingsStore::new(path)),
            None => Arc::new(MemorySettingsStore::default()),
        }
    }
}
