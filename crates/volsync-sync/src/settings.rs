use std::fs;
use std::path::{Path, PathBuf};

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use volsync_frame::{Rgb, Settings};

use crate::error::SettingsError;

/// User preferences mirrored to the control surface.
///
/// Colors are stored as `[r, g, b]`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DeviceSettings {
    pub display_new_session: bool,
    pub sleep_when_inactive: bool,
    pub sleep_after_seconds: i32,
    pub loop_around_items: bool,
    pub acceleration_percentage: i32,
    pub double_tap_time_ms: i32,
    pub volume_min_color: [u8; 3],
    pub volume_max_color: [u8; 3],
    pub mix_channel_a_color: [u8; 3],
    pub mix_channel_b_color: [u8; 3],
}

impl Default for DeviceSettings {
    fn default() -> Self {
        Self {
            display_new_session: true,
            sleep_when_inactive: true,
            sleep_after_seconds: 5,
            loop_around_items: false,
            acceleration_percentage: 60,
            double_tap_time_ms: 400,
            volume_min_color: [0, 0, 255],
            volume_max_color: [255, 0, 0],
            mix_channel_a_color: [0, 255, 0],
            mix_channel_b_color: [255, 255, 0],
        }
    }
}

fn rgb([r, g, b]: [u8; 3]) -> Rgb {
    Rgb::new(r, g, b)
}

impl From<DeviceSettings> for Settings {
    fn from(value: DeviceSettings) -> Self {
        Settings {
            display_new_session: value.display_new_session,
            sleep_when_inactive: value.sleep_when_inactive,
            sleep_after_seconds: value.sleep_after_seconds,
            loop_around_items: value.loop_around_items,
            acceleration_percentage: value.acceleration_percentage,
            double_tap_time_ms: value.double_tap_time_ms,
            volume_min_color: rgb(value.volume_min_color),
            volume_max_color: rgb(value.volume_max_color),
            mix_channel_a_color: rgb(value.mix_channel_a_color),
            mix_channel_b_color: rgb(value.mix_channel_b_color),
        }
    }
}

/// Where [`DeviceSettings`] live between runs.
pub trait SettingsStore: Send + Sync {
    fn load(&self) -> Result<DeviceSettings, SettingsError>;

    fn save(&self, settings: &DeviceSettings) -> Result<(), SettingsError>;
}

/// Settings persisted as a pretty-printed JSON file.
///
/// A missing file loads as the defaults.
#[derive(Debug, Clone)]
pub struct JsonSettingsStore {
    path: PathBuf,
}

impl JsonSettingsStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl SettingsStore for JsonSettingsStore {
    fn load(&self) -> Result<DeviceSettings, SettingsError> {
        let raw = match fs::read_to_string(&self.path) {
            Ok(raw) => raw,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
                tracing::debug!(
                    path = %self.path.display(),
                    "settings file missing, using defaults"
                );
                return Ok(DeviceSettings::default());
            }
            Err(source) => {
                return Err(SettingsError::Read {
                    path: self.path.clone(),
                    source,
                })
            }
        };
        Ok(serde_json::from_str(&raw)?)
    }

    fn save(&self, settings: &DeviceSettings) -> Result<(), SettingsError> {
        let json = serde_json::to_string_pretty(settings)?;
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent).map_err(|source| SettingsError::Write {
                path: parent.to_path_buf(),
                source,
            })?;
        }
        fs::write(&self.path, json).map_err(|source| SettingsError::Write {
            path: self.path.clone(),
            source,
        })
    }
}

/// Settings held only for the life of the process.
#[derive(Debug, Default)]
pub struct MemorySettingsStore {
    settings: Mutex<DeviceSettings>,
}

impl MemorySettingsStore {
    pub fn new(settings: DeviceSettings) -> Self {
        Self {
            settings: Mutex::new(settings),
        }
    }
}

impl SettingsStore for MemorySettingsStore {
    fn load(&self) -> Result<DeviceSettings, SettingsError> {
        Ok(*self.settings.lock())
    }

    fn save(&self, settings: &DeviceSettings) -> Result<(), SettingsError> {
        *self.settings.lock() = *settings;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn temp_path(name: &str) -> PathBuf {
        std::env::temp_dir()
            .join(format!("volsync-settings-{}", std::process::id()))
            .join(name)
    }

    #[test]
    fn missing_file_loads_defaults() {
        let store = JsonSettingsStore::new(temp_path("missing.json"));
        assert_eq!(store.load().unwrap(), DeviceSettings::default());
    }

    #[test]
    fn saved_settings_load_back() {
        let path = temp_path("saved.json");
        let store = JsonSettingsStore::new(&path);
        let settings = DeviceSettings {
            sleep_after_seconds: 30,
            volume_max_color: [1, 2, 3],
            ..DeviceSettings::default()
        };

        store.save(&settings).unwrap();
        assert_eq!(store.load().unwrap(), settings);
        let _ = fs::remove_file(path);
    }

    #[test]
    fn partial_file_fills_in_defaults() {
        let path = temp_path("partial.json");
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(&path, r#"{ "loop_around_items": true }"#).unwrap();

        let loaded = JsonSettingsStore::new(&path).load().unwrap();
        assert!(loaded.loop_around_items);
        assert_eq!(loaded.double_tap_time_ms, DeviceSettings::default().double_tap_time_ms);
        let _ = fs::remove_file(path);
    }

    #[test]
    fn malformed_file_is_an_error() {
        let path = temp_path("broken.json");
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(&path, "{ nope").unwrap();

        let err = JsonSettingsStore::new(&path).load().unwrap_err();
        assert!(matches!(err, SettingsError::Json(_)));
        let _ = fs::remove_file(path);
    }

    #[test]
    fn converts_to_wire_settings() {
        let settings: Settings = DeviceSettings::default().into();
        assert_eq!(settings.volume_min_color, Rgb::new(0, 0, 255));
        assert_eq!(settings.double_tap_time_ms, 400);
    }

    #[test]
    fn memory_store_keeps_last_save() {
        let store = MemorySettingsStore::default();
        let settings = DeviceSettings {
            acceleration_percentage: 10,
            ..DeviceSettings::default()
        };
        store.save(&settings).unwrap();
        assert_eq!(store.load().unwrap(), settings);
    }
}
