use std::fmt;
use std::io;

use volsync_audio::AudioError;
use volsync_channel::ChannelError;
use volsync_frame::FrameError;
use volsync_sync::{ConfigError, SettingsError, SyncError};
use volsync_transport::TransportError;

pub const SUCCESS: i32 = 0;
pub const FAILURE: i32 = 1;
pub const TRANSPORT_ERROR: i32 = 3;
pub const CONFIG_INVALID: i32 = 4;
pub const PERMISSION_DENIED: i32 = 50;
pub const DATA_INVALID: i32 = 60;
pub const USAGE: i32 = 64;
pub const TIMEOUT: i32 = 124;
pub const INTERNAL: i32 = 125;

pub type CliResult<T> = Result<T, CliError>;

#[derive(Debug)]
pub struct CliError {
    pub code: i32,
    pub message: String,
}

impl CliError {
    pub fn new(code: i32, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
        }
    }
}

impl fmt::Display for CliError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl std::error::Error for CliError {}

pub fn io_error(context: &str, err: io::Error) -> CliError {
    let code = match err.kind() {
        io::ErrorKind::PermissionDenied => PERMISSION_DENIED,
        io::ErrorKind::TimedOut | io::ErrorKind::WouldBlock => TIMEOUT,
        io::ErrorKind::ConnectionRefused | io::ErrorKind::NotFound => TRANSPORT_ERROR,
        _ => INTERNAL,
    };
    CliError::new(code, format!("{context}: {err}"))
}

pub fn transport_error(context: &str, err: TransportError) -> CliError {
    match err {
        TransportError::Bind { source, .. }
        | TransportError::Connect { source, .. }
        | TransportError::Accept(source)
        | TransportError::Io(source) => io_error(context, source),
        TransportError::PathTooLong { .. } => CliError::new(USAGE, format!("{context}: {err}")),
        other => CliError::new(TRANSPORT_ERROR, format!("{context}: {other}")),
    }
}

pub fn frame_error(context: &str, err: FrameError) -> CliError {
    match err {
        FrameError::Io(source) => io_error(context, source),
        FrameError::ConnectionClosed => CliError::new(FAILURE, format!("{context}: {err}")),
        err if err.is_recoverable() => CliError::new(DATA_INVALID, format!("{context}: {err}")),
        other => CliError::new(INTERNAL, format!("{context}: {other}")),
    }
}

pub fn channel_error(context: &str, err: ChannelError) -> CliError {
    match err {
        ChannelError::Transport(err) => transport_error(context, err),
        ChannelError::Frame(err) => frame_error(context, err),
        ChannelError::HandshakeTimeout(_) => CliError::new(TIMEOUT, format!("{context}: {err}")),
        ChannelError::HandshakeFailed(_) | ChannelError::NotConnected => {
            CliError::new(TRANSPORT_ERROR, format!("{context}: {err}"))
        }
        ChannelError::Stopped => CliError::new(FAILURE, format!("{context}: {err}")),
        other => CliError::new(INTERNAL, format!("{context}: {other}")),
    }
}

pub fn config_error(context: &str, err: ConfigError) -> CliError {
    match err {
        ConfigError::Read { source, .. } if source.kind() == io::ErrorKind::PermissionDenied => {
            CliError::new(PERMISSION_DENIED, format!("{context}: {source}"))
        }
        other => CliError::new(CONFIG_INVALID, format!("{context}: {other}")),
    }
}

pub fn audio_error(context: &str, err: AudioError) -> CliError {
    match err {
        AudioError::DeviceNotFound { .. } => {
            CliError::new(DATA_INVALID, format!("{context}: {err}"))
        }
        other => CliError::new(FAILURE, format!("{context}: {other}")),
    }
}

pub fn sync_error(context: &str, err: SyncError) -> CliError {
    match err {
        SyncError::Channel(err) => channel_error(context, err),
        SyncError::Audio(err) => audio_error(context, err),
        SyncError::Config(err) => config_error(context, err),
        SyncError::Settings(SettingsError::Json(err)) => {
            CliError::new(DATA_INVALID, format!("{context}: {err}"))
        }
        SyncError::Settings(other) => CliError::new(FAILURE, format!("{context}: {other}")),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn handshake_timeout_maps_to_timeout_code() {
        let err = channel_error(
            "connect",
            ChannelError::HandshakeTimeout(Duration::from_secs(2)),
        );
        assert_eq!(err.code, TIMEOUT);
        assert!(err.message.starts_with("connect: "));
    }

    #[test]
    fn refused_connection_is_transport_error() {
        let err = channel_error(
            "open",
            ChannelError::Transport(TransportError::Connect {
                path: "/tmp/missing.sock".into(),
                source: io::Error::from(io::ErrorKind::ConnectionRefused),
            }),
        );
        assert_eq!(err.code, TRANSPORT_ERROR);
    }

    #[test]
    fn corrupt_frame_is_data_invalid() {
        let err = frame_error("decode", FrameError::UnknownMessageKind(42));
        assert_eq!(err.code, DATA_INVALID);
    }

    #[test]
    fn invalid_config_value_has_dedicated_code() {
        let err = config_error(
            "load",
            ConfigError::Invalid {
                field: "max_frame_size",
                reason: "too small".to_string(),
            },
        );
        assert_eq!(err.code, CONFIG_INVALID);
    }
}
