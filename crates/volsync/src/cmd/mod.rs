use clap::{Args, Subcommand};
use std::path::PathBuf;
use std::time::Duration;

use volsync_sync::SyncConfig;

use crate::exit::{config_error, CliError, CliResult, INTERNAL, USAGE};
use crate::output::OutputFormat;

pub mod encode;
pub mod probe;
pub mod run;
pub mod simulate;
pub mod version;

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Connect to a control surface and keep it in sync with host audio.
    Run(RunArgs),
    /// Act as a control surface on a socket and print what the host sends.
    Simulate(SimulateArgs),
    /// List candidate control surface endpoints.
    Probe(ProbeArgs),
    /// Encode one message as a wire frame.
    Encode(EncodeArgs),
    /// Show version information.
    Version(VersionArgs),
}

pub fn run(command: Command, format: OutputFormat) -> CliResult<i32> {
    match command {
        Command::Run(args) => run::run(args, format),
        Command::Simulate(args) => simulate::run(args, format),
        Command::Probe(args) => probe::run(args, format),
        Command::Encode(args) => encode::run(args, format),
        Command::Version(args) => version::run(args),
    }
}

/// Where to look for the control surface. Flags override the config file.
#[derive(Args, Debug, Default)]
pub struct DiscoveryArgs {
    /// JSON config file.
    #[arg(long, short = 'c', value_name = "FILE")]
    pub config: Option<PathBuf>,
    /// Socket path to try (repeatable; tried before scanned sockets).
    #[arg(long, value_name = "PATH")]
    pub endpoint: Vec<PathBuf>,
    /// Directory to scan for surface sockets.
    #[arg(long, value_name = "DIR")]
    pub scan_dir: Option<PathBuf>,
    /// File name prefix of scanned sockets.
    #[arg(long, value_name = "PREFIX")]
    pub prefix: Option<String>,
}

impl DiscoveryArgs {
    pub fn load_config(&self) -> CliResult<SyncConfig> {
        let mut config = match &self.config {
            Some(path) => {
                SyncConfig::load(path).map_err(|err| config_error("config load failed", err))?
            }
            None => SyncConfig::default(),
        };

        // Explicit endpoints go first, ahead of the file's.
        if !self.endpoint.is_empty() {
            let mut endpoints = self.endpoint.clone();
            endpoints.extend(config.endpoints.drain(..));
            config.endpoints = endpoints;
        }
        if let Some(dir) = &self.scan_dir {
            config.scan_dir = Some(dir.clone());
        }
        if let Some(prefix) = &self.prefix {
            config.prefix = prefix.clone();
        }
        Ok(config)
    }
}

#[derive(Args, Debug)]
pub struct RunArgs {
    #[command(flatten)]
    pub discovery: DiscoveryArgs,
    /// Display names never sent to the surface (comma-separated, case-insensitive).
    #[arg(long, value_delimiter = ',')]
    pub blacklist: Vec<String>,
    /// JSON file holding device settings.
    #[arg(long, value_name = "FILE")]
    pub settings: Option<PathBuf>,
    /// JSON fixture describing the devices and sessions to mirror.
    #[arg(long, value_name = "FILE")]
    pub fixture: Option<PathBuf>,
    /// Print connection events to stdout.
    #[arg(long)]
    pub events: bool,
}

#[derive(Args, Debug)]
pub struct SimulateArgs {
    /// Socket path to bind.
    pub path: PathBuf,
    /// Heartbeat interval (e.g. 1s, 250ms).
    #[arg(long, default_value = "1s")]
    pub heartbeat: String,
    /// How long to wait for the host's handshake request.
    #[arg(long, default_value = "10s")]
    pub handshake_timeout: String,
    /// Exit after printing N messages.
    #[arg(long)]
    pub count: Option<usize>,
    /// Print heartbeats as well.
    #[arg(long)]
    pub show_heartbeats: bool,
}

#[derive(Args, Debug)]
pub struct ProbeArgs {
    #[command(flatten)]
    pub discovery: DiscoveryArgs,
    /// Attempt a handshake with each candidate.
    #[arg(long)]
    pub handshake: bool,
    /// Handshake timeout (e.g. 2s, 500ms).
    #[arg(long, default_value = "2s")]
    pub timeout: String,
}

#[derive(Args, Debug)]
pub struct EncodeArgs {
    /// Message as JSON, tagged by `kind`, e.g.
    /// '{"kind":"UpdateVolume","id":7,"volume":45}'.
    pub message: String,
}

#[derive(Args, Debug)]
pub struct VersionArgs {
    /// Show extended build provenance.
    #[arg(long)]
    pub extended: bool,
}

pub fn parse_duration(input: &str) -> CliResult<Duration> {
    let input = input.trim();
    if input.is_empty() {
        return Err(CliError::new(USAGE, "duration must not be empty"));
    }

    let (number, millis) = if let Some(num) = input.strip_suffix("ms") {
        (num, true)
    } else if let Some(num) = input.strip_suffix('s') {
        (num, false)
    } else {
        (input, false)
    };

    let value: u64 = number
        .parse()
        .map_err(|_| CliError::new(USAGE, format!("invalid duration value: {input}")))?;

    if value == 0 {
        return Err(CliError::new(USAGE, "duration must be greater than zero"));
    }

    Ok(if millis {
        Duration::from_millis(value)
    } else {
        Duration::from_secs(value)
    })
}

/// Route Ctrl-C to `on_signal`, which runs on a helper thread.
pub fn install_ctrlc_handler<F>(on_signal: F) -> CliResult<()>
where
    F: FnMut() + Send + 'static,
{
    ctrlc::set_handler(on_signal)
        .map_err(|err| CliError::new(INTERNAL, format!("signal handler setup failed: {err}")))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_duration_seconds_and_millis() {
        assert_eq!(parse_duration("2s").unwrap(), Duration::from_secs(2));
        assert_eq!(parse_duration("150ms").unwrap(), Duration::from_millis(150));
        assert_eq!(parse_duration("3").unwrap(), Duration::from_secs(3));
    }

    #[test]
    fn parse_duration_rejects_invalid_values() {
        assert!(parse_duration("0s").is_err());
        assert!(parse_duration("bad").is_err());
        assert_eq!(parse_duration("").unwrap_err().code, USAGE);
    }

    #[test]
    fn endpoint_flags_come_before_config_endpoints() {
        let dir = std::env::temp_dir().join(format!("volsync-cli-config-{}", std::process::id()));
        std::fs::create_dir_all(&dir).unwrap();
        let path = dir.join("config.json");
        std::fs::write(&path, r#"{ "endpoints": ["/tmp/from-file.sock"], "prefix": "surf" }"#)
            .unwrap();

        let args = DiscoveryArgs {
            config: Some(path),
            endpoint: vec![PathBuf::from("/tmp/from-flag.sock")],
            scan_dir: Some(PathBuf::from("/run")),
            prefix: None,
        };
        let config = args.load_config().unwrap();

        assert_eq!(
            config.endpoints,
            vec![
                PathBuf::from("/tmp/from-flag.sock"),
                PathBuf::from("/tmp/from-file.sock")
            ]
        );
        assert_eq!(config.scan_dir, Some(PathBuf::from("/run")));
        assert_eq!(config.prefix, "surf");
        let _ = std::fs::remove_dir_all(&dir);
    }

    #[test]
    fn missing_config_file_is_reported() {
        let args = DiscoveryArgs {
            config: Some(PathBuf::from("/nonexistent/volsync.json")),
            ..DiscoveryArgs::default()
        };
        let err = args.load_config().unwrap_err();
        assert_eq!(err.code, crate::exit::CONFIG_INVALID);
    }
}
