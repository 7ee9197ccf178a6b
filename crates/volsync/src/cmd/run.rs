use std::sync::Arc;

use volsync_audio::InMemoryProvider;
use volsync_channel::{Channel, ChannelEvent};
use volsync_frame::FrameCodec;
use volsync_sync::SyncController;

use crate::cmd::{install_ctrlc_handler, RunArgs};
use crate::exit::{config_error, sync_error, CliError, CliResult, SUCCESS, USAGE};
use crate::fixture::Fixture;
use crate::output::{print_event, OutputFormat};

pub fn run(args: RunArgs, format: OutputFormat) -> CliResult<i32> {
    let mut config = args.discovery.load_config()?;
    config.blacklist.extend(args.blacklist.iter().cloned());
    if let Some(path) = &args.settings {
        config.settings_path = Some(path.clone());
    }
    config
        .validate()
        .map_err(|err| config_error("invalid configuration", err))?;

    if config.endpoints.is_empty() && config.scan_dir.is_none() {
        return Err(CliError::new(
            USAGE,
            "no control surface configured (use --endpoint, --scan-dir or --config)",
        ));
    }

    let provider = match &args.fixture {
        Some(path) => Fixture::load(path)?.into_provider()?,
        None => InMemoryProvider::new(),
    };

    let channel = Channel::new(
        config.discovery(),
        FrameCodec::standard(),
        config.channel_config(),
    );
    if args.events {
        channel.subscribe(move |event: &ChannelEvent| {
            if !matches!(event, ChannelEvent::MessageReceived(_)) {
                print_event(event, format);
            }
        });
    }

    let controller = SyncController::new(
        channel,
        Arc::new(provider),
        config.settings_store(),
        config.options(),
    );

    let (shutdown_tx, shutdown_rx) = crossbeam_channel::bounded::<()>(1);
    install_ctrlc_handler(move || {
        let _ = shutdown_tx.try_send(());
    })?;

    controller
        .start()
        .map_err(|err| sync_error("failed to start sync", err))?;
    tracing::info!(
        endpoints = config.endpoints.len(),
        scan_dir = ?config.scan_dir,
        blacklisted = config.blacklist.len(),
        "sync running; press Ctrl-C to stop"
    );

    let _ = shutdown_rx.recv();
    tracing::info!("shutting down");
    controller.stop();
    Ok(SUCCESS)
}
