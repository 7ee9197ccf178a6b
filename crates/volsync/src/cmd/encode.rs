use serde::{Deserialize, Serialize};
use volsync_frame::{
    AddItem, FrameCodec, Message, RemoveItem, SetDefaultEndpoint, UpdateVolume,
};
use volsync_sync::DeviceSettings;

use crate::cmd::EncodeArgs;
use crate::exit::{frame_error, CliError, CliResult, SUCCESS, USAGE};
use crate::output::{hex, new_table, print_raw, OutputFormat};

/// JSON form of a [`Message`], tagged by `kind`.
///
/// Optional fields default to zero/false; `Settings` defaults to the
/// standard device settings.
#[derive(Debug, Deserialize)]
#[serde(tag = "kind")]
enum MessageSpec {
    HandshakeRequest,
    Acknowledgment,
    Heartbeat,
    AddItem {
        id: i32,
        display_name: String,
        #[serde(default)]
        volume: u8,
        #[serde(default)]
        is_muted: bool,
        #[serde(default)]
        is_device: bool,
        #[serde(default)]
        device_flow: u8,
    },
    RemoveItem {
        id: i32,
        #[serde(default)]
        is_device: bool,
        #[serde(default)]
        device_flow: u8,
    },
    UpdateVolume {
        id: i32,
        #[serde(default)]
        volume: u8,
        #[serde(default)]
        is_muted: bool,
        #[serde(default)]
        is_device: bool,
        #[serde(default)]
        device_flow: u8,
    },
    SetDefaultEndpoint {
        id: i32,
        #[serde(default)]
        device_flow: u8,
    },
    Settings(DeviceSettings),
}

impl From<MessageSpec> for Message {
    fn from(spec: MessageSpec) -> Self {
        match spec {
            MessageSpec::HandshakeRequest => Message::HandshakeRequest,
            MessageSpec::Acknowledgment => Message::Acknowledgment,
            MessageSpec::Heartbeat => Message::Heartbeat,
            MessageSpec::AddItem {
                id,
                display_name,
                volume,
                is_muted,
                is_device,
                device_flow,
            } => Message::AddItem(AddItem {
                id,
                display_name,
                volume,
                is_muted,
                is_device,
                device_flow,
            }),
            MessageSpec::RemoveItem {
                id,
                is_device,
                device_flow,
            } => Message::RemoveItem(RemoveItem {
                id,
                is_device,
                device_flow,
            }),
            MessageSpec::UpdateVolume {
                id,
                volume,
                is_muted,
                is_device,
                device_flow,
            } => Message::UpdateVolume(UpdateVolume {
                id,
                volume,
                is_muted,
                is_device,
                device_flow,
            }),
            MessageSpec::SetDefaultEndpoint { id, device_flow } => {
                Message::SetDefaultEndpoint(SetDefaultEndpoint { id, device_flow })
            }
            MessageSpec::Settings(settings) => Message::Settings(settings.into()),
        }
    }
}

#[derive(Serialize)]
struct EncodeOutput {
    kind: &'static str,
    length: usize,
    frame: String,
}

pub fn run(args: EncodeArgs, format: OutputFormat) -> CliResult<i32> {
    let message = parse_message(&args.message)?;
    let frame = FrameCodec::standard()
        .encode(&message)
        .map_err(|err| frame_error("encode failed", err))?;

    let out = EncodeOutput {
        kind: message.kind().name(),
        length: frame.len(),
        frame: hex(&frame),
    };

    match format {
        OutputFormat::Json => {
            println!(
                "{}",
                serde_json::to_string(&out).unwrap_or_else(|_| "{}".to_string())
            );
        }
        OutputFormat::Table => {
            let mut table = new_table(vec!["KIND", "LENGTH", "FRAME"]);
            table.add_row(vec![out.kind.to_string(), out.length.to_string(), out.frame]);
            println!("{table}");
        }
        OutputFormat::Pretty => println!("{}", out.frame),
        OutputFormat::Raw => print_raw(&frame),
    }
    Ok(SUCCESS)
}

fn parse_message(raw: &str) -> CliResult<Message> {
    let spec: MessageSpec = serde_json::from_str(raw)
        .map_err(|err| CliError::new(USAGE, format!("invalid message JSON: {err}")))?;
    let message = Message::from(spec);
    if let Message::AddItem(item) = &message {
        if item.display_name.len() > volsync_frame::MAX_NAME_LEN {
            return Err(CliError::new(
                USAGE,
                format!(
                    "display_name is {} bytes, max is {}",
                    item.display_name.len(),
                    volsync_frame::MAX_NAME_LEN
                ),
            ));
        }
    }
    Ok(message)
}
