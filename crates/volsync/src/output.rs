use std::fmt::Write as _;
use std::io::{IsTerminal, Write};
use std::time::{SystemTime, UNIX_EPOCH};

use clap::ValueEnum;
use comfy_table::{presets::UTF8_FULL, ContentArrangement, Table};
use serde_json::{json, Value};
use volsync_channel::ChannelEvent;
use volsync_frame::{Message, Rgb};

#[derive(Clone, Debug, Copy, ValueEnum)]
pub enum OutputFormat {
    Json,
    Table,
    Pretty,
    Raw,
}

impl OutputFormat {
    pub fn default_for_stdout() -> Self {
        if std::io::stdout().is_terminal() {
            Self::Table
        } else {
            Self::Json
        }
    }
}

pub fn new_table(header: Vec<&str>) -> Table {
    let mut table = Table::new();
    table
        .load_preset(UTF8_FULL)
        .set_content_arrangement(ContentArrangement::Dynamic)
        .set_header(header);
    table
}

/// Print one decoded message received from the host.
pub fn print_message(message: &Message, frame: &[u8], format: OutputFormat) {
    match format {
        OutputFormat::Json => {
            let mut out = message_json(message);
            if let Value::Object(map) = &mut out {
                map.insert("timestamp".to_string(), now_unix_seconds().into());
            }
            println!("{out}");
        }
        OutputFormat::Table => {
            let mut table = new_table(vec!["KIND", "ID", "DETAILS"]);
            table.add_row(vec![
                message.kind().to_string(),
                message_id(message).map(|id| id.to_string()).unwrap_or_default(),
                message_details(message),
            ]);
            println!("{table}");
        }
        OutputFormat::Pretty => {
            let details = message_details(message);
            match message_id(message) {
                Some(id) => println!("{} id={id} {details}", message.kind()),
                None => println!("{} {details}", message.kind()),
            }
        }
        OutputFormat::Raw => print_raw(frame),
    }
}

/// Print a channel lifecycle event.
pub fn print_event(event: &ChannelEvent, format: OutputFormat) {
    let (name, detail) = match event {
        ChannelEvent::StateChanged(state) => ("state", state.to_string()),
        ChannelEvent::DeviceDiscovered(endpoint) => {
            ("connected", endpoint.path().display().to_string())
        }
        ChannelEvent::Error(reason) => ("disconnected", reason.to_string()),
        ChannelEvent::MessageReceived(message) => ("received", message.kind().to_string()),
    };

    match format {
        OutputFormat::Json => {
            let out = json!({
                "event": name,
                "detail": detail,
                "timestamp": now_unix_seconds(),
            });
            println!("{out}");
        }
        OutputFormat::Table | OutputFormat::Pretty | OutputFormat::Raw => {
            println!("{name}: {detail}");
        }
    }
}

pub fn print_raw(data: &[u8]) {
    let mut out = std::io::stdout();
    let _ = out.write_all(data);
    let _ = out.flush();
}

/// Lowercase hex, two digits per byte, no separators.
pub fn hex(bytes: &[u8]) -> String {
    let mut out = String::with_capacity(bytes.len() * 2);
    for byte in bytes {
        let _ = write!(out, "{byte:02x}");
    }
    out
}

pub fn message_json(message: &Message) -> Value {
    let kind = message.kind().name();
    match message {
        Message::HandshakeRequest | Message::Acknowledgment | Message::Heartbeat => {
            json!({ "kind": kind })
        }
        Message::AddItem(item) => json!({
            "kind": kind,
            "id": item.id,
            "display_name": item.display_name,
            "volume": item.volume,
            "is_muted": item.is_muted,
            "is_device": item.is_device,
            "device_flow": item.device_flow,
        }),
        Message::RemoveItem(item) => json!({
            "kind": kind,
            "id": item.id,
            "is_device": item.is_device,
            "device_flow": item.device_flow,
        }),
        Message::UpdateVolume(update) => json!({
            "kind": kind,
            "id": update.id,
            "volume": update.volume,
            "is_muted": update.is_muted,
            "is_device": update.is_device,
            "device_flow": update.device_flow,
        }),
        Message::SetDefaultEndpoint(default) => json!({
            "kind": kind,
            "id": default.id,
            "device_flow": default.device_flow,
        }),
        Message::Settings(settings) => json!({
            "kind": kind,
            "display_new_session": settings.display_new_session,
            "sleep_when_inactive": settings.sleep_when_inactive,
            "sleep_after_seconds": settings.sleep_after_seconds,
            "loop_around_items": settings.loop_around_items,
            "acceleration_percentage": settings.acceleration_percentage,
            "double_tap_time_ms": settings.double_tap_time_ms,
            "volume_min_color": rgb(settings.volume_min_color),
            "volume_max_color": rgb(settings.volume_max_color),
            "mix_channel_a_color": rgb(settings.mix_channel_a_color),
            "mix_channel_b_color": rgb(settings.mix_channel_b_color),
        }),
    }
}

fn rgb(color: Rgb) -> Value {
    json!([color.r, color.g, color.b])
}

fn message_id(message: &Message) -> Option<i32> {
    match message {
        Message::AddItem(item) => Some(item.id),
        Message::RemoveItem(item) => Some(item.id),
        Message::UpdateVolume(update) => Some(update.id),
        Message::SetDefaultEndpoint(default) => Some(default.id),
        _ => None,
    }
}

fn message_details(message: &Message) -> String {
    match message {
        Message::AddItem(item) => format!(
            "name={:?} volume={} muted={} {}",
            item.display_name,
            item.volume,
            item.is_muted,
            target(item.is_device, item.device_flow)
        ),
        Message::RemoveItem(item) => target(item.is_device, item.device_flow),
        Message::UpdateVolume(update) => format!(
            "volume={} muted={} {}",
            update.volume,
            update.is_muted,
            target(update.is_device, update.device_flow)
        ),
        Message::SetDefaultEndpoint(default) => format!("flow={}", default.device_flow),
        Message::Settings(settings) => format!(
            "sleep={}s accel={}% double_tap={}ms loop={}",
            settings.sleep_after_seconds,
            settings.acceleration_percentage,
            settings.double_tap_time_ms,
            settings.loop_around_items
        ),
        Message::HandshakeRequest | Message::Acknowledgment | Message::Heartbeat => String::new(),
    }
}

fn target(is_device: bool, flow: u8) -> String {
    if is_device {
        format!("device flow={flow}")
    } else {
        "session".to_string()
    }
}

fn now_unix_seconds() -> String {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs().to_string())
        .unwrap_or_else(|_| "0".to_string())
}
