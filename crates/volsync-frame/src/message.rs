//! Typed wire messages.
//!
//! Every frame carries exactly one [`Message`]. The set is closed: adding a
//! kind means adding a variant here, which every exhaustive `match` over
//! [`Message`] or [`MessageKind`] has to handle.

use std::fmt;

/// Wire value of a render (playback) device flow.
pub const FLOW_RENDER: u8 = 0;
/// Wire value of a capture (recording) device flow.
pub const FLOW_CAPTURE: u8 = 1;

/// Field-less companion of [`Message`], used as the registry key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum MessageKind {
    HandshakeRequest,
    Acknowledgment,
    AddItem,
    RemoveItem,
    UpdateVolume,
    SetDefaultEndpoint,
    Settings,
    Heartbeat,
}

impl MessageKind {
    /// Number of kinds.
    pub const COUNT: usize = 8;

    /// Every kind, in canonical discriminant order.
    pub const ALL: [MessageKind; Self::COUNT] = [
        MessageKind::HandshakeRequest,
        MessageKind::Acknowledgment,
        MessageKind::AddItem,
        MessageKind::RemoveItem,
        MessageKind::UpdateVolume,
        MessageKind::SetDefaultEndpoint,
        MessageKind::Settings,
        MessageKind::Heartbeat,
    ];

    /// Dense index, used for table lookups.
    pub const fn index(self) -> usize {
        match self {
            MessageKind::HandshakeRequest => 0,
            MessageKind::Acknowledgment => 1,
            MessageKind::AddItem => 2,
            MessageKind::RemoveItem => 3,
            MessageKind::UpdateVolume => 4,
            MessageKind::SetDefaultEndpoint => 5,
            MessageKind::Settings => 6,
            MessageKind::Heartbeat => 7,
        }
    }

    pub const fn name(self) -> &'static str {
        match self {
            MessageKind::HandshakeRequest => "HandshakeRequest",
            MessageKind::Acknowledgment => "Acknowledgment",
            MessageKind::AddItem => "AddItem",
            MessageKind::RemoveItem => "RemoveItem",
            MessageKind::UpdateVolume => "UpdateVolume",
            MessageKind::SetDefaultEndpoint => "SetDefaultEndpoint",
            MessageKind::Settings => "Settings",
            MessageKind::Heartbeat => "Heartbeat",
        }
    }
}

impl fmt::Display for MessageKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// 24-bit color as sent to the surface's LEDs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Rgb {
    pub r: u8,
    pub g: u8,
    pub b: u8,
}

impl Rgb {
    pub const fn new(r: u8, g: u8, b: u8) -> Self {
        Self { r, g, b }
    }
}

/// A device or session appeared on the host.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AddItem {
    pub id: i32,
    pub display_name: String,
    pub volume: u8,
    pub is_muted: bool,
    pub is_device: bool,
    pub device_flow: u8,
}

/// A device or session went away.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RemoveItem {
    pub id: i32,
    pub is_device: bool,
    pub device_flow: u8,
}

/// Volume or mute changed, in either direction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct UpdateVolume {
    pub id: i32,
    pub volume: u8,
    pub is_muted: bool,
    pub is_device: bool,
    pub device_flow: u8,
}

/// The default endpoint for a flow changed, in either direction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SetDefaultEndpoint {
    pub id: i32,
    pub device_flow: u8,
}

/// User preferences pushed to the surface after connecting.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Settings {
    pub display_new_session: bool,
    pub sleep_when_inactive: bool,
    pub sleep_after_seconds: i32,
    pub loop_around_items: bool,
    pub acceleration_percentage: i32,
    pub double_tap_time_ms: i32,
    pub volume_min_color: Rgb,
    pub volume_max_color: Rgb,
    pub mix_channel_a_color: Rgb,
    pub mix_channel_b_color: Rgb,
}

/// One decoded frame.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Message {
    HandshakeRequest,
    Acknowledgment,
    AddItem(AddItem),
    RemoveItem(RemoveItem),
    UpdateVolume(UpdateVolume),
    SetDefaultEndpoint(SetDefaultEndpoint),
    Settings(Settings),
    Heartbeat,
}

impl Message {
    pub fn kind(&self) -> MessageKind {
        match self {
            Message::HandshakeRequest => MessageKind::HandshakeRequest,
            Message::Acknowledgment => MessageKind::Acknowledgment,
            Message::AddItem(_) => MessageKind::AddItem,
            Message::RemoveItem(_) => MessageKind::RemoveItem,
            Message::UpdateVolume(_) => MessageKind::UpdateVolume,
            Message::SetDefaultEndpoint(_) => MessageKind::SetDefaultEndpoint,
            Message::Settings(_) => MessageKind::Settings,
            Message::Heartbeat => MessageKind::Heartbeat,
        }
    }
}

impl From<AddItem> for Message {
    fn from(value: AddItem) -> Self {
        Message::AddItem(value)
    }
}

impl From<RemoveItem> for Message {
    fn from(value: RemoveItem) -> Self {
        Message::RemoveItem(value)
    }
}

impl From<UpdateVolume> for Message {
    fn from(value: UpdateVolume) -> Self {
        Message::UpdateVolume(value)
    }
}

impl From<SetDefaultEndpoint> for Message {
    fn from(value: SetDefaultEndpoint) -> Self {
        Message::SetDefaultEndpoint(value)
    }
}

impl From<Settings> for Message {
    fn from(value: Settings) -> Self {
        Message::Settings(value)
    }
}
