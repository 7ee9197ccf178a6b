use std::fmt;
use std::sync::Arc;

use crate::control_point::ControlPoint;
use crate::error::Result;
use crate::observer::{Handler, SubscriptionId};

/// Direction of an audio endpoint.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum DeviceFlow {
    Render,
    Capture,
}

impl DeviceFlow {
    pub const ALL: [DeviceFlow; 2] = [DeviceFlow::Render, DeviceFlow::Capture];

    /// Byte used for `deviceFlow` on the wire.
    pub fn to_wire(self) -> u8 {
        match self {
            DeviceFlow::Render => 0,
            DeviceFlow::Capture => 1,
        }
    }

    pub fn from_wire(value: u8) -> Option<Self> {
        match value {
            0 => Some(DeviceFlow::Render),
            1 => Some(DeviceFlow::Capture),
            _ => None,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            DeviceFlow::Render => "render",
            DeviceFlow::Capture => "capture",
        }
    }
}

impl fmt::Display for DeviceFlow {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Notifications from an [`AudioProvider`].
///
/// Session removal is not an event here: a session signals it through its
/// own `Ended` notification. Volume changes likewise arrive on the control
/// point itself.
#[derive(Clone)]
pub enum AudioEvent {
    DeviceAdded {
        device: Arc<dyn ControlPoint>,
        flow: DeviceFlow,
    },
    DeviceRemoved {
        id: i32,
        flow: DeviceFlow,
    },
    SessionAdded {
        session: Arc<dyn ControlPoint>,
    },
    DefaultEndpointChanged {
        id: i32,
        flow: DeviceFlow,
    },
}

impl fmt::Debug for AudioEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AudioEvent::DeviceAdded { device, flow } => f
                .debug_struct("DeviceAdded")
                .field("id", &device.id())
                .field("name", &device.display_name())
                .field("flow", flow)
                .finish(),
            AudioEvent::DeviceRemoved { id, flow } => f
                .debug_struct("DeviceRemoved")
                .field("id", id)
                .field("flow", flow)
                .finish(),
            AudioEvent::SessionAdded { session } => f
                .debug_struct("SessionAdded")
                .field("id", &session.id())
                .field("name", &session.display_name())
                .finish(),
            AudioEvent::DefaultEndpointChanged { id, flow } => f
                .debug_struct("DefaultEndpointChanged")
                .field("id", id)
                .field("flow", flow)
                .finish(),
        }
    }
}

pub type AudioHandler = Handler<AudioEvent>;

/// The host audio subsystem, seen from the sync engine.
///
/// `start` announces every existing device, session and default endpoint
/// through the event stream and keeps reporting changes until `stop`.
pub trait AudioProvider: Send + Sync {
    fn start(&self) -> Result<()>;

    fn stop(&self);

    fn subscribe(&self, handler: AudioHandler) -> SubscriptionId;

    fn unsubscribe(&self, id: SubscriptionId) -> bool;

    /// Look up a device by id and flow.
    fn device(&self, id: i32, flow: DeviceFlow) -> Option<Arc<dyn ControlPoint>>;

    fn set_default_endpoint(&self, id: i32, flow: DeviceFlow) -> Result<()>;
}
