//! Audio control points for volsync.
//!
//! A [`ControlPoint`] is anything with a volume, a mute flag and change
//! notifications. [`ControlPointGroup`] folds many of them (for instance all
//! sessions of one application) into a single point with consistent state.
//! [`AudioProvider`] is the boundary to the host audio subsystem;
//! [`InMemoryProvider`] implements it without touching real hardware.

pub mod control_point;
pub mod error;
pub mod group;
pub mod memory;
pub mod observer;
pub mod provider;

pub use control_point::{
    ControlPoint, ControlPointEvent, ControlPointHandler, LocalControlPoint, MAX_VOLUME,
};
pub use error::{AudioError, GroupError, Result};
pub use group::ControlPointGroup;
pub use memory::InMemoryProvider;
pub use observer::{Handler, Observers, SubscriptionId};
pub use provider::{AudioEvent, AudioHandler, AudioProvider, DeviceFlow};
