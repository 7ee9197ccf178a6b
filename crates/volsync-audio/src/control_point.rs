use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use parking_lot::Mutex;

use crate::observer::{Handler, Observers, SubscriptionId};

/// Highest volume a control point accepts.
pub const MAX_VOLUME: u8 = 100;

/// Notifications raised by a [`ControlPoint`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ControlPointEvent {
    /// Volume or mute changed. Carries the full new state.
    VolumeChanged { volume: u8, is_muted: bool },
    /// The underlying device or session went away.
    Ended,
}

pub type ControlPointHandler = Handler<ControlPointEvent>;

/// Anything exposing a volume/mute pair with change notifications: one audio
/// session, one device, or a [`ControlPointGroup`](crate::ControlPointGroup).
pub trait ControlPoint: Send + Sync {
    fn id(&self) -> i32;

    fn display_name(&self) -> String;

    /// Current volume, 0 to 100.
    fn volume(&self) -> u8;

    fn is_muted(&self) -> bool;

    /// Values above [`MAX_VOLUME`] are clamped.
    fn set_volume(&self, volume: u8);

    fn set_muted(&self, muted: bool);

    fn subscribe(&self, handler: ControlPointHandler) -> SubscriptionId;

    fn unsubscribe(&self, id: SubscriptionId) -> bool;

    /// Release the control point and drop every subscription.
    fn dispose(&self);
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Level {
    volume: u8,
    is_muted: bool,
}

/// A single session or device held in process memory.
///
/// Setters and [`report`](LocalControlPoint::report) raise `VolumeChanged`
/// only when the stored value actually changes.
pub struct LocalControlPoint {
    id: i32,
    display_name: String,
    level: Mutex<Level>,
    ended: AtomicBool,
    observers: Observers<ControlPointEvent>,
}

impl LocalControlPoint {
    pub fn new(id: i32, display_name: impl Into<String>, volume: u8, is_muted: bool) -> Arc<Self> {
        Arc::new(Self {
            id,
            display_name: display_name.into(),
            level: Mutex::new(Level {
                volume: volume.min(MAX_VOLUME),
                is_muted,
            }),
            ended: AtomicBool::new(false),
            observers: Observers::new(),
        })
    }

    /// Record a change made outside this process (another mixer, the OS).
    pub fn report(&self, volume: u8, is_muted: bool) {
        self.update(|level| {
            level.volume = volume.min(MAX_VOLUME);
            level.is_muted = is_muted;
        });
    }

    /// Raise `Ended`. Later calls do nothing.
    pub fn end(&self) {
        if !self.ended.swap(true, Ordering::SeqCst) {
            tracing::debug!(id = self.id, name = %self.display_name, "control point ended");
            self.observers.emit(&ControlPointEvent::Ended);
        }
    }

    pub fn is_ended(&self) -> bool {
        self.ended.load(Ordering::SeqCst)
    }

    pub fn subscriber_count(&self) -> usize {
        self.observers.len()
    }

    fn update(&self, apply: impl FnOnce(&mut Level)) {
        let changed = {
            let mut level = self.level.lock();
            let before = *level;
            apply(&mut level);
            (*level != before).then_some(*level)
        };
        if let Some(level) = changed {
            self.observers.emit(&ControlPointEvent::VolumeChanged {
                volume: level.volume,
                is_muted: level.is_muted,
            });
        }
    }
}

impl ControlPoint for LocalControlPoint {
    fn id(&self) -> i32 {
        self.id
    }

    fn display_name(&self) -> String {
        self.display_name.clone()
    }

    fn volume(&self) -> u8 {
        self.level.lock().volume
    }

    fn is_muted(&self) -> bool {
        self.level.lock().is_muted
    }

    fn set_volume(&self, volume: u8) {
        self.update(|level| level.volume = volume.min(MAX_VOLUME));
    }

    fn set_muted(&self, muted: bool) {
        self.update(|level| level.is_muted = muted);
    }

    fn subscribe(&self, handler: ControlPointHandler) -> SubscriptionId {
        self.observers.subscribe(handler)
    }

    fn unsubscribe(&self, id: SubscriptionId) -> bool {
        self.observers.unsubscribe(id)
    }

    fn dispose(&self) {
        self.observers.clear();
    }
}

impl std::fmt::Debug for LocalControlPoint {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let level = *self.level.lock();
        f.debug_struct("LocalControlPoint")
            .field("id", &self.id)
            .field("display_name", &self.display_name)
            .field("volume", &level.volume)
            .field("is_muted", &level.is_muted)
            .field("ended", &self.is_ended())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn recorder(point: &LocalControlPoint) -> Arc<Mutex<Vec<ControlPointEvent>>> {
        let events = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&events);
        point.subscribe(Arc::new(move |event: &ControlPointEvent| {
            sink.lock().push(*event);
        }));
        events
    }

    #[test]
    fn setters_raise_full_state() {
        let point = LocalControlPoint::new(1, "Music", 40, false);
        let events = recorder(&point);

        point.set_volume(55);
        point.set_muted(true);

        assert_eq!(
            *events.lock(),
            vec![
                ControlPointEvent::VolumeChanged {
                    volume: 55,
                    is_muted: false
                },
                ControlPointEvent::VolumeChanged {
                    volume: 55,
                    is_muted: true
                },
            ]
        );
    }

    #[test]
    fn unchanged_values_are_silent() {
        let point = LocalControlPoint::new(1, "Music", 40, false);
        let events = recorder(&point);

        point.set_volume(40);
        point.set_muted(false);
        point.report(40, false);

        assert!(events.lock().is_empty());
    }

    #[test]
    fn volume_is_clamped() {
        let point = LocalControlPoint::new(1, "Music", 250, false);
        assert_eq!(point.volume(), MAX_VOLUME);
        point.set_volume(101);
        assert_eq!(point.volume(), MAX_VOLUME);
    }

    #[test]
    fn end_fires_once() {
        let point = LocalControlPoint::new(1, "Music", 40, false);
        let events = recorder(&point);

        point.end();
        point.end();

        assert_eq!(*events.lock(), vec![ControlPointEvent::Ended]);
        assert!(point.is_ended());
    }

    #[test]
    fn dispose_drops_subscribers() {
        let point = LocalControlPoint::new(1, "Music", 40, false);
        let events = recorder(&point);
        point.dispose();

        point.set_volume(10);
        assert!(events.lock().is_empty());
        assert_eq!(point.subscriber_count(), 0);
    }
}
