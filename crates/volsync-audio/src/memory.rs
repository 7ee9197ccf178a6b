use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use parking_lot::Mutex;

use crate::control_point::{ControlPoint, LocalControlPoint};
use crate::error::{AudioError, Result};
use crate::observer::{Observers, SubscriptionId};
use crate::provider::{AudioEvent, AudioHandler, AudioProvider, DeviceFlow};

/// An [`AudioProvider`] backed by plain in-process state.
///
/// Used by tests and by the CLI to replay a fixture. Mutations made while
/// stopped are remembered silently and announced by the next `start`.
#[derive(Default)]
pub struct InMemoryProvider {
    devices: Mutex<BTreeMap<(DeviceFlow, i32), Arc<LocalControlPoint>>>,
    sessions: Mutex<BTreeMap<i32, Arc<LocalControlPoint>>>,
    defaults: Mutex<HashMap<DeviceFlow, i32>>,
    started: AtomicBool,
    observers: Observers<AudioEvent>,
}

impl std::fmt::Debug for InMemoryProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("InMemoryProvider").finish_non_exhaustive()
    }
}

impl InMemoryProvider {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_started(&self) -> bool {
        self.started.load(Ordering::SeqCst)
    }

    pub fn add_device(
        &self,
        id: i32,
        name: impl Into<String>,
        flow: DeviceFlow,
        volume: u8,
        is_muted: bool,
    ) -> Arc<LocalControlPoint> {
        let device = LocalControlPoint::new(id, name, volume, is_muted);
        self.devices.lock().insert((flow, id), Arc::clone(&device));
        self.announce(AudioEvent::DeviceAdded {
            device: device.clone(),
            flow,
        });
        device
    }

    pub fn remove_device(&self, id: i32, flow: DeviceFlow) -> bool {
        let removed = self.devices.lock().remove(&(flow, id));
        let Some(device) = removed else {
            return false;
        };
        {
            let mut defaults = self.defaults.lock();
            if defaults.get(&flow) == Some(&id) {
                defaults.remove(&flow);
            }
        }
        self.announce(AudioEvent::DeviceRemoved { id, flow });
        device.end();
        true
    }

    pub fn add_session(
        &self,
        id: i32,
        name: impl Into<String>,
        volume: u8,
        is_muted: bool,
    ) -> Arc<LocalControlPoint> {
        let session = LocalControlPoint::new(id, name, volume, is_muted);
        self.sessions.lock().insert(id, Arc::clone(&session));
        self.announce(AudioEvent::SessionAdded {
            session: session.clone(),
        });
        session
    }

    /// Remove a session and raise its `Ended` notification.
    pub fn end_session(&self, id: i32) -> bool {
        let removed = self.sessions.lock().remove(&id);
        match removed {
            Some(session) => {
                session.end();
                true
            }
            None => false,
        }
    }

    pub fn session(&self, id: i32) -> Option<Arc<LocalControlPoint>> {
        self.sessions.lock().get(&id).cloned()
    }

    pub fn local_device(&self, id: i32, flow: DeviceFlow) -> Option<Arc<LocalControlPoint>> {
        self.devices.lock().get(&(flow, id)).cloned()
    }

    pub fn default_endpoint(&self, flow: DeviceFlow) -> Option<i32> {
        self.defaults.lock().get(&flow).copied()
    }

    fn announce(&self, event: AudioEvent) {
        if self.is_started() {
            self.observers.emit(&event);
        }
    }
}

impl AudioProvider for InMemoryProvider {
    fn start(&self) -> Result<()> {
        if self.started.swap(true, Ordering::SeqCst) {
            return Ok(());
        }

        let devices: Vec<_> = self
            .devices
            .lock()
            .iter()
            .map(|((flow, _), device)| (*flow, Arc::clone(device)))
            .collect();
        let sessions: Vec<_> = self.sessions.lock().values().cloned().collect();
        let mut defaults: Vec<_> = self
            .defaults
            .lock()
            .iter()
            .map(|(flow, id)| (*flow, *id))
            .collect();
        defaults.sort_unstable();

        tracing::debug!(
            devices = devices.len(),
            sessions = sessions.len(),
            "in-memory provider started"
        );
        for (flow, device) in devices {
            self.observers.emit(&AudioEvent::DeviceAdded {
                device: device as Arc<dyn ControlPoint>,
                flow,
            });
        }
        for (flow, id) in defaults {
            self.observers
                .emit(&AudioEvent::DefaultEndpointChanged { id, flow });
        }
        for session in sessions {
            self.observers.emit(&AudioEvent::SessionAdded {
                session: session as Arc<dyn ControlPoint>,
            });
        }
        Ok(())
    }

    fn stop(&self) {
        if self.started.swap(false, Ordering::SeqCst) {
            tracing::debug!("in-memory provider stopped");
        }
    }

    fn subscribe(&self, handler: AudioHandler) -> SubscriptionId {
        self.observers.subscribe(handler)
    }

    fn unsubscribe(&self, id: SubscriptionId) -> bool {
        self.observers.unsubscribe(id)
    }

    fn device(&self, id: i32, flow: DeviceFlow) -> Option<Arc<dyn ControlPoint>> {
        self.local_device(id, flow)
            .map(|device| device as Arc<dyn ControlPoint>)
    }

    fn set_default_endpoint(&self, id: i32, flow: DeviceFlow) -> Result<()> {
        if !self.devices.lock().contains_key(&(flow, id)) {
            return Err(AudioError::DeviceNotFound { id, flow });
        }
        let previous = self.defaults.lock().insert(flow, id);
        if previous != Some(id) {
            self.announce(AudioEvent::DefaultEndpointChanged { id, flow });
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn recorder(provider: &InMemoryProvider) -> Arc<Mutex<Vec<String>>> {
        let events = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&events);
        provider.subscribe(Arc::new(move |event: &AudioEvent| {
            let line = match event {
                AudioEvent::DeviceAdded { device, flow } => {
                    format!("device+ {} {flow}", device.id())
                }
                AudioEvent::DeviceRemoved { id, flow } => format!("device- {id} {flow}"),
                AudioEvent::SessionAdded { session } => format!("session+ {}", session.id()),
                AudioEvent::DefaultEndpointChanged { id, flow } => format!("default {id} {flow}"),
            };
            sink.lock().push(line);
        }));
        events
    }

    #[test]
    fn start_announces_existing_state() {
        let provider = InMemoryProvider::new();
        let events = recorder(&provider);
        provider.add_device(1, "Speakers", DeviceFlow::Render, 50, false);
        provider.add_device(2, "Mic", DeviceFlow::Capture, 70, false);
        provider.set_default_endpoint(1, DeviceFlow::Render).unwrap();
        provider.add_session(10, "Browser", 30, false);
        assert!(events.lock().is_empty());

        provider.start().unwrap();

        assert_eq!(
            *events.lock(),
            vec![
                "device+ 1 render",
                "device+ 2 capture",
                "default 1 render",
                "session+ 10",
            ]
        );
    }

    #[test]
    fn changes_while_started_are_announced() {
        let provider = InMemoryProvider::new();
        provider.start().unwrap();
        let events = recorder(&provider);

        provider.add_device(1, "Speakers", DeviceFlow::Render, 50, false);
        provider.add_session(10, "Browser", 30, false);
        provider.set_default_endpoint(1, DeviceFlow::Render).unwrap();
        provider.set_default_endpoint(1, DeviceFlow::Render).unwrap();
        assert!(provider.remove_device(1, DeviceFlow::Render));

        assert_eq!(
            *events.lock(),
            vec!["device+ 1 render", "session+ 10", "default 1 render", "device- 1 render"]
        );
        assert_eq!(provider.default_endpoint(DeviceFlow::Render), None);
    }

    #[test]
    fn stopped_provider_is_silent() {
        let provider = InMemoryProvider::new();
        provider.start().unwrap();
        provider.stop();
        let events = recorder(&provider);

        provider.add_session(10, "Browser", 30, false);
        assert!(events.lock().is_empty());
    }

    #[test]
    fn end_session_raises_ended() {
        let provider = InMemoryProvider::new();
        let session = provider.add_session(10, "Browser", 30, false);
        assert!(provider.end_session(10));
        assert!(session.is_ended());
        assert!(provider.session(10).is_none());
        assert!(!provider.end_session(10));
    }

    #[test]
    fn unknown_default_endpoint_is_rejected() {
        let provider = InMemoryProvider::new();
        let err = provider
            .set_default_endpoint(9, DeviceFlow::Capture)
            .unwrap_err();
        assert!(matches!(
            err,
            AudioError::DeviceNotFound {
                id: 9,
                flow: DeviceFlow::Capture
            }
        ));
    }

    #[test]
    fn device_lookup_respects_flow() {
        let provider = InMemoryProvider::new();
        provider.add_device(1, "Speakers", DeviceFlow::Render, 50, false);
        assert!(provider.device(1, DeviceFlow::Render).is_some());
        assert!(provider.device(1, DeviceFlow::Capture).is_none());
    }
}
