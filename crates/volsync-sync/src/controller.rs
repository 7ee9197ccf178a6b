use std::collections::hash_map::Entry;
use std::collections::HashMap;
use std::mem;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Weak};

use parking_lot::Mutex;
use volsync_audio::{
    AudioEvent, AudioProvider, ControlPoint, ControlPointEvent, ControlPointGroup, DeviceFlow,
    GroupError, SubscriptionId as AudioSubscription, MAX_VOLUME,
};
use volsync_channel::{
    Channel, ChannelEvent, DisconnectReason, SubscriptionId as ChannelSubscription,
};
use volsync_frame::{AddItem, Message, RemoveItem, SetDefaultEndpoint, UpdateVolume, FLOW_RENDER};
use volsync_transport::Endpoint;

use crate::blacklist::Blacklist;
use crate::error::Result;
use crate::settings::{DeviceSettings, SettingsStore};

/// Tunables for a [`SyncController`].
#[derive(Debug, Clone, Default)]
pub struct SyncOptions {
    pub blacklist: Blacklist,
}

impl SyncOptions {
    pub fn with_blacklist<I, S>(mut self, names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        self.blacklist = Blacklist::new(names);
        self
    }
}

/// Stable id for the session group named `display_name`.
///
/// 32-bit FNV-1a over the lower-cased UTF-8 name, reinterpreted as `i32`.
pub fn group_id(display_name: &str) -> i32 {
    const OFFSET_BASIS: u32 = 0x811c_9dc5;
    const PRIME: u32 = 0x0100_0193;

    let hash = display_name
        .to_lowercase()
        .bytes()
        .fold(OFFSET_BASIS, |hash, byte| {
            (hash ^ u32::from(byte)).wrapping_mul(PRIME)
        });
    hash as i32
}

struct Tracked<P: ?Sized> {
    point: Arc<P>,
    subscription: AudioSubscription,
}

#[derive(Default)]
struct Registry {
    groups: HashMap<i32, Tracked<ControlPointGroup>>,
    devices: HashMap<(DeviceFlow, i32), Tracked<dyn ControlPoint>>,
}

#[derive(Default)]
struct Subscriptions {
    channel: Option<ChannelSubscription>,
    provider: Option<AudioSubscription>,
}

/// Mirrors host audio state to the control surface and applies the
/// surface's changes back to the host.
///
/// Audio events become outbound messages only while the channel is
/// connected. Sessions with the same display name (ignoring case) are
/// folded into one [`ControlPointGroup`]. Blacklisted names are never
/// announced and never tracked.
pub struct SyncController {
    inner: Arc<Inner>,
}

struct Inner {
    this: Weak<Inner>,
    channel: Channel,
    provider: Arc<dyn AudioProvider>,
    settings: Arc<dyn SettingsStore>,
    options: SyncOptions,
    connected: AtomicBool,
    registry: Mutex<Registry>,
    subscriptions: Mutex<Subscriptions>,
}

impl SyncController {
    pub fn new(
        channel: Channel,
        provider: Arc<dyn AudioProvider>,
        settings: Arc<dyn SettingsStore>,
        options: SyncOptions,
    ) -> Self {
        let inner = Arc::new_cyclic(|this| Inner {
            this: this.clone(),
            channel,
            provider,
            settings,
            options,
            connected: AtomicBool::new(false),
            registry: Mutex::new(Registry::default()),
            subscriptions: Mutex::new(Subscriptions::default()),
        });
        Self { inner }
    }

    /// Wire up event handlers and start connecting.
    pub fn start(&self) -> Result<()> {
        self.inner.attach();
        self.inner.channel.start()?;
        tracing::info!(
            blacklisted = self.inner.options.blacklist.len(),
            "sync controller started"
        );
        Ok(())
    }

    /// Stop the channel and the provider and release every subscription.
    pub fn stop(&self) {
        self.inner.detach();
        self.inner.channel.stop();
        self.inner.connected.store(false, Ordering::SeqCst);
        self.inner.provider.stop();
        self.inner.release_all();
    }

    pub fn is_connected(&self) -> bool {
        self.inner.connected.load(Ordering::SeqCst)
    }

    pub fn channel(&self) -> &Channel {
        &self.inner.channel
    }

    /// The tracked group for `display_name`, if any session by that name is
    /// being mirrored.
    pub fn group(&self, display_name: &str) -> Option<Arc<ControlPointGroup>> {
        self.inner
            .registry
            .lock()
            .groups
            .get(&group_id(display_name))
            .map(|tracked| Arc::clone(&tracked.point))
    }

    pub fn tracked_group_count(&self) -> usize {
        self.inner.registry.lock().groups.len()
    }

    pub fn tracked_device_count(&self) -> usize {
        self.inner.registry.lock().devices.len()
    }

    /// Persist new settings and push them to a connected surface.
    pub fn update_settings(&self, settings: DeviceSettings) -> Result<()> {
        self.inner.settings.save(&settings)?;
        if self.is_connected() {
            self.inner.send(Message::Settings(settings.into()));
        }
        Ok(())
    }
}

impl Drop for SyncController {
    fn drop(&mut self) {
        self.stop();
    }
}

impl Inner {
    fn attach(&self) {
        let mut subscriptions = self.subscriptions.lock();

        if subscriptions.channel.is_none() {
            let this = self.this.clone();
            subscriptions.channel = Some(self.channel.subscribe(move |event| {
                if let Some(inner) = this.upgrade() {
                    inner.on_channel_event(event);
                }
            }));
        }

        if subscriptions.provider.is_none() {
            let this = self.this.clone();
            subscriptions.provider = Some(self.provider.subscribe(Arc::new(
                move |event: &AudioEvent| {
                    if let Some(inner) = this.upgrade() {
                        inner.on_audio_event(event);
                    }
                },
            )));
        }
    }

    fn detach(&self) {
        let subscriptions = mem::take(&mut *self.subscriptions.lock());
        if let Some(id) = subscriptions.channel {
            self.channel.unsubscribe(id);
        }
        if let Some(id) = subscriptions.provider {
            self.provider.unsubscribe(id);
        }
    }

    fn send(&self, message: Message) {
        if let Err(err) = self.channel.send(&message) {
            tracing::debug!(kind = %message.kind(), error = %err, "outbound message dropped");
        }
    }

    fn send_update(&self, id: i32, volume: u8, is_muted: bool, is_device: bool, device_flow: u8) {
        self.send(Message::UpdateVolume(UpdateVolume {
            id,
            volume,
            is_muted,
            is_device,
            device_flow,
        }));
    }

    fn on_channel_event(&self, event: &ChannelEvent) {
        match event {
            ChannelEvent::StateChanged(state) => {
                tracing::trace!(%state, "channel state");
            }
            ChannelEvent::DeviceDiscovered(endpoint) => self.on_connected(endpoint),
            ChannelEvent::MessageReceived(message) => self.on_message(message),
            ChannelEvent::Error(reason) => self.on_disconnected(reason),
        }
    }

    fn on_connected(&self, endpoint: &Endpoint) {
        self.connected.store(true, Ordering::SeqCst);
        tracing::info!(%endpoint, "mirroring audio state to control surface");

        if let Err(err) = self.provider.start() {
            tracing::warn!(error = %err, "audio provider failed to start");
        }

        let settings = self.settings.load().unwrap_or_else(|err| {
            tracing::warn!(error = %err, "failed to load settings, sending defaults");
            DeviceSettings::default()
        });
        self.send(Message::Settings(settings.into()));
    }

    fn on_disconnected(&self, reason: &DisconnectReason) {
        let was_connected = self.connected.swap(false, Ordering::SeqCst);
        if was_connected {
            tracing::warn!(%reason, "control surface lost, idling audio provider");
        } else {
            tracing::debug!(%reason, "control surface unavailable");
        }
        self.provider.stop();
        self.release_all();
    }

    fn on_message(&self, message: &Message) {
        match message {
            Message::UpdateVolume(update) => self.apply_volume(update),
            Message::SetDefaultEndpoint(endpoint) => self.apply_default_endpoint(endpoint),
            Message::Heartbeat => {}
            Message::HandshakeRequest
            | Message::Acknowledgment
            | Message::AddItem(_)
            | Message::RemoveItem(_)
            | Message::Settings(_) => {
                tracing::debug!(kind = %message.kind(), "ignoring inbound message");
            }
        }
    }

    fn apply_volume(&self, update: &UpdateVolume) {
        let target: Option<Arc<dyn ControlPoint>> = if update.is_device {
            let Some(flow) = DeviceFlow::from_wire(update.device_flow) else {
                tracing::warn!(flow = update.device_flow, "update for unknown device flow");
                return;
            };
            self.provider.device(update.id, flow)
        } else {
            self.registry
                .lock()
                .groups
                .get(&update.id)
                .map(|tracked| Arc::clone(&tracked.point) as Arc<dyn ControlPoint>)
        };

        match target {
            Some(point) => {
                tracing::debug!(
                    id = update.id,
                    volume = update.volume,
                    muted = update.is_muted,
                    "applying volume from control surface"
                );
                point.set_volume(update.volume.min(MAX_VOLUME));
                point.set_muted(update.is_muted);
            }
            None => {
                tracing::debug!(
                    id = update.id,
                    device = update.is_device,
                    "update for unknown control point"
                );
            }
        }
    }

    fn apply_default_endpoint(&self, endpoint: &SetDefaultEndpoint) {
        let Some(flow) = DeviceFlow::from_wire(endpoint.device_flow) else {
            tracing::warn!(flow = endpoint.device_flow, "default endpoint for unknown device flow");
            return;
        };
        if let Err(err) = self.provider.set_default_endpoint(endpoint.id, flow) {
            tracing::warn!(id = endpoint.id, %flow, error = %err, "failed to set default endpoint");
        }
    }

    fn on_audio_event(&self, event: &AudioEvent) {
        if !self.connected.load(Ordering::SeqCst) {
            tracing::trace!(?event, "ignoring audio event while disconnected");
            return;
        }

        match event {
            AudioEvent::DeviceAdded { device, flow } => self.track_device(device, *flow),
            AudioEvent::DeviceRemoved { id, flow } => self.untrack_device(*id, *flow),
            AudioEvent::SessionAdded { session } => self.track_session(session),
            AudioEvent::DefaultEndpointChanged { id, flow } => {
                if self.registry.lock().devices.contains_key(&(*flow, *id)) {
                    self.send(Message::SetDefaultEndpoint(SetDefaultEndpoint {
                        id: *id,
                        device_flow: flow.to_wire(),
                    }));
                }
            }
        }
    }

    fn track_device(&self, device: &Arc<dyn ControlPoint>, flow: DeviceFlow) {
        let id = device.id();
        let display_name = device.display_name();
        if self.options.blacklist.contains(&display_name) {
            tracing::debug!(id, name = %display_name, "device suppressed by blacklist");
            return;
        }
        if self.registry.lock().devices.contains_key(&(flow, id)) {
            tracing::debug!(id, %flow, "device already tracked");
            return;
        }

        let this = self.this.clone();
        let subscription = device.subscribe(Arc::new(move |event: &ControlPointEvent| {
            if let ControlPointEvent::VolumeChanged { volume, is_muted } = *event {
                if let Some(inner) = this.upgrade() {
                    inner.send_update(id, volume, is_muted, true, flow.to_wire());
                }
            }
        }));

        let inserted = match self.registry.lock().devices.entry((flow, id)) {
            Entry::Vacant(slot) if self.connected.load(Ordering::SeqCst) => {
                slot.insert(Tracked {
                    point: Arc::clone(device),
                    subscription,
                });
                true
            }
            _ => false,
        };
        if !inserted {
            device.unsubscribe(subscription);
            tracing::debug!(id, %flow, "device tracked concurrently or link lost");
            return;
        }

        tracing::debug!(id, name = %display_name, %flow, "device added");
        self.send(Message::AddItem(AddItem {
            id,
            display_name,
            volume: device.volume(),
            is_muted: device.is_muted(),
            is_device: true,
            device_flow: flow.to_wire(),
        }));
    }

    fn untrack_device(&self, id: i32, flow: DeviceFlow) {
        let removed = self.registry.lock().devices.remove(&(flow, id));
        let Some(tracked) = removed else {
            tracing::trace!(id, %flow, "removal of untracked device");
            return;
        };
        tracked.point.unsubscribe(tracked.subscription);
        tracing::debug!(id, %flow, "device removed");
        self.send(Message::RemoveItem(RemoveItem {
            id,
            is_device: true,
            device_flow: flow.to_wire(),
        }));
    }

    fn track_session(&self, session: &Arc<dyn ControlPoint>) {
        let display_name = session.display_name();
        if self.options.blacklist.contains(&display_name) {
            tracing::debug!(
                id = session.id(),
                name = %display_name,
                "session suppressed by blacklist"
            );
            return;
        }

        let id = group_id(&display_name);
        loop {
            let Some((group, created)) = self.group_for(id, &display_name) else {
                tracing::trace!(group = id, "session dropped, link lost");
                return;
            };
            match group.add_member(Arc::clone(session)) {
                Ok(()) if created => {
                    tracing::debug!(group = id, name = %display_name, "session group added");
                    self.send(Message::AddItem(AddItem {
                        id,
                        display_name,
                        volume: group.volume(),
                        is_muted: group.is_muted(),
                        is_device: false,
                        device_flow: FLOW_RENDER,
                    }));
                    return;
                }
                Ok(()) => return,
                // Drained between lookup and add; retire it and start a fresh group.
                Err(GroupError::Ended) => self.on_group_ended(id, &group),
                Err(err) => {
                    tracing::debug!(group = id, error = %err, "session not added to group");
                    return;
                }
            }
        }
    }

    /// Look up the group for `id` or register a new, empty one. Both happen
    /// under one registry lock; the flag is set for the caller that created it.
    fn group_for(&self, id: i32, display_name: &str) -> Option<(Arc<ControlPointGroup>, bool)> {
        let mut registry = self.registry.lock();
        if !self.connected.load(Ordering::SeqCst) {
            return None;
        }
        let entry = registry.groups.entry(id);
        match entry {
            Entry::Occupied(tracked) => Some((Arc::clone(&tracked.get().point), false)),
            Entry::Vacant(slot) => {
                let group = ControlPointGroup::new(id, display_name);
                let this = self.this.clone();
                let weak = Arc::downgrade(&group);
                let subscription = group.subscribe(Arc::new(move |event: &ControlPointEvent| {
                    let Some(inner) = this.upgrade() else {
                        return;
                    };
                    match *event {
                        ControlPointEvent::VolumeChanged { volume, is_muted } => {
                            inner.send_update(id, volume, is_muted, false, FLOW_RENDER);
                        }
                        ControlPointEvent::Ended => {
                            if let Some(group) = weak.upgrade() {
                                inner.on_group_ended(id, &group);
                            }
                        }
                    }
                }));
                slot.insert(Tracked {
                    point: Arc::clone(&group),
                    subscription,
                });
                Some((group, true))
            }
        }
    }

    /// Retire `group` if it is still the one tracked under `id`.
    fn on_group_ended(&self, id: i32, group: &Arc<ControlPointGroup>) {
        let removed = match self.registry.lock().groups.entry(id) {
            Entry::Occupied(tracked) if Arc::ptr_eq(&tracked.get().point, group) => {
                Some(tracked.remove())
            }
            _ => None,
        };
        let Some(tracked) = removed else {
            return;
        };
        tracked.point.unsubscribe(tracked.subscription);
        tracked.point.dispose();
        tracing::debug!(group = id, "session group ended");
        self.send(Message::RemoveItem(RemoveItem {
            id,
            is_device: false,
            device_flow: FLOW_RENDER,
        }));
    }

    fn release_all(&self) {
        let registry = mem::take(&mut *self.registry.lock());
        for (_, tracked) in registry.groups {
            tracked.point.unsubscribe(tracked.subscription);
            tracked.point.dispose();
        }
        for (_, tracked) in registry.devices {
            tracked.point.unsubscribe(tracked.subscription);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn group_id_is_fnv1a_of_lowercase_name() {
        assert_eq!(group_id("a"), 0xe40c_292c_u32 as i32);
        assert_eq!(group_id("A"), group_id("a"));
        assert_eq!(group_id("Firefox"), group_id("FIREFOX"));
        assert_ne!(group_id("Firefox"), group_id("Chrome"));
    }

    #[test]
    fn empty_name_hashes_to_offset_basis() {
        assert_eq!(group_id(""), 0x811c_9dc5_u32 as i32);
    }

    #[test]
    fn options_build_blacklist() {
        let options = SyncOptions::default().with_blacklist(["Steam"]);
        assert!(options.blacklist.contains("steam"));
    }
}
