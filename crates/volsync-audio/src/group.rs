use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Weak};

use parking_lot::Mutex;

use crate::control_point::{ControlPoint, ControlPointEvent, ControlPointHandler, MAX_VOLUME};
use crate::error::GroupError;
use crate::observer::{Observers, SubscriptionId};

const INITIAL_VOLUME: u8 = 100;

struct Member {
    point: Arc<dyn ControlPoint>,
    subscription: SubscriptionId,
}

#[derive(Debug, Clone, Copy)]
struct Cached {
    volume: u8,
    is_muted: bool,
    /// Bumped on every member report.
    revision: u64,
}

/// Presents several control points as one.
///
/// Typically groups every session of one application. The group caches the
/// last state any member reported; writes go to all members. When the last
/// member ends the group raises `Ended` once and must then be disposed by
/// its owner.
///
/// Lock order is members then cache. Neither lock is held while calling
/// into a member or raising an event. Once ended, a group takes no new
/// members.
pub struct ControlPointGroup {
    id: i32,
    display_name: String,
    this: Weak<ControlPointGroup>,
    members: Mutex<HashMap<i32, Member>>,
    cache: Mutex<Cached>,
    observers: Observers<ControlPointEvent>,
    ended: AtomicBool,
    disposed: AtomicBool,
}

impl ControlPointGroup {
    /// An empty group reporting volume 100, unmuted, until a member joins.
    pub fn new(id: i32, display_name: impl Into<String>) -> Arc<Self> {
        let display_name = display_name.into();
        Arc::new_cyclic(|this| Self {
            id,
            display_name,
            this: this.clone(),
            members: Mutex::new(HashMap::new()),
            cache: Mutex::new(Cached {
                volume: INITIAL_VOLUME,
                is_muted: false,
                revision: 0,
            }),
            observers: Observers::new(),
            ended: AtomicBool::new(false),
            disposed: AtomicBool::new(false),
        })
    }

    /// Add a member and start observing it.
    ///
    /// The first member of an empty group sets the group's state, unless the
    /// member already reported a change while joining. Later members are
    /// neither adopted nor equalized to the group.
    pub fn add_member(&self, point: Arc<dyn ControlPoint>) -> Result<(), GroupError> {
        if self.is_disposed() {
            return Err(GroupError::Disposed);
        }
        if self.is_ended() {
            return Err(GroupError::Ended);
        }

        let member_id = point.id();
        if self.contains_member(member_id) {
            tracing::warn!(group = self.id, member = member_id, "duplicate member id rejected");
            return Err(GroupError::DuplicateMemberId(member_id));
        }

        let group = self.this.clone();
        let handler: ControlPointHandler = Arc::new(move |event: &ControlPointEvent| {
            if let Some(group) = group.upgrade() {
                group.on_member_event(member_id, *event);
            }
        });
        let revision = self.cache.lock().revision;
        let subscription = point.subscribe(handler);
        let volume = point.volume();
        let is_muted = point.is_muted();

        let rejected = {
            let mut members = self.members.lock();
            if self.is_disposed() {
                Some(GroupError::Disposed)
            } else if self.is_ended() {
                Some(GroupError::Ended)
            } else if members.contains_key(&member_id) {
                Some(GroupError::DuplicateMemberId(member_id))
            } else {
                if members.is_empty() {
                    let mut cache = self.cache.lock();
                    if cache.revision == revision {
                        cache.volume = volume;
                        cache.is_muted = is_muted;
                    }
                }
                members.insert(
                    member_id,
                    Member {
                        point: Arc::clone(&point),
                        subscription,
                    },
                );
                tracing::debug!(
                    group = self.id,
                    member = member_id,
                    count = members.len(),
                    "member added"
                );
                None
            }
        };

        match rejected {
            None => Ok(()),
            Some(err) => {
                // Lost a race with a concurrent add, drain or dispose.
                point.unsubscribe(subscription);
                tracing::warn!(
                    group = self.id,
                    member = member_id,
                    error = %err,
                    "member rejected"
                );
                Err(err)
            }
        }
    }

    /// Stop observing a member without disposing it.
    ///
    /// Raises `Ended` if this empties the group.
    pub fn remove_member(&self, member_id: i32) -> Option<Arc<dyn ControlPoint>> {
        let (member, drained) = self.take_member(member_id)?;
        member.point.unsubscribe(member.subscription);
        if drained {
            self.raise_ended();
        }
        Some(member.point)
    }

    pub fn contains_member(&self, member_id: i32) -> bool {
        self.members.lock().contains_key(&member_id)
    }

    pub fn member_count(&self) -> usize {
        self.members.lock().len()
    }

    pub fn member_ids(&self) -> Vec<i32> {
        self.members.lock().keys().copied().collect()
    }

    pub fn is_ended(&self) -> bool {
        self.ended.load(Ordering::SeqCst)
    }

    pub fn is_disposed(&self) -> bool {
        self.disposed.load(Ordering::SeqCst)
    }

    fn snapshot(&self) -> Vec<Arc<dyn ControlPoint>> {
        self.members
            .lock()
            .values()
            .map(|member| Arc::clone(&member.point))
            .collect()
    }

    /// Remove a member. The flag is set for the one removal that drained the
    /// group; `ended` flips under the members lock so no add can slip in.
    fn take_member(&self, member_id: i32) -> Option<(Member, bool)> {
        let mut members = self.members.lock();
        let member = members.remove(&member_id)?;
        let drained = members.is_empty() && !self.ended.swap(true, Ordering::SeqCst);
        Some((member, drained))
    }

    fn on_member_event(&self, member_id: i32, event: ControlPointEvent) {
        if self.is_disposed() {
            return;
        }

        match event {
            ControlPointEvent::VolumeChanged { volume, is_muted } => {
                {
                    let mut cache = self.cache.lock();
                    cache.volume = volume;
                    cache.is_muted = is_muted;
                    cache.revision += 1;
                }
                self.observers
                    .emit(&ControlPointEvent::VolumeChanged { volume, is_muted });
            }
            ControlPointEvent::Ended => {
                let Some((member, drained)) = self.take_member(member_id) else {
                    return;
                };
                member.point.unsubscribe(member.subscription);
                member.point.dispose();
                tracing::debug!(group = self.id, member = member_id, "member ended");
                if drained {
                    self.raise_ended();
                }
            }
        }
    }

    fn raise_ended(&self) {
        if !self.is_disposed() {
            tracing::debug!(group = self.id, name = %self.display_name, "group drained");
            self.observers.emit(&ControlPointEvent::Ended);
        }
    }
}

impl ControlPoint for ControlPointGroup {
    fn id(&self) -> i32 {
        self.id
    }

    fn display_name(&self) -> String {
        self.display_name.clone()
    }

    fn volume(&self) -> u8 {
        self.cache.lock().volume
    }

    fn is_muted(&self) -> bool {
        self.cache.lock().is_muted
    }

    /// No-op when `volume` equals the cached value. Otherwise every member is
    /// set; the group's `VolumeChanged` events come from the members' own
    /// notifications.
    fn set_volume(&self, volume: u8) {
        let volume = volume.min(MAX_VOLUME);
        {
            let mut cache = self.cache.lock();
            if self.is_disposed() || cache.volume == volume {
                return;
            }
            cache.volume = volume;
        }
        for member in self.snapshot() {
            member.set_volume(volume);
        }
    }

    fn set_muted(&self, muted: bool) {
        {
            let mut cache = self.cache.lock();
            if self.is_disposed() || cache.is_muted == muted {
                return;
            }
            cache.is_muted = muted;
        }
        for member in self.snapshot() {
            member.set_muted(muted);
        }
    }

    fn subscribe(&self, handler: ControlPointHandler) -> SubscriptionId {
        self.observers.subscribe(handler)
    }

    fn unsubscribe(&self, id: SubscriptionId) -> bool {
        self.observers.unsubscribe(id)
    }

    /// Unsubscribe from and dispose every member, then drop all observers.
    /// Calling it again is a no-op.
    fn dispose(&self) {
        self.disposed.store(true, Ordering::SeqCst);
        let drained: Vec<Member> = self
            .members
            .lock()
            .drain()
            .map(|(_, member)| member)
            .collect();
        for member in drained {
            member.point.unsubscribe(member.subscription);
            member.point.dispose();
        }
        self.observers.clear();
    }
}

impl std::fmt::Debug for ControlPointGroup {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let cache = *self.cache.lock();
        f.debug_struct("ControlPointGroup")
            .field("id", &self.id)
            .field("display_name", &self.display_name)
            .field("members", &self.member_ids())
            .field("volume", &cache.volume)
            .field("is_muted", &cache.is_muted)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::AtomicUsize;
    use std::thread;

    use super::*;
    use crate::control_point::LocalControlPoint;

    /// Wraps a local point and counts setter calls.
    struct SpyPoint {
        inner: Arc<LocalControlPoint>,
        writes: AtomicUsize,
        disposed: AtomicBool,
    }

    impl SpyPoint {
        fn new(id: i32, volume: u8) -> Arc<Self> {
            Arc::new(Self {
                inner: LocalControlPoint::new(id, format!("spy-{id}"), volume, false),
                writes: AtomicUsize::new(0),
                disposed: AtomicBool::new(false),
            })
        }

        fn writes(&self) -> usize {
            self.writes.load(Ordering::SeqCst)
        }
    }

    impl ControlPoint for SpyPoint {
        fn id(&self) -> i32 {
            self.inner.id()
        }
        fn display_name(&self) -> String {
            self.inner.display_name()
        }
        fn volume(&self) -> u8 {
            self.inner.volume()
        }
        fn is_muted(&self) -> bool {
            self.inner.is_muted()
        }
        fn set_volume(&self, volume: u8) {
            self.writes.fetch_add(1, Ordering::SeqCst);
            self.inner.set_volume(volume);
        }
        fn set_muted(&self, muted: bool) {
            self.writes.fetch_add(1, Ordering::SeqCst);
            self.inner.set_muted(muted);
        }
        fn subscribe(&self, handler: ControlPointHandler) -> SubscriptionId {
            self.inner.subscribe(handler)
        }
        fn unsubscribe(&self, id: SubscriptionId) -> bool {
            self.inner.unsubscribe(id)
        }
        fn dispose(&self) {
            self.disposed.store(true, Ordering::SeqCst);
            self.inner.dispose();
        }
    }

    fn record(group: &ControlPointGroup) -> Arc<Mutex<Vec<ControlPointEvent>>> {
        let events = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&events);
        group.subscribe(Arc::new(move |event: &ControlPointEvent| {
            sink.lock().push(*event);
        }));
        events
    }

    #[test]
    fn fresh_group_has_placeholder_state() {
        let group = ControlPointGroup::new(1, "Browser");
        assert_eq!(group.volume(), 100);
        assert!(!group.is_muted());
        assert_eq!(group.member_count(), 0);
    }

    #[test]
    fn two_member_lifecycle() {
        let group = ControlPointGroup::new(1, "Browser");
        let events = record(&group);
        let a = LocalControlPoint::new(10, "Browser", 50, false);
        let b = LocalControlPoint::new(11, "Browser", 80, false);

        group.add_member(a.clone()).unwrap();
        group.add_member(b.clone()).unwrap();
        assert_eq!(group.volume(), 50);

        group.set_volume(30);
        assert_eq!(a.volume(), 30);
        assert_eq!(b.volume(), 30);

        a.end();
        assert!(!group.is_ended());
        assert_eq!(group.volume(), 30);
        assert!(!group.contains_member(10));

        b.end();
        assert!(group.is_ended());
        let ended = events
            .lock()
            .iter()
            .filter(|e| **e == ControlPointEvent::Ended)
            .count();
        assert_eq!(ended, 1);
    }

    #[test]
    fn setting_cached_value_writes_nothing() {
        let group = ControlPointGroup::new(1, "Game");
        let events = record(&group);
        let spy = SpyPoint::new(5, 60);
        group.add_member(spy.clone()).unwrap();

        group.set_volume(60);
        group.set_muted(false);

        assert_eq!(spy.writes(), 0);
        assert!(events.lock().is_empty());
    }

    #[test]
    fn first_member_sets_state_later_members_do_not() {
        let group = ControlPointGroup::new(1, "Game");
        group
            .add_member(LocalControlPoint::new(1, "Game", 20, true))
            .unwrap();
        assert_eq!(group.volume(), 20);
        assert!(group.is_muted());

        let late = LocalControlPoint::new(2, "Game", 90, false);
        group.add_member(late.clone()).unwrap();
        assert_eq!(group.volume(), 20);
        assert!(group.is_muted());
        assert_eq!(late.volume(), 90);
    }

    #[test]
    fn member_change_updates_cache_and_raises_once() {
        let group = ControlPointGroup::new(1, "Chat");
        let a = LocalControlPoint::new(1, "Chat", 40, false);
        let b = LocalControlPoint::new(2, "Chat", 70, false);
        group.add_member(a.clone()).unwrap();
        group.add_member(b.clone()).unwrap();
        let events = record(&group);

        b.report(65, true);

        assert_eq!(group.volume(), 65);
        assert!(group.is_muted());
        assert_eq!(
            *events.lock(),
            vec![ControlPointEvent::VolumeChanged {
                volume: 65,
                is_muted: true
            }]
        );
    }

    #[test]
    fn fan_out_reannounces_per_member() {
        let group = ControlPointGroup::new(1, "Chat");
        group
            .add_member(LocalControlPoint::new(1, "Chat", 40, false))
            .unwrap();
        group
            .add_member(LocalControlPoint::new(2, "Chat", 40, false))
            .unwrap();
        let events = record(&group);

        group.set_volume(10);

        let changes = events
            .lock()
            .iter()
            .filter(|e| matches!(e, ControlPointEvent::VolumeChanged { volume: 10, .. }))
            .count();
        assert_eq!(changes, 2);
        assert_eq!(group.volume(), 10);
    }

    #[test]
    fn duplicate_member_is_rejected_without_overwrite() {
        let group = ControlPointGroup::new(1, "Chat");
        let original = LocalControlPoint::new(7, "Chat", 40, false);
        group.add_member(original.clone()).unwrap();

        let impostor = LocalControlPoint::new(7, "Chat", 99, true);
        let err = group.add_member(impostor.clone()).unwrap_err();

        assert_eq!(err, GroupError::DuplicateMemberId(7));
        assert_eq!(group.member_count(), 1);
        assert_eq!(impostor.subscriber_count(), 0);
        group.set_volume(12);
        assert_eq!(original.volume(), 12);
        assert_eq!(impostor.volume(), 99);
    }

    #[test]
    fn ended_member_is_disposed() {
        let group = ControlPointGroup::new(1, "Chat");
        let spy = SpyPoint::new(3, 50);
        group.add_member(spy.clone()).unwrap();

        spy.inner.end();

        assert!(spy.disposed.load(Ordering::SeqCst));
        assert_eq!(group.member_count(), 0);
    }

    #[test]
    fn dispose_after_drain_is_noop() {
        let group = ControlPointGroup::new(1, "Chat");
        let events = record(&group);
        let a = LocalControlPoint::new(1, "Chat", 50, false);
        group.add_member(a.clone()).unwrap();

        a.end();
        group.dispose();
        group.dispose();

        let ended = events
            .lock()
            .iter()
            .filter(|e| **e == ControlPointEvent::Ended)
            .count();
        assert_eq!(ended, 1);
    }

    #[test]
    fn disposed_group_raises_nothing() {
        let group = ControlPointGroup::new(1, "Chat");
        let events = record(&group);
        let a = LocalControlPoint::new(1, "Chat", 50, false);
        group.add_member(a.clone()).unwrap();

        group.dispose();
        a.report(5, true);
        a.end();
        group.set_volume(1);

        assert!(events.lock().is_empty());
        assert_eq!(a.subscriber_count(), 0);
        assert!(matches!(
            group.add_member(LocalControlPoint::new(2, "Chat", 1, false)),
            Err(GroupError::Disposed)
        ));
    }

    #[test]
    fn ended_group_takes_no_members() {
        let group = ControlPointGroup::new(1, "Chat");
        let a = LocalControlPoint::new(1, "Chat", 50, false);
        group.add_member(a.clone()).unwrap();
        a.end();
        assert!(group.is_ended());

        let late = LocalControlPoint::new(2, "Chat", 40, false);
        assert_eq!(group.add_member(late.clone()), Err(GroupError::Ended));
        assert_eq!(late.subscriber_count(), 0);
        assert_eq!(group.member_count(), 0);
    }

    /// Reports a new volume the moment the group subscribes, before the
    /// group has read the member's state.
    struct EagerPoint {
        inner: Arc<LocalControlPoint>,
    }

    impl ControlPoint for EagerPoint {
        fn id(&self) -> i32 {
            self.inner.id()
        }
        fn display_name(&self) -> String {
            self.inner.display_name()
        }
        fn volume(&self) -> u8 {
            // Stale read: the value before the change reported below.
            40
        }
        fn is_muted(&self) -> bool {
            false
        }
        fn set_volume(&self, volume: u8) {
            self.inner.set_volume(volume);
        }
        fn set_muted(&self, muted: bool) {
            self.inner.set_muted(muted);
        }
        fn subscribe(&self, handler: ControlPointHandler) -> SubscriptionId {
            let id = self.inner.subscribe(handler);
            self.inner.report(75, true);
            id
        }
        fn unsubscribe(&self, id: SubscriptionId) -> bool {
            self.inner.unsubscribe(id)
        }
        fn dispose(&self) {
            self.inner.dispose();
        }
    }

    #[test]
    fn report_while_joining_beats_first_member_adoption() {
        let group = ControlPointGroup::new(1, "Game");
        let point = Arc::new(EagerPoint {
            inner: LocalControlPoint::new(3, "Game", 40, false),
        });

        group.add_member(point).unwrap();

        assert_eq!(group.volume(), 75);
        assert!(group.is_muted());
    }

    #[test]
    fn remove_member_keeps_it_alive() {
        let group = ControlPointGroup::new(1, "Chat");
        let events = record(&group);
        let a = LocalControlPoint::new(1, "Chat", 50, false);
        group.add_member(a.clone()).unwrap();

        let removed = group.remove_member(1).unwrap();
        assert_eq!(removed.id(), 1);
        assert_eq!(a.subscriber_count(), 0);
        assert!(group.is_ended());
        assert_eq!(*events.lock(), vec![ControlPointEvent::Ended]);
        assert!(group.remove_member(1).is_none());
    }

    #[test]
    fn concurrent_membership_and_writes() {
        let group = ControlPointGroup::new(1, "Busy");
        group
            .add_member(LocalControlPoint::new(0, "Busy", 50, false))
            .unwrap();

        let writer = {
            let group = Arc::clone(&group);
            thread::spawn(move || {
                for i in 0..200u32 {
                    group.set_volume((i % 100) as u8);
                }
            })
        };
        let churn = {
            let group = Arc::clone(&group);
            thread::spawn(move || {
                for id in 1..100 {
                    let point = LocalControlPoint::new(id, "Busy", 50, false);
                    group.add_member(point.clone()).unwrap();
                    if id % 2 == 0 {
                        point.end();
                    }
                }
            })
        };

        writer.join().unwrap();
        churn.join().unwrap();
        assert_eq!(group.member_count(), 51);
        assert!(!group.is_ended());
    }
}
