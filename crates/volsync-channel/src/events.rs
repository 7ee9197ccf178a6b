use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use parking_lot::Mutex;
use volsync_frame::Message;
use volsync_transport::Endpoint;

use crate::error::DisconnectReason;
use crate::state::ConnectionState;

/// Notifications published by a [`Channel`](crate::Channel).
#[derive(Debug, Clone, PartialEq)]
pub enum ChannelEvent {
    /// The connection state changed.
    StateChanged(ConnectionState),
    /// A handshake completed on `endpoint`. Raised once per connection.
    DeviceDiscovered(Endpoint),
    /// A frame decoded successfully.
    MessageReceived(Message),
    /// The link went down or could not be established.
    Error(DisconnectReason),
}

pub type ChannelHandler = Arc<dyn Fn(&ChannelEvent) + Send + Sync>;

/// Token returned by `subscribe`, used to unsubscribe later.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriptionId(u64);

#[derive(Default)]
pub(crate) struct Handlers {
    next_id: AtomicU64,
    entries: Mutex<Vec<(SubscriptionId, ChannelHandler)>>,
}

impl Handlers {
    pub(crate) fn subscribe(&self, handler: ChannelHandler) -> SubscriptionId {
        let id = SubscriptionId(self.next_id.fetch_add(1, Ordering::Relaxed));
        self.entries.lock().push((id, handler));
        id
    }

    pub(crate) fn unsubscribe(&self, id: SubscriptionId) -> bool {
        let mut entries = self.entries.lock();
        let before = entries.len();
        entries.retain(|(existing, _)| *existing != id);
        entries.len() != before
    }

    /// Call every handler registered at the time of the call.
    ///
    /// Runs on a snapshot so handlers may subscribe or unsubscribe freely.
    pub(crate) fn emit(&self, event: &ChannelEvent) {
        let snapshot: Vec<ChannelHandler> = self
            .entries
            .lock()
            .iter()
            .map(|(_, handler)| Arc::clone(handler))
            .collect();
        for handler in snapshot {
            handler(event);
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::AtomicUsize;

    use super::*;

    #[test]
    fn unsubscribed_handler_is_not_called() {
        let handlers = Handlers::default();
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&calls);
        let id = handlers.subscribe(Arc::new(move |_: &ChannelEvent| {
            counter.fetch_add(1, Ordering::SeqCst);
        }));

        handlers.emit(&ChannelEvent::MessageReceived(Message::Heartbeat));
        assert!(handlers.unsubscribe(id));
        assert!(!handlers.unsubscribe(id));
        handlers.emit(&ChannelEvent::MessageReceived(Message::Heartbeat));

        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn handler_may_subscribe_during_emit() {
        let handlers = Arc::new(Handlers::default());
        let inner = Arc::clone(&handlers);
        handlers.subscribe(Arc::new(move |_: &ChannelEvent| {
            inner.subscribe(Arc::new(|_: &ChannelEvent| {}));
        }));

        handlers.emit(&ChannelEvent::StateChanged(ConnectionState::Discovering));
        assert_eq!(handlers.entries.lock().len(), 2);
    }
}
