//! Broadcasts feed events to in-process listeners.

use crate::types::{ContentItem, ItemId, SubscriberId};
use crossbeam_channel::{bounded, Sender};
use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};

use super::types::{DropReason, FeedEvent, ItemSummary, ListenerConfig, ListenerHandle, ListenerId};

struct Listener {
    config: ListenerConfig,
    sender: Sender<FeedEvent>,
}

impl Listener {
    /// False if the buffer is full or the receiver is gone.
    fn try_send(&self, event: FeedEvent) -> bool {
        self.sender.try_send(event).is_ok()
    }
}

/// Fan-out of feed events with bounded per-listener buffers.
pub struct EventBus {
    listeners: RwLock<HashMap<ListenerId, Listener>>,
    next_id: AtomicU64,
}

impl EventBus {
    pub fn new() -> Self {
        Self {
            listeners: RwLock::new(HashMap::new()),
            next_id: AtomicU64::new(1),
        }
    }

    /// Register a listener.
    pub fn listen(&self, config: ListenerConfig) -> ListenerHandle {
        let id = ListenerId(self.next_id.fetch_add(1, Ordering::SeqCst));
        let (sender, receiver) = bounded(config.buffer_size.max(1));

        self.listeners
            .write()
            .insert(id, Listener { config, sender });

        ListenerHandle { id, receiver }
    }

    /// Remove a listener.
    pub fn unlisten(&self, id: ListenerId) {
        if let Some(listener) = self.listeners.write().remove(&id) {
            let _ = listener.sender.try_send(FeedEvent::Dropped {
                reason: DropReason::Unlistened,
            });
        }
    }

    pub fn listener_count(&self) -> usize {
        self.listeners.read().len()
    }

    pub fn published(&self, item: &ContentItem) {
        let event = FeedEvent::Published {
            item: ItemSummary::from_item(item),
        };
        self.broadcast(|l| l.config.filter.include_published, event);
    }

    pub fn delivered(&self, subscriber: &SubscriberId, item: ItemId) {
        let event = FeedEvent::Delivered {
            subscriber: subscriber.clone(),
            item,
        };
        self.broadcast(|l| l.config.filter.wants_subscriber(subscriber), event);
    }

    pub fn rebuilt(&self, subscriber: &SubscriberId, len: usize) {
        let event = FeedEvent::TimelineRebuilt {
            subscriber: subscriber.clone(),
            len,
        };
        self.broadcast(|l| l.config.filter.wants_subscriber(subscriber), event);
    }

    pub fn removed(&self, subscriber: &SubscriberId) {
        let event = FeedEvent::SubscriberRemoved {
            subscriber: subscriber.clone(),
        };
        self.broadcast(|l| l.config.filter.wants_subscriber(subscriber), event);
    }

    /// Send to every matching listener, dropping those that cannot keep up.
    fn broadcast<F>(&self, filter: F, event: FeedEvent)
    where
        F: Fn(&Listener) -> bool,
    {
        let mut to_remove = Vec::new();

        {
            let listeners = self.listeners.read();
            if listeners.is_empty() {
                return;
            }
            for (id, listener) in listeners.iter() {
                if filter(listener) && !listener.try_send(event.clone()) {
                    to_remove.push(*id);
                }
            }
        }

        if !to_remove.is_empty() {
            let mut listeners = self.listeners.write();
            for id in to_remove {
                if let Some(listener) = listeners.remove(&id) {
                    tracing::warn!(listener = id.0, "dropping slow event listener");
                    let _ = listener.sender.try_send(FeedEvent::Dropped {
                        reason: DropReason::BufferOverflow,
                    });
                }
            }
        }
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new()
    }
}
