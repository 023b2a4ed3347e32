//! Subscriber slot and read-only views.

use crate::tags::TagSet;
use crate::timeline::Timeline;
use crate::types::{Role, SubscriberId, SubscriberSpec};
use parking_lot::{Mutex, MutexGuard};
use serde::{Deserialize, Serialize};

/// Mutable part of a subscriber, guarded by the slot lock.
#[derive(Debug, Default)]
pub struct SubscriberState {
    pub interests: TagSet,
    pub timeline: Timeline,

    /// Set once the slot leaves the registry. Callers that fetched the slot
    /// earlier must not touch it after this.
    pub detached: bool,
}

/// One registered participant.
///
/// The mutex serializes every timeline mutation for this subscriber:
/// live delivery, backfill and resync never interleave on the same slot,
/// while different slots proceed independently.
#[derive(Debug)]
pub struct SubscriberSlot {
    id: SubscriberId,
    role: Role,
    state: Mutex<SubscriberState>,
}

impl SubscriberSlot {
    pub fn new(spec: SubscriberSpec) -> Self {
        // Journalists never carry interests.
        let interests = match spec.role {
            Role::Reader => spec.interests,
            Role::Journalist => TagSet::new(),
        };

        Self {
            id: spec.id,
            role: spec.role,
            state: Mutex::new(SubscriberState {
                interests,
                timeline: Timeline::new(),
                detached: false,
            }),
        }
    }

    pub fn id(&self) -> &SubscriberId {
        &self.id
    }

    pub fn role(&self) -> Role {
        self.role
    }

    pub fn is_reader(&self) -> bool {
        self.role == Role::Reader
    }

    pub fn lock(&self) -> MutexGuard<'_, SubscriberState> {
        self.state.lock()
    }

    /// Copy of the current state for callers outside the engine.
    pub fn view(&self) -> SubscriberView {
        let state = self.state.lock();
        SubscriberView {
            id: self.id.clone(),
            role: self.role,
            interests: state.interests.clone(),
            timeline_len: state.timeline.len(),
        }
    }
}

/// Point-in-time description of a subscriber.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubscriberView {
    pub id: SubscriberId,
    pub role: Role,
    pub interests: TagSet,
    pub timeline_len: usize,
}
