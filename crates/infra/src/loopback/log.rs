//! Append-only log with consumer groups
//!
//! Plain data structure; the server wraps it in a mutex and adds blocking.

use std::collections::{BTreeMap, HashMap, VecDeque};
use std::time::Duration;

use layercache_domain::{EventId, StreamEvent};
use tokio::time::Instant;

use crate::loopback::server::GroupError;

#[derive(Debug, Clone)]
struct PendingEntry {
    consumer: String,
    delivered_at: Instant,
    deliveries: u32,
}

/// Delivery state of one consumer group
#[derive(Debug)]
struct ConsumerGroup {
    last_delivered: EventId,
    pending: BTreeMap<EventId, PendingEntry>,
}

/// Entries of one stream plus its groups
#[derive(Debug, Default)]
pub(crate) struct StreamLog {
    entries: VecDeque<(EventId, Vec<u8>)>,
    last_id: EventId,
    groups: HashMap<String, ConsumerGroup>,
}

impl StreamLog {
    pub(crate) fn len(&self) -> usize {
        self.entries.len()
    }

    /// Append with an id after both `last_id` and `now_millis`, then trim
    /// the oldest entries beyond `max_len`
    pub(crate) fn append(&mut self, payload: Vec<u8>, max_len: usize, now_millis: u64) -> EventId {
        let id = self.last_id.next(now_millis);
        self.last_id = id;
        self.entries.push_back((id, payload));
        while self.entries.len() > max_len.max(1) {
            self.entries.pop_front();
        }
        id
    }

    /// New groups start after the last appended entry
    pub(crate) fn create_group(&mut self, group: &str) -> bool {
        if self.groups.contains_key(group) {
            return false;
        }
        self.groups.insert(
            group.to_string(),
            ConsumerGroup { last_delivered: self.last_id, pending: BTreeMap::new() },
        );
        true
    }

    pub(crate) fn has_group(&self, group: &str) -> bool {
        self.groups.contains_key(group)
    }

    /// Deliver up to `count` never-delivered entries to `consumer`
    pub(crate) fn read_new(
        &mut self,
        stream: &str,
        group: &str,
        consumer: &str,
        count: usize,
        now: Instant,
    ) -> Result<Vec<StreamEvent>, GroupError> {
        let state = self.groups.get_mut(group).ok_or(GroupError::NoGroup)?;
        let events: Vec<StreamEvent> = self
            .entries
            .iter()
            .filter(|(id, _)| *id > state.last_delivered)
            .take(count)
            .map(|(id, payload)| StreamEvent::new(stream, *id, payload.clone()))
            .collect();

        for event in &events {
            state.last_delivered = event.id;
            state.pending.insert(
                event.id,
                PendingEntry { consumer: consumer.to_string(), delivered_at: now, deliveries: 1 },
            );
        }
        Ok(events)
    }

    /// Move entries pending for at least `min_idle` to `consumer`
    ///
    /// Pending ids whose entry was trimmed away are dropped from the pending
    /// list instead of being delivered.
    pub(crate) fn claim_idle(
        &mut self,
        stream: &str,
        group: &str,
        consumer: &str,
        min_idle: Duration,
        count: usize,
        now: Instant,
    ) -> Result<Vec<StreamEvent>, GroupError> {
        let state = self.groups.get_mut(group).ok_or(GroupError::NoGroup)?;
        let idle: Vec<EventId> = state
            .pending
            .iter()
            .filter(|(_, entry)| now.saturating_duration_since(entry.delivered_at) >= min_idle)
            .map(|(id, _)| *id)
            .take(count)
            .collect();

        let mut events = Vec::with_capacity(idle.len());
        for id in idle {
            let payload = self
                .entries
                .iter()
                .find(|(entry_id, _)| *entry_id == id)
                .map(|(_, payload)| payload.clone());
            match payload {
                Some(payload) => {
                    if let Some(entry) = state.pending.get_mut(&id) {
                        entry.consumer = consumer.to_string();
                        entry.delivered_at = now;
                        entry.deliveries += 1;
                    }
                    events.push(StreamEvent::new(stream, id, payload));
                }
                None => {
                    state.pending.remove(&id);
                }
            }
        }
        Ok(events)
    }

    pub(crate) fn ack(&mut self, group: &str, id: EventId) -> bool {
        self.groups.get_mut(group).is_some_and(|state| state.pending.remove(&id).is_some())
    }

    /// Entries with ids at or after `start`, in order
    pub(crate) fn range(&self, stream: &str, start: EventId, count: usize) -> Vec<StreamEvent> {
        self.entries
            .iter()
            .filter(|(id, _)| *id >= start)
            .take(count)
            .map(|(id, payload)| StreamEvent::new(stream, *id, payload.clone()))
            .collect()
    }

    /// `(consumer, deliveries)` per pending id of `group`
    pub(crate) fn pending(&self, group: &str) -> Vec<(EventId, String, u32)> {
        self.groups
            .get(group)
            .map(|state| {
                state
                    .pending
                    .iter()
                    .map(|(id, entry)| (*id, entry.consumer.clone(), entry.deliveries))
                    .collect()
            })
            .unwrap_or_default()
    }
}
