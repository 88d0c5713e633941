//! Broadcast event bus with a bounded replay ring.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex, MutexGuard};

use chrono::Utc;
use tokio::sync::broadcast::{self, Receiver, Sender};
use tracing::error;

use crate::payloads::{DEFAULT_REPLAY_CAPACITY, Event, EventEnvelope, EventId};

/// Shared event bus built on top of `tokio::broadcast`.
///
/// Publication is serialised: identifiers, the replay ring and the broadcast
/// channel all observe events in the same order, even when several worker
/// threads publish at once.
#[derive(Clone)]
pub struct EventBus {
    sender: Sender<EventEnvelope>,
    state: Arc<Mutex<BusState>>,
    replay_capacity: usize,
}

struct BusState {
    buffer: VecDeque<EventEnvelope>,
    next_id: EventId,
}

impl EventBus {
    /// Construct a new bus with the provided broadcast capacity.
    ///
    /// The broadcast channel uses the same capacity as the in-memory replay
    /// buffer, ensuring dropped events impact both structures consistently.
    ///
    /// # Panics
    ///
    /// Panics if `capacity` is zero.
    #[must_use]
    pub fn with_capacity(capacity: usize) -> Self {
        assert!(capacity > 0, "event bus capacity must be positive");
        let (sender, _) = broadcast::channel(capacity);
        Self {
            sender,
            state: Arc::new(Mutex::new(BusState {
                buffer: VecDeque::with_capacity(capacity),
                next_id: 1,
            })),
            replay_capacity: capacity,
        }
    }

    /// Construct a bus with the default in-memory buffer size.
    #[must_use]
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_REPLAY_CAPACITY)
    }

    /// Publish a new event to the bus, assigning it a sequential identifier.
    pub fn publish(&self, event: Event) -> EventId {
        let mut state = self.lock_state();
        let id = state.next_id;
        state.next_id += 1;
        let envelope = EventEnvelope {
            id,
            timestamp: Utc::now(),
            event,
        };

        if state.buffer.len() == self.replay_capacity {
            state.buffer.pop_front();
        }
        state.buffer.push_back(envelope.clone());

        // No live subscribers is fine; the replay ring keeps the event.
        let _ = self.sender.send(envelope);
        id
    }

    /// Subscribe to the bus, replaying any buffered events newer than `since_id`.
    #[must_use]
    pub fn subscribe(&self, since_id: Option<EventId>) -> EventStream {
        let state = self.lock_state();
        let backlog = since_id.map_or_else(VecDeque::new, |since| {
            state
                .buffer
                .iter()
                .filter(|item| item.id > since)
                .cloned()
                .collect()
        });
        let receiver = self.sender.subscribe();
        drop(state);
        EventStream {
            backlog,
            receiver,
            last_seen: since_id,
        }
    }

    /// Returns the last assigned identifier, if any events have been published.
    #[must_use]
    pub fn last_event_id(&self) -> Option<EventId> {
        self.lock_state().buffer.back().map(|event| event.id)
    }

    fn lock_state(&self) -> MutexGuard<'_, BusState> {
        match self.state.lock() {
            Ok(guard) => guard,
            Err(poisoned) => {
                error!("event bus mutex poisoned; continuing with recovered guard");
                poisoned.into_inner()
            }
        }
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new()
    }
}

/// Stream wrapper that yields events either from the replay backlog or from the
/// live broadcast channel.
pub struct EventStream {
    backlog: VecDeque<EventEnvelope>,
    receiver: Receiver<EventEnvelope>,
    last_seen: Option<EventId>,
}

impl EventStream {
    /// Receive the next event, respecting the replay backlog first.
    ///
    /// Returns `None` once every bus handle has been dropped.
    pub async fn next(&mut self) -> Option<EventEnvelope> {
        if let Some(event) = self.backlog.pop_front() {
            self.last_seen = Some(event.id);
            return Some(event);
        }

        loop {
            match self.receiver.recv().await {
                Ok(event) => {
                    // Skip live copies of events already delivered from the backlog.
                    if self.last_seen.is_some_and(|seen| event.id <= seen) {
                        continue;
                    }
                    self.last_seen = Some(event.id);
                    return Some(event);
                }
                Err(broadcast::error::RecvError::Lagged(_)) => {}
                Err(broadcast::error::RecvError::Closed) => return None,
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;
    use std::time::Duration;
    use tokio::time::timeout;

    const RECV_TIMEOUT: Duration = Duration::from_secs(1);

    fn sample_event(completed: usize) -> Event {
        Event::FileCopied {
            volume: "/media/stick".into(),
            completed,
            total: 500,
        }
    }

    #[tokio::test]
    async fn sequential_ids_and_replay() {
        let bus = EventBus::with_capacity(16);

        let mut last_id = 0;
        for i in 0..5 {
            last_id = bus.publish(sample_event(i));
        }
        assert_eq!(last_id, 5);
        assert_eq!(bus.last_event_id(), Some(5));

        let mut stream = bus.subscribe(Some(2));
        let mut received = Vec::new();
        for _ in 0..3 {
            if let Some(event) = stream.next().await {
                received.push(event.id);
            }
        }
        assert_eq!(received, vec![3, 4, 5]);
    }

    #[tokio::test]
    async fn replay_ring_drops_oldest_events() {
        let bus = EventBus::with_capacity(2);
        for i in 0..4 {
            let _ = bus.publish(sample_event(i));
        }
        let mut stream = bus.subscribe(Some(0));
        let first = stream.next().await.map(|event| event.id);
        assert_eq!(first, Some(3));
    }

    #[tokio::test]
    async fn concurrent_publishers_deliver_unique_ordered_ids() {
        let bus = EventBus::with_capacity(1_024);
        let mut stream = bus.subscribe(None);

        std::thread::scope(|scope| {
            for worker in 0..4 {
                let bus = bus.clone();
                scope.spawn(move || {
                    for i in 0..100 {
                        let _ = bus.publish(sample_event(worker * 100 + i));
                    }
                });
            }
        });

        let mut ids = Vec::new();
        while ids.len() < 400 {
            match timeout(RECV_TIMEOUT, stream.next()).await {
                Ok(Some(event)) => ids.push(event.id),
                _ => break,
            }
        }
        assert_eq!(ids.len(), 400);
        let unique: HashSet<_> = ids.iter().copied().collect();
        assert_eq!(unique.len(), 400);
        assert!(ids.windows(2).all(|pair| pair[0] < pair[1]));
    }

    #[tokio::test]
    async fn stream_ends_when_bus_is_dropped() {
        let bus = EventBus::with_capacity(4);
        let mut stream = bus.subscribe(None);
        drop(bus);
        assert!(stream.next().await.is_none());
    }
}
