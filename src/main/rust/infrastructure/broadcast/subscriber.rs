use std::collections::VecDeque;
use std::sync::{Arc, Mutex};

use tokio::sync::Notify;
use uuid::Uuid;

use crate::domain::value_objects::StreamEvent;

/// Outcome of offering one event to a subscriber queue.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum OfferOutcome {
    /// Queue had room
    Accepted,
    /// Queue was full; the oldest droppable event was discarded
    AcceptedWithDrop,
    /// Queue has been saturated for too many consecutive offers
    Saturated,
    /// Queue already closed (detached or evicted)
    Closed,
}

struct QueueInner {
    events: VecDeque<StreamEvent>,
    consecutive_full: u32,
    dropped: u64,
    last_delivered_sequence: Option<u64>,
    closed: bool,
}

/// Shared state between a subscriber's producer side (Broadcaster) and
/// consumer side (transport).
pub(crate) struct SubscriberShared {
    camera_id: String,
    capacity: usize,
    eviction_threshold: u32,
    queue: Mutex<QueueInner>,
    notify: Notify,
}

impl SubscriberShared {
    pub(crate) fn new(camera_id: &str, capacity: usize, eviction_threshold: u32) -> Self {
        Self {
            camera_id: camera_id.to_string(),
            capacity,
            eviction_threshold,
            queue: Mutex::new(QueueInner {
                events: VecDeque::with_capacity(capacity),
                consecutive_full: 0,
                dropped: 0,
                last_delivered_sequence: None,
                closed: false,
            }),
            notify: Notify::new(),
        }
    }

    pub(crate) fn camera_id(&self) -> &str {
        &self.camera_id
    }

    /// Non-blocking offer. When the queue is full, the oldest Metrics
    /// event is dropped first; if the queue is all Frames, the oldest
    /// Frame goes (freshness matters more than completeness for a live
    /// view). Metrics are never merged, only dropped wholesale.
    pub(crate) fn offer(&self, event: StreamEvent) -> OfferOutcome {
        let mut inner = self.queue.lock().expect("subscriber queue poisoned");

        if inner.closed {
            return OfferOutcome::Closed;
        }

        if inner.events.len() < self.capacity {
            inner.consecutive_full = 0;
            inner.events.push_back(event);
            self.notify.notify_one();
            return OfferOutcome::Accepted;
        }

        inner.consecutive_full += 1;
        if inner.consecutive_full >= self.eviction_threshold {
            return OfferOutcome::Saturated;
        }

        let drop_index = inner
            .events
            .iter()
            .position(|queued| !queued.is_frame())
            .unwrap_or(0);
        inner.events.remove(drop_index);
        inner.dropped += 1;
        inner.events.push_back(event);
        self.notify.notify_one();

        OfferOutcome::AcceptedWithDrop
    }

    /// Consumer side: next event in arrival order, or `None` once the
    /// queue is closed and drained.
    pub(crate) async fn recv(&self) -> Option<StreamEvent> {
        loop {
            let notified = self.notify.notified();

            {
                let mut inner = self.queue.lock().expect("subscriber queue poisoned");
                if let Some(event) = inner.events.pop_front() {
                    if let Some(sequence) = event.sequence() {
                        inner.last_delivered_sequence = Some(sequence);
                    }
                    return Some(event);
                }
                if inner.closed {
                    return None;
                }
            }

            notified.await;
        }
    }

    pub(crate) fn close(&self) {
        let mut inner = self.queue.lock().expect("subscriber queue poisoned");
        inner.closed = true;
        self.notify.notify_waiters();
        self.notify.notify_one();
    }

    pub(crate) fn is_closed(&self) -> bool {
        self.queue
            .lock()
            .expect("subscriber queue poisoned")
            .closed
    }

    pub(crate) fn dropped(&self) -> u64 {
        self.queue
            .lock()
            .expect("subscriber queue poisoned")
            .dropped
    }

    /// A reconfiguration boundary: sequence numbers may jump, so stop
    /// tracking continuity from the previous stream.
    pub(crate) fn reset_sequence(&self) {
        let mut inner = self.queue.lock().expect("subscriber queue poisoned");
        inner.last_delivered_sequence = None;
    }

    pub(crate) fn last_delivered_sequence(&self) -> Option<u64> {
        self.queue
            .lock()
            .expect("subscriber queue poisoned")
            .last_delivered_sequence
    }
}

/// Consumer handle held by one attached client transport.
///
/// Dropping the handle closes the queue, so resources are released on
/// every transport exit path.
pub struct SubscriberHandle {
    id: Uuid,
    shared: Arc<SubscriberShared>,
}

impl SubscriberHandle {
    pub(crate) fn new(id: Uuid, shared: Arc<SubscriberShared>) -> Self {
        Self { id, shared }
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn camera_id(&self) -> &str {
        self.shared.camera_id()
    }

    /// Next event in arrival order; `None` once detached or evicted.
    pub async fn recv(&self) -> Option<StreamEvent> {
        self.shared.recv().await
    }

    pub fn last_delivered_sequence(&self) -> Option<u64> {
        self.shared.last_delivered_sequence()
    }
}

impl Drop for SubscriberHandle {
    fn drop(&mut self) {
        self.shared.close();
    }
}
