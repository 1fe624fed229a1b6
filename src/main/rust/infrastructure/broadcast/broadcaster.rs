use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use uuid::Uuid;

use super::subscriber::{OfferOutcome, SubscriberHandle, SubscriberShared};
use crate::domain::ports::{EventFanout, MetricsReporter};
use crate::domain::value_objects::StreamEvent;

/// Fan-out broadcaster: delivers every event produced by the active
/// pipeline to all attached subscribers without letting one slow
/// subscriber stall delivery to others or to the pipeline.
///
/// Ingestion is non-blocking and O(number of subscribers) per event;
/// consumption happens on each subscriber's own path.
pub struct Broadcaster {
    subscribers: Mutex<HashMap<Uuid, Arc<SubscriberShared>>>,
    queue_capacity: usize,
    eviction_threshold: u32,
    metrics: Arc<dyn MetricsReporter>,
}

impl Broadcaster {
    pub fn new(
        queue_capacity: usize,
        eviction_threshold: u32,
        metrics: Arc<dyn MetricsReporter>,
    ) -> Self {
        Self {
            subscribers: Mutex::new(HashMap::new()),
            queue_capacity,
            eviction_threshold,
            metrics,
        }
    }

    /// Attach a subscriber for the given camera. Attaching to a camera
    /// with no active pipeline is fine: the stream stays empty until
    /// activation.
    pub fn attach(&self, camera_id: &str) -> SubscriberHandle {
        let id = Uuid::new_v4();
        let shared = Arc::new(SubscriberShared::new(
            camera_id,
            self.queue_capacity,
            self.eviction_threshold,
        ));

        self.subscribers
            .lock()
            .expect("subscriber map poisoned")
            .insert(id, shared.clone());

        self.metrics.report_subscriber_attached();
        tracing::debug!(subscriber_id = %id, camera_id, "Subscriber attached");

        SubscriberHandle::new(id, shared)
    }

    /// Detach and release the subscriber's queue. Idempotent.
    pub fn detach(&self, subscriber_id: Uuid) {
        let removed = self
            .subscribers
            .lock()
            .expect("subscriber map poisoned")
            .remove(&subscriber_id);

        if let Some(shared) = removed {
            shared.close();
            self.metrics.report_subscriber_detached();
            tracing::debug!(subscriber_id = %subscriber_id, "Subscriber detached");
        }
    }

    /// Offer one event to every subscriber of the camera. Saturated
    /// subscribers are evicted (treated as unresponsive); eviction is
    /// reported, not retried.
    pub fn publish(&self, camera_id: &str, event: &StreamEvent) {
        let mut evicted = Vec::new();

        {
            let mut subscribers = self.subscribers.lock().expect("subscriber map poisoned");

            subscribers.retain(|id, shared| {
                if shared.camera_id() != camera_id {
                    return true;
                }

                // Transport dropped its handle; reap lazily
                if shared.is_closed() {
                    return false;
                }

                match shared.offer(event.clone()) {
                    OfferOutcome::Accepted => {
                        self.metrics.report_event_broadcast();
                        true
                    }
                    OfferOutcome::AcceptedWithDrop => {
                        self.metrics.report_event_broadcast();
                        self.metrics.report_event_dropped();
                        true
                    }
                    OfferOutcome::Saturated => {
                        shared.close();
                        evicted.push(*id);
                        false
                    }
                    OfferOutcome::Closed => false,
                }
            });
        }

        for id in evicted {
            self.metrics.report_subscriber_evicted();
            tracing::warn!(
                subscriber_id = %id,
                camera_id,
                "Evicting unresponsive subscriber"
            );
        }
    }

    /// Announce a sequence discontinuity (reconfiguration boundary) to
    /// every subscriber of the camera.
    pub fn mark_discontinuity(&self, camera_id: &str) {
        let subscribers = self.subscribers.lock().expect("subscriber map poisoned");

        for shared in subscribers.values() {
            if shared.camera_id() == camera_id {
                shared.reset_sequence();
            }
        }

        tracing::debug!(camera_id, "Sequence discontinuity announced");
    }

    pub fn subscriber_count(&self, camera_id: &str) -> usize {
        self.subscribers
            .lock()
            .expect("subscriber map poisoned")
            .values()
            .filter(|shared| shared.camera_id() == camera_id && !shared.is_closed())
            .count()
    }

    pub fn total_subscribers(&self) -> usize {
        self.subscribers
            .lock()
            .expect("subscriber map poisoned")
            .len()
    }
}

impl EventFanout for Broadcaster {
    fn publish(&self, camera_id: &str, event: &StreamEvent) {
        Broadcaster::publish(self, camera_id, event);
    }

    fn mark_discontinuity(&self, camera_id: &str) {
        Broadcaster::mark_discontinuity(self, camera_id);
    }
}
