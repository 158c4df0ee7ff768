//! Owner-scoped, in-process notification fan-out.

use std::collections::HashMap;
use std::sync::{PoisonError, RwLock};

use lipsync_core::types::OwnerId;
use tokio::sync::mpsc::error::TrySendError;
use tokio::sync::{broadcast, mpsc};

use crate::event::{Envelope, JobEvent};
use crate::Notifier;

/// Default buffer for each owner subscription.
const DEFAULT_SUBSCRIBER_CAPACITY: usize = 64;

/// Default buffer for the firehose channel.
const DEFAULT_FIREHOSE_CAPACITY: usize = 1024;

/// Fans job events out to the subscribers of the owning principal.
///
/// Each subscription has a bounded buffer. A subscriber that falls behind
/// loses events rather than slowing the publisher, and a subscriber whose
/// receiver was dropped is removed on the next publish to its owner.
/// Designed to be wrapped in `Arc` and shared.
pub struct NotificationHub {
    subscribers: RwLock<HashMap<OwnerId, Vec<mpsc::Sender<JobEvent>>>>,
    firehose: broadcast::Sender<Envelope>,
    capacity: usize,
}

impl NotificationHub {
    pub fn new(capacity: usize) -> Self {
        let (firehose, _) = broadcast::channel(DEFAULT_FIREHOSE_CAPACITY);
        Self {
            subscribers: RwLock::new(HashMap::new()),
            firehose,
            capacity: capacity.max(1),
        }
    }

    /// Register a subscriber for one owner's events.
    pub fn subscribe(&self, owner_id: OwnerId) -> mpsc::Receiver<JobEvent> {
        let (tx, rx) = mpsc::channel(self.capacity);
        self.subscribers
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .entry(owner_id)
            .or_default()
            .push(tx);
        rx
    }

    /// Receive every published event regardless of owner.
    ///
    /// Slow receivers observe `RecvError::Lagged` instead of blocking
    /// publishers.
    pub fn subscribe_all(&self) -> broadcast::Receiver<Envelope> {
        self.firehose.subscribe()
    }

    /// Number of live subscriptions for an owner.
    pub fn subscriber_count(&self, owner_id: OwnerId) -> usize {
        self.subscribers
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(&owner_id)
            .map_or(0, |subs| subs.iter().filter(|tx| !tx.is_closed()).count())
    }

    /// Drop every owner subscription. Receivers see the channel close.
    pub fn shutdown_all(&self) {
        let mut subscribers = self
            .subscribers
            .write()
            .unwrap_or_else(PoisonError::into_inner);
        let count: usize = subscribers.values().map(Vec::len).sum();
        subscribers.clear();
        tracing::info!(count, "Closed all notification subscriptions");
    }

    /// Deliver to the owner's subscribers. Returns how many accepted it.
    fn deliver(&self, owner_id: OwnerId, event: &JobEvent) -> usize {
        let mut subscribers = self
            .subscribers
            .write()
            .unwrap_or_else(PoisonError::into_inner);
        let Some(subs) = subscribers.get_mut(&owner_id) else {
            return 0;
        };

        let mut delivered = 0;
        subs.retain(|tx| match tx.try_send(event.clone()) {
            Ok(()) => {
                delivered += 1;
                true
            }
            Err(TrySendError::Full(_)) => {
                tracing::debug!(
                    owner_id = %owner_id,
                    job_id = %event.job_id,
                    "Subscriber buffer full, dropping event"
                );
                true
            }
            Err(TrySendError::Closed(_)) => false,
        });
        if subs.is_empty() {
            subscribers.remove(&owner_id);
        }
        delivered
    }
}

impl Default for NotificationHub {
    fn default() -> Self {
        Self::new(DEFAULT_SUBSCRIBER_CAPACITY)
    }
}

impl Notifier for NotificationHub {
    fn publish(&self, owner_id: OwnerId, event: JobEvent) {
        let delivered = self.deliver(owner_id, &event);
        tracing::trace!(
            owner_id = %owner_id,
            job_id = %event.job_id,
            event_type = %event.event_type,
            delivered,
            "Published job event"
        );
        // Zero firehose receivers is not an error.
        let _ = self.firehose.send(Envelope { owner_id, event });
    }
}

#[cfg(test)]
mod tests {
    use lipsync_core::types::JobId;

    use super::*;

    #[tokio::test]
    async fn publish_reaches_only_the_owning_subscriber() {
        let hub = NotificationHub::default();
        let alice = OwnerId::new_v4();
        let bob = OwnerId::new_v4();
        let mut alice_rx = hub.subscribe(alice);
        let mut bob_rx = hub.subscribe(bob);

        let id = JobId::new_v4();
        hub.publish(alice, JobEvent::started(id));

        let received = alice_rx.recv().await.expect("alice should receive");
        assert_eq!(received.job_id, id);
        assert!(bob_rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn multiple_subscribers_for_one_owner_all_receive() {
        let hub = NotificationHub::default();
        let owner = OwnerId::new_v4();
        let mut rx1 = hub.subscribe(owner);
        let mut rx2 = hub.subscribe(owner);

        hub.publish(owner, JobEvent::progress(JobId::new_v4(), "working"));

        assert_eq!(rx1.recv().await.unwrap().message, "working");
        assert_eq!(rx2.recv().await.unwrap().message, "working");
    }

    #[test]
    fn publish_with_no_subscribers_does_not_panic() {
        let hub = NotificationHub::default();
        hub.publish(OwnerId::new_v4(), JobEvent::started(JobId::new_v4()));
    }

    #[test]
    fn full_subscriber_drops_events_without_blocking() {
        let hub = NotificationHub::new(1);
        let owner = OwnerId::new_v4();
        let mut rx = hub.subscribe(owner);

        hub.publish(owner, JobEvent::progress(JobId::new_v4(), "first"));
        hub.publish(owner, JobEvent::progress(JobId::new_v4(), "second"));

        assert_eq!(rx.try_recv().unwrap().message, "first");
        assert!(rx.try_recv().is_err());
        assert_eq!(hub.subscriber_count(owner), 1);
    }

    #[test]
    fn closed_subscribers_are_pruned_on_publish() {
        let hub = NotificationHub::default();
        let owner = OwnerId::new_v4();
        let rx = hub.subscribe(owner);
        drop(rx);

        hub.publish(owner, JobEvent::started(JobId::new_v4()));

        assert_eq!(hub.subscriber_count(owner), 0);
        assert!(hub.subscribers.read().unwrap().get(&owner).is_none());
    }

    #[tokio::test]
    async fn firehose_sees_every_owner() {
        let hub = NotificationHub::default();
        let mut all = hub.subscribe_all();
        let a = OwnerId::new_v4();
        let b = OwnerId::new_v4();

        hub.publish(a, JobEvent::started(JobId::new_v4()));
        hub.publish(b, JobEvent::started(JobId::new_v4()));

        assert_eq!(all.recv().await.unwrap().owner_id, a);
        assert_eq!(all.recv().await.unwrap().owner_id, b);
    }

    #[tokio::test]
    async fn shutdown_all_closes_receivers() {
        let hub = NotificationHub::default();
        let owner = OwnerId::new_v4();
        let mut rx = hub.subscribe(owner);

        hub.shutdown_all();

        assert!(rx.recv().await.is_none());
        assert_eq!(hub.subscriber_count(owner), 0);
    }
}
