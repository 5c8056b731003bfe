//! # Live Votes
//!
//! In-process fan-out of vote counts to every open `/live` stream.
//!
//!
//!
//! ## Delivery
//! - Each subscription owns a bounded queue, publishing only ever `try_send`s
//! - A full queue is handled by [`Overflow`]: skip the event for that
//!   subscriber, or drop the subscriber so its stream ends
//! - Topics are item ids, a subscription listens to a set of ids or to all
//! - Per item, counts only go up. A publish carrying a count at or below the
//!   last one sent for that item is discarded, so two racing votes cannot
//!   reach a client out of order
//! - Marks are kept only for items some subscriber listens to
//!
//!
//!
//! ## Epochs
//! A vote reads [`LiveHub::epoch`] before it touches the store and publishes
//! with it. [`LiveHub::reset`] moves to the next epoch, so a count taken
//! before a reset can never land after it and shadow the restarted counts.
//!
//!
//!
//! ## Lifetime
//! Dropping a [`Subscription`] unregisters it. Axum drops the SSE stream when
//! the client goes away, which drops the subscription with it. Shutdown calls
//! [`LiveHub::close`], ending every stream.
//!
//! Nothing is replayed. A client that reconnects fetches `/votes` first.
use std::{
    collections::{HashMap, HashSet},
    fmt,
    str::FromStr,
    sync::{Arc, Mutex, MutexGuard, PoisonError},
};

use serde::Serialize;
use tokio::sync::mpsc::{self, error::TrySendError};
use tracing::debug;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct VoteUpdate {
    pub id: String,
    pub count: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Overflow {
    Drop,
    Disconnect,
}

impl FromStr for Overflow {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "drop" => Ok(Overflow::Drop),
            "disconnect" => Ok(Overflow::Disconnect),
            other => Err(format!("unknown overflow policy {other}")),
        }
    }
}

impl fmt::Display for Overflow {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Overflow::Drop => f.write_str("drop"),
            Overflow::Disconnect => f.write_str("disconnect"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Topics {
    All,
    Only(HashSet<String>),
}

impl Topics {
    fn wants(&self, topic: &str) -> bool {
        match self {
            Topics::All => true,
            Topics::Only(topics) => topics.contains(topic),
        }
    }
}

/// What one publish did, mostly for logs and tests.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct Delivery {
    pub delivered: usize,
    pub dropped: usize,
    pub disconnected: usize,
    pub stale: bool,
}

struct Subscriber {
    topics: Topics,
    tx: mpsc::Sender<VoteUpdate>,
}

#[derive(Default)]
struct Inner {
    next_id: u64,
    subscribers: HashMap<u64, Subscriber>,
    latest: HashMap<String, u64>,
    epoch: u64,
    closed: bool,
}

impl Inner {
    fn wanted(&self, item_id: &str) -> bool {
        self.subscribers
            .values()
            .any(|subscriber| subscriber.topics.wants(item_id))
    }

    fn remove_subscriber(&mut self, id: u64) -> bool {
        let removed = self.subscribers.remove(&id).is_some();
        if removed {
            self.latest.retain(|item_id, _| {
                self.subscribers
                    .values()
                    .any(|subscriber| subscriber.topics.wants(item_id))
            });
        }

        removed
    }
}

pub struct LiveHub {
    inner: Mutex<Inner>,
    capacity: usize,
    overflow: Overflow,
}

impl LiveHub {
    pub fn new(capacity: usize, overflow: Overflow) -> Arc<Self> {
        Arc::new(Self {
            inner: Mutex::new(Inner::default()),
            capacity: capacity.max(1),
            overflow,
        })
    }

    fn lock(&self) -> MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn subscribe(self: &Arc<Self>, topics: Topics) -> Subscription {
        let (tx, rx) = mpsc::channel(self.capacity);
        let mut inner = self.lock();

        let id = inner.next_id;
        inner.next_id += 1;

        // after close the sender is dropped right here and the stream ends at once
        if !inner.closed {
            inner.subscribers.insert(id, Subscriber { topics, tx });
            debug!(subscription = id, "Live subscription opened");
        }

        Subscription {
            id,
            rx,
            hub: Arc::clone(self),
        }
    }

    pub fn epoch(&self) -> u64 {
        self.lock().epoch
    }

    /// `epoch` is the value [`LiveHub::epoch`] returned before the count was
    /// read from the store.
    pub fn publish(&self, epoch: u64, item_id: &str, count: u64) -> Delivery {
        let mut delivery = Delivery::default();
        let mut inner = self.lock();

        if inner.closed {
            return delivery;
        }

        if epoch != inner.epoch {
            debug!(item_id, count, epoch, "Count from before a reset, dropped");
            delivery.stale = true;
            return delivery;
        }

        if !inner.wanted(item_id) {
            inner.latest.remove(item_id);
            return delivery;
        }

        if inner.latest.get(item_id).is_some_and(|&last| count <= last) {
            delivery.stale = true;
            return delivery;
        }
        inner.latest.insert(item_id.to_string(), count);

        let update = VoteUpdate {
            id: item_id.to_string(),
            count,
        };

        let mut gone = Vec::new();
        for (&id, subscriber) in &inner.subscribers {
            if !subscriber.topics.wants(item_id) {
                continue;
            }

            match subscriber.tx.try_send(update.clone()) {
                Ok(()) => delivery.delivered += 1,
                Err(TrySendError::Full(_)) => match self.overflow {
                    Overflow::Drop => {
                        debug!(subscription = id, item_id, "Subscriber lagging, event dropped");
                        delivery.dropped += 1;
                    }
                    Overflow::Disconnect => {
                        debug!(subscription = id, "Subscriber lagging, disconnecting");
                        delivery.disconnected += 1;
                        gone.push(id);
                    }
                },
                Err(TrySendError::Closed(_)) => gone.push(id),
            }
        }

        for id in gone {
            inner.remove_subscriber(id);
        }

        delivery
    }

    /// Starts a new epoch and forgets the per item marks. Needed once
    /// counters restart.
    pub fn reset(&self) {
        let mut inner = self.lock();

        inner.epoch += 1;
        inner.latest.clear();
    }

    pub fn close(&self) {
        let mut inner = self.lock();

        inner.closed = true;
        inner.subscribers.clear();
        inner.latest.clear();
    }

    pub fn subscriber_count(&self) -> usize {
        self.lock().subscribers.len()
    }

    fn unsubscribe(&self, id: u64) {
        if self.lock().remove_subscriber(id) {
            debug!(subscription = id, "Live subscription closed");
        }
    }
}

pub struct Subscription {
    id: u64,
    rx: mpsc::Receiver<VoteUpdate>,
    hub: Arc<LiveHub>,
}

impl Subscription {
    /// `None` once the hub has dropped this subscriber.
    pub async fn recv(&mut self) -> Option<VoteUpdate> {
        self.rx.recv().await
    }

    pub fn try_recv(&mut self) -> Option<VoteUpdate> {
        self.rx.try_recv().ok()
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        self.hub.unsubscribe(self.id);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn only(ids: &[&str]) -> Topics {
        Topics::Only(ids.iter().map(|id| id.to_string()).collect())
    }

    #[test]
    fn no_replay_for_late_subscribers() {
        let hub = LiveHub::new(8, Overflow::Drop);

        hub.publish(0, "photo-1", 1);
        let mut late = hub.subscribe(Topics::All);
        assert_eq!(late.try_recv(), None);

        hub.publish(0, "photo-1", 2);
        assert_eq!(
            late.try_recv(),
            Some(VoteUpdate {
                id: "photo-1".into(),
                count: 2
            })
        );
    }

    #[test]
    fn topics_filter_events() {
        let hub = LiveHub::new(8, Overflow::Drop);
        let mut one = hub.subscribe(only(&["photo-1"]));
        let mut everything = hub.subscribe(Topics::All);

        let delivery = hub.publish(0, "photo-2", 1);

        assert_eq!(delivery.delivered, 1);
        assert_eq!(one.try_recv(), None);
        assert_eq!(everything.try_recv().map(|update| update.id), Some("photo-2".into()));
    }

    #[test]
    fn drop_releases_subscription() {
        let hub = LiveHub::new(8, Overflow::Drop);
        let subscription = hub.subscribe(Topics::All);
        assert_eq!(hub.subscriber_count(), 1);

        drop(subscription);
        assert_eq!(hub.subscriber_count(), 0);
        assert_eq!(hub.publish(0, "photo-1", 1).delivered, 0);
    }

    #[test]
    fn stale_counts_suppressed() {
        let hub = LiveHub::new(8, Overflow::Drop);
        let mut subscription = hub.subscribe(Topics::All);

        hub.publish(0, "photo-1", 5);
        assert!(hub.publish(0, "photo-1", 4).stale);
        assert!(hub.publish(0, "photo-1", 5).stale);
        hub.publish(0, "photo-1", 6);

        let counts: Vec<u64> = std::iter::from_fn(|| subscription.try_recv())
            .map(|update| update.count)
            .collect();
        assert_eq!(counts, vec![5, 6]);
    }

    #[test]
    fn reset_allows_counts_to_restart() {
        let hub = LiveHub::new(8, Overflow::Drop);
        let mut subscription = hub.subscribe(Topics::All);

        hub.publish(0, "photo-1", 9);
        hub.reset();
        hub.publish(hub.epoch(), "photo-1", 1);

        assert_eq!(subscription.try_recv().map(|update| update.count), Some(9));
        assert_eq!(subscription.try_recv().map(|update| update.count), Some(1));
    }

    #[test]
    fn counts_from_before_reset_dropped() {
        let hub = LiveHub::new(8, Overflow::Drop);
        let mut subscription = hub.subscribe(Topics::All);

        let before = hub.epoch();
        hub.reset();
        assert_ne!(hub.epoch(), before);

        assert!(hub.publish(before, "photo-1", 10).stale);
        assert_eq!(hub.publish(hub.epoch(), "photo-1", 1).delivered, 1);

        assert_eq!(subscription.try_recv().map(|update| update.count), Some(1));
        assert_eq!(subscription.try_recv(), None);
    }

    #[test]
    fn marks_kept_only_for_watched_items() {
        let hub = LiveHub::new(8, Overflow::Drop);
        let tracked = |hub: &LiveHub| hub.lock().latest.len();

        hub.publish(0, "nobody-watches", 1);
        assert_eq!(tracked(&hub), 0);

        let one = hub.subscribe(only(&["photo-1"]));
        let everything = hub.subscribe(Topics::All);
        hub.publish(0, "photo-1", 1);
        hub.publish(0, "photo-2", 1);
        assert_eq!(tracked(&hub), 2);

        drop(everything);
        assert_eq!(tracked(&hub), 1);

        drop(one);
        assert_eq!(tracked(&hub), 0);
    }

    #[test]
    fn slow_subscriber_drops_without_blocking_others() {
        let hub = LiveHub::new(1, Overflow::Drop);
        let mut slow = hub.subscribe(Topics::All);
        let mut fast = hub.subscribe(Topics::All);

        hub.publish(0, "photo-1", 1);
        assert!(fast.try_recv().is_some());

        let delivery = hub.publish(0, "photo-1", 2);
        assert_eq!(delivery.delivered, 1);
        assert_eq!(delivery.dropped, 1);

        assert_eq!(slow.try_recv().map(|update| update.count), Some(1));
        assert_eq!(slow.try_recv(), None);
        assert_eq!(fast.try_recv().map(|update| update.count), Some(2));
        assert_eq!(hub.subscriber_count(), 2);
    }

    #[tokio::test]
    async fn slow_subscriber_disconnected() {
        let hub = LiveHub::new(1, Overflow::Disconnect);
        let mut slow = hub.subscribe(Topics::All);

        hub.publish(0, "photo-1", 1);
        let delivery = hub.publish(0, "photo-1", 2);

        assert_eq!(delivery.disconnected, 1);
        assert_eq!(hub.subscriber_count(), 0);
        assert_eq!(slow.recv().await.map(|update| update.count), Some(1));
        assert_eq!(slow.recv().await, None);
    }

    #[tokio::test]
    async fn close_ends_streams() {
        let hub = LiveHub::new(4, Overflow::Drop);
        let mut open = hub.subscribe(Topics::All);

        hub.close();
        assert_eq!(open.recv().await, None);

        let mut after = hub.subscribe(Topics::All);
        assert_eq!(after.recv().await, None);
        assert_eq!(hub.publish(0, "photo-1", 1), Delivery::default());
    }

    #[test]
    fn overflow_parses() {
        assert_eq!("Drop".parse::<Overflow>(), Ok(Overflow::Drop));
        assert_eq!("disconnect".parse::<Overflow>(), Ok(Overflow::Disconnect));
        assert!("block".parse::<Overflow>().is_err());
    }
}
