use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Mutex;

use tokio::sync::{broadcast, watch};

use crate::model::{Event, Payload, Topic};

/// Multi-producer multi-consumer bus: a bounded broadcast log for
/// in-order delivery, plus a per-topic `watch` slot so a subscriber that
/// only cares about the latest value (a progress bar, a status line) never
/// has to drain a backlog. Delivery is at-most-once per subscriber — a
/// lagged broadcast receiver skips forward rather than replaying.
pub struct EventBus {
    log_tx: broadcast::Sender<Event>,
    latest: Mutex<HashMap<Topic, watch::Sender<Option<Event>>>>,
    next_seq: AtomicU64,
}

impl EventBus {
    pub fn new(capacity: usize) -> Self {
        let (log_tx, _rx) = broadcast::channel(capacity);
        EventBus { log_tx, latest: Mutex::new(HashMap::new()), next_seq: AtomicU64::new(0) }
    }

    pub fn publish(&self, payload: Payload) {
        let topic = payload.topic();
        let seq = self.next_seq.fetch_add(1, Ordering::Relaxed);
        let event = Event { topic, payload, seq };

        let _ = self.log_tx.send(event.clone());

        let mut latest = self.latest.lock().expect("event bus snapshot lock poisoned");
        match latest.get(&topic) {
            Some(tx) => {
                let _ = tx.send(Some(event));
            }
            None => {
                let (tx, _rx) = watch::channel(Some(event));
                latest.insert(topic, tx);
            }
        }
    }

    /// Subscribes to the ordered broadcast log of every topic.
    pub fn subscribe(&self) -> broadcast::Receiver<Event> {
        self.log_tx.subscribe()
    }

    /// Subscribes to the latest-snapshot channel for one topic; `None`
    /// until the first event on that topic is published.
    pub fn watch(&self, topic: Topic) -> watch::Receiver<Option<Event>> {
        let mut latest = self.latest.lock().expect("event bus snapshot lock poisoned");
        latest.entry(topic).or_insert_with(|| watch::channel(None).0).subscribe()
    }

    /// The last event published on `topic`, if any, without subscribing.
    pub fn latest(&self, topic: Topic) -> Option<Event> {
        let latest = self.latest.lock().expect("event bus snapshot lock poisoned");
        latest.get(&topic).and_then(|tx| tx.borrow().clone())
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new(1024)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn subscribers_see_events_in_order() {
        let bus = EventBus::default();
        let mut rx = bus.subscribe();
        bus.publish(Payload::TaskStateChange { node_id: "a".into(), state: "running".into() });
        bus.publish(Payload::TaskStateChange { node_id: "a".into(), state: "succeeded".into() });

        let first = rx.recv().await.unwrap();
        let second = rx.recv().await.unwrap();
        assert!(first.seq < second.seq);
        assert_eq!(first.topic, Topic::TaskStateChange);
    }

    #[tokio::test]
    async fn watch_reflects_only_the_latest_value() {
        let bus = EventBus::default();
        let watcher = bus.watch(Topic::ContextProgress);
        bus.publish(Payload::ContextProgress { current: 1, total: 10 });
        bus.publish(Payload::ContextProgress { current: 5, total: 10 });

        let snapshot = watcher.borrow().clone().unwrap();
        match snapshot.payload {
            Payload::ContextProgress { current, .. } => assert_eq!(current, 5),
            _ => panic!("wrong payload"),
        }
    }

    #[test]
    fn latest_is_none_before_any_publish_on_that_topic() {
        let bus = EventBus::default();
        assert!(bus.latest(Topic::TaskError).is_none());
    }
}
