use std::collections::VecDeque;
use std::sync::{Arc, Condvar, Mutex, Weak};
use std::time::{Duration, Instant};

use super::types::StatusEvent;

/// Per-subscriber queue bound. Status display is best-effort; when a
/// subscriber falls this far behind, its oldest events are dropped.
const SUBSCRIBER_QUEUE_CAP: usize = 512;

struct Channel {
    queue: Mutex<VecDeque<StatusEvent>>,
    ready: Condvar,
}

/// Fan-out point for task and inventory events.
///
/// `publish` never blocks: each subscriber gets its own bounded queue with a
/// drop-oldest overflow policy, and per-subscriber delivery preserves publish
/// order. Dropped subscriptions are pruned on the next publish.
#[derive(Clone, Default)]
pub struct EventBus {
    subscribers: Arc<Mutex<Vec<Weak<Channel>>>>,
}

impl EventBus {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn subscribe(&self) -> Subscription {
        let channel = Arc::new(Channel {
            queue: Mutex::new(VecDeque::new()),
            ready: Condvar::new(),
        });
        if let Ok(mut subscribers) = self.subscribers.lock() {
            subscribers.push(Arc::downgrade(&channel));
        }
        Subscription { channel }
    }

    pub fn publish(&self, event: StatusEvent) {
        let Ok(mut subscribers) = self.subscribers.lock() else {
            return;
        };
        subscribers.retain(|weak| {
            let Some(channel) = weak.upgrade() else {
                return false;
            };
            if let Ok(mut queue) = channel.queue.lock() {
                if queue.len() >= SUBSCRIBER_QUEUE_CAP {
                    queue.pop_front();
                }
                queue.push_back(event.clone());
            }
            channel.ready.notify_one();
            true
        });
    }
}

/// Receiving end of one bus subscription.
pub struct Subscription {
    channel: Arc<Channel>,
}

impl Subscription {
    /// Pop the next event without blocking.
    pub fn try_recv(&self) -> Option<StatusEvent> {
        self.channel
            .queue
            .lock()
            .ok()
            .and_then(|mut queue| queue.pop_front())
    }

    /// Wait up to `timeout` for the next event.
    pub fn recv_timeout(&self, timeout: Duration) -> Option<StatusEvent> {
        let deadline = Instant::now() + timeout;
        let mut queue = self.channel.queue.lock().ok()?;
        loop {
            if let Some(event) = queue.pop_front() {
                return Some(event);
            }
            let now = Instant::now();
            if now >= deadline {
                return None;
            }
            let (guard, _) = self
                .channel
                .ready
                .wait_timeout(queue, deadline - now)
                .ok()?;
            queue = guard;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::types::TaskId;
    use crate::ops::OpKind;

    fn output_event(n: u64) -> StatusEvent {
        StatusEvent::TaskOutput {
            id: TaskId(1),
            line: n.to_string(),
        }
    }

    fn line_of(event: &StatusEvent) -> u64 {
        match event {
            StatusEvent::TaskOutput { line, .. } => line.parse().unwrap(),
            other => panic!("unexpected event: {other:?}"),
        }
    }

    #[test]
    fn delivery_preserves_publish_order() {
        let bus = EventBus::new();
        let sub = bus.subscribe();
        for n in 0..10 {
            bus.publish(output_event(n));
        }
        let received: Vec<u64> = std::iter::from_fn(|| sub.try_recv())
            .map(|e| line_of(&e))
            .collect();
        assert_eq!(received, (0..10).collect::<Vec<_>>());
    }

    #[test]
    fn overflow_drops_oldest_without_blocking() {
        let bus = EventBus::new();
        let sub = bus.subscribe();
        let total = (SUBSCRIBER_QUEUE_CAP + 5) as u64;
        for n in 0..total {
            bus.publish(output_event(n));
        }
        let received: Vec<u64> = std::iter::from_fn(|| sub.try_recv())
            .map(|e| line_of(&e))
            .collect();
        assert_eq!(received.len(), SUBSCRIBER_QUEUE_CAP);
        // The oldest five were dropped; the survivors are still in order.
        assert_eq!(received[0], 5);
        assert_eq!(*received.last().unwrap(), total - 1);
    }

    #[test]
    fn each_subscriber_gets_every_event() {
        let bus = EventBus::new();
        let a = bus.subscribe();
        let b = bus.subscribe();
        bus.publish(output_event(7));
        assert_eq!(line_of(&a.try_recv().unwrap()), 7);
        assert_eq!(line_of(&b.try_recv().unwrap()), 7);
    }

    #[test]
    fn dropped_subscription_is_pruned() {
        let bus = EventBus::new();
        let sub = bus.subscribe();
        drop(sub);
        // Publishing into a dead subscription must not panic or leak.
        bus.publish(output_event(1));
        bus.publish(StatusEvent::TaskStarted {
            id: TaskId(2),
            kind: OpKind::Build,
            target: "demo:v1".into(),
        });
    }

    #[test]
    fn recv_timeout_wakes_on_publish() {
        let bus = EventBus::new();
        let sub = bus.subscribe();
        let publisher = {
            let bus = bus.clone();
            std::thread::spawn(move || {
                std::thread::sleep(Duration::from_millis(50));
                bus.publish(output_event(42));
            })
        };
        let event = sub.recv_timeout(Duration::from_secs(5));
        publisher.join().unwrap();
        assert_eq!(line_of(&event.unwrap()), 42);
    }

    #[test]
    fn recv_timeout_returns_none_when_idle() {
        let bus = EventBus::new();
        let sub = bus.subscribe();
        assert!(sub.recv_timeout(Duration::from_millis(30)).is_none());
    }
}
