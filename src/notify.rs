//! In-process change feeds for orders and their event timelines.
//!
//! Subscribers get a disposable handle over a broadcast channel; delivery is
//! eventually consistent and ordered per order, never synchronous with the
//! triggering write. Dropping the handle unsubscribes.

use std::collections::HashMap;
use std::sync::Mutex;

use tokio::sync::broadcast;
use uuid::Uuid;

use crate::models::{Order, OrderEvent};

const CHANNEL_CAPACITY: usize = 32;

#[derive(Default)]
pub struct OrderNotifier {
    orders: Mutex<HashMap<Uuid, broadcast::Sender<Order>>>,
    events: Mutex<HashMap<Uuid, broadcast::Sender<OrderEvent>>>,
}

pub struct Subscription<T> {
    rx: broadcast::Receiver<T>,
}

impl<T: Clone> Subscription<T> {
    /// Next change, or `None` once the publisher side is gone. A slow
    /// subscriber that misses updates skips ahead to the oldest retained one.
    pub async fn recv(&mut self) -> Option<T> {
        loop {
            match self.rx.recv().await {
                Ok(value) => return Some(value),
                Err(broadcast::error::RecvError::Lagged(skipped)) => {
                    tracing::warn!(skipped, "order subscriber lagged");
                }
                Err(broadcast::error::RecvError::Closed) => return None,
            }
        }
    }

    pub fn unsubscribe(self) {}
}

impl OrderNotifier {
    pub fn subscribe_order(&self, order_id: Uuid) -> Subscription<Order> {
        Subscription {
            rx: subscribe(&self.orders, order_id),
        }
    }

    pub fn subscribe_history(&self, order_id: Uuid) -> Subscription<OrderEvent> {
        Subscription {
            rx: subscribe(&self.events, order_id),
        }
    }

    pub fn publish_order(&self, order: &Order) {
        publish(&self.orders, order.id, order.clone());
    }

    pub fn publish_event(&self, event: &OrderEvent) {
        publish(&self.events, event.order_id, event.clone());
    }
}

fn subscribe<T: Clone>(
    map: &Mutex<HashMap<Uuid, broadcast::Sender<T>>>,
    order_id: Uuid,
) -> broadcast::Receiver<T> {
    let mut map = map.lock().expect("notifier lock poisoned");
    map.entry(order_id)
        .or_insert_with(|| broadcast::channel(CHANNEL_CAPACITY).0)
        .subscribe()
}

fn publish<T: Clone>(map: &Mutex<HashMap<Uuid, broadcast::Sender<T>>>, order_id: Uuid, value: T) {
    let mut map = map.lock().expect("notifier lock poisoned");
    if let Some(tx) = map.get(&order_id) {
        // No receivers left: drop the channel instead of buffering.
        if tx.send(value).is_err() {
            map.remove(&order_id);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::OrderStatus;
    use chrono::Utc;

    fn event(order_id: Uuid, status: OrderStatus) -> OrderEvent {
        OrderEvent {
            id: Uuid::new_v4(),
            order_id,
            seq: 1,
            status,
            note: None,
            at: Utc::now(),
        }
    }

    #[tokio::test]
    async fn subscriber_sees_published_events_in_order() {
        let notifier = OrderNotifier::default();
        let order_id = Uuid::new_v4();
        let mut sub = notifier.subscribe_history(order_id);

        notifier.publish_event(&event(order_id, OrderStatus::Paid));
        notifier.publish_event(&event(order_id, OrderStatus::InProcess));

        assert_eq!(sub.recv().await.unwrap().status, OrderStatus::Paid);
        assert_eq!(sub.recv().await.unwrap().status, OrderStatus::InProcess);
    }

    #[tokio::test]
    async fn subscriptions_are_scoped_per_order() {
        let notifier = OrderNotifier::default();
        let mine = Uuid::new_v4();
        let other = Uuid::new_v4();
        let mut sub = notifier.subscribe_history(mine);

        notifier.publish_event(&event(other, OrderStatus::Paid));
        notifier.publish_event(&event(mine, OrderStatus::Cancelled));

        assert_eq!(sub.recv().await.unwrap().order_id, mine);
    }

    #[tokio::test]
    async fn publishing_without_subscribers_is_a_no_op() {
        let notifier = OrderNotifier::default();
        let order_id = Uuid::new_v4();
        // Must not panic or accumulate state.
        notifier.publish_event(&event(order_id, OrderStatus::Paid));

        let sub = notifier.subscribe_history(order_id);
        sub.unsubscribe();
        notifier.publish_event(&event(order_id, OrderStatus::Paid));
    }
}
