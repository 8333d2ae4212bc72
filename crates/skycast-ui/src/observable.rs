//! Replay-latest observable values.
//!
//! An [`Observable`] holds the most recent value and fans every update out to
//! its subscribers. A new subscriber first receives the current value, then
//! each later publication in order.

use std::sync::Arc;

use parking_lot::Mutex;
use tokio::sync::mpsc;

struct Inner<T> {
    value: T,
    subscribers: Vec<mpsc::UnboundedSender<T>>,
    closed: bool,
}

/// Hot, replay-latest value shared between a producer and any number of observers.
///
/// Cloning yields another handle to the same value.
pub struct Observable<T> {
    inner: Arc<Mutex<Inner<T>>>,
}

impl<T> Clone for Observable<T> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<T: Clone + Send + 'static> Observable<T> {
    pub fn new(initial: T) -> Self {
        Self {
            inner: Arc::new(Mutex::new(Inner {
                value: initial,
                subscribers: Vec::new(),
                closed: false,
            })),
        }
    }

    /// The latest value.
    pub fn get(&self) -> T {
        self.inner.lock().value.clone()
    }

    /// Subscribe to this value. The current value is delivered first.
    ///
    /// Subscribing to a closed observable yields the final value and then ends.
    pub fn subscribe(&self) -> Subscription<T> {
        let (tx, rx) = mpsc::unbounded_channel();
        let mut inner = self.inner.lock();

        // The receiver is alive, so this cannot fail.
        let _ = tx.send(inner.value.clone());
        if !inner.closed {
            inner.subscribers.push(tx);
        }

        Subscription { rx }
    }

    /// Replace the value and notify subscribers.
    ///
    /// Returns `false` (and changes nothing) once the observable is closed.
    pub fn publish(&self, value: T) -> bool {
        let mut inner = self.inner.lock();
        if inner.closed {
            return false;
        }

        inner
            .subscribers
            .retain(|subscriber| subscriber.send(value.clone()).is_ok());
        inner.value = value;
        true
    }

    /// Stop accepting updates and end every subscription.
    pub fn close(&self) {
        let mut inner = self.inner.lock();
        inner.closed = true;
        inner.subscribers.clear();
    }

    pub fn is_closed(&self) -> bool {
        self.inner.lock().closed
    }
}

/// Receiving end of an [`Observable`].
pub struct Subscription<T> {
    rx: mpsc::UnboundedReceiver<T>,
}

impl<T> Subscription<T> {
    /// Wait for the next value. `None` once the observable is closed and
    /// everything already published has been received.
    pub async fn next(&mut self) -> Option<T> {
        self.rx.recv().await
    }

    /// The next value if one is already waiting.
    pub fn try_next(&mut self) -> Option<T> {
        self.rx.try_recv().ok()
    }

    /// Everything received so far, without waiting.
    pub fn drain(&mut self) -> Vec<T> {
        std::iter::from_fn(|| self.try_next()).collect()
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)]
    use super::*;

    #[test]
    fn test_new_subscriber_gets_latest_value() {
        let observable = Observable::new(0);
        observable.publish(1);
        observable.publish(2);

        let mut sub = observable.subscribe();
        assert_eq!(sub.drain(), vec![2]);
        assert_eq!(observable.get(), 2);
    }

    #[test]
    fn test_subscribers_see_every_later_value_in_order() {
        let observable = Observable::new(String::new());
        let mut first = observable.subscribe();
        observable.publish("a".to_string());
        let mut second = observable.subscribe();
        observable.publish("b".to_string());

        assert_eq!(first.drain(), vec!["", "a", "b"]);
        assert_eq!(second.drain(), vec!["a", "b"]);
    }

    #[test]
    fn test_dropped_subscriber_does_not_block_others() {
        let observable = Observable::new(false);
        let mut keep = observable.subscribe();
        let gone = observable.subscribe();

        drop(gone);
        assert!(observable.publish(true));
        assert_eq!(keep.drain(), vec![false, true]);
    }

    #[test]
    fn test_close_ends_streams_and_ignores_publish() {
        let observable = Observable::new(1);
        let mut sub = observable.subscribe();

        observable.close();
        assert!(!observable.publish(5));
        assert_eq!(observable.get(), 1);
        assert!(observable.is_closed());
        assert_eq!(sub.drain(), vec![1]);
    }

    #[test]
    fn test_subscribe_after_close_replays_final_value() {
        let observable = Observable::new(vec![1, 2]);
        observable.close();

        let mut sub = observable.subscribe();
        assert_eq!(sub.try_next(), Some(vec![1, 2]));
        assert_eq!(sub.try_next(), None);
    }

    #[tokio::test]
    async fn test_next_returns_none_after_close() {
        let observable = Observable::new(7);
        let mut sub = observable.subscribe();
        let handle = observable.clone();

        let task = tokio::spawn(async move {
            handle.publish(8);
            handle.close();
        });

        assert_eq!(sub.next().await, Some(7));
        assert_eq!(sub.next().await, Some(8));
        assert_eq!(sub.next().await, None);
        task.await.unwrap();
    }
}
