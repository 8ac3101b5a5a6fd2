//! Change notification for out-of-band session storage updates.

use tokio::sync::broadcast;
use tokio::task::JoinHandle;

/// Capacity of the notification channel. Signals carry no payload, so a
/// lagging receiver only needs to know that *something* changed.
const SIGNAL_CAPACITY: usize = 16;

/// Broadcast "session storage changed" to every subscriber.
///
/// The auth client fires it after writing cookies or session data; caches
/// re-read the durable store when it fires.
#[derive(Debug, Clone)]
pub struct SessionSignal {
    tx: broadcast::Sender<()>,
}

impl SessionSignal {
    pub fn new() -> Self {
        let (tx, _) = broadcast::channel(SIGNAL_CAPACITY);
        Self { tx }
    }

    /// Notify all current subscribers. Returns how many were reached.
    pub fn notify(&self) -> usize {
        self.tx.send(()).unwrap_or(0)
    }

    /// Subscribe to future notifications.
    pub fn subscribe(&self) -> broadcast::Receiver<()> {
        self.tx.subscribe()
    }

    /// Number of live subscribers.
    pub fn subscriber_count(&self) -> usize {
        self.tx.receiver_count()
    }
}

impl Default for SessionSignal {
    fn default() -> Self {
        Self::new()
    }
}

/// Guard for a listener task attached to a [`SessionSignal`].
///
/// Dropping the guard unsubscribes.
#[derive(Debug)]
pub struct SignalSubscription {
    task: JoinHandle<()>,
}

impl SignalSubscription {
    pub(crate) fn new(task: JoinHandle<()>) -> Self {
        Self { task }
    }

    /// Unsubscribe explicitly.
    pub fn unsubscribe(self) {
        drop(self);
    }

    /// Check if the listener is still running.
    pub fn is_active(&self) -> bool {
        !self.task.is_finished()
    }
}

impl Drop for SignalSubscription {
    fn drop(&mut self) {
        self.task.abort();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_notify_reaches_subscribers() {
        let signal = SessionSignal::new();
        assert_eq!(signal.notify(), 0);

        let mut rx1 = signal.subscribe();
        let mut rx2 = signal.clone().subscribe();
        assert_eq!(signal.subscriber_count(), 2);

        assert_eq!(signal.notify(), 2);
        rx1.recv().await.unwrap();
        rx2.recv().await.unwrap();
    }

    #[tokio::test]
    async fn test_dropped_subscription_stops_listener() {
        let signal = SessionSignal::new();
        let mut rx = signal.subscribe();
        let task = tokio::spawn(async move { while rx.recv().await.is_ok() {} });

        let sub = SignalSubscription::new(task);
        assert!(sub.is_active());
        sub.unsubscribe();

        // The aborted task drops its receiver
        for _ in 0..100 {
            if signal.subscriber_count() == 0 {
                break;
            }
            tokio::time::sleep(std::time::Duration::from_millis(1)).await;
        }
        assert_eq!(signal.subscriber_count(), 0);
    }
}
