//! Network reachability tracking.
//!
//! The detector is advisory: it decides when the engine *tries* to talk to
//! the remote, never whether a transmission succeeded.

use std::sync::Arc;

use tokio::sync::{broadcast, watch};

const EVENT_CHANNEL_CAPACITY: usize = 16;

/// Edge-triggered reachability transition
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectivityEvent {
    BecameOnline,
    BecameOffline,
}

/// Tracks current reachability and publishes transitions
///
/// Cloning yields another handle to the same state. Subscribers receive a
/// [`broadcast::Receiver`]; dropping it unsubscribes.
#[derive(Clone)]
pub struct ConnectivityDetector {
    inner: Arc<Inner>,
}

struct Inner {
    state: watch::Sender<bool>,
    events: broadcast::Sender<ConnectivityEvent>,
}

impl ConnectivityDetector {
    /// Create a detector with the given initial state. No event is emitted
    /// for the initial state.
    pub fn new(initially_online: bool) -> Self {
        let (state, _) = watch::channel(initially_online);
        let (events, _) = broadcast::channel(EVENT_CHANNEL_CAPACITY);
        Self {
            inner: Arc::new(Inner { state, events }),
        }
    }

    /// Current reachability
    pub fn is_online(&self) -> bool {
        *self.inner.state.borrow()
    }

    /// Report an observation. Returns the transition it caused, if any.
    ///
    /// Reporting the current state again is a no-op.
    pub fn report(&self, reachable: bool) -> Option<ConnectivityEvent> {
        let changed = self.inner.state.send_if_modified(|current| {
            if *current == reachable {
                false
            } else {
                *current = reachable;
                true
            }
        });
        if !changed {
            return None;
        }

        let event = if reachable {
            ConnectivityEvent::BecameOnline
        } else {
            ConnectivityEvent::BecameOffline
        };
        tracing::info!(?event, "Connectivity changed");
        // No subscribers is fine
        self.inner.events.send(event).ok();
        Some(event)
    }

    /// Subscribe to transitions
    pub fn subscribe(&self) -> broadcast::Receiver<ConnectivityEvent> {
        self.inner.events.subscribe()
    }

    /// Watch the current state
    pub fn watch(&self) -> watch::Receiver<bool> {
        self.inner.state.subscribe()
    }

    /// Number of live event subscribers
    pub fn subscriber_count(&self) -> usize {
        self.inner.events.receiver_count()
    }
}

impl Default for ConnectivityDetector {
    fn default() -> Self {
        Self::new(false)
    }
}

impl std::fmt::Debug for ConnectivityDetector {
    fn fmt(&self, formatter: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        formatter
            .debug_struct("ConnectivityDetector")
            .field("online", &self.is_online())
            .field("subscribers", &self.subscriber_count())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::sync::broadcast::error::TryRecvError;

    #[test]
    fn report_is_edge_triggered() {
        let detector = ConnectivityDetector::new(false);
        let mut events = detector.subscribe();

        assert_eq!(detector.report(false), None);
        assert_eq!(
            detector.report(true),
            Some(ConnectivityEvent::BecameOnline)
        );
        assert_eq!(detector.report(true), None);
        assert_eq!(
            detector.report(false),
            Some(ConnectivityEvent::BecameOffline)
        );

        assert_eq!(events.try_recv().unwrap(), ConnectivityEvent::BecameOnline);
        assert_eq!(events.try_recv().unwrap(), ConnectivityEvent::BecameOffline);
        assert_eq!(events.try_recv().unwrap_err(), TryRecvError::Empty);
    }

    #[test]
    fn every_subscriber_sees_each_transition() {
        let detector = ConnectivityDetector::new(false);
        let mut first = detector.subscribe();
        let mut second = detector.subscribe();

        detector.report(true);

        assert_eq!(first.try_recv().unwrap(), ConnectivityEvent::BecameOnline);
        assert_eq!(second.try_recv().unwrap(), ConnectivityEvent::BecameOnline);
    }

    #[test]
    fn dropping_receiver_unsubscribes() {
        let detector = ConnectivityDetector::new(true);
        let receiver = detector.subscribe();
        assert_eq!(detector.subscriber_count(), 1);

        drop(receiver);
        assert_eq!(detector.subscriber_count(), 0);
        // Reporting with no subscribers must not fail
        assert_eq!(
            detector.report(false),
            Some(ConnectivityEvent::BecameOffline)
        );
    }

    #[test]
    fn clones_share_state() {
        let detector = ConnectivityDetector::new(false);
        let clone = detector.clone();
        let watcher = detector.watch();

        clone.report(true);
        assert!(detector.is_online());
        assert!(*watcher.borrow());
    }
}
