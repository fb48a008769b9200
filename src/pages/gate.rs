//! One-shot broadcast gates.
//!
//! A gate goes from "not ready" to "ready with a value" exactly once. Any
//! number of tasks can wait on it; every wait is raced against the run's
//! cancellation token.

use std::sync::Arc;
use tokio::sync::watch;
use tokio_util::sync::CancellationToken;

/// Write side of a gate. Consumed by [`GatePublisher::publish`].
#[derive(Debug)]
pub struct GatePublisher<T> {
    tx: watch::Sender<Option<Arc<T>>>,
}

/// Read side of a gate. Cheap to clone.
#[derive(Debug)]
pub struct Gate<T> {
    rx: watch::Receiver<Option<Arc<T>>>,
}

impl<T> Clone for Gate<T> {
    fn clone(&self) -> Self {
        Self {
            rx: self.rx.clone(),
        }
    }
}

/// Create a closed gate and its publisher.
pub fn gate<T>() -> (GatePublisher<T>, Gate<T>) {
    let (tx, rx) = watch::channel(None);
    (GatePublisher { tx }, Gate { rx })
}

impl<T> GatePublisher<T> {
    /// Open the gate. Waiters that already returned are unaffected.
    pub fn publish(self, value: T) -> Arc<T> {
        let value = Arc::new(value);
        self.tx.send_replace(Some(Arc::clone(&value)));
        value
    }
}

impl<T> Gate<T> {
    /// Wait for the published value.
    ///
    /// Returns `None` if the run is cancelled first, or if the publisher was
    /// dropped without publishing (its task failed).
    pub async fn wait(&self, cancel: &CancellationToken) -> Option<Arc<T>> {
        let mut rx = self.rx.clone();
        tokio::select! {
            biased;
            () = cancel.cancelled() => None,
            result = rx.wait_for(Option::is_some) => {
                result.ok().and_then(|value| value.clone())
            }
        }
    }
}
