//! Fire-and-forget side effect fan-out.

use std::sync::{Mutex, MutexGuard, PoisonError};
use tokio::sync::broadcast;

/// Broadcasts side effects to whoever is subscribed at emission time
pub(crate) struct Outbox<X> {
    sender: Mutex<Option<broadcast::Sender<X>>>,
}

impl<X: Clone> Outbox<X> {
    pub(crate) fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity.max(1));
        Self {
            sender: Mutex::new(Some(sender)),
        }
    }

    /// A receiver for side effects emitted from now on
    ///
    /// Once closed, the returned receiver reports `Closed` straight away.
    pub(crate) fn subscribe(&self) -> broadcast::Receiver<X> {
        match self.lock().as_ref() {
            Some(sender) => sender.subscribe(),
            None => broadcast::channel(1).1,
        }
    }

    pub(crate) fn emit(&self, side_effect: X) {
        if let Some(sender) = self.lock().as_ref() {
            if sender.send(side_effect).is_err() {
                tracing::trace!("Side effect emitted with no subscribers");
            }
        }
    }

    pub(crate) fn close(&self) {
        self.lock().take();
    }

    fn lock(&self) -> MutexGuard<'_, Option<broadcast::Sender<X>>> {
        self.sender.lock().unwrap_or_else(PoisonError::into_inner)
    }
}
