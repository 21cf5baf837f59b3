//! Event intake: the bounded FIFO feeding a knot's pipeline.
//!
//! External callers and effect tasks share one queue, so events are reduced in
//! exactly the order they were accepted. Callers pick the submission mode per
//! event:
//!
//! - [`EventSender::send`] waits for room and never loses an event
//! - [`EventSender::offer`] never waits and drops the event when the queue is full

use crate::error::KnotError;
use crate::metrics::{INTAKE_DROPPED, counter};
use knot_core::reduction::EffectId;
use tokio::sync::mpsc::{self, error::TrySendError};

/// Where a fed-back event came from
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct Origin {
    pub(crate) key: EffectId,
    pub(crate) generation: u64,
}

/// An event plus the keyed task that produced it, if any
#[derive(Debug)]
pub(crate) struct Envelope<E> {
    pub(crate) event: E,
    pub(crate) origin: Option<Origin>,
}

/// Cloneable handle for submitting events to a knot
///
/// Obtained from [`Knot::intake`](crate::Knot::intake). Events submitted
/// before the knot starts wait in the queue.
pub struct EventSender<E> {
    tx: mpsc::Sender<Envelope<E>>,
}

impl<E> Clone for EventSender<E> {
    fn clone(&self) -> Self {
        Self {
            tx: self.tx.clone(),
        }
    }
}

impl<E> std::fmt::Debug for EventSender<E> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EventSender")
            .field("closed", &self.tx.is_closed())
            .field("capacity", &self.tx.capacity())
            .finish()
    }
}

impl<E> EventSender<E> {
    pub(crate) const fn new(tx: mpsc::Sender<Envelope<E>>) -> Self {
        Self { tx }
    }

    /// Submit an event, waiting until the intake accepts it
    ///
    /// # Errors
    ///
    /// Returns [`KnotError::Stopped`] once the knot has been stopped.
    pub async fn send(&self, event: E) -> Result<(), KnotError> {
        self.tx
            .send(Envelope {
                event,
                origin: None,
            })
            .await
            .map_err(|_| KnotError::Stopped)
    }

    /// Submit an event if the intake has room right now
    ///
    /// Returns `false` when the event was dropped because the intake is full
    /// or the knot has stopped. Use this only for events that are safe to lose.
    pub fn offer(&self, event: E) -> bool {
        match self.tx.try_send(Envelope {
            event,
            origin: None,
        }) {
            Ok(()) => true,
            Err(TrySendError::Full(_)) => {
                tracing::debug!("Intake full, offered event dropped");
                counter!(INTAKE_DROPPED).increment(1);
                false
            },
            Err(TrySendError::Closed(_)) => {
                tracing::debug!("Intake closed, offered event dropped");
                counter!(INTAKE_DROPPED).increment(1);
                false
            },
        }
    }

    /// Whether the knot has stopped accepting events
    #[must_use]
    pub fn is_closed(&self) -> bool {
        self.tx.is_closed()
    }
}

/// Delivery path for events produced by effect tasks
pub(crate) struct Feedback<E> {
    tx: mpsc::Sender<Envelope<E>>,
    origin: Option<Origin>,
}

impl<E> Clone for Feedback<E> {
    fn clone(&self) -> Self {
        Self {
            tx: self.tx.clone(),
            origin: self.origin.clone(),
        }
    }
}

impl<E> Feedback<E> {
    pub(crate) const fn new(tx: mpsc::Sender<Envelope<E>>, origin: Option<Origin>) -> Self {
        Self { tx, origin }
    }

    /// Queue an event behind everything already accepted
    ///
    /// Returns `false` once the intake has closed.
    pub(crate) async fn deliver(&self, event: E) -> bool {
        self.tx
            .send(Envelope {
                event,
                origin: self.origin.clone(),
            })
            .await
            .is_ok()
    }
}
