//! The autoplay model a banner carousel talks to.

use crate::effects::{TrailerEffects, TrailerRepository};
use crate::reducer::TrailerReducer;
use crate::types::{SubjectId, TrailerConfig, TrailerEvent, TrailerSideEffect, TrailerState};
use futures::Stream;
use knot_runtime::{Knot, KnotError};
use std::sync::Arc;
use tokio::runtime::Handle;
use tokio::sync::broadcast;

/// Trailer autoplay for a banner carousel
///
/// Banner visibility changes go through [`start_banner`](Self::start_banner)
/// and [`stop_banner`](Self::stop_banner); both wait for room in the intake
/// so a visibility change is never lost.
pub struct TrailerAutoplayModel {
    knot: Knot<TrailerReducer, TrailerEffects>,
}

impl TrailerAutoplayModel {
    /// Create an idle model; call [`start`](Self::start) to run it
    #[must_use]
    pub fn new(repository: Arc<dyn TrailerRepository>, config: TrailerConfig) -> Self {
        let knot = Knot::with_config(
            TrailerState::Idle,
            TrailerReducer::new(),
            TrailerEffects::new(repository, config),
            config.knot,
        );
        Self { knot }
    }

    /// Run the model on `handle`
    ///
    /// # Errors
    ///
    /// Returns [`KnotError`] if the model already runs or was stopped.
    pub fn start(&self, handle: &Handle) -> Result<(), KnotError> {
        self.knot.start(handle)
    }

    /// Stop the model, cancelling timers and pending requests
    pub async fn stop(&self) {
        self.knot.stop().await;
    }

    /// A banner became visible
    ///
    /// # Errors
    ///
    /// Returns [`KnotError::Stopped`] after [`stop`](Self::stop).
    pub async fn start_banner(&self, subject: impl Into<SubjectId>) -> Result<(), KnotError> {
        self.knot.send(TrailerEvent::Start(subject.into())).await
    }

    /// A banner went away
    ///
    /// # Errors
    ///
    /// Returns [`KnotError::Stopped`] after [`stop`](Self::stop).
    pub async fn stop_banner(&self, subject: impl Into<SubjectId>) -> Result<(), KnotError> {
        self.knot.send(TrailerEvent::Stop(subject.into())).await
    }

    /// Observe the autoplay state, starting with the current one
    pub fn state(&self) -> impl Stream<Item = TrailerState> + Send + 'static {
        self.knot.state()
    }

    /// The current autoplay state
    #[must_use]
    pub fn current(&self) -> TrailerState {
        self.knot.current()
    }

    /// Subscribe to carousel notifications emitted from now on
    #[must_use]
    pub fn side_effects(&self) -> broadcast::Receiver<TrailerSideEffect> {
        self.knot.subscribe_side_effects()
    }
}
