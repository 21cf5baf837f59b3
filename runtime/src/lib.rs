//! # Knot Runtime
//!
//! Runtime implementation for Knot state containers.
//!
//! This crate provides the [`Knot`] container that coordinates reducer
//! execution, state publication and effect scheduling.
//!
//! ## Core Components
//!
//! - **State Store**: Holds the current state, applies proposals, replays the
//!   latest value to observers
//! - **Event Intake**: Bounded FIFO with a backpressured `send` and a
//!   best-effort `offer`
//! - **Effect Scheduler**: Runs effect tasks, one per cancellation key,
//!   and feeds their events back
//! - **Lifecycle**: `start` spawns the pipeline, `stop` cancels everything
//!
//! ## Example
//!
//! ```ignore
//! use knot_runtime::Knot;
//!
//! let knot = Knot::new(initial_state, my_reducer, my_effect_handler);
//! knot.start(&tokio::runtime::Handle::current())?;
//!
//! // Submit an event (waits for room in the intake)
//! knot.send(Event::DoSomething).await?;
//!
//! // Read or observe state
//! let current = knot.current();
//! let mut states = std::pin::pin!(knot.state());
//!
//! knot.stop().await;
//! ```

use serde::Deserialize;

/// Metric names and descriptions
pub mod metrics;

/// The state store
pub mod state_store;

/// Event intake handles
pub mod intake;

mod outbox;
mod scheduler;

/// The container and its lifecycle
pub mod knot;

/// Error types for the Knot runtime
pub mod error {
    use thiserror::Error;

    /// Errors that can occur during Knot lifecycle and submission
    ///
    /// Effect failures never show up here: effects map them into events.
    #[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
    pub enum KnotError {
        /// `start` was called on a running knot
        #[error("Knot is already running")]
        AlreadyStarted,

        /// The knot has been stopped and no longer accepts events
        ///
        /// Returned by `send()` after `stop()` and by `start()` after `stop()`.
        #[error("Knot has been stopped")]
        Stopped,
    }
}

pub use error::KnotError;
pub use intake::EventSender;
pub use knot::{Knot, KnotBuilder};
pub use state_store::StateStore;

/// Configuration for Knot instances
///
/// # Example
///
/// ```
/// use knot_runtime::KnotConfig;
///
/// let config = KnotConfig::default()
///     .with_intake_capacity(256)
///     .with_side_effect_capacity(32);
///
/// assert_eq!(config.intake_capacity, 256);
/// assert_eq!(config.state_capacity, 64);
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct KnotConfig {
    /// Number of events the intake buffers before `send` waits and `offer` drops
    pub intake_capacity: usize,
    /// Number of state values buffered per observer before it lags
    pub state_capacity: usize,
    /// Number of side effects buffered per subscriber before it lags
    pub side_effect_capacity: usize,
}

impl KnotConfig {
    /// Create a new configuration with custom values
    #[must_use]
    pub const fn new(
        intake_capacity: usize,
        state_capacity: usize,
        side_effect_capacity: usize,
    ) -> Self {
        Self {
            intake_capacity,
            state_capacity,
            side_effect_capacity,
        }
    }

    /// Set the intake capacity
    #[must_use]
    pub const fn with_intake_capacity(mut self, capacity: usize) -> Self {
        self.intake_capacity = capacity;
        self
    }

    /// Set the per-observer state buffer
    #[must_use]
    pub const fn with_state_capacity(mut self, capacity: usize) -> Self {
        self.state_capacity = capacity;
        self
    }

    /// Set the per-subscriber side effect buffer
    #[must_use]
    pub const fn with_side_effect_capacity(mut self, capacity: usize) -> Self {
        self.side_effect_capacity = capacity;
        self
    }

    /// Tokio channels reject a zero capacity
    pub(crate) const fn normalized(self) -> Self {
        Self {
            intake_capacity: non_zero(self.intake_capacity),
            state_capacity: non_zero(self.state_capacity),
            side_effect_capacity: non_zero(self.side_effect_capacity),
        }
    }
}

const fn non_zero(capacity: usize) -> usize {
    if capacity == 0 { 1 } else { capacity }
}

impl Default for KnotConfig {
    fn default() -> Self {
        Self {
            intake_capacity: 64,
            state_capacity: 64,
            side_effect_capacity: 16,
        }
    }
}
