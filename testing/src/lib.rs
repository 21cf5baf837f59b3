//! # Knot Testing
//!
//! Testing utilities and helpers for Knot state containers.
//!
//! This crate provides:
//! - [`ReducerTest`]: Given-When-Then harness for pure reducers
//! - [`assertions`]: Checks over the commands a reduction returned
//! - [`StateProbe`] / [`SideEffectProbe`]: Observers for running knots with
//!   timeouts, so tests under a paused clock fail instead of hanging
//! - [`mocks`]: Call recording for stub collaborators
//!
//! ## Example
//!
//! ```ignore
//! use knot_testing::StateProbe;
//!
//! #[tokio::test(start_paused = true)]
//! async fn preview_becomes_playing() {
//!     let knot = Knot::new(State::Idle, reducer, handler);
//!     knot.start(&Handle::current())?;
//!
//!     let mut states = StateProbe::new(knot.state());
//!     states.expect(State::Idle).await;
//!
//!     knot.send(Event::Start(subject)).await?;
//!     states.expect(State::Preview(subject, String::new())).await;
//! }
//! ```


/// Observers for running knots
pub mod probes;

pub use reducer_test::{ReducerTest, assertions};
pub use probes::{SideEffectProbe, StateProbe};

/// Stub collaborator helpers
pub mod mocks {
    use std::sync::{Arc, Mutex, PoisonError};

    /// Records the arguments a stub collaborator was called with
    ///
    /// Clones share the same log, so a stub can keep one copy and the test
    /// another.
    ///
    /// # Example
    ///
    /// ```
    /// use knot_testing::mocks::CallLog;
    ///
    /// let log = CallLog::new();
    /// let stub = log.clone();
    /// stub.record("trailer-1");
    ///
    /// assert_eq!(log.calls(), vec!["trailer-1"]);
    /// ```
    #[derive(Debug)]
    pub struct CallLog<T> {
        calls: Arc<Mutex<Vec<T>>>,
    }

    impl<T> Clone for CallLog<T> {
        fn clone(&self) -> Self {
            Self {
                calls: Arc::clone(&self.calls),
            }
        }
    }

    impl<T> Default for CallLog<T> {
        fn default() -> Self {
            Self {
                calls: Arc::new(Mutex::new(Vec::new())),
            }
        }
    }

    impl<T> CallLog<T> {
        /// Create an empty log
        #[must_use]
        pub fn new() -> Self {
            Self::default()
        }

        /// Record one call
        pub fn record(&self, call: T) {
            self.calls
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .push(call);
        }

        /// Number of recorded calls
        #[must_use]
        pub fn len(&self) -> usize {
            self.calls.lock().unwrap_or_else(PoisonError::into_inner).len()
        }

        /// Whether nothing was recorded
        #[must_use]
        pub fn is_empty(&self) -> bool {
            self.len() == 0
        }

        /// Number of recorded calls matching `predicate`
        pub fn count(&self, predicate: impl Fn(&T) -> bool) -> usize {
            self.calls
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .iter()
                .filter(|call| predicate(call))
                .count()
        }
    }

    impl<T: Clone> CallLog<T> {
        /// Snapshot of every recorded call, oldest first
        #[must_use]
        pub fn calls(&self) -> Vec<T> {
            self.calls
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .clone()
        }
    }
}

/// Install a `tracing` subscriber that writes through the test harness
///
/// Honors `RUST_LOG`; safe to call from every test.
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn")),
        )
        .with_test_writer()
        .try_init();
}
