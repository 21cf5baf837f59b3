//! Probes wrap a knot's output streams for step-by-step assertions.
//!
//! Every wait is bounded. Under `#[tokio::test(start_paused = true)]` the
//! clock auto-advances to the next pending timer, so a probe waiting for a
//! value lets every timer that produces it fire without real sleeping.

#![allow(clippy::panic)] // Probes fail the test by panicking

use futures::{Stream, StreamExt};
use std::fmt::Debug;
use std::pin::Pin;
use std::time::Duration;
use tokio::sync::broadcast::{self, error::RecvError};
use tokio::time::timeout;

/// How long a probe waits for an expected value by default
pub const DEFAULT_WAIT: Duration = Duration::from_secs(30);

/// Records a state stream and asserts on it in order
pub struct StateProbe<S> {
    states: Pin<Box<dyn Stream<Item = S> + Send>>,
    history: Vec<S>,
}

impl<S> StateProbe<S>
where
    S: Clone + Debug + PartialEq,
{
    /// Wrap a state stream, typically `knot.state()`
    pub fn new(states: impl Stream<Item = S> + Send + 'static) -> Self {
        Self {
            states: Box::pin(states),
            history: Vec::new(),
        }
    }

    /// Next state within [`DEFAULT_WAIT`]; `None` if the stream ended
    ///
    /// # Panics
    ///
    /// Panics if no state arrives in time.
    pub async fn next(&mut self) -> Option<S> {
        self.next_within(DEFAULT_WAIT).await
    }

    /// Next state within `wait`; `None` if the stream ended
    ///
    /// # Panics
    ///
    /// Panics if no state arrives in time.
    pub async fn next_within(&mut self, wait: Duration) -> Option<S> {
        let Ok(next) = timeout(wait, self.states.next()).await else {
            panic!(
                "No state within {wait:?}; last seen {:?}",
                self.history.last()
            );
        };
        if let Some(state) = &next {
            self.history.push(state.clone());
        }
        next
    }

    /// Assert the next state equals `expected`
    ///
    /// # Panics
    ///
    /// Panics on a different state, an ended stream or a timeout.
    pub async fn expect(&mut self, expected: S) {
        match self.next().await {
            Some(state) => assert_eq!(state, expected, "Unexpected state"),
            None => panic!("State stream ended while expecting {expected:?}"),
        }
    }

    /// Skip states until one satisfies `predicate` and return it
    ///
    /// # Panics
    ///
    /// Panics if the stream ends or stays silent for [`DEFAULT_WAIT`].
    pub async fn wait_for(&mut self, predicate: impl Fn(&S) -> bool) -> S {
        loop {
            match self.next().await {
                Some(state) if predicate(&state) => return state,
                Some(_) => {},
                None => panic!("State stream ended; history {:?}", self.history),
            }
        }
    }

    /// Assert that no state arrives for `quiet`
    ///
    /// # Panics
    ///
    /// Panics if a state arrives or the stream ends.
    pub async fn assert_quiet(&mut self, quiet: Duration) {
        if let Ok(next) = timeout(quiet, self.states.next()).await {
            panic!("Expected no state for {quiet:?}, got {next:?}");
        }
    }

    /// Assert that the stream has ended
    ///
    /// # Panics
    ///
    /// Panics if another state arrives instead.
    pub async fn expect_end(&mut self) {
        if let Some(state) = self.next().await {
            panic!("Expected the state stream to end, got {state:?}");
        }
    }

    /// Every state observed so far, oldest first
    #[must_use]
    pub fn history(&self) -> &[S] {
        &self.history
    }

    /// The most recently observed state
    #[must_use]
    pub fn last(&self) -> Option<&S> {
        self.history.last()
    }
}

/// Records side effects from a broadcast subscription
pub struct SideEffectProbe<X> {
    receiver: broadcast::Receiver<X>,
    received: Vec<X>,
}

impl<X> SideEffectProbe<X>
where
    X: Clone + Debug + PartialEq,
{
    /// Wrap a subscription, typically `knot.subscribe_side_effects()`
    #[must_use]
    pub const fn new(receiver: broadcast::Receiver<X>) -> Self {
        Self {
            receiver,
            received: Vec::new(),
        }
    }

    /// Next side effect within [`DEFAULT_WAIT`]; `None` once closed
    ///
    /// # Panics
    ///
    /// Panics if nothing arrives in time or the subscriber lagged.
    pub async fn next(&mut self) -> Option<X> {
        match timeout(DEFAULT_WAIT, self.receiver.recv()).await {
            Ok(Ok(side_effect)) => {
                self.received.push(side_effect.clone());
                Some(side_effect)
            },
            Ok(Err(RecvError::Closed)) => None,
            Ok(Err(RecvError::Lagged(skipped))) => {
                panic!("Side effect probe lagged by {skipped}")
            },
            Err(_) => panic!(
                "No side effect within {DEFAULT_WAIT:?}; received {:?}",
                self.received
            ),
        }
    }

    /// Assert the next side effect equals `expected`
    ///
    /// # Panics
    ///
    /// Panics on a different side effect, a closed channel or a timeout.
    pub async fn expect(&mut self, expected: X) {
        match self.next().await {
            Some(side_effect) => assert_eq!(side_effect, expected, "Unexpected side effect"),
            None => panic!("Side effects closed while expecting {expected:?}"),
        }
    }

    /// Assert that no side effect arrives for `quiet`
    ///
    /// # Panics
    ///
    /// Panics if a side effect arrives.
    pub async fn assert_quiet(&mut self, quiet: Duration) {
        if let Ok(Ok(side_effect)) = timeout(quiet, self.receiver.recv()).await {
            panic!("Expected no side effect for {quiet:?}, got {side_effect:?}");
        }
    }

    /// Every side effect received so far, oldest first
    #[must_use]
    pub fn received(&self) -> &[X] {
        &self.received
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test(start_paused = true)]
    async fn state_probe_follows_stream() {
        let mut probe = StateProbe::new(async_stream::stream! {
            yield 1;
            tokio::time::sleep(Duration::from_secs(1)).await;
            yield 2;
            yield 3;
        });

        probe.expect(1).await;
        probe.assert_quiet(Duration::from_millis(500)).await;
        assert_eq!(probe.wait_for(|s| *s == 3).await, 3);
        probe.expect_end().await;
        assert_eq!(probe.history(), [1, 2, 3]);
        assert_eq!(probe.last(), Some(&3));
    }

    #[tokio::test(start_paused = true)]
    #[should_panic(expected = "No state within")]
    async fn state_probe_times_out() {
        let mut probe = StateProbe::new(futures::stream::pending::<u8>());
        probe.next_within(Duration::from_secs(1)).await;
    }

    #[tokio::test(start_paused = true)]
    async fn side_effect_probe_records() {
        let (tx, rx) = broadcast::channel(4);
        let mut probe = SideEffectProbe::new(rx);

        tx.send("next").ok();
        probe.expect("next").await;
        probe.assert_quiet(Duration::from_secs(1)).await;

        drop(tx);
        assert_eq!(probe.next().await, None);
        assert_eq!(probe.received(), ["next"]);
    }
}
