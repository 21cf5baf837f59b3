//! The state store: current value, proposal acceptance and observation.
//!
//! The store is the only owner of a knot's state. The pipeline is its single
//! writer; everyone else reads a clone or observes the stream.
//!
//! Observation has replay-latest semantics: a new observer first receives the
//! current value, then every later value that differs from its predecessor.
//! Publishing happens under the same lock as the commit, so an observer never
//! sees a value out of order or misses the gap between snapshot and
//! subscription.

use futures::Stream;
use knot_core::state::{Acceptor, ExternalStore, Replace};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tokio::sync::broadcast::{self, error::RecvError};

const DEFAULT_CAPACITY: usize = 64;

struct Inner<S> {
    value: S,
    updates: Option<broadcast::Sender<S>>,
}

/// Holds the current state and publishes committed values
///
/// # Type Parameters
///
/// - `S`: State type
/// - `P`: Proposal type (defaults to `S`, where proposals replace the state)
///
/// Cloning a store yields another handle to the same state.
///
/// # Example
///
/// ```
/// use knot_runtime::StateStore;
///
/// let store = StateStore::with_acceptor(10, |delta: i32, state: &i32| state + delta);
/// assert_eq!(store.apply(5), 15);
/// assert_eq!(store.current(), 15);
/// ```
pub struct StateStore<S, P = S> {
    inner: Arc<Mutex<Inner<S>>>,
    acceptor: Arc<dyn Acceptor<P, S>>,
}

impl<S, P> Clone for StateStore<S, P> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
            acceptor: Arc::clone(&self.acceptor),
        }
    }
}

impl<S, P> std::fmt::Debug for StateStore<S, P>
where
    S: std::fmt::Debug,
{
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let inner = self.lock();
        f.debug_struct("StateStore")
            .field("value", &inner.value)
            .field("closed", &inner.updates.is_none())
            .finish_non_exhaustive()
    }
}

impl<S> StateStore<S, S>
where
    S: Clone + PartialEq + Send + Sync + 'static,
{
    /// Create a store whose proposals replace the state
    #[must_use]
    pub fn new(initial_state: S) -> Self {
        Self::with_capacity(initial_state, Replace, DEFAULT_CAPACITY)
    }
}

impl<S, P> StateStore<S, P>
where
    S: Clone + PartialEq + Send + Sync + 'static,
    P: 'static,
{
    /// Create a store that combines proposals with the state through `acceptor`
    #[must_use]
    pub fn with_acceptor(initial_state: S, acceptor: impl Acceptor<P, S> + 'static) -> Self {
        Self::with_capacity(initial_state, acceptor, DEFAULT_CAPACITY)
    }

    /// Create a store mirroring a slice of an [`ExternalStore`]
    ///
    /// Proposals are dispatched to `external`. The state is the model picked
    /// by `selector` and converted by `mapper`, read back after each dispatch.
    /// Changes other writers make to the external model show up with the
    /// next commit.
    ///
    /// # Example
    ///
    /// ```
    /// use knot_core::state::ExternalStore;
    /// use knot_runtime::StateStore;
    /// use std::sync::{Arc, Mutex};
    ///
    /// #[derive(Default)]
    /// struct Totals(Mutex<(u32, u32)>);
    ///
    /// impl ExternalStore for Totals {
    ///     type Model = (u32, u32);
    ///     type Proposal = u32;
    ///
    ///     fn dispatch(&self, delta: u32) {
    ///         if let Ok(mut totals) = self.0.lock() {
    ///             totals.0 += delta;
    ///         }
    ///     }
    ///
    ///     fn model(&self) -> (u32, u32) {
    ///         self.0.lock().map(|totals| *totals).unwrap_or_default()
    ///     }
    /// }
    ///
    /// let store = StateStore::with_external(
    ///     Arc::new(Totals::default()),
    ///     |totals: &(u32, u32)| totals.0,
    ///     |count: u32| count.to_string(),
    /// );
    /// store.apply(3);
    /// assert_eq!(store.current(), "3");
    /// ```
    #[must_use]
    pub fn with_external<E, M>(
        external: Arc<E>,
        selector: impl Fn(&E::Model) -> M + Send + Sync + 'static,
        mapper: impl Fn(M) -> S + Send + Sync + 'static,
    ) -> Self
    where
        E: ExternalStore<Proposal = P> + 'static,
    {
        Self::with_external_capacity(external, selector, mapper, DEFAULT_CAPACITY)
    }

    /// [`with_external`](Self::with_external) with a custom per-observer buffer
    #[must_use]
    pub fn with_external_capacity<E, M>(
        external: Arc<E>,
        selector: impl Fn(&E::Model) -> M + Send + Sync + 'static,
        mapper: impl Fn(M) -> S + Send + Sync + 'static,
        capacity: usize,
    ) -> Self
    where
        E: ExternalStore<Proposal = P> + 'static,
    {
        let initial_state = mapper(selector(&external.model()));
        let acceptor = move |proposal: P, _state: &S| {
            external.dispatch(proposal);
            mapper(selector(&external.model()))
        };
        Self::with_capacity(initial_state, acceptor, capacity)
    }

    /// Create a store with a custom per-observer buffer
    ///
    /// An observer that falls more than `capacity` values behind skips the
    /// oldest ones.
    #[must_use]
    pub fn with_capacity(
        initial_state: S,
        acceptor: impl Acceptor<P, S> + 'static,
        capacity: usize,
    ) -> Self {
        let (updates, _) = broadcast::channel(capacity.max(1));

        Self {
            inner: Arc::new(Mutex::new(Inner {
                value: initial_state,
                updates: Some(updates),
            })),
            acceptor: Arc::new(acceptor),
        }
    }

    /// Clone of the current state
    #[must_use]
    pub fn current(&self) -> S {
        self.lock().value.clone()
    }

    /// Read the current state through a closure
    ///
    /// The lock is held while `f` runs, so keep it short and never call back
    /// into the store.
    pub fn state<F, T>(&self, f: F) -> T
    where
        F: FnOnce(&S) -> T,
    {
        f(&self.lock().value)
    }

    /// Apply a proposal and return the resulting state
    ///
    /// The new value is published only when it differs from the previous one.
    pub fn apply(&self, proposal: P) -> S {
        let mut inner = self.lock();
        let next = self.acceptor.accept(proposal, &inner.value);

        if next == inner.value {
            tracing::trace!("Proposal left state unchanged");
            return next;
        }

        inner.value = next.clone();
        if let Some(updates) = &inner.updates {
            // No observers is fine; the value is still current
            let _ = updates.send(next.clone());
        }
        tracing::trace!("State committed");
        next
    }

    /// Observe the state
    ///
    /// Yields the current value immediately, then each committed value in
    /// order. The stream ends once the store is closed.
    pub fn observe(&self) -> impl Stream<Item = S> + Send + 'static {
        let (current, receiver) = {
            let inner = self.lock();
            (
                inner.value.clone(),
                inner.updates.as_ref().map(broadcast::Sender::subscribe),
            )
        };

        async_stream::stream! {
            yield current;

            if let Some(mut receiver) = receiver {
                loop {
                    match receiver.recv().await {
                        Ok(state) => yield state,
                        Err(RecvError::Lagged(skipped)) => {
                            tracing::warn!(skipped, "State observer lagged");
                        },
                        Err(RecvError::Closed) => break,
                    }
                }
            }
        }
    }

    /// End every observation stream
    ///
    /// The value stays readable and `apply` keeps working, but nothing is
    /// published anymore.
    pub fn close(&self) {
        if self.lock().updates.take().is_some() {
            tracing::debug!("State store closed");
        }
    }

    /// Whether [`close`](Self::close) has been called
    #[must_use]
    pub fn is_closed(&self) -> bool {
        self.lock().updates.is_none()
    }
}

impl<S, P> StateStore<S, P> {
    fn lock(&self) -> MutexGuard<'_, Inner<S>> {
        // Every critical section leaves `Inner` consistent, so a poisoned lock is still usable
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)] // Test code can use unwrap
mod tests {
    use super::*;
    use futures::StreamExt;
    use std::pin::pin;

    #[test]
    fn apply_replaces_state() {
        let store = StateStore::new("idle");
        assert_eq!(store.apply("busy"), "busy");
        assert_eq!(store.current(), "busy");
        assert_eq!(store.state(|s| s.len()), 4);
    }

    #[test]
    fn acceptor_combines_proposal() {
        let store = StateStore::with_acceptor(Vec::<u8>::new(), |item: u8, state: &Vec<u8>| {
            let mut next = state.clone();
            next.push(item);
            next
        });
        store.apply(1);
        store.apply(2);
        assert_eq!(store.current(), vec![1, 2]);
    }

    #[tokio::test]
    async fn observe_replays_current_then_changes() {
        let store = StateStore::new(0);
        store.apply(1);

        let mut states = pin!(store.observe());
        assert_eq!(states.next().await, Some(1));

        store.apply(2);
        store.apply(2);
        store.apply(3);
        assert_eq!(states.next().await, Some(2));
        assert_eq!(states.next().await, Some(3));

        store.close();
        assert_eq!(states.next().await, None);
    }

    #[tokio::test]
    async fn observe_after_close_yields_current_only() {
        let store = StateStore::new(5);
        store.close();
        assert!(store.is_closed());
        store.apply(6);

        let states: Vec<_> = store.observe().collect().await;
        assert_eq!(states, vec![6]);
    }

    #[tokio::test]
    async fn lagging_observer_skips_to_retained_values() {
        let store = StateStore::with_capacity(0, Replace, 2);
        let mut states = pin!(store.observe());
        assert_eq!(states.next().await, Some(0));

        for value in 1..=5 {
            store.apply(value);
        }
        store.close();

        let rest: Vec<_> = states.collect().await;
        assert_eq!(rest, vec![4, 5]);
    }

    /// Application model holding a counter slice and an unrelated slice
    #[derive(Default)]
    struct AppStore(Mutex<(i32, &'static str)>);

    impl ExternalStore for AppStore {
        type Model = (i32, &'static str);
        type Proposal = i32;

        fn dispatch(&self, delta: i32) {
            self.0.lock().unwrap().0 += delta;
        }

        fn model(&self) -> (i32, &'static str) {
            *self.0.lock().unwrap()
        }
    }

    #[tokio::test]
    async fn external_store_receives_proposals_and_feeds_observers() {
        let app = Arc::new(AppStore::default());
        let store = StateStore::with_external(
            Arc::clone(&app),
            |model: &(i32, &'static str)| model.0,
            |count: i32| count.unsigned_abs(),
        );
        let mut states = pin!(store.observe());
        assert_eq!(states.next().await, Some(0));

        assert_eq!(store.apply(-2), 2);
        assert_eq!(app.model(), (-2, ""));

        // Another writer changes the slice; the next commit picks it up
        app.0.lock().unwrap().0 = 10;
        store.apply(1);
        assert_eq!(states.next().await, Some(2));
        assert_eq!(states.next().await, Some(11));
        assert_eq!(store.current(), 11);
    }

    #[test]
    fn clones_share_state() {
        let store = StateStore::new(1);
        let other = store.clone();
        other.apply(2);
        assert_eq!(store.current(), 2);
    }
}
