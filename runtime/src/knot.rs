//! The Knot container: state store, intake, scheduler and their lifecycle.
//!
//! A [`Knot`] owns a single pipeline task. The pipeline pulls one event at a
//! time from the intake and, for each event:
//!
//! 1. drops it if the keyed task that produced it has been superseded
//! 2. reduces it against the current state
//! 3. revokes every cancellation key the reduction names
//! 4. commits the proposal through the store
//! 5. emits the reduction's side effects
//! 6. launches the requested effect tasks
//!
//! Effect tasks run concurrently and feed their events back into the same
//! intake, so every reduction is strictly serialized.

use crate::error::KnotError;
use crate::intake::{Envelope, EventSender};
use crate::metrics::{EVENTS_STALE, EVENTS_TOTAL, REDUCER_DURATION, counter, histogram};
use crate::outbox::Outbox;
use crate::scheduler::{EffectScheduler, TaskExit};
use crate::state_store::StateStore;
use crate::KnotConfig;
use futures::Stream;
use knot_core::effect::EffectHandler;
use knot_core::reducer::{Command, Reducer};
use knot_core::state::{Acceptor, ExternalStore, Replace};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Instant;
use tokio::runtime::Handle;
use tokio::sync::{broadcast, mpsc, oneshot};
use tokio::task::{JoinError, JoinHandle};

/// Everything the pipeline task owns
struct Pipeline<R, H>
where
    R: Reducer,
    H: EffectHandler<Action = R::Action, Event = R::Event>,
{
    reducer: R,
    scheduler: EffectScheduler<H>,
    receiver: mpsc::Receiver<Envelope<R::Event>>,
    store: StateStore<R::State, R::Proposal>,
    side_effects: Arc<Outbox<R::SideEffect>>,
}

enum Lifecycle<R, H>
where
    R: Reducer,
    H: EffectHandler<Action = R::Action, Event = R::Event>,
{
    Ready(Pipeline<R, H>),
    Running {
        shutdown: oneshot::Sender<()>,
        task: JoinHandle<()>,
    },
    Stopped,
}

/// A unidirectional, event-driven state container
///
/// # Type Parameters
///
/// - `R`: Reducer deciding how events change state
/// - `H`: Effect handler turning the reducer's actions into effects
///
/// # Example
///
/// ```
/// use knot_core::effect::{Effect, EffectHandler};
/// use knot_core::reducer::{Reducer, Reduction};
/// use knot_runtime::Knot;
///
/// struct Counter;
///
/// impl Reducer for Counter {
///     type State = u32;
///     type Event = u32;
///     type Proposal = u32;
///     type Action = ();
///     type SideEffect = ();
///
///     fn reduce(&self, state: &u32, event: u32) -> Reduction<u32, (), ()> {
///         Reduction::new(state + event)
///     }
/// }
///
/// struct NoEffects;
///
/// impl EffectHandler for NoEffects {
///     type Action = ();
///     type Event = u32;
///
///     fn handle(&self, _action: ()) -> Effect<u32> {
///         Effect::None
///     }
/// }
///
/// # tokio_test::block_on(async {
/// let knot = Knot::new(0, Counter, NoEffects);
/// knot.start(&tokio::runtime::Handle::current()).unwrap();
/// knot.send(2).await.unwrap();
/// knot.stop().await;
/// # });
/// ```
pub struct Knot<R, H>
where
    R: Reducer,
    H: EffectHandler<Action = R::Action, Event = R::Event>,
{
    store: StateStore<R::State, R::Proposal>,
    intake: EventSender<R::Event>,
    side_effects: Arc<Outbox<R::SideEffect>>,
    lifecycle: Mutex<Lifecycle<R, H>>,
}

impl<R, H> Knot<R, H>
where
    R: Reducer + Send + 'static,
    H: EffectHandler<Action = R::Action, Event = R::Event> + Send + 'static,
    R::State: Clone + PartialEq + Send + Sync + 'static,
    R::Event: Send + 'static,
    R::Proposal: Send + 'static,
    R::Action: Send + 'static,
    R::SideEffect: Clone + Send + 'static,
{
    /// Start building a knot from its reducer and effect handler
    #[must_use]
    pub fn builder(reducer: R, handler: H) -> KnotBuilder<R, H> {
        KnotBuilder {
            reducer,
            handler,
            config: KnotConfig::default(),
        }
    }

    /// Create a knot whose store combines proposals through `acceptor`
    #[must_use]
    pub fn with_acceptor(
        initial_state: R::State,
        acceptor: impl Acceptor<R::Proposal, R::State> + 'static,
        reducer: R,
        handler: H,
        config: KnotConfig,
    ) -> Self {
        let config = config.normalized();
        let store = StateStore::with_capacity(initial_state, acceptor, config.state_capacity);
        Self::with_store(store, reducer, handler, config)
    }

    /// Create a knot on an existing store
    ///
    /// `config.state_capacity` is ignored; the store brings its own.
    #[must_use]
    pub fn with_store(
        store: StateStore<R::State, R::Proposal>,
        reducer: R,
        handler: H,
        config: KnotConfig,
    ) -> Self {
        let config = config.normalized();
        let side_effects = Arc::new(Outbox::new(config.side_effect_capacity));
        let (tx, receiver) = mpsc::channel(config.intake_capacity);

        let pipeline = Pipeline {
            reducer,
            scheduler: EffectScheduler::new(handler, tx.clone()),
            receiver,
            store: store.clone(),
            side_effects: Arc::clone(&side_effects),
        };

        Self {
            store,
            intake: EventSender::new(tx),
            side_effects,
            lifecycle: Mutex::new(Lifecycle::Ready(pipeline)),
        }
    }

    /// Spawn the pipeline on `handle`
    ///
    /// Events submitted earlier are processed first, in submission order.
    ///
    /// # Errors
    ///
    /// - [`KnotError::AlreadyStarted`] if the knot is running
    /// - [`KnotError::Stopped`] if the knot has been stopped
    pub fn start(&self, handle: &Handle) -> Result<(), KnotError> {
        let mut lifecycle = self.lock();

        match std::mem::replace(&mut *lifecycle, Lifecycle::Stopped) {
            Lifecycle::Ready(pipeline) => {
                let (shutdown, signal) = oneshot::channel();
                let task = handle.spawn(pipeline.run(signal));
                *lifecycle = Lifecycle::Running { shutdown, task };
                tracing::debug!("Knot started");
                Ok(())
            },
            running @ Lifecycle::Running { .. } => {
                *lifecycle = running;
                tracing::warn!("Rejected start: knot is already running");
                Err(KnotError::AlreadyStarted)
            },
            Lifecycle::Stopped => Err(KnotError::Stopped),
        }
    }

    /// Stop the pipeline and cancel every effect task
    ///
    /// Returns once all effect tasks are gone. The state and side effect
    /// streams end and the last committed state stays readable through
    /// [`current`](Self::current). Calling `stop` again, or before `start`,
    /// does nothing.
    #[tracing::instrument(skip(self), name = "knot_stop")]
    pub async fn stop(&self) {
        let (shutdown, task) = {
            let mut lifecycle = self.lock();
            match std::mem::replace(&mut *lifecycle, Lifecycle::Stopped) {
                Lifecycle::Running { shutdown, task } => (shutdown, task),
                other => {
                    *lifecycle = other;
                    return;
                },
            }
        };

        // The pipeline may already be gone if it panicked
        let _ = shutdown.send(());
        match task.await {
            Ok(()) => tracing::debug!("Knot stopped"),
            Err(error) if error.is_panic() => {
                tracing::error!(error = %error, "Knot pipeline panicked");
            },
            Err(error) => tracing::debug!(error = %error, "Knot pipeline aborted"),
        }

        self.store.close();
        self.side_effects.close();
    }

    /// Submit an event, waiting while the intake is full
    ///
    /// # Errors
    ///
    /// Returns [`KnotError::Stopped`] once the knot has been stopped.
    #[tracing::instrument(skip(self, event), name = "knot_send")]
    pub async fn send(&self, event: R::Event) -> Result<(), KnotError> {
        self.intake.send(event).await
    }

    /// Submit an event only if the intake has room; see [`EventSender::offer`]
    pub fn offer(&self, event: R::Event) -> bool {
        self.intake.offer(event)
    }

    /// A cloneable handle for submitting events from elsewhere
    #[must_use]
    pub fn intake(&self) -> EventSender<R::Event> {
        self.intake.clone()
    }

    /// Clone of the last committed state
    #[must_use]
    pub fn current(&self) -> R::State {
        self.store.current()
    }

    /// Observe the state: the current value first, then each committed change
    pub fn state(&self) -> impl Stream<Item = R::State> + Send + 'static {
        self.store.observe()
    }

    /// Receive side effects emitted from now on
    ///
    /// Side effects emitted while nobody is subscribed are lost.
    #[must_use]
    pub fn subscribe_side_effects(&self) -> broadcast::Receiver<R::SideEffect> {
        self.side_effects.subscribe()
    }

    /// Whether the pipeline is running
    #[must_use]
    pub fn is_running(&self) -> bool {
        matches!(*self.lock(), Lifecycle::Running { .. })
    }
}

impl<S, R, H> Knot<R, H>
where
    R: Reducer<State = S, Proposal = S> + Send + 'static,
    H: EffectHandler<Action = R::Action, Event = R::Event> + Send + 'static,
    S: Clone + PartialEq + Send + Sync + 'static,
    R::Event: Send + 'static,
    R::Action: Send + 'static,
    R::SideEffect: Clone + Send + 'static,
{
    /// Create a knot whose proposals replace the state
    #[must_use]
    pub fn new(initial_state: S, reducer: R, handler: H) -> Self {
        Self::with_config(initial_state, reducer, handler, KnotConfig::default())
    }

    /// Like [`new`](Self::new) with custom channel capacities
    #[must_use]
    pub fn with_config(initial_state: S, reducer: R, handler: H, config: KnotConfig) -> Self {
        Self::with_acceptor(initial_state, Replace, reducer, handler, config)
    }
}

impl<R, H> Knot<R, H>
where
    R: Reducer,
    H: EffectHandler<Action = R::Action, Event = R::Event>,
{
    fn lock(&self) -> MutexGuard<'_, Lifecycle<R, H>> {
        self.lifecycle.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl<R, H> Drop for Knot<R, H>
where
    R: Reducer,
    H: EffectHandler<Action = R::Action, Event = R::Event>,
{
    fn drop(&mut self) {
        if let Lifecycle::Running { task, .. } = &*self.lock() {
            // Dropping the pipeline drops its task set, which aborts every effect
            task.abort();
            tracing::debug!("Running knot dropped, pipeline aborted");
        }
    }
}

impl<R, H> Pipeline<R, H>
where
    R: Reducer,
    H: EffectHandler<Action = R::Action, Event = R::Event>,
    R::State: Clone + PartialEq + Send + Sync + 'static,
    R::Event: Send + 'static,
    R::Proposal: 'static,
    R::SideEffect: Clone,
{
    #[tracing::instrument(skip_all, name = "knot_pipeline")]
    async fn run(mut self, mut shutdown: oneshot::Receiver<()>) {
        tracing::debug!("Pipeline running");

        loop {
            tokio::select! {
                biased;

                // Also fires when the knot was dropped without stopping
                _ = &mut shutdown => break,

                envelope = self.receiver.recv() => match envelope {
                    Some(envelope) => self.dispatch(envelope),
                    None => break,
                },

                Some(result) = self.scheduler.join_next() => self.finish(result),
            }
        }

        self.receiver.close();
        self.scheduler.shutdown().await;
        self.store.close();
        self.side_effects.close();
        tracing::debug!("Pipeline finished");
    }

    /// Dispatch what a finished task left in the intake, then reap it
    ///
    /// A task finishes only after its deliveries were accepted, so its events
    /// are all queued ahead of this point and still see its key as current.
    fn finish(&mut self, result: Result<TaskExit, JoinError>) {
        for _ in 0..self.receiver.len() {
            match self.receiver.try_recv() {
                Ok(envelope) => self.dispatch(envelope),
                Err(_) => break,
            }
        }
        self.scheduler.reap(result);
    }

    fn dispatch(&mut self, envelope: Envelope<R::Event>) {
        let Envelope { event, origin } = envelope;

        if let Some(origin) = &origin {
            if !self.scheduler.is_current(origin) {
                tracing::trace!(
                    key = %origin.key,
                    generation = origin.generation,
                    "Dropped event from superseded effect"
                );
                counter!(EVENTS_STALE).increment(1);
                return;
            }
        }

        counter!(EVENTS_TOTAL).increment(1);

        let started = Instant::now();
        let reduction = {
            let _span = tracing::debug_span!("reduce").entered();
            self.store.state(|state| self.reducer.reduce(state, event))
        };
        histogram!(REDUCER_DURATION).record(started.elapsed().as_secs_f64());

        let (proposal, commands, side_effects) = reduction.into_parts();

        for key in commands.iter().filter_map(Command::key) {
            self.scheduler.revoke(key);
        }

        self.store.apply(proposal);

        for side_effect in side_effects {
            self.side_effects.emit(side_effect);
        }

        for command in commands {
            if let Command::Run { action, key } = command {
                self.scheduler.launch(action, key);
            }
        }

        tracing::debug!(in_flight = self.scheduler.in_flight(), "Event processed");
    }
}

/// Builder choosing a knot's store strategy and configuration
///
/// # Example
///
/// ```ignore
/// let knot = Knot::builder(reducer, handler)
///     .config(KnotConfig::default().with_intake_capacity(8))
///     .build_with_acceptor(State::default(), accept_proposal);
/// ```
pub struct KnotBuilder<R, H> {
    reducer: R,
    handler: H,
    config: KnotConfig,
}

impl<R, H> KnotBuilder<R, H>
where
    R: Reducer + Send + 'static,
    H: EffectHandler<Action = R::Action, Event = R::Event> + Send + 'static,
    R::State: Clone + PartialEq + Send + Sync + 'static,
    R::Event: Send + 'static,
    R::Proposal: Send + 'static,
    R::Action: Send + 'static,
    R::SideEffect: Clone + Send + 'static,
{
    /// Use custom channel capacities
    #[must_use]
    pub const fn config(mut self, config: KnotConfig) -> Self {
        self.config = config;
        self
    }

    /// Build a knot whose store combines proposals through `acceptor`
    #[must_use]
    pub fn build_with_acceptor(
        self,
        initial_state: R::State,
        acceptor: impl Acceptor<R::Proposal, R::State> + 'static,
    ) -> Knot<R, H> {
        Knot::with_acceptor(
            initial_state,
            acceptor,
            self.reducer,
            self.handler,
            self.config,
        )
    }

    /// Build a knot mirroring a slice of an [`ExternalStore`]
    ///
    /// See [`StateStore::with_external`].
    #[must_use]
    pub fn build_external<E, M>(
        self,
        external: Arc<E>,
        selector: impl Fn(&E::Model) -> M + Send + Sync + 'static,
        mapper: impl Fn(M) -> R::State + Send + Sync + 'static,
    ) -> Knot<R, H>
    where
        E: ExternalStore<Proposal = R::Proposal> + 'static,
    {
        let config = self.config.normalized();
        let store =
            StateStore::with_external_capacity(external, selector, mapper, config.state_capacity);
        Knot::with_store(store, self.reducer, self.handler, config)
    }
}

impl<S, R, H> KnotBuilder<R, H>
where
    R: Reducer<State = S, Proposal = S> + Send + 'static,
    H: EffectHandler<Action = R::Action, Event = R::Event> + Send + 'static,
    S: Clone + PartialEq + Send + Sync + 'static,
    R::Event: Send + 'static,
    R::Action: Send + 'static,
    R::SideEffect: Clone + Send + 'static,
{
    /// Build a knot whose proposals replace the state
    #[must_use]
    pub fn build(self, initial_state: S) -> Knot<R, H> {
        self.build_with_acceptor(initial_state, Replace)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::StreamExt;
    use knot_core::effect::Effect;
    use knot_core::reducer::Reduction;
    use std::pin::pin;
    use std::time::Duration;

    #[derive(Debug, Clone, PartialEq)]
    enum Event {
        Add(u32),
        AddLater(u32),
        Reset,
    }

    #[derive(Debug, Clone, PartialEq)]
    enum Action {
        Echo(u32),
    }

    struct Adder;

    impl Reducer for Adder {
        type State = u32;
        type Event = Event;
        type Proposal = u32;
        type Action = Action;
        type SideEffect = &'static str;

        fn reduce(&self, state: &u32, event: Event) -> Reduction<u32, Action, &'static str> {
            match event {
                Event::Add(n) => Reduction::new(state + n),
                Event::AddLater(n) => Reduction::new(*state).run_keyed("later", Action::Echo(n)),
                Event::Reset => Reduction::new(0).cancel("later").emit("reset"),
            }
        }
    }

    struct Echo;

    impl EffectHandler for Echo {
        type Action = Action;
        type Event = Event;

        fn handle(&self, action: Action) -> Effect<Event> {
            match action {
                Action::Echo(n) => Effect::delay(Duration::from_millis(100), Event::Add(n)),
            }
        }
    }

    #[tokio::test]
    async fn events_before_start_wait() {
        let knot = Knot::new(0, Adder, Echo);
        tokio_test::assert_ok!(knot.send(Event::Add(1)).await);
        assert_eq!(knot.current(), 0);

        let mut states = pin!(knot.state());
        assert_eq!(states.next().await, Some(0));

        tokio_test::assert_ok!(knot.start(&Handle::current()));
        assert_eq!(states.next().await, Some(1));
        knot.stop().await;
    }

    #[tokio::test]
    async fn start_twice_and_after_stop() {
        let knot = Knot::new(0, Adder, Echo);
        knot.stop().await;
        assert!(!knot.is_running());

        tokio_test::assert_ok!(knot.start(&Handle::current()));
        assert!(knot.is_running());
        assert_eq!(knot.start(&Handle::current()), Err(KnotError::AlreadyStarted));

        knot.stop().await;
        knot.stop().await;
        assert!(!knot.is_running());
        assert_eq!(knot.start(&Handle::current()), Err(KnotError::Stopped));
        assert_eq!(knot.send(Event::Add(1)).await, Err(KnotError::Stopped));
    }

    #[tokio::test(start_paused = true)]
    async fn cancel_suppresses_pending_effect() {
        let knot = Knot::new(0, Adder, Echo);
        tokio_test::assert_ok!(knot.start(&Handle::current()));
        let mut side_effects = knot.subscribe_side_effects();

        tokio_test::assert_ok!(knot.send(Event::AddLater(5)).await);
        tokio_test::assert_ok!(knot.send(Event::Reset).await);
        assert_eq!(side_effects.recv().await, Ok("reset"));

        tokio::time::sleep(Duration::from_millis(500)).await;
        assert_eq!(knot.current(), 0);
        knot.stop().await;
    }

    fn pipeline() -> Pipeline<Adder, Echo> {
        let (tx, receiver) = mpsc::channel(8);
        Pipeline {
            reducer: Adder,
            scheduler: EffectScheduler::new(Echo, tx),
            receiver,
            store: StateStore::new(0),
            side_effects: Arc::new(Outbox::new(4)),
        }
    }

    fn event(event: Event) -> Envelope<Event> {
        Envelope {
            event,
            origin: None,
        }
    }

    #[tokio::test(start_paused = true)]
    async fn queued_event_from_superseded_task_is_discarded() {
        let mut pipeline = pipeline();

        pipeline.dispatch(event(Event::AddLater(5)));
        let queued = pipeline.receiver.recv().await;
        let Some(stale) = queued else {
            unreachable!("the keyed task delivers Add(5)")
        };
        assert_eq!(stale.event, Event::Add(5));

        // The superseding event was reduced before the queued one
        pipeline.dispatch(event(Event::AddLater(7)));
        pipeline.dispatch(stale);
        assert_eq!(pipeline.store.current(), 0);

        let Some(current) = pipeline.receiver.recv().await else {
            unreachable!("the successor delivers Add(7)")
        };
        pipeline.dispatch(current);
        assert_eq!(pipeline.store.current(), 7);
        pipeline.scheduler.shutdown().await;
    }

    #[tokio::test(start_paused = true)]
    async fn finished_task_events_apply_before_its_key_is_released() {
        let mut pipeline = pipeline();

        pipeline.dispatch(event(Event::AddLater(5)));
        let Some(result) = pipeline.scheduler.join_next().await else {
            unreachable!("one task was launched")
        };
        assert_eq!(pipeline.receiver.len(), 1);

        pipeline.finish(result);
        assert_eq!(pipeline.store.current(), 5);
        assert_eq!(pipeline.scheduler.keys(), 0);
        assert_eq!(pipeline.scheduler.in_flight(), 0);
    }

    #[tokio::test]
    async fn builder_with_acceptor() {
        let knot = Knot::builder(Adder, Echo)
            .config(KnotConfig::default().with_intake_capacity(2))
            .build_with_acceptor(100, |proposal: u32, state: &u32| proposal.max(*state));
        tokio_test::assert_ok!(knot.start(&Handle::current()));

        let mut states = pin!(knot.state());
        assert_eq!(states.next().await, Some(100));

        tokio_test::assert_ok!(knot.send(Event::Reset).await);
        tokio_test::assert_ok!(knot.send(Event::Add(150)).await);
        assert_eq!(states.next().await, Some(250));
        knot.stop().await;
        assert_eq!(states.next().await, None);
    }

    /// Application store keeping the counter next to other data
    #[derive(Default)]
    struct Ledger(std::sync::Mutex<(u32, Vec<u32>)>);

    impl ExternalStore for Ledger {
        type Model = (u32, Vec<u32>);
        type Proposal = u32;

        fn dispatch(&self, total: u32) {
            let mut ledger = self.0.lock().unwrap_or_else(PoisonError::into_inner);
            ledger.0 = total;
            ledger.1.push(total);
        }

        fn model(&self) -> (u32, Vec<u32>) {
            self.0.lock().unwrap_or_else(PoisonError::into_inner).clone()
        }
    }

    #[tokio::test]
    async fn builder_on_external_store() {
        let ledger = Arc::new(Ledger::default());
        let knot = Knot::builder(Adder, Echo).build_external(
            Arc::clone(&ledger),
            |model: &(u32, Vec<u32>)| model.0,
            |total: u32| total,
        );
        tokio_test::assert_ok!(knot.start(&Handle::current()));

        let mut states = pin!(knot.state());
        assert_eq!(states.next().await, Some(0));

        tokio_test::assert_ok!(knot.send(Event::Add(2)).await);
        tokio_test::assert_ok!(knot.send(Event::Add(3)).await);
        assert_eq!(states.next().await, Some(2));
        assert_eq!(states.next().await, Some(5));
        assert_eq!(ledger.model(), (5, vec![2, 5]));
        knot.stop().await;
    }
}
