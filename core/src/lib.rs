//! # Knot Core
//!
//! Core traits and types for Knot state containers.
//!
//! A knot is a unidirectional, event-driven state container: one observable
//! state value changes only through a pure reducer, and every piece of impure
//! work runs as a cancellable asynchronous task whose results are fed back as
//! new events.
//!
//! ## Core Concepts
//!
//! - **State**: Immutable snapshot of a feature
//! - **Event**: Something that happened (user intent, timer fired, task finished)
//! - **Proposal**: How the reducer wants the state to change
//! - **Action**: Description of asynchronous work (an effect request)
//! - **Side Effect**: Outward notification that is not part of state
//! - **Reducer**: Pure function `(State, Event) → (Proposal, Commands, Side Effects)`
//! - **Effect Handler**: Turns actions into executable [`Effect`](effect::Effect)s
//!
//! ## Example
//!
//! ```
//! use knot_core::reducer::{Reducer, Reduction};
//!
//! #[derive(Clone, Debug, PartialEq)]
//! enum Light { Off, On }
//!
//! enum Switch { Toggle }
//!
//! struct LightReducer;
//!
//! impl Reducer for LightReducer {
//!     type State = Light;
//!     type Event = Switch;
//!     type Proposal = Light;
//!     type Action = ();
//!     type SideEffect = ();
//!
//!     fn reduce(&self, state: &Light, event: Switch) -> Reduction<Light, (), ()> {
//!         match (state, event) {
//!             (Light::Off, Switch::Toggle) => Reduction::new(Light::On),
//!             (Light::On, Switch::Toggle) => Reduction::new(Light::Off),
//!         }
//!     }
//! }
//!
//! let reduction = LightReducer.reduce(&Light::Off, Switch::Toggle);
//! assert_eq!(reduction.proposal, Light::On);
//! assert!(reduction.commands.is_empty());
//! ```

// Re-export commonly used types
pub use smallvec::{SmallVec, smallvec};

mod effect_macros;

/// Reductions, commands and cancellation keys
pub mod reduction;

/// Reducer module - The core trait for business logic
///
/// Reducers are pure functions: `(State, Event) → Reduction`.
///
/// They contain all domain logic, never suspend, and are deterministic and
/// testable without a runtime.
pub mod reducer {
    pub use crate::reduction::{Command, EffectId, Reduction};

    /// The Reducer trait - core abstraction for business logic
    ///
    /// # Type Parameters
    ///
    /// - `State`: The state this reducer reads
    /// - `Event`: The events this reducer consumes
    /// - `Proposal`: The change it asks the store to apply
    /// - `Action`: The asynchronous work it can request
    /// - `SideEffect`: The outward notifications it can emit
    ///
    /// Implementations must match exhaustively on the event type so that an
    /// unclassified event is a compile error rather than a runtime branch.
    pub trait Reducer {
        /// The state type this reducer reads
        type State;

        /// The event type this reducer consumes
        type Event;

        /// The proposal type applied by the state store
        type Proposal;

        /// The effect request type handed to the effect handler
        type Action;

        /// The outward notification type
        type SideEffect;

        /// Reduce an event against the current state
        ///
        /// This is a pure function that:
        /// 1. Classifies the event against the current state
        /// 2. Proposes the next state
        /// 3. Describes asynchronous work and outward notifications
        ///
        /// # Arguments
        ///
        /// - `state`: The current committed state
        /// - `event`: The event to process
        fn reduce(
            &self,
            state: &Self::State,
            event: Self::Event,
        ) -> Reduction<Self::Proposal, Self::Action, Self::SideEffect>;
    }
}

/// Effect module - Side effect descriptions
///
/// Effects describe asynchronous work to be performed by the runtime.
/// They are values (not execution); the runtime's scheduler owns execution
/// and cancellation.
pub mod effect {
    use futures::Stream;
    use std::future::Future;
    use std::pin::Pin;
    use std::time::Duration;

    /// Effect type - describes asynchronous work that feeds events back
    ///
    /// Effects are NOT executed immediately. They are returned by an
    /// [`EffectHandler`] and executed by the runtime inside a cancellable task.
    ///
    /// # Type Parameters
    ///
    /// - `Event`: The event type that effects can produce (feedback loop)
    pub enum Effect<Event> {
        /// No-op effect
        None,

        /// Run effects concurrently
        Parallel(Vec<Effect<Event>>),

        /// Run effects one after another
        Sequential(Vec<Effect<Event>>),

        /// Timer that delivers an event when it fires
        Delay {
            /// How long to wait
            duration: Duration,
            /// Event to deliver after the delay
            event: Box<Event>,
        },

        /// Arbitrary async computation
        ///
        /// Returns `Option<Event>` - if Some, the event is fed back into the pipeline
        Future(Pin<Box<dyn Future<Output = Option<Event>> + Send>>),

        /// Async computation delivering any number of events
        Stream(Pin<Box<dyn Stream<Item = Event> + Send>>),
    }

    // Manual Debug implementation since Future doesn't implement Debug
    impl<Event> std::fmt::Debug for Effect<Event>
    where
        Event: std::fmt::Debug,
    {
        fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
            match self {
                Effect::None => write!(f, "Effect::None"),
                Effect::Parallel(effects) => {
                    f.debug_tuple("Effect::Parallel").field(effects).finish()
                },
                Effect::Sequential(effects) => {
                    f.debug_tuple("Effect::Sequential").field(effects).finish()
                },
                Effect::Delay { duration, event } => f
                    .debug_struct("Effect::Delay")
                    .field("duration", duration)
                    .field("event", event)
                    .finish(),
                Effect::Future(_) => write!(f, "Effect::Future(<future>)"),
                Effect::Stream(_) => write!(f, "Effect::Stream(<stream>)"),
            }
        }
    }

    impl<Event> Effect<Event> {
        /// Combine effects to run concurrently
        #[must_use]
        pub const fn merge(effects: Vec<Effect<Event>>) -> Effect<Event> {
            Effect::Parallel(effects)
        }

        /// Chain effects to run sequentially
        #[must_use]
        pub const fn chain(effects: Vec<Effect<Event>>) -> Effect<Event> {
            Effect::Sequential(effects)
        }

        /// Deliver `event` after `duration`
        #[must_use]
        pub fn delay(duration: Duration, event: Event) -> Effect<Event> {
            Effect::Delay {
                duration,
                event: Box::new(event),
            }
        }

        /// Returns `true` for [`Effect::None`]
        #[must_use]
        pub const fn is_none(&self) -> bool {
            matches!(self, Effect::None)
        }
    }

    impl<Event: Send + 'static> Effect<Event> {
        /// Wrap a future producing an optional event
        #[must_use]
        pub fn future<F>(future: F) -> Effect<Event>
        where
            F: Future<Output = Option<Event>> + Send + 'static,
        {
            Effect::Future(Box::pin(future))
        }

        /// Wrap a fallible future, mapping both outcomes into events
        ///
        /// This is how collaborator failures reach the reducer: the failure
        /// becomes an ordinary event instead of escaping the task.
        ///
        /// # Example
        ///
        /// ```
        /// use knot_core::effect::Effect;
        ///
        /// #[derive(Debug)]
        /// enum Event { Loaded(u32), Failed(String) }
        ///
        /// let effect: Effect<Event> = Effect::try_future(
        ///     async { Err::<u32, _>("offline") },
        ///     |n| Some(Event::Loaded(n)),
        ///     |e| Some(Event::Failed(e.to_string())),
        /// );
        /// assert!(matches!(effect, Effect::Future(_)));
        /// ```
        #[must_use]
        pub fn try_future<F, T, Err, S, X>(future: F, on_success: S, on_error: X) -> Effect<Event>
        where
            F: Future<Output = Result<T, Err>> + Send + 'static,
            S: FnOnce(T) -> Option<Event> + Send + 'static,
            X: FnOnce(Err) -> Option<Event> + Send + 'static,
        {
            Effect::Future(Box::pin(async move {
                match future.await {
                    Ok(value) => on_success(value),
                    Err(error) => on_error(error),
                }
            }))
        }

        /// Wrap a stream of events
        #[must_use]
        pub fn stream<St>(stream: St) -> Effect<Event>
        where
            St: Stream<Item = Event> + Send + 'static,
        {
            Effect::Stream(Box::pin(stream))
        }
    }

    /// Effect handler - turns effect requests into executable effects
    ///
    /// The handler owns the feature's collaborators (repositories, clients),
    /// which keeps the reducer free of I/O. Handlers are called on the
    /// pipeline task and must return quickly; the returned effect is what
    /// runs asynchronously.
    pub trait EffectHandler {
        /// The effect request type this handler understands
        type Action;

        /// The event type its effects feed back
        type Event;

        /// Describe the asynchronous work for an action
        fn handle(&self, action: Self::Action) -> Effect<Self::Event>;
    }
}

/// State module - Proposal acceptance
///
/// The state store combines a reducer's proposal with the current state
/// through an [`Acceptor`](state::Acceptor).
pub mod state {
    /// Combines a proposal with the current state into the next state
    ///
    /// Any `Fn(P, &S) -> S` closure is an acceptor.
    pub trait Acceptor<P, S>: Send + Sync {
        /// Derive the next state
        fn accept(&self, proposal: P, state: &S) -> S;
    }

    impl<P, S, F> Acceptor<P, S> for F
    where
        F: Fn(P, &S) -> S + Send + Sync,
    {
        fn accept(&self, proposal: P, state: &S) -> S {
            self(proposal, state)
        }
    }

    /// A store owned outside the knot, such as an application-wide store
    ///
    /// A knot built on one forwards every proposal through
    /// [`dispatch`](Self::dispatch) and derives its own state from the
    /// resulting model.
    pub trait ExternalStore: Send + Sync {
        /// The external store's whole model
        type Model;

        /// The proposals it understands
        type Proposal;

        /// Apply a proposal; the model must reflect it once this returns
        fn dispatch(&self, proposal: Self::Proposal);

        /// Snapshot of the current model
        fn model(&self) -> Self::Model;
    }

    /// Acceptor for stores whose proposal is the next state itself
    #[derive(Debug, Clone, Copy, Default)]
    pub struct Replace;

    impl<S> Acceptor<S, S> for Replace {
        fn accept(&self, proposal: S, _state: &S) -> S {
            proposal
        }
    }
}
