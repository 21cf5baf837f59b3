//! Reducer output: the proposal plus instructions for the runtime.
//!
//! A [`Reduction`] is built with a small fluent API so reducers read as a
//! description of the transition:
//!
//! ```
//! use knot_core::reduction::{Command, EffectId, Reduction};
//!
//! const SLOT: EffectId = EffectId::from_static("player.slot");
//!
//! let reduction: Reduction<&str, &str, &str> = Reduction::new("loading")
//!     .run_keyed(SLOT, "fetch")
//!     .emit("spinner-shown");
//!
//! assert_eq!(reduction.proposal, "loading");
//! assert_eq!(reduction.commands.len(), 1);
//! assert!(matches!(&reduction.commands[0], Command::Run { key: Some(key), .. } if *key == SLOT));
//! assert_eq!(reduction.side_effects.as_slice(), &["spinner-shown"]);
//! ```

use smallvec::SmallVec;
use std::borrow::Cow;
use std::fmt;

/// Cancellation key grouping mutually exclusive effect tasks
///
/// At most one task runs per key. Starting a task under a key that already
/// has one supersedes (cancels) the older task.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct EffectId(Cow<'static, str>);

impl EffectId {
    /// Create a key from a static name, usable in `const` items
    #[must_use]
    pub const fn from_static(name: &'static str) -> Self {
        Self(Cow::Borrowed(name))
    }

    /// Create a key from any string
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self(Cow::Owned(name.into()))
    }

    /// The key name
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for EffectId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&'static str> for EffectId {
    fn from(name: &'static str) -> Self {
        Self::from_static(name)
    }
}

impl From<String> for EffectId {
    fn from(name: String) -> Self {
        Self(Cow::Owned(name))
    }
}

/// Instruction from a reducer to the effect scheduler
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command<A> {
    /// Run the effect for `action`, optionally under a cancellation key
    Run {
        /// The effect request
        action: A,
        /// Key whose previous task this one supersedes
        key: Option<EffectId>,
    },

    /// Cancel whatever runs under the key
    Cancel(EffectId),
}

impl<A> Command<A> {
    /// The cancellation key this command touches, if any
    #[must_use]
    pub const fn key(&self) -> Option<&EffectId> {
        match self {
            Command::Run { key, .. } => key.as_ref(),
            Command::Cancel(key) => Some(key),
        }
    }
}

/// The result of one reduction
///
/// # Type Parameters
///
/// - `P`: Proposal applied by the state store
/// - `A`: Effect request type
/// - `X`: Side effect type
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Reduction<P, A, X> {
    /// How the state should change
    pub proposal: P,
    /// Work for the effect scheduler, in order
    pub commands: SmallVec<[Command<A>; 2]>,
    /// Notifications emitted after the proposal is committed
    pub side_effects: SmallVec<[X; 1]>,
}

impl<P, A, X> Reduction<P, A, X> {
    /// A reduction that only proposes a state change
    #[must_use]
    pub fn new(proposal: P) -> Self {
        Self {
            proposal,
            commands: SmallVec::new(),
            side_effects: SmallVec::new(),
        }
    }

    /// Run an effect request outside any cancellation key
    #[must_use]
    pub fn run(mut self, action: A) -> Self {
        self.commands.push(Command::Run { action, key: None });
        self
    }

    /// Run an effect request under `key`, superseding the key's current task
    #[must_use]
    pub fn run_keyed(mut self, key: impl Into<EffectId>, action: A) -> Self {
        self.commands.push(Command::Run {
            action,
            key: Some(key.into()),
        });
        self
    }

    /// Cancel the task running under `key`
    #[must_use]
    pub fn cancel(mut self, key: impl Into<EffectId>) -> Self {
        self.commands.push(Command::Cancel(key.into()));
        self
    }

    /// Emit a side effect once the proposal is committed
    #[must_use]
    pub fn emit(mut self, side_effect: X) -> Self {
        self.side_effects.push(side_effect);
        self
    }

    /// Split into its parts
    #[must_use]
    pub fn into_parts(
        self,
    ) -> (
        P,
        SmallVec<[Command<A>; 2]>,
        SmallVec<[X; 1]>,
    ) {
        (self.proposal, self.commands, self.side_effects)
    }
}
