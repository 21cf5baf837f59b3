//! Effect scheduler: runs effect tasks and enforces per-key cancellation.
//!
//! Every task lives in one [`JoinSet`] owned by the pipeline, so stopping the
//! pipeline cancels all of them. Keyed tasks are additionally indexed by
//! their [`EffectId`]; starting a new task under a key aborts the old one and
//! bumps a generation counter. Events carry the generation of the task that
//! produced them, and the pipeline drops events whose generation is no longer
//! current, so a superseded task can never be observed after its replacement
//! was scheduled.
//!
//! A keyed task that finishes on its own releases its key when it is reaped,
//! so per-item keys do not accumulate.

use crate::intake::{Envelope, Feedback, Origin};
use crate::metrics::{EFFECTS_CANCELLED, EFFECTS_LAUNCHED, EFFECTS_PANICKED, counter};
use futures::future::{BoxFuture, FutureExt, join_all};
use futures::StreamExt;
use knot_core::effect::{Effect, EffectHandler};
use knot_core::reduction::EffectId;
use std::any::Any;
use std::collections::HashMap;
use std::panic::AssertUnwindSafe;
use tokio::sync::mpsc;
use tokio::task::{AbortHandle, JoinError, JoinSet};

/// Cancellation scope of the task currently owning a key
#[derive(Debug)]
struct KeyedTask {
    generation: u64,
    handle: AbortHandle,
}

/// How an effect task ended on its own
#[derive(Debug)]
pub(crate) struct TaskExit {
    origin: Option<Origin>,
    panic: Option<String>,
}

pub(crate) struct EffectScheduler<H>
where
    H: EffectHandler,
{
    handler: H,
    tasks: JoinSet<TaskExit>,
    keyed: HashMap<EffectId, KeyedTask>,
    generation: u64,
    feedback: mpsc::Sender<Envelope<H::Event>>,
}

impl<H> EffectScheduler<H>
where
    H: EffectHandler,
    H::Event: Send + 'static,
{
    pub(crate) fn new(handler: H, feedback: mpsc::Sender<Envelope<H::Event>>) -> Self {
        Self {
            handler,
            tasks: JoinSet::new(),
            keyed: HashMap::new(),
            generation: 0,
            feedback,
        }
    }

    /// Abort the task owning `key` and forget the key
    ///
    /// Events the task already queued become stale.
    pub(crate) fn revoke(&mut self, key: &EffectId) {
        if let Some(task) = self.keyed.remove(key) {
            task.handle.abort();
            tracing::trace!(key = %key, generation = task.generation, "Effect task revoked");
            counter!(EFFECTS_CANCELLED).increment(1);
        }
    }

    /// Start the effect for `action`, superseding whatever owns `key`
    ///
    /// Must be called from within the tokio runtime.
    #[tracing::instrument(skip(self, action), name = "launch_effect")]
    pub(crate) fn launch(&mut self, action: H::Action, key: Option<EffectId>) {
        if let Some(key) = &key {
            self.revoke(key);
        }

        let effect = self.handler.handle(action);
        if effect.is_none() {
            tracing::trace!("Action produced Effect::None");
            return;
        }

        let origin = key.map(|key| {
            self.generation += 1;
            Origin {
                key,
                generation: self.generation,
            }
        });

        let feedback = Feedback::new(self.feedback.clone(), origin.clone());
        let exit_origin = origin.clone();
        let handle = self.tasks.spawn(async move {
            let panic = AssertUnwindSafe(drive(effect, feedback))
                .catch_unwind()
                .await
                .err()
                .map(|payload| panic_message(payload.as_ref()));
            TaskExit {
                origin: exit_origin,
                panic,
            }
        });
        counter!(EFFECTS_LAUNCHED).increment(1);

        if let Some(Origin { key, generation }) = origin {
            tracing::trace!(key = %key, generation, "Keyed effect task started");
            self.keyed.insert(key, KeyedTask { generation, handle });
        } else {
            tracing::trace!("Effect task started");
        }
    }

    /// Whether events from `origin` still belong to the task owning its key
    pub(crate) fn is_current(&self, origin: &Origin) -> bool {
        self.keyed
            .get(&origin.key)
            .is_some_and(|task| task.generation == origin.generation)
    }

    /// Wait for the next task to finish; `None` when nothing is running
    pub(crate) async fn join_next(&mut self) -> Option<Result<TaskExit, JoinError>> {
        self.tasks.join_next().await
    }

    /// Record how a finished task ended and release its key
    ///
    /// The key is released only while the finished task still owns it. Call
    /// this after every event the task delivered has been dispatched.
    pub(crate) fn reap(&mut self, result: Result<TaskExit, JoinError>) {
        match result {
            Ok(TaskExit { origin, panic }) => {
                match panic {
                    Some(message) => {
                        tracing::error!(panic = %message, "Effect task panicked");
                        counter!(EFFECTS_PANICKED).increment(1);
                    },
                    None => tracing::trace!("Effect task completed"),
                }
                if let Some(origin) = origin.filter(|origin| self.is_current(origin)) {
                    self.keyed.remove(&origin.key);
                    tracing::trace!(key = %origin.key, generation = origin.generation, "Key released");
                }
            },
            Err(error) if error.is_cancelled() => tracing::trace!("Effect task cancelled"),
            Err(error) => {
                tracing::error!(error = %error, "Effect task failed");
                counter!(EFFECTS_PANICKED).increment(1);
            },
        }
    }

    /// Number of keys owned by a live task
    #[cfg(test)]
    pub(crate) fn keys(&self) -> usize {
        self.keyed.len()
    }

    /// Number of tasks not yet reaped
    pub(crate) fn in_flight(&self) -> usize {
        self.tasks.len()
    }

    /// Abort every task and wait until all of them are gone
    pub(crate) async fn shutdown(&mut self) {
        let in_flight = self.tasks.len();
        self.keyed.clear();
        self.tasks.shutdown().await;
        if in_flight > 0 {
            tracing::debug!(in_flight, "Effect tasks cancelled on shutdown");
            #[allow(clippy::cast_possible_truncation)] // task counts fit in u64
            counter!(EFFECTS_CANCELLED).increment(in_flight as u64);
        }
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    payload
        .downcast_ref::<&str>()
        .map(ToString::to_string)
        .or_else(|| payload.downcast_ref::<String>().cloned())
        .unwrap_or_else(|| "non-string panic payload".to_string())
}

/// Execute an effect tree, delivering every produced event
///
/// Stops early once the intake has closed.
fn drive<E>(effect: Effect<E>, feedback: Feedback<E>) -> BoxFuture<'static, ()>
where
    E: Send + 'static,
{
    async move {
        match effect {
            Effect::None => {},
            Effect::Future(future) => {
                if let Some(event) = future.await {
                    feedback.deliver(event).await;
                }
            },
            Effect::Stream(mut stream) => {
                while let Some(event) = stream.next().await {
                    if !feedback.deliver(event).await {
                        break;
                    }
                }
            },
            Effect::Delay { duration, event } => {
                tokio::time::sleep(duration).await;
                feedback.deliver(*event).await;
            },
            Effect::Parallel(effects) => {
                join_all(
                    effects
                        .into_iter()
                        .map(|effect| drive(effect, feedback.clone())),
                )
                .await;
            },
            Effect::Sequential(effects) => {
                for effect in effects {
                    drive(effect, feedback.clone()).await;
                }
            },
        }
    }
    .boxed()
}
