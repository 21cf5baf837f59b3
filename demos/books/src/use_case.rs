//! The book loading use case and the factory choosing its store strategy.

use crate::effects::{BooksEffects, BooksRepository};
use crate::redux::{AppStore, books_state, select_books};
use crate::reducer::{ProposalBooksReducer, SimpleBooksReducer, accept_proposal};
use crate::types::{
    BooksAction, BooksConfig, BooksEvent, BooksSideEffect, BooksState, BooksStrategy,
};
use futures::future::BoxFuture;
use futures::stream::BoxStream;
use futures::{FutureExt, StreamExt};
use knot_core::reducer::Reducer;
use knot_runtime::{Knot, KnotError};
use std::sync::Arc;
use tokio::runtime::Handle;

/// What a book screen needs from the feature
///
/// Callers never see which store strategy runs underneath.
pub trait BooksUseCase: Send + Sync {
    /// Run the feature on `handle`
    ///
    /// # Errors
    ///
    /// Returns [`KnotError`] if it already runs or was stopped.
    fn start(&self, handle: &Handle) -> Result<(), KnotError>;

    /// Stop the feature, cancelling any fetch in flight
    fn stop(&self) -> BoxFuture<'_, ()>;

    /// Observe the screen state, starting with the current one
    fn state(&self) -> BoxStream<'static, BooksState>;

    /// The current screen state
    fn current(&self) -> BooksState;

    /// Load the books, waiting for room in the intake
    ///
    /// # Errors
    ///
    /// Returns [`KnotError::Stopped`] after [`stop`](Self::stop).
    fn load(&self) -> BoxFuture<'_, Result<(), KnotError>>;

    /// Clear the list if the intake has room
    ///
    /// Returns `false` when the request was dropped; the user can clear
    /// again and no state is lost.
    fn clear(&self) -> bool;
}

/// Build a book loading use case with default configuration
#[must_use]
pub fn books_use_case(
    strategy: BooksStrategy,
    repository: Arc<dyn BooksRepository>,
) -> Box<dyn BooksUseCase> {
    books_use_case_with_config(repository, BooksConfig::default().with_strategy(strategy))
}

/// Build a book loading use case running on `config.strategy`
///
/// [`BooksStrategy::Redux`] gets a fresh [`AppStore`]; use
/// [`books_use_case_on`] to share one.
#[must_use]
pub fn books_use_case_with_config(
    repository: Arc<dyn BooksRepository>,
    config: BooksConfig,
) -> Box<dyn BooksUseCase> {
    books_use_case_on(Arc::new(AppStore::default()), repository, config)
}

/// Build a book loading use case, mirroring `app` on [`BooksStrategy::Redux`]
///
/// `app` is unused by the other strategies.
#[must_use]
pub fn books_use_case_on(
    app: Arc<AppStore>,
    repository: Arc<dyn BooksRepository>,
    config: BooksConfig,
) -> Box<dyn BooksUseCase> {
    let effects = BooksEffects::new(repository, config);
    tracing::debug!(strategy = ?config.strategy, "Building books use case");

    match config.strategy {
        BooksStrategy::Simple => Box::new(KnotBooks {
            knot: Knot::builder(SimpleBooksReducer, effects)
                .config(config.knot)
                .build(BooksState::Empty),
        }),
        BooksStrategy::Proposals => Box::new(KnotBooks {
            knot: Knot::builder(ProposalBooksReducer, effects)
                .config(config.knot)
                .build_with_acceptor(BooksState::Empty, accept_proposal),
        }),
        BooksStrategy::Redux => Box::new(KnotBooks {
            knot: Knot::builder(ProposalBooksReducer, effects)
                .config(config.knot)
                .build_external(app, select_books, books_state),
        }),
    }
}

/// A [`BooksUseCase`] backed by a knot with reducer `R`
struct KnotBooks<R>
where
    R: Reducer<
            State = BooksState,
            Event = BooksEvent,
            Action = BooksAction,
            SideEffect = BooksSideEffect,
        >,
{
    knot: Knot<R, BooksEffects>,
}

impl<R> BooksUseCase for KnotBooks<R>
where
    R: Reducer<
            State = BooksState,
            Event = BooksEvent,
            Action = BooksAction,
            SideEffect = BooksSideEffect,
        > + Send
        + 'static,
    R::Proposal: Send + 'static,
{
    fn start(&self, handle: &Handle) -> Result<(), KnotError> {
        self.knot.start(handle)
    }

    fn stop(&self) -> BoxFuture<'_, ()> {
        self.knot.stop().boxed()
    }

    fn state(&self) -> BoxStream<'static, BooksState> {
        self.knot.state().boxed()
    }

    fn current(&self) -> BooksState {
        self.knot.current()
    }

    fn load(&self) -> BoxFuture<'_, Result<(), KnotError>> {
        self.knot.send(BooksEvent::Load).boxed()
    }

    fn clear(&self) -> bool {
        self.knot.offer(BooksEvent::Clear)
    }
}
