//! The books repository and the effect handler that calls it.

use crate::types::{Book, BooksAction, BooksConfig, BooksError, BooksEvent};
use knot_core::effect::{Effect, EffectHandler};
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

/// Source of books
///
/// # Dyn Compatibility
///
/// Uses explicit `Pin<Box<dyn Future>>` returns so the repository can be
/// shared as `Arc<dyn BooksRepository>`.
pub trait BooksRepository: Send + Sync {
    /// Fetch every book
    ///
    /// # Errors
    ///
    /// Returns [`BooksError`] when the service cannot be reached or fails.
    fn load_books(&self) -> Pin<Box<dyn Future<Output = Result<Vec<Book>, BooksError>> + Send + '_>>;
}

/// Runs book fetches against a [`BooksRepository`]
#[derive(Clone)]
pub struct BooksEffects {
    repository: Arc<dyn BooksRepository>,
    config: BooksConfig,
}

impl BooksEffects {
    /// Creates a new `BooksEffects`
    #[must_use]
    pub fn new(repository: Arc<dyn BooksRepository>, config: BooksConfig) -> Self {
        Self { repository, config }
    }
}

impl EffectHandler for BooksEffects {
    type Action = BooksAction;
    type Event = BooksEvent;

    fn handle(&self, action: BooksAction) -> Effect<BooksEvent> {
        match action {
            BooksAction::FetchBooks => {
                let repository = Arc::clone(&self.repository);
                let timeout = self.config.fetch_timeout();

                Effect::try_future(
                    async move {
                        tokio::time::timeout(timeout, repository.load_books())
                            .await
                            .unwrap_or(Err(BooksError::Timeout(timeout)))
                    },
                    |books| {
                        tracing::debug!(count = books.len(), "Books fetched");
                        Some(BooksEvent::Loaded(books))
                    },
                    |error: BooksError| {
                        tracing::warn!(error = %error, "Book fetch failed");
                        Some(BooksEvent::Failed(error.to_string()))
                    },
                )
            },
        }
    }
}
