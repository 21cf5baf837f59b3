//! Domain types for the book loading feature.

use knot_runtime::KnotConfig;
use serde::{Deserialize, Serialize};
use std::convert::Infallible;
use std::time::Duration;
use thiserror::Error;

/// A book as the repository returns it
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Book {
    /// Title
    pub title: String,
    /// Publication year
    pub year: u16,
}

impl Book {
    /// Creates a new `Book`
    #[must_use]
    pub fn new(title: impl Into<String>, year: u16) -> Self {
        Self {
            title: title.into(),
            year,
        }
    }
}

/// What the book screen shows
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum BooksState {
    /// Nothing loaded
    #[default]
    Empty,
    /// A load is in flight
    Loading,
    /// The last load succeeded
    Loaded(Vec<Book>),
    /// The last load failed; carries a user-facing message
    Failure(String),
}

impl BooksState {
    /// Returns `true` while a load is in flight
    #[must_use]
    pub const fn is_loading(&self) -> bool {
        matches!(self, Self::Loading)
    }
}

/// Inputs of the book loading feature
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BooksEvent {
    /// The user asked for the books
    Load,
    /// The user cleared the list
    Clear,
    /// The repository returned the books
    Loaded(Vec<Book>),
    /// The repository failed
    Failed(String),
}

/// Asynchronous work the reducers can request
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BooksAction {
    /// Fetch the books from the repository
    FetchBooks,
}

/// State changes proposed by the proposal-based reducer
///
/// The acceptor decides how each one combines with the current state, so a
/// late result can never overwrite a cleared screen.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BooksProposal {
    /// Show the loading indicator
    Loading,
    /// Clear the screen
    Clear,
    /// Show the fetched books, if still loading
    Books(Vec<Book>),
    /// Show a failure, if still loading
    Failure(String),
}

/// The books feature never notifies anyone outside its state
pub type BooksSideEffect = Infallible;

/// Errors reported by a [`BooksRepository`](crate::BooksRepository)
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum BooksError {
    /// The request did not reach the service
    #[error("Network error: {0}")]
    Network(String),

    /// The service answered with an error status
    #[error("Books service returned status {0}")]
    Status(u16),

    /// The service did not answer within the fetch timeout
    #[error("Books service timed out after {0:?}")]
    Timeout(Duration),
}

/// Which store strategy a [`BooksUseCase`](crate::BooksUseCase) runs on
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BooksStrategy {
    /// The reducer proposes whole states
    #[default]
    Simple,
    /// The reducer proposes changes that an acceptor applies
    Proposals,
    /// The reducer's proposals go to an application-wide store the screen
    /// mirrors
    Redux,
}

/// Configuration for the book loading feature
///
/// # Example
///
/// ```
/// use books::{BooksConfig, BooksStrategy};
/// use std::time::Duration;
///
/// let config = BooksConfig::default().with_strategy(BooksStrategy::Proposals);
/// assert_eq!(config.fetch_timeout(), Duration::from_secs(10));
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct BooksConfig {
    /// Store strategy
    pub strategy: BooksStrategy,
    /// How long a fetch may take before it fails
    pub fetch_timeout_ms: u64,
    /// Channel capacities of the underlying knot
    pub knot: KnotConfig,
}

impl BooksConfig {
    /// Use another store strategy
    #[must_use]
    pub const fn with_strategy(mut self, strategy: BooksStrategy) -> Self {
        self.strategy = strategy;
        self
    }

    /// Use another fetch timeout
    #[must_use]
    pub const fn with_fetch_timeout_ms(mut self, fetch_timeout_ms: u64) -> Self {
        self.fetch_timeout_ms = fetch_timeout_ms;
        self
    }

    /// The fetch timeout
    #[must_use]
    pub const fn fetch_timeout(&self) -> Duration {
        Duration::from_millis(self.fetch_timeout_ms)
    }
}

impl Default for BooksConfig {
    fn default() -> Self {
        Self {
            strategy: BooksStrategy::default(),
            fetch_timeout_ms: 10_000,
            knot: KnotConfig::default(),
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)] // Test code can use unwrap
mod tests {
    use super::*;

    #[test]
    fn partial_config_keeps_defaults() {
        let config: BooksConfig = serde_json::from_str(r#"{"strategy": "redux"}"#).unwrap();
        assert_eq!(
            config,
            BooksConfig::default().with_strategy(BooksStrategy::Redux)
        );
        assert_eq!(config.fetch_timeout(), Duration::from_secs(10));
    }

    #[test]
    fn unknown_strategy_is_rejected() {
        let parsed = serde_json::from_str::<BooksConfig>(r#"{"strategy": "mvi"}"#);
        assert!(parsed.is_err());
    }
}
