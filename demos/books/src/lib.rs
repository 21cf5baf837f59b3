//! # Books
//!
//! A book loading screen built on Knot, available on three store strategies.
//!
//! This example showcases:
//! - A fetch under a cancellation key: a second `load` supersedes the first,
//!   `clear` cancels it
//! - Collaborator failures and timeouts mapped into events
//! - Choosing between whole-state proposals, acceptor-combined proposals and
//!   an application-wide store at construction, behind one [`BooksUseCase`]
//!   trait
//! - Classifying submissions: `load` must not be lost, `clear` may be dropped
//!
//! ## Example
//!
//! ```no_run
//! use books::{BooksRepository, BooksStrategy, books_use_case};
//! use std::sync::Arc;
//!
//! # async fn example(repository: Arc<dyn BooksRepository>) -> Result<(), knot_runtime::KnotError> {
//! let books = books_use_case(BooksStrategy::Proposals, repository);
//! books.start(&tokio::runtime::Handle::current())?;
//!
//! books.load().await?;
//! // ... Loading, then Loaded(books) or Failure(message) ...
//! books.clear();
//!
//! books.stop().await;
//! # Ok(())
//! # }
//! ```

pub mod effects;
pub mod reducer;
pub mod redux;
pub mod types;
pub mod use_case;

// Re-export commonly used types
pub use effects::{BooksEffects, BooksRepository};
pub use reducer::{LOAD_SLOT, ProposalBooksReducer, SimpleBooksReducer, accept_proposal};
pub use redux::{AppModel, AppStore, BooksSlice, books_state, select_books};
pub use types::{
    Book, BooksAction, BooksConfig, BooksError, BooksEvent, BooksProposal, BooksSideEffect,
    BooksState, BooksStrategy,
};
pub use use_case::{BooksUseCase, books_use_case, books_use_case_on, books_use_case_with_config};
