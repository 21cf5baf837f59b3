//! An application-wide store the books screen can mirror.
//!
//! The app keeps its own model and reducer; the books knot only dispatches
//! [`BooksProposal`]s into it and reads back the books slice through
//! [`select_books`] and [`books_state`].

use crate::types::{Book, BooksProposal, BooksState};
use knot_core::state::ExternalStore;
use std::sync::{Mutex, MutexGuard, PoisonError};

/// The books slice of the application model
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct BooksSlice {
    /// A fetch is in flight
    pub loading: bool,
    /// The last fetched books
    pub books: Option<Vec<Book>>,
    /// The last failure message
    pub error: Option<String>,
}

/// The whole application model
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct AppModel {
    /// Books screen data
    pub books: BooksSlice,
    /// Number of proposals the app has seen
    pub dispatched: u64,
}

/// Application store with its own reducer
#[derive(Debug, Default)]
pub struct AppStore {
    model: Mutex<AppModel>,
}

impl AppStore {
    /// Creates a new `AppStore`
    #[must_use]
    pub fn new(model: AppModel) -> Self {
        Self {
            model: Mutex::new(model),
        }
    }

    fn lock(&self) -> MutexGuard<'_, AppModel> {
        self.model.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl ExternalStore for AppStore {
    type Model = AppModel;
    type Proposal = BooksProposal;

    fn dispatch(&self, proposal: BooksProposal) {
        let mut model = self.lock();
        model.dispatched += 1;
        reduce_books(&mut model.books, proposal);
    }

    fn model(&self) -> AppModel {
        self.lock().clone()
    }
}

/// The app's reducer for the books slice
///
/// Results only land while loading, like [`accept_proposal`](crate::accept_proposal).
fn reduce_books(slice: &mut BooksSlice, proposal: BooksProposal) {
    match proposal {
        BooksProposal::Loading => slice.loading = true,
        BooksProposal::Clear => *slice = BooksSlice::default(),
        BooksProposal::Books(books) if slice.loading => {
            *slice = BooksSlice {
                loading: false,
                books: Some(books),
                error: None,
            };
        },
        BooksProposal::Failure(message) if slice.loading => {
            *slice = BooksSlice {
                loading: false,
                books: None,
                error: Some(message),
            };
        },
        BooksProposal::Books(_) | BooksProposal::Failure(_) => {},
    }
}

/// Pick the books slice out of the application model
#[must_use]
pub fn select_books(model: &AppModel) -> BooksSlice {
    model.books.clone()
}

/// Map the books slice to what the screen shows
#[must_use]
pub fn books_state(slice: BooksSlice) -> BooksState {
    match slice {
        BooksSlice { loading: true, .. } => BooksState::Loading,
        BooksSlice {
            error: Some(message),
            ..
        } => BooksState::Failure(message),
        BooksSlice {
            books: Some(books), ..
        } => BooksState::Loaded(books),
        BooksSlice { .. } => BooksState::Empty,
    }
}
