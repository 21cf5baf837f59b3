//! Reducers for the book loading feature, one per store strategy.
//!
//! Both run every fetch under [`LOAD_SLOT`]: a second `Load` supersedes the
//! first and `Clear` cancels whatever is in flight.

use crate::types::{BooksAction, BooksEvent, BooksProposal, BooksSideEffect, BooksState};
use knot_core::reducer::{EffectId, Reducer, Reduction};

/// Cancellation key of the book fetch
pub const LOAD_SLOT: EffectId = EffectId::from_static("books.load");

/// Reducer that proposes whole states
#[derive(Clone, Copy, Debug, Default)]
pub struct SimpleBooksReducer;

impl Reducer for SimpleBooksReducer {
    type State = BooksState;
    type Event = BooksEvent;
    type Proposal = BooksState;
    type Action = BooksAction;
    type SideEffect = BooksSideEffect;

    fn reduce(
        &self,
        state: &BooksState,
        event: BooksEvent,
    ) -> Reduction<BooksState, BooksAction, BooksSideEffect> {
        match event {
            BooksEvent::Load => {
                Reduction::new(BooksState::Loading).run_keyed(LOAD_SLOT, BooksAction::FetchBooks)
            },
            BooksEvent::Clear => Reduction::new(BooksState::Empty).cancel(LOAD_SLOT),
            BooksEvent::Loaded(books) if state.is_loading() => {
                Reduction::new(BooksState::Loaded(books))
            },
            BooksEvent::Failed(message) if state.is_loading() => {
                Reduction::new(BooksState::Failure(message))
            },
            BooksEvent::Loaded(_) | BooksEvent::Failed(_) => Reduction::new(state.clone()),
        }
    }
}

/// Reducer that only translates events into proposals
///
/// Whether a result still applies is decided by [`accept_proposal`].
#[derive(Clone, Copy, Debug, Default)]
pub struct ProposalBooksReducer;

impl Reducer for ProposalBooksReducer {
    type State = BooksState;
    type Event = BooksEvent;
    type Proposal = BooksProposal;
    type Action = BooksAction;
    type SideEffect = BooksSideEffect;

    fn reduce(
        &self,
        _state: &BooksState,
        event: BooksEvent,
    ) -> Reduction<BooksProposal, BooksAction, BooksSideEffect> {
        match event {
            BooksEvent::Load => Reduction::new(BooksProposal::Loading)
                .run_keyed(LOAD_SLOT, BooksAction::FetchBooks),
            BooksEvent::Clear => Reduction::new(BooksProposal::Clear).cancel(LOAD_SLOT),
            BooksEvent::Loaded(books) => Reduction::new(BooksProposal::Books(books)),
            BooksEvent::Failed(message) => Reduction::new(BooksProposal::Failure(message)),
        }
    }
}

/// Combine a [`BooksProposal`] with the current state
///
/// Results only land on a loading screen.
#[must_use]
pub fn accept_proposal(proposal: BooksProposal, state: &BooksState) -> BooksState {
    match (proposal, state) {
        (BooksProposal::Loading, _) => BooksState::Loading,
        (BooksProposal::Clear, _) => BooksState::Empty,
        (BooksProposal::Books(books), BooksState::Loading) => BooksState::Loaded(books),
        (BooksProposal::Failure(message), BooksState::Loading) => BooksState::Failure(message),
        (BooksProposal::Books(_) | BooksProposal::Failure(_), _) => state.clone(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Book;
    use knot_testing::{ReducerTest, assertions};

    fn shelf() -> Vec<Book> {
        vec![Book::new("Dune", 1965), Book::new("Solaris", 1961)]
    }

    #[test]
    fn load_fetches_under_the_slot() {
        ReducerTest::new(SimpleBooksReducer)
            .given_state(BooksState::Loaded(shelf()))
            .when_event(BooksEvent::Load)
            .then_proposal(|state| assert_eq!(state, &BooksState::Loading))
            .then_commands(|commands| {
                assertions::assert_commands_count(commands, 1);
                assertions::assert_runs_keyed(commands, LOAD_SLOT, &BooksAction::FetchBooks);
            })
            .run();
    }

    #[test]
    fn clear_cancels_the_fetch() {
        ReducerTest::new(SimpleBooksReducer)
            .given_state(BooksState::Loading)
            .when_event(BooksEvent::Clear)
            .then_proposal(|state| assert_eq!(state, &BooksState::Empty))
            .then_commands(|commands| assertions::assert_cancels(commands, LOAD_SLOT))
            .run();
    }

    #[test]
    fn results_apply_only_while_loading() {
        ReducerTest::new(SimpleBooksReducer)
            .given_state(BooksState::Loading)
            .when_event(BooksEvent::Loaded(shelf()))
            .then_proposal(|state| assert_eq!(state, &BooksState::Loaded(shelf())))
            .then_commands(assertions::assert_no_commands)
            .run();

        ReducerTest::new(SimpleBooksReducer)
            .given_state(BooksState::Loading)
            .when_event(BooksEvent::Failed("offline".to_string()))
            .then_proposal(|state| assert_eq!(state, &BooksState::Failure("offline".to_string())))
            .run();

        ReducerTest::new(SimpleBooksReducer)
            .given_state(BooksState::Empty)
            .when_event(BooksEvent::Loaded(shelf()))
            .then_proposal(|state| assert_eq!(state, &BooksState::Empty))
            .run();
    }

    #[test]
    fn proposal_reducer_requests_the_same_work() {
        ReducerTest::new(ProposalBooksReducer)
            .given_state(BooksState::Empty)
            .when_event(BooksEvent::Load)
            .then_proposal(|proposal| assert_eq!(proposal, &BooksProposal::Loading))
            .then_commands(|commands| {
                assertions::assert_runs_keyed(commands, LOAD_SLOT, &BooksAction::FetchBooks);
            })
            .run();

        ReducerTest::new(ProposalBooksReducer)
            .given_state(BooksState::Loading)
            .when_event(BooksEvent::Clear)
            .then_proposal(|proposal| assert_eq!(proposal, &BooksProposal::Clear))
            .then_commands(|commands| assertions::assert_cancels(commands, LOAD_SLOT))
            .run();
    }

    #[test]
    fn acceptor_drops_results_outside_loading() {
        let failure = BooksState::Failure("offline".to_string());
        assert_eq!(
            accept_proposal(BooksProposal::Books(shelf()), &BooksState::Empty),
            BooksState::Empty
        );
        assert_eq!(
            accept_proposal(BooksProposal::Books(shelf()), &failure),
            failure
        );
        assert_eq!(
            accept_proposal(BooksProposal::Books(shelf()), &BooksState::Loading),
            BooksState::Loaded(shelf())
        );
        assert_eq!(
            accept_proposal(BooksProposal::Clear, &BooksState::Loaded(shelf())),
            BooksState::Empty
        );
    }

    #[test]
    fn both_reducers_agree_on_every_transition() {
        let states = [
            BooksState::Empty,
            BooksState::Loading,
            BooksState::Loaded(shelf()),
            BooksState::Failure("offline".to_string()),
        ];
        let events = [
            BooksEvent::Load,
            BooksEvent::Clear,
            BooksEvent::Loaded(shelf()),
            BooksEvent::Failed("offline".to_string()),
        ];

        for state in &states {
            for event in &events {
                let simple = SimpleBooksReducer.reduce(state, event.clone());
                let proposal = ProposalBooksReducer.reduce(state, event.clone());
                assert_eq!(
                    simple.proposal,
                    accept_proposal(proposal.proposal, state),
                    "{event:?} in {state:?}"
                );
                assert_eq!(simple.commands, proposal.commands, "{event:?} in {state:?}");
            }
        }
    }
}
