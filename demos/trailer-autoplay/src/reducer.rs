//! Reducer for the trailer autoplay banner.
//!
//! One subject owns the banner slot at a time. All of its timers and the URL
//! request run under [`AUTOPLAY_SLOT`], so starting another subject, stopping
//! the banner or moving to the banner timer supersedes whatever the previous
//! step left running.

use crate::types::{SubjectId, TrailerAction, TrailerEvent, TrailerSideEffect, TrailerState};
use knot_core::reducer::{EffectId, Reducer, Reduction};

/// Cancellation key shared by every task of the active subject
pub const AUTOPLAY_SLOT: EffectId = EffectId::from_static("trailer.autoplay");

type TrailerReduction = Reduction<TrailerState, TrailerAction, TrailerSideEffect>;

/// Reducer for the autoplay state machine
#[derive(Clone, Copy, Debug, Default)]
pub struct TrailerReducer;

impl TrailerReducer {
    /// Creates a new `TrailerReducer`
    #[must_use]
    pub const fn new() -> Self {
        Self
    }

    fn start(state: &TrailerState, subject: SubjectId) -> TrailerReduction {
        let preview = TrailerState::Preview(subject.clone(), String::new());

        match state {
            TrailerState::Idle => {
                Reduction::new(preview).run_keyed(AUTOPLAY_SLOT, TrailerAction::Autoplay(subject))
            },
            active if active.subject() == Some(&subject) => Reduction::new(state.clone()),
            TrailerState::Playing(previous, _) => Reduction::new(preview)
                .emit(TrailerSideEffect::StopTrailer(previous.clone()))
                .run_keyed(AUTOPLAY_SLOT, TrailerAction::Autoplay(subject)),
            TrailerState::Preview(previous, _) | TrailerState::Playable(previous, _) => {
                Reduction::new(preview)
                    .emit(TrailerSideEffect::StopTrailer(previous.clone()))
                    .run(TrailerAction::ReleaseRequest(previous.clone()))
                    .run_keyed(AUTOPLAY_SLOT, TrailerAction::Autoplay(subject))
            },
        }
    }

    fn stop(state: &TrailerState, subject: &SubjectId) -> TrailerReduction {
        if state.subject() == Some(subject) {
            Reduction::new(TrailerState::Idle)
                .cancel(AUTOPLAY_SLOT)
                .emit(TrailerSideEffect::NextBanner)
        } else {
            Reduction::new(state.clone())
        }
    }
}

impl Reducer for TrailerReducer {
    type State = TrailerState;
    type Event = TrailerEvent;
    type Proposal = TrailerState;
    type Action = TrailerAction;
    type SideEffect = TrailerSideEffect;

    fn reduce(&self, state: &TrailerState, event: TrailerEvent) -> TrailerReduction {
        match (state, event) {
            (_, TrailerEvent::Start(subject)) => Self::start(state, subject),

            (_, TrailerEvent::Stop(subject)) => Self::stop(state, &subject),

            (TrailerState::Preview(current, url), TrailerEvent::UrlResolved { subject, url: resolved })
                if *current == subject && url.is_empty() =>
            {
                Reduction::new(TrailerState::Preview(subject, resolved))
            },

            // The preview timer keeps running and decides what comes next
            (_, TrailerEvent::UrlFailed { .. }) => Reduction::new(state.clone()),

            (TrailerState::Preview(current, url), TrailerEvent::PreviewElapsed(subject))
                if *current == subject =>
            {
                if url.is_empty() {
                    Reduction::new(TrailerState::Playable(subject.clone(), String::new()))
                        .run_keyed(AUTOPLAY_SLOT, TrailerAction::BannerTimer(subject))
                } else {
                    Reduction::new(TrailerState::Playing(subject, url.clone()))
                }
            },

            (TrailerState::Playable(current, _), TrailerEvent::BannerElapsed(subject))
                if *current == subject =>
            {
                Reduction::new(TrailerState::Idle).emit(TrailerSideEffect::NextBanner)
            },

            // Late or foreign completions
            (
                _,
                TrailerEvent::UrlResolved { .. }
                | TrailerEvent::PreviewElapsed(_)
                | TrailerEvent::BannerElapsed(_),
            ) => Reduction::new(state.clone()),
        }
    }
}
