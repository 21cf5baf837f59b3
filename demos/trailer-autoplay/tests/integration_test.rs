//! Integration tests for the trailer autoplay model
//!
//! Every scenario runs under a paused tokio clock with a 2000ms preview and a
//! 5000ms banner period, so timer assertions are exact and instant.

#![allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)] // Test code can use unwrap/expect/panic

use knot_runtime::KnotError;
use knot_testing::mocks::CallLog;
use knot_testing::{SideEffectProbe, StateProbe};
use std::collections::HashMap;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::time::Duration;
use tokio::runtime::Handle;
use tokio::time::Instant;
use trailer_autoplay::{
    SubjectId, TrailerAutoplayModel, TrailerConfig, TrailerError, TrailerRepository,
    TrailerSideEffect, TrailerState,
};

// ============================================================================
// Test Fixtures
// ============================================================================

const PREVIEW: Duration = Duration::from_millis(2000);
const BANNER: Duration = Duration::from_millis(5000);
const QUIET: Duration = Duration::from_secs(20);

/// Repository answering from a script, with an optional latency
#[derive(Clone, Default)]
struct ScriptedRepository {
    urls: HashMap<SubjectId, Result<String, TrailerError>>,
    latency: Duration,
    requests: CallLog<SubjectId>,
    released: CallLog<SubjectId>,
}

impl ScriptedRepository {
    fn resolving(subjects: &[&str]) -> Self {
        let mut repository = Self::default();
        for subject in subjects {
            repository
                .urls
                .insert(SubjectId::from(*subject), Ok("url".to_string()));
        }
        repository
    }

    fn failing(mut self, subject: &str) -> Self {
        self.urls.insert(
            SubjectId::from(subject),
            Err(TrailerError::Unavailable("501".to_string())),
        );
        self
    }

    const fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = latency;
        self
    }
}

impl TrailerRepository for ScriptedRepository {
    fn trailer_url(
        &self,
        subject: SubjectId,
    ) -> Pin<Box<dyn Future<Output = Result<String, TrailerError>> + Send + '_>> {
        self.requests.record(subject.clone());
        Box::pin(async move {
            if !self.latency.is_zero() {
                tokio::time::sleep(self.latency).await;
            }
            self.urls
                .get(&subject)
                .cloned()
                .unwrap_or(Err(TrailerError::NotFound(subject)))
        })
    }

    fn stop_request(&self, subject: &SubjectId) {
        self.released.record(subject.clone());
    }
}

struct Harness {
    model: TrailerAutoplayModel,
    states: StateProbe<TrailerState>,
    side_effects: SideEffectProbe<TrailerSideEffect>,
    requests: CallLog<SubjectId>,
    released: CallLog<SubjectId>,
}

impl Harness {
    async fn start(repository: ScriptedRepository) -> Self {
        knot_testing::init_tracing();
        let requests = repository.requests.clone();
        let released = repository.released.clone();
        let model = TrailerAutoplayModel::new(Arc::new(repository), TrailerConfig::default());
        model.start(&Handle::current()).unwrap();

        let mut states = StateProbe::new(model.state());
        let side_effects = SideEffectProbe::new(model.side_effects());
        states.expect(TrailerState::Idle).await;

        Self {
            model,
            states,
            side_effects,
            requests,
            released,
        }
    }
}

fn preview(subject: &str, url: &str) -> TrailerState {
    TrailerState::Preview(SubjectId::from(subject), url.to_string())
}

fn playable(subject: &str) -> TrailerState {
    TrailerState::Playable(SubjectId::from(subject), String::new())
}

fn playing(subject: &str) -> TrailerState {
    TrailerState::Playing(SubjectId::from(subject), "url".to_string())
}

fn assert_elapsed(since: Instant, expected: Duration) {
    let elapsed = since.elapsed();
    assert!(
        elapsed >= expected && elapsed < expected + Duration::from_millis(5),
        "expected {expected:?} to elapse, got {elapsed:?}"
    );
}

// ============================================================================
// Scenarios
// ============================================================================

#[tokio::test(start_paused = true)]
async fn initial_state_is_idle() {
    let mut harness = Harness::start(ScriptedRepository::default()).await;
    assert_eq!(harness.model.current(), TrailerState::Idle);
    harness.states.assert_quiet(QUIET).await;
    harness.model.stop().await;
}

#[tokio::test(start_paused = true)]
async fn happy_trailer_case() {
    let mut harness = Harness::start(ScriptedRepository::resolving(&["1"])).await;
    let started = Instant::now();

    harness.model.start_banner("1").await.unwrap();
    harness.states.expect(preview("1", "")).await;
    harness.states.expect(preview("1", "url")).await;
    harness.states.expect(playing("1")).await;
    assert_elapsed(started, PREVIEW);

    harness.model.stop_banner("1").await.unwrap();
    harness.states.expect(TrailerState::Idle).await;
    harness.side_effects.expect(TrailerSideEffect::NextBanner).await;
    harness.side_effects.assert_quiet(QUIET).await;

    assert_eq!(harness.requests.calls(), vec![SubjectId::from("1")]);
    assert!(harness.released.is_empty());
    harness.model.stop().await;
}

#[tokio::test(start_paused = true)]
async fn url_failure_times_out_without_playing() {
    let mut harness = Harness::start(ScriptedRepository::default().failing("1")).await;
    let started = Instant::now();

    harness.model.start_banner("1").await.unwrap();
    harness.states.expect(preview("1", "")).await;
    harness.states.expect(playable("1")).await;
    assert_elapsed(started, PREVIEW);

    harness.states.expect(TrailerState::Idle).await;
    assert_elapsed(started, BANNER);
    harness.side_effects.expect(TrailerSideEffect::NextBanner).await;
    harness.side_effects.assert_quiet(QUIET).await;

    assert!(
        !harness
            .states
            .history()
            .iter()
            .any(|state| matches!(state, TrailerState::Playing(..)))
    );
    harness.model.stop().await;
}

#[tokio::test(start_paused = true)]
async fn repeating_start_banner_while_already_started() {
    let mut harness = Harness::start(ScriptedRepository::resolving(&["1"])).await;
    let started = Instant::now();

    harness.model.start_banner("1").await.unwrap();
    harness.states.expect(preview("1", "")).await;
    harness.model.start_banner("1").await.unwrap();
    harness.states.expect(preview("1", "url")).await;

    tokio::time::sleep(Duration::from_millis(1500)).await;
    harness.model.start_banner("1").await.unwrap();

    // The preview timer was not restarted by the repeats
    harness.states.expect(playing("1")).await;
    assert_elapsed(started, PREVIEW);

    harness.model.start_banner("1").await.unwrap();
    harness.model.stop_banner("1").await.unwrap();
    harness.states.expect(TrailerState::Idle).await;
    harness.side_effects.expect(TrailerSideEffect::NextBanner).await;
    harness.side_effects.assert_quiet(QUIET).await;

    assert_eq!(harness.requests.len(), 1);
    harness.model.stop().await;
}

#[tokio::test(start_paused = true)]
async fn start_next_banner_while_another_is_in_preview() {
    let mut harness = Harness::start(ScriptedRepository::resolving(&["1", "2"])).await;

    harness.model.start_banner("1").await.unwrap();
    harness.states.expect(preview("1", "")).await;
    harness.states.expect(preview("1", "url")).await;

    tokio::time::sleep(Duration::from_millis(1000)).await;
    let switched = Instant::now();
    harness.model.start_banner("2").await.unwrap();
    harness.states.expect(preview("2", "")).await;
    harness
        .side_effects
        .expect(TrailerSideEffect::StopTrailer(SubjectId::from("1")))
        .await;
    harness.states.expect(preview("2", "url")).await;
    harness.states.expect(playing("2")).await;
    assert_elapsed(switched, PREVIEW);

    harness.model.stop_banner("2").await.unwrap();
    harness.states.expect(TrailerState::Idle).await;
    harness.side_effects.expect(TrailerSideEffect::NextBanner).await;
    harness.side_effects.assert_quiet(QUIET).await;

    assert_eq!(harness.released.count(|subject| subject.as_str() == "1"), 1);
    harness.model.stop().await;
}

#[tokio::test(start_paused = true)]
async fn start_next_banner_while_another_is_playable() {
    let repository = ScriptedRepository::resolving(&["2"]).failing("1");
    let mut harness = Harness::start(repository).await;
    let started = Instant::now();

    harness.model.start_banner("1").await.unwrap();
    harness.states.expect(preview("1", "")).await;
    harness.states.expect(playable("1")).await;

    harness.model.start_banner("2").await.unwrap();
    harness.states.expect(preview("2", "")).await;
    harness.states.expect(preview("2", "url")).await;
    harness.states.expect(playing("2")).await;
    assert_elapsed(started, PREVIEW * 2);

    // Banner 1's timer would have fired at 5000ms
    harness.states.assert_quiet(QUIET).await;
    harness
        .side_effects
        .expect(TrailerSideEffect::StopTrailer(SubjectId::from("1")))
        .await;
    harness.side_effects.assert_quiet(QUIET).await;

    harness.model.stop_banner("2").await.unwrap();
    harness.states.expect(TrailerState::Idle).await;
    harness.side_effects.expect(TrailerSideEffect::NextBanner).await;

    assert_eq!(harness.released.calls(), vec![SubjectId::from("1")]);
    harness.model.stop().await;
}

#[tokio::test(start_paused = true)]
async fn start_next_banner_while_another_is_playing() {
    let mut harness = Harness::start(ScriptedRepository::resolving(&["1", "2"])).await;

    harness.model.start_banner("1").await.unwrap();
    harness.states.expect(preview("1", "")).await;
    harness.states.expect(preview("1", "url")).await;
    harness.states.expect(playing("1")).await;

    harness.model.start_banner("2").await.unwrap();
    harness.states.expect(preview("2", "")).await;
    harness
        .side_effects
        .expect(TrailerSideEffect::StopTrailer(SubjectId::from("1")))
        .await;
    harness.states.expect(preview("2", "url")).await;
    harness.states.expect(playing("2")).await;

    harness.model.stop_banner("2").await.unwrap();
    harness.states.expect(TrailerState::Idle).await;
    harness.side_effects.expect(TrailerSideEffect::NextBanner).await;
    harness.side_effects.assert_quiet(QUIET).await;

    // A playing trailer has no pending request to release
    assert!(harness.released.is_empty());
    harness.model.stop().await;
}

#[tokio::test(start_paused = true)]
async fn two_happy_trailer_cases() {
    let mut harness = Harness::start(ScriptedRepository::resolving(&["1", "2"])).await;

    for subject in ["1", "2"] {
        harness.model.start_banner(subject).await.unwrap();
        harness.states.expect(preview(subject, "")).await;
        harness.states.expect(preview(subject, "url")).await;
        harness.states.expect(playing(subject)).await;

        harness.model.stop_banner(subject).await.unwrap();
        harness.states.expect(TrailerState::Idle).await;
        harness.side_effects.expect(TrailerSideEffect::NextBanner).await;
    }

    harness.side_effects.assert_quiet(QUIET).await;
    harness.model.stop().await;
}

#[tokio::test(start_paused = true)]
async fn slow_url_is_abandoned_once_preview_ends() {
    let repository = ScriptedRepository::resolving(&["1"]).with_latency(Duration::from_millis(3000));
    let mut harness = Harness::start(repository).await;
    let started = Instant::now();

    harness.model.start_banner("1").await.unwrap();
    harness.states.expect(preview("1", "")).await;
    harness.states.expect(playable("1")).await;
    assert_elapsed(started, PREVIEW);

    // The URL would arrive at 3000ms; the banner ends at 5000ms regardless
    harness.states.expect(TrailerState::Idle).await;
    assert_elapsed(started, BANNER);
    harness.side_effects.expect(TrailerSideEffect::NextBanner).await;
    harness.model.stop().await;
}

#[tokio::test(start_paused = true)]
async fn stop_for_another_subject_is_ignored() {
    let mut harness = Harness::start(ScriptedRepository::resolving(&["1"])).await;

    harness.model.start_banner("1").await.unwrap();
    harness.states.expect(preview("1", "")).await;
    harness.states.expect(preview("1", "url")).await;

    harness.model.stop_banner("2").await.unwrap();
    harness.states.expect(playing("1")).await;
    harness.side_effects.assert_quiet(QUIET).await;
    harness.model.stop().await;
}

#[tokio::test(start_paused = true)]
async fn stopping_the_model_cancels_timers_and_ends_streams() {
    let mut harness = Harness::start(ScriptedRepository::default().failing("1")).await;

    harness.model.start_banner("1").await.unwrap();
    harness.states.expect(preview("1", "")).await;
    harness.model.stop().await;

    harness.states.expect_end().await;
    assert_eq!(harness.side_effects.next().await, None);
    assert_eq!(harness.model.current(), preview("1", ""));
    assert_eq!(
        harness.model.start_banner("2").await,
        Err(KnotError::Stopped)
    );
    assert_eq!(
        harness.model.start(&Handle::current()),
        Err(KnotError::Stopped)
    );
}
