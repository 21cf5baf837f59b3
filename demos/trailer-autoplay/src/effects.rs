//! Effects for the trailer autoplay banner and the repository they call.

use crate::types::{SubjectId, TrailerAction, TrailerConfig, TrailerError, TrailerEvent};
use knot_core::effect::{Effect, EffectHandler};
use knot_core::{async_effect, delay};
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

/// Source of trailer playback URLs
///
/// # Dyn Compatibility
///
/// Uses explicit `Pin<Box<dyn Future>>` returns so the repository can be
/// shared as `Arc<dyn TrailerRepository>`.
pub trait TrailerRepository: Send + Sync {
    /// Resolve the playback URL of a subject's trailer
    ///
    /// # Errors
    ///
    /// Returns [`TrailerError`] when the subject has no trailer or the
    /// service fails.
    fn trailer_url(
        &self,
        subject: SubjectId,
    ) -> Pin<Box<dyn Future<Output = Result<String, TrailerError>> + Send + '_>>;

    /// Abandon any pending request for a subject
    fn stop_request(&self, subject: &SubjectId);
}

/// Turns autoplay actions into URL requests and timers
#[derive(Clone)]
pub struct TrailerEffects {
    repository: Arc<dyn TrailerRepository>,
    config: TrailerConfig,
}

impl TrailerEffects {
    /// Creates a new `TrailerEffects`
    #[must_use]
    pub fn new(repository: Arc<dyn TrailerRepository>, config: TrailerConfig) -> Self {
        Self { repository, config }
    }

    fn resolve_url(&self, subject: SubjectId) -> Effect<TrailerEvent> {
        let repository = Arc::clone(&self.repository);
        let failed = subject.clone();

        Effect::try_future(
            async move {
                let url = repository.trailer_url(subject.clone()).await;
                url.map(|url| (subject, url))
            },
            |(subject, url)| Some(TrailerEvent::UrlResolved { subject, url }),
            move |error: TrailerError| {
                tracing::warn!(subject = %failed, error = %error, "Trailer URL unavailable");
                Some(TrailerEvent::UrlFailed {
                    subject: failed,
                    reason: error.to_string(),
                })
            },
        )
    }
}

impl EffectHandler for TrailerEffects {
    type Action = TrailerAction;
    type Event = TrailerEvent;

    fn handle(&self, action: TrailerAction) -> Effect<TrailerEvent> {
        match action {
            TrailerAction::Autoplay(subject) => {
                tracing::debug!(subject = %subject, "Autoplay requested");
                Effect::merge(vec![
                    self.resolve_url(subject.clone()),
                    Effect::delay(
                        self.config.preview_period(),
                        TrailerEvent::PreviewElapsed(subject),
                    ),
                ])
            },
            TrailerAction::BannerTimer(subject) => delay! {
                duration: self.config.banner_remainder(),
                event: TrailerEvent::BannerElapsed(subject)
            },
            TrailerAction::ReleaseRequest(subject) => {
                let repository = Arc::clone(&self.repository);
                async_effect! {
                    tracing::debug!(subject = %subject, "Releasing trailer request");
                    repository.stop_request(&subject);
                    None
                }
            },
        }
    }
}
