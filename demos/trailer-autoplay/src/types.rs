//! Domain types for the trailer autoplay banner.

use knot_runtime::KnotConfig;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;
use thiserror::Error;

/// Identifier of the banner subject whose trailer is played
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SubjectId(String);

impl SubjectId {
    /// Creates a new `SubjectId`
    #[must_use]
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// The raw identifier
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for SubjectId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for SubjectId {
    fn from(id: &str) -> Self {
        Self::new(id)
    }
}

impl From<String> for SubjectId {
    fn from(id: String) -> Self {
        Self(id)
    }
}

/// Autoplay state of the banner slot
///
/// The URL is empty until the repository resolved it.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum TrailerState {
    /// Nothing is shown
    #[default]
    Idle,
    /// The subject's preview image is shown while its trailer URL resolves
    Preview(SubjectId, String),
    /// The preview period ended without a URL; the banner waits out its period
    Playable(SubjectId, String),
    /// The trailer is playing
    Playing(SubjectId, String),
}

impl TrailerState {
    /// The subject owning the slot, `None` when idle
    #[must_use]
    pub const fn subject(&self) -> Option<&SubjectId> {
        match self {
            Self::Idle => None,
            Self::Preview(subject, _) | Self::Playable(subject, _) | Self::Playing(subject, _) => {
                Some(subject)
            },
        }
    }

    /// Returns `true` when no subject owns the slot
    #[must_use]
    pub const fn is_idle(&self) -> bool {
        matches!(self, Self::Idle)
    }
}

/// Events reduced by the autoplay knot
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TrailerEvent {
    /// The banner for a subject became visible
    Start(SubjectId),
    /// The banner for a subject went away
    Stop(SubjectId),
    /// The repository resolved a trailer URL
    UrlResolved {
        /// Subject the URL belongs to
        subject: SubjectId,
        /// Playback URL
        url: String,
    },
    /// The repository could not resolve a trailer URL
    UrlFailed {
        /// Subject the request was for
        subject: SubjectId,
        /// Why it failed
        reason: String,
    },
    /// The preview period ended
    PreviewElapsed(SubjectId),
    /// The rest of the banner period ended without playback
    BannerElapsed(SubjectId),
}

/// Effect requests produced by the reducer
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TrailerAction {
    /// Resolve the trailer URL while the preview timer runs
    Autoplay(SubjectId),
    /// Wait out the rest of the banner period
    BannerTimer(SubjectId),
    /// Tell the repository to abandon any pending request for the subject
    ReleaseRequest(SubjectId),
}

/// Notifications for the hosting UI
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TrailerSideEffect {
    /// Advance the carousel to the next banner
    NextBanner,
    /// Stop the trailer of a superseded subject
    StopTrailer(SubjectId),
}

/// Errors reported by a [`TrailerRepository`](crate::TrailerRepository)
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TrailerError {
    /// The subject has no trailer
    #[error("No trailer for subject {0}")]
    NotFound(SubjectId),

    /// The trailer service failed
    #[error("Trailer service unavailable: {0}")]
    Unavailable(String),
}

/// Timing and capacity configuration
///
/// # Example
///
/// ```
/// use trailer_autoplay::TrailerConfig;
/// use std::time::Duration;
///
/// let config = TrailerConfig::default();
/// assert_eq!(config.preview_period(), Duration::from_secs(2));
/// assert_eq!(config.banner_remainder(), Duration::from_secs(3));
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct TrailerConfig {
    /// How long the preview shows before the trailer may play
    pub preview_period_ms: u64,
    /// How long a banner stays when its trailer cannot play
    pub banner_period_ms: u64,
    /// Channel capacities of the underlying knot
    pub knot: KnotConfig,
}

impl TrailerConfig {
    /// Create a configuration with custom periods
    #[must_use]
    pub fn new(preview_period_ms: u64, banner_period_ms: u64) -> Self {
        Self {
            preview_period_ms,
            banner_period_ms,
            knot: KnotConfig::default(),
        }
    }

    /// The preview period
    #[must_use]
    pub const fn preview_period(&self) -> Duration {
        Duration::from_millis(self.preview_period_ms)
    }

    /// Time between the end of the preview and the end of the banner
    #[must_use]
    pub const fn banner_remainder(&self) -> Duration {
        Duration::from_millis(self.banner_period_ms.saturating_sub(self.preview_period_ms))
    }
}

impl Default for TrailerConfig {
    fn default() -> Self {
        Self::new(2000, 5000)
    }
}
