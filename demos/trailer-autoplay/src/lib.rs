//! # Trailer Autoplay
//!
//! A banner carousel that plays each subject's trailer after a short preview,
//! built on Knot.
//!
//! This example showcases:
//! - Timers as effects whose firing is an ordinary event
//! - Per-key supersession: every task of the visible subject shares one
//!   cancellation key, so switching subjects cancels the old timers
//! - Collaborator failures mapped into events
//! - Side effects for the hosting UI
//!
//! ## Timeline
//!
//! ```text
//! start(s) ──► Preview(s, "") ──url──► Preview(s, url) ──preview──► Playing(s, url)
//!                   │
//!                   └──preview, no url──► Playable(s, "") ──banner──► Idle + NextBanner
//! ```
//!
//! ## Example
//!
//! ```no_run
//! use std::sync::Arc;
//! use trailer_autoplay::{TrailerAutoplayModel, TrailerConfig, TrailerRepository};
//!
//! # async fn example(repository: Arc<dyn TrailerRepository>) -> Result<(), knot_runtime::KnotError> {
//! let model = TrailerAutoplayModel::new(repository, TrailerConfig::default());
//! model.start(&tokio::runtime::Handle::current())?;
//!
//! model.start_banner("1").await?;
//! // ... preview, then the trailer plays ...
//! model.stop_banner("1").await?;
//!
//! model.stop().await;
//! # Ok(())
//! # }
//! ```

pub mod effects;
pub mod model;
pub mod reducer;
pub mod types;

// Re-export commonly used types
pub use effects::{TrailerEffects, TrailerRepository};
pub use model::TrailerAutoplayModel;
pub use reducer::{AUTOPLAY_SLOT, TrailerReducer};
pub use types::{
    SubjectId, TrailerAction, TrailerConfig, TrailerError, TrailerEvent, TrailerSideEffect,
    TrailerState,
};
