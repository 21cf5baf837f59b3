//! Metrics recorded by the Knot pipeline.
//!
//! Recording goes through the [`metrics`] facade, so nothing is exported
//! unless the host installs a recorder (for example a Prometheus exporter).
//! Call [`describe_metrics`] once after installing it to register units and
//! descriptions.

use metrics::{describe_counter, describe_histogram, Unit};

// Re-export metrics macros for use in other modules
pub use metrics::{counter, histogram};

/// Events reduced by a pipeline
pub const EVENTS_TOTAL: &str = "knot.events.total";

/// Events discarded because the effect that produced them was superseded
pub const EVENTS_STALE: &str = "knot.events.stale";

/// Time spent inside `Reducer::reduce`
pub const REDUCER_DURATION: &str = "knot.reducer.duration_seconds";

/// Effect tasks spawned by the scheduler
pub const EFFECTS_LAUNCHED: &str = "knot.effects.launched";

/// Effect tasks aborted by supersession, `Cancel` or shutdown
pub const EFFECTS_CANCELLED: &str = "knot.effects.cancelled";

/// Effect tasks that panicked
pub const EFFECTS_PANICKED: &str = "knot.effects.panicked";

/// Events dropped by `offer` because the intake was full or closed
pub const INTAKE_DROPPED: &str = "knot.intake.dropped";

/// Register descriptions for every Knot metric.
pub fn describe_metrics() {
    describe_counter!(EVENTS_TOTAL, Unit::Count, "Total number of events reduced");
    describe_counter!(
        EVENTS_STALE,
        Unit::Count,
        "Events discarded because their effect task was superseded or cancelled"
    );
    describe_histogram!(
        REDUCER_DURATION,
        Unit::Seconds,
        "Time spent in a single reduction"
    );
    describe_counter!(EFFECTS_LAUNCHED, Unit::Count, "Effect tasks spawned");
    describe_counter!(
        EFFECTS_CANCELLED,
        Unit::Count,
        "Effect tasks aborted before completion"
    );
    describe_counter!(EFFECTS_PANICKED, Unit::Count, "Effect tasks that panicked");
    describe_counter!(
        INTAKE_DROPPED,
        Unit::Count,
        "Events dropped by best-effort submission"
    );
}
