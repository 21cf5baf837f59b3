//! Declarative macros for ergonomic effect construction

/// Create an `Effect::Future` from an async block
///
/// # Example
///
/// ```rust
/// use knot_core::async_effect;
/// use knot_core::effect::Effect;
///
/// #[derive(Debug)]
/// enum Event { Resolved(String) }
///
/// let effect: Effect<Event> = async_effect! {
///     Some(Event::Resolved("https://cdn.example/trailer.m3u8".to_string()))
/// };
/// assert!(matches!(effect, Effect::Future(_)));
/// ```
#[macro_export]
macro_rules! async_effect {
    ($($body:tt)*) => {
        $crate::effect::Effect::Future(
            ::std::boxed::Box::pin(async move { $($body)* })
        )
    };
}

/// Create an `Effect::Delay` for timers
///
/// # Example
///
/// ```rust
/// use knot_core::delay;
/// use knot_core::effect::Effect;
/// use std::time::Duration;
///
/// #[derive(Debug)]
/// enum Event { PreviewElapsed }
///
/// let effect: Effect<Event> = delay! {
///     duration: Duration::from_secs(2),
///     event: Event::PreviewElapsed
/// };
/// assert!(matches!(effect, Effect::Delay { .. }));
/// ```
#[macro_export]
macro_rules! delay {
    (
        duration: $duration:expr,
        event: $event:expr
    ) => {
        $crate::effect::Effect::Delay {
            duration: $duration,
            event: ::std::boxed::Box::new($event),
        }
    };
}
