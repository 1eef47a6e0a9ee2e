//! Feature-gated tracing macros.
//!
//! With the `tracing` feature enabled this module re-exports the tracing
//! crate's macros; without it every macro compiles to a no-op.

#[cfg(feature = "tracing")]
pub use tracing::{debug, debug_span, info, trace, trace_span};

#[cfg(not(feature = "tracing"))]
mod noop {
    /// No-op span handle.
    pub struct Span;

    impl Span {
        pub fn none() -> Self {
            Span
        }

        pub fn entered(self) -> SpanGuard {
            SpanGuard
        }
    }

    /// No-op guard that implements Drop.
    pub struct SpanGuard;

    impl Drop for SpanGuard {
        fn drop(&mut self) {}
    }

    #[macro_export]
    macro_rules! trace {
        ($($tt:tt)*) => {};
    }

    #[macro_export]
    macro_rules! debug {
        ($($tt:tt)*) => {};
    }

    #[macro_export]
    macro_rules! info {
        ($($tt:tt)*) => {};
    }

    #[macro_export]
    macro_rules! trace_span {
        ($($tt:tt)*) => {
            $crate::trace::Span::none()
        };
    }

    #[macro_export]
    macro_rules! debug_span {
        ($($tt:tt)*) => {
            $crate::trace::Span::none()
        };
    }

    pub use crate::{debug, debug_span, info, trace, trace_span};
}

#[cfg(not(feature = "tracing"))]
pub use noop::*;

/// Install a subscriber writing to stderr, filtered by `RUST_LOG`.
/// Intended for tests and development; repeated calls are harmless.
#[cfg(feature = "tracing")]
pub fn init_subscriber() {
    use tracing_subscriber::{fmt, prelude::*, EnvFilter};

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::registry()
        .with(
            fmt::layer()
                .with_writer(std::io::stderr)
                .with_target(true)
                .with_ansi(false),
        )
        .with(filter)
        .try_init()
        .ok();
}

#[cfg(not(feature = "tracing"))]
pub fn init_subscriber() {}
