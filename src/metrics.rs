//! Aggregate counters for a single analysis run.
//!
//! With the `tracing` feature enabled the engine records how much work the
//! fixpoint did; without it every recording call compiles to a no-op.

#[cfg(feature = "tracing")]
use std::sync::atomic::{AtomicU64, Ordering};

/// Counters collected while `analyze` runs.
#[cfg(feature = "tracing")]
#[derive(Default)]
pub struct AnalysisMetrics {
    /// Outer fixpoint iterations completed.
    pub iterations: AtomicU64,
    /// Transitions fired (once per supporting assignment).
    pub transitions_fired: AtomicU64,
    /// Facts appended to the established set.
    pub facts_established: AtomicU64,
    /// Support tuples recorded against DTG nodes.
    pub support_tuples: AtomicU64,
    /// Support tuples recorded through the external-dependency pass.
    pub external_support_tuples: AtomicU64,
}

#[cfg(feature = "tracing")]
impl AnalysisMetrics {
    pub fn new() -> Self {
        Self::default()
    }

    #[inline]
    pub fn record_iteration(&self) {
        self.iterations.fetch_add(1, Ordering::Relaxed);
    }

    #[inline]
    pub fn record_transition_fired(&self) {
        self.transitions_fired.fetch_add(1, Ordering::Relaxed);
    }

    #[inline]
    pub fn record_fact_established(&self) {
        self.facts_established.fetch_add(1, Ordering::Relaxed);
    }

    #[inline]
    pub fn record_support_tuple(&self) {
        self.support_tuples.fetch_add(1, Ordering::Relaxed);
    }

    #[inline]
    pub fn record_external_support_tuple(&self) {
        self.external_support_tuples.fetch_add(1, Ordering::Relaxed);
    }

    /// Snapshot of all counters.
    pub fn report(&self) -> MetricsReport {
        MetricsReport {
            iterations: self.iterations.load(Ordering::Relaxed),
            transitions_fired: self.transitions_fired.load(Ordering::Relaxed),
            facts_established: self.facts_established.load(Ordering::Relaxed),
            support_tuples: self.support_tuples.load(Ordering::Relaxed),
            external_support_tuples: self.external_support_tuples.load(Ordering::Relaxed),
        }
    }
}

/// No-op metrics when the `tracing` feature is disabled.
#[cfg(not(feature = "tracing"))]
#[derive(Default)]
pub struct AnalysisMetrics;

#[cfg(not(feature = "tracing"))]
impl AnalysisMetrics {
    pub fn new() -> Self {
        Self
    }

    #[inline]
    pub fn record_iteration(&self) {}

    #[inline]
    pub fn record_transition_fired(&self) {}

    #[inline]
    pub fn record_fact_established(&self) {}

    #[inline]
    pub fn record_support_tuple(&self) {}

    #[inline]
    pub fn record_external_support_tuple(&self) {}

    /// Snapshot of all counters; always zero without the feature.
    pub fn report(&self) -> MetricsReport {
        MetricsReport::default()
    }
}

/// Point-in-time view of the analysis counters.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct MetricsReport {
    pub iterations: u64,
    pub transitions_fired: u64,
    pub facts_established: u64,
    pub support_tuples: u64,
    pub external_support_tuples: u64,
}
