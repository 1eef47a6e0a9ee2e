//! Relaxed-reachability analysis over SAS+ domain transition graphs.
//!
//! Given a planning domain compiled into a DTG and an initial state, the
//! engine computes the set of lifted facts that can ever be made true,
//! per-node support witnesses, and an equivalence relation over domain
//! objects under which interchangeable objects are collapsed.

pub mod atom;
pub mod bindings;
pub mod catalog;
pub mod dtg;
pub mod engine;
pub mod eog;
pub mod error;
pub mod fact;
pub mod metrics;
pub mod pool;
pub mod support;
pub mod trace;

#[cfg(test)]
pub(crate) mod test_utils;
