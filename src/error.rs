//! Error types for model construction and analysis.

use thiserror::Error;

/// A malformed input detected while the caller assembles the model.
///
/// All of these surface before `analyze` runs; once analysis starts the
/// model is assumed well formed.
#[derive(Debug, Error)]
pub enum ModelError {
    #[error("unknown type: {name}")]
    UnknownType { name: String },

    #[error("unknown object: {name}")]
    UnknownObject { name: String },

    #[error("unknown predicate: {name}")]
    UnknownPredicate { name: String },

    #[error("duplicate name: {name}")]
    DuplicateName { name: String },

    #[error("arity mismatch for {predicate}: expected {expected}, found {found}")]
    ArityMismatch {
        predicate: String,
        expected: usize,
        found: usize,
    },

    #[error("variable {variable} has no domain under step {step}")]
    UnboundVariable { variable: u32, step: u32 },
}

/// An invariant violation during analysis. Always a programmer error;
/// the engine aborts and surfaces the violating identifiers.
#[derive(Debug, Error)]
pub enum AnalysisError {
    #[error("reachable fact arity mismatch: predicate {predicate} expects {expected} terms, fact carries {found}")]
    FactArityMismatch {
        predicate: u32,
        expected: usize,
        found: usize,
    },

    #[error("attempted to merge grounded equivalent object group {group}")]
    GroundedMerge { group: u32 },

    #[error("initial fact is not ground: variable domain at position {position} holds {size} objects")]
    NonGroundInitialFact { position: usize, size: usize },
}
