use crate::catalog::{ObjectId, PredicateId};
use smallvec::SmallVec;

/// A term position is occupied by a concrete object or a variable.
///
/// Variables are small indices local to the atom's binding step; the
/// bindings store resolves them to variable domains.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Term {
    Object(ObjectId),
    Variable(u32),
}

/// A predicate applied to an ordered list of terms.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Atom {
    pub predicate: PredicateId,
    pub terms: SmallVec<[Term; 4]>,
    pub negated: bool,
}

impl Atom {
    /// Create a positive atom.
    pub fn new(predicate: PredicateId, terms: impl IntoIterator<Item = Term>) -> Self {
        Self {
            predicate,
            terms: terms.into_iter().collect(),
            negated: false,
        }
    }

    /// Number of term positions.
    pub fn arity(&self) -> usize {
        self.terms.len()
    }
}
