//! Reachable facts: lifted atoms whose term positions hold equivalent
//! object groups instead of objects. Merging two groups can leave a fact
//! identical to another; the loser is tombstoned through `replaced_by`
//! rather than deleted, because other groups may still reference it.

use crate::catalog::PredicateId;
use crate::eog::{EogId, EogManager};
use crate::pool::{FactId, FactPool};

/// A lifted fact over equivalent object groups.
pub struct ReachableFact {
    predicate: PredicateId,
    negated: bool,
    terms: Box<[EogId]>,
    invariable_mask: u32,
    replaced_by: Option<FactId>,
}

impl ReachableFact {
    /// Construct a fact. `invariable_mask` has bit `i` set when term
    /// position `i` is the invariable position of the originating atom.
    pub fn new(
        predicate: PredicateId,
        negated: bool,
        terms: Box<[EogId]>,
        invariable_mask: u32,
    ) -> Self {
        Self {
            predicate,
            negated,
            terms,
            invariable_mask,
            replaced_by: None,
        }
    }

    /// A zero-arity fact.
    pub fn propositional(predicate: PredicateId, negated: bool) -> Self {
        Self::new(predicate, negated, Box::new([]), 0)
    }

    pub fn predicate(&self) -> PredicateId {
        self.predicate
    }

    pub fn negated(&self) -> bool {
        self.negated
    }

    pub fn arity(&self) -> usize {
        self.terms.len()
    }

    pub fn term(&self, position: usize) -> EogId {
        self.terms[position]
    }

    pub fn terms(&self) -> &[EogId] {
        &self.terms
    }

    fn invariable(&self, position: usize) -> bool {
        self.invariable_mask & (1 << position) != 0
    }

    /// Two facts are identical iff their term groups resolve to the same
    /// roots position-wise.
    pub fn identical_to(&self, other: &ReachableFact, eogs: &EogManager) -> bool {
        if self.predicate != other.predicate
            || self.negated != other.negated
            || self.terms.len() != other.terms.len()
        {
            return false;
        }
        self.terms
            .iter()
            .zip(other.terms.iter())
            .all(|(&a, &b)| eogs.root(a) == eogs.root(b))
    }

    /// Two facts are equivalent iff invariable positions carry the very
    /// same group reference and the remaining positions share a root.
    pub fn equivalent_to(&self, other: &ReachableFact, eogs: &EogManager) -> bool {
        if self.predicate != other.predicate
            || self.negated != other.negated
            || self.terms.len() != other.terms.len()
        {
            return false;
        }
        for (position, (&a, &b)) in self.terms.iter().zip(other.terms.iter()).enumerate() {
            let strict = self.invariable(position) || other.invariable(position);
            if strict {
                if a != b {
                    return false;
                }
            } else if eogs.root(a) != eogs.root(b) {
                return false;
            }
        }
        true
    }

    /// Rewrite every term slot to its current root group. Returns true iff
    /// any slot changed; a second call right after returns false.
    pub fn update_terms_to_root(&mut self, eogs: &EogManager) -> bool {
        let mut changed = false;
        for slot in self.terms.iter_mut() {
            let root = eogs.root(*slot);
            if root != *slot {
                *slot = root;
                changed = true;
            }
        }
        changed
    }

    /// Tombstone this fact in favour of `replacement`.
    pub fn replace_by(&mut self, replacement: FactId) {
        self.replaced_by = Some(replacement);
    }

    /// True iff this fact has been subsumed by another.
    pub fn is_marked_for_removal(&self) -> bool {
        self.replaced_by.is_some()
    }

    pub fn replaced_by(&self) -> Option<FactId> {
        self.replaced_by
    }
}

/// Follow `replaced_by` links from `id` to the live fact at the end of the
/// chain. Returns `id` itself when the fact is live.
pub fn replacement(pool: &FactPool, id: FactId) -> FactId {
    let mut current = id;
    while let Some(next) = pool.get(current).replaced_by() {
        current = next;
    }
    current
}

#[cfg(test)]
#[path = "tests/fact.rs"]
mod tests;
