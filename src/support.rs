//! Support finder: depth-first backtracking search for tuples of known
//! facts that jointly unify with a list of goal atoms.
//!
//! Shared variable domains are the join points. Whenever a candidate fact
//! binds a domain that an earlier goal atom already bound, the two
//! bindings are intersected; an empty intersection abandons the candidate
//! and backtracks. Each branch works on its own copy of the assignment
//! map so failures never leak partial bindings.

use crate::atom::Term;
use crate::bindings::{Bindings, BoundedAtom, DomainId};
use crate::catalog::ObjectId;
use rustc_hash::FxHashMap;

/// Variable-domain assignments accumulated during the search.
pub type Assignment = FxHashMap<DomainId, Vec<ObjectId>>;

/// Find every distinct tuple of known facts, one per goal atom in order,
/// that admits a consistent assignment to all shared variable domains.
///
/// The returned tuples are freshly synthesized bounded atoms whose
/// variable domains carry the final intersected assignments. An empty
/// goal list is trivially supported by the empty tuple.
pub fn find_supports(
    goal_atoms: &[BoundedAtom],
    seed: &Assignment,
    known_facts: &[BoundedAtom],
    bindings: &mut Bindings,
) -> Vec<Vec<BoundedAtom>> {
    let mut tuples = Vec::new();
    if goal_atoms.is_empty() {
        tuples.push(Vec::new());
        return tuples;
    }
    search(goal_atoms, 0, seed, known_facts, bindings, &mut tuples);
    tuples
}

fn search(
    goal_atoms: &[BoundedAtom],
    depth: usize,
    assignment: &Assignment,
    known_facts: &[BoundedAtom],
    bindings: &mut Bindings,
    out: &mut Vec<Vec<BoundedAtom>>,
) {
    let goal = &goal_atoms[depth];

    for fact in known_facts {
        if !bindings.can_unify(&fact.atom, fact.step, &goal.atom, goal.step) {
            continue;
        }

        let mut branch = assignment.clone();
        let mut supported = true;

        for (position, &term) in goal.atom.terms.iter().enumerate() {
            let domain_id = match bindings.term_domain_id(term, goal.step) {
                Ok(id) => id,
                Err(_) => {
                    supported = false;
                    break;
                }
            };
            let fact_domain: Vec<ObjectId> = match bindings
                .term_domain(fact.atom.terms[position], fact.step)
            {
                Ok(domain) => domain.to_vec(),
                Err(_) => {
                    supported = false;
                    break;
                }
            };
            match branch.get(&domain_id) {
                None => {
                    branch.insert(domain_id, fact_domain);
                }
                Some(existing) => {
                    let narrowed = intersect_sorted(existing, &fact_domain);
                    if narrowed.is_empty() {
                        supported = false;
                        break;
                    }
                    branch.insert(domain_id, narrowed);
                }
            }
        }

        if !supported {
            continue;
        }

        if depth + 1 == goal_atoms.len() {
            out.push(synthesize(goal_atoms, &branch, bindings));
        } else {
            search(goal_atoms, depth + 1, &branch, known_facts, bindings, out);
        }
    }
}

/// Build the emitted tuple: one fresh bounded atom per goal atom, each
/// variable domain constrained to its final intersected set.
fn synthesize(
    goal_atoms: &[BoundedAtom],
    assignment: &Assignment,
    bindings: &mut Bindings,
) -> Vec<BoundedAtom> {
    goal_atoms
        .iter()
        .map(|goal| {
            let copy = bindings.clone_bounded(goal);
            for (position, &term) in goal.atom.terms.iter().enumerate() {
                if !matches!(term, Term::Variable(_)) {
                    continue;
                }
                let domain_id = match bindings.term_domain_id(term, goal.step) {
                    Ok(id) => id,
                    Err(_) => continue,
                };
                if let Some(objects) = assignment.get(&domain_id) {
                    bindings.make_domain_equal_to(&copy, position, objects);
                }
            }
            copy
        })
        .collect()
}

/// Intersection of two object lists, computed over sorted copies.
fn intersect_sorted(a: &[ObjectId], b: &[ObjectId]) -> Vec<ObjectId> {
    let mut a_sorted = a.to_vec();
    let mut b_sorted = b.to_vec();
    a_sorted.sort_unstable();
    b_sorted.sort_unstable();

    let mut result = Vec::with_capacity(a_sorted.len().min(b_sorted.len()));
    let (mut i, mut j) = (0, 0);
    while i < a_sorted.len() && j < b_sorted.len() {
        match a_sorted[i].cmp(&b_sorted[j]) {
            std::cmp::Ordering::Less => i += 1,
            std::cmp::Ordering::Greater => j += 1,
            std::cmp::Ordering::Equal => {
                result.push(a_sorted[i]);
                i += 1;
                j += 1;
            }
        }
    }
    result
}

#[cfg(test)]
#[path = "tests/support.rs"]
mod tests;
