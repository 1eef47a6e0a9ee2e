//! Equivalent object groups: the partition of domain objects into sets the
//! reachability state cannot tell apart, with enough history to answer
//! membership queries for any past iteration.
//!
//! Merged groups are never destroyed. The loser keeps its object list and
//! size history and forwards all queries through `link`; the iteration at
//! which it stopped being a root decides whether a historical query stays
//! local or follows the link. No path compression, ever: collapsing link
//! chains would lose the merge iteration.

use crate::catalog::{Catalog, ObjectId};
use crate::dtg::Dtg;
use crate::error::AnalysisError;
use crate::fact::ReachableFact;
use crate::pool::{FactId, FactPool};
use hashbrown::HashSet;
use rustc_hash::FxHashMap;

/// Identifier of an equivalent object group.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct EogId(u32);

impl EogId {
    pub fn raw(self) -> u32 {
        self.0
    }

    #[cfg(test)]
    pub(crate) fn from_raw(raw: u32) -> Self {
        EogId(raw)
    }

    fn index(self) -> usize {
        self.0 as usize
    }
}

/// Identifier of an equivalent object.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct EoId(u32);

impl EoId {
    fn index(self) -> usize {
        self.0 as usize
    }
}

/// An object together with the initial facts that mention it.
pub struct EquivalentObject {
    object: ObjectId,
    group: EogId,
    initial_facts: Vec<FactId>,
}

impl EquivalentObject {
    pub fn object(&self) -> ObjectId {
        self.object
    }

    /// The group founded for this object. Follow [`EogManager::root`] for
    /// the current group.
    pub fn founding_group(&self) -> EogId {
        self.group
    }

    pub fn initial_facts(&self) -> &[FactId] {
        &self.initial_facts
    }
}

/// A set of interchangeable objects.
pub struct EquivalentObjectGroup {
    /// Ordered, prefix-stable: merged objects are appended, never inserted.
    objects: Vec<EoId>,
    /// One flag per (node, atom, term position); `None` only for the
    /// zero-arity group.
    fingerprint: Option<Box<[bool]>>,
    facts: Vec<FactId>,
    link: Option<EogId>,
    /// `u32::MAX` while this group is a root.
    merged_at: u32,
    size_per_iteration: Vec<usize>,
    grounded: bool,
}

impl EquivalentObjectGroup {
    pub fn is_root(&self) -> bool {
        self.link.is_none()
    }

    pub fn is_grounded(&self) -> bool {
        self.grounded
    }

    /// The iteration at which this group was merged away, if it was.
    pub fn merged_at_iteration(&self) -> Option<u32> {
        (self.merged_at != u32::MAX).then_some(self.merged_at)
    }

    pub fn link(&self) -> Option<EogId> {
        self.link
    }

    /// Reachable facts this group participates in. May contain tombstones
    /// until the next [`EogManager::update_equivalences`] sweep.
    pub fn facts(&self) -> &[FactId] {
        &self.facts
    }

    pub fn object_count(&self) -> usize {
        self.objects.len()
    }

    /// Object count recorded at the end of each iteration this group was a
    /// root for.
    pub fn size_per_iteration(&self) -> &[usize] {
        &self.size_per_iteration
    }

    pub fn fingerprint(&self) -> Option<&[bool]> {
        self.fingerprint.as_deref()
    }
}

/// Owner of all groups and the object maps; drives equivalence updates.
pub struct EogManager {
    groups: Vec<EquivalentObjectGroup>,
    equivalent_objects: Vec<EquivalentObject>,
    object_eo: FxHashMap<ObjectId, EoId>,
    zero_arity: EogId,
}

impl EogManager {
    /// Create one singleton group per catalog object, plus the grounded
    /// zero-arity group for propositional facts. Objects listed in
    /// `grounded` get grounded groups that will never merge.
    pub fn new(catalog: &Catalog, dtg: &Dtg, grounded: &[ObjectId]) -> Self {
        let mut manager = Self {
            groups: Vec::with_capacity(catalog.object_count() + 1),
            equivalent_objects: Vec::with_capacity(catalog.object_count()),
            object_eo: FxHashMap::default(),
            zero_arity: EogId(catalog.object_count() as u32),
        };

        for object in catalog.objects() {
            let group_id = EogId(manager.groups.len() as u32);
            let eo_id = EoId(manager.equivalent_objects.len() as u32);
            manager.groups.push(EquivalentObjectGroup {
                objects: vec![eo_id],
                fingerprint: Some(fingerprint(catalog, dtg, object)),
                facts: Vec::new(),
                link: None,
                merged_at: u32::MAX,
                size_per_iteration: Vec::new(),
                grounded: grounded.contains(&object),
            });
            manager.equivalent_objects.push(EquivalentObject {
                object,
                group: group_id,
                initial_facts: Vec::new(),
            });
            manager.object_eo.insert(object, eo_id);
        }

        manager.groups.push(EquivalentObjectGroup {
            objects: Vec::new(),
            fingerprint: None,
            facts: Vec::new(),
            link: None,
            merged_at: u32::MAX,
            size_per_iteration: Vec::new(),
            grounded: true,
        });

        manager
    }

    /// Record the initial state: every object of every term group of each
    /// fact gets the fact as an initial-state witness, and the fact joins
    /// the participating groups' reachable lists. Zero-arity facts go to
    /// the dedicated propositional group.
    pub fn seed_initial_facts(&mut self, facts: &[FactId], pool: &FactPool) {
        for &fact_id in facts {
            let terms: Vec<EogId> = pool.get(fact_id).terms().to_vec();
            if terms.is_empty() {
                let zero = self.zero_arity;
                self.add_fact_to_group(zero, fact_id, pool);
                continue;
            }
            for group in terms {
                let members: Vec<EoId> = self.groups[group.index()].objects.clone();
                for eo in members {
                    self.add_initial_fact(eo, fact_id, pool);
                }
            }
        }
    }

    fn add_initial_fact(&mut self, eo: EoId, fact_id: FactId, pool: &FactPool) {
        let entry = &mut self.equivalent_objects[eo.index()];
        if entry.initial_facts.contains(&fact_id) {
            return;
        }
        entry.initial_facts.push(fact_id);
        let group = entry.group;
        self.add_fact_to_group(group, fact_id, pool);
    }

    /// Register a fact with a group's reachable list. Identical duplicates
    /// are a programmer error, caught in debug builds.
    pub(crate) fn add_fact_to_group(&mut self, group: EogId, fact_id: FactId, pool: &FactPool) {
        if self.groups[group.index()].facts.contains(&fact_id) {
            return;
        }
        #[cfg(debug_assertions)]
        {
            let fact = pool.get(fact_id);
            for &existing in &self.groups[group.index()].facts {
                debug_assert!(
                    !pool.get(existing).identical_to(fact, self),
                    "identical fact {} already registered with group {}",
                    existing.raw(),
                    group.raw()
                );
            }
        }
        #[cfg(not(debug_assertions))]
        let _ = pool;
        self.groups[group.index()].facts.push(fact_id);
    }

    /// Resolve a group to its current root by following merge links.
    pub fn root(&self, id: EogId) -> EogId {
        let mut current = id;
        while let Some(next) = self.groups[current.index()].link {
            current = next;
        }
        current
    }

    pub fn group(&self, id: EogId) -> &EquivalentObjectGroup {
        &self.groups[id.index()]
    }

    /// The current root group of an object.
    pub fn group_of(&self, object: ObjectId) -> EogId {
        let eo = self.object_eo[&object];
        self.root(self.equivalent_objects[eo.index()].group)
    }

    pub fn equivalent_object_of(&self, object: ObjectId) -> &EquivalentObject {
        &self.equivalent_objects[self.object_eo[&object].index()]
    }

    /// The grounded group holding propositional facts.
    pub fn zero_arity_group(&self) -> EogId {
        self.zero_arity
    }

    pub fn group_ids(&self) -> impl Iterator<Item = EogId> {
        (0..self.groups.len() as u32).map(EogId)
    }

    /// Number of live (root) object groups. The propositional zero-arity
    /// group is not an equivalence class of objects and is not counted.
    pub fn group_count(&self) -> usize {
        self.groups
            .iter()
            .enumerate()
            .filter(|(index, g)| g.is_root() && EogId(*index as u32) != self.zero_arity)
            .count()
    }

    /// Whether `group` contained `object` at the end of `iteration`.
    ///
    /// Routes through the merge link when the group was already merged at
    /// that iteration; otherwise scans the prefix of the object list
    /// recorded for it.
    pub fn contains(&self, group: EogId, object: ObjectId, iteration: u32) -> bool {
        let g = &self.groups[group.index()];
        if g.merged_at <= iteration {
            let link = g.link.expect("merged group always carries a link");
            return self.contains(link, object, iteration);
        }
        assert!(
            (iteration as usize) < g.size_per_iteration.len(),
            "iteration {} not yet recorded for group {}",
            iteration,
            group.raw()
        );
        let size = g.size_per_iteration[iteration as usize];
        g.objects[..size]
            .iter()
            .any(|&eo| self.equivalent_objects[eo.index()].object == object)
    }

    /// The group's object count at the end of `iteration`.
    pub fn size_at(&self, group: EogId, iteration: u32) -> usize {
        let g = &self.groups[group.index()];
        if g.merged_at <= iteration {
            let link = g.link.expect("merged group always carries a link");
            return self.size_at(link, iteration);
        }
        g.size_per_iteration[iteration as usize]
    }

    /// One equivalence pass: attempt every root pair, then snapshot every
    /// root's size for this iteration and purge tombstones from the lists
    /// the merges touched.
    pub fn update_equivalences(
        &mut self,
        iteration: u32,
        pool: &mut FactPool,
    ) -> Result<(), AnalysisError> {
        let mut affected: Vec<EogId> = Vec::new();

        for i in 0..self.groups.len() {
            if !self.groups[i].is_root() {
                continue;
            }
            for j in 0..self.groups.len() {
                if i == j || !self.groups[j].is_root() {
                    continue;
                }
                self.try_merge(EogId(i as u32), EogId(j as u32), &mut affected, iteration, pool)?;
            }
        }

        for group in &mut self.groups {
            if group.is_root() {
                group.size_per_iteration.push(group.objects.len());
            }
        }

        for group in affected {
            if self.groups[group.index()].is_root() {
                self.delete_removed_facts(group, pool);
            }
        }
        Ok(())
    }

    /// Try to merge `b` into `a`. Non-roots re-dispatch to their roots; a
    /// same-root pair counts as already merged. Refusals (grounded group,
    /// fingerprint mismatch, initial state not mutually reachable) are
    /// normal and return `false`.
    fn try_merge(
        &mut self,
        a: EogId,
        b: EogId,
        affected: &mut Vec<EogId>,
        iteration: u32,
        pool: &mut FactPool,
    ) -> Result<bool, AnalysisError> {
        let a = self.root(a);
        let b = self.root(b);
        if a == b {
            return Ok(true);
        }
        if self.groups[a.index()].grounded || self.groups[b.index()].grounded {
            return Ok(false);
        }
        match (
            &self.groups[a.index()].fingerprint,
            &self.groups[b.index()].fingerprint,
        ) {
            (Some(fa), Some(fb)) if fa == fb => {}
            _ => return Ok(false),
        }
        if !self.has_initial_anchor(a) || !self.has_initial_anchor(b) {
            return Ok(false);
        }
        if !self.covers(a, b, pool) || !self.covers(b, a, pool) {
            return Ok(false);
        }
        self.merge(a, b, affected, iteration, pool)?;
        Ok(true)
    }

    /// Some object of the group is anchored in the initial state. Groups
    /// whose objects appear in no initial fact never qualify for merging.
    fn has_initial_anchor(&self, group: EogId) -> bool {
        self.groups[group.index()]
            .objects
            .iter()
            .any(|&eo| !self.equivalent_objects[eo.index()].initial_facts.is_empty())
    }

    /// Every live fact of `source` is matched by a fact of `target`, where
    /// slots referencing `source` correspond to slots referencing `target`
    /// and every other slot must share a root. Initial facts are reachable
    /// facts of their group, so this subsumes the initial-state check in
    /// the merging direction.
    fn covers(&self, target: EogId, source: EogId, pool: &FactPool) -> bool {
        let target_facts = &self.groups[target.index()].facts;
        self.groups[source.index()].facts.iter().all(|&source_fact| {
            let fact = pool.get(source_fact);
            if fact.is_marked_for_removal() {
                return true;
            }
            target_facts.iter().any(|&candidate| {
                self.facts_correspond(pool.get(candidate), fact, target, source)
            })
        })
    }

    /// Pointwise fact comparison with the candidate merge assumed: roots
    /// must agree, except that an `a` slot on one side may stand in for a
    /// `b` slot on the other.
    fn facts_correspond(
        &self,
        left: &ReachableFact,
        right: &ReachableFact,
        a: EogId,
        b: EogId,
    ) -> bool {
        if left.predicate() != right.predicate()
            || left.negated() != right.negated()
            || left.arity() != right.arity()
        {
            return false;
        }
        left.terms().iter().zip(right.terms().iter()).all(|(&x, &y)| {
            let rx = self.root(x);
            let ry = self.root(y);
            rx == ry || (rx == a && ry == b) || (rx == b && ry == a)
        })
    }

    /// Merge `b` into `a`. Both must be roots.
    fn merge(
        &mut self,
        a: EogId,
        b: EogId,
        affected: &mut Vec<EogId>,
        iteration: u32,
        pool: &mut FactPool,
    ) -> Result<(), AnalysisError> {
        for group in [a, b] {
            if self.groups[group.index()].grounded {
                return Err(AnalysisError::GroundedMerge { group: group.raw() });
            }
        }
        debug_assert!(self.groups[a.index()].is_root() && self.groups[b.index()].is_root());

        self.groups[b.index()].link = Some(a);
        self.groups[b.index()].merged_at = iteration;

        // The loser keeps its own object list for historical queries; the
        // root gets the members appended, preserving prefix stability.
        let b_objects = self.groups[b.index()].objects.clone();
        self.groups[a.index()].objects.extend(b_objects);

        // Facts of `a` that now reference a non-root group are covered by
        // the rewritten facts coming over from `b`; drop them from the
        // list and remember every group that has to purge tombstones.
        let a_facts = std::mem::take(&mut self.groups[a.index()].facts);
        let mut kept: Vec<FactId> = Vec::with_capacity(a_facts.len());
        for fact_id in a_facts {
            let stale = pool
                .get(fact_id)
                .terms()
                .iter()
                .any(|&term| !self.groups[term.index()].is_root());
            if stale {
                for &term in pool.get(fact_id).terms() {
                    if term != a && !affected.contains(&term) {
                        affected.push(term);
                    }
                }
            } else {
                kept.push(fact_id);
            }
        }
        let mut updated: Vec<FactId> = kept.clone();
        self.groups[a.index()].facts = kept;

        // Rewrite `b`'s facts to the new roots; a rewrite that collides
        // with a fact already present tombstones the loser.
        let b_facts = self.groups[b.index()].facts.clone();
        for fact_id in b_facts {
            if pool.get(fact_id).is_marked_for_removal() {
                continue;
            }
            let changed = pool.get_mut(fact_id).update_terms_to_root(self);
            let mut already_present = false;
            if changed {
                let identical = updated.iter().copied().find(|&candidate| {
                    candidate != fact_id
                        && pool.get(candidate).identical_to(pool.get(fact_id), self)
                });
                match identical {
                    Some(winner) => {
                        pool.get_mut(fact_id).replace_by(winner);
                        for &term in pool.get(fact_id).terms() {
                            if !affected.contains(&term) {
                                affected.push(term);
                            }
                        }
                        already_present = true;
                    }
                    None => updated.push(fact_id),
                }
            }
            if !already_present && !self.groups[a.index()].facts.contains(&fact_id) {
                self.groups[a.index()].facts.push(fact_id);
            }
        }
        Ok(())
    }

    /// Drop every tombstoned fact from the group's reachable list. The
    /// slots themselves stay allocated; references from other groups keep
    /// resolving through the tombstone chain.
    fn delete_removed_facts(&mut self, group: EogId, pool: &FactPool) {
        self.groups[group.index()]
            .facts
            .retain(|&fact_id| !pool.get(fact_id).is_marked_for_removal());
    }

    /// Every live reachable fact, each reported once. Walks the roots and
    /// skips facts whose term groups were already fully enumerated.
    pub fn all_reachable_facts(&self, pool: &FactPool) -> Vec<FactId> {
        let mut closed: HashSet<EogId> = HashSet::new();
        let mut result = Vec::new();
        for (index, group) in self.groups.iter().enumerate() {
            if !group.is_root() {
                continue;
            }
            for &fact_id in &group.facts {
                let fact = pool.get(fact_id);
                if fact.is_marked_for_removal() {
                    continue;
                }
                let seen = fact
                    .terms()
                    .iter()
                    .any(|&term| closed.contains(&self.root(term)));
                if !seen {
                    result.push(fact_id);
                }
            }
            closed.insert(EogId(index as u32));
        }
        result
    }

    /// Render a group's member objects, for diagnostics.
    pub fn format_group(&self, id: EogId, catalog: &Catalog) -> String {
        let root = self.root(id);
        let names: Vec<&str> = self.groups[root.index()]
            .objects
            .iter()
            .map(|&eo| catalog.object_name(self.equivalent_objects[eo.index()].object))
            .collect();
        format!("{{{}}}", names.join(", "))
    }
}

#[cfg(test)]
impl EogManager {
    /// A manager with `count` bare root groups and no objects, for tests
    /// that only exercise links and fact rewriting.
    pub(crate) fn bare(count: usize) -> Self {
        Self {
            groups: (0..count)
                .map(|_| EquivalentObjectGroup {
                    objects: Vec::new(),
                    fingerprint: None,
                    facts: Vec::new(),
                    link: None,
                    merged_at: u32::MAX,
                    size_per_iteration: Vec::new(),
                    grounded: false,
                })
                .collect(),
            equivalent_objects: Vec::new(),
            object_eo: FxHashMap::default(),
            zero_arity: EogId(0),
        }
    }

    /// Forward `from` to `to` as if a merge had happened at `iteration`.
    pub(crate) fn force_link(&mut self, from: EogId, to: EogId, iteration: u32) {
        self.groups[from.index()].link = Some(to);
        self.groups[from.index()].merged_at = iteration;
    }
}

fn fingerprint(catalog: &Catalog, dtg: &Dtg, object: ObjectId) -> Box<[bool]> {
    let object_type = catalog.type_of(object);
    let mut bits = Vec::new();
    for node_id in dtg.nodes() {
        for bounded in dtg.node(node_id).atoms() {
            let predicate = catalog.predicate(bounded.atom.predicate);
            for position in 0..bounded.atom.arity() {
                bits.push(catalog.is_subtype_of(object_type, predicate.param_type(position)));
            }
        }
    }
    bits.into_boxed_slice()
}

#[cfg(test)]
#[path = "tests/eog.rs"]
mod tests;
