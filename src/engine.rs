//! Engine - top-level relaxed-reachability fixpoint over a DTG.
//!
//! The engine alternates three phases until no new fact is established:
//! 1. An inner fixpoint that fires transitions whose preconditions are
//!    supported and materializes their effects as new facts.
//! 2. An equivalence update that may merge object groups and rewrite the
//!    lifted facts they participate in.
//! 3. An external-dependency pass that declares structurally equivalent
//!    nodes reachable when the externally supplied facts are.

use crate::bindings::{Bindings, BoundedAtom};
use crate::catalog::{Catalog, ObjectId};
use crate::dtg::{Dtg, NodeId};
use crate::eog::{EogId, EogManager};
use crate::error::AnalysisError;
use crate::fact::ReachableFact;
use crate::metrics::AnalysisMetrics;
use crate::pool::{FactId, Pools};
use crate::support::{find_supports, Assignment};
use crate::trace::{debug, trace};
use smallvec::SmallVec;

/// Configuration for a reachability analysis.
#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// Reachable-fact slots per pool slab.
    pub slab_size: usize,
    /// Hard cap on outer fixpoint iterations; `None` runs to the fixpoint.
    pub max_iterations: Option<u32>,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            slab_size: crate::pool::DEFAULT_SLAB_SLOTS,
            max_iterations: None,
        }
    }
}

impl EngineConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_slab_size(mut self, slab_size: usize) -> Self {
        self.slab_size = slab_size;
        self
    }

    pub fn with_max_iterations(mut self, max_iterations: u32) -> Self {
        self.max_iterations = Some(max_iterations);
        self
    }
}

/// Relaxed-reachability analyzer for one DTG. One analysis per engine;
/// the pools it owns are drained when the engine is dropped.
pub struct ReachabilityEngine<'m> {
    catalog: &'m Catalog,
    dtg: &'m Dtg,
    config: EngineConfig,
    pools: Pools,
    eogs: EogManager,
    /// Per node: the tuples witnessing each support event.
    supported: Vec<Vec<Vec<BoundedAtom>>>,
    /// Per node: the nodes reachable from it.
    reachable: Vec<Vec<NodeId>>,
    /// Every fact established so far, the initial state included.
    established: Vec<BoundedAtom>,
    achieved: Vec<bool>,
    iterations_run: u32,
    metrics: AnalysisMetrics,
}

impl<'m> ReachabilityEngine<'m> {
    /// Create an engine. Objects in `grounded` keep singleton groups for
    /// the whole analysis (typically objects mentioned in the goal).
    pub fn new(
        catalog: &'m Catalog,
        dtg: &'m Dtg,
        grounded: &[ObjectId],
        config: EngineConfig,
    ) -> Self {
        let pools = Pools::new(config.slab_size, catalog.max_arity());
        let eogs = EogManager::new(catalog, dtg, grounded);
        let node_count = dtg.node_count();
        let transition_count = dtg.transitions().count();
        Self {
            catalog,
            dtg,
            config,
            pools,
            eogs,
            supported: vec![Vec::new(); node_count],
            reachable: vec![Vec::new(); node_count],
            established: Vec::new(),
            achieved: vec![false; transition_count],
            iterations_run: 0,
            metrics: AnalysisMetrics::new(),
        }
    }

    /// Run the analysis to its fixpoint. `initial_facts` must be ground.
    pub fn analyze(
        &mut self,
        bindings: &mut Bindings,
        initial_facts: &[BoundedAtom],
    ) -> Result<(), AnalysisError> {
        let mut initial_ids: Vec<FactId> = Vec::with_capacity(initial_facts.len());
        for fact in initial_facts {
            initial_ids.push(self.materialize_initial(fact, bindings)?);
        }
        self.eogs.seed_initial_facts(&initial_ids, self.pools.facts());
        self.established = initial_facts.to_vec();

        loop {
            let before = self.established.len();
            self.fixed_point_pass(bindings);
            self.eogs
                .update_equivalences(self.iterations_run, self.pools.facts_mut())?;
            self.handle_external_dependencies(bindings);
            self.iterations_run += 1;
            self.metrics.record_iteration();
            debug!(
                iteration = self.iterations_run,
                established = self.established.len(),
                groups = self.eogs.group_count(),
                "outer iteration complete"
            );
            if self.established.len() == before {
                break;
            }
            if let Some(max) = self.config.max_iterations {
                if self.iterations_run >= max {
                    break;
                }
            }
        }
        Ok(())
    }

    /// Every established fact, initial state first.
    pub fn reachable_facts(&self) -> &[BoundedAtom] {
        &self.established
    }

    /// The support tuples recorded for a node.
    pub fn supported_facts(&self, node: NodeId) -> &[Vec<BoundedAtom>] {
        &self.supported[node.index()]
    }

    /// The nodes reachable from `node`.
    pub fn reachable_from(&self, node: NodeId) -> &[NodeId] {
        &self.reachable[node.index()]
    }

    pub fn eog_manager(&self) -> &EogManager {
        &self.eogs
    }

    /// Outer iterations the analysis ran for.
    pub fn iterations(&self) -> u32 {
        self.iterations_run
    }

    pub fn metrics(&self) -> &AnalysisMetrics {
        &self.metrics
    }

    /// One inner fixpoint: seed node support from the established set,
    /// then fire transitions until none fires.
    fn fixed_point_pass(&mut self, bindings: &mut Bindings) {
        let dtg = self.dtg;

        for node in dtg.nodes() {
            let tuples = find_supports(
                dtg.node(node).atoms(),
                &Assignment::default(),
                &self.established,
                bindings,
            );
            for tuple in tuples {
                self.make_reachable(node, tuple, bindings);
            }
        }

        let mut fired = true;
        while fired {
            fired = false;
            self.propagate_reachable_nodes();

            for transition_id in dtg.transitions() {
                if self.achieved[transition_id.index()] {
                    continue;
                }
                let transition = dtg.transition(transition_id);
                let from = transition.from();
                let tuples = self.supported[from.index()].clone();

                for tuple in &tuples {
                    if tuple.len() != dtg.node(from).atoms().len() {
                        continue;
                    }

                    // Map the from-node's variable domains onto the
                    // tuple's concrete values to pre-bind the action.
                    let mut seed = Assignment::default();
                    for (node_atom, support) in
                        dtg.node(from).atoms().iter().zip(tuple.iter())
                    {
                        for (position, &term) in node_atom.atom.terms.iter().enumerate() {
                            let Ok(domain_id) = bindings.term_domain_id(term, node_atom.step)
                            else {
                                continue;
                            };
                            let Ok(objects) = bindings
                                .term_domain(support.atom.terms[position], support.step)
                            else {
                                continue;
                            };
                            seed.insert(domain_id, objects.to_vec());
                        }
                    }

                    let preconditions: Vec<BoundedAtom> = transition
                        .preconditions()
                        .iter()
                        .map(|atom| BoundedAtom::new(atom.clone(), transition.step()))
                        .collect();
                    let support_tuples =
                        find_supports(&preconditions, &seed, &self.established, bindings);
                    let Some(supporting) = support_tuples.first() else {
                        continue;
                    };

                    self.achieved[transition_id.index()] = true;
                    fired = true;
                    self.metrics.record_transition_fired();
                    trace!(
                        transition = transition_id.raw(),
                        from = from.raw(),
                        to = transition.to().raw(),
                        "transition fired"
                    );
                    if !self.reachable[from.index()].contains(&transition.to()) {
                        self.reachable[from.index()].push(transition.to());
                    }

                    // Bind every action parameter covered by the
                    // supporting facts.
                    let parameters = transition.parameters();
                    let mut parameter_values: Vec<Option<Vec<ObjectId>>> =
                        vec![None; parameters.len()];
                    for (precondition, support) in
                        transition.preconditions().iter().zip(supporting.iter())
                    {
                        for (position, &term) in precondition.terms.iter().enumerate() {
                            let Ok(domain_id) =
                                bindings.term_domain_id(term, transition.step())
                            else {
                                continue;
                            };
                            let Some(parameter) =
                                parameters.iter().position(|&p| p == domain_id)
                            else {
                                continue;
                            };
                            if parameter_values[parameter].is_none() {
                                let objects = bindings
                                    .term_domain(support.atom.terms[position], support.step)
                                    .map(<[ObjectId]>::to_vec)
                                    .unwrap_or_default();
                                parameter_values[parameter] = Some(objects);
                            }
                        }
                    }

                    // Substitute the parameter assignments into the
                    // to-node atoms to get the achieved facts. A to-node
                    // term bound by no parameter aborts the to-node.
                    let to = transition.to();
                    let to_atoms = dtg.node(to).atoms();
                    let mut achievers: Vec<BoundedAtom> = Vec::with_capacity(to_atoms.len());
                    let mut bounded = true;
                    for to_atom in to_atoms {
                        let mut domains: Vec<Vec<ObjectId>> =
                            Vec::with_capacity(to_atom.atom.arity());
                        for &term in &to_atom.atom.terms {
                            let Ok(domain_id) = bindings.term_domain_id(term, to_atom.step)
                            else {
                                bounded = false;
                                break;
                            };
                            match parameters.iter().position(|&p| p == domain_id) {
                                // A parameter no supporting fact bound
                                // keeps its declared domain.
                                Some(parameter) => domains.push(
                                    parameter_values[parameter]
                                        .clone()
                                        .unwrap_or_else(|| bindings.domain(domain_id).to_vec()),
                                ),
                                None => {
                                    bounded = false;
                                    break;
                                }
                            }
                        }
                        if !bounded {
                            break;
                        }
                        let copy = bindings.clone_bounded(to_atom);
                        for (position, objects) in domains.iter().enumerate() {
                            bindings.make_domain_equal_to(&copy, position, objects);
                        }
                        achievers.push(copy);
                    }
                    if !bounded || achievers.len() != to_atoms.len() {
                        continue;
                    }

                    for (atom_index, achieved) in achievers.iter().enumerate() {
                        let present = self.established.iter().any(|existing| {
                            bindings.are_equivalent(
                                &existing.atom,
                                existing.step,
                                &achieved.atom,
                                achieved.step,
                            )
                        });
                        if !present {
                            self.established.push(achieved.clone());
                            self.metrics.record_fact_established();
                            self.materialize_fact(
                                achieved,
                                dtg.node(to).invariable_index(atom_index),
                                bindings,
                            );
                        }
                    }

                    self.make_reachable(to, achievers, bindings);
                }
            }
        }
    }

    /// Record a support tuple for a node unless an element-wise equivalent
    /// tuple is already recorded.
    fn make_reachable(
        &mut self,
        node: NodeId,
        tuple: Vec<BoundedAtom>,
        bindings: &Bindings,
    ) -> bool {
        for existing in &self.supported[node.index()] {
            if existing.len() != tuple.len() {
                continue;
            }
            let equal = existing.iter().zip(tuple.iter()).all(|(a, b)| {
                bindings.are_equivalent(&a.atom, a.step, &b.atom, b.step)
            });
            if equal {
                return false;
            }
        }
        self.supported[node.index()].push(tuple);
        self.metrics.record_support_tuple();
        true
    }

    /// Transitive closure of the reachable-node relation.
    fn propagate_reachable_nodes(&mut self) {
        let mut changed = true;
        while changed {
            changed = false;
            for node in 0..self.reachable.len() {
                let targets = self.reachable[node].clone();
                for target in targets {
                    if target.index() == node {
                        continue;
                    }
                    let transitive = self.reachable[target.index()].clone();
                    for next in transitive {
                        if !self.reachable[node].contains(&next) {
                            self.reachable[node].push(next);
                            changed = true;
                        }
                    }
                }
            }
        }
    }

    /// For each transition with externally-dependent parameters, find the
    /// nodes structurally identical to its from-node except at dependent
    /// positions; whenever the dependent facts are separately established,
    /// record the alternative node as supported.
    fn handle_external_dependencies(&mut self, bindings: &mut Bindings) {
        let dtg = self.dtg;
        let catalog = self.catalog;

        for node in dtg.nodes() {
            let transition_ids: Vec<_> = dtg.external_dependent_transitions(node).collect();
            for transition_id in transition_ids {
                let transition = dtg.transition(transition_id);
                let from = transition.from();
                let from_atoms = dtg.node(from).atoms();
                let deps = transition.external_deps();

                // Build the search pattern: dependent positions widened to
                // their full typed domain, everything else pinned to the
                // from-node's values.
                let mut dependent: Vec<Vec<bool>> = Vec::with_capacity(from_atoms.len());
                let mut atom_has_dep: Vec<bool> = vec![false; from_atoms.len()];
                let mut pattern: Vec<BoundedAtom> = Vec::with_capacity(from_atoms.len());
                for (atom_index, atom) in from_atoms.iter().enumerate() {
                    let copy = bindings.clone_bounded(atom);
                    let mut flags = vec![false; atom.atom.arity()];
                    for (position, &term) in atom.atom.terms.iter().enumerate() {
                        let Ok(domain_id) = bindings.term_domain_id(term, atom.step) else {
                            continue;
                        };
                        if deps.contains(&domain_id) {
                            flags[position] = true;
                            atom_has_dep[atom_index] = true;
                            let param_type = catalog
                                .predicate(atom.atom.predicate)
                                .param_type(position);
                            let full: Vec<ObjectId> = catalog
                                .objects()
                                .filter(|&o| {
                                    catalog.is_subtype_of(catalog.type_of(o), param_type)
                                })
                                .collect();
                            bindings.make_domain_equal_to(&copy, position, &full);
                        }
                    }
                    dependent.push(flags);
                    pattern.push(copy);
                }

                let matching = dtg.nodes_matching(&pattern, bindings);
                let tuples = self.supported[from.index()].clone();

                for candidate in matching {
                    if candidate == from {
                        continue;
                    }
                    let candidate_atoms = dtg.node(candidate).atoms();
                    debug_assert_eq!(candidate_atoms.len(), from_atoms.len());

                    for tuple in &tuples {
                        if tuple.len() != from_atoms.len() {
                            continue;
                        }
                        let mut achievers: Vec<BoundedAtom> =
                            Vec::with_capacity(from_atoms.len());
                        let mut all_reachable = true;

                        for atom_index in 0..from_atoms.len() {
                            if !atom_has_dep[atom_index] {
                                achievers.push(tuple[atom_index].clone());
                                continue;
                            }
                            // Dependent positions take the candidate
                            // node's values, the rest stay with the
                            // supporting fact.
                            let target_atom = &candidate_atoms[atom_index];
                            let copy = bindings.clone_bounded(target_atom);
                            for position in 0..target_atom.atom.arity() {
                                let source = if dependent[atom_index][position] {
                                    bindings.term_domain(
                                        target_atom.atom.terms[position],
                                        target_atom.step,
                                    )
                                } else {
                                    bindings.term_domain(
                                        tuple[atom_index].atom.terms[position],
                                        tuple[atom_index].step,
                                    )
                                };
                                let objects = source.map(<[ObjectId]>::to_vec).unwrap_or_default();
                                bindings.make_domain_equal_to(&copy, position, &objects);
                            }
                            let established = self.established.iter().any(|fact| {
                                bindings.can_unify(&fact.atom, fact.step, &copy.atom, copy.step)
                            });
                            if !established {
                                all_reachable = false;
                                break;
                            }
                            achievers.push(copy);
                        }

                        if all_reachable && self.make_reachable(candidate, achievers, bindings) {
                            self.metrics.record_external_support_tuple();
                            trace!(
                                node = candidate.raw(),
                                transition = transition_id.raw(),
                                "external dependency satisfied"
                            );
                        }
                    }
                }
            }
        }
    }

    /// Materialize a ground initial fact into the EOG fact store.
    fn materialize_initial(
        &mut self,
        fact: &BoundedAtom,
        bindings: &Bindings,
    ) -> Result<FactId, AnalysisError> {
        let expected = self.catalog.predicate(fact.atom.predicate).arity();
        if fact.atom.arity() != expected {
            return Err(AnalysisError::FactArityMismatch {
                predicate: fact.atom.predicate.raw(),
                expected,
                found: fact.atom.arity(),
            });
        }
        let mut terms: SmallVec<[EogId; 4]> = SmallVec::new();
        for (position, &term) in fact.atom.terms.iter().enumerate() {
            let domain = bindings.term_domain(term, fact.step).unwrap_or(&[]);
            if domain.len() != 1 {
                return Err(AnalysisError::NonGroundInitialFact {
                    position,
                    size: domain.len(),
                });
            }
            terms.push(self.eogs.group_of(domain[0]));
        }
        let array = self.pools.term_array(&terms);
        let fact = ReachableFact::new(fact.atom.predicate, fact.atom.negated, array, 0);
        Ok(self.pools.facts_mut().allocate(fact))
    }

    /// Materialize an achieved fact into the EOG fact store. Skipped when
    /// a term domain spans several groups (no single lifted fact can
    /// represent it yet) or when the fact is already registered.
    fn materialize_fact(
        &mut self,
        achieved: &BoundedAtom,
        invariable: Option<usize>,
        bindings: &Bindings,
    ) {
        let mut terms: SmallVec<[EogId; 4]> = SmallVec::new();
        for &term in &achieved.atom.terms {
            let Ok(domain) = bindings.term_domain(term, achieved.step) else {
                return;
            };
            let Some((&first, rest)) = domain.split_first() else {
                return;
            };
            let root = self.eogs.group_of(first);
            if rest.iter().any(|&o| self.eogs.group_of(o) != root) {
                return;
            }
            terms.push(root);
        }

        let mask = invariable.map_or(0, |position| 1u32 << position);
        let fact = ReachableFact::new(achieved.atom.predicate, achieved.atom.negated, self.pools.term_array(&terms), mask);

        for &group in &terms {
            let registered = self.eogs.group(group).facts().iter().any(|&existing| {
                self.pools.facts().get(existing).identical_to(&fact, &self.eogs)
            });
            if registered {
                return;
            }
        }

        let fact_id = self.pools.facts_mut().allocate(fact);
        if terms.is_empty() {
            let zero = self.eogs.zero_arity_group();
            self.eogs.add_fact_to_group(zero, fact_id, self.pools.facts());
            return;
        }
        let mut seen: SmallVec<[EogId; 4]> = SmallVec::new();
        for &group in &terms {
            if !seen.contains(&group) {
                seen.push(group);
                self.eogs.add_fact_to_group(group, fact_id, self.pools.facts());
            }
        }
    }
}

#[cfg(test)]
#[path = "tests/engine.rs"]
mod tests;
