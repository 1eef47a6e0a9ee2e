//! Variable bindings: every (step, variable) pair resolves to a variable
//! domain, an ordered list of candidate objects. Domains are addressed by
//! stable ids so that atoms within a DTG node can share them; a shared
//! domain is the identity the support finder intersects over.

use crate::atom::{Atom, Term};
use crate::catalog::{Catalog, ObjectId, PredicateId};
use crate::error::ModelError;
use rustc_hash::FxHashMap;

/// A binding context. Atoms bound under different steps have disjoint
/// variable namespaces.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct StepId(u32);

impl StepId {
    pub fn raw(self) -> u32 {
        self.0
    }

    fn index(self) -> usize {
        self.0 as usize
    }
}

/// Stable handle to a variable domain.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct DomainId(u32);

impl DomainId {
    pub fn raw(self) -> u32 {
        self.0
    }

    fn index(self) -> usize {
        self.0 as usize
    }
}

/// An atom paired with the binding step its variables resolve under.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BoundedAtom {
    pub atom: Atom,
    pub step: StepId,
}

impl BoundedAtom {
    pub fn new(atom: Atom, step: StepId) -> Self {
        Self { atom, step }
    }
}

/// The bindings oracle.
///
/// Owns every variable domain created over the engine's lifetime. Object
/// terms resolve to singleton domains created once per object at
/// construction time; domains are never removed.
pub struct Bindings {
    domains: Vec<Vec<ObjectId>>,
    steps: Vec<FxHashMap<u32, DomainId>>,
    singletons: Vec<DomainId>,
}

impl Bindings {
    /// Create a bindings store over the catalog's object universe.
    pub fn new(catalog: &Catalog) -> Self {
        let mut domains = Vec::with_capacity(catalog.object_count());
        let mut singletons = Vec::with_capacity(catalog.object_count());
        for object in catalog.objects() {
            singletons.push(DomainId(domains.len() as u32));
            domains.push(vec![object]);
        }
        Self {
            domains,
            steps: Vec::new(),
            singletons,
        }
    }

    /// Open a fresh binding step with no variables bound.
    pub fn new_step(&mut self) -> StepId {
        let id = StepId(self.steps.len() as u32);
        self.steps.push(FxHashMap::default());
        id
    }

    fn fresh_domain(&mut self, objects: Vec<ObjectId>) -> DomainId {
        let id = DomainId(self.domains.len() as u32);
        self.domains.push(objects);
        id
    }

    /// Bind `variable` under `step` to a fresh domain holding `objects`.
    pub fn bind(&mut self, step: StepId, variable: u32, objects: Vec<ObjectId>) -> DomainId {
        let domain = self.fresh_domain(objects);
        self.steps[step.index()].insert(variable, domain);
        domain
    }

    /// Bind `variable` under `step` to an existing domain. This is how
    /// atoms of a DTG node, and a transition's action parameters, come to
    /// share the same domain identity.
    pub fn bind_shared(&mut self, step: StepId, variable: u32, domain: DomainId) {
        self.steps[step.index()].insert(variable, domain);
    }

    /// The domain bound to `variable` under `step`.
    pub fn variable_domain(&self, step: StepId, variable: u32) -> Result<DomainId, ModelError> {
        self.steps[step.index()]
            .get(&variable)
            .copied()
            .ok_or(ModelError::UnboundVariable {
                variable,
                step: step.raw(),
            })
    }

    /// The domain a term resolves to: the variable's bound domain, or the
    /// object's singleton.
    pub fn term_domain_id(&self, term: Term, step: StepId) -> Result<DomainId, ModelError> {
        match term {
            Term::Object(object) => Ok(self.singletons[object.index()]),
            Term::Variable(variable) => self.variable_domain(step, variable),
        }
    }

    /// The ordered object list behind a domain id.
    pub fn domain(&self, id: DomainId) -> &[ObjectId] {
        &self.domains[id.index()]
    }

    /// The ordered object list a term resolves to.
    pub fn term_domain(&self, term: Term, step: StepId) -> Result<&[ObjectId], ModelError> {
        let id = self.term_domain_id(term, step)?;
        Ok(self.domain(id))
    }

    /// Overwrite the variable domain at `position` of a freshly synthesized
    /// bounded atom. Object positions are left untouched.
    ///
    /// Must only be called on atoms whose domains are not shared with live
    /// state (i.e. the output of [`Bindings::clone_bounded`]).
    pub fn make_domain_equal_to(
        &mut self,
        bounded: &BoundedAtom,
        position: usize,
        objects: &[ObjectId],
    ) {
        if let Term::Variable(variable) = bounded.atom.terms[position] {
            let domain = self.steps[bounded.step.index()][&variable];
            self.domains[domain.index()] = objects.to_vec();
        }
    }

    /// Copy a bounded atom into a fresh step. Every distinct variable gets
    /// a fresh domain with the source's objects; sharing between positions
    /// of the atom is preserved, sharing with the source is cut.
    pub fn clone_bounded(&mut self, source: &BoundedAtom) -> BoundedAtom {
        let step = self.new_step();
        for &term in &source.atom.terms {
            if let Term::Variable(variable) = term {
                if self.steps[step.index()].contains_key(&variable) {
                    continue;
                }
                let objects = self
                    .term_domain(term, source.step)
                    .unwrap_or(&[])
                    .to_vec();
                self.bind(step, variable, objects);
            }
        }
        BoundedAtom::new(source.atom.clone(), step)
    }

    /// Build a ground bounded atom over concrete objects.
    pub fn ground(
        &mut self,
        catalog: &Catalog,
        predicate: PredicateId,
        objects: &[ObjectId],
    ) -> Result<BoundedAtom, ModelError> {
        let expected = catalog.predicate(predicate).arity();
        if objects.len() != expected {
            return Err(ModelError::ArityMismatch {
                predicate: catalog.predicate_name(predicate).to_string(),
                expected,
                found: objects.len(),
            });
        }
        let step = self.new_step();
        let atom = Atom::new(predicate, objects.iter().copied().map(Term::Object));
        Ok(BoundedAtom::new(atom, step))
    }

    /// True iff the two atoms could denote the same fact: same predicate
    /// and polarity, and every corresponding pair of variable domains has
    /// at least one object in common.
    pub fn can_unify(&self, a: &Atom, a_step: StepId, b: &Atom, b_step: StepId) -> bool {
        if a.predicate != b.predicate || a.negated != b.negated || a.arity() != b.arity() {
            return false;
        }
        for (ta, tb) in a.terms.iter().zip(b.terms.iter()) {
            let (da, db) = match (self.term_domain(*ta, a_step), self.term_domain(*tb, b_step)) {
                (Ok(da), Ok(db)) => (da, db),
                _ => return false,
            };
            if !da.iter().any(|o| db.contains(o)) {
                return false;
            }
        }
        true
    }

    /// True iff the two atoms are equivalent: same predicate and polarity,
    /// and every corresponding pair of variable domains is element-wise
    /// equal as a set.
    pub fn are_equivalent(&self, a: &Atom, a_step: StepId, b: &Atom, b_step: StepId) -> bool {
        if a.predicate != b.predicate || a.negated != b.negated || a.arity() != b.arity() {
            return false;
        }
        for (ta, tb) in a.terms.iter().zip(b.terms.iter()) {
            let (da, db) = match (self.term_domain(*ta, a_step), self.term_domain(*tb, b_step)) {
                (Ok(da), Ok(db)) => (da, db),
                _ => return false,
            };
            if !set_equal(da, db) {
                return false;
            }
        }
        true
    }
}

fn set_equal(a: &[ObjectId], b: &[ObjectId]) -> bool {
    if a.len() != b.len() {
        return false;
    }
    let mut a_sorted: Vec<ObjectId> = a.to_vec();
    let mut b_sorted: Vec<ObjectId> = b.to_vec();
    a_sorted.sort_unstable();
    b_sorted.sort_unstable();
    a_sorted == b_sorted
}
