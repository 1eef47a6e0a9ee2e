//! Domain transition graph: nodes of co-bound atoms and the transitions
//! between them. The graph is assembled by the caller and read-only during
//! analysis.

use crate::atom::Atom;
use crate::bindings::{Bindings, BoundedAtom, DomainId, StepId};

/// Identifier of a DTG node.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(u32);

impl NodeId {
    pub fn raw(self) -> u32 {
        self.0
    }

    pub(crate) fn index(self) -> usize {
        self.0 as usize
    }
}

/// Identifier of a transition.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TransitionId(u32);

impl TransitionId {
    pub fn raw(self) -> u32 {
        self.0
    }

    pub(crate) fn index(self) -> usize {
        self.0 as usize
    }
}

/// A DTG node: bounded atoms sharing variable domains, each with an
/// optional invariable term position.
pub struct DtgNode {
    atoms: Vec<BoundedAtom>,
    invariable: Vec<Option<usize>>,
    transitions: Vec<TransitionId>,
}

impl DtgNode {
    pub fn atoms(&self) -> &[BoundedAtom] {
        &self.atoms
    }

    /// The invariable term position of the node's `atom_index`th atom, if
    /// the atom has one.
    pub fn invariable_index(&self, atom_index: usize) -> Option<usize> {
        self.invariable[atom_index]
    }

    /// Outgoing transitions.
    pub fn transitions(&self) -> &[TransitionId] {
        &self.transitions
    }
}

/// A transition between two DTG nodes, carrying the parametrized action
/// that performs it.
pub struct Transition {
    from: NodeId,
    to: NodeId,
    step: StepId,
    parameters: Vec<DomainId>,
    preconditions: Vec<Atom>,
    external_deps: Vec<DomainId>,
}

impl Transition {
    /// Assemble a transition. `step` binds the action parameters and the
    /// precondition variables; `external_deps` lists the parameter domains
    /// whose values are supplied by a property space other than the
    /// transition's own.
    pub fn new(
        from: NodeId,
        to: NodeId,
        step: StepId,
        parameters: Vec<DomainId>,
        preconditions: Vec<Atom>,
        external_deps: Vec<DomainId>,
    ) -> Self {
        Self {
            from,
            to,
            step,
            parameters,
            preconditions,
            external_deps,
        }
    }

    pub fn from(&self) -> NodeId {
        self.from
    }

    pub fn to(&self) -> NodeId {
        self.to
    }

    pub fn step(&self) -> StepId {
        self.step
    }

    /// Domains of the action parameters, in declaration order.
    pub fn parameters(&self) -> &[DomainId] {
        &self.parameters
    }

    /// Precondition atoms, bound under [`Transition::step`].
    pub fn preconditions(&self) -> &[Atom] {
        &self.preconditions
    }

    /// Parameter domains with an external dependency.
    pub fn external_deps(&self) -> &[DomainId] {
        &self.external_deps
    }

    pub fn has_external_deps(&self) -> bool {
        !self.external_deps.is_empty()
    }
}

/// The combined domain transition graph the engine analyzes.
#[derive(Default)]
pub struct Dtg {
    nodes: Vec<DtgNode>,
    transitions: Vec<Transition>,
}

impl Dtg {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a node. `invariable` must carry one entry per atom.
    pub fn add_node(
        &mut self,
        atoms: Vec<BoundedAtom>,
        invariable: Vec<Option<usize>>,
    ) -> NodeId {
        assert_eq!(atoms.len(), invariable.len());
        let id = NodeId(self.nodes.len() as u32);
        self.nodes.push(DtgNode {
            atoms,
            invariable,
            transitions: Vec::new(),
        });
        id
    }

    /// Add a transition and wire it into its from-node.
    pub fn add_transition(&mut self, transition: Transition) -> TransitionId {
        let id = TransitionId(self.transitions.len() as u32);
        self.nodes[transition.from.index()].transitions.push(id);
        self.transitions.push(transition);
        id
    }

    pub fn node(&self, id: NodeId) -> &DtgNode {
        &self.nodes[id.index()]
    }

    pub fn nodes(&self) -> impl Iterator<Item = NodeId> {
        (0..self.nodes.len() as u32).map(NodeId)
    }

    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    pub fn transition(&self, id: TransitionId) -> &Transition {
        &self.transitions[id.index()]
    }

    pub fn transitions(&self) -> impl Iterator<Item = TransitionId> {
        (0..self.transitions.len() as u32).map(TransitionId)
    }

    /// Outgoing transitions of `node` that carry external dependencies.
    pub fn external_dependent_transitions(
        &self,
        node: NodeId,
    ) -> impl Iterator<Item = TransitionId> + '_ {
        self.nodes[node.index()]
            .transitions
            .iter()
            .copied()
            .filter(|t| self.transitions[t.index()].has_external_deps())
    }

    /// Nodes whose atoms unify position-wise with the given pattern.
    ///
    /// Used by the external-dependency pass: the pattern is the from-node
    /// with its dependent positions left wide open, so matches are the
    /// nodes that agree everywhere else.
    pub fn nodes_matching(&self, pattern: &[BoundedAtom], bindings: &Bindings) -> Vec<NodeId> {
        let mut matching = Vec::new();
        for id in self.nodes() {
            let node = self.node(id);
            if node.atoms.len() != pattern.len() {
                continue;
            }
            let all_unify = node.atoms.iter().zip(pattern.iter()).all(|(a, p)| {
                bindings.can_unify(&a.atom, a.step, &p.atom, p.step)
            });
            if all_unify {
                matching.push(id);
            }
        }
        matching
    }
}
