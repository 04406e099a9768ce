//! Assumption trait and the per-edge assumption table.

use crate::cfg::{Edge, Graph, Node};
use crate::entity::PerEntity;
use crate::ir::Program;
use std::fmt::Debug;

/// A fact attached to a CFG edge.
///
/// The `join` operator combines facts arriving over several edges. It
/// must obey the usual lattice laws:
///
/// * a `join` a == a  (idempotence)
/// * a `join` b == b `join` a (commutativity)
/// * a `join` (b `join` c) == (a `join` b) `join` c (associativity)
///
/// The solver compares successive facts for an edge with `==` to
/// decide when it has converged, so the lattice must also have a
/// finite height: repeated joins must reach a value that no longer
/// changes in a finite number of steps.
///
/// There is no explicit bottom value. An edge the solver has not yet
/// written holds no assumption at all and is left out of joins.
pub trait Assumption: Clone + Debug + PartialEq {
    fn join(&self, other: &Self) -> Self;

    /// Human-readable form used by graph dumps.
    fn describe(&self, _program: &Program) -> String {
        format!("{:?}", self)
    }
}

/// Current assumption for every edge of one graph.
#[derive(Clone, Debug)]
pub struct AssumptionMap<A: Assumption> {
    edges: PerEntity<Edge, Option<A>>,
    /// Assumed on entry to a node with no in-edges.
    initial: A,
    /// Edges whose assumption changed since the last `take_changed`.
    changed: Vec<Edge>,
}

impl<A: Assumption> AssumptionMap<A> {
    pub fn new(initial: A) -> Self {
        AssumptionMap {
            edges: PerEntity::default(),
            initial,
            changed: vec![],
        }
    }

    /// The fact assumed where no edge has one.
    pub fn initial(&self) -> &A {
        &self.initial
    }

    /// The assumption on `edge`, or `None` if it was never set.
    pub fn get(&self, edge: Edge) -> Option<&A> {
        self.edges[edge].as_ref()
    }

    /// Sets the assumption on `edge`, recording the edge as changed
    /// if the new value differs from the old one.
    pub fn set(&mut self, edge: Edge, assumption: A) {
        let slot = &mut self.edges[edge];
        if slot.as_ref() != Some(&assumption) {
            log::trace!("set: {} <- {:?}", edge, assumption);
            *slot = Some(assumption);
            self.changed.push(edge);
        }
    }

    /// Sets every edge in `edges` to a copy of `assumption`.
    pub fn set_all(&mut self, edges: &[Edge], assumption: &A) {
        for &edge in edges {
            self.set(edge, assumption.clone());
        }
    }

    /// Joins the assumptions on all of `node`'s in-edges, regardless
    /// of their labels. Edges without an assumption are skipped; if no
    /// edge has one, the result is the initial assumption.
    pub fn join_incoming(&self, graph: &Graph, node: Node) -> A {
        self.join_edges(graph.in_edges(node))
    }

    fn join_edges(&self, edges: &[Edge]) -> A {
        let mut joined: Option<A> = None;
        for &edge in edges {
            if let Some(incoming) = self.get(edge) {
                joined = Some(match joined {
                    Some(acc) => acc.join(incoming),
                    None => incoming.clone(),
                });
            }
        }
        joined.unwrap_or_else(|| self.initial.clone())
    }

    /// Joins the assumptions on all of `node`'s out-edges, the input
    /// of a backward flow function. Unset edges are skipped as in
    /// `join_incoming`.
    pub fn join_outgoing(&self, graph: &Graph, node: Node) -> A {
        self.join_edges(graph.out_edges(node))
    }

    /// Takes the list of edges changed since the last call. An edge may
    /// appear more than once.
    pub fn take_changed(&mut self) -> Vec<Edge> {
        std::mem::take(&mut self.changed)
    }

    /// Edges that hold an assumption, in index order.
    pub fn entries(&self) -> impl Iterator<Item = (Edge, &A)> {
        self.edges
            .entries()
            .filter_map(|(edge, a)| a.as_ref().map(|a| (edge, a)))
    }

    /// Dumps `graph` with each edge annotated by its assumption.
    pub fn dump(&self, graph: &Graph, program: &Program) -> Vec<String> {
        graph.dump(program, |edge| self.get(edge).map(|a| a.describe(program)))
    }
}
