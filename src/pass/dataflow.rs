//! Iterative dataflow (forward and backward) over a CFG, optionally
//! rewriting the graph and its IR as facts are discovered.

use crate::cfg::{Edge, Graph, Node};
use crate::ir::Program;
use crate::pass::{Assumption, AssumptionMap, SolverOptions};
use anyhow::Result;
use fxhash::FxHashSet;
use std::collections::VecDeque;

/// Which way facts travel along edges.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Direction {
    /// From a node's in-edges to its out-edges.
    Forward,
    /// From a node's out-edges to its in-edges.
    Backward,
}

/// Transfer function of an analysis.
pub trait FlowFunction {
    type A: Assumption;

    /// Reads the facts on `node`'s in-edges from `map` and writes the
    /// facts on its out-edges, or the other way round for a backward
    /// function. Must have no other effect.
    fn interpret(&self, node: Node, graph: &Graph, program: &Program, map: &mut AssumptionMap<Self::A>);

    fn direction(&self) -> Direction {
        Direction::Forward
    }
}

/// A proposed rewrite of a single node, produced by an integrated flow
/// function and consumed once by the solver.
pub trait Transformation {
    /// Edits the IR construct behind `node`. Fails if the IR did not
    /// change exactly as intended.
    fn transform(&mut self, node: Node, graph: &mut Graph, program: &mut Program) -> Result<()>;

    /// Builds the fragment that replaces `node` in the graph. Called
    /// after `transform`; the fragment must have no graph-level ports.
    fn new_subgraph(&self, program: &Program) -> Result<Graph>;
}

/// Outcome of visiting a node in integrated mode.
#[derive(Clone, Debug)]
pub enum Interpretation<T> {
    /// Out-edge facts were updated as in pure mode.
    Propagated,
    /// The node should be rewritten; out-edge facts were not touched.
    Replace(T),
}

/// A flow function that may propose a rewrite instead of updating
/// facts.
pub trait IntegratedFlowFunction: FlowFunction {
    type T: Transformation;

    fn interpret_or_replace(
        &self,
        node: Node,
        graph: &Graph,
        program: &Program,
        map: &mut AssumptionMap<Self::A>,
    ) -> Interpretation<Self::T>;
}

/// An analysis: a flow function plus the fact assumed where control
/// enters the graph (or leaves it, for a backward analysis).
pub trait Analysis {
    type F: FlowFunction;

    fn flow_function(&self) -> &Self::F;

    fn initial_assumption(&self) -> <Self::F as FlowFunction>::A;
}

/// The node whose input `edge` is under `direction`.
fn dependent(graph: &Graph, edge: Edge, direction: Direction) -> Option<Node> {
    match direction {
        Direction::Forward => graph.edge(edge).to,
        Direction::Backward => graph.edge(edge).from,
    }
}

/// Runs the worklist from `seed` until no edge changes. A backward
/// flow function visits the seed in reverse. Returns the number of
/// edge updates made.
pub fn propagate<F: FlowFunction>(
    graph: &Graph,
    program: &Program,
    flow: &F,
    map: &mut AssumptionMap<F::A>,
    seed: &[Node],
) -> usize {
    let direction = flow.direction();
    let mut workqueue = VecDeque::new();
    let mut workqueue_set = FxHashSet::default();
    let mut enqueue = |node: Node| {
        if workqueue_set.insert(node) {
            workqueue.push_back(node);
        }
    };
    match direction {
        Direction::Forward => seed.iter().cloned().for_each(&mut enqueue),
        Direction::Backward => seed.iter().rev().cloned().for_each(&mut enqueue),
    }

    let _ = map.take_changed();
    let mut visits = 0;
    let mut updates = 0;
    while let Some(node) = workqueue.pop_front() {
        workqueue_set.remove(&node);
        visits += 1;
        log::trace!("propagate: visiting {} {:?}", node, graph.kind(node));

        flow.interpret(node, graph, program, map);

        for edge in map.take_changed() {
            updates += 1;
            if let Some(next) = dependent(graph, edge, direction) {
                if workqueue_set.insert(next) {
                    workqueue.push_back(next);
                }
            }
        }
    }
    log::trace!("propagate: {} visits, {} edge updates", visits, updates);
    updates
}

/// Re-converges from the edges `map` recorded as changed since the
/// last `take_changed`.
fn settle<F: FlowFunction>(graph: &Graph, program: &Program, flow: &F, map: &mut AssumptionMap<F::A>) {
    let changed = map.take_changed();
    if changed.is_empty() {
        return;
    }
    let dependents = changed
        .iter()
        .filter_map(|&edge| dependent(graph, edge, flow.direction()))
        .collect::<Vec<_>>();
    propagate(graph, program, flow, map, &dependents);
}

/// Pure mode: computes the fixpoint of `analysis` over `graph`
/// without changing it.
pub fn solve<An: Analysis>(
    graph: &Graph,
    program: &Program,
    analysis: &An,
) -> AssumptionMap<<An::F as FlowFunction>::A> {
    let mut map = AssumptionMap::new(analysis.initial_assumption());
    let updates = propagate(graph, program, analysis.flow_function(), &mut map, graph.nodes());
    log::debug!(
        "solve: converged over {} nodes with {} edge updates",
        graph.nodes().len(),
        updates
    );
    map
}

/// Integrated mode: computes the fixpoint, then sweeps the nodes in
/// order (in reverse for a backward analysis) and applies every
/// rewrite the flow function proposes against the converged facts.
///
/// A rewritten node is replaced by its fragment, whose nodes are then
/// visited by the sweep in their own right. Facts are re-converged
/// from the fragment before the sweep moves on. Each node is rewritten
/// at most once, and no rewrite is applied once `options.fuel` runs
/// out.
///
/// Returns whether anything was rewritten.
pub fn solve_integrated<An>(
    graph: &mut Graph,
    program: &mut Program,
    analysis: &An,
    options: &mut SolverOptions,
) -> Result<bool>
where
    An: Analysis,
    An::F: IntegratedFlowFunction,
{
    let flow = analysis.flow_function();
    let direction = flow.direction();
    let mut map = AssumptionMap::new(analysis.initial_assumption());
    let seed = graph.nodes().to_vec();
    propagate(graph, program, flow, &mut map, &seed);

    let mut rewrites = 0;
    // Forward, the next node to visit; backward, one past it.
    let mut index = match direction {
        Direction::Forward => 0,
        Direction::Backward => graph.nodes().len(),
    };
    loop {
        let position = match direction {
            Direction::Forward if index < graph.nodes().len() => index,
            Direction::Backward if index > 0 => index - 1,
            _ => break,
        };
        let next = match direction {
            Direction::Forward => index + 1,
            Direction::Backward => index - 1,
        };
        let node = graph.nodes()[position];
        let mut transformation = match flow.interpret_or_replace(node, graph, program, &mut map) {
            Interpretation::Propagated => {
                settle(graph, program, flow, &mut map);
                index = next;
                continue;
            }
            Interpretation::Replace(transformation) => transformation,
        };

        if !options.fuel.consume() {
            log::debug!("solve_integrated: out of fuel at {}", node);
            flow.interpret(node, graph, program, &mut map);
            settle(graph, program, flow, &mut map);
            index = next;
            continue;
        }

        transformation.transform(node, graph, program)?;
        let fragment = transformation.new_subgraph(program)?;
        log::trace!(
            "solve_integrated: replacing {} with {} nodes",
            node,
            fragment.nodes().len()
        );
        let inserted = graph.splice(node, fragment)?;
        if options.verify {
            graph.verify()?;
        }
        rewrites += 1;

        propagate(graph, program, flow, &mut map, &inserted);
        // The sweep resumes inside the fragment: at its first node,
        // which now sits at `position`, or backward at its last.
        if direction == Direction::Backward {
            index = position + inserted.len();
        }
    }

    log::debug!(
        "solve_integrated: {} rewrites, {} nodes after",
        rewrites,
        graph.nodes().len()
    );
    Ok(rewrites > 0)
}
