//! Several analyses solved together over one graph.
//!
//! `Combined` pairs two analyses that flow the same way. Each edge
//! carries both facts side by side, and each node is interpreted by
//! both flow functions on every visit. In integrated mode the first
//! analysis to propose a rewrite of a node wins; the other sees the
//! node's fragment when the sweep reaches it. Nest `Combined` to run
//! more than two.

use crate::cfg::{Graph, Node};
use crate::errors::AnalysisError;
use crate::ir::Program;
use crate::pass::{
    Analysis, Assumption, AssumptionMap, Direction, FlowFunction, IntegratedFlowFunction,
    Interpretation, Transformation,
};
use anyhow::{bail, Result};

/// The facts of two analyses on one edge. Joins component-wise, so the
/// lattice laws carry over.
#[derive(Clone, Debug, PartialEq)]
pub struct Pair<A, B>(pub A, pub B);

impl<A: Assumption, B: Assumption> Assumption for Pair<A, B> {
    fn join(&self, other: &Self) -> Self {
        Pair(self.0.join(&other.0), self.1.join(&other.1))
    }

    fn describe(&self, program: &Program) -> String {
        format!("{} | {}", self.0.describe(program), self.1.describe(program))
    }
}

/// A rewrite proposed by one of the two analyses of a `Combined`.
#[derive(Clone, Debug)]
pub enum Either<S, T> {
    First(S),
    Second(T),
}

impl<S: Transformation, T: Transformation> Transformation for Either<S, T> {
    fn transform(&mut self, node: Node, graph: &mut Graph, program: &mut Program) -> Result<()> {
        match self {
            Either::First(t) => t.transform(node, graph, program),
            Either::Second(t) => t.transform(node, graph, program),
        }
    }

    fn new_subgraph(&self, program: &Program) -> Result<Graph> {
        match self {
            Either::First(t) => t.new_subgraph(program),
            Either::Second(t) => t.new_subgraph(program),
        }
    }
}

pub struct Combined<X, Y> {
    first: X,
    second: Y,
}

type FactOf<X> = <<X as Analysis>::F as FlowFunction>::A;

impl<X: Analysis, Y: Analysis> Combined<X, Y> {
    /// Fails if the two analyses flow in different directions.
    pub fn new(first: X, second: Y) -> Result<Self> {
        let (a, b) = (
            first.flow_function().direction(),
            second.flow_function().direction(),
        );
        if a != b {
            bail!(AnalysisError::Unsupported(format!(
                "cannot combine a {:?} analysis with a {:?} one",
                a, b
            )));
        }
        Ok(Combined { first, second })
    }

    /// Runs `f` on a map holding one side of the facts around `node`.
    fn run_side<C: Assumption, R>(
        map: &AssumptionMap<Pair<FactOf<X>, FactOf<Y>>>,
        graph: &Graph,
        node: Node,
        pick: impl Fn(&Pair<FactOf<X>, FactOf<Y>>) -> &C,
        f: impl FnOnce(&mut AssumptionMap<C>) -> R,
    ) -> (AssumptionMap<C>, R) {
        let mut side = AssumptionMap::new(pick(map.initial()).clone());
        for &edge in graph.in_edges(node).iter().chain(graph.out_edges(node)) {
            if let Some(pair) = map.get(edge) {
                side.set(edge, pick(pair).clone());
            }
        }
        let _ = side.take_changed();
        let result = f(&mut side);
        (side, result)
    }

    /// Writes back every edge either side changed. Where only one side
    /// set an edge that had no fact, the other side gets its initial
    /// fact.
    fn merge(
        map: &mut AssumptionMap<Pair<FactOf<X>, FactOf<Y>>>,
        mut first: AssumptionMap<FactOf<X>>,
        mut second: AssumptionMap<FactOf<Y>>,
    ) {
        let mut edges = first.take_changed();
        edges.extend(second.take_changed());
        for edge in edges {
            let old = match map.get(edge) {
                Some(pair) => pair.clone(),
                None => map.initial().clone(),
            };
            let a = first.get(edge).cloned().unwrap_or(old.0);
            let b = second.get(edge).cloned().unwrap_or(old.1);
            map.set(edge, Pair(a, b));
        }
    }
}

impl<X: Analysis, Y: Analysis> FlowFunction for Combined<X, Y> {
    type A = Pair<FactOf<X>, FactOf<Y>>;

    fn interpret(&self, node: Node, graph: &Graph, program: &Program, map: &mut AssumptionMap<Self::A>) {
        let (first, ()) = Self::run_side(map, graph, node, |p| &p.0, |side| {
            self.first.flow_function().interpret(node, graph, program, side)
        });
        let (second, ()) = Self::run_side(map, graph, node, |p| &p.1, |side| {
            self.second.flow_function().interpret(node, graph, program, side)
        });
        Self::merge(map, first, second);
    }

    fn direction(&self) -> Direction {
        self.first.flow_function().direction()
    }
}

impl<X, Y> IntegratedFlowFunction for Combined<X, Y>
where
    X: Analysis,
    Y: Analysis,
    X::F: IntegratedFlowFunction,
    Y::F: IntegratedFlowFunction,
{
    type T = Either<<X::F as IntegratedFlowFunction>::T, <Y::F as IntegratedFlowFunction>::T>;

    fn interpret_or_replace(
        &self,
        node: Node,
        graph: &Graph,
        program: &Program,
        map: &mut AssumptionMap<Self::A>,
    ) -> Interpretation<Self::T> {
        let (first, outcome) = Self::run_side(map, graph, node, |p| &p.0, |side| {
            self.first
                .flow_function()
                .interpret_or_replace(node, graph, program, side)
        });
        if let Interpretation::Replace(t) = outcome {
            log::trace!("combined: first analysis rewrites {}", node);
            return Interpretation::Replace(Either::First(t));
        }
        let (second, outcome) = Self::run_side(map, graph, node, |p| &p.1, |side| {
            self.second
                .flow_function()
                .interpret_or_replace(node, graph, program, side)
        });
        if let Interpretation::Replace(t) = outcome {
            log::trace!("combined: second analysis rewrites {}", node);
            return Interpretation::Replace(Either::Second(t));
        }
        Self::merge(map, first, second);
        Interpretation::Propagated
    }
}

impl<X: Analysis, Y: Analysis> Analysis for Combined<X, Y> {
    type F = Self;

    fn flow_function(&self) -> &Self {
        self
    }

    fn initial_assumption(&self) -> <Self as FlowFunction>::A {
        Pair(
            self.first.initial_assumption(),
            self.second.initial_assumption(),
        )
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::cfg::{CfgBuilder, IrRef, NodeKind};
    use crate::ir::Type;
    use crate::pass::solve;

    /// Length of the longest path to an edge, saturating.
    #[derive(Clone, Debug, PartialEq)]
    struct Seen(u32);

    impl Assumption for Seen {
        fn join(&self, other: &Seen) -> Seen {
            Seen(self.0.max(other.0))
        }
    }

    /// Proposes a rewrite of every node of kind `target`.
    struct Counter {
        cap: u32,
        target: NodeKind,
        direction: Direction,
    }

    /// Replaces a node by a lone `Nop`.
    #[derive(Debug)]
    struct ToNop(&'static str);

    impl Transformation for ToNop {
        fn transform(&mut self, _: Node, _: &mut Graph, _: &mut Program) -> Result<()> {
            Ok(())
        }

        fn new_subgraph(&self, _: &Program) -> Result<Graph> {
            let mut fragment = Graph::new();
            let nop = fragment.add_node(NodeKind::Nop, IrRef::None, None);
            fragment.entry = Some(nop);
            fragment.exit = Some(nop);
            Ok(fragment)
        }
    }

    impl FlowFunction for Counter {
        type A = Seen;

        fn interpret(&self, node: Node, graph: &Graph, _: &Program, map: &mut AssumptionMap<Seen>) {
            let seen = map.join_incoming(graph, node);
            map.set_all(graph.out_edges(node), &Seen((seen.0 + 1).min(self.cap)));
        }

        fn direction(&self) -> Direction {
            self.direction
        }
    }

    impl IntegratedFlowFunction for Counter {
        type T = ToNop;

        fn interpret_or_replace(
            &self,
            node: Node,
            graph: &Graph,
            program: &Program,
            map: &mut AssumptionMap<Seen>,
        ) -> Interpretation<ToNop> {
            if graph.kind(node) == &self.target {
                return Interpretation::Replace(ToNop("counter"));
            }
            self.interpret(node, graph, program, map);
            Interpretation::Propagated
        }
    }

    impl Analysis for Counter {
        type F = Counter;

        fn flow_function(&self) -> &Counter {
            self
        }

        fn initial_assumption(&self) -> Seen {
            Seen(0)
        }
    }

    fn counter(cap: u32, target: NodeKind) -> Counter {
        Counter {
            cap,
            target,
            direction: Direction::Forward,
        }
    }

    fn program() -> (Program, crate::ir::Stmt) {
        let mut program = Program::new();
        let i = program.local("i", Type::Int);
        let one = program.int(1);
        let decl = program.decl(i, Some(one));
        let read = program.var_ref(i);
        let ret = program.ret(Some(read));
        let body = program.block(vec![decl, ret]);
        (program, body)
    }

    #[test]
    fn both_sides_are_solved() {
        let _ = env_logger::try_init();
        let (program, body) = program();
        let graph = CfgBuilder::build(&program, body).unwrap();
        let combined = Combined::new(counter(2, NodeKind::End), counter(100, NodeKind::End)).unwrap();
        let map = solve(&graph, &program, &combined);
        assert_eq!(
            map.dump(&graph, &program),
            vec![
                "BLOCK -> [* Seen(1) | Seen(1)]",
                "STMT -> [* Seen(2) | Seen(2)]",
                "WRITE(i, 1) -> [* Seen(2) | Seen(3)]",
                "STMT -> [* Seen(2) | Seen(4)]",
                "READ(i) -> [* Seen(2) | Seen(5)]",
                "GOTO -> [* Seen(2) | Seen(6)]",
                "END",
            ]
        );
    }

    #[test]
    fn first_proposal_wins() {
        let (program, body) = program();
        let graph = CfgBuilder::build(&program, body).unwrap();
        let goto = graph
            .nodes()
            .iter()
            .cloned()
            .find(|&n| graph.kind(n) == &NodeKind::Goto)
            .unwrap();
        let combined = Combined::new(counter(9, NodeKind::Goto), counter(9, NodeKind::Goto)).unwrap();
        let mut map = solve(&graph, &program, &combined);
        let _ = map.take_changed();
        let before = map.get(graph.out_edges(goto)[0]).cloned();
        match combined.interpret_or_replace(goto, &graph, &program, &mut map) {
            Interpretation::Replace(Either::First(ToNop(name))) => assert_eq!(name, "counter"),
            other => panic!("unexpected {:?}", other),
        }
        // A proposal leaves the facts alone.
        assert!(map.take_changed().is_empty());
        assert_eq!(map.get(graph.out_edges(goto)[0]).cloned(), before);

        // Only the second side asks: it gets its turn.
        let combined = Combined::new(counter(9, NodeKind::End), counter(9, NodeKind::Goto)).unwrap();
        assert!(matches!(
            combined.interpret_or_replace(goto, &graph, &program, &mut map),
            Interpretation::Replace(Either::Second(_))
        ));
    }

    #[test]
    fn directions_must_agree() {
        let backward = Counter {
            cap: 1,
            target: NodeKind::End,
            direction: Direction::Backward,
        };
        let err = Combined::new(counter(1, NodeKind::End), backward).err().unwrap();
        assert!(matches!(
            err.downcast_ref::<AnalysisError>(),
            Some(AnalysisError::Unsupported(_))
        ));
    }
}
