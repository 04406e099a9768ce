//! Inline-variable analysis: copy and value propagation.
//!
//! Tracks, for every local and parameter, the expression it is known
//! to hold. A read of a variable with a known value is replaced by a
//! copy of that expression.
//!
//! Without alias analysis any write may change what a tracked value
//! expression evaluates to, so every write forgets everything known
//! about every other variable.

use crate::cfg::{CfgBuilder, Graph, IrRef, Node, NodeKind};
use crate::errors::AnalysisError;
use crate::ir::{Expr, Program, Var};
use crate::oracle::SideEffectOracle;
use crate::pass::{
    Analysis, Assumption, AssumptionMap, FlowFunction, IntegratedFlowFunction, Interpretation,
    Transformation,
};
use anyhow::{bail, Result};
use fxhash::FxHashMap;

/// Known value of each tracked variable. `None` is ⊤: the variable is
/// tracked but its value is not known. An absent variable joins as ⊤.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct InlineVarAssumption {
    values: FxHashMap<Var, Option<Expr>>,
}

impl InlineVarAssumption {
    pub fn new() -> Self {
        Self::default()
    }

    /// The expression `var` is known to hold, if any.
    pub fn value(&self, var: Var) -> Option<Expr> {
        self.values.get(&var).cloned().flatten()
    }

    /// Is `var` tracked but unknown?
    pub fn is_top(&self, var: Var) -> bool {
        matches!(self.values.get(&var), Some(None))
    }

    pub fn set_value(&mut self, var: Var, value: Expr) {
        self.values.insert(var, Some(value));
    }

    pub fn kill(&mut self, var: Var) {
        self.values.insert(var, None);
    }

    pub fn kill_all(&mut self) {
        for value in self.values.values_mut() {
            *value = None;
        }
    }
}

impl Assumption for InlineVarAssumption {
    fn join(&self, other: &Self) -> Self {
        let mut values = FxHashMap::default();
        for &var in self.values.keys().chain(other.values.keys()) {
            let joined = match (self.values.get(&var), other.values.get(&var)) {
                (Some(Some(a)), Some(Some(b))) if a == b => Some(*a),
                _ => None,
            };
            values.insert(var, joined);
        }
        InlineVarAssumption { values }
    }

    /// `{a = <expr>, b = T}`, sorted by variable name.
    fn describe(&self, program: &Program) -> String {
        let mut entries = self
            .values
            .iter()
            .map(|(&var, value)| {
                let value = match value {
                    Some(expr) => program.display_expr(*expr).to_string(),
                    None => "T".to_owned(),
                };
                (program.var_name(var).to_owned(), var, value)
            })
            .collect::<Vec<_>>();
        entries.sort();
        let entries = entries
            .into_iter()
            .map(|(name, _, value)| format!("{} = {}", name, value))
            .collect::<Vec<_>>();
        format!("{{{}}}", entries.join(", "))
    }
}

pub struct InlineVarFlowFunction<'a> {
    oracle: &'a dyn SideEffectOracle,
}

impl<'a> InlineVarFlowFunction<'a> {
    pub fn new(oracle: &'a dyn SideEffectOracle) -> Self {
        InlineVarFlowFunction { oracle }
    }

    /// Can `value` stand in for `var` at later reads? Literals qualify
    /// like any other pure value, so constants are propagated too.
    fn is_inlinable(&self, program: &Program, var: Var, value: Expr) -> bool {
        !self.oracle.may_have_side_effects(program, value)
            && !program.contains_allocation(value)
            && !program.references_var(value, var)
    }

    fn transfer(&self, node: Node, graph: &Graph, program: &Program, fact: &mut InlineVarAssumption) {
        match graph.kind(node) {
            &NodeKind::Write(var, value) => {
                let trackable = self.oracle.is_trackable(program, var);
                if trackable {
                    fact.kill(var);
                }
                for (&other, known) in fact.values.iter_mut() {
                    if other != var {
                        *known = None;
                    }
                }
                if trackable && self.is_inlinable(program, var, value) {
                    fact.set_value(var, value);
                }
            }
            &NodeKind::MethodCall(call) => {
                if self.oracle.call_has_side_effects(program, call) {
                    fact.kill_all();
                }
            }
            NodeKind::ReadWrite(_) => fact.kill_all(),
            NodeKind::Read(_)
            | NodeKind::Block
            | NodeKind::Statement
            | NodeKind::Conditional(_)
            | NodeKind::Goto
            | NodeKind::OptionalThrow(_)
            | NodeKind::End
            | NodeKind::Nop => {}
        }
    }
}

impl<'a> FlowFunction for InlineVarFlowFunction<'a> {
    type A = InlineVarAssumption;

    fn interpret(
        &self,
        node: Node,
        graph: &Graph,
        program: &Program,
        map: &mut AssumptionMap<InlineVarAssumption>,
    ) {
        let mut fact = map.join_incoming(graph, node);
        self.transfer(node, graph, program, &mut fact);
        map.set_all(graph.out_edges(node), &fact);
    }
}

impl<'a> IntegratedFlowFunction for InlineVarFlowFunction<'a> {
    type T = InlineVarTransformation;

    fn interpret_or_replace(
        &self,
        node: Node,
        graph: &Graph,
        program: &Program,
        map: &mut AssumptionMap<InlineVarAssumption>,
    ) -> Interpretation<InlineVarTransformation> {
        let mut fact = map.join_incoming(graph, node);
        if let (&NodeKind::Read(var), IrRef::Expr(read)) = (graph.kind(node), graph.node(node).ir) {
            if let Some(value) = fact.value(var) {
                log::trace!(
                    "interpret_or_replace: {} reads {} = {}",
                    node,
                    program.var_name(var),
                    program.display_expr(value)
                );
                return Interpretation::Replace(InlineVarTransformation {
                    read,
                    value,
                    replacement: None,
                });
            }
        }
        self.transfer(node, graph, program, &mut fact);
        map.set_all(graph.out_edges(node), &fact);
        Interpretation::Propagated
    }
}

/// Replaces the read expression `read` by a fresh copy of `value`.
#[derive(Clone, Debug)]
pub struct InlineVarTransformation {
    read: Expr,
    value: Expr,
    /// The copy, once `transform` has placed it.
    replacement: Option<Expr>,
}

impl Transformation for InlineVarTransformation {
    fn transform(&mut self, node: Node, graph: &mut Graph, program: &mut Program) -> Result<()> {
        let stmt_node = match graph.find_containing_statement(node) {
            Some(stmt_node) => stmt_node,
            None => bail!(AnalysisError::MissingStatement(format!(
                "no statement encloses {}",
                node
            ))),
        };
        let stmt = match graph.node(stmt_node).ir {
            IrRef::Stmt(stmt) => stmt,
            other => bail!(AnalysisError::MissingStatement(format!(
                "{} refers to {:?}, not a statement",
                stmt_node, other
            ))),
        };

        let copy = program.clone_expr(self.value);
        let substitutions = program.replace_expr(stmt, self.read, copy);
        if substitutions != 1 {
            bail!(AnalysisError::UnchangedTarget(format!(
                "{} substitutions of {} in {}",
                substitutions, self.read, stmt
            )));
        }
        graph.retarget_expr(self.read, copy);
        log::debug!(
            "inline_var: {} in {} now reads {}",
            self.read,
            stmt,
            program.display_expr(copy)
        );
        self.replacement = Some(copy);
        Ok(())
    }

    fn new_subgraph(&self, program: &Program) -> Result<Graph> {
        match self.replacement {
            Some(copy) => CfgBuilder::build_expression(program, copy),
            None => bail!(AnalysisError::Internal(
                "replacement subgraph requested before transform".to_owned()
            )),
        }
    }
}

pub struct InlineVarAnalysis<'a> {
    flow: InlineVarFlowFunction<'a>,
}

impl<'a> InlineVarAnalysis<'a> {
    pub fn new(oracle: &'a dyn SideEffectOracle) -> Self {
        InlineVarAnalysis {
            flow: InlineVarFlowFunction::new(oracle),
        }
    }
}

impl<'a> Analysis for InlineVarAnalysis<'a> {
    type F = InlineVarFlowFunction<'a>;

    fn flow_function(&self) -> &InlineVarFlowFunction<'a> {
        &self.flow
    }

    fn initial_assumption(&self) -> InlineVarAssumption {
        InlineVarAssumption::new()
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::ir::{BinaryOp, Type};
    use crate::oracle::MethodOracle;
    use crate::pass::{solve, solve_integrated, SolverOptions};

    struct Fixture {
        program: Program,
        x: Var,
        f: Var,
        i: Var,
        j: Var,
    }

    impl Fixture {
        fn new() -> Fixture {
            let mut program = Program::new();
            let x = program.param("x", Type::Class("Foo".to_owned()));
            let f = program.field("f", Type::Int);
            let i = program.local("i", Type::Int);
            let j = program.local("j", Type::Int);
            Fixture { program, x, f, i, j }
        }

        /// `x.f + 1`
        fn x_f_plus_one(&mut self) -> Expr {
            let x = self.program.var_ref(self.x);
            let field = self.program.field_ref(x, self.f);
            let one = self.program.int(1);
            self.program.binary(BinaryOp::Add, field, one)
        }

        fn graph(&self, body: crate::ir::Stmt) -> Graph {
            CfgBuilder::build(&self.program, body).unwrap()
        }
    }

    fn dump(graph: &Graph, program: &Program) -> Vec<String> {
        let analysis = InlineVarAnalysis::new(&MethodOracle);
        solve(graph, program, &analysis).dump(graph, program)
    }

    #[test]
    fn write_records_value() {
        let _ = env_logger::try_init();
        let mut t = Fixture::new();
        let value = t.x_f_plus_one();
        let decl = t.program.decl(t.i, Some(value));
        let read = t.program.var_ref(t.i);
        let ret = t.program.ret(Some(read));
        let body = t.program.block(vec![decl, ret]);

        let graph = t.graph(body);
        assert_eq!(
            dump(&graph, &t.program),
            vec![
                "BLOCK -> [* {}]",
                "STMT -> [* {}]",
                "READ(x) -> [* {}]",
                "READ(f) -> [* {}]",
                "WRITE(i, x.f + 1) -> [* {i = x.f + 1}]",
                "STMT -> [* {i = x.f + 1}]",
                "READ(i) -> [* {i = x.f + 1}]",
                "GOTO -> [* {i = x.f + 1}]",
                "END",
            ]
        );
    }

    #[test]
    fn side_effecting_call_kills_everything() {
        let _ = env_logger::try_init();
        let mut t = Fixture::new();
        let foo = t.program.method("foo", Type::Void, false);
        let value = t.x_f_plus_one();
        let decl = t.program.decl(t.i, Some(value));
        let call = t.program.call(foo, None, vec![]);
        let call_stmt = t.program.expr_stmt(call);
        let read = t.program.var_ref(t.i);
        let ret = t.program.ret(Some(read));
        let body = t.program.block(vec![decl, call_stmt, ret]);

        let graph = t.graph(body);
        assert_eq!(
            dump(&graph, &t.program),
            vec![
                "BLOCK -> [* {}]",
                "STMT -> [* {}]",
                "READ(x) -> [* {}]",
                "READ(f) -> [* {}]",
                "WRITE(i, x.f + 1) -> [* {i = x.f + 1}]",
                "STMT -> [* {i = x.f + 1}]",
                "OPTTHROW(foo()) -> [NOTHROW=* {i = x.f + 1}, RE=1 {i = x.f + 1}]",
                "CALL(foo) -> [* {i = T}]",
                "STMT -> [* {i = T}]",
                "READ(i) -> [* {i = T}]",
                "GOTO -> [* {i = T}]",
                "1: END",
            ]
        );
    }

    #[test]
    fn pure_call_keeps_facts() {
        let mut t = Fixture::new();
        let abs = t.program.method("abs", Type::Int, true);
        let value = t.x_f_plus_one();
        let decl = t.program.decl(t.i, Some(value));
        let arg = t.program.int(3);
        let call = t.program.call(abs, None, vec![arg]);
        let call_stmt = t.program.expr_stmt(call);
        let body = t.program.block(vec![decl, call_stmt]);

        let graph = t.graph(body);
        let lines = dump(&graph, &t.program);
        assert_eq!(lines[7], "CALL(abs) -> [* {i = x.f + 1}]");
    }

    #[test]
    fn values_that_cannot_be_copied_are_not_recorded() {
        let mut t = Fixture::new();
        let foo = t.program.method("createFoo", Type::Class("Foo".to_owned()), false);
        let call = t.program.call(foo, None, vec![]);
        let from_call = t.program.decl(t.x, Some(call));
        let alloc = t.program.add_expr(crate::ir::ExprDef::NewInstance("Foo".to_owned()));
        let from_alloc = t.program.decl(t.x, Some(alloc));
        let i = t.program.var_ref(t.i);
        let one = t.program.int(1);
        let self_ref = t.program.binary(BinaryOp::Add, i, one);
        let from_self = t.program.decl(t.i, Some(self_ref));
        let body = t.program.block(vec![from_call, from_alloc, from_self]);

        let graph = t.graph(body);
        let analysis = InlineVarAnalysis::new(&MethodOracle);
        let map = solve(&graph, &t.program, &analysis);
        let writes = graph
            .nodes()
            .iter()
            .cloned()
            .filter(|&n| matches!(graph.kind(n), NodeKind::Write(..)))
            .collect::<Vec<_>>();
        assert_eq!(writes.len(), 3);
        for write in writes {
            let out = graph.out_edges(write)[0];
            let fact = map.get(out).unwrap();
            assert!(fact.values.values().all(|v| v.is_none()), "{:?}", fact);
        }
    }

    #[test]
    fn field_write_kills_tracked_values() {
        let mut t = Fixture::new();
        let value = t.x_f_plus_one();
        let decl = t.program.decl(t.i, Some(value));
        let x = t.program.var_ref(t.x);
        let target = t.program.field_ref(x, t.f);
        let two = t.program.int(2);
        let assign = t.program.assign(target, two);
        let store = t.program.expr_stmt(assign);
        let body = t.program.block(vec![decl, store]);

        let graph = t.graph(body);
        let lines = dump(&graph, &t.program);
        assert_eq!(lines[7], "WRITE(f, 2) -> [* {i = T}]");
    }

    #[test]
    fn join_is_a_flat_lattice() {
        let mut t = Fixture::new();
        let e1 = t.x_f_plus_one();
        let e2 = t.x_f_plus_one();

        let mut a = InlineVarAssumption::new();
        a.set_value(t.i, e1);
        a.set_value(t.j, e1);
        let mut b = InlineVarAssumption::new();
        b.set_value(t.i, e1);
        b.set_value(t.j, e2);
        let mut c = InlineVarAssumption::new();
        c.kill(t.j);
        let empty = InlineVarAssumption::new();

        let ab = a.join(&b);
        assert_eq!(ab.value(t.i), Some(e1));
        assert!(ab.is_top(t.j));
        assert_eq!(ab, b.join(&a));
        assert_eq!(a.join(&a), a);

        assert_eq!(a.join(&b).join(&c), a.join(&b.join(&c)));
        assert_eq!(a.join(&c).join(&b), c.join(&b).join(&a));

        // Absent on one side joins like ⊤.
        let a_empty = a.join(&empty);
        assert!(a_empty.is_top(t.i));
        assert!(a_empty.is_top(t.j));
        assert_eq!(a_empty.join(&a), a_empty);
        assert_eq!(a_empty.describe(&t.program), "{i = T, j = T}");
    }

    /// `int i = 0; int j = 0; while (b) { j = i + 2; i = j + 1; } return i;`
    fn loop_body(t: &mut Fixture) -> (crate::ir::Stmt, Var) {
        let b = t.program.param("b", Type::Boolean);
        let zero = t.program.int(0);
        let init_i = t.program.decl(t.i, Some(zero));
        let zero = t.program.int(0);
        let init_j = t.program.decl(t.j, Some(zero));

        let j = t.program.var_ref(t.j);
        let i = t.program.var_ref(t.i);
        let two = t.program.int(2);
        let i_plus_2 = t.program.binary(BinaryOp::Add, i, two);
        let set_j = t.program.assign(j, i_plus_2);
        let set_j = t.program.expr_stmt(set_j);

        let i = t.program.var_ref(t.i);
        let j = t.program.var_ref(t.j);
        let one = t.program.int(1);
        let j_plus_1 = t.program.binary(BinaryOp::Add, j, one);
        let set_i = t.program.assign(i, j_plus_1);
        let set_i = t.program.expr_stmt(set_i);

        let cond = t.program.var_ref(b);
        let body = t.program.block(vec![set_j, set_i]);
        let looped = t.program.while_stmt(cond, body);
        let i = t.program.var_ref(t.i);
        let ret = t.program.ret(Some(i));
        (t.program.block(vec![init_i, init_j, looped, ret]), b)
    }

    #[test]
    fn loop_header_sees_both_predecessors() {
        let _ = env_logger::try_init();
        let mut t = Fixture::new();
        let (body, b) = loop_body(&mut t);
        let graph = t.graph(body);
        let analysis = InlineVarAnalysis::new(&MethodOracle);
        let mut map = solve(&graph, &t.program, &analysis);

        let header = graph
            .nodes()
            .iter()
            .cloned()
            .find(|&n| graph.kind(n) == &NodeKind::Read(b))
            .unwrap();
        let fact = map.join_incoming(&graph, header);
        assert!(fact.is_top(t.i));
        assert!(fact.is_top(t.j));

        // Converged facts are stable.
        let flow = InlineVarFlowFunction::new(&MethodOracle);
        let updates = crate::pass::propagate(&graph, &t.program, &flow, &mut map, graph.nodes());
        assert_eq!(updates, 0);
    }

    /// Counts out-edge facts that go from ⊤ back to a known value.
    struct Watched<'a> {
        inner: InlineVarFlowFunction<'a>,
        tops: std::cell::Cell<usize>,
        regressions: std::cell::Cell<usize>,
    }

    impl<'a> FlowFunction for Watched<'a> {
        type A = InlineVarAssumption;

        fn interpret(
            &self,
            node: Node,
            graph: &Graph,
            program: &Program,
            map: &mut AssumptionMap<InlineVarAssumption>,
        ) {
            let before = graph
                .out_edges(node)
                .iter()
                .map(|&edge| map.get(edge).cloned())
                .collect::<Vec<_>>();
            self.inner.interpret(node, graph, program, map);
            for (&edge, before) in graph.out_edges(node).iter().zip(before) {
                let (before, after) = match (before, map.get(edge)) {
                    (Some(before), Some(after)) => (before, after),
                    _ => continue,
                };
                for (&var, known) in &before.values {
                    if known.is_none() {
                        self.tops.set(self.tops.get() + 1);
                        if after.value(var).is_some() {
                            self.regressions.set(self.regressions.get() + 1);
                        }
                    }
                }
            }
        }
    }

    #[test]
    fn top_stays_top_while_solving() {
        let _ = env_logger::try_init();
        let mut t = Fixture::new();
        let (body, _) = loop_body(&mut t);
        let graph = t.graph(body);
        let watched = Watched {
            inner: InlineVarFlowFunction::new(&MethodOracle),
            tops: Default::default(),
            regressions: Default::default(),
        };
        let mut map = AssumptionMap::new(InlineVarAssumption::new());
        crate::pass::propagate(&graph, &t.program, &watched, &mut map, graph.nodes());
        assert!(watched.tops.get() > 0);
        assert_eq!(watched.regressions.get(), 0);
    }

    #[test]
    fn loop_rewrites_only_inside_the_body() {
        let _ = env_logger::try_init();
        let mut t = Fixture::new();
        let (body, _) = loop_body(&mut t);
        let method = t.program.method("test", Type::Int, false);
        t.program.set_body(method, body);
        let mut graph = t.graph(body);
        let analysis = InlineVarAnalysis::new(&MethodOracle);
        let mut options = SolverOptions {
            verify: true,
            ..SolverOptions::default()
        };

        let changed = solve_integrated(&mut graph, &mut t.program, &analysis, &mut options).unwrap();
        assert!(changed);
        assert_eq!(
            t.program.body_lines(method),
            vec![
                "int i = 0;",
                "int j = 0;",
                "while (b) {",
                "  j = i + 2;",
                "  i = i + 2 + 1;",
                "}",
                "return i;",
            ]
        );
        graph.verify().unwrap();
    }

    #[test]
    fn linear_read_is_inlined() {
        let _ = env_logger::try_init();
        let mut t = Fixture::new();
        let value = t.x_f_plus_one();
        let decl = t.program.decl(t.i, Some(value));
        let read = t.program.var_ref(t.i);
        let ret = t.program.ret(Some(read));
        let body = t.program.block(vec![decl, ret]);
        let method = t.program.method("test", Type::Int, false);
        t.program.set_body(method, body);

        let mut graph = t.graph(body);
        let analysis = InlineVarAnalysis::new(&MethodOracle);
        let mut options = SolverOptions::default();
        assert!(solve_integrated(&mut graph, &mut t.program, &analysis, &mut options).unwrap());
        assert_eq!(
            t.program.body_lines(method),
            vec!["int i = x.f + 1;", "return x.f + 1;"]
        );

        // The graph now reads the copy's operands where `i` was read.
        let kinds = graph
            .nodes()
            .iter()
            .map(|&n| graph.kind(n).clone())
            .collect::<Vec<_>>();
        assert_eq!(&kinds[5..8], &[NodeKind::Statement, NodeKind::Read(t.x), NodeKind::Read(t.f)]);
        assert_eq!(kinds[8], NodeKind::Nop);
        graph.verify().unwrap();
    }

    #[test]
    fn fuel_bounds_rewrites() {
        let mut t = Fixture::new();
        let value = t.x_f_plus_one();
        let decl = t.program.decl(t.i, Some(value));
        let read = t.program.var_ref(t.i);
        let ret = t.program.ret(Some(read));
        let body = t.program.block(vec![decl, ret]);
        let method = t.program.method("test", Type::Int, false);
        t.program.set_body(method, body);

        let mut graph = t.graph(body);
        let analysis = InlineVarAnalysis::new(&MethodOracle);
        let mut options = SolverOptions {
            fuel: crate::pass::Fuel::limited(0),
            verify: true,
        };
        assert!(!solve_integrated(&mut graph, &mut t.program, &analysis, &mut options).unwrap());
        assert_eq!(t.program.body_lines(method), vec!["int i = x.f + 1;", "return i;"]);
    }
}
