//! Lowering IR to a CFG.
//!
//! Statements are lowered into a STMT (or BLOCK) node followed by the
//! nodes of their expressions in evaluation order. Only operations an
//! analysis can observe get nodes of their own: reads, writes,
//! read-writes, calls, branches and jumps.

use super::{EdgeLabel, Graph, IrRef, Node, NodeKind};
use crate::errors::AnalysisError;
use crate::ir::{Expr, ExprDef, Method, Program, Stmt, StmtDef, Var};
use anyhow::{bail, Result};
use smallvec::{smallvec, SmallVec};

/// Edges waiting for the next node to be added.
type Pending = SmallVec<[(Node, Option<EdgeLabel>); 2]>;

pub struct CfgBuilder<'a> {
    program: &'a Program,
    graph: Graph,
    /// Building an expression fragment rather than a method body.
    fragment: bool,
    pending: Pending,
    /// Edges that jump to the method's END node.
    to_end: Vec<(Node, Option<EdgeLabel>)>,
    /// Innermost enclosing statement or block node.
    parent: Option<Node>,
}

impl<'a> CfgBuilder<'a> {
    fn new(program: &'a Program, fragment: bool) -> Self {
        CfgBuilder {
            program,
            graph: Graph::new(),
            fragment,
            pending: smallvec![],
            to_end: vec![],
            parent: None,
        }
    }

    /// Builds the CFG of a method body. The graph starts at the body's
    /// BLOCK node and ends at a single END node.
    pub fn build(program: &'a Program, body: Stmt) -> Result<Graph> {
        let mut builder = CfgBuilder::new(program, false);
        builder.stmt(body)?;
        let end = builder.add(NodeKind::End, IrRef::None);
        for (from, label) in std::mem::take(&mut builder.to_end) {
            builder.graph.add_edge(from, end, label);
        }
        builder.graph.exit = Some(end);
        log::debug!(
            "build: {} nodes, {} edges",
            builder.graph.nodes().len(),
            builder.graph.edge_count()
        );
        Ok(builder.graph)
    }

    /// Builds the CFG of a method, which must have a body.
    pub fn build_method(program: &'a Program, method: Method) -> Result<Graph> {
        match program.methods[method].body {
            Some(body) => Self::build(program, body),
            None => bail!(AnalysisError::Unsupported(format!(
                "{} has no body",
                program.methods[method].name
            ))),
        }
    }

    /// Builds a fragment for a single expression: a linear chain from
    /// the first evaluated subexpression's node to the node of the
    /// whole expression, with no graph-level ports. Calls get no
    /// exceptional successors inside a fragment.
    pub fn build_expression(program: &'a Program, expr: Expr) -> Result<Graph> {
        let mut builder = CfgBuilder::new(program, true);
        builder.expr(expr)?;
        let last = builder.graph.nodes().last().cloned();
        let tail_is_root = last.map_or(false, |node| {
            builder.graph.node(node).ir == IrRef::Expr(expr)
        });
        if !tail_is_root {
            builder.add(NodeKind::Nop, IrRef::Expr(expr));
        }
        builder.graph.exit = builder.graph.nodes().last().cloned();
        Ok(builder.graph)
    }

    /// Adds a node, connecting every pending edge to it; the node's
    /// fallthrough edge becomes the only pending edge.
    fn add(&mut self, kind: NodeKind, ir: IrRef) -> Node {
        let node = self.graph.add_node(kind, ir, self.parent);
        if self.graph.entry.is_none() {
            self.graph.entry = Some(node);
        }
        for (from, label) in std::mem::take(&mut self.pending) {
            self.graph.add_edge(from, node, label);
        }
        self.pending = smallvec![(node, None)];
        node
    }

    fn stmt(&mut self, stmt: Stmt) -> Result<()> {
        let program = self.program;
        let saved_parent = self.parent;
        match &program.stmts[stmt] {
            StmtDef::Block(stmts) => {
                let block = self.add(NodeKind::Block, IrRef::Stmt(stmt));
                self.parent = Some(block);
                for &child in stmts {
                    self.stmt(child)?;
                }
            }
            &StmtDef::Decl(var, init) => {
                let node = self.add(NodeKind::Statement, IrRef::Stmt(stmt));
                self.parent = Some(node);
                if let Some(init) = init {
                    self.expr(init)?;
                    self.add(NodeKind::Write(var, init), IrRef::Stmt(stmt));
                }
            }
            &StmtDef::Expr(expr) => {
                let node = self.add(NodeKind::Statement, IrRef::Stmt(stmt));
                self.parent = Some(node);
                self.expr(expr)?;
            }
            &StmtDef::If(cond, then, els) => {
                let node = self.add(NodeKind::Statement, IrRef::Stmt(stmt));
                self.parent = Some(node);
                self.expr(cond)?;
                let branch = self.add(NodeKind::Conditional(cond), IrRef::Stmt(stmt));
                self.pending = smallvec![(branch, Some(EdgeLabel::Then))];
                self.stmt(then)?;
                let after_then = std::mem::take(&mut self.pending);
                self.pending = smallvec![(branch, Some(EdgeLabel::Else))];
                if let Some(els) = els {
                    self.stmt(els)?;
                }
                self.pending.extend(after_then);
            }
            &StmtDef::While(cond, body) => {
                let node = self.add(NodeKind::Statement, IrRef::Stmt(stmt));
                self.parent = Some(node);
                let header_index = self.graph.nodes().len();
                self.expr(cond)?;
                let branch = self.add(NodeKind::Conditional(cond), IrRef::Stmt(stmt));
                let header = self.graph.nodes()[header_index];
                self.pending = smallvec![(branch, Some(EdgeLabel::Then))];
                self.stmt(body)?;
                for (from, label) in std::mem::take(&mut self.pending) {
                    self.graph.add_edge(from, header, label);
                }
                self.pending = smallvec![(branch, Some(EdgeLabel::Else))];
            }
            &StmtDef::Return(value) => {
                if self.fragment {
                    bail!(AnalysisError::Unsupported(
                        "return inside an expression fragment".to_owned()
                    ));
                }
                let node = self.add(NodeKind::Statement, IrRef::Stmt(stmt));
                self.parent = Some(node);
                if let Some(value) = value {
                    self.expr(value)?;
                }
                let goto = self.add(NodeKind::Goto, IrRef::Stmt(stmt));
                self.to_end.push((goto, None));
                self.pending.clear();
            }
        }
        self.parent = saved_parent;
        Ok(())
    }

    fn expr(&mut self, expr: Expr) -> Result<()> {
        let program = self.program;
        match &program.exprs[expr] {
            ExprDef::Int(_) | ExprDef::Bool(_) | ExprDef::Null => {}
            &ExprDef::VarRef(var) => {
                self.add(NodeKind::Read(var), IrRef::Expr(expr));
            }
            &ExprDef::FieldRef(instance, field) => {
                self.expr(instance)?;
                self.add(NodeKind::Read(field), IrRef::Expr(expr));
            }
            &ExprDef::Unary(_, operand) => self.expr(operand)?,
            &ExprDef::Binary(_, lhs, rhs) => {
                self.expr(lhs)?;
                self.expr(rhs)?;
            }
            &ExprDef::Assign(lhs, rhs) => {
                let var = self.lvalue(lhs)?;
                self.expr(rhs)?;
                self.add(NodeKind::Write(var, rhs), IrRef::Expr(expr));
            }
            &ExprDef::CompoundAssign(_, lhs, rhs) => {
                let var = self.lvalue(lhs)?;
                self.expr(rhs)?;
                self.add(NodeKind::ReadWrite(var), IrRef::Expr(expr));
            }
            &ExprDef::Increment(_, lhs) => {
                let var = self.lvalue(lhs)?;
                self.add(NodeKind::ReadWrite(var), IrRef::Expr(expr));
            }
            ExprDef::Call(_, instance, args) => {
                if let Some(instance) = instance {
                    self.expr(*instance)?;
                }
                for &arg in args {
                    self.expr(arg)?;
                }
                self.call(expr);
            }
            ExprDef::NewInstance(_) => self.call(expr),
            &ExprDef::NewArray(_, size) => self.expr(size)?,
        }
        Ok(())
    }

    /// Lowers the instance part of an assignment target and returns
    /// the variable written.
    fn lvalue(&mut self, lhs: Expr) -> Result<Var> {
        let program = self.program;
        match program.exprs[lhs] {
            ExprDef::VarRef(var) => Ok(var),
            ExprDef::FieldRef(instance, field) => {
                self.expr(instance)?;
                Ok(field)
            }
            ref other => bail!(AnalysisError::Unsupported(format!(
                "assignment target {:?}",
                other
            ))),
        }
    }

    fn call(&mut self, call: Expr) {
        if !self.fragment {
            let split = self.add(NodeKind::OptionalThrow(call), IrRef::Expr(call));
            self.to_end.push((split, Some(EdgeLabel::Throw)));
            self.pending = smallvec![(split, Some(EdgeLabel::NoThrow))];
        }
        self.add(NodeKind::MethodCall(call), IrRef::Expr(call));
    }
}
