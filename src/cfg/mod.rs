//! Control-flow graphs over method bodies and expression fragments.
//!
//! A `Graph` is an arena of nodes and labeled edges plus an ordered
//! node sequence used for deterministic iteration. Edges normally
//! join two nodes; an edge with a missing endpoint is a graph-level
//! port of a fragment. Graphs produced by the builder never have
//! ports: a fragment is connected to its host only by `splice`.

use crate::declare_entity;
use crate::entity::{EntityVec, PerEntity};
use crate::errors::AnalysisError;
use crate::ir::{Expr, Stmt, Var};
use anyhow::{bail, Result};
use smallvec::SmallVec;

mod builder;
mod dump;
mod splice;

pub use builder::*;

declare_entity!(Node, "node");
declare_entity!(Edge, "edge");

/// Distinguishes multiple successors of one node.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum EdgeLabel {
    Then,
    Else,
    NoThrow,
    /// Taken when the source node throws a runtime exception.
    Throw,
}

impl std::fmt::Display for EdgeLabel {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        match self {
            EdgeLabel::Then => write!(f, "THEN"),
            EdgeLabel::Else => write!(f, "ELSE"),
            EdgeLabel::NoThrow => write!(f, "NOTHROW"),
            EdgeLabel::Throw => write!(f, "RE"),
        }
    }
}

/// The IR construct a node was built from.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum IrRef {
    None,
    Stmt(Stmt),
    Expr(Expr),
}

impl std::default::Default for IrRef {
    fn default() -> Self {
        IrRef::None
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub enum NodeKind {
    /// Read of a variable or field.
    Read(Var),
    /// Write of a value expression to a variable or field.
    Write(Var, Expr),
    /// Compound assignment or increment.
    ReadWrite(Var),
    /// A call (or constructor invocation); the expression is the call.
    MethodCall(Expr),
    Block,
    Statement,
    /// Branch on a condition, with THEN and ELSE successors.
    Conditional(Expr),
    Goto,
    /// The exceptional split before a call, with NOTHROW and RE
    /// successors.
    OptionalThrow(Expr),
    /// Method exit.
    End,
    /// Tail of an expression fragment whose root has no node of its own.
    Nop,
}

#[derive(Clone, Debug)]
pub struct NodeDef {
    pub kind: NodeKind,
    pub ir: IrRef,
    /// The innermost enclosing statement or block node.
    pub parent: Option<Node>,
}

#[derive(Clone, Debug)]
pub struct EdgeDef {
    /// Source node; `None` for a graph-level in-edge.
    pub from: Option<Node>,
    /// Target node; `None` for a graph-level out-edge.
    pub to: Option<Node>,
    pub label: Option<EdgeLabel>,
}

#[derive(Clone, Debug, Default)]
pub struct Graph {
    nodes: EntityVec<Node, NodeDef>,
    edges: EntityVec<Edge, EdgeDef>,
    /// Live nodes in iteration order.
    order: Vec<Node>,
    /// Set for nodes that were spliced out.
    removed: PerEntity<Node, bool>,
    in_edges: PerEntity<Node, SmallVec<[Edge; 2]>>,
    out_edges: PerEntity<Node, SmallVec<[Edge; 2]>>,
    graph_in_edges: Vec<Edge>,
    graph_out_edges: Vec<Edge>,
    /// First node to execute.
    pub entry: Option<Node>,
    /// Last node to execute: `End` for a method, the full expression's
    /// node for a fragment.
    pub exit: Option<Node>,
}

impl Graph {
    pub fn new() -> Graph {
        Graph::default()
    }

    /// Appends a node to the arena and to the end of the node order.
    pub fn add_node(&mut self, kind: NodeKind, ir: IrRef, parent: Option<Node>) -> Node {
        let node = self.nodes.push(NodeDef { kind, ir, parent });
        self.order.push(node);
        log::trace!("add_node: {} {:?}", node, self.nodes[node].kind);
        node
    }

    pub fn add_edge(&mut self, from: Node, to: Node, label: Option<EdgeLabel>) -> Edge {
        let edge = self.edges.push(EdgeDef {
            from: Some(from),
            to: Some(to),
            label,
        });
        self.out_edges[from].push(edge);
        self.in_edges[to].push(edge);
        log::trace!("add_edge: {} from {} to {} ({:?})", edge, from, to, label);
        edge
    }

    /// Adds a dangling edge entering `to` from outside the graph.
    pub fn add_graph_in_edge(&mut self, to: Node) -> Edge {
        let edge = self.edges.push(EdgeDef {
            from: None,
            to: Some(to),
            label: None,
        });
        self.in_edges[to].push(edge);
        self.graph_in_edges.push(edge);
        edge
    }

    /// Adds a dangling edge leaving `from` to outside the graph.
    pub fn add_graph_out_edge(&mut self, from: Node, label: Option<EdgeLabel>) -> Edge {
        let edge = self.edges.push(EdgeDef {
            from: Some(from),
            to: None,
            label,
        });
        self.out_edges[from].push(edge);
        self.graph_out_edges.push(edge);
        edge
    }

    /// Live nodes, in iteration order.
    pub fn nodes(&self) -> &[Node] {
        &self.order[..]
    }

    pub fn node(&self, node: Node) -> &NodeDef {
        &self.nodes[node]
    }

    pub fn kind(&self, node: Node) -> &NodeKind {
        &self.nodes[node].kind
    }

    pub fn edge(&self, edge: Edge) -> &EdgeDef {
        &self.edges[edge]
    }

    /// Number of edges ever allocated, including those of removed nodes.
    pub fn edge_count(&self) -> usize {
        self.edges.len()
    }

    pub fn in_edges(&self, node: Node) -> &[Edge] {
        &self.in_edges[node][..]
    }

    pub fn out_edges(&self, node: Node) -> &[Edge] {
        &self.out_edges[node][..]
    }

    pub fn graph_in_edges(&self) -> &[Edge] {
        &self.graph_in_edges[..]
    }

    pub fn graph_out_edges(&self) -> &[Edge] {
        &self.graph_out_edges[..]
    }

    pub fn is_live(&self, node: Node) -> bool {
        self.nodes.contains(node) && !self.removed[node]
    }

    /// Points every live node that refers to IR expression `old` at
    /// `new` instead, after the IR slot holding `old` was rewritten.
    /// These handles are a node's only mutable state. Returns the
    /// number of nodes updated.
    pub fn retarget_expr(&mut self, old: Expr, new: Expr) -> usize {
        let mut count = 0;
        for &node in &self.order {
            let def = &mut self.nodes[node];
            let mut hit = false;
            match &mut def.kind {
                NodeKind::Write(_, value) if *value == old => {
                    *value = new;
                    hit = true;
                }
                NodeKind::MethodCall(e) | NodeKind::Conditional(e) | NodeKind::OptionalThrow(e)
                    if *e == old =>
                {
                    *e = new;
                    hit = true;
                }
                _ => {}
            }
            if def.ir == IrRef::Expr(old) {
                def.ir = IrRef::Expr(new);
                hit = true;
            }
            if hit {
                log::trace!("retarget_expr: {} now refers to {}", node, new);
                count += 1;
            }
        }
        count
    }

    /// The nearest `Statement` node at or above `node` in the parent
    /// chain.
    pub fn find_containing_statement(&self, node: Node) -> Option<Node> {
        let mut cur = Some(node);
        while let Some(n) = cur {
            if self.nodes[n].kind == NodeKind::Statement {
                return Some(n);
            }
            cur = self.nodes[n].parent;
        }
        None
    }

    /// Checks that edge lists and edge endpoints agree, that every
    /// edge touches only live nodes and that the graph has no
    /// graph-level ports.
    pub fn verify(&self) -> Result<()> {
        if !self.graph_in_edges.is_empty() || !self.graph_out_edges.is_empty() {
            bail!(AnalysisError::Internal(format!(
                "{} graph in-edges and {} graph out-edges",
                self.graph_in_edges.len(),
                self.graph_out_edges.len()
            )));
        }
        for &node in &self.order {
            if self.removed[node] {
                bail!(AnalysisError::Internal(format!("removed {} still ordered", node)));
            }
            for &edge in self.in_edges(node) {
                if self.edges[edge].to != Some(node) {
                    bail!(AnalysisError::Internal(format!(
                        "{} listed as in-edge of {} but targets {:?}",
                        edge, node, self.edges[edge].to
                    )));
                }
            }
            for &edge in self.out_edges(node) {
                if self.edges[edge].from != Some(node) {
                    bail!(AnalysisError::Internal(format!(
                        "{} listed as out-edge of {} but leaves {:?}",
                        edge, node, self.edges[edge].from
                    )));
                }
            }
        }
        for (edge, def) in self.edges.entries() {
            for end in def.from.iter().chain(def.to.iter()) {
                if self.removed[*end] || !self.order.contains(end) {
                    bail!(AnalysisError::Internal(format!(
                        "{} touches dead {}",
                        edge, end
                    )));
                }
            }
        }
        if let Some(entry) = self.entry {
            if !self.is_live(entry) {
                bail!(AnalysisError::Internal(format!("entry {} is not live", entry)));
            }
        }
        Ok(())
    }

    fn ordered_position(&self, node: Node) -> Option<usize> {
        self.order.iter().position(|&n| n == node)
    }
}
