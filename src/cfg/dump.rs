//! Canonical textual form of a graph, one line per node.
//!
//! ```text
//! STMT -> [* {i = T}]
//! 1: READ(b) -> [* {i = T}]
//! COND (b) -> [THEN=* {i = T}, ELSE=2 {i = T}]
//! ```
//!
//! `*` marks an edge to the next node in order; any other target is
//! numbered, and the number prefixes the target's own line.

use super::{Edge, Graph, Node, NodeKind};
use crate::entity::PerEntity;
use crate::ir::Program;

impl Graph {
    /// Short description of a single node.
    pub fn node_text(&self, program: &Program, node: Node) -> String {
        match self.kind(node) {
            &NodeKind::Read(var) => format!("READ({})", program.var_name(var)),
            &NodeKind::Write(var, value) => format!(
                "WRITE({}, {})",
                program.var_name(var),
                program.display_expr(value)
            ),
            &NodeKind::ReadWrite(var) => format!("READWRITE({})", program.var_name(var)),
            &NodeKind::MethodCall(call) => {
                let callee = match &program.exprs[call] {
                    crate::ir::ExprDef::Call(method, ..) => program.methods[*method].name.clone(),
                    crate::ir::ExprDef::NewInstance(class) => format!("new {}", class),
                    _ => program.display_expr(call).to_string(),
                };
                format!("CALL({})", callee)
            }
            NodeKind::Block => "BLOCK".to_owned(),
            NodeKind::Statement => "STMT".to_owned(),
            &NodeKind::Conditional(cond) => format!("COND ({})", program.display_expr(cond)),
            NodeKind::Goto => "GOTO".to_owned(),
            &NodeKind::OptionalThrow(call) => {
                format!("OPTTHROW({})", program.display_expr(call))
            }
            NodeKind::End => "END".to_owned(),
            NodeKind::Nop => "NOP".to_owned(),
        }
    }

    /// Dumps every live node in order; `note` supplies the text shown
    /// after each edge (typically the edge's assumption).
    pub fn dump<F: Fn(Edge) -> Option<String>>(&self, program: &Program, note: F) -> Vec<String> {
        let order = self.nodes();
        let mut position: PerEntity<Node, Option<usize>> = PerEntity::default();
        for (i, &node) in order.iter().enumerate() {
            position[node] = Some(i);
        }

        let falls_through = |edge: Edge, i: usize| match self.edge(edge).to {
            Some(to) => position[to] == Some(i + 1),
            None => false,
        };

        let mut numbers: PerEntity<Node, Option<usize>> = PerEntity::default();
        let mut jumped_to = vec![false; order.len()];
        for (i, &node) in order.iter().enumerate() {
            for &edge in self.out_edges(node) {
                if !falls_through(edge, i) {
                    if let Some(target) = self.edge(edge).to.and_then(|to| position[to]) {
                        jumped_to[target] = true;
                    }
                }
            }
        }
        let mut next_number = 1;
        for (i, &node) in order.iter().enumerate() {
            if jumped_to[i] {
                numbers[node] = Some(next_number);
                next_number += 1;
            }
        }

        let mut lines = vec![];
        for (i, &node) in order.iter().enumerate() {
            let mut line = String::new();
            if let Some(number) = numbers[node] {
                line.push_str(&format!("{}: ", number));
            }
            line.push_str(&self.node_text(program, node));

            let edges = self
                .out_edges(node)
                .iter()
                .map(|&edge| {
                    let def = self.edge(edge);
                    let mut text = String::new();
                    if let Some(label) = def.label {
                        text.push_str(&format!("{}=", label));
                    }
                    if falls_through(edge, i) {
                        text.push('*');
                    } else {
                        match def.to.and_then(|to| numbers[to]) {
                            Some(number) => text.push_str(&number.to_string()),
                            None => text.push('?'),
                        }
                    }
                    if let Some(note) = note(edge) {
                        text.push(' ');
                        text.push_str(&note);
                    }
                    text
                })
                .collect::<Vec<_>>();
            if !edges.is_empty() {
                line.push_str(&format!(" -> [{}]", edges.join(", ")));
            }
            lines.push(line);
        }
        lines
    }
}
