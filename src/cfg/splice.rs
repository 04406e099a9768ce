//! Grafting a self-contained fragment into a live graph.

use super::{Graph, Node, NodeDef};
use crate::entity::PerEntity;
use crate::errors::AnalysisError;
use anyhow::{bail, Result};

impl Graph {
    /// Replaces `node` with `fragment`.
    ///
    /// The fragment must have no graph-level ports. Every edge that
    /// entered `node` is redirected to the fragment's entry and every
    /// edge that left it now leaves the fragment's exit; those edges
    /// keep their identity and labels, so facts attached to them
    /// survive. The fragment's nodes take `node`'s place in the node
    /// order, and those without a parent inherit `node`'s parent.
    ///
    /// Returns the newly inserted nodes in order.
    pub fn splice(&mut self, node: Node, fragment: Graph) -> Result<Vec<Node>> {
        if !self.is_live(node) {
            bail!(AnalysisError::StaleNode(format!(
                "cannot replace {}: not in graph",
                node
            )));
        }
        if !fragment.graph_in_edges.is_empty() || !fragment.graph_out_edges.is_empty() {
            bail!(AnalysisError::DanglingPorts(format!(
                "fragment has {} graph in-edges and {} graph out-edges",
                fragment.graph_in_edges.len(),
                fragment.graph_out_edges.len()
            )));
        }
        let (frag_entry, frag_exit) = match (fragment.entry, fragment.exit) {
            (Some(entry), Some(exit)) => (entry, exit),
            _ => bail!(AnalysisError::DanglingPorts(
                "fragment has no entry or exit node".to_owned()
            )),
        };
        let position = match self.ordered_position(node) {
            Some(position) => position,
            None => bail!(AnalysisError::StaleNode(format!("{} is not ordered", node))),
        };
        let parent = self.nodes[node].parent;

        let mut mapping: PerEntity<Node, Option<Node>> = PerEntity::default();
        let mut inserted = Vec::with_capacity(fragment.order.len());
        for &frag_node in &fragment.order {
            let def = &fragment.nodes[frag_node];
            let new_node = self.nodes.push(NodeDef {
                kind: def.kind.clone(),
                ir: def.ir,
                parent: def.parent,
            });
            mapping[frag_node] = Some(new_node);
            inserted.push(new_node);
        }
        for &new_node in &inserted {
            let frag_parent = self.nodes[new_node].parent;
            self.nodes[new_node].parent = match frag_parent {
                Some(p) => mapping[p].or(parent),
                None => parent,
            };
        }
        for def in fragment.edges.values() {
            if let (Some(from), Some(to)) = (def.from, def.to) {
                if let (Some(from), Some(to)) = (mapping[from], mapping[to]) {
                    self.add_edge(from, to, def.label);
                }
            }
        }

        let (entry, exit) = match (mapping[frag_entry], mapping[frag_exit]) {
            (Some(entry), Some(exit)) => (entry, exit),
            _ => bail!(AnalysisError::Internal(
                "fragment entry or exit is not an ordered node".to_owned()
            )),
        };

        let incoming = std::mem::take(&mut self.in_edges[node]);
        for &edge in &incoming {
            self.edges[edge].to = Some(entry);
            self.in_edges[entry].push(edge);
        }
        let outgoing = std::mem::take(&mut self.out_edges[node]);
        for &edge in &outgoing {
            self.edges[edge].from = Some(exit);
            self.out_edges[exit].push(edge);
        }
        if self.entry == Some(node) {
            self.entry = Some(entry);
        }
        if self.exit == Some(node) {
            self.exit = Some(exit);
        }

        self.removed[node] = true;
        let _: Vec<Node> = self
            .order
            .splice(position..position + 1, inserted.iter().cloned())
            .collect();
        log::trace!(
            "splice: {} replaced by {:?} ({} in-edges to {}, {} out-edges from {})",
            node,
            inserted,
            incoming.len(),
            entry,
            outgoing.len(),
            exit
        );
        Ok(inserted)
    }
}
