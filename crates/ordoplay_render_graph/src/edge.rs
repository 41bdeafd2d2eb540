// SPDX-License-Identifier: MIT OR Apache-2.0
//! Edge definitions for the render graph.

use crate::graph::RenderGraphError;
use crate::node::NodeId;

/// A dependency between two nodes
///
/// Both kinds order `output_node` before `input_node`. A slot edge also binds
/// one output of the first node to one input of the second.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Edge {
    /// Ordering plus a data binding
    SlotEdge {
        /// Producing node
        output_node: NodeId,
        /// Output slot of the producing node
        output_index: usize,
        /// Consuming node
        input_node: NodeId,
        /// Input slot of the consuming node
        input_index: usize,
    },

    /// Ordering only
    NodeEdge {
        /// Node that runs first
        output_node: NodeId,
        /// Node that runs after it
        input_node: NodeId,
    },
}

impl Edge {
    /// Node on the consuming side
    pub fn get_input_node(&self) -> NodeId {
        match self {
            Self::SlotEdge { input_node, .. } | Self::NodeEdge { input_node, .. } => *input_node,
        }
    }

    /// Node on the producing side
    pub fn get_output_node(&self) -> NodeId {
        match self {
            Self::SlotEdge { output_node, .. } | Self::NodeEdge { output_node, .. } => *output_node,
        }
    }
}

/// Whether an edge is expected to be present when validating it
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EdgeExistence {
    /// The edge must already be registered
    Exists,
    /// The edge must not be registered yet
    DoesNotExist,
}

/// Edges attached to one node, split by side
#[derive(Debug, Clone)]
pub struct Edges {
    id: NodeId,
    input_edges: Vec<Edge>,
    output_edges: Vec<Edge>,
}

impl Edges {
    /// Create an empty edge set for a node
    pub fn new(id: NodeId) -> Self {
        Self {
            id,
            input_edges: Vec::new(),
            output_edges: Vec::new(),
        }
    }

    /// Owning node
    #[inline]
    pub fn id(&self) -> NodeId {
        self.id
    }

    /// Edges ending at this node
    #[inline]
    pub fn input_edges(&self) -> &[Edge] {
        &self.input_edges
    }

    /// Edges starting at this node
    #[inline]
    pub fn output_edges(&self) -> &[Edge] {
        &self.output_edges
    }

    /// Whether the input side holds `edge`
    pub fn has_input_edge(&self, edge: &Edge) -> bool {
        self.input_edges.contains(edge)
    }

    /// Whether the output side holds `edge`
    pub fn has_output_edge(&self, edge: &Edge) -> bool {
        self.output_edges.contains(edge)
    }

    /// Register an edge on the input side
    pub(crate) fn add_input_edge(&mut self, edge: Edge) -> Result<(), RenderGraphError> {
        if self.has_input_edge(&edge) {
            return Err(RenderGraphError::EdgeAlreadyExists(edge));
        }
        self.input_edges.push(edge);
        Ok(())
    }

    /// Register an edge on the output side
    pub(crate) fn add_output_edge(&mut self, edge: Edge) -> Result<(), RenderGraphError> {
        if self.has_output_edge(&edge) {
            return Err(RenderGraphError::EdgeAlreadyExists(edge));
        }
        self.output_edges.push(edge);
        Ok(())
    }

    /// Unregister an edge from the input side
    pub(crate) fn remove_input_edge(&mut self, edge: Edge) -> Result<(), RenderGraphError> {
        let index = self
            .input_edges
            .iter()
            .position(|e| *e == edge)
            .ok_or(RenderGraphError::EdgeDoesNotExist(edge))?;
        self.input_edges.swap_remove(index);
        Ok(())
    }

    /// Unregister an edge from the output side
    pub(crate) fn remove_output_edge(&mut self, edge: Edge) -> Result<(), RenderGraphError> {
        let index = self
            .output_edges
            .iter()
            .position(|e| *e == edge)
            .ok_or(RenderGraphError::EdgeDoesNotExist(edge))?;
        self.output_edges.swap_remove(index);
        Ok(())
    }

    /// Slot edge feeding input slot `index`, if any
    pub fn get_input_slot_edge(&self, index: usize) -> Option<&Edge> {
        self.input_edges.iter().find(|e| {
            matches!(e, Edge::SlotEdge { input_index, .. } if *input_index == index)
        })
    }

    /// Slot edges reading from output slot `index`
    pub fn get_output_slot_edges(&self, index: usize) -> impl Iterator<Item = &Edge> {
        self.output_edges.iter().filter(move |e| {
            matches!(e, Edge::SlotEdge { output_index, .. } if *output_index == index)
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn slot_edge(output_index: usize, input_index: usize) -> Edge {
        Edge::SlotEdge {
            output_node: NodeId(0),
            output_index,
            input_node: NodeId(1),
            input_index,
        }
    }

    #[test]
    fn test_endpoints() {
        let edge = Edge::NodeEdge {
            output_node: NodeId(2),
            input_node: NodeId(9),
        };
        assert_eq!(edge.get_output_node(), NodeId(2));
        assert_eq!(edge.get_input_node(), NodeId(9));
    }

    #[test]
    fn test_duplicate_edges_rejected() {
        let mut edges = Edges::new(NodeId(1));
        edges.add_input_edge(slot_edge(0, 0)).unwrap();
        assert!(matches!(
            edges.add_input_edge(slot_edge(0, 0)),
            Err(RenderGraphError::EdgeAlreadyExists(_))
        ));
        assert_eq!(edges.input_edges().len(), 1);
    }

    #[test]
    fn test_slot_edge_lookup() {
        let mut edges = Edges::new(NodeId(1));
        edges.add_input_edge(slot_edge(0, 1)).unwrap();
        edges
            .add_input_edge(Edge::NodeEdge {
                output_node: NodeId(4),
                input_node: NodeId(1),
            })
            .unwrap();
        assert_eq!(edges.get_input_slot_edge(1), Some(&slot_edge(0, 1)));
        assert!(edges.get_input_slot_edge(0).is_none());

        let mut producer = Edges::new(NodeId(0));
        producer.add_output_edge(slot_edge(0, 0)).unwrap();
        producer.add_output_edge(slot_edge(0, 1)).unwrap();
        assert_eq!(producer.get_output_slot_edges(0).count(), 2);
        assert_eq!(producer.get_output_slot_edges(1).count(), 0);
    }

    #[test]
    fn test_remove_missing_edge() {
        let mut edges = Edges::new(NodeId(1));
        assert!(matches!(
            edges.remove_output_edge(slot_edge(0, 0)),
            Err(RenderGraphError::EdgeDoesNotExist(_))
        ));
    }
}
