// SPDX-License-Identifier: MIT OR Apache-2.0
//! Graph data structure containing nodes, edges and sub-graphs.

use crate::edge::{Edge, EdgeExistence};
use crate::node::{GraphInputNode, Node, NodeId, NodeLabel, NodeState};
use crate::slot::{SlotInfo, SlotLabel};
use indexmap::IndexMap;
use std::borrow::Cow;
use std::collections::{HashMap, VecDeque};

/// A render graph
///
/// Nodes live in an arena keyed by [`NodeId`]; edges refer to nodes only by
/// id. The graph is built once, then read by the runner every frame.
#[derive(Debug, Default)]
pub struct RenderGraph {
    /// Nodes in insertion order
    nodes: IndexMap<NodeId, NodeState>,
    /// Name lookup, last registration wins
    node_names: HashMap<Cow<'static, str>, NodeId>,
    /// Named sub-graphs
    sub_graphs: IndexMap<Cow<'static, str>, RenderGraph>,
    /// Node carrying the graph's external inputs
    input_node: Option<NodeId>,
    next_node_id: u32,
}

impl RenderGraph {
    /// Name given to the node created by [`RenderGraph::set_input`]
    pub const INPUT_NODE_NAME: &'static str = "GraphInputNode";

    /// Create a new empty graph
    pub fn new() -> Self {
        Self::default()
    }

    /// Let every node (and every sub-graph) refresh its state for this frame
    pub fn update(&mut self) {
        for node in self.nodes.values_mut() {
            node.node.update();
        }

        for sub_graph in self.sub_graphs.values_mut() {
            sub_graph.update();
        }
    }

    /// Declare the graph's external inputs
    ///
    /// # Panics
    ///
    /// Panics if the graph already has an input node.
    pub fn set_input(&mut self, inputs: Vec<SlotInfo>) -> NodeId {
        assert!(
            self.input_node.is_none(),
            "Graph already has an input node"
        );

        let id = self.add_node(Self::INPUT_NODE_NAME, GraphInputNode::new(inputs));
        self.input_node = Some(id);
        id
    }

    /// Node carrying the graph's external inputs, if declared
    pub fn get_input_node(&self) -> Option<&NodeState> {
        self.input_node.and_then(|id| self.nodes.get(&id))
    }

    /// Add a node to the graph
    ///
    /// Registering a name twice points the name at the newer node.
    pub fn add_node<T: Node>(&mut self, name: impl Into<Cow<'static, str>>, node: T) -> NodeId {
        let id = NodeId(self.next_node_id);
        self.next_node_id += 1;

        let name = name.into();
        let mut node_state = NodeState::new(id, node);
        node_state.name = Some(name.clone());

        tracing::debug!(
            "Added node '{}' {} ({} inputs, {} outputs)",
            name,
            id,
            node_state.input_slots.len(),
            node_state.output_slots.len()
        );

        self.nodes.insert(id, node_state);
        self.node_names.insert(name, id);
        id
    }

    /// Remove a node and every edge touching it
    pub fn remove_node(&mut self, label: impl Into<NodeLabel>) -> Result<(), RenderGraphError> {
        let id = self.get_node_id(label)?;
        let edges: Vec<Edge> = {
            let node_state = self.get_node_state(id)?;
            node_state
                .edges
                .input_edges()
                .iter()
                .chain(node_state.edges.output_edges())
                .copied()
                .collect()
        };

        // Detach from both endpoints while the node is still present
        for edge in edges {
            // A self edge shows up on both sides of the node
            if self.has_edge(&edge) {
                self.unregister_edge(edge)?;
            }
        }

        let Some(node_state) = self.nodes.shift_remove(&id) else {
            return Err(RenderGraphError::InvalidNode(NodeLabel::Id(id)));
        };

        if let Some(name) = &node_state.name {
            if self.node_names.get(name) == Some(&id) {
                self.node_names.remove(name);
            }
        }
        if self.input_node == Some(id) {
            self.input_node = None;
        }

        tracing::debug!("Removed node {}", node_state.label());
        Ok(())
    }

    /// Resolve a label to a node id
    pub fn get_node_id(&self, label: impl Into<NodeLabel>) -> Result<NodeId, RenderGraphError> {
        match label.into() {
            NodeLabel::Id(id) if self.nodes.contains_key(&id) => Ok(id),
            NodeLabel::Name(name) => self
                .node_names
                .get(&*name)
                .copied()
                .ok_or(RenderGraphError::InvalidNode(NodeLabel::Name(name))),
            label => Err(RenderGraphError::InvalidNode(label)),
        }
    }

    /// Get a node state by label
    pub fn get_node_state(&self, label: impl Into<NodeLabel>) -> Result<&NodeState, RenderGraphError> {
        let id = self.get_node_id(label)?;
        self.nodes
            .get(&id)
            .ok_or(RenderGraphError::InvalidNode(NodeLabel::Id(id)))
    }

    /// Get a mutable node state by label
    pub fn get_node_state_mut(
        &mut self,
        label: impl Into<NodeLabel>,
    ) -> Result<&mut NodeState, RenderGraphError> {
        let id = self.get_node_id(label)?;
        self.nodes
            .get_mut(&id)
            .ok_or(RenderGraphError::InvalidNode(NodeLabel::Id(id)))
    }

    /// Get a node as its concrete type
    pub fn get_node<T: Node>(&self, label: impl Into<NodeLabel>) -> Result<&T, RenderGraphError> {
        self.get_node_state(label)?
            .node::<T>()
            .ok_or(RenderGraphError::WrongNodeType)
    }

    /// Get a node as its concrete type, mutably
    pub fn get_node_mut<T: Node>(
        &mut self,
        label: impl Into<NodeLabel>,
    ) -> Result<&mut T, RenderGraphError> {
        self.get_node_state_mut(label)?
            .node_mut::<T>()
            .ok_or(RenderGraphError::WrongNodeType)
    }

    /// Get the number of nodes
    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    /// Connect an output slot of one node to an input slot of another
    ///
    /// Nothing is registered unless every check passes.
    pub fn try_add_slot_edge(
        &mut self,
        output_node: impl Into<NodeLabel>,
        output_slot: impl Into<SlotLabel>,
        input_node: impl Into<NodeLabel>,
        input_slot: impl Into<SlotLabel>,
    ) -> Result<(), RenderGraphError> {
        let edge = self.resolve_slot_edge(output_node, output_slot, input_node, input_slot)?;
        self.validate_edge(&edge, EdgeExistence::DoesNotExist)?;
        self.register_edge(edge)
    }

    /// [`RenderGraph::try_add_slot_edge`] for statically known wiring
    ///
    /// # Panics
    ///
    /// Panics if the edge is invalid.
    pub fn add_slot_edge(
        &mut self,
        output_node: impl Into<NodeLabel>,
        output_slot: impl Into<SlotLabel>,
        input_node: impl Into<NodeLabel>,
        input_slot: impl Into<SlotLabel>,
    ) {
        if let Err(err) = self.try_add_slot_edge(output_node, output_slot, input_node, input_slot) {
            panic!("Failed to add slot edge: {err}");
        }
    }

    /// Remove a slot edge
    pub fn try_remove_slot_edge(
        &mut self,
        output_node: impl Into<NodeLabel>,
        output_slot: impl Into<SlotLabel>,
        input_node: impl Into<NodeLabel>,
        input_slot: impl Into<SlotLabel>,
    ) -> Result<(), RenderGraphError> {
        let edge = self.resolve_slot_edge(output_node, output_slot, input_node, input_slot)?;
        self.validate_edge(&edge, EdgeExistence::Exists)?;
        self.unregister_edge(edge)
    }

    /// [`RenderGraph::try_remove_slot_edge`] for statically known wiring
    ///
    /// # Panics
    ///
    /// Panics if the edge does not exist.
    pub fn remove_slot_edge(
        &mut self,
        output_node: impl Into<NodeLabel>,
        output_slot: impl Into<SlotLabel>,
        input_node: impl Into<NodeLabel>,
        input_slot: impl Into<SlotLabel>,
    ) {
        if let Err(err) = self.try_remove_slot_edge(output_node, output_slot, input_node, input_slot) {
            panic!("Failed to remove slot edge: {err}");
        }
    }

    /// Order `output_node` before `input_node` without binding data
    pub fn try_add_node_edge(
        &mut self,
        output_node: impl Into<NodeLabel>,
        input_node: impl Into<NodeLabel>,
    ) -> Result<(), RenderGraphError> {
        let edge = Edge::NodeEdge {
            output_node: self.get_node_id(output_node)?,
            input_node: self.get_node_id(input_node)?,
        };
        self.validate_edge(&edge, EdgeExistence::DoesNotExist)?;
        self.register_edge(edge)
    }

    /// [`RenderGraph::try_add_node_edge`] for statically known wiring
    ///
    /// # Panics
    ///
    /// Panics if the edge is invalid.
    pub fn add_node_edge(&mut self, output_node: impl Into<NodeLabel>, input_node: impl Into<NodeLabel>) {
        if let Err(err) = self.try_add_node_edge(output_node, input_node) {
            panic!("Failed to add node edge: {err}");
        }
    }

    /// Remove a node edge
    pub fn try_remove_node_edge(
        &mut self,
        output_node: impl Into<NodeLabel>,
        input_node: impl Into<NodeLabel>,
    ) -> Result<(), RenderGraphError> {
        let edge = Edge::NodeEdge {
            output_node: self.get_node_id(output_node)?,
            input_node: self.get_node_id(input_node)?,
        };
        self.validate_edge(&edge, EdgeExistence::Exists)?;
        self.unregister_edge(edge)
    }

    /// [`RenderGraph::try_remove_node_edge`] for statically known wiring
    ///
    /// # Panics
    ///
    /// Panics if the edge does not exist.
    pub fn remove_node_edge(&mut self, output_node: impl Into<NodeLabel>, input_node: impl Into<NodeLabel>) {
        if let Err(err) = self.try_remove_node_edge(output_node, input_node) {
            panic!("Failed to remove node edge: {err}");
        }
    }

    /// Check an edge against the graph
    pub fn validate_edge(
        &self,
        edge: &Edge,
        should_exist: EdgeExistence,
    ) -> Result<(), RenderGraphError> {
        let exists = self.has_edge(edge);
        if should_exist == EdgeExistence::Exists && !exists {
            return Err(RenderGraphError::EdgeDoesNotExist(*edge));
        }
        if should_exist == EdgeExistence::DoesNotExist && exists {
            return Err(RenderGraphError::EdgeAlreadyExists(*edge));
        }

        match *edge {
            Edge::SlotEdge {
                output_node,
                output_index,
                input_node,
                input_index,
            } => {
                let output_node_state = self.get_node_state(output_node)?;
                let input_node_state = self.get_node_state(input_node)?;

                let output_slot = output_node_state
                    .output_slots
                    .get_slot(output_index)
                    .ok_or(RenderGraphError::InvalidOutputNodeSlot(SlotLabel::Index(output_index)))?;
                let input_slot = input_node_state
                    .input_slots
                    .get_slot(input_index)
                    .ok_or(RenderGraphError::InvalidInputNodeSlot(SlotLabel::Index(input_index)))?;

                if should_exist == EdgeExistence::DoesNotExist {
                    if let Some(current) = input_node_state.edges.get_input_slot_edge(input_index) {
                        return Err(RenderGraphError::NodeInputSlotAlreadyOccupied {
                            node: input_node,
                            input_slot: input_index,
                            occupied_by_node: current.get_output_node(),
                        });
                    }
                }

                if output_slot.slot_type != input_slot.slot_type {
                    return Err(RenderGraphError::MismatchedNodeSlots {
                        output_node,
                        output_slot: output_index,
                        input_node,
                        input_slot: input_index,
                    });
                }
            }
            Edge::NodeEdge {
                output_node,
                input_node,
            } => {
                self.get_node_state(output_node)?;
                self.get_node_state(input_node)?;
            }
        }

        Ok(())
    }

    /// Whether `edge` is registered on both of its endpoints
    pub fn has_edge(&self, edge: &Edge) -> bool {
        let output_node_state = self.nodes.get(&edge.get_output_node());
        let input_node_state = self.nodes.get(&edge.get_input_node());
        match (output_node_state, input_node_state) {
            (Some(output), Some(input)) => {
                output.edges.has_output_edge(edge) && input.edges.has_input_edge(edge)
            }
            _ => false,
        }
    }

    /// Get all nodes, in insertion order
    pub fn iter_nodes(&self) -> impl Iterator<Item = &NodeState> {
        self.nodes.values()
    }

    /// Get all nodes mutably
    pub fn iter_nodes_mut(&mut self) -> impl Iterator<Item = &mut NodeState> {
        self.nodes.values_mut()
    }

    /// Edges ending at a node, each paired with the producing node
    pub fn iter_node_inputs(
        &self,
        label: impl Into<NodeLabel>,
    ) -> Result<impl Iterator<Item = (&Edge, &NodeState)>, RenderGraphError> {
        let node = self.get_node_state(label)?;
        Ok(node.edges.input_edges().iter().filter_map(move |edge| {
            self.nodes
                .get(&edge.get_output_node())
                .map(|output_node| (edge, output_node))
        }))
    }

    /// Edges starting at a node, each paired with the consuming node
    pub fn iter_node_outputs(
        &self,
        label: impl Into<NodeLabel>,
    ) -> Result<impl Iterator<Item = (&Edge, &NodeState)>, RenderGraphError> {
        let node = self.get_node_state(label)?;
        Ok(node.edges.output_edges().iter().filter_map(move |edge| {
            self.nodes
                .get(&edge.get_input_node())
                .map(|input_node| (edge, input_node))
        }))
    }

    /// Add a named sub-graph, replacing any previous one with that name
    pub fn add_sub_graph(&mut self, name: impl Into<Cow<'static, str>>, sub_graph: RenderGraph) {
        let name = name.into();
        tracing::debug!("Added sub-graph '{}' ({} nodes)", name, sub_graph.node_count());
        self.sub_graphs.insert(name, sub_graph);
    }

    /// Remove a named sub-graph
    pub fn remove_sub_graph(&mut self, name: &str) -> Option<RenderGraph> {
        self.sub_graphs.shift_remove(name)
    }

    /// Get a sub-graph by name
    pub fn get_sub_graph(&self, name: &str) -> Option<&RenderGraph> {
        self.sub_graphs.get(name)
    }

    /// Get a mutable sub-graph by name
    pub fn get_sub_graph_mut(&mut self, name: &str) -> Option<&mut RenderGraph> {
        self.sub_graphs.get_mut(name)
    }

    /// Get all sub-graphs with their names
    pub fn iter_sub_graphs(&self) -> impl Iterator<Item = (&str, &RenderGraph)> {
        self.sub_graphs.iter().map(|(name, graph)| (&**name, graph))
    }

    /// Get all sub-graphs mutably
    pub fn iter_sub_graphs_mut(&mut self) -> impl Iterator<Item = (&str, &mut RenderGraph)> {
        self.sub_graphs.iter_mut().map(|(name, graph)| (&**name, graph))
    }

    /// Check that every input slot of a node has a producer
    pub fn validate_input_slots(&self, label: impl Into<NodeLabel>) -> Result<(), RenderGraphError> {
        let node = self.get_node_state(label)?;
        for input_slot in 0..node.input_slots.len() {
            if node.edges.get_input_slot_edge(input_slot).is_none() {
                return Err(RenderGraphError::UnconnectedNodeInputSlot {
                    node: node.id,
                    input_slot,
                });
            }
        }
        Ok(())
    }

    /// Check that every output slot of a node has at least one consumer
    pub fn validate_output_slots(&self, label: impl Into<NodeLabel>) -> Result<(), RenderGraphError> {
        let node = self.get_node_state(label)?;
        for output_slot in 0..node.output_slots.len() {
            if node.edges.get_output_slot_edges(output_slot).next().is_none() {
                return Err(RenderGraphError::UnconnectedNodeOutputSlot {
                    node: node.id,
                    output_slot,
                });
            }
        }
        Ok(())
    }

    /// Check the whole graph (and its sub-graphs) is runnable
    ///
    /// Every input slot must be connected and the edges must not form a
    /// cycle. The runner relies on both.
    pub fn validate(&self) -> Result<(), RenderGraphError> {
        for node in self.nodes.values() {
            if Some(node.id) != self.input_node {
                self.validate_input_slots(node.id)?;
            }
        }

        // Kahn's algorithm over both edge kinds
        let mut in_degree: IndexMap<NodeId, usize> = self
            .nodes
            .values()
            .map(|node| (node.id, node.edges.input_edges().len()))
            .collect();
        let mut ready: VecDeque<NodeId> = in_degree
            .iter()
            .filter(|(_, &degree)| degree == 0)
            .map(|(&id, _)| id)
            .collect();

        let mut visited = 0;
        while let Some(id) = ready.pop_front() {
            visited += 1;
            let Some(node) = self.nodes.get(&id) else {
                continue;
            };
            for edge in node.edges.output_edges() {
                if let Some(degree) = in_degree.get_mut(&edge.get_input_node()) {
                    *degree -= 1;
                    if *degree == 0 {
                        ready.push_back(edge.get_input_node());
                    }
                }
            }
        }

        if visited < self.nodes.len() {
            let remaining = in_degree
                .into_iter()
                .filter(|(_, degree)| *degree > 0)
                .map(|(id, _)| id)
                .collect();
            return Err(RenderGraphError::CircularDependency(remaining));
        }

        for (name, sub_graph) in &self.sub_graphs {
            sub_graph
                .validate()
                .map_err(|error| RenderGraphError::InvalidSubGraph {
                    name: name.to_string(),
                    error: Box::new(error),
                })?;
        }

        Ok(())
    }

    fn resolve_slot_edge(
        &self,
        output_node: impl Into<NodeLabel>,
        output_slot: impl Into<SlotLabel>,
        input_node: impl Into<NodeLabel>,
        input_slot: impl Into<SlotLabel>,
    ) -> Result<Edge, RenderGraphError> {
        let output_slot = output_slot.into();
        let input_slot = input_slot.into();

        let output_node_state = self.get_node_state(output_node)?;
        let input_node_state = self.get_node_state(input_node)?;

        let output_index = output_node_state
            .output_slots
            .get_slot_index(&output_slot)
            .ok_or(RenderGraphError::InvalidOutputNodeSlot(output_slot))?;
        let input_index = input_node_state
            .input_slots
            .get_slot_index(&input_slot)
            .ok_or(RenderGraphError::InvalidInputNodeSlot(input_slot))?;

        Ok(Edge::SlotEdge {
            output_node: output_node_state.id,
            output_index,
            input_node: input_node_state.id,
            input_index,
        })
    }

    fn register_edge(&mut self, edge: Edge) -> Result<(), RenderGraphError> {
        let output_node = edge.get_output_node();
        let input_node = edge.get_input_node();

        self.get_node_state_mut(output_node)?.edges.add_output_edge(edge)?;
        if let Err(err) = self
            .get_node_state_mut(input_node)
            .and_then(|state| state.edges.add_input_edge(edge))
        {
            // Roll back so the edge is never half-registered
            self.get_node_state_mut(output_node)?.edges.remove_output_edge(edge)?;
            return Err(err);
        }

        tracing::debug!("Added edge {:?}", edge);
        Ok(())
    }

    fn unregister_edge(&mut self, edge: Edge) -> Result<(), RenderGraphError> {
        self.get_node_state_mut(edge.get_output_node())?
            .edges
            .remove_output_edge(edge)?;
        self.get_node_state_mut(edge.get_input_node())?
            .edges
            .remove_input_edge(edge)?;

        tracing::debug!("Removed edge {:?}", edge);
        Ok(())
    }
}

/// Error when building or validating a graph
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RenderGraphError {
    /// Node not found
    #[error("Node not found: {0}")]
    InvalidNode(NodeLabel),

    /// Output slot not found
    #[error("Output slot not found: {0}")]
    InvalidOutputNodeSlot(SlotLabel),

    /// Input slot not found
    #[error("Input slot not found: {0}")]
    InvalidInputNodeSlot(SlotLabel),

    /// Node is not of the requested type
    #[error("Node does not match the requested type")]
    WrongNodeType,

    /// Slot types differ across an edge
    #[error(
        "Mismatched slot types: output {output_slot} of node {output_node} \
         cannot feed input {input_slot} of node {input_node}"
    )]
    MismatchedNodeSlots {
        /// Producing node
        output_node: NodeId,
        /// Producing slot
        output_slot: usize,
        /// Consuming node
        input_node: NodeId,
        /// Consuming slot
        input_slot: usize,
    },

    /// Edge is already registered
    #[error("Edge already exists: {0:?}")]
    EdgeAlreadyExists(Edge),

    /// Edge is not registered
    #[error("Edge does not exist: {0:?}")]
    EdgeDoesNotExist(Edge),

    /// Input slot without a producer
    #[error("Node {node} has an unconnected input slot {input_slot}")]
    UnconnectedNodeInputSlot {
        /// Node
        node: NodeId,
        /// Unconnected slot
        input_slot: usize,
    },

    /// Output slot without a consumer
    #[error("Node {node} has an unconnected output slot {output_slot}")]
    UnconnectedNodeOutputSlot {
        /// Node
        node: NodeId,
        /// Unconnected slot
        output_slot: usize,
    },

    /// Input slot already has a producer
    #[error("Input slot {input_slot} of node {node} is already fed by node {occupied_by_node}")]
    NodeInputSlotAlreadyOccupied {
        /// Consuming node
        node: NodeId,
        /// Occupied slot
        input_slot: usize,
        /// Current producer
        occupied_by_node: NodeId,
    },

    /// Edges form a cycle
    #[error("Graph contains a cycle through nodes {0:?}")]
    CircularDependency(Vec<NodeId>),

    /// A nested graph failed validation
    #[error("Sub-graph '{name}' is invalid: {error}")]
    InvalidSubGraph {
        /// Sub-graph name
        name: String,
        /// Underlying error
        error: Box<RenderGraphError>,
    },
}
