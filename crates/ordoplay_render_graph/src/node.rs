// SPDX-License-Identifier: MIT OR Apache-2.0
//! Node definitions for the render graph.

use crate::context::{InputSlotError, OutputSlotError, RenderGraphContext, RunSubGraphError};
use crate::edge::Edges;
use crate::render_context::RenderContext;
use crate::slot::{SlotInfo, SlotInfos};
use std::any::Any;
use std::borrow::Cow;
use std::fmt;

/// Unique identifier for a node within one graph
///
/// Ids come from a per-graph counter and are never handed out twice by the
/// same graph, even after the node is removed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(pub(crate) u32);

impl NodeId {
    /// Get the raw id value
    pub fn index(&self) -> u32 {
        self.0
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Reference to a node, either by id or by name
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum NodeLabel {
    /// Node id
    Id(NodeId),
    /// Registered node name
    Name(Cow<'static, str>),
}

impl fmt::Display for NodeLabel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Id(id) => write!(f, "{id}"),
            Self::Name(name) => write!(f, "'{name}'"),
        }
    }
}

impl From<NodeId> for NodeLabel {
    fn from(value: NodeId) -> Self {
        Self::Id(value)
    }
}

impl From<&'static str> for NodeLabel {
    fn from(value: &'static str) -> Self {
        Self::Name(Cow::Borrowed(value))
    }
}

impl From<String> for NodeLabel {
    fn from(value: String) -> Self {
        Self::Name(Cow::Owned(value))
    }
}

impl From<&NodeLabel> for NodeLabel {
    fn from(value: &NodeLabel) -> Self {
        value.clone()
    }
}

/// Object-safe access to [`Any`] for downcasting boxed nodes
pub trait AsAny: Any {
    /// Borrow as [`Any`]
    fn as_any(&self) -> &dyn Any;
    /// Mutably borrow as [`Any`]
    fn as_any_mut(&mut self) -> &mut dyn Any;
}

impl<T: Any> AsAny for T {
    fn as_any(&self) -> &dyn Any {
        self
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }
}

/// A unit of schedulable GPU work
///
/// Nodes declare their slots once, when they are added to a graph. The runner
/// hands `run` the values bound to the declared inputs and expects every
/// declared output to be set before it returns.
pub trait Node: AsAny + Send + Sync + 'static {
    /// Inputs this node requires
    fn input(&self) -> Vec<SlotInfo> {
        Vec::new()
    }

    /// Outputs this node produces
    fn output(&self) -> Vec<SlotInfo> {
        Vec::new()
    }

    /// Refresh internal state, called once per frame before the graph runs
    fn update(&mut self) {}

    /// Record this node's work
    fn run(
        &self,
        graph: &mut RenderGraphContext,
        render_context: &mut RenderContext,
    ) -> Result<(), NodeRunError>;
}

/// Error returned by [`Node::run`]
#[derive(Debug, thiserror::Error)]
pub enum NodeRunError {
    /// Bad input slot access
    #[error("Input slot error: {0}")]
    InputSlotError(#[from] InputSlotError),

    /// Bad output slot access
    #[error("Output slot error: {0}")]
    OutputSlotError(#[from] OutputSlotError),

    /// Invalid sub-graph request
    #[error("Sub-graph request failed: {0}")]
    RunSubGraphError(#[from] RunSubGraphError),

    /// Node-specific failure
    #[error("{0}")]
    Custom(String),
}

/// Everything the graph knows about one registered node
pub struct NodeState {
    /// Node id
    pub id: NodeId,
    /// Registered name
    pub name: Option<Cow<'static, str>>,
    /// Concrete node type, for diagnostics
    pub type_name: &'static str,
    /// The node itself
    pub node: Box<dyn Node>,
    /// Declared inputs
    pub input_slots: SlotInfos,
    /// Declared outputs
    pub output_slots: SlotInfos,
    /// Edges touching this node
    pub edges: Edges,
}

impl fmt::Debug for NodeState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("NodeState")
            .field("id", &self.id)
            .field("name", &self.name)
            .field("type_name", &self.type_name)
            .field("input_slots", &self.input_slots)
            .field("output_slots", &self.output_slots)
            .field("edges", &self.edges)
            .finish()
    }
}

impl NodeState {
    /// Build the state for a node, capturing its declared slots
    pub fn new<T: Node>(id: NodeId, node: T) -> Self {
        Self {
            id,
            name: None,
            type_name: std::any::type_name::<T>(),
            input_slots: node.input().into(),
            output_slots: node.output().into(),
            node: Box::new(node),
            edges: Edges::new(id),
        }
    }

    /// Name if registered, otherwise the id
    pub fn label(&self) -> NodeLabel {
        match &self.name {
            Some(name) => NodeLabel::Name(name.clone()),
            None => NodeLabel::Id(self.id),
        }
    }

    /// Downcast the node to a concrete type
    pub fn node<T: Node>(&self) -> Option<&T> {
        let node: &dyn Node = &*self.node;
        node.as_any().downcast_ref::<T>()
    }

    /// Mutably downcast the node to a concrete type
    pub fn node_mut<T: Node>(&mut self) -> Option<&mut T> {
        let node: &mut dyn Node = &mut *self.node;
        node.as_any_mut().downcast_mut::<T>()
    }
}

/// Node that does no work, useful as an ordering anchor between groups
#[derive(Debug, Clone, Copy, Default)]
pub struct EmptyNode;

impl Node for EmptyNode {
    fn run(
        &self,
        _graph: &mut RenderGraphContext,
        _render_context: &mut RenderContext,
    ) -> Result<(), NodeRunError> {
        Ok(())
    }
}

/// Entry point of a graph's external inputs
///
/// The runner never invokes this node. Its outputs are the values passed to
/// the graph run, checked against the declared slots.
#[derive(Debug, Clone)]
pub struct GraphInputNode {
    inputs: Vec<SlotInfo>,
}

impl GraphInputNode {
    /// Create an input node declaring the given graph inputs
    pub fn new(inputs: Vec<SlotInfo>) -> Self {
        Self { inputs }
    }
}

impl Node for GraphInputNode {
    fn input(&self) -> Vec<SlotInfo> {
        self.inputs.clone()
    }

    fn output(&self) -> Vec<SlotInfo> {
        self.inputs.clone()
    }

    fn run(
        &self,
        graph: &mut RenderGraphContext,
        _render_context: &mut RenderContext,
    ) -> Result<(), NodeRunError> {
        for index in 0..graph.inputs().len() {
            let value = graph.inputs()[index];
            graph.set_output(index, value)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::slot::SlotType;

    struct Blit;

    impl Node for Blit {
        fn input(&self) -> Vec<SlotInfo> {
            vec![SlotInfo::new("source", SlotType::TextureView)]
        }

        fn output(&self) -> Vec<SlotInfo> {
            vec![
                SlotInfo::new("target", SlotType::TextureView),
                SlotInfo::new("sampler", SlotType::Sampler),
            ]
        }

        fn run(
            &self,
            _graph: &mut RenderGraphContext,
            _render_context: &mut RenderContext,
        ) -> Result<(), NodeRunError> {
            Ok(())
        }
    }

    #[test]
    fn test_node_state_captures_slots() {
        let state = NodeState::new(NodeId(3), Blit);
        assert_eq!(state.input_slots.len(), 1);
        assert_eq!(state.output_slots.len(), 2);
        assert_eq!(state.edges.id(), NodeId(3));
        assert!(state.type_name.ends_with("Blit"));
    }

    #[test]
    fn test_downcast() {
        let mut state = NodeState::new(NodeId(0), Blit);
        assert!(state.node::<Blit>().is_some());
        assert!(state.node::<EmptyNode>().is_none());
        assert!(state.node_mut::<Blit>().is_some());
    }

    #[test]
    fn test_label_prefers_name() {
        let mut state = NodeState::new(NodeId(5), EmptyNode);
        assert_eq!(state.label(), NodeLabel::Id(NodeId(5)));
        state.name = Some("main_pass".into());
        assert_eq!(state.label(), NodeLabel::from("main_pass"));
    }

    #[test]
    fn test_run_error_keeps_cause() {
        let err = NodeRunError::from(InputSlotError::MismatchedSlotType {
            label: "depth".into(),
            expected: SlotType::TextureView,
            actual: SlotType::Buffer,
        });
        let message = err.to_string();
        assert!(message.contains("'depth'"), "{message}");
        assert!(message.contains(&SlotType::Buffer.to_string()), "{message}");

        let err = NodeRunError::from(RunSubGraphError::MissingSubGraph("core_2d".to_string()));
        assert!(err.to_string().contains("core_2d"));
    }

    #[test]
    fn test_graph_input_node_mirrors_slots() {
        let node = GraphInputNode::new(vec![SlotInfo::new("view", SlotType::Entity)]);
        assert_eq!(node.input(), node.output());
    }
}
