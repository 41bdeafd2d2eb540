// SPDX-License-Identifier: MIT OR Apache-2.0
//! What a node sees while it runs.

use crate::graph::RenderGraph;
use crate::node::{NodeId, NodeState};
use crate::resource::{BufferId, EntityId, SamplerId, TextureViewId};
use crate::slot::{SlotInfos, SlotLabel, SlotType, SlotValue};
use std::borrow::Cow;

/// Sub-graph run queued by a node
#[derive(Debug, Clone)]
pub struct RunSubGraph {
    /// Name of the sub-graph
    pub name: Cow<'static, str>,
    /// Values for the sub-graph's input node
    pub inputs: Vec<SlotValue>,
    /// View entity for the sub-graph run
    pub view_entity: Option<EntityId>,
}

/// Context passed to [`Node::run`](crate::Node::run)
///
/// Exposes the node's resolved inputs, collects its outputs and records the
/// sub-graphs it wants to run once it returns.
pub struct RenderGraphContext<'a> {
    graph: &'a RenderGraph,
    node: &'a NodeState,
    inputs: &'a [SlotValue],
    outputs: &'a mut [Option<SlotValue>],
    run_sub_graphs: Vec<RunSubGraph>,
    view_entity: Option<EntityId>,
}

impl<'a> RenderGraphContext<'a> {
    /// Create a context for one node run
    pub fn new(
        graph: &'a RenderGraph,
        node: &'a NodeState,
        inputs: &'a [SlotValue],
        outputs: &'a mut [Option<SlotValue>],
    ) -> Self {
        Self {
            graph,
            node,
            inputs,
            outputs,
            run_sub_graphs: Vec::new(),
            view_entity: None,
        }
    }

    /// Graph the node belongs to
    #[inline]
    pub fn graph(&self) -> &RenderGraph {
        self.graph
    }

    /// Id of the running node
    #[inline]
    pub fn node_id(&self) -> NodeId {
        self.node.id
    }

    /// Input values, ordered by input slot
    #[inline]
    pub fn inputs(&self) -> &[SlotValue] {
        self.inputs
    }

    /// Declared inputs of the running node
    pub fn input_info(&self) -> &SlotInfos {
        &self.node.input_slots
    }

    /// Declared outputs of the running node
    pub fn output_info(&self) -> &SlotInfos {
        &self.node.output_slots
    }

    /// Get an input value by label
    pub fn get_input(&self, label: impl Into<SlotLabel>) -> Result<&SlotValue, InputSlotError> {
        let label = label.into();
        let index = self
            .input_info()
            .get_slot_index(&label)
            .ok_or_else(|| InputSlotError::InvalidSlot(label.clone()))?;
        self.inputs
            .get(index)
            .ok_or(InputSlotError::InvalidSlot(label))
    }

    /// Get a texture view input
    pub fn get_input_texture(&self, label: impl Into<SlotLabel>) -> Result<TextureViewId, InputSlotError> {
        let label = label.into();
        match self.get_input(&label)? {
            SlotValue::TextureView(value) => Ok(*value),
            value => Err(InputSlotError::MismatchedSlotType {
                label,
                expected: SlotType::TextureView,
                actual: value.slot_type(),
            }),
        }
    }

    /// Get a sampler input
    pub fn get_input_sampler(&self, label: impl Into<SlotLabel>) -> Result<SamplerId, InputSlotError> {
        let label = label.into();
        match self.get_input(&label)? {
            SlotValue::Sampler(value) => Ok(*value),
            value => Err(InputSlotError::MismatchedSlotType {
                label,
                expected: SlotType::Sampler,
                actual: value.slot_type(),
            }),
        }
    }

    /// Get a buffer input
    pub fn get_input_buffer(&self, label: impl Into<SlotLabel>) -> Result<BufferId, InputSlotError> {
        let label = label.into();
        match self.get_input(&label)? {
            SlotValue::Buffer(value) => Ok(*value),
            value => Err(InputSlotError::MismatchedSlotType {
                label,
                expected: SlotType::Buffer,
                actual: value.slot_type(),
            }),
        }
    }

    /// Get an entity input
    pub fn get_input_entity(&self, label: impl Into<SlotLabel>) -> Result<EntityId, InputSlotError> {
        let label = label.into();
        match self.get_input(&label)? {
            SlotValue::Entity(value) => Ok(*value),
            value => Err(InputSlotError::MismatchedSlotType {
                label,
                expected: SlotType::Entity,
                actual: value.slot_type(),
            }),
        }
    }

    /// Fill an output slot
    ///
    /// Setting the same slot twice keeps the last value.
    pub fn set_output(
        &mut self,
        label: impl Into<SlotLabel>,
        value: impl Into<SlotValue>,
    ) -> Result<(), OutputSlotError> {
        let label = label.into();
        let value = value.into();
        let slot_index = self
            .output_info()
            .get_slot_index(&label)
            .ok_or_else(|| OutputSlotError::InvalidSlot(label.clone()))?;
        let Some(expected) = self.output_info().get_slot(slot_index).map(|slot| slot.slot_type) else {
            return Err(OutputSlotError::InvalidSlot(label));
        };
        if value.slot_type() != expected {
            return Err(OutputSlotError::MismatchedSlotType {
                label,
                expected,
                actual: value.slot_type(),
            });
        }

        match self.outputs.get_mut(slot_index) {
            Some(output) => {
                *output = Some(value);
                Ok(())
            }
            None => Err(OutputSlotError::InvalidSlot(label)),
        }
    }

    /// View entity of this run
    ///
    /// # Panics
    ///
    /// Panics if the run has no view entity.
    pub fn view_entity(&self) -> EntityId {
        match self.view_entity {
            Some(entity) => entity,
            None => panic!("Render graph run has no view entity"),
        }
    }

    /// View entity of this run, if any
    pub fn get_view_entity(&self) -> Option<EntityId> {
        self.view_entity
    }

    /// Set the view entity of this run
    pub fn set_view_entity(&mut self, view_entity: EntityId) {
        self.view_entity = Some(view_entity);
    }

    /// Queue a sub-graph run
    ///
    /// The request is checked against the sub-graph's input node right away.
    /// Queued sub-graphs run in request order as soon as this node returns.
    ///
    /// The request is recorded even when the check fails, so the runner
    /// rejects it again if the node swallows the error; a bad request always
    /// fails the run.
    pub fn run_sub_graph(
        &mut self,
        name: impl Into<Cow<'static, str>>,
        inputs: Vec<SlotValue>,
        view_entity: Option<EntityId>,
    ) -> Result<(), RunSubGraphError> {
        let name = name.into();
        let checked = self.check_sub_graph_request(&name, &inputs);
        self.run_sub_graphs.push(RunSubGraph {
            name,
            inputs,
            view_entity,
        });
        checked
    }

    fn check_sub_graph_request(&self, name: &str, inputs: &[SlotValue]) -> Result<(), RunSubGraphError> {
        let sub_graph = self
            .graph
            .get_sub_graph(name)
            .ok_or_else(|| RunSubGraphError::MissingSubGraph(name.to_string()))?;

        let Some(input_node) = sub_graph.get_input_node() else {
            if inputs.is_empty() {
                return Ok(());
            }
            return Err(RunSubGraphError::SubGraphHasNoInputs(name.to_string()));
        };

        check_graph_inputs(&input_node.input_slots, inputs).map_err(|mismatch| match mismatch {
            InputMismatch::Missing { slot_index, slot_name } => RunSubGraphError::MissingInput {
                slot_index,
                slot_name,
                graph_name: name.to_string(),
            },
            InputMismatch::WrongType {
                slot_index,
                expected,
                actual,
            } => RunSubGraphError::MismatchedInputSlotType {
                graph_name: name.to_string(),
                slot_index,
                expected,
                actual,
            },
            InputMismatch::Unexpected { slot_index } => RunSubGraphError::UnexpectedInput {
                graph_name: name.to_string(),
                slot_index,
            },
        })
    }

    /// Hand back the queued sub-graph runs
    pub fn finish(self) -> Vec<RunSubGraph> {
        self.run_sub_graphs
    }
}

/// Why a set of values does not fit a graph's declared inputs
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum InputMismatch {
    Missing {
        slot_index: usize,
        slot_name: Cow<'static, str>,
    },
    WrongType {
        slot_index: usize,
        expected: SlotType,
        actual: SlotType,
    },
    Unexpected {
        slot_index: usize,
    },
}

/// Check values against a graph's declared inputs, slot by slot
pub(crate) fn check_graph_inputs(slots: &SlotInfos, values: &[SlotValue]) -> Result<(), InputMismatch> {
    for (slot_index, slot) in slots.iter().enumerate() {
        let Some(value) = values.get(slot_index) else {
            return Err(InputMismatch::Missing {
                slot_index,
                slot_name: slot.name.clone(),
            });
        };
        if value.slot_type() != slot.slot_type {
            return Err(InputMismatch::WrongType {
                slot_index,
                expected: slot.slot_type,
                actual: value.slot_type(),
            });
        }
    }

    if values.len() > slots.len() {
        return Err(InputMismatch::Unexpected {
            slot_index: slots.len(),
        });
    }
    Ok(())
}

/// Error when reading an input slot
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum InputSlotError {
    /// Slot does not exist
    #[error("Input slot {0} does not exist")]
    InvalidSlot(SlotLabel),

    /// Slot holds a different type
    #[error("Input slot {label} holds a {actual}, expected {expected}")]
    MismatchedSlotType {
        /// Slot
        label: SlotLabel,
        /// Requested type
        expected: SlotType,
        /// Bound type
        actual: SlotType,
    },
}

/// Error when writing an output slot
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum OutputSlotError {
    /// Slot does not exist
    #[error("Output slot {0} does not exist")]
    InvalidSlot(SlotLabel),

    /// Value does not match the declared type
    #[error("Output slot {label} expects {expected}, got {actual}")]
    MismatchedSlotType {
        /// Slot
        label: SlotLabel,
        /// Declared type
        expected: SlotType,
        /// Given type
        actual: SlotType,
    },
}

/// Error when queueing a sub-graph run
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RunSubGraphError {
    /// No sub-graph with that name
    #[error("Sub-graph '{0}' does not exist")]
    MissingSubGraph(String),

    /// Inputs given to a graph without an input node
    #[error("Sub-graph '{0}' was given inputs but declares none")]
    SubGraphHasNoInputs(String),

    /// Fewer values than declared inputs
    #[error("Sub-graph '{graph_name}' is missing input {slot_index} ('{slot_name}')")]
    MissingInput {
        /// Missing slot
        slot_index: usize,
        /// Missing slot name
        slot_name: Cow<'static, str>,
        /// Sub-graph
        graph_name: String,
    },

    /// Value type differs from the declared input
    #[error("Sub-graph '{graph_name}' input {slot_index} expects {expected}, got {actual}")]
    MismatchedInputSlotType {
        /// Sub-graph
        graph_name: String,
        /// Slot
        slot_index: usize,
        /// Declared type
        expected: SlotType,
        /// Given type
        actual: SlotType,
    },

    /// More values than declared inputs
    #[error("Sub-graph '{graph_name}' was given an extra input at {slot_index}")]
    UnexpectedInput {
        /// Sub-graph
        graph_name: String,
        /// First extra value
        slot_index: usize,
    },
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::node::{EmptyNode, Node, NodeRunError};
    use crate::render_context::RenderContext;
    use crate::slot::SlotInfo;

    struct Producer;

    impl Node for Producer {
        fn input(&self) -> Vec<SlotInfo> {
            vec![
                SlotInfo::new("view", SlotType::Entity),
                SlotInfo::new("depth", SlotType::TextureView),
            ]
        }

        fn output(&self) -> Vec<SlotInfo> {
            vec![SlotInfo::new("color", SlotType::TextureView)]
        }

        fn run(
            &self,
            _graph: &mut RenderGraphContext,
            _render_context: &mut RenderContext,
        ) -> Result<(), NodeRunError> {
            Ok(())
        }
    }

    fn graph_with_sub_graph() -> RenderGraph {
        let mut sub_graph = RenderGraph::new();
        sub_graph.set_input(vec![SlotInfo::new("view", SlotType::Entity)]);

        let mut graph = RenderGraph::new();
        graph.add_node("producer", Producer);
        graph.add_sub_graph("core_3d", sub_graph);
        graph.add_sub_graph("ui", RenderGraph::new());
        graph
    }

    #[test]
    fn test_typed_input_access() {
        let graph = graph_with_sub_graph();
        let node = graph.get_node_state("producer").unwrap();
        let view = EntityId::new();
        let depth = TextureViewId::new();
        let inputs = [SlotValue::Entity(view), SlotValue::TextureView(depth)];
        let mut outputs: [Option<SlotValue>; 1] = [None];
        let ctx = RenderGraphContext::new(&graph, node, &inputs, &mut outputs);

        assert_eq!(ctx.get_input_entity("view"), Ok(view));
        assert_eq!(ctx.get_input_texture(1), Ok(depth));
        assert_eq!(
            ctx.get_input_buffer("depth"),
            Err(InputSlotError::MismatchedSlotType {
                label: SlotLabel::from("depth"),
                expected: SlotType::Buffer,
                actual: SlotType::TextureView,
            })
        );
        assert_eq!(
            ctx.get_input("normals"),
            Err(InputSlotError::InvalidSlot(SlotLabel::from("normals")))
        );
    }

    #[test]
    fn test_set_output_checks_type() {
        let graph = graph_with_sub_graph();
        let node = graph.get_node_state("producer").unwrap();
        let mut outputs: [Option<SlotValue>; 1] = [None];
        let color = TextureViewId::new();
        {
            let mut ctx = RenderGraphContext::new(&graph, node, &[], &mut outputs);
            assert!(matches!(
                ctx.set_output("color", BufferId::new()),
                Err(OutputSlotError::MismatchedSlotType { .. })
            ));
            assert!(matches!(
                ctx.set_output(4, color),
                Err(OutputSlotError::InvalidSlot(SlotLabel::Index(4)))
            ));
            ctx.set_output("color", color).unwrap();
        }
        assert_eq!(outputs[0], Some(SlotValue::TextureView(color)));
    }

    #[test]
    fn test_run_sub_graph_validation() {
        let graph = graph_with_sub_graph();
        let node = graph.get_node_state("producer").unwrap();
        let mut outputs: [Option<SlotValue>; 1] = [None];
        let mut ctx = RenderGraphContext::new(&graph, node, &[], &mut outputs);
        let view = EntityId::new();

        assert_eq!(
            ctx.run_sub_graph("missing", vec![], None),
            Err(RunSubGraphError::MissingSubGraph("missing".to_string()))
        );
        assert!(matches!(
            ctx.run_sub_graph("core_3d", vec![], None),
            Err(RunSubGraphError::MissingInput { slot_index: 0, .. })
        ));
        assert!(matches!(
            ctx.run_sub_graph("core_3d", vec![TextureViewId::new().into()], None),
            Err(RunSubGraphError::MismatchedInputSlotType { slot_index: 0, .. })
        ));
        assert!(matches!(
            ctx.run_sub_graph("core_3d", vec![view.into(), view.into()], None),
            Err(RunSubGraphError::UnexpectedInput { slot_index: 1, .. })
        ));
        assert_eq!(
            ctx.run_sub_graph("ui", vec![view.into()], None),
            Err(RunSubGraphError::SubGraphHasNoInputs("ui".to_string()))
        );

        // Rejected requests stay queued for the runner to fail on
        assert_eq!(ctx.finish().len(), 5);
    }

    #[test]
    fn test_run_sub_graph_queues_in_order() {
        let graph = graph_with_sub_graph();
        let node = graph.get_node_state("producer").unwrap();
        let mut outputs: [Option<SlotValue>; 1] = [None];
        let mut ctx = RenderGraphContext::new(&graph, node, &[], &mut outputs);
        let view = EntityId::new();

        ctx.run_sub_graph("core_3d", vec![view.into()], Some(view)).unwrap();
        ctx.run_sub_graph("ui", vec![], None).unwrap();

        let queued = ctx.finish();
        assert_eq!(queued.len(), 2);
        assert_eq!(queued[0].name, "core_3d");
        assert_eq!(queued[0].view_entity, Some(view));
        assert_eq!(queued[1].name, "ui");
    }

    #[test]
    fn test_view_entity() {
        let mut graph = RenderGraph::new();
        graph.add_node("empty", EmptyNode);
        let node = graph.get_node_state("empty").unwrap();
        let mut outputs: [Option<SlotValue>; 0] = [];
        let mut ctx = RenderGraphContext::new(&graph, node, &[], &mut outputs);

        assert_eq!(ctx.get_view_entity(), None);
        let view = EntityId::new();
        ctx.set_view_entity(view);
        assert_eq!(ctx.view_entity(), view);
    }
}
