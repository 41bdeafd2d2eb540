// SPDX-License-Identifier: MIT OR Apache-2.0
//! Graph execution.
//!
//! The runner walks a worklist seeded with every node that has no input
//! slots. A node whose producers have not run yet goes back to the front of
//! the queue; a node that ran pushes its dependents to the front, so fresh
//! work is tried before deferred work. Sub-graphs requested by a node run
//! right after it, in request order, into the same [`RenderContext`].

use crate::context::{check_graph_inputs, InputMismatch, RenderGraphContext};
use crate::edge::Edge;
use crate::graph::{RenderGraph, RenderGraphError};
use crate::node::{NodeId, NodeRunError, NodeState};
use crate::render_context::{CommandBuffer, RenderContext};
use crate::resource::EntityId;
use crate::settings::RunnerSettings;
use crate::slot::{SlotType, SlotValue};
use std::borrow::Cow;
use std::collections::{HashMap, VecDeque};

/// Runs render graphs, once per frame
#[derive(Debug, Clone, Default)]
pub struct RenderGraphRunner {
    settings: RunnerSettings,
}

impl RenderGraphRunner {
    /// Create a runner
    pub fn new(settings: RunnerSettings) -> Self {
        Self { settings }
    }

    /// Active settings
    pub fn settings(&self) -> &RunnerSettings {
        &self.settings
    }

    /// Run a top-level graph into a fresh context
    ///
    /// Command buffers are only handed back when the whole run succeeded.
    pub fn run(&self, graph: &RenderGraph) -> Result<Vec<CommandBuffer>, RenderGraphRunnerError> {
        let mut render_context = RenderContext::new();
        self.run_with_context(graph, &mut render_context, &[], None)?;
        Ok(render_context.finish())
    }

    /// Run a top-level graph into a caller-owned context
    pub fn run_with_context(
        &self,
        graph: &RenderGraph,
        render_context: &mut RenderContext,
        inputs: &[SlotValue],
        view_entity: Option<EntityId>,
    ) -> Result<(), RenderGraphRunnerError> {
        if self.settings.validate_graphs {
            graph
                .validate()
                .map_err(RenderGraphRunnerError::InvalidGraph)?;
        }

        Self::run_graph(graph, None, render_context, inputs, view_entity).map_err(|err| {
            tracing::warn!("Render graph run aborted: {}", err);
            err
        })
    }

    fn run_graph(
        graph: &RenderGraph,
        graph_name: Option<&str>,
        render_context: &mut RenderContext,
        inputs: &[SlotValue],
        view_entity: Option<EntityId>,
    ) -> Result<(), RenderGraphRunnerError> {
        let span = tracing::debug_span!("run_graph", name = graph_name.unwrap_or("<root>"));
        let _guard = span.enter();

        let mut node_outputs: HashMap<NodeId, Vec<SlotValue>> = HashMap::new();
        let mut node_queue: VecDeque<&NodeState> = graph
            .iter_nodes()
            .filter(|node| node.input_slots.is_empty())
            .collect();

        // The input node never runs; its outputs are the checked graph inputs
        if let Some(input_node) = graph.get_input_node() {
            check_graph_inputs(&input_node.input_slots, inputs)
                .map_err(|mismatch| RenderGraphRunnerError::from_input_mismatch(mismatch, graph_name))?;
            node_outputs.insert(input_node.id, inputs.to_vec());
            for (_, dependent) in graph.iter_node_outputs(input_node.id)? {
                node_queue.push_front(dependent);
            }
        } else if !inputs.is_empty() {
            return Err(RenderGraphRunnerError::UnexpectedInput {
                graph_name: graph_name.map(str::to_string),
                slot_index: 0,
            });
        }

        // Deferrals since the last node that ran
        let mut stalled = 0usize;

        'handle_node: while let Some(node_state) = node_queue.pop_back() {
            if node_outputs.contains_key(&node_state.id) {
                continue;
            }

            let mut slot_indices_and_inputs: Vec<(usize, SlotValue)> = Vec::new();
            for (edge, input_node) in graph.iter_node_inputs(node_state.id)? {
                let Some(outputs) = node_outputs.get(&input_node.id) else {
                    stalled += 1;
                    if stalled > node_queue.len() {
                        let mut nodes: Vec<NodeId> = node_queue.iter().map(|node| node.id).collect();
                        nodes.push(node_state.id);
                        nodes.sort_unstable();
                        nodes.dedup();
                        return Err(RenderGraphRunnerError::DependencyCycle {
                            graph_name: graph_name.map(str::to_string),
                            nodes,
                        });
                    }

                    tracing::trace!("Deferring node {}, waiting on {}", node_state.label(), input_node.label());
                    node_queue.push_front(node_state);
                    continue 'handle_node;
                };

                if let Edge::SlotEdge {
                    output_index,
                    input_index,
                    ..
                } = edge
                {
                    // Out-of-range indices fall through to the count check
                    if let Some(value) = outputs.get(*output_index) {
                        slot_indices_and_inputs.push((*input_index, *value));
                    }
                }
            }
            stalled = 0;

            slot_indices_and_inputs.sort_by_key(|(index, _)| *index);
            let inputs: Vec<SlotValue> = slot_indices_and_inputs
                .into_iter()
                .map(|(_, value)| value)
                .collect();

            if inputs.len() != node_state.input_slots.len() {
                return Err(RenderGraphRunnerError::MismatchedInputCount {
                    node: node_state.id,
                    slot_count: node_state.input_slots.len(),
                    input_count: inputs.len(),
                });
            }

            let mut outputs: Vec<Option<SlotValue>> = vec![None; node_state.output_slots.len()];
            let run_sub_graphs = {
                let mut context = RenderGraphContext::new(graph, node_state, &inputs, &mut outputs);
                if let Some(view_entity) = view_entity {
                    context.set_view_entity(view_entity);
                }

                tracing::trace!("Running node {} ({})", node_state.label(), node_state.type_name);
                node_state.node.run(&mut context, render_context)?;
                context.finish()
            };

            for run_sub_graph in run_sub_graphs {
                let sub_graph = graph
                    .get_sub_graph(&run_sub_graph.name)
                    .ok_or_else(|| RenderGraphRunnerError::MissingSubGraph(run_sub_graph.name.to_string()))?;

                tracing::debug!(
                    "Node {} runs sub-graph '{}'",
                    node_state.label(),
                    run_sub_graph.name
                );
                Self::run_graph(
                    sub_graph,
                    Some(&*run_sub_graph.name),
                    render_context,
                    &run_sub_graph.inputs,
                    run_sub_graph.view_entity,
                )?;
            }

            let mut values = Vec::with_capacity(outputs.len());
            for (slot_index, output) in outputs.into_iter().enumerate() {
                let Some(value) = output else {
                    let slot_name = node_state
                        .output_slots
                        .get_slot(slot_index)
                        .map(|slot| slot.name.clone())
                        .unwrap_or_default();
                    return Err(RenderGraphRunnerError::EmptyNodeOutputSlot {
                        type_name: node_state.type_name,
                        slot_index,
                        slot_name,
                    });
                };
                values.push(value);
            }
            node_outputs.insert(node_state.id, values);

            for (_, dependent) in graph.iter_node_outputs(node_state.id)? {
                node_queue.push_front(dependent);
            }
        }

        Ok(())
    }
}

/// Error returned by [`RenderGraphRunner`]
///
/// Any error aborts the whole run, sub-graphs included.
#[derive(Debug, thiserror::Error)]
pub enum RenderGraphRunnerError {
    /// A node failed
    #[error(transparent)]
    NodeRunError(#[from] NodeRunError),

    /// A node returned without filling an output slot
    #[error("Node (type={type_name}) has no value in output slot {slot_index} ('{slot_name}')")]
    EmptyNodeOutputSlot {
        /// Node type
        type_name: &'static str,
        /// Empty slot
        slot_index: usize,
        /// Empty slot name
        slot_name: Cow<'static, str>,
    },

    /// Fewer graph inputs than declared
    #[error("Graph {graph_name:?} is missing input {slot_index} ('{slot_name}')")]
    MissingInput {
        /// Missing slot
        slot_index: usize,
        /// Missing slot name
        slot_name: Cow<'static, str>,
        /// Graph, `None` for the top level
        graph_name: Option<String>,
    },

    /// More graph inputs than declared
    #[error("Graph {graph_name:?} was given an extra input at {slot_index}")]
    UnexpectedInput {
        /// Graph, `None` for the top level
        graph_name: Option<String>,
        /// First extra value
        slot_index: usize,
    },

    /// Graph input of the wrong type
    #[error("Graph {graph_name:?} input {slot_index} expects {expected}, got {actual}")]
    MismatchedInputSlotType {
        /// Graph, `None` for the top level
        graph_name: Option<String>,
        /// Slot
        slot_index: usize,
        /// Declared type
        expected: SlotType,
        /// Given type
        actual: SlotType,
    },

    /// Resolved inputs do not cover the node's input slots
    #[error("Node {node} has {slot_count} input slots but received {input_count} inputs")]
    MismatchedInputCount {
        /// Node
        node: NodeId,
        /// Declared input slots
        slot_count: usize,
        /// Resolved inputs
        input_count: usize,
    },

    /// A requested sub-graph does not exist
    #[error("Sub-graph '{0}' does not exist")]
    MissingSubGraph(String),

    /// Every queued node waits on a node that can never run
    #[error("Graph {graph_name:?} cannot make progress, nodes {nodes:?} wait on each other")]
    DependencyCycle {
        /// Graph, `None` for the top level
        graph_name: Option<String>,
        /// Nodes still waiting
        nodes: Vec<NodeId>,
    },

    /// Pre-run validation failed
    #[error("Graph failed validation: {0}")]
    InvalidGraph(#[from] RenderGraphError),
}

impl RenderGraphRunnerError {
    fn from_input_mismatch(mismatch: InputMismatch, graph_name: Option<&str>) -> Self {
        let graph_name = graph_name.map(str::to_string);
        match mismatch {
            InputMismatch::Missing { slot_index, slot_name } => Self::MissingInput {
                slot_index,
                slot_name,
                graph_name,
            },
            InputMismatch::WrongType {
                slot_index,
                expected,
                actual,
            } => Self::MismatchedInputSlotType {
                graph_name,
                slot_index,
                expected,
                actual,
            },
            InputMismatch::Unexpected { slot_index } => Self::UnexpectedInput {
                graph_name,
                slot_index,
            },
        }
    }
}
