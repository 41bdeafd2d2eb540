// SPDX-License-Identifier: MIT OR Apache-2.0
//! Render graph execution engine for `OrdoPlay`.
//!
//! A frame's GPU work is described as a graph of nodes:
//! - Typed input/output slots carrying opaque resource handles
//! - Slot edges (data + ordering) and node edges (ordering only)
//! - Named sub-graphs, run on request by a node
//!
//! ## Architecture
//!
//! The graph is built once by a single owner, then handed read-only to a
//! [`RenderGraphRunner`] every frame. The runner resolves dependencies with a
//! deferring worklist, feeds each node its inputs ordered by slot index and
//! records everything into one [`RenderContext`]. Any error aborts the frame.

pub mod context;
pub mod edge;
pub mod graph;
pub mod node;
pub mod render_context;
pub mod resource;
pub mod runner;
pub mod settings;
pub mod slot;

pub use context::{InputSlotError, OutputSlotError, RenderGraphContext, RunSubGraph, RunSubGraphError};
pub use edge::{Edge, EdgeExistence, Edges};
pub use graph::{RenderGraph, RenderGraphError};
pub use node::{EmptyNode, GraphInputNode, Node, NodeId, NodeLabel, NodeRunError, NodeState};
pub use render_context::{
    CommandBuffer, CommandEncoder, ComputePass, GpuCommand, RenderContext, RenderPassDescriptor,
    TrackedRenderPass,
};
pub use resource::{BufferId, EntityId, SamplerId, TextureViewId};
pub use runner::{RenderGraphRunner, RenderGraphRunnerError};
pub use settings::{RunnerSettings, SettingsError};
pub use slot::{SlotInfo, SlotInfos, SlotLabel, SlotType, SlotValue};
