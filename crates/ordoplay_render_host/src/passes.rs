// SPDX-License-Identifier: MIT OR Apache-2.0
//! Render passes of the host's frame graph.
//!
//! The top-level graph runs a camera driver that requests one `core_3d`
//! sub-graph run per camera, followed by a UI pass:
//!
//! ```text
//! camera_driver ──> ui
//!      │
//!      └─ core_3d (per view): prepass ─> main_pass ─> tonemapping ─> upscaling
//! ```

use ordoplay_render_graph::{
    EntityId, Node, NodeRunError, RenderContext, RenderGraph, RenderGraphContext, RenderPassDescriptor,
    SlotInfo, SlotType, TextureViewId,
};
use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::Arc;

/// Node names of the top-level graph
pub mod main_graph {
    /// Requests a `core_3d` run per camera
    pub const CAMERA_DRIVER: &str = "camera_driver";
    /// Draws the UI over the swapchain
    pub const UI_PASS: &str = "ui_pass";
}

/// Per-view 3D sub-graph
pub mod core_3d {
    /// Sub-graph name
    pub const NAME: &str = "core_3d";
    /// Input slot carrying the view entity
    pub const IN_VIEW: &str = "view";
    /// Depth-only prepass
    pub const PREPASS: &str = "prepass";
    /// Opaque geometry
    pub const MAIN_PASS: &str = "main_pass";
    /// HDR to LDR
    pub const TONEMAPPING: &str = "tonemapping";
    /// Copy to the final target
    pub const UPSCALING: &str = "upscaling";
}

/// Textures owned by one camera
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ViewTarget {
    /// Depth buffer
    pub depth: TextureViewId,
    /// HDR color buffer
    pub hdr: TextureViewId,
    /// Tonemapped color buffer
    pub ldr: TextureViewId,
    /// Final output
    pub output: TextureViewId,
}

impl ViewTarget {
    /// Allocate handles for a new view
    pub fn new() -> Self {
        Self {
            depth: TextureViewId::new(),
            hdr: TextureViewId::new(),
            ldr: TextureViewId::new(),
            output: TextureViewId::new(),
        }
    }
}

impl Default for ViewTarget {
    fn default() -> Self {
        Self::new()
    }
}

/// View targets keyed by camera entity, shared between host and passes
pub type ViewTargets = Arc<RwLock<HashMap<EntityId, ViewTarget>>>;

/// Cameras in the scene, written by the host
pub type Cameras = Arc<RwLock<Vec<EntityId>>>;

fn view_target(targets: &ViewTargets, view: EntityId) -> Result<ViewTarget, NodeRunError> {
    targets
        .read()
        .get(&view)
        .copied()
        .ok_or_else(|| NodeRunError::Custom(format!("No view target for {view:?}")))
}

/// Requests a `core_3d` run for every camera
pub struct CameraDriverNode {
    cameras: Cameras,
    active: Vec<EntityId>,
}

impl CameraDriverNode {
    /// Create a driver reading the given camera list
    pub fn new(cameras: Cameras) -> Self {
        Self {
            cameras,
            active: Vec::new(),
        }
    }
}

impl Node for CameraDriverNode {
    fn update(&mut self) {
        self.active.clone_from(&self.cameras.read());
    }

    fn run(
        &self,
        graph: &mut RenderGraphContext,
        _render_context: &mut RenderContext,
    ) -> Result<(), NodeRunError> {
        for camera in &self.active {
            graph.run_sub_graph(core_3d::NAME, vec![(*camera).into()], Some(*camera))?;
        }
        Ok(())
    }
}

/// Writes depth for the view
pub struct PrepassNode {
    targets: ViewTargets,
}

impl PrepassNode {
    /// Input slot name
    pub const IN_VIEW: &'static str = "view";
    /// Output slot name
    pub const OUT_DEPTH: &'static str = "depth";

    /// Create the pass
    pub fn new(targets: ViewTargets) -> Self {
        Self { targets }
    }
}

impl Node for PrepassNode {
    fn input(&self) -> Vec<SlotInfo> {
        vec![SlotInfo::new(Self::IN_VIEW, SlotType::Entity)]
    }

    fn output(&self) -> Vec<SlotInfo> {
        vec![SlotInfo::new(Self::OUT_DEPTH, SlotType::TextureView)]
    }

    fn run(
        &self,
        graph: &mut RenderGraphContext,
        render_context: &mut RenderContext,
    ) -> Result<(), NodeRunError> {
        let view = graph.get_input_entity(Self::IN_VIEW)?;
        let target = view_target(&self.targets, view)?;

        {
            let mut pass = render_context.begin_tracked_render_pass(RenderPassDescriptor {
                label: Some("prepass".to_string()),
                color_attachments: Vec::new(),
                depth_stencil_attachment: Some(target.depth),
            });
            pass.set_pipeline("depth_prepass");
            pass.draw(0..36, 0..1);
        }

        graph.set_output(Self::OUT_DEPTH, target.depth)?;
        Ok(())
    }
}

/// Draws opaque geometry into the HDR target
pub struct MainPassNode {
    targets: ViewTargets,
}

impl MainPassNode {
    /// View input
    pub const IN_VIEW: &'static str = "view";
    /// Depth input
    pub const IN_DEPTH: &'static str = "depth";
    /// HDR color output
    pub const OUT_COLOR: &'static str = "color";

    /// Create the pass
    pub fn new(targets: ViewTargets) -> Self {
        Self { targets }
    }
}

impl Node for MainPassNode {
    fn input(&self) -> Vec<SlotInfo> {
        vec![
            SlotInfo::new(Self::IN_VIEW, SlotType::Entity),
            SlotInfo::new(Self::IN_DEPTH, SlotType::TextureView),
        ]
    }

    fn output(&self) -> Vec<SlotInfo> {
        vec![SlotInfo::new(Self::OUT_COLOR, SlotType::TextureView)]
    }

    fn run(
        &self,
        graph: &mut RenderGraphContext,
        render_context: &mut RenderContext,
    ) -> Result<(), NodeRunError> {
        let view = graph.get_input_entity(Self::IN_VIEW)?;
        let depth = graph.get_input_texture(Self::IN_DEPTH)?;
        let target = view_target(&self.targets, view)?;

        {
            let mut pass = render_context.begin_tracked_render_pass(RenderPassDescriptor {
                label: Some("main_opaque_pass".to_string()),
                color_attachments: vec![target.hdr],
                depth_stencil_attachment: Some(depth),
            });
            pass.set_pipeline("opaque");
            pass.draw(0..36, 0..16);
            pass.set_pipeline("opaque");
            pass.draw(0..6, 0..1);
        }

        graph.set_output(Self::OUT_COLOR, target.hdr)?;
        Ok(())
    }
}

/// Maps the HDR target into the LDR target
pub struct TonemappingNode {
    targets: ViewTargets,
}

impl TonemappingNode {
    /// View input
    pub const IN_VIEW: &'static str = "view";
    /// HDR input
    pub const IN_HDR: &'static str = "hdr";
    /// LDR output
    pub const OUT_LDR: &'static str = "ldr";

    /// Create the pass
    pub fn new(targets: ViewTargets) -> Self {
        Self { targets }
    }
}

impl Node for TonemappingNode {
    fn input(&self) -> Vec<SlotInfo> {
        vec![
            SlotInfo::new(Self::IN_VIEW, SlotType::Entity),
            SlotInfo::new(Self::IN_HDR, SlotType::TextureView),
        ]
    }

    fn output(&self) -> Vec<SlotInfo> {
        vec![SlotInfo::new(Self::OUT_LDR, SlotType::TextureView)]
    }

    fn run(
        &self,
        graph: &mut RenderGraphContext,
        render_context: &mut RenderContext,
    ) -> Result<(), NodeRunError> {
        let view = graph.get_input_entity(Self::IN_VIEW)?;
        let hdr = graph.get_input_texture(Self::IN_HDR)?;
        let target = view_target(&self.targets, view)?;

        render_context.command_encoder().insert_debug_marker(format!("tonemap {hdr:?}"));
        {
            let mut pass = render_context.begin_tracked_render_pass(RenderPassDescriptor {
                label: Some("tonemapping".to_string()),
                color_attachments: vec![target.ldr],
                depth_stencil_attachment: None,
            });
            pass.set_pipeline("tonemapping");
            pass.draw(0..3, 0..1);
        }

        graph.set_output(Self::OUT_LDR, target.ldr)?;
        Ok(())
    }
}

/// Copies the LDR target to the view's output
///
/// Has no slots; ordered after tonemapping by a node edge and finds its view
/// through the run's view entity.
pub struct UpscalingNode {
    targets: ViewTargets,
}

impl UpscalingNode {
    /// Create the pass
    pub fn new(targets: ViewTargets) -> Self {
        Self { targets }
    }
}

impl Node for UpscalingNode {
    fn run(
        &self,
        graph: &mut RenderGraphContext,
        render_context: &mut RenderContext,
    ) -> Result<(), NodeRunError> {
        let Some(view) = graph.get_view_entity() else {
            return Err(NodeRunError::Custom("Upscaling needs a view entity".to_string()));
        };
        let target = view_target(&self.targets, view)?;
        render_context
            .command_encoder()
            .copy_texture_to_texture(target.ldr, target.output);
        Ok(())
    }
}

/// Draws the UI straight onto the swapchain
pub struct UiPassNode {
    swapchain: TextureViewId,
}

impl UiPassNode {
    /// Create the pass
    pub fn new(swapchain: TextureViewId) -> Self {
        Self { swapchain }
    }
}

impl Node for UiPassNode {
    fn run(
        &self,
        _graph: &mut RenderGraphContext,
        render_context: &mut RenderContext,
    ) -> Result<(), NodeRunError> {
        let mut pass = render_context.begin_tracked_render_pass(RenderPassDescriptor {
            label: Some("ui_pass".to_string()),
            color_attachments: vec![self.swapchain],
            depth_stencil_attachment: None,
        });
        pass.set_pipeline("ui");
        pass.draw(0..6, 0..1);
        Ok(())
    }
}

/// Build the per-view 3D sub-graph
pub fn build_core_3d(targets: &ViewTargets) -> RenderGraph {
    let mut graph = RenderGraph::new();
    let input = graph.set_input(vec![SlotInfo::new(core_3d::IN_VIEW, SlotType::Entity)]);

    graph.add_node(core_3d::PREPASS, PrepassNode::new(targets.clone()));
    graph.add_node(core_3d::MAIN_PASS, MainPassNode::new(targets.clone()));
    graph.add_node(core_3d::TONEMAPPING, TonemappingNode::new(targets.clone()));
    graph.add_node(core_3d::UPSCALING, UpscalingNode::new(targets.clone()));

    graph.add_slot_edge(input, core_3d::IN_VIEW, core_3d::PREPASS, PrepassNode::IN_VIEW);
    graph.add_slot_edge(input, core_3d::IN_VIEW, core_3d::MAIN_PASS, MainPassNode::IN_VIEW);
    graph.add_slot_edge(input, core_3d::IN_VIEW, core_3d::TONEMAPPING, TonemappingNode::IN_VIEW);
    graph.add_slot_edge(
        core_3d::PREPASS,
        PrepassNode::OUT_DEPTH,
        core_3d::MAIN_PASS,
        MainPassNode::IN_DEPTH,
    );
    graph.add_slot_edge(
        core_3d::MAIN_PASS,
        MainPassNode::OUT_COLOR,
        core_3d::TONEMAPPING,
        TonemappingNode::IN_HDR,
    );
    graph.add_node_edge(core_3d::TONEMAPPING, core_3d::UPSCALING);
    graph
}

/// Build the top-level frame graph
pub fn build_frame_graph(cameras: &Cameras, targets: &ViewTargets, swapchain: TextureViewId) -> RenderGraph {
    let mut graph = RenderGraph::new();
    graph.add_sub_graph(core_3d::NAME, build_core_3d(targets));
    graph.add_node(main_graph::CAMERA_DRIVER, CameraDriverNode::new(cameras.clone()));
    graph.add_node(main_graph::UI_PASS, UiPassNode::new(swapchain));
    graph.add_node_edge(main_graph::CAMERA_DRIVER, main_graph::UI_PASS);
    graph
}
