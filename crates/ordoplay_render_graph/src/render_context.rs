// SPDX-License-Identifier: MIT OR Apache-2.0
//! Command recording surface shared by every node of one graph run.
//!
//! Nodes record into a [`RenderContext`]; the host takes the finished
//! [`CommandBuffer`]s and submits them to whatever device backs the handles.

use crate::resource::{BufferId, TextureViewId};
use std::ops::Range;

/// A recorded GPU command
#[derive(Debug, Clone, PartialEq)]
pub enum GpuCommand {
    /// Start of a render pass
    BeginRenderPass {
        /// Debug label
        label: Option<String>,
        /// Color targets
        color_attachments: Vec<TextureViewId>,
        /// Depth/stencil target
        depth_stencil_attachment: Option<TextureViewId>,
    },
    /// End of the current render pass
    EndRenderPass,
    /// Start of a compute pass
    BeginComputePass {
        /// Debug label
        label: Option<String>,
    },
    /// End of the current compute pass
    EndComputePass,
    /// Bind a pipeline by name
    SetPipeline(String),
    /// Bind a buffer to a bind group slot
    SetBindGroup {
        /// Bind group index
        index: u32,
        /// Bound buffer
        buffer: BufferId,
    },
    /// Non-indexed draw
    Draw {
        /// Vertex range
        vertices: Range<u32>,
        /// Instance range
        instances: Range<u32>,
    },
    /// Compute dispatch
    Dispatch {
        /// Workgroups in x
        x: u32,
        /// Workgroups in y
        y: u32,
        /// Workgroups in z
        z: u32,
    },
    /// Buffer copy
    CopyBufferToBuffer {
        /// Source buffer
        source: BufferId,
        /// Destination buffer
        destination: BufferId,
        /// Bytes to copy
        size: u64,
    },
    /// Full texture copy
    CopyTextureToTexture {
        /// Source texture
        source: TextureViewId,
        /// Destination texture
        destination: TextureViewId,
    },
    /// Debug marker
    InsertDebugMarker(String),
}

/// Finished list of commands, ready for submission
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CommandBuffer {
    /// Debug label
    pub label: Option<String>,
    /// Commands in recording order
    pub commands: Vec<GpuCommand>,
}

/// Description of a render pass
#[derive(Debug, Clone, Default)]
pub struct RenderPassDescriptor {
    /// Debug label
    pub label: Option<String>,
    /// Color targets
    pub color_attachments: Vec<TextureViewId>,
    /// Depth/stencil target
    pub depth_stencil_attachment: Option<TextureViewId>,
}

/// Records commands into a buffer
#[derive(Debug, Default)]
pub struct CommandEncoder {
    label: Option<String>,
    commands: Vec<GpuCommand>,
}

impl CommandEncoder {
    /// Create a new encoder
    pub fn new(label: Option<String>) -> Self {
        Self {
            label,
            commands: Vec::new(),
        }
    }

    /// Commands recorded so far
    pub fn commands(&self) -> &[GpuCommand] {
        &self.commands
    }

    /// Open a render pass; it ends when the returned pass is dropped
    pub fn begin_render_pass(&mut self, descriptor: RenderPassDescriptor) -> TrackedRenderPass<'_> {
        self.commands.push(GpuCommand::BeginRenderPass {
            label: descriptor.label,
            color_attachments: descriptor.color_attachments,
            depth_stencil_attachment: descriptor.depth_stencil_attachment,
        });
        TrackedRenderPass {
            encoder: self,
            pipeline: None,
        }
    }

    /// Open a compute pass; it ends when the returned pass is dropped
    pub fn begin_compute_pass(&mut self, label: Option<String>) -> ComputePass<'_> {
        self.commands.push(GpuCommand::BeginComputePass { label });
        ComputePass { encoder: self }
    }

    /// Copy between buffers
    pub fn copy_buffer_to_buffer(&mut self, source: BufferId, destination: BufferId, size: u64) {
        self.commands.push(GpuCommand::CopyBufferToBuffer {
            source,
            destination,
            size,
        });
    }

    /// Copy between textures
    pub fn copy_texture_to_texture(&mut self, source: TextureViewId, destination: TextureViewId) {
        self.commands
            .push(GpuCommand::CopyTextureToTexture { source, destination });
    }

    /// Insert a debug marker
    pub fn insert_debug_marker(&mut self, marker: impl Into<String>) {
        self.commands.push(GpuCommand::InsertDebugMarker(marker.into()));
    }

    /// Close the encoder
    pub fn finish(self) -> CommandBuffer {
        CommandBuffer {
            label: self.label,
            commands: self.commands,
        }
    }
}

/// Render pass that skips redundant pipeline binds
pub struct TrackedRenderPass<'a> {
    encoder: &'a mut CommandEncoder,
    pipeline: Option<String>,
}

impl TrackedRenderPass<'_> {
    /// Bind a pipeline unless it is already bound
    pub fn set_pipeline(&mut self, pipeline: &str) {
        if self.pipeline.as_deref() == Some(pipeline) {
            return;
        }
        self.pipeline = Some(pipeline.to_string());
        self.encoder
            .commands
            .push(GpuCommand::SetPipeline(pipeline.to_string()));
    }

    /// Bind a buffer to a bind group slot
    pub fn set_bind_group(&mut self, index: u32, buffer: BufferId) {
        self.encoder
            .commands
            .push(GpuCommand::SetBindGroup { index, buffer });
    }

    /// Record a draw
    pub fn draw(&mut self, vertices: Range<u32>, instances: Range<u32>) {
        self.encoder
            .commands
            .push(GpuCommand::Draw { vertices, instances });
    }
}

impl Drop for TrackedRenderPass<'_> {
    fn drop(&mut self) {
        self.encoder.commands.push(GpuCommand::EndRenderPass);
    }
}

/// Compute pass recorder
pub struct ComputePass<'a> {
    encoder: &'a mut CommandEncoder,
}

impl ComputePass<'_> {
    /// Bind a pipeline
    pub fn set_pipeline(&mut self, pipeline: &str) {
        self.encoder
            .commands
            .push(GpuCommand::SetPipeline(pipeline.to_string()));
    }

    /// Dispatch workgroups
    pub fn dispatch_workgroups(&mut self, x: u32, y: u32, z: u32) {
        self.encoder.commands.push(GpuCommand::Dispatch { x, y, z });
    }
}

impl Drop for ComputePass<'_> {
    fn drop(&mut self) {
        self.encoder.commands.push(GpuCommand::EndComputePass);
    }
}

/// Mutable state threaded through one graph run, sub-graphs included
#[derive(Debug, Default)]
pub struct RenderContext {
    command_encoder: Option<CommandEncoder>,
    command_buffers: Vec<CommandBuffer>,
}

impl RenderContext {
    /// Create an empty context
    pub fn new() -> Self {
        Self::default()
    }

    /// Current encoder, opened on first use
    pub fn command_encoder(&mut self) -> &mut CommandEncoder {
        self.command_encoder.get_or_insert_with(|| CommandEncoder::new(None))
    }

    /// Open a render pass on the current encoder
    pub fn begin_tracked_render_pass(&mut self, descriptor: RenderPassDescriptor) -> TrackedRenderPass<'_> {
        self.command_encoder().begin_render_pass(descriptor)
    }

    /// Append a finished buffer after everything recorded so far
    pub fn add_command_buffer(&mut self, command_buffer: CommandBuffer) {
        self.flush_encoder();
        self.command_buffers.push(command_buffer);
    }

    /// Number of buffers closed so far (the open encoder is not counted)
    pub fn command_buffer_count(&self) -> usize {
        self.command_buffers.len()
    }

    /// Close the open encoder and return every buffer in recording order
    pub fn finish(mut self) -> Vec<CommandBuffer> {
        self.flush_encoder();
        self.command_buffers
    }

    fn flush_encoder(&mut self) {
        if let Some(encoder) = self.command_encoder.take() {
            self.command_buffers.push(encoder.finish());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tracked_pass_skips_redundant_pipelines() {
        let mut context = RenderContext::new();
        let target = TextureViewId::new();
        {
            let mut pass = context.begin_tracked_render_pass(RenderPassDescriptor {
                label: Some("main".to_string()),
                color_attachments: vec![target],
                depth_stencil_attachment: None,
            });
            pass.set_pipeline("opaque");
            pass.draw(0..3, 0..1);
            pass.set_pipeline("opaque");
            pass.draw(0..6, 0..2);
            pass.set_pipeline("transparent");
        }

        let buffers = context.finish();
        assert_eq!(buffers.len(), 1);
        let commands = &buffers[0].commands;
        assert_eq!(
            commands
                .iter()
                .filter(|c| matches!(c, GpuCommand::SetPipeline(_)))
                .count(),
            2
        );
        assert_eq!(commands.last(), Some(&GpuCommand::EndRenderPass));
    }

    #[test]
    fn test_compute_pass_closes_on_drop() {
        let mut encoder = CommandEncoder::new(Some("culling".to_string()));
        {
            let mut pass = encoder.begin_compute_pass(None);
            pass.set_pipeline("light_culling");
            pass.dispatch_workgroups(8, 8, 1);
        }
        let buffer = encoder.finish();
        assert_eq!(buffer.label.as_deref(), Some("culling"));
        assert_eq!(buffer.commands.len(), 4);
        assert_eq!(buffer.commands[3], GpuCommand::EndComputePass);
    }

    #[test]
    fn test_added_buffers_keep_recording_order() {
        let mut context = RenderContext::new();
        context.command_encoder().insert_debug_marker("first");
        context.add_command_buffer(CommandBuffer {
            label: Some("external".to_string()),
            commands: vec![],
        });
        context.command_encoder().insert_debug_marker("third");
        assert_eq!(context.command_buffer_count(), 2);

        let buffers = context.finish();
        assert_eq!(buffers.len(), 3);
        assert_eq!(
            buffers[0].commands,
            vec![GpuCommand::InsertDebugMarker("first".to_string())]
        );
        assert_eq!(buffers[1].label.as_deref(), Some("external"));
        assert_eq!(
            buffers[2].commands,
            vec![GpuCommand::InsertDebugMarker("third".to_string())]
        );
    }

    #[test]
    fn test_empty_context_finishes_empty() {
        assert!(RenderContext::new().finish().is_empty());
    }
}
