use std::sync::Arc;

use bytemuck::{Pod, Zeroable};
use glam::{Vec3, Vec4};

use super::{FRAME_DATA_BINDING, skip_pass};
use crate::errors::Result;
use crate::renderer::core::command::{
    ColorAttachment, DepthStencilAttachment, RenderPassDescriptor,
};
use crate::renderer::core::{BindingResource, CommandBuffer, GpuBuffer, GraphicsDevice};
use crate::renderer::graph::RenderNode;
use crate::renderer::graph::context::ExecuteContext;

// ============================================================================
// Debug line geometry
// ============================================================================

#[repr(C)]
#[derive(Clone, Copy, Debug, PartialEq, Pod, Zeroable)]
pub struct DebugVertex {
    pub position: Vec4,
    pub color: Vec4,
}

impl DebugVertex {
    const ATTRIBUTES: [wgpu::VertexAttribute; 2] =
        wgpu::vertex_attr_array![0 => Float32x4, 1 => Float32x4];

    #[must_use]
    pub fn new(position: Vec3, color: Vec3) -> Self {
        Self {
            position: position.extend(1.0),
            color: color.extend(1.0),
        }
    }

    #[must_use]
    pub fn layout() -> wgpu::VertexBufferLayout<'static> {
        wgpu::VertexBufferLayout {
            array_stride: std::mem::size_of::<Self>() as wgpu::BufferAddress,
            step_mode: wgpu::VertexStepMode::Vertex,
            attributes: &Self::ATTRIBUTES,
        }
    }
}

/// Line-list geometry drawn by the forward/debug pass.
#[derive(Debug)]
pub struct DebugLines {
    buffer: Option<GpuBuffer>,
    vertex_count: u32,
}

impl DebugLines {
    /// World-space X/Y/Z axes, colored red/green/blue.
    pub fn axes(device: &Arc<dyn GraphicsDevice>, length: f32) -> Result<Self> {
        let vertices: Vec<DebugVertex> = [Vec3::X, Vec3::Y, Vec3::Z]
            .into_iter()
            .flat_map(|axis| {
                [
                    DebugVertex::new(Vec3::ZERO, axis),
                    DebugVertex::new(axis * length, axis),
                ]
            })
            .collect();
        Self::from_vertices(device, &vertices)
    }

    pub fn from_vertices(device: &Arc<dyn GraphicsDevice>, vertices: &[DebugVertex]) -> Result<Self> {
        if vertices.is_empty() {
            return Ok(Self::empty());
        }
        let buffer = GpuBuffer::with_contents(
            device,
            "Debug Lines",
            wgpu::BufferUsages::VERTEX,
            bytemuck::cast_slice(vertices),
        )?;
        Ok(Self {
            buffer: Some(buffer),
            vertex_count: vertices.len() as u32,
        })
    }

    #[must_use]
    pub fn empty() -> Self {
        Self {
            buffer: None,
            vertex_count: 0,
        }
    }

    #[inline]
    #[must_use]
    pub fn vertex_count(&self) -> u32 {
        self.vertex_count
    }
}

// ============================================================================
// Pass
// ============================================================================

/// Draws debug lines over the lit image.
///
/// The surface image is loaded, not cleared, and depth testing uses the
/// pass's own depth-stencil so lines never depend on G-buffer depth.
pub struct ForwardDebugPass;

impl RenderNode for ForwardDebugPass {
    fn name(&self) -> &str {
        "Forward Debug Pass"
    }

    fn run(&self, ctx: &ExecuteContext, commands: &mut CommandBuffer) {
        let Some(image) = ctx.surface_image else {
            skip_pass(self.name(), "no surface image");
            return;
        };
        let Some(targets) = ctx.resources.targets() else {
            skip_pass(self.name(), "surface targets are missing");
            return;
        };

        let color_attachments = [ColorAttachment {
            view: image.view,
            extent: image.extent,
            load: wgpu::LoadOp::Load,
        }];
        let desc = RenderPassDescriptor {
            label: self.name(),
            color_attachments: &color_attachments,
            depth_stencil: Some(DepthStencilAttachment {
                view: targets.forward_depth_stencil.view(),
                extent: targets.forward_depth_stencil.extent(),
                depth_load: wgpu::LoadOp::Clear(1.0),
                stencil_load: Some(wgpu::LoadOp::Clear(0)),
            }),
        };
        let Some(mut pass) = commands.begin_render_pass(&desc) else {
            skip_pass(self.name(), "surface image and debug depth sizes differ");
            return;
        };

        let lines = ctx.debug_lines;
        let Some(buffer) = &lines.buffer else {
            return;
        };
        pass.set_pipeline(ctx.pipelines.forward_debug);
        let (group, binding) = FRAME_DATA_BINDING;
        pass.set_binding(group, binding, BindingResource::Buffer(ctx.frame_data));
        pass.set_vertex_buffer(0, buffer.id());
        pass.draw(0..lines.vertex_count, 0..1);
    }
}
