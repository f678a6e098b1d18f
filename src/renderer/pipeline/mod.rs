//! Pipeline library
//!
//! Creates every pipeline the frame pipeline uses, once, at startup. Shader
//! stages are referenced by entry-point name; their source is supplied to
//! the device by the caller. The ray-trace kernel is only required when the
//! device supports acceleration structures. Any creation failure is fatal
//! and returned from [`PipelineLibrary::new`].

use crate::errors::Result;
use crate::renderer::core::GpuContext;
use crate::renderer::core::descriptors::{
    ColorTarget, ComputePipelineDescriptor, RenderPipelineDescriptor,
};
use crate::renderer::core::handles::PipelineId;
use crate::renderer::graph::frame_resources::{
    DEPTH_STENCIL_FORMAT, GBUFFER_ALBEDO_FORMAT, GBUFFER_DEPTH_FORMAT, GBUFFER_NORMAL_FORMAT,
    SHADOW_MAP_FORMAT,
};
use crate::renderer::graph::passes::forward_debug::DebugVertex;
use crate::scene::Vertex;

/// Entry points the shader library must export.
pub mod shader_names {
    pub const SHADOW_VERTEX: &str = "shadow_vertex";
    pub const GBUFFER_VERTEX: &str = "gbuffer_vertex";
    pub const GBUFFER_FRAGMENT: &str = "gbuffer_fragment";
    pub const LIGHTING_VERTEX: &str = "fullscreen_vertex";
    pub const DIRECTIONAL_LIGHT_FRAGMENT: &str = "directional_light_fragment";
    pub const RAY_TRACE_KERNEL: &str = "ray_trace_kernel";
    pub const FORWARD_DEBUG_VERTEX: &str = "forward_debug_vertex";
    pub const FORWARD_DEBUG_FRAGMENT: &str = "forward_debug_fragment";

    /// Every name above, in creation order.
    pub const ALL: [&str; 8] = [
        SHADOW_VERTEX,
        GBUFFER_VERTEX,
        GBUFFER_FRAGMENT,
        LIGHTING_VERTEX,
        DIRECTIONAL_LIGHT_FRAGMENT,
        RAY_TRACE_KERNEL,
        FORWARD_DEBUG_VERTEX,
        FORWARD_DEBUG_FRAGMENT,
    ];
}

fn stencil_face(
    compare: wgpu::CompareFunction,
    pass_op: wgpu::StencilOperation,
) -> wgpu::StencilFaceState {
    wgpu::StencilFaceState {
        compare,
        fail_op: wgpu::StencilOperation::Keep,
        depth_fail_op: wgpu::StencilOperation::Keep,
        pass_op,
    }
}

/// Handles of every pipeline, created once.
#[derive(Debug, Clone, Copy)]
pub struct PipelineLibrary {
    pub shadow: PipelineId,
    pub gbuffer: PipelineId,
    pub lighting: PipelineId,
    /// `None` on devices without acceleration-structure support.
    pub ray_trace: Option<PipelineId>,
    pub forward_debug: PipelineId,
}

impl PipelineLibrary {
    pub fn new(ctx: &GpuContext, surface_format: wgpu::TextureFormat) -> Result<Self> {
        let device = &ctx.device;

        // Depth-only render from the light.
        let shadow = device.create_render_pipeline(&RenderPipelineDescriptor {
            label: "Shadow Pipeline",
            vertex_entry: shader_names::SHADOW_VERTEX,
            fragment_entry: None,
            vertex_buffers: vec![Vertex::layout()],
            topology: wgpu::PrimitiveTopology::TriangleList,
            cull_mode: Some(wgpu::Face::Back),
            color_targets: Vec::new(),
            depth_stencil: Some(wgpu::DepthStencilState {
                format: SHADOW_MAP_FORMAT,
                depth_write_enabled: Some(true),
                depth_compare: Some(wgpu::CompareFunction::LessEqual),
                stencil: wgpu::StencilState::default(),
                bias: wgpu::DepthBiasState {
                    constant: 2,
                    slope_scale: 2.0,
                    clamp: 0.0,
                },
            }),
        })?;

        // Writes the stencil reference wherever geometry lands.
        let write_reference = stencil_face(
            wgpu::CompareFunction::Always,
            wgpu::StencilOperation::Replace,
        );
        let gbuffer = device.create_render_pipeline(&RenderPipelineDescriptor {
            label: "GBuffer Pipeline",
            vertex_entry: shader_names::GBUFFER_VERTEX,
            fragment_entry: Some(shader_names::GBUFFER_FRAGMENT),
            vertex_buffers: vec![Vertex::layout()],
            topology: wgpu::PrimitiveTopology::TriangleList,
            cull_mode: Some(wgpu::Face::Back),
            color_targets: vec![
                ColorTarget::opaque(GBUFFER_ALBEDO_FORMAT),
                ColorTarget::opaque(GBUFFER_NORMAL_FORMAT),
                ColorTarget::opaque(GBUFFER_DEPTH_FORMAT),
            ],
            depth_stencil: Some(wgpu::DepthStencilState {
                format: DEPTH_STENCIL_FORMAT,
                depth_write_enabled: Some(true),
                depth_compare: Some(wgpu::CompareFunction::Less),
                stencil: wgpu::StencilState {
                    front: write_reference,
                    back: write_reference,
                    read_mask: 0xFF,
                    write_mask: 0xFF,
                },
                bias: wgpu::DepthBiasState::default(),
            }),
        })?;

        // Full-screen triangle gated by stencil equality; additive so several
        // lights could accumulate.
        let test_reference = stencil_face(wgpu::CompareFunction::Equal, wgpu::StencilOperation::Keep);
        let lighting = device.create_render_pipeline(&RenderPipelineDescriptor {
            label: "Directional Light Pipeline",
            vertex_entry: shader_names::LIGHTING_VERTEX,
            fragment_entry: Some(shader_names::DIRECTIONAL_LIGHT_FRAGMENT),
            vertex_buffers: Vec::new(),
            topology: wgpu::PrimitiveTopology::TriangleList,
            cull_mode: None,
            color_targets: vec![ColorTarget {
                format: surface_format,
                blend: Some(wgpu::BlendState {
                    color: wgpu::BlendComponent {
                        src_factor: wgpu::BlendFactor::One,
                        dst_factor: wgpu::BlendFactor::One,
                        operation: wgpu::BlendOperation::Add,
                    },
                    alpha: wgpu::BlendComponent::OVER,
                }),
            }],
            depth_stencil: Some(wgpu::DepthStencilState {
                format: DEPTH_STENCIL_FORMAT,
                depth_write_enabled: Some(false),
                depth_compare: Some(wgpu::CompareFunction::Always),
                stencil: wgpu::StencilState {
                    front: test_reference,
                    back: test_reference,
                    read_mask: 0xFF,
                    write_mask: 0x00,
                },
                bias: wgpu::DepthBiasState::default(),
            }),
        })?;

        let ray_trace = if device.supports_acceleration_structures() {
            Some(device.create_compute_pipeline(&ComputePipelineDescriptor {
                label: "Ray Trace Pipeline",
                entry: shader_names::RAY_TRACE_KERNEL,
            })?)
        } else {
            log::warn!("Acceleration structures unsupported; ray trace pipeline not created");
            None
        };

        let forward_debug = device.create_render_pipeline(&RenderPipelineDescriptor {
            label: "Forward Debug Pipeline",
            vertex_entry: shader_names::FORWARD_DEBUG_VERTEX,
            fragment_entry: Some(shader_names::FORWARD_DEBUG_FRAGMENT),
            vertex_buffers: vec![DebugVertex::layout()],
            topology: wgpu::PrimitiveTopology::LineList,
            cull_mode: None,
            color_targets: vec![ColorTarget::opaque(surface_format)],
            depth_stencil: Some(wgpu::DepthStencilState {
                format: DEPTH_STENCIL_FORMAT,
                depth_write_enabled: Some(true),
                depth_compare: Some(wgpu::CompareFunction::Less),
                stencil: wgpu::StencilState::default(),
                bias: wgpu::DepthBiasState::default(),
            }),
        })?;

        log::info!("Render pipelines created");
        Ok(Self {
            shadow,
            gbuffer,
            lighting,
            ray_trace,
            forward_debug,
        })
    }
}
