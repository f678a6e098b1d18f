//! Resource and pipeline descriptors understood by every [`GraphicsDevice`](super::GraphicsDevice).
//!
//! Plain value types (formats, usages, compare functions) are borrowed from
//! `wgpu`; only object identity is abstracted behind handles.

use super::handles::{BufferId, Extent2d};

/// Describes a GPU buffer allocation.
#[derive(Clone, Debug)]
pub struct BufferDescriptor<'a> {
    pub label: &'a str,
    pub size: u64,
    pub usage: wgpu::BufferUsages,
}

/// Describes a 2D (array) texture allocation.
#[derive(Clone, Debug)]
pub struct TextureDescriptor<'a> {
    pub label: &'a str,
    pub size: Extent2d,
    pub array_layers: u32,
    pub format: wgpu::TextureFormat,
    pub usage: wgpu::TextureUsages,
}

impl<'a> TextureDescriptor<'a> {
    /// Single-layer 2D texture.
    #[must_use]
    pub fn new_2d(
        label: &'a str,
        size: Extent2d,
        format: wgpu::TextureFormat,
        usage: wgpu::TextureUsages,
    ) -> Self {
        Self {
            label,
            size,
            array_layers: 1,
            format,
            usage,
        }
    }
}

/// Describes a texture sampler.
#[derive(Clone, Debug)]
pub struct SamplerDescriptor<'a> {
    pub label: &'a str,
    pub address_mode: wgpu::AddressMode,
    pub filter: wgpu::FilterMode,
    pub compare: Option<wgpu::CompareFunction>,
}

/// One color attachment slot of a render pipeline.
#[derive(Clone, Copy, Debug)]
pub struct ColorTarget {
    pub format: wgpu::TextureFormat,
    pub blend: Option<wgpu::BlendState>,
}

impl ColorTarget {
    #[must_use]
    pub const fn opaque(format: wgpu::TextureFormat) -> Self {
        Self { format, blend: None }
    }
}

/// Describes a render pipeline built from named shader-library entry points.
#[derive(Clone, Debug)]
pub struct RenderPipelineDescriptor<'a> {
    pub label: &'a str,
    pub vertex_entry: &'a str,
    /// `None` for depth-only pipelines.
    pub fragment_entry: Option<&'a str>,
    pub vertex_buffers: Vec<wgpu::VertexBufferLayout<'static>>,
    pub topology: wgpu::PrimitiveTopology,
    pub cull_mode: Option<wgpu::Face>,
    pub color_targets: Vec<ColorTarget>,
    pub depth_stencil: Option<wgpu::DepthStencilState>,
}

/// Describes a compute pipeline built from a named shader-library entry point.
#[derive(Clone, Debug)]
pub struct ComputePipelineDescriptor<'a> {
    pub label: &'a str,
    pub entry: &'a str,
}

/// Triangle geometry fed into an acceleration-structure build.
///
/// Vertices are tightly packed `[f32; 3]` positions; indices are `u32`.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct AccelerationGeometry {
    pub vertex_buffer: BufferId,
    pub vertex_count: u32,
    pub vertex_stride: u64,
    pub index_buffer: BufferId,
    pub index_count: u32,
}

impl AccelerationGeometry {
    #[inline]
    #[must_use]
    pub fn triangle_count(&self) -> u32 {
        self.index_count / 3
    }
}

/// Memory the device needs to build an acceleration structure.
///
/// A `scratch_size` of zero means the device manages build scratch memory
/// itself and no scratch buffer is allocated.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct AccelerationStructureSizes {
    pub structure_size: u64,
    pub scratch_size: u64,
}
