//! Graphics Device Abstraction
//!
//! The frame pipeline is written against the capability surface defined here
//! and never names a concrete backend. [`crate::backend::wgpu::WgpuDevice`]
//! implements both traits on top of `wgpu`; tests substitute a recording
//! device.
//!
//! # Completion signalling
//!
//! [`GraphicsDevice::submit`] accepts an optional [`CompletionHandler`]. The
//! device invokes it exactly once, from a device-owned thread, after every
//! command in the submitted buffer has finished executing. Submissions on the
//! same [`QueueKind`] complete in submission order.
//!
//! # Release
//!
//! `destroy_*` only drops the caller's handle. Backing memory still referenced
//! by submitted, unfinished work stays alive until that work completes.

use super::command::CommandBuffer;
use super::descriptors::{
    AccelerationGeometry, AccelerationStructureSizes, BufferDescriptor, ComputePipelineDescriptor,
    RenderPipelineDescriptor, SamplerDescriptor, TextureDescriptor,
};
use super::handles::{
    AccelerationStructureId, BufferId, Extent2d, PipelineId, SamplerId, TextureId, TextureViewId,
};
use crate::errors::Result;

/// Callback fired once a submitted command buffer has completed on the GPU.
pub type CompletionHandler = Box<dyn FnOnce() + Send + 'static>;

/// Queue a command buffer is submitted to.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum QueueKind {
    /// The per-frame queue driven by the frame loop.
    #[default]
    Frame,
    /// Queue for one-time work outside the frame loop (acceleration builds).
    OneShot,
}

/// Allocation, release and submission interface of a GPU.
pub trait GraphicsDevice: Send + Sync {
    // === Buffers ===

    fn create_buffer(&self, desc: &BufferDescriptor) -> Result<BufferId>;

    /// Creates a buffer and fills it with `contents`. `desc.size` is ignored.
    fn create_buffer_init(&self, desc: &BufferDescriptor, contents: &[u8]) -> Result<BufferId> {
        let id = self.create_buffer(&BufferDescriptor {
            size: contents.len() as u64,
            ..desc.clone()
        })?;
        self.write_buffer(id, 0, contents);
        Ok(id)
    }

    /// Queues a CPU write into `buffer`. The write lands before any command
    /// buffer submitted afterwards executes.
    fn write_buffer(&self, buffer: BufferId, offset: u64, data: &[u8]);

    fn destroy_buffer(&self, buffer: BufferId);

    // === Textures ===

    fn create_texture(&self, desc: &TextureDescriptor) -> Result<TextureId>;

    /// Uploads tightly packed texel data into one array layer.
    fn write_texture(&self, texture: TextureId, layer: u32, size: Extent2d, data: &[u8]);

    fn create_texture_view(
        &self,
        texture: TextureId,
        dimension: wgpu::TextureViewDimension,
    ) -> Result<TextureViewId>;

    fn destroy_texture_view(&self, view: TextureViewId);

    fn destroy_texture(&self, texture: TextureId);

    fn create_sampler(&self, desc: &SamplerDescriptor) -> Result<SamplerId>;

    // === Pipelines ===

    fn create_render_pipeline(&self, desc: &RenderPipelineDescriptor) -> Result<PipelineId>;

    fn create_compute_pipeline(&self, desc: &ComputePipelineDescriptor) -> Result<PipelineId>;

    // === Acceleration structures ===

    /// Whether the device can build and trace acceleration structures.
    fn supports_acceleration_structures(&self) -> bool;

    fn acceleration_structure_sizes(&self, geometry: &AccelerationGeometry)
    -> AccelerationStructureSizes;

    fn create_acceleration_structure(
        &self,
        geometry: &AccelerationGeometry,
        sizes: AccelerationStructureSizes,
    ) -> Result<AccelerationStructureId>;

    fn destroy_acceleration_structure(&self, structure: AccelerationStructureId);

    // === Submission ===

    /// Submits recorded commands to the queue named by `commands.queue`.
    ///
    /// If the buffer carries a surface image it is presented right after the
    /// submission. `on_complete` runs on a device-owned thread.
    fn submit(&self, commands: CommandBuffer, on_complete: Option<CompletionHandler>) -> Result<()>;
}

/// A presentable image acquired from the surface for one frame.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct SurfaceImage {
    pub view: TextureViewId,
    pub extent: Extent2d,
    pub format: wgpu::TextureFormat,
}

/// The window-backed swapchain the renderer presents into.
pub trait PresentationSurface: Send + Sync {
    /// Yields the next presentable image. Presentation happens when a command
    /// buffer carrying the image is submitted.
    fn acquire_image(&self) -> Result<SurfaceImage>;

    fn configure(&self, width: u32, height: u32) -> Result<()>;

    fn size(&self) -> Extent2d;

    fn format(&self) -> wgpu::TextureFormat;
}
