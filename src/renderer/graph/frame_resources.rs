//! Render targets owned by the frame pipeline.
//!
//! Surface-sized targets live in [`SurfaceTargets`] and are rebuilt on every
//! resize. The shadow map and the shared samplers are created once and never
//! touched again.

use std::sync::Arc;

use crate::errors::Result;
use crate::renderer::core::descriptors::{SamplerDescriptor, TextureDescriptor};
use crate::renderer::core::handles::{Extent2d, SamplerId};
use crate::renderer::core::{GpuContext, GpuTexture, GraphicsDevice};

pub const GBUFFER_ALBEDO_FORMAT: wgpu::TextureFormat = wgpu::TextureFormat::Rgba8Unorm;
pub const GBUFFER_NORMAL_FORMAT: wgpu::TextureFormat = wgpu::TextureFormat::Rgba16Float;
pub const GBUFFER_DEPTH_FORMAT: wgpu::TextureFormat = wgpu::TextureFormat::R32Float;
pub const DEPTH_STENCIL_FORMAT: wgpu::TextureFormat = wgpu::TextureFormat::Depth24PlusStencil8;
pub const RAY_TRACE_OUTPUT_FORMAT: wgpu::TextureFormat = wgpu::TextureFormat::Rgba16Float;
pub const SHADOW_MAP_FORMAT: wgpu::TextureFormat = wgpu::TextureFormat::Depth32Float;

// ============================================================================
// Surface-sized targets
// ============================================================================

/// Targets whose size follows the presentation surface.
#[derive(Debug)]
pub struct SurfaceTargets {
    pub albedo: GpuTexture,
    pub normal: GpuTexture,
    pub depth: GpuTexture,
    /// Shared by the G-buffer (write) and lighting (stencil test) passes.
    pub depth_stencil: GpuTexture,
    pub ray_trace_output: GpuTexture,
    pub forward_depth_stencil: GpuTexture,
}

impl SurfaceTargets {
    fn new(device: &Arc<dyn GraphicsDevice>, extent: Extent2d) -> Result<Self> {
        use wgpu::TextureUsages as U;

        let target = |label: &str, format, usage| {
            GpuTexture::new_2d(device, &TextureDescriptor::new_2d(label, extent, format, usage))
        };

        Ok(Self {
            albedo: target(
                "GBuffer Albedo",
                GBUFFER_ALBEDO_FORMAT,
                U::RENDER_ATTACHMENT | U::TEXTURE_BINDING,
            )?,
            normal: target(
                "GBuffer Normal",
                GBUFFER_NORMAL_FORMAT,
                U::RENDER_ATTACHMENT | U::TEXTURE_BINDING,
            )?,
            depth: target(
                "GBuffer Depth",
                GBUFFER_DEPTH_FORMAT,
                U::RENDER_ATTACHMENT | U::TEXTURE_BINDING,
            )?,
            depth_stencil: target(
                "GBuffer Depth Stencil",
                DEPTH_STENCIL_FORMAT,
                U::RENDER_ATTACHMENT,
            )?,
            ray_trace_output: target(
                "Ray Trace Output",
                RAY_TRACE_OUTPUT_FORMAT,
                U::STORAGE_BINDING | U::TEXTURE_BINDING,
            )?,
            forward_depth_stencil: target(
                "Forward Depth Stencil",
                DEPTH_STENCIL_FORMAT,
                U::RENDER_ATTACHMENT,
            )?,
        })
    }

    /// Every target with its label, for inspection.
    #[must_use]
    pub fn all(&self) -> [(&'static str, &GpuTexture); 6] {
        [
            ("albedo", &self.albedo),
            ("normal", &self.normal),
            ("depth", &self.depth),
            ("depth_stencil", &self.depth_stencil),
            ("ray_trace_output", &self.ray_trace_output),
            ("forward_depth_stencil", &self.forward_depth_stencil),
        ]
    }
}

// ============================================================================
// FrameResources
// ============================================================================

pub struct FrameResources {
    targets: Option<SurfaceTargets>,
    extent: Extent2d,
    shadow_map: GpuTexture,
    /// Comparison sampler for the shadow map.
    pub shadow_sampler: SamplerId,
    /// Linear sampler shared by all material textures and G-buffer reads.
    pub linear_sampler: SamplerId,
}

impl FrameResources {
    pub fn new(ctx: &GpuContext, extent: Extent2d) -> Result<Self> {
        let device = &ctx.device;
        let size = ctx.settings.shadow_map_size;

        let shadow_map = GpuTexture::new_2d(
            device,
            &TextureDescriptor::new_2d(
                "Shadow Map",
                Extent2d::new(size, size),
                SHADOW_MAP_FORMAT,
                wgpu::TextureUsages::RENDER_ATTACHMENT | wgpu::TextureUsages::TEXTURE_BINDING,
            ),
        )?;
        let shadow_sampler = device.create_sampler(&SamplerDescriptor {
            label: "Shadow Sampler",
            address_mode: wgpu::AddressMode::ClampToEdge,
            filter: wgpu::FilterMode::Linear,
            compare: Some(wgpu::CompareFunction::LessEqual),
        })?;
        let linear_sampler = device.create_sampler(&SamplerDescriptor {
            label: "Linear Sampler",
            address_mode: wgpu::AddressMode::Repeat,
            filter: wgpu::FilterMode::Linear,
            compare: None,
        })?;

        let mut resources = Self {
            targets: None,
            extent: Extent2d::default(),
            shadow_map,
            shadow_sampler,
            linear_sampler,
        };
        resources.resize(ctx, extent.width, extent.height)?;
        Ok(resources)
    }

    /// Releases every surface-sized target and recreates it at the new size.
    ///
    /// Returns `Ok(false)` without touching anything for zero-sized or
    /// unchanged requests. On allocation failure no targets remain and the
    /// error is returned.
    pub fn resize(&mut self, ctx: &GpuContext, width: u32, height: u32) -> Result<bool> {
        let extent = Extent2d::new(width, height);
        if extent.is_empty() || (extent == self.extent && self.targets.is_some()) {
            return Ok(false);
        }

        // Release before allocating so old and new targets never coexist.
        drop(self.targets.take());
        self.extent = extent;
        self.targets = Some(SurfaceTargets::new(&ctx.device, extent)?);

        log::info!("Surface targets recreated at {width}x{height}");
        Ok(true)
    }

    /// Current surface-sized targets; `None` only after a failed resize.
    #[inline]
    #[must_use]
    pub fn targets(&self) -> Option<&SurfaceTargets> {
        self.targets.as_ref()
    }

    #[inline]
    #[must_use]
    pub fn extent(&self) -> Extent2d {
        self.extent
    }

    #[inline]
    #[must_use]
    pub fn shadow_map(&self) -> &GpuTexture {
        &self.shadow_map
    }
}
