//! GPU Context
//!
//! The [`GpuContext`] is constructed once and passed by reference to every
//! component of the frame pipeline. It owns the device and surface handles
//! and the validated settings; nothing in the crate reaches them any other way.

use std::sync::Arc;

use super::device::{GraphicsDevice, PresentationSurface};
use super::handles::Extent2d;
use crate::errors::Result;
use crate::renderer::settings::RendererSettings;

pub struct GpuContext {
    /// Allocation and submission interface
    pub device: Arc<dyn GraphicsDevice>,
    /// Swapchain the frame loop presents into
    pub surface: Arc<dyn PresentationSurface>,
    /// Settings the renderer was created with
    pub settings: RendererSettings,
}

impl GpuContext {
    /// Validates `settings` and bundles them with the device handles.
    pub fn new(
        device: Arc<dyn GraphicsDevice>,
        surface: Arc<dyn PresentationSurface>,
        settings: RendererSettings,
    ) -> Result<Self> {
        settings.validate()?;
        Ok(Self {
            device,
            surface,
            settings,
        })
    }

    /// Current size of the presentation surface.
    #[inline]
    #[must_use]
    pub fn surface_size(&self) -> Extent2d {
        self.surface.size()
    }

    /// Reconfigures the surface. Zero-sized requests are ignored.
    pub fn resize_surface(&self, width: u32, height: u32) -> Result<bool> {
        if width == 0 || height == 0 {
            return Ok(false);
        }
        self.surface.configure(width, height)?;
        Ok(true)
    }
}
