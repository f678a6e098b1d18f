//! Scoped GPU resources.
//!
//! Each wrapper owns one device allocation and releases it on drop. A struct
//! holding several of them releases them in field declaration order. A
//! [`GpuTexture`] always releases its default view before the texture.

use std::fmt;
use std::sync::Arc;

use super::descriptors::{BufferDescriptor, TextureDescriptor};
use super::device::GraphicsDevice;
use super::handles::{AccelerationStructureId, BufferId, Extent2d, TextureId, TextureViewId};
use crate::errors::Result;

// ============================================================================
// Buffer
// ============================================================================

pub struct GpuBuffer {
    device: Arc<dyn GraphicsDevice>,
    id: BufferId,
    size: u64,
}

impl GpuBuffer {
    pub fn new(device: &Arc<dyn GraphicsDevice>, desc: &BufferDescriptor) -> Result<Self> {
        let id = device.create_buffer(desc)?;
        Ok(Self {
            device: Arc::clone(device),
            id,
            size: desc.size,
        })
    }

    /// Creates a buffer initialised with `contents`.
    pub fn with_contents(
        device: &Arc<dyn GraphicsDevice>,
        label: &str,
        usage: wgpu::BufferUsages,
        contents: &[u8],
    ) -> Result<Self> {
        let desc = BufferDescriptor {
            label,
            size: contents.len() as u64,
            usage,
        };
        let id = device.create_buffer_init(&desc, contents)?;
        Ok(Self {
            device: Arc::clone(device),
            id,
            size: desc.size,
        })
    }

    #[inline]
    #[must_use]
    pub fn id(&self) -> BufferId {
        self.id
    }

    #[inline]
    #[must_use]
    pub fn size(&self) -> u64 {
        self.size
    }

    pub fn write(&self, offset: u64, data: &[u8]) {
        self.device.write_buffer(self.id, offset, data);
    }
}

impl Drop for GpuBuffer {
    fn drop(&mut self) {
        self.device.destroy_buffer(self.id);
    }
}

impl fmt::Debug for GpuBuffer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("GpuBuffer")
            .field("id", &self.id)
            .field("size", &self.size)
            .finish()
    }
}

// ============================================================================
// Texture + default view
// ============================================================================

/// A texture together with its default view.
pub struct GpuTexture {
    device: Arc<dyn GraphicsDevice>,
    texture: TextureId,
    view: TextureViewId,
    extent: Extent2d,
    format: wgpu::TextureFormat,
}

impl GpuTexture {
    pub fn new(
        device: &Arc<dyn GraphicsDevice>,
        desc: &TextureDescriptor,
        dimension: wgpu::TextureViewDimension,
    ) -> Result<Self> {
        let texture = device.create_texture(desc)?;
        let view = match device.create_texture_view(texture, dimension) {
            Ok(view) => view,
            Err(err) => {
                device.destroy_texture(texture);
                return Err(err);
            }
        };
        Ok(Self {
            device: Arc::clone(device),
            texture,
            view,
            extent: desc.size,
            format: desc.format,
        })
    }

    /// Single-layer 2D texture with a `D2` view.
    pub fn new_2d(device: &Arc<dyn GraphicsDevice>, desc: &TextureDescriptor) -> Result<Self> {
        Self::new(device, desc, wgpu::TextureViewDimension::D2)
    }

    #[inline]
    #[must_use]
    pub fn texture(&self) -> TextureId {
        self.texture
    }

    #[inline]
    #[must_use]
    pub fn view(&self) -> TextureViewId {
        self.view
    }

    #[inline]
    #[must_use]
    pub fn extent(&self) -> Extent2d {
        self.extent
    }

    #[inline]
    #[must_use]
    pub fn format(&self) -> wgpu::TextureFormat {
        self.format
    }
}

impl Drop for GpuTexture {
    fn drop(&mut self) {
        self.device.destroy_texture_view(self.view);
        self.device.destroy_texture(self.texture);
    }
}

impl fmt::Debug for GpuTexture {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("GpuTexture")
            .field("texture", &self.texture)
            .field("view", &self.view)
            .field("extent", &self.extent)
            .field("format", &self.format)
            .finish()
    }
}

// ============================================================================
// Acceleration structure
// ============================================================================

pub struct GpuAccelerationStructure {
    device: Arc<dyn GraphicsDevice>,
    id: AccelerationStructureId,
    size: u64,
}

impl GpuAccelerationStructure {
    /// Takes ownership of an already created structure.
    #[must_use]
    pub fn from_raw(device: &Arc<dyn GraphicsDevice>, id: AccelerationStructureId, size: u64) -> Self {
        Self {
            device: Arc::clone(device),
            id,
            size,
        }
    }

    #[inline]
    #[must_use]
    pub fn id(&self) -> AccelerationStructureId {
        self.id
    }

    /// Structure size reported by the device at creation.
    #[inline]
    #[must_use]
    pub fn size(&self) -> u64 {
        self.size
    }
}

impl Drop for GpuAccelerationStructure {
    fn drop(&mut self) {
        self.device.destroy_acceleration_structure(self.id);
    }
}

impl fmt::Debug for GpuAccelerationStructure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("GpuAccelerationStructure")
            .field("id", &self.id)
            .field("size", &self.size)
            .finish()
    }
}
