//! Opaque GPU resource handles.
//!
//! The frame pipeline never touches backend objects directly; it holds these
//! versioned keys and hands them back to the [`GraphicsDevice`](super::GraphicsDevice).
//! A released slot that is reused by a later allocation yields a key with a
//! different version, so a stale handle never aliases a new resource.

use slotmap::new_key_type;

new_key_type! {
    /// Handle to a GPU buffer.
    pub struct BufferId;
    /// Handle to a GPU texture.
    pub struct TextureId;
    /// Handle to a view over a GPU texture (or a presentable surface image).
    pub struct TextureViewId;
    /// Handle to a texture sampler.
    pub struct SamplerId;
    /// Handle to a render or compute pipeline.
    pub struct PipelineId;
    /// Handle to a ray-tracing acceleration structure.
    pub struct AccelerationStructureId;
}

/// Width and height of a 2D texture, in texels.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub struct Extent2d {
    pub width: u32,
    pub height: u32,
}

impl Extent2d {
    #[inline]
    #[must_use]
    pub const fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }

    /// `true` when either dimension is zero (minimized window).
    #[inline]
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.width == 0 || self.height == 0
    }
}

impl From<(u32, u32)> for Extent2d {
    fn from((width, height): (u32, u32)) -> Self {
        Self { width, height }
    }
}
