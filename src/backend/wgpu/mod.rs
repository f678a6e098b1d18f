//! wgpu backend
//!
//! Implements [`GraphicsDevice`](crate::renderer::core::GraphicsDevice) and
//! [`PresentationSurface`](crate::renderer::core::PresentationSurface) on a
//! window surface. Ray tracing uses wgpu's experimental ray-query support
//! when the adapter provides it.

mod device;
mod translate;

pub use device::{ShaderLibrary, WgpuDevice};
