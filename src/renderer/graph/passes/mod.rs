//! Render pass implementations
//!
//! Binding convention shared with the shader library: group 0 binding 0 is
//! always the current slot's FrameData; remaining group-0 bindings are pass
//! specific; group 1 holds per-mesh material bindings.

pub mod forward_debug;
mod gbuffer;
mod lighting;
mod raytrace;
mod shadow;

pub use forward_debug::{DebugLines, DebugVertex, ForwardDebugPass};
pub use gbuffer::GBufferPass;
pub use lighting::LightingPass;
pub use raytrace::RayTracePass;
pub use shadow::ShadowPass;

/// Stencil value the G-buffer pass writes wherever geometry is rasterized and
/// the lighting pass tests for equality.
pub const GBUFFER_STENCIL_REFERENCE: u32 = 1;

/// `(group, binding)` of the FrameData uniform in every pass.
pub const FRAME_DATA_BINDING: (u32, u32) = (0, 0);

fn skip_pass(name: &str, reason: &str) {
    log::warn!("Skipping {name} this frame: {reason}");
}
