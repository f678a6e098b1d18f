//! Render graph execution context
//!
//! Read-only view of everything a pass may bind during one frame.

use crate::renderer::acceleration::SceneAcceleration;
use crate::renderer::core::handles::{BufferId, SamplerId, TextureViewId};
use crate::renderer::core::{GpuContext, SurfaceImage};
use crate::renderer::graph::frame_resources::FrameResources;
use crate::renderer::graph::passes::forward_debug::DebugLines;
use crate::renderer::pipeline::PipelineLibrary;
use crate::scene::Scene;

// ─── Shadow source ────────────────────────────────────────────────────────────

/// Where the lighting pass reads its shadow term from.
///
/// The default [`SingleShadowMap`] returns the sun shadow map rendered by the
/// shadow pass. A cascaded implementation can be swapped in through
/// [`RenderGraph::set_shadow_source`](super::RenderGraph::set_shadow_source)
/// without touching the lighting pass.
pub trait ShadowSource {
    fn shadow_view(&self, resources: &FrameResources) -> TextureViewId;

    fn shadow_sampler(&self, resources: &FrameResources) -> SamplerId {
        resources.shadow_sampler
    }
}

/// The single sun shadow map.
#[derive(Debug, Clone, Copy, Default)]
pub struct SingleShadowMap;

impl ShadowSource for SingleShadowMap {
    fn shadow_view(&self, resources: &FrameResources) -> TextureViewId {
        resources.shadow_map().view()
    }
}

// ─── Graph inputs ─────────────────────────────────────────────────────────────

/// Long-lived state the passes read every frame.
#[derive(Clone, Copy)]
pub struct GraphInputs<'a> {
    pub pipelines: &'a PipelineLibrary,
    pub resources: &'a FrameResources,
    pub scene: &'a Scene,
    pub acceleration: &'a SceneAcceleration,
    pub debug_lines: &'a DebugLines,
}

// ─── Execute context ──────────────────────────────────────────────────────────

pub struct ExecuteContext<'a> {
    pub gpu: &'a GpuContext,
    pub pipelines: &'a PipelineLibrary,
    pub resources: &'a FrameResources,
    pub scene: &'a Scene,
    pub acceleration: &'a SceneAcceleration,
    pub debug_lines: &'a DebugLines,
    pub shadow_source: &'a dyn ShadowSource,

    /// The current ring slot's FrameData buffer.
    pub frame_data: BufferId,
    pub frame_number: u64,
    /// `None` while recording the shadow submission or when acquisition failed.
    pub surface_image: Option<SurfaceImage>,
}
