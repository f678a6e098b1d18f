//! Renderer
//!
//! [`Renderer`] wires the frame pipeline together and drives one frame per
//! [`Renderer::render_frame`] call:
//!
//! 1. Apply a latched resize (surface + surface-sized targets).
//! 2. [`FrameScheduler::begin_frame`]: wait for the slot, write FrameData.
//! 3. [`RenderGraph::execute`]: shadow submission, image acquisition, then
//!    ray trace → G-buffer → lighting → forward/debug.
//! 4. [`FrameScheduler::end_frame`]: present, submit, rotate the ring.

pub mod acceleration;
pub mod core;
pub mod graph;
pub mod pipeline;
pub mod settings;

use self::acceleration::SceneAcceleration;
use self::core::GpuContext;
use self::core::handles::Extent2d;
use self::graph::passes::DebugLines;
use self::graph::{
    FrameInputs, FrameResources, FrameScheduler, GraphInputs, RenderGraph, ShadowSource,
};
use self::pipeline::PipelineLibrary;
use crate::errors::Result;
use crate::scene::{Camera, Scene, SceneLoader};

pub struct Renderer {
    graph: RenderGraph,
    scheduler: FrameScheduler,
    resources: FrameResources,
    pipelines: PipelineLibrary,
    debug_lines: DebugLines,
    acceleration: SceneAcceleration,
    scene: Scene,
    pending_resize: Option<Extent2d>,
    ctx: GpuContext,
}

impl Renderer {
    /// Creates pipelines and targets, loads the scene and builds its
    /// acceleration structure.
    ///
    /// Blocks until the acceleration structure build completes. Any failure
    /// here is fatal.
    pub fn new(ctx: GpuContext, loader: &dyn SceneLoader) -> Result<Self> {
        let pipelines = PipelineLibrary::new(&ctx, ctx.surface.format())?;
        let resources = FrameResources::new(&ctx, ctx.surface_size())?;

        let scene = loader.load(&ctx)?;
        let acceleration = SceneAcceleration::build(&ctx, &scene)?;
        let debug_lines = DebugLines::axes(&ctx.device, ctx.settings.debug_axis_length)?;
        let scheduler = FrameScheduler::new(&ctx)?;

        log::info!(
            "Renderer ready: {} meshes, {} merged triangles",
            scene.meshes.len(),
            acceleration.merged().triangle_count()
        );

        Ok(Self {
            graph: RenderGraph::deferred(),
            scheduler,
            resources,
            pipelines,
            debug_lines,
            acceleration,
            scene,
            pending_resize: None,
            ctx,
        })
    }

    /// Latches a surface resize. It is applied at the start of the next
    /// frame, before any pass records, so no frame binds stale targets.
    pub fn request_resize(&mut self, width: u32, height: u32) {
        self.pending_resize = Some(Extent2d::new(width, height));
    }

    fn apply_pending_resize(&mut self) -> Result<()> {
        let Some(extent) = self.pending_resize.take() else {
            return Ok(());
        };
        if extent.is_empty() {
            log::debug!("Ignoring zero-sized resize");
            return Ok(());
        }
        self.ctx.resize_surface(extent.width, extent.height)?;
        self.resources.resize(&self.ctx, extent.width, extent.height)?;
        Ok(())
    }

    /// Records, submits and presents one frame.
    ///
    /// `paused` freezes the frame counter and with it the sun's orbit.
    pub fn render_frame(&mut self, camera: &Camera, paused: bool) -> Result<()> {
        self.apply_pending_resize()?;

        let inputs = FrameInputs {
            camera,
            scene_model: self.scene.model,
            framebuffer: self.resources.extent(),
        };
        let mut frame = self.scheduler.begin_frame(&self.ctx, paused, &inputs)?;

        let recorded = self.graph.execute(
            &self.ctx,
            &mut frame,
            GraphInputs {
                pipelines: &self.pipelines,
                resources: &self.resources,
                scene: &self.scene,
                acceleration: &self.acceleration,
                debug_lines: &self.debug_lines,
            },
        );
        // Always submit so the slot's completion signal fires.
        let submitted = self.scheduler.end_frame(&self.ctx, frame);
        recorded.and(submitted)
    }

    /// Replaces the lighting pass's shadow source.
    pub fn set_shadow_source(&mut self, source: Box<dyn ShadowSource>) {
        self.graph.set_shadow_source(source);
    }

    #[inline]
    #[must_use]
    pub fn frame_number(&self) -> u64 {
        self.scheduler.frame_number()
    }

    #[inline]
    #[must_use]
    pub fn scene_acceleration(&self) -> &SceneAcceleration {
        &self.acceleration
    }

    #[inline]
    #[must_use]
    pub fn scene(&self) -> &Scene {
        &self.scene
    }

    #[inline]
    #[must_use]
    pub fn frame_resources(&self) -> &FrameResources {
        &self.resources
    }

    #[inline]
    #[must_use]
    pub fn context(&self) -> &GpuContext {
        &self.ctx
    }
}
