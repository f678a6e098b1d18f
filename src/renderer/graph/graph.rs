//! Render graph executor
//!
//! `RenderGraph` runs a fixed, linear pass sequence split over two
//! submissions:
//!
//! 1. Shadow nodes record into their own command buffer, which is submitted
//!    before the presentation image is acquired.
//! 2. Frame nodes record into the frame's command buffer, which the
//!    [`FrameScheduler`](super::frame::FrameScheduler) submits and presents.
//!
//! Both submissions go to the frame queue. The frame buffer is submitted
//! after the shadow buffer, so its completion signal also covers the shadow
//! work that read the same FrameData slot.

use super::context::{ExecuteContext, GraphInputs, ShadowSource, SingleShadowMap};
use super::frame::FrameContext;
use super::node::RenderNode;
use super::passes::{ForwardDebugPass, GBufferPass, LightingPass, RayTracePass, ShadowPass};
use crate::errors::Result;
use crate::renderer::core::{CommandBuffer, GpuContext, QueueKind};

pub struct RenderGraph {
    shadow_nodes: Vec<Box<dyn RenderNode>>,
    frame_nodes: Vec<Box<dyn RenderNode>>,
    shadow_source: Box<dyn ShadowSource>,
}

impl Default for RenderGraph {
    fn default() -> Self {
        Self::new()
    }
}

impl RenderGraph {
    /// Creates an empty graph that samples the single shadow map.
    #[must_use]
    pub fn new() -> Self {
        Self {
            shadow_nodes: Vec::new(),
            frame_nodes: Vec::new(),
            shadow_source: Box::new(SingleShadowMap),
        }
    }

    /// The deferred sequence: shadow → ray trace → G-buffer → lighting →
    /// forward/debug.
    #[must_use]
    pub fn deferred() -> Self {
        Self::new()
            .with_shadow_node(Box::new(ShadowPass))
            .with_node(Box::new(RayTracePass))
            .with_node(Box::new(GBufferPass))
            .with_node(Box::new(LightingPass))
            .with_node(Box::new(ForwardDebugPass))
    }

    /// Adds a node to the shadow submission.
    #[inline]
    #[must_use]
    pub fn with_shadow_node(mut self, node: Box<dyn RenderNode>) -> Self {
        self.shadow_nodes.push(node);
        self
    }

    /// Adds a node to the frame submission. Nodes run in insertion order.
    #[inline]
    #[must_use]
    pub fn with_node(mut self, node: Box<dyn RenderNode>) -> Self {
        self.frame_nodes.push(node);
        self
    }

    pub fn set_shadow_source(&mut self, source: Box<dyn ShadowSource>) {
        self.shadow_source = source;
    }

    /// Records one frame.
    ///
    /// Submits the shadow buffer, acquires the surface image into
    /// `frame.surface_image`, then records the frame nodes into
    /// `frame.command_buffer`. A failed acquisition is logged and the frame
    /// nodes run without a surface image.
    pub fn execute(
        &self,
        gpu: &GpuContext,
        frame: &mut FrameContext,
        inputs: GraphInputs,
    ) -> Result<()> {
        let mut ctx = ExecuteContext {
            gpu,
            pipelines: inputs.pipelines,
            resources: inputs.resources,
            scene: inputs.scene,
            acceleration: inputs.acceleration,
            debug_lines: inputs.debug_lines,
            shadow_source: self.shadow_source.as_ref(),
            frame_data: frame.frame_data_buffer,
            frame_number: frame.frame_number,
            surface_image: None,
        };

        let mut shadow_commands =
            CommandBuffer::new(QueueKind::Frame, format!("Shadow {}", frame.frame_number));
        for node in &self.shadow_nodes {
            node.run(&ctx, &mut shadow_commands);
        }
        if !shadow_commands.is_empty() {
            gpu.device.submit(shadow_commands, None)?;
        }

        match gpu.surface.acquire_image() {
            Ok(image) => frame.surface_image = Some(image),
            Err(err) => log::error!("Failed to acquire surface image: {err}"),
        }
        ctx.surface_image = frame.surface_image;

        for node in &self.frame_nodes {
            node.run(&ctx, &mut frame.command_buffer);
        }
        Ok(())
    }

    /// Names of every node, in execution order.
    pub fn node_names(&self) -> impl Iterator<Item = &str> {
        self.shadow_nodes
            .iter()
            .chain(&self.frame_nodes)
            .map(|node| node.name())
    }

    #[inline]
    #[must_use]
    pub fn node_count(&self) -> usize {
        self.shadow_nodes.len() + self.frame_nodes.len()
    }
}
