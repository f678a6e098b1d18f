//! Command Recording
//!
//! Passes record into a backend-neutral [`CommandBuffer`]. Each render or
//! compute pass is captured as a list of fully resolved draw/dispatch calls
//! (pipeline, bindings, buffers) that the device replays at submission.
//!
//! Encoders snapshot their state at every draw, so later `set_*` calls never
//! affect draws already recorded.

use std::ops::Range;

use smallvec::SmallVec;

use super::descriptors::AccelerationGeometry;
use super::device::{QueueKind, SurfaceImage};
use super::handles::{
    AccelerationStructureId, BufferId, Extent2d, PipelineId, SamplerId, TextureViewId,
};

// ============================================================================
// Bindings
// ============================================================================

/// A resource bound to a shader slot.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum BindingResource {
    Buffer(BufferId),
    TextureView(TextureViewId),
    Sampler(SamplerId),
    AccelerationStructure(AccelerationStructureId),
}

/// `(group, binding)` slot assignment.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Binding {
    pub group: u32,
    pub binding: u32,
    pub resource: BindingResource,
}

pub type BindingList = SmallVec<[Binding; 8]>;

fn upsert_binding(bindings: &mut BindingList, group: u32, binding: u32, resource: BindingResource) {
    if let Some(slot) = bindings
        .iter_mut()
        .find(|b| b.group == group && b.binding == binding)
    {
        slot.resource = resource;
    } else {
        bindings.push(Binding {
            group,
            binding,
            resource,
        });
    }
}

// ============================================================================
// Render passes
// ============================================================================

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct ColorAttachment {
    pub view: TextureViewId,
    pub extent: Extent2d,
    pub load: wgpu::LoadOp<wgpu::Color>,
}

/// Depth/stencil attachment. `stencil_load` is `None` for depth-only formats.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct DepthStencilAttachment {
    pub view: TextureViewId,
    pub extent: Extent2d,
    pub depth_load: wgpu::LoadOp<f32>,
    pub stencil_load: Option<wgpu::LoadOp<u32>>,
}

#[derive(Clone, Debug)]
pub struct RenderPassDescriptor<'a> {
    pub label: &'a str,
    pub color_attachments: &'a [ColorAttachment],
    pub depth_stencil: Option<DepthStencilAttachment>,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum DrawRange {
    Vertices(Range<u32>),
    Indexed(Range<u32>),
}

/// One draw with the encoder state captured at the time it was issued.
#[derive(Clone, Debug)]
pub struct DrawCall {
    pub pipeline: PipelineId,
    pub bindings: BindingList,
    pub vertex_buffers: SmallVec<[(u32, BufferId); 2]>,
    pub index_buffer: Option<BufferId>,
    pub stencil_reference: u32,
    pub range: DrawRange,
    pub instances: Range<u32>,
}

#[derive(Clone, Debug, Default)]
pub struct RenderPassRecord {
    pub label: String,
    pub color_attachments: SmallVec<[ColorAttachment; 4]>,
    pub depth_stencil: Option<DepthStencilAttachment>,
    pub draws: Vec<DrawCall>,
}

impl RenderPassRecord {
    /// Extent shared by every attachment.
    #[must_use]
    pub fn extent(&self) -> Option<Extent2d> {
        self.color_attachments
            .first()
            .map(|a| a.extent)
            .or(self.depth_stencil.map(|d| d.extent))
    }
}

/// Records draws into one render pass. The pass is appended to its command
/// buffer when the encoder is dropped.
pub struct RenderPassEncoder<'a> {
    target: &'a mut CommandBuffer,
    record: RenderPassRecord,
    pipeline: Option<PipelineId>,
    bindings: BindingList,
    vertex_buffers: SmallVec<[(u32, BufferId); 2]>,
    index_buffer: Option<BufferId>,
    stencil_reference: u32,
}

impl RenderPassEncoder<'_> {
    pub fn set_pipeline(&mut self, pipeline: PipelineId) {
        self.pipeline = Some(pipeline);
    }

    pub fn set_binding(&mut self, group: u32, binding: u32, resource: BindingResource) {
        upsert_binding(&mut self.bindings, group, binding, resource);
    }

    pub fn set_vertex_buffer(&mut self, slot: u32, buffer: BufferId) {
        if let Some(entry) = self.vertex_buffers.iter_mut().find(|(s, _)| *s == slot) {
            entry.1 = buffer;
        } else {
            self.vertex_buffers.push((slot, buffer));
        }
    }

    pub fn set_index_buffer(&mut self, buffer: BufferId) {
        self.index_buffer = Some(buffer);
    }

    pub fn set_stencil_reference(&mut self, reference: u32) {
        self.stencil_reference = reference;
    }

    pub fn draw(&mut self, vertices: Range<u32>, instances: Range<u32>) {
        self.push_draw(DrawRange::Vertices(vertices), instances);
    }

    pub fn draw_indexed(&mut self, indices: Range<u32>, instances: Range<u32>) {
        self.push_draw(DrawRange::Indexed(indices), instances);
    }

    fn push_draw(&mut self, range: DrawRange, instances: Range<u32>) {
        let Some(pipeline) = self.pipeline else {
            log::warn!("Draw in pass '{}' issued without a pipeline; ignored", self.record.label);
            return;
        };
        self.record.draws.push(DrawCall {
            pipeline,
            bindings: self.bindings.clone(),
            vertex_buffers: self.vertex_buffers.clone(),
            index_buffer: self.index_buffer,
            stencil_reference: self.stencil_reference,
            range,
            instances,
        });
    }
}

impl Drop for RenderPassEncoder<'_> {
    fn drop(&mut self) {
        let record = std::mem::take(&mut self.record);
        self.target.commands.push(Command::RenderPass(record));
    }
}

// ============================================================================
// Compute passes
// ============================================================================

#[derive(Clone, Debug)]
pub struct Dispatch {
    pub pipeline: PipelineId,
    pub bindings: BindingList,
    pub workgroups: [u32; 3],
}

#[derive(Clone, Debug, Default)]
pub struct ComputePassRecord {
    pub label: String,
    pub dispatches: Vec<Dispatch>,
}

/// Records dispatches into one compute pass; appended on drop.
pub struct ComputePassEncoder<'a> {
    target: &'a mut CommandBuffer,
    record: ComputePassRecord,
    pipeline: Option<PipelineId>,
    bindings: BindingList,
}

impl ComputePassEncoder<'_> {
    pub fn set_pipeline(&mut self, pipeline: PipelineId) {
        self.pipeline = Some(pipeline);
    }

    pub fn set_binding(&mut self, group: u32, binding: u32, resource: BindingResource) {
        upsert_binding(&mut self.bindings, group, binding, resource);
    }

    pub fn dispatch(&mut self, x: u32, y: u32, z: u32) {
        let Some(pipeline) = self.pipeline else {
            log::warn!("Dispatch in pass '{}' issued without a pipeline; ignored", self.record.label);
            return;
        };
        self.record.dispatches.push(Dispatch {
            pipeline,
            bindings: self.bindings.clone(),
            workgroups: [x, y, z],
        });
    }
}

impl Drop for ComputePassEncoder<'_> {
    fn drop(&mut self) {
        let record = std::mem::take(&mut self.record);
        self.target.commands.push(Command::ComputePass(record));
    }
}

// ============================================================================
// Command buffer
// ============================================================================

/// Build of one acceleration structure over triangle geometry.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct AccelerationBuild {
    pub structure: AccelerationStructureId,
    pub geometry: AccelerationGeometry,
    pub scratch: Option<BufferId>,
}

#[derive(Clone, Debug)]
pub enum Command {
    RenderPass(RenderPassRecord),
    ComputePass(ComputePassRecord),
    BuildAccelerationStructure(AccelerationBuild),
}

/// An ordered list of recorded passes bound for one queue.
#[derive(Debug, Default)]
pub struct CommandBuffer {
    pub queue: QueueKind,
    pub label: String,
    pub commands: Vec<Command>,
    /// Surface image to present once this buffer is submitted.
    pub present: Option<SurfaceImage>,
}

impl CommandBuffer {
    #[must_use]
    pub fn new(queue: QueueKind, label: impl Into<String>) -> Self {
        Self {
            queue,
            label: label.into(),
            commands: Vec::new(),
            present: None,
        }
    }

    /// Begins a render pass.
    ///
    /// Returns `None` when the attachment set is invalid: no attachments at
    /// all, an empty extent, or attachments whose extents disagree.
    pub fn begin_render_pass(&mut self, desc: &RenderPassDescriptor) -> Option<RenderPassEncoder<'_>> {
        let mut extents = desc
            .color_attachments
            .iter()
            .map(|a| a.extent)
            .chain(desc.depth_stencil.map(|d| d.extent));
        let first = extents.next()?;
        if first.is_empty() || extents.any(|e| e != first) {
            return None;
        }

        Some(RenderPassEncoder {
            target: self,
            record: RenderPassRecord {
                label: desc.label.to_string(),
                color_attachments: desc.color_attachments.iter().copied().collect(),
                depth_stencil: desc.depth_stencil,
                draws: Vec::new(),
            },
            pipeline: None,
            bindings: BindingList::new(),
            vertex_buffers: SmallVec::new(),
            index_buffer: None,
            stencil_reference: 0,
        })
    }

    pub fn begin_compute_pass(&mut self, label: &str) -> ComputePassEncoder<'_> {
        ComputePassEncoder {
            target: self,
            record: ComputePassRecord {
                label: label.to_string(),
                dispatches: Vec::new(),
            },
            pipeline: None,
            bindings: BindingList::new(),
        }
    }

    pub fn build_acceleration_structure(&mut self, build: AccelerationBuild) {
        self.commands.push(Command::BuildAccelerationStructure(build));
    }

    /// Schedules `image` for presentation after this buffer is submitted.
    pub fn present(&mut self, image: SurfaceImage) {
        self.present = Some(image);
    }

    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.commands.is_empty()
    }

    /// Render passes in recording order.
    pub fn render_passes(&self) -> impl Iterator<Item = &RenderPassRecord> {
        self.commands.iter().filter_map(|c| match c {
            Command::RenderPass(pass) => Some(pass),
            _ => None,
        })
    }

    /// Compute passes in recording order.
    pub fn compute_passes(&self) -> impl Iterator<Item = &ComputePassRecord> {
        self.commands.iter().filter_map(|c| match c {
            Command::ComputePass(pass) => Some(pass),
            _ => None,
        })
    }
}
