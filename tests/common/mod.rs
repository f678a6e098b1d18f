//! Shared test fixtures: a recording device and small scene builders.
#![allow(dead_code)]

use std::collections::VecDeque;
use std::sync::Arc;

use glam::{Vec2, Vec3, Vec4};
use parking_lot::Mutex;
use slotmap::SlotMap;

use umbra::errors::{Result, UmbraError};
use umbra::renderer::core::command::{BindingResource, Command, CommandBuffer};
use umbra::renderer::core::descriptors::{
    AccelerationGeometry, AccelerationStructureSizes, BufferDescriptor, ComputePipelineDescriptor,
    RenderPipelineDescriptor, SamplerDescriptor, TextureDescriptor,
};
use umbra::renderer::core::handles::{
    AccelerationStructureId, BufferId, Extent2d, PipelineId, SamplerId, TextureId, TextureViewId,
};
use umbra::renderer::core::{
    CompletionHandler, GpuContext, GraphicsDevice, PresentationSurface, QueueKind, SurfaceImage,
};
use umbra::renderer::settings::RendererSettings;
use umbra::scene::{Geometry, MeshSource, Vertex};

pub fn init_logger() {
    let _ = env_logger::builder().is_test(true).try_init();
}

// ============================================================================
// Event log
// ============================================================================

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Event {
    WriteBuffer { buffer: BufferId, offset: u64, len: usize },
    CreateTexture { texture: TextureId, label: String },
    DestroyTexture(TextureId),
    DestroyTextureView(TextureViewId),
    Acquire(TextureViewId),
    Submit { index: usize, queue: QueueKind, label: String },
    Present(TextureViewId),
    Complete { index: usize },
}

#[derive(Debug, Clone)]
pub struct BufferRecord {
    pub label: String,
    pub size: u64,
    pub usage: wgpu::BufferUsages,
    pub contents: Vec<u8>,
}

#[derive(Debug, Clone)]
pub struct TextureRecord {
    pub label: String,
    pub size: Extent2d,
    pub array_layers: u32,
    pub format: wgpu::TextureFormat,
}

#[derive(Debug, Clone)]
pub struct ViewRecord {
    /// `None` for surface images.
    pub texture: Option<TextureId>,
}

#[derive(Debug)]
pub struct Submission {
    pub queue: QueueKind,
    pub commands: CommandBuffer,
}

impl Submission {
    /// Every buffer bound by any draw or dispatch in this submission.
    pub fn bound_buffers(&self) -> Vec<BufferId> {
        self.bound_resources()
            .into_iter()
            .filter_map(|r| match r {
                BindingResource::Buffer(id) => Some(id),
                _ => None,
            })
            .collect()
    }

    pub fn bound_resources(&self) -> Vec<BindingResource> {
        let mut resources = Vec::new();
        for command in &self.commands.commands {
            match command {
                Command::RenderPass(pass) => {
                    for draw in &pass.draws {
                        resources.extend(draw.bindings.iter().map(|b| b.resource));
                    }
                }
                Command::ComputePass(pass) => {
                    for dispatch in &pass.dispatches {
                        resources.extend(dispatch.bindings.iter().map(|b| b.resource));
                    }
                }
                Command::BuildAccelerationStructure(_) => {}
            }
        }
        resources
    }
}

// ============================================================================
// Recording device
// ============================================================================

#[derive(Default)]
struct State {
    buffers: SlotMap<BufferId, BufferRecord>,
    textures: SlotMap<TextureId, TextureRecord>,
    views: SlotMap<TextureViewId, ViewRecord>,
    samplers: SlotMap<SamplerId, String>,
    pipelines: SlotMap<PipelineId, String>,
    structures: SlotMap<AccelerationStructureId, AccelerationGeometry>,
    events: Vec<Event>,
    submissions: Vec<Submission>,
    pending: VecDeque<(usize, CompletionHandler)>,
    hold_frame_completions: bool,
    surface_size: Extent2d,
    fail_acquire: bool,
    fail_submit: bool,
}

/// In-memory [`GraphicsDevice`] + [`PresentationSurface`].
///
/// Completion handlers for [`QueueKind::OneShot`] run immediately. Frame-queue
/// handlers also run immediately unless [`hold_completions`](Self::hold_completions)
/// is set, in which case they queue up until released in submission order.
pub struct RecordingDevice {
    state: Mutex<State>,
    supports_acceleration: bool,
}

impl RecordingDevice {
    pub fn new(width: u32, height: u32) -> Arc<Self> {
        Self::with_acceleration(width, height, true)
    }

    pub fn with_acceleration(width: u32, height: u32, supports_acceleration: bool) -> Arc<Self> {
        Arc::new(Self {
            state: Mutex::new(State {
                surface_size: Extent2d::new(width, height),
                ..State::default()
            }),
            supports_acceleration,
        })
    }

    pub fn context(self: &Arc<Self>, settings: RendererSettings) -> GpuContext {
        let device: Arc<dyn GraphicsDevice> = self.clone();
        let surface: Arc<dyn PresentationSurface> = self.clone();
        GpuContext::new(device, surface, settings).expect("valid test settings")
    }

    pub fn hold_completions(&self, hold: bool) {
        self.state.lock().hold_frame_completions = hold;
    }

    pub fn fail_acquire(&self, fail: bool) {
        self.state.lock().fail_acquire = fail;
    }

    pub fn fail_submit(&self, fail: bool) {
        self.state.lock().fail_submit = fail;
    }

    /// Runs the oldest held completion handler. Returns `false` if none.
    pub fn complete_next(&self) -> bool {
        self.complete_index(0)
    }

    /// Runs the held completion handler at `position` in submission order,
    /// leaving the others queued. Returns `false` if there is none.
    pub fn complete_index(&self, position: usize) -> bool {
        let next = {
            let mut state = self.state.lock();
            let next = state.pending.remove(position);
            if let Some((index, _)) = &next {
                state.events.push(Event::Complete { index: *index });
            }
            next
        };
        match next {
            Some((_, handler)) => {
                handler();
                true
            }
            None => false,
        }
    }

    pub fn complete_all(&self) {
        while self.complete_next() {}
    }

    pub fn pending_completions(&self) -> usize {
        self.state.lock().pending.len()
    }

    pub fn events(&self) -> Vec<Event> {
        self.state.lock().events.clone()
    }

    pub fn clear_events(&self) {
        self.state.lock().events.clear();
    }

    pub fn submission_count(&self) -> usize {
        self.state.lock().submissions.len()
    }

    /// Runs `f` over the recorded submissions.
    pub fn with_submissions<R>(&self, f: impl FnOnce(&[Submission]) -> R) -> R {
        f(&self.state.lock().submissions)
    }

    pub fn buffer(&self, id: BufferId) -> Option<BufferRecord> {
        self.state.lock().buffers.get(id).cloned()
    }

    pub fn texture(&self, id: TextureId) -> Option<TextureRecord> {
        self.state.lock().textures.get(id).cloned()
    }

    pub fn view_is_live(&self, id: TextureViewId) -> bool {
        self.state.lock().views.contains_key(id)
    }

    pub fn live_texture_count(&self) -> usize {
        self.state.lock().textures.len()
    }

    pub fn live_structure_count(&self) -> usize {
        self.state.lock().structures.len()
    }

    pub fn pipeline_label(&self, id: PipelineId) -> Option<String> {
        self.state.lock().pipelines.get(id).cloned()
    }
}

impl GraphicsDevice for RecordingDevice {
    fn create_buffer(&self, desc: &BufferDescriptor) -> Result<BufferId> {
        Ok(self.state.lock().buffers.insert(BufferRecord {
            label: desc.label.to_string(),
            size: desc.size,
            usage: desc.usage,
            contents: vec![0; desc.size as usize],
        }))
    }

    fn write_buffer(&self, buffer: BufferId, offset: u64, data: &[u8]) {
        let mut state = self.state.lock();
        if let Some(record) = state.buffers.get_mut(buffer) {
            let start = offset as usize;
            let end = start + data.len();
            if record.contents.len() < end {
                record.contents.resize(end, 0);
            }
            record.contents[start..end].copy_from_slice(data);
        }
        state.events.push(Event::WriteBuffer {
            buffer,
            offset,
            len: data.len(),
        });
    }

    fn destroy_buffer(&self, buffer: BufferId) {
        self.state.lock().buffers.remove(buffer);
    }

    fn create_texture(&self, desc: &TextureDescriptor) -> Result<TextureId> {
        let mut state = self.state.lock();
        let id = state.textures.insert(TextureRecord {
            label: desc.label.to_string(),
            size: desc.size,
            array_layers: desc.array_layers,
            format: desc.format,
        });
        state.events.push(Event::CreateTexture {
            texture: id,
            label: desc.label.to_string(),
        });
        Ok(id)
    }

    fn write_texture(&self, _texture: TextureId, _layer: u32, _size: Extent2d, _data: &[u8]) {}

    fn create_texture_view(
        &self,
        texture: TextureId,
        _dimension: wgpu::TextureViewDimension,
    ) -> Result<TextureViewId> {
        let mut state = self.state.lock();
        if !state.textures.contains_key(texture) {
            return Err(UmbraError::UnknownHandle(format!("{texture:?}")));
        }
        Ok(state.views.insert(ViewRecord {
            texture: Some(texture),
        }))
    }

    fn destroy_texture_view(&self, view: TextureViewId) {
        let mut state = self.state.lock();
        state.views.remove(view);
        state.events.push(Event::DestroyTextureView(view));
    }

    fn destroy_texture(&self, texture: TextureId) {
        let mut state = self.state.lock();
        state.textures.remove(texture);
        state.events.push(Event::DestroyTexture(texture));
    }

    fn create_sampler(&self, desc: &SamplerDescriptor) -> Result<SamplerId> {
        Ok(self.state.lock().samplers.insert(desc.label.to_string()))
    }

    fn create_render_pipeline(&self, desc: &RenderPipelineDescriptor) -> Result<PipelineId> {
        Ok(self.state.lock().pipelines.insert(desc.label.to_string()))
    }

    fn create_compute_pipeline(&self, desc: &ComputePipelineDescriptor) -> Result<PipelineId> {
        Ok(self.state.lock().pipelines.insert(desc.label.to_string()))
    }

    fn supports_acceleration_structures(&self) -> bool {
        self.supports_acceleration
    }

    fn acceleration_structure_sizes(
        &self,
        geometry: &AccelerationGeometry,
    ) -> AccelerationStructureSizes {
        AccelerationStructureSizes {
            structure_size: u64::from(geometry.triangle_count()) * 64,
            scratch_size: u64::from(geometry.triangle_count()) * 32,
        }
    }

    fn create_acceleration_structure(
        &self,
        geometry: &AccelerationGeometry,
        _sizes: AccelerationStructureSizes,
    ) -> Result<AccelerationStructureId> {
        Ok(self.state.lock().structures.insert(*geometry))
    }

    fn destroy_acceleration_structure(&self, structure: AccelerationStructureId) {
        self.state.lock().structures.remove(structure);
    }

    fn submit(&self, commands: CommandBuffer, on_complete: Option<CompletionHandler>) -> Result<()> {
        let run_now = {
            let mut state = self.state.lock();
            if state.fail_submit {
                return Err(UmbraError::DeviceLost("submission rejected".to_string()));
            }

            let index = state.submissions.len();
            let queue = commands.queue;
            state.events.push(Event::Submit {
                index,
                queue,
                label: commands.label.clone(),
            });
            if let Some(image) = commands.present {
                state.views.remove(image.view);
                state.events.push(Event::Present(image.view));
            }
            state.submissions.push(Submission { queue, commands });

            match on_complete {
                Some(handler) if queue == QueueKind::Frame && state.hold_frame_completions => {
                    state.pending.push_back((index, handler));
                    None
                }
                Some(handler) => {
                    state.events.push(Event::Complete { index });
                    Some(handler)
                }
                None => None,
            }
        };
        if let Some(handler) = run_now {
            handler();
        }
        Ok(())
    }
}

impl PresentationSurface for RecordingDevice {
    fn acquire_image(&self) -> Result<SurfaceImage> {
        let mut state = self.state.lock();
        if state.fail_acquire {
            return Err(UmbraError::SurfaceError("surface lost".to_string()));
        }
        let view = state.views.insert(ViewRecord { texture: None });
        state.events.push(Event::Acquire(view));
        Ok(SurfaceImage {
            view,
            extent: state.surface_size,
            format: wgpu::TextureFormat::Bgra8UnormSrgb,
        })
    }

    fn configure(&self, width: u32, height: u32) -> Result<()> {
        self.state.lock().surface_size = Extent2d::new(width, height);
        Ok(())
    }

    fn size(&self) -> Extent2d {
        self.state.lock().surface_size
    }

    fn format(&self) -> wgpu::TextureFormat {
        wgpu::TextureFormat::Bgra8UnormSrgb
    }
}

// ============================================================================
// Scene builders
// ============================================================================

/// A flat grid of `triangles` triangles (rounded up to an even count of quads).
pub fn grid_geometry(triangles: usize) -> Geometry {
    let quads = triangles.div_ceil(2);
    let mut vertices = Vec::with_capacity(quads * 4);
    let mut indices = Vec::with_capacity(quads * 6);
    for q in 0..quads {
        let x = q as f32;
        let base = vertices.len() as u32;
        for (dx, dz) in [(0.0, 0.0), (1.0, 0.0), (1.0, 1.0), (0.0, 1.0)] {
            vertices.push(Vertex::new(
                Vec3::new(x + dx, 0.0, dz),
                Vec3::Y,
                Vec2::new(dx, dz),
            ));
        }
        indices.extend_from_slice(&[base, base + 1, base + 2, base, base + 2, base + 3]);
    }
    indices.truncate(triangles * 3);
    Geometry::new(vertices, indices)
}

pub fn mesh_source(label: &str, triangles: usize, color: Vec4) -> MeshSource {
    MeshSource {
        label: label.to_string(),
        geometry: grid_geometry(triangles),
        base_color: color,
        diffuse: None,
        normal: None,
    }
}
