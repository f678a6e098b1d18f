//! Frame Scheduler
//!
//! Owns the ring of in-flight frame slots. Each slot has its own
//! [`FrameData`] buffer and a [`SlotSemaphore`] that is signalled when the GPU
//! finishes the last command buffer that read the slot.
//!
//! The submitting thread waits on slot `frame_index % N` before rewriting its
//! buffer. The completion handler attached to the frame's command buffer is
//! the only code that runs on the device's thread, and all it does is return
//! the slot's token.

use std::f64::consts::TAU;

use glam::{Mat4, Vec3};

use crate::errors::{Result, UmbraError};
use crate::renderer::core::descriptors::BufferDescriptor;
use crate::renderer::core::handles::{BufferId, Extent2d};
use crate::renderer::core::{
    CommandBuffer, CompletionHandler, GpuBuffer, GpuContext, QueueKind, SurfaceImage,
};
use crate::renderer::graph::shadow_utils::{
    CameraFrustum, ShadowCascade, build_sun_shadow_vp, compute_cascades, light_view_matrix,
};
use crate::resources::uniforms::FrameData;
use crate::scene::Camera;

// ============================================================================
// SlotSemaphore
// ============================================================================

/// Binary semaphore over a capacity-one channel. Holding the token means the
/// GPU is done with the slot.
#[derive(Debug)]
pub struct SlotSemaphore {
    tx: flume::Sender<()>,
    rx: flume::Receiver<()>,
}

impl SlotSemaphore {
    /// Creates a semaphore that is initially available.
    #[must_use]
    pub fn new() -> Self {
        let (tx, rx) = flume::bounded(1);
        let _ = tx.try_send(());
        Self { tx, rx }
    }

    /// Blocks until the token is available and takes it.
    ///
    /// The semaphore keeps its own sender alive, so this never returns
    /// because of disconnection; a device that stops completing work blocks
    /// the caller indefinitely.
    pub fn wait(&self) -> Result<()> {
        self.rx
            .recv()
            .map_err(|_| UmbraError::DeviceLost("slot semaphore disconnected".to_string()))
    }

    /// Returns the token. A second signal without an intervening wait is a
    /// no-op.
    pub fn signal(&self) {
        let _ = self.tx.try_send(());
    }

    /// Completion handler that signals this semaphore.
    #[must_use]
    pub fn completion_handler(&self) -> CompletionHandler {
        let tx = self.tx.clone();
        Box::new(move || {
            let _ = tx.try_send(());
        })
    }

    #[must_use]
    pub fn is_available(&self) -> bool {
        !self.rx.is_empty()
    }
}

impl Default for SlotSemaphore {
    fn default() -> Self {
        Self::new()
    }
}

// ============================================================================
// Frame inputs / outputs
// ============================================================================

/// Per-frame inputs the scheduler folds into [`FrameData`].
#[derive(Debug, Clone, Copy)]
pub struct FrameInputs<'a> {
    pub camera: &'a Camera,
    pub scene_model: Mat4,
    pub framebuffer: Extent2d,
}

/// One ring slot.
#[derive(Debug)]
pub struct FrameSlot {
    pub semaphore: SlotSemaphore,
    pub frame_data: GpuBuffer,
}

/// Everything the render graph needs to record one frame.
pub struct FrameContext {
    pub slot: usize,
    pub frame_number: u64,
    /// Contents just written to the slot's buffer.
    pub frame_data: FrameData,
    pub frame_data_buffer: BufferId,
    /// Cascades fitted for this frame's camera.
    pub cascades: Vec<ShadowCascade>,
    pub command_buffer: CommandBuffer,
    /// Surface image acquired for this frame, if any.
    pub surface_image: Option<SurfaceImage>,
    on_complete: Option<CompletionHandler>,
}

/// Direction the sunlight travels at `frame_number`.
#[must_use]
pub fn sun_direction(frame_number: u64, angular_speed: f32) -> Vec3 {
    let angle = (frame_number as f64 * f64::from(angular_speed)).rem_euclid(TAU) as f32;
    Vec3::new(angle.cos() * 0.5, -1.0, angle.sin() * 0.5).normalize()
}

// ============================================================================
// FrameScheduler
// ============================================================================

pub struct FrameScheduler {
    slots: Vec<FrameSlot>,
    frame_index: usize,
    frame_number: u64,
}

impl FrameScheduler {
    pub fn new(ctx: &GpuContext) -> Result<Self> {
        let count = ctx.settings.max_frames_in_flight;
        let slots = (0..count)
            .map(|i| {
                let frame_data = GpuBuffer::new(
                    &ctx.device,
                    &BufferDescriptor {
                        label: &format!("FrameData Slot {i}"),
                        size: FrameData::SIZE,
                        usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
                    },
                )?;
                Ok(FrameSlot {
                    semaphore: SlotSemaphore::new(),
                    frame_data,
                })
            })
            .collect::<Result<Vec<_>>>()?;

        log::info!("Frame ring created with {count} slots");
        Ok(Self {
            slots,
            frame_index: 0,
            frame_number: 0,
        })
    }

    /// Waits for the next slot, refreshes its [`FrameData`] and opens the
    /// frame's command buffer.
    ///
    /// `frame_number` advances unless `paused`.
    pub fn begin_frame(
        &mut self,
        ctx: &GpuContext,
        paused: bool,
        inputs: &FrameInputs,
    ) -> Result<FrameContext> {
        let slot_index = self.frame_index;
        let slot = &self.slots[slot_index];

        log::debug!("Frame {} waiting on slot {slot_index}", self.frame_number);
        slot.semaphore.wait()?;

        if !paused {
            self.frame_number += 1;
        }

        let (frame_data, cascades) = compose_frame_data(ctx, self.frame_number, inputs);
        slot.frame_data.write(0, bytemuck::bytes_of(&frame_data));

        Ok(FrameContext {
            slot: slot_index,
            frame_number: self.frame_number,
            frame_data,
            frame_data_buffer: slot.frame_data.id(),
            cascades,
            command_buffer: CommandBuffer::new(
                QueueKind::Frame,
                format!("Frame {}", self.frame_number),
            ),
            surface_image: None,
            on_complete: Some(slot.semaphore.completion_handler()),
        })
    }

    /// Schedules presentation, submits the frame and rotates the ring.
    pub fn end_frame(&mut self, ctx: &GpuContext, mut frame: FrameContext) -> Result<()> {
        if let Some(image) = frame.surface_image.take() {
            frame.command_buffer.present(image);
        }

        let result = ctx.device.submit(frame.command_buffer, frame.on_complete.take());
        if result.is_err() {
            // The device dropped the handler; return the token so the ring
            // does not deadlock on this slot.
            self.slots[frame.slot].semaphore.signal();
        }

        self.frame_index = (self.frame_index + 1) % self.slots.len();
        result
    }

    /// Slot the next `begin_frame` waits on.
    #[inline]
    #[must_use]
    pub fn frame_index(&self) -> usize {
        self.frame_index
    }

    #[inline]
    #[must_use]
    pub fn frame_number(&self) -> u64 {
        self.frame_number
    }

    #[inline]
    #[must_use]
    pub fn slot_count(&self) -> usize {
        self.slots.len()
    }

    #[must_use]
    pub fn slot(&self, index: usize) -> &FrameSlot {
        &self.slots[index]
    }
}

fn compose_frame_data(
    ctx: &GpuContext,
    frame_number: u64,
    inputs: &FrameInputs,
) -> (FrameData, Vec<ShadowCascade>) {
    let settings = &ctx.settings;
    let camera = inputs.camera;
    let view = camera.view_matrix();
    let projection = camera.projection_matrix();
    let sun = sun_direction(frame_number, settings.sun_angular_speed);

    let mut data = FrameData::default();
    data.set_camera(view, projection);
    data.set_scene_model(inputs.scene_model);
    data.set_sun(Vec3::from_array(settings.sun_color), sun);
    data.framebuffer_width = inputs.framebuffer.width;
    data.framebuffer_height = inputs.framebuffer.height;
    data.frame_number = frame_number as u32;
    data.shadow_view_projection =
        build_sun_shadow_vp(sun, settings.shadow_extent, settings.shadow_depth_range);

    let frustum = CameraFrustum::from_view_projection(projection * view, light_view_matrix(sun));
    let cascades = compute_cascades(
        camera.near,
        camera.far,
        settings.cascade_count,
        settings.cascade_split_lambda,
        &frustum,
    );
    data.set_cascades(&cascades);

    (data, cascades)
}
