//! GPU uniform records.
//!
//! The byte layout of these structs is shared with the shader library and
//! must not change without updating both sides. Every member is 4-byte
//! aligned (glam `scalar-math`) and grouped into 16-byte rows so the Rust
//! layout matches WGSL uniform layout without implicit padding.

use bytemuck::{Pod, Zeroable};
use glam::{Mat3, Mat4, Vec3, Vec4};

use crate::renderer::graph::shadow_utils::{MAX_CASCADES, ShadowCascade};

/// `mat3x3<f32>` in uniform layout: three 16-byte columns.
#[repr(C)]
#[derive(Clone, Copy, Debug, Default, PartialEq, Pod, Zeroable)]
pub struct Mat3Uniform {
    pub cols: [Vec4; 3],
}

impl From<Mat3> for Mat3Uniform {
    fn from(m: Mat3) -> Self {
        Self {
            cols: [
                m.x_axis.extend(0.0),
                m.y_axis.extend(0.0),
                m.z_axis.extend(0.0),
            ],
        }
    }
}

/// Per-frame record, one instance per ring slot.
///
/// | Offset | Field |
/// |-------:|-------|
/// | 0    | `projection` |
/// | 64   | `projection_inverse` |
/// | 128  | `view` |
/// | 192  | `view_inverse` |
/// | 256  | `camera_up`, `camera_right`, `camera_forward`, `camera_position` |
/// | 320  | `framebuffer_width`, `framebuffer_height`, `cascade_count`, `frame_number` |
/// | 336  | `sun_color`, `sun_eye_direction`, `sun_world_direction` |
/// | 384  | `scene_model` |
/// | 448  | `scene_modelview` |
/// | 512  | `scene_normal` |
/// | 560  | `shadow_view_projection` |
/// | 624  | `cascade_view_projections` |
/// | 1136 | `cascade_splits` |
#[repr(C)]
#[derive(Clone, Copy, Debug, PartialEq, Pod, Zeroable)]
pub struct FrameData {
    pub projection: Mat4,
    pub projection_inverse: Mat4,
    pub view: Mat4,
    pub view_inverse: Mat4,

    pub camera_up: Vec4,
    pub camera_right: Vec4,
    pub camera_forward: Vec4,
    pub camera_position: Vec4,

    pub framebuffer_width: u32,
    pub framebuffer_height: u32,
    pub cascade_count: u32,
    pub frame_number: u32,

    /// `w` unused.
    pub sun_color: Vec4,
    /// Direction the sunlight travels, in eye space.
    pub sun_eye_direction: Vec4,
    /// Direction the sunlight travels, in world space.
    pub sun_world_direction: Vec4,

    pub scene_model: Mat4,
    pub scene_modelview: Mat4,
    pub scene_normal: Mat3Uniform,

    pub shadow_view_projection: Mat4,
    pub cascade_view_projections: [Mat4; MAX_CASCADES as usize],
    /// Far distance of each cascade, packed four per row.
    pub cascade_splits: [Vec4; MAX_CASCADES as usize / 4],
}

impl Default for FrameData {
    fn default() -> Self {
        Self {
            projection: Mat4::IDENTITY,
            projection_inverse: Mat4::IDENTITY,
            view: Mat4::IDENTITY,
            view_inverse: Mat4::IDENTITY,
            camera_up: Vec4::Y,
            camera_right: Vec4::X,
            camera_forward: Vec4::NEG_Z,
            camera_position: Vec4::W,
            framebuffer_width: 0,
            framebuffer_height: 0,
            cascade_count: 0,
            frame_number: 0,
            sun_color: Vec4::ONE,
            sun_eye_direction: Vec4::NEG_Y,
            sun_world_direction: Vec4::NEG_Y,
            scene_model: Mat4::IDENTITY,
            scene_modelview: Mat4::IDENTITY,
            scene_normal: Mat3Uniform::from(Mat3::IDENTITY),
            shadow_view_projection: Mat4::IDENTITY,
            cascade_view_projections: [Mat4::IDENTITY; MAX_CASCADES as usize],
            cascade_splits: [Vec4::ZERO; MAX_CASCADES as usize / 4],
        }
    }
}

impl FrameData {
    /// Size in bytes of one slot's uniform buffer.
    pub const SIZE: u64 = std::mem::size_of::<Self>() as u64;

    /// Sets the camera matrices and derives inverses and the camera basis.
    pub fn set_camera(&mut self, view: Mat4, projection: Mat4) {
        self.view = view;
        self.projection = projection;
        self.view_inverse = view.inverse();
        self.projection_inverse = projection.inverse();

        self.camera_right = self.view_inverse.x_axis.truncate().extend(0.0);
        self.camera_up = self.view_inverse.y_axis.truncate().extend(0.0);
        self.camera_forward = (-self.view_inverse.z_axis.truncate()).extend(0.0);
        self.camera_position = self.view_inverse.w_axis.truncate().extend(1.0);
    }

    /// Sets the scene model matrix; model-view and normal matrices follow the
    /// current view.
    pub fn set_scene_model(&mut self, model: Mat4) {
        self.scene_model = model;
        self.scene_modelview = self.view * model;
        self.scene_normal = Mat3::from_mat4(self.scene_modelview)
            .inverse()
            .transpose()
            .into();
    }

    /// Sets the sun color and its world-space direction; the eye-space
    /// direction follows the current view.
    pub fn set_sun(&mut self, color: Vec3, world_direction: Vec3) {
        let world = world_direction.normalize_or(Vec3::NEG_Y);
        let eye = self.view.transform_vector3(world).normalize_or(Vec3::NEG_Z);
        self.sun_color = color.extend(1.0);
        self.sun_world_direction = world.extend(0.0);
        self.sun_eye_direction = eye.extend(0.0);
    }

    /// Copies the fitted cascades; unused entries are reset.
    pub fn set_cascades(&mut self, cascades: &[ShadowCascade]) {
        let count = cascades.len().min(MAX_CASCADES as usize);
        let mut splits = [0.0f32; MAX_CASCADES as usize];

        self.cascade_view_projections = [Mat4::IDENTITY; MAX_CASCADES as usize];
        for (i, cascade) in cascades.iter().take(count).enumerate() {
            self.cascade_view_projections[i] = cascade.view_projection;
            splits[i] = cascade.split_distance;
        }
        for (row, chunk) in self.cascade_splits.iter_mut().zip(splits.chunks_exact(4)) {
            *row = Vec4::from_slice(chunk);
        }
        self.cascade_count = count as u32;
    }

    /// Active cascade split distances.
    #[must_use]
    pub fn cascade_split(&self, index: usize) -> f32 {
        self.cascade_splits[index / 4][index % 4]
    }
}
