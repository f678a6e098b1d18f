//! Uniform Layout Tests
//!
//! Tests for:
//! - FrameData byte offsets shared with the shader library
//! - Camera basis, scene matrices, sun and cascade packing

use std::mem::offset_of;

use glam::{Mat3, Mat4, Vec3, Vec4};

use umbra::renderer::graph::shadow_utils::{MAX_CASCADES, ShadowCascade};
use umbra::resources::{FrameData, Mat3Uniform};

const EPSILON: f32 = 1e-4;

// ============================================================================
// Layout
// ============================================================================

#[test]
fn frame_data_offsets_match_shader_layout() {
    assert_eq!(offset_of!(FrameData, projection), 0);
    assert_eq!(offset_of!(FrameData, projection_inverse), 64);
    assert_eq!(offset_of!(FrameData, view), 128);
    assert_eq!(offset_of!(FrameData, view_inverse), 192);
    assert_eq!(offset_of!(FrameData, camera_up), 256);
    assert_eq!(offset_of!(FrameData, camera_right), 272);
    assert_eq!(offset_of!(FrameData, camera_forward), 288);
    assert_eq!(offset_of!(FrameData, camera_position), 304);
    assert_eq!(offset_of!(FrameData, framebuffer_width), 320);
    assert_eq!(offset_of!(FrameData, framebuffer_height), 324);
    assert_eq!(offset_of!(FrameData, cascade_count), 328);
    assert_eq!(offset_of!(FrameData, frame_number), 332);
    assert_eq!(offset_of!(FrameData, sun_color), 336);
    assert_eq!(offset_of!(FrameData, sun_eye_direction), 352);
    assert_eq!(offset_of!(FrameData, sun_world_direction), 368);
    assert_eq!(offset_of!(FrameData, scene_model), 384);
    assert_eq!(offset_of!(FrameData, scene_modelview), 448);
    assert_eq!(offset_of!(FrameData, scene_normal), 512);
    assert_eq!(offset_of!(FrameData, shadow_view_projection), 560);
    assert_eq!(offset_of!(FrameData, cascade_view_projections), 624);
    assert_eq!(offset_of!(FrameData, cascade_splits), 1136);
    assert_eq!(FrameData::SIZE, 1168);
}

#[test]
fn size_is_a_multiple_of_sixteen() {
    assert_eq!(FrameData::SIZE % 16, 0);
    assert_eq!(std::mem::size_of::<Mat3Uniform>(), 48);
}

// ============================================================================
// Contents
// ============================================================================

#[test]
fn camera_basis_follows_view_inverse() {
    let view = Mat4::look_at_rh(Vec3::new(0.0, 0.0, 5.0), Vec3::ZERO, Vec3::Y);
    let projection = Mat4::perspective_rh(1.0, 1.5, 0.1, 100.0);
    let mut data = FrameData::default();
    data.set_camera(view, projection);

    assert!(data.camera_position.abs_diff_eq(Vec4::new(0.0, 0.0, 5.0, 1.0), EPSILON));
    assert!(data.camera_forward.abs_diff_eq(Vec4::new(0.0, 0.0, -1.0, 0.0), EPSILON));
    assert!(data.camera_up.abs_diff_eq(Vec4::new(0.0, 1.0, 0.0, 0.0), EPSILON));
    assert!(data.camera_right.abs_diff_eq(Vec4::new(1.0, 0.0, 0.0, 0.0), EPSILON));
    assert!((data.projection * data.projection_inverse).abs_diff_eq(Mat4::IDENTITY, EPSILON));
}

#[test]
fn scene_matrices_track_view() {
    let view = Mat4::from_translation(Vec3::new(0.0, 0.0, -3.0));
    let model = Mat4::from_scale(Vec3::new(2.0, 2.0, 2.0));
    let mut data = FrameData::default();
    data.set_camera(view, Mat4::IDENTITY);
    data.set_scene_model(model);

    assert_eq!(data.scene_modelview, view * model);
    let expected: Mat3Uniform = Mat3::from_mat4(view * model).inverse().transpose().into();
    for (a, b) in data.scene_normal.cols.iter().zip(expected.cols) {
        assert!(a.abs_diff_eq(b, EPSILON));
    }
}

#[test]
fn sun_direction_is_normalized_in_both_spaces() {
    let view = Mat4::from_rotation_y(std::f32::consts::FRAC_PI_2);
    let mut data = FrameData::default();
    data.set_camera(view, Mat4::IDENTITY);
    data.set_sun(Vec3::new(1.0, 0.5, 0.25), Vec3::new(0.0, -4.0, 0.0));

    assert!(data.sun_world_direction.abs_diff_eq(Vec4::new(0.0, -1.0, 0.0, 0.0), EPSILON));
    assert!((data.sun_eye_direction.truncate().length() - 1.0).abs() < EPSILON);
    assert_eq!(data.sun_color, Vec4::new(1.0, 0.5, 0.25, 1.0));

    data.set_sun(Vec3::ONE, Vec3::ZERO);
    assert!(data.sun_world_direction.is_finite());
}

#[test]
fn cascades_pack_splits_and_reset_unused_entries() {
    let cascade = |i: usize| ShadowCascade {
        split_distance: (i + 1) as f32 * 10.0,
        corners: [Vec3::ZERO; 8],
        center: Vec3::ZERO,
        radius: 1.0,
        min: Vec3::splat(-1.0),
        max: Vec3::ONE,
        view_projection: Mat4::from_scale(Vec3::splat((i + 2) as f32)),
    };
    let mut data = FrameData::default();
    data.set_cascades(&(0..MAX_CASCADES as usize).map(cascade).collect::<Vec<_>>());
    assert_eq!(data.cascade_count, MAX_CASCADES);

    let three: Vec<ShadowCascade> = (0..3).map(cascade).collect();
    data.set_cascades(&three);
    assert_eq!(data.cascade_count, 3);
    for (i, c) in three.iter().enumerate() {
        assert_eq!(data.cascade_split(i), c.split_distance);
        assert_eq!(data.cascade_view_projections[i], c.view_projection);
    }
    for i in 3..MAX_CASCADES as usize {
        assert_eq!(data.cascade_split(i), 0.0);
        assert_eq!(data.cascade_view_projections[i], Mat4::IDENTITY);
    }
}
