//! Shadow Utilities
//!
//! Pure math for shadow mapping, kept out of the passes for reuse and
//! testability. Nothing here touches the device.
//!
//! # Provided Functions
//!
//! - Cascade split computation (Practical Split Scheme)
//! - Camera frustum corner extraction into light space
//! - Per-cascade bounding sphere and orthographic projection fitting
//! - The single sun shadow matrix sampled by the lighting pass

use glam::{Mat4, Vec3, Vec4Swizzles};

/// Maximum cascade count.
pub const MAX_CASCADES: u32 = 8;

/// Bounding radii are rounded up to a multiple of this value so the cascade
/// box only changes size in discrete steps under camera motion.
pub const RADIUS_GRANULARITY: f32 = 1.0 / 16.0;

/// Fraction by which each cascade's orthographic bounds are widened.
pub const CASCADE_PADDING: f32 = 0.1;

// ============================================================================
// Cascade Split Computation
// ============================================================================

/// Computes cascade split distances using the Practical Split Scheme.
///
/// `lambda` blends between uniform (`0.0`) and logarithmic (`1.0`) distribution.
/// Entry `i` holds the far distance of cascade `i`; entries past
/// `cascade_count` are zero. The last active split is exactly `far`.
#[must_use]
pub fn compute_cascade_splits(
    cascade_count: u32,
    near: f32,
    far: f32,
    lambda: f32,
) -> [f32; MAX_CASCADES as usize] {
    let mut splits = [0.0f32; MAX_CASCADES as usize];
    let n = cascade_count.clamp(1, MAX_CASCADES) as usize;

    for (i, split) in splits.iter_mut().enumerate().take(n) {
        let p = (i + 1) as f32 / n as f32;
        let log_split = near * (far / near).powf(p);
        let uni_split = near + (far - near) * p;
        *split = lambda * log_split + (1.0 - lambda) * uni_split;
    }

    splits[n - 1] = far;
    splits
}

// ============================================================================
// Camera Frustum
// ============================================================================

/// The camera's four near→far corner rays, expressed in light view space.
///
/// Corner order on each plane: bottom-left, bottom-right, top-right, top-left.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CameraFrustum {
    pub near_corners: [Vec3; 4],
    pub far_corners: [Vec3; 4],
    /// World → light view transform the corners were expressed in.
    pub light_view: Mat4,
}

const NDC_CORNERS: [(f32, f32); 4] = [(-1.0, -1.0), (1.0, -1.0), (1.0, 1.0), (-1.0, 1.0)];

impl CameraFrustum {
    /// Extracts the frustum from the camera's view-projection matrix.
    ///
    /// Uses the `[0, 1]` clip depth range of `Mat4::perspective_rh`.
    #[must_use]
    pub fn from_view_projection(view_projection: Mat4, light_view: Mat4) -> Self {
        let to_light = light_view * view_projection.inverse();
        let unproject = |x: f32, y: f32, z: f32| {
            let p = to_light * glam::Vec4::new(x, y, z, 1.0);
            p.xyz() / p.w
        };

        let near_corners = NDC_CORNERS.map(|(x, y)| unproject(x, y, 0.0));
        let far_corners = NDC_CORNERS.map(|(x, y)| unproject(x, y, 1.0));

        Self {
            near_corners,
            far_corners,
            light_view,
        }
    }

    /// Corners of the slice between `t0` and `t1`, fractions along each
    /// near→far corner ray.
    #[must_use]
    pub fn slice_corners(&self, t0: f32, t1: f32) -> [Vec3; 8] {
        let mut corners = [Vec3::ZERO; 8];
        for i in 0..4 {
            let ray = self.far_corners[i] - self.near_corners[i];
            corners[i] = self.near_corners[i] + ray * t0;
            corners[i + 4] = self.near_corners[i] + ray * t1;
        }
        corners
    }
}

/// Light view looking along `light_direction` from the origin.
#[must_use]
pub fn light_view_matrix(light_direction: Vec3) -> Mat4 {
    let dir = safe_direction(light_direction);
    Mat4::look_at_rh(Vec3::ZERO, dir, up_for(dir))
}

fn safe_direction(direction: Vec3) -> Vec3 {
    if direction.length_squared() > 1e-6 {
        direction.normalize()
    } else {
        -Vec3::Z
    }
}

fn up_for(direction: Vec3) -> Vec3 {
    if direction.y.abs() > 0.99 {
        Vec3::X
    } else {
        Vec3::Y
    }
}

// ============================================================================
// Cascade Fitting
// ============================================================================

/// One fitted cascade. Everything except `view_projection` is in light view
/// space.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ShadowCascade {
    /// View-space far distance of this cascade.
    pub split_distance: f32,
    pub corners: [Vec3; 8],
    pub center: Vec3,
    /// Bounding radius, rounded up to [`RADIUS_GRANULARITY`].
    pub radius: f32,
    /// Padded orthographic bounds.
    pub min: Vec3,
    pub max: Vec3,
    /// World → cascade clip transform.
    pub view_projection: Mat4,
}

/// Bounding sphere of a corner set: the mean of the corners and the largest
/// corner distance, rounded up to [`RADIUS_GRANULARITY`].
#[must_use]
pub fn bounding_sphere(corners: &[Vec3; 8]) -> (Vec3, f32) {
    let center = corners.iter().copied().sum::<Vec3>() / 8.0;
    let max_distance = corners
        .iter()
        .map(|c| c.distance(center))
        .fold(0.0f32, f32::max);
    let radius = (max_distance / RADIUS_GRANULARITY).ceil() * RADIUS_GRANULARITY;
    (center, radius)
}

/// Fits a padded orthographic box around `corners` (light view space).
#[must_use]
pub fn fit_cascade(split_distance: f32, corners: [Vec3; 8], light_view: Mat4) -> ShadowCascade {
    let (center, radius) = bounding_sphere(&corners);
    let half = Vec3::splat(radius * (1.0 + CASCADE_PADDING));
    let min = center - half;
    let max = center + half;

    // Light view looks down -Z, so near/far are the negated z bounds.
    let projection = Mat4::orthographic_rh(min.x, max.x, min.y, max.y, -max.z, -min.z);

    ShadowCascade {
        split_distance,
        corners,
        center,
        radius,
        min,
        max,
        view_projection: projection * light_view,
    }
}

/// Splits the camera frustum into `cascade_count` slices and fits one
/// orthographic projection per slice.
///
/// `cascade_count` is clamped to `[1, MAX_CASCADES]`. Deterministic: the
/// result depends only on the arguments.
#[must_use]
pub fn compute_cascades(
    near: f32,
    far: f32,
    cascade_count: u32,
    lambda: f32,
    frustum: &CameraFrustum,
) -> Vec<ShadowCascade> {
    let count = cascade_count.clamp(1, MAX_CASCADES) as usize;
    let splits = compute_cascade_splits(count as u32, near, far, lambda);
    let depth = far - near;

    let mut cascades = Vec::with_capacity(count);
    let mut prev_fraction = 0.0;
    for &split in &splits[..count] {
        let fraction = (split - near) / depth;
        let corners = frustum.slice_corners(prev_fraction, fraction);
        cascades.push(fit_cascade(split, corners, frustum.light_view));
        prev_fraction = fraction;
    }
    cascades
}

// ============================================================================
// Single Sun Shadow
// ============================================================================

/// View-projection of the sun's shadow map: an orthographic box of half-size
/// `extent` and depth `depth_range`, centered on the world origin and looking
/// along `light_direction`.
#[must_use]
pub fn build_sun_shadow_vp(light_direction: Vec3, extent: f32, depth_range: f32) -> Mat4 {
    let dir = safe_direction(light_direction);
    let eye = -dir * (depth_range * 0.5);
    let view = Mat4::look_at_rh(eye, Vec3::ZERO, up_for(dir));
    let proj = Mat4::orthographic_rh(-extent, extent, -extent, extent, 0.0, depth_range);
    proj * view
}
