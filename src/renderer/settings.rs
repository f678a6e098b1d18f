//! Renderer Settings
//!
//! This module defines the configuration consumed once when the renderer is
//! constructed: frame ring depth, cascade layout, shadow map resolution and
//! the handful of scene-lighting defaults the frame loop animates.
//!
//! # Quick Start
//!
//! ```rust,ignore
//! use umbra::renderer::settings::RendererSettings;
//!
//! // Defaults: triple buffering, 4 cascades, 2048² shadow map
//! let settings = RendererSettings::default();
//!
//! // Or from a JSON file; unspecified fields keep their defaults
//! let settings = RendererSettings::from_json_file("renderer.json")?;
//! ```

use std::path::Path;

use serde::Deserialize;

use crate::errors::{Result, UmbraError};
use crate::renderer::graph::shadow_utils::MAX_CASCADES;

/// Upper bound for [`RendererSettings::max_frames_in_flight`].
pub const MAX_FRAMES_IN_FLIGHT_LIMIT: usize = 8;

// ---------------------------------------------------------------------------
// RendererSettings
// ---------------------------------------------------------------------------

/// Global configuration for renderer initialization.
///
/// # Fields
///
/// | Field                    | Description                                   | Default            |
/// |--------------------------|-----------------------------------------------|--------------------|
/// | `max_frames_in_flight`   | Ring slots the CPU may run ahead of the GPU   | `3`                |
/// | `cascade_count`          | Shadow cascades computed per frame            | `4`                |
/// | `cascade_split_lambda`   | Log/uniform split blend                       | `0.75`             |
/// | `shadow_map_size`        | Shadow map resolution (square)                | `2048`             |
/// | `shadow_extent`          | Half-size of the sun's ortho box              | `30.0`             |
/// | `shadow_depth_range`     | Depth of the sun's ortho box                  | `150.0`            |
/// | `sun_color`              | Linear RGB sun color                          | `[1.0, 0.95, 0.85]`|
/// | `sun_angular_speed`      | Sun orbit speed in radians per frame          | `0.002`            |
/// | `clear_color`            | Surface clear color before lighting           | Black              |
/// | `vsync`                  | Vertical sync                                 | `true`             |
/// | `ray_trace_workgroup_size` | Ray-trace kernel workgroup edge             | `8`                |
/// | `debug_axis_length`      | Length of the debug axis gizmo                | `1.0`              |
/// | `power_preference`       | GPU adapter selection (not serialized)        | `HighPerformance`  |
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct RendererSettings {
    // === Frame Pacing ===
    /// Number of ring slots. The CPU never records more than this many
    /// frames ahead of GPU completion.
    pub max_frames_in_flight: usize,

    /// Enable vertical synchronization.
    pub vsync: bool,

    // === Shadows ===
    /// Cascade count `K`, clamped to `[1, MAX_CASCADES]` by validation.
    pub cascade_count: u32,

    /// Blend between uniform (`0.0`) and logarithmic (`1.0`) cascade splits.
    pub cascade_split_lambda: f32,

    /// Shadow map resolution. Independent of the surface size.
    pub shadow_map_size: u32,

    /// Half-size of the orthographic box used for the single sun shadow map.
    pub shadow_extent: f32,

    /// Depth of the orthographic box used for the single sun shadow map.
    pub shadow_depth_range: f32,

    // === Lighting ===
    /// Linear RGB color of the sun.
    pub sun_color: [f32; 3],

    /// Sun orbit speed, in radians per advanced frame.
    pub sun_angular_speed: f32,

    /// Clear color of the surface image before the lighting pass accumulates.
    pub clear_color: [f64; 4],

    // === Passes ===
    /// Workgroup edge length of the ray-tracing kernel (square workgroups).
    pub ray_trace_workgroup_size: u32,

    /// Length of the axis gizmo drawn by the forward/debug pass.
    pub debug_axis_length: f32,

    // === GPU / Backend Configuration ===
    /// GPU adapter selection preference.
    #[serde(skip)]
    pub power_preference: wgpu::PowerPreference,
}

impl Default for RendererSettings {
    fn default() -> Self {
        Self {
            max_frames_in_flight: 3,
            vsync: true,
            cascade_count: 4,
            cascade_split_lambda: 0.75,
            shadow_map_size: 2048,
            shadow_extent: 30.0,
            shadow_depth_range: 150.0,
            sun_color: [1.0, 0.95, 0.85],
            sun_angular_speed: 0.002,
            clear_color: [0.0, 0.0, 0.0, 1.0],
            ray_trace_workgroup_size: 8,
            debug_axis_length: 1.0,
            power_preference: wgpu::PowerPreference::HighPerformance,
        }
    }
}

impl RendererSettings {
    /// Parses settings from a JSON document and validates them.
    pub fn from_json_str(source: &str) -> Result<Self> {
        let settings: Self = serde_json::from_str(source)?;
        settings.validate()?;
        Ok(settings)
    }

    /// Reads, parses and validates a JSON settings file.
    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self> {
        let source = std::fs::read_to_string(path)?;
        Self::from_json_str(&source)
    }

    /// Checks every field against the ranges the frame pipeline supports.
    pub fn validate(&self) -> Result<()> {
        if self.max_frames_in_flight == 0 || self.max_frames_in_flight > MAX_FRAMES_IN_FLIGHT_LIMIT {
            return Err(UmbraError::InvalidSettings(format!(
                "max_frames_in_flight must be in 1..={MAX_FRAMES_IN_FLIGHT_LIMIT}, got {}",
                self.max_frames_in_flight
            )));
        }
        if self.cascade_count == 0 || self.cascade_count > MAX_CASCADES {
            return Err(UmbraError::InvalidSettings(format!(
                "cascade_count must be in 1..={MAX_CASCADES}, got {}",
                self.cascade_count
            )));
        }
        if !(0.0..=1.0).contains(&self.cascade_split_lambda) {
            return Err(UmbraError::InvalidSettings(format!(
                "cascade_split_lambda must be in [0, 1], got {}",
                self.cascade_split_lambda
            )));
        }
        if self.shadow_map_size == 0 {
            return Err(UmbraError::InvalidSettings(
                "shadow_map_size must be non-zero".to_string(),
            ));
        }
        if self.shadow_extent <= 0.0 || self.shadow_depth_range <= 0.0 {
            return Err(UmbraError::InvalidSettings(
                "shadow_extent and shadow_depth_range must be positive".to_string(),
            ));
        }
        if self.ray_trace_workgroup_size == 0 {
            return Err(UmbraError::InvalidSettings(
                "ray_trace_workgroup_size must be non-zero".to_string(),
            ));
        }
        Ok(())
    }

    /// Returns the clear color as a wgpu color.
    #[inline]
    #[must_use]
    pub fn clear_color(&self) -> wgpu::Color {
        let [r, g, b, a] = self.clear_color;
        wgpu::Color { r, g, b, a }
    }
}
