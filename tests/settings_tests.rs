//! Renderer Settings Tests
//!
//! Tests for:
//! - Defaults and JSON loading with partial documents
//! - Range validation of every constrained field

use umbra::errors::UmbraError;
use umbra::renderer::settings::{MAX_FRAMES_IN_FLIGHT_LIMIT, RendererSettings};

fn assert_invalid(settings: &RendererSettings, field: &str) {
    match settings.validate() {
        Err(UmbraError::InvalidSettings(message)) => {
            assert!(message.contains(field), "Unexpected message: {message}");
        }
        other => panic!("Expected InvalidSettings for {field}, got {other:?}"),
    }
}

#[test]
fn defaults_are_valid() {
    let settings = RendererSettings::default();
    assert!(settings.validate().is_ok());
    assert_eq!(settings.max_frames_in_flight, 3);
    assert_eq!(settings.cascade_count, 4);
    assert_eq!(settings.shadow_map_size, 2048);
    assert_eq!(settings.ray_trace_workgroup_size, 8);
    assert!(settings.vsync);
}

#[test]
fn clear_color_converts_channels() {
    let settings = RendererSettings {
        clear_color: [0.25, 0.5, 0.75, 1.0],
        ..RendererSettings::default()
    };
    let color = settings.clear_color();
    assert_eq!(
        color,
        wgpu::Color {
            r: 0.25,
            g: 0.5,
            b: 0.75,
            a: 1.0
        }
    );
}

// ============================================================================
// JSON
// ============================================================================

#[test]
fn partial_json_keeps_defaults() -> anyhow::Result<()> {
    let settings =
        RendererSettings::from_json_str(r#"{ "max_frames_in_flight": 2, "vsync": false }"#)?;
    assert_eq!(settings.max_frames_in_flight, 2);
    assert!(!settings.vsync);
    assert_eq!(settings.cascade_count, 4);
    assert_eq!(settings.sun_color, [1.0, 0.95, 0.85]);
    Ok(())
}

#[test]
fn empty_json_equals_defaults() -> anyhow::Result<()> {
    let settings = RendererSettings::from_json_str("{}")?;
    let defaults = RendererSettings::default();
    assert_eq!(settings.max_frames_in_flight, defaults.max_frames_in_flight);
    assert_eq!(settings.cascade_split_lambda, defaults.cascade_split_lambda);
    assert_eq!(settings.clear_color, defaults.clear_color);
    Ok(())
}

#[test]
fn settings_file_round_trips_through_disk() -> anyhow::Result<()> {
    let path = std::env::temp_dir().join(format!("umbra-settings-{}.json", std::process::id()));
    std::fs::write(&path, r#"{ "shadow_map_size": 4096, "cascade_count": 2 }"#)?;
    let settings = RendererSettings::from_json_file(&path);
    std::fs::remove_file(&path)?;

    let settings = settings?;
    assert_eq!(settings.shadow_map_size, 4096);
    assert_eq!(settings.cascade_count, 2);
    Ok(())
}

#[test]
fn malformed_json_is_reported() {
    let err = RendererSettings::from_json_str("{ max_frames_in_flight: ").unwrap_err();
    assert!(matches!(err, UmbraError::JsonError(_)));
}

#[test]
fn json_values_are_validated() {
    let err = RendererSettings::from_json_str(r#"{ "cascade_count": 0 }"#).unwrap_err();
    assert!(matches!(err, UmbraError::InvalidSettings(_)));
}

#[test]
fn missing_file_is_an_io_error() {
    let err = RendererSettings::from_json_file("/nonexistent/umbra/renderer.json").unwrap_err();
    assert!(matches!(err, UmbraError::IoError(_)));
}

// ============================================================================
// Validation
// ============================================================================

#[test]
fn frames_in_flight_must_be_in_range() {
    for value in [0, MAX_FRAMES_IN_FLIGHT_LIMIT + 1] {
        let settings = RendererSettings {
            max_frames_in_flight: value,
            ..RendererSettings::default()
        };
        assert_invalid(&settings, "max_frames_in_flight");
    }
    let single = RendererSettings {
        max_frames_in_flight: 1,
        ..RendererSettings::default()
    };
    assert!(single.validate().is_ok());
}

#[test]
fn cascade_settings_must_be_in_range() {
    let zero = RendererSettings {
        cascade_count: 0,
        ..RendererSettings::default()
    };
    assert_invalid(&zero, "cascade_count");

    let lambda = RendererSettings {
        cascade_split_lambda: 1.5,
        ..RendererSettings::default()
    };
    assert_invalid(&lambda, "cascade_split_lambda");
}

#[test]
fn shadow_and_dispatch_sizes_must_be_positive() {
    let shadow = RendererSettings {
        shadow_map_size: 0,
        ..RendererSettings::default()
    };
    assert_invalid(&shadow, "shadow_map_size");

    let extent = RendererSettings {
        shadow_extent: -1.0,
        ..RendererSettings::default()
    };
    assert_invalid(&extent, "shadow_extent");

    let workgroup = RendererSettings {
        ray_trace_workgroup_size: 0,
        ..RendererSettings::default()
    };
    assert_invalid(&workgroup, "ray_trace_workgroup_size");
}
