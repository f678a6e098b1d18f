//! Error Types
//!
//! This module defines the error types used throughout the renderer.
//!
//! # Overview
//!
//! The main error type [`UmbraError`] covers all failure modes including:
//! - GPU initialization failures (adapter, device, surface)
//! - Shader library and pipeline creation failures
//! - Resource allocation and handle lookup errors
//! - Settings validation and parsing
//!
//! Initialization errors are fatal: they indicate a broken build or install
//! rather than a transient condition, and callers are expected to terminate
//! with the diagnostic.
//!
//! # Usage
//!
//! All public APIs return [`Result<T>`] which is an alias for `std::result::Result<T, UmbraError>`.
//!
//! ```rust,ignore
//! use umbra::errors::{UmbraError, Result};
//!
//! fn init_renderer() -> Result<()> {
//!     // Operations that may fail return Result
//!     Ok(())
//! }
//! ```

use thiserror::Error;

/// The main error type for the renderer.
#[derive(Error, Debug)]
pub enum UmbraError {
    // ========================================================================
    // GPU & Rendering Errors
    // ========================================================================
    /// Failed to request a compatible GPU adapter.
    #[error("Failed to request WGPU adapter: {0}")]
    AdapterRequestFailed(String),

    /// Failed to create the GPU device.
    #[error("Failed to create WGPU device: {0}")]
    DeviceCreateFailed(#[from] wgpu::RequestDeviceError),

    /// The device stopped delivering completion notifications.
    #[error("GPU device lost: {0}")]
    DeviceLost(String),

    /// Window system error.
    #[error("Window system error: {0}")]
    WindowError(#[from] raw_window_handle::HandleError),

    /// Failed to create or configure the presentation surface.
    #[error("Surface error: {0}")]
    SurfaceError(String),

    /// The shader library could not be loaded or compiled.
    #[error("Shader library error: {0}")]
    ShaderLibraryFailed(String),

    /// A render or compute pipeline could not be created.
    #[error("Pipeline creation failed for '{label}': {reason}")]
    PipelineCreationFailed {
        /// Pipeline label
        label: String,
        /// Backend diagnostic
        reason: String,
    },

    // ========================================================================
    // Resource Errors
    // ========================================================================
    /// A GPU resource could not be allocated.
    #[error("Resource allocation failed for '{label}': {reason}")]
    AllocationFailed {
        /// Resource label
        label: String,
        /// Backend diagnostic
        reason: String,
    },

    /// A handle referenced a resource that no longer exists.
    #[error("Unknown resource handle: {0}")]
    UnknownHandle(String),

    /// The device cannot build acceleration structures.
    #[error("Feature not supported: {0}")]
    FeatureNotSupported(String),

    // ========================================================================
    // Configuration Errors
    // ========================================================================
    /// Renderer settings failed validation.
    #[error("Invalid renderer settings: {0}")]
    InvalidSettings(String),

    /// JSON parsing error.
    #[error("JSON parse error: {0}")]
    JsonError(#[from] serde_json::Error),

    /// File I/O error.
    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),
}

/// Alias for `Result<T, UmbraError>`.
pub type Result<T> = std::result::Result<T, UmbraError>;
