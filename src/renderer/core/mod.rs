//! Device abstraction layer
//!
//! Provides:
//! - `GraphicsDevice` / `PresentationSurface`: the capability surface the
//!   frame pipeline is written against
//! - `CommandBuffer`: backend-neutral pass recording
//! - `GpuContext`: the single context object passed to every component
//! - Scoped resource wrappers that release on drop

pub mod command;
pub mod context;
pub mod descriptors;
pub mod device;
pub mod handles;
pub mod scoped;

pub use command::{BindingResource, CommandBuffer};
pub use context::GpuContext;
pub use device::{CompletionHandler, GraphicsDevice, PresentationSurface, QueueKind, SurfaceImage};
pub use handles::Extent2d;
pub use scoped::{GpuAccelerationStructure, GpuBuffer, GpuTexture};
