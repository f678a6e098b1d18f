#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::cast_precision_loss)]
#![allow(clippy::cast_possible_truncation)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::missing_errors_doc)]
#![allow(clippy::missing_panics_doc)]
#![allow(clippy::too_many_arguments)]

pub mod backend;
pub mod errors;
pub mod renderer;
pub mod resources;
pub mod scene;

pub use backend::wgpu::{ShaderLibrary, WgpuDevice};
pub use errors::{Result, UmbraError};
pub use renderer::Renderer;
pub use renderer::acceleration::SceneAcceleration;
pub use renderer::core::{GpuContext, GraphicsDevice, PresentationSurface};
pub use renderer::graph::{FrameScheduler, RenderGraph};
pub use renderer::settings::RendererSettings;
pub use resources::FrameData;
pub use scene::{Camera, Geometry, Scene, SceneLoader, StaticSceneLoader};
