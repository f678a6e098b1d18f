//! Frame pipeline organisation
//!
//! Provides:
//! - FrameScheduler: the in-flight ring and its slot semaphores
//! - FrameResources: surface-sized render targets and the shadow map
//! - RenderGraph / RenderNode: the fixed pass sequence
//! - shadow_utils: cascade split and projection math

pub mod context;
pub mod frame;
pub mod frame_resources;
pub mod graph;
pub mod node;
pub mod passes;
pub mod shadow_utils;

pub use context::{ExecuteContext, GraphInputs, ShadowSource, SingleShadowMap};
pub use frame::{FrameContext, FrameInputs, FrameScheduler, SlotSemaphore};
pub use frame_resources::{FrameResources, SurfaceTargets};
pub use graph::RenderGraph;
pub use node::RenderNode;
pub use passes::GBUFFER_STENCIL_REFERENCE;
