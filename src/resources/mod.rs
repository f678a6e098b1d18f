//! GPU-visible data layouts shared between the CPU and shaders.

pub mod uniforms;

pub use uniforms::{FrameData, Mat3Uniform};
