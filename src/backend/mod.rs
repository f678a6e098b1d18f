//! Concrete graphics backends.

pub mod wgpu;
