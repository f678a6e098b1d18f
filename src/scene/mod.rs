//! Scene collaborator interface
//!
//! The frame pipeline consumes a finalized [`Scene`] produced once, before the
//! first frame, by a [`SceneLoader`]. File parsing is the loader's business;
//! [`StaticSceneLoader`] covers scenes assembled in memory.

pub mod camera;
pub mod mesh;

use glam::Mat4;

pub use camera::Camera;
pub use mesh::{Geometry, Mesh, MeshSource, TextureArraySource, Vertex};

use crate::errors::Result;
use crate::renderer::core::GpuContext;

/// Finalized scene: uploaded meshes and the scene model matrix.
#[derive(Debug)]
pub struct Scene {
    pub meshes: Vec<Mesh>,
    pub model: Mat4,
}

impl Scene {
    #[must_use]
    pub fn empty() -> Self {
        Self {
            meshes: Vec::new(),
            model: Mat4::IDENTITY,
        }
    }

    #[must_use]
    pub fn triangle_count(&self) -> usize {
        self.meshes.iter().map(|m| m.geometry.triangle_count()).sum()
    }
}

/// Produces the finalized scene before the frame loop starts.
pub trait SceneLoader {
    fn load(&self, ctx: &GpuContext) -> Result<Scene>;
}

/// Uploads meshes that are already in memory.
#[derive(Debug, Clone, Default)]
pub struct StaticSceneLoader {
    pub meshes: Vec<MeshSource>,
    pub model: Mat4,
}

impl StaticSceneLoader {
    #[must_use]
    pub fn new(meshes: Vec<MeshSource>) -> Self {
        Self {
            meshes,
            model: Mat4::IDENTITY,
        }
    }
}

impl SceneLoader for StaticSceneLoader {
    fn load(&self, ctx: &GpuContext) -> Result<Scene> {
        let meshes = self
            .meshes
            .iter()
            .cloned()
            .map(|source| Mesh::upload(&ctx.device, source))
            .collect::<Result<Vec<_>>>()?;
        log::info!(
            "Loaded scene: {} meshes, {} triangles",
            meshes.len(),
            meshes.iter().map(|m| m.geometry.triangle_count()).sum::<usize>()
        );
        Ok(Scene {
            meshes,
            model: self.model,
        })
    }
}
