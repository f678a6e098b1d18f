//! Scene Acceleration Structure
//!
//! Merges every mesh of the finalized scene into one triangle soup, uploads
//! it alongside per-triangle shading data, and builds a single acceleration
//! structure over it. This runs once before the frame loop and blocks until
//! the device reports the build complete. Nothing here changes afterwards.

use std::sync::Arc;

use bytemuck::{Pod, Zeroable};
use glam::{Vec4, Vec4Swizzles};

use crate::errors::{Result, UmbraError};
use crate::renderer::core::command::AccelerationBuild;
use crate::renderer::core::descriptors::{AccelerationGeometry, BufferDescriptor};
use crate::renderer::core::{
    CommandBuffer, GpuAccelerationStructure, GpuBuffer, GpuContext, GraphicsDevice, QueueKind,
};
use crate::scene::{Geometry, Scene};

/// Stride of one merged vertex position (`[f32; 3]`).
pub const MERGED_VERTEX_STRIDE: u64 = std::mem::size_of::<[f32; 3]>() as u64;

// ============================================================================
// Triangle iteration
// ============================================================================

/// Complete triangles of `geometry` whose indices are all in range.
fn valid_triangles(geometry: &Geometry) -> impl Iterator<Item = [u32; 3]> + '_ {
    let vertex_count = geometry.vertices.len() as u32;
    geometry
        .indices
        .chunks_exact(3)
        .map(|t| [t[0], t[1], t[2]])
        .filter(move |t| t.iter().all(|&i| i < vertex_count))
}

// ============================================================================
// MergedGeometry
// ============================================================================

/// All scene positions concatenated, with each mesh's indices offset by the
/// number of vertices merged before it.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MergedGeometry {
    pub positions: Vec<[f32; 3]>,
    pub indices: Vec<u32>,
}

impl MergedGeometry {
    pub fn merge<'a>(geometries: impl IntoIterator<Item = &'a Geometry>) -> Self {
        let mut merged = Self::default();
        for geometry in geometries {
            let base = merged.positions.len() as u32;
            let before = merged.indices.len();

            merged
                .positions
                .extend(geometry.positions().map(|p| p.to_array()));
            merged
                .indices
                .extend(valid_triangles(geometry).flatten().map(|i| i + base));

            let dropped = geometry.triangle_count() - (merged.indices.len() - before) / 3;
            if dropped > 0 {
                log::warn!("Dropped {dropped} triangles with out-of-range indices while merging");
            }
        }
        merged
    }

    #[inline]
    #[must_use]
    pub fn vertex_count(&self) -> usize {
        self.positions.len()
    }

    #[inline]
    #[must_use]
    pub fn index_count(&self) -> usize {
        self.indices.len()
    }

    #[inline]
    #[must_use]
    pub fn triangle_count(&self) -> usize {
        self.indices.len() / 3
    }

    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.indices.is_empty()
    }
}

// ============================================================================
// TriangleData
// ============================================================================

/// Shading data of one merged triangle, read by the ray-tracing kernel at a
/// hit's primitive index.
#[repr(C)]
#[derive(Clone, Copy, Debug, Default, PartialEq, Pod, Zeroable)]
pub struct TriangleData {
    pub normals: [Vec4; 3],
    pub color: Vec4,
}

/// Builds one entry per merged triangle, in [`MergedGeometry::merge`] order.
pub fn collect_triangle_data<'a>(
    meshes: impl IntoIterator<Item = (&'a Geometry, Vec4)>,
) -> Vec<TriangleData> {
    let mut triangles = Vec::new();
    for (geometry, color) in meshes {
        triangles.extend(valid_triangles(geometry).map(|tri| TriangleData {
            normals: tri.map(|i| geometry.vertices[i as usize].normal.xyz().extend(0.0)),
            color,
        }));
    }
    triangles
}

// ============================================================================
// SceneAcceleration
// ============================================================================

/// Device buffers backing the merged geometry.
#[derive(Debug)]
pub struct SceneBuffers {
    pub vertices: GpuBuffer,
    pub indices: GpuBuffer,
    pub triangles: GpuBuffer,
}

/// The merged scene geometry and, when the scene has triangles, its
/// acceleration structure.
#[derive(Debug, Default)]
pub struct SceneAcceleration {
    merged: MergedGeometry,
    triangles: Vec<TriangleData>,
    // Field order matters: the structure is released before its inputs.
    structure: Option<GpuAccelerationStructure>,
    buffers: Option<SceneBuffers>,
}

impl SceneAcceleration {
    /// Merges `scene` and builds its acceleration structure.
    pub fn build(ctx: &GpuContext, scene: &Scene) -> Result<Self> {
        Self::build_from(
            &ctx.device,
            scene.meshes.iter().map(|m| (&m.geometry, m.base_color)),
        )
    }

    /// Merges `(geometry, material color)` pairs and builds the structure.
    ///
    /// Blocks until the build submitted on [`QueueKind::OneShot`] completes.
    /// Empty input yields an empty merge and no structure.
    pub fn build_from<'a>(
        device: &Arc<dyn GraphicsDevice>,
        meshes: impl IntoIterator<Item = (&'a Geometry, Vec4)> + Clone,
    ) -> Result<Self> {
        let merged = MergedGeometry::merge(meshes.clone().into_iter().map(|(g, _)| g));
        let triangles = collect_triangle_data(meshes);
        debug_assert_eq!(merged.triangle_count(), triangles.len());

        if merged.is_empty() {
            log::warn!("Scene has no triangles; ray tracing is disabled");
            return Ok(Self {
                merged,
                triangles,
                structure: None,
                buffers: None,
            });
        }

        let supported = device.supports_acceleration_structures();
        let input_usage = if supported {
            wgpu::BufferUsages::BLAS_INPUT | wgpu::BufferUsages::STORAGE
        } else {
            wgpu::BufferUsages::STORAGE
        };
        let buffers = SceneBuffers {
            vertices: GpuBuffer::with_contents(
                device,
                "Merged Vertices",
                input_usage,
                bytemuck::cast_slice(&merged.positions),
            )?,
            indices: GpuBuffer::with_contents(
                device,
                "Merged Indices",
                input_usage,
                bytemuck::cast_slice(&merged.indices),
            )?,
            triangles: GpuBuffer::with_contents(
                device,
                "Triangle Resources",
                wgpu::BufferUsages::STORAGE,
                bytemuck::cast_slice(&triangles),
            )?,
        };

        let structure = if supported {
            Some(Self::build_structure(device, &merged, &buffers)?)
        } else {
            log::warn!("Device cannot build acceleration structures; ray tracing is disabled");
            None
        };

        Ok(Self {
            merged,
            triangles,
            structure,
            buffers: Some(buffers),
        })
    }

    fn build_structure(
        device: &Arc<dyn GraphicsDevice>,
        merged: &MergedGeometry,
        buffers: &SceneBuffers,
    ) -> Result<GpuAccelerationStructure> {
        let geometry = AccelerationGeometry {
            vertex_buffer: buffers.vertices.id(),
            vertex_count: merged.vertex_count() as u32,
            vertex_stride: MERGED_VERTEX_STRIDE,
            index_buffer: buffers.indices.id(),
            index_count: merged.index_count() as u32,
        };

        let sizes = device.acceleration_structure_sizes(&geometry);
        let id = device.create_acceleration_structure(&geometry, sizes)?;
        let structure = GpuAccelerationStructure::from_raw(device, id, sizes.structure_size);

        let scratch = if sizes.scratch_size > 0 {
            Some(GpuBuffer::new(
                device,
                &BufferDescriptor {
                    label: "Acceleration Scratch",
                    size: sizes.scratch_size,
                    usage: wgpu::BufferUsages::STORAGE,
                },
            )?)
        } else {
            None
        };

        let mut commands = CommandBuffer::new(QueueKind::OneShot, "Acceleration Structure Build");
        commands.build_acceleration_structure(AccelerationBuild {
            structure: id,
            geometry,
            scratch: scratch.as_ref().map(GpuBuffer::id),
        });

        let (done_tx, done_rx) = flume::bounded(1);
        device.submit(
            commands,
            Some(Box::new(move || {
                let _ = done_tx.send(());
            })),
        )?;
        done_rx.recv().map_err(|_| {
            UmbraError::DeviceLost("acceleration structure build never completed".to_string())
        })?;
        drop(scratch);

        log::info!(
            "Built acceleration structure: {} triangles, {} bytes (scratch {} bytes)",
            geometry.triangle_count(),
            sizes.structure_size,
            sizes.scratch_size
        );
        Ok(structure)
    }

    #[inline]
    #[must_use]
    pub fn merged(&self) -> &MergedGeometry {
        &self.merged
    }

    #[inline]
    #[must_use]
    pub fn triangles(&self) -> &[TriangleData] {
        &self.triangles
    }

    #[inline]
    #[must_use]
    pub fn structure(&self) -> Option<&GpuAccelerationStructure> {
        self.structure.as_ref()
    }

    #[inline]
    #[must_use]
    pub fn buffers(&self) -> Option<&SceneBuffers> {
        self.buffers.as_ref()
    }
}
