//! Mesh geometry and its GPU upload.
//!
//! [`Geometry`] is the CPU-side vertex/index data a scene loader produces.
//! [`Mesh`] pairs it with the uploaded buffers and material textures the
//! G-buffer and shadow passes bind.

use std::sync::Arc;

use bytemuck::{Pod, Zeroable};
use glam::{Vec2, Vec3, Vec4, Vec4Swizzles};

use crate::errors::Result;
use crate::renderer::core::descriptors::TextureDescriptor;
use crate::renderer::core::handles::Extent2d;
use crate::renderer::core::{GpuBuffer, GpuTexture, GraphicsDevice};

// ============================================================================
// Vertex
// ============================================================================

/// Interleaved mesh vertex. Texture indices select a layer of the mesh's
/// diffuse/normal texture arrays; `-1` means untextured.
#[repr(C)]
#[derive(Clone, Copy, Debug, PartialEq, Pod, Zeroable)]
pub struct Vertex {
    pub position: Vec4,
    pub normal: Vec4,
    pub tangent: Vec4,
    pub bitangent: Vec4,
    pub uv: Vec2,
    pub diffuse_texture_index: i32,
    pub normal_texture_index: i32,
}

impl Vertex {
    const ATTRIBUTES: [wgpu::VertexAttribute; 7] = wgpu::vertex_attr_array![
        0 => Float32x4,
        1 => Float32x4,
        2 => Float32x4,
        3 => Float32x4,
        4 => Float32x2,
        5 => Sint32,
        6 => Sint32,
    ];

    #[must_use]
    pub fn new(position: Vec3, normal: Vec3, uv: Vec2) -> Self {
        Self {
            position: position.extend(1.0),
            normal: normal.extend(0.0),
            tangent: Vec4::ZERO,
            bitangent: Vec4::ZERO,
            uv,
            diffuse_texture_index: -1,
            normal_texture_index: -1,
        }
    }

    #[must_use]
    pub fn layout() -> wgpu::VertexBufferLayout<'static> {
        wgpu::VertexBufferLayout {
            array_stride: std::mem::size_of::<Self>() as wgpu::BufferAddress,
            step_mode: wgpu::VertexStepMode::Vertex,
            attributes: &Self::ATTRIBUTES,
        }
    }
}

// ============================================================================
// Geometry
// ============================================================================

/// Vertex and index arrays of one mesh, immutable once the scene is loaded.
#[derive(Debug, Clone, Default)]
pub struct Geometry {
    pub vertices: Vec<Vertex>,
    pub indices: Vec<u32>,
}

impl Geometry {
    #[must_use]
    pub fn new(vertices: Vec<Vertex>, indices: Vec<u32>) -> Self {
        Self { vertices, indices }
    }

    #[inline]
    #[must_use]
    pub fn triangle_count(&self) -> usize {
        self.indices.len() / 3
    }

    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.vertices.is_empty() || self.indices.len() < 3
    }

    /// Positions as tightly packed `[f32; 3]`.
    pub fn positions(&self) -> impl Iterator<Item = Vec3> + '_ {
        self.vertices.iter().map(|v| v.position.xyz())
    }

    /// Fills per-vertex tangents and bitangents from positions and UVs.
    ///
    /// Contributions of every triangle sharing a vertex are accumulated and
    /// then orthonormalised against the vertex normal. Triangles with
    /// degenerate UVs contribute nothing.
    pub fn compute_tangents(&mut self) {
        let mut tangents = vec![Vec3::ZERO; self.vertices.len()];
        let mut bitangents = vec![Vec3::ZERO; self.vertices.len()];

        for tri in self.indices.chunks_exact(3) {
            let [i0, i1, i2] = [tri[0] as usize, tri[1] as usize, tri[2] as usize];
            let (Some(v0), Some(v1), Some(v2)) =
                (self.vertices.get(i0), self.vertices.get(i1), self.vertices.get(i2))
            else {
                continue;
            };

            let e1 = v1.position.xyz() - v0.position.xyz();
            let e2 = v2.position.xyz() - v0.position.xyz();
            let d1 = v1.uv - v0.uv;
            let d2 = v2.uv - v0.uv;

            let det = d1.x * d2.y - d2.x * d1.y;
            if det.abs() < 1e-8 {
                continue;
            }
            let r = 1.0 / det;
            let t = (e1 * d2.y - e2 * d1.y) * r;
            let b = (e2 * d1.x - e1 * d2.x) * r;

            for i in [i0, i1, i2] {
                tangents[i] += t;
                bitangents[i] += b;
            }
        }

        for ((vertex, t), b) in self.vertices.iter_mut().zip(tangents).zip(bitangents) {
            let n = vertex.normal.xyz();
            // Gram-Schmidt
            let t = (t - n * n.dot(t)).normalize_or_zero();
            let b = if b.length_squared() > 0.0 {
                b.normalize()
            } else {
                n.cross(t)
            };
            vertex.tangent = t.extend(0.0);
            vertex.bitangent = b.extend(0.0);
        }
    }
}

// ============================================================================
// Material textures
// ============================================================================

/// RGBA8 pixel data for one texture array.
#[derive(Debug, Clone)]
pub struct TextureArraySource {
    pub size: Extent2d,
    /// One tightly packed RGBA8 image per layer.
    pub layers: Vec<Vec<u8>>,
}

impl TextureArraySource {
    /// A single 1×1 layer of `rgba`.
    #[must_use]
    pub fn solid(rgba: [u8; 4]) -> Self {
        Self {
            size: Extent2d::new(1, 1),
            layers: vec![rgba.to_vec()],
        }
    }
}

/// Describes a texture array to the shaders.
#[repr(C)]
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Pod, Zeroable)]
pub struct TextureInfo {
    pub width: u32,
    pub height: u32,
    pub layer_count: u32,
    pub _pad: u32,
}

/// An uploaded texture array plus its info buffer.
#[derive(Debug)]
pub struct MaterialTextures {
    pub texture: GpuTexture,
    pub info: GpuBuffer,
}

impl MaterialTextures {
    pub fn upload(
        device: &Arc<dyn GraphicsDevice>,
        label: &str,
        format: wgpu::TextureFormat,
        source: &TextureArraySource,
    ) -> Result<Self> {
        let layer_count = source.layers.len().max(1) as u32;
        let texture = GpuTexture::new(
            device,
            &TextureDescriptor {
                label,
                size: source.size,
                array_layers: layer_count,
                format,
                usage: wgpu::TextureUsages::TEXTURE_BINDING | wgpu::TextureUsages::COPY_DST,
            },
            wgpu::TextureViewDimension::D2Array,
        )?;
        for (layer, pixels) in source.layers.iter().enumerate() {
            device.write_texture(texture.texture(), layer as u32, source.size, pixels);
        }

        let info = TextureInfo {
            width: source.size.width,
            height: source.size.height,
            layer_count,
            _pad: 0,
        };
        let info = GpuBuffer::with_contents(
            device,
            &format!("{label} Info"),
            wgpu::BufferUsages::UNIFORM,
            bytemuck::bytes_of(&info),
        )?;

        Ok(Self { texture, info })
    }
}

// ============================================================================
// Mesh
// ============================================================================

/// Everything a scene loader supplies for one mesh.
#[derive(Debug, Clone)]
pub struct MeshSource {
    pub label: String,
    pub geometry: Geometry,
    pub base_color: Vec4,
    pub diffuse: Option<TextureArraySource>,
    pub normal: Option<TextureArraySource>,
}

/// A mesh with its buffers and material textures resident on the device.
#[derive(Debug)]
pub struct Mesh {
    pub label: String,
    pub geometry: Geometry,
    pub base_color: Vec4,
    pub vertex_buffer: GpuBuffer,
    pub index_buffer: GpuBuffer,
    pub diffuse: MaterialTextures,
    pub normal: MaterialTextures,
}

impl Mesh {
    /// Uploads `source`. Missing textures are replaced by a 1×1 white
    /// diffuse layer and a flat normal layer.
    pub fn upload(device: &Arc<dyn GraphicsDevice>, source: MeshSource) -> Result<Self> {
        let MeshSource {
            label,
            geometry,
            base_color,
            diffuse,
            normal,
        } = source;

        let vertex_buffer = GpuBuffer::with_contents(
            device,
            &format!("{label} Vertices"),
            wgpu::BufferUsages::VERTEX,
            bytemuck::cast_slice(&geometry.vertices),
        )?;
        let index_buffer = GpuBuffer::with_contents(
            device,
            &format!("{label} Indices"),
            wgpu::BufferUsages::INDEX,
            bytemuck::cast_slice(&geometry.indices),
        )?;

        let diffuse = diffuse.unwrap_or_else(|| TextureArraySource::solid([255, 255, 255, 255]));
        let normal = normal.unwrap_or_else(|| TextureArraySource::solid([128, 128, 255, 255]));
        let diffuse = MaterialTextures::upload(
            device,
            &format!("{label} Diffuse"),
            wgpu::TextureFormat::Rgba8UnormSrgb,
            &diffuse,
        )?;
        let normal = MaterialTextures::upload(
            device,
            &format!("{label} Normal"),
            wgpu::TextureFormat::Rgba8Unorm,
            &normal,
        )?;

        Ok(Self {
            label,
            geometry,
            base_color,
            vertex_buffer,
            index_buffer,
            diffuse,
            normal,
        })
    }

    #[inline]
    #[must_use]
    pub fn index_count(&self) -> u32 {
        self.geometry.indices.len() as u32
    }
}
