//! Command buffer replay.
//!
//! Resolves the handles recorded in a [`CommandBuffer`](crate::renderer::core::CommandBuffer)
//! against the device's resource tables and encodes the equivalent wgpu
//! commands. Bind groups are built from the pipeline's derived layout,
//! grouped by the `group` index each binding was recorded with, and shared
//! by every draw in a pass that binds the same resources.

use rustc_hash::FxHashMap;
use slotmap::SlotMap;
use smallvec::SmallVec;

use crate::errors::{Result, UmbraError};
use crate::renderer::core::command::{
    AccelerationBuild, Binding, BindingResource, Command, ComputePassRecord, DrawRange,
    RenderPassRecord,
};
use crate::renderer::core::descriptors::AccelerationGeometry;
use crate::renderer::core::handles::{
    AccelerationStructureId, BufferId, PipelineId, SamplerId, TextureId, TextureViewId,
};

/// Row-major 3x4 identity used for the single scene instance.
pub const IDENTITY_TRANSFORM: [f32; 12] = [
    1.0, 0.0, 0.0, 0.0, //
    0.0, 1.0, 0.0, 0.0, //
    0.0, 0.0, 1.0, 0.0,
];

pub struct TextureEntry {
    pub texture: wgpu::Texture,
    pub format: wgpu::TextureFormat,
}

pub enum PipelineEntry {
    Render(wgpu::RenderPipeline),
    Compute(wgpu::ComputePipeline),
}

/// Bottom-level structure over the merged scene plus the one-instance
/// top-level structure shaders bind.
pub struct StructureEntry {
    pub blas: wgpu::Blas,
    pub tlas: wgpu::Tlas,
    pub size: wgpu::BlasTriangleGeometrySizeDescriptor,
}

#[derive(Default)]
pub struct ResourceTables {
    pub buffers: SlotMap<BufferId, wgpu::Buffer>,
    pub textures: SlotMap<TextureId, TextureEntry>,
    pub views: SlotMap<TextureViewId, wgpu::TextureView>,
    pub samplers: SlotMap<SamplerId, wgpu::Sampler>,
    pub pipelines: SlotMap<PipelineId, PipelineEntry>,
    pub structures: SlotMap<AccelerationStructureId, StructureEntry>,
}

fn unknown(handle: impl std::fmt::Debug) -> UmbraError {
    UmbraError::UnknownHandle(format!("{handle:?}"))
}

impl ResourceTables {
    fn buffer(&self, id: BufferId) -> Result<&wgpu::Buffer> {
        self.buffers.get(id).ok_or_else(|| unknown(id))
    }

    fn view(&self, id: TextureViewId) -> Result<&wgpu::TextureView> {
        self.views.get(id).ok_or_else(|| unknown(id))
    }

    fn render_pipeline(&self, id: PipelineId) -> Result<&wgpu::RenderPipeline> {
        match self.pipelines.get(id) {
            Some(PipelineEntry::Render(pipeline)) => Ok(pipeline),
            Some(PipelineEntry::Compute(_)) => Err(UmbraError::UnknownHandle(format!(
                "{id:?} is a compute pipeline"
            ))),
            None => Err(unknown(id)),
        }
    }

    fn compute_pipeline(&self, id: PipelineId) -> Result<&wgpu::ComputePipeline> {
        match self.pipelines.get(id) {
            Some(PipelineEntry::Compute(pipeline)) => Ok(pipeline),
            Some(PipelineEntry::Render(_)) => Err(UmbraError::UnknownHandle(format!(
                "{id:?} is a render pipeline"
            ))),
            None => Err(unknown(id)),
        }
    }

    fn resolve(&self, resource: BindingResource) -> Result<wgpu::BindingResource<'_>> {
        Ok(match resource {
            BindingResource::Buffer(id) => self.buffer(id)?.as_entire_binding(),
            BindingResource::TextureView(id) => wgpu::BindingResource::TextureView(self.view(id)?),
            BindingResource::Sampler(id) => wgpu::BindingResource::Sampler(
                self.samplers.get(id).ok_or_else(|| unknown(id))?,
            ),
            BindingResource::AccelerationStructure(id) => {
                wgpu::BindingResource::AccelerationStructure(
                    &self.structures.get(id).ok_or_else(|| unknown(id))?.tlas,
                )
            }
        })
    }
}

pub fn triangle_size_descriptor(
    geometry: &AccelerationGeometry,
) -> wgpu::BlasTriangleGeometrySizeDescriptor {
    wgpu::BlasTriangleGeometrySizeDescriptor {
        vertex_format: wgpu::VertexFormat::Float32x3,
        vertex_count: geometry.vertex_count,
        index_format: Some(wgpu::IndexFormat::Uint32),
        index_count: Some(geometry.index_count),
        flags: wgpu::AccelerationStructureGeometryFlags::OPAQUE,
    }
}

type BindGroups = SmallVec<[(u32, wgpu::BindGroup); 2]>;

#[derive(Clone, PartialEq, Eq, Hash)]
struct GroupKey {
    pipeline: PipelineId,
    group: u32,
    entries: SmallVec<[(u32, BindingResource); 8]>,
}

/// Bind groups created while encoding one pass.
#[derive(Default)]
struct BindGroupCache {
    groups: FxHashMap<GroupKey, wgpu::BindGroup>,
}

impl BindGroupCache {
    fn bind_groups(
        &mut self,
        device: &wgpu::Device,
        tables: &ResourceTables,
        label: &str,
        pipeline: PipelineId,
        bindings: &[Binding],
        layout: impl Fn(u32) -> wgpu::BindGroupLayout,
    ) -> Result<BindGroups> {
        let mut groups: SmallVec<[u32; 4]> = bindings.iter().map(|b| b.group).collect();
        groups.sort_unstable();
        groups.dedup();

        groups
            .into_iter()
            .map(|group| {
                let mut entries: SmallVec<[(u32, BindingResource); 8]> = bindings
                    .iter()
                    .filter(|b| b.group == group)
                    .map(|b| (b.binding, b.resource))
                    .collect();
                entries.sort_unstable_by_key(|(binding, _)| *binding);
                let key = GroupKey {
                    pipeline,
                    group,
                    entries,
                };
                if let Some(bind_group) = self.groups.get(&key) {
                    return Ok((group, bind_group.clone()));
                }

                let wgpu_entries = key
                    .entries
                    .iter()
                    .map(|&(binding, resource)| {
                        Ok(wgpu::BindGroupEntry {
                            binding,
                            resource: tables.resolve(resource)?,
                        })
                    })
                    .collect::<Result<Vec<_>>>()?;
                let bind_group = device.create_bind_group(&wgpu::BindGroupDescriptor {
                    label: Some(label),
                    layout: &layout(group),
                    entries: &wgpu_entries,
                });
                self.groups.insert(key, bind_group.clone());
                Ok((group, bind_group))
            })
            .collect()
    }
}

struct PreparedDraw<'t> {
    pipeline: &'t wgpu::RenderPipeline,
    bind_groups: BindGroups,
    vertex_buffers: SmallVec<[(u32, &'t wgpu::Buffer); 2]>,
    index_buffer: Option<&'t wgpu::Buffer>,
}

fn encode_render_pass(
    device: &wgpu::Device,
    tables: &ResourceTables,
    encoder: &mut wgpu::CommandEncoder,
    record: &RenderPassRecord,
) -> Result<()> {
    let color_attachments = record
        .color_attachments
        .iter()
        .map(|attachment| {
            Ok(Some(wgpu::RenderPassColorAttachment {
                view: tables.view(attachment.view)?,
                depth_slice: None,
                resolve_target: None,
                ops: wgpu::Operations {
                    load: attachment.load,
                    store: wgpu::StoreOp::Store,
                },
            }))
        })
        .collect::<Result<Vec<_>>>()?;

    let depth_stencil_attachment = record
        .depth_stencil
        .map(|attachment| -> Result<_> {
            Ok(wgpu::RenderPassDepthStencilAttachment {
                view: tables.view(attachment.view)?,
                depth_ops: Some(wgpu::Operations {
                    load: attachment.depth_load,
                    store: wgpu::StoreOp::Store,
                }),
                stencil_ops: attachment.stencil_load.map(|load| wgpu::Operations {
                    load,
                    store: wgpu::StoreOp::Store,
                }),
            })
        })
        .transpose()?;

    // Resolve everything up front so a stale handle aborts before any
    // commands are encoded.
    let mut cache = BindGroupCache::default();
    let draws = record
        .draws
        .iter()
        .map(|draw| {
            let pipeline = tables.render_pipeline(draw.pipeline)?;
            let bind_groups = cache.bind_groups(
                device,
                tables,
                &record.label,
                draw.pipeline,
                &draw.bindings,
                |g| pipeline.get_bind_group_layout(g),
            )?;
            let vertex_buffers = draw
                .vertex_buffers
                .iter()
                .map(|&(slot, id)| Ok((slot, tables.buffer(id)?)))
                .collect::<Result<_>>()?;
            let index_buffer = draw.index_buffer.map(|id| tables.buffer(id)).transpose()?;
            Ok(PreparedDraw {
                pipeline,
                bind_groups,
                vertex_buffers,
                index_buffer,
            })
        })
        .collect::<Result<Vec<_>>>()?;

    let mut pass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
        label: Some(&record.label),
        color_attachments: &color_attachments,
        depth_stencil_attachment,
        timestamp_writes: None,
        occlusion_query_set: None,
        multiview_mask: None,
    });

    for (draw, prepared) in record.draws.iter().zip(&draws) {
        pass.set_pipeline(prepared.pipeline);
        for (group, bind_group) in &prepared.bind_groups {
            pass.set_bind_group(*group, bind_group, &[]);
        }
        for &(slot, buffer) in &prepared.vertex_buffers {
            pass.set_vertex_buffer(slot, buffer.slice(..));
        }
        pass.set_stencil_reference(draw.stencil_reference);

        match &draw.range {
            DrawRange::Vertices(vertices) => pass.draw(vertices.clone(), draw.instances.clone()),
            DrawRange::Indexed(indices) => {
                let Some(index_buffer) = prepared.index_buffer else {
                    log::warn!("Indexed draw in '{}' without an index buffer", record.label);
                    continue;
                };
                pass.set_index_buffer(index_buffer.slice(..), wgpu::IndexFormat::Uint32);
                pass.draw_indexed(indices.clone(), 0, draw.instances.clone());
            }
        }
    }
    Ok(())
}

fn encode_compute_pass(
    device: &wgpu::Device,
    tables: &ResourceTables,
    encoder: &mut wgpu::CommandEncoder,
    record: &ComputePassRecord,
) -> Result<()> {
    let mut cache = BindGroupCache::default();
    let dispatches = record
        .dispatches
        .iter()
        .map(|dispatch| {
            let pipeline = tables.compute_pipeline(dispatch.pipeline)?;
            let bind_groups = cache.bind_groups(
                device,
                tables,
                &record.label,
                dispatch.pipeline,
                &dispatch.bindings,
                |g| pipeline.get_bind_group_layout(g),
            )?;
            Ok((pipeline, bind_groups, dispatch.workgroups))
        })
        .collect::<Result<Vec<_>>>()?;

    let mut pass = encoder.begin_compute_pass(&wgpu::ComputePassDescriptor {
        label: Some(&record.label),
        timestamp_writes: None,
    });
    for (pipeline, bind_groups, [x, y, z]) in &dispatches {
        pass.set_pipeline(pipeline);
        for (group, bind_group) in bind_groups {
            pass.set_bind_group(*group, bind_group, &[]);
        }
        pass.dispatch_workgroups(*x, *y, *z);
    }
    Ok(())
}

fn encode_acceleration_build(
    tables: &ResourceTables,
    encoder: &mut wgpu::CommandEncoder,
    build: &AccelerationBuild,
) -> Result<()> {
    let entry = tables
        .structures
        .get(build.structure)
        .ok_or_else(|| unknown(build.structure))?;
    let geometry = &build.geometry;

    let triangles = wgpu::BlasTriangleGeometry {
        size: &entry.size,
        vertex_buffer: tables.buffer(geometry.vertex_buffer)?,
        first_vertex: 0,
        vertex_stride: geometry.vertex_stride,
        index_buffer: Some(tables.buffer(geometry.index_buffer)?),
        first_index: Some(0),
        transform_buffer: None,
        transform_buffer_offset: None,
    };
    let blas_entry = wgpu::BlasBuildEntry {
        blas: &entry.blas,
        geometry: wgpu::BlasGeometries::TriangleGeometries(vec![triangles]),
    };
    encoder.build_acceleration_structures(std::iter::once(&blas_entry), std::iter::once(&entry.tlas));
    Ok(())
}

/// Encodes `commands` in order into `encoder`.
pub fn encode(
    device: &wgpu::Device,
    tables: &ResourceTables,
    encoder: &mut wgpu::CommandEncoder,
    commands: &[Command],
) -> Result<()> {
    for command in commands {
        match command {
            Command::RenderPass(record) => encode_render_pass(device, tables, encoder, record)?,
            Command::ComputePass(record) => encode_compute_pass(device, tables, encoder, record)?,
            Command::BuildAccelerationStructure(build) => {
                encode_acceleration_build(tables, encoder, build)?;
            }
        }
    }
    Ok(())
}
