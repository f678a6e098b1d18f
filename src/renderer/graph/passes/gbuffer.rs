use super::{FRAME_DATA_BINDING, GBUFFER_STENCIL_REFERENCE, skip_pass};
use crate::renderer::core::command::{
    ColorAttachment, DepthStencilAttachment, RenderPassDescriptor,
};
use crate::renderer::core::{BindingResource, CommandBuffer, GpuTexture};
use crate::renderer::graph::RenderNode;
use crate::renderer::graph::context::ExecuteContext;

/// Rasterizes every mesh into albedo/normal/depth and tags covered pixels in
/// the shared depth-stencil with [`GBUFFER_STENCIL_REFERENCE`].
///
/// Bindings: group 0 = FrameData + linear sampler; group 1 = the mesh's
/// diffuse/normal texture arrays and their info buffers.
pub struct GBufferPass;

impl RenderNode for GBufferPass {
    fn name(&self) -> &str {
        "GBuffer Pass"
    }

    fn run(&self, ctx: &ExecuteContext, commands: &mut CommandBuffer) {
        let Some(targets) = ctx.resources.targets() else {
            skip_pass(self.name(), "surface targets are missing");
            return;
        };

        let clear = |texture: &GpuTexture| ColorAttachment {
            view: texture.view(),
            extent: texture.extent(),
            load: wgpu::LoadOp::Clear(wgpu::Color::TRANSPARENT),
        };
        let color_attachments = [
            clear(&targets.albedo),
            clear(&targets.normal),
            // Cleared to the far plane.
            ColorAttachment {
                load: wgpu::LoadOp::Clear(wgpu::Color {
                    r: 1.0,
                    g: 0.0,
                    b: 0.0,
                    a: 0.0,
                }),
                ..clear(&targets.depth)
            },
        ];
        let desc = RenderPassDescriptor {
            label: self.name(),
            color_attachments: &color_attachments,
            depth_stencil: Some(DepthStencilAttachment {
                view: targets.depth_stencil.view(),
                extent: targets.depth_stencil.extent(),
                depth_load: wgpu::LoadOp::Clear(1.0),
                stencil_load: Some(wgpu::LoadOp::Clear(0)),
            }),
        };
        let Some(mut pass) = commands.begin_render_pass(&desc) else {
            skip_pass(self.name(), "G-buffer attachments do not match");
            return;
        };

        pass.set_pipeline(ctx.pipelines.gbuffer);
        pass.set_stencil_reference(GBUFFER_STENCIL_REFERENCE);
        let (group, binding) = FRAME_DATA_BINDING;
        pass.set_binding(group, binding, BindingResource::Buffer(ctx.frame_data));
        pass.set_binding(0, 1, BindingResource::Sampler(ctx.resources.linear_sampler));

        for mesh in &ctx.scene.meshes {
            if mesh.index_count() == 0 {
                continue;
            }
            pass.set_binding(1, 0, BindingResource::TextureView(mesh.diffuse.texture.view()));
            pass.set_binding(1, 1, BindingResource::TextureView(mesh.normal.texture.view()));
            pass.set_binding(1, 2, BindingResource::Buffer(mesh.diffuse.info.id()));
            pass.set_binding(1, 3, BindingResource::Buffer(mesh.normal.info.id()));
            pass.set_vertex_buffer(0, mesh.vertex_buffer.id());
            pass.set_index_buffer(mesh.index_buffer.id());
            pass.draw_indexed(0..mesh.index_count(), 0..1);
        }
    }
}
