use super::{FRAME_DATA_BINDING, skip_pass};
use crate::renderer::core::command::{DepthStencilAttachment, RenderPassDescriptor};
use crate::renderer::core::{BindingResource, CommandBuffer};
use crate::renderer::graph::RenderNode;
use crate::renderer::graph::context::ExecuteContext;

/// Depth-only render of every mesh from the sun into the shadow map.
///
/// The shadow map has a fixed resolution, so this pass never depends on the
/// surface and runs in its own submission ahead of image acquisition.
pub struct ShadowPass;

impl RenderNode for ShadowPass {
    fn name(&self) -> &str {
        "Shadow Pass"
    }

    fn run(&self, ctx: &ExecuteContext, commands: &mut CommandBuffer) {
        let shadow_map = ctx.resources.shadow_map();
        let desc = RenderPassDescriptor {
            label: self.name(),
            color_attachments: &[],
            depth_stencil: Some(DepthStencilAttachment {
                view: shadow_map.view(),
                extent: shadow_map.extent(),
                depth_load: wgpu::LoadOp::Clear(1.0),
                stencil_load: None,
            }),
        };
        let Some(mut pass) = commands.begin_render_pass(&desc) else {
            skip_pass(self.name(), "invalid shadow map attachment");
            return;
        };

        pass.set_pipeline(ctx.pipelines.shadow);
        let (group, binding) = FRAME_DATA_BINDING;
        pass.set_binding(group, binding, BindingResource::Buffer(ctx.frame_data));

        for mesh in &ctx.scene.meshes {
            if mesh.index_count() == 0 {
                continue;
            }
            pass.set_vertex_buffer(0, mesh.vertex_buffer.id());
            pass.set_index_buffer(mesh.index_buffer.id());
            pass.draw_indexed(0..mesh.index_count(), 0..1);
        }
    }
}
