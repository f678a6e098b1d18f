use super::{FRAME_DATA_BINDING, GBUFFER_STENCIL_REFERENCE, skip_pass};
use crate::renderer::core::command::{
    ColorAttachment, DepthStencilAttachment, RenderPassDescriptor,
};
use crate::renderer::core::{BindingResource, CommandBuffer};
use crate::renderer::graph::RenderNode;
use crate::renderer::graph::context::ExecuteContext;

/// Full-screen directional (sun) lighting into the surface image.
///
/// Reads the G-buffer, the ray-trace output and the shadow term supplied by
/// the graph's [`ShadowSource`](crate::renderer::graph::context::ShadowSource).
/// The stencil test only lets through pixels the G-buffer pass tagged, so
/// background pixels keep the clear color.
pub struct LightingPass;

impl RenderNode for LightingPass {
    fn name(&self) -> &str {
        "Directional Lighting Pass"
    }

    fn run(&self, ctx: &ExecuteContext, commands: &mut CommandBuffer) {
        let Some(image) = ctx.surface_image else {
            skip_pass(self.name(), "no surface image");
            return;
        };
        let Some(targets) = ctx.resources.targets() else {
            skip_pass(self.name(), "surface targets are missing");
            return;
        };

        let color_attachments = [ColorAttachment {
            view: image.view,
            extent: image.extent,
            load: wgpu::LoadOp::Clear(ctx.gpu.settings.clear_color()),
        }];
        let desc = RenderPassDescriptor {
            label: self.name(),
            color_attachments: &color_attachments,
            depth_stencil: Some(DepthStencilAttachment {
                view: targets.depth_stencil.view(),
                extent: targets.depth_stencil.extent(),
                depth_load: wgpu::LoadOp::Load,
                stencil_load: Some(wgpu::LoadOp::Load),
            }),
        };
        let Some(mut pass) = commands.begin_render_pass(&desc) else {
            skip_pass(self.name(), "surface image and G-buffer sizes differ");
            return;
        };

        let resources = ctx.resources;
        pass.set_pipeline(ctx.pipelines.lighting);
        pass.set_stencil_reference(GBUFFER_STENCIL_REFERENCE);

        let (group, binding) = FRAME_DATA_BINDING;
        pass.set_binding(group, binding, BindingResource::Buffer(ctx.frame_data));
        pass.set_binding(0, 1, BindingResource::TextureView(targets.albedo.view()));
        pass.set_binding(0, 2, BindingResource::TextureView(targets.normal.view()));
        pass.set_binding(0, 3, BindingResource::TextureView(targets.depth.view()));
        pass.set_binding(
            0,
            4,
            BindingResource::TextureView(ctx.shadow_source.shadow_view(resources)),
        );
        pass.set_binding(
            0,
            5,
            BindingResource::Sampler(ctx.shadow_source.shadow_sampler(resources)),
        );
        pass.set_binding(
            0,
            6,
            BindingResource::TextureView(targets.ray_trace_output.view()),
        );
        pass.set_binding(0, 7, BindingResource::Sampler(resources.linear_sampler));

        // Full-screen triangle.
        pass.draw(0..3, 0..1);
    }
}
