use super::{FRAME_DATA_BINDING, skip_pass};
use crate::renderer::core::{BindingResource, CommandBuffer};
use crate::renderer::graph::RenderNode;
use crate::renderer::graph::context::ExecuteContext;

const ACCELERATION_STRUCTURE_BINDING: u32 = 1;
const TRIANGLES_BINDING: u32 = 2;
const OUTPUT_BINDING: u32 = 3;

/// Compute dispatch tracing the scene acceleration structure into the
/// ray-trace output texture, one invocation per pixel.
///
/// Scenes without an acceleration structure skip the dispatch.
pub struct RayTracePass;

impl RenderNode for RayTracePass {
    fn name(&self) -> &str {
        "Ray Trace Pass"
    }

    fn run(&self, ctx: &ExecuteContext, commands: &mut CommandBuffer) {
        let (Some(pipeline), Some(structure), Some(buffers)) = (
            ctx.pipelines.ray_trace,
            ctx.acceleration.structure(),
            ctx.acceleration.buffers(),
        ) else {
            log::debug!("No acceleration structure; ray trace dispatch skipped");
            return;
        };
        let Some(targets) = ctx.resources.targets() else {
            skip_pass(self.name(), "surface targets are missing");
            return;
        };

        let output = &targets.ray_trace_output;
        let extent = output.extent();
        let workgroup = ctx.gpu.settings.ray_trace_workgroup_size;

        let mut pass = commands.begin_compute_pass(self.name());
        pass.set_pipeline(pipeline);
        let (group, binding) = FRAME_DATA_BINDING;
        pass.set_binding(group, binding, BindingResource::Buffer(ctx.frame_data));
        pass.set_binding(
            0,
            ACCELERATION_STRUCTURE_BINDING,
            BindingResource::AccelerationStructure(structure.id()),
        );
        pass.set_binding(
            0,
            TRIANGLES_BINDING,
            BindingResource::Buffer(buffers.triangles.id()),
        );
        pass.set_binding(0, OUTPUT_BINDING, BindingResource::TextureView(output.view()));
        pass.dispatch(
            extent.width.div_ceil(workgroup),
            extent.height.div_ceil(workgroup),
            1,
        );
    }
}
