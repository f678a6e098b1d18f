//! Render node trait
//!
//! Every pass of the frame is a node. Nodes hold no per-frame state: all they
//! read comes from the [`ExecuteContext`] and all they produce is recorded
//! into the command buffer they are handed.

use super::context::ExecuteContext;
use crate::renderer::core::CommandBuffer;

/// A single render or compute pass.
///
/// A node that cannot record this frame (missing targets, invalid attachment
/// set, absent acceleration structure) logs and returns without recording;
/// it is not retried within the frame.
pub trait RenderNode {
    /// Name used for logging and command labels.
    fn name(&self) -> &str;

    fn run(&self, ctx: &ExecuteContext, commands: &mut CommandBuffer);
}
