//! Render Graph Tests
//!
//! Drives the full renderer against the recording device and inspects the
//! submitted command buffers:
//! - Pass order and the shadow/frame submission split
//! - Stencil hand-off between the G-buffer and lighting passes
//! - Ray-trace dispatch bindings
//! - Skipped passes on mismatched or missing attachments
//! - Deferred resize and paused time

mod common;

use std::sync::Arc;

use glam::{Vec3, Vec4};

use common::{Event, RecordingDevice, Submission, init_logger, mesh_source};
use umbra::renderer::Renderer;
use umbra::renderer::core::QueueKind;
use umbra::renderer::core::command::{BindingResource, DrawRange, RenderPassRecord};
use umbra::renderer::core::handles::Extent2d;
use umbra::renderer::graph::{GBUFFER_STENCIL_REFERENCE, RenderGraph};
use umbra::renderer::settings::RendererSettings;
use umbra::scene::{Camera, StaticSceneLoader};

const SHADOW: &str = "Shadow Pass";
const RAY_TRACE: &str = "Ray Trace Pass";
const GBUFFER: &str = "GBuffer Pass";
const LIGHTING: &str = "Directional Lighting Pass";
const FORWARD: &str = "Forward Debug Pass";

fn two_mesh_loader() -> StaticSceneLoader {
    StaticSceneLoader::new(vec![
        mesh_source("Floor", 100, Vec4::new(0.8, 0.8, 0.8, 1.0)),
        mesh_source("Crate", 50, Vec4::new(0.6, 0.3, 0.1, 1.0)),
    ])
}

fn camera() -> Camera {
    Camera::new_perspective(60.0, 4.0 / 3.0, 0.1, 200.0)
        .looking_at(Vec3::new(0.0, 5.0, 10.0), Vec3::ZERO)
}

fn renderer_with(
    device: &Arc<RecordingDevice>,
    loader: &StaticSceneLoader,
) -> Renderer {
    init_logger();
    let ctx = device.context(RendererSettings::default());
    Renderer::new(ctx, loader).expect("renderer")
}

fn render_passes(submission: &Submission) -> Vec<&RenderPassRecord> {
    submission.commands.render_passes().collect()
}

fn pass_labels(submission: &Submission) -> Vec<String> {
    submission
        .commands
        .compute_passes()
        .map(|p| p.label.clone())
        .chain(submission.commands.render_passes().map(|p| p.label.clone()))
        .collect()
}

fn position_of(events: &[Event], pred: impl Fn(&Event) -> bool) -> usize {
    events.iter().position(|e| pred(e)).expect("event recorded")
}

fn find_pass<'a>(submission: &'a Submission, label: &str) -> Option<&'a RenderPassRecord> {
    submission.commands.render_passes().find(|p| p.label == label)
}

// ============================================================================
// Sequencing
// ============================================================================

#[test]
fn deferred_graph_lists_passes_in_order() {
    let graph = RenderGraph::deferred();
    let names: Vec<&str> = graph.node_names().collect();
    assert_eq!(names, vec![SHADOW, RAY_TRACE, GBUFFER, LIGHTING, FORWARD]);
    assert_eq!(graph.node_count(), 5);
}

#[test]
fn frame_is_split_into_shadow_and_frame_submissions() {
    let device = RecordingDevice::new(640, 480);
    let mut renderer = renderer_with(&device, &two_mesh_loader());
    let before = device.submission_count();
    device.clear_events();

    renderer.render_frame(&camera(), false).unwrap();
    assert_eq!(device.submission_count(), before + 2);

    device.with_submissions(|submissions| {
        let shadow = &submissions[before];
        let frame = &submissions[before + 1];

        assert_eq!(shadow.queue, QueueKind::Frame);
        assert_eq!(pass_labels(shadow), vec![SHADOW]);
        assert!(shadow.commands.present.is_none());

        assert_eq!(frame.queue, QueueKind::Frame);
        assert_eq!(pass_labels(frame), vec![RAY_TRACE, GBUFFER, LIGHTING, FORWARD]);
        assert!(frame.commands.present.is_some());
    });

    // Shadow work is submitted before the image is acquired; the frame
    // buffer carrying the image is submitted and presented afterwards.
    let events = device.events();
    let shadow_submit = position_of(&events, |e| {
        matches!(e, Event::Submit { label, .. } if label.starts_with("Shadow"))
    });
    let acquire = position_of(&events, |e| matches!(e, Event::Acquire(_)));
    let frame_submit = position_of(&events, |e| {
        matches!(e, Event::Submit { label, .. } if label.starts_with("Frame"))
    });
    let present = position_of(&events, |e| matches!(e, Event::Present(_)));
    assert!(shadow_submit < acquire);
    assert!(acquire < frame_submit);
    assert!(frame_submit < present);
}

#[test]
fn every_pass_binds_the_slot_frame_data() {
    let device = RecordingDevice::new(640, 480);
    let mut renderer = renderer_with(&device, &two_mesh_loader());
    let before = device.submission_count();
    renderer.render_frame(&camera(), false).unwrap();

    let frame_data = device.with_submissions(|submissions| {
        let shadow_buffers = submissions[before].bound_buffers();
        let frame_buffers = submissions[before + 1].bound_buffers();
        let frame_data = shadow_buffers[0];
        assert!(frame_buffers.contains(&frame_data));

        for submission in &submissions[before..] {
            for pass in submission.commands.render_passes() {
                for draw in &pass.draws {
                    let binding = draw
                        .bindings
                        .iter()
                        .find(|b| b.group == 0 && b.binding == 0)
                        .expect("FrameData binding");
                    assert_eq!(binding.resource, BindingResource::Buffer(frame_data));
                }
            }
        }
        frame_data
    });

    // Looked up after the submission log is released.
    assert_eq!(
        device.buffer(frame_data).unwrap().size,
        umbra::resources::FrameData::SIZE
    );
}

// ============================================================================
// Pass contents
// ============================================================================

#[test]
fn gbuffer_writes_and_lighting_tests_the_same_stencil() {
    let device = RecordingDevice::new(640, 480);
    let mut renderer = renderer_with(&device, &two_mesh_loader());
    let before = device.submission_count();
    renderer.render_frame(&camera(), false).unwrap();

    device.with_submissions(|submissions| {
        let frame = &submissions[before + 1];
        let gbuffer = find_pass(frame, GBUFFER).unwrap();
        let lighting = find_pass(frame, LIGHTING).unwrap();

        assert_eq!(gbuffer.color_attachments.len(), 3);
        assert_eq!(gbuffer.draws.len(), 2, "One draw per mesh");
        assert!(gbuffer
            .draws
            .iter()
            .all(|d| d.stencil_reference == GBUFFER_STENCIL_REFERENCE));
        let gbuffer_ds = gbuffer.depth_stencil.unwrap();
        assert_eq!(gbuffer_ds.stencil_load, Some(wgpu::LoadOp::Clear(0)));

        let lighting_ds = lighting.depth_stencil.unwrap();
        assert_eq!(lighting_ds.view, gbuffer_ds.view);
        assert_eq!(lighting_ds.stencil_load, Some(wgpu::LoadOp::Load));
        assert_eq!(lighting.draws.len(), 1);
        assert_eq!(lighting.draws[0].stencil_reference, GBUFFER_STENCIL_REFERENCE);
        assert_eq!(lighting.draws[0].range, DrawRange::Vertices(0..3));
        assert!(matches!(
            lighting.color_attachments[0].load,
            wgpu::LoadOp::Clear(_)
        ));
    });
}

#[test]
fn forward_pass_loads_lit_image_with_its_own_depth() {
    let device = RecordingDevice::new(640, 480);
    let mut renderer = renderer_with(&device, &two_mesh_loader());
    let before = device.submission_count();
    renderer.render_frame(&camera(), false).unwrap();

    device.with_submissions(|submissions| {
        let frame = &submissions[before + 1];
        let lighting = find_pass(frame, LIGHTING).unwrap();
        let forward = find_pass(frame, FORWARD).unwrap();

        assert_eq!(forward.color_attachments[0].load, wgpu::LoadOp::Load);
        assert_eq!(
            forward.color_attachments[0].view,
            lighting.color_attachments[0].view
        );
        assert_ne!(
            forward.depth_stencil.unwrap().view,
            lighting.depth_stencil.unwrap().view
        );
        // Three axis lines.
        assert_eq!(forward.draws.len(), 1);
        assert_eq!(forward.draws[0].range, DrawRange::Vertices(0..6));
    });
}

#[test]
fn ray_trace_binds_exactly_one_acceleration_structure() {
    let device = RecordingDevice::new(640, 480);
    let mut renderer = renderer_with(&device, &two_mesh_loader());
    assert_eq!(renderer.scene_acceleration().merged().triangle_count(), 150);
    assert_eq!(renderer.scene_acceleration().triangles().len(), 150);

    let before = device.submission_count();
    renderer.render_frame(&camera(), false).unwrap();

    let structure = renderer.scene_acceleration().structure().unwrap().id();
    device.with_submissions(|submissions| {
        let frame = &submissions[before + 1];
        let pass = frame.commands.compute_passes().next().expect("ray trace pass");
        assert_eq!(pass.dispatches.len(), 1);

        let dispatch = &pass.dispatches[0];
        let structures: Vec<_> = dispatch
            .bindings
            .iter()
            .filter_map(|b| match b.resource {
                BindingResource::AccelerationStructure(id) => Some(id),
                _ => None,
            })
            .collect();
        assert_eq!(structures, vec![structure]);
        // 640x480 over 8x8 workgroups.
        assert_eq!(dispatch.workgroups, [80, 60, 1]);
    });
}

#[test]
fn empty_scene_skips_ray_trace_but_renders() {
    let device = RecordingDevice::new(320, 240);
    let mut renderer = renderer_with(&device, &StaticSceneLoader::default());
    assert!(renderer.scene_acceleration().structure().is_none());

    let before = device.submission_count();
    renderer.render_frame(&camera(), false).unwrap();
    device.with_submissions(|submissions| {
        let frame = submissions.last().unwrap();
        assert_eq!(pass_labels(frame), vec![GBUFFER, LIGHTING, FORWARD]);
        assert!(find_pass(frame, GBUFFER).unwrap().draws.is_empty());
        assert_eq!(submissions.len(), before + 2);
    });
}

#[test]
fn device_without_ray_queries_skips_ray_trace() {
    let device = RecordingDevice::with_acceleration(320, 240, false);
    let mut renderer = renderer_with(&device, &two_mesh_loader());
    assert!(renderer.scene_acceleration().structure().is_none());

    renderer.render_frame(&camera(), false).unwrap();
    device.with_submissions(|submissions| {
        let frame = submissions.last().unwrap();
        assert_eq!(frame.commands.compute_passes().count(), 0);
        assert_eq!(render_passes(frame).len(), 3);
    });
}

// ============================================================================
// Skips and failures
// ============================================================================

#[test]
fn mismatched_surface_size_skips_surface_passes() {
    let device = RecordingDevice::new(640, 480);
    let mut renderer = renderer_with(&device, &two_mesh_loader());

    // The surface changes size behind the renderer's back.
    use umbra::renderer::core::PresentationSurface;
    device.configure(800, 600).unwrap();
    renderer.render_frame(&camera(), false).unwrap();

    device.with_submissions(|submissions| {
        let frame = submissions.last().unwrap();
        assert_eq!(pass_labels(frame), vec![RAY_TRACE, GBUFFER]);
        assert!(frame.commands.present.is_some(), "Image is still presented");
    });
}

#[test]
fn failed_acquisition_still_submits_frame() {
    let device = RecordingDevice::new(640, 480);
    let mut renderer = renderer_with(&device, &two_mesh_loader());
    device.fail_acquire(true);

    let before = device.submission_count();
    renderer.render_frame(&camera(), false).unwrap();
    assert_eq!(device.submission_count(), before + 2);
    device.with_submissions(|submissions| {
        let frame = submissions.last().unwrap();
        assert_eq!(pass_labels(frame), vec![RAY_TRACE, GBUFFER]);
        assert!(frame.commands.present.is_none());
    });

    device.fail_acquire(false);
    renderer.render_frame(&camera(), false).unwrap();
}

// ============================================================================
// Renderer facade
// ============================================================================

#[test]
fn requested_resize_applies_before_next_frame() {
    let device = RecordingDevice::new(640, 480);
    let mut renderer = renderer_with(&device, &two_mesh_loader());

    renderer.request_resize(1024, 768);
    assert_eq!(
        renderer.frame_resources().extent(),
        Extent2d::new(640, 480),
        "Resize is latched, not applied immediately"
    );

    renderer.render_frame(&camera(), false).unwrap();
    let extent = Extent2d::new(1024, 768);
    assert_eq!(renderer.frame_resources().extent(), extent);
    assert_eq!(renderer.context().surface_size(), extent);

    device.with_submissions(|submissions| {
        let frame = submissions.last().unwrap();
        assert_eq!(pass_labels(frame), vec![RAY_TRACE, GBUFFER, LIGHTING, FORWARD]);
        for pass in frame.commands.render_passes() {
            assert_eq!(pass.extent(), Some(extent), "{}", pass.label);
        }
        let dispatch = &frame.commands.compute_passes().next().unwrap().dispatches[0];
        assert_eq!(dispatch.workgroups, [128, 96, 1]);
    });
}

#[test]
fn zero_sized_resize_request_is_ignored() {
    let device = RecordingDevice::new(640, 480);
    let mut renderer = renderer_with(&device, &two_mesh_loader());
    renderer.request_resize(0, 0);
    renderer.render_frame(&camera(), false).unwrap();
    assert_eq!(renderer.frame_resources().extent(), Extent2d::new(640, 480));
}

#[test]
fn paused_rendering_freezes_frame_number() -> anyhow::Result<()> {
    let device = RecordingDevice::new(640, 480);
    let mut renderer = renderer_with(&device, &two_mesh_loader());
    let cam = camera();

    renderer.render_frame(&cam, false)?;
    renderer.render_frame(&cam, false)?;
    let number = renderer.frame_number();
    renderer.render_frame(&cam, true)?;
    renderer.render_frame(&cam, true)?;
    assert_eq!(renderer.frame_number(), number);
    renderer.render_frame(&cam, false)?;
    assert_eq!(renderer.frame_number(), number + 1);
    Ok(())
}

#[test]
fn many_frames_with_held_completions_never_deadlock() {
    let device = RecordingDevice::new(320, 240);
    let mut renderer = renderer_with(&device, &two_mesh_loader());
    device.hold_completions(true);
    let cam = camera();

    for _ in 0..10 {
        while device.pending_completions() >= 3 {
            device.complete_next();
        }
        renderer.render_frame(&cam, false).unwrap();
    }
    device.complete_all();
    assert_eq!(device.pending_completions(), 0);
}
