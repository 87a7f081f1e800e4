//! Unit tests for device.rs
//!
//! Drives a `Device<NullBackend>` through resource lifecycles, views, state
//! deduplication, frames, submission validation, timestamps, queries, device
//! loss and shutdown.

use super::*;
use crate::command::{BufferCopyRegion, ColorAttachment, DepthStencilAttachment, TextureRegion, Viewport};
use crate::config::{BackendKind, DeviceConfig};
use crate::device::null_backend::NullBackend;
use glam::Vec4;
use std::time::Duration;

// ============================================================================
// HELPERS
// ============================================================================

fn config() -> DeviceConfig {
    DeviceConfig::for_backend(BackendKind::Null)
}

fn device() -> Device<NullBackend> {
    let config = config();
    Device::new(NullBackend::new(&config), config).unwrap()
}

fn device_with(build: impl FnOnce(NullBackend) -> NullBackend) -> Device<NullBackend> {
    let config = config();
    Device::new(build(NullBackend::new(&config)), config).unwrap()
}

fn vertex_buffer_desc() -> BufferCreationDescription {
    BufferCreationDescription::new(1024, BufferUsageFlags::VERTEX)
}

fn color_target_desc() -> TextureCreationDescription {
    TextureCreationDescription::texture_2d(
        64,
        64,
        Format::R8G8B8A8_UNORM,
        TextureUsageFlags::RENDER_TARGET | TextureUsageFlags::SHADER_RESOURCE,
    )
}

fn graphics_shader_desc() -> ShaderCreationDescription {
    ShaderCreationDescription {
        vertex: Some(vec![1u8, 2, 3, 4].into()),
        pixel: Some(vec![5u8, 6, 7, 8].into()),
        ..Default::default()
    }
}

fn run_empty_frame(device: &mut Device<NullBackend>) {
    device.begin_frame().unwrap();
    device.end_frame().unwrap();
}

// ============================================================================
// CREATION / DESTRUCTION
// ============================================================================

#[test]
fn test_create_destroy_buffer_restores_live_count() {
    let mut device = device();
    let baseline = device.live_resource_count();

    let buffer = device.create_buffer(vertex_buffer_desc(), None).unwrap();
    assert_eq!(device.live_resource_count(), baseline + 1);
    assert_eq!(device.resource_count(ResourceKind::Buffer), 1);

    device.destroy_buffer(buffer).unwrap();
    assert_eq!(device.live_resource_count(), baseline);
    assert_eq!(device.backend().live_objects(), 0);
}

#[test]
fn test_description_matches_input() {
    let mut device = device();
    let desc = color_target_desc();
    let texture = device.create_texture(desc.clone(), None).unwrap();

    let resource = device.texture(texture).unwrap();
    assert_eq!(resource.description(), &desc);
    assert_eq!(resource.state(), ResourceState::Live);
    assert!(resource.is_initialized());
    assert!(resource.native().is_some());
}

#[test]
fn test_stale_handle_after_slot_reuse() {
    let mut device = device();
    let first = device.create_buffer(vertex_buffer_desc(), None).unwrap();
    device.destroy_buffer(first).unwrap();
    let second = device.create_buffer(vertex_buffer_desc(), None).unwrap();

    assert_ne!(first, second);
    assert!(device.buffer(first).is_none());
    assert!(device.buffer(second).is_some());
    assert!(!device.resources().contains(first.into()));
}

#[test]
#[should_panic(expected = "double destroy")]
#[cfg(debug_assertions)]
fn test_double_destroy_asserts() {
    let mut device = device();
    let buffer = device.create_buffer(vertex_buffer_desc(), None).unwrap();
    device.destroy_buffer(buffer).unwrap();
    let _ = device.destroy_buffer(buffer);
}

#[test]
#[cfg(not(debug_assertions))]
fn test_double_destroy_returns_invalid_handle() {
    let mut device = device();
    let buffer = device.create_buffer(vertex_buffer_desc(), None).unwrap();
    device.destroy_buffer(buffer).unwrap();
    assert!(matches!(device.destroy_buffer(buffer), Err(Error::InvalidHandle(_))));
}

#[test]
fn test_invalid_descriptor_registers_nothing() {
    let mut device = device();
    let result = device.create_buffer(BufferCreationDescription::new(0, BufferUsageFlags::VERTEX), None);
    assert!(matches!(result, Err(Error::InvalidResource(_))));
    assert_eq!(device.live_resource_count(), 0);
    assert_eq!(device.backend().live_objects(), 0);
}

#[test]
fn test_backend_failure_registers_nothing() {
    let mut device = device();
    device.backend_mut().fail_next_init(Error::OutOfMemory);

    let result = device.create_texture(color_target_desc(), None);
    assert_eq!(result, Err(Error::OutOfMemory));
    assert_eq!(device.live_resource_count(), 0);

    // No retry: the next call succeeds on its own
    assert!(device.create_texture(color_target_desc(), None).is_ok());
}

#[test]
fn test_memory_budget_out_of_memory() {
    let mut device = device_with(|b| b.with_memory_budget(2048));
    device.create_buffer(vertex_buffer_desc(), None).unwrap();
    device.create_buffer(vertex_buffer_desc(), None).unwrap();
    assert_eq!(device.create_buffer(vertex_buffer_desc(), None), Err(Error::OutOfMemory));
    assert_eq!(device.resource_count(ResourceKind::Buffer), 2);
}

#[test]
fn test_unsupported_format_is_never_substituted() {
    let mut device = device_with(|b| b.with_unsupported_format(Format::R16G16B16A16_FLOAT));
    let desc = TextureCreationDescription::texture_2d(
        16,
        16,
        Format::R16G16B16A16_FLOAT,
        TextureUsageFlags::SHADER_RESOURCE,
    );
    assert!(matches!(device.create_texture(desc, None), Err(Error::UnsupportedFormat(_))));
    assert_eq!(device.live_resource_count(), 0);
}

#[test]
fn test_initial_data_reaches_backend() {
    let mut device = device();
    let data: Vec<u8> = (0..64u8).collect();
    let desc = BufferCreationDescription {
        access: ResourceAccess::Immutable,
        ..BufferCreationDescription::new(64, BufferUsageFlags::VERTEX)
    };
    let buffer = device.create_buffer(desc, Some(&data)).unwrap();

    let native = device.buffer(buffer).unwrap().native().unwrap();
    assert_eq!(device.backend().buffer_contents(native), Some(data.as_slice()));
}

// ============================================================================
// VIEWS
// ============================================================================

#[test]
fn test_destroy_texture_with_render_target_view_rejected() {
    let mut device = device();
    let texture = device.create_texture(color_target_desc(), None).unwrap();
    let view = device
        .create_render_target_view(RenderTargetViewDescription::new(texture))
        .unwrap();

    assert!(matches!(device.destroy_texture(texture), Err(Error::ResourceInUse(_))));
    assert!(device.texture(texture).is_some());

    device.destroy_render_target_view(view).unwrap();
    device.destroy_texture(texture).unwrap();
    assert_eq!(device.live_resource_count(), 0);
}

#[test]
fn test_view_on_stale_parent_is_invalid_handle() {
    let mut device = device();
    let texture = device.create_texture(color_target_desc(), None).unwrap();
    device.destroy_texture(texture).unwrap();

    let result = device.create_resource_view(ResourceViewDescription {
        resource: ViewResource::texture(texture),
        format: None,
    });
    assert!(matches!(result, Err(Error::InvalidHandle(_))));
}

#[test]
fn test_view_requires_matching_usage() {
    let mut device = device();
    let buffer = device.create_buffer(vertex_buffer_desc(), None).unwrap();
    let result = device.create_resource_view(ResourceViewDescription {
        resource: ViewResource::buffer(buffer),
        format: None,
    });
    assert!(matches!(result, Err(Error::InvalidResource(_))));
}

#[test]
fn test_default_views_are_cached_and_owned() {
    let mut device = device();
    let texture = device.create_texture(color_target_desc(), None).unwrap();

    let srv = device.default_resource_view(texture).unwrap();
    assert_eq!(device.default_resource_view(texture).unwrap(), srv);
    let rtv = device.default_render_target_view(texture).unwrap();
    assert_eq!(device.default_render_target_view(texture).unwrap(), rtv);

    // Default views belong to the texture
    assert!(matches!(device.destroy_resource_view(srv), Err(Error::InvalidResource(_))));
    assert!(matches!(device.destroy_render_target_view(rtv), Err(Error::InvalidResource(_))));

    // ... and do not block its destruction
    device.destroy_texture(texture).unwrap();
    assert!(device.resource_view(srv).is_none());
    assert!(device.render_target_view(rtv).is_none());
    assert_eq!(device.backend().live_objects(), 0);
}

#[test]
fn test_default_buffer_view() {
    let mut device = device();
    let desc = BufferCreationDescription {
        struct_size: 16,
        ..BufferCreationDescription::new(256, BufferUsageFlags::SHADER_RESOURCE)
    };
    let buffer = device.create_buffer(desc, None).unwrap();
    let view = device.default_resource_view(buffer).unwrap();
    assert!(device.resource_view(view).is_some());
    device.destroy_buffer(buffer).unwrap();
    assert_eq!(device.live_resource_count(), 0);
}

#[test]
fn test_unordered_access_view_blocks_buffer_destroy() {
    let mut device = device();
    let desc = BufferCreationDescription {
        struct_size: 4,
        ..BufferCreationDescription::new(256, BufferUsageFlags::UNORDERED_ACCESS)
    };
    let buffer = device.create_buffer(desc, None).unwrap();
    let uav = device
        .create_unordered_access_view(UnorderedAccessViewDescription {
            resource: ViewResource::buffer(buffer),
            format: None,
        })
        .unwrap();

    assert!(matches!(device.destroy_buffer(buffer), Err(Error::ResourceInUse(_))));
    device.destroy_unordered_access_view(uav).unwrap();
    device.destroy_buffer(buffer).unwrap();
}

// ============================================================================
// SHADERS / VERTEX DECLARATIONS
// ============================================================================

#[test]
fn test_vertex_declaration_needs_vertex_stage() {
    let mut device = device();
    let compute = device
        .create_shader(ShaderCreationDescription {
            compute: Some(vec![1u8, 2, 3, 4].into()),
            ..Default::default()
        })
        .unwrap();
    let desc = VertexDeclarationDescription {
        attributes: vec![VertexAttribute::new(VertexSemantic::Position, 0, Format::R32G32B32_FLOAT)],
        shader: compute,
    };
    assert!(matches!(device.create_vertex_declaration(desc), Err(Error::InvalidResource(_))));

    let graphics = device.create_shader(graphics_shader_desc()).unwrap();
    let desc = VertexDeclarationDescription {
        attributes: vec![VertexAttribute::new(VertexSemantic::Position, 0, Format::R32G32B32_FLOAT)],
        shader: graphics,
    };
    assert!(device.create_vertex_declaration(desc).is_ok());
}

// ============================================================================
// STATE DEDUPLICATION
// ============================================================================

#[test]
fn test_equal_state_descriptors_share_handle() {
    let mut device = device();
    let a = device.create_sampler_state(SamplerStateDescription::default()).unwrap();
    let b = device.create_sampler_state(SamplerStateDescription::default()).unwrap();
    assert_eq!(a, b);
    assert_eq!(device.state_ref_count(a), 2);
    assert_eq!(device.resource_count(ResourceKind::SamplerState), 1);

    device.destroy_sampler_state(a).unwrap();
    assert!(device.sampler_state(a).is_some());
    device.destroy_sampler_state(b).unwrap();
    assert!(device.sampler_state(a).is_none());
    assert_eq!(device.backend().live_objects(), 0);
}

#[test]
fn test_different_state_descriptors_get_distinct_handles() {
    let mut device = device();
    let opaque = device.create_blend_state(BlendStateDescription::default()).unwrap();
    let blended = device
        .create_blend_state(BlendStateDescription {
            render_targets: [RenderTargetBlend::alpha_blending(); MAX_RENDER_TARGETS],
            ..Default::default()
        })
        .unwrap();
    assert_ne!(opaque, blended);
    assert_eq!(device.state_ref_count(opaque), 1);
}

#[test]
fn test_invalid_state_descriptor_rejected() {
    let mut device = device();
    let desc = DepthStencilStateDescription {
        depth_test: false,
        depth_write: true,
        ..Default::default()
    };
    assert!(matches!(device.create_depth_stencil_state(desc), Err(Error::InvalidResource(_))));
}

// ============================================================================
// FRAMES
// ============================================================================

#[test]
fn test_frame_numbers_and_safe_frame() {
    let mut device = device_with(|b| b.with_latency(1));
    assert_eq!(device.current_frame(), None);

    assert_eq!(device.begin_frame().unwrap(), 0);
    device.end_frame().unwrap();
    assert_eq!(device.safe_frame(), None);

    assert_eq!(device.begin_frame().unwrap(), 1);
    device.end_frame().unwrap();
    assert_eq!(device.safe_frame(), Some(0));
    assert_eq!(device.current_frame(), Some(1));
}

#[test]
fn test_begin_frame_twice_is_invalid() {
    let mut device = device();
    device.begin_frame().unwrap();
    assert!(matches!(device.begin_frame(), Err(Error::InvalidCommand(_))));
}

#[test]
fn test_begin_commands_outside_frame_is_invalid() {
    let mut device = device();
    assert!(matches!(device.begin_commands(), Err(Error::InvalidCommand(_))));
}

#[test]
fn test_frames_in_flight_wait() {
    // Frames never complete on their own: the device must wait for them
    let mut device = device_with(|b| b.with_latency(100));
    for _ in 0..5 {
        run_empty_frame(&mut device);
    }
    // frames_in_flight = 2: beginning frame 4 waited for frame 2
    assert_eq!(device.safe_frame(), Some(2));
}

// ============================================================================
// SUBMISSION
// ============================================================================

#[test]
fn test_submit_forwards_commands_and_counts_stats() {
    let mut device = device();
    let texture = device.create_texture(color_target_desc(), None).unwrap();
    let rtv = device.default_render_target_view(texture).unwrap();
    let shader = device.create_shader(graphics_shader_desc()).unwrap();

    let frame = device.begin_frame().unwrap();
    let mut encoder = device.begin_commands().unwrap();
    encoder
        .begin_rendering(RenderingSetup {
            color_attachments: vec![ColorAttachment::clear(rtv, Vec4::ZERO)],
            ..Default::default()
        })
        .unwrap();
    encoder.set_shader(shader);
    encoder.set_viewport(Viewport::new(64.0, 64.0)).unwrap();
    encoder.draw(3, 0).unwrap();
    encoder.draw(6, 0).unwrap();
    encoder.end_rendering().unwrap();
    device.submit(encoder).unwrap();

    let stats = device.stats();
    assert_eq!(stats.frame, frame);
    assert_eq!(stats.draw_calls, 2);
    assert_eq!(stats.submissions, 1);
    assert_eq!(device.backend().commands_of_frame(frame).len(), 6);
    device.end_frame().unwrap();
}

#[test]
fn test_submit_with_stale_handle_forwards_nothing() {
    let mut device = device();
    let shader = device.create_shader(graphics_shader_desc()).unwrap();
    device.destroy_shader(shader).unwrap();

    device.begin_frame().unwrap();
    let mut encoder = device.begin_commands().unwrap();
    encoder.push_marker("stale");
    encoder.set_shader(shader);
    encoder.pop_marker().unwrap();

    assert!(matches!(device.submit(encoder), Err(Error::InvalidHandle(_))));
    assert!(device.backend().submissions().is_empty());
    assert_eq!(device.stats().submissions, 0);
}

#[test]
fn test_submit_unbalanced_encoder_rejected() {
    let mut device = device();
    device.begin_frame().unwrap();
    let mut encoder = device.begin_commands().unwrap();
    encoder.push_marker("never popped");
    assert!(matches!(device.submit(encoder), Err(Error::InvalidCommand(_))));
}

#[test]
fn test_encoder_from_previous_frame_rejected() {
    let mut device = device();
    device.begin_frame().unwrap();
    let encoder = device.begin_commands().unwrap();
    device.end_frame().unwrap();
    device.begin_frame().unwrap();
    assert!(matches!(device.submit(encoder), Err(Error::InvalidCommand(_))));
}

#[test]
fn test_update_immutable_buffer_rejected() {
    let mut device = device();
    let desc = BufferCreationDescription {
        access: ResourceAccess::Immutable,
        ..BufferCreationDescription::new(16, BufferUsageFlags::VERTEX)
    };
    let buffer = device.create_buffer(desc, Some(&[0u8; 16])).unwrap();

    device.begin_frame().unwrap();
    let mut encoder = device.begin_commands().unwrap();
    encoder.update_buffer(buffer, 0, &[1, 2, 3, 4]).unwrap();
    assert!(matches!(device.submit(encoder), Err(Error::InvalidCommand(_))));
}

#[test]
fn test_update_buffer_out_of_range_rejected() {
    let mut device = device();
    let buffer = device.create_buffer(BufferCreationDescription::new(16, BufferUsageFlags::VERTEX), None).unwrap();

    device.begin_frame().unwrap();
    let mut encoder = device.begin_commands().unwrap();
    encoder.update_buffer(buffer, 12, &[0u8; 8]).unwrap();
    assert!(matches!(device.submit(encoder), Err(Error::InvalidCommand(_))));
}

#[test]
fn test_ranges_near_address_space_end_rejected() {
    let mut device = device();
    let usage = BufferUsageFlags::VERTEX | BufferUsageFlags::INDEX | BufferUsageFlags::CONSTANT;
    let buffer = device.create_buffer(BufferCreationDescription::new(1024, usage), None).unwrap();
    let other = device.create_buffer(BufferCreationDescription::new(1024, usage), None).unwrap();
    let texture = device.create_texture(color_target_desc(), None).unwrap();
    device.begin_frame().unwrap();

    let mut encoder = device.begin_commands().unwrap();
    encoder.set_constant_buffer(0, buffer, u64::MAX - 255, 256).unwrap();
    assert!(matches!(device.submit(encoder), Err(Error::InvalidCommand(_))));

    let mut encoder = device.begin_commands().unwrap();
    encoder.update_buffer(buffer, u64::MAX, &[1, 2, 3, 4]).unwrap();
    assert!(matches!(device.submit(encoder), Err(Error::InvalidCommand(_))));

    let mut encoder = device.begin_commands().unwrap();
    let region = BufferCopyRegion { src_offset: 0, dst_offset: u64::MAX - 8, size: 16 };
    assert!(matches!(
        encoder.copy_buffer_region(buffer, other, region),
        Err(Error::InvalidCommand(_))
    ));

    let mut encoder = device.begin_commands().unwrap();
    let region = TextureRegion { mip_level: 0, array_layer: 0, offset: [u32::MAX, 0, 0], extent: [1, 1, 1] };
    encoder.update_texture(texture, region, &[0u8; 4]).unwrap();
    assert!(matches!(device.submit(encoder), Err(Error::InvalidCommand(_))));

    assert!(device.backend().submissions().is_empty());
    device.end_frame().unwrap();
}

#[test]
fn test_vertex_and_index_offsets_past_end_rejected() {
    let mut device = device();
    let usage = BufferUsageFlags::VERTEX | BufferUsageFlags::INDEX;
    let buffer = device.create_buffer(BufferCreationDescription::new(64, usage), None).unwrap();
    device.begin_frame().unwrap();

    let mut encoder = device.begin_commands().unwrap();
    encoder.set_vertex_buffer(0, buffer, 64).unwrap();
    assert!(matches!(device.submit(encoder), Err(Error::InvalidCommand(_))));

    let mut encoder = device.begin_commands().unwrap();
    encoder.set_index_buffer(buffer, 128, IndexType::U16).unwrap();
    assert!(matches!(device.submit(encoder), Err(Error::InvalidCommand(_))));

    let mut encoder = device.begin_commands().unwrap();
    encoder.set_vertex_buffer(0, buffer, 32).unwrap();
    encoder.set_index_buffer(buffer, 16, IndexType::U16).unwrap();
    assert!(device.submit(encoder).is_ok());
    device.end_frame().unwrap();
}

#[test]
fn test_update_buffer_reaches_backend() {
    let mut device = device();
    let buffer = device.create_buffer(BufferCreationDescription::new(8, BufferUsageFlags::VERTEX), None).unwrap();

    device.begin_frame().unwrap();
    let mut encoder = device.begin_commands().unwrap();
    encoder.update_buffer(buffer, 4, &[9, 9, 9, 9]).unwrap();
    device.submit(encoder).unwrap();
    device.end_frame().unwrap();

    let native = device.buffer(buffer).unwrap().native().unwrap();
    assert_eq!(device.backend().buffer_contents(native), Some(&[0u8, 0, 0, 0, 9, 9, 9, 9][..]));
}

#[test]
fn test_depth_view_as_color_attachment_rejected() {
    let mut device = device();
    let depth = device
        .create_texture(
            TextureCreationDescription::texture_2d(64, 64, Format::D32_FLOAT, TextureUsageFlags::DEPTH_STENCIL),
            None,
        )
        .unwrap();
    let dsv = device.default_render_target_view(depth).unwrap();

    device.begin_frame().unwrap();
    let mut encoder = device.begin_commands().unwrap();
    encoder
        .begin_rendering(RenderingSetup {
            color_attachments: vec![ColorAttachment::load(dsv)],
            ..Default::default()
        })
        .unwrap();
    encoder.end_rendering().unwrap();
    assert!(matches!(device.submit(encoder), Err(Error::InvalidCommand(_))));

    let mut encoder = device.begin_commands().unwrap();
    encoder
        .begin_rendering(RenderingSetup {
            depth_stencil: Some(DepthStencilAttachment::clear(dsv, 1.0)),
            ..Default::default()
        })
        .unwrap();
    encoder.end_rendering().unwrap();
    assert!(device.submit(encoder).is_ok());
}

// ============================================================================
// TIMESTAMPS
// ============================================================================

#[test]
fn test_timestamp_ready_after_frame_completes() {
    let mut device = device_with(|b| b.with_latency(1));
    device.begin_frame().unwrap();
    let mut encoder = device.begin_commands().unwrap();
    let start = device.insert_timestamp(&mut encoder).unwrap();
    encoder.insert_event_marker("work");
    let end = device.insert_timestamp(&mut encoder).unwrap();
    device.submit(encoder).unwrap();
    device.end_frame().unwrap();

    assert_eq!(device.get_timestamp_result(start), TimestampResult::Pending);

    run_empty_frame(&mut device);
    let start = device.get_timestamp_result(start);
    let end = device.get_timestamp_result(end);
    assert!(start.is_ready() && end.is_ready());
    assert_eq!(TimestampResult::elapsed(start, end), Some(Duration::from_nanos(20)));
}

#[test]
fn test_timestamp_older_than_window_is_invalid() {
    let mut device = device();
    device.begin_frame().unwrap();
    let mut encoder = device.begin_commands().unwrap();
    let stamp = device.insert_timestamp(&mut encoder).unwrap();
    device.submit(encoder).unwrap();
    device.end_frame().unwrap();
    assert!(device.get_timestamp_result(stamp).is_ready());

    for _ in 0..device.config().timestamp_history {
        run_empty_frame(&mut device);
    }
    assert_eq!(device.get_timestamp_result(stamp), TimestampResult::Invalid);
}

#[test]
fn test_timestamp_never_submitted_is_invalid() {
    let mut device = device();
    device.begin_frame().unwrap();
    let mut encoder = device.begin_commands().unwrap();
    let stamp = device.insert_timestamp(&mut encoder).unwrap();
    drop(encoder);
    device.end_frame().unwrap();
    assert_eq!(device.get_timestamp_result(stamp), TimestampResult::Invalid);
}

#[test]
fn test_timestamp_budget_per_frame() {
    let config = DeviceConfig { max_timestamps_per_frame: 2, ..config() };
    let mut device = Device::new(NullBackend::new(&config), config).unwrap();
    device.begin_frame().unwrap();
    let mut encoder = device.begin_commands().unwrap();
    device.insert_timestamp(&mut encoder).unwrap();
    device.insert_timestamp(&mut encoder).unwrap();
    assert!(matches!(device.insert_timestamp(&mut encoder), Err(Error::InvalidCommand(_))));
}

// ============================================================================
// QUERIES
// ============================================================================

#[test]
fn test_occlusion_query_result() {
    let mut device = device_with(|b| b.with_latency(1));
    let texture = device.create_texture(color_target_desc(), None).unwrap();
    let rtv = device.default_render_target_view(texture).unwrap();
    let query = device.create_query(QueryCreationDescription::new(QueryType::Occlusion)).unwrap();

    device.begin_frame().unwrap();
    let mut encoder = device.begin_commands().unwrap();
    encoder
        .begin_rendering(RenderingSetup {
            color_attachments: vec![ColorAttachment::load(rtv)],
            ..Default::default()
        })
        .unwrap();
    encoder.begin_query(query).unwrap();
    encoder.draw(36, 0).unwrap();
    encoder.end_query(query).unwrap();
    encoder.end_rendering().unwrap();
    device.submit(encoder).unwrap();
    device.end_frame().unwrap();

    assert_eq!(device.get_query_result(query), Ok(None));
    run_empty_frame(&mut device);
    assert_eq!(device.get_query_result(query), Ok(Some(36)));
}

#[test]
fn test_query_limit() {
    let config = DeviceConfig { max_queries: 1, ..config() };
    let mut device = Device::new(NullBackend::new(&config), config).unwrap();
    device.create_query(QueryCreationDescription::new(QueryType::AnyOcclusion)).unwrap();
    assert_eq!(
        device.create_query(QueryCreationDescription::new(QueryType::AnyOcclusion)),
        Err(Error::OutOfMemory)
    );
}

// ============================================================================
// DEBUG NAMES
// ============================================================================

#[test]
fn test_set_debug_name_forwards_to_backend() {
    let mut device = device();
    let buffer = device.create_buffer(vertex_buffer_desc(), None).unwrap();
    device.set_debug_name(buffer, "terrain vertices").unwrap();

    let resource = device.buffer(buffer).unwrap();
    assert_eq!(resource.debug_name(), Some("terrain vertices"));
    let id = resource.native().unwrap().id;
    assert_eq!(device.backend().debug_name(id), Some("terrain vertices"));
}

#[test]
fn test_set_debug_name_on_stale_handle() {
    let mut device = device();
    let buffer = device.create_buffer(vertex_buffer_desc(), None).unwrap();
    device.destroy_buffer(buffer).unwrap();
    assert!(matches!(device.set_debug_name(buffer, "gone"), Err(Error::InvalidHandle(_))));
}

// ============================================================================
// DEVICE LOSS
// ============================================================================

#[test]
fn test_device_loss_latches() {
    let mut device = device();
    let buffer = device.create_buffer(vertex_buffer_desc(), None).unwrap();
    device.begin_frame().unwrap();
    device.backend_mut().simulate_device_loss();

    assert_eq!(device.end_frame(), Err(Error::DeviceLost));
    assert!(device.is_lost());
    assert_eq!(device.create_buffer(vertex_buffer_desc(), None), Err(Error::DeviceLost));
    assert_eq!(device.begin_frame(), Err(Error::DeviceLost));

    // Teardown still works
    device.destroy_buffer(buffer).unwrap();
    assert_eq!(device.live_resource_count(), 0);
}

// ============================================================================
// CONFIG / SHUTDOWN
// ============================================================================

#[test]
fn test_invalid_config_rejected() {
    let config = DeviceConfig { frames_in_flight: 0, ..config() };
    let result = Device::new(NullBackend::new(&config), config);
    assert!(matches!(result, Err(Error::InitializationFailed(_))));
}

#[test]
fn test_shutdown_reports_and_releases_leaks() {
    let mut device = device();
    device.create_buffer(vertex_buffer_desc(), None).unwrap();
    let texture = device.create_texture(color_target_desc(), None).unwrap();
    device.default_resource_view(texture).unwrap();

    let leaks = device.shutdown();
    assert!(leaks.contains(&(ResourceKind::Buffer, 1)));
    assert!(leaks.contains(&(ResourceKind::Texture, 1)));
    assert!(leaks.contains(&(ResourceKind::ResourceView, 1)));
    assert_eq!(device.live_resource_count(), 0);
    assert_eq!(device.backend().live_objects(), 0);

    // Idempotent, and the device refuses new work
    assert!(device.shutdown().is_empty());
    assert!(device.create_buffer(vertex_buffer_desc(), None).is_err());
}
