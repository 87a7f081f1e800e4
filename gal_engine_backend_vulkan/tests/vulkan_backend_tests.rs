//! Integration tests for the Vulkan backend
//!
//! These tests drive `Device<VulkanBackend>` on a real adapter.
//! All tests require a GPU and are marked with #[ignore].
//!
//! Run with: cargo test --test vulkan_backend_tests -- --ignored

use gal_engine::gal::command::*;
use gal_engine::gal::resource::*;
use gal_engine::gal::*;
use gal_engine::glam::Vec4;
use gal_engine_backend_vulkan::VulkanBackend;

fn vulkan_device() -> Device<VulkanBackend> {
    let config = DeviceConfig {
        app_name: "GAL Vulkan tests".to_string(),
        enable_validation: true,
        ..DeviceConfig::default()
    };
    let backend = VulkanBackend::new(&config).unwrap();
    Device::new(backend, config).unwrap()
}

fn color_target(device: &mut Device<VulkanBackend>, size: u32) -> TextureHandle {
    device
        .create_texture(
            TextureCreationDescription::texture_2d(
                size,
                size,
                Format::R8G8B8A8_UNORM,
                TextureUsageFlags::RENDER_TARGET | TextureUsageFlags::SHADER_RESOURCE,
            ),
            None,
        )
        .unwrap()
}

/// Run empty frames until every submitted frame completed
fn drain_frames(device: &mut Device<VulkanBackend>) {
    for _ in 0..device.config().frames_in_flight + 1 {
        device.begin_frame().unwrap();
        device.end_frame().unwrap();
    }
}

// ============================================================================
// DEVICE
// ============================================================================

#[test]
#[ignore] // Requires GPU
fn test_vulkan_device_creation() {
    let device = vulkan_device();
    assert_eq!(device.backend().kind(), BackendKind::Vulkan);
    assert!(!device.backend().adapter_name().is_empty());
    assert!(device
        .format_support(Format::R8G8B8A8_UNORM)
        .contains(FormatSupport::SAMPLED | FormatSupport::RENDER_TARGET));
}

#[test]
#[ignore] // Requires GPU
fn test_vulkan_empty_frames_complete() {
    let mut device = vulkan_device();
    for _ in 0..5 {
        device.begin_frame().unwrap();
        device.end_frame().unwrap();
    }
    assert!(device.safe_frame().is_some());
}

// ============================================================================
// RESOURCES
// ============================================================================

#[test]
#[ignore] // Requires GPU
fn test_vulkan_buffer_with_initial_data() {
    let mut device = vulkan_device();
    let baseline = device.live_resource_count();

    let data: Vec<u8> = (0..1024u32).map(|i| i as u8).collect();
    let buffer = device
        .create_buffer(BufferCreationDescription::new(1024, BufferUsageFlags::VERTEX), Some(&data))
        .unwrap();
    assert_eq!(device.live_resource_count(), baseline + 1);

    device.destroy_buffer(buffer).unwrap();
    assert_eq!(device.live_resource_count(), baseline);
}

#[test]
#[ignore] // Requires GPU
fn test_vulkan_texture_with_mips() {
    let mut device = vulkan_device();
    let desc = TextureCreationDescription {
        mip_levels: 4,
        ..TextureCreationDescription::texture_2d(
            64,
            64,
            Format::R8G8B8A8_UNORM,
            TextureUsageFlags::SHADER_RESOURCE | TextureUsageFlags::RENDER_TARGET,
        )
    };
    let data = vec![0x80u8; desc.total_data_size() as usize];
    let texture = device.create_texture(desc, Some(&data)).unwrap();

    device.begin_frame().unwrap();
    let mut encoder = device.begin_commands().unwrap();
    encoder.generate_mip_maps(texture).unwrap();
    device.submit(encoder).unwrap();
    device.end_frame().unwrap();

    device.destroy_texture(texture).unwrap();
    drain_frames(&mut device);
}

#[test]
#[ignore] // Requires GPU
fn test_vulkan_view_blocks_texture_destroy() {
    let mut device = vulkan_device();
    let texture = color_target(&mut device, 32);
    let view = device
        .create_render_target_view(RenderTargetViewDescription {
            texture,
            format: None,
            mip_level: 0,
            base_layer: 0,
            layer_count: REMAINING,
        })
        .unwrap();

    assert!(matches!(device.destroy_texture(texture), Err(Error::ResourceInUse(_))));
    device.destroy_render_target_view(view).unwrap();
    device.destroy_texture(texture).unwrap();
}

#[test]
#[ignore] // Requires GPU
fn test_vulkan_sampler_state_dedup() {
    let mut device = vulkan_device();
    let first = device.create_sampler_state(SamplerStateDescription::default()).unwrap();
    let second = device.create_sampler_state(SamplerStateDescription::default()).unwrap();
    assert_eq!(first, second);
    assert_eq!(device.state_ref_count(first), 2);

    device.destroy_sampler_state(first).unwrap();
    device.destroy_sampler_state(second).unwrap();
    assert!(device.sampler_state(first).is_none());
}

// ============================================================================
// COMMANDS
// ============================================================================

#[test]
#[ignore] // Requires GPU
fn test_vulkan_clear_pass() {
    let mut device = vulkan_device();
    let texture = color_target(&mut device, 128);
    let target = device.default_render_target_view(texture).unwrap();

    device.begin_frame().unwrap();
    let mut encoder = device.begin_commands().unwrap();
    encoder.push_marker("clear");
    encoder
        .begin_rendering(RenderingSetup {
            color_attachments: vec![ColorAttachment::clear(target, Vec4::new(0.1, 0.2, 0.3, 1.0))],
            ..Default::default()
        })
        .unwrap();
    encoder.end_rendering().unwrap();
    encoder.pop_marker().unwrap();
    device.submit(encoder).unwrap();
    device.end_frame().unwrap();

    drain_frames(&mut device);
    device.destroy_texture(texture).unwrap();
}

#[test]
#[ignore] // Requires GPU
fn test_vulkan_buffer_transfers() {
    let mut device = vulkan_device();
    let src = device
        .create_buffer(BufferCreationDescription::new(256, BufferUsageFlags::CONSTANT), None)
        .unwrap();
    let dst = device
        .create_buffer(BufferCreationDescription::new(256, BufferUsageFlags::CONSTANT), None)
        .unwrap();

    device.begin_frame().unwrap();
    let mut encoder = device.begin_commands().unwrap();
    encoder.update_buffer(src, 0, &[7u8; 128]).unwrap();
    encoder.copy_buffer(src, dst).unwrap();
    encoder
        .copy_buffer_region(src, dst, BufferCopyRegion { src_offset: 0, dst_offset: 128, size: 64 })
        .unwrap();
    device.submit(encoder).unwrap();
    device.end_frame().unwrap();

    drain_frames(&mut device);
    device.destroy_buffer(src).unwrap();
    device.destroy_buffer(dst).unwrap();
}

#[test]
#[ignore] // Requires GPU
fn test_vulkan_timestamps_resolve() {
    let mut device = vulkan_device();

    device.begin_frame().unwrap();
    let mut encoder = device.begin_commands().unwrap();
    let start = device.insert_timestamp(&mut encoder).unwrap();
    let end = device.insert_timestamp(&mut encoder).unwrap();
    device.submit(encoder).unwrap();
    device.end_frame().unwrap();

    drain_frames(&mut device);
    match (device.get_timestamp_result(start), device.get_timestamp_result(end)) {
        (TimestampResult::Ready(a), TimestampResult::Ready(b)) => assert!(b >= a),
        other => panic!("timestamps not ready: {:?}", other),
    }
}

#[test]
#[ignore] // Requires GPU
fn test_vulkan_occlusion_query_without_draws() {
    let mut device = vulkan_device();
    let texture = color_target(&mut device, 64);
    let target = device.default_render_target_view(texture).unwrap();
    let query = device.create_query(QueryCreationDescription::new(QueryType::Occlusion)).unwrap();

    device.begin_frame().unwrap();
    let mut encoder = device.begin_commands().unwrap();
    encoder
        .begin_rendering(RenderingSetup {
            color_attachments: vec![ColorAttachment::clear(target, Vec4::ZERO)],
            ..Default::default()
        })
        .unwrap();
    encoder.begin_query(query).unwrap();
    encoder.end_query(query).unwrap();
    encoder.end_rendering().unwrap();
    device.submit(encoder).unwrap();
    device.end_frame().unwrap();

    drain_frames(&mut device);
    assert_eq!(device.get_query_result(query).unwrap(), Some(0));
    device.destroy_query(query).unwrap();
    device.destroy_texture(texture).unwrap();
}
