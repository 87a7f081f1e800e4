//! Unit tests for pipeline cache keys and eviction (no GPU required)

use super::*;
use ash::vk::Handle;

fn key(shader: u64, blend: Option<u64>, rasterizer: Option<u64>) -> GraphicsPipelineKey {
    GraphicsPipelineKey {
        shader,
        vertex_declaration: None,
        blend,
        depth_stencil: None,
        rasterizer,
        topology: PrimitiveTopology::TriangleList,
        sample_mask: u32::MAX,
        color_formats: vec![vk::Format::R8G8B8A8_UNORM],
        depth_format: vk::Format::UNDEFINED,
        samples: vk::SampleCountFlags::TYPE_1,
    }
}

fn cache() -> PipelineCache {
    PipelineCache::with_cache(vk::PipelineCache::null(), PipelineFeatures::default())
}

// ============================================================================
// KEYS
// ============================================================================

#[test]
fn test_key_identity() {
    assert_eq!(key(1, Some(2), None), key(1, Some(2), None));
    assert_ne!(key(1, Some(2), None), key(1, None, None));

    let mut other_target = key(1, None, None);
    other_target.color_formats = vec![vk::Format::B8G8R8A8_SRGB];
    assert_ne!(key(1, None, None), other_target);

    let mut patches = key(1, None, None);
    patches.topology = PrimitiveTopology::PatchList(3);
    let mut more_patches = patches.clone();
    more_patches.topology = PrimitiveTopology::PatchList(4);
    assert_ne!(patches, more_patches);
}

#[test]
fn test_key_references() {
    let k = key(1, Some(2), Some(3));
    assert!(k.references(1));
    assert!(k.references(2));
    assert!(k.references(3));
    assert!(!k.references(4));
}

// ============================================================================
// EVICTION
// ============================================================================

#[test]
fn test_evict_by_state() {
    let mut cache = cache();
    cache.graphics.insert(key(1, Some(10), None), vk::Pipeline::from_raw(100));
    cache.graphics.insert(key(1, Some(11), None), vk::Pipeline::from_raw(101));
    cache.graphics.insert(key(2, Some(10), None), vk::Pipeline::from_raw(102));
    assert_eq!(cache.len(), 3);

    let mut evicted = cache.evict(10);
    evicted.sort_by_key(|p| p.as_raw());
    assert_eq!(evicted, vec![vk::Pipeline::from_raw(100), vk::Pipeline::from_raw(102)]);
    assert_eq!(cache.len(), 1);
}

#[test]
fn test_evict_shader_removes_compute_pipeline() {
    let mut cache = cache();
    cache.graphics.insert(key(5, None, None), vk::Pipeline::from_raw(200));
    cache.compute.insert(5, vk::Pipeline::from_raw(201));
    cache.compute.insert(6, vk::Pipeline::from_raw(202));

    let evicted = cache.evict(5);
    assert_eq!(evicted.len(), 2);
    assert!(evicted.contains(&vk::Pipeline::from_raw(201)));
    assert_eq!(cache.len(), 1);
}

#[test]
fn test_evict_unknown_id() {
    let mut cache = cache();
    cache.graphics.insert(key(1, None, None), vk::Pipeline::from_raw(300));
    assert!(cache.evict(42).is_empty());
    assert_eq!(cache.len(), 1);
}

#[test]
fn test_stencil_formats() {
    assert!(format_has_stencil(vk::Format::D24_UNORM_S8_UINT));
    assert!(format_has_stencil(vk::Format::D32_SFLOAT_S8_UINT));
    assert!(!format_has_stencil(vk::Format::D32_SFLOAT));
    assert!(!format_has_stencil(vk::Format::UNDEFINED));
}
