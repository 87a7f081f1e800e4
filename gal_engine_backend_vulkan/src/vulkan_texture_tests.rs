//! Unit tests for texture layout and usage conversion (no GPU required)

use super::*;

// ============================================================================
// RESTING LAYOUT
// ============================================================================

#[test]
fn test_sampled_textures_rest_read_only() {
    assert_eq!(
        resting_layout(TextureUsageFlags::SHADER_RESOURCE, Format::R8G8B8A8_UNORM),
        vk::ImageLayout::SHADER_READ_ONLY_OPTIMAL
    );
    assert_eq!(
        resting_layout(TextureUsageFlags::SHADER_RESOURCE | TextureUsageFlags::RENDER_TARGET, Format::R16G16B16A16_FLOAT),
        vk::ImageLayout::SHADER_READ_ONLY_OPTIMAL
    );
}

#[test]
fn test_depth_textures_rest_in_depth_layouts() {
    assert_eq!(
        resting_layout(TextureUsageFlags::DEPTH_STENCIL, Format::D32_FLOAT),
        vk::ImageLayout::DEPTH_STENCIL_ATTACHMENT_OPTIMAL
    );
    assert_eq!(
        resting_layout(TextureUsageFlags::DEPTH_STENCIL | TextureUsageFlags::SHADER_RESOURCE, Format::D32_FLOAT),
        vk::ImageLayout::DEPTH_STENCIL_READ_ONLY_OPTIMAL
    );
}

#[test]
fn test_storage_textures_rest_general() {
    assert_eq!(
        resting_layout(TextureUsageFlags::UNORDERED_ACCESS | TextureUsageFlags::SHADER_RESOURCE, Format::R32_FLOAT),
        vk::ImageLayout::GENERAL
    );
}

#[test]
fn test_render_targets_rest_as_attachments() {
    assert_eq!(
        resting_layout(TextureUsageFlags::RENDER_TARGET, Format::B8G8R8A8_UNORM),
        vk::ImageLayout::COLOR_ATTACHMENT_OPTIMAL
    );
}

// ============================================================================
// USAGE AND SUPPORT
// ============================================================================

#[test]
fn test_image_usage_always_allows_copies() {
    let usage = image_usage_to_vk(TextureUsageFlags::SHADER_RESOURCE);
    assert!(usage.contains(vk::ImageUsageFlags::SAMPLED));
    assert!(usage.contains(vk::ImageUsageFlags::TRANSFER_SRC | vk::ImageUsageFlags::TRANSFER_DST));
    assert!(!usage.contains(vk::ImageUsageFlags::STORAGE));
}

#[test]
fn test_required_support() {
    assert_eq!(
        required_support(TextureUsageFlags::SHADER_RESOURCE | TextureUsageFlags::UNORDERED_ACCESS),
        FormatSupport::SAMPLED | FormatSupport::UNORDERED_ACCESS
    );
    assert_eq!(required_support(TextureUsageFlags::DEPTH_STENCIL), FormatSupport::DEPTH_STENCIL);
    assert!(required_support(TextureUsageFlags::COPY_DST).is_empty());
}

// ============================================================================
// VIEW TYPES
// ============================================================================

#[test]
fn test_view_types() {
    assert_eq!(image_view_type(TextureType::Texture1D, 1, false), vk::ImageViewType::TYPE_1D);
    assert_eq!(image_view_type(TextureType::Texture1D, 4, false), vk::ImageViewType::TYPE_1D_ARRAY);
    assert_eq!(image_view_type(TextureType::Texture2D, 1, false), vk::ImageViewType::TYPE_2D);
    assert_eq!(image_view_type(TextureType::Texture2D, 3, false), vk::ImageViewType::TYPE_2D_ARRAY);
    assert_eq!(image_view_type(TextureType::Texture3D, 1, false), vk::ImageViewType::TYPE_3D);
}

#[test]
fn test_cube_view_types() {
    assert_eq!(image_view_type(TextureType::TextureCube, 6, true), vk::ImageViewType::CUBE);
    assert_eq!(image_view_type(TextureType::TextureCube, 12, true), vk::ImageViewType::CUBE_ARRAY);
    // Storage and attachment views see the faces as a 2D array
    assert_eq!(image_view_type(TextureType::TextureCube, 6, false), vk::ImageViewType::TYPE_2D_ARRAY);
    assert_eq!(image_view_type(TextureType::TextureCube, 1, true), vk::ImageViewType::TYPE_2D);
}
