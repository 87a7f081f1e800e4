use super::*;

fn color_2d(width: u32, height: u32) -> TextureCreationDescription {
    TextureCreationDescription::texture_2d(
        width,
        height,
        Format::R8G8B8A8_UNORM,
        TextureUsageFlags::SHADER_RESOURCE | TextureUsageFlags::RENDER_TARGET,
    )
}

// ============================================================================
// LAYOUT TESTS
// ============================================================================

#[test]
fn test_max_mip_levels() {
    assert_eq!(color_2d(256, 256).max_mip_levels(), 9);
    assert_eq!(color_2d(300, 1).max_mip_levels(), 9);
    assert_eq!(color_2d(1, 1).max_mip_levels(), 1);
}

#[test]
fn test_mip_extent_clamps_to_one() {
    assert_eq!(mip_extent(16, 2), 4);
    assert_eq!(mip_extent(16, 10), 1);
}

#[test]
fn test_subresource_layouts_are_packed_layer_major() {
    let mut desc = color_2d(4, 4);
    desc.mip_levels = 3;
    desc.array_size = 2;

    let layouts = desc.subresource_layouts();
    assert_eq!(layouts.len(), 6);

    // 4x4, 2x2, 1x1 texels of 4 bytes
    assert_eq!(layouts[0].size, 64);
    assert_eq!(layouts[1].offset, 64);
    assert_eq!(layouts[1].size, 16);
    assert_eq!(layouts[2].size, 4);
    assert_eq!(layouts[3].array_layer, 1);
    assert_eq!(layouts[3].mip_level, 0);
    assert_eq!(layouts[3].offset, 84);
    assert_eq!(desc.total_data_size(), 168);
}

#[test]
fn test_cube_layer_count() {
    let mut desc = color_2d(8, 8);
    desc.texture_type = TextureType::TextureCube;
    assert_eq!(desc.layer_count(), 6);
    desc.array_size = 2;
    assert_eq!(desc.layer_count(), 12);
}

// ============================================================================
// VALIDATION TESTS
// ============================================================================

#[test]
fn test_valid_render_target() {
    assert!(color_2d(1920, 1080).validate(None).is_ok());
}

#[test]
fn test_zero_extent_rejected() {
    assert!(color_2d(0, 16).validate(None).is_err());
}

#[test]
fn test_too_many_mips_rejected() {
    let mut desc = color_2d(16, 16);
    desc.mip_levels = 6;
    assert!(desc.validate(None).is_err());
    desc.mip_levels = 5;
    assert!(desc.validate(None).is_ok());
}

#[test]
fn test_depth_usage_requires_depth_format() {
    let mut desc = color_2d(64, 64);
    desc.usage = TextureUsageFlags::DEPTH_STENCIL;
    assert!(desc.validate(None).is_err());

    desc.format = Format::D32_FLOAT;
    assert!(desc.validate(None).is_ok());
}

#[test]
fn test_depth_format_cannot_be_color_target() {
    let mut desc = color_2d(64, 64);
    desc.format = Format::D24_UNORM_S8_UINT;
    assert!(desc.validate(None).is_err());
}

#[test]
fn test_compressed_size_must_be_block_aligned() {
    let mut desc = color_2d(30, 32);
    desc.format = Format::BC7_UNORM;
    desc.usage = TextureUsageFlags::SHADER_RESOURCE;
    assert!(desc.validate(None).is_err());
    desc.width = 32;
    assert!(desc.validate(None).is_ok());
}

#[test]
fn test_multisample_restrictions() {
    let mut desc = color_2d(64, 64);
    desc.sample_count = 4;
    assert!(desc.validate(None).is_ok());

    desc.mip_levels = 2;
    assert!(desc.validate(None).is_err());

    desc.mip_levels = 1;
    desc.sample_count = 3;
    assert!(desc.validate(None).is_err());
}

#[test]
fn test_cube_must_be_square() {
    let mut desc = color_2d(64, 32);
    desc.texture_type = TextureType::TextureCube;
    assert!(desc.validate(None).is_err());
}

#[test]
fn test_initial_data_size_must_match() {
    let mut desc = color_2d(4, 4);
    desc.access = ResourceAccess::Immutable;
    assert!(desc.validate(None).is_err());
    assert!(desc.validate(Some(&[0u8; 63])).is_err());
    assert!(desc.validate(Some(&[0u8; 64])).is_ok());
}

#[test]
fn test_dynamic_texture_rejected() {
    let mut desc = color_2d(4, 4);
    desc.access = ResourceAccess::Dynamic;
    assert!(desc.validate(None).is_err());
}
