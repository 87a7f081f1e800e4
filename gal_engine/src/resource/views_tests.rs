use super::*;
use crate::resource::buffer::BufferUsageFlags;
use crate::resource::texture::TextureUsageFlags;

fn texture(mips: u32, layers: u32, usage: TextureUsageFlags) -> TextureCreationDescription {
    let mut desc = TextureCreationDescription::texture_2d(64, 64, Format::R8G8B8A8_UNORM, usage);
    desc.mip_levels = mips;
    desc.array_size = layers;
    desc
}

#[test]
fn test_full_range_resolves_to_concrete_counts() {
    let tex = texture(4, 3, TextureUsageFlags::SHADER_RESOURCE);
    let range = TextureSubresourceRange::ALL.resolve(&tex).unwrap();
    assert_eq!(range.mip_count, 4);
    assert_eq!(range.layer_count, 3);
}

#[test]
fn test_out_of_bounds_range_rejected() {
    let tex = texture(4, 1, TextureUsageFlags::SHADER_RESOURCE);
    let range = TextureSubresourceRange { base_mip: 2, mip_count: 3, base_layer: 0, layer_count: 1 };
    assert!(range.resolve(&tex).is_err());

    let past_end = TextureSubresourceRange { base_mip: 4, ..TextureSubresourceRange::ALL };
    assert!(past_end.resolve(&tex).is_err());
}

#[test]
fn test_buffer_range_resolution() {
    let mut buffer = BufferCreationDescription::new(256, BufferUsageFlags::SHADER_RESOURCE);
    buffer.struct_size = 16;

    let whole = BufferRange::WHOLE.resolve(&buffer).unwrap();
    assert_eq!(whole.size, 256);

    let tail = BufferRange { offset: 64, size: u64::MAX }.resolve(&buffer).unwrap();
    assert_eq!(tail.size, 192);

    assert!(BufferRange { offset: 8, size: 16 }.resolve(&buffer).is_err());
    assert!(BufferRange { offset: 240, size: 32 }.resolve(&buffer).is_err());
}

#[test]
fn test_ranges_that_overflow_are_rejected() {
    let tex = texture(4, 2, TextureUsageFlags::SHADER_RESOURCE);
    let mips = TextureSubresourceRange { base_mip: 1, mip_count: u32::MAX - 1, base_layer: 0, layer_count: 1 };
    assert!(matches!(mips.resolve(&tex), Err(Error::InvalidResource(_))));
    let layers = TextureSubresourceRange { base_mip: 0, mip_count: 1, base_layer: 1, layer_count: u32::MAX - 1 };
    assert!(matches!(layers.resolve(&tex), Err(Error::InvalidResource(_))));

    let buffer = BufferCreationDescription::new(256, BufferUsageFlags::SHADER_RESOURCE);
    let wrapping = BufferRange { offset: 16, size: u64::MAX - 8 };
    assert!(matches!(wrapping.resolve(&buffer), Err(Error::InvalidResource(_))));
}

#[test]
fn test_texture_view_requires_shader_resource_usage() {
    let tex = texture(1, 1, TextureUsageFlags::RENDER_TARGET);
    assert!(validate_texture_view(&tex, &TextureSubresourceRange::ALL, None).is_err());
}

#[test]
fn test_format_reinterpretation() {
    let tex = texture(1, 1, TextureUsageFlags::SHADER_RESOURCE);
    let (format, _) =
        validate_texture_view(&tex, &TextureSubresourceRange::ALL, Some(Format::R8G8B8A8_SRGB)).unwrap();
    assert_eq!(format, Format::R8G8B8A8_SRGB);

    // Different texel size
    assert!(validate_texture_view(&tex, &TextureSubresourceRange::ALL, Some(Format::R16G16B16A16_FLOAT)).is_err());
}

#[test]
fn test_render_target_view_single_mip() {
    let tex = texture(3, 1, TextureUsageFlags::RENDER_TARGET);
    let mut desc = RenderTargetViewDescription::new(TextureHandle::default());
    desc.mip_level = 2;
    let (_, range) = validate_render_target_view(&tex, &desc).unwrap();
    assert_eq!(range.mip_count, 1);
    assert_eq!(range.base_mip, 2);

    desc.mip_level = 3;
    assert!(validate_render_target_view(&tex, &desc).is_err());
}

#[test]
fn test_uav_requires_single_mip() {
    let tex = texture(2, 1, TextureUsageFlags::UNORDERED_ACCESS);
    assert!(validate_texture_uav(&tex, &TextureSubresourceRange::ALL, None).is_err());

    let single = TextureSubresourceRange { mip_count: 1, ..TextureSubresourceRange::ALL };
    assert!(validate_texture_uav(&tex, &single, None).is_ok());
}

#[test]
fn test_buffer_uav_requires_usage() {
    let buffer = BufferCreationDescription::new(64, BufferUsageFlags::SHADER_RESOURCE);
    assert!(validate_buffer_view(&buffer, &BufferRange::WHOLE, false).is_ok());
    assert!(validate_buffer_view(&buffer, &BufferRange::WHOLE, true).is_err());
}
