//! Unit tests for fixed-function state conversion (no GPU required)

use super::*;
use gal_engine::gal::resource::RenderTargetBlend;

// ============================================================================
// BLEND
// ============================================================================

#[test]
fn test_blend_factor_constants() {
    assert_eq!(blend_factor_to_vk(BlendFactor::BlendFactor), vk::BlendFactor::CONSTANT_COLOR);
    assert_eq!(blend_factor_to_vk(BlendFactor::InvBlendFactor), vk::BlendFactor::ONE_MINUS_CONSTANT_COLOR);
    assert_eq!(blend_factor_to_vk(BlendFactor::InvSrcAlpha), vk::BlendFactor::ONE_MINUS_SRC_ALPHA);
}

#[test]
fn test_color_write_mask() {
    assert_eq!(color_write_mask_to_vk(ColorWriteMask::ALL), vk::ColorComponentFlags::RGBA);
    assert_eq!(
        color_write_mask_to_vk(ColorWriteMask::RED | ColorWriteMask::ALPHA),
        vk::ColorComponentFlags::R | vk::ColorComponentFlags::A
    );
    assert!(color_write_mask_to_vk(ColorWriteMask::empty()).is_empty());
}

#[test]
fn test_shared_blend_applies_to_every_target() {
    let mut desc = BlendStateDescription::default();
    desc.render_targets[0] = RenderTargetBlend::alpha_blending();
    let attachments = color_blend_attachments(&desc, 3);
    assert_eq!(attachments.len(), 3);
    assert!(attachments.iter().all(|a| a.blend_enable == vk::TRUE));
    assert!(attachments.iter().all(|a| a.src_color_blend_factor == vk::BlendFactor::SRC_ALPHA));
}

#[test]
fn test_independent_blend() {
    let mut desc = BlendStateDescription { independent_blend: true, ..Default::default() };
    desc.render_targets[1] = RenderTargetBlend::alpha_blending();
    let attachments = color_blend_attachments(&desc, 2);
    assert_eq!(attachments[0].blend_enable, vk::FALSE);
    assert_eq!(attachments[1].blend_enable, vk::TRUE);
}

// ============================================================================
// DEPTH / STENCIL
// ============================================================================

#[test]
fn test_depth_stencil_defaults() {
    let info = depth_stencil_info(&DepthStencilStateDescription::default());
    assert_eq!(info.depth_test_enable, vk::TRUE);
    assert_eq!(info.depth_write_enable, vk::TRUE);
    assert_eq!(info.depth_compare_op, vk::CompareOp::LESS);
    assert_eq!(info.stencil_test_enable, vk::FALSE);
}

#[test]
fn test_stencil_masks_and_ops() {
    let desc = DepthStencilStateDescription {
        stencil_enable: true,
        stencil_read_mask: 0x0F,
        stencil_write_mask: 0xF0,
        front: StencilFace { pass_op: StencilOp::IncrementWrap, func: ComparisonFunc::Equal, ..Default::default() },
        ..Default::default()
    };
    let info = depth_stencil_info(&desc);
    assert_eq!(info.front.pass_op, vk::StencilOp::INCREMENT_AND_WRAP);
    assert_eq!(info.front.compare_op, vk::CompareOp::EQUAL);
    assert_eq!(info.front.compare_mask, 0x0F);
    assert_eq!(info.back.write_mask, 0xF0);
    assert_eq!(info.back.compare_op, vk::CompareOp::ALWAYS);
}

// ============================================================================
// RASTERIZER
// ============================================================================

#[test]
fn test_rasterizer_defaults() {
    let info = rasterization_info(&RasterizerStateDescription::default(), true, true);
    assert_eq!(info.polygon_mode, vk::PolygonMode::FILL);
    assert_eq!(info.cull_mode, vk::CullModeFlags::BACK);
    assert_eq!(info.front_face, vk::FrontFace::COUNTER_CLOCKWISE);
    assert_eq!(info.depth_clamp_enable, vk::FALSE);
    assert_eq!(info.depth_bias_enable, vk::FALSE);
}

#[test]
fn test_wireframe_falls_back_without_feature() {
    let desc = RasterizerStateDescription { fill_mode: FillMode::Wireframe, ..Default::default() };
    assert_eq!(rasterization_info(&desc, true, true).polygon_mode, vk::PolygonMode::LINE);
    assert_eq!(rasterization_info(&desc, false, true).polygon_mode, vk::PolygonMode::FILL);
}

#[test]
fn test_depth_clip_off_enables_clamp() {
    let desc = RasterizerStateDescription { depth_clip: false, ..Default::default() };
    assert_eq!(rasterization_info(&desc, true, true).depth_clamp_enable, vk::TRUE);
    assert_eq!(rasterization_info(&desc, true, false).depth_clamp_enable, vk::FALSE);
}

#[test]
fn test_depth_bias() {
    let desc = RasterizerStateDescription {
        depth_bias: 4,
        slope_scaled_depth_bias: 1.5,
        depth_bias_clamp: 0.01,
        ..Default::default()
    };
    let info = rasterization_info(&desc, true, true);
    assert_eq!(info.depth_bias_enable, vk::TRUE);
    assert_eq!(info.depth_bias_constant_factor, 4.0);
    assert_eq!(info.depth_bias_slope_factor, 1.5);
    assert_eq!(info.depth_bias_clamp, 0.01);
}

#[test]
fn test_patch_list_topology() {
    assert_eq!(topology_to_vk(PrimitiveTopology::PatchList(3)), (vk::PrimitiveTopology::PATCH_LIST, 3));
    assert_eq!(topology_to_vk(PrimitiveTopology::TriangleStrip).0, vk::PrimitiveTopology::TRIANGLE_STRIP);
}

// ============================================================================
// SAMPLERS
// ============================================================================

#[test]
fn test_sampler_defaults() {
    let info = sampler_info(&SamplerStateDescription::default(), 16.0);
    assert_eq!(info.min_filter, vk::Filter::LINEAR);
    assert_eq!(info.mipmap_mode, vk::SamplerMipmapMode::LINEAR);
    assert_eq!(info.address_mode_u, vk::SamplerAddressMode::REPEAT);
    assert_eq!(info.anisotropy_enable, vk::FALSE);
    assert_eq!(info.compare_enable, vk::FALSE);
    assert_eq!(info.max_lod, vk::LOD_CLAMP_NONE);
}

#[test]
fn test_sampler_anisotropy_is_clamped() {
    let desc = SamplerStateDescription { max_anisotropy: 16, ..Default::default() };
    let info = sampler_info(&desc, 8.0);
    assert_eq!(info.anisotropy_enable, vk::TRUE);
    assert_eq!(info.max_anisotropy, 8.0);

    // Unsupported anisotropy
    let info = sampler_info(&desc, 0.0);
    assert_eq!(info.anisotropy_enable, vk::FALSE);
    assert_eq!(info.max_anisotropy, 1.0);
}

#[test]
fn test_comparison_sampler() {
    let desc = SamplerStateDescription {
        comparison: Some(ComparisonFunc::LessEqual),
        address_u: AddressMode::Border,
        border_color: BorderColor::OpaqueWhite,
        min_filter: Filter::Point,
        ..Default::default()
    };
    let info = sampler_info(&desc, 16.0);
    assert_eq!(info.compare_enable, vk::TRUE);
    assert_eq!(info.compare_op, vk::CompareOp::LESS_OR_EQUAL);
    assert_eq!(info.address_mode_u, vk::SamplerAddressMode::CLAMP_TO_BORDER);
    assert_eq!(info.border_color, vk::BorderColor::FLOAT_OPAQUE_WHITE);
    assert_eq!(info.min_filter, vk::Filter::NEAREST);
}
