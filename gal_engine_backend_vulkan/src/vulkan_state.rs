/// Fixed-function state - natives and conversions to Vulkan create infos
///
/// Blend, depth/stencil and rasterizer states have no Vulkan object of their
/// own: they are baked into pipelines, so their natives only carry an identity
/// for the pipeline cache. Samplers are real Vulkan objects.

use ash::vk;
use gal_engine::gal::command::{LoadOp, PrimitiveTopology, StoreOp};
use gal_engine::gal::resource::{
    AddressMode, BlendFactor, BlendOp, BlendStateDescription, BorderColor, ColorWriteMask,
    ComparisonFunc, CullMode, DepthStencilStateDescription, FillMode, Filter, FrontFace,
    RasterizerStateDescription, SamplerStateDescription, StencilFace, StencilOp,
};
use gal_engine::gal::Result;

use crate::vulkan_context::{vk_error, GpuContext};
use crate::vulkan_frame::DeferredRelease;

#[derive(Debug)]
pub struct BlendState {
    pub(crate) id: u64,
}

#[derive(Debug)]
pub struct DepthStencilState {
    pub(crate) id: u64,
}

#[derive(Debug)]
pub struct RasterizerState {
    pub(crate) id: u64,
}

#[derive(Debug)]
pub struct SamplerState {
    pub(crate) sampler: vk::Sampler,
}

impl SamplerState {
    pub(crate) fn into_release(self) -> DeferredRelease {
        DeferredRelease::Sampler(self.sampler)
    }
}

// ===== ENUM CONVERSIONS =====

pub(crate) fn compare_op_to_vk(func: ComparisonFunc) -> vk::CompareOp {
    match func {
        ComparisonFunc::Never => vk::CompareOp::NEVER,
        ComparisonFunc::Less => vk::CompareOp::LESS,
        ComparisonFunc::Equal => vk::CompareOp::EQUAL,
        ComparisonFunc::LessEqual => vk::CompareOp::LESS_OR_EQUAL,
        ComparisonFunc::Greater => vk::CompareOp::GREATER,
        ComparisonFunc::NotEqual => vk::CompareOp::NOT_EQUAL,
        ComparisonFunc::GreaterEqual => vk::CompareOp::GREATER_OR_EQUAL,
        ComparisonFunc::Always => vk::CompareOp::ALWAYS,
    }
}

pub(crate) fn stencil_op_to_vk(op: StencilOp) -> vk::StencilOp {
    match op {
        StencilOp::Keep => vk::StencilOp::KEEP,
        StencilOp::Zero => vk::StencilOp::ZERO,
        StencilOp::Replace => vk::StencilOp::REPLACE,
        StencilOp::IncrementClamp => vk::StencilOp::INCREMENT_AND_CLAMP,
        StencilOp::DecrementClamp => vk::StencilOp::DECREMENT_AND_CLAMP,
        StencilOp::Invert => vk::StencilOp::INVERT,
        StencilOp::IncrementWrap => vk::StencilOp::INCREMENT_AND_WRAP,
        StencilOp::DecrementWrap => vk::StencilOp::DECREMENT_AND_WRAP,
    }
}

pub(crate) fn blend_factor_to_vk(factor: BlendFactor) -> vk::BlendFactor {
    match factor {
        BlendFactor::Zero => vk::BlendFactor::ZERO,
        BlendFactor::One => vk::BlendFactor::ONE,
        BlendFactor::SrcColor => vk::BlendFactor::SRC_COLOR,
        BlendFactor::InvSrcColor => vk::BlendFactor::ONE_MINUS_SRC_COLOR,
        BlendFactor::SrcAlpha => vk::BlendFactor::SRC_ALPHA,
        BlendFactor::InvSrcAlpha => vk::BlendFactor::ONE_MINUS_SRC_ALPHA,
        BlendFactor::DstColor => vk::BlendFactor::DST_COLOR,
        BlendFactor::InvDstColor => vk::BlendFactor::ONE_MINUS_DST_COLOR,
        BlendFactor::DstAlpha => vk::BlendFactor::DST_ALPHA,
        BlendFactor::InvDstAlpha => vk::BlendFactor::ONE_MINUS_DST_ALPHA,
        BlendFactor::SrcAlphaSaturate => vk::BlendFactor::SRC_ALPHA_SATURATE,
        BlendFactor::BlendFactor => vk::BlendFactor::CONSTANT_COLOR,
        BlendFactor::InvBlendFactor => vk::BlendFactor::ONE_MINUS_CONSTANT_COLOR,
    }
}

pub(crate) fn blend_op_to_vk(op: BlendOp) -> vk::BlendOp {
    match op {
        BlendOp::Add => vk::BlendOp::ADD,
        BlendOp::Subtract => vk::BlendOp::SUBTRACT,
        BlendOp::RevSubtract => vk::BlendOp::REVERSE_SUBTRACT,
        BlendOp::Min => vk::BlendOp::MIN,
        BlendOp::Max => vk::BlendOp::MAX,
    }
}

pub(crate) fn color_write_mask_to_vk(mask: ColorWriteMask) -> vk::ColorComponentFlags {
    let mut flags = vk::ColorComponentFlags::empty();
    if mask.contains(ColorWriteMask::RED) { flags |= vk::ColorComponentFlags::R; }
    if mask.contains(ColorWriteMask::GREEN) { flags |= vk::ColorComponentFlags::G; }
    if mask.contains(ColorWriteMask::BLUE) { flags |= vk::ColorComponentFlags::B; }
    if mask.contains(ColorWriteMask::ALPHA) { flags |= vk::ColorComponentFlags::A; }
    flags
}

pub(crate) fn cull_mode_to_vk(mode: CullMode) -> vk::CullModeFlags {
    match mode {
        CullMode::None => vk::CullModeFlags::NONE,
        CullMode::Front => vk::CullModeFlags::FRONT,
        CullMode::Back => vk::CullModeFlags::BACK,
    }
}

pub(crate) fn front_face_to_vk(face: FrontFace) -> vk::FrontFace {
    match face {
        FrontFace::CounterClockwise => vk::FrontFace::COUNTER_CLOCKWISE,
        FrontFace::Clockwise => vk::FrontFace::CLOCKWISE,
    }
}

pub(crate) fn polygon_mode_to_vk(mode: FillMode) -> vk::PolygonMode {
    match mode {
        FillMode::Solid => vk::PolygonMode::FILL,
        FillMode::Wireframe => vk::PolygonMode::LINE,
    }
}

/// Vulkan topology and the tessellation patch size (0 without tessellation)
pub(crate) fn topology_to_vk(topology: PrimitiveTopology) -> (vk::PrimitiveTopology, u32) {
    match topology {
        PrimitiveTopology::PointList => (vk::PrimitiveTopology::POINT_LIST, 0),
        PrimitiveTopology::LineList => (vk::PrimitiveTopology::LINE_LIST, 0),
        PrimitiveTopology::LineStrip => (vk::PrimitiveTopology::LINE_STRIP, 0),
        PrimitiveTopology::TriangleList => (vk::PrimitiveTopology::TRIANGLE_LIST, 0),
        PrimitiveTopology::TriangleStrip => (vk::PrimitiveTopology::TRIANGLE_STRIP, 0),
        PrimitiveTopology::PatchList(points) => (vk::PrimitiveTopology::PATCH_LIST, points),
    }
}

pub(crate) fn load_op_to_vk(load_op: LoadOp) -> vk::AttachmentLoadOp {
    match load_op {
        LoadOp::Load => vk::AttachmentLoadOp::LOAD,
        LoadOp::Clear => vk::AttachmentLoadOp::CLEAR,
        LoadOp::DontCare => vk::AttachmentLoadOp::DONT_CARE,
    }
}

pub(crate) fn store_op_to_vk(store_op: StoreOp) -> vk::AttachmentStoreOp {
    match store_op {
        StoreOp::Store => vk::AttachmentStoreOp::STORE,
        StoreOp::DontCare => vk::AttachmentStoreOp::DONT_CARE,
    }
}

pub(crate) fn filter_to_vk(filter: Filter) -> vk::Filter {
    match filter {
        Filter::Point => vk::Filter::NEAREST,
        Filter::Linear => vk::Filter::LINEAR,
    }
}

pub(crate) fn mipmap_mode_to_vk(filter: Filter) -> vk::SamplerMipmapMode {
    match filter {
        Filter::Point => vk::SamplerMipmapMode::NEAREST,
        Filter::Linear => vk::SamplerMipmapMode::LINEAR,
    }
}

pub(crate) fn address_mode_to_vk(mode: AddressMode) -> vk::SamplerAddressMode {
    match mode {
        AddressMode::Wrap => vk::SamplerAddressMode::REPEAT,
        AddressMode::Mirror => vk::SamplerAddressMode::MIRRORED_REPEAT,
        AddressMode::Clamp => vk::SamplerAddressMode::CLAMP_TO_EDGE,
        AddressMode::Border => vk::SamplerAddressMode::CLAMP_TO_BORDER,
        AddressMode::MirrorOnce => vk::SamplerAddressMode::MIRROR_CLAMP_TO_EDGE,
    }
}

pub(crate) fn border_color_to_vk(color: BorderColor) -> vk::BorderColor {
    match color {
        BorderColor::TransparentBlack => vk::BorderColor::FLOAT_TRANSPARENT_BLACK,
        BorderColor::OpaqueBlack => vk::BorderColor::FLOAT_OPAQUE_BLACK,
        BorderColor::OpaqueWhite => vk::BorderColor::FLOAT_OPAQUE_WHITE,
    }
}

// ===== PIPELINE STATE BLOCKS =====

/// Blend attachments for `count` color targets
pub(crate) fn color_blend_attachments(desc: &BlendStateDescription, count: usize) -> Vec<vk::PipelineColorBlendAttachmentState> {
    (0..count)
        .map(|i| {
            let target = desc.target(i);
            vk::PipelineColorBlendAttachmentState {
                blend_enable: vk::Bool32::from(target.enabled),
                src_color_blend_factor: blend_factor_to_vk(target.src_color),
                dst_color_blend_factor: blend_factor_to_vk(target.dst_color),
                color_blend_op: blend_op_to_vk(target.color_op),
                src_alpha_blend_factor: blend_factor_to_vk(target.src_alpha),
                dst_alpha_blend_factor: blend_factor_to_vk(target.dst_alpha),
                alpha_blend_op: blend_op_to_vk(target.alpha_op),
                color_write_mask: color_write_mask_to_vk(target.write_mask),
            }
        })
        .collect()
}

fn stencil_face_to_vk(face: &StencilFace, read_mask: u8, write_mask: u8) -> vk::StencilOpState {
    vk::StencilOpState {
        fail_op: stencil_op_to_vk(face.fail_op),
        pass_op: stencil_op_to_vk(face.pass_op),
        depth_fail_op: stencil_op_to_vk(face.depth_fail_op),
        compare_op: compare_op_to_vk(face.func),
        compare_mask: read_mask as u32,
        write_mask: write_mask as u32,
        // Dynamic state
        reference: 0,
    }
}

pub(crate) fn depth_stencil_info(desc: &DepthStencilStateDescription) -> vk::PipelineDepthStencilStateCreateInfo<'static> {
    vk::PipelineDepthStencilStateCreateInfo::default()
        .depth_test_enable(desc.depth_test)
        .depth_write_enable(desc.depth_write)
        .depth_compare_op(compare_op_to_vk(desc.depth_func))
        .depth_bounds_test_enable(false)
        .stencil_test_enable(desc.stencil_enable)
        .front(stencil_face_to_vk(&desc.front, desc.stencil_read_mask, desc.stencil_write_mask))
        .back(stencil_face_to_vk(&desc.back, desc.stencil_read_mask, desc.stencil_write_mask))
        .min_depth_bounds(0.0)
        .max_depth_bounds(1.0)
}

/// Rasterization block; wireframe and depth clamp fall back when the device lacks them
pub(crate) fn rasterization_info(
    desc: &RasterizerStateDescription,
    fill_mode_non_solid: bool,
    depth_clamp: bool,
) -> vk::PipelineRasterizationStateCreateInfo<'static> {
    let polygon_mode = if fill_mode_non_solid { polygon_mode_to_vk(desc.fill_mode) } else { vk::PolygonMode::FILL };
    let depth_bias = desc.depth_bias != 0 || desc.slope_scaled_depth_bias != 0.0;
    vk::PipelineRasterizationStateCreateInfo::default()
        .depth_clamp_enable(!desc.depth_clip && depth_clamp)
        .rasterizer_discard_enable(false)
        .polygon_mode(polygon_mode)
        .cull_mode(cull_mode_to_vk(desc.cull_mode))
        .front_face(front_face_to_vk(desc.front_face))
        .depth_bias_enable(depth_bias)
        .depth_bias_constant_factor(desc.depth_bias as f32)
        .depth_bias_clamp(desc.depth_bias_clamp)
        .depth_bias_slope_factor(desc.slope_scaled_depth_bias)
        .line_width(1.0)
}

// ===== SAMPLERS =====

/// Sampler create info; anisotropy is clamped to the device limit (0 when unsupported)
pub(crate) fn sampler_info(desc: &SamplerStateDescription, max_anisotropy: f32) -> vk::SamplerCreateInfo<'static> {
    let anisotropy = (desc.max_anisotropy as f32).min(max_anisotropy);
    let (compare_enable, compare_op) = match desc.comparison {
        Some(func) => (true, compare_op_to_vk(func)),
        None => (false, vk::CompareOp::ALWAYS),
    };
    vk::SamplerCreateInfo::default()
        .mag_filter(filter_to_vk(desc.mag_filter))
        .min_filter(filter_to_vk(desc.min_filter))
        .mipmap_mode(mipmap_mode_to_vk(desc.mip_filter))
        .address_mode_u(address_mode_to_vk(desc.address_u))
        .address_mode_v(address_mode_to_vk(desc.address_v))
        .address_mode_w(address_mode_to_vk(desc.address_w))
        .mip_lod_bias(desc.mip_lod_bias)
        .anisotropy_enable(anisotropy > 1.0)
        .max_anisotropy(anisotropy.max(1.0))
        .compare_enable(compare_enable)
        .compare_op(compare_op)
        .min_lod(desc.min_lod)
        .max_lod(if desc.max_lod >= f32::MAX { vk::LOD_CLAMP_NONE } else { desc.max_lod })
        .border_color(border_color_to_vk(desc.border_color))
        .unnormalized_coordinates(false)
}

pub(crate) fn create_sampler(ctx: &GpuContext, desc: &SamplerStateDescription, max_anisotropy: f32) -> Result<SamplerState> {
    let create_info = sampler_info(desc, max_anisotropy);
    let sampler = unsafe {
        ctx.device
            .create_sampler(&create_info, None)
            .map_err(|e| vk_error("Failed to create sampler", e))?
    };
    Ok(SamplerState { sampler })
}

#[cfg(test)]
#[path = "vulkan_state_tests.rs"]
mod tests;
