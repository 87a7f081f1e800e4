/// Format and flag conversions between the GAL and Vulkan
///
/// Every GAL format has an exact Vulkan counterpart; nothing is substituted.
/// Whether the adapter supports it is a separate question answered by
/// `format_support`.

use ash::vk;
use gal_engine::gal::resource::{Format, FormatSupport, IndexType};

/// Convert a GAL format to its Vulkan format
pub(crate) fn format_to_vk(format: Format) -> vk::Format {
    match format {
        Format::R8_UNORM => vk::Format::R8_UNORM,
        Format::R8_SNORM => vk::Format::R8_SNORM,
        Format::R8_UINT => vk::Format::R8_UINT,
        Format::R8G8_UNORM => vk::Format::R8G8_UNORM,
        Format::R8G8_UINT => vk::Format::R8G8_UINT,
        Format::R8G8B8A8_UNORM => vk::Format::R8G8B8A8_UNORM,
        Format::R8G8B8A8_SNORM => vk::Format::R8G8B8A8_SNORM,
        Format::R8G8B8A8_UINT => vk::Format::R8G8B8A8_UINT,
        Format::R8G8B8A8_SRGB => vk::Format::R8G8B8A8_SRGB,
        Format::B8G8R8A8_UNORM => vk::Format::B8G8R8A8_UNORM,
        Format::B8G8R8A8_SRGB => vk::Format::B8G8R8A8_SRGB,

        // Vulkan names packed formats from the most significant bit
        Format::R10G10B10A2_UNORM => vk::Format::A2B10G10R10_UNORM_PACK32,
        Format::R11G11B10_FLOAT => vk::Format::B10G11R11_UFLOAT_PACK32,

        Format::R16_FLOAT => vk::Format::R16_SFLOAT,
        Format::R16_UINT => vk::Format::R16_UINT,
        Format::R16G16_FLOAT => vk::Format::R16G16_SFLOAT,
        Format::R16G16_UNORM => vk::Format::R16G16_UNORM,
        Format::R16G16B16A16_FLOAT => vk::Format::R16G16B16A16_SFLOAT,
        Format::R16G16B16A16_UNORM => vk::Format::R16G16B16A16_UNORM,
        Format::R16G16B16A16_UINT => vk::Format::R16G16B16A16_UINT,

        Format::R32_FLOAT => vk::Format::R32_SFLOAT,
        Format::R32_UINT => vk::Format::R32_UINT,
        Format::R32_SINT => vk::Format::R32_SINT,
        Format::R32G32_FLOAT => vk::Format::R32G32_SFLOAT,
        Format::R32G32_UINT => vk::Format::R32G32_UINT,
        Format::R32G32B32_FLOAT => vk::Format::R32G32B32_SFLOAT,
        Format::R32G32B32_UINT => vk::Format::R32G32B32_UINT,
        Format::R32G32B32A32_FLOAT => vk::Format::R32G32B32A32_SFLOAT,
        Format::R32G32B32A32_UINT => vk::Format::R32G32B32A32_UINT,

        Format::D16_UNORM => vk::Format::D16_UNORM,
        Format::D24_UNORM_S8_UINT => vk::Format::D24_UNORM_S8_UINT,
        Format::D32_FLOAT => vk::Format::D32_SFLOAT,
        Format::D32_FLOAT_S8_UINT => vk::Format::D32_SFLOAT_S8_UINT,

        Format::BC1_UNORM => vk::Format::BC1_RGBA_UNORM_BLOCK,
        Format::BC1_SRGB => vk::Format::BC1_RGBA_SRGB_BLOCK,
        Format::BC3_UNORM => vk::Format::BC3_UNORM_BLOCK,
        Format::BC3_SRGB => vk::Format::BC3_SRGB_BLOCK,
        Format::BC4_UNORM => vk::Format::BC4_UNORM_BLOCK,
        Format::BC5_UNORM => vk::Format::BC5_UNORM_BLOCK,
        Format::BC6H_UFLOAT => vk::Format::BC6H_UFLOAT_BLOCK,
        Format::BC7_UNORM => vk::Format::BC7_UNORM_BLOCK,
        Format::BC7_SRGB => vk::Format::BC7_SRGB_BLOCK,
    }
}

/// Image aspects of a format (depth and stencil for combined formats)
pub(crate) fn aspect_mask(format: Format) -> vk::ImageAspectFlags {
    if format.has_stencil() {
        vk::ImageAspectFlags::DEPTH | vk::ImageAspectFlags::STENCIL
    } else if format.is_depth() {
        vk::ImageAspectFlags::DEPTH
    } else {
        vk::ImageAspectFlags::COLOR
    }
}

/// Aspect used when a depth format is sampled or copied
pub(crate) fn read_aspect_mask(format: Format) -> vk::ImageAspectFlags {
    if format.is_depth() {
        vk::ImageAspectFlags::DEPTH
    } else {
        vk::ImageAspectFlags::COLOR
    }
}

/// Translate Vulkan format features into GAL capabilities
pub(crate) fn support_from_properties(format: Format, properties: &vk::FormatProperties) -> FormatSupport {
    let optimal = properties.optimal_tiling_features;
    let buffer = properties.buffer_features;
    let mut support = FormatSupport::empty();

    if optimal.contains(vk::FormatFeatureFlags::SAMPLED_IMAGE) {
        support |= FormatSupport::SAMPLED;
    }
    if optimal.contains(vk::FormatFeatureFlags::COLOR_ATTACHMENT) {
        support |= FormatSupport::RENDER_TARGET;
    }
    if optimal.contains(vk::FormatFeatureFlags::COLOR_ATTACHMENT_BLEND) {
        support |= FormatSupport::BLENDABLE;
    }
    if format.is_depth() && optimal.contains(vk::FormatFeatureFlags::DEPTH_STENCIL_ATTACHMENT) {
        support |= FormatSupport::DEPTH_STENCIL;
    }
    if optimal.contains(vk::FormatFeatureFlags::STORAGE_IMAGE) {
        support |= FormatSupport::UNORDERED_ACCESS;
    }
    if format.is_vertex_format() && buffer.contains(vk::FormatFeatureFlags::VERTEX_BUFFER) {
        support |= FormatSupport::VERTEX_BUFFER;
    }
    if buffer.contains(vk::FormatFeatureFlags::UNIFORM_TEXEL_BUFFER) {
        support |= FormatSupport::TYPED_BUFFER;
    }
    support
}

pub(crate) fn sample_count_to_vk(count: u32) -> vk::SampleCountFlags {
    match count {
        2 => vk::SampleCountFlags::TYPE_2,
        4 => vk::SampleCountFlags::TYPE_4,
        8 => vk::SampleCountFlags::TYPE_8,
        16 => vk::SampleCountFlags::TYPE_16,
        _ => vk::SampleCountFlags::TYPE_1,
    }
}

pub(crate) fn index_type_to_vk(index_type: IndexType) -> vk::IndexType {
    match index_type {
        IndexType::U16 => vk::IndexType::UINT16,
        IndexType::U32 => vk::IndexType::UINT32,
    }
}

#[cfg(test)]
#[path = "vulkan_format_tests.rs"]
mod tests;
