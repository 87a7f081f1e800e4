/// Views - shader-visible and attachment views over textures and buffers

use ash::vk;
use gal_engine::gal::resource::{
    BufferCreationDescription, BufferRange, Format, TextureCreationDescription, TextureSubresourceRange,
    TextureType,
};
use gal_engine::gal::Result;

use crate::vulkan_buffer::Buffer;
use crate::vulkan_context::{vk_error, GpuContext};
use crate::vulkan_format::{aspect_mask, format_to_vk, read_aspect_mask};
use crate::vulkan_frame::DeferredRelease;
use crate::vulkan_layout::LayoutRange;
use crate::vulkan_texture::{image_view_type, Texture};

/// Shader resource or unordered access view
#[derive(Debug)]
pub enum ShaderView {
    /// Sampled or storage image
    Image {
        view: vk::ImageView,
        image: vk::Image,
        /// Layout the image is in when shaders access it
        layout: vk::ImageLayout,
    },
    /// Typed buffer
    TexelBuffer { view: vk::BufferView },
    /// Structured or raw buffer range
    Buffer { buffer: vk::Buffer, offset: u64, size: u64 },
}

impl ShaderView {
    pub(crate) fn into_release(self) -> Option<DeferredRelease> {
        match self {
            ShaderView::Image { view, .. } => Some(DeferredRelease::ImageView(view)),
            ShaderView::TexelBuffer { view } => Some(DeferredRelease::BufferView(view)),
            ShaderView::Buffer { .. } => None,
        }
    }
}

/// Color or depth attachment view
#[derive(Debug)]
pub struct RenderTargetView {
    pub(crate) view: vk::ImageView,
    pub(crate) image: vk::Image,
    pub(crate) format: vk::Format,
    pub(crate) aspect: vk::ImageAspectFlags,
    pub(crate) is_depth: bool,
    pub(crate) has_stencil: bool,
    pub(crate) range: LayoutRange,
    pub(crate) extent: vk::Extent2D,
    pub(crate) samples: vk::SampleCountFlags,
    pub(crate) resting_layout: vk::ImageLayout,
}

impl RenderTargetView {
    pub(crate) fn into_release(self) -> DeferredRelease {
        DeferredRelease::ImageView(self.view)
    }
}

fn create_image_view(
    ctx: &GpuContext,
    texture: &Texture,
    view_type: vk::ImageViewType,
    format: Format,
    aspect: vk::ImageAspectFlags,
    range: &TextureSubresourceRange,
) -> Result<vk::ImageView> {
    let create_info = vk::ImageViewCreateInfo::default()
        .image(texture.image)
        .view_type(view_type)
        .format(format_to_vk(format))
        .components(vk::ComponentMapping::default())
        .subresource_range(vk::ImageSubresourceRange {
            aspect_mask: aspect,
            base_mip_level: range.base_mip,
            level_count: range.mip_count,
            base_array_layer: range.base_layer,
            layer_count: range.layer_count,
        });
    unsafe {
        ctx.device
            .create_image_view(&create_info, None)
            .map_err(|e| vk_error("Failed to create image view", e))
    }
}

fn create_texel_view(ctx: &GpuContext, buffer: &Buffer, format: Format, range: &BufferRange) -> Result<vk::BufferView> {
    let create_info = vk::BufferViewCreateInfo::default()
        .buffer(buffer.buffer)
        .format(format_to_vk(format))
        .offset(range.offset)
        .range(range.size);
    unsafe {
        ctx.device
            .create_buffer_view(&create_info, None)
            .map_err(|e| vk_error("Failed to create buffer view", e))
    }
}

/// View of a texture read or written by shaders
pub(crate) fn create_texture_shader_view(
    ctx: &GpuContext,
    texture: &Texture,
    desc: &TextureCreationDescription,
    format: Format,
    range: &TextureSubresourceRange,
    storage: bool,
) -> Result<ShaderView> {
    let view_type = image_view_type(desc.texture_type, range.layer_count, !storage);
    let view = create_image_view(ctx, texture, view_type, format, read_aspect_mask(format), range)?;
    let layout = if storage { vk::ImageLayout::GENERAL } else { texture.resting_layout };
    Ok(ShaderView::Image { view, image: texture.image, layout })
}

/// View of a buffer read or written by shaders
pub(crate) fn create_buffer_shader_view(
    ctx: &GpuContext,
    buffer: &Buffer,
    desc: &BufferCreationDescription,
    format: Option<Format>,
    range: &BufferRange,
) -> Result<ShaderView> {
    match format.or(desc.format) {
        Some(format) if desc.struct_size == 0 => {
            Ok(ShaderView::TexelBuffer { view: create_texel_view(ctx, buffer, format, range)? })
        }
        _ => Ok(ShaderView::Buffer { buffer: buffer.buffer, offset: range.offset, size: range.size }),
    }
}

/// Attachment view of one mip of a texture
pub(crate) fn create_render_target_view(
    ctx: &GpuContext,
    texture: &Texture,
    desc: &TextureCreationDescription,
    format: Format,
    range: &TextureSubresourceRange,
) -> Result<RenderTargetView> {
    let (view_type, view_range) = if desc.texture_type == TextureType::Texture3D {
        // 3D targets render into their first slice through a 2D view
        (vk::ImageViewType::TYPE_2D, TextureSubresourceRange { layer_count: 1, ..*range })
    } else {
        (image_view_type(desc.texture_type, range.layer_count, false), *range)
    };
    let aspect = aspect_mask(format);
    let view = create_image_view(ctx, texture, view_type, format, aspect, &view_range)?;
    let extent = texture.mip_extent(range.base_mip);
    Ok(RenderTargetView {
        view,
        image: texture.image,
        format: format_to_vk(format),
        aspect,
        is_depth: format.is_depth(),
        has_stencil: format.has_stencil(),
        range: LayoutRange::new(range.base_mip, 1, range.base_layer, range.layer_count),
        extent: vk::Extent2D { width: extent.width, height: extent.height },
        samples: texture.samples,
        resting_layout: texture.resting_layout,
    })
}
