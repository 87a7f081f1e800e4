/// Texture - Vulkan native for GAL textures
///
/// Every texture rests in one layout between passes and transfers, chosen
/// from its usage. Commands that need another layout move the affected
/// sub-resources away and back.

use ash::vk;
use gpu_allocator::vulkan::Allocation;
use gpu_allocator::MemoryLocation;
use gal_engine::gal::resource::{
    Format, FormatSupport, TextureCreationDescription, TextureType, TextureUsageFlags,
};
use gal_engine::gal::{Error, Result};
use gal_engine::engine_bail;

use crate::vulkan_context::{vk_error, GpuContext};
use crate::vulkan_format::{aspect_mask, format_to_vk, sample_count_to_vk};
use crate::vulkan_frame::DeferredRelease;
use crate::vulkan_layout::{record_transitions, LayoutRange, LayoutTracker};
use crate::vulkan_staging::StagingBufferPool;
use crate::SOURCE;

/// Vulkan image and its memory
#[derive(Debug)]
pub struct Texture {
    pub(crate) image: vk::Image,
    pub(crate) allocation: Option<Allocation>,
    pub(crate) format: Format,
    pub(crate) vk_format: vk::Format,
    pub(crate) aspect: vk::ImageAspectFlags,
    pub(crate) extent: vk::Extent3D,
    pub(crate) mip_levels: u32,
    /// 2D layers (cube faces count individually)
    pub(crate) array_layers: u32,
    pub(crate) samples: vk::SampleCountFlags,
    /// Layout between commands
    pub(crate) resting_layout: vk::ImageLayout,
}

impl Texture {
    pub(crate) fn full_range(&self) -> LayoutRange {
        LayoutRange::new(0, self.mip_levels, 0, self.array_layers)
    }

    /// Extent of one mip level
    pub(crate) fn mip_extent(&self, mip: u32) -> vk::Extent3D {
        vk::Extent3D {
            width: (self.extent.width >> mip).max(1),
            height: (self.extent.height >> mip).max(1),
            depth: (self.extent.depth >> mip).max(1),
        }
    }

    pub(crate) fn into_release(self) -> DeferredRelease {
        DeferredRelease::Image { image: self.image, allocation: self.allocation }
    }
}

/// Layout a texture returns to after each command
pub(crate) fn resting_layout(usage: TextureUsageFlags, format: Format) -> vk::ImageLayout {
    if usage.contains(TextureUsageFlags::UNORDERED_ACCESS) {
        vk::ImageLayout::GENERAL
    } else if usage.contains(TextureUsageFlags::SHADER_RESOURCE) {
        if format.is_depth() {
            vk::ImageLayout::DEPTH_STENCIL_READ_ONLY_OPTIMAL
        } else {
            vk::ImageLayout::SHADER_READ_ONLY_OPTIMAL
        }
    } else if usage.contains(TextureUsageFlags::DEPTH_STENCIL) {
        vk::ImageLayout::DEPTH_STENCIL_ATTACHMENT_OPTIMAL
    } else if usage.contains(TextureUsageFlags::RENDER_TARGET) {
        vk::ImageLayout::COLOR_ATTACHMENT_OPTIMAL
    } else {
        vk::ImageLayout::GENERAL
    }
}

/// Vulkan image usage of a GAL texture (always a copy source and destination)
pub(crate) fn image_usage_to_vk(usage: TextureUsageFlags) -> vk::ImageUsageFlags {
    let mut flags = vk::ImageUsageFlags::TRANSFER_SRC | vk::ImageUsageFlags::TRANSFER_DST;
    if usage.contains(TextureUsageFlags::SHADER_RESOURCE) {
        flags |= vk::ImageUsageFlags::SAMPLED;
    }
    if usage.contains(TextureUsageFlags::RENDER_TARGET) {
        flags |= vk::ImageUsageFlags::COLOR_ATTACHMENT;
    }
    if usage.contains(TextureUsageFlags::DEPTH_STENCIL) {
        flags |= vk::ImageUsageFlags::DEPTH_STENCIL_ATTACHMENT;
    }
    if usage.contains(TextureUsageFlags::UNORDERED_ACCESS) {
        flags |= vk::ImageUsageFlags::STORAGE;
    }
    flags
}

/// Format capabilities a texture needs for its usage
pub(crate) fn required_support(usage: TextureUsageFlags) -> FormatSupport {
    let mut required = FormatSupport::empty();
    if usage.contains(TextureUsageFlags::SHADER_RESOURCE) {
        required |= FormatSupport::SAMPLED;
    }
    if usage.contains(TextureUsageFlags::RENDER_TARGET) {
        required |= FormatSupport::RENDER_TARGET;
    }
    if usage.contains(TextureUsageFlags::DEPTH_STENCIL) {
        required |= FormatSupport::DEPTH_STENCIL;
    }
    if usage.contains(TextureUsageFlags::UNORDERED_ACCESS) {
        required |= FormatSupport::UNORDERED_ACCESS;
    }
    required
}

/// Image view type for a range of layers
///
/// `cube` views are only produced for sampling whole cubes.
pub(crate) fn image_view_type(texture_type: TextureType, layer_count: u32, cube: bool) -> vk::ImageViewType {
    match texture_type {
        TextureType::Texture1D if layer_count > 1 => vk::ImageViewType::TYPE_1D_ARRAY,
        TextureType::Texture1D => vk::ImageViewType::TYPE_1D,
        TextureType::Texture3D => vk::ImageViewType::TYPE_3D,
        TextureType::TextureCube if cube && layer_count == 6 => vk::ImageViewType::CUBE,
        TextureType::TextureCube if cube && layer_count % 6 == 0 => vk::ImageViewType::CUBE_ARRAY,
        TextureType::Texture2D | TextureType::TextureCube if layer_count > 1 => vk::ImageViewType::TYPE_2D_ARRAY,
        TextureType::Texture2D | TextureType::TextureCube => vk::ImageViewType::TYPE_2D,
    }
}

/// Create a texture, upload its initial data and move it to its resting layout
pub(crate) fn create_texture(
    ctx: &GpuContext,
    staging: &mut StagingBufferPool,
    layouts: &mut LayoutTracker,
    desc: &TextureCreationDescription,
    initial_data: Option<&[u8]>,
) -> Result<Texture> {
    if initial_data.is_some() && desc.format.has_stencil() {
        engine_bail!(SOURCE, Error::UnsupportedFormat =>
            "Initial data for {:?} (depth and stencil planes are uploaded separately)", desc.format);
    }

    let vk_format = format_to_vk(desc.format);
    let (image_type, mut flags) = match desc.texture_type {
        TextureType::Texture1D => (vk::ImageType::TYPE_1D, vk::ImageCreateFlags::empty()),
        TextureType::Texture2D => (vk::ImageType::TYPE_2D, vk::ImageCreateFlags::empty()),
        TextureType::Texture3D => (vk::ImageType::TYPE_3D, vk::ImageCreateFlags::empty()),
        TextureType::TextureCube => (vk::ImageType::TYPE_2D, vk::ImageCreateFlags::CUBE_COMPATIBLE),
    };
    if !desc.format.is_depth() {
        flags |= vk::ImageCreateFlags::MUTABLE_FORMAT;
    }
    if desc.texture_type == TextureType::Texture3D && desc.usage.contains(TextureUsageFlags::RENDER_TARGET) {
        flags |= vk::ImageCreateFlags::TYPE_2D_ARRAY_COMPATIBLE;
    }

    let extent = vk::Extent3D { width: desc.width, height: desc.height, depth: desc.depth };
    let array_layers = desc.layer_count();
    let samples = sample_count_to_vk(desc.sample_count);

    let (image, allocation) = unsafe {
        let create_info = vk::ImageCreateInfo::default()
            .flags(flags)
            .image_type(image_type)
            .format(vk_format)
            .extent(extent)
            .mip_levels(desc.mip_levels)
            .array_layers(array_layers)
            .samples(samples)
            .tiling(vk::ImageTiling::OPTIMAL)
            .usage(image_usage_to_vk(desc.usage))
            .sharing_mode(vk::SharingMode::EXCLUSIVE)
            .initial_layout(vk::ImageLayout::UNDEFINED);
        let image = ctx.device.create_image(&create_info, None).map_err(|e| {
            vk_error(&format!("Failed to create {}x{} {:?} texture", desc.width, desc.height, desc.format), e)
        })?;

        let requirements = ctx.device.get_image_memory_requirements(image);
        let allocation = match ctx.allocate("texture", requirements, MemoryLocation::GpuOnly, false) {
            Ok(allocation) => allocation,
            Err(e) => {
                ctx.device.destroy_image(image, None);
                return Err(e);
            }
        };
        if let Err(e) = ctx.device.bind_image_memory(image, allocation.memory(), allocation.offset()) {
            ctx.free(allocation);
            ctx.device.destroy_image(image, None);
            return Err(vk_error("Failed to bind texture memory", e));
        }
        (image, allocation)
    };

    let texture = Texture {
        image,
        allocation: Some(allocation),
        format: desc.format,
        vk_format,
        aspect: aspect_mask(desc.format),
        extent,
        mip_levels: desc.mip_levels,
        array_layers,
        samples,
        resting_layout: resting_layout(desc.usage, desc.format),
    };

    layouts.register(image, texture.mip_levels, texture.array_layers, vk::ImageLayout::UNDEFINED);
    if let Err(e) = initialize_contents(ctx, staging, layouts, &texture, desc, initial_data) {
        layouts.forget(image);
        unsafe { texture.into_release().release(ctx) };
        return Err(e);
    }
    Ok(texture)
}

/// Copy packed initial data into every sub-resource, then settle the layout
fn initialize_contents(
    ctx: &GpuContext,
    staging: &mut StagingBufferPool,
    layouts: &mut LayoutTracker,
    texture: &Texture,
    desc: &TextureCreationDescription,
    initial_data: Option<&[u8]>,
) -> Result<()> {
    let Some(data) = initial_data else {
        let transitions = layouts.transition(texture.image, texture.full_range(), texture.resting_layout);
        return ctx.one_shot(|command_buffer| unsafe {
            record_transitions(&ctx.device, command_buffer, texture.image, texture.aspect, &transitions);
        });
    };

    let range = staging.allocate_buffer(16, data.len() as u64)?;
    let result = staging.write(&range, data).and_then(|_| {
        let regions: Vec<vk::BufferImageCopy> = desc
            .subresource_layouts()
            .iter()
            .map(|layout| vk::BufferImageCopy {
                buffer_offset: range.offset() + layout.offset,
                buffer_row_length: 0,
                buffer_image_height: 0,
                image_subresource: vk::ImageSubresourceLayers {
                    aspect_mask: texture.aspect,
                    mip_level: layout.mip_level,
                    base_array_layer: layout.array_layer,
                    layer_count: 1,
                },
                image_offset: vk::Offset3D::default(),
                image_extent: vk::Extent3D { width: layout.width, height: layout.height, depth: layout.depth },
            })
            .collect();

        let to_transfer = layouts.transition(
            texture.image,
            texture.full_range(),
            vk::ImageLayout::TRANSFER_DST_OPTIMAL,
        );
        let to_resting = layouts.transition(texture.image, texture.full_range(), texture.resting_layout);
        ctx.one_shot(|command_buffer| unsafe {
            record_transitions(&ctx.device, command_buffer, texture.image, texture.aspect, &to_transfer);
            ctx.device.cmd_copy_buffer_to_image(
                command_buffer,
                range.buffer(),
                texture.image,
                vk::ImageLayout::TRANSFER_DST_OPTIMAL,
                &regions,
            );
            record_transitions(&ctx.device, command_buffer, texture.image, texture.aspect, &to_resting);
        })
    });
    staging.release_buffer(range);
    result
}

#[cfg(test)]
#[path = "vulkan_texture_tests.rs"]
mod tests;
