//! View descriptors
//!
//! Views reference their backing resource by handle. They do not own it; the
//! device counts live views per resource and refuses to destroy a resource
//! that still has explicit views.

use crate::error::{Error, Result};
use crate::handle::{BufferHandle, TextureHandle};
use super::buffer::BufferCreationDescription;
use super::format::Format;
use super::texture::{TextureCreationDescription, TextureType};

/// Sentinel meaning "up to the last mip / layer"
pub const REMAINING: u32 = u32::MAX;

/// Mip and layer range of a texture view
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TextureSubresourceRange {
    pub base_mip: u32,
    /// Number of mips, or `REMAINING`
    pub mip_count: u32,
    pub base_layer: u32,
    /// Number of layers, or `REMAINING`
    pub layer_count: u32,
}

impl TextureSubresourceRange {
    /// Every mip and layer
    pub const ALL: Self = Self {
        base_mip: 0,
        mip_count: REMAINING,
        base_layer: 0,
        layer_count: REMAINING,
    };

    /// Replace `REMAINING` with concrete counts and check bounds
    pub fn resolve(&self, texture: &TextureCreationDescription) -> Result<Self> {
        let layers = texture.layer_count();
        if self.base_mip >= texture.mip_levels || self.base_layer >= layers {
            return Err(Error::InvalidResource(format!(
                "view range starts at mip {} layer {}, texture has {} mips and {} layers",
                self.base_mip, self.base_layer, texture.mip_levels, layers
            )));
        }
        let mip_count = if self.mip_count == REMAINING {
            texture.mip_levels - self.base_mip
        } else {
            self.mip_count
        };
        let layer_count = if self.layer_count == REMAINING {
            layers - self.base_layer
        } else {
            self.layer_count
        };
        if mip_count == 0
            || layer_count == 0
            || self.base_mip.checked_add(mip_count).map_or(true, |end| end > texture.mip_levels)
            || self.base_layer.checked_add(layer_count).map_or(true, |end| end > layers)
        {
            return Err(Error::InvalidResource(format!(
                "view range mips {}+{} layers {}+{} out of bounds",
                self.base_mip, mip_count, self.base_layer, layer_count
            )));
        }
        Ok(Self {
            base_mip: self.base_mip,
            mip_count,
            base_layer: self.base_layer,
            layer_count,
        })
    }
}

/// Byte range of a buffer view
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct BufferRange {
    pub offset: u64,
    /// Size in bytes, or `u64::MAX` for the rest of the buffer
    pub size: u64,
}

impl BufferRange {
    pub const WHOLE: Self = Self { offset: 0, size: u64::MAX };

    /// Replace `u64::MAX` with the concrete size and check bounds
    pub fn resolve(&self, buffer: &BufferCreationDescription) -> Result<Self> {
        if self.offset >= buffer.total_size {
            return Err(Error::InvalidResource(format!(
                "view offset {} beyond buffer size {}",
                self.offset, buffer.total_size
            )));
        }
        let size = if self.size == u64::MAX {
            buffer.total_size - self.offset
        } else {
            self.size
        };
        if size == 0 || self.offset.checked_add(size).map_or(true, |end| end > buffer.total_size) {
            return Err(Error::InvalidResource(format!(
                "view range {}+{} out of buffer size {}",
                self.offset, size, buffer.total_size
            )));
        }
        let stride = if buffer.struct_size > 0 {
            buffer.struct_size as u64
        } else if let Some(format) = buffer.format {
            format.bytes_per_block() as u64
        } else {
            4
        };
        if self.offset % stride != 0 || size % stride != 0 {
            return Err(Error::InvalidResource(format!(
                "view range {}+{} is not aligned to element size {}",
                self.offset, size, stride
            )));
        }
        Ok(Self { offset: self.offset, size })
    }
}

/// Resource a shader view points at
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ViewResource {
    Texture {
        texture: TextureHandle,
        range: TextureSubresourceRange,
    },
    Buffer {
        buffer: BufferHandle,
        range: BufferRange,
    },
}

impl ViewResource {
    /// Whole texture
    pub fn texture(texture: TextureHandle) -> Self {
        ViewResource::Texture { texture, range: TextureSubresourceRange::ALL }
    }

    /// Whole buffer
    pub fn buffer(buffer: BufferHandle) -> Self {
        ViewResource::Buffer { buffer, range: BufferRange::WHOLE }
    }
}

/// Descriptor for a shader-readable view
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ResourceViewDescription {
    pub resource: ViewResource,
    /// Reinterpretation format (`None` keeps the resource format)
    pub format: Option<Format>,
}

/// Descriptor for a color or depth attachment view
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct RenderTargetViewDescription {
    pub texture: TextureHandle,
    pub format: Option<Format>,
    pub mip_level: u32,
    pub base_layer: u32,
    /// Number of layers, or `REMAINING`
    pub layer_count: u32,
}

impl RenderTargetViewDescription {
    /// Mip 0, every layer
    pub fn new(texture: TextureHandle) -> Self {
        Self {
            texture,
            format: None,
            mip_level: 0,
            base_layer: 0,
            layer_count: REMAINING,
        }
    }

    /// Range covered by this attachment
    pub fn subresource_range(&self) -> TextureSubresourceRange {
        TextureSubresourceRange {
            base_mip: self.mip_level,
            mip_count: 1,
            base_layer: self.base_layer,
            layer_count: self.layer_count,
        }
    }
}

/// Descriptor for a read/write (storage) view
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct UnorderedAccessViewDescription {
    pub resource: ViewResource,
    pub format: Option<Format>,
}

// ===== VALIDATION AGAINST THE BACKING RESOURCE =====

/// Formats must stay in the same size class to be reinterpreted
fn check_reinterpret(resource_format: Format, view_format: Option<Format>) -> Result<Format> {
    match view_format {
        None => Ok(resource_format),
        Some(format) if format == resource_format => Ok(format),
        Some(format) => {
            if format.bytes_per_block() != resource_format.bytes_per_block()
                || format.is_compressed() != resource_format.is_compressed()
                || format.is_depth()
                || resource_format.is_depth()
            {
                Err(Error::InvalidResource(format!(
                    "{:?} cannot be viewed as {:?}",
                    resource_format, format
                )))
            } else {
                Ok(format)
            }
        }
    }
}

/// Check a texture shader view and return its effective format and range
pub(crate) fn validate_texture_view(
    texture: &TextureCreationDescription,
    range: &TextureSubresourceRange,
    format: Option<Format>,
) -> Result<(Format, TextureSubresourceRange)> {
    use super::texture::TextureUsageFlags;
    if !texture.usage.contains(TextureUsageFlags::SHADER_RESOURCE) {
        return Err(Error::InvalidResource(
            "texture was not created with shader-resource usage".to_string(),
        ));
    }
    let format = check_reinterpret(texture.format, format)?;
    let range = range.resolve(texture)?;
    Ok((format, range))
}

/// Check a buffer shader view
pub(crate) fn validate_buffer_view(
    buffer: &BufferCreationDescription,
    range: &BufferRange,
    unordered: bool,
) -> Result<BufferRange> {
    use super::buffer::BufferUsageFlags;
    let required = if unordered {
        BufferUsageFlags::UNORDERED_ACCESS
    } else {
        BufferUsageFlags::SHADER_RESOURCE
    };
    if !buffer.usage.contains(required) {
        return Err(Error::InvalidResource(format!(
            "buffer was not created with {:?} usage",
            required
        )));
    }
    range.resolve(buffer)
}

/// Check a render target view against its texture
pub(crate) fn validate_render_target_view(
    texture: &TextureCreationDescription,
    desc: &RenderTargetViewDescription,
) -> Result<(Format, TextureSubresourceRange)> {
    use super::texture::TextureUsageFlags;
    if !texture
        .usage
        .intersects(TextureUsageFlags::RENDER_TARGET | TextureUsageFlags::DEPTH_STENCIL)
    {
        return Err(Error::InvalidResource(
            "texture was not created with render-target or depth-stencil usage".to_string(),
        ));
    }
    if texture.texture_type == TextureType::Texture3D && desc.layer_count != 1 && desc.layer_count != REMAINING {
        return Err(Error::InvalidResource("3D render target views cover one slice set".to_string()));
    }
    let format = check_reinterpret(texture.format, desc.format)?;
    let range = desc.subresource_range().resolve(texture)?;
    Ok((format, range))
}

/// Check an unordered access texture view (single mip)
pub(crate) fn validate_texture_uav(
    texture: &TextureCreationDescription,
    range: &TextureSubresourceRange,
    format: Option<Format>,
) -> Result<(Format, TextureSubresourceRange)> {
    use super::texture::TextureUsageFlags;
    if !texture.usage.contains(TextureUsageFlags::UNORDERED_ACCESS) {
        return Err(Error::InvalidResource(
            "texture was not created with unordered-access usage".to_string(),
        ));
    }
    let format = check_reinterpret(texture.format, format)?;
    let range = range.resolve(texture)?;
    if range.mip_count != 1 {
        return Err(Error::InvalidResource(
            "unordered access views cover exactly one mip".to_string(),
        ));
    }
    Ok((format, range))
}

#[cfg(test)]
#[path = "views_tests.rs"]
mod tests;
