//! Texture descriptor and initial data layout

use bitflags::bitflags;
use crate::error::{Error, Result};
use super::buffer::ResourceAccess;
use super::format::Format;

/// Texture dimensionality
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TextureType {
    Texture1D,
    Texture2D,
    Texture3D,
    /// Six 2D faces per array element
    TextureCube,
}

bitflags! {
    /// How a texture will be bound
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct TextureUsageFlags: u32 {
        const SHADER_RESOURCE = 1 << 0;
        const RENDER_TARGET = 1 << 1;
        const DEPTH_STENCIL = 1 << 2;
        const UNORDERED_ACCESS = 1 << 3;
        const COPY_SRC = 1 << 4;
        const COPY_DST = 1 << 5;
    }
}

/// Descriptor for creating a texture
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct TextureCreationDescription {
    pub texture_type: TextureType,
    pub format: Format,
    pub width: u32,
    /// 1 for 1D textures
    pub height: u32,
    /// Greater than 1 only for 3D textures
    pub depth: u32,
    /// Array elements (cubes for `TextureCube`)
    pub array_size: u32,
    pub mip_levels: u32,
    pub sample_count: u32,
    pub usage: TextureUsageFlags,
    pub access: ResourceAccess,
}

/// Location of one sub-resource inside tightly packed initial data
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SubResourceLayout {
    pub mip_level: u32,
    pub array_layer: u32,
    pub offset: u64,
    pub row_pitch: u64,
    pub slice_pitch: u64,
    pub size: u64,
    pub width: u32,
    pub height: u32,
    pub depth: u32,
}

/// Extent of a mip level (never smaller than 1)
pub fn mip_extent(base: u32, mip_level: u32) -> u32 {
    (base >> mip_level).max(1)
}

impl TextureCreationDescription {
    /// Single-mip 2D texture
    pub fn texture_2d(width: u32, height: u32, format: Format, usage: TextureUsageFlags) -> Self {
        Self {
            texture_type: TextureType::Texture2D,
            format,
            width,
            height,
            depth: 1,
            array_size: 1,
            mip_levels: 1,
            sample_count: 1,
            usage,
            access: ResourceAccess::Default,
        }
    }

    /// Number of 2D layers (cube faces count individually)
    pub fn layer_count(&self) -> u32 {
        match self.texture_type {
            TextureType::TextureCube => self.array_size * 6,
            _ => self.array_size,
        }
    }

    /// Length of the full mip chain for this size
    pub fn max_mip_levels(&self) -> u32 {
        let largest = self.width.max(self.height).max(self.depth).max(1);
        32 - largest.leading_zeros()
    }

    /// Layout of every sub-resource in packed initial data, layer-major then mip
    pub fn subresource_layouts(&self) -> Vec<SubResourceLayout> {
        let mut layouts = Vec::with_capacity((self.layer_count() * self.mip_levels) as usize);
        let mut offset = 0u64;
        for array_layer in 0..self.layer_count() {
            for mip_level in 0..self.mip_levels {
                let width = mip_extent(self.width, mip_level);
                let height = mip_extent(self.height, mip_level);
                let depth = mip_extent(self.depth, mip_level);
                let row_pitch = self.format.row_pitch(width);
                let slice_pitch = self.format.slice_pitch(width, height);
                let size = slice_pitch * depth as u64;
                layouts.push(SubResourceLayout {
                    mip_level,
                    array_layer,
                    offset,
                    row_pitch,
                    slice_pitch,
                    size,
                    width,
                    height,
                    depth,
                });
                offset += size;
            }
        }
        layouts
    }

    /// Byte size of packed data covering every sub-resource
    pub fn total_data_size(&self) -> u64 {
        self.subresource_layouts().iter().map(|l| l.size).sum()
    }

    /// Check the descriptor and the optional initial data
    pub fn validate(&self, initial_data: Option<&[u8]>) -> Result<()> {
        let invalid = |msg: String| Err(Error::InvalidResource(msg));

        if self.width == 0 || self.height == 0 || self.depth == 0 {
            return invalid(format!(
                "texture extent {}x{}x{} has a zero dimension",
                self.width, self.height, self.depth
            ));
        }
        if self.array_size == 0 {
            return invalid("texture array size must be at least 1".to_string());
        }
        match self.texture_type {
            TextureType::Texture1D if self.height != 1 || self.depth != 1 => {
                return invalid("1D texture must have height and depth 1".to_string());
            }
            TextureType::Texture2D if self.depth != 1 => {
                return invalid("2D texture must have depth 1".to_string());
            }
            TextureType::Texture3D if self.array_size != 1 => {
                return invalid("3D texture cannot be an array".to_string());
            }
            TextureType::TextureCube if self.width != self.height || self.depth != 1 => {
                return invalid("cube texture faces must be square with depth 1".to_string());
            }
            _ => {}
        }
        if self.mip_levels == 0 || self.mip_levels > self.max_mip_levels() {
            return invalid(format!(
                "mip level count {} outside 1..={}",
                self.mip_levels,
                self.max_mip_levels()
            ));
        }
        if !matches!(self.sample_count, 1 | 2 | 4 | 8 | 16) {
            return invalid(format!("unsupported sample count {}", self.sample_count));
        }
        if self.sample_count > 1 {
            if self.texture_type != TextureType::Texture2D || self.mip_levels != 1 {
                return invalid("multisampled textures must be 2D with a single mip".to_string());
            }
            if self.usage.contains(TextureUsageFlags::UNORDERED_ACCESS) {
                return invalid("multisampled textures cannot be unordered access".to_string());
            }
        }
        if self.usage.is_empty() {
            return invalid("texture usage flags are empty".to_string());
        }
        if self.usage.contains(TextureUsageFlags::DEPTH_STENCIL) {
            if !self.format.is_depth() {
                return invalid(format!("{:?} is not a depth format", self.format));
            }
            if self.texture_type == TextureType::Texture3D {
                return invalid("3D textures cannot be depth targets".to_string());
            }
        } else if self.format.is_depth() && !self.usage.contains(TextureUsageFlags::SHADER_RESOURCE) {
            return invalid(format!("{:?} texture needs depth-stencil usage", self.format));
        }
        if self.usage.contains(TextureUsageFlags::RENDER_TARGET)
            && (self.format.is_depth() || self.format.is_compressed())
        {
            return invalid(format!("{:?} cannot be a color render target", self.format));
        }
        if self.format.is_compressed() {
            if self.usage.intersects(TextureUsageFlags::UNORDERED_ACCESS) {
                return invalid("compressed textures cannot be unordered access".to_string());
            }
            if self.width % 4 != 0 || self.height % 4 != 0 {
                return invalid(format!(
                    "compressed texture size {}x{} is not a multiple of 4",
                    self.width, self.height
                ));
            }
        }
        match self.access {
            ResourceAccess::Immutable if initial_data.is_none() => {
                return invalid("immutable texture requires initial data".to_string());
            }
            ResourceAccess::Dynamic | ResourceAccess::Readback => {
                return invalid(format!("{:?} access is only supported for buffers", self.access));
            }
            _ => {}
        }
        if let Some(data) = initial_data {
            let expected = self.total_data_size();
            if data.len() as u64 != expected {
                return invalid(format!(
                    "initial data is {} bytes, texture sub-resources need {}",
                    data.len(),
                    expected
                ));
            }
            if self.sample_count > 1 {
                return invalid("multisampled textures cannot have initial data".to_string());
            }
        }
        Ok(())
    }
}

#[cfg(test)]
#[path = "texture_tests.rs"]
mod tests;
