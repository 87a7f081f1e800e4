//! Backend-agnostic texel and vertex attribute formats

use bitflags::bitflags;

/// Texel, vertex attribute and typed buffer format
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[allow(non_camel_case_types)]
pub enum Format {
    // 8-bit channels
    R8_UNORM,
    R8_SNORM,
    R8_UINT,
    R8G8_UNORM,
    R8G8_UINT,
    R8G8B8A8_UNORM,
    R8G8B8A8_SNORM,
    R8G8B8A8_UINT,
    R8G8B8A8_SRGB,
    B8G8R8A8_UNORM,
    B8G8R8A8_SRGB,

    // Packed
    R10G10B10A2_UNORM,
    R11G11B10_FLOAT,

    // 16-bit channels
    R16_FLOAT,
    R16_UINT,
    R16G16_FLOAT,
    R16G16_UNORM,
    R16G16B16A16_FLOAT,
    R16G16B16A16_UNORM,
    R16G16B16A16_UINT,

    // 32-bit channels
    R32_FLOAT,
    R32_UINT,
    R32_SINT,
    R32G32_FLOAT,
    R32G32_UINT,
    R32G32B32_FLOAT,
    R32G32B32_UINT,
    R32G32B32A32_FLOAT,
    R32G32B32A32_UINT,

    // Depth / stencil
    D16_UNORM,
    D24_UNORM_S8_UINT,
    D32_FLOAT,
    D32_FLOAT_S8_UINT,

    // Block compressed (4x4 blocks)
    BC1_UNORM,
    BC1_SRGB,
    BC3_UNORM,
    BC3_SRGB,
    BC4_UNORM,
    BC5_UNORM,
    BC6H_UFLOAT,
    BC7_UNORM,
    BC7_SRGB,
}

impl Format {
    /// Block dimensions in texels (1x1 for uncompressed formats)
    pub fn block_extent(&self) -> (u32, u32) {
        if self.is_compressed() {
            (4, 4)
        } else {
            (1, 1)
        }
    }

    /// Size in bytes of one block (one texel for uncompressed formats)
    pub fn bytes_per_block(&self) -> u32 {
        use Format::*;
        match self {
            R8_UNORM | R8_SNORM | R8_UINT => 1,
            R8G8_UNORM | R8G8_UINT | R16_FLOAT | R16_UINT | D16_UNORM => 2,
            R8G8B8A8_UNORM | R8G8B8A8_SNORM | R8G8B8A8_UINT | R8G8B8A8_SRGB
            | B8G8R8A8_UNORM | B8G8R8A8_SRGB | R10G10B10A2_UNORM | R11G11B10_FLOAT
            | R16G16_FLOAT | R16G16_UNORM | R32_FLOAT | R32_UINT | R32_SINT
            | D24_UNORM_S8_UINT | D32_FLOAT => 4,
            R16G16B16A16_FLOAT | R16G16B16A16_UNORM | R16G16B16A16_UINT
            | R32G32_FLOAT | R32G32_UINT | D32_FLOAT_S8_UINT => 8,
            R32G32B32_FLOAT | R32G32B32_UINT => 12,
            R32G32B32A32_FLOAT | R32G32B32A32_UINT => 16,
            BC1_UNORM | BC1_SRGB | BC4_UNORM => 8,
            BC3_UNORM | BC3_SRGB | BC5_UNORM | BC6H_UFLOAT | BC7_UNORM | BC7_SRGB => 16,
        }
    }

    /// Whether the format has a depth component
    pub fn is_depth(&self) -> bool {
        matches!(
            self,
            Format::D16_UNORM | Format::D24_UNORM_S8_UINT | Format::D32_FLOAT | Format::D32_FLOAT_S8_UINT
        )
    }

    /// Whether the format has a stencil component
    pub fn has_stencil(&self) -> bool {
        matches!(self, Format::D24_UNORM_S8_UINT | Format::D32_FLOAT_S8_UINT)
    }

    pub fn is_srgb(&self) -> bool {
        matches!(
            self,
            Format::R8G8B8A8_SRGB | Format::B8G8R8A8_SRGB | Format::BC1_SRGB | Format::BC3_SRGB | Format::BC7_SRGB
        )
    }

    pub fn is_compressed(&self) -> bool {
        use Format::*;
        matches!(
            self,
            BC1_UNORM | BC1_SRGB | BC3_UNORM | BC3_SRGB | BC4_UNORM | BC5_UNORM | BC6H_UFLOAT | BC7_UNORM | BC7_SRGB
        )
    }

    /// Whether the format can be used as a vertex attribute
    pub fn is_vertex_format(&self) -> bool {
        !self.is_depth() && !self.is_compressed() && !self.is_srgb()
    }

    /// Size in bytes of one row of blocks for a surface `width` texels wide
    pub fn row_pitch(&self, width: u32) -> u64 {
        let (block_w, _) = self.block_extent();
        let blocks = width.div_ceil(block_w).max(1);
        blocks as u64 * self.bytes_per_block() as u64
    }

    /// Size in bytes of a `width` x `height` surface
    pub fn slice_pitch(&self, width: u32, height: u32) -> u64 {
        let (_, block_h) = self.block_extent();
        let rows = height.div_ceil(block_h).max(1);
        self.row_pitch(width) * rows as u64
    }
}

bitflags! {
    /// What a backend can do with a format
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct FormatSupport: u32 {
        const SAMPLED = 1 << 0;
        const RENDER_TARGET = 1 << 1;
        const BLENDABLE = 1 << 2;
        const DEPTH_STENCIL = 1 << 3;
        const UNORDERED_ACCESS = 1 << 4;
        const VERTEX_BUFFER = 1 << 5;
        const TYPED_BUFFER = 1 << 6;
    }
}

#[cfg(test)]
#[path = "format_tests.rs"]
mod tests;
