//! Fixed-function state descriptors
//!
//! State objects are deduplicated by the device, so every descriptor here is
//! `Eq + Hash`. Descriptors with float fields compare and hash the raw bits.

use std::hash::{Hash, Hasher};
use bitflags::bitflags;
use crate::error::{Error, Result};

/// Maximum number of simultaneously bound color targets
pub const MAX_RENDER_TARGETS: usize = 8;

/// Depth, stencil and sampler comparison
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ComparisonFunc {
    Never,
    Less,
    Equal,
    LessEqual,
    Greater,
    NotEqual,
    GreaterEqual,
    Always,
}

// ===== BLEND =====

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BlendFactor {
    Zero,
    One,
    SrcColor,
    InvSrcColor,
    SrcAlpha,
    InvSrcAlpha,
    DstColor,
    InvDstColor,
    DstAlpha,
    InvDstAlpha,
    SrcAlphaSaturate,
    /// Blend constant set with the blend state command
    BlendFactor,
    InvBlendFactor,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BlendOp {
    Add,
    Subtract,
    RevSubtract,
    Min,
    Max,
}

bitflags! {
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct ColorWriteMask: u8 {
        const RED = 1 << 0;
        const GREEN = 1 << 1;
        const BLUE = 1 << 2;
        const ALPHA = 1 << 3;
        const ALL = Self::RED.bits() | Self::GREEN.bits() | Self::BLUE.bits() | Self::ALPHA.bits();
    }
}

/// Blend equation of one color target
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct RenderTargetBlend {
    pub enabled: bool,
    pub src_color: BlendFactor,
    pub dst_color: BlendFactor,
    pub color_op: BlendOp,
    pub src_alpha: BlendFactor,
    pub dst_alpha: BlendFactor,
    pub alpha_op: BlendOp,
    pub write_mask: ColorWriteMask,
}

impl Default for RenderTargetBlend {
    fn default() -> Self {
        Self {
            enabled: false,
            src_color: BlendFactor::One,
            dst_color: BlendFactor::Zero,
            color_op: BlendOp::Add,
            src_alpha: BlendFactor::One,
            dst_alpha: BlendFactor::Zero,
            alpha_op: BlendOp::Add,
            write_mask: ColorWriteMask::ALL,
        }
    }
}

impl RenderTargetBlend {
    /// Classic `src * a + dst * (1 - a)`
    pub fn alpha_blending() -> Self {
        Self {
            enabled: true,
            src_color: BlendFactor::SrcAlpha,
            dst_color: BlendFactor::InvSrcAlpha,
            src_alpha: BlendFactor::One,
            dst_alpha: BlendFactor::InvSrcAlpha,
            ..Self::default()
        }
    }
}

/// Descriptor for a blend state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct BlendStateDescription {
    pub alpha_to_coverage: bool,
    /// Use every entry of `render_targets` instead of only the first
    pub independent_blend: bool,
    pub render_targets: [RenderTargetBlend; MAX_RENDER_TARGETS],
}

impl BlendStateDescription {
    /// Blend equation used for a color target
    pub fn target(&self, index: usize) -> &RenderTargetBlend {
        if self.independent_blend {
            &self.render_targets[index]
        } else {
            &self.render_targets[0]
        }
    }
}

// ===== DEPTH / STENCIL =====

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StencilOp {
    Keep,
    Zero,
    Replace,
    IncrementClamp,
    DecrementClamp,
    Invert,
    IncrementWrap,
    DecrementWrap,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct StencilFace {
    pub fail_op: StencilOp,
    pub depth_fail_op: StencilOp,
    pub pass_op: StencilOp,
    pub func: ComparisonFunc,
}

impl Default for StencilFace {
    fn default() -> Self {
        Self {
            fail_op: StencilOp::Keep,
            depth_fail_op: StencilOp::Keep,
            pass_op: StencilOp::Keep,
            func: ComparisonFunc::Always,
        }
    }
}

/// Descriptor for a depth/stencil state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct DepthStencilStateDescription {
    pub depth_test: bool,
    pub depth_write: bool,
    pub depth_func: ComparisonFunc,
    pub stencil_enable: bool,
    pub stencil_read_mask: u8,
    pub stencil_write_mask: u8,
    pub front: StencilFace,
    pub back: StencilFace,
}

impl Default for DepthStencilStateDescription {
    fn default() -> Self {
        Self {
            depth_test: true,
            depth_write: true,
            depth_func: ComparisonFunc::Less,
            stencil_enable: false,
            stencil_read_mask: 0xFF,
            stencil_write_mask: 0xFF,
            front: StencilFace::default(),
            back: StencilFace::default(),
        }
    }
}

impl DepthStencilStateDescription {
    pub fn validate(&self) -> Result<()> {
        if self.depth_write && !self.depth_test {
            return Err(Error::InvalidResource(
                "depth writes require the depth test to be enabled".to_string(),
            ));
        }
        Ok(())
    }
}

// ===== RASTERIZER =====

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FillMode {
    Solid,
    Wireframe,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CullMode {
    None,
    Front,
    Back,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FrontFace {
    CounterClockwise,
    Clockwise,
}

/// Descriptor for a rasterizer state
#[derive(Debug, Clone, Copy)]
pub struct RasterizerStateDescription {
    pub fill_mode: FillMode,
    pub cull_mode: CullMode,
    pub front_face: FrontFace,
    pub depth_bias: i32,
    pub depth_bias_clamp: f32,
    pub slope_scaled_depth_bias: f32,
    pub depth_clip: bool,
    pub scissor: bool,
}

impl Default for RasterizerStateDescription {
    fn default() -> Self {
        Self {
            fill_mode: FillMode::Solid,
            cull_mode: CullMode::Back,
            front_face: FrontFace::CounterClockwise,
            depth_bias: 0,
            depth_bias_clamp: 0.0,
            slope_scaled_depth_bias: 0.0,
            depth_clip: true,
            scissor: false,
        }
    }
}

impl RasterizerStateDescription {
    fn key(&self) -> (FillMode, CullMode, FrontFace, i32, u32, u32, bool, bool) {
        (
            self.fill_mode,
            self.cull_mode,
            self.front_face,
            self.depth_bias,
            self.depth_bias_clamp.to_bits(),
            self.slope_scaled_depth_bias.to_bits(),
            self.depth_clip,
            self.scissor,
        )
    }

    pub fn validate(&self) -> Result<()> {
        if !self.depth_bias_clamp.is_finite() || !self.slope_scaled_depth_bias.is_finite() {
            return Err(Error::InvalidResource("depth bias values must be finite".to_string()));
        }
        Ok(())
    }
}

impl PartialEq for RasterizerStateDescription {
    fn eq(&self, other: &Self) -> bool {
        self.key() == other.key()
    }
}

impl Eq for RasterizerStateDescription {}

impl Hash for RasterizerStateDescription {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.key().hash(state);
    }
}

// ===== SAMPLER =====

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Filter {
    Point,
    Linear,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AddressMode {
    Wrap,
    Mirror,
    Clamp,
    Border,
    MirrorOnce,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BorderColor {
    TransparentBlack,
    OpaqueBlack,
    OpaqueWhite,
}

/// Descriptor for a sampler state
#[derive(Debug, Clone, Copy)]
pub struct SamplerStateDescription {
    pub min_filter: Filter,
    pub mag_filter: Filter,
    pub mip_filter: Filter,
    pub address_u: AddressMode,
    pub address_v: AddressMode,
    pub address_w: AddressMode,
    pub mip_lod_bias: f32,
    /// 1 disables anisotropic filtering
    pub max_anisotropy: u32,
    /// Comparison sampler for shadow lookups
    pub comparison: Option<ComparisonFunc>,
    pub border_color: BorderColor,
    pub min_lod: f32,
    pub max_lod: f32,
}

impl Default for SamplerStateDescription {
    fn default() -> Self {
        Self {
            min_filter: Filter::Linear,
            mag_filter: Filter::Linear,
            mip_filter: Filter::Linear,
            address_u: AddressMode::Wrap,
            address_v: AddressMode::Wrap,
            address_w: AddressMode::Wrap,
            mip_lod_bias: 0.0,
            max_anisotropy: 1,
            comparison: None,
            border_color: BorderColor::OpaqueBlack,
            min_lod: 0.0,
            max_lod: f32::MAX,
        }
    }
}

type SamplerKey = (
    [Filter; 3],
    [AddressMode; 3],
    u32,
    u32,
    Option<ComparisonFunc>,
    BorderColor,
    u32,
    u32,
);

impl SamplerStateDescription {
    fn key(&self) -> SamplerKey {
        (
            [self.min_filter, self.mag_filter, self.mip_filter],
            [self.address_u, self.address_v, self.address_w],
            self.mip_lod_bias.to_bits(),
            self.max_anisotropy,
            self.comparison,
            self.border_color,
            self.min_lod.to_bits(),
            self.max_lod.to_bits(),
        )
    }

    pub fn validate(&self) -> Result<()> {
        if !(1..=16).contains(&self.max_anisotropy) {
            return Err(Error::InvalidResource(format!(
                "max anisotropy {} outside 1..=16",
                self.max_anisotropy
            )));
        }
        if self.min_lod.is_nan() || self.max_lod.is_nan() || self.mip_lod_bias.is_nan() {
            return Err(Error::InvalidResource("sampler LOD values cannot be NaN".to_string()));
        }
        if self.min_lod > self.max_lod {
            return Err(Error::InvalidResource(format!(
                "min LOD {} greater than max LOD {}",
                self.min_lod, self.max_lod
            )));
        }
        Ok(())
    }
}

impl PartialEq for SamplerStateDescription {
    fn eq(&self, other: &Self) -> bool {
        self.key() == other.key()
    }
}

impl Eq for SamplerStateDescription {}

impl Hash for SamplerStateDescription {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.key().hash(state);
    }
}

#[cfg(test)]
#[path = "state_tests.rs"]
mod tests;
