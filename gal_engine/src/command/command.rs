/// Recorded GPU commands and the value types they carry.
///
/// Commands reference resources by handle only. The device checks every
/// referenced handle at submit time and the backend resolves them to native
/// objects while translating.

use glam::Vec4;
use crate::handle::*;
use crate::resource::IndexType;

/// Constant buffer slots per pipeline
pub const MAX_CONSTANT_BUFFER_SLOTS: u32 = 14;
/// Shader resource view slots per pipeline
pub const MAX_RESOURCE_VIEW_SLOTS: u32 = 64;
/// Sampler slots per pipeline
pub const MAX_SAMPLER_SLOTS: u32 = 16;
/// Unordered access view slots per pipeline
pub const MAX_UNORDERED_ACCESS_SLOTS: u32 = 8;

// ===== FIXED-FUNCTION VALUES =====

/// Viewport dimensions and depth range
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Viewport {
    pub x: f32,
    pub y: f32,
    pub width: f32,
    pub height: f32,
    pub min_depth: f32,
    pub max_depth: f32,
}

impl Viewport {
    /// Full-size viewport with the [0, 1] depth range
    pub fn new(width: f32, height: f32) -> Self {
        Self { x: 0.0, y: 0.0, width, height, min_depth: 0.0, max_depth: 1.0 }
    }
}

/// 2D rectangle
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Rect2D {
    pub x: i32,
    pub y: i32,
    pub width: u32,
    pub height: u32,
}

/// Primitive assembly
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PrimitiveTopology {
    PointList,
    LineList,
    LineStrip,
    TriangleList,
    TriangleStrip,
    /// Tessellation patches with the given control point count
    PatchList(u32),
}

// ===== RENDERING SETUP =====

/// What happens to an attachment when a pass begins
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LoadOp {
    Load,
    Clear,
    DontCare,
}

/// What happens to an attachment when a pass ends
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StoreOp {
    Store,
    DontCare,
}

/// Color attachment of a rendering pass
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ColorAttachment {
    pub view: RenderTargetViewHandle,
    pub load_op: LoadOp,
    pub store_op: StoreOp,
    pub clear_color: Vec4,
}

impl ColorAttachment {
    /// Clear to `color`, then store
    pub fn clear(view: RenderTargetViewHandle, color: Vec4) -> Self {
        Self { view, load_op: LoadOp::Clear, store_op: StoreOp::Store, clear_color: color }
    }

    /// Keep previous content, then store
    pub fn load(view: RenderTargetViewHandle) -> Self {
        Self { view, load_op: LoadOp::Load, store_op: StoreOp::Store, clear_color: Vec4::ZERO }
    }
}

/// Depth/stencil attachment of a rendering pass
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DepthStencilAttachment {
    pub view: RenderTargetViewHandle,
    pub depth_load_op: LoadOp,
    pub depth_store_op: StoreOp,
    pub clear_depth: f32,
    pub stencil_load_op: LoadOp,
    pub stencil_store_op: StoreOp,
    pub clear_stencil: u8,
    /// Bound for depth testing only (can be sampled in the same pass)
    pub read_only: bool,
}

impl DepthStencilAttachment {
    /// Clear depth to `depth` and stencil to 0, store both
    pub fn clear(view: RenderTargetViewHandle, depth: f32) -> Self {
        Self {
            view,
            depth_load_op: LoadOp::Clear,
            depth_store_op: StoreOp::Store,
            clear_depth: depth,
            stencil_load_op: LoadOp::Clear,
            stencil_store_op: StoreOp::Store,
            clear_stencil: 0,
            read_only: false,
        }
    }
}

/// Attachments of a rendering pass
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RenderingSetup {
    pub color_attachments: Vec<ColorAttachment>,
    pub depth_stencil: Option<DepthStencilAttachment>,
    /// Area to render into (`None` = full attachment size)
    pub render_area: Option<Rect2D>,
}

// ===== TRANSFER VALUES =====

/// Byte range copied between two buffers
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct BufferCopyRegion {
    pub src_offset: u64,
    pub dst_offset: u64,
    pub size: u64,
}

/// Region of one texture sub-resource
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TextureRegion {
    pub mip_level: u32,
    pub array_layer: u32,
    pub offset: [u32; 3],
    pub extent: [u32; 3],
}

// ===== COMMAND =====

/// One recorded GPU command
#[derive(Debug, Clone, PartialEq)]
pub enum Command {
    // Passes
    BeginRendering(RenderingSetup),
    EndRendering,
    BeginCompute,
    EndCompute,

    // Pipeline state
    SetShader(ShaderHandle),
    SetVertexDeclaration(VertexDeclarationHandle),
    SetPrimitiveTopology(PrimitiveTopology),
    SetVertexBuffer { slot: u32, buffer: BufferHandle, offset: u64 },
    SetIndexBuffer { buffer: BufferHandle, offset: u64, index_type: IndexType },
    SetConstantBuffer { slot: u32, buffer: BufferHandle, offset: u64, size: u64 },
    SetResourceView { slot: u32, view: ResourceViewHandle },
    SetUnorderedAccessView { slot: u32, view: UnorderedAccessViewHandle },
    SetSampler { slot: u32, sampler: SamplerStateHandle },
    SetBlendState { state: BlendStateHandle, blend_factor: Vec4, sample_mask: u32 },
    SetDepthStencilState { state: DepthStencilStateHandle, stencil_ref: u8 },
    SetRasterizerState(RasterizerStateHandle),
    SetViewport(Viewport),
    SetScissor(Rect2D),

    // Draw / dispatch
    Draw { vertex_count: u32, first_vertex: u32 },
    DrawInstanced { vertex_count: u32, instance_count: u32, first_vertex: u32, first_instance: u32 },
    DrawIndexed { index_count: u32, first_index: u32, base_vertex: i32 },
    DrawIndexedInstanced {
        index_count: u32,
        instance_count: u32,
        first_index: u32,
        base_vertex: i32,
        first_instance: u32,
    },
    Dispatch { x: u32, y: u32, z: u32 },

    // Transfer
    CopyBuffer { src: BufferHandle, dst: BufferHandle },
    CopyBufferRegion { src: BufferHandle, dst: BufferHandle, region: BufferCopyRegion },
    UpdateBuffer { buffer: BufferHandle, offset: u64, data: Vec<u8> },
    CopyTexture { src: TextureHandle, dst: TextureHandle },
    UpdateTexture { texture: TextureHandle, region: TextureRegion, data: Vec<u8> },
    GenerateMipMaps(TextureHandle),

    // Queries and timestamps
    BeginQuery(QueryHandle),
    EndQuery(QueryHandle),
    InsertTimestamp { slot: u32 },

    // Debug markers
    PushMarker(String),
    PopMarker,
    InsertEventMarker(String),
}

impl Command {
    /// Call `f` for every resource handle the command references
    pub fn for_each_handle(&self, mut f: impl FnMut(AnyHandle)) {
        match self {
            Command::BeginRendering(setup) => {
                for attachment in &setup.color_attachments {
                    f(attachment.view.into());
                }
                if let Some(depth) = &setup.depth_stencil {
                    f(depth.view.into());
                }
            }
            Command::SetShader(h) => f((*h).into()),
            Command::SetVertexDeclaration(h) => f((*h).into()),
            Command::SetVertexBuffer { buffer, .. }
            | Command::SetIndexBuffer { buffer, .. }
            | Command::SetConstantBuffer { buffer, .. }
            | Command::UpdateBuffer { buffer, .. } => f((*buffer).into()),
            Command::SetResourceView { view, .. } => f((*view).into()),
            Command::SetUnorderedAccessView { view, .. } => f((*view).into()),
            Command::SetSampler { sampler, .. } => f((*sampler).into()),
            Command::SetBlendState { state, .. } => f((*state).into()),
            Command::SetDepthStencilState { state, .. } => f((*state).into()),
            Command::SetRasterizerState(h) => f((*h).into()),
            Command::CopyBuffer { src, dst } | Command::CopyBufferRegion { src, dst, .. } => {
                f((*src).into());
                f((*dst).into());
            }
            Command::CopyTexture { src, dst } => {
                f((*src).into());
                f((*dst).into());
            }
            Command::UpdateTexture { texture, .. } | Command::GenerateMipMaps(texture) => {
                f((*texture).into())
            }
            Command::BeginQuery(h) | Command::EndQuery(h) => f((*h).into()),
            Command::EndRendering
            | Command::BeginCompute
            | Command::EndCompute
            | Command::SetPrimitiveTopology(_)
            | Command::SetViewport(_)
            | Command::SetScissor(_)
            | Command::Draw { .. }
            | Command::DrawInstanced { .. }
            | Command::DrawIndexed { .. }
            | Command::DrawIndexedInstanced { .. }
            | Command::Dispatch { .. }
            | Command::InsertTimestamp { .. }
            | Command::PushMarker(_)
            | Command::PopMarker
            | Command::InsertEventMarker(_) => {}
        }
    }

    pub fn is_draw(&self) -> bool {
        matches!(
            self,
            Command::Draw { .. }
                | Command::DrawInstanced { .. }
                | Command::DrawIndexed { .. }
                | Command::DrawIndexedInstanced { .. }
        )
    }
}
