//! Generation-checked resource handles
//!
//! Every resource created by a `Device` is addressed by a slotmap key. A key
//! carries a slot index and a version; destroying the resource bumps the
//! version, so every copy of the old key becomes stale and can never resolve
//! to a newer resource that reuses the slot.

use std::fmt;
use slotmap::{new_key_type, Key};

// ===== SLOT MAP KEYS =====

new_key_type! {
    /// Handle to a GPU buffer
    pub struct BufferHandle;
    /// Handle to a GPU texture
    pub struct TextureHandle;
    /// Handle to a shader-readable view of a texture or buffer
    pub struct ResourceViewHandle;
    /// Handle to a color or depth attachment view of a texture
    pub struct RenderTargetViewHandle;
    /// Handle to a read/write (storage) view of a texture or buffer
    pub struct UnorderedAccessViewHandle;
    /// Handle to a shader program
    pub struct ShaderHandle;
    /// Handle to a vertex input layout
    pub struct VertexDeclarationHandle;
    /// Handle to a deduplicated blend state
    pub struct BlendStateHandle;
    /// Handle to a deduplicated depth/stencil state
    pub struct DepthStencilStateHandle;
    /// Handle to a deduplicated rasterizer state
    pub struct RasterizerStateHandle;
    /// Handle to a deduplicated sampler state
    pub struct SamplerStateHandle;
    /// Handle to an occlusion query
    pub struct QueryHandle;
}

// ===== TIMESTAMP HANDLE =====

/// Handle to a GPU timestamp written during a frame
///
/// Timestamps are not resources: they live in a per-frame ring and are
/// identified by the frame that wrote them and their slot within that frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TimestampHandle {
    pub(crate) frame: u64,
    pub(crate) slot: u32,
}

impl TimestampHandle {
    /// Frame the timestamp was recorded in
    pub fn frame(&self) -> u64 {
        self.frame
    }

    /// Slot within that frame
    pub fn slot(&self) -> u32 {
        self.slot
    }
}

// ===== RESOURCE KIND =====

/// Resource type, used for statistics and diagnostics
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum ResourceKind {
    Buffer,
    Texture,
    ResourceView,
    RenderTargetView,
    UnorderedAccessView,
    Shader,
    VertexDeclaration,
    BlendState,
    DepthStencilState,
    RasterizerState,
    SamplerState,
    Query,
}

impl ResourceKind {
    /// Every kind, in release order used at shutdown (views before their resources)
    pub const ALL: [ResourceKind; 12] = [
        ResourceKind::Query,
        ResourceKind::ResourceView,
        ResourceKind::RenderTargetView,
        ResourceKind::UnorderedAccessView,
        ResourceKind::VertexDeclaration,
        ResourceKind::Shader,
        ResourceKind::BlendState,
        ResourceKind::DepthStencilState,
        ResourceKind::RasterizerState,
        ResourceKind::SamplerState,
        ResourceKind::Texture,
        ResourceKind::Buffer,
    ];
}

impl fmt::Display for ResourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}

// ===== ANY HANDLE =====

/// Type-erased resource handle
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AnyHandle {
    Buffer(BufferHandle),
    Texture(TextureHandle),
    ResourceView(ResourceViewHandle),
    RenderTargetView(RenderTargetViewHandle),
    UnorderedAccessView(UnorderedAccessViewHandle),
    Shader(ShaderHandle),
    VertexDeclaration(VertexDeclarationHandle),
    BlendState(BlendStateHandle),
    DepthStencilState(DepthStencilStateHandle),
    RasterizerState(RasterizerStateHandle),
    SamplerState(SamplerStateHandle),
    Query(QueryHandle),
}

impl AnyHandle {
    /// Resource type of the handle
    pub fn kind(&self) -> ResourceKind {
        match self {
            AnyHandle::Buffer(_) => ResourceKind::Buffer,
            AnyHandle::Texture(_) => ResourceKind::Texture,
            AnyHandle::ResourceView(_) => ResourceKind::ResourceView,
            AnyHandle::RenderTargetView(_) => ResourceKind::RenderTargetView,
            AnyHandle::UnorderedAccessView(_) => ResourceKind::UnorderedAccessView,
            AnyHandle::Shader(_) => ResourceKind::Shader,
            AnyHandle::VertexDeclaration(_) => ResourceKind::VertexDeclaration,
            AnyHandle::BlendState(_) => ResourceKind::BlendState,
            AnyHandle::DepthStencilState(_) => ResourceKind::DepthStencilState,
            AnyHandle::RasterizerState(_) => ResourceKind::RasterizerState,
            AnyHandle::SamplerState(_) => ResourceKind::SamplerState,
            AnyHandle::Query(_) => ResourceKind::Query,
        }
    }

    /// Whether the handle is the null key (never returned by a device)
    pub fn is_null(&self) -> bool {
        match self {
            AnyHandle::Buffer(h) => h.is_null(),
            AnyHandle::Texture(h) => h.is_null(),
            AnyHandle::ResourceView(h) => h.is_null(),
            AnyHandle::RenderTargetView(h) => h.is_null(),
            AnyHandle::UnorderedAccessView(h) => h.is_null(),
            AnyHandle::Shader(h) => h.is_null(),
            AnyHandle::VertexDeclaration(h) => h.is_null(),
            AnyHandle::BlendState(h) => h.is_null(),
            AnyHandle::DepthStencilState(h) => h.is_null(),
            AnyHandle::RasterizerState(h) => h.is_null(),
            AnyHandle::SamplerState(h) => h.is_null(),
            AnyHandle::Query(h) => h.is_null(),
        }
    }
}

macro_rules! impl_any_handle_from {
    ($($variant:ident => $handle:ty),* $(,)?) => {
        $(
            impl From<$handle> for AnyHandle {
                fn from(handle: $handle) -> Self {
                    AnyHandle::$variant(handle)
                }
            }
        )*
    };
}

impl_any_handle_from! {
    Buffer => BufferHandle,
    Texture => TextureHandle,
    ResourceView => ResourceViewHandle,
    RenderTargetView => RenderTargetViewHandle,
    UnorderedAccessView => UnorderedAccessViewHandle,
    Shader => ShaderHandle,
    VertexDeclaration => VertexDeclarationHandle,
    BlendState => BlendStateHandle,
    DepthStencilState => DepthStencilStateHandle,
    RasterizerState => RasterizerStateHandle,
    SamplerState => SamplerStateHandle,
    Query => QueryHandle,
}

#[cfg(test)]
#[path = "handle_tests.rs"]
mod tests;
