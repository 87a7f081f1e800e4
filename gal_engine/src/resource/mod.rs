//! Resource descriptors and the generic resource record
//!
//! Descriptors are plain values consumed once by `Device::create_*` and stored
//! in the resulting `Resource` for introspection.

mod resource;
pub mod buffer;
pub mod format;
pub mod query;
pub mod shader;
pub mod state;
pub mod texture;
pub mod vertex_declaration;
pub mod views;

pub use resource::{Resource, ResourceState};
pub use buffer::{BufferCreationDescription, BufferUsageFlags, IndexType, ResourceAccess};
pub use format::{Format, FormatSupport};
pub use query::{QueryCreationDescription, QueryType};
pub use shader::{ShaderByteCode, ShaderCreationDescription, ShaderStage, ShaderStageFlags};
pub use state::{
    AddressMode, BlendFactor, BlendOp, BlendStateDescription, BorderColor, ColorWriteMask,
    ComparisonFunc, CullMode, DepthStencilStateDescription, FillMode, Filter, FrontFace,
    RasterizerStateDescription, RenderTargetBlend, SamplerStateDescription, StencilFace,
    StencilOp, MAX_RENDER_TARGETS,
};
pub use texture::{
    mip_extent, SubResourceLayout, TextureCreationDescription, TextureType, TextureUsageFlags,
};
pub use vertex_declaration::{
    VertexAttribute, VertexDeclarationDescription, VertexSemantic, APPEND_ALIGNED,
    MAX_VERTEX_ATTRIBUTES, MAX_VERTEX_ATTRIBUTE_OFFSET, MAX_VERTEX_BUFFER_SLOTS,
};
pub use views::{
    BufferRange, RenderTargetViewDescription, ResourceViewDescription, TextureSubresourceRange,
    UnorderedAccessViewDescription, ViewResource, REMAINING,
};
