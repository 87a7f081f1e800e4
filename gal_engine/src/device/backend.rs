/// Backend hook trait
///
/// A backend is the only code allowed to call a native graphics API. The
/// device owns the resource records and calls the `init_*` hooks to produce
/// native objects and the `deinit_*` hooks to release them. Native object
/// types are associated types, so each resource record stores the backend's
/// own type without dynamic dispatch.

use std::fmt::Debug;
use crate::command::Command;
use crate::config::BackendKind;
use crate::error::Result;
use crate::resource::*;
use super::tables::ResourceTables;

/// Backing resource a view is created on, with its resolved range
pub enum ViewTarget<'a, B: Backend> {
    Texture {
        native: &'a B::Texture,
        desc: &'a TextureCreationDescription,
        format: Format,
        range: TextureSubresourceRange,
    },
    Buffer {
        native: &'a B::Buffer,
        desc: &'a BufferCreationDescription,
        range: BufferRange,
    },
}

/// Native object whose debug name is being set
pub enum BackendObject<'a, B: Backend> {
    Buffer(&'a B::Buffer),
    Texture(&'a B::Texture),
    ResourceView(&'a B::ResourceView),
    RenderTargetView(&'a B::RenderTargetView),
    UnorderedAccessView(&'a B::UnorderedAccessView),
    Shader(&'a B::Shader),
    VertexDeclaration(&'a B::VertexDeclaration),
    BlendState(&'a B::BlendState),
    DepthStencilState(&'a B::DepthStencilState),
    RasterizerState(&'a B::RasterizerState),
    SamplerState(&'a B::SamplerState),
    Query(&'a B::Query),
}

/// Native hooks implemented once per graphics API
pub trait Backend: Sized {
    type Buffer: Debug;
    type Texture: Debug;
    type ResourceView: Debug;
    type RenderTargetView: Debug;
    type UnorderedAccessView: Debug;
    type Shader: Debug;
    type VertexDeclaration: Debug;
    type BlendState: Debug;
    type DepthStencilState: Debug;
    type RasterizerState: Debug;
    type SamplerState: Debug;
    type Query: Debug;

    fn kind(&self) -> BackendKind;

    /// Adapter / driver description for logs
    fn adapter_name(&self) -> String;

    /// Capabilities of a format on this adapter
    fn format_support(&self, format: Format) -> FormatSupport;

    // ===== RESOURCE HOOKS =====

    fn init_buffer(&mut self, desc: &BufferCreationDescription, initial_data: Option<&[u8]>) -> Result<Self::Buffer>;
    fn deinit_buffer(&mut self, native: Self::Buffer) -> Result<()>;

    fn init_texture(&mut self, desc: &TextureCreationDescription, initial_data: Option<&[u8]>) -> Result<Self::Texture>;
    fn deinit_texture(&mut self, native: Self::Texture) -> Result<()>;

    fn init_resource_view(
        &mut self,
        desc: &ResourceViewDescription,
        target: ViewTarget<'_, Self>,
    ) -> Result<Self::ResourceView>;
    fn deinit_resource_view(&mut self, native: Self::ResourceView) -> Result<()>;

    fn init_render_target_view(
        &mut self,
        desc: &RenderTargetViewDescription,
        target: ViewTarget<'_, Self>,
    ) -> Result<Self::RenderTargetView>;
    fn deinit_render_target_view(&mut self, native: Self::RenderTargetView) -> Result<()>;

    fn init_unordered_access_view(
        &mut self,
        desc: &UnorderedAccessViewDescription,
        target: ViewTarget<'_, Self>,
    ) -> Result<Self::UnorderedAccessView>;
    fn deinit_unordered_access_view(&mut self, native: Self::UnorderedAccessView) -> Result<()>;

    fn init_shader(&mut self, desc: &ShaderCreationDescription) -> Result<Self::Shader>;
    fn deinit_shader(&mut self, native: Self::Shader) -> Result<()>;

    fn init_vertex_declaration(
        &mut self,
        desc: &VertexDeclarationDescription,
        shader: &Self::Shader,
        shader_desc: &ShaderCreationDescription,
    ) -> Result<Self::VertexDeclaration>;
    fn deinit_vertex_declaration(&mut self, native: Self::VertexDeclaration) -> Result<()>;

    fn init_blend_state(&mut self, desc: &BlendStateDescription) -> Result<Self::BlendState>;
    fn deinit_blend_state(&mut self, native: Self::BlendState) -> Result<()>;

    fn init_depth_stencil_state(&mut self, desc: &DepthStencilStateDescription) -> Result<Self::DepthStencilState>;
    fn deinit_depth_stencil_state(&mut self, native: Self::DepthStencilState) -> Result<()>;

    fn init_rasterizer_state(&mut self, desc: &RasterizerStateDescription) -> Result<Self::RasterizerState>;
    fn deinit_rasterizer_state(&mut self, native: Self::RasterizerState) -> Result<()>;

    fn init_sampler_state(&mut self, desc: &SamplerStateDescription) -> Result<Self::SamplerState>;
    fn deinit_sampler_state(&mut self, native: Self::SamplerState) -> Result<()>;

    fn init_query(&mut self, desc: &QueryCreationDescription) -> Result<Self::Query>;
    fn deinit_query(&mut self, native: Self::Query) -> Result<()>;

    /// Attach a name for debuggers and validation messages (best effort)
    fn set_debug_name(&mut self, object: BackendObject<'_, Self>, name: &str);

    // ===== FRAMES AND SUBMISSION =====

    /// Block until `frame` has completed on the GPU
    fn wait_for_frame(&mut self, frame: u64) -> Result<()>;

    /// Start recording `frame` (its per-frame slot is free: the device
    /// waited for `frame - frames_in_flight` beforehand)
    fn begin_frame(&mut self, frame: u64) -> Result<()>;

    /// Translate validated commands. Every handle they reference is live in `resources`.
    fn submit(&mut self, frame: u64, commands: &[Command], resources: &ResourceTables<Self>) -> Result<()>;

    /// Close `frame` and hand it to the GPU; `timestamp_count` slots were allocated
    fn end_frame(&mut self, frame: u64, timestamp_count: u32) -> Result<()>;

    /// Most recent frame the GPU finished, without blocking
    fn completed_frame(&mut self) -> Result<Option<u64>>;

    /// Nanoseconds per timestamp tick
    fn timestamp_period(&self) -> f64;

    /// Raw ticks of a completed frame's timestamps (`None` for slots never written)
    fn read_timestamps(&mut self, frame: u64, count: u32) -> Result<Vec<Option<u64>>>;

    /// Result of an occlusion query, `None` until available
    fn query_result(&mut self, query: &Self::Query) -> Result<Option<u64>>;

    /// Block until the GPU is idle
    fn wait_idle(&mut self) -> Result<()>;
}
