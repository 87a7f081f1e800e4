/// Handle tables owned by a device
///
/// One slotmap per resource type. Backends read them during `submit` to
/// resolve handles into native objects; only the device mutates them.

use slotmap::SlotMap;
use crate::handle::*;
use crate::resource::*;
use super::backend::Backend;

pub type BufferResource<B> = Resource<BufferCreationDescription, <B as Backend>::Buffer>;
pub type TextureResource<B> = Resource<TextureCreationDescription, <B as Backend>::Texture>;
pub type ResourceViewResource<B> = Resource<ResourceViewDescription, <B as Backend>::ResourceView>;
pub type RenderTargetViewResource<B> = Resource<RenderTargetViewDescription, <B as Backend>::RenderTargetView>;
pub type UnorderedAccessViewResource<B> =
    Resource<UnorderedAccessViewDescription, <B as Backend>::UnorderedAccessView>;
pub type ShaderResource<B> = Resource<ShaderCreationDescription, <B as Backend>::Shader>;
pub type VertexDeclarationResource<B> =
    Resource<VertexDeclarationDescription, <B as Backend>::VertexDeclaration>;
pub type BlendStateResource<B> = Resource<BlendStateDescription, <B as Backend>::BlendState>;
pub type DepthStencilStateResource<B> =
    Resource<DepthStencilStateDescription, <B as Backend>::DepthStencilState>;
pub type RasterizerStateResource<B> = Resource<RasterizerStateDescription, <B as Backend>::RasterizerState>;
pub type SamplerStateResource<B> = Resource<SamplerStateDescription, <B as Backend>::SamplerState>;
pub type QueryResource<B> = Resource<QueryCreationDescription, <B as Backend>::Query>;

/// Every live resource of a device, by type
pub struct ResourceTables<B: Backend> {
    pub(crate) buffers: SlotMap<BufferHandle, BufferResource<B>>,
    pub(crate) textures: SlotMap<TextureHandle, TextureResource<B>>,
    pub(crate) resource_views: SlotMap<ResourceViewHandle, ResourceViewResource<B>>,
    pub(crate) render_target_views: SlotMap<RenderTargetViewHandle, RenderTargetViewResource<B>>,
    pub(crate) unordered_access_views: SlotMap<UnorderedAccessViewHandle, UnorderedAccessViewResource<B>>,
    pub(crate) shaders: SlotMap<ShaderHandle, ShaderResource<B>>,
    pub(crate) vertex_declarations: SlotMap<VertexDeclarationHandle, VertexDeclarationResource<B>>,
    pub(crate) blend_states: SlotMap<BlendStateHandle, BlendStateResource<B>>,
    pub(crate) depth_stencil_states: SlotMap<DepthStencilStateHandle, DepthStencilStateResource<B>>,
    pub(crate) rasterizer_states: SlotMap<RasterizerStateHandle, RasterizerStateResource<B>>,
    pub(crate) sampler_states: SlotMap<SamplerStateHandle, SamplerStateResource<B>>,
    pub(crate) queries: SlotMap<QueryHandle, QueryResource<B>>,
}

impl<B: Backend> ResourceTables<B> {
    pub(crate) fn new() -> Self {
        Self {
            buffers: SlotMap::with_key(),
            textures: SlotMap::with_key(),
            resource_views: SlotMap::with_key(),
            render_target_views: SlotMap::with_key(),
            unordered_access_views: SlotMap::with_key(),
            shaders: SlotMap::with_key(),
            vertex_declarations: SlotMap::with_key(),
            blend_states: SlotMap::with_key(),
            depth_stencil_states: SlotMap::with_key(),
            rasterizer_states: SlotMap::with_key(),
            sampler_states: SlotMap::with_key(),
            queries: SlotMap::with_key(),
        }
    }

    pub fn buffer(&self, handle: BufferHandle) -> Option<&BufferResource<B>> {
        self.buffers.get(handle)
    }

    pub fn texture(&self, handle: TextureHandle) -> Option<&TextureResource<B>> {
        self.textures.get(handle)
    }

    pub fn resource_view(&self, handle: ResourceViewHandle) -> Option<&ResourceViewResource<B>> {
        self.resource_views.get(handle)
    }

    pub fn render_target_view(&self, handle: RenderTargetViewHandle) -> Option<&RenderTargetViewResource<B>> {
        self.render_target_views.get(handle)
    }

    pub fn unordered_access_view(
        &self,
        handle: UnorderedAccessViewHandle,
    ) -> Option<&UnorderedAccessViewResource<B>> {
        self.unordered_access_views.get(handle)
    }

    pub fn shader(&self, handle: ShaderHandle) -> Option<&ShaderResource<B>> {
        self.shaders.get(handle)
    }

    pub fn vertex_declaration(&self, handle: VertexDeclarationHandle) -> Option<&VertexDeclarationResource<B>> {
        self.vertex_declarations.get(handle)
    }

    pub fn blend_state(&self, handle: BlendStateHandle) -> Option<&BlendStateResource<B>> {
        self.blend_states.get(handle)
    }

    pub fn depth_stencil_state(&self, handle: DepthStencilStateHandle) -> Option<&DepthStencilStateResource<B>> {
        self.depth_stencil_states.get(handle)
    }

    pub fn rasterizer_state(&self, handle: RasterizerStateHandle) -> Option<&RasterizerStateResource<B>> {
        self.rasterizer_states.get(handle)
    }

    pub fn sampler_state(&self, handle: SamplerStateHandle) -> Option<&SamplerStateResource<B>> {
        self.sampler_states.get(handle)
    }

    pub fn query(&self, handle: QueryHandle) -> Option<&QueryResource<B>> {
        self.queries.get(handle)
    }

    /// Whether the handle resolves to a live resource
    pub fn contains(&self, handle: AnyHandle) -> bool {
        match handle {
            AnyHandle::Buffer(h) => self.buffers.contains_key(h),
            AnyHandle::Texture(h) => self.textures.contains_key(h),
            AnyHandle::ResourceView(h) => self.resource_views.contains_key(h),
            AnyHandle::RenderTargetView(h) => self.render_target_views.contains_key(h),
            AnyHandle::UnorderedAccessView(h) => self.unordered_access_views.contains_key(h),
            AnyHandle::Shader(h) => self.shaders.contains_key(h),
            AnyHandle::VertexDeclaration(h) => self.vertex_declarations.contains_key(h),
            AnyHandle::BlendState(h) => self.blend_states.contains_key(h),
            AnyHandle::DepthStencilState(h) => self.depth_stencil_states.contains_key(h),
            AnyHandle::RasterizerState(h) => self.rasterizer_states.contains_key(h),
            AnyHandle::SamplerState(h) => self.sampler_states.contains_key(h),
            AnyHandle::Query(h) => self.queries.contains_key(h),
        }
    }

    /// Number of live resources of one type
    pub fn count(&self, kind: ResourceKind) -> usize {
        match kind {
            ResourceKind::Buffer => self.buffers.len(),
            ResourceKind::Texture => self.textures.len(),
            ResourceKind::ResourceView => self.resource_views.len(),
            ResourceKind::RenderTargetView => self.render_target_views.len(),
            ResourceKind::UnorderedAccessView => self.unordered_access_views.len(),
            ResourceKind::Shader => self.shaders.len(),
            ResourceKind::VertexDeclaration => self.vertex_declarations.len(),
            ResourceKind::BlendState => self.blend_states.len(),
            ResourceKind::DepthStencilState => self.depth_stencil_states.len(),
            ResourceKind::RasterizerState => self.rasterizer_states.len(),
            ResourceKind::SamplerState => self.sampler_states.len(),
            ResourceKind::Query => self.queries.len(),
        }
    }

    /// Number of live resources of every type
    pub fn total(&self) -> usize {
        ResourceKind::ALL.iter().map(|kind| self.count(*kind)).sum()
    }
}
