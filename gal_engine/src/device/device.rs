/// GAL device
///
/// The device is the sole factory and destroyer of GPU resources. It owns the
/// handle tables, the frame counter, the timestamp ring and the submission
/// gateway; the backend `B` only produces and releases native objects and
/// translates validated commands.
///
/// Every failure is a synchronous `Result`. A backend reporting
/// `Error::DeviceLost` latches the device into a lost state: creation, frames
/// and submission then fail with `DeviceLost`, while destroy calls keep
/// unregistering resources so the application can tear everything down.

use slotmap::{Key, SecondaryMap, SlotMap};
use crate::command::{Command, CommandEncoder, RenderingSetup};
use crate::config::DeviceConfig;
use crate::error::{Error, Result};
use crate::handle::*;
use crate::resource::views;
use crate::resource::*;
use crate::{engine_debug, engine_error, engine_info, engine_trace, engine_warn};
use super::backend::{Backend, BackendObject, ViewTarget};
use super::state_cache::StateCache;
use super::tables::*;
use super::timestamp::{TimestampPool, TimestampResult};

const SOURCE: &str = "gal::Device";

// ===== PUBLIC VALUE TYPES =====

/// Resource a view is created on
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ViewParent {
    Texture(TextureHandle),
    Buffer(BufferHandle),
}

impl From<TextureHandle> for ViewParent {
    fn from(handle: TextureHandle) -> Self {
        ViewParent::Texture(handle)
    }
}

impl From<BufferHandle> for ViewParent {
    fn from(handle: BufferHandle) -> Self {
        ViewParent::Buffer(handle)
    }
}

impl ViewParent {
    fn of(resource: &ViewResource) -> Self {
        match resource {
            ViewResource::Texture { texture, .. } => ViewParent::Texture(*texture),
            ViewResource::Buffer { buffer, .. } => ViewParent::Buffer(*buffer),
        }
    }
}

/// Per-frame counters
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DeviceStats {
    /// Frame the counters belong to
    pub frame: u64,
    pub draw_calls: u32,
    pub dispatches: u32,
    pub submissions: u32,
    pub commands: u32,
    /// Live resources of every type
    pub live_resources: usize,
}

/// Views hanging off a texture or buffer
#[derive(Debug, Clone, Copy, Default)]
struct ViewUsers {
    explicit: u32,
    default_resource_view: Option<ResourceViewHandle>,
    default_render_target_view: Option<RenderTargetViewHandle>,
}

// ===== TABLE HELPERS =====

/// Build a record, run the backend init hook and register it on success
fn create_in<D, N, K: Key>(
    table: &mut SlotMap<K, Resource<D, N>>,
    desc: D,
    init: impl FnOnce(&D) -> Result<N>,
) -> Result<K> {
    let mut resource = Resource::new(desc);
    resource.begin_init();
    let native = init(resource.description())?;
    resource.finish_init(native);
    Ok(table.insert(resource))
}

/// Unregister a record and run the backend deinit hook
///
/// The outer error is a stale handle; the inner result is the deinit outcome.
fn destroy_in<D, N, K: Key>(
    table: &mut SlotMap<K, Resource<D, N>>,
    handle: K,
    kind: ResourceKind,
    deinit: impl FnOnce(N) -> Result<()>,
) -> Result<(Resource<D, N>, Result<()>)> {
    let mut resource = table.remove(handle).ok_or_else(|| stale_handle(kind))?;
    let result = match resource.begin_deinit() {
        Some(native) => deinit(native),
        None => Ok(()),
    };
    resource.finish_deinit();
    Ok((resource, result))
}

/// Release every record of a table (shutdown path)
fn drain_table<D, N, K: Key>(
    table: &mut SlotMap<K, Resource<D, N>>,
    kind: ResourceKind,
    mut deinit: impl FnMut(N) -> Result<()>,
) {
    for (_, mut resource) in table.drain() {
        if let Some(native) = resource.begin_deinit() {
            if let Err(err) = deinit(native) {
                engine_warn!(SOURCE, "Failed to release leaked {}: {}", kind, err);
            }
        }
        resource.finish_deinit();
    }
}

/// Set the debug name of a record and return its native object
fn name_in<'a, D, N, K: Key>(
    table: &'a mut SlotMap<K, Resource<D, N>>,
    handle: K,
    kind: ResourceKind,
    name: &str,
) -> Result<Option<&'a N>> {
    let resource = table
        .get_mut(handle)
        .ok_or_else(|| Error::InvalidHandle(format!("{} handle is stale or destroyed", kind)))?;
    resource.set_debug_name(name);
    Ok(resource.native())
}

/// Destroying through a stale handle is a programming error
fn stale_handle(kind: ResourceKind) -> Error {
    engine_error!(SOURCE, "Destroy called on a stale or already destroyed {} handle", kind);
    if cfg!(debug_assertions) {
        panic!("double destroy or stale {} handle", kind);
    }
    Error::InvalidHandle(format!("{} handle is stale or already destroyed", kind))
}

fn missing(kind: ResourceKind, what: &str) -> Error {
    Error::InvalidHandle(format!("{} refers to a stale or destroyed {}", what, kind))
}

// ===== DEVICE =====

/// Resource factory, handle table owner and submission gateway
pub struct Device<B: Backend> {
    backend: B,
    config: DeviceConfig,
    tables: ResourceTables<B>,

    texture_views: SecondaryMap<TextureHandle, ViewUsers>,
    buffer_views: SecondaryMap<BufferHandle, ViewUsers>,

    blend_cache: StateCache<BlendStateDescription, BlendStateHandle>,
    depth_stencil_cache: StateCache<DepthStencilStateDescription, DepthStencilStateHandle>,
    rasterizer_cache: StateCache<RasterizerStateDescription, RasterizerStateHandle>,
    sampler_cache: StateCache<SamplerStateDescription, SamplerStateHandle>,

    timestamps: TimestampPool,
    next_frame: u64,
    current_frame: Option<u64>,
    in_frame: bool,
    completed_frame: Option<u64>,

    stats: DeviceStats,
    lost: bool,
    shut_down: bool,
}

impl<B: Backend> Device<B> {
    /// Wrap an initialized backend
    ///
    /// # Arguments
    ///
    /// * `backend` - Native backend, already created from the same config
    /// * `config` - Frame, timestamp and query settings
    pub fn new(backend: B, config: DeviceConfig) -> Result<Self> {
        if let Err(err) = config.validate() {
            engine_error!(SOURCE, "Invalid device config: {}", err);
            return Err(err);
        }
        engine_info!(
            SOURCE,
            "Device created on {} backend ({}), {} frames in flight",
            backend.kind(),
            backend.adapter_name(),
            config.frames_in_flight
        );
        let timestamps = TimestampPool::new(config.timestamp_history, config.max_timestamps_per_frame);
        Ok(Self {
            backend,
            config,
            tables: ResourceTables::new(),
            texture_views: SecondaryMap::new(),
            buffer_views: SecondaryMap::new(),
            blend_cache: StateCache::new(),
            depth_stencil_cache: StateCache::new(),
            rasterizer_cache: StateCache::new(),
            sampler_cache: StateCache::new(),
            timestamps,
            next_frame: 0,
            current_frame: None,
            in_frame: false,
            completed_frame: None,
            stats: DeviceStats::default(),
            lost: false,
            shut_down: false,
        })
    }

    pub fn config(&self) -> &DeviceConfig {
        &self.config
    }

    pub fn backend(&self) -> &B {
        &self.backend
    }

    /// Mutable backend access (tools and tests)
    pub fn backend_mut(&mut self) -> &mut B {
        &mut self.backend
    }

    /// Read-only view of every handle table
    pub fn resources(&self) -> &ResourceTables<B> {
        &self.tables
    }

    pub fn is_lost(&self) -> bool {
        self.lost
    }

    pub fn format_support(&self, format: Format) -> FormatSupport {
        self.backend.format_support(format)
    }

    // ===== INTERNAL STATE CHECKS =====

    fn ensure_alive(&self) -> Result<()> {
        if self.lost {
            return Err(Error::DeviceLost);
        }
        if self.shut_down {
            return Err(Error::BackendError("device has been shut down".to_string()));
        }
        Ok(())
    }

    fn mark_lost(&mut self) {
        if !self.lost {
            engine_error!(SOURCE, "GPU device lost, the device must be recreated");
            self.lost = true;
        }
    }

    /// Log a failed operation and latch device loss
    fn finish<T>(&mut self, operation: &str, result: Result<T>) -> Result<T> {
        if let Err(err) = &result {
            if err.is_fatal() {
                self.mark_lost();
            }
            engine_error!(SOURCE, "{} failed: {}", operation, err);
        }
        result
    }

    /// Deinit errors on a lost device are expected and swallowed
    fn finish_destroy(&mut self, operation: &str, result: Result<()>) -> Result<()> {
        match result {
            Err(_) if self.lost => Ok(()),
            other => self.finish(operation, other),
        }
    }

    fn require_support(&self, format: Format, needed: FormatSupport, what: &str) -> Result<()> {
        let supported = self.backend.format_support(format);
        if !supported.contains(needed) {
            return Err(Error::UnsupportedFormat(format!(
                "{:?} does not support {:?} on this adapter (needed for {})",
                format,
                needed.difference(supported),
                what
            )));
        }
        Ok(())
    }

    fn require_frame(&self, operation: &str) -> Result<u64> {
        match self.current_frame {
            Some(frame) if self.in_frame => Ok(frame),
            _ => Err(Error::InvalidCommand(format!("{} called outside begin_frame/end_frame", operation))),
        }
    }

    fn view_users_mut(&mut self, parent: ViewParent) -> Option<&mut ViewUsers> {
        match parent {
            ViewParent::Texture(h) => self.texture_views.get_mut(h),
            ViewParent::Buffer(h) => self.buffer_views.get_mut(h),
        }
    }

    fn view_users(&self, parent: ViewParent) -> Result<ViewUsers> {
        let users = match parent {
            ViewParent::Texture(h) => self.texture_views.get(h),
            ViewParent::Buffer(h) => self.buffer_views.get(h),
        };
        users.copied().ok_or_else(|| match parent {
            ViewParent::Texture(_) => missing(ResourceKind::Texture, "view parent"),
            ViewParent::Buffer(_) => missing(ResourceKind::Buffer, "view parent"),
        })
    }

    fn created<K: Key>(&self, kind: ResourceKind, handle: K) {
        engine_trace!(
            SOURCE,
            "Created {} {:?} ({} live)",
            kind,
            handle.data(),
            self.tables.count(kind)
        );
    }

    // ===== BUFFERS =====

    /// Create a buffer, optionally filled with `initial_data`
    pub fn create_buffer(
        &mut self,
        desc: BufferCreationDescription,
        initial_data: Option<&[u8]>,
    ) -> Result<BufferHandle> {
        self.ensure_alive()?;
        let result = self.create_buffer_inner(desc, initial_data);
        let handle = self.finish("create_buffer", result)?;
        self.buffer_views.insert(handle, ViewUsers::default());
        self.created(ResourceKind::Buffer, handle);
        Ok(handle)
    }

    fn create_buffer_inner(
        &mut self,
        desc: BufferCreationDescription,
        initial_data: Option<&[u8]>,
    ) -> Result<BufferHandle> {
        desc.validate(initial_data)?;
        if let Some(format) = desc.format {
            self.require_support(format, FormatSupport::TYPED_BUFFER, "typed buffer")?;
        }
        let backend = &mut self.backend;
        create_in(&mut self.tables.buffers, desc, |d| backend.init_buffer(d, initial_data))
    }

    /// Destroy a buffer (rejected while explicit views reference it)
    pub fn destroy_buffer(&mut self, handle: BufferHandle) -> Result<()> {
        let users = match self.buffer_views.get(handle) {
            Some(users) => *users,
            None => return Err(stale_handle(ResourceKind::Buffer)),
        };
        if users.explicit > 0 {
            engine_warn!(SOURCE, "Buffer still has {} live views, not destroyed", users.explicit);
            return Err(Error::ResourceInUse(format!("buffer has {} live views", users.explicit)));
        }
        if let Some(view) = users.default_resource_view {
            self.release_resource_view(view)?;
        }
        self.buffer_views.remove(handle);
        let backend = &mut self.backend;
        let (_, result) = destroy_in(&mut self.tables.buffers, handle, ResourceKind::Buffer, |n| {
            backend.deinit_buffer(n)
        })?;
        self.finish_destroy("destroy_buffer", result)
    }

    pub fn buffer(&self, handle: BufferHandle) -> Option<&BufferResource<B>> {
        self.tables.buffer(handle)
    }

    // ===== TEXTURES =====

    /// Create a texture, optionally filled with packed sub-resource data
    pub fn create_texture(
        &mut self,
        desc: TextureCreationDescription,
        initial_data: Option<&[u8]>,
    ) -> Result<TextureHandle> {
        self.ensure_alive()?;
        let result = self.create_texture_inner(desc, initial_data);
        let handle = self.finish("create_texture", result)?;
        self.texture_views.insert(handle, ViewUsers::default());
        self.created(ResourceKind::Texture, handle);
        Ok(handle)
    }

    fn create_texture_inner(
        &mut self,
        desc: TextureCreationDescription,
        initial_data: Option<&[u8]>,
    ) -> Result<TextureHandle> {
        desc.validate(initial_data)?;
        let usage_support = [
            (TextureUsageFlags::SHADER_RESOURCE, FormatSupport::SAMPLED),
            (TextureUsageFlags::RENDER_TARGET, FormatSupport::RENDER_TARGET),
            (TextureUsageFlags::DEPTH_STENCIL, FormatSupport::DEPTH_STENCIL),
            (TextureUsageFlags::UNORDERED_ACCESS, FormatSupport::UNORDERED_ACCESS),
        ];
        for (usage, support) in usage_support {
            if desc.usage.contains(usage) {
                self.require_support(desc.format, support, "texture usage")?;
            }
        }
        let backend = &mut self.backend;
        create_in(&mut self.tables.textures, desc, |d| backend.init_texture(d, initial_data))
    }

    /// Destroy a texture and its default views (rejected while explicit views reference it)
    pub fn destroy_texture(&mut self, handle: TextureHandle) -> Result<()> {
        let users = match self.texture_views.get(handle) {
            Some(users) => *users,
            None => return Err(stale_handle(ResourceKind::Texture)),
        };
        if users.explicit > 0 {
            engine_warn!(SOURCE, "Texture still has {} live views, not destroyed", users.explicit);
            return Err(Error::ResourceInUse(format!("texture has {} live views", users.explicit)));
        }
        if let Some(view) = users.default_resource_view {
            self.release_resource_view(view)?;
        }
        if let Some(view) = users.default_render_target_view {
            self.release_render_target_view(view)?;
        }
        self.texture_views.remove(handle);
        let backend = &mut self.backend;
        let (_, result) = destroy_in(&mut self.tables.textures, handle, ResourceKind::Texture, |n| {
            backend.deinit_texture(n)
        })?;
        self.finish_destroy("destroy_texture", result)
    }

    pub fn texture(&self, handle: TextureHandle) -> Option<&TextureResource<B>> {
        self.tables.texture(handle)
    }

    // ===== RESOURCE VIEWS =====

    /// Create a shader-readable view of a texture or buffer
    pub fn create_resource_view(&mut self, desc: ResourceViewDescription) -> Result<ResourceViewHandle> {
        self.create_resource_view_internal(desc, false)
    }

    fn create_resource_view_internal(
        &mut self,
        desc: ResourceViewDescription,
        is_default: bool,
    ) -> Result<ResourceViewHandle> {
        self.ensure_alive()?;
        let result = self.create_resource_view_inner(desc);
        let handle = self.finish("create_resource_view", result)?;
        if let Some(users) = self.view_users_mut(ViewParent::of(&desc.resource)) {
            if is_default {
                users.default_resource_view = Some(handle);
            } else {
                users.explicit += 1;
            }
        }
        self.created(ResourceKind::ResourceView, handle);
        Ok(handle)
    }

    fn create_resource_view_inner(&mut self, desc: ResourceViewDescription) -> Result<ResourceViewHandle> {
        match desc.resource {
            ViewResource::Texture { texture, range } => {
                let parent = self
                    .tables
                    .textures
                    .get(texture)
                    .ok_or_else(|| missing(ResourceKind::Texture, "resource view"))?;
                let (format, range) = views::validate_texture_view(parent.description(), &range, desc.format)?;
                self.require_support(format, FormatSupport::SAMPLED, "resource view")?;
                let native = parent.native().ok_or_else(|| missing(ResourceKind::Texture, "resource view"))?;
                let target = ViewTarget::Texture { native, desc: parent.description(), format, range };
                let backend = &mut self.backend;
                create_in(&mut self.tables.resource_views, desc, |d| backend.init_resource_view(d, target))
            }
            ViewResource::Buffer { buffer, range } => {
                let parent = self
                    .tables
                    .buffers
                    .get(buffer)
                    .ok_or_else(|| missing(ResourceKind::Buffer, "resource view"))?;
                let range = views::validate_buffer_view(parent.description(), &range, false)?;
                let native = parent.native().ok_or_else(|| missing(ResourceKind::Buffer, "resource view"))?;
                let target = ViewTarget::Buffer { native, desc: parent.description(), range };
                let backend = &mut self.backend;
                create_in(&mut self.tables.resource_views, desc, |d| backend.init_resource_view(d, target))
            }
        }
    }

    /// Full-resource shader view, created on first use and owned by the resource
    pub fn default_resource_view(&mut self, parent: impl Into<ViewParent>) -> Result<ResourceViewHandle> {
        let parent = parent.into();
        let users = self.view_users(parent);
        let users = self.finish("default_resource_view", users)?;
        if let Some(view) = users.default_resource_view {
            return Ok(view);
        }
        let resource = match parent {
            ViewParent::Texture(texture) => ViewResource::texture(texture),
            ViewParent::Buffer(buffer) => ViewResource::buffer(buffer),
        };
        self.create_resource_view_internal(ResourceViewDescription { resource, format: None }, true)
    }

    /// Destroy an explicit resource view
    pub fn destroy_resource_view(&mut self, handle: ResourceViewHandle) -> Result<()> {
        let parent = match self.tables.resource_views.get(handle) {
            Some(view) => ViewParent::of(&view.description().resource),
            None => return Err(stale_handle(ResourceKind::ResourceView)),
        };
        let is_default = self
            .view_users(parent)
            .map(|users| users.default_resource_view == Some(handle))
            .unwrap_or(false);
        if is_default {
            engine_warn!(SOURCE, "Default resource views are released with their resource");
            return Err(Error::InvalidResource(
                "default views are owned by their resource".to_string(),
            ));
        }
        self.release_resource_view(handle)?;
        if let Some(users) = self.view_users_mut(parent) {
            users.explicit = users.explicit.saturating_sub(1);
        }
        Ok(())
    }

    fn release_resource_view(&mut self, handle: ResourceViewHandle) -> Result<()> {
        let backend = &mut self.backend;
        let (_, result) = destroy_in(
            &mut self.tables.resource_views,
            handle,
            ResourceKind::ResourceView,
            |n| backend.deinit_resource_view(n),
        )?;
        self.finish_destroy("destroy_resource_view", result)
    }

    pub fn resource_view(&self, handle: ResourceViewHandle) -> Option<&ResourceViewResource<B>> {
        self.tables.resource_view(handle)
    }

    // ===== RENDER TARGET VIEWS =====

    /// Create a color or depth attachment view of a texture
    pub fn create_render_target_view(
        &mut self,
        desc: RenderTargetViewDescription,
    ) -> Result<RenderTargetViewHandle> {
        self.create_render_target_view_internal(desc, false)
    }

    fn create_render_target_view_internal(
        &mut self,
        desc: RenderTargetViewDescription,
        is_default: bool,
    ) -> Result<RenderTargetViewHandle> {
        self.ensure_alive()?;
        let result = self.create_render_target_view_inner(desc);
        let handle = self.finish("create_render_target_view", result)?;
        if let Some(users) = self.texture_views.get_mut(desc.texture) {
            if is_default {
                users.default_render_target_view = Some(handle);
            } else {
                users.explicit += 1;
            }
        }
        self.created(ResourceKind::RenderTargetView, handle);
        Ok(handle)
    }

    fn create_render_target_view_inner(
        &mut self,
        desc: RenderTargetViewDescription,
    ) -> Result<RenderTargetViewHandle> {
        let parent = self
            .tables
            .textures
            .get(desc.texture)
            .ok_or_else(|| missing(ResourceKind::Texture, "render target view"))?;
        let (format, range) = views::validate_render_target_view(parent.description(), &desc)?;
        let needed = if format.is_depth() {
            FormatSupport::DEPTH_STENCIL
        } else {
            FormatSupport::RENDER_TARGET
        };
        self.require_support(format, needed, "render target view")?;
        let native = parent
            .native()
            .ok_or_else(|| missing(ResourceKind::Texture, "render target view"))?;
        let target = ViewTarget::Texture { native, desc: parent.description(), format, range };
        let backend = &mut self.backend;
        create_in(&mut self.tables.render_target_views, desc, |d| {
            backend.init_render_target_view(d, target)
        })
    }

    /// Mip 0 attachment view covering every layer, owned by the texture
    pub fn default_render_target_view(&mut self, texture: TextureHandle) -> Result<RenderTargetViewHandle> {
        let users = self.view_users(ViewParent::Texture(texture));
        let users = self.finish("default_render_target_view", users)?;
        if let Some(view) = users.default_render_target_view {
            return Ok(view);
        }
        self.create_render_target_view_internal(RenderTargetViewDescription::new(texture), true)
    }

    pub fn destroy_render_target_view(&mut self, handle: RenderTargetViewHandle) -> Result<()> {
        let texture = match self.tables.render_target_views.get(handle) {
            Some(view) => view.description().texture,
            None => return Err(stale_handle(ResourceKind::RenderTargetView)),
        };
        let is_default = self
            .texture_views
            .get(texture)
            .map(|users| users.default_render_target_view == Some(handle))
            .unwrap_or(false);
        if is_default {
            engine_warn!(SOURCE, "Default render target views are released with their texture");
            return Err(Error::InvalidResource(
                "default views are owned by their resource".to_string(),
            ));
        }
        self.release_render_target_view(handle)?;
        if let Some(users) = self.texture_views.get_mut(texture) {
            users.explicit = users.explicit.saturating_sub(1);
        }
        Ok(())
    }

    fn release_render_target_view(&mut self, handle: RenderTargetViewHandle) -> Result<()> {
        let backend = &mut self.backend;
        let (_, result) = destroy_in(
            &mut self.tables.render_target_views,
            handle,
            ResourceKind::RenderTargetView,
            |n| backend.deinit_render_target_view(n),
        )?;
        self.finish_destroy("destroy_render_target_view", result)
    }

    pub fn render_target_view(&self, handle: RenderTargetViewHandle) -> Option<&RenderTargetViewResource<B>> {
        self.tables.render_target_view(handle)
    }

    // ===== UNORDERED ACCESS VIEWS =====

    /// Create a read/write view of a texture mip or a buffer range
    pub fn create_unordered_access_view(
        &mut self,
        desc: UnorderedAccessViewDescription,
    ) -> Result<UnorderedAccessViewHandle> {
        self.ensure_alive()?;
        let result = self.create_unordered_access_view_inner(desc);
        let handle = self.finish("create_unordered_access_view", result)?;
        if let Some(users) = self.view_users_mut(ViewParent::of(&desc.resource)) {
            users.explicit += 1;
        }
        self.created(ResourceKind::UnorderedAccessView, handle);
        Ok(handle)
    }

    fn create_unordered_access_view_inner(
        &mut self,
        desc: UnorderedAccessViewDescription,
    ) -> Result<UnorderedAccessViewHandle> {
        match desc.resource {
            ViewResource::Texture { texture, range } => {
                let parent = self
                    .tables
                    .textures
                    .get(texture)
                    .ok_or_else(|| missing(ResourceKind::Texture, "unordered access view"))?;
                let (format, range) = views::validate_texture_uav(parent.description(), &range, desc.format)?;
                self.require_support(format, FormatSupport::UNORDERED_ACCESS, "unordered access view")?;
                let native = parent
                    .native()
                    .ok_or_else(|| missing(ResourceKind::Texture, "unordered access view"))?;
                let target = ViewTarget::Texture { native, desc: parent.description(), format, range };
                let backend = &mut self.backend;
                create_in(&mut self.tables.unordered_access_views, desc, |d| {
                    backend.init_unordered_access_view(d, target)
                })
            }
            ViewResource::Buffer { buffer, range } => {
                let parent = self
                    .tables
                    .buffers
                    .get(buffer)
                    .ok_or_else(|| missing(ResourceKind::Buffer, "unordered access view"))?;
                let range = views::validate_buffer_view(parent.description(), &range, true)?;
                let native = parent
                    .native()
                    .ok_or_else(|| missing(ResourceKind::Buffer, "unordered access view"))?;
                let target = ViewTarget::Buffer { native, desc: parent.description(), range };
                let backend = &mut self.backend;
                create_in(&mut self.tables.unordered_access_views, desc, |d| {
                    backend.init_unordered_access_view(d, target)
                })
            }
        }
    }

    pub fn destroy_unordered_access_view(&mut self, handle: UnorderedAccessViewHandle) -> Result<()> {
        let parent = match self.tables.unordered_access_views.get(handle) {
            Some(view) => ViewParent::of(&view.description().resource),
            None => return Err(stale_handle(ResourceKind::UnorderedAccessView)),
        };
        let backend = &mut self.backend;
        let (_, result) = destroy_in(
            &mut self.tables.unordered_access_views,
            handle,
            ResourceKind::UnorderedAccessView,
            |n| backend.deinit_unordered_access_view(n),
        )?;
        if let Some(users) = self.view_users_mut(parent) {
            users.explicit = users.explicit.saturating_sub(1);
        }
        self.finish_destroy("destroy_unordered_access_view", result)
    }

    pub fn unordered_access_view(
        &self,
        handle: UnorderedAccessViewHandle,
    ) -> Option<&UnorderedAccessViewResource<B>> {
        self.tables.unordered_access_view(handle)
    }

    // ===== SHADERS =====

    pub fn create_shader(&mut self, desc: ShaderCreationDescription) -> Result<ShaderHandle> {
        self.ensure_alive()?;
        let result = desc.validate().and_then(|_| {
            let backend = &mut self.backend;
            create_in(&mut self.tables.shaders, desc, |d| backend.init_shader(d))
        });
        let handle = self.finish("create_shader", result)?;
        self.created(ResourceKind::Shader, handle);
        Ok(handle)
    }

    pub fn destroy_shader(&mut self, handle: ShaderHandle) -> Result<()> {
        let backend = &mut self.backend;
        let (_, result) = destroy_in(&mut self.tables.shaders, handle, ResourceKind::Shader, |n| {
            backend.deinit_shader(n)
        })?;
        self.finish_destroy("destroy_shader", result)
    }

    pub fn shader(&self, handle: ShaderHandle) -> Option<&ShaderResource<B>> {
        self.tables.shader(handle)
    }

    // ===== VERTEX DECLARATIONS =====

    /// Create a vertex input layout matched against a shader's vertex stage
    pub fn create_vertex_declaration(
        &mut self,
        desc: VertexDeclarationDescription,
    ) -> Result<VertexDeclarationHandle> {
        self.ensure_alive()?;
        let result = self.create_vertex_declaration_inner(desc);
        let handle = self.finish("create_vertex_declaration", result)?;
        self.created(ResourceKind::VertexDeclaration, handle);
        Ok(handle)
    }

    fn create_vertex_declaration_inner(
        &mut self,
        desc: VertexDeclarationDescription,
    ) -> Result<VertexDeclarationHandle> {
        desc.validate()?;
        for attr in &desc.attributes {
            self.require_support(attr.format, FormatSupport::VERTEX_BUFFER, "vertex attribute")?;
        }
        let shader = self
            .tables
            .shaders
            .get(desc.shader)
            .ok_or_else(|| missing(ResourceKind::Shader, "vertex declaration"))?;
        if shader.description().vertex.is_none() {
            return Err(Error::InvalidResource(
                "vertex declaration shader has no vertex stage".to_string(),
            ));
        }
        let native = shader.native().ok_or_else(|| missing(ResourceKind::Shader, "vertex declaration"))?;
        let shader_desc = shader.description();
        let backend = &mut self.backend;
        create_in(&mut self.tables.vertex_declarations, desc, |d| {
            backend.init_vertex_declaration(d, native, shader_desc)
        })
    }

    pub fn destroy_vertex_declaration(&mut self, handle: VertexDeclarationHandle) -> Result<()> {
        let backend = &mut self.backend;
        let (_, result) = destroy_in(
            &mut self.tables.vertex_declarations,
            handle,
            ResourceKind::VertexDeclaration,
            |n| backend.deinit_vertex_declaration(n),
        )?;
        self.finish_destroy("destroy_vertex_declaration", result)
    }

    pub fn vertex_declaration(&self, handle: VertexDeclarationHandle) -> Option<&VertexDeclarationResource<B>> {
        self.tables.vertex_declaration(handle)
    }

    // ===== STATE OBJECTS (DEDUPLICATED) =====

    /// Create or share a blend state
    pub fn create_blend_state(&mut self, desc: BlendStateDescription) -> Result<BlendStateHandle> {
        self.ensure_alive()?;
        if let Some(handle) = self.blend_cache.acquire(&desc) {
            return Ok(handle);
        }
        let backend = &mut self.backend;
        let result = create_in(&mut self.tables.blend_states, desc, |d| backend.init_blend_state(d));
        let handle = self.finish("create_blend_state", result)?;
        self.blend_cache.insert(desc, handle);
        self.created(ResourceKind::BlendState, handle);
        Ok(handle)
    }

    /// Drop one reference to a blend state
    pub fn destroy_blend_state(&mut self, handle: BlendStateHandle) -> Result<()> {
        let desc = match self.tables.blend_states.get(handle) {
            Some(state) => *state.description(),
            None => return Err(stale_handle(ResourceKind::BlendState)),
        };
        if !self.blend_cache.release(handle, &desc) {
            return Ok(());
        }
        let backend = &mut self.backend;
        let (_, result) = destroy_in(&mut self.tables.blend_states, handle, ResourceKind::BlendState, |n| {
            backend.deinit_blend_state(n)
        })?;
        self.finish_destroy("destroy_blend_state", result)
    }

    pub fn blend_state(&self, handle: BlendStateHandle) -> Option<&BlendStateResource<B>> {
        self.tables.blend_state(handle)
    }

    /// Create or share a depth/stencil state
    pub fn create_depth_stencil_state(
        &mut self,
        desc: DepthStencilStateDescription,
    ) -> Result<DepthStencilStateHandle> {
        self.ensure_alive()?;
        if let Err(err) = desc.validate() {
            return self.finish("create_depth_stencil_state", Err(err));
        }
        if let Some(handle) = self.depth_stencil_cache.acquire(&desc) {
            return Ok(handle);
        }
        let backend = &mut self.backend;
        let result = create_in(&mut self.tables.depth_stencil_states, desc, |d| {
            backend.init_depth_stencil_state(d)
        });
        let handle = self.finish("create_depth_stencil_state", result)?;
        self.depth_stencil_cache.insert(desc, handle);
        self.created(ResourceKind::DepthStencilState, handle);
        Ok(handle)
    }

    pub fn destroy_depth_stencil_state(&mut self, handle: DepthStencilStateHandle) -> Result<()> {
        let desc = match self.tables.depth_stencil_states.get(handle) {
            Some(state) => *state.description(),
            None => return Err(stale_handle(ResourceKind::DepthStencilState)),
        };
        if !self.depth_stencil_cache.release(handle, &desc) {
            return Ok(());
        }
        let backend = &mut self.backend;
        let (_, result) = destroy_in(
            &mut self.tables.depth_stencil_states,
            handle,
            ResourceKind::DepthStencilState,
            |n| backend.deinit_depth_stencil_state(n),
        )?;
        self.finish_destroy("destroy_depth_stencil_state", result)
    }

    pub fn depth_stencil_state(&self, handle: DepthStencilStateHandle) -> Option<&DepthStencilStateResource<B>> {
        self.tables.depth_stencil_state(handle)
    }

    /// Create or share a rasterizer state
    pub fn create_rasterizer_state(&mut self, desc: RasterizerStateDescription) -> Result<RasterizerStateHandle> {
        self.ensure_alive()?;
        if let Err(err) = desc.validate() {
            return self.finish("create_rasterizer_state", Err(err));
        }
        if let Some(handle) = self.rasterizer_cache.acquire(&desc) {
            return Ok(handle);
        }
        let backend = &mut self.backend;
        let result = create_in(&mut self.tables.rasterizer_states, desc, |d| {
            backend.init_rasterizer_state(d)
        });
        let handle = self.finish("create_rasterizer_state", result)?;
        self.rasterizer_cache.insert(desc, handle);
        self.created(ResourceKind::RasterizerState, handle);
        Ok(handle)
    }

    pub fn destroy_rasterizer_state(&mut self, handle: RasterizerStateHandle) -> Result<()> {
        let desc = match self.tables.rasterizer_states.get(handle) {
            Some(state) => *state.description(),
            None => return Err(stale_handle(ResourceKind::RasterizerState)),
        };
        if !self.rasterizer_cache.release(handle, &desc) {
            return Ok(());
        }
        let backend = &mut self.backend;
        let (_, result) = destroy_in(
            &mut self.tables.rasterizer_states,
            handle,
            ResourceKind::RasterizerState,
            |n| backend.deinit_rasterizer_state(n),
        )?;
        self.finish_destroy("destroy_rasterizer_state", result)
    }

    pub fn rasterizer_state(&self, handle: RasterizerStateHandle) -> Option<&RasterizerStateResource<B>> {
        self.tables.rasterizer_state(handle)
    }

    /// Create or share a sampler state
    pub fn create_sampler_state(&mut self, desc: SamplerStateDescription) -> Result<SamplerStateHandle> {
        self.ensure_alive()?;
        if let Err(err) = desc.validate() {
            return self.finish("create_sampler_state", Err(err));
        }
        if let Some(handle) = self.sampler_cache.acquire(&desc) {
            return Ok(handle);
        }
        let backend = &mut self.backend;
        let result = create_in(&mut self.tables.sampler_states, desc, |d| backend.init_sampler_state(d));
        let handle = self.finish("create_sampler_state", result)?;
        self.sampler_cache.insert(desc, handle);
        self.created(ResourceKind::SamplerState, handle);
        Ok(handle)
    }

    pub fn destroy_sampler_state(&mut self, handle: SamplerStateHandle) -> Result<()> {
        let desc = match self.tables.sampler_states.get(handle) {
            Some(state) => *state.description(),
            None => return Err(stale_handle(ResourceKind::SamplerState)),
        };
        if !self.sampler_cache.release(handle, &desc) {
            return Ok(());
        }
        let backend = &mut self.backend;
        let (_, result) = destroy_in(
            &mut self.tables.sampler_states,
            handle,
            ResourceKind::SamplerState,
            |n| backend.deinit_sampler_state(n),
        )?;
        self.finish_destroy("destroy_sampler_state", result)
    }

    pub fn sampler_state(&self, handle: SamplerStateHandle) -> Option<&SamplerStateResource<B>> {
        self.tables.sampler_state(handle)
    }

    /// Number of outstanding references to a state object (0 if not a live state object)
    pub fn state_ref_count(&self, handle: impl Into<AnyHandle>) -> u32 {
        match handle.into() {
            AnyHandle::BlendState(h) => self.blend_cache.ref_count(h),
            AnyHandle::DepthStencilState(h) => self.depth_stencil_cache.ref_count(h),
            AnyHandle::RasterizerState(h) => self.rasterizer_cache.ref_count(h),
            AnyHandle::SamplerState(h) => self.sampler_cache.ref_count(h),
            _ => 0,
        }
    }

    // ===== QUERIES =====

    pub fn create_query(&mut self, desc: QueryCreationDescription) -> Result<QueryHandle> {
        self.ensure_alive()?;
        if self.tables.queries.len() >= self.config.max_queries as usize {
            let err = Error::OutOfMemory;
            engine_warn!(SOURCE, "Query pool exhausted ({} queries)", self.config.max_queries);
            return Err(err);
        }
        let backend = &mut self.backend;
        let result = create_in(&mut self.tables.queries, desc, |d| backend.init_query(d));
        let handle = self.finish("create_query", result)?;
        self.created(ResourceKind::Query, handle);
        Ok(handle)
    }

    pub fn destroy_query(&mut self, handle: QueryHandle) -> Result<()> {
        let backend = &mut self.backend;
        let (_, result) = destroy_in(&mut self.tables.queries, handle, ResourceKind::Query, |n| {
            backend.deinit_query(n)
        })?;
        self.finish_destroy("destroy_query", result)
    }

    pub fn query(&self, handle: QueryHandle) -> Option<&QueryResource<B>> {
        self.tables.query(handle)
    }

    /// Query result, `None` until the GPU made it available
    pub fn get_query_result(&mut self, handle: QueryHandle) -> Result<Option<u64>> {
        self.ensure_alive()?;
        let result = match self.tables.queries.get(handle).and_then(|q| q.native()) {
            Some(native) => self.backend.query_result(native),
            None => Err(missing(ResourceKind::Query, "get_query_result")),
        };
        self.finish("get_query_result", result)
    }

    // ===== DEBUG NAMES =====

    /// Name a resource for debuggers and validation output
    pub fn set_debug_name(&mut self, handle: impl Into<AnyHandle>, name: &str) -> Result<()> {
        let handle = handle.into();
        let kind = handle.kind();
        let tables = &mut self.tables;
        let object = match handle {
            AnyHandle::Buffer(h) => name_in(&mut tables.buffers, h, kind, name)?.map(BackendObject::Buffer),
            AnyHandle::Texture(h) => name_in(&mut tables.textures, h, kind, name)?.map(BackendObject::Texture),
            AnyHandle::ResourceView(h) => {
                name_in(&mut tables.resource_views, h, kind, name)?.map(BackendObject::ResourceView)
            }
            AnyHandle::RenderTargetView(h) => {
                name_in(&mut tables.render_target_views, h, kind, name)?.map(BackendObject::RenderTargetView)
            }
            AnyHandle::UnorderedAccessView(h) => name_in(&mut tables.unordered_access_views, h, kind, name)?
                .map(BackendObject::UnorderedAccessView),
            AnyHandle::Shader(h) => name_in(&mut tables.shaders, h, kind, name)?.map(BackendObject::Shader),
            AnyHandle::VertexDeclaration(h) => name_in(&mut tables.vertex_declarations, h, kind, name)?
                .map(BackendObject::VertexDeclaration),
            AnyHandle::BlendState(h) => {
                name_in(&mut tables.blend_states, h, kind, name)?.map(BackendObject::BlendState)
            }
            AnyHandle::DepthStencilState(h) => name_in(&mut tables.depth_stencil_states, h, kind, name)?
                .map(BackendObject::DepthStencilState),
            AnyHandle::RasterizerState(h) => {
                name_in(&mut tables.rasterizer_states, h, kind, name)?.map(BackendObject::RasterizerState)
            }
            AnyHandle::SamplerState(h) => {
                name_in(&mut tables.sampler_states, h, kind, name)?.map(BackendObject::SamplerState)
            }
            AnyHandle::Query(h) => name_in(&mut tables.queries, h, kind, name)?.map(BackendObject::Query),
        };
        if let Some(object) = object {
            self.backend.set_debug_name(object, name);
        }
        Ok(())
    }

    // ===== FRAMES =====

    /// Start the next frame, waiting for the GPU when `frames_in_flight` frames are pending
    pub fn begin_frame(&mut self) -> Result<u64> {
        self.ensure_alive()?;
        if self.in_frame {
            return self.finish(
                "begin_frame",
                Err(Error::InvalidCommand("begin_frame called twice without end_frame".to_string())),
            );
        }
        let frame = self.next_frame;
        let result = self.begin_frame_inner(frame);
        self.finish("begin_frame", result)?;
        self.next_frame += 1;
        self.current_frame = Some(frame);
        self.in_frame = true;
        self.stats = DeviceStats { frame, ..DeviceStats::default() };
        Ok(frame)
    }

    fn begin_frame_inner(&mut self, frame: u64) -> Result<()> {
        let frames_in_flight = self.config.frames_in_flight as u64;
        if frame >= frames_in_flight {
            self.backend.wait_for_frame(frame - frames_in_flight)?;
        }
        self.poll_completed()?;
        self.timestamps.begin_frame(frame);
        self.backend.begin_frame(frame)
    }

    /// Close the current frame and hand it to the GPU
    pub fn end_frame(&mut self) -> Result<()> {
        self.ensure_alive()?;
        let result = self.require_frame("end_frame").and_then(|frame| {
            let count = self.timestamps.count(frame);
            self.in_frame = false;
            self.backend.end_frame(frame, count)
        });
        let result = result.and_then(|_| self.poll_completed());
        self.finish("end_frame", result)
    }

    /// Read completion from the backend and fetch finished timestamps
    fn poll_completed(&mut self) -> Result<()> {
        let completed = self.backend.completed_frame()?;
        self.completed_frame = self.completed_frame.max(completed);
        if let Some(done) = self.completed_frame {
            for (frame, count) in self.timestamps.unresolved(done) {
                let ticks = self.backend.read_timestamps(frame, count)?;
                self.timestamps.resolve(frame, ticks);
            }
        }
        Ok(())
    }

    /// Frame most recently started (`None` before the first `begin_frame`)
    pub fn current_frame(&self) -> Option<u64> {
        self.current_frame
    }

    /// Last frame the GPU finished; resources last used in it or earlier are idle
    pub fn safe_frame(&self) -> Option<u64> {
        self.completed_frame
    }

    // ===== COMMANDS =====

    /// Start recording commands for the current frame
    pub fn begin_commands(&mut self) -> Result<CommandEncoder> {
        self.ensure_alive()?;
        let frame = self.require_frame("begin_commands");
        let frame = self.finish("begin_commands", frame)?;
        Ok(CommandEncoder::new(frame))
    }

    /// Reserve a GPU timestamp written at this point of the encoder
    pub fn insert_timestamp(&mut self, encoder: &mut CommandEncoder) -> Result<TimestampHandle> {
        self.ensure_alive()?;
        let result = self.require_frame("insert_timestamp").and_then(|frame| {
            if encoder.frame() != frame {
                return Err(Error::InvalidCommand(format!(
                    "encoder of frame {} used in frame {}",
                    encoder.frame(),
                    frame
                )));
            }
            let slot = self.timestamps.allocate(frame).ok_or_else(|| {
                Error::InvalidCommand(format!(
                    "more than {} timestamps in one frame",
                    self.config.max_timestamps_per_frame
                ))
            })?;
            Ok(TimestampHandle { frame, slot })
        });
        let handle = self.finish("insert_timestamp", result)?;
        encoder.push(Command::InsertTimestamp { slot: handle.slot });
        Ok(handle)
    }

    /// Resolve a timestamp (`Pending` until its frame completed on the GPU)
    pub fn get_timestamp_result(&mut self, handle: TimestampHandle) -> TimestampResult {
        if self.lost || self.shut_down {
            return TimestampResult::Invalid;
        }
        let polled = self.poll_completed();
        if self.finish("get_timestamp_result", polled).is_err() {
            return TimestampResult::Invalid;
        }
        self.timestamps
            .lookup(handle, self.completed_frame, self.backend.timestamp_period())
    }

    /// Validate and forward recorded commands to the backend
    ///
    /// Nothing is forwarded if any command references a stale handle or is
    /// inconsistent with the resources it uses.
    pub fn submit(&mut self, encoder: CommandEncoder) -> Result<()> {
        self.ensure_alive()?;
        let result = self.submit_inner(encoder);
        self.finish("submit", result)
    }

    fn submit_inner(&mut self, encoder: CommandEncoder) -> Result<()> {
        let frame = self.require_frame("submit")?;
        if encoder.frame() != frame {
            return Err(Error::InvalidCommand(format!(
                "encoder of frame {} submitted in frame {}",
                encoder.frame(),
                frame
            )));
        }
        let commands = encoder.finish()?;
        self.validate_commands(frame, &commands)?;
        self.backend.submit(frame, &commands, &self.tables)?;

        self.stats.submissions += 1;
        self.stats.commands += commands.len() as u32;
        for command in &commands {
            if command.is_draw() {
                self.stats.draw_calls += 1;
            } else if matches!(command, Command::Dispatch { .. }) {
                self.stats.dispatches += 1;
            }
        }
        engine_trace!(SOURCE, "Submitted {} commands in frame {}", commands.len(), frame);
        Ok(())
    }

    fn validate_commands(&self, frame: u64, commands: &[Command]) -> Result<()> {
        for (index, command) in commands.iter().enumerate() {
            let mut stale = None;
            command.for_each_handle(|handle| {
                if stale.is_none() && !self.tables.contains(handle) {
                    stale = Some(handle.kind());
                }
            });
            if let Some(kind) = stale {
                return Err(Error::InvalidHandle(format!(
                    "command {} ({}) references a stale or destroyed {}",
                    index,
                    command_name(command),
                    kind
                )));
            }
            self.validate_command(frame, command)
                .map_err(|err| match err {
                    Error::InvalidCommand(msg) => Error::InvalidCommand(format!("command {}: {}", index, msg)),
                    other => other,
                })?;
        }
        Ok(())
    }

    /// Resource-dependent checks (handles are known to be live)
    fn validate_command(&self, frame: u64, command: &Command) -> Result<()> {
        let invalid = |msg: String| Err(Error::InvalidCommand(msg));
        let buffer = |h: BufferHandle| self.tables.buffers.get(h).map(|b| b.description());
        let texture = |h: TextureHandle| self.tables.textures.get(h).map(|t| t.description());

        match command {
            Command::BeginRendering(setup) => self.validate_rendering_setup(setup),
            Command::SetVertexBuffer { buffer: h, offset, .. } => match buffer(*h) {
                Some(desc) if !desc.usage.contains(BufferUsageFlags::VERTEX) => {
                    invalid("buffer bound as vertex buffer lacks VERTEX usage".to_string())
                }
                Some(desc) if *offset >= desc.total_size => {
                    invalid(format!("vertex buffer offset {} beyond size {}", offset, desc.total_size))
                }
                _ => Ok(()),
            },
            Command::SetIndexBuffer { buffer: h, offset, .. } => match buffer(*h) {
                Some(desc) if !desc.usage.contains(BufferUsageFlags::INDEX) => {
                    invalid("buffer bound as index buffer lacks INDEX usage".to_string())
                }
                Some(desc) if *offset >= desc.total_size => {
                    invalid(format!("index buffer offset {} beyond size {}", offset, desc.total_size))
                }
                _ => Ok(()),
            },
            Command::SetConstantBuffer { buffer: h, offset, size, .. } => match buffer(*h) {
                Some(desc) if !desc.usage.contains(BufferUsageFlags::CONSTANT) => {
                    invalid("buffer bound as constant buffer lacks CONSTANT usage".to_string())
                }
                Some(desc) if exceeds(*offset, *size, desc.total_size) => {
                    invalid(format!("constant buffer range {}+{} exceeds {}", offset, size, desc.total_size))
                }
                _ => Ok(()),
            },
            Command::UpdateBuffer { buffer: h, offset, data } => match buffer(*h) {
                Some(desc) if desc.access == ResourceAccess::Immutable => {
                    invalid("update_buffer on an immutable buffer".to_string())
                }
                Some(desc) if exceeds(*offset, data.len() as u64, desc.total_size) => invalid(format!(
                    "update_buffer range {}+{} exceeds {}",
                    offset,
                    data.len(),
                    desc.total_size
                )),
                _ => Ok(()),
            },
            Command::CopyBuffer { src, dst } => match (buffer(*src), buffer(*dst)) {
                (Some(s), Some(d)) if s.total_size != d.total_size => {
                    invalid(format!("copy_buffer size mismatch {} vs {}", s.total_size, d.total_size))
                }
                (_, Some(d)) if d.access == ResourceAccess::Immutable => {
                    invalid("copy_buffer into an immutable buffer".to_string())
                }
                _ => Ok(()),
            },
            Command::CopyBufferRegion { src, dst, region } => match (buffer(*src), buffer(*dst)) {
                (Some(s), Some(d))
                    if exceeds(region.src_offset, region.size, s.total_size)
                        || exceeds(region.dst_offset, region.size, d.total_size) =>
                {
                    invalid("copy_buffer_region out of bounds".to_string())
                }
                (_, Some(d)) if d.access == ResourceAccess::Immutable => {
                    invalid("copy_buffer_region into an immutable buffer".to_string())
                }
                _ => Ok(()),
            },
            Command::CopyTexture { src, dst } => match (texture(*src), texture(*dst)) {
                (Some(s), Some(d))
                    if s.format != d.format
                        || (s.width, s.height, s.depth) != (d.width, d.height, d.depth)
                        || s.mip_levels != d.mip_levels
                        || s.layer_count() != d.layer_count()
                        || s.sample_count != d.sample_count =>
                {
                    invalid("copy_texture between textures of different shape".to_string())
                }
                (_, Some(d)) if d.access == ResourceAccess::Immutable => {
                    invalid("copy_texture into an immutable texture".to_string())
                }
                _ => Ok(()),
            },
            Command::UpdateTexture { texture: h, region, data } => match texture(*h) {
                Some(desc) => validate_texture_update(desc, region, data.len()),
                None => Ok(()),
            },
            Command::GenerateMipMaps(h) => match texture(*h) {
                Some(desc) if desc.mip_levels < 2 => {
                    invalid("generate_mip_maps on a texture with a single mip".to_string())
                }
                Some(desc) if desc.format.is_compressed() || desc.format.is_depth() => {
                    invalid(format!("cannot generate mips for {:?}", desc.format))
                }
                _ => Ok(()),
            },
            Command::InsertTimestamp { slot } if *slot >= self.timestamps.count(frame) => {
                invalid(format!("timestamp slot {} was not allocated in frame {}", slot, frame))
            }
            _ => Ok(()),
        }
    }

    /// Attachment formats and sizes must agree
    fn validate_rendering_setup(&self, setup: &RenderingSetup) -> Result<()> {
        let mut extent: Option<(u32, u32, u32)> = None;
        let attachments = setup
            .color_attachments
            .iter()
            .map(|a| (a.view, false))
            .chain(setup.depth_stencil.iter().map(|d| (d.view, true)));

        for (view, is_depth_slot) in attachments {
            let (view_desc, texture_desc) = match self
                .tables
                .render_target_views
                .get(view)
                .and_then(|v| self.tables.textures.get(v.description().texture).map(|t| (v, t)))
            {
                Some((v, t)) => (*v.description(), t.description()),
                None => return Err(missing(ResourceKind::Texture, "rendering attachment")),
            };
            let format = view_desc.format.unwrap_or(texture_desc.format);
            if format.is_depth() != is_depth_slot {
                return Err(Error::InvalidCommand(format!(
                    "{:?} view bound as a {} attachment",
                    format,
                    if is_depth_slot { "depth" } else { "color" }
                )));
            }
            let this = (
                mip_extent(texture_desc.width, view_desc.mip_level),
                mip_extent(texture_desc.height, view_desc.mip_level),
                texture_desc.sample_count,
            );
            match extent {
                None => extent = Some(this),
                Some(first) if first != this => {
                    return Err(Error::InvalidCommand(format!(
                        "attachment size/samples {:?} differ from {:?}",
                        this, first
                    )));
                }
                _ => {}
            }
        }
        Ok(())
    }

    // ===== STATISTICS =====

    /// Counters of the current frame
    pub fn stats(&self) -> DeviceStats {
        DeviceStats { live_resources: self.tables.total(), ..self.stats }
    }

    pub fn resource_count(&self, kind: ResourceKind) -> usize {
        self.tables.count(kind)
    }

    /// Live resources per type (types with no live resource are omitted)
    pub fn resource_counts(&self) -> Vec<(ResourceKind, usize)> {
        ResourceKind::ALL
            .iter()
            .map(|kind| (*kind, self.tables.count(*kind)))
            .filter(|(_, count)| *count > 0)
            .collect()
    }

    pub fn live_resource_count(&self) -> usize {
        self.tables.total()
    }

    // ===== SHUTDOWN =====

    /// Wait for the GPU, report leaked resources and force-release them
    ///
    /// Returns the leaked resources per type. Called automatically on drop.
    pub fn shutdown(&mut self) -> Vec<(ResourceKind, usize)> {
        if self.shut_down {
            return Vec::new();
        }
        if !self.lost {
            if let Err(err) = self.backend.wait_idle() {
                engine_warn!(SOURCE, "wait_idle failed during shutdown: {}", err);
            }
        }

        let leaks = self.resource_counts();
        if !leaks.is_empty() {
            let total: usize = leaks.iter().map(|(_, count)| count).sum();
            let detail = leaks
                .iter()
                .map(|(kind, count)| format!("{} {}", count, kind))
                .collect::<Vec<_>>()
                .join(", ");
            engine_warn!(SOURCE, "{} resources leaked at shutdown ({}), releasing them", total, detail);
        }

        self.release_all();
        self.shut_down = true;
        engine_info!(SOURCE, "Device shut down after {} frames", self.next_frame);
        leaks
    }

    /// Views go first so no native view outlives its resource
    fn release_all(&mut self) {
        let backend = &mut self.backend;
        let tables = &mut self.tables;
        for kind in ResourceKind::ALL {
            match kind {
                ResourceKind::Query => drain_table(&mut tables.queries, kind, |n| backend.deinit_query(n)),
                ResourceKind::ResourceView => {
                    drain_table(&mut tables.resource_views, kind, |n| backend.deinit_resource_view(n))
                }
                ResourceKind::RenderTargetView => drain_table(&mut tables.render_target_views, kind, |n| {
                    backend.deinit_render_target_view(n)
                }),
                ResourceKind::UnorderedAccessView => drain_table(&mut tables.unordered_access_views, kind, |n| {
                    backend.deinit_unordered_access_view(n)
                }),
                ResourceKind::VertexDeclaration => drain_table(&mut tables.vertex_declarations, kind, |n| {
                    backend.deinit_vertex_declaration(n)
                }),
                ResourceKind::Shader => drain_table(&mut tables.shaders, kind, |n| backend.deinit_shader(n)),
                ResourceKind::BlendState => {
                    drain_table(&mut tables.blend_states, kind, |n| backend.deinit_blend_state(n))
                }
                ResourceKind::DepthStencilState => drain_table(&mut tables.depth_stencil_states, kind, |n| {
                    backend.deinit_depth_stencil_state(n)
                }),
                ResourceKind::RasterizerState => {
                    drain_table(&mut tables.rasterizer_states, kind, |n| backend.deinit_rasterizer_state(n))
                }
                ResourceKind::SamplerState => {
                    drain_table(&mut tables.sampler_states, kind, |n| backend.deinit_sampler_state(n))
                }
                ResourceKind::Texture => drain_table(&mut tables.textures, kind, |n| backend.deinit_texture(n)),
                ResourceKind::Buffer => drain_table(&mut tables.buffers, kind, |n| backend.deinit_buffer(n)),
            }
        }
        self.texture_views.clear();
        self.buffer_views.clear();
        self.blend_cache.clear();
        self.depth_stencil_cache.clear();
        self.rasterizer_cache.clear();
        self.sampler_cache.clear();
        engine_debug!(SOURCE, "All device resources released");
    }
}

impl<B: Backend> Drop for Device<B> {
    fn drop(&mut self) {
        self.shutdown();
    }
}

/// Region and data size of a texture upload
/// Whether `offset..offset + size` reaches past `total` (overflow counts as past)
fn exceeds(offset: u64, size: u64, total: u64) -> bool {
    offset.checked_add(size).map_or(true, |end| end > total)
}

fn validate_texture_update(desc: &TextureCreationDescription, region: &crate::command::TextureRegion, len: usize) -> Result<()> {
    let invalid = |msg: String| Err(Error::InvalidCommand(msg));
    if desc.access == ResourceAccess::Immutable {
        return invalid("update_texture on an immutable texture".to_string());
    }
    if desc.sample_count > 1 {
        return invalid("update_texture on a multisampled texture".to_string());
    }
    if region.mip_level >= desc.mip_levels || region.array_layer >= desc.layer_count() {
        return invalid(format!(
            "update_texture mip {} layer {} out of range",
            region.mip_level, region.array_layer
        ));
    }
    let mip = [
        mip_extent(desc.width, region.mip_level),
        mip_extent(desc.height, region.mip_level),
        mip_extent(desc.depth, region.mip_level),
    ];
    for axis in 0..3 {
        if region.offset[axis].checked_add(region.extent[axis]).map_or(true, |end| end > mip[axis]) {
            return invalid(format!("update_texture region exceeds mip extent {:?}", mip));
        }
    }
    let (block_w, block_h) = desc.format.block_extent();
    if region.offset[0] % block_w != 0 || region.offset[1] % block_h != 0 {
        return invalid("update_texture offset not aligned to the compression block".to_string());
    }
    let expected = desc.format.slice_pitch(region.extent[0], region.extent[1]) * region.extent[2] as u64;
    if len as u64 != expected {
        return invalid(format!("update_texture data is {} bytes, region needs {}", len, expected));
    }
    Ok(())
}

fn command_name(command: &Command) -> &'static str {
    match command {
        Command::BeginRendering(_) => "begin_rendering",
        Command::EndRendering => "end_rendering",
        Command::BeginCompute => "begin_compute_pass",
        Command::EndCompute => "end_compute_pass",
        Command::SetShader(_) => "set_shader",
        Command::SetVertexDeclaration(_) => "set_vertex_declaration",
        Command::SetPrimitiveTopology(_) => "set_primitive_topology",
        Command::SetVertexBuffer { .. } => "set_vertex_buffer",
        Command::SetIndexBuffer { .. } => "set_index_buffer",
        Command::SetConstantBuffer { .. } => "set_constant_buffer",
        Command::SetResourceView { .. } => "set_resource_view",
        Command::SetUnorderedAccessView { .. } => "set_unordered_access_view",
        Command::SetSampler { .. } => "set_sampler",
        Command::SetBlendState { .. } => "set_blend_state",
        Command::SetDepthStencilState { .. } => "set_depth_stencil_state",
        Command::SetRasterizerState(_) => "set_rasterizer_state",
        Command::SetViewport(_) => "set_viewport",
        Command::SetScissor(_) => "set_scissor",
        Command::Draw { .. } => "draw",
        Command::DrawInstanced { .. } => "draw_instanced",
        Command::DrawIndexed { .. } => "draw_indexed",
        Command::DrawIndexedInstanced { .. } => "draw_indexed_instanced",
        Command::Dispatch { .. } => "dispatch",
        Command::CopyBuffer { .. } => "copy_buffer",
        Command::CopyBufferRegion { .. } => "copy_buffer_region",
        Command::UpdateBuffer { .. } => "update_buffer",
        Command::CopyTexture { .. } => "copy_texture",
        Command::UpdateTexture { .. } => "update_texture",
        Command::GenerateMipMaps(_) => "generate_mip_maps",
        Command::BeginQuery(_) => "begin_query",
        Command::EndQuery(_) => "end_query",
        Command::InsertTimestamp { .. } => "insert_timestamp",
        Command::PushMarker(_) => "push_marker",
        Command::PopMarker => "pop_marker",
        Command::InsertEventMarker(_) => "insert_event_marker",
    }
}

#[cfg(test)]
#[path = "device_tests.rs"]
mod tests;
