/// VulkanBackend - Vulkan 1.3 implementation of the GAL backend hooks
///
/// The backend is headless: it creates an instance, picks an adapter and
/// opens one graphics queue. Frames are recorded into a ring of
/// `frames_in_flight` slots; natives released by the device are destroyed
/// once the frame they were released in has completed on the GPU.

use std::ffi::CString;
use std::mem::ManuallyDrop;
use std::sync::{Arc, Mutex};
use ash::vk;
use gpu_allocator::vulkan::{Allocator, AllocatorCreateDesc};
use gal_engine::gal::command::Command;
use gal_engine::gal::resource::*;
use gal_engine::gal::{
    Backend, BackendKind, BackendObject, DeviceConfig, Error, ResourceTables, Result, ViewTarget,
};
use gal_engine::{engine_bail, engine_debug, engine_error, engine_info, engine_trace, engine_warn};

use crate::debug;
use crate::vulkan_buffer::{create_buffer, Buffer};
use crate::vulkan_command::CommandRecorder;
use crate::vulkan_context::{vk_error, GpuContext};
use crate::vulkan_format::{format_to_vk, support_from_properties};
use crate::vulkan_frame::{DeferredRelease, DeletionQueue, FrameSlot};
use crate::vulkan_layout::LayoutTracker;
use crate::vulkan_pipeline::{PipelineCache, PipelineFeatures};
use crate::vulkan_query::{OcclusionQueryPool, Query};
use crate::vulkan_shader::{create_shader, Shader};
use crate::vulkan_staging::StagingBufferPool;
use crate::vulkan_state::{create_sampler, BlendState, DepthStencilState, RasterizerState, SamplerState};
use crate::vulkan_texture::{create_texture, Texture};
use crate::vulkan_vertex_declaration::{create_vertex_declaration, VertexDeclaration};
use crate::vulkan_view::{
    create_buffer_shader_view, create_render_target_view, create_texture_shader_view, RenderTargetView, ShaderView,
};
use crate::SOURCE;

const VALIDATION_LAYER: &std::ffi::CStr = c"VK_LAYER_KHRONOS_validation";

/// Mask of the bits a queue family writes in timestamps
pub(crate) fn timestamp_mask(valid_bits: u32) -> u64 {
    match valid_bits {
        0 => 0,
        bits if bits >= 64 => u64::MAX,
        bits => (1u64 << bits) - 1,
    }
}

/// Preference of an adapter type, higher is better
pub(crate) fn adapter_score(device_type: vk::PhysicalDeviceType) -> u32 {
    match device_type {
        vk::PhysicalDeviceType::DISCRETE_GPU => 3,
        vk::PhysicalDeviceType::INTEGRATED_GPU => 2,
        vk::PhysicalDeviceType::VIRTUAL_GPU => 1,
        _ => 0,
    }
}

fn init_error(context: &str, result: vk::Result) -> Error {
    engine_error!(SOURCE, "{}: {:?}", context, result);
    Error::InitializationFailed(format!("{}: {:?}", context, result))
}

/// Vulkan backend
///
/// Owns the shared `GpuContext` and every backend-wide sub-system: staging
/// memory, image layout tracking, the pipeline cache, the occlusion query pool
/// and the frame ring.
pub struct VulkanBackend {
    _entry: ash::Entry,
    ctx: Arc<GpuContext>,
    adapter_name: String,

    /// Dropped before the allocator (it holds an `Arc<GpuContext>`)
    staging: ManuallyDrop<StagingBufferPool>,
    layouts: LayoutTracker,
    pipelines: PipelineCache,
    queries: OcclusionQueryPool,

    frames: Vec<FrameSlot>,
    deletions: DeletionQueue<DeferredRelease>,

    /// Identity source for pipeline cache keys
    next_id: u64,
    recording: Option<u64>,
    last_submitted: Option<u64>,
    completed: Option<u64>,

    max_anisotropy: f32,
    timestamp_period: f64,
    timestamp_mask: u64,
}

impl VulkanBackend {
    /// Create a headless Vulkan 1.3 device
    pub fn new(config: &DeviceConfig) -> Result<Self> {
        config.validate()?;
        unsafe {
            let entry = ash::Entry::load().map_err(|e| {
                engine_error!(SOURCE, "Failed to load Vulkan library: {:?}", e);
                Error::InitializationFailed(format!("Failed to load Vulkan library: {:?}", e))
            })?;

            let app_name = CString::new(config.app_name.replace('\0', " ")).unwrap_or_default();
            let (major, minor, patch) = config.app_version;
            let app_info = vk::ApplicationInfo::default()
                .application_name(&app_name)
                .application_version(vk::make_api_version(0, major, minor, patch))
                .engine_name(c"GAL")
                .engine_version(vk::make_api_version(0, 0, 1, 0))
                .api_version(vk::API_VERSION_1_3);

            // Validation layer, when installed
            let mut validation = config.enable_validation;
            if validation {
                let layers = entry
                    .enumerate_instance_layer_properties()
                    .map_err(|e| init_error("Failed to enumerate instance layers", e))?;
                let available = layers
                    .iter()
                    .any(|layer| layer.layer_name_as_c_str().map_or(false, |name| name == VALIDATION_LAYER));
                if !available {
                    engine_warn!(SOURCE, "Validation requested but VK_LAYER_KHRONOS_validation is not installed");
                    validation = false;
                }
            }
            let layer_names = if validation { vec![VALIDATION_LAYER.as_ptr()] } else { vec![] };
            let extension_names = if validation { vec![ash::ext::debug_utils::NAME.as_ptr()] } else { vec![] };

            let create_info = vk::InstanceCreateInfo::default()
                .application_info(&app_info)
                .enabled_layer_names(&layer_names)
                .enabled_extension_names(&extension_names);
            let instance = entry
                .create_instance(&create_info, None)
                .map_err(|e| init_error("Failed to create Vulkan instance", e))?;

            let (debug_utils_loader, debug_messenger) = if validation {
                let debug_utils = ash::ext::debug_utils::Instance::new(&entry, &instance);
                debug::init_debug_config(debug::Config::from_device_config(config));

                let debug_info = vk::DebugUtilsMessengerCreateInfoEXT::default()
                    .message_severity(debug::severity_flags(config.debug_severity))
                    .message_type(
                        vk::DebugUtilsMessageTypeFlagsEXT::GENERAL
                            | vk::DebugUtilsMessageTypeFlagsEXT::VALIDATION
                            | vk::DebugUtilsMessageTypeFlagsEXT::PERFORMANCE,
                    )
                    .pfn_user_callback(Some(debug::vulkan_debug_callback));
                let messenger = debug_utils
                    .create_debug_utils_messenger(&debug_info, None)
                    .map_err(|e| init_error("Failed to create debug messenger", e))?;
                (Some(debug_utils), Some(messenger))
            } else {
                (None, None)
            };

            // Adapter: Vulkan 1.3 with a graphics queue, discrete GPUs first
            let physical_devices = instance
                .enumerate_physical_devices()
                .map_err(|e| init_error("Failed to enumerate physical devices", e))?;
            let mut candidates: Vec<(vk::PhysicalDevice, vk::PhysicalDeviceProperties, u32)> = physical_devices
                .into_iter()
                .filter_map(|pd| {
                    let properties = instance.get_physical_device_properties(pd);
                    if properties.api_version < vk::API_VERSION_1_3 {
                        return None;
                    }
                    instance
                        .get_physical_device_queue_family_properties(pd)
                        .iter()
                        .position(|qf| qf.queue_flags.contains(vk::QueueFlags::GRAPHICS))
                        .map(|family| (pd, properties, family as u32))
                })
                .collect();
            candidates.sort_by_key(|(_, properties, _)| std::cmp::Reverse(adapter_score(properties.device_type)));
            let Some((physical_device, properties, graphics_family)) = candidates.into_iter().next() else {
                engine_bail!(SOURCE, Error::InitializationFailed => "No Vulkan 1.3 GPU with a graphics queue found");
            };
            let adapter_name = properties
                .device_name_as_c_str()
                .map(|name| name.to_string_lossy().into_owned())
                .unwrap_or_else(|_| "unknown adapter".to_string());
            let queue_families = instance.get_physical_device_queue_family_properties(physical_device);
            let timestamp_valid_bits = queue_families[graphics_family as usize].timestamp_valid_bits;

            // Features
            let mut supported12 = vk::PhysicalDeviceVulkan12Features::default();
            let mut supported13 = vk::PhysicalDeviceVulkan13Features::default();
            let supported = {
                let mut features2 = vk::PhysicalDeviceFeatures2::default()
                    .push_next(&mut supported12)
                    .push_next(&mut supported13);
                instance.get_physical_device_features2(physical_device, &mut features2);
                features2.features
            };
            if supported13.dynamic_rendering == vk::FALSE {
                engine_bail!(SOURCE, Error::InitializationFailed => "{} does not support dynamic rendering", adapter_name);
            }
            if supported13.synchronization2 == vk::FALSE {
                engine_bail!(SOURCE, Error::InitializationFailed => "{} does not support synchronization2", adapter_name);
            }
            if supported12.host_query_reset == vk::FALSE {
                engine_bail!(SOURCE, Error::InitializationFailed => "{} does not support host query reset", adapter_name);
            }

            let enabled = vk::PhysicalDeviceFeatures::default()
                .sampler_anisotropy(supported.sampler_anisotropy == vk::TRUE)
                .fill_mode_non_solid(supported.fill_mode_non_solid == vk::TRUE)
                .depth_clamp(supported.depth_clamp == vk::TRUE)
                .tessellation_shader(supported.tessellation_shader == vk::TRUE)
                .geometry_shader(supported.geometry_shader == vk::TRUE)
                .occlusion_query_precise(supported.occlusion_query_precise == vk::TRUE);
            let mut enabled12 = vk::PhysicalDeviceVulkan12Features::default()
                .host_query_reset(true)
                .sampler_mirror_clamp_to_edge(supported12.sampler_mirror_clamp_to_edge == vk::TRUE);
            let mut enabled13 = vk::PhysicalDeviceVulkan13Features::default()
                .dynamic_rendering(true)
                .synchronization2(true);

            let queue_priorities = [1.0];
            let queue_create_infos = [vk::DeviceQueueCreateInfo::default()
                .queue_family_index(graphics_family)
                .queue_priorities(&queue_priorities)];
            let device_create_info = vk::DeviceCreateInfo::default()
                .queue_create_infos(&queue_create_infos)
                .enabled_features(&enabled)
                .push_next(&mut enabled12)
                .push_next(&mut enabled13);
            let device = instance
                .create_device(physical_device, &device_create_info, None)
                .map_err(|e| init_error("Failed to create logical device", e))?;
            let graphics_queue = device.get_device_queue(graphics_family, 0);

            let allocator = Allocator::new(&AllocatorCreateDesc {
                instance: instance.clone(),
                device: device.clone(),
                physical_device,
                debug_settings: Default::default(),
                buffer_device_address: false,
                allocation_sizes: Default::default(),
            })
            .map_err(|e| {
                engine_error!(SOURCE, "Failed to create GPU allocator: {:?}", e);
                Error::InitializationFailed(format!("Failed to create allocator: {:?}", e))
            })?;

            let upload_pool_info = vk::CommandPoolCreateInfo::default()
                .queue_family_index(graphics_family)
                .flags(vk::CommandPoolCreateFlags::TRANSIENT | vk::CommandPoolCreateFlags::RESET_COMMAND_BUFFER);
            let upload_command_pool = device
                .create_command_pool(&upload_pool_info, None)
                .map_err(|e| init_error("Failed to create upload command pool", e))?;

            let debug_utils_device = validation.then(|| ash::ext::debug_utils::Device::new(&instance, &device));

            let ctx = Arc::new(GpuContext {
                device,
                instance,
                physical_device,
                properties,
                allocator: ManuallyDrop::new(Mutex::new(allocator)),
                graphics_queue,
                graphics_queue_family: graphics_family,
                upload_command_pool: Mutex::new(upload_command_pool),
                debug_utils_loader,
                debug_messenger,
                debug_utils_device,
            });

            let frames = (0..config.frames_in_flight)
                .map(|_| FrameSlot::new(&ctx, config.max_timestamps_per_frame))
                .collect::<Result<Vec<_>>>()?;
            let features = PipelineFeatures {
                fill_mode_non_solid: supported.fill_mode_non_solid == vk::TRUE,
                depth_clamp: supported.depth_clamp == vk::TRUE,
            };
            let pipelines = PipelineCache::new(&ctx, features)?;
            let queries =
                OcclusionQueryPool::new(&ctx, config.max_queries, supported.occlusion_query_precise == vk::TRUE)?;
            let max_anisotropy = if supported.sampler_anisotropy == vk::TRUE {
                properties.limits.max_sampler_anisotropy
            } else {
                1.0
            };

            engine_info!(
                SOURCE,
                "Vulkan device created on {} ({} frames in flight, validation {})",
                adapter_name,
                config.frames_in_flight,
                if validation { "on" } else { "off" }
            );

            Ok(Self {
                _entry: entry,
                staging: ManuallyDrop::new(StagingBufferPool::new(Arc::clone(&ctx), config.staging_chunk_size)),
                ctx,
                adapter_name,
                layouts: LayoutTracker::new(),
                pipelines,
                queries,
                frames,
                deletions: DeletionQueue::new(),
                next_id: 1,
                recording: None,
                last_submitted: None,
                completed: None,
                max_anisotropy,
                timestamp_period: properties.limits.timestamp_period as f64,
                timestamp_mask: timestamp_mask(timestamp_valid_bits),
            })
        }
    }

    /// Shared GPU objects (device, allocator, queue)
    pub fn context(&self) -> &Arc<GpuContext> {
        &self.ctx
    }

    /// Staging memory used by uploads
    pub fn staging_pool(&mut self) -> &mut StagingBufferPool {
        &mut self.staging
    }

    /// Number of cached graphics and compute pipelines
    pub fn pipeline_count(&self) -> usize {
        self.pipelines.len()
    }

    fn allocate_id(&mut self) -> u64 {
        let id = self.next_id;
        self.next_id += 1;
        id
    }

    fn slot_index(&self, frame: u64) -> usize {
        (frame % self.frames.len() as u64) as usize
    }

    /// Frame a released native may still be used by
    fn release_frame(&self) -> u64 {
        self.recording.or(self.last_submitted).unwrap_or(0)
    }

    fn defer(&mut self, release: DeferredRelease) {
        let frame = self.release_frame();
        self.deletions.push(frame, release);
    }

    /// Drop cached pipelines built from object `id`
    fn evict_pipelines(&mut self, id: u64) {
        let evicted = self.pipelines.evict(id);
        if !evicted.is_empty() {
            engine_trace!(SOURCE, "Evicted {} pipelines built from object {}", evicted.len(), id);
        }
        for pipeline in evicted {
            self.defer(DeferredRelease::Pipeline(pipeline));
        }
    }

    /// Check the fences of in-flight slots without blocking
    fn poll_fences(&mut self) -> Result<()> {
        for slot in &mut self.frames {
            if !slot.in_flight {
                continue;
            }
            let signaled = unsafe { self.ctx.device.get_fence_status(slot.fence) }
                .map_err(|e| vk_error("Failed to query frame fence", e))?;
            if signaled {
                slot.in_flight = false;
                self.completed = self.completed.max(slot.frame);
            }
        }
        Ok(())
    }

    /// Release natives and staging memory of completed frames
    fn collect_garbage(&mut self) {
        let Some(completed) = self.completed else {
            return;
        };
        let ready = self.deletions.drain_completed(completed);
        if !ready.is_empty() {
            engine_debug!(SOURCE, "Releasing {} deferred natives (frame {})", ready.len(), completed);
        }
        for release in ready {
            unsafe { release.release(&self.ctx) };
        }
        self.staging.retire_completed(completed);
    }

    fn set_name<H: vk::Handle>(&self, handle: H, name: &str) {
        let Some(debug_utils) = &self.ctx.debug_utils_device else {
            return;
        };
        let Ok(name) = CString::new(name) else {
            return;
        };
        let info = vk::DebugUtilsObjectNameInfoEXT::default().object_handle(handle).object_name(&name);
        if let Err(e) = unsafe { debug_utils.set_debug_utils_object_name(&info) } {
            engine_warn!(SOURCE, "Failed to set debug name {:?}: {:?}", name, e);
        }
    }

    fn shader_view(&self, target: ViewTarget<'_, Self>, format: Option<Format>, storage: bool) -> Result<ShaderView> {
        match target {
            ViewTarget::Texture { native, desc, format, range } => {
                create_texture_shader_view(&self.ctx, native, desc, format, &range, storage)
            }
            ViewTarget::Buffer { native, desc, range } => {
                create_buffer_shader_view(&self.ctx, native, desc, format, &range)
            }
        }
    }
}

impl Backend for VulkanBackend {
    type Buffer = Buffer;
    type Texture = Texture;
    type ResourceView = ShaderView;
    type RenderTargetView = RenderTargetView;
    type UnorderedAccessView = ShaderView;
    type Shader = Shader;
    type VertexDeclaration = VertexDeclaration;
    type BlendState = BlendState;
    type DepthStencilState = DepthStencilState;
    type RasterizerState = RasterizerState;
    type SamplerState = SamplerState;
    type Query = Query;

    fn kind(&self) -> BackendKind {
        BackendKind::Vulkan
    }

    fn adapter_name(&self) -> String {
        self.adapter_name.clone()
    }

    fn format_support(&self, format: Format) -> FormatSupport {
        let vk_format = format_to_vk(format);
        if vk_format == vk::Format::UNDEFINED {
            return FormatSupport::empty();
        }
        let properties = unsafe {
            self.ctx
                .instance
                .get_physical_device_format_properties(self.ctx.physical_device, vk_format)
        };
        support_from_properties(format, &properties)
    }

    // ===== BUFFERS AND TEXTURES =====

    fn init_buffer(&mut self, desc: &BufferCreationDescription, initial_data: Option<&[u8]>) -> Result<Buffer> {
        create_buffer(&self.ctx, &mut self.staging, desc, initial_data)
    }

    fn deinit_buffer(&mut self, native: Buffer) -> Result<()> {
        self.defer(native.into_release());
        Ok(())
    }

    fn init_texture(&mut self, desc: &TextureCreationDescription, initial_data: Option<&[u8]>) -> Result<Texture> {
        create_texture(&self.ctx, &mut self.staging, &mut self.layouts, desc, initial_data)
    }

    fn deinit_texture(&mut self, native: Texture) -> Result<()> {
        self.layouts.forget(native.image);
        self.defer(native.into_release());
        Ok(())
    }

    // ===== VIEWS =====

    fn init_resource_view(&mut self, desc: &ResourceViewDescription, target: ViewTarget<'_, Self>) -> Result<ShaderView> {
        self.shader_view(target, desc.format, false)
    }

    fn deinit_resource_view(&mut self, native: ShaderView) -> Result<()> {
        if let Some(release) = native.into_release() {
            self.defer(release);
        }
        Ok(())
    }

    fn init_render_target_view(
        &mut self,
        _desc: &RenderTargetViewDescription,
        target: ViewTarget<'_, Self>,
    ) -> Result<RenderTargetView> {
        match target {
            ViewTarget::Texture { native, desc, format, range } => {
                create_render_target_view(&self.ctx, native, desc, format, &range)
            }
            ViewTarget::Buffer { .. } => {
                engine_bail!(SOURCE, Error::InvalidResource => "render target views need a texture")
            }
        }
    }

    fn deinit_render_target_view(&mut self, native: RenderTargetView) -> Result<()> {
        self.defer(native.into_release());
        Ok(())
    }

    fn init_unordered_access_view(
        &mut self,
        desc: &UnorderedAccessViewDescription,
        target: ViewTarget<'_, Self>,
    ) -> Result<ShaderView> {
        self.shader_view(target, desc.format, true)
    }

    fn deinit_unordered_access_view(&mut self, native: ShaderView) -> Result<()> {
        self.deinit_resource_view(native)
    }

    // ===== SHADERS =====

    fn init_shader(&mut self, desc: &ShaderCreationDescription) -> Result<Shader> {
        let id = self.allocate_id();
        create_shader(&self.ctx, id, desc)
    }

    fn deinit_shader(&mut self, native: Shader) -> Result<()> {
        self.evict_pipelines(native.id);
        for release in native.into_release() {
            self.defer(release);
        }
        Ok(())
    }

    fn init_vertex_declaration(
        &mut self,
        desc: &VertexDeclarationDescription,
        shader: &Shader,
        _shader_desc: &ShaderCreationDescription,
    ) -> Result<VertexDeclaration> {
        let id = self.allocate_id();
        create_vertex_declaration(id, desc, shader)
    }

    fn deinit_vertex_declaration(&mut self, native: VertexDeclaration) -> Result<()> {
        self.evict_pipelines(native.id);
        Ok(())
    }

    // ===== STATE OBJECTS =====

    fn init_blend_state(&mut self, _desc: &BlendStateDescription) -> Result<BlendState> {
        Ok(BlendState { id: self.allocate_id() })
    }

    fn deinit_blend_state(&mut self, native: BlendState) -> Result<()> {
        self.evict_pipelines(native.id);
        Ok(())
    }

    fn init_depth_stencil_state(&mut self, _desc: &DepthStencilStateDescription) -> Result<DepthStencilState> {
        Ok(DepthStencilState { id: self.allocate_id() })
    }

    fn deinit_depth_stencil_state(&mut self, native: DepthStencilState) -> Result<()> {
        self.evict_pipelines(native.id);
        Ok(())
    }

    fn init_rasterizer_state(&mut self, _desc: &RasterizerStateDescription) -> Result<RasterizerState> {
        Ok(RasterizerState { id: self.allocate_id() })
    }

    fn deinit_rasterizer_state(&mut self, native: RasterizerState) -> Result<()> {
        self.evict_pipelines(native.id);
        Ok(())
    }

    fn init_sampler_state(&mut self, desc: &SamplerStateDescription) -> Result<SamplerState> {
        create_sampler(&self.ctx, desc, self.max_anisotropy)
    }

    fn deinit_sampler_state(&mut self, native: SamplerState) -> Result<()> {
        self.defer(native.into_release());
        Ok(())
    }

    fn init_query(&mut self, desc: &QueryCreationDescription) -> Result<Query> {
        self.queries.allocate(desc.query_type)
    }

    fn deinit_query(&mut self, native: Query) -> Result<()> {
        self.queries.free(native);
        Ok(())
    }

    fn set_debug_name(&mut self, object: BackendObject<'_, Self>, name: &str) {
        if !self.ctx.has_debug_utils() {
            return;
        }
        match object {
            BackendObject::Buffer(buffer) => self.set_name(buffer.buffer, name),
            BackendObject::Texture(texture) => self.set_name(texture.image, name),
            BackendObject::ResourceView(view) | BackendObject::UnorderedAccessView(view) => match view {
                ShaderView::Image { view, .. } => self.set_name(*view, name),
                ShaderView::TexelBuffer { view } => self.set_name(*view, name),
                ShaderView::Buffer { .. } => {}
            },
            BackendObject::RenderTargetView(view) => self.set_name(view.view, name),
            BackendObject::Shader(shader) => {
                for module in &shader.modules {
                    self.set_name(module.module, name);
                }
                self.set_name(shader.pipeline_layout, name);
            }
            BackendObject::SamplerState(sampler) => self.set_name(sampler.sampler, name),
            // No native object of their own
            BackendObject::VertexDeclaration(_)
            | BackendObject::BlendState(_)
            | BackendObject::DepthStencilState(_)
            | BackendObject::RasterizerState(_)
            | BackendObject::Query(_) => {}
        }
    }

    // ===== FRAMES =====

    fn wait_for_frame(&mut self, frame: u64) -> Result<()> {
        if self.last_submitted.map_or(true, |last| last < frame) {
            engine_bail!(SOURCE, "frame {} was never submitted", frame);
        }
        if self.completed.map_or(false, |done| done >= frame) {
            return Ok(());
        }
        let index = self.slot_index(frame);
        let slot = &mut self.frames[index];
        // A slot only moves to a newer frame once its previous one completed
        if slot.in_flight && slot.frame.map_or(false, |f| f >= frame) {
            unsafe {
                self.ctx
                    .device
                    .wait_for_fences(&[slot.fence], true, u64::MAX)
                    .map_err(|e| vk_error("Failed to wait for frame fence", e))?;
            }
            slot.in_flight = false;
            self.completed = self.completed.max(slot.frame);
        }
        self.completed = self.completed.max(Some(frame));
        self.collect_garbage();
        Ok(())
    }

    fn begin_frame(&mut self, frame: u64) -> Result<()> {
        let index = self.slot_index(frame);
        if self.frames[index].in_flight {
            if let Some(previous) = self.frames[index].frame {
                self.wait_for_frame(previous)?;
            }
        }
        self.poll_fences()?;
        self.collect_garbage();
        self.frames[index].begin(&self.ctx, frame)?;
        self.recording = Some(frame);
        Ok(())
    }

    fn submit(&mut self, frame: u64, commands: &[Command], resources: &ResourceTables<Self>) -> Result<()> {
        if self.recording != Some(frame) {
            engine_bail!(SOURCE, Error::InvalidCommand => "submit for frame {} outside its recording", frame);
        }
        let index = self.slot_index(frame);
        let mut recorder = CommandRecorder::new(
            &self.ctx,
            resources,
            frame,
            &mut self.frames[index],
            &mut self.pipelines,
            &mut self.layouts,
            &mut self.staging,
            &mut self.queries,
        );
        recorder.record(commands)
    }

    fn end_frame(&mut self, frame: u64, timestamp_count: u32) -> Result<()> {
        if self.recording != Some(frame) {
            engine_bail!(SOURCE, Error::InvalidCommand => "end_frame for frame {} outside its recording", frame);
        }
        let index = self.slot_index(frame);
        let slot = &mut self.frames[index];
        if timestamp_count > slot.timestamp_capacity {
            engine_warn!(
                SOURCE,
                "Frame {} allocated {} timestamps, only {} are recorded",
                frame,
                timestamp_count,
                slot.timestamp_capacity
            );
        }
        unsafe {
            self.ctx
                .device
                .end_command_buffer(slot.command_buffer)
                .map_err(|e| vk_error("Failed to end frame command buffer", e))?;
            let command_buffers = [slot.command_buffer];
            let submit_info = vk::SubmitInfo::default().command_buffers(&command_buffers);
            self.ctx
                .device
                .queue_submit(self.ctx.graphics_queue, &[submit_info], slot.fence)
                .map_err(|e| vk_error("Failed to submit frame", e))?;
        }
        slot.in_flight = true;
        self.recording = None;
        self.last_submitted = Some(frame);
        engine_trace!(SOURCE, "Frame {} submitted", frame);
        Ok(())
    }

    fn completed_frame(&mut self) -> Result<Option<u64>> {
        self.poll_fences()?;
        self.collect_garbage();
        Ok(self.completed)
    }

    fn timestamp_period(&self) -> f64 {
        self.timestamp_period
    }

    fn read_timestamps(&mut self, frame: u64, count: u32) -> Result<Vec<Option<u64>>> {
        let mut ticks = vec![None; count as usize];
        let index = self.slot_index(frame);
        let slot = &self.frames[index];
        if slot.frame != Some(frame) || slot.in_flight || self.timestamp_mask == 0 {
            return Ok(ticks);
        }
        let readable = count.min(slot.timestamp_capacity) as usize;
        if readable == 0 {
            return Ok(ticks);
        }

        // [ticks, availability] per slot
        let mut data = vec![[0u64; 2]; readable];
        let fetched = unsafe {
            self.ctx.device.get_query_pool_results(
                slot.timestamp_pool,
                0,
                &mut data,
                vk::QueryResultFlags::TYPE_64 | vk::QueryResultFlags::WITH_AVAILABILITY,
            )
        };
        match fetched {
            Ok(()) | Err(vk::Result::NOT_READY) => {}
            Err(e) => return Err(vk_error("Failed to read timestamps", e)),
        }
        for (tick, [value, available]) in ticks.iter_mut().zip(data) {
            if available != 0 {
                *tick = Some(value & self.timestamp_mask);
            }
        }
        Ok(ticks)
    }

    fn query_result(&mut self, query: &Query) -> Result<Option<u64>> {
        self.poll_fences()?;
        self.queries.result(&self.ctx, query, self.completed)
    }

    fn wait_idle(&mut self) -> Result<()> {
        unsafe {
            self.ctx
                .device
                .device_wait_idle()
                .map_err(|e| vk_error("Failed to wait for device idle", e))?;
        }
        for slot in &mut self.frames {
            slot.in_flight = false;
        }
        self.completed = self.completed.max(self.last_submitted);
        self.collect_garbage();
        Ok(())
    }
}

impl Drop for VulkanBackend {
    fn drop(&mut self) {
        unsafe {
            if let Err(e) = self.ctx.device.device_wait_idle() {
                engine_warn!(SOURCE, "device_wait_idle failed during teardown: {:?}", e);
            }

            // 1. Everything the GPU may have been using
            for release in self.deletions.drain_all() {
                release.release(&self.ctx);
            }
            for slot in &mut self.frames {
                slot.destroy(&self.ctx);
            }
            self.frames.clear();
            self.queries.destroy(&self.ctx);
            self.pipelines.destroy(&self.ctx);

            // 2. Staging memory, then the pool's Arc so the context is uniquely owned
            self.staging.destroy();
            ManuallyDrop::drop(&mut self.staging);

            if let Ok(mut pool) = self.ctx.upload_command_pool.lock() {
                if *pool != vk::CommandPool::null() {
                    self.ctx.device.destroy_command_pool(*pool, None);
                    *pool = vk::CommandPool::null();
                }
            }

            // 3. Allocator pages are freed BEFORE the device is destroyed
            match Arc::get_mut(&mut self.ctx) {
                Some(ctx) => ManuallyDrop::drop(&mut ctx.allocator),
                None => engine_warn!(SOURCE, "GpuContext still shared at teardown, allocator leaked"),
            }

            // 4. Late validation callbacks are ignored from here on
            debug::cleanup_debug_config();
            if let (Some(debug_utils), Some(messenger)) = (&self.ctx.debug_utils_loader, &self.ctx.debug_messenger) {
                debug_utils.destroy_debug_utils_messenger(*messenger, None);
            }

            // 5. Device and instance
            self.ctx.device.destroy_device(None);
            self.ctx.instance.destroy_instance(None);
        }
        engine_debug!(SOURCE, "Vulkan backend destroyed");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_timestamp_mask() {
        assert_eq!(timestamp_mask(0), 0);
        assert_eq!(timestamp_mask(36), (1u64 << 36) - 1);
        assert_eq!(timestamp_mask(64), u64::MAX);
    }

    #[test]
    fn test_discrete_gpus_are_preferred() {
        assert!(adapter_score(vk::PhysicalDeviceType::DISCRETE_GPU) > adapter_score(vk::PhysicalDeviceType::INTEGRATED_GPU));
        assert!(adapter_score(vk::PhysicalDeviceType::INTEGRATED_GPU) > adapter_score(vk::PhysicalDeviceType::CPU));
    }
}
