/// CommandRecorder - translates GAL commands into the frame's command buffer
///
/// One recorder lives for one `submit`. It tracks the bindings recorded so
/// far and flushes them lazily: pipelines, descriptor sets and vertex
/// buffers are resolved at the draw or dispatch that needs them.

use std::ffi::CString;
use ash::vk;
use gal_engine::glam::Vec4;
use gal_engine::gal::command::{
    BufferCopyRegion, Command, PrimitiveTopology, Rect2D, RenderingSetup, TextureRegion, Viewport,
    MAX_CONSTANT_BUFFER_SLOTS, MAX_RESOURCE_VIEW_SLOTS, MAX_SAMPLER_SLOTS, MAX_UNORDERED_ACCESS_SLOTS,
};
use gal_engine::gal::resource::{
    BlendStateDescription, DepthStencilStateDescription, IndexType, RasterizerStateDescription, Resource,
    MAX_VERTEX_BUFFER_SLOTS,
};
use gal_engine::gal::{
    BlendStateHandle, BufferHandle, DepthStencilStateHandle, Error, QueryHandle, RasterizerStateHandle,
    ResourceTables, ResourceViewHandle, Result, SamplerStateHandle, ShaderHandle, TextureHandle,
    UnorderedAccessViewHandle, VertexDeclarationHandle,
};
use gal_engine::{engine_trace, engine_warn};

use crate::vulkan::VulkanBackend;
use crate::vulkan_context::GpuContext;
use crate::vulkan_format::index_type_to_vk;
use crate::vulkan_frame::FrameSlot;
use crate::vulkan_layout::{record_transitions, LayoutRange, LayoutTracker};
use crate::vulkan_pipeline::{GraphicsPipelineDesc, GraphicsPipelineKey, PipelineCache};
use crate::vulkan_query::OcclusionQueryPool;
use crate::vulkan_shader::{
    Shader, SET_CONSTANT_BUFFERS, SET_RESOURCE_VIEWS, SET_SAMPLERS, SET_UNORDERED_ACCESS,
};
use crate::vulkan_staging::StagingBufferPool;
use crate::vulkan_state::{load_op_to_vk, store_op_to_vk};
use crate::vulkan_view::ShaderView;
use crate::SOURCE;

const ALL_SETS: u32 = 0b1111;

// ===== BINDING STATE =====

/// Bindings recorded since the start of a submit
#[derive(Debug)]
pub(crate) struct BindState {
    pub shader: Option<ShaderHandle>,
    pub vertex_declaration: Option<VertexDeclarationHandle>,
    pub topology: PrimitiveTopology,
    pub vertex_buffers: [Option<(BufferHandle, u64)>; MAX_VERTEX_BUFFER_SLOTS as usize],
    pub index_buffer: Option<(BufferHandle, u64, IndexType)>,
    pub constant_buffers: [Option<(BufferHandle, u64, u64)>; MAX_CONSTANT_BUFFER_SLOTS as usize],
    pub resource_views: [Option<ResourceViewHandle>; MAX_RESOURCE_VIEW_SLOTS as usize],
    pub unordered_access_views: [Option<UnorderedAccessViewHandle>; MAX_UNORDERED_ACCESS_SLOTS as usize],
    pub samplers: [Option<SamplerStateHandle>; MAX_SAMPLER_SLOTS as usize],
    pub blend: Option<BlendStateHandle>,
    pub blend_factor: Vec4,
    pub sample_mask: u32,
    pub depth_stencil: Option<DepthStencilStateHandle>,
    pub stencil_ref: u8,
    pub rasterizer: Option<RasterizerStateHandle>,
    pub viewport: Option<Viewport>,
    pub scissor: Option<Rect2D>,
    /// One bit per descriptor set
    pub dirty_sets: u32,
    pub vertex_buffers_dirty: bool,
    pub index_buffer_dirty: bool,
    pub viewport_dirty: bool,
}

impl Default for BindState {
    fn default() -> Self {
        Self {
            shader: None,
            vertex_declaration: None,
            topology: PrimitiveTopology::TriangleList,
            vertex_buffers: [None; MAX_VERTEX_BUFFER_SLOTS as usize],
            index_buffer: None,
            constant_buffers: [None; MAX_CONSTANT_BUFFER_SLOTS as usize],
            resource_views: [None; MAX_RESOURCE_VIEW_SLOTS as usize],
            unordered_access_views: [None; MAX_UNORDERED_ACCESS_SLOTS as usize],
            samplers: [None; MAX_SAMPLER_SLOTS as usize],
            blend: None,
            blend_factor: Vec4::ONE,
            sample_mask: u32::MAX,
            depth_stencil: None,
            stencil_ref: 0,
            rasterizer: None,
            viewport: None,
            scissor: None,
            dirty_sets: ALL_SETS,
            vertex_buffers_dirty: true,
            index_buffer_dirty: true,
            viewport_dirty: true,
        }
    }
}

impl BindState {
    /// Record a state command, returning false for any other command
    pub fn apply(&mut self, command: &Command) -> bool {
        match command {
            Command::SetShader(shader) => {
                self.shader = Some(*shader);
                self.dirty_sets = ALL_SETS;
            }
            Command::SetVertexDeclaration(decl) => {
                self.vertex_declaration = Some(*decl);
                self.vertex_buffers_dirty = true;
            }
            Command::SetPrimitiveTopology(topology) => self.topology = *topology,
            Command::SetVertexBuffer { slot, buffer, offset } => {
                self.vertex_buffers[*slot as usize] = Some((*buffer, *offset));
                self.vertex_buffers_dirty = true;
            }
            Command::SetIndexBuffer { buffer, offset, index_type } => {
                self.index_buffer = Some((*buffer, *offset, *index_type));
                self.index_buffer_dirty = true;
            }
            Command::SetConstantBuffer { slot, buffer, offset, size } => {
                self.constant_buffers[*slot as usize] = Some((*buffer, *offset, *size));
                self.dirty_sets |= 1 << SET_CONSTANT_BUFFERS;
            }
            Command::SetResourceView { slot, view } => {
                self.resource_views[*slot as usize] = Some(*view);
                self.dirty_sets |= 1 << SET_RESOURCE_VIEWS;
            }
            Command::SetUnorderedAccessView { slot, view } => {
                self.unordered_access_views[*slot as usize] = Some(*view);
                self.dirty_sets |= 1 << SET_UNORDERED_ACCESS;
            }
            Command::SetSampler { slot, sampler } => {
                self.samplers[*slot as usize] = Some(*sampler);
                self.dirty_sets |= 1 << SET_SAMPLERS;
            }
            Command::SetBlendState { state, blend_factor, sample_mask } => {
                self.blend = Some(*state);
                self.blend_factor = *blend_factor;
                self.sample_mask = *sample_mask;
            }
            Command::SetDepthStencilState { state, stencil_ref } => {
                self.depth_stencil = Some(*state);
                self.stencil_ref = *stencil_ref;
            }
            Command::SetRasterizerState(state) => self.rasterizer = Some(*state),
            Command::SetViewport(viewport) => {
                self.viewport = Some(*viewport);
                self.viewport_dirty = true;
            }
            Command::SetScissor(rect) => self.scissor = Some(*rect),
            _ => return false,
        }
        true
    }

    /// Everything must be bound again (new pass or bind point)
    pub fn invalidate(&mut self) {
        self.dirty_sets = ALL_SETS;
        self.vertex_buffers_dirty = true;
        self.index_buffer_dirty = true;
        self.viewport_dirty = true;
    }
}

// ===== PURE HELPERS =====

pub(crate) fn rect_to_vk(rect: Rect2D) -> vk::Rect2D {
    vk::Rect2D {
        offset: vk::Offset2D { x: rect.x, y: rect.y },
        extent: vk::Extent2D { width: rect.width, height: rect.height },
    }
}

pub(crate) fn viewport_to_vk(viewport: &Viewport) -> vk::Viewport {
    vk::Viewport {
        x: viewport.x,
        y: viewport.y,
        width: viewport.width,
        height: viewport.height,
        min_depth: viewport.min_depth,
        max_depth: viewport.max_depth,
    }
}

/// Viewport covering a render area with the [0, 1] depth range
pub(crate) fn full_viewport(area: vk::Rect2D) -> vk::Viewport {
    vk::Viewport {
        x: area.offset.x as f32,
        y: area.offset.y as f32,
        width: area.extent.width as f32,
        height: area.extent.height as f32,
        min_depth: 0.0,
        max_depth: 1.0,
    }
}

/// Largest area every attachment covers
pub(crate) fn default_render_area(extents: &[vk::Extent2D]) -> vk::Rect2D {
    let width = extents.iter().map(|e| e.width).min().unwrap_or(0);
    let height = extents.iter().map(|e| e.height).min().unwrap_or(0);
    vk::Rect2D { offset: vk::Offset2D { x: 0, y: 0 }, extent: vk::Extent2D { width, height } }
}

/// Scissor applied to draws: the render area unless the rasterizer enables scissoring
pub(crate) fn effective_scissor(area: vk::Rect2D, scissor_enabled: bool, scissor: Option<Rect2D>) -> vk::Rect2D {
    match scissor {
        Some(rect) if scissor_enabled => rect_to_vk(rect),
        _ => area,
    }
}

/// Blit from one mip to the next over every layer
pub(crate) fn mip_blit(
    aspect: vk::ImageAspectFlags,
    src_mip: u32,
    src_extent: vk::Extent3D,
    dst_extent: vk::Extent3D,
    layer_count: u32,
) -> vk::ImageBlit {
    let corner = |e: vk::Extent3D| vk::Offset3D { x: e.width as i32, y: e.height as i32, z: e.depth as i32 };
    vk::ImageBlit {
        src_subresource: vk::ImageSubresourceLayers {
            aspect_mask: aspect,
            mip_level: src_mip,
            base_array_layer: 0,
            layer_count,
        },
        src_offsets: [vk::Offset3D::default(), corner(src_extent)],
        dst_subresource: vk::ImageSubresourceLayers {
            aspect_mask: aspect,
            mip_level: src_mip + 1,
            base_array_layer: 0,
            layer_count,
        },
        dst_offsets: [vk::Offset3D::default(), corner(dst_extent)],
    }
}

/// Aspect used by buffer/image copies (one plane at a time)
pub(crate) fn copy_aspect(aspect: vk::ImageAspectFlags) -> vk::ImageAspectFlags {
    if aspect.contains(vk::ImageAspectFlags::DEPTH) {
        vk::ImageAspectFlags::DEPTH
    } else {
        aspect
    }
}

/// Descriptor payload of one binding element
#[derive(Debug, Clone, Copy)]
pub(crate) enum DescriptorData {
    Buffer(vk::DescriptorBufferInfo),
    Image(vk::DescriptorImageInfo),
    TexelBuffer(vk::BufferView),
}

/// Descriptor for a view, `None` when the view kind does not match the shader's declaration
pub(crate) fn shader_view_descriptor(view: &ShaderView, ty: vk::DescriptorType) -> Option<DescriptorData> {
    match (view, ty) {
        (ShaderView::Image { view, layout, .. }, vk::DescriptorType::SAMPLED_IMAGE | vk::DescriptorType::STORAGE_IMAGE) => {
            Some(DescriptorData::Image(vk::DescriptorImageInfo {
                sampler: vk::Sampler::null(),
                image_view: *view,
                image_layout: *layout,
            }))
        }
        (
            ShaderView::TexelBuffer { view },
            vk::DescriptorType::UNIFORM_TEXEL_BUFFER | vk::DescriptorType::STORAGE_TEXEL_BUFFER,
        ) => Some(DescriptorData::TexelBuffer(*view)),
        (ShaderView::Buffer { buffer, offset, size }, vk::DescriptorType::STORAGE_BUFFER) => {
            Some(DescriptorData::Buffer(vk::DescriptorBufferInfo { buffer: *buffer, offset: *offset, range: *size }))
        }
        _ => None,
    }
}

struct PendingWrite {
    binding: u32,
    element: u32,
    ty: vk::DescriptorType,
    data: DescriptorData,
}

unsafe fn global_barrier(device: &ash::Device, command_buffer: vk::CommandBuffer) {
    let barrier = vk::MemoryBarrier::default()
        .src_access_mask(vk::AccessFlags::MEMORY_WRITE)
        .dst_access_mask(vk::AccessFlags::MEMORY_READ | vk::AccessFlags::MEMORY_WRITE);
    device.cmd_pipeline_barrier(
        command_buffer,
        vk::PipelineStageFlags::ALL_COMMANDS,
        vk::PipelineStageFlags::ALL_COMMANDS,
        vk::DependencyFlags::empty(),
        &[barrier],
        &[],
        &[],
    );
}

fn native<'r, D, N>(resource: Option<&'r Resource<D, N>>, what: &str) -> Result<&'r N> {
    resource
        .and_then(|r| r.native())
        .ok_or_else(|| Error::InvalidHandle(format!("{} not live at submit", what)))
}

fn label(name: &str) -> CString {
    CString::new(name.replace('\0', " ")).unwrap_or_default()
}

// ===== RECORDER =====

/// Attachment of the open rendering pass
struct PassAttachment {
    image: vk::Image,
    aspect: vk::ImageAspectFlags,
    range: LayoutRange,
    resting_layout: vk::ImageLayout,
}

struct PassState {
    color_formats: Vec<vk::Format>,
    depth_format: vk::Format,
    samples: vk::SampleCountFlags,
    area: vk::Rect2D,
    attachments: Vec<PassAttachment>,
}

pub(crate) struct CommandRecorder<'a> {
    ctx: &'a GpuContext,
    tables: &'a ResourceTables<VulkanBackend>,
    frame: u64,
    slot: &'a mut FrameSlot,
    pipelines: &'a mut PipelineCache,
    layouts: &'a mut LayoutTracker,
    staging: &'a mut StagingBufferPool,
    queries: &'a mut OcclusionQueryPool,
    state: BindState,
    pass: Option<PassState>,
    bound_pipeline: vk::Pipeline,
    bound_layout: vk::PipelineLayout,
    bound_sets: Vec<vk::DescriptorSet>,
    applied_scissor: Option<vk::Rect2D>,
}

impl<'a> CommandRecorder<'a> {
    #[allow(clippy::too_many_arguments)]
    pub(crate) fn new(
        ctx: &'a GpuContext,
        tables: &'a ResourceTables<VulkanBackend>,
        frame: u64,
        slot: &'a mut FrameSlot,
        pipelines: &'a mut PipelineCache,
        layouts: &'a mut LayoutTracker,
        staging: &'a mut StagingBufferPool,
        queries: &'a mut OcclusionQueryPool,
    ) -> Self {
        Self {
            ctx,
            tables,
            frame,
            slot,
            pipelines,
            layouts,
            staging,
            queries,
            state: BindState::default(),
            pass: None,
            bound_pipeline: vk::Pipeline::null(),
            bound_layout: vk::PipelineLayout::null(),
            bound_sets: Vec::new(),
            applied_scissor: None,
        }
    }

    fn cb(&self) -> vk::CommandBuffer {
        self.slot.command_buffer
    }

    /// Translate a validated command list
    pub(crate) fn record(&mut self, commands: &[Command]) -> Result<()> {
        self.reset_queries(commands)?;
        for command in commands {
            if let Err(e) = self.translate(command) {
                // Leave the command buffer closable
                self.end_rendering();
                return Err(e);
            }
        }
        self.end_rendering();
        engine_trace!(SOURCE, "Recorded {} commands into frame {}", commands.len(), self.frame);
        Ok(())
    }

    /// Queries must be reset outside rendering passes before they begin
    fn reset_queries(&mut self, commands: &[Command]) -> Result<()> {
        let mut reset: Vec<QueryHandle> = Vec::new();
        for command in commands {
            if let Command::BeginQuery(handle) = command {
                if reset.contains(handle) {
                    continue;
                }
                let query = native(self.tables.query(*handle), "query")?;
                unsafe { self.queries.record_reset(&self.ctx.device, self.cb(), query) };
                reset.push(*handle);
            }
        }
        Ok(())
    }

    fn translate(&mut self, command: &Command) -> Result<()> {
        let ctx = self.ctx;
        let tables = self.tables;
        let device = &ctx.device;
        let cb = self.cb();
        if self.state.apply(command) {
            match command {
                Command::SetBlendState { blend_factor, .. } => unsafe {
                    device.cmd_set_blend_constants(cb, &blend_factor.to_array());
                },
                Command::SetDepthStencilState { stencil_ref, .. } => unsafe {
                    device.cmd_set_stencil_reference(cb, vk::StencilFaceFlags::FRONT_AND_BACK, *stencil_ref as u32);
                },
                _ => {}
            }
            return Ok(());
        }

        match command {
            Command::BeginRendering(setup) => self.begin_rendering(setup)?,
            Command::EndRendering => self.end_rendering(),
            Command::BeginCompute | Command::EndCompute => self.invalidate_bindings(),

            Command::Draw { vertex_count, first_vertex } => {
                if self.prepare_draw(false)? {
                    unsafe { device.cmd_draw(cb, *vertex_count, 1, *first_vertex, 0) };
                }
            }
            Command::DrawInstanced { vertex_count, instance_count, first_vertex, first_instance } => {
                if self.prepare_draw(false)? {
                    unsafe { device.cmd_draw(cb, *vertex_count, *instance_count, *first_vertex, *first_instance) };
                }
            }
            Command::DrawIndexed { index_count, first_index, base_vertex } => {
                if self.prepare_draw(true)? {
                    unsafe { device.cmd_draw_indexed(cb, *index_count, 1, *first_index, *base_vertex, 0) };
                }
            }
            Command::DrawIndexedInstanced { index_count, instance_count, first_index, base_vertex, first_instance } => {
                if self.prepare_draw(true)? {
                    unsafe {
                        device.cmd_draw_indexed(cb, *index_count, *instance_count, *first_index, *base_vertex, *first_instance)
                    };
                }
            }
            Command::Dispatch { x, y, z } => self.dispatch(*x, *y, *z)?,

            Command::CopyBuffer { src, dst } => self.copy_buffer(*src, *dst, None)?,
            Command::CopyBufferRegion { src, dst, region } => self.copy_buffer(*src, *dst, Some(*region))?,
            Command::UpdateBuffer { buffer, offset, data } => self.update_buffer(*buffer, *offset, data)?,
            Command::CopyTexture { src, dst } => self.copy_texture(*src, *dst)?,
            Command::UpdateTexture { texture, region, data } => self.update_texture(*texture, region, data)?,
            Command::GenerateMipMaps(texture) => self.generate_mip_maps(*texture)?,

            Command::BeginQuery(handle) => {
                let query = native(tables.query(*handle), "query")?;
                unsafe { self.queries.record_begin(device, cb, query) };
            }
            Command::EndQuery(handle) => {
                let query = native(tables.query(*handle), "query")?;
                unsafe { self.queries.record_end(device, cb, query, self.frame) };
            }
            Command::InsertTimestamp { slot } => {
                if *slot >= self.slot.timestamp_capacity {
                    engine_warn!(SOURCE, "Timestamp slot {} outside the frame's {} slots", slot, self.slot.timestamp_capacity);
                } else {
                    unsafe {
                        device.cmd_write_timestamp(cb, vk::PipelineStageFlags::BOTTOM_OF_PIPE, self.slot.timestamp_pool, *slot)
                    };
                }
            }

            Command::PushMarker(name) => {
                if let Some(debug) = &ctx.debug_utils_device {
                    let name = label(name);
                    let info = vk::DebugUtilsLabelEXT::default().label_name(&name);
                    unsafe { debug.cmd_begin_debug_utils_label(cb, &info) };
                }
            }
            Command::PopMarker => {
                if let Some(debug) = &ctx.debug_utils_device {
                    unsafe { debug.cmd_end_debug_utils_label(cb) };
                }
            }
            Command::InsertEventMarker(name) => {
                if let Some(debug) = &ctx.debug_utils_device {
                    let name = label(name);
                    let info = vk::DebugUtilsLabelEXT::default().label_name(&name);
                    unsafe { debug.cmd_insert_debug_utils_label(cb, &info) };
                }
            }

            // State commands were consumed by BindState::apply
            _ => {}
        }
        Ok(())
    }

    fn transition(&mut self, image: vk::Image, aspect: vk::ImageAspectFlags, range: LayoutRange, layout: vk::ImageLayout) {
        let transitions = self.layouts.transition(image, range, layout);
        unsafe { record_transitions(&self.ctx.device, self.slot.command_buffer, image, aspect, &transitions) };
    }

    fn invalidate_bindings(&mut self) {
        self.state.invalidate();
        self.bound_pipeline = vk::Pipeline::null();
        self.bound_layout = vk::PipelineLayout::null();
        self.bound_sets.clear();
    }

    // ===== PASSES =====

    fn begin_rendering(&mut self, setup: &RenderingSetup) -> Result<()> {
        let tables = self.tables;
        let mut attachments = Vec::new();
        let mut extents = Vec::new();
        let mut color_infos = Vec::new();
        let mut color_formats = Vec::new();
        let mut samples = vk::SampleCountFlags::TYPE_1;
        let mut layer_count = u32::MAX;

        for color in &setup.color_attachments {
            let rtv = native(tables.render_target_view(color.view), "render target view")?;
            self.transition(rtv.image, rtv.aspect, rtv.range, vk::ImageLayout::COLOR_ATTACHMENT_OPTIMAL);
            color_infos.push(
                vk::RenderingAttachmentInfo::default()
                    .image_view(rtv.view)
                    .image_layout(vk::ImageLayout::COLOR_ATTACHMENT_OPTIMAL)
                    .load_op(load_op_to_vk(color.load_op))
                    .store_op(store_op_to_vk(color.store_op))
                    .clear_value(vk::ClearValue {
                        color: vk::ClearColorValue { float32: color.clear_color.to_array() },
                    }),
            );
            color_formats.push(rtv.format);
            extents.push(rtv.extent);
            samples = rtv.samples;
            layer_count = layer_count.min(rtv.range.layer_count);
            attachments.push(PassAttachment {
                image: rtv.image,
                aspect: rtv.aspect,
                range: rtv.range,
                resting_layout: rtv.resting_layout,
            });
        }

        let mut depth_format = vk::Format::UNDEFINED;
        let mut depth_info = None;
        let mut stencil_info = None;
        if let Some(depth) = &setup.depth_stencil {
            let rtv = native(tables.render_target_view(depth.view), "depth stencil view")?;
            let layout = if depth.read_only {
                vk::ImageLayout::DEPTH_STENCIL_READ_ONLY_OPTIMAL
            } else {
                vk::ImageLayout::DEPTH_STENCIL_ATTACHMENT_OPTIMAL
            };
            self.transition(rtv.image, rtv.aspect, rtv.range, layout);
            let clear_value = vk::ClearValue {
                depth_stencil: vk::ClearDepthStencilValue { depth: depth.clear_depth, stencil: depth.clear_stencil as u32 },
            };
            depth_info = Some(
                vk::RenderingAttachmentInfo::default()
                    .image_view(rtv.view)
                    .image_layout(layout)
                    .load_op(load_op_to_vk(depth.depth_load_op))
                    .store_op(store_op_to_vk(depth.depth_store_op))
                    .clear_value(clear_value),
            );
            if rtv.has_stencil {
                stencil_info = Some(
                    vk::RenderingAttachmentInfo::default()
                        .image_view(rtv.view)
                        .image_layout(layout)
                        .load_op(load_op_to_vk(depth.stencil_load_op))
                        .store_op(store_op_to_vk(depth.stencil_store_op))
                        .clear_value(clear_value),
                );
            }
            depth_format = rtv.format;
            extents.push(rtv.extent);
            samples = rtv.samples;
            layer_count = layer_count.min(rtv.range.layer_count);
            attachments.push(PassAttachment {
                image: rtv.image,
                aspect: rtv.aspect,
                range: rtv.range,
                resting_layout: rtv.resting_layout,
            });
        }

        let area = setup.render_area.map(rect_to_vk).unwrap_or_else(|| default_render_area(&extents));
        let mut rendering_info = vk::RenderingInfo::default()
            .render_area(area)
            .layer_count(if layer_count == u32::MAX { 1 } else { layer_count.max(1) })
            .color_attachments(&color_infos);
        if let Some(info) = &depth_info {
            rendering_info = rendering_info.depth_attachment(info);
        }
        if let Some(info) = &stencil_info {
            rendering_info = rendering_info.stencil_attachment(info);
        }

        let device = &self.ctx.device;
        let cb = self.cb();
        unsafe {
            device.cmd_begin_rendering(cb, &rendering_info);
            device.cmd_set_viewport(cb, 0, &[full_viewport(area)]);
            device.cmd_set_scissor(cb, 0, &[area]);
            device.cmd_set_blend_constants(cb, &self.state.blend_factor.to_array());
            device.cmd_set_stencil_reference(cb, vk::StencilFaceFlags::FRONT_AND_BACK, self.state.stencil_ref as u32);
        }

        self.invalidate_bindings();
        self.state.viewport = None;
        self.state.scissor = None;
        self.state.viewport_dirty = false;
        self.applied_scissor = Some(area);
        self.pass = Some(PassState { color_formats, depth_format, samples, area, attachments });
        Ok(())
    }

    fn end_rendering(&mut self) {
        let Some(pass) = self.pass.take() else {
            return;
        };
        unsafe { self.ctx.device.cmd_end_rendering(self.cb()) };
        for attachment in pass.attachments {
            self.transition(attachment.image, attachment.aspect, attachment.range, attachment.resting_layout);
        }
    }

    // ===== DRAW / DISPATCH =====

    /// Flush pipeline, descriptors and buffers; false skips the draw
    fn prepare_draw(&mut self, indexed: bool) -> Result<bool> {
        let ctx = self.ctx;
        let tables = self.tables;
        let (color_formats, depth_format, samples, area) = match &self.pass {
            Some(pass) => (pass.color_formats.clone(), pass.depth_format, pass.samples, pass.area),
            None => {
                engine_warn!(SOURCE, "Draw outside a rendering pass skipped");
                return Ok(false);
            }
        };
        let Some(shader_handle) = self.state.shader else {
            engine_warn!(SOURCE, "Draw without a shader skipped");
            return Ok(false);
        };
        let shader = native(tables.shader(shader_handle), "shader")?;
        if shader.is_compute {
            engine_warn!(SOURCE, "Draw with a compute shader skipped");
            return Ok(false);
        }
        let vertex_declaration = match self.state.vertex_declaration {
            Some(handle) => Some(native(tables.vertex_declaration(handle), "vertex declaration")?),
            None => None,
        };
        if vertex_declaration.is_none() && !shader.input_locations.is_empty() {
            engine_warn!(SOURCE, "Draw skipped: the shader reads vertex inputs and no vertex declaration is set");
            return Ok(false);
        }

        let default_blend = BlendStateDescription::default();
        let default_depth_stencil = DepthStencilStateDescription::default();
        let default_rasterizer = RasterizerStateDescription::default();
        let (blend_id, blend) = match self.state.blend {
            Some(handle) => {
                let resource = tables.blend_state(handle);
                (Some(native(resource, "blend state")?.id), resource.map(|r| r.description()).unwrap_or(&default_blend))
            }
            None => (None, &default_blend),
        };
        let (depth_stencil_id, depth_stencil) = match self.state.depth_stencil {
            Some(handle) => {
                let resource = tables.depth_stencil_state(handle);
                (
                    Some(native(resource, "depth stencil state")?.id),
                    resource.map(|r| r.description()).unwrap_or(&default_depth_stencil),
                )
            }
            None => (None, &default_depth_stencil),
        };
        let (rasterizer_id, rasterizer) = match self.state.rasterizer {
            Some(handle) => {
                let resource = tables.rasterizer_state(handle);
                (
                    Some(native(resource, "rasterizer state")?.id),
                    resource.map(|r| r.description()).unwrap_or(&default_rasterizer),
                )
            }
            None => (None, &default_rasterizer),
        };

        let desc = GraphicsPipelineDesc {
            key: GraphicsPipelineKey {
                shader: shader.id,
                vertex_declaration: vertex_declaration.map(|d| d.id),
                blend: blend_id,
                depth_stencil: depth_stencil_id,
                rasterizer: rasterizer_id,
                topology: self.state.topology,
                sample_mask: self.state.sample_mask,
                color_formats,
                depth_format,
                samples,
            },
            shader,
            vertex_declaration,
            blend,
            depth_stencil,
            rasterizer,
        };
        let pipeline = self.pipelines.graphics(ctx, &desc)?;
        self.bind_pipeline(pipeline, vk::PipelineBindPoint::GRAPHICS);

        if !self.bind_descriptor_sets(shader, vk::PipelineBindPoint::GRAPHICS)? {
            return Ok(false);
        }

        let cb = self.cb();
        if let Some(decl) = vertex_declaration {
            if self.state.vertex_buffers_dirty {
                for binding in &decl.bindings {
                    let Some((handle, offset)) = self.state.vertex_buffers[binding.binding as usize] else {
                        engine_warn!(SOURCE, "Draw skipped: no vertex buffer in slot {}", binding.binding);
                        return Ok(false);
                    };
                    let buffer = native(tables.buffer(handle), "vertex buffer")?;
                    unsafe { ctx.device.cmd_bind_vertex_buffers(cb, binding.binding, &[buffer.buffer], &[offset]) };
                }
                self.state.vertex_buffers_dirty = false;
            }
        }
        if indexed {
            let Some((handle, offset, index_type)) = self.state.index_buffer else {
                engine_warn!(SOURCE, "Indexed draw without an index buffer skipped");
                return Ok(false);
            };
            if self.state.index_buffer_dirty {
                let buffer = native(tables.buffer(handle), "index buffer")?;
                unsafe { ctx.device.cmd_bind_index_buffer(cb, buffer.buffer, offset, index_type_to_vk(index_type)) };
                self.state.index_buffer_dirty = false;
            }
        }

        if self.state.viewport_dirty {
            let viewport = self.state.viewport.as_ref().map(viewport_to_vk).unwrap_or_else(|| full_viewport(area));
            unsafe { ctx.device.cmd_set_viewport(cb, 0, &[viewport]) };
            self.state.viewport_dirty = false;
        }
        let scissor = effective_scissor(area, rasterizer.scissor, self.state.scissor);
        if self.applied_scissor != Some(scissor) {
            unsafe { ctx.device.cmd_set_scissor(cb, 0, &[scissor]) };
            self.applied_scissor = Some(scissor);
        }
        Ok(true)
    }

    fn dispatch(&mut self, x: u32, y: u32, z: u32) -> Result<()> {
        let ctx = self.ctx;
        let Some(shader_handle) = self.state.shader else {
            engine_warn!(SOURCE, "Dispatch without a shader skipped");
            return Ok(());
        };
        let tables = self.tables;
        let shader = native(tables.shader(shader_handle), "shader")?;
        let pipeline = self.pipelines.compute(ctx, shader)?;
        self.bind_pipeline(pipeline, vk::PipelineBindPoint::COMPUTE);
        if !self.bind_descriptor_sets(shader, vk::PipelineBindPoint::COMPUTE)? {
            return Ok(());
        }
        unsafe {
            ctx.device.cmd_dispatch(self.cb(), x, y, z);
            global_barrier(&ctx.device, self.cb());
        }
        Ok(())
    }

    fn bind_pipeline(&mut self, pipeline: vk::Pipeline, bind_point: vk::PipelineBindPoint) {
        if pipeline != self.bound_pipeline {
            unsafe { self.ctx.device.cmd_bind_pipeline(self.cb(), bind_point, pipeline) };
            self.bound_pipeline = pipeline;
        }
    }

    /// Build and bind dirty descriptor sets; false when a binding is missing
    fn bind_descriptor_sets(&mut self, shader: &Shader, bind_point: vk::PipelineBindPoint) -> Result<bool> {
        let ctx = self.ctx;
        if shader.set_layouts.is_empty() {
            return Ok(true);
        }
        if self.bound_layout != shader.pipeline_layout {
            self.bound_layout = shader.pipeline_layout;
            self.bound_sets.clear();
            self.state.dirty_sets = ALL_SETS;
        }
        let set_count = shader.set_layouts.len();
        let mask = (1u32 << set_count) - 1;
        if self.bound_sets.len() == set_count && self.state.dirty_sets & mask == 0 {
            return Ok(true);
        }
        self.bound_sets.resize(set_count, vk::DescriptorSet::null());

        for set in 0..set_count {
            if self.bound_sets[set] != vk::DescriptorSet::null() && self.state.dirty_sets & (1 << set) == 0 {
                continue;
            }
            let Some(pending) = self.collect_writes(shader, set as u32)? else {
                return Ok(false);
            };
            let descriptor_set = self.slot.allocate_descriptor_set(ctx, shader.set_layouts[set])?;
            let writes: Vec<vk::WriteDescriptorSet> = pending
                .iter()
                .map(|w| {
                    let write = vk::WriteDescriptorSet::default()
                        .dst_set(descriptor_set)
                        .dst_binding(w.binding)
                        .dst_array_element(w.element)
                        .descriptor_type(w.ty);
                    match &w.data {
                        DescriptorData::Buffer(info) => write.buffer_info(std::slice::from_ref(info)),
                        DescriptorData::Image(info) => write.image_info(std::slice::from_ref(info)),
                        DescriptorData::TexelBuffer(view) => write.texel_buffer_view(std::slice::from_ref(view)),
                    }
                })
                .collect();
            if !writes.is_empty() {
                unsafe { ctx.device.update_descriptor_sets(&writes, &[]) };
            }
            self.bound_sets[set] = descriptor_set;
        }

        unsafe {
            ctx.device
                .cmd_bind_descriptor_sets(self.cb(), bind_point, shader.pipeline_layout, 0, &self.bound_sets, &[]);
        }
        self.state.dirty_sets = 0;
        Ok(true)
    }

    fn collect_writes(&self, shader: &Shader, set: u32) -> Result<Option<Vec<PendingWrite>>> {
        let mut pending = Vec::new();
        for binding in shader.set_bindings(set) {
            for element in 0..binding.count {
                let slot = (binding.binding + element) as usize;
                match self.descriptor_for(set, slot, binding.descriptor_type)? {
                    Some(data) => pending.push(PendingWrite {
                        binding: binding.binding,
                        element,
                        ty: binding.descriptor_type,
                        data,
                    }),
                    None => {
                        engine_warn!(
                            SOURCE,
                            "Skipped: nothing compatible with {:?} bound to set {} slot {}",
                            binding.descriptor_type,
                            set,
                            slot
                        );
                        return Ok(None);
                    }
                }
            }
        }
        Ok(Some(pending))
    }

    fn descriptor_for(&self, set: u32, slot: usize, ty: vk::DescriptorType) -> Result<Option<DescriptorData>> {
        let tables = self.tables;
        let data = match set {
            SET_CONSTANT_BUFFERS => match self.state.constant_buffers.get(slot).copied().flatten() {
                Some((handle, offset, size)) => {
                    let buffer = native(tables.buffer(handle), "constant buffer")?;
                    let range = if size == 0 { vk::WHOLE_SIZE } else { size };
                    Some(DescriptorData::Buffer(vk::DescriptorBufferInfo { buffer: buffer.buffer, offset, range }))
                }
                None => None,
            },
            SET_RESOURCE_VIEWS => match self.state.resource_views.get(slot).copied().flatten() {
                Some(handle) => shader_view_descriptor(native(tables.resource_view(handle), "resource view")?, ty),
                None => None,
            },
            SET_SAMPLERS => match self.state.samplers.get(slot).copied().flatten() {
                Some(handle) => {
                    let sampler = native(tables.sampler_state(handle), "sampler")?;
                    Some(DescriptorData::Image(vk::DescriptorImageInfo {
                        sampler: sampler.sampler,
                        image_view: vk::ImageView::null(),
                        image_layout: vk::ImageLayout::UNDEFINED,
                    }))
                }
                None => None,
            },
            SET_UNORDERED_ACCESS => match self.state.unordered_access_views.get(slot).copied().flatten() {
                Some(handle) => {
                    shader_view_descriptor(native(tables.unordered_access_view(handle), "unordered access view")?, ty)
                }
                None => None,
            },
            _ => None,
        };
        Ok(data)
    }

    // ===== TRANSFERS =====

    fn copy_buffer(&mut self, src: BufferHandle, dst: BufferHandle, region: Option<BufferCopyRegion>) -> Result<()> {
        let tables = self.tables;
        let src = native(tables.buffer(src), "source buffer")?;
        let dst = native(tables.buffer(dst), "destination buffer")?;
        let region = match region {
            Some(r) => vk::BufferCopy { src_offset: r.src_offset, dst_offset: r.dst_offset, size: r.size },
            None => vk::BufferCopy { src_offset: 0, dst_offset: 0, size: src.size.min(dst.size) },
        };
        let device = &self.ctx.device;
        unsafe {
            global_barrier(device, self.cb());
            device.cmd_copy_buffer(self.cb(), src.buffer, dst.buffer, &[region]);
            global_barrier(device, self.cb());
        }
        Ok(())
    }

    fn update_buffer(&mut self, buffer: BufferHandle, offset: u64, data: &[u8]) -> Result<()> {
        if data.is_empty() {
            return Ok(());
        }
        let tables = self.tables;
        let dst = native(tables.buffer(buffer), "buffer")?;
        let staging = self.staging.allocate_buffer(4, data.len() as u64)?;
        if let Err(e) = self.staging.write(&staging, data) {
            self.staging.release_buffer(staging);
            return Err(e);
        }
        let region = vk::BufferCopy { src_offset: staging.offset(), dst_offset: offset, size: data.len() as u64 };
        let device = &self.ctx.device;
        unsafe {
            global_barrier(device, self.cb());
            device.cmd_copy_buffer(self.cb(), staging.buffer(), dst.buffer, &[region]);
            global_barrier(device, self.cb());
        }
        self.staging.reclaim_buffer(staging, self.frame);
        Ok(())
    }

    fn copy_texture(&mut self, src: TextureHandle, dst: TextureHandle) -> Result<()> {
        let tables = self.tables;
        let src = native(tables.texture(src), "source texture")?;
        let dst = native(tables.texture(dst), "destination texture")?;
        let mips = src.mip_levels.min(dst.mip_levels);
        let layers = src.array_layers.min(dst.array_layers);
        let regions: Vec<vk::ImageCopy> = (0..mips)
            .map(|mip| {
                let (s, d) = (src.mip_extent(mip), dst.mip_extent(mip));
                vk::ImageCopy {
                    src_subresource: vk::ImageSubresourceLayers {
                        aspect_mask: src.aspect,
                        mip_level: mip,
                        base_array_layer: 0,
                        layer_count: layers,
                    },
                    src_offset: vk::Offset3D::default(),
                    dst_subresource: vk::ImageSubresourceLayers {
                        aspect_mask: dst.aspect,
                        mip_level: mip,
                        base_array_layer: 0,
                        layer_count: layers,
                    },
                    dst_offset: vk::Offset3D::default(),
                    extent: vk::Extent3D {
                        width: s.width.min(d.width),
                        height: s.height.min(d.height),
                        depth: s.depth.min(d.depth),
                    },
                }
            })
            .collect();

        self.transition(src.image, src.aspect, src.full_range(), vk::ImageLayout::TRANSFER_SRC_OPTIMAL);
        self.transition(dst.image, dst.aspect, dst.full_range(), vk::ImageLayout::TRANSFER_DST_OPTIMAL);
        unsafe {
            self.ctx.device.cmd_copy_image(
                self.cb(),
                src.image,
                vk::ImageLayout::TRANSFER_SRC_OPTIMAL,
                dst.image,
                vk::ImageLayout::TRANSFER_DST_OPTIMAL,
                &regions,
            );
        }
        self.transition(src.image, src.aspect, src.full_range(), src.resting_layout);
        self.transition(dst.image, dst.aspect, dst.full_range(), dst.resting_layout);
        Ok(())
    }

    fn update_texture(&mut self, texture: TextureHandle, region: &TextureRegion, data: &[u8]) -> Result<()> {
        if data.is_empty() {
            return Ok(());
        }
        let tables = self.tables;
        let texture = native(tables.texture(texture), "texture")?;
        let staging = self.staging.allocate_buffer(16, data.len() as u64)?;
        if let Err(e) = self.staging.write(&staging, data) {
            self.staging.release_buffer(staging);
            return Err(e);
        }
        let copy = vk::BufferImageCopy {
            buffer_offset: staging.offset(),
            buffer_row_length: 0,
            buffer_image_height: 0,
            image_subresource: vk::ImageSubresourceLayers {
                aspect_mask: copy_aspect(texture.aspect),
                mip_level: region.mip_level,
                base_array_layer: region.array_layer,
                layer_count: 1,
            },
            image_offset: vk::Offset3D {
                x: region.offset[0] as i32,
                y: region.offset[1] as i32,
                z: region.offset[2] as i32,
            },
            image_extent: vk::Extent3D { width: region.extent[0], height: region.extent[1], depth: region.extent[2] },
        };

        let range = LayoutRange::mip(region.mip_level, region.array_layer);
        self.transition(texture.image, texture.aspect, range, vk::ImageLayout::TRANSFER_DST_OPTIMAL);
        unsafe {
            self.ctx.device.cmd_copy_buffer_to_image(
                self.cb(),
                staging.buffer(),
                texture.image,
                vk::ImageLayout::TRANSFER_DST_OPTIMAL,
                &[copy],
            );
        }
        self.transition(texture.image, texture.aspect, range, texture.resting_layout);
        self.staging.reclaim_buffer(staging, self.frame);
        Ok(())
    }

    /// Downsample mip 0 into every other mip with a blit chain
    fn generate_mip_maps(&mut self, texture: TextureHandle) -> Result<()> {
        let tables = self.tables;
        let texture = native(tables.texture(texture), "texture")?;
        if texture.mip_levels <= 1 {
            return Ok(());
        }
        let filter = if texture.format.is_depth() { vk::Filter::NEAREST } else { vk::Filter::LINEAR };
        let layers = texture.array_layers;

        self.transition(texture.image, texture.aspect, LayoutRange::new(0, 1, 0, layers), vk::ImageLayout::TRANSFER_SRC_OPTIMAL);
        for mip in 1..texture.mip_levels {
            let range = LayoutRange::new(mip, 1, 0, layers);
            self.transition(texture.image, texture.aspect, range, vk::ImageLayout::TRANSFER_DST_OPTIMAL);
            let blit = mip_blit(texture.aspect, mip - 1, texture.mip_extent(mip - 1), texture.mip_extent(mip), layers);
            unsafe {
                self.ctx.device.cmd_blit_image(
                    self.cb(),
                    texture.image,
                    vk::ImageLayout::TRANSFER_SRC_OPTIMAL,
                    texture.image,
                    vk::ImageLayout::TRANSFER_DST_OPTIMAL,
                    &[blit],
                    filter,
                );
            }
            self.transition(texture.image, texture.aspect, range, vk::ImageLayout::TRANSFER_SRC_OPTIMAL);
        }
        self.transition(texture.image, texture.aspect, texture.full_range(), texture.resting_layout);
        Ok(())
    }
}

#[cfg(test)]
#[path = "vulkan_command_tests.rs"]
mod tests;
