/// Command encoder
///
/// Records `Command` values for one frame. Misuse that can be detected while
/// recording (draw outside a rendering pass, unbalanced markers, slot out of
/// range, ...) is rejected immediately with `Error::InvalidCommand` and the
/// command is not recorded. Handle liveness is checked by the device at submit.

use bytemuck::Pod;
use glam::Vec4;
use crate::error::{Error, Result};
use crate::handle::*;
use crate::resource::{IndexType, MAX_RENDER_TARGETS, MAX_VERTEX_BUFFER_SLOTS};
use super::command::*;

/// Pass the encoder is currently inside
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PassKind {
    Rendering,
    Compute,
}

/// Records commands for submission through `Device::submit`
#[derive(Debug)]
pub struct CommandEncoder {
    frame: u64,
    commands: Vec<Command>,
    pass: Option<PassKind>,
    marker_depth: u32,
    active_queries: Vec<QueryHandle>,
}

fn invalid<T>(message: impl Into<String>) -> Result<T> {
    Err(Error::InvalidCommand(message.into()))
}

impl CommandEncoder {
    pub(crate) fn new(frame: u64) -> Self {
        Self {
            frame,
            commands: Vec::new(),
            pass: None,
            marker_depth: 0,
            active_queries: Vec::new(),
        }
    }

    /// Frame this encoder records for
    pub fn frame(&self) -> u64 {
        self.frame
    }

    /// Commands recorded so far
    pub fn commands(&self) -> &[Command] {
        &self.commands
    }

    pub fn current_pass(&self) -> Option<PassKind> {
        self.pass
    }

    pub fn marker_depth(&self) -> u32 {
        self.marker_depth
    }

    pub(crate) fn push(&mut self, command: Command) {
        self.commands.push(command);
    }

    fn require_pass(&self, kind: PassKind, what: &str) -> Result<()> {
        if self.pass != Some(kind) {
            return invalid(format!("{} requires an active {:?} pass", what, kind));
        }
        Ok(())
    }

    fn require_no_pass(&self, what: &str) -> Result<()> {
        if let Some(kind) = self.pass {
            return invalid(format!("{} is not allowed inside a {:?} pass", what, kind));
        }
        Ok(())
    }

    fn check_slot(slot: u32, max: u32, what: &str) -> Result<()> {
        if slot >= max {
            return invalid(format!("{} slot {} out of range (max {})", what, slot, max - 1));
        }
        Ok(())
    }

    // ===== PASSES =====

    /// Begin a rendering pass on the given attachments
    pub fn begin_rendering(&mut self, setup: RenderingSetup) -> Result<()> {
        self.require_no_pass("begin_rendering")?;
        if setup.color_attachments.is_empty() && setup.depth_stencil.is_none() {
            return invalid("rendering pass has no attachments");
        }
        if setup.color_attachments.len() > MAX_RENDER_TARGETS {
            return invalid(format!(
                "{} color attachments exceed the limit of {}",
                setup.color_attachments.len(),
                MAX_RENDER_TARGETS
            ));
        }
        if let Some(area) = setup.render_area {
            if area.width == 0 || area.height == 0 {
                return invalid("render area is empty");
            }
        }
        self.pass = Some(PassKind::Rendering);
        self.push(Command::BeginRendering(setup));
        Ok(())
    }

    pub fn end_rendering(&mut self) -> Result<()> {
        self.require_pass(PassKind::Rendering, "end_rendering")?;
        if !self.active_queries.is_empty() {
            return invalid("rendering pass ended with active queries");
        }
        self.pass = None;
        self.push(Command::EndRendering);
        Ok(())
    }

    pub fn begin_compute_pass(&mut self) -> Result<()> {
        self.require_no_pass("begin_compute_pass")?;
        self.pass = Some(PassKind::Compute);
        self.push(Command::BeginCompute);
        Ok(())
    }

    pub fn end_compute_pass(&mut self) -> Result<()> {
        self.require_pass(PassKind::Compute, "end_compute_pass")?;
        self.pass = None;
        self.push(Command::EndCompute);
        Ok(())
    }

    // ===== PIPELINE STATE =====

    pub fn set_shader(&mut self, shader: ShaderHandle) {
        self.push(Command::SetShader(shader));
    }

    pub fn set_vertex_declaration(&mut self, declaration: VertexDeclarationHandle) {
        self.push(Command::SetVertexDeclaration(declaration));
    }

    pub fn set_primitive_topology(&mut self, topology: PrimitiveTopology) -> Result<()> {
        if let PrimitiveTopology::PatchList(points) = topology {
            if points == 0 || points > 32 {
                return invalid(format!("patch list with {} control points", points));
            }
        }
        self.push(Command::SetPrimitiveTopology(topology));
        Ok(())
    }

    /// Bind a vertex buffer to a slot (stride comes from the vertex declaration)
    pub fn set_vertex_buffer(&mut self, slot: u32, buffer: BufferHandle, offset: u64) -> Result<()> {
        Self::check_slot(slot, MAX_VERTEX_BUFFER_SLOTS, "vertex buffer")?;
        self.push(Command::SetVertexBuffer { slot, buffer, offset });
        Ok(())
    }

    pub fn set_index_buffer(&mut self, buffer: BufferHandle, offset: u64, index_type: IndexType) -> Result<()> {
        if offset % index_type.size() as u64 != 0 {
            return invalid(format!("index buffer offset {} not aligned to {:?}", offset, index_type));
        }
        self.push(Command::SetIndexBuffer { buffer, offset, index_type });
        Ok(())
    }

    /// Bind `size` bytes of a constant buffer starting at `offset` (multiple of 256)
    pub fn set_constant_buffer(&mut self, slot: u32, buffer: BufferHandle, offset: u64, size: u64) -> Result<()> {
        Self::check_slot(slot, MAX_CONSTANT_BUFFER_SLOTS, "constant buffer")?;
        if offset % 256 != 0 {
            return invalid(format!("constant buffer offset {} is not a multiple of 256", offset));
        }
        if size == 0 {
            return invalid("constant buffer range is empty");
        }
        self.push(Command::SetConstantBuffer { slot, buffer, offset, size });
        Ok(())
    }

    pub fn set_resource_view(&mut self, slot: u32, view: ResourceViewHandle) -> Result<()> {
        Self::check_slot(slot, MAX_RESOURCE_VIEW_SLOTS, "resource view")?;
        self.push(Command::SetResourceView { slot, view });
        Ok(())
    }

    pub fn set_unordered_access_view(&mut self, slot: u32, view: UnorderedAccessViewHandle) -> Result<()> {
        Self::check_slot(slot, MAX_UNORDERED_ACCESS_SLOTS, "unordered access view")?;
        self.push(Command::SetUnorderedAccessView { slot, view });
        Ok(())
    }

    pub fn set_sampler(&mut self, slot: u32, sampler: SamplerStateHandle) -> Result<()> {
        Self::check_slot(slot, MAX_SAMPLER_SLOTS, "sampler")?;
        self.push(Command::SetSampler { slot, sampler });
        Ok(())
    }

    pub fn set_blend_state(&mut self, state: BlendStateHandle, blend_factor: Vec4, sample_mask: u32) {
        self.push(Command::SetBlendState { state, blend_factor, sample_mask });
    }

    pub fn set_depth_stencil_state(&mut self, state: DepthStencilStateHandle, stencil_ref: u8) {
        self.push(Command::SetDepthStencilState { state, stencil_ref });
    }

    pub fn set_rasterizer_state(&mut self, state: RasterizerStateHandle) {
        self.push(Command::SetRasterizerState(state));
    }

    pub fn set_viewport(&mut self, viewport: Viewport) -> Result<()> {
        if viewport.width <= 0.0 || viewport.height <= 0.0 {
            return invalid(format!("viewport size {}x{}", viewport.width, viewport.height));
        }
        if !(0.0..=1.0).contains(&viewport.min_depth) || !(0.0..=1.0).contains(&viewport.max_depth) {
            return invalid("viewport depth range outside [0, 1]");
        }
        self.push(Command::SetViewport(viewport));
        Ok(())
    }

    pub fn set_scissor(&mut self, scissor: Rect2D) {
        self.push(Command::SetScissor(scissor));
    }

    // ===== DRAW / DISPATCH =====

    pub fn draw(&mut self, vertex_count: u32, first_vertex: u32) -> Result<()> {
        self.require_pass(PassKind::Rendering, "draw")?;
        self.push(Command::Draw { vertex_count, first_vertex });
        Ok(())
    }

    pub fn draw_instanced(
        &mut self,
        vertex_count: u32,
        instance_count: u32,
        first_vertex: u32,
        first_instance: u32,
    ) -> Result<()> {
        self.require_pass(PassKind::Rendering, "draw_instanced")?;
        self.push(Command::DrawInstanced { vertex_count, instance_count, first_vertex, first_instance });
        Ok(())
    }

    pub fn draw_indexed(&mut self, index_count: u32, first_index: u32, base_vertex: i32) -> Result<()> {
        self.require_pass(PassKind::Rendering, "draw_indexed")?;
        self.push(Command::DrawIndexed { index_count, first_index, base_vertex });
        Ok(())
    }

    pub fn draw_indexed_instanced(
        &mut self,
        index_count: u32,
        instance_count: u32,
        first_index: u32,
        base_vertex: i32,
        first_instance: u32,
    ) -> Result<()> {
        self.require_pass(PassKind::Rendering, "draw_indexed_instanced")?;
        self.push(Command::DrawIndexedInstanced {
            index_count,
            instance_count,
            first_index,
            base_vertex,
            first_instance,
        });
        Ok(())
    }

    pub fn dispatch(&mut self, x: u32, y: u32, z: u32) -> Result<()> {
        self.require_pass(PassKind::Compute, "dispatch")?;
        if x == 0 || y == 0 || z == 0 {
            return invalid(format!("dispatch of {}x{}x{} groups", x, y, z));
        }
        self.push(Command::Dispatch { x, y, z });
        Ok(())
    }

    // ===== TRANSFER =====

    /// Copy the whole content of `src` into `dst` (sizes must match)
    pub fn copy_buffer(&mut self, src: BufferHandle, dst: BufferHandle) -> Result<()> {
        self.require_no_pass("copy_buffer")?;
        if src == dst {
            return invalid("copy_buffer source and destination are the same buffer");
        }
        self.push(Command::CopyBuffer { src, dst });
        Ok(())
    }

    pub fn copy_buffer_region(&mut self, src: BufferHandle, dst: BufferHandle, region: BufferCopyRegion) -> Result<()> {
        self.require_no_pass("copy_buffer_region")?;
        if region.size == 0 {
            return invalid("copy_buffer_region size is 0");
        }
        let (Some(src_end), Some(dst_end)) = (
            region.src_offset.checked_add(region.size),
            region.dst_offset.checked_add(region.size),
        ) else {
            return invalid("copy_buffer_region range overflows");
        };
        if src == dst {
            if region.src_offset < dst_end && region.dst_offset < src_end {
                return invalid("copy_buffer_region ranges overlap");
            }
        }
        self.push(Command::CopyBufferRegion { src, dst, region });
        Ok(())
    }

    /// Upload `data` into `buffer` at `offset` through the backend's staging memory
    pub fn update_buffer(&mut self, buffer: BufferHandle, offset: u64, data: &[u8]) -> Result<()> {
        self.require_no_pass("update_buffer")?;
        if data.is_empty() {
            return invalid("update_buffer with no data");
        }
        self.push(Command::UpdateBuffer { buffer, offset, data: data.to_vec() });
        Ok(())
    }

    /// Typed convenience over `update_buffer`
    pub fn update_buffer_typed<T: Pod>(&mut self, buffer: BufferHandle, offset: u64, data: &[T]) -> Result<()> {
        self.update_buffer(buffer, offset, bytemuck::cast_slice(data))
    }

    pub fn copy_texture(&mut self, src: TextureHandle, dst: TextureHandle) -> Result<()> {
        self.require_no_pass("copy_texture")?;
        if src == dst {
            return invalid("copy_texture source and destination are the same texture");
        }
        self.push(Command::CopyTexture { src, dst });
        Ok(())
    }

    /// Upload tightly packed texel data into one region of a texture
    pub fn update_texture(&mut self, texture: TextureHandle, region: TextureRegion, data: &[u8]) -> Result<()> {
        self.require_no_pass("update_texture")?;
        if region.extent.contains(&0) {
            return invalid("update_texture region is empty");
        }
        if data.is_empty() {
            return invalid("update_texture with no data");
        }
        self.push(Command::UpdateTexture { texture, region, data: data.to_vec() });
        Ok(())
    }

    pub fn generate_mip_maps(&mut self, texture: TextureHandle) -> Result<()> {
        self.require_no_pass("generate_mip_maps")?;
        self.push(Command::GenerateMipMaps(texture));
        Ok(())
    }

    // ===== QUERIES =====

    pub fn begin_query(&mut self, query: QueryHandle) -> Result<()> {
        self.require_pass(PassKind::Rendering, "begin_query")?;
        if self.active_queries.contains(&query) {
            return invalid("query is already active");
        }
        self.active_queries.push(query);
        self.push(Command::BeginQuery(query));
        Ok(())
    }

    pub fn end_query(&mut self, query: QueryHandle) -> Result<()> {
        match self.active_queries.iter().position(|q| *q == query) {
            Some(index) => {
                self.active_queries.swap_remove(index);
                self.push(Command::EndQuery(query));
                Ok(())
            }
            None => invalid("end_query without matching begin_query"),
        }
    }

    // ===== DEBUG MARKERS =====

    pub fn push_marker(&mut self, name: &str) {
        self.marker_depth += 1;
        self.push(Command::PushMarker(name.to_string()));
    }

    pub fn pop_marker(&mut self) -> Result<()> {
        if self.marker_depth == 0 {
            return invalid("pop_marker without matching push_marker");
        }
        self.marker_depth -= 1;
        self.push(Command::PopMarker);
        Ok(())
    }

    pub fn insert_event_marker(&mut self, name: &str) {
        self.push(Command::InsertEventMarker(name.to_string()));
    }

    // ===== FINISH =====

    /// Check the encoder is in a submittable state and hand out its commands
    pub(crate) fn finish(self) -> Result<Vec<Command>> {
        if let Some(kind) = self.pass {
            return invalid(format!("encoder submitted inside an open {:?} pass", kind));
        }
        if self.marker_depth != 0 {
            return invalid(format!("{} debug markers were not popped", self.marker_depth));
        }
        if !self.active_queries.is_empty() {
            return invalid("encoder submitted with active queries");
        }
        Ok(self.commands)
    }
}

#[cfg(test)]
#[path = "encoder_tests.rs"]
mod tests;
