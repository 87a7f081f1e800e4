/// Backend that talks to no GPU
///
/// Every native object is a numbered record. The null backend keeps enough
/// state to observe what the device forwards: submitted commands, buffer
/// contents, debug names, live object counts. Frames complete after a
/// configurable latency, timestamps come from a synthetic clock and occlusion
/// queries count the vertices drawn between `BeginQuery` and `EndQuery`.
///
/// Failures can be injected (`fail_next_init`, `simulate_device_loss`,
/// memory budget, unsupported formats) to exercise device error paths.

use rustc_hash::{FxHashMap, FxHashSet};
use crate::command::Command;
use crate::config::{BackendKind, DeviceConfig};
use crate::error::{Error, Result};
use crate::resource::*;
use crate::utils::IndexPool;
use crate::{engine_debug, engine_warn};
use super::backend::{Backend, BackendObject, ViewTarget};
use super::tables::ResourceTables;

const SOURCE: &str = "gal::NullBackend";

/// Ticks the synthetic clock advances per recorded command
const TICKS_PER_COMMAND: u64 = 10;

// ===== NATIVE OBJECTS =====

#[derive(Debug)]
pub struct NullBuffer {
    pub id: u64,
    pub size: u64,
}

#[derive(Debug)]
pub struct NullTexture {
    pub id: u64,
    pub size: u64,
}

/// Native record of a view or state object
#[derive(Debug)]
pub struct NullObject {
    pub id: u64,
}

#[derive(Debug)]
pub struct NullQuery {
    pub id: u64,
    pub query_type: QueryType,
    /// Index in the backend's query pool
    pub index: u32,
}

/// Commands received by one `submit` call
#[derive(Debug, Clone)]
pub struct NullSubmission {
    pub frame: u64,
    pub commands: Vec<Command>,
}

// ===== BACKEND =====

pub struct NullBackend {
    next_id: u64,
    live_objects: usize,
    allocated_bytes: u64,
    memory_budget: Option<u64>,
    unsupported: FxHashSet<Format>,
    latency: u64,

    last_ended: Option<u64>,
    completed: Option<u64>,
    recording: Option<u64>,

    buffer_contents: FxHashMap<u64, Vec<u8>>,
    debug_names: FxHashMap<u64, String>,
    submissions: Vec<NullSubmission>,

    clock: u64,
    timestamps: FxHashMap<u64, FxHashMap<u32, u64>>,

    query_indices: IndexPool,
    open_queries: FxHashMap<u64, u64>,
    pending_queries: Vec<(u64, u64, u64)>,
    query_results: FxHashMap<u64, u64>,

    fail_next: Option<Error>,
    lost: bool,
}

impl NullBackend {
    /// Backend whose frames complete as soon as they end
    pub fn new(config: &DeviceConfig) -> Self {
        engine_debug!(SOURCE, "Null backend created ({} queries max)", config.max_queries);
        Self {
            next_id: 1,
            live_objects: 0,
            allocated_bytes: 0,
            memory_budget: None,
            unsupported: FxHashSet::default(),
            latency: 0,
            last_ended: None,
            completed: None,
            recording: None,
            buffer_contents: FxHashMap::default(),
            debug_names: FxHashMap::default(),
            submissions: Vec::new(),
            clock: 0,
            timestamps: FxHashMap::default(),
            query_indices: IndexPool::new(config.max_queries),
            open_queries: FxHashMap::default(),
            pending_queries: Vec::new(),
            query_results: FxHashMap::default(),
            fail_next: None,
            lost: false,
        }
    }

    /// Frames complete `frames` frames after they end
    pub fn with_latency(mut self, frames: u64) -> Self {
        self.latency = frames;
        self
    }

    /// Creation fails with `OutOfMemory` beyond `bytes` of buffer and texture storage
    pub fn with_memory_budget(mut self, bytes: u64) -> Self {
        self.memory_budget = Some(bytes);
        self
    }

    /// Report no capability at all for `format`
    pub fn with_unsupported_format(mut self, format: Format) -> Self {
        self.unsupported.insert(format);
        self
    }

    /// Make the next `init_*` call fail with `error`
    pub fn fail_next_init(&mut self, error: Error) {
        self.fail_next = Some(error);
    }

    /// Every following call reports `DeviceLost`
    pub fn simulate_device_loss(&mut self) {
        engine_warn!(SOURCE, "Simulating device loss");
        self.lost = true;
    }

    /// Native objects created and not yet released
    pub fn live_objects(&self) -> usize {
        self.live_objects
    }

    pub fn allocated_bytes(&self) -> u64 {
        self.allocated_bytes
    }

    pub fn submissions(&self) -> &[NullSubmission] {
        &self.submissions
    }

    /// Every command submitted in `frame`, in order
    pub fn commands_of_frame(&self, frame: u64) -> Vec<&Command> {
        self.submissions
            .iter()
            .filter(|s| s.frame == frame)
            .flat_map(|s| s.commands.iter())
            .collect()
    }

    pub fn clear_submissions(&mut self) {
        self.submissions.clear();
    }

    /// Current contents of a buffer (initial data plus submitted updates and copies)
    pub fn buffer_contents(&self, buffer: &NullBuffer) -> Option<&[u8]> {
        self.buffer_contents.get(&buffer.id).map(|v| v.as_slice())
    }

    /// Debug name attached to a native object id
    pub fn debug_name(&self, id: u64) -> Option<&str> {
        self.debug_names.get(&id).map(|s| s.as_str())
    }

    // ===== INTERNALS =====

    fn check_alive(&self) -> Result<()> {
        if self.lost {
            Err(Error::DeviceLost)
        } else {
            Ok(())
        }
    }

    /// Common entry of every init hook
    fn begin_init(&mut self, bytes: u64) -> Result<u64> {
        self.check_alive()?;
        if let Some(err) = self.fail_next.take() {
            return Err(err);
        }
        if let Some(budget) = self.memory_budget {
            if self.allocated_bytes + bytes > budget {
                return Err(Error::OutOfMemory);
            }
        }
        let id = self.next_id;
        self.next_id += 1;
        self.live_objects += 1;
        self.allocated_bytes += bytes;
        Ok(id)
    }

    fn release(&mut self, id: u64, bytes: u64) -> Result<()> {
        self.live_objects = self.live_objects.saturating_sub(1);
        self.allocated_bytes = self.allocated_bytes.saturating_sub(bytes);
        self.debug_names.remove(&id);
        Ok(())
    }

    fn object(&mut self) -> Result<NullObject> {
        Ok(NullObject { id: self.begin_init(0)? })
    }

    fn buffer_id(
        resources: &ResourceTables<Self>,
        handle: crate::handle::BufferHandle,
    ) -> Result<u64> {
        resources
            .buffer(handle)
            .and_then(|b| b.native())
            .map(|n| n.id)
            .ok_or_else(|| Error::InvalidHandle("buffer not live at submit".to_string()))
    }

    fn query_id(
        resources: &ResourceTables<Self>,
        handle: crate::handle::QueryHandle,
    ) -> Result<(u64, QueryType)> {
        resources
            .query(handle)
            .and_then(|q| q.native())
            .map(|n| (n.id, n.query_type))
            .ok_or_else(|| Error::InvalidHandle("query not live at submit".to_string()))
    }

    fn complete_up_to(&mut self, frame: u64) {
        if self.completed.is_some_and(|done| done >= frame) {
            return;
        }
        self.completed = Some(frame);
        let (ready, pending): (Vec<_>, Vec<_>) =
            self.pending_queries.drain(..).partition(|(f, _, _)| *f <= frame);
        self.pending_queries = pending;
        for (_, id, value) in ready {
            self.query_results.insert(id, value);
        }
    }
}

/// Samples counted by the null occlusion model
fn drawn_vertices(command: &Command) -> u64 {
    match *command {
        Command::Draw { vertex_count, .. } => vertex_count as u64,
        Command::DrawInstanced { vertex_count, instance_count, .. } => vertex_count as u64 * instance_count as u64,
        Command::DrawIndexed { index_count, .. } => index_count as u64,
        Command::DrawIndexedInstanced { index_count, instance_count, .. } => {
            index_count as u64 * instance_count as u64
        }
        _ => 0,
    }
}

impl Backend for NullBackend {
    type Buffer = NullBuffer;
    type Texture = NullTexture;
    type ResourceView = NullObject;
    type RenderTargetView = NullObject;
    type UnorderedAccessView = NullObject;
    type Shader = NullObject;
    type VertexDeclaration = NullObject;
    type BlendState = NullObject;
    type DepthStencilState = NullObject;
    type RasterizerState = NullObject;
    type SamplerState = NullObject;
    type Query = NullQuery;

    fn kind(&self) -> BackendKind {
        BackendKind::Null
    }

    fn adapter_name(&self) -> String {
        "Null adapter".to_string()
    }

    fn format_support(&self, format: Format) -> FormatSupport {
        if self.unsupported.contains(&format) {
            return FormatSupport::empty();
        }
        if format.is_depth() {
            FormatSupport::SAMPLED | FormatSupport::DEPTH_STENCIL
        } else if format.is_compressed() {
            FormatSupport::SAMPLED
        } else {
            let mut support = FormatSupport::SAMPLED
                | FormatSupport::RENDER_TARGET
                | FormatSupport::BLENDABLE
                | FormatSupport::UNORDERED_ACCESS
                | FormatSupport::TYPED_BUFFER;
            if format.is_vertex_format() {
                support |= FormatSupport::VERTEX_BUFFER;
            }
            support
        }
    }

    fn init_buffer(&mut self, desc: &BufferCreationDescription, initial_data: Option<&[u8]>) -> Result<NullBuffer> {
        let id = self.begin_init(desc.total_size)?;
        let mut contents = vec![0u8; desc.total_size as usize];
        if let Some(data) = initial_data {
            contents[..data.len()].copy_from_slice(data);
        }
        self.buffer_contents.insert(id, contents);
        Ok(NullBuffer { id, size: desc.total_size })
    }

    fn deinit_buffer(&mut self, native: NullBuffer) -> Result<()> {
        self.buffer_contents.remove(&native.id);
        self.release(native.id, native.size)
    }

    fn init_texture(&mut self, desc: &TextureCreationDescription, _initial_data: Option<&[u8]>) -> Result<NullTexture> {
        let size = desc.total_data_size() * desc.sample_count as u64;
        let id = self.begin_init(size)?;
        Ok(NullTexture { id, size })
    }

    fn deinit_texture(&mut self, native: NullTexture) -> Result<()> {
        self.release(native.id, native.size)
    }

    fn init_resource_view(&mut self, _desc: &ResourceViewDescription, _target: ViewTarget<'_, Self>) -> Result<NullObject> {
        self.object()
    }

    fn deinit_resource_view(&mut self, native: NullObject) -> Result<()> {
        self.release(native.id, 0)
    }

    fn init_render_target_view(
        &mut self,
        _desc: &RenderTargetViewDescription,
        _target: ViewTarget<'_, Self>,
    ) -> Result<NullObject> {
        self.object()
    }

    fn deinit_render_target_view(&mut self, native: NullObject) -> Result<()> {
        self.release(native.id, 0)
    }

    fn init_unordered_access_view(
        &mut self,
        _desc: &UnorderedAccessViewDescription,
        _target: ViewTarget<'_, Self>,
    ) -> Result<NullObject> {
        self.object()
    }

    fn deinit_unordered_access_view(&mut self, native: NullObject) -> Result<()> {
        self.release(native.id, 0)
    }

    fn init_shader(&mut self, _desc: &ShaderCreationDescription) -> Result<NullObject> {
        self.object()
    }

    fn deinit_shader(&mut self, native: NullObject) -> Result<()> {
        self.release(native.id, 0)
    }

    fn init_vertex_declaration(
        &mut self,
        _desc: &VertexDeclarationDescription,
        _shader: &NullObject,
        _shader_desc: &ShaderCreationDescription,
    ) -> Result<NullObject> {
        self.object()
    }

    fn deinit_vertex_declaration(&mut self, native: NullObject) -> Result<()> {
        self.release(native.id, 0)
    }

    fn init_blend_state(&mut self, _desc: &BlendStateDescription) -> Result<NullObject> {
        self.object()
    }

    fn deinit_blend_state(&mut self, native: NullObject) -> Result<()> {
        self.release(native.id, 0)
    }

    fn init_depth_stencil_state(&mut self, _desc: &DepthStencilStateDescription) -> Result<NullObject> {
        self.object()
    }

    fn deinit_depth_stencil_state(&mut self, native: NullObject) -> Result<()> {
        self.release(native.id, 0)
    }

    fn init_rasterizer_state(&mut self, _desc: &RasterizerStateDescription) -> Result<NullObject> {
        self.object()
    }

    fn deinit_rasterizer_state(&mut self, native: NullObject) -> Result<()> {
        self.release(native.id, 0)
    }

    fn init_sampler_state(&mut self, _desc: &SamplerStateDescription) -> Result<NullObject> {
        self.object()
    }

    fn deinit_sampler_state(&mut self, native: NullObject) -> Result<()> {
        self.release(native.id, 0)
    }

    fn init_query(&mut self, desc: &QueryCreationDescription) -> Result<NullQuery> {
        self.check_alive()?;
        let index = self.query_indices.acquire().ok_or(Error::OutOfMemory)?;
        match self.begin_init(0) {
            Ok(id) => Ok(NullQuery { id, query_type: desc.query_type, index }),
            Err(err) => {
                self.query_indices.release(index);
                Err(err)
            }
        }
    }

    fn deinit_query(&mut self, native: NullQuery) -> Result<()> {
        self.query_indices.release(native.index);
        self.query_results.remove(&native.id);
        self.open_queries.remove(&native.id);
        self.release(native.id, 0)
    }

    fn set_debug_name(&mut self, object: BackendObject<'_, Self>, name: &str) {
        let id = match object {
            BackendObject::Buffer(n) => n.id,
            BackendObject::Texture(n) => n.id,
            BackendObject::ResourceView(n)
            | BackendObject::RenderTargetView(n)
            | BackendObject::UnorderedAccessView(n)
            | BackendObject::Shader(n)
            | BackendObject::VertexDeclaration(n)
            | BackendObject::BlendState(n)
            | BackendObject::DepthStencilState(n)
            | BackendObject::RasterizerState(n)
            | BackendObject::SamplerState(n) => n.id,
            BackendObject::Query(n) => n.id,
        };
        self.debug_names.insert(id, name.to_string());
    }

    fn wait_for_frame(&mut self, frame: u64) -> Result<()> {
        self.check_alive()?;
        match self.last_ended {
            Some(ended) if ended >= frame => {
                self.complete_up_to(frame);
                Ok(())
            }
            _ => Err(Error::BackendError(format!("frame {} was never submitted", frame))),
        }
    }

    fn begin_frame(&mut self, frame: u64) -> Result<()> {
        self.check_alive()?;
        self.recording = Some(frame);
        self.timestamps.insert(frame, FxHashMap::default());
        Ok(())
    }

    fn submit(&mut self, frame: u64, commands: &[Command], resources: &ResourceTables<Self>) -> Result<()> {
        self.check_alive()?;
        if self.recording != Some(frame) {
            return Err(Error::BackendError(format!("submit for frame {} outside recording", frame)));
        }

        for command in commands {
            self.clock += TICKS_PER_COMMAND + drawn_vertices(command);
            match command {
                Command::UpdateBuffer { buffer, offset, data } => {
                    let id = Self::buffer_id(resources, *buffer)?;
                    if let Some(contents) = self.buffer_contents.get_mut(&id) {
                        let start = *offset as usize;
                        contents[start..start + data.len()].copy_from_slice(data);
                    }
                }
                Command::CopyBuffer { src, dst } => {
                    let src = Self::buffer_id(resources, *src)?;
                    let dst = Self::buffer_id(resources, *dst)?;
                    if let Some(bytes) = self.buffer_contents.get(&src).cloned() {
                        self.buffer_contents.insert(dst, bytes);
                    }
                }
                Command::CopyBufferRegion { src, dst, region } => {
                    let src = Self::buffer_id(resources, *src)?;
                    let dst = Self::buffer_id(resources, *dst)?;
                    let (s, d, n) = (region.src_offset as usize, region.dst_offset as usize, region.size as usize);
                    let bytes = self.buffer_contents.get(&src).map(|c| c[s..s + n].to_vec());
                    if let (Some(bytes), Some(target)) = (bytes, self.buffer_contents.get_mut(&dst)) {
                        target[d..d + n].copy_from_slice(&bytes);
                    }
                }
                Command::BeginQuery(query) => {
                    let (id, _) = Self::query_id(resources, *query)?;
                    self.query_results.remove(&id);
                    self.open_queries.insert(id, 0);
                }
                Command::EndQuery(query) => {
                    let (id, query_type) = Self::query_id(resources, *query)?;
                    let samples = self.open_queries.remove(&id).unwrap_or(0);
                    let value = match query_type {
                        QueryType::Occlusion => samples,
                        QueryType::AnyOcclusion => samples.min(1),
                    };
                    self.pending_queries.push((frame, id, value));
                }
                Command::InsertTimestamp { slot } => {
                    let clock = self.clock;
                    self.timestamps.entry(frame).or_default().insert(*slot, clock);
                }
                other if other.is_draw() => {
                    let samples = drawn_vertices(other);
                    for open in self.open_queries.values_mut() {
                        *open += samples;
                    }
                }
                _ => {}
            }
        }

        self.submissions.push(NullSubmission { frame, commands: commands.to_vec() });
        Ok(())
    }

    fn end_frame(&mut self, frame: u64, _timestamp_count: u32) -> Result<()> {
        self.check_alive()?;
        self.recording = None;
        self.last_ended = Some(frame);
        if frame >= self.latency {
            self.complete_up_to(frame - self.latency);
        }
        Ok(())
    }

    fn completed_frame(&mut self) -> Result<Option<u64>> {
        self.check_alive()?;
        Ok(self.completed)
    }

    fn timestamp_period(&self) -> f64 {
        1.0
    }

    fn read_timestamps(&mut self, frame: u64, count: u32) -> Result<Vec<Option<u64>>> {
        self.check_alive()?;
        let written = self.timestamps.remove(&frame).unwrap_or_default();
        Ok((0..count).map(|slot| written.get(&slot).copied()).collect())
    }

    fn query_result(&mut self, query: &NullQuery) -> Result<Option<u64>> {
        self.check_alive()?;
        Ok(self.query_results.get(&query.id).copied())
    }

    fn wait_idle(&mut self) -> Result<()> {
        self.check_alive()?;
        if let Some(ended) = self.last_ended {
            self.complete_up_to(ended);
        }
        Ok(())
    }
}

#[cfg(test)]
#[path = "null_backend_tests.rs"]
mod tests;
