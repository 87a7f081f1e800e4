/// Per-frame ring slots and deferred native deletion
///
/// The backend keeps `frames_in_flight` slots, indexed by
/// `frame % frames_in_flight`. A slot owns the command buffer the frame is
/// recorded into, the fence signalled when the GPU finishes it, the
/// descriptor pools of its draws and the query pool of its timestamps.

use std::collections::VecDeque;
use ash::vk;
use gpu_allocator::vulkan::Allocation;
use gal_engine::gal::Result;
use gal_engine::engine_debug;

use crate::vulkan_context::{vk_error, GpuContext};
use crate::SOURCE;

/// Sets per descriptor pool (a new pool is added when one fills up)
const DESCRIPTOR_SETS_PER_POOL: u32 = 1024;

// ===== DEFERRED DELETION =====

/// Native object whose destruction waits for the GPU
#[derive(Debug)]
pub(crate) enum DeferredRelease {
    Buffer { buffer: vk::Buffer, allocation: Option<Allocation> },
    Image { image: vk::Image, allocation: Option<Allocation> },
    ImageView(vk::ImageView),
    BufferView(vk::BufferView),
    Sampler(vk::Sampler),
    ShaderModule(vk::ShaderModule),
    DescriptorSetLayout(vk::DescriptorSetLayout),
    PipelineLayout(vk::PipelineLayout),
    Pipeline(vk::Pipeline),
}

impl DeferredRelease {
    /// Destroy the object now (the GPU no longer uses it)
    pub(crate) unsafe fn release(self, ctx: &GpuContext) {
        let device = &ctx.device;
        match self {
            DeferredRelease::Buffer { buffer, allocation } => {
                if let Some(allocation) = allocation {
                    ctx.free(allocation);
                }
                device.destroy_buffer(buffer, None);
            }
            DeferredRelease::Image { image, allocation } => {
                if let Some(allocation) = allocation {
                    ctx.free(allocation);
                }
                device.destroy_image(image, None);
            }
            DeferredRelease::ImageView(view) => device.destroy_image_view(view, None),
            DeferredRelease::BufferView(view) => device.destroy_buffer_view(view, None),
            DeferredRelease::Sampler(sampler) => device.destroy_sampler(sampler, None),
            DeferredRelease::ShaderModule(module) => device.destroy_shader_module(module, None),
            DeferredRelease::DescriptorSetLayout(layout) => device.destroy_descriptor_set_layout(layout, None),
            DeferredRelease::PipelineLayout(layout) => device.destroy_pipeline_layout(layout, None),
            DeferredRelease::Pipeline(pipeline) => device.destroy_pipeline(pipeline, None),
        }
    }
}

/// Items stamped with the frame after which they may be released
#[derive(Debug)]
pub(crate) struct DeletionQueue<T> {
    entries: VecDeque<(u64, T)>,
}

impl<T> Default for DeletionQueue<T> {
    fn default() -> Self {
        Self { entries: VecDeque::new() }
    }
}

impl<T> DeletionQueue<T> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, frame: u64, item: T) {
        self.entries.push_back((frame, item));
    }

    /// Remove every item whose frame is at most `completed_frame`
    pub fn drain_completed(&mut self, completed_frame: u64) -> Vec<T> {
        let mut ready = Vec::new();
        let mut kept = VecDeque::with_capacity(self.entries.len());
        for (frame, item) in self.entries.drain(..) {
            if frame <= completed_frame {
                ready.push(item);
            } else {
                kept.push_back((frame, item));
            }
        }
        self.entries = kept;
        ready
    }

    /// Remove everything (the GPU is idle)
    pub fn drain_all(&mut self) -> Vec<T> {
        self.entries.drain(..).map(|(_, item)| item).collect()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

// ===== FRAME SLOT =====

fn create_descriptor_pool(device: &ash::Device) -> Result<vk::DescriptorPool> {
    let pool_sizes = [
        vk::DescriptorPoolSize { ty: vk::DescriptorType::UNIFORM_BUFFER, descriptor_count: 4096 },
        vk::DescriptorPoolSize { ty: vk::DescriptorType::SAMPLED_IMAGE, descriptor_count: 4096 },
        vk::DescriptorPoolSize { ty: vk::DescriptorType::SAMPLER, descriptor_count: 2048 },
        vk::DescriptorPoolSize { ty: vk::DescriptorType::STORAGE_IMAGE, descriptor_count: 1024 },
        vk::DescriptorPoolSize { ty: vk::DescriptorType::STORAGE_BUFFER, descriptor_count: 2048 },
        vk::DescriptorPoolSize { ty: vk::DescriptorType::UNIFORM_TEXEL_BUFFER, descriptor_count: 1024 },
        vk::DescriptorPoolSize { ty: vk::DescriptorType::STORAGE_TEXEL_BUFFER, descriptor_count: 1024 },
        vk::DescriptorPoolSize { ty: vk::DescriptorType::COMBINED_IMAGE_SAMPLER, descriptor_count: 1024 },
    ];
    let info = vk::DescriptorPoolCreateInfo::default()
        .pool_sizes(&pool_sizes)
        .max_sets(DESCRIPTOR_SETS_PER_POOL);

    unsafe {
        device
            .create_descriptor_pool(&info, None)
            .map_err(|e| vk_error("Failed to create descriptor pool", e))
    }
}

/// Resources of one frame in flight
#[derive(Debug)]
pub(crate) struct FrameSlot {
    command_pool: vk::CommandPool,
    pub command_buffer: vk::CommandBuffer,
    /// Signalled when the GPU finished the slot's last frame
    pub fence: vk::Fence,
    descriptor_pools: Vec<vk::DescriptorPool>,
    current_pool: usize,
    pub timestamp_pool: vk::QueryPool,
    pub timestamp_capacity: u32,
    /// Frame recorded into the slot last
    pub frame: Option<u64>,
    /// Submitted and not yet known to be complete
    pub in_flight: bool,
}

impl FrameSlot {
    pub(crate) fn new(ctx: &GpuContext, timestamp_capacity: u32) -> Result<Self> {
        let device = &ctx.device;
        unsafe {
            let pool_info = vk::CommandPoolCreateInfo::default()
                .queue_family_index(ctx.graphics_queue_family)
                .flags(vk::CommandPoolCreateFlags::TRANSIENT);
            let command_pool = device
                .create_command_pool(&pool_info, None)
                .map_err(|e| vk_error("Failed to create frame command pool", e))?;

            let allocate_info = vk::CommandBufferAllocateInfo::default()
                .command_pool(command_pool)
                .level(vk::CommandBufferLevel::PRIMARY)
                .command_buffer_count(1);
            let command_buffer = device
                .allocate_command_buffers(&allocate_info)
                .map_err(|e| vk_error("Failed to allocate frame command buffer", e))?[0];

            let fence = device
                .create_fence(&vk::FenceCreateInfo::default(), None)
                .map_err(|e| vk_error("Failed to create frame fence", e))?;

            let query_info = vk::QueryPoolCreateInfo::default()
                .query_type(vk::QueryType::TIMESTAMP)
                .query_count(timestamp_capacity);
            let timestamp_pool = device
                .create_query_pool(&query_info, None)
                .map_err(|e| vk_error("Failed to create timestamp query pool", e))?;
            device.reset_query_pool(timestamp_pool, 0, timestamp_capacity);

            Ok(Self {
                command_pool,
                command_buffer,
                fence,
                descriptor_pools: vec![create_descriptor_pool(device)?],
                current_pool: 0,
                timestamp_pool,
                timestamp_capacity,
                frame: None,
                in_flight: false,
            })
        }
    }

    /// Recycle the slot for `frame` and open its command buffer
    ///
    /// The caller made sure the slot's previous frame has completed.
    pub(crate) fn begin(&mut self, ctx: &GpuContext, frame: u64) -> Result<()> {
        let device = &ctx.device;
        unsafe {
            device
                .reset_fences(&[self.fence])
                .map_err(|e| vk_error("Failed to reset frame fence", e))?;
            device
                .reset_command_pool(self.command_pool, vk::CommandPoolResetFlags::empty())
                .map_err(|e| vk_error("Failed to reset frame command pool", e))?;
            for &pool in &self.descriptor_pools {
                device
                    .reset_descriptor_pool(pool, vk::DescriptorPoolResetFlags::empty())
                    .map_err(|e| vk_error("Failed to reset descriptor pool", e))?;
            }
            self.current_pool = 0;

            let begin_info = vk::CommandBufferBeginInfo::default()
                .flags(vk::CommandBufferUsageFlags::ONE_TIME_SUBMIT);
            device
                .begin_command_buffer(self.command_buffer, &begin_info)
                .map_err(|e| vk_error("Failed to begin frame command buffer", e))?;
            device.cmd_reset_query_pool(self.command_buffer, self.timestamp_pool, 0, self.timestamp_capacity);
        }
        self.frame = Some(frame);
        self.in_flight = false;
        Ok(())
    }

    /// Allocate a descriptor set, growing the pool list when exhausted
    pub(crate) fn allocate_descriptor_set(
        &mut self,
        ctx: &GpuContext,
        layout: vk::DescriptorSetLayout,
    ) -> Result<vk::DescriptorSet> {
        let layouts = [layout];
        loop {
            let info = vk::DescriptorSetAllocateInfo::default()
                .descriptor_pool(self.descriptor_pools[self.current_pool])
                .set_layouts(&layouts);
            match unsafe { ctx.device.allocate_descriptor_sets(&info) } {
                Ok(sets) => return Ok(sets[0]),
                Err(vk::Result::ERROR_OUT_OF_POOL_MEMORY) | Err(vk::Result::ERROR_FRAGMENTED_POOL) => {
                    self.current_pool += 1;
                    if self.current_pool == self.descriptor_pools.len() {
                        self.descriptor_pools.push(create_descriptor_pool(&ctx.device)?);
                        engine_debug!(
                            SOURCE,
                            "Frame descriptor pools grown to {}",
                            self.descriptor_pools.len()
                        );
                    }
                }
                Err(e) => return Err(vk_error("Failed to allocate descriptor set", e)),
            }
        }
    }

    /// Destroy the slot's objects (the GPU must be idle)
    pub(crate) fn destroy(&mut self, ctx: &GpuContext) {
        let device = &ctx.device;
        unsafe {
            for pool in self.descriptor_pools.drain(..) {
                device.destroy_descriptor_pool(pool, None);
            }
            device.destroy_query_pool(self.timestamp_pool, None);
            device.destroy_fence(self.fence, None);
            device.destroy_command_pool(self.command_pool, None);
        }
    }
}

#[cfg(test)]
#[path = "vulkan_frame_tests.rs"]
mod tests;
