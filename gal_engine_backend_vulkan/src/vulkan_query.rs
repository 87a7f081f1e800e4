/// Occlusion queries - one shared Vulkan query pool
///
/// Each GAL query owns one index of the pool. A query's result belongs to the
/// frame it was last ended in and is only read once that frame completed.

use ash::vk;
use rustc_hash::FxHashMap;
use gal_engine::gal::resource::QueryType;
use gal_engine::gal::{Error, Result};
use gal_engine::utils::IndexPool;
use gal_engine::engine_warn;

use crate::vulkan_context::{vk_error, GpuContext};
use crate::SOURCE;

#[derive(Debug)]
pub struct Query {
    pub(crate) index: u32,
    pub(crate) query_type: QueryType,
}

/// Value reported for a raw sample count
pub(crate) fn occlusion_value(query_type: QueryType, samples: u64) -> u64 {
    match query_type {
        QueryType::Occlusion => samples,
        QueryType::AnyOcclusion => samples.min(1),
    }
}

pub(crate) struct OcclusionQueryPool {
    pool: vk::QueryPool,
    indices: IndexPool,
    /// Frame each query index was last ended in
    frames: FxHashMap<u32, u64>,
    precise: bool,
}

impl OcclusionQueryPool {
    pub(crate) fn new(ctx: &GpuContext, capacity: u32, precise: bool) -> Result<Self> {
        let create_info = vk::QueryPoolCreateInfo::default()
            .query_type(vk::QueryType::OCCLUSION)
            .query_count(capacity);
        let pool = unsafe {
            let pool = ctx
                .device
                .create_query_pool(&create_info, None)
                .map_err(|e| vk_error("Failed to create occlusion query pool", e))?;
            ctx.device.reset_query_pool(pool, 0, capacity);
            pool
        };
        Ok(Self {
            pool,
            indices: IndexPool::new(capacity),
            frames: FxHashMap::default(),
            precise,
        })
    }

    pub(crate) fn allocate(&mut self, query_type: QueryType) -> Result<Query> {
        let index = self.indices.acquire().ok_or_else(|| {
            engine_warn!(SOURCE, "Occlusion query pool exhausted ({} queries)", self.indices.capacity());
            Error::OutOfMemory
        })?;
        Ok(Query { index, query_type })
    }

    pub(crate) fn free(&mut self, query: Query) {
        self.frames.remove(&query.index);
        self.indices.release(query.index);
    }

    /// Reset a query inside a command buffer before it begins
    pub(crate) unsafe fn record_reset(&self, device: &ash::Device, command_buffer: vk::CommandBuffer, query: &Query) {
        device.cmd_reset_query_pool(command_buffer, self.pool, query.index, 1);
    }

    pub(crate) unsafe fn record_begin(&self, device: &ash::Device, command_buffer: vk::CommandBuffer, query: &Query) {
        let flags = if self.precise && query.query_type == QueryType::Occlusion {
            vk::QueryControlFlags::PRECISE
        } else {
            vk::QueryControlFlags::empty()
        };
        device.cmd_begin_query(command_buffer, self.pool, query.index, flags);
    }

    pub(crate) unsafe fn record_end(&mut self, device: &ash::Device, command_buffer: vk::CommandBuffer, query: &Query, frame: u64) {
        device.cmd_end_query(command_buffer, self.pool, query.index);
        self.frames.insert(query.index, frame);
    }

    /// Result of a query whose frame completed, `None` otherwise
    pub(crate) fn result(&self, ctx: &GpuContext, query: &Query, completed: Option<u64>) -> Result<Option<u64>> {
        let Some(&frame) = self.frames.get(&query.index) else {
            return Ok(None);
        };
        if completed.map_or(true, |c| c < frame) {
            return Ok(None);
        }

        // [samples, availability]
        let mut data = [[0u64; 2]; 1];
        let fetched = unsafe {
            ctx.device.get_query_pool_results(
                self.pool,
                query.index,
                &mut data,
                vk::QueryResultFlags::TYPE_64 | vk::QueryResultFlags::WITH_AVAILABILITY,
            )
        };
        match fetched {
            Ok(()) | Err(vk::Result::NOT_READY) => {}
            Err(e) => return Err(vk_error("Failed to read occlusion query", e)),
        }
        if data[0][1] == 0 {
            return Ok(None);
        }
        Ok(Some(occlusion_value(query.query_type, data[0][0])))
    }

    pub(crate) fn destroy(&mut self, ctx: &GpuContext) {
        unsafe { ctx.device.destroy_query_pool(self.pool, None) };
        self.frames.clear();
    }
}
