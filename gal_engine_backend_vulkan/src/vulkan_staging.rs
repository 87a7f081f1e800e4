/// Staging memory for CPU to GPU uploads
///
/// `StagingBufferPool` owns host-visible chunks and sub-allocates aligned
/// ranges out of them. A range handed back with `reclaim_buffer` stays
/// reserved until the frame it was used in has completed on the GPU, so
/// in-flight memory is never handed out twice. The pool never waits on the
/// GPU: when no chunk has room it reserves a new one.
///
/// The range bookkeeping lives in `StagingAllocator`, which knows nothing
/// about Vulkan and is tested on its own.

use std::collections::VecDeque;
use std::sync::Arc;
use ash::vk;
use gpu_allocator::vulkan::Allocation;
use gpu_allocator::MemoryLocation;
use gal_engine::gal::{Error, Result};
use gal_engine::{engine_bail, engine_debug, engine_err};

use crate::vulkan_context::{vk_error, GpuContext};
use crate::SOURCE;

/// Byte range inside one staging chunk
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct StagingRange {
    pub chunk: usize,
    pub offset: u64,
    pub size: u64,
}

impl StagingRange {
    pub fn end(&self) -> u64 {
        self.offset + self.size
    }
}

#[derive(Debug)]
struct ChunkRanges {
    size: u64,
    /// Free blocks as (offset, size), sorted by offset, never adjacent
    free: Vec<(u64, u64)>,
}

fn align_up(value: u64, alignment: u64) -> u64 {
    let alignment = alignment.max(1);
    value.div_ceil(alignment) * alignment
}

/// First-fit range allocator with frame-stamped deferred release
#[derive(Debug, Default)]
pub(crate) struct StagingAllocator {
    chunks: Vec<ChunkRanges>,
    pending: VecDeque<(u64, StagingRange)>,
}

impl StagingAllocator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a new chunk of `size` bytes, fully free
    pub fn add_chunk(&mut self, size: u64) -> usize {
        self.chunks.push(ChunkRanges { size, free: vec![(0, size)] });
        self.chunks.len() - 1
    }

    pub fn chunk_count(&self) -> usize {
        self.chunks.len()
    }

    pub fn chunk_size(&self, chunk: usize) -> u64 {
        self.chunks.get(chunk).map_or(0, |c| c.size)
    }

    /// Carve an aligned range out of the first free block that fits
    pub fn try_allocate(&mut self, alignment: u64, size: u64) -> Option<StagingRange> {
        for (chunk_index, chunk) in self.chunks.iter_mut().enumerate() {
            let found = chunk.free.iter().position(|&(offset, len)| {
                let aligned = align_up(offset, alignment);
                aligned + size <= offset + len
            });
            if let Some(block) = found {
                let (offset, len) = chunk.free.remove(block);
                let aligned = align_up(offset, alignment);
                let end = offset + len;
                let mut insert_at = block;
                if aligned > offset {
                    chunk.free.insert(insert_at, (offset, aligned - offset));
                    insert_at += 1;
                }
                if aligned + size < end {
                    chunk.free.insert(insert_at, (aligned + size, end - aligned - size));
                }
                return Some(StagingRange { chunk: chunk_index, offset: aligned, size });
            }
        }
        None
    }

    /// Keep `range` reserved until `frame` completes
    pub fn reclaim(&mut self, range: StagingRange, frame: u64) {
        self.pending.push_back((frame, range));
    }

    /// Return `range` to its chunk's free list, merging with neighbours
    pub fn release(&mut self, range: StagingRange) {
        let Some(chunk) = self.chunks.get_mut(range.chunk) else {
            return;
        };
        let index = chunk.free.partition_point(|&(offset, _)| offset < range.offset);
        chunk.free.insert(index, (range.offset, range.size));

        // Merge with the next block
        if index + 1 < chunk.free.len() {
            let (offset, len) = chunk.free[index];
            let (next_offset, next_len) = chunk.free[index + 1];
            if offset + len == next_offset {
                chunk.free[index] = (offset, len + next_len);
                chunk.free.remove(index + 1);
            }
        }
        // Merge with the previous block
        if index > 0 {
            let (prev_offset, prev_len) = chunk.free[index - 1];
            let (offset, len) = chunk.free[index];
            if prev_offset + prev_len == offset {
                chunk.free[index - 1] = (prev_offset, prev_len + len);
                chunk.free.remove(index);
            }
        }
    }

    /// Release every pending range whose frame is at most `completed_frame`
    pub fn retire_completed(&mut self, completed_frame: u64) -> usize {
        let mut retired = Vec::new();
        self.pending.retain(|&(frame, range)| {
            if frame <= completed_frame {
                retired.push(range);
                false
            } else {
                true
            }
        });
        let count = retired.len();
        for range in retired {
            self.release(range);
        }
        count
    }

    /// Number of ranges waiting for their frame
    pub fn pending_count(&self) -> usize {
        self.pending.len()
    }

    /// Total free bytes of a chunk
    pub fn free_bytes(&self, chunk: usize) -> u64 {
        self.chunks.get(chunk).map_or(0, |c| c.free.iter().map(|(_, len)| len).sum())
    }

    /// Number of free blocks of a chunk (1 when fully coalesced)
    pub fn free_block_count(&self, chunk: usize) -> usize {
        self.chunks.get(chunk).map_or(0, |c| c.free.len())
    }
}

/// One sub-allocation of the pool, valid until reclaimed
#[derive(Debug)]
pub struct StagingBuffer {
    buffer: vk::Buffer,
    range: StagingRange,
}

impl StagingBuffer {
    /// Chunk buffer the range lives in
    pub fn buffer(&self) -> vk::Buffer {
        self.buffer
    }

    /// Offset of the range inside `buffer()`
    pub fn offset(&self) -> u64 {
        self.range.offset
    }

    pub fn size(&self) -> u64 {
        self.range.size
    }
}

#[derive(Debug)]
struct StagingChunk {
    buffer: vk::Buffer,
    allocation: Option<Allocation>,
}

/// Host-visible upload memory shared by every transfer of the backend
pub struct StagingBufferPool {
    ctx: Arc<GpuContext>,
    chunk_size: u64,
    chunks: Vec<StagingChunk>,
    ranges: StagingAllocator,
}

impl StagingBufferPool {
    pub(crate) fn new(ctx: Arc<GpuContext>, chunk_size: u64) -> Self {
        Self {
            ctx,
            chunk_size,
            chunks: Vec::new(),
            ranges: StagingAllocator::new(),
        }
    }

    /// Sub-allocate `size` bytes whose offset is a multiple of `alignment`
    pub fn allocate_buffer(&mut self, alignment: u64, size: u64) -> Result<StagingBuffer> {
        if size == 0 {
            engine_bail!(SOURCE, Error::InvalidResource => "staging allocation of 0 bytes");
        }
        let range = match self.ranges.try_allocate(alignment, size) {
            Some(range) => range,
            None => {
                let chunk_size = self.chunk_size.max(align_up(size, alignment.max(1)) + alignment);
                self.add_chunk(chunk_size)?;
                self.ranges
                    .try_allocate(alignment, size)
                    .ok_or_else(|| engine_err!(SOURCE, "staging chunk of {} bytes cannot hold {} bytes", chunk_size, size))?
            }
        };
        Ok(StagingBuffer { buffer: self.chunks[range.chunk].buffer, range })
    }

    /// Copy `data` into the start of a staging range
    pub fn write(&mut self, staging: &StagingBuffer, data: &[u8]) -> Result<()> {
        if data.len() as u64 > staging.range.size {
            engine_bail!(SOURCE, Error::InvalidResource =>
                "{} bytes do not fit a {} byte staging range", data.len(), staging.range.size);
        }
        let chunk = &mut self.chunks[staging.range.chunk];
        let mapped = chunk
            .allocation
            .as_mut()
            .and_then(|a| a.mapped_slice_mut())
            .ok_or_else(|| engine_err!(SOURCE, "staging chunk {} is not mapped", staging.range.chunk))?;
        let start = staging.range.offset as usize;
        mapped[start..start + data.len()].copy_from_slice(data);
        Ok(())
    }

    /// Hand a range back; it is reused once `frame` completed
    pub fn reclaim_buffer(&mut self, buffer: StagingBuffer, frame: u64) {
        self.ranges.reclaim(buffer.range, frame);
    }

    /// Hand a range back that the GPU is already done with
    pub fn release_buffer(&mut self, buffer: StagingBuffer) {
        self.ranges.release(buffer.range);
    }

    /// Recycle every range whose frame has completed
    pub fn retire_completed(&mut self, completed_frame: u64) {
        let retired = self.ranges.retire_completed(completed_frame);
        if retired > 0 {
            engine_debug!(SOURCE, "Retired {} staging ranges (frame {})", retired, completed_frame);
        }
    }

    pub fn chunk_count(&self) -> usize {
        self.chunks.len()
    }

    fn add_chunk(&mut self, size: u64) -> Result<()> {
        unsafe {
            let create_info = vk::BufferCreateInfo::default()
                .size(size)
                .usage(vk::BufferUsageFlags::TRANSFER_SRC)
                .sharing_mode(vk::SharingMode::EXCLUSIVE);
            let buffer = self
                .ctx
                .device
                .create_buffer(&create_info, None)
                .map_err(|e| vk_error("Failed to create staging buffer", e))?;

            let requirements = self.ctx.device.get_buffer_memory_requirements(buffer);
            let allocation = match self.ctx.allocate("staging_chunk", requirements, MemoryLocation::CpuToGpu, true) {
                Ok(allocation) => allocation,
                Err(e) => {
                    self.ctx.device.destroy_buffer(buffer, None);
                    return Err(e);
                }
            };
            if let Err(e) = self.ctx.device.bind_buffer_memory(buffer, allocation.memory(), allocation.offset()) {
                self.ctx.free(allocation);
                self.ctx.device.destroy_buffer(buffer, None);
                return Err(vk_error("Failed to bind staging buffer memory", e));
            }

            self.chunks.push(StagingChunk { buffer, allocation: Some(allocation) });
        }
        self.ranges.add_chunk(size);
        engine_debug!(SOURCE, "Staging pool grew to {} chunks ({} bytes added)", self.chunks.len(), size);
        Ok(())
    }

    /// Destroy every chunk (the GPU must be idle)
    pub(crate) fn destroy(&mut self) {
        for mut chunk in self.chunks.drain(..) {
            if let Some(allocation) = chunk.allocation.take() {
                self.ctx.free(allocation);
            }
            unsafe { self.ctx.device.destroy_buffer(chunk.buffer, None) };
        }
        self.ranges = StagingAllocator::new();
    }
}

#[cfg(test)]
#[path = "vulkan_staging_tests.rs"]
mod tests;
