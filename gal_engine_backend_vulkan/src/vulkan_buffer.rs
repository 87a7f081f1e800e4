/// Buffer - Vulkan native for GAL buffers

use ash::vk;
use gpu_allocator::vulkan::Allocation;
use gpu_allocator::MemoryLocation;
use gal_engine::gal::resource::{BufferCreationDescription, BufferUsageFlags, ResourceAccess};
use gal_engine::gal::Result;
use gal_engine::engine_err;

use crate::vulkan_context::{vk_error, GpuContext};
use crate::vulkan_frame::DeferredRelease;
use crate::vulkan_staging::StagingBufferPool;
use crate::SOURCE;

/// Vulkan buffer and its memory
#[derive(Debug)]
pub struct Buffer {
    pub(crate) buffer: vk::Buffer,
    pub(crate) allocation: Option<Allocation>,
    pub(crate) size: u64,
    pub(crate) location: MemoryLocation,
}

impl Buffer {
    /// Whether the CPU can write the buffer memory directly
    pub(crate) fn is_host_visible(&self) -> bool {
        self.allocation.as_ref().is_some_and(|a| a.mapped_ptr().is_some())
    }

    /// Copy `data` into mapped memory at `offset`
    pub(crate) fn write_mapped(&self, offset: u64, data: &[u8]) -> Result<()> {
        let mapped_ptr = self
            .allocation
            .as_ref()
            .and_then(|a| a.mapped_ptr())
            .ok_or_else(|| engine_err!(SOURCE, "Buffer is not CPU-accessible"))?
            .as_ptr() as *mut u8;
        if offset.checked_add(data.len() as u64).map_or(true, |end| end > self.size) {
            return Err(engine_err!(
                SOURCE,
                "Write of {} bytes at {} overflows a {} byte buffer",
                data.len(),
                offset,
                self.size
            ));
        }
        unsafe {
            std::ptr::copy_nonoverlapping(data.as_ptr(), mapped_ptr.add(offset as usize), data.len());
        }
        Ok(())
    }

    pub(crate) fn into_release(self) -> DeferredRelease {
        DeferredRelease::Buffer { buffer: self.buffer, allocation: self.allocation }
    }
}

/// Vulkan usage flags of a GAL buffer
///
/// Typed buffers (with an element format) become texel buffers, structured
/// and raw buffers become storage buffers. Every buffer can be copied.
pub(crate) fn buffer_usage_to_vk(desc: &BufferCreationDescription) -> vk::BufferUsageFlags {
    let typed = desc.format.is_some();
    let mut usage = vk::BufferUsageFlags::TRANSFER_SRC | vk::BufferUsageFlags::TRANSFER_DST;
    if desc.usage.contains(BufferUsageFlags::VERTEX) {
        usage |= vk::BufferUsageFlags::VERTEX_BUFFER;
    }
    if desc.usage.contains(BufferUsageFlags::INDEX) {
        usage |= vk::BufferUsageFlags::INDEX_BUFFER;
    }
    if desc.usage.contains(BufferUsageFlags::CONSTANT) {
        usage |= vk::BufferUsageFlags::UNIFORM_BUFFER;
    }
    if desc.usage.contains(BufferUsageFlags::SHADER_RESOURCE) {
        usage |= if typed {
            vk::BufferUsageFlags::UNIFORM_TEXEL_BUFFER
        } else {
            vk::BufferUsageFlags::STORAGE_BUFFER
        };
    }
    if desc.usage.contains(BufferUsageFlags::UNORDERED_ACCESS) {
        usage |= if typed {
            vk::BufferUsageFlags::STORAGE_TEXEL_BUFFER
        } else {
            vk::BufferUsageFlags::STORAGE_BUFFER
        };
    }
    if desc.usage.contains(BufferUsageFlags::INDIRECT) {
        usage |= vk::BufferUsageFlags::INDIRECT_BUFFER;
    }
    usage
}

/// Memory heap a buffer lives in
pub(crate) fn memory_location(access: ResourceAccess) -> MemoryLocation {
    match access {
        ResourceAccess::Dynamic => MemoryLocation::CpuToGpu,
        ResourceAccess::Readback => MemoryLocation::GpuToCpu,
        ResourceAccess::Default | ResourceAccess::Immutable => MemoryLocation::GpuOnly,
    }
}

/// Create a buffer and upload its initial data
///
/// Host-visible buffers are written directly; GPU-only buffers go through a
/// staging range and a one-shot copy that completes before this returns.
pub(crate) fn create_buffer(
    ctx: &GpuContext,
    staging: &mut StagingBufferPool,
    desc: &BufferCreationDescription,
    initial_data: Option<&[u8]>,
) -> Result<Buffer> {
    let location = memory_location(desc.access);
    let buffer = unsafe {
        let create_info = vk::BufferCreateInfo::default()
            .size(desc.total_size)
            .usage(buffer_usage_to_vk(desc))
            .sharing_mode(vk::SharingMode::EXCLUSIVE);
        let buffer = ctx
            .device
            .create_buffer(&create_info, None)
            .map_err(|e| vk_error(&format!("Failed to create buffer of {} bytes", desc.total_size), e))?;

        let requirements = ctx.device.get_buffer_memory_requirements(buffer);
        let allocation = match ctx.allocate("buffer", requirements, location, true) {
            Ok(allocation) => allocation,
            Err(e) => {
                ctx.device.destroy_buffer(buffer, None);
                return Err(e);
            }
        };
        if let Err(e) = ctx.device.bind_buffer_memory(buffer, allocation.memory(), allocation.offset()) {
            ctx.free(allocation);
            ctx.device.destroy_buffer(buffer, None);
            return Err(vk_error("Failed to bind buffer memory", e));
        }
        Buffer { buffer, allocation: Some(allocation), size: desc.total_size, location }
    };

    if let Some(data) = initial_data.filter(|d| !d.is_empty()) {
        let uploaded = if buffer.is_host_visible() {
            buffer.write_mapped(0, data)
        } else {
            upload_through_staging(ctx, staging, &buffer, data)
        };
        if let Err(e) = uploaded {
            unsafe { buffer.into_release().release(ctx) };
            return Err(e);
        }
    }
    Ok(buffer)
}

fn upload_through_staging(
    ctx: &GpuContext,
    staging: &mut StagingBufferPool,
    buffer: &Buffer,
    data: &[u8],
) -> Result<()> {
    let range = staging.allocate_buffer(4, data.len() as u64)?;
    let result = staging.write(&range, data).and_then(|_| {
        let region = vk::BufferCopy { src_offset: range.offset(), dst_offset: 0, size: data.len() as u64 };
        ctx.one_shot(|command_buffer| unsafe {
            ctx.device.cmd_copy_buffer(command_buffer, range.buffer(), buffer.buffer, &[region]);
        })
    });
    // The one-shot submit has completed (or never started)
    staging.release_buffer(range);
    result
}

#[cfg(test)]
#[path = "vulkan_buffer_tests.rs"]
mod tests;
