/// GpuContext - Shared GPU objects for every Vulkan native
///
/// Contains everything the backend's sub-systems need to talk to the GPU:
/// - Device and instance for Vulkan API calls
/// - Allocator for memory management
/// - Queue for command submission
/// - Command pool for one-shot upload operations
/// - Debug utils loaders (object names, command labels)

use ash::vk;
use gpu_allocator::vulkan::{Allocation, AllocationCreateDesc, AllocationScheme, Allocator};
use gpu_allocator::{AllocationError, MemoryLocation};
use gal_engine::gal::{Error, Result};
use gal_engine::{engine_error, engine_warn};
use std::mem::ManuallyDrop;
use std::sync::Mutex;

use crate::SOURCE;

/// Map a Vulkan result code to a GAL error and log it
pub(crate) fn vk_error(context: &str, result: vk::Result) -> Error {
    match result {
        vk::Result::ERROR_DEVICE_LOST => {
            engine_error!(SOURCE, "{}: device lost", context);
            Error::DeviceLost
        }
        vk::Result::ERROR_OUT_OF_DEVICE_MEMORY | vk::Result::ERROR_OUT_OF_HOST_MEMORY => {
            engine_error!(SOURCE, "{}: out of memory ({:?})", context, result);
            Error::OutOfMemory
        }
        other => {
            let message = format!("{}: {:?}", context, other);
            engine_error!(SOURCE, "{}", message);
            Error::BackendError(message)
        }
    }
}

/// Shared GPU context for all Vulkan natives.
///
/// Owned by the backend behind an `Arc` and shared with the staging pool and
/// the pipeline cache. Device and instance destruction is handled by
/// `VulkanBackend::drop()` once every sub-system released its objects.
pub struct GpuContext {
    /// Vulkan logical device
    pub device: ash::Device,

    /// Vulkan instance (destroyed by the backend)
    pub instance: ash::Instance,

    pub physical_device: vk::PhysicalDevice,

    /// Adapter limits and name
    pub properties: vk::PhysicalDeviceProperties,

    /// GPU memory allocator
    /// Wrapped in ManuallyDrop so its pages are freed BEFORE the device is destroyed
    pub allocator: ManuallyDrop<Mutex<Allocator>>,

    /// Graphics queue for command submission
    pub graphics_queue: vk::Queue,

    /// Graphics queue family index
    pub graphics_queue_family: u32,

    /// Reusable command pool for one-shot upload operations
    /// (created with TRANSIENT + RESET_COMMAND_BUFFER flags)
    pub upload_command_pool: Mutex<vk::CommandPool>,

    /// Debug utils loader (for validation layers)
    pub(crate) debug_utils_loader: Option<ash::ext::debug_utils::Instance>,

    /// Debug messenger handle
    pub(crate) debug_messenger: Option<vk::DebugUtilsMessengerEXT>,

    /// Device-level debug utils (object names and command labels)
    pub(crate) debug_utils_device: Option<ash::ext::debug_utils::Device>,
}

impl GpuContext {
    /// Allocate device memory for a buffer or an image
    pub(crate) fn allocate(
        &self,
        name: &str,
        requirements: vk::MemoryRequirements,
        location: MemoryLocation,
        linear: bool,
    ) -> Result<Allocation> {
        let mut allocator = self
            .allocator
            .lock()
            .map_err(|_| Error::BackendError("allocator mutex poisoned".to_string()))?;
        allocator
            .allocate(&AllocationCreateDesc {
                name,
                requirements,
                location,
                linear,
                allocation_scheme: AllocationScheme::GpuAllocatorManaged,
            })
            .map_err(|e| match e {
                AllocationError::OutOfMemory => {
                    let size_mb = requirements.size as f64 / (1024.0 * 1024.0);
                    engine_error!(SOURCE, "Out of GPU memory for {} ({:.2} MB)", name, size_mb);
                    Error::OutOfMemory
                }
                other => {
                    let message = format!("Failed to allocate memory for {}: {:?}", name, other);
                    engine_error!(SOURCE, "{}", message);
                    Error::BackendError(message)
                }
            })
    }

    /// Return an allocation to the allocator
    pub(crate) fn free(&self, allocation: Allocation) {
        // Don't panic if lock fails - the owning object is still destroyed
        if let Ok(mut allocator) = self.allocator.lock() {
            if let Err(e) = allocator.free(allocation) {
                engine_warn!(SOURCE, "Failed to free allocation: {:?}", e);
            }
        }
    }

    /// Record commands into a one-shot command buffer, submit it and wait
    ///
    /// Used for initial data uploads, which happen outside of any frame.
    pub(crate) fn one_shot<F>(&self, record: F) -> Result<()>
    where
        F: FnOnce(vk::CommandBuffer),
    {
        let pool = self
            .upload_command_pool
            .lock()
            .map_err(|_| Error::BackendError("upload command pool mutex poisoned".to_string()))?;

        unsafe {
            let allocate_info = vk::CommandBufferAllocateInfo::default()
                .command_pool(*pool)
                .level(vk::CommandBufferLevel::PRIMARY)
                .command_buffer_count(1);
            let command_buffer = self
                .device
                .allocate_command_buffers(&allocate_info)
                .map_err(|e| vk_error("Failed to allocate upload command buffer", e))?[0];

            let result = self.submit_and_wait(command_buffer, record);
            self.device.free_command_buffers(*pool, &[command_buffer]);
            result
        }
    }

    unsafe fn submit_and_wait<F>(&self, command_buffer: vk::CommandBuffer, record: F) -> Result<()>
    where
        F: FnOnce(vk::CommandBuffer),
    {
        let begin_info = vk::CommandBufferBeginInfo::default()
            .flags(vk::CommandBufferUsageFlags::ONE_TIME_SUBMIT);
        self.device
            .begin_command_buffer(command_buffer, &begin_info)
            .map_err(|e| vk_error("Failed to begin upload command buffer", e))?;

        record(command_buffer);

        self.device
            .end_command_buffer(command_buffer)
            .map_err(|e| vk_error("Failed to end upload command buffer", e))?;

        let fence = self
            .device
            .create_fence(&vk::FenceCreateInfo::default(), None)
            .map_err(|e| vk_error("Failed to create upload fence", e))?;

        let command_buffers = [command_buffer];
        let submit_info = vk::SubmitInfo::default().command_buffers(&command_buffers);
        let result = self
            .device
            .queue_submit(self.graphics_queue, &[submit_info], fence)
            .map_err(|e| vk_error("Failed to submit upload", e))
            .and_then(|_| {
                self.device
                    .wait_for_fences(&[fence], true, u64::MAX)
                    .map_err(|e| vk_error("Failed to wait for upload", e))
            });

        self.device.destroy_fence(fence, None);
        result
    }

    /// Whether debug names and labels can be emitted
    pub(crate) fn has_debug_utils(&self) -> bool {
        self.debug_utils_device.is_some()
    }
}
