//! Buffer descriptor

use bitflags::bitflags;
use crate::error::{Error, Result};
use super::format::Format;

bitflags! {
    /// How a buffer will be bound
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct BufferUsageFlags: u32 {
        const VERTEX = 1 << 0;
        const INDEX = 1 << 1;
        const CONSTANT = 1 << 2;
        const SHADER_RESOURCE = 1 << 3;
        const UNORDERED_ACCESS = 1 << 4;
        const INDIRECT = 1 << 5;
        const COPY_SRC = 1 << 6;
        const COPY_DST = 1 << 7;
    }
}

/// CPU/GPU access pattern of a buffer or texture
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum ResourceAccess {
    /// GPU memory, updated through copy commands
    #[default]
    Default,
    /// GPU memory written once from initial data, never updated
    Immutable,
    /// Host-visible memory, written by the CPU frequently
    Dynamic,
    /// Host-visible memory the GPU copies into for CPU read-back
    Readback,
}

/// Index element type
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum IndexType {
    U16,
    U32,
}

impl IndexType {
    pub fn size(&self) -> u32 {
        match self {
            IndexType::U16 => 2,
            IndexType::U32 => 4,
        }
    }
}

/// Descriptor for creating a buffer
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct BufferCreationDescription {
    /// Size in bytes
    pub total_size: u64,
    /// Element stride for structured buffers (0 for raw and vertex/index buffers)
    pub struct_size: u32,
    pub usage: BufferUsageFlags,
    /// Element format for typed buffer views
    pub format: Option<Format>,
    pub access: ResourceAccess,
}

impl BufferCreationDescription {
    /// Plain GPU buffer of `size` bytes
    pub fn new(size: u64, usage: BufferUsageFlags) -> Self {
        Self {
            total_size: size,
            struct_size: 0,
            usage,
            format: None,
            access: ResourceAccess::Default,
        }
    }

    /// Number of elements when the buffer is viewed as structured or typed
    pub fn element_count(&self) -> u64 {
        if self.struct_size > 0 {
            self.total_size / self.struct_size as u64
        } else if let Some(format) = self.format {
            self.total_size / format.bytes_per_block() as u64
        } else {
            self.total_size
        }
    }

    /// Check the descriptor and the optional initial data
    pub fn validate(&self, initial_data: Option<&[u8]>) -> Result<()> {
        if self.total_size == 0 {
            return Err(Error::InvalidResource("buffer size must be greater than 0".to_string()));
        }
        if self.usage.is_empty() {
            return Err(Error::InvalidResource("buffer usage flags are empty".to_string()));
        }
        if self.struct_size > 0 {
            if self.format.is_some() {
                return Err(Error::InvalidResource(
                    "a buffer is either structured or typed, not both".to_string(),
                ));
            }
            if self.total_size % self.struct_size as u64 != 0 {
                return Err(Error::InvalidResource(format!(
                    "buffer size {} is not a multiple of struct size {}",
                    self.total_size, self.struct_size
                )));
            }
        }
        if let Some(format) = self.format {
            if format.is_depth() || format.is_compressed() {
                return Err(Error::InvalidResource(format!(
                    "{:?} cannot be used as a buffer element format",
                    format
                )));
            }
        }
        if self.usage.contains(BufferUsageFlags::CONSTANT) && self.total_size > 64 * 1024 {
            return Err(Error::InvalidResource(format!(
                "constant buffer of {} bytes exceeds 64 KiB",
                self.total_size
            )));
        }
        match self.access {
            ResourceAccess::Immutable if initial_data.is_none() => {
                return Err(Error::InvalidResource(
                    "immutable buffer requires initial data".to_string(),
                ));
            }
            ResourceAccess::Readback
                if self.usage.intersects(!(BufferUsageFlags::COPY_DST | BufferUsageFlags::COPY_SRC)) =>
            {
                return Err(Error::InvalidResource(
                    "read-back buffer can only be a copy destination".to_string(),
                ));
            }
            _ => {}
        }
        if let Some(data) = initial_data {
            if data.len() as u64 > self.total_size {
                return Err(Error::InvalidResource(format!(
                    "initial data ({} bytes) larger than buffer ({} bytes)",
                    data.len(),
                    self.total_size
                )));
            }
        }
        Ok(())
    }
}

#[cfg(test)]
#[path = "buffer_tests.rs"]
mod tests;
