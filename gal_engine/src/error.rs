//! Error types for the GAL
//!
//! This module defines the error types returned by the device, the backends
//! and the command encoder.

use std::fmt;

/// Result type for GAL operations
pub type Result<T> = std::result::Result<T, Error>;

/// GAL errors
#[derive(Debug, Clone, PartialEq)]
pub enum Error {
    /// Backend-specific error (Vulkan, headless, etc.)
    BackendError(String),

    /// Out of GPU (or host-visible) memory
    OutOfMemory,

    /// Invalid resource description or initial data
    InvalidResource(String),

    /// Initialization failed (device, backend, subsystems)
    InitializationFailed(String),

    /// Format or feature the backend cannot express natively
    UnsupportedFormat(String),

    /// Stale, destroyed or foreign handle
    InvalidHandle(String),

    /// Resource still referenced by views
    ResourceInUse(String),

    /// Command recorded in a context where it is not allowed
    InvalidCommand(String),

    /// The native device was lost; the device must be recreated
    DeviceLost,
}

impl Error {
    /// Whether this error is fatal for the device that produced it
    pub fn is_fatal(&self) -> bool {
        matches!(self, Error::DeviceLost)
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::BackendError(msg) => write!(f, "Backend error: {}", msg),
            Error::OutOfMemory => write!(f, "Out of GPU memory"),
            Error::InvalidResource(msg) => write!(f, "Invalid resource: {}", msg),
            Error::InitializationFailed(msg) => write!(f, "Initialization failed: {}", msg),
            Error::UnsupportedFormat(msg) => write!(f, "Unsupported format: {}", msg),
            Error::InvalidHandle(msg) => write!(f, "Invalid handle: {}", msg),
            Error::ResourceInUse(msg) => write!(f, "Resource in use: {}", msg),
            Error::InvalidCommand(msg) => write!(f, "Invalid command: {}", msg),
            Error::DeviceLost => write!(f, "Device lost"),
        }
    }
}

impl std::error::Error for Error {}

#[cfg(test)]
#[path = "error_tests.rs"]
mod tests;
