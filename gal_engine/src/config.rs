//! Device configuration
//!
//! `DeviceConfig` is a plain struct with sensible defaults. Every backend reads
//! the fields it cares about; the Vulkan validation fields are ignored by the
//! null backend.

use std::fmt;
use std::str::FromStr;
use crate::error::{Error, Result};

// ===== BACKEND SELECTION =====

/// Native backend a device is built on
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BackendKind {
    /// Vulkan 1.3 (ash)
    Vulkan,
    /// Headless in-process backend, no GPU
    Null,
}

impl fmt::Display for BackendKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BackendKind::Vulkan => write!(f, "vulkan"),
            BackendKind::Null => write!(f, "null"),
        }
    }
}

impl FromStr for BackendKind {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "vulkan" | "vk" => Ok(BackendKind::Vulkan),
            "null" | "none" => Ok(BackendKind::Null),
            other => Err(Error::InitializationFailed(format!(
                "unknown backend '{}' (expected 'vulkan' or 'null')",
                other
            ))),
        }
    }
}

// ===== VALIDATION LAYER SETTINGS =====

/// Which validation messages are displayed
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DebugSeverity {
    ErrorsOnly,
    ErrorsAndWarnings,
    All,
}

/// Where validation messages are written
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DebugOutput {
    Console,
    /// Append to the given file
    File(String),
    /// Console and file
    Both(String),
}

/// Message categories shown by the validation messenger
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DebugMessageFilter {
    pub show_general: bool,
    pub show_validation: bool,
    pub show_performance: bool,
}

impl Default for DebugMessageFilter {
    fn default() -> Self {
        Self {
            show_general: true,
            show_validation: true,
            show_performance: true,
        }
    }
}

/// Counters collected by the validation messenger
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ValidationStats {
    pub errors: u32,
    pub warnings: u32,
    pub info: u32,
    pub verbose: u32,
}

impl ValidationStats {
    /// Total number of messages
    pub fn total(&self) -> u32 {
        self.errors + self.warnings + self.info + self.verbose
    }
}

// ===== DEVICE CONFIG =====

/// Device creation settings
#[derive(Debug, Clone, PartialEq)]
pub struct DeviceConfig {
    /// Backend the application intends to run on
    pub backend: BackendKind,
    /// Application name reported to the driver
    pub app_name: String,
    /// Application version (major, minor, patch)
    pub app_version: (u32, u32, u32),

    /// Enable the validation layer (defaults to debug builds only)
    pub enable_validation: bool,
    pub debug_severity: DebugSeverity,
    pub debug_output: DebugOutput,
    pub debug_message_filter: DebugMessageFilter,
    /// Abort the process on the first validation error
    pub break_on_validation_error: bool,
    /// Panic on the first validation error
    pub panic_on_error: bool,
    pub enable_validation_stats: bool,

    /// Number of frames the CPU may record ahead of the GPU
    pub frames_in_flight: u32,
    /// Number of frames timestamp results are kept for
    ///
    /// Must be at least `frames_in_flight + 1` so a result can be read back
    /// once its frame completed.
    pub timestamp_history: u32,
    pub max_timestamps_per_frame: u32,
    /// Size of one staging chunk in bytes
    pub staging_chunk_size: u64,
    /// Capacity of the occlusion query pool
    pub max_queries: u32,
}

impl Default for DeviceConfig {
    fn default() -> Self {
        Self {
            backend: BackendKind::Vulkan,
            app_name: "GAL Application".to_string(),
            app_version: (1, 0, 0),
            enable_validation: cfg!(debug_assertions),
            debug_severity: DebugSeverity::ErrorsAndWarnings,
            debug_output: DebugOutput::Console,
            debug_message_filter: DebugMessageFilter::default(),
            break_on_validation_error: false,
            panic_on_error: false,
            enable_validation_stats: cfg!(debug_assertions),
            frames_in_flight: 2,
            timestamp_history: 4,
            max_timestamps_per_frame: 256,
            staging_chunk_size: 16 * 1024 * 1024,
            max_queries: 1024,
        }
    }
}

impl DeviceConfig {
    /// Default config for the given backend
    pub fn for_backend(backend: BackendKind) -> Self {
        Self {
            backend,
            ..Self::default()
        }
    }

    /// Check the config for inconsistent values
    pub fn validate(&self) -> Result<()> {
        if self.frames_in_flight == 0 {
            return Err(Error::InitializationFailed(
                "frames_in_flight must be at least 1".to_string(),
            ));
        }
        if self.timestamp_history < self.frames_in_flight + 1 {
            return Err(Error::InitializationFailed(format!(
                "timestamp_history ({}) must be at least frames_in_flight + 1 ({})",
                self.timestamp_history,
                self.frames_in_flight + 1
            )));
        }
        if self.max_timestamps_per_frame == 0 {
            return Err(Error::InitializationFailed(
                "max_timestamps_per_frame must be at least 1".to_string(),
            ));
        }
        if self.staging_chunk_size < 64 * 1024 {
            return Err(Error::InitializationFailed(format!(
                "staging_chunk_size ({}) must be at least 64 KiB",
                self.staging_chunk_size
            )));
        }
        if self.max_queries == 0 {
            return Err(Error::InitializationFailed(
                "max_queries must be at least 1".to_string(),
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
#[path = "config_tests.rs"]
mod tests;
