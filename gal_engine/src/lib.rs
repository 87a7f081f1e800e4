/*!
# GAL Engine

Graphics abstraction layer of the engine.

This crate provides the platform-agnostic half of the GAL: resource
descriptors, generation-checked handles, the `Device` that owns every GPU
resource, and the command encoder. Native APIs live behind the `Backend`
trait, implemented once per graphics API (Vulkan in
`gal_engine_backend_vulkan`, plus the headless `NullBackend` shipped here).

## Architecture

- **Device<B>**: resource factory, handle tables, frames and submission
- **Backend**: native init/deinit hooks and command translation
- **Resource<D, N>**: descriptor + lifecycle state + backend native object
- **CommandEncoder**: records handle-based commands for one frame
- **TimestampResult**: GPU timing read back a few frames later
*/

pub mod error;
pub mod log;
pub mod config;
pub mod handle;
pub mod resource;
pub mod command;
pub mod device;
pub mod utils;

pub use error::{Error, Result};

// Main gal namespace module
pub mod gal {
    // Error types
    pub use crate::error::{Error, Result};

    // Configuration
    pub use crate::config::*;

    // Device and backends
    pub use crate::device::*;

    // Handles
    pub use crate::handle::*;

    // Logging sub-module (types only, macros are exported at the crate root)
    pub mod log {
        pub use crate::log::{set_logger, reset_logger, set_min_severity, min_severity, Logger, LogEntry, LogSeverity, DefaultLogger};
    }

    // Commands sub-module
    pub mod command {
        pub use crate::command::*;
    }

    // Resource sub-module
    pub mod resource {
        pub use crate::resource::*;
    }
}

// Re-export math library at crate root
pub use glam;
