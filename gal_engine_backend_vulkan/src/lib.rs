/*!
# GAL Engine - Vulkan Backend

Vulkan 1.3 implementation of the `gal_engine` backend hooks.

This crate provides `VulkanBackend`, which plugs into `Device<B>` and uses
the Ash library for Vulkan bindings and gpu-allocator for memory management.
The device is headless: rendering targets textures and presentation is left
to the application.

## Example

```no_run
use gal_engine::gal::{Device, DeviceConfig};
use gal_engine_backend_vulkan::VulkanBackend;

# fn main() -> gal_engine::Result<()> {
let config = DeviceConfig::default();
let backend = VulkanBackend::new(&config)?;
let mut device = Device::new(backend, config)?;
let frame = device.begin_frame()?;
# let _ = frame;
device.end_frame()?;
# Ok(())
# }
```
*/

mod vulkan;
mod vulkan_context;
mod vulkan_format;
mod vulkan_layout;
mod vulkan_frame;
mod vulkan_staging;
mod vulkan_buffer;
mod vulkan_texture;
mod vulkan_view;
mod vulkan_shader;
mod vulkan_vertex_declaration;
mod vulkan_state;
mod vulkan_query;
mod vulkan_pipeline;
mod vulkan_command;
mod debug;

/// Log source of every message emitted by this crate
pub(crate) const SOURCE: &str = "gal::vulkan";

pub use vulkan::VulkanBackend;
pub use vulkan_context::GpuContext;
pub use vulkan_staging::{StagingBuffer, StagingBufferPool};
pub use vulkan_buffer::Buffer;
pub use vulkan_texture::Texture;
pub use vulkan_view::{RenderTargetView, ShaderView};
pub use vulkan_shader::Shader;
pub use vulkan_vertex_declaration::VertexDeclaration;
pub use vulkan_state::{BlendState, DepthStencilState, RasterizerState, SamplerState};
pub use vulkan_query::Query;

// Re-export debug utilities
pub use debug::{get_validation_stats, print_validation_stats_report};
