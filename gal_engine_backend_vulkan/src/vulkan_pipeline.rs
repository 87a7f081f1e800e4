/// Pipeline cache - graphics and compute pipelines built on demand
///
/// GAL binds shaders and fixed-function states separately, Vulkan wants them
/// baked into one pipeline. Pipelines are created at the first draw or
/// dispatch that uses a combination and kept until one of the objects they
/// were built from is destroyed.

use ash::vk;
use rustc_hash::FxHashMap;
use gal_engine::gal::command::PrimitiveTopology;
use gal_engine::gal::resource::{BlendStateDescription, DepthStencilStateDescription, RasterizerStateDescription};
use gal_engine::gal::Result;
use gal_engine::engine_debug;

use crate::vulkan_context::{vk_error, GpuContext};
use crate::vulkan_shader::Shader;
use crate::vulkan_state::{color_blend_attachments, depth_stencil_info, rasterization_info, topology_to_vk};
use crate::vulkan_vertex_declaration::VertexDeclaration;
use crate::SOURCE;

/// Identity of a graphics pipeline
///
/// Objects are referenced by backend-wide ids; `None` means the default state.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub(crate) struct GraphicsPipelineKey {
    pub shader: u64,
    pub vertex_declaration: Option<u64>,
    pub blend: Option<u64>,
    pub depth_stencil: Option<u64>,
    pub rasterizer: Option<u64>,
    pub topology: PrimitiveTopology,
    pub sample_mask: u32,
    pub color_formats: Vec<vk::Format>,
    /// `UNDEFINED` without a depth attachment
    pub depth_format: vk::Format,
    pub samples: vk::SampleCountFlags,
}

impl GraphicsPipelineKey {
    fn references(&self, id: u64) -> bool {
        self.shader == id
            || self.vertex_declaration == Some(id)
            || self.blend == Some(id)
            || self.depth_stencil == Some(id)
            || self.rasterizer == Some(id)
    }
}

/// Everything a graphics pipeline is built from
pub(crate) struct GraphicsPipelineDesc<'a> {
    pub key: GraphicsPipelineKey,
    pub shader: &'a Shader,
    pub vertex_declaration: Option<&'a VertexDeclaration>,
    pub blend: &'a BlendStateDescription,
    pub depth_stencil: &'a DepthStencilStateDescription,
    pub rasterizer: &'a RasterizerStateDescription,
}

/// Optional device features pipelines may use
#[derive(Debug, Clone, Copy, Default)]
pub(crate) struct PipelineFeatures {
    pub fill_mode_non_solid: bool,
    pub depth_clamp: bool,
}

pub(crate) fn format_has_stencil(format: vk::Format) -> bool {
    matches!(
        format,
        vk::Format::D16_UNORM_S8_UINT | vk::Format::D24_UNORM_S8_UINT | vk::Format::D32_SFLOAT_S8_UINT | vk::Format::S8_UINT
    )
}

pub(crate) struct PipelineCache {
    cache: vk::PipelineCache,
    graphics: FxHashMap<GraphicsPipelineKey, vk::Pipeline>,
    compute: FxHashMap<u64, vk::Pipeline>,
    features: PipelineFeatures,
}

impl PipelineCache {
    pub(crate) fn new(ctx: &GpuContext, features: PipelineFeatures) -> Result<Self> {
        let cache = unsafe {
            ctx.device
                .create_pipeline_cache(&vk::PipelineCacheCreateInfo::default(), None)
                .map_err(|e| vk_error("Failed to create pipeline cache", e))?
        };
        Ok(Self::with_cache(cache, features))
    }

    pub(crate) fn with_cache(cache: vk::PipelineCache, features: PipelineFeatures) -> Self {
        Self { cache, graphics: FxHashMap::default(), compute: FxHashMap::default(), features }
    }

    pub(crate) fn len(&self) -> usize {
        self.graphics.len() + self.compute.len()
    }

    /// Pipeline for a draw, created on first use
    pub(crate) fn graphics(&mut self, ctx: &GpuContext, desc: &GraphicsPipelineDesc) -> Result<vk::Pipeline> {
        if let Some(&pipeline) = self.graphics.get(&desc.key) {
            return Ok(pipeline);
        }
        let pipeline = self.create_graphics(ctx, desc)?;
        self.graphics.insert(desc.key.clone(), pipeline);
        engine_debug!(SOURCE, "Created graphics pipeline for shader {} ({} cached)", desc.key.shader, self.len());
        Ok(pipeline)
    }

    /// Pipeline for a dispatch, created on first use
    pub(crate) fn compute(&mut self, ctx: &GpuContext, shader: &Shader) -> Result<vk::Pipeline> {
        if let Some(&pipeline) = self.compute.get(&shader.id) {
            return Ok(pipeline);
        }
        let pipeline = self.create_compute(ctx, shader)?;
        self.compute.insert(shader.id, pipeline);
        engine_debug!(SOURCE, "Created compute pipeline for shader {} ({} cached)", shader.id, self.len());
        Ok(pipeline)
    }

    /// Remove every pipeline built from object `id`; the caller releases them
    pub(crate) fn evict(&mut self, id: u64) -> Vec<vk::Pipeline> {
        let mut evicted = Vec::new();
        self.graphics.retain(|key, pipeline| {
            if key.references(id) {
                evicted.push(*pipeline);
                false
            } else {
                true
            }
        });
        if let Some(pipeline) = self.compute.remove(&id) {
            evicted.push(pipeline);
        }
        evicted
    }

    fn create_graphics(&self, ctx: &GpuContext, desc: &GraphicsPipelineDesc) -> Result<vk::Pipeline> {
        let key = &desc.key;
        let stages: Vec<vk::PipelineShaderStageCreateInfo> = desc
            .shader
            .modules
            .iter()
            .map(|m| {
                vk::PipelineShaderStageCreateInfo::default()
                    .stage(m.stage)
                    .module(m.module)
                    .name(&m.entry_point)
            })
            .collect();

        let (bindings, attributes): (&[vk::VertexInputBindingDescription], &[vk::VertexInputAttributeDescription]) =
            match desc.vertex_declaration {
                Some(decl) => (&decl.bindings, &decl.attributes),
                None => (&[], &[]),
            };
        let vertex_input_state = vk::PipelineVertexInputStateCreateInfo::default()
            .vertex_binding_descriptions(bindings)
            .vertex_attribute_descriptions(attributes);

        let (topology, patch_control_points) = topology_to_vk(key.topology);
        let input_assembly_state = vk::PipelineInputAssemblyStateCreateInfo::default()
            .topology(topology)
            .primitive_restart_enable(false);
        let tessellation_state =
            vk::PipelineTessellationStateCreateInfo::default().patch_control_points(patch_control_points);

        // Viewport and scissor are dynamic
        let viewport_state = vk::PipelineViewportStateCreateInfo::default()
            .viewport_count(1)
            .scissor_count(1);

        let rasterization_state =
            rasterization_info(desc.rasterizer, self.features.fill_mode_non_solid, self.features.depth_clamp);
        let depth_stencil_state = depth_stencil_info(desc.depth_stencil);

        let sample_mask = [key.sample_mask];
        let multisample_state = vk::PipelineMultisampleStateCreateInfo::default()
            .rasterization_samples(key.samples)
            .sample_shading_enable(false)
            .sample_mask(&sample_mask)
            .alpha_to_coverage_enable(desc.blend.alpha_to_coverage);

        let blend_attachments = color_blend_attachments(desc.blend, key.color_formats.len());
        let color_blend_state = vk::PipelineColorBlendStateCreateInfo::default()
            .logic_op_enable(false)
            .attachments(&blend_attachments);

        let dynamic_states = [
            vk::DynamicState::VIEWPORT,
            vk::DynamicState::SCISSOR,
            vk::DynamicState::BLEND_CONSTANTS,
            vk::DynamicState::STENCIL_REFERENCE,
        ];
        let dynamic_state = vk::PipelineDynamicStateCreateInfo::default().dynamic_states(&dynamic_states);

        let stencil_format =
            if format_has_stencil(key.depth_format) { key.depth_format } else { vk::Format::UNDEFINED };
        let mut rendering_info = vk::PipelineRenderingCreateInfo::default()
            .color_attachment_formats(&key.color_formats)
            .depth_attachment_format(key.depth_format)
            .stencil_attachment_format(stencil_format);

        let mut create_info = vk::GraphicsPipelineCreateInfo::default()
            .stages(&stages)
            .vertex_input_state(&vertex_input_state)
            .input_assembly_state(&input_assembly_state)
            .viewport_state(&viewport_state)
            .rasterization_state(&rasterization_state)
            .depth_stencil_state(&depth_stencil_state)
            .multisample_state(&multisample_state)
            .color_blend_state(&color_blend_state)
            .dynamic_state(&dynamic_state)
            .layout(desc.shader.pipeline_layout)
            .push_next(&mut rendering_info);
        if patch_control_points > 0 {
            create_info = create_info.tessellation_state(&tessellation_state);
        }

        let pipelines = unsafe {
            ctx.device
                .create_graphics_pipelines(self.cache, &[create_info], None)
                .map_err(|(_, e)| vk_error("Failed to create graphics pipeline", e))?
        };
        Ok(pipelines[0])
    }

    fn create_compute(&self, ctx: &GpuContext, shader: &Shader) -> Result<vk::Pipeline> {
        let Some(module) = shader.modules.iter().find(|m| m.stage == vk::ShaderStageFlags::COMPUTE) else {
            return Err(gal_engine::gal::Error::InvalidCommand(
                "dispatch with a shader that has no compute stage".to_string(),
            ));
        };
        let stage = vk::PipelineShaderStageCreateInfo::default()
            .stage(vk::ShaderStageFlags::COMPUTE)
            .module(module.module)
            .name(&module.entry_point);
        let create_info = vk::ComputePipelineCreateInfo::default()
            .stage(stage)
            .layout(shader.pipeline_layout);
        let pipelines = unsafe {
            ctx.device
                .create_compute_pipelines(self.cache, &[create_info], None)
                .map_err(|(_, e)| vk_error("Failed to create compute pipeline", e))?
        };
        Ok(pipelines[0])
    }

    /// Destroy every pipeline and the Vulkan cache (the GPU must be idle)
    pub(crate) fn destroy(&mut self, ctx: &GpuContext) {
        unsafe {
            for (_, pipeline) in self.graphics.drain() {
                ctx.device.destroy_pipeline(pipeline, None);
            }
            for (_, pipeline) in self.compute.drain() {
                ctx.device.destroy_pipeline(pipeline, None);
            }
            ctx.device.destroy_pipeline_cache(self.cache, None);
        }
        self.cache = vk::PipelineCache::null();
    }
}

#[cfg(test)]
#[path = "vulkan_pipeline_tests.rs"]
mod tests;
