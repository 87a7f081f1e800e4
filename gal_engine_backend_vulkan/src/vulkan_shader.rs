/// Shader - SPIR-V modules, reflection and pipeline layout
///
/// Resource bindings follow one convention for every shader: the descriptor
/// set is the register class and the binding number is the GAL slot.
///
/// | set | class            | descriptor types                              |
/// |-----|------------------|-----------------------------------------------|
/// | 0   | constant buffers | uniform buffer                                |
/// | 1   | resource views   | sampled image, uniform texel, storage buffer  |
/// | 2   | samplers         | sampler                                       |
/// | 3   | unordered access | storage image, storage texel, storage buffer  |

use std::ffi::CString;
use std::io::Cursor;
use ash::vk;
use gal_engine::gal::command::{
    MAX_CONSTANT_BUFFER_SLOTS, MAX_RESOURCE_VIEW_SLOTS, MAX_SAMPLER_SLOTS, MAX_UNORDERED_ACCESS_SLOTS,
};
use gal_engine::gal::resource::{ShaderCreationDescription, ShaderStage};
use gal_engine::gal::{Error, Result};
use gal_engine::{engine_bail, engine_error};

use crate::vulkan_context::{vk_error, GpuContext};
use crate::vulkan_frame::DeferredRelease;
use crate::SOURCE;

pub(crate) const SET_CONSTANT_BUFFERS: u32 = 0;
pub(crate) const SET_RESOURCE_VIEWS: u32 = 1;
pub(crate) const SET_SAMPLERS: u32 = 2;
pub(crate) const SET_UNORDERED_ACCESS: u32 = 3;

/// One descriptor binding found by reflection
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct ReflectedBinding {
    pub set: u32,
    pub binding: u32,
    pub descriptor_type: vk::DescriptorType,
    pub count: u32,
    pub stages: vk::ShaderStageFlags,
}

/// Compiled module of one stage
#[derive(Debug)]
pub(crate) struct StageModule {
    pub stage: vk::ShaderStageFlags,
    pub module: vk::ShaderModule,
    pub entry_point: CString,
}

/// Vulkan native for a GAL shader program
#[derive(Debug)]
pub struct Shader {
    /// Backend-wide identity used by the pipeline cache
    pub(crate) id: u64,
    pub(crate) modules: Vec<StageModule>,
    /// Merged over every stage, sorted by (set, binding)
    pub(crate) bindings: Vec<ReflectedBinding>,
    /// Vertex input locations consumed by the vertex stage
    pub(crate) input_locations: Vec<u32>,
    /// One layout per set up to the highest set used
    pub(crate) set_layouts: Vec<vk::DescriptorSetLayout>,
    pub(crate) pipeline_layout: vk::PipelineLayout,
    pub(crate) is_compute: bool,
}

impl Shader {
    /// Bindings of one descriptor set
    pub(crate) fn set_bindings(&self, set: u32) -> impl Iterator<Item = &ReflectedBinding> {
        self.bindings.iter().filter(move |b| b.set == set)
    }

    pub(crate) fn into_release(self) -> Vec<DeferredRelease> {
        let mut released: Vec<DeferredRelease> =
            self.modules.into_iter().map(|m| DeferredRelease::ShaderModule(m.module)).collect();
        released.push(DeferredRelease::PipelineLayout(self.pipeline_layout));
        released.extend(self.set_layouts.into_iter().map(DeferredRelease::DescriptorSetLayout));
        released
    }
}

pub(crate) fn shader_stage_to_vk(stage: ShaderStage) -> vk::ShaderStageFlags {
    match stage {
        ShaderStage::Vertex => vk::ShaderStageFlags::VERTEX,
        ShaderStage::Hull => vk::ShaderStageFlags::TESSELLATION_CONTROL,
        ShaderStage::Domain => vk::ShaderStageFlags::TESSELLATION_EVALUATION,
        ShaderStage::Geometry => vk::ShaderStageFlags::GEOMETRY,
        ShaderStage::Pixel => vk::ShaderStageFlags::FRAGMENT,
        ShaderStage::Compute => vk::ShaderStageFlags::COMPUTE,
    }
}

/// Convert a spirq descriptor type to its Vulkan descriptor type
pub(crate) fn descriptor_type_to_vk(desc_ty: &spirq::ty::DescriptorType) -> Result<vk::DescriptorType> {
    use spirq::ty::DescriptorType;
    match desc_ty {
        DescriptorType::UniformBuffer() => Ok(vk::DescriptorType::UNIFORM_BUFFER),
        DescriptorType::StorageBuffer(..) => Ok(vk::DescriptorType::STORAGE_BUFFER),
        DescriptorType::SampledImage() => Ok(vk::DescriptorType::SAMPLED_IMAGE),
        DescriptorType::Sampler() => Ok(vk::DescriptorType::SAMPLER),
        DescriptorType::StorageImage(..) => Ok(vk::DescriptorType::STORAGE_IMAGE),
        DescriptorType::UniformTexelBuffer() => Ok(vk::DescriptorType::UNIFORM_TEXEL_BUFFER),
        DescriptorType::StorageTexelBuffer(..) => Ok(vk::DescriptorType::STORAGE_TEXEL_BUFFER),
        other => {
            engine_bail!(SOURCE, Error::InvalidResource =>
                "Unsupported SPIR-V descriptor type {:?} (textures and samplers are bound separately)", other);
        }
    }
}

/// Check that a binding sits in the set of its register class, within the slot limit
pub(crate) fn check_register_class(binding: &ReflectedBinding) -> Result<()> {
    let (allowed, slots): (&[vk::DescriptorType], u32) = match binding.set {
        SET_CONSTANT_BUFFERS => (&[vk::DescriptorType::UNIFORM_BUFFER], MAX_CONSTANT_BUFFER_SLOTS),
        SET_RESOURCE_VIEWS => (
            &[
                vk::DescriptorType::SAMPLED_IMAGE,
                vk::DescriptorType::UNIFORM_TEXEL_BUFFER,
                vk::DescriptorType::STORAGE_BUFFER,
            ],
            MAX_RESOURCE_VIEW_SLOTS,
        ),
        SET_SAMPLERS => (&[vk::DescriptorType::SAMPLER], MAX_SAMPLER_SLOTS),
        SET_UNORDERED_ACCESS => (
            &[
                vk::DescriptorType::STORAGE_IMAGE,
                vk::DescriptorType::STORAGE_TEXEL_BUFFER,
                vk::DescriptorType::STORAGE_BUFFER,
            ],
            MAX_UNORDERED_ACCESS_SLOTS,
        ),
        other => {
            return Err(Error::InvalidResource(format!(
                "descriptor set {} is outside the register classes 0..=3",
                other
            )));
        }
    };
    if !allowed.contains(&binding.descriptor_type) {
        return Err(Error::InvalidResource(format!(
            "{:?} cannot be bound in set {}",
            binding.descriptor_type, binding.set
        )));
    }
    if binding.binding + binding.count.max(1) > slots {
        return Err(Error::InvalidResource(format!(
            "binding {} of set {} exceeds the {} slots of its class",
            binding.binding, binding.set, slots
        )));
    }
    Ok(())
}

/// Merge the bindings of every stage, combining stage flags of shared bindings
pub(crate) fn merge_bindings(bindings: Vec<ReflectedBinding>) -> Result<Vec<ReflectedBinding>> {
    let mut merged: Vec<ReflectedBinding> = Vec::new();
    for binding in bindings {
        match merged.iter_mut().find(|b| b.set == binding.set && b.binding == binding.binding) {
            Some(existing) => {
                if existing.descriptor_type != binding.descriptor_type || existing.count != binding.count {
                    return Err(Error::InvalidResource(format!(
                        "binding (set={}, binding={}) declared as {:?} and {:?} in different stages",
                        binding.set, binding.binding, existing.descriptor_type, binding.descriptor_type
                    )));
                }
                existing.stages |= binding.stages;
            }
            None => merged.push(binding),
        }
    }
    merged.sort_by_key(|b| (b.set, b.binding));
    Ok(merged)
}

struct ReflectedStage {
    entry_point: String,
    bindings: Vec<ReflectedBinding>,
    input_locations: Vec<u32>,
}

fn reflect_stage(code: &[u32], stage: vk::ShaderStageFlags) -> Result<ReflectedStage> {
    let entry_points = spirq::ReflectConfig::new()
        .spv(code)
        .ref_all_rscs(true)
        .reflect()
        .map_err(|e| {
            engine_error!(SOURCE, "SPIR-V reflection failed: {:?}", e);
            Error::InvalidResource(format!("SPIR-V reflection failed: {:?}", e))
        })?;
    let Some(entry_point) = entry_points.into_iter().next() else {
        engine_bail!(SOURCE, Error::InvalidResource => "SPIR-V module has no entry point");
    };

    let mut bindings = Vec::new();
    let mut input_locations = Vec::new();
    for var in entry_point.vars.iter() {
        match var {
            spirq::var::Variable::Descriptor { desc_bind, desc_ty, nbind, .. } => {
                bindings.push(ReflectedBinding {
                    set: desc_bind.set(),
                    binding: desc_bind.bind(),
                    descriptor_type: descriptor_type_to_vk(desc_ty)?,
                    count: (*nbind).max(1),
                    stages: stage,
                });
            }
            spirq::var::Variable::Input { location, .. } => input_locations.push(location.loc()),
            _ => {}
        }
    }
    input_locations.sort_unstable();
    input_locations.dedup();

    Ok(ReflectedStage { entry_point: entry_point.name, bindings, input_locations })
}

/// Create modules, reflect them and build the descriptor set and pipeline layouts
pub(crate) fn create_shader(ctx: &GpuContext, id: u64, desc: &ShaderCreationDescription) -> Result<Shader> {
    let mut shader = Shader {
        id,
        modules: Vec::new(),
        bindings: Vec::new(),
        input_locations: Vec::new(),
        set_layouts: Vec::new(),
        pipeline_layout: vk::PipelineLayout::null(),
        is_compute: desc.is_compute(),
    };
    match build_shader(ctx, desc, &mut shader) {
        Ok(()) => Ok(shader),
        Err(e) => {
            unsafe {
                for module in &shader.modules {
                    ctx.device.destroy_shader_module(module.module, None);
                }
                for layout in &shader.set_layouts {
                    ctx.device.destroy_descriptor_set_layout(*layout, None);
                }
            }
            Err(e)
        }
    }
}

fn build_shader(ctx: &GpuContext, desc: &ShaderCreationDescription, shader: &mut Shader) -> Result<()> {
    let mut bindings = Vec::new();
    for (stage, byte_code) in desc.stages() {
        let code = ash::util::read_spv(&mut Cursor::new(byte_code.as_bytes())).map_err(|e| {
            engine_error!(SOURCE, "{:?} byte code is not SPIR-V: {}", stage, e);
            Error::InvalidResource(format!("{:?} byte code is not SPIR-V: {}", stage, e))
        })?;
        let vk_stage = shader_stage_to_vk(stage);
        let reflected = reflect_stage(&code, vk_stage)?;
        let entry_point = CString::new(reflected.entry_point)
            .map_err(|_| Error::InvalidResource("entry point name contains a NUL byte".to_string()))?;

        let create_info = vk::ShaderModuleCreateInfo::default().code(&code);
        let module = unsafe {
            ctx.device
                .create_shader_module(&create_info, None)
                .map_err(|e| vk_error("Failed to create shader module", e))?
        };
        shader.modules.push(StageModule { stage: vk_stage, module, entry_point });

        if stage == ShaderStage::Vertex {
            shader.input_locations = reflected.input_locations;
        }
        bindings.extend(reflected.bindings);
    }

    shader.bindings = merge_bindings(bindings)?;
    for binding in &shader.bindings {
        check_register_class(binding)?;
    }

    let set_count = shader.bindings.iter().map(|b| b.set + 1).max().unwrap_or(0);
    for set in 0..set_count {
        let layout_bindings: Vec<vk::DescriptorSetLayoutBinding> = shader
            .set_bindings(set)
            .map(|b| {
                vk::DescriptorSetLayoutBinding::default()
                    .binding(b.binding)
                    .descriptor_type(b.descriptor_type)
                    .descriptor_count(b.count)
                    .stage_flags(b.stages)
            })
            .collect();
        let create_info = vk::DescriptorSetLayoutCreateInfo::default().bindings(&layout_bindings);
        let layout = unsafe {
            ctx.device
                .create_descriptor_set_layout(&create_info, None)
                .map_err(|e| vk_error("Failed to create descriptor set layout", e))?
        };
        shader.set_layouts.push(layout);
    }

    let layout_info = vk::PipelineLayoutCreateInfo::default().set_layouts(&shader.set_layouts);
    shader.pipeline_layout = unsafe {
        ctx.device
            .create_pipeline_layout(&layout_info, None)
            .map_err(|e| vk_error("Failed to create pipeline layout", e))?
    };
    Ok(())
}

#[cfg(test)]
#[path = "vulkan_shader_tests.rs"]
mod tests;
