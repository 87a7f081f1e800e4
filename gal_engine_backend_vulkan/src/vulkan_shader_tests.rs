//! Unit tests for shader binding rules (no GPU required)

use super::*;

fn binding(set: u32, binding: u32, descriptor_type: vk::DescriptorType, stages: vk::ShaderStageFlags) -> ReflectedBinding {
    ReflectedBinding { set, binding, descriptor_type, count: 1, stages }
}

// ============================================================================
// DESCRIPTOR TYPES
// ============================================================================

#[test]
fn test_descriptor_type_conversion() {
    use spirq::ty::{AccessType, DescriptorType};
    assert_eq!(descriptor_type_to_vk(&DescriptorType::UniformBuffer()).unwrap(), vk::DescriptorType::UNIFORM_BUFFER);
    assert_eq!(descriptor_type_to_vk(&DescriptorType::SampledImage()).unwrap(), vk::DescriptorType::SAMPLED_IMAGE);
    assert_eq!(descriptor_type_to_vk(&DescriptorType::Sampler()).unwrap(), vk::DescriptorType::SAMPLER);
    assert_eq!(
        descriptor_type_to_vk(&DescriptorType::StorageImage(AccessType::ReadWrite)).unwrap(),
        vk::DescriptorType::STORAGE_IMAGE
    );
    assert_eq!(
        descriptor_type_to_vk(&DescriptorType::StorageBuffer(AccessType::ReadOnly)).unwrap(),
        vk::DescriptorType::STORAGE_BUFFER
    );
}

#[test]
fn test_combined_image_sampler_is_rejected() {
    use spirq::ty::DescriptorType;
    let result = descriptor_type_to_vk(&DescriptorType::CombinedImageSampler());
    assert!(matches!(result, Err(Error::InvalidResource(_))));
}

// ============================================================================
// REGISTER CLASSES
// ============================================================================

#[test]
fn test_register_classes_accept_their_types() {
    let stages = vk::ShaderStageFlags::FRAGMENT;
    assert!(check_register_class(&binding(0, 3, vk::DescriptorType::UNIFORM_BUFFER, stages)).is_ok());
    assert!(check_register_class(&binding(1, 0, vk::DescriptorType::SAMPLED_IMAGE, stages)).is_ok());
    assert!(check_register_class(&binding(1, 1, vk::DescriptorType::STORAGE_BUFFER, stages)).is_ok());
    assert!(check_register_class(&binding(2, 15, vk::DescriptorType::SAMPLER, stages)).is_ok());
    assert!(check_register_class(&binding(3, 0, vk::DescriptorType::STORAGE_IMAGE, stages)).is_ok());
}

#[test]
fn test_register_class_mismatch_is_rejected() {
    let stages = vk::ShaderStageFlags::FRAGMENT;
    assert!(check_register_class(&binding(0, 0, vk::DescriptorType::SAMPLED_IMAGE, stages)).is_err());
    assert!(check_register_class(&binding(2, 0, vk::DescriptorType::UNIFORM_BUFFER, stages)).is_err());
    assert!(check_register_class(&binding(4, 0, vk::DescriptorType::UNIFORM_BUFFER, stages)).is_err());
}

#[test]
fn test_slot_limits() {
    let stages = vk::ShaderStageFlags::COMPUTE;
    assert!(check_register_class(&binding(0, MAX_CONSTANT_BUFFER_SLOTS, vk::DescriptorType::UNIFORM_BUFFER, stages)).is_err());
    assert!(check_register_class(&binding(3, MAX_UNORDERED_ACCESS_SLOTS, vk::DescriptorType::STORAGE_IMAGE, stages)).is_err());

    let mut array = binding(1, MAX_RESOURCE_VIEW_SLOTS - 2, vk::DescriptorType::SAMPLED_IMAGE, stages);
    array.count = 2;
    assert!(check_register_class(&array).is_ok());
    array.count = 3;
    assert!(check_register_class(&array).is_err());
}

// ============================================================================
// STAGE MERGING
// ============================================================================

#[test]
fn test_merge_combines_stage_flags() {
    let merged = merge_bindings(vec![
        binding(0, 0, vk::DescriptorType::UNIFORM_BUFFER, vk::ShaderStageFlags::VERTEX),
        binding(1, 0, vk::DescriptorType::SAMPLED_IMAGE, vk::ShaderStageFlags::FRAGMENT),
        binding(0, 0, vk::DescriptorType::UNIFORM_BUFFER, vk::ShaderStageFlags::FRAGMENT),
    ])
    .unwrap();
    assert_eq!(merged.len(), 2);
    assert_eq!(merged[0].stages, vk::ShaderStageFlags::VERTEX | vk::ShaderStageFlags::FRAGMENT);
    assert_eq!(merged[1].set, 1);
}

#[test]
fn test_merge_sorts_by_set_and_binding() {
    let merged = merge_bindings(vec![
        binding(2, 1, vk::DescriptorType::SAMPLER, vk::ShaderStageFlags::FRAGMENT),
        binding(0, 4, vk::DescriptorType::UNIFORM_BUFFER, vk::ShaderStageFlags::VERTEX),
        binding(2, 0, vk::DescriptorType::SAMPLER, vk::ShaderStageFlags::FRAGMENT),
    ])
    .unwrap();
    let order: Vec<(u32, u32)> = merged.iter().map(|b| (b.set, b.binding)).collect();
    assert_eq!(order, vec![(0, 4), (2, 0), (2, 1)]);
}

#[test]
fn test_merge_rejects_conflicting_types() {
    let result = merge_bindings(vec![
        binding(1, 0, vk::DescriptorType::SAMPLED_IMAGE, vk::ShaderStageFlags::VERTEX),
        binding(1, 0, vk::DescriptorType::STORAGE_BUFFER, vk::ShaderStageFlags::FRAGMENT),
    ]);
    assert!(matches!(result, Err(Error::InvalidResource(_))));
}

#[test]
fn test_shader_stage_mapping() {
    assert_eq!(shader_stage_to_vk(ShaderStage::Pixel), vk::ShaderStageFlags::FRAGMENT);
    assert_eq!(shader_stage_to_vk(ShaderStage::Hull), vk::ShaderStageFlags::TESSELLATION_CONTROL);
    assert_eq!(shader_stage_to_vk(ShaderStage::Domain), vk::ShaderStageFlags::TESSELLATION_EVALUATION);
}
