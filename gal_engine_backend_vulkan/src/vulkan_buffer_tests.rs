//! Unit tests for buffer flag conversion (no GPU required)

use super::*;
use gal_engine::gal::resource::Format;

#[test]
fn test_vertex_buffer_usage() {
    let desc = BufferCreationDescription::new(1024, BufferUsageFlags::VERTEX);
    let usage = buffer_usage_to_vk(&desc);
    assert!(usage.contains(vk::BufferUsageFlags::VERTEX_BUFFER));
    assert!(usage.contains(vk::BufferUsageFlags::TRANSFER_DST));
    assert!(!usage.contains(vk::BufferUsageFlags::STORAGE_BUFFER));
}

#[test]
fn test_typed_views_use_texel_buffers() {
    let mut desc = BufferCreationDescription::new(
        256,
        BufferUsageFlags::SHADER_RESOURCE | BufferUsageFlags::UNORDERED_ACCESS,
    );
    desc.format = Some(Format::R32_FLOAT);
    let usage = buffer_usage_to_vk(&desc);
    assert!(usage.contains(vk::BufferUsageFlags::UNIFORM_TEXEL_BUFFER));
    assert!(usage.contains(vk::BufferUsageFlags::STORAGE_TEXEL_BUFFER));
    assert!(!usage.contains(vk::BufferUsageFlags::STORAGE_BUFFER));
}

#[test]
fn test_structured_views_use_storage_buffers() {
    let mut desc = BufferCreationDescription::new(256, BufferUsageFlags::SHADER_RESOURCE);
    desc.struct_size = 16;
    let usage = buffer_usage_to_vk(&desc);
    assert!(usage.contains(vk::BufferUsageFlags::STORAGE_BUFFER));
    assert!(!usage.contains(vk::BufferUsageFlags::UNIFORM_TEXEL_BUFFER));
}

#[test]
fn test_constant_and_indirect_usage() {
    let desc = BufferCreationDescription::new(256, BufferUsageFlags::CONSTANT | BufferUsageFlags::INDIRECT);
    let usage = buffer_usage_to_vk(&desc);
    assert!(usage.contains(vk::BufferUsageFlags::UNIFORM_BUFFER | vk::BufferUsageFlags::INDIRECT_BUFFER));
}

#[test]
fn test_memory_location_follows_access() {
    assert_eq!(memory_location(ResourceAccess::Default), MemoryLocation::GpuOnly);
    assert_eq!(memory_location(ResourceAccess::Immutable), MemoryLocation::GpuOnly);
    assert_eq!(memory_location(ResourceAccess::Dynamic), MemoryLocation::CpuToGpu);
    assert_eq!(memory_location(ResourceAccess::Readback), MemoryLocation::GpuToCpu);
}
