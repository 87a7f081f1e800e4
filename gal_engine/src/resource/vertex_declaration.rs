//! Vertex input layout descriptor

use crate::error::{Error, Result};
use crate::handle::ShaderHandle;
use super::format::Format;

/// Maximum number of vertex attributes in one declaration
pub const MAX_VERTEX_ATTRIBUTES: usize = 16;

/// Maximum number of vertex buffer slots
pub const MAX_VERTEX_BUFFER_SLOTS: u32 = 16;

/// Largest explicit attribute offset (Vulkan's guaranteed `maxVertexInputAttributeOffset`)
pub const MAX_VERTEX_ATTRIBUTE_OFFSET: u32 = 2047;

/// Offset value that places an attribute right after the previous one in its slot
pub const APPEND_ALIGNED: u32 = u32::MAX;

/// Meaning of a vertex attribute
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum VertexSemantic {
    Position,
    Normal,
    Tangent,
    Binormal,
    Color,
    TexCoord,
    BlendIndices,
    BlendWeights,
}

impl VertexSemantic {
    /// Number of semantic indices available for this semantic
    pub fn index_count(&self) -> u32 {
        match self {
            VertexSemantic::Color => 2,
            VertexSemantic::TexCoord => 8,
            _ => 1,
        }
    }
}

/// One vertex attribute
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct VertexAttribute {
    pub semantic: VertexSemantic,
    pub semantic_index: u32,
    pub format: Format,
    /// Vertex buffer slot
    pub slot: u32,
    /// Byte offset in the slot, or `APPEND_ALIGNED`
    pub offset: u32,
    /// Advance per instance instead of per vertex
    pub per_instance: bool,
}

impl VertexAttribute {
    /// Per-vertex attribute appended in slot 0
    pub fn new(semantic: VertexSemantic, semantic_index: u32, format: Format) -> Self {
        Self {
            semantic,
            semantic_index,
            format,
            slot: 0,
            offset: APPEND_ALIGNED,
            per_instance: false,
        }
    }
}

/// Descriptor for a vertex input layout bound to a shader's vertex stage
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct VertexDeclarationDescription {
    pub attributes: Vec<VertexAttribute>,
    pub shader: ShaderHandle,
}

impl VertexDeclarationDescription {
    /// Concrete byte offset of every attribute, in declaration order
    pub fn resolved_offsets(&self) -> Vec<u32> {
        let mut slot_ends = [0u32; MAX_VERTEX_BUFFER_SLOTS as usize];
        self.attributes
            .iter()
            .map(|attr| {
                let end = &mut slot_ends[(attr.slot as usize).min(slot_ends.len() - 1)];
                let offset = if attr.offset == APPEND_ALIGNED { *end } else { attr.offset };
                *end = (*end).max(offset + attr.format.bytes_per_block());
                offset
            })
            .collect()
    }

    /// Vertex stride of a slot (end of its last attribute)
    pub fn stride(&self, slot: u32) -> u32 {
        self.attributes
            .iter()
            .zip(self.resolved_offsets())
            .filter(|(attr, _)| attr.slot == slot)
            .map(|(attr, offset)| offset + attr.format.bytes_per_block())
            .max()
            .unwrap_or(0)
    }

    /// Slots used by the declaration, ascending
    pub fn slots(&self) -> Vec<u32> {
        let mut slots: Vec<u32> = self.attributes.iter().map(|a| a.slot).collect();
        slots.sort_unstable();
        slots.dedup();
        slots
    }

    /// Whether a slot advances per instance
    pub fn is_per_instance(&self, slot: u32) -> bool {
        self.attributes.iter().any(|a| a.slot == slot && a.per_instance)
    }

    /// Check attribute limits (the shader handle is checked by the device)
    pub fn validate(&self) -> Result<()> {
        let invalid = |msg: String| Err(Error::InvalidResource(msg));

        if self.attributes.is_empty() {
            return invalid("vertex declaration has no attributes".to_string());
        }
        if self.attributes.len() > MAX_VERTEX_ATTRIBUTES {
            return invalid(format!(
                "{} vertex attributes exceed the limit of {}",
                self.attributes.len(),
                MAX_VERTEX_ATTRIBUTES
            ));
        }
        for (i, attr) in self.attributes.iter().enumerate() {
            if attr.slot >= MAX_VERTEX_BUFFER_SLOTS {
                return invalid(format!("attribute {} uses slot {}", i, attr.slot));
            }
            if attr.semantic_index >= attr.semantic.index_count() {
                return invalid(format!(
                    "{:?}{} semantic index out of range",
                    attr.semantic, attr.semantic_index
                ));
            }
            if attr.offset != APPEND_ALIGNED && attr.offset > MAX_VERTEX_ATTRIBUTE_OFFSET {
                return invalid(format!("attribute {} offset {} exceeds {}", i, attr.offset, MAX_VERTEX_ATTRIBUTE_OFFSET));
            }
            if !attr.format.is_vertex_format() {
                return invalid(format!("{:?} is not a vertex format", attr.format));
            }
            let duplicate = self.attributes[..i]
                .iter()
                .any(|o| o.semantic == attr.semantic && o.semantic_index == attr.semantic_index);
            if duplicate {
                return invalid(format!(
                    "{:?}{} declared twice",
                    attr.semantic, attr.semantic_index
                ));
            }
            let mixed_rate = self.attributes[..i]
                .iter()
                .any(|o| o.slot == attr.slot && o.per_instance != attr.per_instance);
            if mixed_rate {
                return invalid(format!("slot {} mixes per-vertex and per-instance data", attr.slot));
            }
        }
        Ok(())
    }
}

#[cfg(test)]
#[path = "vertex_declaration_tests.rs"]
mod tests;
