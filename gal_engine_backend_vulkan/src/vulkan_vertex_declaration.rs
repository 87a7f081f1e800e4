/// Vertex declaration - vertex input state matched against a vertex shader
///
/// Semantics map to fixed shader input locations:
///
/// | semantic      | location  |
/// |---------------|-----------|
/// | Position      | 0         |
/// | Normal        | 1         |
/// | Tangent       | 2         |
/// | Binormal      | 3         |
/// | Color i       | 4 + i     |
/// | TexCoord i    | 6 + i     |
/// | BlendIndices  | 14        |
/// | BlendWeights  | 15        |

use ash::vk;
use gal_engine::gal::resource::{VertexDeclarationDescription, VertexSemantic};
use gal_engine::gal::{Error, Result};
use gal_engine::engine_bail;

use crate::vulkan_format::format_to_vk;
use crate::vulkan_shader::Shader;
use crate::SOURCE;

/// Shader input location of a semantic
pub(crate) fn semantic_location(semantic: VertexSemantic, index: u32) -> u32 {
    match semantic {
        VertexSemantic::Position => 0,
        VertexSemantic::Normal => 1,
        VertexSemantic::Tangent => 2,
        VertexSemantic::Binormal => 3,
        VertexSemantic::Color => 4 + index,
        VertexSemantic::TexCoord => 6 + index,
        VertexSemantic::BlendIndices => 14,
        VertexSemantic::BlendWeights => 15,
    }
}

#[derive(Debug)]
pub struct VertexDeclaration {
    pub(crate) id: u64,
    /// One binding per vertex buffer slot, binding number = slot
    pub(crate) bindings: Vec<vk::VertexInputBindingDescription>,
    pub(crate) attributes: Vec<vk::VertexInputAttributeDescription>,
}

/// Build the vertex input state for the locations a shader consumes
///
/// Attributes the shader never reads are dropped. Every location the shader
/// reads must be provided.
pub(crate) fn build_vertex_input(
    desc: &VertexDeclarationDescription,
    input_locations: &[u32],
) -> Result<(Vec<vk::VertexInputBindingDescription>, Vec<vk::VertexInputAttributeDescription>)> {
    let mut attributes = Vec::new();
    for (attr, offset) in desc.attributes.iter().zip(desc.resolved_offsets()) {
        let location = semantic_location(attr.semantic, attr.semantic_index);
        if !input_locations.contains(&location) {
            continue;
        }
        attributes.push(vk::VertexInputAttributeDescription {
            location,
            binding: attr.slot,
            format: format_to_vk(attr.format),
            offset,
        });
    }

    if let Some(missing) = input_locations.iter().find(|loc| !attributes.iter().any(|a| a.location == **loc)) {
        engine_bail!(SOURCE, Error::InvalidResource =>
            "Vertex shader reads input location {} but the declaration does not provide it", missing);
    }

    let mut slots: Vec<u32> = attributes.iter().map(|a| a.binding).collect();
    slots.sort_unstable();
    slots.dedup();
    let bindings = slots
        .into_iter()
        .map(|slot| vk::VertexInputBindingDescription {
            binding: slot,
            stride: desc.stride(slot),
            input_rate: if desc.is_per_instance(slot) {
                vk::VertexInputRate::INSTANCE
            } else {
                vk::VertexInputRate::VERTEX
            },
        })
        .collect();

    Ok((bindings, attributes))
}

pub(crate) fn create_vertex_declaration(
    id: u64,
    desc: &VertexDeclarationDescription,
    shader: &Shader,
) -> Result<VertexDeclaration> {
    let (bindings, attributes) = build_vertex_input(desc, &shader.input_locations)?;
    Ok(VertexDeclaration { id, bindings, attributes })
}

#[cfg(test)]
#[path = "vulkan_vertex_declaration_tests.rs"]
mod tests;
