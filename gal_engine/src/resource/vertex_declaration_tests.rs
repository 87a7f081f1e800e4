use super::*;

fn pos_normal_uv() -> VertexDeclarationDescription {
    VertexDeclarationDescription {
        attributes: vec![
            VertexAttribute::new(VertexSemantic::Position, 0, Format::R32G32B32_FLOAT),
            VertexAttribute::new(VertexSemantic::Normal, 0, Format::R32G32B32_FLOAT),
            VertexAttribute::new(VertexSemantic::TexCoord, 0, Format::R32G32_FLOAT),
        ],
        shader: ShaderHandle::default(),
    }
}

#[test]
fn test_append_aligned_offsets_and_stride() {
    let decl = pos_normal_uv();
    assert!(decl.validate().is_ok());
    assert_eq!(decl.resolved_offsets(), vec![0, 12, 24]);
    assert_eq!(decl.stride(0), 32);
    assert_eq!(decl.slots(), vec![0]);
}

#[test]
fn test_instance_slot() {
    let mut decl = pos_normal_uv();
    let mut instance = VertexAttribute::new(VertexSemantic::TexCoord, 1, Format::R32G32B32A32_FLOAT);
    instance.slot = 1;
    instance.per_instance = true;
    decl.attributes.push(instance);

    assert!(decl.validate().is_ok());
    assert_eq!(decl.resolved_offsets()[3], 0);
    assert_eq!(decl.stride(1), 16);
    assert!(decl.is_per_instance(1));
    assert!(!decl.is_per_instance(0));
    assert_eq!(decl.slots(), vec![0, 1]);
}

#[test]
fn test_explicit_offset() {
    let mut decl = pos_normal_uv();
    decl.attributes[2].offset = 40;
    assert_eq!(decl.resolved_offsets()[2], 40);
    assert_eq!(decl.stride(0), 48);
}

#[test]
fn test_empty_declaration_rejected() {
    let decl = VertexDeclarationDescription { attributes: Vec::new(), shader: ShaderHandle::default() };
    assert!(decl.validate().is_err());
}

#[test]
fn test_duplicate_semantic_rejected() {
    let mut decl = pos_normal_uv();
    decl.attributes.push(VertexAttribute::new(VertexSemantic::Normal, 0, Format::R32G32B32_FLOAT));
    assert!(decl.validate().is_err());
}

#[test]
fn test_semantic_index_limit() {
    let mut decl = pos_normal_uv();
    decl.attributes.push(VertexAttribute::new(VertexSemantic::Position, 1, Format::R32G32B32_FLOAT));
    assert!(decl.validate().is_err());
}

#[test]
fn test_non_vertex_format_rejected() {
    let mut decl = pos_normal_uv();
    decl.attributes[0].format = Format::BC1_UNORM;
    assert!(decl.validate().is_err());
}

#[test]
fn test_mixed_rate_slot_rejected() {
    let mut decl = pos_normal_uv();
    decl.attributes[1].per_instance = true;
    assert!(decl.validate().is_err());
}

#[test]
fn test_attribute_limit() {
    let mut decl = pos_normal_uv();
    for i in 1..8 {
        decl.attributes.push(VertexAttribute::new(VertexSemantic::TexCoord, i, Format::R32_FLOAT));
    }
    decl.attributes.push(VertexAttribute::new(VertexSemantic::Color, 0, Format::R8G8B8A8_UNORM));
    decl.attributes.push(VertexAttribute::new(VertexSemantic::Color, 1, Format::R8G8B8A8_UNORM));
    decl.attributes.push(VertexAttribute::new(VertexSemantic::Tangent, 0, Format::R32G32B32A32_FLOAT));
    decl.attributes.push(VertexAttribute::new(VertexSemantic::Binormal, 0, Format::R32G32B32_FLOAT));
    decl.attributes.push(VertexAttribute::new(VertexSemantic::BlendIndices, 0, Format::R8G8B8A8_UINT));
    assert_eq!(decl.attributes.len(), 15);
    assert!(decl.validate().is_ok());

    decl.attributes.push(VertexAttribute::new(VertexSemantic::BlendWeights, 0, Format::R32G32B32A32_FLOAT));
    decl.attributes.push(VertexAttribute::new(VertexSemantic::BlendWeights, 0, Format::R32_FLOAT));
    assert!(decl.validate().is_err());
}

#[test]
fn test_offset_past_attribute_limit_rejected() {
    let mut decl = pos_normal_uv();
    decl.attributes[1].offset = MAX_VERTEX_ATTRIBUTE_OFFSET;
    assert!(decl.validate().is_ok());
    decl.attributes[1].offset = u32::MAX - 1;
    assert!(matches!(decl.validate(), Err(Error::InvalidResource(_))));
}
