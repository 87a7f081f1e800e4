use super::*;

fn code() -> Option<ShaderByteCode> {
    Some(vec![0x03, 0x02, 0x23, 0x07].into())
}

#[test]
fn test_vertex_pixel_program() {
    let desc = ShaderCreationDescription { vertex: code(), pixel: code(), ..Default::default() };
    assert!(desc.validate().is_ok());
    assert_eq!(desc.stage_flags(), ShaderStageFlags::VERTEX | ShaderStageFlags::PIXEL);
    assert!(!desc.is_compute());

    let stages: Vec<_> = desc.stages().map(|(stage, _)| stage).collect();
    assert_eq!(stages, vec![ShaderStage::Vertex, ShaderStage::Pixel]);
}

#[test]
fn test_empty_program_rejected() {
    assert!(ShaderCreationDescription::default().validate().is_err());
}

#[test]
fn test_compute_is_exclusive() {
    let compute = ShaderCreationDescription { compute: code(), ..Default::default() };
    assert!(compute.validate().is_ok());
    assert!(compute.is_compute());

    let mixed = ShaderCreationDescription { compute: code(), vertex: code(), ..Default::default() };
    assert!(mixed.validate().is_err());
}

#[test]
fn test_graphics_needs_vertex_stage() {
    let desc = ShaderCreationDescription { pixel: code(), ..Default::default() };
    assert!(desc.validate().is_err());
}

#[test]
fn test_tessellation_stages_come_in_pairs() {
    let desc = ShaderCreationDescription { vertex: code(), hull: code(), ..Default::default() };
    assert!(desc.validate().is_err());

    let desc = ShaderCreationDescription { vertex: code(), hull: code(), domain: code(), ..Default::default() };
    assert!(desc.validate().is_ok());
}

#[test]
fn test_empty_byte_code_rejected() {
    let desc = ShaderCreationDescription { vertex: Some(Vec::new().into()), ..Default::default() };
    assert!(desc.validate().is_err());
}

#[test]
fn test_byte_code_clone_shares_storage() {
    let a: ShaderByteCode = vec![1u8, 2, 3].into();
    let b = a.clone();
    assert_eq!(a, b);
    assert_eq!(b.as_bytes(), &[1, 2, 3]);
    assert_eq!(b.len(), 3);
}
