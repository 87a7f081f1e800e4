use super::*;

#[test]
fn test_uncompressed_pitches() {
    assert_eq!(Format::R8G8B8A8_UNORM.row_pitch(256), 1024);
    assert_eq!(Format::R8G8B8A8_UNORM.slice_pitch(256, 128), 1024 * 128);
    assert_eq!(Format::R32G32B32_FLOAT.row_pitch(3), 36);
}

#[test]
fn test_compressed_pitches_round_up_to_blocks() {
    // 10 texels -> 3 blocks of 8 bytes
    assert_eq!(Format::BC1_UNORM.row_pitch(10), 24);
    assert_eq!(Format::BC7_UNORM.slice_pitch(8, 8), 2 * 2 * 16);
    // Mips smaller than a block still occupy one block
    assert_eq!(Format::BC3_UNORM.slice_pitch(1, 1), 16);
}

#[test]
fn test_depth_stencil_predicates() {
    assert!(Format::D32_FLOAT.is_depth());
    assert!(!Format::D32_FLOAT.has_stencil());
    assert!(Format::D24_UNORM_S8_UINT.has_stencil());
    assert!(!Format::R32_FLOAT.is_depth());
}

#[test]
fn test_srgb_and_compressed_predicates() {
    assert!(Format::BC7_SRGB.is_srgb());
    assert!(Format::BC7_SRGB.is_compressed());
    assert!(!Format::B8G8R8A8_UNORM.is_srgb());
    assert_eq!(Format::BC4_UNORM.block_extent(), (4, 4));
    assert_eq!(Format::R16_FLOAT.block_extent(), (1, 1));
}

#[test]
fn test_vertex_format() {
    assert!(Format::R32G32B32_FLOAT.is_vertex_format());
    assert!(Format::R8G8B8A8_UNORM.is_vertex_format());
    assert!(!Format::D16_UNORM.is_vertex_format());
    assert!(!Format::BC1_UNORM.is_vertex_format());
}
