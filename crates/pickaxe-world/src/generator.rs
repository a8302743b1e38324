use pickaxe_types::Position;

use crate::chunk::Chunk;

/// Block state IDs used by the flat generator.
pub const AIR: i32 = 0;
pub const STONE: i32 = 1;
pub const GRASS_BLOCK: i32 = 9;
pub const DIRT: i32 = 10;
pub const BEDROCK: i32 = 33;

/// Layer layout (world Y, 0..255):
///   y = 0: bedrock
///   y = 1..=47: stone
///   y = 48..=60: dirt
///   y = 61: grass_block
///   y = 62 and above: air
pub fn generate_flat_chunk(chunk_x: i32, chunk_z: i32) -> Chunk {
    let mut chunk = Chunk::new(chunk_x, chunk_z);
    for x in 0..16usize {
        for z in 0..16usize {
            chunk.set_block_state(x, 0, z, BEDROCK);
            for y in 1..=47 {
                chunk.set_block_state(x, y, z, STONE);
            }
            for y in 48..=60 {
                chunk.set_block_state(x, y, z, DIRT);
            }
            chunk.set_block_state(x, 61, z, GRASS_BLOCK);
        }
    }
    chunk
}

/// The world's fixed spawn point, one block above the grass layer.
pub fn spawn_position() -> Position {
    Position::new(8, 62, 8)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn flat_chunk_layers_match_spec() {
        let chunk = generate_flat_chunk(0, 0);
        assert_eq!(chunk.get_block_state(0, 0, 0), BEDROCK);
        assert_eq!(chunk.get_block_state(0, 1, 0), STONE);
        assert_eq!(chunk.get_block_state(0, 47, 0), STONE);
        assert_eq!(chunk.get_block_state(0, 48, 0), DIRT);
        assert_eq!(chunk.get_block_state(0, 60, 0), DIRT);
        assert_eq!(chunk.get_block_state(0, 61, 0), GRASS_BLOCK);
        assert_eq!(chunk.get_block_state(0, 62, 0), AIR);
        assert_eq!(chunk.get_block_state(0, 255, 0), AIR);
    }

    #[test]
    fn flat_chunk_sections_above_surface_are_absent() {
        let chunk = generate_flat_chunk(0, 0);
        // Surface sits in section 3 (y=48..63); sections 4..16 are untouched.
        for i in 4..16 {
            assert!(chunk.sections[i].is_none());
        }
    }

    #[test]
    fn flat_chunk_serializes() {
        let mut chunk = generate_flat_chunk(3, -2);
        let data = chunk.serialize_sections();
        assert!(!data.is_empty());
    }

    #[test]
    fn flat_chunk_identical_across_positions() {
        let mut a = generate_flat_chunk(0, 0);
        let mut b = generate_flat_chunk(100, -100);
        assert_eq!(a.serialize_sections(), b.serialize_sections());
    }

    #[test]
    fn spawn_is_one_above_grass() {
        let spawn = spawn_position();
        assert_eq!((spawn.x, spawn.y, spawn.z), (8, 62, 8));
    }
}
