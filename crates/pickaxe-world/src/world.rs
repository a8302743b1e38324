use std::collections::HashMap;

use pickaxe_types::{Aabb, ChunkPos};

use crate::chunk::Chunk;
use crate::generator;
use crate::spatial::RTree;

/// A single block change accumulated during a tick, destined for a
/// Multi Block Change packet.
#[derive(Debug, Clone, Copy)]
pub struct BlockRecord {
    /// Packed `(x<<12)|(z<<8)|y` within the chunk, matching the wire format.
    pub xyz: i32,
    pub block_id: i32,
}

/// Owns the chunk map and the per-tick accumulated block-change log.
/// Chunk creation is lazy: the first access to an unloaded position
/// generates it with the flat generator (no persistent storage backs
/// this world).
pub struct World {
    chunks: HashMap<ChunkPos, Chunk>,
    block_changes: HashMap<ChunkPos, Vec<BlockRecord>>,
    entities: RTree,
}

impl World {
    pub fn new() -> Self {
        Self { chunks: HashMap::new(), block_changes: HashMap::new(), entities: RTree::new() }
    }

    /// Inserts an entity into the spatial index at `bounds`.
    pub fn insert_entity(&mut self, eid: u64, bounds: Aabb) {
        self.entities.insert(eid, bounds);
    }

    /// Removes an entity from the spatial index.
    pub fn remove_entity(&mut self, eid: u64) {
        self.entities.delete(eid);
    }

    /// Atomically repositions an indexed entity (delete + insert).
    pub fn update_entity_position(&mut self, eid: u64, bounds: Aabb) {
        self.entities.update_bounds(eid, bounds);
    }

    /// Entities whose bounds intersect `rect` (closed-low, open-high).
    pub fn entities_in(&self, rect: &Aabb) -> Vec<u64> {
        self.entities.search_intersect(rect)
    }

    /// Returns the chunk at `pos`, generating it if it isn't loaded yet.
    pub fn chunk_or_generate(&mut self, pos: ChunkPos) -> &mut Chunk {
        self.chunks.entry(pos).or_insert_with(|| generator::generate_flat_chunk(pos.x, pos.z))
    }

    /// Commits a chunk generated by a background worker. A no-op if another
    /// job already inserted the same position first.
    pub fn insert_generated_chunk(&mut self, pos: ChunkPos, chunk: Chunk) {
        self.chunks.entry(pos).or_insert(chunk);
    }

    pub fn chunk(&self, pos: ChunkPos) -> Option<&Chunk> {
        self.chunks.get(&pos)
    }

    pub fn is_loaded(&self, pos: ChunkPos) -> bool {
        self.chunks.contains_key(&pos)
    }

    pub fn unload(&mut self, pos: ChunkPos) {
        self.chunks.remove(&pos);
        self.block_changes.remove(&pos);
    }

    /// Sets a block at world coordinates, recording the change for this
    /// tick's Multi Block Change packets. Returns the previous state.
    pub fn set_block_state(&mut self, world_x: i32, world_y: i32, world_z: i32, state: i32) -> i32 {
        let pos = ChunkPos::new(world_x >> 4, world_z >> 4);
        let local_x = (world_x & 0xF) as usize;
        let local_z = (world_z & 0xF) as usize;
        let chunk = self.chunk_or_generate(pos);
        let prev = chunk.set_block_state(local_x, world_y, local_z, state);
        if prev != state {
            let packed = ((local_x as i32) << 12) | ((local_z as i32) << 8) | world_y;
            self.block_changes.entry(pos).or_default().push(BlockRecord { xyz: packed, block_id: state });
        }
        prev
    }

    pub fn get_block_state(&mut self, world_x: i32, world_y: i32, world_z: i32) -> i32 {
        let pos = ChunkPos::new(world_x >> 4, world_z >> 4);
        let local_x = (world_x & 0xF) as usize;
        let local_z = (world_z & 0xF) as usize;
        self.chunk_or_generate(pos).get_block_state(local_x, world_y, local_z)
    }

    /// Drains this tick's accumulated block changes, one list per chunk.
    pub fn drain_block_changes(&mut self) -> HashMap<ChunkPos, Vec<BlockRecord>> {
        std::mem::take(&mut self.block_changes)
    }

    /// Reads sky light at global coordinates. Above the world it is always
    /// lit (15); below it, or in an unloaded chunk, it reads as unlit (0).
    pub fn get_sky_light(&self, x: i32, y: i32, z: i32) -> u8 {
        if y > 255 {
            return 15;
        }
        if y < 0 {
            return 0;
        }
        let pos = ChunkPos::new(x >> 4, z >> 4);
        self.chunks.get(&pos).map(|c| c.get_sky_light((x & 0xF) as usize, y, (z & 0xF) as usize)).unwrap_or(0)
    }

    /// Reads block light at global coordinates; 0 outside the world or in
    /// an unloaded chunk.
    pub fn get_block_light(&self, x: i32, y: i32, z: i32) -> u8 {
        if !(0..=255).contains(&y) {
            return 0;
        }
        let pos = ChunkPos::new(x >> 4, z >> 4);
        self.chunks.get(&pos).map(|c| c.get_block_light((x & 0xF) as usize, y, (z & 0xF) as usize)).unwrap_or(0)
    }

    pub fn set_sky_light(&mut self, x: i32, y: i32, z: i32, value: u8) {
        if !(0..=255).contains(&y) {
            return;
        }
        let pos = ChunkPos::new(x >> 4, z >> 4);
        if let Some(chunk) = self.chunks.get_mut(&pos) {
            chunk.set_sky_light((x & 0xF) as usize, y, (z & 0xF) as usize, value);
        }
    }

    pub fn set_block_light(&mut self, x: i32, y: i32, z: i32, value: u8) {
        if !(0..=255).contains(&y) {
            return;
        }
        let pos = ChunkPos::new(x >> 4, z >> 4);
        if let Some(chunk) = self.chunks.get_mut(&pos) {
            chunk.set_block_light((x & 0xF) as usize, y, (z & 0xF) as usize, value);
        }
    }

    /// Block state at global coordinates, 0 (air) if the chunk isn't loaded.
    pub fn peek_block_state(&self, x: i32, y: i32, z: i32) -> i32 {
        if !(0..=255).contains(&y) {
            return 0;
        }
        let pos = ChunkPos::new(x >> 4, z >> 4);
        self.chunks.get(&pos).map(|c| c.get_block_state((x & 0xF) as usize, y, (z & 0xF) as usize)).unwrap_or(0)
    }
}

impl Default for World {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lazy_generation_on_first_access() {
        let mut world = World::new();
        let pos = ChunkPos::new(0, 0);
        assert!(!world.is_loaded(pos));
        assert_eq!(world.get_block_state(0, 0, 0), generator::BEDROCK);
        assert!(world.is_loaded(pos));
    }

    #[test]
    fn set_block_state_records_change_when_different() {
        let mut world = World::new();
        world.set_block_state(0, 70, 0, 5);
        let changes = world.drain_block_changes();
        let pos = ChunkPos::new(0, 0);
        assert_eq!(changes.get(&pos).unwrap().len(), 1);
        assert_eq!(changes[&pos][0].block_id, 5);
    }

    #[test]
    fn set_block_state_noop_does_not_record() {
        let mut world = World::new();
        world.set_block_state(0, 0, 0, generator::BEDROCK);
        let changes = world.drain_block_changes();
        assert!(changes.is_empty());
    }

    #[test]
    fn drain_clears_accumulated_changes() {
        let mut world = World::new();
        world.set_block_state(1, 70, 1, 2);
        assert!(!world.drain_block_changes().is_empty());
        assert!(world.drain_block_changes().is_empty());
    }

    #[test]
    fn set_block_state_across_chunk_boundary() {
        let mut world = World::new();
        world.set_block_state(16, 70, 0, 3);
        let pos = ChunkPos::new(1, 0);
        assert!(world.is_loaded(pos));
        assert_eq!(world.get_block_state(16, 70, 0), 3);
    }

    #[test]
    fn entity_index_tracks_position_updates() {
        let mut world = World::new();
        let bounds = Aabb { min_x: 0.0, min_y: 62.0, min_z: 0.0, max_x: 0.6, max_y: 2.0, max_z: 0.6 };
        world.insert_entity(1, bounds);
        let rect = Aabb { min_x: -1.0, min_y: 0.0, min_z: -1.0, max_x: 1.0, max_y: 256.0, max_z: 1.0 };
        assert_eq!(world.entities_in(&rect), vec![1]);

        let moved = Aabb { min_x: 100.0, min_y: 62.0, min_z: 100.0, max_x: 100.6, max_y: 64.0, max_z: 100.6 };
        world.update_entity_position(1, moved);
        assert!(world.entities_in(&rect).is_empty());

        world.remove_entity(1);
        let far_rect = Aabb { min_x: 99.0, min_y: 0.0, min_z: 99.0, max_x: 102.0, max_y: 256.0, max_z: 102.0 };
        assert!(world.entities_in(&far_rect).is_empty());
    }
}
