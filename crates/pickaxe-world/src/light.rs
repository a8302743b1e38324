use std::collections::{HashSet, VecDeque};

use pickaxe_types::ChunkPos;

use crate::world::World;

const NEIGHBOUR_OFFSETS: [(i32, i32, i32); 6] =
    [(1, 0, 0), (-1, 0, 0), (0, 1, 0), (0, -1, 0), (0, 0, 1), (0, 0, -1)];

/// Seeds sky/block light for a freshly loaded chunk and drains both BFS
/// queues to a fixed point. Sky-light seeding casts straight down from
/// y=255 accumulating `FilterLight`; y=255 itself is fixed at 15 and never
/// re-derived by propagation. Any transparent cell below it and any
/// light-emitting block becomes a propagation source.
pub fn relight_chunk(world: &mut World, chunk_x: i32, chunk_z: i32) {
    let mut sky_queue = VecDeque::new();
    let mut block_queue = VecDeque::new();
    seed_chunk(world, chunk_x, chunk_z, &mut sky_queue, &mut block_queue);
    propagate(world, &mut sky_queue, Some(255), propagate_sky_step);
    propagate(world, &mut block_queue, None, propagate_block_step);
}

fn seed_chunk(
    world: &mut World,
    chunk_x: i32,
    chunk_z: i32,
    sky_queue: &mut VecDeque<(i32, i32, i32)>,
    block_queue: &mut VecDeque<(i32, i32, i32)>,
) {
    for lx in 0..16 {
        for lz in 0..16 {
            let x = chunk_x * 16 + lx;
            let z = chunk_z * 16 + lz;
            let mut acc: i32 = 15;
            for y in (0..=255i32).rev() {
                let state = world.peek_block_state(x, y, z);
                let (filter, emit) = pickaxe_data::block_light_properties(state);
                acc = (acc - filter as i32).max(0);
                world.set_sky_light(x, y, z, acc as u8);
                if filter < 15 && y != 255 {
                    sky_queue.push_back((x, y, z));
                }
                if emit > 0 {
                    world.set_block_light(x, y, z, emit);
                    block_queue.push_back((x, y, z));
                }
            }
        }
    }
}

fn chunk_loaded(world: &World, x: i32, z: i32) -> bool {
    world.is_loaded(ChunkPos::new(x >> 4, z >> 4))
}

/// Drains `queue` to a fixed point. Nodes already waiting in the queue are
/// not re-enqueued — coalescing repeat visits keeps this from blowing up
/// into an exponential number of re-scans on a dense flood fill. `exclude_y`,
/// when set, is a y level that is never (re-)enqueued — used to keep the
/// fixed y=255 sky-light seed from being recomputed by its y=254 neighbour.
fn propagate(
    world: &mut World,
    queue: &mut VecDeque<(i32, i32, i32)>,
    exclude_y: Option<i32>,
    step: impl Fn(&mut World, i32, i32, i32) -> bool,
) {
    let mut queued: HashSet<(i32, i32, i32)> = queue.iter().copied().collect();
    while let Some(node) = queue.pop_front() {
        queued.remove(&node);
        let (x, y, z) = node;
        if step(world, x, y, z) {
            for (dx, dy, dz) in NEIGHBOUR_OFFSETS {
                let (nx, ny, nz) = (x + dx, y + dy, z + dz);
                if ny < 0 || ny > 255 || Some(ny) == exclude_y {
                    continue;
                }
                if !chunk_loaded(world, nx, nz) {
                    continue;
                }
                let neighbour = (nx, ny, nz);
                if queued.insert(neighbour) {
                    queue.push_back(neighbour);
                }
            }
        }
    }
}

/// Recomputes sky light at `(x,y,z)`; returns whether the value changed.
fn propagate_sky_step(world: &mut World, x: i32, y: i32, z: i32) -> bool {
    let (filter, _) = pickaxe_data::block_light_properties(world.peek_block_state(x, y, z));
    let current = world.get_sky_light(x, y, z) as i32;
    let target = if filter >= 15 {
        0
    } else {
        let max_neighbour = NEIGHBOUR_OFFSETS
            .iter()
            .map(|(dx, dy, dz)| world.get_sky_light(x + dx, y + dy, z + dz) as i32)
            .max()
            .unwrap_or(0);
        (max_neighbour - filter as i32 - 1).clamp(0, 15)
    };
    if target != current {
        world.set_sky_light(x, y, z, target as u8);
        true
    } else {
        false
    }
}

/// Recomputes block light at `(x,y,z)`; returns whether the value changed.
fn propagate_block_step(world: &mut World, x: i32, y: i32, z: i32) -> bool {
    let (filter, emit) = pickaxe_data::block_light_properties(world.peek_block_state(x, y, z));
    let current = world.get_block_light(x, y, z) as i32;
    let target = if filter != 0 {
        emit as i32
    } else {
        let max_neighbour = NEIGHBOUR_OFFSETS
            .iter()
            .map(|(dx, dy, dz)| world.get_block_light(x + dx, y + dy, z + dz) as i32)
            .max()
            .unwrap_or(0);
        (max_neighbour - 1 + emit as i32).clamp(0, 15)
    };
    if target != current {
        world.set_block_light(x, y, z, target as u8);
        true
    } else {
        false
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sky_light_decays_one_per_step_going_down_from_the_sky() {
        // y=255 is seeded at a fixed 15 and never re-derived; the decrementing
        // propagation starts one level below it.
        let mut world = World::new();
        world.chunk_or_generate(ChunkPos::new(0, 0));
        relight_chunk(&mut world, 0, 0);
        let top = world.get_sky_light(0, 255, 0);
        assert_eq!(top, 15);
        assert_eq!(world.get_sky_light(0, 255 - 5, 0), top - 5);
    }

    #[test]
    fn sky_light_is_zero_underground() {
        let mut world = World::new();
        world.chunk_or_generate(ChunkPos::new(0, 0));
        relight_chunk(&mut world, 0, 0);
        assert_eq!(world.get_sky_light(0, 10, 0), 0);
        assert_eq!(world.get_sky_light(0, 61, 0), 0); // below the surface, under stone/dirt
    }

    #[test]
    fn block_light_emits_and_attenuates() {
        let mut world = World::new();
        world.chunk_or_generate(ChunkPos::new(0, 0));
        // Place a torch in open air above the surface.
        world.set_block_state(0, 70, 0, 50);
        relight_chunk(&mut world, 0, 0);
        let source = world.get_block_light(0, 70, 0);
        assert!(source > 0);
        assert_eq!(world.get_block_light(1, 70, 0), source - 1);
        assert_eq!(world.get_block_light(0, 68, 0), source - 2);
        assert_eq!(world.get_block_light(15, 70, 0), 0); // 15 blocks away, fully attenuated
    }

    #[test]
    fn relight_terminates_and_is_idempotent() {
        let mut world = World::new();
        world.chunk_or_generate(ChunkPos::new(0, 0));
        relight_chunk(&mut world, 0, 0);
        let before = world.get_sky_light(0, 70, 0);
        relight_chunk(&mut world, 0, 0);
        assert_eq!(world.get_sky_light(0, 70, 0), before);
    }

    #[test]
    fn chunk_boundary_light_flood() {
        // A light source in chunk (1,0) should still light the adjacent
        // cell across the boundary in chunk (0,0), one level dimmer.
        let mut world = World::new();
        world.chunk_or_generate(ChunkPos::new(0, 0));
        world.chunk_or_generate(ChunkPos::new(1, 0));
        // Torch at local x=0 of chunk (1,0), i.e. world x=16.
        world.set_block_state(16, 90, 0, 50);
        relight_chunk(&mut world, 0, 0);
        relight_chunk(&mut world, 1, 0);
        let source = world.get_block_light(16, 90, 0);
        assert_eq!(world.get_block_light(15, 90, 0), source - 1);
    }
}
