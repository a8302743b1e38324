//! The 20 Hz tick loop: the single deterministic scheduler that drives
//! admission, player-sync, world-sync, light propagation and per-player
//! emission in a fixed phase order.

use std::collections::HashMap;
use std::sync::atomic::{AtomicI32, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use pickaxe_protocol_core::{InternalPacket, PlayerInfoAction, PlayerInfoEntry};
use pickaxe_protocol_v578::V578Adapter;
use pickaxe_types::{Aabb, ChunkPos, GameProfile, Position};
use pickaxe_world::chunk::Chunk;
use pickaxe_world::world::World;
use tokio::sync::{mpsc, oneshot, watch};
use tracing::info;
use uuid::Uuid;

use crate::entity::{Action, Entity, Player, PlayerData, PlayerSlab, Roster, SendItem};
use crate::network::JoinRequest;

const TICK_DURATION: Duration = Duration::from_millis(50);
const KEEP_ALIVE_INTERVAL: Duration = Duration::from_secs(25);
const SOUND_RADIUS: f64 = 16.0;
const EFFECT_BLOCK_BREAK: i32 = 2001;
const MAX_VIEW_RADIUS_BLOCKS: f64 = 256.0;

/// A tick-callback whose `target_tick` has not yet arrived. Insertion is a
/// linear scan (callers do not register at extreme frequencies, so a
/// heap is unnecessary overhead here).
pub struct ScheduledTick {
    pub target_tick: u64,
    pub callback: Box<dyn FnOnce(&mut WorldState) + Send>,
}

#[derive(Default)]
pub struct TickScheduler {
    items: Vec<ScheduledTick>,
}

impl TickScheduler {
    pub fn schedule(&mut self, target_tick: u64, callback: Box<dyn FnOnce(&mut WorldState) + Send>) {
        let mut insert_at = self.items.len();
        for (i, item) in self.items.iter().enumerate() {
            if item.target_tick > target_tick {
                insert_at = i;
                break;
            }
        }
        self.items.insert(insert_at, ScheduledTick { target_tick, callback });
    }

    fn take_due(&mut self, current_tick: u64) -> Vec<ScheduledTick> {
        let split = self.items.partition_point(|i| i.target_tick <= current_tick);
        self.items.drain(0..split).collect()
    }
}

/// A finished background chunk-generation job: the generated chunk plus its
/// pre-encoded Chunk Data / Update Light packets, tagged with the player
/// that asked for it.
struct ChunkReady {
    eid: i32,
    pos: ChunkPos,
    chunk: Chunk,
    data_packet: InternalPacket,
    light_packet: InternalPacket,
}

/// Generates `pos` and encodes its initial packets on the blocking thread
/// pool, reporting back over `tx`. Generation is pure and stateless, so two
/// concurrent jobs for the same position (requested by different players in
/// the same tick) are harmless — whichever response is drained first wins
/// the world-map insert, and the tick thread never blocks waiting for this.
fn spawn_chunk_job(pos: ChunkPos, eid: i32, tx: mpsc::UnboundedSender<ChunkReady>) {
    tokio::task::spawn_blocking(move || {
        let mut chunk = pickaxe_world::generator::generate_flat_chunk(pos.x, pos.z);
        let data_packet = chunk.to_chunk_data_packet();
        let light_packet = chunk.to_update_light_packet();
        let _ = tx.send(ChunkReady { eid, pos, chunk, data_packet, light_packet });
    });
}

/// Everything the tick thread owns exclusively: the world, the player slab,
/// and the admission bookkeeping. Nothing outside the tick thread ever
/// mutates world or entity state directly.
pub struct WorldState {
    pub world: World,
    pub players: PlayerSlab,
    pub scheduler: TickScheduler,
    pub tick: u64,
    pub max_view_distance: u32,
    chunk_ready_tx: mpsc::UnboundedSender<ChunkReady>,
    pending_chunk_jobs: std::collections::HashSet<(i32, ChunkPos)>,
}

struct AdmitResult {
    new_players: Vec<i32>,
    left_players: Vec<(i32, Uuid)>,
}

/// Runs the tick loop until `shutdown_rx` observes `true`.
#[allow(clippy::too_many_arguments)]
pub async fn run_tick_loop(
    mut join_rx: mpsc::UnboundedReceiver<JoinRequest>,
    next_eid: Arc<AtomicI32>,
    player_count: Arc<AtomicUsize>,
    max_view_distance: u32,
    mut shutdown_rx: watch::Receiver<bool>,
) {
    let adapter = V578Adapter::new();
    let (chunk_ready_tx, mut chunk_ready_rx) = mpsc::unbounded_channel::<ChunkReady>();
    let mut state = WorldState {
        world: World::new(),
        players: PlayerSlab::new(),
        scheduler: TickScheduler::default(),
        tick: 0,
        max_view_distance,
        chunk_ready_tx,
        pending_chunk_jobs: Default::default(),
    };

    let mut interval = tokio::time::interval(TICK_DURATION);
    interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
    let mut last_tps_log = Instant::now();
    let mut ticks_since_log: u32 = 0;

    loop {
        tokio::select! {
            _ = interval.tick() => {}
            _ = shutdown_rx.changed() => {
                if *shutdown_rx.borrow() {
                    info!("tick loop shutting down");
                    return;
                }
            }
        }

        let admit = admit_retire(&mut state, &mut join_rx, &next_eid, &player_count, &adapter);
        server_sync(&mut state);
        tick_objects(&mut state);
        run_scheduled(&mut state);
        let changes = world_sync(&mut state);
        light_updates(&mut state, &changes);
        apply_ready_chunks(&mut state, &mut chunk_ready_rx, &adapter);
        client_sync(&mut state, &admit, &changes, &adapter);
        cleanup(&mut state, admit);

        state.tick += 1;
        ticks_since_log += 1;
        if last_tps_log.elapsed() >= Duration::from_secs(1) {
            info!("tps: {}", ticks_since_log);
            ticks_since_log = 0;
            last_tps_log = Instant::now();
        }
    }
}

/// Step 1: drain the join/leave queues under this tick's single pass.
fn admit_retire(
    state: &mut WorldState,
    join_rx: &mut mpsc::UnboundedReceiver<JoinRequest>,
    next_eid: &Arc<AtomicI32>,
    player_count: &Arc<AtomicUsize>,
    adapter: &V578Adapter,
) -> AdmitResult {
    let mut new_players = Vec::new();
    while let Ok(req) = join_rx.try_recv() {
        let eid = next_eid.fetch_add(1, Ordering::Relaxed);
        let spawn = pickaxe_world::generator::spawn_position();
        let spawn_pos = pickaxe_types::Vec3d::new(spawn.x as f64 + 0.5, spawn.y as f64, spawn.z as f64 + 0.5);

        let data = PlayerData {
            profile: req.profile.clone(),
            view_distance: req.view_distance,
            skin_mask: 0,
            main_hand: 1,
            flying: false,
            sprinting: false,
            inventory: crate::entity::Inventory::new(),
            held_item_index: 0,
            known_chunks: Default::default(),
            known_entities: Default::default(),
            roster: Roster::default(),
            last_keep_alive: Instant::now(),
            pending_keep_alive: None,
            ping_millis: 0,
            ping_changed: false,
            chunk_x: spawn_pos.chunk_pos().x,
            chunk_z: spawn_pos.chunk_pos().z,
            queues: req.queues,
            outbound: req.outbound,
            joined: true,
            alive: req.alive,
        };
        let entity = Entity::new_player(eid, req.profile.uuid, spawn_pos, data);
        state.world.insert_entity(eid as u64, entity.bounds());
        player_count.fetch_add(1, Ordering::Relaxed);
        new_players.push(eid);
        state.players.insert(Player::new(entity));

        let player = state.players.get(eid).unwrap();
        send_packet(player, adapter, &InternalPacket::JoinGame {
            entity_id: eid,
            game_mode: pickaxe_types::GameMode::Survival,
            dimension: 0,
            hashed_seed: 0,
            max_players: 255,
            level_type: "flat".into(),
            view_distance: player.entity.player().view_distance as i32,
            reduced_debug_info: false,
            enable_respawn_screen: true,
        });
        send_packet(player, adapter, &InternalPacket::PlayerPositionAndLook {
            position: spawn_pos,
            yaw: 0.0,
            pitch: 0.0,
            flags: 0,
            teleport_id: 69,
        });
    }

    let mut left_players = Vec::new();
    let dead: Vec<i32> = state
        .players
        .iter()
        .filter(|(_, p)| !p.entity.player().alive.load(Ordering::Relaxed))
        .map(|(&eid, _)| eid)
        .collect();
    for eid in dead {
        if let Some(player) = state.players.remove(eid) {
            state.world.remove_entity(eid as u64);
            player_count.fetch_sub(1, Ordering::Relaxed);
            left_players.push((eid, player.entity.uuid));
        }
    }

    AdmitResult { new_players, left_players }
}

/// Step 2: drain each player's Change queue, applying mutations in order.
fn server_sync(state: &mut WorldState) {
    let mut moved = Vec::new();
    for (&eid, player) in state.players.iter_mut() {
        if player.apply_pending_mutations() {
            moved.push(eid);
        }
    }
    for eid in moved {
        if let Some(player) = state.players.get(eid) {
            state.world.update_entity_position(eid as u64, player.entity.bounds());
        }
    }
}

/// Step 3: drain each player's Action queue (Dig/Place), turning them into
/// pending block changes applied during world-sync.
fn tick_objects(state: &mut WorldState) {
    let eids: Vec<i32> = state.players.iter().map(|(&eid, _)| eid).collect();
    let mut pending_breaks: Vec<(Position, i32)> = Vec::new();

    for eid in eids {
        let actions = state.players.get_mut(eid).map(|p| p.drain_actions()).unwrap_or_default();
        for action in actions {
            match action {
                Action::Dig { position, .. } => {
                    pending_breaks.push((position, eid));
                }
                Action::Place { position, face } => {
                    let target = position.apply_face(face);
                    let held = state
                        .players
                        .get(eid)
                        .and_then(|p| p.entity.player().inventory.get(p.entity.player().held_item_slot()));
                    if let Some(item) = held {
                        if let Some(new_state) = pickaxe_data::item_id_to_block_state(item.item_id) {
                            state.world.set_block_state(target.x, target.y, target.z, new_state);
                        }
                    }
                }
            }
        }
    }

    for (position, actor_eid) in pending_breaks {
        let old_state = state.world.set_block_state(position.x, position.y, position.z, 0);
        if old_state != 0 {
            let center = Aabb {
                min_x: position.x as f64 - SOUND_RADIUS,
                min_y: position.y as f64 - SOUND_RADIUS,
                min_z: position.z as f64 - SOUND_RADIUS,
                max_x: position.x as f64 + SOUND_RADIUS,
                max_y: position.y as f64 + SOUND_RADIUS,
                max_z: position.z as f64 + SOUND_RADIUS,
            };
            for hit in state.world.entities_in(&center) {
                let hit_eid = hit as i32;
                if hit_eid == actor_eid {
                    continue;
                }
                if let Some(player) = state.players.get(hit_eid) {
                    let adapter = V578Adapter::new();
                    send_packet(player, &adapter, &InternalPacket::Effect {
                        effect_id: EFFECT_BLOCK_BREAK,
                        position,
                        data: old_state,
                        disable_relative_volume: false,
                    });
                }
            }
        }
    }
}

fn run_scheduled(state: &mut WorldState) {
    let due = state.scheduler.take_due(state.tick);
    for item in due {
        (item.callback)(state);
    }
}

/// Step 5: pending block changes have already been applied to the chunk by
/// `World::set_block_state` (which also records them); this step drains
/// that per-tick log for the client-sync step to consume.
fn world_sync(state: &mut WorldState) -> HashMap<ChunkPos, Vec<pickaxe_world::world::BlockRecord>> {
    state.world.drain_block_changes()
}

/// Step 6: relight every chunk touched by this tick's block changes.
fn light_updates(state: &mut WorldState, changes: &HashMap<ChunkPos, Vec<pickaxe_world::world::BlockRecord>>) {
    for pos in changes.keys() {
        pickaxe_world::light::relight_chunk(&mut state.world, pos.x, pos.z);
    }
}

/// Drains chunk-generation jobs that finished on the blocking pool since the
/// last tick, commits their chunk into the world, and forwards the
/// pre-encoded packets to the requesting player if they're still around.
fn apply_ready_chunks(state: &mut WorldState, chunk_ready_rx: &mut mpsc::UnboundedReceiver<ChunkReady>, adapter: &V578Adapter) {
    while let Ok(ready) = chunk_ready_rx.try_recv() {
        state.pending_chunk_jobs.remove(&(ready.eid, ready.pos));
        state.world.insert_generated_chunk(ready.pos, ready.chunk);
        let Some(player) = state.players.get(ready.eid) else { continue };
        let outbound = player.entity.player().outbound.clone();
        send_queued(&outbound, adapter, &ready.data_packet);
        send_queued(&outbound, adapter, &ready.light_packet);
    }
}

/// Emits each player's per-tick delta: roster, chunks, entities, keepalive.
fn client_sync(
    state: &mut WorldState,
    admit: &AdmitResult,
    changes: &HashMap<ChunkPos, Vec<pickaxe_world::world::BlockRecord>>,
    adapter: &V578Adapter,
) {
    let eids: Vec<i32> = state.players.iter().map(|(&eid, _)| eid).collect();

    for &eid in &eids {
        emit_player_info(state, eid, admit, adapter);
        emit_chunks(state, eid, changes, adapter);
        emit_entities(state, eid, adapter);
        emit_keep_alive(state, eid, adapter);
    }
}

fn emit_player_info(state: &mut WorldState, eid: i32, admit: &AdmitResult, adapter: &V578Adapter) {
    let all_profiles: Vec<(i32, GameProfile)> =
        state.players.iter().map(|(&e, p)| (e, p.entity.player().profile.clone())).collect();

    let Some(player) = state.players.get_mut(eid) else { return };
    player.entity.player_mut().roster.settle();

    let fresh_join = admit.new_players.contains(&eid);
    let outbound = player.entity.player().outbound.clone();

    if fresh_join {
        let entries: Vec<PlayerInfoEntry> = all_profiles
            .iter()
            .map(|(_, profile)| PlayerInfoEntry {
                uuid: profile.uuid,
                name: profile.name.clone(),
                game_mode: 0,
                ping: 0,
            })
            .collect();
        if !entries.is_empty() {
            let uuids: Vec<Uuid> = entries.iter().map(|e| e.uuid).collect();
            send_with_ack(&outbound, adapter, &InternalPacket::PlayerInfo { action: PlayerInfoAction::AddPlayer(entries) }, &mut player.entity.player_mut().roster, &uuids);
        }
    } else {
        let new_entries: Vec<PlayerInfoEntry> = admit
            .new_players
            .iter()
            .filter(|&&other| other != eid)
            .filter_map(|&other| all_profiles.iter().find(|(e, _)| *e == other))
            .map(|(_, profile)| PlayerInfoEntry { uuid: profile.uuid, name: profile.name.clone(), game_mode: 0, ping: 0 })
            .collect();
        if !new_entries.is_empty() {
            let uuids: Vec<Uuid> = new_entries.iter().map(|e| e.uuid).collect();
            send_with_ack(&outbound, adapter, &InternalPacket::PlayerInfo { action: PlayerInfoAction::AddPlayer(new_entries) }, &mut player.entity.player_mut().roster, &uuids);
        }

        let removed: Vec<Uuid> = admit.left_players.iter().map(|(_, uuid)| *uuid).collect();
        if !removed.is_empty() {
            send_queued(&outbound, adapter, &InternalPacket::PlayerInfo { action: PlayerInfoAction::RemovePlayer(removed.clone()) });
            for uuid in removed {
                player.entity.player_mut().roster.known.remove(&uuid);
            }
        }
    }

    // UpdateLatency: filter on the *other*
    // player's PingChanged flag, not this player's own.
    let latency_updates: Vec<(Uuid, i32)> = state
        .players
        .iter()
        .filter(|(_, p)| p.entity.player().ping_changed)
        .map(|(_, p)| (p.entity.uuid, p.entity.player().ping_millis))
        .collect();
    if !latency_updates.is_empty() {
        if let Some(player) = state.players.get(eid) {
            send_packet(player, adapter, &InternalPacket::PlayerInfo { action: PlayerInfoAction::UpdateLatency(latency_updates) });
        }
    }
}

fn emit_chunks(
    state: &mut WorldState,
    eid: i32,
    changes: &HashMap<ChunkPos, Vec<pickaxe_world::world::BlockRecord>>,
    adapter: &V578Adapter,
) {
    let Some(player) = state.players.get(eid) else { return };
    let (center_cx, center_cz) = (player.entity.player().chunk_x, player.entity.player().chunk_z);
    let vd = player.entity.player().view_distance as i32;
    let outbound = player.entity.player().outbound.clone();

    // Over-covering midpoint-circle enumeration: one extra ring.
    let radius = vd + 1;
    let mut wanted = Vec::new();
    for dx in -radius..=radius {
        for dz in -radius..=radius {
            if dx * dx + dz * dz <= radius * radius {
                wanted.push(ChunkPos::new(center_cx + dx, center_cz + dz));
            }
        }
    }

    let known_now: std::collections::HashSet<ChunkPos> = wanted.iter().copied().collect();

    for pos in &wanted {
        let player = state.players.get_mut(eid).unwrap();
        let known_chunks = &mut player.entity.player_mut().known_chunks;
        if !known_chunks.contains(pos) {
            known_chunks.insert(*pos);
            if state.pending_chunk_jobs.insert((eid, *pos)) {
                spawn_chunk_job(*pos, eid, state.chunk_ready_tx.clone());
            }
        } else if let Some(records) = changes.get(pos) {
            if records.len() == 1 {
                let record = records[0];
                let local_x = (record.xyz >> 12) & 0xF;
                let local_z = (record.xyz >> 8) & 0xF;
                let y = record.xyz & 0xFF;
                let position = Position::new(pos.x * 16 + local_x, y, pos.z * 16 + local_z);
                send_queued(&outbound, adapter, &InternalPacket::BlockChange { position, block_id: record.block_id });
            } else if !records.is_empty() {
                let wire_records = records
                    .iter()
                    .map(|r| pickaxe_protocol_core::MultiBlockRecord { xyz: r.xyz, block_id: r.block_id })
                    .collect();
                send_queued(&outbound, adapter, &InternalPacket::MultiBlockChange { chunk_x: pos.x, chunk_z: pos.z, records: wire_records });
            }
        }
    }

    let player = state.players.get_mut(eid).unwrap();
    let known_chunks = &mut player.entity.player_mut().known_chunks;
    let stale: Vec<ChunkPos> = known_chunks.iter().filter(|p| !known_now.contains(p)).copied().collect();
    for pos in stale {
        known_chunks.remove(&pos);
        send_queued(&outbound, adapter, &InternalPacket::UnloadChunk { chunk_x: pos.x, chunk_z: pos.z });
    }
}

fn emit_entities(state: &mut WorldState, eid: i32, adapter: &V578Adapter) {
    let Some(player) = state.players.get(eid) else { return };
    let pos = player.entity.pos;
    let vd = player.entity.player().view_distance as f64;
    let half = (16.0 * vd).min(MAX_VIEW_RADIUS_BLOCKS);
    let rect = Aabb {
        min_x: pos.x - half,
        min_y: 0.0,
        min_z: pos.z - half,
        max_x: pos.x + half,
        max_y: 256.0,
        max_z: pos.z + half,
    };
    let outbound = player.entity.player().outbound.clone();
    let visible: Vec<i32> = state.world.entities_in(&rect).into_iter().map(|id| id as i32).filter(|&id| id != eid).collect();

    let mut visited = std::collections::HashSet::new();
    for &other_eid in &visible {
        visited.insert(other_eid);
        let known_now = {
            let player = state.players.get(eid).unwrap();
            player.entity.player().known_entities.contains(&other_eid)
        };
        let Some(other) = state.players.get(other_eid) else { continue };
        let other_uuid = other.entity.uuid;
        let other_eid_val = other.entity.eid;
        let other_pos = other.entity.pos;
        let other_yaw = other.entity.yaw;
        let other_pitch = other.entity.pitch;
        let other_animation = other.entity.dirty.animation;
        let other_equipment_changed = other.entity.dirty.equipment_changed;
        let other_equipment = other.entity.equipment;
        let other_metadata_changed = other.entity.dirty.metadata_changed;

        if known_now {
            emit_movement_delta(&outbound, adapter, other);
        } else {
            let in_roster = {
                let player = state.players.get(eid).unwrap();
                player.entity.player().roster.known.contains(&other_uuid)
            };
            if !in_roster {
                continue;
            }
            send_queued(&outbound, adapter, &InternalPacket::SpawnPlayer {
                entity_id: other_eid_val,
                uuid: other_uuid,
                x: other_pos.x,
                y: other_pos.y,
                z: other_pos.z,
                yaw: to_angle_byte(other_yaw),
                pitch: to_angle_byte(other_pitch),
            });
            let player = state.players.get_mut(eid).unwrap();
            player.entity.player_mut().known_entities.insert(other_eid);
        }

        if let Some(anim) = other_animation {
            send_queued(&outbound, adapter, &InternalPacket::EntityAnimation { entity_id: other_eid_val, animation: anim });
        }
        for slot in 0..6u8 {
            if other_equipment_changed & (1 << slot) != 0 {
                send_queued(&outbound, adapter, &InternalPacket::EntityEquipment {
                    entity_id: other_eid_val,
                    slot: slot as i32,
                    item: other_equipment[slot as usize],
                });
            }
        }
        if other_metadata_changed {
            let metadata = state.players.get(other_eid).unwrap().entity.write_metadata();
            send_queued(&outbound, adapter, &InternalPacket::EntityMetadata {
                entity_id: other_eid_val,
                metadata,
            });
        }
    }

    let to_destroy: Vec<i32> = {
        let player = state.players.get(eid).unwrap();
        player.entity.player().known_entities.iter().filter(|e| !visited.contains(e)).copied().collect()
    };
    if !to_destroy.is_empty() {
        send_queued(&outbound, adapter, &InternalPacket::DestroyEntities { entity_ids: to_destroy.clone() });
        let player = state.players.get_mut(eid).unwrap();
        for e in to_destroy {
            player.entity.player_mut().known_entities.remove(&e);
        }
    }
}

fn emit_movement_delta(outbound: &mpsc::UnboundedSender<SendItem>, adapter: &V578Adapter, other: &Player) {
    let e = &other.entity;
    let yaw = to_angle_byte(e.yaw);
    let pitch = to_angle_byte(e.pitch);
    match (e.dirty.moved, e.dirty.rotated) {
        (true, true) | (true, false) => {
            send_queued(outbound, adapter, &InternalPacket::EntityTeleport {
                entity_id: e.eid,
                x: e.pos.x,
                y: e.pos.y,
                z: e.pos.z,
                yaw,
                pitch,
                on_ground: e.on_ground,
            });
            if e.dirty.rotated {
                send_queued(outbound, adapter, &InternalPacket::EntityHeadLook { entity_id: e.eid, head_yaw: yaw });
            }
        }
        (false, true) => {
            send_queued(outbound, adapter, &InternalPacket::EntityLook { entity_id: e.eid, yaw, pitch, on_ground: e.on_ground });
            send_queued(outbound, adapter, &InternalPacket::EntityHeadLook { entity_id: e.eid, head_yaw: yaw });
        }
        (false, false) => {}
    }
}

fn emit_keep_alive(state: &mut WorldState, eid: i32, adapter: &V578Adapter) {
    let Some(player) = state.players.get_mut(eid) else { return };
    let pdata = player.entity.player_mut();
    if pdata.last_keep_alive.elapsed() > KEEP_ALIVE_INTERVAL {
        let now_nanos = std::time::SystemTime::now()
            .duration_since(std::time::UNIX_EPOCH)
            .map(|d| d.as_nanos() as i64)
            .unwrap_or(0);
        pdata.last_keep_alive = Instant::now();
        pdata.pending_keep_alive = Some(now_nanos);
        let outbound = pdata.outbound.clone();
        send_queued(&outbound, adapter, &InternalPacket::KeepAliveClientbound { id: now_nanos });
    }
}

/// Step 8: clear per-tick dirty bits and the admission lists.
fn cleanup(state: &mut WorldState, _admit: AdmitResult) {
    for (_, player) in state.players.iter_mut() {
        player.entity.dirty.clear();
        player.entity.player_mut().joined = false;
        player.entity.player_mut().ping_changed = false;
    }
}

fn to_angle_byte(degrees: f32) -> u8 {
    ((degrees as f64 * 256.0 / 360.0).rem_euclid(256.0)) as u8
}

fn send_packet(player: &Player, adapter: &V578Adapter, packet: &InternalPacket) {
    send_queued(&player.entity.player().outbound, adapter, packet);
}

fn send_queued(outbound: &mpsc::UnboundedSender<SendItem>, adapter: &V578Adapter, packet: &InternalPacket) {
    if let Ok((packet_id, payload)) = crate::network::encode_for_queue(adapter, packet) {
        let _ = outbound.send(SendItem { packet_id, payload, ack: None });
    }
}

fn send_with_ack(
    outbound: &mpsc::UnboundedSender<SendItem>,
    adapter: &V578Adapter,
    packet: &InternalPacket,
    roster: &mut Roster,
    uuids: &[Uuid],
) {
    if let Ok((packet_id, payload)) = crate::network::encode_for_queue(adapter, packet) {
        let (tx, rx) = oneshot::channel();
        if outbound.send(SendItem { packet_id, payload, ack: Some(tx) }).is_ok() {
            let flag = Arc::new(std::sync::atomic::AtomicBool::new(false));
            tokio::spawn({
                let flag = flag.clone();
                async move {
                    if rx.await.is_ok() {
                        flag.store(true, Ordering::Relaxed);
                    }
                }
            });
            for &uuid in uuids {
                roster.pending.insert(uuid);
                roster.waiting_for.push((uuid, flag.clone()));
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn scheduler_runs_items_due_at_current_tick_in_scan_order() {
        let mut scheduler = TickScheduler::default();
        let log = Arc::new(std::sync::Mutex::new(Vec::new()));
        let log2 = log.clone();
        scheduler.schedule(5, Box::new(move |_| log2.lock().unwrap().push(5)));
        let log3 = log.clone();
        scheduler.schedule(3, Box::new(move |_| log3.lock().unwrap().push(3)));
        let due = scheduler.take_due(4);
        assert_eq!(due.len(), 1);
        assert_eq!(due[0].target_tick, 3);
        assert_eq!(scheduler.items.len(), 1);
    }

    #[test]
    fn angle_byte_wraps_into_u8_range() {
        assert_eq!(to_angle_byte(0.0), 0);
        assert_eq!(to_angle_byte(180.0), 128);
        assert_eq!(to_angle_byte(-90.0), 192);
    }
}
