//! The tagged-variant entity model: a shared `Entity` record plus
//! variant-specific extension data, so the metadata/emit pipeline can ask
//! any entity for its behavior without runtime reflection.

use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Instant;

use pickaxe_protocol_core::EntityMetadataEntry;
use pickaxe_types::{Aabb, ChunkPos, Face, GameProfile, ItemStack, Position, Vec3d};
use tokio::sync::{mpsc, oneshot};
use uuid::Uuid;

/// A decoded send-queue entry: submit order on the channel is wire order.
pub struct SendItem {
    pub packet_id: i32,
    pub payload: bytes::Bytes,
    pub ack: Option<oneshot::Sender<()>>,
}

/// A pending mutation from a packet handler, applied in submission order
/// during the tick thread's server-sync step. Handlers never touch player
/// state directly; they only ever push onto this queue.
#[derive(Debug, Clone)]
pub enum Mutation {
    Move(f64, f64, f64, bool),
    LookAt(f32, f32),
    SetView(u8),
    SetSkinMask(u8),
    SetMainHand(i32),
    SetFlying(bool),
    Pose(u8),
    SetSprinting(bool),
    HeldItem(u8),
    InventorySet(usize, Option<ItemStack>),
    PingSample(i64),
    Animation(u8),
}

/// A pending Dig/Place intent, drained during the tick-objects step.
/// `Place` carries only the target position/face; the item placed is
/// resolved from the acting player's current held slot when the
/// tick-objects step processes the action (the item itself may have
/// changed between packet arrival and processing).
#[derive(Debug, Clone)]
pub enum Action {
    Dig { position: Position, face: Face },
    Place { position: Position, face: Face },
}

/// Per-player queues shared between the connection's recv task (producer)
/// and the tick thread (sole consumer). Two queues because the tick loop
/// drains them in separate steps.
#[derive(Default)]
pub struct PlayerQueues {
    pub change: Mutex<VecDeque<Mutation>>,
    pub actions: Mutex<VecDeque<Action>>,
}

impl PlayerQueues {
    pub fn push_change(&self, m: Mutation) {
        self.change.lock().unwrap().push_back(m);
    }

    pub fn push_action(&self, a: Action) {
        self.actions.lock().unwrap().push_back(a);
    }

    fn drain_change(&self) -> Vec<Mutation> {
        std::mem::take(&mut *self.change.lock().unwrap()).into_iter().collect()
    }

    fn drain_actions(&self) -> Vec<Action> {
        std::mem::take(&mut *self.actions.lock().unwrap()).into_iter().collect()
    }
}

/// Per-tick dirty bits. Cleared every tick during cleanup.
#[derive(Debug, Clone, Copy, Default)]
pub struct DirtyFlags {
    pub moved: bool,
    pub rotated: bool,
    pub on_ground_changed: bool,
    pub metadata_changed: bool,
    /// Bit `i` set means equipment slot `i` changed this tick.
    pub equipment_changed: u8,
    pub animation: Option<u8>,
}

impl DirtyFlags {
    pub fn clear(&mut self) {
        self.moved = false;
        self.rotated = false;
        self.on_ground_changed = false;
        self.metadata_changed = false;
        self.equipment_changed = 0;
        self.animation = None;
    }
}

bitflags::bitflags! {
    /// Entity status flags carried in metadata index 0.
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct EntityFlags: u8 {
        const ON_FIRE = 0x01;
        const SPRINTING = 0x08;
        const INVISIBLE = 0x20;
        const GLOWING = 0x40;
    }
}

/// The shared part of every entity: identity, transform, equipment and the
/// dirty bits the emit pipeline reads each tick.
pub struct Entity {
    pub eid: i32,
    pub uuid: Uuid,
    pub pos: Vec3d,
    pub prev_pos: Vec3d,
    pub velocity: Vec3d,
    pub yaw: f32,
    pub pitch: f32,
    pub head_yaw: f32,
    pub on_ground: bool,
    pub equipment: [Option<ItemStack>; 6],
    pub pose: u8,
    pub flags: EntityFlags,
    pub dirty: DirtyFlags,
    pub kind: EntityKind,
}

pub enum EntityKind {
    Player(PlayerData),
}

const PLAYER_WIDTH: f64 = 0.6;
const PLAYER_HEIGHT: f64 = 1.8;

impl Entity {
    pub fn new_player(eid: i32, uuid: Uuid, pos: Vec3d, data: PlayerData) -> Self {
        Self {
            eid,
            uuid,
            pos,
            prev_pos: pos,
            velocity: Vec3d::new(0.0, 0.0, 0.0),
            yaw: 0.0,
            pitch: 0.0,
            head_yaw: 0.0,
            on_ground: true,
            equipment: Default::default(),
            pose: 0,
            flags: EntityFlags::empty(),
            dirty: DirtyFlags::default(),
            kind: EntityKind::Player(data),
        }
    }

    pub fn bounds(&self) -> Aabb {
        Aabb::centered(self.pos, PLAYER_WIDTH, PLAYER_HEIGHT)
    }

    pub fn player(&self) -> &PlayerData {
        match &self.kind {
            EntityKind::Player(p) => p,
        }
    }

    pub fn player_mut(&mut self) -> &mut PlayerData {
        match &mut self.kind {
            EntityKind::Player(p) => p,
        }
    }

    /// The variant's metadata-writing behavior: a trait-like capability the
    /// emit pipeline invokes without caring which entity kind it's talking to.
    pub fn write_metadata(&self) -> Vec<EntityMetadataEntry> {
        let mut entries = vec![EntityMetadataEntry {
            index: 0,
            type_id: 0, // byte
            data: vec![self.flags.bits()],
        }];
        entries.push(EntityMetadataEntry { index: 6, type_id: 18, data: vec![self.pose] });
        let EntityKind::Player(p) = &self.kind;
        entries.push(EntityMetadataEntry { index: 17, type_id: 0, data: vec![p.skin_mask] });
        entries
    }
}

/// Player info roster bookkeeping. A batch of
/// uuids announced in a single `AddPlayer` packet share one ack flag: they
/// all become `known` together once that packet's write completes.
#[derive(Default)]
pub struct Roster {
    pub known: HashSet<Uuid>,
    pub waiting_for: Vec<(Uuid, Arc<AtomicBool>)>,
    pub pending: HashSet<Uuid>,
}

impl Roster {
    /// Promotes any entries whose write has been acked by the I/O layer.
    pub fn settle(&mut self) {
        let (done, still_waiting): (Vec<_>, Vec<_>) =
            self.waiting_for.drain(..).partition(|(_, flag)| flag.load(Ordering::Relaxed));
        for (uuid, _) in done {
            self.known.insert(uuid);
        }
        self.waiting_for = still_waiting;
    }
}

/// A 46-slot inventory: 0 crafting output, 1-4 crafting input, 5-8 armor,
/// 9-35 main, 36-44 hotbar, 45 offhand.
pub struct Inventory {
    pub slots: [Option<ItemStack>; 46],
}

impl Inventory {
    pub fn new() -> Self {
        Self { slots: [None; 46] }
    }

    pub fn get(&self, index: usize) -> Option<ItemStack> {
        self.slots.get(index).copied().flatten()
    }

    pub fn set(&mut self, index: usize, item: Option<ItemStack>) {
        if index < self.slots.len() {
            self.slots[index] = item;
        }
    }
}

impl Default for Inventory {
    fn default() -> Self {
        Self::new()
    }
}

/// The Player-specific extension record.
pub struct PlayerData {
    pub profile: GameProfile,
    pub view_distance: u8,
    pub skin_mask: u8,
    pub main_hand: i32,
    pub flying: bool,
    pub sprinting: bool,
    pub inventory: Inventory,
    /// Hotbar index 0-8; held slot is `36 + held_item_index`.
    pub held_item_index: u8,
    pub known_chunks: HashSet<ChunkPos>,
    pub known_entities: HashSet<i32>,
    pub roster: Roster,
    pub last_keep_alive: Instant,
    pub pending_keep_alive: Option<i64>,
    pub ping_millis: i32,
    pub ping_changed: bool,
    pub chunk_x: i32,
    pub chunk_z: i32,
    pub queues: Arc<PlayerQueues>,
    pub outbound: mpsc::UnboundedSender<SendItem>,
    /// Set for exactly the tick the player is admitted; cleared at cleanup.
    pub joined: bool,
    pub alive: Arc<AtomicBool>,
}

impl PlayerData {
    /// `HeldItemIndex` maps to inventory slot `36 + held_item_index`.
    pub fn held_item_slot(&self) -> usize {
        36 + self.held_item_index as usize
    }

    /// Equipment[0] always mirrors the held hotbar slot.
    pub fn sync_held_equipment(entity: &mut Entity) {
        let slot = entity.player().held_item_slot();
        let item = entity.player().inventory.get(slot);
        if entity.equipment[0] != item {
            entity.equipment[0] = item;
            entity.dirty.equipment_changed |= 0x01;
        }
    }
}

/// A single player, owned exclusively by the tick loop while held there.
pub struct Player {
    pub entity: Entity,
    pub action_queue: VecDeque<Action>,
}

impl Player {
    pub fn new(entity: Entity) -> Self {
        Self { entity, action_queue: VecDeque::new() }
    }

    /// Drains the Change queue, applying each mutation in submission order
    /// `Moved` signals the caller to update the R-tree key.
    pub fn apply_pending_mutations(&mut self) -> bool {
        let queues = self.entity.player().queues.clone();
        let mutations = queues.drain_change();
        let mut moved = false;
        for m in mutations {
            match m {
                Mutation::Move(x, y, z, on_ground) => {
                    self.entity.prev_pos = self.entity.pos;
                    self.entity.pos = Vec3d::new(x, y, z);
                    self.entity.on_ground = on_ground;
                    self.entity.dirty.moved = true;
                    moved = true;
                }
                Mutation::LookAt(yaw, pitch) => {
                    self.entity.yaw = yaw;
                    self.entity.pitch = pitch;
                    self.entity.head_yaw = yaw;
                    self.entity.dirty.rotated = true;
                }
                Mutation::SetView(d) => self.entity.player_mut().view_distance = d,
                Mutation::SetSkinMask(mask) => {
                    self.entity.player_mut().skin_mask = mask;
                    self.entity.dirty.metadata_changed = true;
                }
                Mutation::SetMainHand(hand) => self.entity.player_mut().main_hand = hand,
                Mutation::SetFlying(flying) => self.entity.player_mut().flying = flying,
                Mutation::Pose(pose) => {
                    self.entity.pose = pose;
                    self.entity.dirty.metadata_changed = true;
                }
                Mutation::SetSprinting(sprinting) => {
                    self.entity.player_mut().sprinting = sprinting;
                    self.entity.flags.set(EntityFlags::SPRINTING, sprinting);
                    self.entity.dirty.metadata_changed = true;
                }
                Mutation::HeldItem(idx) => {
                    self.entity.player_mut().held_item_index = idx;
                    PlayerData::sync_held_equipment(&mut self.entity);
                }
                Mutation::InventorySet(slot, item) => {
                    self.entity.player_mut().inventory.set(slot, item);
                    if (36..45).contains(&slot) {
                        PlayerData::sync_held_equipment(&mut self.entity);
                    }
                }
                Mutation::PingSample(nanos) => {
                    self.entity.player_mut().ping_millis = (nanos / 1_000_000) as i32;
                    self.entity.player_mut().ping_changed = true;
                }
                Mutation::Animation(id) => {
                    self.entity.dirty.animation = Some(id);
                }
            }
        }
        moved
    }

    /// Drains the Action queue (Dig/Place), returning the actions for the
    /// tick-objects step to process against the world.
    pub fn drain_actions(&mut self) -> Vec<Action> {
        let queues = self.entity.player().queues.clone();
        self.action_queue.extend(queues.drain_actions());
        std::mem::take(&mut self.action_queue).into_iter().collect()
    }
}

/// EID-indexed slab of players, avoiding both an ECS world and a HashMap
/// keyed by an opaque handle — entities are addressed by their own EID.
#[derive(Default)]
pub struct PlayerSlab {
    players: HashMap<i32, Player>,
}

impl PlayerSlab {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, player: Player) {
        self.players.insert(player.entity.eid, player);
    }

    pub fn remove(&mut self, eid: i32) -> Option<Player> {
        self.players.remove(&eid)
    }

    pub fn get(&self, eid: i32) -> Option<&Player> {
        self.players.get(&eid)
    }

    pub fn get_mut(&mut self, eid: i32) -> Option<&mut Player> {
        self.players.get_mut(&eid)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&i32, &Player)> {
        self.players.iter()
    }

    pub fn iter_mut(&mut self) -> impl Iterator<Item = (&i32, &mut Player)> {
        self.players.iter_mut()
    }

    pub fn len(&self) -> usize {
        self.players.len()
    }

    pub fn is_empty(&self) -> bool {
        self.players.is_empty()
    }

    /// Every eid except `exclude`, for broadcast fan-out.
    pub fn eids_except(&self, exclude: i32) -> Vec<i32> {
        self.players.keys().copied().filter(|&e| e != exclude).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn make_player(eid: i32) -> Player {
        let (tx, _rx) = mpsc::unbounded_channel();
        let data = PlayerData {
            profile: GameProfile { uuid: Uuid::nil(), name: "test".into() },
            view_distance: 8,
            skin_mask: 0,
            main_hand: 1,
            flying: false,
            sprinting: false,
            inventory: Inventory::new(),
            held_item_index: 0,
            known_chunks: HashSet::new(),
            known_entities: HashSet::new(),
            roster: Roster::default(),
            last_keep_alive: Instant::now(),
            pending_keep_alive: None,
            ping_millis: 0,
            ping_changed: false,
            chunk_x: 0,
            chunk_z: 0,
            queues: Arc::new(PlayerQueues::default()),
            outbound: tx,
            joined: true,
            alive: Arc::new(AtomicBool::new(true)),
        };
        let entity = Entity::new_player(eid, Uuid::nil(), Vec3d::new(8.5, 62.0, 8.5), data);
        Player::new(entity)
    }

    #[test]
    fn mutations_apply_in_submission_order() {
        let mut player = make_player(1);
        let queues = player.entity.player().queues.clone();
        queues.push_change(Mutation::Move(1.0, 62.0, 1.0, true));
        queues.push_change(Mutation::LookAt(90.0, 0.0));
        queues.push_change(Mutation::Move(2.0, 62.0, 2.0, true));
        let moved = player.apply_pending_mutations();
        assert!(moved);
        assert_eq!(player.entity.pos, Vec3d::new(2.0, 62.0, 2.0));
        assert_eq!(player.entity.yaw, 90.0);
    }

    #[test]
    fn animation_mutation_sets_dirty_animation_without_touching_main_hand() {
        let mut player = make_player(1);
        let original_hand = player.entity.player().main_hand;
        let queues = player.entity.player().queues.clone();
        queues.push_change(Mutation::Animation(3));
        player.apply_pending_mutations();
        assert_eq!(player.entity.dirty.animation, Some(3));
        assert_eq!(player.entity.player().main_hand, original_hand);
    }

    #[test]
    fn held_item_change_mirrors_equipment_slot_zero() {
        let mut player = make_player(1);
        let queues = player.entity.player().queues.clone();
        let stone = Some(ItemStack::new(1, 1));
        queues.push_change(Mutation::InventorySet(36, stone));
        player.apply_pending_mutations();
        assert_eq!(player.entity.equipment[0], stone);
        assert_eq!(player.entity.dirty.equipment_changed, 0x01);
    }

    #[test]
    fn creative_inventory_set_on_non_hotbar_slot_does_not_touch_equipment() {
        let mut player = make_player(1);
        let queues = player.entity.player().queues.clone();
        queues.push_change(Mutation::InventorySet(10, Some(ItemStack::new(1, 1))));
        player.apply_pending_mutations();
        assert_eq!(player.entity.equipment[0], None);
    }

    #[test]
    fn actions_drain_in_order() {
        let mut player = make_player(1);
        let queues = player.entity.player().queues.clone();
        queues.push_action(Action::Dig { position: Position::new(8, 62, 8), face: Face::Top });
        queues.push_action(Action::Place { position: Position::new(8, 63, 8), face: Face::Top });
        let actions = player.drain_actions();
        assert_eq!(actions.len(), 2);
        assert!(matches!(actions[0], Action::Dig { .. }));
        assert!(matches!(actions[1], Action::Place { .. }));
    }

    #[test]
    fn roster_settle_promotes_acked_entries_to_known() {
        let mut player = make_player(1);
        let flag = Arc::new(AtomicBool::new(false));
        player.entity.player_mut().roster.waiting_for.push((Uuid::nil(), flag.clone()));
        player.entity.player_mut().roster.settle();
        assert!(player.entity.player().roster.known.is_empty());
        flag.store(true, Ordering::Relaxed);
        player.entity.player_mut().roster.settle();
        assert!(player.entity.player().roster.known.contains(&Uuid::nil()));
        assert!(player.entity.player().roster.waiting_for.is_empty());
    }

    #[test]
    fn slab_excludes_given_eid_from_broadcast_list() {
        let mut slab = PlayerSlab::new();
        slab.insert(make_player(1));
        slab.insert(make_player(2));
        slab.insert(make_player(3));
        let mut others = slab.eids_except(2);
        others.sort();
        assert_eq!(others, vec![1, 3]);
    }
}
