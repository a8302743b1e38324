use pickaxe_nbt::NbtValue;
use pickaxe_types::{GameMode, GameProfile, ItemStack, Position, TextComponent};
use uuid::Uuid;

/// Version-independent internal packet representation for protocol 578.
/// Protocol adapters convert between wire format and these.
#[derive(Debug, Clone)]
pub enum InternalPacket {
    // === Handshaking (serverbound) ===
    Handshake {
        protocol_version: i32,
        server_address: String,
        server_port: u16,
        next_state: i32,
    },

    // === Status ===
    StatusRequest,
    StatusResponse {
        json: String,
    },
    PingRequest {
        payload: i64,
    },
    PongResponse {
        payload: i64,
    },

    // === Login (serverbound) ===
    LoginStart {
        name: String,
    },

    // === Login (clientbound) ===
    SetCompression {
        threshold: i32,
    },
    LoginSuccess {
        profile: GameProfile,
    },

    // === Play (clientbound) ===
    JoinGame {
        entity_id: i32,
        game_mode: GameMode,
        dimension: i32,
        hashed_seed: i64,
        max_players: u8,
        level_type: String,
        view_distance: i32,
        reduced_debug_info: bool,
        enable_respawn_screen: bool,
    },
    PlayerPositionAndLook {
        position: pickaxe_types::Vec3d,
        yaw: f32,
        pitch: f32,
        flags: u8,
        teleport_id: i32,
    },
    ChunkData {
        chunk_x: i32,
        chunk_z: i32,
        full_chunk: bool,
        primary_bit_mask: i32,
        heightmaps: NbtValue,
        biomes: Vec<i32>,
        data: Vec<u8>,
    },
    UpdateLight {
        chunk_x: i32,
        chunk_z: i32,
        light_data: ChunkLightData,
    },
    UnloadChunk {
        chunk_x: i32,
        chunk_z: i32,
    },
    BlockChange {
        position: Position,
        block_id: i32,
    },
    MultiBlockChange {
        chunk_x: i32,
        chunk_z: i32,
        records: Vec<MultiBlockRecord>,
    },
    KeepAliveClientbound {
        id: i64,
    },
    PlayerInfo {
        action: PlayerInfoAction,
    },
    SpawnPlayer {
        entity_id: i32,
        uuid: Uuid,
        x: f64,
        y: f64,
        z: f64,
        yaw: u8,
        pitch: u8,
    },
    EntityAnimation {
        entity_id: i32,
        animation: u8,
    },
    EntityTeleport {
        entity_id: i32,
        x: f64,
        y: f64,
        z: f64,
        yaw: u8,
        pitch: u8,
        on_ground: bool,
    },
    EntityRelativeMove {
        entity_id: i32,
        delta_x: i16,
        delta_y: i16,
        delta_z: i16,
        on_ground: bool,
    },
    EntityLookAndRelativeMove {
        entity_id: i32,
        delta_x: i16,
        delta_y: i16,
        delta_z: i16,
        yaw: u8,
        pitch: u8,
        on_ground: bool,
    },
    EntityLook {
        entity_id: i32,
        yaw: u8,
        pitch: u8,
        on_ground: bool,
    },
    EntityHeadLook {
        entity_id: i32,
        head_yaw: u8,
    },
    EntityEquipment {
        entity_id: i32,
        slot: i32,
        item: Option<ItemStack>,
    },
    EntityMetadata {
        entity_id: i32,
        metadata: Vec<EntityMetadataEntry>,
    },
    DestroyEntities {
        entity_ids: Vec<i32>,
    },
    Effect {
        effect_id: i32,
        position: Position,
        data: i32,
        disable_relative_volume: bool,
    },
    SetSlot {
        window_id: i8,
        slot: i16,
        item: Option<ItemStack>,
    },

    // === Play (serverbound) ===
    ClientSettings {
        locale: String,
        view_distance: i8,
        chat_mode: i32,
        chat_colors: bool,
        skin_parts: u8,
        main_hand: i32,
    },
    KeepAliveServerbound {
        id: i64,
    },
    PlayerPosition {
        x: f64,
        y: f64,
        z: f64,
        on_ground: bool,
    },
    PlayerPositionAndRotation {
        x: f64,
        y: f64,
        z: f64,
        yaw: f32,
        pitch: f32,
        on_ground: bool,
    },
    PlayerRotation {
        yaw: f32,
        pitch: f32,
        on_ground: bool,
    },
    PlayerOnGround {
        on_ground: bool,
    },
    PlayerAbilitiesServerbound {
        flags: u8,
        flying_speed: f32,
        walking_speed: f32,
    },
    PlayerDigging {
        status: i32,
        position: Position,
        face: u8,
        sequence: i32,
    },
    EntityAction {
        entity_id: i32,
        action_id: i32,
        jump_boost: i32,
    },
    HeldItemChange {
        slot: i16,
    },
    CreativeInventoryAction {
        slot: i16,
        item: Option<ItemStack>,
    },
    AnimationServerbound {
        hand: i32,
    },
    PlayerBlockPlacement {
        hand: i32,
        position: Position,
        face: u8,
        cursor_x: f32,
        cursor_y: f32,
        cursor_z: f32,
        inside_block: bool,
    },

    // === Shared ===
    Disconnect {
        reason: TextComponent,
    },

    /// Unknown / unhandled packet — raw bytes preserved.
    Unknown {
        packet_id: i32,
        data: Vec<u8>,
    },
}

/// Player Info (0x34) action variants — unlike later protocols, 578 sends
/// one action per packet rather than a bitmask-driven union.
#[derive(Debug, Clone)]
pub enum PlayerInfoAction {
    AddPlayer(Vec<PlayerInfoEntry>),
    UpdateLatency(Vec<(Uuid, i32)>),
    RemovePlayer(Vec<Uuid>),
}

/// A single player entry for a PlayerInfo AddPlayer action.
#[derive(Debug, Clone)]
pub struct PlayerInfoEntry {
    pub uuid: Uuid,
    pub name: String,
    pub game_mode: i32,
    pub ping: i32,
}

/// A single entity metadata entry for EntityMetadata.
#[derive(Debug, Clone)]
pub struct EntityMetadataEntry {
    pub index: u8,
    pub type_id: i32,
    pub data: Vec<u8>,
}

/// One changed block within a MultiBlockChange packet's chunk section.
#[derive(Debug, Clone, Copy)]
pub struct MultiBlockRecord {
    /// Packed local x/y/z: `(x<<12)|(z<<8)|y` per the 1.15.2 wire format.
    pub xyz: i32,
    pub block_id: i32,
}

#[derive(Debug, Clone)]
pub struct ChunkLightData {
    pub sky_light_mask: i64,
    pub block_light_mask: i64,
    pub empty_sky_light_mask: i64,
    pub empty_block_light_mask: i64,
    pub sky_light_arrays: Vec<Vec<u8>>,
    pub block_light_arrays: Vec<Vec<u8>>,
}

impl Default for ChunkLightData {
    fn default() -> Self {
        Self {
            sky_light_mask: 0,
            block_light_mask: 0,
            empty_sky_light_mask: 0,
            empty_block_light_mask: 0,
            sky_light_arrays: Vec::new(),
            block_light_arrays: Vec::new(),
        }
    }
}
