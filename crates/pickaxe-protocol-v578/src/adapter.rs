use anyhow::{bail, Result};
use bytes::{Buf, BufMut, BytesMut};
use pickaxe_protocol_core::*;

/// Protocol adapter for protocol version 578 (Minecraft Java 1.15.2).
pub struct V578Adapter;

impl V578Adapter {
    pub fn new() -> Self {
        Self
    }
}

impl Default for V578Adapter {
    fn default() -> Self {
        Self::new()
    }
}

impl ProtocolAdapter for V578Adapter {
    fn protocol_version(&self) -> i32 {
        578
    }

    fn decode_packet(
        &self,
        state: ConnectionState,
        id: i32,
        data: &mut BytesMut,
    ) -> Result<InternalPacket> {
        match state {
            ConnectionState::Handshaking => decode_handshaking(id, data),
            ConnectionState::Status => decode_status(id, data),
            ConnectionState::Login => decode_login(id, data),
            ConnectionState::Play => decode_play(id, data),
        }
    }

    fn encode_packet(&self, state: ConnectionState, packet: &InternalPacket) -> Result<BytesMut> {
        match state {
            ConnectionState::Status => encode_status(packet),
            ConnectionState::Login => encode_login(packet),
            ConnectionState::Play => encode_play(packet),
            _ => bail!("Cannot encode packets in {:?} state", state),
        }
    }
}

// === Packet ID constants ===
//
// Serverbound Play IDs are the ones spec.md names explicitly (§4.9).
// Clientbound IDs follow the 1.15.2 (protocol 578) wire layout; Chunk Data
// (0x22) and Update Light (0x25) are pinned exactly as spec.md states.

const STATUS_RESPONSE: i32 = 0x00;
const PONG_RESPONSE: i32 = 0x01;

const LOGIN_DISCONNECT: i32 = 0x00;
const LOGIN_SUCCESS: i32 = 0x02;
const SET_COMPRESSION: i32 = 0x03;

const CB_SPAWN_PLAYER: i32 = 0x05;
const CB_ENTITY_ANIMATION: i32 = 0x06;
const CB_SET_SLOT: i32 = 0x15;
const CB_BLOCK_CHANGE: i32 = 0x0B;
const CB_MULTI_BLOCK_CHANGE: i32 = 0x0F;
const CB_DISCONNECT: i32 = 0x19;
const CB_UNLOAD_CHUNK: i32 = 0x1C;
const CB_KEEP_ALIVE: i32 = 0x1F;
const CB_EFFECT: i32 = 0x20;
const CB_CHUNK_DATA: i32 = 0x22;
const CB_JOIN_GAME: i32 = 0x24;
const CB_UPDATE_LIGHT: i32 = 0x25;
const CB_ENTITY_POSITION: i32 = 0x27;
const CB_ENTITY_POSITION_AND_ROTATION: i32 = 0x28;
const CB_ENTITY_ROTATION: i32 = 0x29;
const CB_PLAYER_INFO: i32 = 0x33;
const CB_PLAYER_POSITION_AND_LOOK: i32 = 0x35;
const CB_DESTROY_ENTITIES: i32 = 0x37;
const CB_ENTITY_HEAD_LOOK: i32 = 0x3B;
const CB_ENTITY_METADATA: i32 = 0x44;
const CB_ENTITY_EQUIPMENT: i32 = 0x47;
const CB_ENTITY_TELEPORT: i32 = 0x57;

const SB_TELEPORT_CONFIRM: i32 = 0x00;
const SB_CLIENT_SETTINGS: i32 = 0x05;
const SB_KEEP_ALIVE: i32 = 0x0F;
const SB_PLAYER_POSITION: i32 = 0x11;
const SB_PLAYER_POSITION_AND_ROTATION: i32 = 0x12;
const SB_PLAYER_ROTATION: i32 = 0x13;
const SB_PLAYER_MOVEMENT: i32 = 0x14;
const SB_PLAYER_ABILITIES: i32 = 0x19;
const SB_PLAYER_DIGGING: i32 = 0x1A;
const SB_ENTITY_ACTION: i32 = 0x1B;
const SB_HELD_ITEM_CHANGE: i32 = 0x23;
const SB_CREATIVE_INVENTORY_ACTION: i32 = 0x26;
const SB_ANIMATION: i32 = 0x2A;
const SB_PLAYER_BLOCK_PLACEMENT: i32 = 0x2C;

// === Decode functions ===

fn decode_handshaking(id: i32, data: &mut BytesMut) -> Result<InternalPacket> {
    match id {
        0x00 => {
            let protocol_version = read_varint(data)?;
            let server_address = read_string(data, 255)?;
            let server_port = data.get_u16();
            let next_state = read_varint(data)?;
            Ok(InternalPacket::Handshake {
                protocol_version,
                server_address,
                server_port,
                next_state,
            })
        }
        _ => Ok(InternalPacket::Unknown { packet_id: id, data: data.to_vec() }),
    }
}

fn decode_status(id: i32, data: &mut BytesMut) -> Result<InternalPacket> {
    match id {
        0x00 => Ok(InternalPacket::StatusRequest),
        0x01 => {
            let payload = data.get_i64();
            Ok(InternalPacket::PingRequest { payload })
        }
        _ => Ok(InternalPacket::Unknown { packet_id: id, data: data.to_vec() }),
    }
}

fn decode_login(id: i32, data: &mut BytesMut) -> Result<InternalPacket> {
    match id {
        0x00 => {
            // 1.15.2 LoginStart carries only the username — no UUID field.
            let name = read_string(data, 16)?;
            Ok(InternalPacket::LoginStart { name })
        }
        _ => Ok(InternalPacket::Unknown { packet_id: id, data: data.to_vec() }),
    }
}

fn decode_play(id: i32, data: &mut BytesMut) -> Result<InternalPacket> {
    match id {
        SB_TELEPORT_CONFIRM => {
            let _teleport_id = read_varint(data)?;
            Ok(InternalPacket::Unknown { packet_id: id, data: vec![] })
        }
        SB_CLIENT_SETTINGS => {
            let locale = read_string(data, 16)?;
            let view_distance = data.get_i8();
            let chat_mode = read_varint(data)?;
            let chat_colors = data.get_u8() != 0;
            let skin_parts = data.get_u8();
            let main_hand = read_varint(data)?;
            Ok(InternalPacket::ClientSettings {
                locale,
                view_distance,
                chat_mode,
                chat_colors,
                skin_parts,
                main_hand,
            })
        }
        SB_KEEP_ALIVE => {
            let id = data.get_i64();
            Ok(InternalPacket::KeepAliveServerbound { id })
        }
        SB_PLAYER_POSITION => {
            let x = data.get_f64();
            let y = data.get_f64();
            let z = data.get_f64();
            let on_ground = data.get_u8() != 0;
            Ok(InternalPacket::PlayerPosition { x, y, z, on_ground })
        }
        SB_PLAYER_POSITION_AND_ROTATION => {
            let x = data.get_f64();
            let y = data.get_f64();
            let z = data.get_f64();
            let yaw = data.get_f32();
            let pitch = data.get_f32();
            let on_ground = data.get_u8() != 0;
            Ok(InternalPacket::PlayerPositionAndRotation { x, y, z, yaw, pitch, on_ground })
        }
        SB_PLAYER_ROTATION => {
            let yaw = data.get_f32();
            let pitch = data.get_f32();
            let on_ground = data.get_u8() != 0;
            Ok(InternalPacket::PlayerRotation { yaw, pitch, on_ground })
        }
        SB_PLAYER_MOVEMENT => {
            let on_ground = data.get_u8() != 0;
            Ok(InternalPacket::PlayerOnGround { on_ground })
        }
        SB_PLAYER_ABILITIES => {
            let flags = data.get_u8();
            let flying_speed = data.get_f32();
            let walking_speed = data.get_f32();
            Ok(InternalPacket::PlayerAbilitiesServerbound { flags, flying_speed, walking_speed })
        }
        SB_PLAYER_DIGGING => {
            let status = read_varint(data)?;
            let position = pickaxe_types::Position::unpack(data.get_u64());
            let face = data.get_u8();
            Ok(InternalPacket::PlayerDigging { status, position, face, sequence: 0 })
        }
        SB_ENTITY_ACTION => {
            let entity_id = read_varint(data)?;
            let action_id = read_varint(data)?;
            let jump_boost = read_varint(data)?;
            Ok(InternalPacket::EntityAction { entity_id, action_id, jump_boost })
        }
        SB_HELD_ITEM_CHANGE => {
            let slot = data.get_i16();
            Ok(InternalPacket::HeldItemChange { slot })
        }
        SB_CREATIVE_INVENTORY_ACTION => {
            let slot = data.get_i16();
            let item = read_slot(data)?;
            Ok(InternalPacket::CreativeInventoryAction { slot, item })
        }
        SB_ANIMATION => {
            let hand = read_varint(data)?;
            Ok(InternalPacket::AnimationServerbound { hand })
        }
        SB_PLAYER_BLOCK_PLACEMENT => {
            let hand = read_varint(data)?;
            let position = pickaxe_types::Position::unpack(data.get_u64());
            let face = read_varint(data)? as u8;
            let cursor_x = data.get_f32();
            let cursor_y = data.get_f32();
            let cursor_z = data.get_f32();
            let inside_block = data.get_u8() != 0;
            Ok(InternalPacket::PlayerBlockPlacement {
                hand,
                position,
                face,
                cursor_x,
                cursor_y,
                cursor_z,
                inside_block,
            })
        }
        _ => Ok(InternalPacket::Unknown { packet_id: id, data: data.to_vec() }),
    }
}

// === Encode functions ===

fn encode_status(packet: &InternalPacket) -> Result<BytesMut> {
    let mut buf = BytesMut::new();
    match packet {
        InternalPacket::StatusResponse { json } => {
            write_varint(&mut buf, STATUS_RESPONSE);
            write_string(&mut buf, json);
        }
        InternalPacket::PongResponse { payload } => {
            write_varint(&mut buf, PONG_RESPONSE);
            buf.put_i64(*payload);
        }
        _ => bail!("cannot encode {:?} in Status state", std::mem::discriminant(packet)),
    }
    Ok(buf)
}

fn encode_login(packet: &InternalPacket) -> Result<BytesMut> {
    let mut buf = BytesMut::new();
    match packet {
        InternalPacket::Disconnect { reason } => {
            write_varint(&mut buf, LOGIN_DISCONNECT);
            write_string(&mut buf, &reason.to_json());
        }
        InternalPacket::LoginSuccess { profile } => {
            write_varint(&mut buf, LOGIN_SUCCESS);
            // 1.15.2 sends the UUID as a dashed string, not raw bytes.
            write_string(&mut buf, &profile.uuid.hyphenated().to_string());
            write_string(&mut buf, &profile.name);
        }
        InternalPacket::SetCompression { threshold } => {
            write_varint(&mut buf, SET_COMPRESSION);
            write_varint(&mut buf, *threshold);
        }
        _ => bail!("cannot encode {:?} in Login state", std::mem::discriminant(packet)),
    }
    Ok(buf)
}

fn encode_play(packet: &InternalPacket) -> Result<BytesMut> {
    let mut buf = BytesMut::new();
    match packet {
        InternalPacket::JoinGame {
            entity_id,
            game_mode,
            dimension,
            hashed_seed,
            max_players,
            level_type,
            view_distance,
            reduced_debug_info,
            enable_respawn_screen,
        } => {
            write_varint(&mut buf, CB_JOIN_GAME);
            buf.put_i32(*entity_id);
            buf.put_u8(game_mode.id());
            buf.put_i32(*dimension);
            buf.put_i64(*hashed_seed);
            buf.put_u8(*max_players);
            write_string(&mut buf, level_type);
            write_varint(&mut buf, *view_distance);
            buf.put_u8(*reduced_debug_info as u8);
            buf.put_u8(*enable_respawn_screen as u8);
        }
        InternalPacket::PlayerPositionAndLook { position, yaw, pitch, flags, teleport_id } => {
            write_varint(&mut buf, CB_PLAYER_POSITION_AND_LOOK);
            buf.put_f64(position.x);
            buf.put_f64(position.y);
            buf.put_f64(position.z);
            buf.put_f32(*yaw);
            buf.put_f32(*pitch);
            buf.put_u8(*flags);
            write_varint(&mut buf, *teleport_id);
        }
        InternalPacket::ChunkData {
            chunk_x,
            chunk_z,
            full_chunk,
            primary_bit_mask,
            heightmaps,
            biomes,
            data,
        } => {
            write_varint(&mut buf, CB_CHUNK_DATA);
            buf.put_i32(*chunk_x);
            buf.put_i32(*chunk_z);
            buf.put_u8(*full_chunk as u8);
            write_varint(&mut buf, *primary_bit_mask);
            let mut nbt_buf = BytesMut::new();
            heightmaps.write_root_network(&mut nbt_buf);
            buf.extend_from_slice(&nbt_buf);
            if *full_chunk {
                for b in biomes {
                    buf.put_i32(*b);
                }
            }
            write_varint(&mut buf, data.len() as i32);
            buf.extend_from_slice(data);
            write_varint(&mut buf, 0); // no block entities
        }
        InternalPacket::UpdateLight { chunk_x, chunk_z, light_data } => {
            write_varint(&mut buf, CB_UPDATE_LIGHT);
            write_varint(&mut buf, *chunk_x);
            write_varint(&mut buf, *chunk_z);
            encode_light_data(&mut buf, light_data);
        }
        InternalPacket::UnloadChunk { chunk_x, chunk_z } => {
            write_varint(&mut buf, CB_UNLOAD_CHUNK);
            buf.put_i32(*chunk_x);
            buf.put_i32(*chunk_z);
        }
        InternalPacket::BlockChange { position, block_id } => {
            write_varint(&mut buf, CB_BLOCK_CHANGE);
            buf.put_u64(position.pack());
            write_varint(&mut buf, *block_id);
        }
        InternalPacket::MultiBlockChange { chunk_x, chunk_z, records } => {
            write_varint(&mut buf, CB_MULTI_BLOCK_CHANGE);
            buf.put_i32(*chunk_x);
            buf.put_i32(*chunk_z);
            write_varint(&mut buf, records.len() as i32);
            for r in records {
                buf.put_u16(r.xyz as u16);
                write_varint(&mut buf, r.block_id);
            }
        }
        InternalPacket::KeepAliveClientbound { id } => {
            write_varint(&mut buf, CB_KEEP_ALIVE);
            buf.put_i64(*id);
        }
        InternalPacket::PlayerInfo { action } => {
            write_varint(&mut buf, CB_PLAYER_INFO);
            match action {
                PlayerInfoAction::AddPlayer(entries) => {
                    write_varint(&mut buf, 0);
                    write_varint(&mut buf, entries.len() as i32);
                    for e in entries {
                        write_uuid(&mut buf, &e.uuid);
                        write_string(&mut buf, &e.name);
                        write_varint(&mut buf, 0); // no properties
                        write_varint(&mut buf, e.game_mode);
                        write_varint(&mut buf, e.ping);
                        buf.put_u8(0); // no display name
                    }
                }
                PlayerInfoAction::UpdateLatency(entries) => {
                    write_varint(&mut buf, 2);
                    write_varint(&mut buf, entries.len() as i32);
                    for (uuid, ping) in entries {
                        write_uuid(&mut buf, uuid);
                        write_varint(&mut buf, *ping);
                    }
                }
                PlayerInfoAction::RemovePlayer(uuids) => {
                    write_varint(&mut buf, 4);
                    write_varint(&mut buf, uuids.len() as i32);
                    for uuid in uuids {
                        write_uuid(&mut buf, uuid);
                    }
                }
            }
        }
        InternalPacket::SpawnPlayer { entity_id, uuid, x, y, z, yaw, pitch } => {
            write_varint(&mut buf, CB_SPAWN_PLAYER);
            write_varint(&mut buf, *entity_id);
            write_uuid(&mut buf, uuid);
            buf.put_f64(*x);
            buf.put_f64(*y);
            buf.put_f64(*z);
            buf.put_u8(*yaw);
            buf.put_u8(*pitch);
        }
        InternalPacket::EntityAnimation { entity_id, animation } => {
            write_varint(&mut buf, CB_ENTITY_ANIMATION);
            write_varint(&mut buf, *entity_id);
            buf.put_u8(*animation);
        }
        InternalPacket::EntityTeleport { entity_id, x, y, z, yaw, pitch, on_ground } => {
            write_varint(&mut buf, CB_ENTITY_TELEPORT);
            write_varint(&mut buf, *entity_id);
            buf.put_f64(*x);
            buf.put_f64(*y);
            buf.put_f64(*z);
            buf.put_u8(*yaw);
            buf.put_u8(*pitch);
            buf.put_u8(*on_ground as u8);
        }
        InternalPacket::EntityRelativeMove { entity_id, delta_x, delta_y, delta_z, on_ground } => {
            write_varint(&mut buf, CB_ENTITY_POSITION);
            write_varint(&mut buf, *entity_id);
            buf.put_i16(*delta_x);
            buf.put_i16(*delta_y);
            buf.put_i16(*delta_z);
            buf.put_u8(*on_ground as u8);
        }
        InternalPacket::EntityLookAndRelativeMove {
            entity_id,
            delta_x,
            delta_y,
            delta_z,
            yaw,
            pitch,
            on_ground,
        } => {
            write_varint(&mut buf, CB_ENTITY_POSITION_AND_ROTATION);
            write_varint(&mut buf, *entity_id);
            buf.put_i16(*delta_x);
            buf.put_i16(*delta_y);
            buf.put_i16(*delta_z);
            buf.put_u8(*yaw);
            buf.put_u8(*pitch);
            buf.put_u8(*on_ground as u8);
        }
        InternalPacket::EntityLook { entity_id, yaw, pitch, on_ground } => {
            write_varint(&mut buf, CB_ENTITY_ROTATION);
            write_varint(&mut buf, *entity_id);
            buf.put_u8(*yaw);
            buf.put_u8(*pitch);
            buf.put_u8(*on_ground as u8);
        }
        InternalPacket::EntityHeadLook { entity_id, head_yaw } => {
            write_varint(&mut buf, CB_ENTITY_HEAD_LOOK);
            write_varint(&mut buf, *entity_id);
            buf.put_u8(*head_yaw);
        }
        InternalPacket::EntityEquipment { entity_id, slot, item } => {
            write_varint(&mut buf, CB_ENTITY_EQUIPMENT);
            write_varint(&mut buf, *entity_id);
            write_varint(&mut buf, *slot);
            write_slot(&mut buf, item);
        }
        InternalPacket::EntityMetadata { entity_id, metadata } => {
            write_varint(&mut buf, CB_ENTITY_METADATA);
            write_varint(&mut buf, *entity_id);
            for entry in metadata {
                buf.put_u8(entry.index);
                write_varint(&mut buf, entry.type_id);
                buf.extend_from_slice(&entry.data);
            }
            buf.put_u8(0xFF);
        }
        InternalPacket::DestroyEntities { entity_ids } => {
            write_varint(&mut buf, CB_DESTROY_ENTITIES);
            write_varint(&mut buf, entity_ids.len() as i32);
            for id in entity_ids {
                write_varint(&mut buf, *id);
            }
        }
        InternalPacket::Effect { effect_id, position, data, disable_relative_volume } => {
            write_varint(&mut buf, CB_EFFECT);
            buf.put_i32(*effect_id);
            buf.put_u64(position.pack());
            buf.put_i32(*data);
            buf.put_u8(*disable_relative_volume as u8);
        }
        InternalPacket::SetSlot { window_id, slot, item } => {
            write_varint(&mut buf, CB_SET_SLOT);
            buf.put_i8(*window_id);
            buf.put_i16(*slot);
            write_slot(&mut buf, item);
        }
        InternalPacket::Disconnect { reason } => {
            write_varint(&mut buf, CB_DISCONNECT);
            write_string(&mut buf, &reason.to_json());
        }
        _ => bail!("cannot encode {:?} in Play state", std::mem::discriminant(packet)),
    }
    Ok(buf)
}

fn encode_light_data(buf: &mut BytesMut, light: &ChunkLightData) {
    write_varint(buf, 1);
    buf.put_i64(light.sky_light_mask);
    write_varint(buf, 1);
    buf.put_i64(light.block_light_mask);
    write_varint(buf, 1);
    buf.put_i64(light.empty_sky_light_mask);
    write_varint(buf, 1);
    buf.put_i64(light.empty_block_light_mask);
    write_varint(buf, light.sky_light_arrays.len() as i32);
    for arr in &light.sky_light_arrays {
        write_varint(buf, arr.len() as i32);
        buf.extend_from_slice(arr);
    }
    write_varint(buf, light.block_light_arrays.len() as i32);
    for arr in &light.block_light_arrays {
        write_varint(buf, arr.len() as i32);
        buf.extend_from_slice(arr);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pickaxe_types::GameProfile;
    use uuid::Uuid;

    #[test]
    fn handshake_roundtrip() {
        let mut buf = BytesMut::new();
        write_varint(&mut buf, 578);
        write_string(&mut buf, "localhost");
        buf.put_u16(25565);
        write_varint(&mut buf, 2);
        let decoded = decode_handshaking(0x00, &mut buf).unwrap();
        match decoded {
            InternalPacket::Handshake { protocol_version, next_state, .. } => {
                assert_eq!(protocol_version, 578);
                assert_eq!(next_state, 2);
            }
            _ => panic!("wrong variant"),
        }
    }

    #[test]
    fn login_success_uses_string_uuid() {
        let profile = GameProfile { uuid: Uuid::nil(), name: "Steve".into() };
        let buf = encode_login(&InternalPacket::LoginSuccess { profile }).unwrap();
        // first byte is the packet id varint (0x02), then a varint-prefixed string
        assert_eq!(buf[0], LOGIN_SUCCESS as u8);
    }
}
