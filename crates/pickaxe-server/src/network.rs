//! Connection lifecycle: handshake → status/login → hand-off to the tick
//! loop. Once a socket reaches Play, this module only decodes packets into
//! `Mutation`/`Action` queue entries — it never mutates player state
//! directly, and the tick loop owns everything past admission.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use anyhow::{anyhow, Result};
use bytes::{Bytes, BytesMut};
use pickaxe_protocol_core::{Connection, ConnectionState, ConnectionWriter, InternalPacket, ProtocolAdapter};
use pickaxe_protocol_v578::V578Adapter;
use pickaxe_types::{Face, GameProfile, TextComponent};
use tokio::net::TcpStream;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::config::ServerConfig;
use crate::entity::{Action, Mutation, PlayerQueues, SendItem};

const PROTOCOL_VERSION: i32 = 578;

/// A fully-admitted connection, handed from the network task to the tick
/// thread's join queue.
pub struct JoinRequest {
    pub profile: GameProfile,
    pub view_distance: u8,
    pub queues: Arc<PlayerQueues>,
    pub outbound: mpsc::UnboundedSender<SendItem>,
    pub alive: Arc<AtomicBool>,
}

/// Accepts inbound TCP connections and spawns one task per connection.
pub async fn accept_loop(
    listener: tokio::net::TcpListener,
    config: Arc<ServerConfig>,
    join_tx: mpsc::UnboundedSender<JoinRequest>,
    player_count: Arc<std::sync::atomic::AtomicUsize>,
) {
    loop {
        match listener.accept().await {
            Ok((socket, peer)) => {
                info!("new connection from {}", peer);
                let config = config.clone();
                let join_tx = join_tx.clone();
                let player_count = player_count.clone();
                tokio::spawn(async move {
                    handle_connection(socket, config, join_tx, player_count).await;
                });
            }
            Err(e) => warn!("accept failed: {}", e),
        }
    }
}

async fn handle_connection(
    stream: TcpStream,
    config: Arc<ServerConfig>,
    join_tx: mpsc::UnboundedSender<JoinRequest>,
    player_count: Arc<std::sync::atomic::AtomicUsize>,
) {
    let peer = stream.peer_addr().ok();
    let mut conn = Connection::new(stream);
    let adapter = V578Adapter::new();
    if let Err(e) = handle_connection_inner(&mut conn, &adapter, &config, &join_tx, &player_count).await {
        debug!("connection {:?} ended: {}", peer, e);
    }
}

async fn handle_connection_inner(
    conn: &mut Connection,
    adapter: &V578Adapter,
    config: &ServerConfig,
    join_tx: &mpsc::UnboundedSender<JoinRequest>,
    player_count: &Arc<std::sync::atomic::AtomicUsize>,
) -> Result<()> {
    let (id, mut data) = conn.read_packet().await?;
    let packet = adapter.decode_packet(ConnectionState::Handshaking, id, &mut data)?;

    let next_state = match packet {
        InternalPacket::Handshake { protocol_version, next_state, .. } => {
            if protocol_version != PROTOCOL_VERSION {
                send(conn, adapter, ConnectionState::Login, &InternalPacket::Disconnect {
                    reason: TextComponent::plain("Invalid protocol version"),
                })
                .await?;
                return Ok(());
            }
            next_state
        }
        _ => return Err(anyhow!("expected handshake")),
    };

    match ConnectionState::from_handshake_next(next_state) {
        Some(ConnectionState::Status) => handle_status(conn, adapter, config, player_count).await,
        Some(ConnectionState::Login) => {
            let profile = handle_login(conn, adapter, config).await?;
            handle_play(conn, adapter, profile, config, join_tx).await
        }
        _ => Err(anyhow!("invalid next state: {}", next_state)),
    }
}

async fn handle_status(
    conn: &mut Connection,
    adapter: &V578Adapter,
    config: &ServerConfig,
    player_count: &Arc<std::sync::atomic::AtomicUsize>,
) -> Result<()> {
    loop {
        let (id, mut data) = conn.read_packet().await?;
        match adapter.decode_packet(ConnectionState::Status, id, &mut data)? {
            InternalPacket::StatusRequest => {
                let online = player_count.load(Ordering::Relaxed);
                let json = format!(
                    r#"{{"version":{{"name":"1.15.2","protocol":578}},"players":{{"max":{},"online":{}}},"description":{{"text":"{}"}}}}"#,
                    config.max_players, online, config.motd
                );
                send(conn, adapter, ConnectionState::Status, &InternalPacket::StatusResponse { json }).await?;
            }
            InternalPacket::PingRequest { payload } => {
                send(conn, adapter, ConnectionState::Status, &InternalPacket::PongResponse { payload }).await?;
                return Ok(());
            }
            _ => {}
        }
    }
}

async fn handle_login(conn: &mut Connection, adapter: &V578Adapter, config: &ServerConfig) -> Result<GameProfile> {
    let (id, mut data) = conn.read_packet().await?;
    let name = match adapter.decode_packet(ConnectionState::Login, id, &mut data)? {
        InternalPacket::LoginStart { name } => name,
        _ => return Err(anyhow!("expected Login Start")),
    };

    send(conn, adapter, ConnectionState::Login, &InternalPacket::SetCompression { threshold: 128 }).await?;
    conn.enable_compression(128);

    let _ = config.online_mode; // online-mode auth is out of scope; always derive offline
    let uuid = offline_uuid(&name);
    let profile = GameProfile { uuid, name: name.clone() };

    send(conn, adapter, ConnectionState::Login, &InternalPacket::LoginSuccess { profile: profile.clone() }).await?;
    info!("{} logging in with offline uuid {}", name, uuid);
    Ok(profile)
}

/// Offline-mode UUID: MD5("OfflinePlayer:"+name) with version-3 bits stamped
/// over the hash, per the vanilla offline-mode derivation.
fn offline_uuid(name: &str) -> Uuid {
    let digest = md5::compute(format!("OfflinePlayer:{}", name));
    let mut bytes = *digest;
    bytes[6] = (bytes[6] & 0x0f) | 0x30;
    bytes[8] = (bytes[8] & 0x3f) | 0x80;
    Uuid::from_bytes(bytes)
}

async fn handle_play(
    conn: &mut Connection,
    adapter: &V578Adapter,
    profile: GameProfile,
    config: &ServerConfig,
    join_tx: &mpsc::UnboundedSender<JoinRequest>,
) -> Result<()> {
    let view_distance = (config.view_distance as u8).min(config.max_view_distance as u8);
    let queues = Arc::new(PlayerQueues::default());
    let alive = Arc::new(AtomicBool::new(true));
    let (outbound_tx, outbound_rx) = mpsc::unbounded_channel::<SendItem>();

    let connection = std::mem::replace(conn, Connection::new_dummy());
    let (mut reader, writer) = connection.into_split();

    tokio::spawn(send_task(writer, outbound_rx));

    join_tx
        .send(JoinRequest {
            profile: profile.clone(),
            view_distance,
            queues: queues.clone(),
            outbound: outbound_tx,
            alive: alive.clone(),
        })
        .map_err(|_| anyhow!("tick loop join channel closed"))?;

    let result = recv_loop(&mut reader, adapter, &queues, config.max_view_distance as u8).await;
    alive.store(false, Ordering::Relaxed);
    info!("{} disconnected", profile.name);
    result
}

async fn recv_loop(
    reader: &mut pickaxe_protocol_core::ConnectionReader,
    adapter: &V578Adapter,
    queues: &Arc<PlayerQueues>,
    max_view_distance: u8,
) -> Result<()> {
    loop {
        let (id, mut data) = reader.read_packet().await?;
        let packet = adapter.decode_packet(ConnectionState::Play, id, &mut data)?;
        dispatch_play_packet(packet, queues, max_view_distance);
    }
}

/// Decodes inbound Play packets into `Mutation`/`Action` queue entries.
/// Named packet IDs: 0x05 ClientSettings, 0x0F KeepAlive,
/// 0x11-0x14 movement/rotation, 0x19 PlayerAbilities, 0x1A PlayerDigging,
/// 0x1B EntityAction, 0x23 HeldItemChange, 0x26 CreativeInventoryAction,
/// 0x2A Animation, 0x2C PlayerBlockPlacement.
fn dispatch_play_packet(packet: InternalPacket, queues: &Arc<PlayerQueues>, max_view_distance: u8) {
    match packet {
        InternalPacket::ClientSettings { view_distance, skin_parts, main_hand, .. } => {
            let clamped = view_distance.clamp(2, max_view_distance as i8);
            queues.push_change(Mutation::SetView(clamped as u8));
            queues.push_change(Mutation::SetSkinMask(skin_parts));
            queues.push_change(Mutation::SetMainHand(main_hand));
        }
        InternalPacket::KeepAliveServerbound { id } => {
            let sent_nanos = id;
            let now_nanos = std::time::SystemTime::now()
                .duration_since(std::time::UNIX_EPOCH)
                .map(|d| d.as_nanos() as i64)
                .unwrap_or(0);
            queues.push_change(Mutation::PingSample(now_nanos - sent_nanos));
        }
        InternalPacket::PlayerPosition { x, y, z, on_ground } => {
            queues.push_change(Mutation::Move(x, y, z, on_ground));
        }
        InternalPacket::PlayerPositionAndRotation { x, y, z, yaw, pitch, on_ground } => {
            queues.push_change(Mutation::Move(x, y, z, on_ground));
            queues.push_change(Mutation::LookAt(yaw, pitch));
        }
        InternalPacket::PlayerRotation { yaw, pitch, .. } => {
            queues.push_change(Mutation::LookAt(yaw, pitch));
        }
        InternalPacket::PlayerOnGround { .. } => {}
        InternalPacket::PlayerAbilitiesServerbound { flags, .. } => {
            queues.push_change(Mutation::SetFlying(flags & 0x02 != 0));
        }
        InternalPacket::PlayerDigging { status, position, face, .. } => {
            if status == 0 {
                if let Some(face) = Face::from_id(face) {
                    queues.push_action(Action::Dig { position, face });
                }
            }
        }
        InternalPacket::EntityAction { action_id, .. } => {
            // 0=start sneak, 1=stop sneak, 3=start sprint, 4=stop sprint
            match action_id {
                3 => queues.push_change(Mutation::SetSprinting(true)),
                4 => queues.push_change(Mutation::SetSprinting(false)),
                0 => queues.push_change(Mutation::Pose(5)), // sneaking pose
                1 => queues.push_change(Mutation::Pose(0)), // standing pose
                _ => {}
            }
        }
        InternalPacket::HeldItemChange { slot } => {
            if (0..9).contains(&slot) {
                queues.push_change(Mutation::HeldItem(slot as u8));
            }
        }
        InternalPacket::CreativeInventoryAction { slot, item } => {
            if slot >= 0 {
                queues.push_change(Mutation::InventorySet(slot as usize, item));
            }
        }
        InternalPacket::AnimationServerbound { hand } => {
            // Clientbound Entity Animation ids: 0 = swing main arm, 3 = swing offhand.
            let animation_id = if hand == 0 { 0 } else { 3 };
            queues.push_change(Mutation::Animation(animation_id));
        }
        InternalPacket::PlayerBlockPlacement { position, face, .. } => {
            if let Some(face) = Face::from_id(face) {
                queues.push_action(Action::Place { position, face });
            }
        }
        InternalPacket::Unknown { packet_id, .. } => {
            debug!("unhandled play packet id=0x{:02X}", packet_id);
        }
        _ => {}
    }
}

async fn send_task(mut writer: ConnectionWriter, mut rx: mpsc::UnboundedReceiver<SendItem>) {
    while let Some(item) = rx.recv().await {
        if writer.write_packet(item.packet_id, &item.payload).await.is_err() {
            break;
        }
        if let Some(ack) = item.ack {
            let _ = ack.send(());
        }
    }
}

async fn send(conn: &mut Connection, adapter: &V578Adapter, state: ConnectionState, packet: &InternalPacket) -> Result<()> {
    let mut encoded = adapter.encode_packet(state, packet)?;
    let packet_id = pickaxe_protocol_core::read_varint(&mut encoded)?;
    conn.write_packet(packet_id, &encoded).await
}

/// Encodes a packet for the outbound queue, splitting the varint-prefixed
/// packet ID back out the way `Connection::write_packet` expects it.
pub fn encode_for_queue(adapter: &V578Adapter, packet: &InternalPacket) -> Result<(i32, Bytes)> {
    let mut encoded: BytesMut = adapter.encode_packet(ConnectionState::Play, packet)?;
    let packet_id = pickaxe_protocol_core::read_varint(&mut encoded)?;
    Ok((packet_id, encoded.freeze()))
}

