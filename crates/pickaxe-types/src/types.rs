use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A block position in the world (signed x, y, z integers).
///
/// Wire form: `((x & 0x3FFFFFF) << 38) | ((z & 0x3FFFFFF) << 12) | (y & 0xFFF)`,
/// x/z are 26-bit signed, y is 12-bit signed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Position {
    pub x: i32,
    pub y: i32,
    pub z: i32,
}

impl Position {
    pub fn new(x: i32, y: i32, z: i32) -> Self {
        Self { x, y, z }
    }

    pub fn pack(&self) -> u64 {
        ((self.x as u64 & 0x3FF_FFFF) << 38)
            | ((self.z as u64 & 0x3FF_FFFF) << 12)
            | (self.y as u64 & 0xFFF)
    }

    pub fn unpack(val: u64) -> Self {
        let mut x = (val >> 38) as i32;
        let mut z = ((val >> 12) & 0x3FF_FFFF) as i32;
        let mut y = (val & 0xFFF) as i32;
        if x >= 1 << 25 {
            x -= 1 << 26;
        }
        if z >= 1 << 25 {
            z -= 1 << 26;
        }
        if y >= 1 << 11 {
            y -= 1 << 12;
        }
        Self { x, y, z }
    }

    pub fn chunk_pos(&self) -> ChunkPos {
        ChunkPos::new(self.x >> 4, self.z >> 4)
    }

    /// The neighbour one step along `face`.
    pub fn apply_face(&self, face: Face) -> Self {
        let (dx, dy, dz) = face.delta();
        Self::new(self.x + dx, self.y + dy, self.z + dz)
    }
}

/// A chunk column position.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ChunkPos {
    pub x: i32,
    pub z: i32,
}

impl ChunkPos {
    pub fn new(x: i32, z: i32) -> Self {
        Self { x, z }
    }
}

/// A 3D position with double precision (entity/player position).
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Vec3d {
    pub x: f64,
    pub y: f64,
    pub z: f64,
}

impl Vec3d {
    pub fn new(x: f64, y: f64, z: f64) -> Self {
        Self { x, y, z }
    }

    pub fn chunk_pos(&self) -> ChunkPos {
        ChunkPos::new((self.x.floor() as i32) >> 4, (self.z.floor() as i32) >> 4)
    }

    pub fn block_pos(&self) -> Position {
        Position::new(self.x.floor() as i32, self.y.floor() as i32, self.z.floor() as i32)
    }
}

/// One of the six block faces, used for placement and dig-face wire values.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum Face {
    Bottom = 0,
    Top = 1,
    North = 2,
    South = 3,
    West = 4,
    East = 5,
}

impl Face {
    pub fn from_id(id: u8) -> Option<Self> {
        Some(match id {
            0 => Face::Bottom,
            1 => Face::Top,
            2 => Face::North,
            3 => Face::South,
            4 => Face::West,
            5 => Face::East,
            _ => return None,
        })
    }

    pub fn delta(self) -> (i32, i32, i32) {
        match self {
            Face::Bottom => (0, -1, 0),
            Face::Top => (0, 1, 0),
            Face::North => (0, 0, -1),
            Face::South => (0, 0, 1),
            Face::West => (-1, 0, 0),
            Face::East => (1, 0, 0),
        }
    }
}

/// Block shape transform for placement (stairs/slabs wire encoding).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Shape {
    Straight,
    InnerLeft,
    InnerRight,
    OuterLeft,
    OuterRight,
}

/// Door/trapdoor hinge side for placement wire encoding.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Hinge {
    Left,
    Right,
}

/// A Minecraft resource identifier (e.g., "minecraft:stone").
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Identifier {
    pub namespace: String,
    pub path: String,
}

impl Identifier {
    pub fn new(namespace: impl Into<String>, path: impl Into<String>) -> Self {
        Self {
            namespace: namespace.into(),
            path: path.into(),
        }
    }

    pub fn minecraft(path: impl Into<String>) -> Self {
        Self::new("minecraft", path)
    }
}

impl std::fmt::Display for Identifier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}:{}", self.namespace, self.path)
    }
}

/// A player's game profile (UUID + name).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GameProfile {
    pub uuid: Uuid,
    pub name: String,
}

/// Text component for chat/disconnect messages (simplified JSON text).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TextComponent {
    pub text: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub color: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub bold: Option<bool>,
}

impl TextComponent {
    pub fn plain(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            color: None,
            bold: None,
        }
    }

    pub fn colored(text: impl Into<String>, color: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            color: Some(color.into()),
            bold: None,
        }
    }

    pub fn to_json(&self) -> String {
        serde_json::to_string(self).unwrap_or_else(|_| r#"{"text":""}"#.to_string())
    }
}

/// Game mode enum.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[repr(u8)]
pub enum GameMode {
    Survival = 0,
    Creative = 1,
    Adventure = 2,
    Spectator = 3,
}

impl GameMode {
    pub fn id(self) -> u8 {
        self as u8
    }
}

/// Which hand an action was performed with.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum Hand {
    Main = 0,
    Off = 1,
}

/// An item stack in an inventory slot.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ItemStack {
    pub item_id: i32,
    pub count: i8,
}

impl ItemStack {
    pub fn new(item_id: i32, count: i8) -> Self {
        Self { item_id, count }
    }
}

/// Axis-aligned bounding box, used for entity bounds and R-tree keys.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Aabb {
    pub min_x: f64,
    pub min_y: f64,
    pub min_z: f64,
    pub max_x: f64,
    pub max_y: f64,
    pub max_z: f64,
}

impl Aabb {
    /// Bounds centered on (x, z), resting on y, for an entity of the given
    /// width/height.
    pub fn centered(pos: Vec3d, width: f64, height: f64) -> Self {
        let half = width / 2.0;
        Self {
            min_x: pos.x - half,
            min_y: pos.y,
            min_z: pos.z - half,
            max_x: pos.x + half,
            max_y: pos.y + height,
            max_z: pos.z + half,
        }
    }

    /// Closed-low, open-high intersection test on all three axes.
    pub fn intersects(&self, other: &Aabb) -> bool {
        !(other.max_x <= self.min_x || other.min_x >= self.max_x)
            && !(other.max_y <= self.min_y || other.min_y >= self.max_y)
            && !(other.max_z <= self.min_z || other.min_z >= self.max_z)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn position_roundtrip() {
        let cases = [
            (0, 0, 0),
            (1, 2, 3),
            (-1, -1, -1),
            (33554431, 2047, 33554431),
            (-33554432, -2048, -33554432),
        ];
        for (x, y, z) in cases {
            let p = Position::new(x, y, z);
            assert_eq!(Position::unpack(p.pack()), p);
        }
    }

    #[test]
    fn apply_face_moves_one_block() {
        let p = Position::new(8, 62, 8);
        assert_eq!(p.apply_face(Face::Top), Position::new(8, 63, 8));
        assert_eq!(p.apply_face(Face::North), Position::new(8, 62, 7));
    }

    #[test]
    fn aabb_intersect_is_half_open() {
        let a = Aabb { min_x: 0.0, min_y: 0.0, min_z: 0.0, max_x: 1.0, max_y: 1.0, max_z: 1.0 };
        let touching = Aabb { min_x: 1.0, min_y: 0.0, min_z: 0.0, max_x: 2.0, max_y: 1.0, max_z: 1.0 };
        assert!(!a.intersects(&touching));
        let overlap = Aabb { min_x: 0.5, min_y: 0.0, min_z: 0.0, max_x: 1.5, max_y: 1.0, max_z: 1.0 };
        assert!(a.intersects(&overlap));
    }
}
