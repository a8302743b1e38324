//! Minimal hand-authored block/item tables for the flat generator and the
//! light engine. Only the handful of blocks the flat world and placement
//! handler actually touch are listed; this is not a full registry dump.

/// One block state entry: name, default state id, opacity for the light
/// engine (`filter_light`, 0 = fully transparent, 15 = fully opaque) and
/// whether the block itself emits light (`emit_light`).
struct BlockState {
    name: &'static str,
    state_id: i32,
    filter_light: u8,
    emit_light: u8,
}

const BLOCKS: &[BlockState] = &[
    BlockState { name: "air", state_id: 0, filter_light: 0, emit_light: 0 },
    BlockState { name: "stone", state_id: 1, filter_light: 15, emit_light: 0 },
    BlockState { name: "grass_block", state_id: 9, filter_light: 15, emit_light: 0 },
    BlockState { name: "dirt", state_id: 10, filter_light: 15, emit_light: 0 },
    BlockState { name: "bedrock", state_id: 33, filter_light: 15, emit_light: 0 },
    BlockState { name: "glass", state_id: 231, filter_light: 0, emit_light: 0 },
    BlockState { name: "torch", state_id: 50, filter_light: 0, emit_light: 14 },
    BlockState { name: "water", state_id: 34, filter_light: 2, emit_light: 0 },
];

struct ItemEntry {
    name: &'static str,
    item_id: i32,
    stack_size: i8,
    /// Block state this item places, if it is a block item.
    places_state: Option<i32>,
}

const ITEMS: &[ItemEntry] = &[
    ItemEntry { name: "air", item_id: 0, stack_size: 64, places_state: Some(0) },
    ItemEntry { name: "stone", item_id: 1, stack_size: 64, places_state: Some(1) },
    ItemEntry { name: "grass_block", item_id: 9, stack_size: 64, places_state: Some(9) },
    ItemEntry { name: "dirt", item_id: 10, stack_size: 64, places_state: Some(10) },
    ItemEntry { name: "glass", item_id: 231, stack_size: 64, places_state: Some(231) },
    ItemEntry { name: "torch", item_id: 50, stack_size: 64, places_state: Some(50) },
];

pub fn block_name_to_default_state(name: &str) -> Option<i32> {
    BLOCKS.iter().find(|b| b.name == name).map(|b| b.state_id)
}

pub fn block_state_to_name(state_id: i32) -> Option<&'static str> {
    BLOCKS.iter().find(|b| b.state_id == state_id).map(|b| b.name)
}

/// (filterLight, emitLight) for the given block state, used by the light
/// engine's BFS step. Unknown states are treated as fully opaque, non-emitting.
pub fn block_light_properties(state_id: i32) -> (u8, u8) {
    BLOCKS
        .iter()
        .find(|b| b.state_id == state_id)
        .map(|b| (b.filter_light, b.emit_light))
        .unwrap_or((15, 0))
}

pub fn item_name_to_id(name: &str) -> Option<i32> {
    ITEMS.iter().find(|i| i.name == name).map(|i| i.item_id)
}

pub fn item_id_to_name(item_id: i32) -> Option<&'static str> {
    ITEMS.iter().find(|i| i.item_id == item_id).map(|i| i.name)
}

pub fn item_id_to_stack_size(item_id: i32) -> Option<i8> {
    ITEMS.iter().find(|i| i.item_id == item_id).map(|i| i.stack_size)
}

/// The block state id a block item places when used, or None if the item
/// isn't a placeable block.
pub fn item_id_to_block_state(item_id: i32) -> Option<i32> {
    ITEMS.iter().find(|i| i.item_id == item_id).and_then(|i| i.places_state)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn block_lookups_roundtrip() {
        assert_eq!(block_name_to_default_state("stone"), Some(1));
        assert_eq!(block_state_to_name(1), Some("stone"));
        assert_eq!(block_name_to_default_state("nonexistent"), None);
    }

    #[test]
    fn light_properties_known_and_unknown() {
        assert_eq!(block_light_properties(0), (0, 0));
        assert_eq!(block_light_properties(1), (15, 0));
        assert_eq!(block_light_properties(50), (0, 14));
        assert_eq!(block_light_properties(9999), (15, 0));
    }

    #[test]
    fn item_to_block_placement() {
        let stone_item = item_name_to_id("stone").unwrap();
        assert_eq!(item_id_to_block_state(stone_item), Some(1));
        assert_eq!(item_id_to_stack_size(stone_item), Some(64));
    }
}
