//! Puzzle world: static room/item graph and the engine that owns game state
//!
//! The graph is plain data. All state transitions go through [`Engine`];
//! neither interface adapter touches [`GameState`] directly.

use std::collections::BTreeMap;

mod engine;
pub mod station;

pub use engine::{Engine, EngineError, GameState};

pub type RoomId = String;
pub type ItemId = String;
pub type Fact = String;

/// Fact set when the flashlight lights the engine room
pub const ENGINE_ROOM_LIT: &str = "engine_room_lit";

/// Fact set when the console accepts the keycard
pub const CONSOLE_ACTIVATED: &str = "console_activated";

/// Guard on a room description variant
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Condition {
    Always,
    Fact(Fact),
    NotFact(Fact),
    Taken(ItemId),
}

/// A directed exit; hidden exits are absent from every view until the fact holds
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Exit {
    pub to: RoomId,
    pub hidden_until: Option<Fact>,
}

#[derive(Debug, Clone)]
pub struct Room {
    pub id: RoomId,
    pub name: String,
    /// First matching variant wins
    pub descriptions: Vec<(Condition, String)>,
    pub exits: BTreeMap<String, Exit>,
}

/// Whether an item moves into the inventory or is used where it stands
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ItemKind {
    Pickable,
    InPlace,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Precondition {
    InRoom(RoomId),
    Holds(ItemId),
    Fact(Fact),
    NotFact(Fact),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Effect {
    SetFact(Fact),
    Win,
}

/// One way an item can be used
///
/// `{moves}` in the narrative is replaced with the move counter.
#[derive(Debug, Clone)]
pub struct UseRule {
    pub requires: Vec<Precondition>,
    pub effects: Vec<Effect>,
    pub narrative: String,
}

#[derive(Debug, Clone)]
pub struct Item {
    pub id: ItemId,
    pub name: String,
    pub description: String,
    /// Room the item starts in
    pub home: RoomId,
    pub kind: ItemKind,
    pub hidden_until: Option<Fact>,
    /// Text shown by `read`
    pub text: Option<String>,
    /// Tried in order; the first rule whose preconditions hold applies
    pub uses: Vec<UseRule>,
    /// Shown when no rule applies
    pub refusal: String,
}

/// Complete room/item graph
#[derive(Debug, Clone)]
pub struct World {
    pub start: RoomId,
    pub rooms: BTreeMap<RoomId, Room>,
    pub items: BTreeMap<ItemId, Item>,
}

impl World {
    pub fn room(&self, id: &str) -> Option<&Room> {
        self.rooms.get(id)
    }

    pub fn item(&self, id: &str) -> Option<&Item> {
        self.items.get(id)
    }

    /// Items whose home is the given room, in id order
    pub fn items_in(&self, room: &str) -> impl Iterator<Item = &Item> {
        self.items.values().filter(move |item| item.home == room)
    }
}
