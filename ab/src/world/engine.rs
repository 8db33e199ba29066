//! Engine - sole owner of a run's GameState

use std::collections::BTreeSet;
use std::sync::Arc;
use thiserror::Error;
use tracing::debug;

use super::{Condition, Effect, Fact, Item, ItemId, ItemKind, Precondition, RoomId, World};

/// Refusals; the display string is what the model is shown
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum EngineError {
    #[error("You can't go {direction}. Exits: {available}.")]
    InvalidExit { direction: String, available: String },

    #[error("There's no '{0}' here.")]
    ItemNotHere(String),

    #[error("You already have the {0}.")]
    AlreadyHeld(String),

    #[error("You don't have the {0}.")]
    ItemNotHeld(String),

    #[error("The {0} can't be picked up.")]
    NotPickable(String),

    #[error("You can't read the {0}.")]
    NotReadable(String),

    #[error("{0}")]
    Refused(String),

    #[error("No such room: {0}")]
    UnknownRoom(String),
}

/// Snapshot of a run's state
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GameState {
    pub room: RoomId,
    pub inventory: BTreeSet<ItemId>,
    pub facts: BTreeSet<Fact>,
    pub taken: BTreeSet<ItemId>,
    pub won: bool,
    /// Successful move/take/use operations
    pub moves: u32,
}

impl GameState {
    fn initial(world: &World) -> Self {
        Self {
            room: world.start.clone(),
            inventory: BTreeSet::new(),
            facts: BTreeSet::new(),
            taken: BTreeSet::new(),
            won: false,
            moves: 0,
        }
    }
}

/// Puzzle state machine for one run
///
/// Reset means dropping the engine and creating a new one.
#[derive(Debug)]
pub struct Engine {
    world: Arc<World>,
    state: GameState,
}

impl Engine {
    pub fn new(world: Arc<World>) -> Self {
        debug!(start = %world.start, "Engine::new: called");
        let state = GameState::initial(&world);
        Self { world, state }
    }

    /// Fresh engine over the space station
    pub fn station() -> Self {
        Self::new(super::station::world())
    }

    pub fn world(&self) -> &World {
        &self.world
    }

    pub fn state(&self) -> GameState {
        self.state.clone()
    }

    pub fn room(&self) -> &str {
        &self.state.room
    }

    pub fn is_won(&self) -> bool {
        self.state.won
    }

    fn has_fact(&self, fact: &str) -> bool {
        self.state.facts.contains(fact)
    }

    fn revealed(&self, hidden_until: &Option<Fact>) -> bool {
        hidden_until.as_deref().is_none_or(|fact| self.has_fact(fact))
    }

    /// Exits of a room the player can currently see, as (direction, destination)
    pub fn visible_exits_of(&self, room_id: &str) -> Vec<(String, RoomId)> {
        self.world
            .room(room_id)
            .map(|room| {
                room.exits
                    .iter()
                    .filter(|(_, exit)| self.revealed(&exit.hidden_until))
                    .map(|(dir, exit)| (dir.clone(), exit.to.clone()))
                    .collect()
            })
            .unwrap_or_default()
    }

    pub fn visible_exits(&self) -> Vec<(String, RoomId)> {
        self.visible_exits_of(&self.state.room)
    }

    /// Items lying in a room that the player can currently see
    pub fn visible_items_of(&self, room_id: &str) -> Vec<&Item> {
        self.world
            .items_in(room_id)
            .filter(|item| !self.state.taken.contains(&item.id) && self.revealed(&item.hidden_until))
            .collect()
    }

    pub fn visible_items(&self) -> Vec<&Item> {
        self.visible_items_of(&self.state.room)
    }

    /// Held items in id order
    pub fn inventory(&self) -> Vec<&Item> {
        self.state
            .inventory
            .iter()
            .filter_map(|id| self.world.item(id))
            .collect()
    }

    /// State-dependent description text of a room
    pub fn room_text(&self, room_id: &str) -> Result<String, EngineError> {
        let room = self
            .world
            .room(room_id)
            .ok_or_else(|| EngineError::UnknownRoom(room_id.to_string()))?;
        let text = room
            .descriptions
            .iter()
            .find(|(cond, _)| self.condition_holds(cond))
            .map(|(_, text)| text.clone())
            .unwrap_or_default();
        Ok(format!("{}\n\n{}", room.name, text))
    }

    fn condition_holds(&self, cond: &Condition) -> bool {
        match cond {
            Condition::Always => true,
            Condition::Fact(fact) => self.has_fact(fact),
            Condition::NotFact(fact) => !self.has_fact(fact),
            Condition::Taken(item) => self.state.taken.contains(item),
        }
    }

    /// Room description plus visible exits and items; no side effect
    pub fn describe(&self, room_id: &str) -> Result<String, EngineError> {
        debug!(%room_id, "describe: called");
        let mut out = self.room_text(room_id)?;

        let exits = self.visible_exits_of(room_id);
        let exits: Vec<&str> = exits.iter().map(|(dir, _)| dir.as_str()).collect();
        out.push_str(&format!("\n\nExits: {}.", exits.join(", ")));

        let items = self.visible_items_of(room_id);
        if !items.is_empty() {
            let names: Vec<&str> = items.iter().map(|i| i.id.as_str()).collect();
            out.push_str(&format!("\nYou see: {}.", names.join(", ")));
        }
        Ok(out)
    }

    /// Describe the current room
    pub fn look(&self) -> Result<String, EngineError> {
        self.describe(&self.state.room.clone())
    }

    /// Move through a visible exit of the current room
    pub fn move_to(&mut self, direction: &str) -> Result<String, EngineError> {
        debug!(%direction, room = %self.state.room, "move_to: called");
        let exits = self.visible_exits();
        let Some((_, to)) = exits.iter().find(|(dir, _)| dir == direction) else {
            let available: Vec<&str> = exits.iter().map(|(dir, _)| dir.as_str()).collect();
            return Err(EngineError::InvalidExit {
                direction: direction.to_string(),
                available: available.join(", "),
            });
        };

        let name = self.world.room(to).map(|r| r.name.clone()).unwrap_or_else(|| to.clone());
        self.state.room = to.clone();
        self.state.moves += 1;
        Ok(format!("You enter the {}.\n\n{}", name, self.look()?))
    }

    /// Pick up a visible item in the current room
    pub fn take(&mut self, item_id: &str) -> Result<String, EngineError> {
        debug!(%item_id, room = %self.state.room, "take: called");
        if self.state.inventory.contains(item_id) {
            return Err(EngineError::AlreadyHeld(self.display_name(item_id)));
        }

        let item = self
            .visible_items()
            .into_iter()
            .find(|item| item.id == item_id)
            .ok_or_else(|| EngineError::ItemNotHere(item_id.to_string()))?;
        if item.kind == ItemKind::InPlace {
            return Err(EngineError::NotPickable(item.name.clone()));
        }

        let name = item.name.clone();
        self.state.inventory.insert(item_id.to_string());
        self.state.taken.insert(item_id.to_string());
        self.state.moves += 1;
        Ok(format!("You pick up the {}.", name))
    }

    /// Use a held item, or an in-place item in the current room
    pub fn use_item(&mut self, item_id: &str) -> Result<String, EngineError> {
        debug!(%item_id, room = %self.state.room, "use_item: called");
        let item = self
            .world
            .item(item_id)
            .ok_or_else(|| EngineError::ItemNotHere(item_id.to_string()))?;

        match item.kind {
            ItemKind::Pickable if !self.state.inventory.contains(item_id) => {
                return Err(EngineError::ItemNotHeld(item.name.clone()));
            }
            ItemKind::InPlace if !self.visible_items().iter().any(|i| i.id == item_id) => {
                return Err(EngineError::ItemNotHere(item_id.to_string()));
            }
            _ => {}
        }

        let Some(rule) = item.uses.iter().find(|rule| rule.requires.iter().all(|p| self.holds(p))) else {
            return Err(EngineError::Refused(item.refusal.clone()));
        };
        let effects = rule.effects.clone();
        let narrative = rule.narrative.clone();

        self.state.moves += 1;
        for effect in effects {
            match effect {
                Effect::SetFact(fact) => {
                    self.state.facts.insert(fact);
                }
                Effect::Win => {
                    debug!(moves = self.state.moves, "use_item: win");
                    self.state.won = true;
                }
            }
        }
        Ok(narrative.replace("{moves}", &self.state.moves.to_string()))
    }

    fn holds(&self, precondition: &Precondition) -> bool {
        match precondition {
            Precondition::InRoom(room) => self.state.room == *room,
            Precondition::Holds(item) => self.state.inventory.contains(item),
            Precondition::Fact(fact) => self.has_fact(fact),
            Precondition::NotFact(fact) => !self.has_fact(fact),
        }
    }

    /// Description of a visible or held item; no side effect
    pub fn inspect(&self, item_id: &str) -> Result<String, EngineError> {
        let held = self.state.inventory.contains(item_id);
        let here = self.visible_items().iter().any(|i| i.id == item_id);
        match self.world.item(item_id) {
            Some(item) if held || here => Ok(item.description.clone()),
            _ => Err(EngineError::ItemNotHere(item_id.to_string())),
        }
    }

    /// Text of a held readable item; no side effect
    pub fn read(&self, item_id: &str) -> Result<String, EngineError> {
        let item = self
            .world
            .item(item_id)
            .ok_or_else(|| EngineError::ItemNotHere(item_id.to_string()))?;
        if !self.state.inventory.contains(item_id) {
            return Err(EngineError::ItemNotHeld(item.name.clone()));
        }
        item.text
            .as_ref()
            .map(|text| format!("You read the {}:\n\n{}", item.name, text))
            .ok_or_else(|| EngineError::NotReadable(item.name.clone()))
    }

    /// Inventory as narrative text
    pub fn inventory_text(&self) -> String {
        let items = self.inventory();
        if items.is_empty() {
            return "You aren't carrying anything.".to_string();
        }
        let names: Vec<&str> = items.iter().map(|i| i.id.as_str()).collect();
        format!("You are carrying: {}.", names.join(", "))
    }

    fn display_name(&self, item_id: &str) -> String {
        self.world
            .item(item_id)
            .map(|i| i.name.clone())
            .unwrap_or_else(|| item_id.to_string())
    }
}
