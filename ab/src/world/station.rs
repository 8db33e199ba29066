//! The damaged space station puzzle
//!
//! Solution: north, east, take flashlight, use flashlight, take keycard,
//! west, north, use keycard (or use console).

use std::collections::BTreeMap;
use std::sync::{Arc, LazyLock};

use super::{
    CONSOLE_ACTIVATED, Condition, ENGINE_ROOM_LIT, Effect, Exit, Item, ItemKind, Precondition, Room, UseRule, World,
};

pub const START_ROOM: &str = "airlock";

static STATION: LazyLock<Arc<World>> = LazyLock::new(|| Arc::new(build()));

/// Shared, immutable station graph
pub fn world() -> Arc<World> {
    Arc::clone(&STATION)
}

fn exit(to: &str) -> Exit {
    Exit {
        to: to.to_string(),
        hidden_until: None,
    }
}

fn hidden_exit(to: &str, until: &str) -> Exit {
    Exit {
        to: to.to_string(),
        hidden_until: Some(until.to_string()),
    }
}

fn room(id: &str, name: &str, descriptions: Vec<(Condition, &str)>, exits: Vec<(&str, Exit)>) -> Room {
    Room {
        id: id.to_string(),
        name: name.to_string(),
        descriptions: descriptions
            .into_iter()
            .map(|(cond, text)| (cond, text.to_string()))
            .collect(),
        exits: exits.into_iter().map(|(dir, e)| (dir.to_string(), e)).collect(),
    }
}

const CREW_LOG_TEXT: &str = "CREW LOG - Day 247: Power failure hit deck 3. The captain stashed the emergency \
keycard in the engine room before the lights went out. Grab a flashlight if you head in there, \
it's pitch black.";

const WIN_NARRATIVE: &str = "You slide the keycard into the console. Screens flicker to life and the \
station's distress beacon activates. A rescue signal pulses out into deep space.\n\n\
*** YOU WIN ***\nCompleted in {moves} moves.";

fn build() -> World {
    let rooms = vec![
        room(
            "airlock",
            "Airlock",
            vec![(
                Condition::Always,
                "You are in the station's airlock. Emergency lights pulse red. The outer hatch is \
                 sealed shut with vacuum on the other side. A door leads into the corridor to the north.",
            )],
            vec![("north", exit("corridor"))],
        ),
        room(
            "corridor",
            "Corridor",
            vec![(
                Condition::Always,
                "A long metal corridor stretches before you. Sparks drip from damaged ceiling panels. \
                 Doors lead to the bridge (north), the engine room (east) and the med bay (west). \
                 The airlock is to the south.",
            )],
            vec![
                ("south", exit("airlock")),
                ("north", exit("bridge")),
                ("east", exit("engine_room")),
                ("west", exit("med_bay")),
            ],
        ),
        room(
            "bridge",
            "Bridge",
            vec![
                (
                    Condition::Fact(CONSOLE_ACTIVATED.to_string()),
                    "The bridge hums with power. The console glows and the distress beacon is transmitting. \
                     The corridor is to the south.",
                ),
                (
                    Condition::Always,
                    "The bridge is silent. A large console dominates the center of the room. Its screen is \
                     dark and it looks like it needs a keycard to activate. The corridor is to the south.",
                ),
            ],
            vec![("south", exit("corridor"))],
        ),
        room(
            "engine_room",
            "Engine Room",
            vec![
                (
                    Condition::NotFact(ENGINE_ROOM_LIT.to_string()),
                    "The engine room is pitch black. You can barely see anything and you hear the hum of \
                     dormant machinery. Near the entrance you feel something on a shelf, it might be a \
                     flashlight. The corridor is back to the west.",
                ),
                (
                    Condition::Taken("keycard".to_string()),
                    "The engine room is lit by your flashlight. The debris pile has been disturbed where you \
                     found the keycard. A floor hatch leads down. The corridor is back to the west.",
                ),
                (
                    Condition::Always,
                    "The flashlight reveals a massive engine core surrounded by catwalks. Under a pile of \
                     debris near the wall you spot a glinting keycard. A floor hatch leads down into a \
                     crawlspace. The corridor is back to the west.",
                ),
            ],
            vec![
                ("west", exit("corridor")),
                ("down", hidden_exit("crawlspace", ENGINE_ROOM_LIT)),
            ],
        ),
        room(
            "med_bay",
            "Med Bay",
            vec![
                (
                    Condition::Taken("crew_log".to_string()),
                    "A small medical bay with overturned supply carts. The counter is bare, you already \
                     took the crew log. The corridor is to the east.",
                ),
                (
                    Condition::Always,
                    "A small medical bay with overturned supply carts. A crew log sits on the counter, it \
                     might have useful information. The corridor is to the east.",
                ),
            ],
            vec![("east", exit("corridor"))],
        ),
        room(
            "crawlspace",
            "Crawlspace",
            vec![(
                Condition::Always,
                "A cramped maintenance crawlspace under the engine deck. Cables snake along the walls and \
                 condensation drips from the pipes. There is nothing useful here. The hatch leads back up.",
            )],
            vec![("up", exit("engine_room"))],
        ),
    ];

    let in_engine_room = Precondition::InRoom("engine_room".to_string());
    let items = vec![
        Item {
            id: "flashlight".to_string(),
            name: "flashlight".to_string(),
            description: "A heavy-duty flashlight. Still has battery.".to_string(),
            home: "engine_room".to_string(),
            kind: ItemKind::Pickable,
            hidden_until: None,
            text: None,
            uses: vec![
                UseRule {
                    requires: vec![in_engine_room.clone(), Precondition::NotFact(ENGINE_ROOM_LIT.to_string())],
                    effects: vec![Effect::SetFact(ENGINE_ROOM_LIT.to_string())],
                    narrative: "You switch on the flashlight. The beam cuts through the darkness. You can see \
                                the engine core now, and something glinting under a pile of debris near the \
                                wall. It looks like a keycard. A floor hatch leads down."
                        .to_string(),
                },
                UseRule {
                    requires: vec![in_engine_room, Precondition::Fact(ENGINE_ROOM_LIT.to_string())],
                    effects: vec![],
                    narrative: "The flashlight is already on. The room is lit.".to_string(),
                },
            ],
            refusal: "You wave the flashlight around. Nothing interesting here.".to_string(),
        },
        Item {
            id: "keycard".to_string(),
            name: "keycard".to_string(),
            description: "A security keycard with the captain's photo on it.".to_string(),
            home: "engine_room".to_string(),
            kind: ItemKind::Pickable,
            hidden_until: Some(ENGINE_ROOM_LIT.to_string()),
            text: None,
            uses: vec![UseRule {
                requires: vec![Precondition::InRoom("bridge".to_string())],
                effects: vec![Effect::SetFact(CONSOLE_ACTIVATED.to_string()), Effect::Win],
                narrative: WIN_NARRATIVE.to_string(),
            }],
            refusal: "There's nothing to use the keycard on here.".to_string(),
        },
        Item {
            id: "crew_log".to_string(),
            name: "crew log".to_string(),
            description: "A datapad with the last crew log entry.".to_string(),
            home: "med_bay".to_string(),
            kind: ItemKind::Pickable,
            hidden_until: None,
            text: Some(CREW_LOG_TEXT.to_string()),
            uses: vec![UseRule {
                requires: vec![],
                effects: vec![],
                narrative: format!("You read the crew log:\n\n{}", CREW_LOG_TEXT),
            }],
            refusal: "You can't figure out how to use the crew log here.".to_string(),
        },
        Item {
            id: "console".to_string(),
            name: "console".to_string(),
            description: "The bridge console. Its screen is dark and a keycard slot blinks beside it.".to_string(),
            home: "bridge".to_string(),
            kind: ItemKind::InPlace,
            hidden_until: None,
            text: None,
            uses: vec![UseRule {
                requires: vec![Precondition::Holds("keycard".to_string())],
                effects: vec![Effect::SetFact(CONSOLE_ACTIVATED.to_string()), Effect::Win],
                narrative: WIN_NARRATIVE.to_string(),
            }],
            refusal: "The console's screen is dark. It needs a keycard to activate.".to_string(),
        },
    ];

    World {
        start: START_ROOM.to_string(),
        rooms: rooms.into_iter().map(|r| (r.id.clone(), r)).collect::<BTreeMap<_, _>>(),
        items: items.into_iter().map(|i| (i.id.clone(), i)).collect(),
    }
}
