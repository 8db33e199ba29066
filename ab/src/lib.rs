//! adventbench - how well do models play a text adventure through two tool styles?
//!
//! A run pairs one model with one interface over a fresh space-station
//! puzzle:
//!
//! - [`world`] holds the puzzle graph and the [`world::Engine`], the only
//!   owner of game state.
//! - [`interface`] exposes that engine as a bash-like directory tree or as a
//!   fixed set of structured tool calls.
//! - [`driver`] talks to the model one action at a time until the run wins,
//!   gives up, runs out of tokens or keeps sending invalid actions.
//! - [`recorder`] hands sealed records to the `runledger` store, which
//!   aggregates them into reports.

pub mod cli;
pub mod config;
pub mod driver;
pub mod interface;
pub mod llm;
pub mod recorder;
pub mod world;

pub use driver::{Driver, DriverConfig};
pub use interface::{Interface, create as create_interface};
pub use recorder::{Recorder, RecorderError};
pub use world::{Engine, GameState};
