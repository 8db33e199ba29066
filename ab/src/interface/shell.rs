//! Shell-style adapter: one bash-like command per turn over the projection

use async_trait::async_trait;
use regex::Regex;
use runledger::Mode;
use std::fs;
use std::path::PathBuf;
use std::sync::LazyLock;
use tracing::debug;

use super::projection::{EntryKind, Projection, README};
use super::{Applied, Interface, InterfaceError, RawAction};
use crate::llm::{CompletionResponse, ToolDefinition};
use crate::world::{Engine, EngineError, ItemKind};

const SYSTEM_PROMPT: &str = "You are exploring a damaged space station in a text adventure. \
The station is a directory tree: every room is a directory, exits are subdirectories named by \
direction (north/, east/, down/ ...) and items are executable files.

Commands:
  ls                     list exits, items and the README
  cat README             read the room description
  cat <item>             examine an item
  cd <exit>              move through an exit
  ./<item>               take an item, or use it if you carry it or it is fixed in place
  ls ../inventory        list what you carry
  ../inventory/<item>    use a carried item

Reply with exactly one command per message and nothing else. No explanations, no markdown, \
no chained commands. Your goal is to get the station's distress beacon working. \
If you decide to stop, reply GIVE_UP.";

pub const EMPTY_COMMAND: &str = "Invalid command. Send exactly one bash command, nothing else.";

const NO_OUTPUT: &str = "(no output)";

const INVENTORY_PREFIX: &str = "../inventory/";

static SHELL_SYNTAX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r##"[;&|<>`$(){}\[\]*?!~\\'"#]"##).expect("invalid shell syntax regex"));

/// A command line that fits the grammar
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Command<'a> {
    List,
    ListInventory,
    Cat(&'a str),
    Cd(&'a str),
    Exec(&'a str),
    ExecHeld(&'a str),
}

/// Parse one command line; `Err` carries the bash-like error to show
fn parse<'a>(line: &'a str) -> Result<Command<'a>, String> {
    let line = line.trim();
    if line.is_empty() || line.contains('\n') {
        return Err(EMPTY_COMMAND.to_string());
    }
    if SHELL_SYNTAX.is_match(line) {
        return Err(format!(
            "bash: unsupported syntax in '{}'. Send one plain command without pipes, chaining or quoting.",
            line
        ));
    }

    let words: Vec<&str> = line.split_whitespace().collect();
    match words.as_slice() {
        ["ls"] | ["ls", "." | "./"] => Ok(Command::List),
        ["ls", "../inventory" | "../inventory/"] => Ok(Command::ListInventory),
        ["ls", path] => Err(format!("ls: cannot access '{}': No such file or directory", path)),
        ["cat"] => Err("cat: missing file operand".to_string()),
        ["cat", path] => Ok(Command::Cat(*path)),
        ["cd"] => Err("bash: cd: missing directory".to_string()),
        ["cd", path] => Ok(Command::Cd(*path)),
        ["ls" | "cat" | "cd", ..] => Err(format!("bash: {}: too many arguments", words[0])),
        [path] => {
            let path: &'a str = *path;
            if let Some(name) = path.strip_prefix(INVENTORY_PREFIX) {
                Ok(Command::ExecHeld(name))
            } else if let Some(name) = path.strip_prefix("./") {
                Ok(Command::Exec(name))
            } else {
                Err(format!("bash: {}: command not found", path))
            }
        }
        [cmd, ..] => Err(format!("bash: {}: command not found", cmd)),
        [] => Err(EMPTY_COMMAND.to_string()),
    }
}

/// A plain file name with no path components
fn plain_name(name: &str) -> Option<&str> {
    (!name.is_empty() && !name.contains('/') && name != "." && name != "..").then_some(name)
}

pub struct ShellInterface {
    engine: Engine,
    projection: Projection,
}

impl ShellInterface {
    pub fn new(engine: Engine) -> Result<Self, InterfaceError> {
        debug!("ShellInterface::new: called");
        let projection = Projection::temporary(&engine)?;
        Ok(Self { engine, projection })
    }

    pub fn projection(&self) -> &Projection {
        &self.projection
    }

    fn cwd(&self) -> PathBuf {
        self.projection.room_dir(self.engine.room())
    }

    /// What sits at `name` in the current room directory
    fn entry_here(&self, name: &str) -> Option<EntryKind> {
        let meta = fs::symlink_metadata(self.cwd().join(name)).ok()?;
        Some(if meta.file_type().is_symlink() || meta.is_dir() {
            EntryKind::Directory
        } else if name == README {
            EntryKind::File
        } else {
            EntryKind::Executable
        })
    }

    /// Render an applied mutation; the tree was verified before the command ran
    fn refresh(&self) -> Result<(), InterfaceError> {
        self.projection.sync(&self.engine)?;
        self.projection.verify(&self.engine)
    }

    /// Run an engine mutation and keep the tree in step
    fn mutate(
        &mut self,
        op: impl FnOnce(&mut Engine) -> Result<String, EngineError>,
    ) -> Result<Applied, InterfaceError> {
        match op(&mut self.engine) {
            Ok(observation) => {
                self.refresh()?;
                Ok(Applied::valid(observation))
            }
            Err(EngineError::UnknownRoom(room)) => Err(InterfaceError::Inconsistent(format!("unknown room {}", room))),
            Err(refusal) => Ok(Applied::invalid(refusal.to_string())),
        }
    }

    fn list(&self, dir: PathBuf) -> Result<Applied, InterfaceError> {
        let entries = self.projection.list(&dir)?;
        if entries.is_empty() {
            return Ok(Applied::valid(NO_OUTPUT));
        }
        let names: Vec<String> = entries
            .into_iter()
            .map(|(name, kind)| match kind {
                EntryKind::Directory => format!("{}/", name),
                EntryKind::Executable => format!("{}*", name),
                EntryKind::File => name,
            })
            .collect();
        Ok(Applied::valid(names.join("  ")))
    }

    fn cat(&self, path: &str) -> Result<Applied, InterfaceError> {
        let missing = || Ok(Applied::invalid(format!("cat: {}: No such file or directory", path)));

        if let Some(name) = path.strip_prefix(INVENTORY_PREFIX).and_then(plain_name) {
            let file = self.projection.inventory_dir().join(name);
            if !file.is_file() {
                return missing();
            }
            return Ok(Applied::valid(self.projection.read(&file)?.trim_end().to_string()));
        }

        let Some(name) = plain_name(path.strip_prefix("./").unwrap_or(path)) else {
            return missing();
        };
        match self.entry_here(name) {
            Some(EntryKind::Directory) => Ok(Applied::invalid(format!("cat: {}: Is a directory", path))),
            Some(_) => Ok(Applied::valid(
                self.projection.read(&self.cwd().join(name))?.trim_end().to_string(),
            )),
            None => missing(),
        }
    }

    fn cd(&mut self, path: &str) -> Result<Applied, InterfaceError> {
        let target = path.strip_prefix("./").unwrap_or(path);
        let target = target.strip_suffix('/').unwrap_or(target);
        let Some(direction) = plain_name(target) else {
            return Ok(Applied::invalid(format!("bash: cd: {}: No such file or directory", path)));
        };
        match self.entry_here(direction) {
            Some(EntryKind::Directory) => {
                let direction = direction.to_string();
                self.mutate(|engine| engine.move_to(&direction))
            }
            Some(_) => Ok(Applied::invalid(format!("bash: cd: {}: Not a directory", path))),
            None => Ok(Applied::invalid(format!("bash: cd: {}: No such file or directory", path))),
        }
    }

    fn exec(&mut self, name: &str, typed: &str) -> Result<Applied, InterfaceError> {
        let Some(name) = plain_name(name) else {
            return Ok(Applied::invalid(format!("bash: {}: No such file or directory", typed)));
        };
        let item_id = name.to_string();
        match self.entry_here(name) {
            Some(EntryKind::Directory) => Ok(Applied::invalid(format!("bash: {}: Is a directory", typed))),
            Some(EntryKind::File) => Ok(Applied::invalid(format!("bash: {}: Permission denied", typed))),
            Some(EntryKind::Executable) => {
                let kind = self
                    .engine
                    .world()
                    .item(name)
                    .map(|item| item.kind)
                    .ok_or_else(|| InterfaceError::Inconsistent(format!("file {} has no item", name)))?;
                match kind {
                    ItemKind::Pickable => self.mutate(|engine| engine.take(&item_id)),
                    ItemKind::InPlace => self.mutate(|engine| engine.use_item(&item_id)),
                }
            }
            None if self.engine.state().inventory.contains(name) => self.mutate(|engine| engine.use_item(&item_id)),
            None => Ok(Applied::invalid(format!("bash: {}: No such file or directory", typed))),
        }
    }

    fn exec_held(&mut self, name: &str, typed: &str) -> Result<Applied, InterfaceError> {
        let held = plain_name(name).is_some_and(|n| self.projection.inventory_dir().join(n).is_file());
        if !held {
            return Ok(Applied::invalid(format!("bash: {}: No such file or directory", typed)));
        }
        let item_id = name.to_string();
        self.mutate(|engine| engine.use_item(&item_id))
    }

    async fn run(&mut self, line: &str) -> Result<Applied, InterfaceError> {
        debug!(%line, room = %self.engine.room(), "run: called");
        let command = match parse(line) {
            Ok(command) => command,
            Err(message) => return Ok(Applied::invalid(message)),
        };
        let typed = line.trim();
        match command {
            Command::List => self.list(self.cwd()),
            Command::ListInventory => self.list(self.projection.inventory_dir()),
            Command::Cat(path) => self.cat(path),
            Command::Cd(path) => self.cd(path),
            Command::Exec(name) => self.exec(name, typed),
            Command::ExecHeld(name) => self.exec_held(name, typed),
        }
    }
}

#[async_trait]
impl Interface for ShellInterface {
    fn mode(&self) -> Mode {
        Mode::Shell
    }

    fn system_prompt(&self) -> &'static str {
        SYSTEM_PROMPT
    }

    fn tools(&self) -> Vec<ToolDefinition> {
        Vec::new()
    }

    fn extract(&self, response: &CompletionResponse) -> RawAction {
        match response.content.as_deref().map(str::trim) {
            Some(text) if !text.is_empty() => RawAction::Command(text.to_string()),
            _ => RawAction::Empty,
        }
    }

    async fn apply(&mut self, action: &RawAction) -> Result<Applied, InterfaceError> {
        // a drifted tree is never repaired here; sync only follows engine mutations
        self.projection.verify(&self.engine)?;
        match action {
            RawAction::Command(line) => self.run(line).await,
            RawAction::Empty => Ok(Applied::invalid(EMPTY_COMMAND)),
            other => Ok(Applied::invalid(format!(
                "bash: {}: command not found",
                other.describe().split_whitespace().next().unwrap_or_default()
            ))),
        }
    }

    fn engine(&self) -> &Engine {
        &self.engine
    }

    fn release(&mut self) -> Result<(), InterfaceError> {
        self.projection.release()
    }
}
