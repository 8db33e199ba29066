//! On-disk rendering of engine state for the shell adapter
//!
//! Layout under the root:
//!
//! ```text
//! station/<room>/README            room description
//! station/<room>/<item>            0755 stub holding the item description
//! station/<room>/<exit> -> ../<to> symlink per visible exit
//! station/inventory/<item>         held items
//! ```
//!
//! The tree is a view. The engine stays the source of truth and
//! [`Projection::verify`] fails loudly when they disagree.

use std::collections::{BTreeMap, BTreeSet};
use std::fs;
use std::os::unix::fs::{PermissionsExt, symlink};
use std::path::{Path, PathBuf};
use tempfile::TempDir;
use tracing::debug;
use walkdir::WalkDir;

use super::InterfaceError;
use crate::world::Engine;

pub const STATION_DIR: &str = "station";
pub const INVENTORY_DIR: &str = "inventory";
pub const README: &str = "README";

/// What a single directory entry should be
#[derive(Debug, Clone, PartialEq, Eq)]
enum Entry {
    Readme(String),
    Item(String),
    Exit(String),
}

/// Kind of a listed entry, as `ls -F` would mark it
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntryKind {
    File,
    Executable,
    Directory,
}

pub struct Projection {
    root: PathBuf,
    temp: Option<TempDir>,
}

fn io_err(path: &Path) -> impl FnOnce(std::io::Error) -> InterfaceError + '_ {
    move |source| InterfaceError::Io {
        path: path.to_path_buf(),
        source,
    }
}

impl Projection {
    /// Private disposable directory, removed on release
    pub fn temporary(engine: &Engine) -> Result<Self, InterfaceError> {
        let temp = tempfile::Builder::new()
            .prefix("adventbench-")
            .tempdir()
            .map_err(io_err(Path::new("adventbench-*")))?;
        debug!(path = %temp.path().display(), "Projection::temporary: called");
        let mut projection = Self {
            root: temp.path().to_path_buf(),
            temp: Some(temp),
        };
        projection.reset(engine)?;
        Ok(projection)
    }

    /// Projection at a fixed path that outlives the process
    pub fn at(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            temp: None,
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn station_dir(&self) -> PathBuf {
        self.root.join(STATION_DIR)
    }

    pub fn room_dir(&self, room: &str) -> PathBuf {
        self.station_dir().join(room)
    }

    pub fn inventory_dir(&self) -> PathBuf {
        self.station_dir().join(INVENTORY_DIR)
    }

    /// Wipe the station tree and render it from scratch
    pub fn reset(&mut self, engine: &Engine) -> Result<(), InterfaceError> {
        let station = self.station_dir();
        debug!(path = %station.display(), "reset: called");
        if station.exists() {
            fs::remove_dir_all(&station).map_err(io_err(&station))?;
        }
        fs::create_dir_all(&station).map_err(io_err(&station))?;
        self.sync(engine)
    }

    /// Bring the tree in line with the engine, touching only what changed
    pub fn sync(&self, engine: &Engine) -> Result<(), InterfaceError> {
        debug!(room = %engine.room(), "sync: called");
        for room in engine.world().rooms.keys() {
            let mut wanted = BTreeMap::new();
            wanted.insert(README.to_string(), Entry::Readme(engine.describe(room)?));
            for item in engine.visible_items_of(room) {
                wanted.insert(item.id.clone(), Entry::Item(item.description.clone()));
            }
            for (direction, to) in engine.visible_exits_of(room) {
                wanted.insert(direction, Entry::Exit(to));
            }
            sync_dir(&self.room_dir(room), &wanted)?;
        }

        let held = engine
            .inventory()
            .into_iter()
            .map(|item| (item.id.clone(), Entry::Item(item.description.clone())))
            .collect();
        sync_dir(&self.inventory_dir(), &held)
    }

    /// Compare the current room and inventory listings with the engine view
    ///
    /// Read-only: a mismatch is reported, never patched.
    pub fn verify(&self, engine: &Engine) -> Result<(), InterfaceError> {
        let room = engine.room();
        let mut expected: BTreeSet<String> = BTreeSet::from([README.to_string()]);
        expected.extend(engine.visible_items().iter().map(|i| i.id.clone()));
        let exits = engine.visible_exits();
        expected.extend(exits.iter().map(|(dir, _)| dir.clone()));

        let actual: BTreeSet<String> = self.list(&self.room_dir(room))?.into_iter().map(|(n, _)| n).collect();
        if actual != expected {
            return Err(InterfaceError::Inconsistent(format!(
                "room '{}' lists {:?}, engine has {:?}",
                room, actual, expected
            )));
        }

        let readme = self.room_dir(room).join(README);
        if self.read(&readme)? != engine.describe(room)? {
            return Err(InterfaceError::Inconsistent(format!("README of '{}' differs from the engine", room)));
        }

        for (direction, to) in &exits {
            let link = self.room_dir(room).join(direction);
            let target = fs::read_link(&link).map_err(io_err(&link))?;
            if target != Path::new("..").join(to) {
                return Err(InterfaceError::Inconsistent(format!(
                    "exit '{}' in '{}' points at {}, engine says {}",
                    direction,
                    room,
                    target.display(),
                    to
                )));
            }
        }

        let held: BTreeSet<String> = engine.inventory().iter().map(|i| i.id.clone()).collect();
        let listed: BTreeSet<String> = self.list(&self.inventory_dir())?.into_iter().map(|(n, _)| n).collect();
        if held != listed {
            return Err(InterfaceError::Inconsistent(format!(
                "inventory lists {:?}, engine holds {:?}",
                listed, held
            )));
        }
        Ok(())
    }

    /// Directory entries sorted by name
    pub fn list(&self, dir: &Path) -> Result<Vec<(String, EntryKind)>, InterfaceError> {
        let mut entries = Vec::new();
        for entry in fs::read_dir(dir).map_err(io_err(dir))? {
            let entry = entry.map_err(io_err(dir))?;
            let file_type = entry.file_type().map_err(io_err(dir))?;
            let name = entry.file_name().to_string_lossy().to_string();
            let kind = if file_type.is_symlink() || file_type.is_dir() {
                EntryKind::Directory
            } else {
                let mode = entry.metadata().map_err(io_err(dir))?.permissions().mode();
                if mode & 0o111 != 0 {
                    EntryKind::Executable
                } else {
                    EntryKind::File
                }
            };
            entries.push((name, kind));
        }
        entries.sort_by(|a, b| a.0.cmp(&b.0));
        Ok(entries)
    }

    pub fn read(&self, path: &Path) -> Result<String, InterfaceError> {
        fs::read_to_string(path).map_err(io_err(path))
    }

    /// Every path under the station with file contents, for comparing trees
    pub fn snapshot(&self) -> Result<Vec<(String, String)>, InterfaceError> {
        let station = self.station_dir();
        let mut out = Vec::new();
        for entry in WalkDir::new(&station).follow_links(false).sort_by_file_name() {
            let entry = entry.map_err(|e| InterfaceError::Io {
                path: station.clone(),
                source: e.into(),
            })?;
            let rel = entry
                .path()
                .strip_prefix(&station)
                .unwrap_or(entry.path())
                .to_string_lossy()
                .to_string();
            let content = if entry.path_is_symlink() {
                format!("-> {}", fs::read_link(entry.path()).map_err(io_err(entry.path()))?.display())
            } else if entry.file_type().is_file() {
                self.read(entry.path())?
            } else {
                String::new()
            };
            out.push((rel, content));
        }
        Ok(out)
    }

    /// Remove a temporary projection; fixed-path projections are left alone
    pub fn release(&mut self) -> Result<(), InterfaceError> {
        if let Some(temp) = self.temp.take() {
            let path = temp.path().to_path_buf();
            debug!(path = %path.display(), "release: removing projection");
            temp.close().map_err(io_err(&path))?;
        }
        Ok(())
    }
}

fn sync_dir(dir: &Path, wanted: &BTreeMap<String, Entry>) -> Result<(), InterfaceError> {
    fs::create_dir_all(dir).map_err(io_err(dir))?;

    let mut present = BTreeSet::new();
    for entry in fs::read_dir(dir).map_err(io_err(dir))? {
        let entry = entry.map_err(io_err(dir))?;
        let name = entry.file_name().to_string_lossy().to_string();
        if wanted.contains_key(&name) {
            present.insert(name);
        } else {
            let path = entry.path();
            debug!(path = %path.display(), "sync_dir: removing stale entry");
            fs::remove_file(&path).map_err(io_err(&path))?;
        }
    }

    for (name, entry) in wanted {
        let path = dir.join(name);
        match entry {
            Entry::Readme(text) => {
                let current = fs::read_to_string(&path).ok();
                if current.as_deref() != Some(text.as_str()) {
                    fs::write(&path, text).map_err(io_err(&path))?;
                }
            }
            Entry::Item(description) => {
                if !present.contains(name) {
                    fs::write(&path, format!("{}\n", description)).map_err(io_err(&path))?;
                    fs::set_permissions(&path, fs::Permissions::from_mode(0o755)).map_err(io_err(&path))?;
                }
            }
            Entry::Exit(to) => {
                if !present.contains(name) {
                    symlink(Path::new("..").join(to), &path).map_err(io_err(&path))?;
                }
            }
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_initial_layout() {
        let engine = Engine::station();
        let projection = Projection::temporary(&engine).unwrap();

        let airlock = projection.list(&projection.room_dir("airlock")).unwrap();
        assert_eq!(
            airlock,
            vec![
                ("README".to_string(), EntryKind::File),
                ("north".to_string(), EntryKind::Directory),
            ]
        );

        let engine_room = projection.list(&projection.room_dir("engine_room")).unwrap();
        let names: Vec<&str> = engine_room.iter().map(|(n, _)| n.as_str()).collect();
        assert_eq!(names, vec!["README", "flashlight", "west"]);
        assert_eq!(engine_room[1].1, EntryKind::Executable);

        assert!(projection.list(&projection.inventory_dir()).unwrap().is_empty());
        projection.verify(&engine).unwrap();
    }

    #[test]
    fn test_sync_follows_engine() {
        let mut engine = Engine::station();
        let projection = Projection::temporary(&engine).unwrap();
        engine.move_to("north").unwrap();
        engine.move_to("east").unwrap();
        engine.take("flashlight").unwrap();
        engine.use_item("flashlight").unwrap();
        projection.sync(&engine).unwrap();
        projection.verify(&engine).unwrap();

        let names: Vec<String> = projection
            .list(&projection.room_dir("engine_room"))
            .unwrap()
            .into_iter()
            .map(|(n, _)| n)
            .collect();
        assert_eq!(names, vec!["README", "down", "keycard", "west"]);
        let readme = projection.read(&projection.room_dir("engine_room").join(README)).unwrap();
        assert!(readme.contains("glinting keycard"));
        assert!(projection.inventory_dir().join("flashlight").exists());
    }

    #[test]
    fn test_verify_detects_divergence() {
        let mut engine = Engine::station();
        let projection = Projection::temporary(&engine).unwrap();
        engine.move_to("north").unwrap();
        engine.move_to("east").unwrap();
        engine.take("flashlight").unwrap();

        // projection not synced: flashlight still lies in the room
        let err = projection.verify(&engine).unwrap_err();
        assert!(matches!(err, InterfaceError::Inconsistent(_)));
    }

    #[test]
    fn test_verify_detects_tampering() {
        let engine = Engine::station();
        let projection = Projection::temporary(&engine).unwrap();
        fs::write(projection.room_dir("airlock").join("wrench"), "a wrench").unwrap();
        assert!(matches!(projection.verify(&engine), Err(InterfaceError::Inconsistent(_))));
    }

    #[test]
    fn test_verify_detects_edited_readme() {
        let engine = Engine::station();
        let projection = Projection::temporary(&engine).unwrap();
        fs::write(projection.room_dir("airlock").join(README), "A warp drive hums here.").unwrap();
        assert!(matches!(projection.verify(&engine), Err(InterfaceError::Inconsistent(_))));
    }

    #[test]
    fn test_verify_leaves_tree_untouched() {
        let engine = Engine::station();
        let projection = Projection::temporary(&engine).unwrap();
        fs::remove_file(projection.room_dir("airlock").join("north")).unwrap();
        let before = projection.snapshot().unwrap();
        assert!(projection.verify(&engine).is_err());
        assert_eq!(projection.snapshot().unwrap(), before);
    }

    #[test]
    fn test_reset_is_idempotent() {
        let temp = tempdir().unwrap();
        let pristine = Engine::station();

        let mut once = Projection::at(temp.path());
        once.reset(&pristine).unwrap();
        let after_one = once.snapshot().unwrap();

        let mut played = Engine::station();
        played.move_to("north").unwrap();
        played.move_to("west").unwrap();
        played.take("crew_log").unwrap();
        once.sync(&played).unwrap();
        assert_ne!(once.snapshot().unwrap(), after_one);

        once.reset(&pristine).unwrap();
        once.reset(&pristine).unwrap();
        assert_eq!(once.snapshot().unwrap(), after_one);
    }

    #[test]
    fn test_release_removes_directory() {
        let engine = Engine::station();
        let mut projection = Projection::temporary(&engine).unwrap();
        let root = projection.root().to_path_buf();
        assert!(root.exists());
        projection.release().unwrap();
        projection.release().unwrap();
        assert!(!root.exists());
    }

    #[test]
    fn test_fixed_projection_survives_release() {
        let temp = tempdir().unwrap();
        let mut projection = Projection::at(temp.path());
        projection.reset(&Engine::station()).unwrap();
        projection.release().unwrap();
        assert!(projection.station_dir().join("airlock").join(README).exists());
    }
}
