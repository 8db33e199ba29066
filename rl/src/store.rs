//! Append-only on-disk run store

use fs2::FileExt;
use serde::Serialize;
use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::record::RunRecord;

/// Errors from the run store
#[derive(Debug, Error)]
pub enum LedgerError {
    #[error("I/O error on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to serialize record: {0}")]
    Serialize(#[from] serde_json::Error),

    #[error("Record already exists: {0}")]
    Exists(PathBuf),

    #[error("Not a ledger directory: {0}")]
    NotADirectory(PathBuf),
}

impl LedgerError {
    fn io(path: &Path, source: std::io::Error) -> Self {
        Self::Io {
            path: path.to_path_buf(),
            source,
        }
    }
}

/// A record file that was excluded from loading
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LoadWarning {
    pub path: PathBuf,
    pub reason: String,
}

/// Result of scanning the ledger
#[derive(Debug, Clone, Default)]
pub struct Loaded {
    pub records: Vec<RunRecord>,
    pub warnings: Vec<LoadWarning>,
}

/// Directory of sealed run records, one JSON file per run
#[derive(Debug, Clone)]
pub struct RunStore {
    dir: PathBuf,
}

impl RunStore {
    /// Open or create a store at the given directory
    pub fn open(dir: impl AsRef<Path>) -> Result<Self, LedgerError> {
        let dir = dir.as_ref().to_path_buf();
        if dir.exists() && !dir.is_dir() {
            return Err(LedgerError::NotADirectory(dir));
        }
        fs::create_dir_all(&dir).map_err(|e| LedgerError::io(&dir, e))?;
        debug!(?dir, "Opened run store");
        Ok(Self { dir })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Persist a sealed record; never overwrites an existing file
    pub fn append(&self, record: &RunRecord) -> Result<PathBuf, LedgerError> {
        let lock_path = self.dir.join(crate::LOCK_FILE);
        let lock = OpenOptions::new()
            .create(true)
            .truncate(false)
            .write(true)
            .open(&lock_path)
            .map_err(|e| LedgerError::io(&lock_path, e))?;
        lock.lock_exclusive().map_err(|e| LedgerError::io(&lock_path, e))?;

        let result = self.write_locked(record);

        if let Err(e) = FileExt::unlock(&lock) {
            warn!(?lock_path, error = %e, "Failed to release ledger lock");
        }
        result
    }

    fn write_locked(&self, record: &RunRecord) -> Result<PathBuf, LedgerError> {
        let name = record.file_name();
        let target = self.dir.join(&name);
        if target.exists() {
            return Err(LedgerError::Exists(target));
        }

        let json = serde_json::to_string_pretty(record)?;
        let tmp = self.dir.join(format!(".{}.tmp", name));
        {
            let mut file = OpenOptions::new()
                .create_new(true)
                .write(true)
                .open(&tmp)
                .map_err(|e| LedgerError::io(&tmp, e))?;
            file.write_all(json.as_bytes()).map_err(|e| LedgerError::io(&tmp, e))?;
            file.sync_all().map_err(|e| LedgerError::io(&tmp, e))?;
        }
        fs::rename(&tmp, &target).map_err(|e| LedgerError::io(&target, e))?;

        info!(id = %record.id, path = ?target, "Appended run record");
        Ok(target)
    }

    /// Paths of every record file, sorted by name
    pub fn list(&self) -> Result<Vec<PathBuf>, LedgerError> {
        let entries = fs::read_dir(&self.dir).map_err(|e| LedgerError::io(&self.dir, e))?;
        let mut paths: Vec<PathBuf> = entries
            .filter_map(|entry| entry.ok())
            .map(|entry| entry.path())
            .filter(|path| is_record_file(path))
            .collect();
        paths.sort();
        Ok(paths)
    }

    /// Parse every record file; unreadable or malformed files become warnings
    pub fn load(&self) -> Result<Loaded, LedgerError> {
        let mut loaded = Loaded::default();

        for path in self.list()? {
            let parsed = fs::read_to_string(&path)
                .map_err(|e| e.to_string())
                .and_then(|content| serde_json::from_str::<RunRecord>(&content).map_err(|e| e.to_string()));
            match parsed {
                Ok(record) => loaded.records.push(record),
                Err(reason) => {
                    warn!(?path, %reason, "Skipping unreadable run record");
                    loaded.warnings.push(LoadWarning { path, reason });
                }
            }
        }

        debug!(
            records = loaded.records.len(),
            warnings = loaded.warnings.len(),
            "Loaded run store"
        );
        Ok(loaded)
    }
}

fn is_record_file(path: &Path) -> bool {
    let hidden = path
        .file_name()
        .and_then(|n| n.to_str())
        .is_none_or(|n| n.starts_with('.'));
    !hidden && path.is_file() && path.extension().is_some_and(|ext| ext == "json")
}
