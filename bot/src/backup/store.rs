use std::fs::{self, OpenOptions};
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};

use rand::Rng;
use rand::distributions::Alphanumeric;
use tracing::{debug, info, warn};

use super::model::Snapshot;
use crate::error::StoreError;

/// Length of generated backup IDs.
pub const ID_LENGTH: usize = 8;

/// Attempts at finding an unused ID before giving up.
const MAX_ID_ATTEMPTS: usize = 16;

/// JSON snapshot files on local disk, one `<id>.json` per backup.
#[derive(Debug, Clone)]
pub struct BackupStore {
    dir: PathBuf,
}

/// A short lowercase alphanumeric ID.
pub fn generate_id() -> String {
    rand::thread_rng()
        .sample_iter(&Alphanumeric)
        .take(ID_LENGTH)
        .map(|b| (b as char).to_ascii_lowercase())
        .collect()
}

/// IDs are used as file stems, so anything but ASCII alphanumerics is rejected.
fn is_valid_id(id: &str) -> bool {
    !id.is_empty() && id.chars().all(|c| c.is_ascii_alphanumeric())
}

impl BackupStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Create the store directory if it is missing. Called once at startup.
    pub fn ensure_dir(&self) -> Result<(), StoreError> {
        if !self.dir.exists() {
            fs::create_dir_all(&self.dir).map_err(|e| StoreError::io(&self.dir, e))?;
            info!(dir = %self.dir.display(), "created backup directory");
        }
        Ok(())
    }

    fn path_for(&self, id: &str) -> PathBuf {
        self.dir.join(format!("{id}.json"))
    }

    /// Assign a fresh ID to `snapshot` and write it. Returns the ID.
    pub fn create(&self, mut snapshot: Snapshot) -> Result<String, StoreError> {
        for _ in 0..MAX_ID_ATTEMPTS {
            let id = generate_id();
            let path = self.path_for(&id);
            snapshot.id = id.clone();
            let json = serde_json::to_string_pretty(&snapshot)?;
            let mut file = match OpenOptions::new().write(true).create_new(true).open(&path) {
                Ok(file) => file,
                Err(e) if e.kind() == ErrorKind::AlreadyExists => {
                    warn!(%id, "backup id collision, regenerating");
                    continue;
                }
                Err(e) => return Err(StoreError::io(path, e)),
            };

            if let Err(e) = file.write_all(json.as_bytes()) {
                let _ = fs::remove_file(&path);
                return Err(StoreError::io(path, e));
            }

            info!(backup_id = %id, guild_id = %snapshot.guild_id, "backup written");
            return Ok(id);
        }

        Err(StoreError::io(
            &self.dir,
            std::io::Error::new(ErrorKind::AlreadyExists, "no unused backup id found"),
        ))
    }

    /// Whether a backup file exists for `id`.
    pub fn exists(&self, id: &str) -> bool {
        is_valid_id(id) && self.path_for(id).is_file()
    }

    pub fn load(&self, id: &str) -> Result<Snapshot, StoreError> {
        if !is_valid_id(id) {
            return Err(StoreError::NotFound(id.to_string()));
        }
        let path = self.path_for(id);
        let contents = match fs::read_to_string(&path) {
            Ok(c) => c,
            Err(e) if e.kind() == ErrorKind::NotFound => {
                return Err(StoreError::NotFound(id.to_string()));
            }
            Err(e) => return Err(StoreError::io(path, e)),
        };
        serde_json::from_str(&contents).map_err(|source| StoreError::Parse { path, source })
    }

    /// Every snapshot in the store, in directory order.
    ///
    /// A single unreadable or corrupt file fails the whole listing.
    pub fn list(&self) -> Result<Vec<Snapshot>, StoreError> {
        let entries = fs::read_dir(&self.dir).map_err(|e| StoreError::io(&self.dir, e))?;

        let mut snapshots = Vec::new();
        for entry in entries {
            let path = entry.map_err(|e| StoreError::io(&self.dir, e))?.path();
            if path.extension().and_then(|e| e.to_str()) != Some("json") {
                continue;
            }
            let contents = fs::read_to_string(&path).map_err(|e| StoreError::io(&path, e))?;
            let snapshot = serde_json::from_str(&contents)
                .map_err(|source| StoreError::Parse { path, source })?;
            snapshots.push(snapshot);
        }

        debug!(count = snapshots.len(), "listed backups");
        Ok(snapshots)
    }

    /// Remove a backup. Returns false if it did not exist.
    pub fn delete(&self, id: &str) -> Result<bool, StoreError> {
        if !is_valid_id(id) {
            return Ok(false);
        }
        let path = self.path_for(id);
        match fs::remove_file(&path) {
            Ok(()) => {
                info!(backup_id = %id, "backup deleted");
                Ok(true)
            }
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(false),
            Err(e) => Err(StoreError::io(path, e)),
        }
    }
}
