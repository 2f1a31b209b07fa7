use std::collections::BTreeMap;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};

use game_schema::{decode_player, encode_player, PlayerId, PlayerState};
use parking_lot::RwLock;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("storage i/o failed at {path:?}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("player document {path:?} is corrupt: {source}")]
    Corrupt {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
    #[error("failed to encode player document: {0}")]
    Encode(#[from] serde_json::Error),
    #[error("storage unavailable: {0}")]
    Unavailable(String),
}

/// Persistence for player documents. Implementations must be safe to share
/// across threads; per-player exclusivity is the caller's job.
pub trait PlayerStore: Send + Sync {
    fn load_player(&self, id: PlayerId) -> Result<Option<PlayerState>, StoreError>;

    fn save_player(&self, player: &PlayerState) -> Result<(), StoreError>;

    fn list_players(&self) -> Result<Vec<PlayerId>, StoreError>;

    fn create_player(&self, id: PlayerId, now: i64) -> Result<PlayerState, StoreError> {
        let player = PlayerState::new(id, now);
        self.save_player(&player)?;
        Ok(player)
    }

    /// Durability point run by the autosave sweep.
    fn checkpoint(&self) -> Result<(), StoreError> {
        Ok(())
    }
}

/// In-process store keeping the encoded documents, so reads go through the
/// same serialisation as the file store.
#[derive(Default)]
pub struct MemoryStore {
    documents: RwLock<BTreeMap<PlayerId, Vec<u8>>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn raw_document(&self, id: PlayerId) -> Option<Vec<u8>> {
        self.documents.read().get(&id).cloned()
    }
}

impl PlayerStore for MemoryStore {
    fn load_player(&self, id: PlayerId) -> Result<Option<PlayerState>, StoreError> {
        let documents = self.documents.read();
        let Some(bytes) = documents.get(&id) else {
            return Ok(None);
        };
        decode_player(bytes)
            .map(Some)
            .map_err(|source| StoreError::Corrupt {
                path: PathBuf::from(format!("memory://{id}")),
                source,
            })
    }

    fn save_player(&self, player: &PlayerState) -> Result<(), StoreError> {
        let bytes = encode_player(player)?;
        self.documents.write().insert(player.id, bytes);
        Ok(())
    }

    fn list_players(&self) -> Result<Vec<PlayerId>, StoreError> {
        Ok(self.documents.read().keys().copied().collect())
    }
}

/// One pretty-printed JSON document per player, replaced atomically on save,
/// with rotating directory snapshots taken at each checkpoint.
pub struct JsonFileStore {
    root: PathBuf,
    backup_root: PathBuf,
    max_backups: usize,
    checkpoints: AtomicU64,
}

impl JsonFileStore {
    pub fn open(root: &Path, backup_root: &Path, max_backups: usize) -> Result<Self, StoreError> {
        for dir in [root, backup_root] {
            fs::create_dir_all(dir).map_err(|source| StoreError::Io {
                path: dir.to_path_buf(),
                source,
            })?;
        }
        Ok(Self {
            root: root.to_path_buf(),
            backup_root: backup_root.to_path_buf(),
            max_backups,
            checkpoints: AtomicU64::new(0),
        })
    }

    pub fn path_for(&self, id: PlayerId) -> PathBuf {
        self.root.join(format!("{id}.json"))
    }

    pub fn backups(&self) -> Result<Vec<PathBuf>, StoreError> {
        let mut backups = Vec::new();
        for entry in read_dir(&self.backup_root)? {
            let path = entry.path();
            let is_snapshot = path
                .file_name()
                .and_then(|name| name.to_str())
                .is_some_and(|name| name.starts_with("snapshot-"));
            if path.is_dir() && is_snapshot {
                backups.push(path);
            }
        }
        backups.sort();
        Ok(backups)
    }

    fn prune_backups(&self) -> Result<(), StoreError> {
        let backups = self.backups()?;
        let excess = backups.len().saturating_sub(self.max_backups);
        for stale in backups.into_iter().take(excess) {
            fs::remove_dir_all(&stale).map_err(|source| StoreError::Io {
                path: stale.clone(),
                source,
            })?;
        }
        Ok(())
    }
}

impl PlayerStore for JsonFileStore {
    fn load_player(&self, id: PlayerId) -> Result<Option<PlayerState>, StoreError> {
        let path = self.path_for(id);
        let bytes = match fs::read(&path) {
            Ok(bytes) => bytes,
            Err(err) if err.kind() == io::ErrorKind::NotFound => return Ok(None),
            Err(source) => return Err(StoreError::Io { path, source }),
        };
        decode_player(&bytes)
            .map(Some)
            .map_err(|source| StoreError::Corrupt { path, source })
    }

    fn save_player(&self, player: &PlayerState) -> Result<(), StoreError> {
        let bytes = encode_player(player)?;
        let path = self.path_for(player.id);
        let staging = path.with_extension("json.tmp");
        fs::write(&staging, &bytes).map_err(|source| StoreError::Io {
            path: staging.clone(),
            source,
        })?;
        fs::rename(&staging, &path).map_err(|source| StoreError::Io { path, source })
    }

    fn list_players(&self) -> Result<Vec<PlayerId>, StoreError> {
        let mut ids = Vec::new();
        for entry in read_dir(&self.root)? {
            let path = entry.path();
            if path.extension().and_then(|ext| ext.to_str()) != Some("json") {
                continue;
            }
            if let Some(id) = path
                .file_stem()
                .and_then(|stem| stem.to_str())
                .and_then(|stem| stem.parse::<u64>().ok())
            {
                ids.push(PlayerId(id));
            }
        }
        ids.sort();
        Ok(ids)
    }

    fn checkpoint(&self) -> Result<(), StoreError> {
        let serial = self.checkpoints.fetch_add(1, Ordering::Relaxed);
        let stamp = chrono::Utc::now().format("%Y%m%dT%H%M%S%3f");
        let target = self
            .backup_root
            .join(format!("snapshot-{stamp}-{serial:04}"));
        fs::create_dir_all(&target).map_err(|source| StoreError::Io {
            path: target.clone(),
            source,
        })?;

        let mut copied = 0usize;
        for id in self.list_players()? {
            let from = self.path_for(id);
            let to = target.join(format!("{id}.json"));
            fs::copy(&from, &to).map_err(|source| StoreError::Io { path: from, source })?;
            copied += 1;
        }
        self.prune_backups()?;
        tracing::info!(
            target: "tide_pet::storage",
            path = %target.display(),
            players = copied,
            "storage.checkpoint_written"
        );
        Ok(())
    }
}

fn read_dir(dir: &Path) -> Result<Vec<fs::DirEntry>, StoreError> {
    let entries = fs::read_dir(dir).map_err(|source| StoreError::Io {
        path: dir.to_path_buf(),
        source,
    })?;
    entries
        .collect::<Result<Vec<_>, _>>()
        .map_err(|source| StoreError::Io {
            path: dir.to_path_buf(),
            source,
        })
}
