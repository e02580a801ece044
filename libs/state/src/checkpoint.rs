//! Checkpoint persistence for stage state
//!
//! One file per consumed partition holding the state snapshot and the next
//! stream offset to read. Files are written to a temp file in the same
//! directory, fsynced, then renamed over the previous checkpoint, so a crash
//! leaves either the old or the new checkpoint on disk, never a torn one.

use crate::traits::StateError;
use serde::{Deserialize, Serialize};
use std::fs;
use std::io::Write;
use std::path::PathBuf;
use tempfile::NamedTempFile;
use tracing::{debug, info};

const CHECKPOINT_MAGIC: u32 = 0x4353_4B50;
const CHECKPOINT_VERSION: u16 = 1;
const CHECKPOINT_EXTENSION: &str = "ckpt";

/// Durable progress of one partition worker
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Checkpoint {
    /// Offset of the first record not yet reflected in `state`
    pub next_offset: u64,
    /// Opaque state snapshot produced by `Stateful::snapshot`
    pub state: Vec<u8>,
}

#[derive(Serialize, Deserialize)]
struct CheckpointFile {
    magic: u32,
    version: u16,
    next_offset: u64,
    checksum: u32,
    state: Vec<u8>,
}

/// Directory of checkpoint files
#[derive(Debug, Clone)]
pub struct CheckpointStore {
    dir: PathBuf,
}

impl CheckpointStore {
    /// Open (creating if needed) a checkpoint directory
    pub fn open(dir: impl Into<PathBuf>) -> Result<Self, StateError> {
        let dir = dir.into();
        fs::create_dir_all(&dir).map_err(|e| StateError::io(&dir, e))?;
        Ok(Self { dir })
    }

    pub fn path_for(&self, name: &str) -> PathBuf {
        let file_name: String = name
            .chars()
            .map(|c| {
                if c.is_ascii_alphanumeric() || c == '-' || c == '_' {
                    c
                } else {
                    '_'
                }
            })
            .collect();
        self.dir.join(format!("{}.{}", file_name, CHECKPOINT_EXTENSION))
    }

    /// Load the checkpoint `name`; `None` when none was ever written
    pub fn load(&self, name: &str) -> Result<Option<Checkpoint>, StateError> {
        let path = self.path_for(name);
        let bytes = match fs::read(&path) {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                info!("No existing checkpoint found at {:?}", path);
                return Ok(None);
            }
            Err(e) => return Err(StateError::io(&path, e)),
        };

        let corrupt = |reason: String| StateError::Corrupt {
            path: path.display().to_string(),
            reason,
        };

        let file: CheckpointFile =
            bincode::deserialize(&bytes).map_err(|e| corrupt(e.to_string()))?;

        if file.magic != CHECKPOINT_MAGIC {
            return Err(corrupt(format!("bad magic {:#x}", file.magic)));
        }
        if file.version != CHECKPOINT_VERSION {
            return Err(corrupt(format!("unsupported version {}", file.version)));
        }
        let checksum = crc32fast::hash(&file.state);
        if checksum != file.checksum {
            return Err(corrupt(format!(
                "checksum mismatch: stored {:#x}, computed {:#x}",
                file.checksum, checksum
            )));
        }

        info!(
            "Loaded checkpoint {:?} at offset {} ({} state bytes)",
            path,
            file.next_offset,
            file.state.len()
        );
        Ok(Some(Checkpoint {
            next_offset: file.next_offset,
            state: file.state,
        }))
    }

    /// Atomically replace the checkpoint `name`
    pub fn save(&self, name: &str, checkpoint: &Checkpoint) -> Result<(), StateError> {
        let path = self.path_for(name);
        let file = CheckpointFile {
            magic: CHECKPOINT_MAGIC,
            version: CHECKPOINT_VERSION,
            next_offset: checkpoint.next_offset,
            checksum: crc32fast::hash(&checkpoint.state),
            state: checkpoint.state.clone(),
        };
        let bytes = bincode::serialize(&file).map_err(StateError::encode)?;

        let mut tmp = NamedTempFile::new_in(&self.dir).map_err(|e| StateError::io(&self.dir, e))?;
        tmp.write_all(&bytes).map_err(|e| StateError::io(&path, e))?;
        tmp.as_file()
            .sync_all()
            .map_err(|e| StateError::io(&path, e))?;
        tmp.persist(&path)
            .map_err(|e| StateError::io(&path, e.error))?;

        debug!(
            "Checkpoint {:?} written at offset {}",
            path, checkpoint.next_offset
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_missing_checkpoint_is_none() {
        let dir = tempdir().unwrap();
        let store = CheckpointStore::open(dir.path()).unwrap();
        assert_eq!(store.load("candles-trades-0").unwrap(), None);
    }

    #[test]
    fn test_save_then_load() {
        let dir = tempdir().unwrap();
        let store = CheckpointStore::open(dir.path().join("nested")).unwrap();

        let checkpoint = Checkpoint {
            next_offset: 42,
            state: vec![1, 2, 3, 4],
        };
        store.save("candles-trades-0", &checkpoint).unwrap();
        assert_eq!(store.load("candles-trades-0").unwrap(), Some(checkpoint));

        // Overwrite keeps only the latest
        let newer = Checkpoint {
            next_offset: 43,
            state: vec![9],
        };
        store.save("candles-trades-0", &newer).unwrap();
        assert_eq!(store.load("candles-trades-0").unwrap(), Some(newer));
    }

    #[test]
    fn test_names_are_sanitized() {
        let dir = tempdir().unwrap();
        let store = CheckpointStore::open(dir.path()).unwrap();
        let path = store.path_for("group/topic:1");
        assert_eq!(path.file_name().unwrap(), "group_topic_1.ckpt");
    }

    #[test]
    fn test_corrupted_state_detected() {
        let dir = tempdir().unwrap();
        let store = CheckpointStore::open(dir.path()).unwrap();
        store
            .save(
                "p0",
                &Checkpoint {
                    next_offset: 7,
                    state: vec![10, 20, 30],
                },
            )
            .unwrap();

        let path = store.path_for("p0");
        let mut bytes = fs::read(&path).unwrap();
        let last = bytes.len() - 1;
        bytes[last] ^= 0xff;
        fs::write(&path, bytes).unwrap();

        assert!(matches!(
            store.load("p0"),
            Err(StateError::Corrupt { .. })
        ));
    }

    #[test]
    fn test_truncated_file_detected() {
        let dir = tempdir().unwrap();
        let store = CheckpointStore::open(dir.path()).unwrap();
        fs::write(store.path_for("p1"), [1u8, 2, 3]).unwrap();
        assert!(matches!(
            store.load("p1"),
            Err(StateError::Corrupt { .. })
        ));
    }
}
