use std::collections::HashMap;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use tracing::{debug, info};

use crate::config::GameVariant;

use super::atomic_io::write_save_atomic;
use super::SaveError;

pub const DEFAULT_SAVE_NAME: &str = "grim.sav";
pub const DEVICE_RESET_SLOT: &str = "device_reset";

/// Where one save or restore reads and writes its bytes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SaveTarget {
    File(PathBuf),
    Memory(String),
}

impl SaveTarget {
    pub fn describe(&self) -> String {
        match self {
            SaveTarget::File(path) => path.display().to_string(),
            SaveTarget::Memory(slot) => format!("memory:{slot}"),
        }
    }
}

/// Save files on disk plus named in-memory slots.
#[derive(Debug)]
pub struct SaveStorage {
    save_dir: PathBuf,
    memory: HashMap<String, Vec<u8>>,
}

impl SaveStorage {
    pub fn new(save_dir: impl Into<PathBuf>) -> Self {
        Self {
            save_dir: save_dir.into(),
            memory: HashMap::new(),
        }
    }

    pub fn save_dir(&self) -> &Path {
        &self.save_dir
    }

    pub fn file_target(&self, variant: GameVariant, requested: &str) -> SaveTarget {
        SaveTarget::File(self.save_dir.join(resolve_save_name(variant, requested)))
    }

    pub fn slot_target(&self, variant: GameVariant, slot: u32) -> SaveTarget {
        SaveTarget::File(self.save_dir.join(slot_file_name(variant, slot)))
    }

    /// Fails before any bytes are produced when the target cannot be written.
    pub fn open_for_saving(&self, target: &SaveTarget) -> Result<(), SaveError> {
        if let SaveTarget::File(path) = target {
            if let Some(parent) = path.parent() {
                fs::create_dir_all(parent).map_err(|source| SaveError::Io {
                    path: parent.to_path_buf(),
                    source,
                })?;
            }
            if path.is_dir() {
                return Err(SaveError::Io {
                    path: path.clone(),
                    source: io::Error::new(io::ErrorKind::Other, "save target is a directory"),
                });
            }
        }
        Ok(())
    }

    pub fn commit(&mut self, target: &SaveTarget, bytes: Vec<u8>) -> Result<(), SaveError> {
        let len = bytes.len();
        match target {
            SaveTarget::File(path) => {
                write_save_atomic(path, &bytes).map_err(|source| SaveError::Io {
                    path: path.clone(),
                    source,
                })?;
            }
            SaveTarget::Memory(slot) => {
                self.memory.insert(slot.clone(), bytes);
            }
        }
        info!(target = %target.describe(), bytes = len, "save_written");
        Ok(())
    }

    /// Returns `Ok(None)` when the target does not exist.
    pub fn open_for_loading(&self, target: &SaveTarget) -> Result<Option<Vec<u8>>, SaveError> {
        match target {
            SaveTarget::File(path) => match fs::read(path) {
                Ok(bytes) => Ok(Some(bytes)),
                Err(error) if error.kind() == io::ErrorKind::NotFound => {
                    debug!(path = %path.display(), "save_file_missing");
                    Ok(None)
                }
                Err(source) => Err(SaveError::Io {
                    path: path.clone(),
                    source,
                }),
            },
            SaveTarget::Memory(slot) => Ok(self.memory.get(slot).cloned()),
        }
    }

    pub fn take_memory_slot(&mut self, slot: &str) -> Result<Vec<u8>, SaveError> {
        self.memory
            .remove(slot)
            .ok_or_else(|| SaveError::MissingSlot(slot.to_string()))
    }
}

pub fn slot_file_name(variant: GameVariant, slot: u32) -> String {
    match variant {
        GameVariant::Grim => format!("grim{slot:02}.gsv"),
        GameVariant::Monkey4 => format!("efmi{slot:03}.gsv"),
    }
}

/// Maps a script-requested save name to a file name inside the save directory.
pub fn resolve_save_name(variant: GameVariant, requested: &str) -> String {
    if requested.is_empty() {
        return DEFAULT_SAVE_NAME.to_string();
    }
    match variant {
        GameVariant::Grim => requested.to_string(),
        GameVariant::Monkey4 => requested
            .rsplit(['/', '\\'])
            .next()
            .filter(|name| !name.is_empty())
            .unwrap_or(DEFAULT_SAVE_NAME)
            .to_string(),
    }
}

#[cfg(test)]
mod tests {
    use tempfile::TempDir;

    use super::*;

    #[test]
    fn slot_names_follow_variant_scheme() {
        assert_eq!(slot_file_name(GameVariant::Grim, 3), "grim03.gsv");
        assert_eq!(slot_file_name(GameVariant::Monkey4, 12), "efmi012.gsv");
    }

    #[test]
    fn empty_name_falls_back_to_default_save() {
        assert_eq!(resolve_save_name(GameVariant::Grim, ""), DEFAULT_SAVE_NAME);
        assert_eq!(resolve_save_name(GameVariant::Monkey4, ""), DEFAULT_SAVE_NAME);
    }

    #[test]
    fn monkey4_keeps_only_last_path_component() {
        assert_eq!(
            resolve_save_name(GameVariant::Monkey4, "Saves\\efmi004.gsv"),
            "efmi004.gsv"
        );
        assert_eq!(
            resolve_save_name(GameVariant::Grim, "grim04.gsv"),
            "grim04.gsv"
        );
    }

    #[test]
    fn missing_file_loads_as_none() {
        let temp = TempDir::new().expect("temp");
        let storage = SaveStorage::new(temp.path());
        let target = storage.slot_target(GameVariant::Grim, 1);
        assert!(storage
            .open_for_loading(&target)
            .expect("load")
            .is_none());
    }

    #[test]
    fn file_and_memory_targets_round_trip_bytes() {
        let temp = TempDir::new().expect("temp");
        let mut storage = SaveStorage::new(temp.path().join("saves"));
        let file = storage.slot_target(GameVariant::Grim, 2);
        let memory = SaveTarget::Memory(DEVICE_RESET_SLOT.to_string());

        storage.open_for_saving(&file).expect("open");
        storage.commit(&file, vec![1, 2, 3]).expect("file commit");
        storage.commit(&memory, vec![4, 5]).expect("memory commit");

        assert_eq!(
            storage.open_for_loading(&file).expect("file load"),
            Some(vec![1, 2, 3])
        );
        assert_eq!(
            storage.take_memory_slot(DEVICE_RESET_SLOT).expect("slot"),
            vec![4, 5]
        );
        assert!(matches!(
            storage.take_memory_slot(DEVICE_RESET_SLOT),
            Err(SaveError::MissingSlot(_))
        ));
    }
}
