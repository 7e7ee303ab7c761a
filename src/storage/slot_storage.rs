use std::{
    collections::HashMap,
    io,
    ops::Deref,
    path::{Path, PathBuf},
    sync::Mutex,
};

use tracing::debug;

use crate::fs::operations::{read_if_exists, write_atomically};

/// Interface for abstracting the local key-value store holding persisted state.
#[cfg_attr(test, mockall::automock)]
pub trait SlotStorage: Send {
    /// Returns `None` when nothing was ever written into the slot.
    fn read_slot(&self, key: &str) -> io::Result<Option<Vec<u8>>>;

    /// Replaces the slot contents.
    fn write_slot(&self, key: &str, data: &[u8]) -> io::Result<()>;
}

impl<T: Deref + Send> SlotStorage for T
where
    T::Target: SlotStorage,
{
    fn read_slot(&self, key: &str) -> io::Result<Option<Vec<u8>>> {
        self.deref().read_slot(key)
    }

    fn write_slot(&self, key: &str, data: &[u8]) -> io::Result<()> {
        self.deref().write_slot(key, data)
    }
}

/// Stores every slot as `<key>.json` inside a directory.
pub struct FileSlotStorage {
    slot_dir: PathBuf,
}

impl FileSlotStorage {
    pub fn new(slot_dir: PathBuf) -> Result<Self, io::Error> {
        std::fs::create_dir_all(&slot_dir)?;

        Ok(Self { slot_dir })
    }

    pub fn dir(&self) -> &Path {
        &self.slot_dir
    }

    fn slot_path(&self, key: &str) -> PathBuf {
        self.slot_dir.join(format!("{key}.json"))
    }

    fn lock_path(&self, key: &str) -> PathBuf {
        self.slot_dir.join(format!("{key}.lock"))
    }
}

impl SlotStorage for FileSlotStorage {
    fn read_slot(&self, key: &str) -> io::Result<Option<Vec<u8>>> {
        let path = self.slot_path(key);
        debug!("Reading slot {path:?}");
        read_if_exists(&path)
    }

    fn write_slot(&self, key: &str, data: &[u8]) -> io::Result<()> {
        let path = self.slot_path(key);
        debug!("Writing {} bytes into slot {path:?}", data.len());
        write_atomically(&path, &self.lock_path(key), data)
    }
}

/// Slots kept only for the lifetime of the process.
#[derive(Default)]
pub struct MemorySlotStorage {
    slots: Mutex<HashMap<String, Vec<u8>>>,
}

impl MemorySlotStorage {
    pub fn new() -> Self {
        Self::default()
    }

    fn slots(&self) -> io::Result<std::sync::MutexGuard<'_, HashMap<String, Vec<u8>>>> {
        self.slots
            .lock()
            .map_err(|_| io::Error::other("memory slot storage is poisoned"))
    }
}

impl SlotStorage for MemorySlotStorage {
    fn read_slot(&self, key: &str) -> io::Result<Option<Vec<u8>>> {
        Ok(self.slots()?.get(key).cloned())
    }

    fn write_slot(&self, key: &str, data: &[u8]) -> io::Result<()> {
        self.slots()?.insert(key.to_string(), data.to_vec());
        Ok(())
    }
}
