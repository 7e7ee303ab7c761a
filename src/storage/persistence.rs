use std::io;

use serde::{de::DeserializeOwned, Serialize};
use thiserror::Error;

use super::slot_storage::SlotStorage;

/// Slot holding the ordered habit list.
pub const HABITS_SLOT: &str = "blocks";

/// Slot holding the local date of the last day reset.
pub const LAST_RESET_SLOT: &str = "lastReset";

/// Ways a slot can fail to be saved or loaded. None of them are fatal for the application.
#[derive(Debug, Error)]
pub enum PersistenceError {
    #[error("Failed to access slot {key}: {source}")]
    Io {
        key: &'static str,
        #[source]
        source: io::Error,
    },

    #[error("Failed to encode slot {key}: {source}")]
    Encode {
        key: &'static str,
        #[source]
        source: serde_json::Error,
    },

    #[error("Failed to decode slot {key}: {source}")]
    Decode {
        key: &'static str,
        #[source]
        source: serde_json::Error,
    },
}

/// Serializes `value` as JSON and writes it into the slot.
pub fn save_slot<T: Serialize + ?Sized>(
    storage: &impl SlotStorage,
    key: &'static str,
    value: &T,
) -> Result<(), PersistenceError> {
    let data =
        serde_json::to_vec(value).map_err(|source| PersistenceError::Encode { key, source })?;
    storage
        .write_slot(key, &data)
        .map_err(|source| PersistenceError::Io { key, source })
}

/// Reads and decodes a slot. A slot that was never written is `Ok(None)`.
pub fn load_slot<T: DeserializeOwned>(
    storage: &impl SlotStorage,
    key: &'static str,
) -> Result<Option<T>, PersistenceError> {
    let Some(data) = storage
        .read_slot(key)
        .map_err(|source| PersistenceError::Io { key, source })?
    else {
        return Ok(None);
    };
    serde_json::from_slice(&data)
        .map(Some)
        .map_err(|source| PersistenceError::Decode { key, source })
}
