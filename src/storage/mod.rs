//! Persistence is organized around named slots in a key-value store.
//!  - [slot_storage::SlotStorage] is the raw key-value seam, backed by files in the application
//!    directory or by memory.
//!  - [persistence] encodes values into slots as JSON and defines the failure kinds.
//!  - The habit list lives in a single slot that is rewritten whole on every change.

pub mod persistence;
pub mod slot_storage;
