//! The habit list and everything that changes it.
//!  - [entities::Habit] is both the in-memory record and the persisted shape.
//!  - [store::HabitStore] owns the ordered list, applies operations and saves after each one.
//!  - [schedule::RemovalQueue] holds removals of completed habits until their grace interval
//!    passes.

pub mod entities;
pub mod schedule;
pub mod store;
