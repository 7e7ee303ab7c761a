//! Terminal habit tracker. Habits have a daily goal, progress is added one tick at a time,
//! completed habits leave the list shortly after and come back when a new day starts.
//!

pub mod cli;
pub mod fs;
pub mod habits;
pub mod storage;
pub mod tracker;
pub mod utils;
