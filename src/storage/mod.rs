// src/storage/mod.rs
pub mod atomic;
pub mod compare;

pub use atomic::{write_atomic, AtomicWriteError, StagedWrite};
pub use compare::{file_matches, readers_equal};
