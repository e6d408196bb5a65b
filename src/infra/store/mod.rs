//! Content store adapters.

mod memory;
mod workdir;

pub use memory::{CommitRecord, MemoryStore};
pub use workdir::WorkdirStore;
