//! External process supervision and pooling.

mod handle;
mod pool;

pub use handle::{ProcessExit, ProcessHandle, SpawnSpec};
pub use pool::{EntryState, ProcessPool, DEFAULT_IDLE_GRACE};
