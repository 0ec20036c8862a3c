// ── Record store ──
//
// In-memory implementation of every repository trait, persisted to a JSON
// snapshot file between CLI invocations.

mod memory;
mod snapshot;

pub use memory::MemoryStore;
pub use snapshot::{SNAPSHOT_VERSION, Snapshot};
