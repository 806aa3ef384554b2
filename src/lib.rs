// taskboard - Single-user task list with write-through local persistence

pub mod backend;
pub mod codec;
pub mod config;
pub mod edit;
pub mod filter;
pub mod models;
pub mod store;

// Re-export main types for convenience
pub use backend::{Backend, FileBackend, MemoryBackend, SqliteBackend};
pub use config::{BackendKind, Config};
pub use edit::EditSession;
pub use filter::FilterMode;
pub use models::{Stats, Task, TaskId, now_ms};
pub use store::{Change, Store};
