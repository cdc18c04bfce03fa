pub mod handlers;
pub mod snapshot;
pub mod store;

pub use handlers::{AppState, router};
pub use snapshot::{DictionarySnapshot, DictionarySources};
pub use store::{EngineState, EngineStatus, SnapshotStore};
