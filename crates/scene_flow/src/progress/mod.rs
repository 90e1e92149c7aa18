mod router;
mod snapshot;
mod store;

pub use router::{SceneOutcome, SceneRouter, PROGRESS_STORAGE_KEY};
pub use snapshot::{ProgressError, ProgressSnapshot};
pub use store::{FileStore, MemoryStore, ProgressStore, StoreError};
