pub mod autosave;
pub mod clock;
pub mod persistence;

pub use autosave::{AutosaveQueue, PendingWrite};
pub use clock::{Clock, ManualClock, SystemClock, Tick, TickSource};
pub use persistence::{
    AutosaveOutcome, BootOutcome, ControllerState, DEFAULT_PROJECT_NAME, PersistenceController,
    PersistenceError, PersistenceOptions, PersistenceWarning, ProjectSlot,
};

pub use webdaw_graph::{IdAllocator, IdKind, Project, ProjectMetadata, StockSynths, SynthRegistry};
pub use webdaw_project::{Encoding, ProjectError, SaveFile};
pub use webdaw_store::{FileStore, MemoryStore, Partition, Store, StoreError};
