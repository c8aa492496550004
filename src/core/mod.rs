pub mod comparator;
pub mod engine;
pub mod executor;
pub mod report;
pub mod scanner;
pub mod scheduler;

pub use comparator::{calculate_hash, files_are_identical, CompareConfig, FileComparator};
pub use engine::{plan_actions, prepare_roots, SyncAction, SyncEngine};
pub use report::{ActionSink, RecordingSink, SyncEvent, SyncReport, TracingSink};
pub use scanner::{DirectoryListing, EntryKind};
pub use scheduler::SyncScheduler;
