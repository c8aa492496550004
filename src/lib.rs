pub mod config;
pub mod core;
pub mod error;
pub mod logging;

pub use crate::core::{
    ActionSink, CompareConfig, EntryKind, FileComparator, SyncEngine, SyncEvent, SyncReport,
    SyncScheduler, TracingSink,
};
pub use config::{AppConfig, Cli, Settings};
pub use error::SyncError;
