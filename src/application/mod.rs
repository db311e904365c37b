//! Application layer: synchronization and export planning
//!
//! This layer orchestrates domain logic; it performs no I/O.

pub mod error;
pub mod export;
pub mod synchronizer;

pub use error::{ApplicationError, ApplicationResult};
pub use export::{ExportElement, ExportEntry, ExportOptions, ExportPlan, ExportPlanner, FileNaming};
pub use synchronizer::{synchronize, StaleEdit, SyncOutcome, TreeSynchronizer};
