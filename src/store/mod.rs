//! Persistence layer: the CSV record store shared by both batch jobs.

pub mod file;
pub mod record;

pub use file::RecordStore;
pub use record::{Record, RecordField, RecordState};
