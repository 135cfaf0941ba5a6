//! CSV-backed record store.
//!
//! The whole file is read and rewritten on every change. Writes go to a
//! temp file beside the target and are renamed over it, so an interrupted
//! or failed save leaves the previous contents intact.

use std::collections::HashSet;
use std::path::{Path, PathBuf};

use tempfile::NamedTempFile;
use tracing::{debug, warn};

use super::record::{COLUMNS, Record, RecordField, handle_key};
use crate::error::StoreError;

/// Flat-file store holding one [`Record`] per recipient, in input order.
#[derive(Debug, Clone)]
pub struct RecordStore {
    path: PathBuf,
}

impl RecordStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Read every record, preserving file order.
    pub fn load_all(&self) -> Result<Vec<Record>, StoreError> {
        let mut reader = csv::ReaderBuilder::new()
            .flexible(true)
            .from_path(&self.path)
            .map_err(|e| self.unavailable(e))?;

        let headers = reader.headers().map_err(|e| self.unavailable(e))?.clone();
        if !headers.iter().any(|h| h == COLUMNS[0]) {
            return Err(StoreError::Unavailable {
                path: self.path.clone(),
                reason: format!("missing `{}` column", COLUMNS[0]),
            });
        }

        let mut records = Vec::new();
        let mut seen = HashSet::new();
        for row in reader.records() {
            let mut row = row.map_err(|e| self.unavailable(e))?;
            // Hand-edited files often drop trailing empty cells.
            while row.len() < headers.len() {
                row.push_field("");
            }
            let record: Record = row
                .deserialize(Some(&headers))
                .map_err(|e| self.unavailable(e))?;
            let key = record.key();
            if !key.is_empty() && !seen.insert(key) {
                warn!(handle = %record.handle, "Duplicate handle in record store");
            }
            records.push(record);
        }

        debug!(path = %self.path.display(), count = records.len(), "Loaded records");
        Ok(records)
    }

    /// Replace the file with `records` under the fixed column set.
    pub fn save_all(&self, records: &[Record]) -> Result<(), StoreError> {
        let dir = match self.path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent,
            _ => Path::new("."),
        };

        let mut tmp = NamedTempFile::new_in(dir).map_err(|e| self.write_failed(e))?;
        {
            let mut writer = csv::WriterBuilder::new()
                .has_headers(false)
                .from_writer(tmp.as_file_mut());
            writer.write_record(COLUMNS).map_err(|e| self.write_failed(e))?;
            for record in records {
                writer.serialize(record).map_err(|e| self.write_failed(e))?;
            }
            writer.flush().map_err(|e| self.write_failed(e))?;
        }
        tmp.as_file_mut()
            .sync_all()
            .map_err(|e| self.write_failed(e))?;
        tmp.persist(&self.path)
            .map_err(|e| self.write_failed(e.error))?;

        debug!(path = %self.path.display(), count = records.len(), "Saved records");
        Ok(())
    }

    /// Fill `field` with `value` on every record matching `handle` whose
    /// field is still empty. Returns `true` if the file changed.
    ///
    /// Filled fields are never overwritten, so repeating a call is a no-op.
    pub fn mark_field(
        &self,
        handle: &str,
        field: RecordField,
        value: &str,
    ) -> Result<bool, StoreError> {
        let key = handle_key(handle);
        let mut records = self.load_all()?;

        let mut changed = false;
        for record in records.iter_mut().filter(|r| r.key() == key) {
            let slot = record.field_mut(field);
            if slot.trim().is_empty() {
                *slot = value.to_string();
                changed = true;
            }
        }

        if changed {
            self.save_all(&records)?;
            debug!(handle, field = field.column(), value, "Marked record field");
        }
        Ok(changed)
    }

    fn unavailable(&self, e: impl std::fmt::Display) -> StoreError {
        StoreError::Unavailable {
            path: self.path.clone(),
            reason: e.to_string(),
        }
    }

    fn write_failed(&self, e: impl std::fmt::Display) -> StoreError {
        StoreError::WriteFailed {
            path: self.path.clone(),
            reason: e.to_string(),
        }
    }
}
