//! Recipient record: one row of the store file.

use serde::{Deserialize, Serialize};

/// Column names, in file order.
pub const COLUMNS: [&str; 4] = ["ig_handle", "email", "name", "sent_date"];

/// A persisted recipient.
///
/// Field values are kept exactly as read so a load/save cycle never
/// rewrites them. Use [`Record::key`] for comparisons.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Record {
    /// Social handle, possibly with a leading `@`.
    #[serde(rename = "ig_handle", default)]
    pub handle: String,
    /// Contact address. Blank means the record is never sent to.
    #[serde(default)]
    pub email: String,
    /// Cleaned first name, filled in by the collector.
    #[serde(default)]
    pub name: String,
    /// `YYYY-MM-DD` once the campaign message went out.
    #[serde(default)]
    pub sent_date: String,
}

/// Fields that can be filled in place by [`RecordStore::mark_field`].
///
/// [`RecordStore::mark_field`]: crate::store::RecordStore::mark_field
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecordField {
    Name,
    SentDate,
}

impl RecordField {
    pub fn column(self) -> &'static str {
        match self {
            Self::Name => "name",
            Self::SentDate => "sent_date",
        }
    }
}

/// Where a record stands in the campaign.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RecordState {
    /// No email or no handle; never dispatched.
    Pending,
    /// Has an email and no sent marker.
    Eligible,
    /// Sent on the contained date.
    Sent(String),
}

impl Record {
    pub fn new(handle: impl Into<String>, email: impl Into<String>) -> Self {
        Self {
            handle: handle.into(),
            email: email.into(),
            ..Self::default()
        }
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    pub fn with_sent_date(mut self, date: impl Into<String>) -> Self {
        self.sent_date = date.into();
        self
    }

    /// Lookup key: trimmed, leading `@` removed, lower-cased.
    pub fn key(&self) -> String {
        handle_key(&self.handle)
    }

    /// Handle for display, without the `@`.
    pub fn display_handle(&self) -> &str {
        self.handle.trim().trim_start_matches('@')
    }

    pub fn field(&self, field: RecordField) -> &str {
        match field {
            RecordField::Name => &self.name,
            RecordField::SentDate => &self.sent_date,
        }
    }

    pub(crate) fn field_mut(&mut self, field: RecordField) -> &mut String {
        match field {
            RecordField::Name => &mut self.name,
            RecordField::SentDate => &mut self.sent_date,
        }
    }

    pub fn has_name(&self) -> bool {
        !self.name.trim().is_empty()
    }

    pub fn state(&self) -> RecordState {
        if self.key().is_empty() || self.email.trim().is_empty() {
            return RecordState::Pending;
        }
        match self.sent_date.trim() {
            "" => RecordState::Eligible,
            date => RecordState::Sent(date.to_string()),
        }
    }
}

/// Normalize a handle for matching.
pub fn handle_key(handle: &str) -> String {
    handle.trim().trim_start_matches('@').to_lowercase()
}
