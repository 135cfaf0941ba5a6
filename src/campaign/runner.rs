//! Campaign runner: one pass over the store, one record at a time.
//!
//! Per record: `Pending` records are skipped, `Sent` records are reported
//! and left alone, `Eligible` records are rendered and dispatched. A live
//! send is recorded in the store before the next record is touched, so an
//! interrupted run resumes by simply running again.
//!
//! Rows sharing a handle are dispatched once per run; later copies are
//! reported as duplicates or as already sent.

use std::collections::HashMap;
use std::fmt;
use std::time::Duration;

use tracing::{debug, error, info, warn};

use super::render::MessageTemplate;
use crate::channels::{OutgoingEmail, Transport};
use crate::config::Sender;
use crate::error::{Error, StoreError};
use crate::store::{Record, RecordField, RecordState, RecordStore};

/// Characters of body shown per record in a simulated run.
const PREVIEW_CHARS: usize = 120;

/// Run mode selected on the command line.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunMode {
    Simulate,
    Stage,
    Live,
}

impl RunMode {
    /// `--dry-run` wins over `--draft`; neither means live.
    pub fn from_flags(dry_run: bool, draft: bool) -> Self {
        match (dry_run, draft) {
            (true, _) => Self::Simulate,
            (false, true) => Self::Stage,
            (false, false) => Self::Live,
        }
    }
}

/// How eligible records are dispatched.
#[derive(Clone, Copy)]
pub enum DispatchMode<'a> {
    /// Render and report only.
    Simulate,
    /// Stage in drafts; records are not marked sent.
    Stage(&'a dyn Transport),
    /// Deliver; records are marked sent on success.
    Live(&'a dyn Transport),
}

impl DispatchMode<'_> {
    pub fn run_mode(&self) -> RunMode {
        match self {
            Self::Simulate => RunMode::Simulate,
            Self::Stage(_) => RunMode::Stage,
            Self::Live(_) => RunMode::Live,
        }
    }

    /// Verb used in the summary for dispatched records.
    pub fn label(&self) -> &'static str {
        match self {
            Self::Simulate => "Simulated",
            Self::Stage(_) => "Drafted",
            Self::Live(_) => "Sent",
        }
    }
}

/// What happened to one record during a run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RecordOutcome {
    /// Marker was already present; not dispatched.
    AlreadySent { date: String },
    Simulated { subject: String },
    Drafted { folder: String },
    Sent { date: String },
    /// Dispatch failed; the record stays eligible.
    Failed { reason: String },
    /// Same handle as an earlier row already handled in this run.
    Duplicate,
}

impl RecordOutcome {
    pub fn is_success(&self) -> bool {
        matches!(
            self,
            Self::Simulated { .. } | Self::Drafted { .. } | Self::Sent { .. }
        )
    }
}

/// One record's line in the summary.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordReport {
    pub handle: String,
    pub outcome: RecordOutcome,
}

/// Result of a whole run.
#[derive(Debug, Clone)]
pub struct RunSummary {
    pub mode: RunMode,
    pub label: &'static str,
    pub reports: Vec<RecordReport>,
    /// Records without a handle or email.
    pub skipped: usize,
}

impl RunSummary {
    fn new(mode: &DispatchMode<'_>) -> Self {
        Self {
            mode: mode.run_mode(),
            label: mode.label(),
            reports: Vec::new(),
            skipped: 0,
        }
    }

    fn push(&mut self, handle: &str, outcome: RecordOutcome) {
        self.reports.push(RecordReport {
            handle: handle.to_string(),
            outcome,
        });
    }

    /// Handles dispatched successfully in this run.
    pub fn succeeded(&self) -> Vec<&str> {
        self.reports
            .iter()
            .filter(|r| r.outcome.is_success())
            .map(|r| r.handle.as_str())
            .collect()
    }

    /// `(handle, date)` for records sent in an earlier run.
    pub fn already_sent(&self) -> Vec<(&str, &str)> {
        self.reports
            .iter()
            .filter_map(|r| match &r.outcome {
                RecordOutcome::AlreadySent { date } => Some((r.handle.as_str(), date.as_str())),
                _ => None,
            })
            .collect()
    }

    /// `(handle, reason)` for failed dispatches.
    pub fn failed(&self) -> Vec<(&str, &str)> {
        self.reports
            .iter()
            .filter_map(|r| match &r.outcome {
                RecordOutcome::Failed { reason } => Some((r.handle.as_str(), reason.as_str())),
                _ => None,
            })
            .collect()
    }

    /// Handles skipped because an earlier row had the same handle.
    pub fn duplicates(&self) -> Vec<&str> {
        self.reports
            .iter()
            .filter(|r| r.outcome == RecordOutcome::Duplicate)
            .map(|r| r.handle.as_str())
            .collect()
    }

    pub fn outcome(&self, handle: &str) -> Option<&RecordOutcome> {
        self.reports
            .iter()
            .find(|r| r.handle == handle)
            .map(|r| &r.outcome)
    }

    pub fn has_failures(&self) -> bool {
        self.reports
            .iter()
            .any(|r| matches!(r.outcome, RecordOutcome::Failed { .. }))
    }
}

impl fmt::Display for RunSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "=== Campaign Summary ===")?;
        writeln!(f, "{}: {}", self.label, self.succeeded().len())?;

        let already = self.already_sent();
        if !already.is_empty() {
            writeln!(f, "Already sent: {}", already.len())?;
            for (handle, date) in already {
                writeln!(f, "  @{handle} ({date})")?;
            }
        }

        let failed = self.failed();
        if !failed.is_empty() {
            writeln!(f, "Failed: {}", failed.len())?;
            for (handle, reason) in failed {
                writeln!(f, "  @{handle}: {reason}")?;
            }
        }
        let duplicates = self.duplicates();
        if !duplicates.is_empty() {
            writeln!(f, "Duplicate handles skipped: {}", duplicates.len())?;
            for handle in duplicates {
                writeln!(f, "  @{handle}")?;
            }
        }
        if self.skipped > 0 {
            writeln!(f, "Skipped (no handle or email): {}", self.skipped)?;
        }
        Ok(())
    }
}

/// A single-campaign runner over one record store.
pub struct Campaign {
    store: RecordStore,
    template: MessageTemplate,
    sender: Sender,
    cooldown: Duration,
}

impl Campaign {
    pub fn new(store: RecordStore, template: MessageTemplate, sender: Sender) -> Self {
        Self {
            store,
            template,
            sender,
            cooldown: Duration::from_secs(180),
        }
    }

    /// Pause between consecutive live sends.
    pub fn with_cooldown(mut self, cooldown: Duration) -> Self {
        self.cooldown = cooldown;
        self
    }

    /// Process every record once.
    ///
    /// Dispatch failures are isolated and reported in the summary. Only a
    /// store failure aborts the run, since progress could no longer be
    /// recorded.
    pub async fn run(&self, mode: DispatchMode<'_>) -> Result<RunSummary, Error> {
        let records = self.store.load_all()?;
        let total = records.len();
        let mut summary = RunSummary::new(&mode);
        let mut attempted = false;
        // Handle key -> send date, for rows dispatched earlier in this run.
        let mut handled: HashMap<String, Option<String>> = HashMap::new();

        for (i, record) in records.iter().enumerate() {
            let position = format!("[{}/{}]", i + 1, total);
            let handle = record.display_handle();

            match record.state() {
                RecordState::Pending => {
                    debug!("{position} {:?} has no handle or email, skipping", record.handle);
                    summary.skipped += 1;
                    continue;
                }
                RecordState::Sent(date) => {
                    info!("{position} @{handle} - already sent on {date}, skipping");
                    summary.push(handle, RecordOutcome::AlreadySent { date });
                    continue;
                }
                RecordState::Eligible => {}
            }

            if let Some(sent) = handled.get(&record.key()) {
                let outcome = match sent {
                    Some(date) => {
                        info!("{position} @{handle} - sent earlier in this run, skipping");
                        RecordOutcome::AlreadySent { date: date.clone() }
                    }
                    None => {
                        warn!("{position} @{handle} - duplicate handle, skipping");
                        RecordOutcome::Duplicate
                    }
                };
                summary.push(handle, outcome);
                continue;
            }

            let email = self.template.render(record, &self.sender);
            info!("{position} @{handle} -> {}", email.to);

            let outcome = match mode {
                DispatchMode::Simulate => simulate(&email),
                DispatchMode::Stage(transport) => stage(transport, &email).await,
                DispatchMode::Live(transport) => {
                    if attempted && !self.cooldown.is_zero() {
                        info!("Waiting {}s before next email...", self.cooldown.as_secs());
                        tokio::time::sleep(self.cooldown).await;
                    }
                    attempted = true;
                    self.send(transport, record, &email).await?
                }
            };

            let sent_date = match &outcome {
                RecordOutcome::Sent { date } => Some(date.clone()),
                _ => None,
            };
            handled.insert(record.key(), sent_date);
            summary.push(handle, outcome);
        }

        Ok(summary)
    }

    async fn send(
        &self,
        transport: &dyn Transport,
        record: &Record,
        email: &OutgoingEmail,
    ) -> Result<RecordOutcome, StoreError> {
        let handle = record.display_handle();
        match transport.deliver(email).await {
            Ok(_) => {
                let date = today();
                match self.store.mark_field(&record.handle, RecordField::SentDate, &date) {
                    Ok(true) => info!("  Sent. Date recorded: {date}"),
                    // The row changed on disk since the run started.
                    Ok(false) => warn!(
                        "@{handle} was sent but the store already had a send date or no longer lists it"
                    ),
                    Err(e) => {
                        error!("@{handle} was sent but the send date could not be recorded: {e}");
                        return Err(e);
                    }
                }
                Ok(RecordOutcome::Sent { date })
            }
            Err(e) => {
                warn!("  @{handle} failed: {e}");
                Ok(RecordOutcome::Failed {
                    reason: e.to_string(),
                })
            }
        }
    }
}

fn simulate(email: &OutgoingEmail) -> RecordOutcome {
    let preview: String = email.text.chars().take(PREVIEW_CHARS).collect();
    info!("  Subject: {}", email.subject);
    info!("  Body preview: {}...", preview.trim());
    RecordOutcome::Simulated {
        subject: email.subject.clone(),
    }
}

async fn stage(transport: &dyn Transport, email: &OutgoingEmail) -> RecordOutcome {
    match transport.deliver(email).await {
        Ok(delivery) => {
            info!("  Saved to {}.", delivery.destination);
            RecordOutcome::Drafted {
                folder: delivery.destination,
            }
        }
        Err(e) => {
            warn!("  {} failed: {e}", email.to);
            RecordOutcome::Failed {
                reason: e.to_string(),
            }
        }
    }
}

/// Local date stamp written as the sent marker.
pub fn today() -> String {
    chrono::Local::now().format("%Y-%m-%d").to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn run_mode_from_flags() {
        assert_eq!(RunMode::from_flags(false, false), RunMode::Live);
        assert_eq!(RunMode::from_flags(false, true), RunMode::Stage);
        assert_eq!(RunMode::from_flags(true, false), RunMode::Simulate);
    }

    #[test]
    fn summary_partitions_outcomes() {
        let mut summary = RunSummary::new(&DispatchMode::Simulate);
        summary.push("a", RecordOutcome::Sent { date: "2024-01-01".into() });
        summary.push("b", RecordOutcome::Failed { reason: "boom".into() });
        summary.push("c", RecordOutcome::AlreadySent { date: "2023-12-31".into() });
        summary.push("d", RecordOutcome::Duplicate);
        summary.skipped = 2;

        assert_eq!(summary.succeeded(), vec!["a"]);
        assert_eq!(summary.failed(), vec![("b", "boom")]);
        assert_eq!(summary.already_sent(), vec![("c", "2023-12-31")]);
        assert_eq!(summary.duplicates(), vec!["d"]);
        assert!(summary.has_failures());

        let text = summary.to_string();
        assert!(text.contains("Simulated: 1"));
        assert!(text.contains("  @b: boom"));
        assert!(text.contains("  @c (2023-12-31)"));
        assert!(text.contains("Duplicate handles skipped: 1"));
        assert!(text.contains("Skipped (no handle or email): 2"));
    }

    #[test]
    fn today_is_iso_date() {
        let date = today();
        assert_eq!(date.len(), 10);
        assert!(chrono::NaiveDate::parse_from_str(&date, "%Y-%m-%d").is_ok());
    }
}
