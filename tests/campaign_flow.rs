//! Integration tests for the campaign runner.
//!
//! Each test seeds a CSV store in a temp dir and drives a full run through
//! a recording stub transport (no network).

use std::path::PathBuf;
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;
use tempfile::TempDir;

use outreach::campaign::{Campaign, DispatchMode, MessageTemplate, RecordOutcome};
use outreach::channels::{Delivery, OutgoingEmail, Transport};
use outreach::config::Sender;
use outreach::error::{DispatchError, Error};
use outreach::store::{Record, RecordStore};

/// Records every delivery; fails for recipients listed in `fail_for`.
#[derive(Default)]
struct StubTransport {
    fail_for: Vec<String>,
    delivered: Mutex<Vec<OutgoingEmail>>,
    attempts: Mutex<Vec<String>>,
}

impl StubTransport {
    fn failing_for(recipients: &[&str]) -> Self {
        Self {
            fail_for: recipients.iter().map(|r| r.to_string()).collect(),
            ..Self::default()
        }
    }

    fn attempts(&self) -> Vec<String> {
        self.attempts.lock().unwrap().clone()
    }

    fn delivered(&self) -> Vec<OutgoingEmail> {
        self.delivered.lock().unwrap().clone()
    }
}

#[async_trait]
impl Transport for StubTransport {
    fn name(&self) -> &str {
        "stub"
    }

    async fn deliver(&self, email: &OutgoingEmail) -> Result<Delivery, DispatchError> {
        self.attempts.lock().unwrap().push(email.to.clone());
        if self.fail_for.contains(&email.to) {
            return Err(DispatchError::SendFailed {
                recipient: email.to.clone(),
                reason: "550 mailbox unavailable".into(),
            });
        }
        self.delivered.lock().unwrap().push(email.clone());
        Ok(Delivery::new("Drafts"))
    }

    async fn close(&self) -> Result<(), DispatchError> {
        Ok(())
    }
}

fn sender() -> Sender {
    Sender {
        name: Some("Brand".into()),
        address: "hello@brand.example".into(),
    }
}

fn seed(records: &[Record]) -> (TempDir, RecordStore) {
    let dir = tempfile::tempdir().unwrap();
    let store = RecordStore::new(dir.path().join("influencers.csv"));
    store.save_all(records).unwrap();
    (dir, store)
}

fn three_eligible() -> Vec<Record> {
    vec![
        Record::new("@ana", "ana@example.com").with_name("Ana"),
        Record::new("ben", "ben@example.com"),
        Record::new("cleo", "cleo@example.com").with_name("✨ Cleo | Travel"),
    ]
}

fn campaign(store: &RecordStore) -> Campaign {
    Campaign::new(
        store.clone(),
        MessageTemplate::new("Collab Invite: @{handle}", "Hi {name},\n\nLet's collaborate."),
        sender(),
    )
    .with_cooldown(Duration::ZERO)
}

#[tokio::test]
async fn simulate_writes_no_markers() {
    let (_dir, store) = seed(&three_eligible());
    let before = std::fs::read(store.path()).unwrap();

    let summary = campaign(&store).run(DispatchMode::Simulate).await.unwrap();

    assert_eq!(summary.succeeded(), vec!["ana", "ben", "cleo"]);
    assert!(summary.failed().is_empty());
    assert!(store.load_all().unwrap().iter().all(|r| r.sent_date.is_empty()));
    assert_eq!(before, std::fs::read(store.path()).unwrap());
}

#[tokio::test]
async fn live_failure_is_isolated() {
    let (_dir, store) = seed(&three_eligible());
    let transport = StubTransport::failing_for(&["ben@example.com"]);

    let summary = campaign(&store)
        .run(DispatchMode::Live(&transport))
        .await
        .unwrap();

    assert_eq!(
        transport.attempts(),
        vec!["ana@example.com", "ben@example.com", "cleo@example.com"]
    );
    assert_eq!(summary.succeeded(), vec!["ana", "cleo"]);
    let failed = summary.failed();
    assert_eq!(failed.len(), 1);
    assert_eq!(failed[0].0, "ben");
    assert!(failed[0].1.contains("550"));

    let records = store.load_all().unwrap();
    assert!(!records[0].sent_date.is_empty());
    assert!(records[1].sent_date.is_empty());
    assert!(!records[2].sent_date.is_empty());
}

#[tokio::test]
async fn failed_record_is_retried_on_next_run() {
    let (_dir, store) = seed(&three_eligible());
    let flaky = StubTransport::failing_for(&["ben@example.com"]);
    campaign(&store).run(DispatchMode::Live(&flaky)).await.unwrap();

    let healthy = StubTransport::default();
    let summary = campaign(&store).run(DispatchMode::Live(&healthy)).await.unwrap();

    assert_eq!(healthy.attempts(), vec!["ben@example.com"]);
    assert_eq!(summary.succeeded(), vec!["ben"]);
    assert_eq!(summary.already_sent().len(), 2);
    assert!(store.load_all().unwrap().iter().all(|r| !r.sent_date.is_empty()));
}

#[tokio::test]
async fn already_sent_records_are_never_resent() {
    let (_dir, store) = seed(&[
        Record::new("ana", "ana@example.com").with_sent_date("2024-02-03"),
        Record::new("ben", "ben@example.com"),
    ]);
    let transport = StubTransport::default();

    let summary = campaign(&store)
        .run(DispatchMode::Live(&transport))
        .await
        .unwrap();

    assert_eq!(transport.attempts(), vec!["ben@example.com"]);
    assert_eq!(
        summary.outcome("ana"),
        Some(&RecordOutcome::AlreadySent {
            date: "2024-02-03".into()
        })
    );
    assert_eq!(store.load_all().unwrap()[0].sent_date, "2024-02-03");
}

#[tokio::test]
async fn stage_mode_drafts_without_marking() {
    let (_dir, store) = seed(&three_eligible());
    let transport = StubTransport::default();

    let summary = campaign(&store)
        .run(DispatchMode::Stage(&transport))
        .await
        .unwrap();

    assert_eq!(summary.succeeded().len(), 3);
    assert_eq!(
        summary.outcome("ben"),
        Some(&RecordOutcome::Drafted {
            folder: "Drafts".into()
        })
    );
    assert!(store.load_all().unwrap().iter().all(|r| r.sent_date.is_empty()));
    assert_eq!(summary.to_string().lines().nth(1), Some("Drafted: 3"));
}

#[tokio::test]
async fn records_without_email_are_skipped() {
    let (_dir, store) = seed(&[
        Record::new("ana", ""),
        Record::new("", "nobody@example.com"),
        Record::new("ben", "ben@example.com"),
    ]);
    let transport = StubTransport::default();

    let summary = campaign(&store)
        .run(DispatchMode::Live(&transport))
        .await
        .unwrap();

    assert_eq!(transport.attempts(), vec!["ben@example.com"]);
    assert_eq!(summary.skipped, 2);
    let records = store.load_all().unwrap();
    assert!(records[0].sent_date.is_empty());
    assert!(records[1].sent_date.is_empty());
}

#[tokio::test]
async fn messages_are_personalized() {
    let (_dir, store) = seed(&three_eligible());
    let transport = StubTransport::default();

    campaign(&store)
        .run(DispatchMode::Live(&transport))
        .await
        .unwrap();

    let delivered = transport.delivered();
    assert_eq!(delivered[0].subject, "Collab Invite: @ana");
    assert!(delivered[0].text.starts_with("Hi Ana,"));
    // No name collected: greet by handle.
    assert!(delivered[1].text.starts_with("Hi ben,"));
    assert!(delivered[2].text.starts_with("Hi Cleo,"));
    assert!(delivered[2].html.contains("Hi Cleo,"));
    assert_eq!(delivered[2].sender, sender());
}

#[tokio::test]
async fn live_run_paces_between_sends() {
    let (_dir, store) = seed(&three_eligible()[..2]);
    let transport = StubTransport::default();
    let campaign = campaign(&store).with_cooldown(Duration::from_millis(200));

    let started = std::time::Instant::now();
    campaign.run(DispatchMode::Live(&transport)).await.unwrap();
    let elapsed = started.elapsed();

    // One pause between two sends, none after the last.
    assert!(elapsed >= Duration::from_millis(200));
    assert!(elapsed < Duration::from_millis(400));
}

#[tokio::test]
async fn duplicate_handle_is_sent_once() {
    let (_dir, store) = seed(&[
        Record::new("ana", "ana@example.com"),
        Record::new("@ANA", "ana@example.com"),
        Record::new("ben", "ben@example.com"),
    ]);
    let transport = StubTransport::default();

    let summary = campaign(&store)
        .run(DispatchMode::Live(&transport))
        .await
        .unwrap();

    assert_eq!(
        transport.attempts(),
        vec!["ana@example.com", "ben@example.com"]
    );
    assert_eq!(summary.succeeded(), vec!["ana", "ben"]);
    let sent_date = store.load_all().unwrap()[0].sent_date.clone();
    assert!(!sent_date.is_empty());
    assert_eq!(
        summary.outcome("ANA"),
        Some(&RecordOutcome::AlreadySent { date: sent_date })
    );
}

#[tokio::test]
async fn duplicate_handle_after_failure_is_not_retried_in_same_run() {
    let (_dir, store) = seed(&[
        Record::new("ana", "ana@example.com"),
        Record::new("ana", "ana@example.com"),
    ]);
    let transport = StubTransport::failing_for(&["ana@example.com"]);

    let summary = campaign(&store)
        .run(DispatchMode::Live(&transport))
        .await
        .unwrap();

    assert_eq!(transport.attempts(), vec!["ana@example.com"]);
    assert_eq!(summary.failed().len(), 1);
    assert_eq!(summary.duplicates(), vec!["ana"]);
    assert!(store.load_all().unwrap().iter().all(|r| r.sent_date.is_empty()));
}

/// Deletes the store file mid-run, so recording the send date fails.
struct StoreWiper {
    store: PathBuf,
    inner: StubTransport,
}

#[async_trait]
impl Transport for StoreWiper {
    fn name(&self) -> &str {
        "wiper"
    }

    async fn deliver(&self, email: &OutgoingEmail) -> Result<Delivery, DispatchError> {
        let delivery = self.inner.deliver(email).await?;
        std::fs::remove_file(&self.store).unwrap();
        Ok(delivery)
    }

    async fn close(&self) -> Result<(), DispatchError> {
        Ok(())
    }
}

#[tokio::test]
async fn store_failure_after_send_aborts_run() {
    let (_dir, store) = seed(&three_eligible());
    let transport = StoreWiper {
        store: store.path().to_path_buf(),
        inner: StubTransport::default(),
    };

    let result = campaign(&store).run(DispatchMode::Live(&transport)).await;

    assert!(matches!(result, Err(Error::Store(_))));
    assert_eq!(transport.inner.attempts(), vec!["ana@example.com"]);
}

#[tokio::test]
async fn missing_store_aborts_before_dispatch() {
    let dir = tempfile::tempdir().unwrap();
    let store = RecordStore::new(dir.path().join("missing.csv"));
    let transport = StubTransport::default();

    let result = campaign(&store).run(DispatchMode::Live(&transport)).await;

    assert!(matches!(result, Err(Error::Store(_))));
    assert!(transport.attempts().is_empty());
}
