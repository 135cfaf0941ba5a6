use std::path::PathBuf;

use clap::{Parser, Subcommand};

use outreach::campaign::{Campaign, DispatchMode, MessageTemplate, RunMode, RunSummary};
use outreach::channels::{ImapDrafts, SmtpSender, Transport};
use outreach::collector::{Collector, ProfilePageSource};
use outreach::config::{CampaignConfig, CollectorConfig, MailConfig};
use outreach::error::Error;
use outreach::store::RecordStore;

#[derive(Debug, Parser)]
#[command(name = "outreach", version, about = "Influencer name collection and campaign sends")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Fetch display names for records that have none.
    Collect {
        /// Record store CSV (overrides OUTREACH_STORE).
        #[arg(long)]
        store: Option<PathBuf>,
    },
    /// Send the campaign email to every record not yet sent.
    Send {
        /// Record store CSV (overrides OUTREACH_STORE).
        #[arg(long)]
        store: Option<PathBuf>,
        /// Render and print messages without contacting any server.
        #[arg(long, conflicts_with = "draft")]
        dry_run: bool,
        /// Save messages to the drafts folder instead of sending.
        #[arg(long)]
        draft: bool,
    },
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Install rustls crypto provider before any TLS usage
    rustls::crypto::ring::default_provider()
        .install_default()
        .expect("Failed to install rustls crypto provider");

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_target(false)
        .init();

    let cli = Cli::parse();
    eprintln!("📬 Outreach v{}", env!("CARGO_PKG_VERSION"));

    let result = match cli.command {
        Command::Collect { store } => collect(store).await,
        Command::Send {
            store,
            dry_run,
            draft,
        } => send(store, RunMode::from_flags(dry_run, draft)).await,
    };

    if let Err(e) = result {
        eprintln!("Error: {e}");
        std::process::exit(1);
    }
    Ok(())
}

async fn collect(store_override: Option<PathBuf>) -> Result<(), Error> {
    let mut config = CollectorConfig::from_env()?;
    if let Some(path) = store_override {
        config.store_path = path;
    }
    eprintln!("   Store: {}", config.store_path.display());
    eprintln!(
        "   Session: {}\n",
        if config.session_id.is_some() { "cookie" } else { "anonymous" }
    );

    let source = ProfilePageSource::new(&config)?;
    let collector = Collector::new(RecordStore::new(&config.store_path)).with_delay(config.delay);

    let summary = tokio::select! {
        biased;
        _ = tokio::signal::ctrl_c() => {
            tracing::info!("Ctrl+C received, stopping. Progress so far is saved.");
            return Ok(());
        }
        summary = collector.run(&source) => summary?,
    };

    eprintln!("\n=== Collection Summary ===");
    eprintln!("Named: {}", summary.enriched.len());
    eprintln!("Already named: {}", summary.skipped.len());
    if !summary.failed.is_empty() {
        eprintln!("Not found: {}", summary.failed.len());
        for (handle, reason) in &summary.failed {
            eprintln!("  @{handle}: {reason}");
        }
    }
    eprintln!("Review {}, then run `outreach send`.", config.store_path.display());
    Ok(())
}

async fn send(store_override: Option<PathBuf>, mode: RunMode) -> Result<(), Error> {
    let mail = MailConfig::from_env()?;
    let mut config = CampaignConfig::from_env()?;
    if let Some(path) = store_override {
        config.store_path = path;
    }
    let template = MessageTemplate::load(&config)?;

    let store = RecordStore::new(&config.store_path);
    let records = store.load_all()?;
    if records.is_empty() {
        eprintln!("No records found in {}. Exiting.", config.store_path.display());
        return Ok(());
    }

    eprintln!("   Store: {} ({} records)", config.store_path.display(), records.len());
    eprintln!("   Sender: {}", mail.sender_email);
    match mode {
        RunMode::Simulate => eprintln!("\n=== DRY RUN MODE - no emails will be sent ===\n"),
        RunMode::Stage => eprintln!("\n=== DRAFT MODE - emails will be saved to Drafts folder ===\n"),
        RunMode::Live => eprintln!("   Cooldown: {}s\n", config.cooldown.as_secs()),
    }

    let transport: Option<Box<dyn Transport>> = match mode {
        RunMode::Simulate => None,
        RunMode::Stage => Some(Box::new(ImapDrafts::connect(&mail).await?)),
        RunMode::Live => Some(Box::new(SmtpSender::connect(&mail).await?)),
    };
    let dispatch = match (mode, transport.as_deref()) {
        (RunMode::Stage, Some(t)) => DispatchMode::Stage(t),
        (RunMode::Live, Some(t)) => DispatchMode::Live(t),
        _ => DispatchMode::Simulate,
    };

    let campaign = Campaign::new(store, template, mail.sender()).with_cooldown(config.cooldown);

    let outcome: Option<Result<RunSummary, Error>> = tokio::select! {
        biased;
        _ = tokio::signal::ctrl_c() => {
            tracing::info!("Ctrl+C received, stopping. Sent records are already marked.");
            None
        }
        result = campaign.run(dispatch) => Some(result),
    };

    // Close on every path, including interruption and store failure.
    if let Some(transport) = &transport
        && let Err(e) = transport.close().await
    {
        tracing::warn!("Failed to close {}: {e}", transport.name());
    }

    if let Some(result) = outcome {
        let summary = result?;
        eprintln!("\n{summary}");
        if summary.has_failures() {
            eprintln!("Failed records are still unsent; run again to retry them.");
        } else {
            eprintln!("Done.");
        }
    }
    Ok(())
}
