//! BuddyBook Ledger - ingestion entry point
//!
//! Connects to the configured feed source, drains history, follows live
//! arrivals until Ctrl-C, then prints every chain as a JSON forest.

use std::env;

use anyhow::Context;
use buddybook_ledger::{
    Coordinator, CoordinatorStatus, IngestStats, LedgerConfig, LedgerReader, RankedBlock, TreeNode,
};
use dotenv::dotenv;
use serde::Serialize;
use tracing::{error, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Initialize tracing/logging.
fn init_tracing() {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("buddybook_ledger=info,buddybook_relay=info"));

    let json = env::var("LOG_FORMAT")
        .map(|format| format.eq_ignore_ascii_case("json"))
        .unwrap_or(false);

    if json {
        tracing_subscriber::registry()
            .with(filter)
            .with(
                tracing_subscriber::fmt::layer()
                    .json()
                    .with_target(true)
                    .with_thread_ids(true),
            )
            .init();

        info!(
            service_name = "buddybook-ledger",
            service_version = env!("CARGO_PKG_VERSION"),
            "Tracing initialized with JSON format"
        );
    } else {
        tracing_subscriber::registry()
            .with(filter)
            .with(tracing_subscriber::fmt::layer().with_target(true).pretty())
            .init();

        info!(
            service_name = "buddybook-ledger",
            service_version = env!("CARGO_PKG_VERSION"),
            "Tracing initialized with console output"
        );
    }
}

#[derive(Serialize)]
struct ChainView {
    chain_id: String,
    roots: Vec<TreeNode>,
    ranking: Vec<RankedBlock>,
}

fn chains(reader: &LedgerReader) -> Vec<ChainView> {
    reader.with_ledger(|ledger| {
        ledger
            .store()
            .chain_ids()
            .into_iter()
            .map(|chain_id| {
                let roots = ledger.forest_of(&chain_id);
                let ranking = ledger.rank_by_aggregate(ledger.index().roots_of(&chain_id));
                ChainView {
                    chain_id,
                    roots,
                    ranking,
                }
            })
            .collect()
    })
}

fn summary(stats: &IngestStats, status: &CoordinatorStatus, blocks: usize) {
    println!();
    println!("┌──────────────────────────────────────────────────┐");
    println!("│ Summary                                          │");
    println!("├──────────────────────────────────────────────────┤");
    println!("│ Stored blocks:       {:>6}                      │", blocks);
    println!("│ Historical records:  {:>6}                      │", stats.historical);
    println!("│ Live records:        {:>6}                      │", stats.live);
    println!("│ Duplicates:          {:>6}                      │", stats.duplicates);
    println!("│ Rejected:            {:>6}                      │", stats.rejected);
    println!("│ Store feed:          {:>12}                │", format!("{:?}", status.history));
    println!("│ Filter feed:         {:>12}                │", format!("{:?}", status.live));
    println!("└──────────────────────────────────────────────────┘");
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load environment variables from .env file
    dotenv().ok();

    init_tracing();

    info!("Starting BuddyBook ledger");

    let config = LedgerConfig::from_env().context("invalid configuration")?;
    let (telemetry, recording) = config.telemetry();

    let client = config
        .feed_source
        .clone()
        .into_client()
        .await
        .context("failed to create feed client")?;

    let coordinator = Coordinator::new(client, telemetry);
    let handle = match coordinator.start() {
        Ok(handle) => handle,
        Err(e) => {
            error!(error = %e, "Ledger failed to start");
            return Err(e.into());
        }
    };

    let reader = handle.reader();
    let mut status = handle.subscribe_status();
    let mut last_state = status.borrow().state;

    loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => {
                info!("Received shutdown signal");
                break;
            }
            changed = status.changed() => {
                if changed.is_err() {
                    warn!("Coordinator stopped unexpectedly");
                    break;
                }
                let current = status.borrow_and_update().clone();
                if current.state != last_state {
                    info!(
                        state = ?current.state,
                        history = ?current.history,
                        live = ?current.live,
                        blocks = reader.len(),
                        "Ledger state"
                    );
                    last_state = current.state;
                }
            }
        }
    }

    let final_status = handle.status();
    let stats = handle.shutdown().await?;

    summary(&stats, &final_status, reader.len());
    if let Some(recording) = recording {
        info!(events = recording.len(), "Telemetry events recorded");
    }

    println!(
        "{}",
        serde_json::to_string_pretty(&chains(&reader)).context("failed to encode chains")?
    );

    Ok(())
}
