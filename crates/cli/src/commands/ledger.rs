//! Ledger inspection

use anyhow::{Context, Result};
use optgate_core::{AdmissionDecision, Destination, UNSUBSCRIBE_THRESHOLD};
use optgate_gatekeeper::{ComplianceAggregator, GatekeeperConfig};

use crate::db;

/// Show the distinct-unsubscribe ledger for a destination
pub async fn show(config: &GatekeeperConfig, destination: &str, json: bool) -> Result<()> {
    let destination = Destination::parse(destination).context("Invalid destination")?;
    let ctx = db::open_context(config).await?;

    let ledger = ComplianceAggregator::new(&ctx)
        .ledger(&destination)
        .await
        .context("Failed to read ledger")?;
    ctx.store().close().await;

    if json {
        println!("{}", serde_json::to_string_pretty(&ledger)?);
        return Ok(());
    }

    println!("📒 Compliance ledger for {}", ledger.destination);
    println!(
        "   Unsubscribed senders: {} / {}",
        ledger.count(),
        UNSUBSCRIBE_THRESHOLD
    );
    for sender_id in &ledger.unsubscribed_senders {
        println!("   - {}", sender_id);
    }
    match ledger.decision() {
        AdmissionDecision::Denied { reason } => println!("   Status: 🚫 BLOCKED ({})", reason.code()),
        AdmissionDecision::Admitted => println!("   Status: ✅ open"),
    }

    Ok(())
}
