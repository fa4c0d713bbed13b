//! Send and report commands

use anyhow::{Context, Result};
use optgate_core::{MessageId, OutcomeKind, ReasonCode, SenderId};
use optgate_gatekeeper::{
    ErrorBody, Gatekeeper, GatekeeperConfig, GatekeeperError, ReportIngest, SendReceipt,
};
use std::process::ExitCode;

use crate::db;

/// Exit code for a compliance denial
const EXIT_DENIED: u8 = 2;

/// Admit and record a message. A denial prints the fixed message and exits
/// with status 2.
pub async fn send(
    config: &GatekeeperConfig,
    sender_id: &str,
    destination: &str,
    body: &str,
    json: bool,
) -> Result<ExitCode> {
    let sender_id = SenderId::parse(sender_id).context("Invalid sender ID")?;
    let ctx = db::open_context(config).await?;

    let result = Gatekeeper::new(&ctx)
        .admit_and_send(sender_id, destination, body)
        .await;
    ctx.store().close().await;

    match result {
        Ok(message_id) => {
            if json {
                println!("{}", serde_json::to_string_pretty(&SendReceipt { message_id })?);
            } else {
                println!("✅ Message admitted");
                println!("   Message ID: {}", message_id);
            }
            Ok(ExitCode::SUCCESS)
        }
        Err(err @ GatekeeperError::AdmissionDenied { .. }) => {
            if json {
                println!("{}", serde_json::to_string_pretty(&ErrorBody::from(&err))?);
            } else {
                eprintln!("🚫 {}", err);
                eprintln!("   Code: {}", err.code());
            }
            Ok(ExitCode::from(EXIT_DENIED))
        }
        Err(err) => {
            if json {
                println!("{}", serde_json::to_string_pretty(&ErrorBody::from(&err))?);
            }
            Err(anyhow::Error::new(err).context("Send failed"))
        }
    }
}

/// Ingest a delivery report
pub async fn report(
    config: &GatekeeperConfig,
    message_id: &str,
    outcome: OutcomeKind,
    reason_code: Option<i64>,
) -> Result<()> {
    let message_id = MessageId::parse(message_id).context("Invalid message ID")?;
    let reason_code = reason_code
        .map(ReasonCode::from_code)
        .transpose()
        .context("Invalid reason code")?;

    let ctx = db::open_context(config).await?;
    let receipt = ReportIngest::new(&ctx)
        .ingest(message_id, outcome, reason_code)
        .await
        .context("Report ingest failed")?;
    ctx.store().close().await;

    println!("✅ Report recorded");
    println!("   Report ID:    {}", receipt.report_id);
    println!("   Message ID:   {}", receipt.message_id);
    println!("   Outcome:      {}", outcome);
    if let Some(code) = reason_code {
        println!("   Reason:       {} ({})", code.code(), code.label());
    }
    println!("   Destination:  {}", receipt.destination);
    println!("   Unsubscribed: {} distinct sender(s)", receipt.unsubscribed_count);

    Ok(())
}
