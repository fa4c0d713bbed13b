//! Sender provisioning commands

use anyhow::{Context, Result};
use optgate_core::Sender;
use optgate_gatekeeper::GatekeeperConfig;

use crate::db;
use crate::SenderAction;

/// Handle sender subcommands
pub async fn handle(config: &GatekeeperConfig, action: SenderAction) -> Result<()> {
    let ctx = db::open_context(config).await?;
    let store = ctx.store();

    match action {
        SenderAction::Create { name } => {
            let name = name.trim();
            if name.is_empty() {
                anyhow::bail!("Sender name must not be empty");
            }

            let sender = Sender::new(name);
            store
                .insert_sender(&sender)
                .await
                .context("Failed to create sender")?;

            println!("✅ Created sender");
            println!("   ID:   {}", sender.id);
            println!("   Name: {}", sender.name);
        }
        SenderAction::List => {
            let senders = store.list_senders().await.context("Failed to list senders")?;
            if senders.is_empty() {
                println!("No senders yet. Create one with 'optgate sender create --name <NAME>'");
            } else {
                println!("{:<38} {:<24} Created", "ID", "Name");
                println!("{}", "-".repeat(80));
                for sender in senders {
                    println!(
                        "{:<38} {:<24} {}",
                        sender.id.to_string(),
                        sender.name,
                        sender.created_at.format("%Y-%m-%d %H:%M:%S")
                    );
                }
            }
        }
    }

    store.close().await;
    Ok(())
}
