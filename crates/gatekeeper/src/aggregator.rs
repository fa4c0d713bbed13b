//! Compliance Aggregator
//!
//! Read-only view of a destination's distinct-unsubscribe ledger against
//! committed data. The Gatekeeper does its own count inside its transaction;
//! this is for inspection and reporting.

use crate::error::GatekeeperResult;
use crate::service::ServiceContext;
use optgate_core::{ComplianceLedger, Destination};

pub struct ComplianceAggregator<'a> {
    ctx: &'a ServiceContext,
}

impl<'a> ComplianceAggregator<'a> {
    pub fn new(ctx: &'a ServiceContext) -> Self {
        Self { ctx }
    }

    /// Distinct senders with an unsubscribe report to `destination`
    pub async fn count(&self, destination: &Destination) -> GatekeeperResult<usize> {
        Ok(self
            .ctx
            .store()
            .count_distinct_unsubscribed_senders(destination)
            .await?)
    }

    /// The full ledger (sender set plus threshold status)
    pub async fn ledger(&self, destination: &Destination) -> GatekeeperResult<ComplianceLedger> {
        let senders = self.ctx.store().unsubscribed_senders(destination).await?;
        Ok(ComplianceLedger::from_senders(destination.clone(), senders))
    }

    /// Ledger rebuilt in memory from the raw messages and reports
    pub async fn replay(&self, destination: &Destination) -> GatekeeperResult<ComplianceLedger> {
        let store = self.ctx.store();
        let messages = store.list_messages_to(destination).await?;
        let reports = store.list_reports_to(destination).await?;
        Ok(ComplianceLedger::from_records(
            destination.clone(),
            &messages,
            &reports,
        ))
    }
}
