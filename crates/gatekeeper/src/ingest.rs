//! Report Ingest - durable append of delivery outcome events
//!
//! Reports are serialized with admissions for the same destination: ingest
//! takes the destination lock and guard row before inserting, so a committed
//! unsubscribe is visible to every admission that starts after it.

use crate::api::{ReportAck, ReportRequest};
use crate::error::{GatekeeperError, GatekeeperResult};
use crate::service::ServiceContext;
use optgate_core::{
    DeliveryReport, Destination, MessageId, OutcomeKind, ReasonCode, ReportId,
};
use optgate_persistence::{ComplianceRepo, GuardRepo, MessageRepo, ReportRepo};
use tracing::{debug, info};

/// Result of an ingested report
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IngestReceipt {
    pub report_id: ReportId,
    pub message_id: MessageId,
    pub destination: Destination,
    /// Distinct unsubscribed senders for `destination` after commit
    pub unsubscribed_count: usize,
}

impl From<&IngestReceipt> for ReportAck {
    fn from(receipt: &IngestReceipt) -> Self {
        Self {
            report_id: receipt.report_id,
            message_id: receipt.message_id,
            unsubscribed_count: receipt.unsubscribed_count,
        }
    }
}

pub struct ReportIngest<'a> {
    ctx: &'a ServiceContext,
}

impl<'a> ReportIngest<'a> {
    pub fn new(ctx: &'a ServiceContext) -> Self {
        Self { ctx }
    }

    /// Append a report for an admitted message.
    ///
    /// Duplicates are stored as new rows; `NotFound` if the message is unknown.
    pub async fn ingest(
        &self,
        message_id: MessageId,
        outcome: OutcomeKind,
        reason_code: Option<ReasonCode>,
    ) -> GatekeeperResult<IngestReceipt> {
        let message = self.ctx.store().get_message(&message_id).await?;
        let destination = message.destination;
        let report = DeliveryReport::new(message_id, outcome, reason_code);

        let _guard = self.ctx.lock(&destination).await;

        let this = self;
        let report_ref = &report;
        let destination_ref = &destination;
        let count = self
            .ctx
            .with_conflict_retry("ingest", &destination, move || {
                this.try_ingest(report_ref, destination_ref)
            })
            .await?;

        info!(
            report_id = %report.id,
            message_id = %message_id,
            destination = %destination,
            outcome = %outcome,
            reason_code = report.reason_code.map(|code| code.code()),
            unsubscribed = count,
            "delivery report ingested"
        );

        Ok(IngestReceipt {
            report_id: report.id,
            message_id,
            destination,
            unsubscribed_count: count,
        })
    }

    /// Wire form of [`ReportIngest::ingest`]
    pub async fn ingest_request(&self, request: &ReportRequest) -> GatekeeperResult<ReportAck> {
        let (message_id, outcome, reason_code) = request.parse()?;
        let receipt = self.ingest(message_id, outcome, reason_code).await?;
        Ok(ReportAck::from(&receipt))
    }

    async fn try_ingest(
        &self,
        report: &DeliveryReport,
        destination: &Destination,
    ) -> GatekeeperResult<usize> {
        let mut tx = self.ctx.store().begin().await?;

        let version = GuardRepo::touch(&mut *tx, destination).await?;
        if MessageRepo::find(&mut *tx, &report.message_id).await?.is_none() {
            tx.rollback().await?;
            return Err(GatekeeperError::not_found(
                "message",
                &report.message_id.to_string(),
            ));
        }

        ReportRepo::insert(&mut *tx, report).await?;
        let count = ComplianceRepo::count_distinct_unsubscribed_senders(&mut *tx, destination).await?;
        tx.commit().await?;

        debug!(destination = %destination, version, unsubscribed = count, "report committed");
        Ok(count)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::GatekeeperConfig;
    use crate::gatekeeper::Gatekeeper;
    use optgate_core::Sender;
    use optgate_persistence::{LedgerStore, StoreOptions};

    async fn test_ctx() -> ServiceContext {
        let store = LedgerStore::open(&StoreOptions::new("sqlite::memory:"))
            .await
            .unwrap();
        ServiceContext::new(store, GatekeeperConfig::with_database_url("sqlite::memory:"))
    }

    async fn admitted(ctx: &ServiceContext, to: &str) -> MessageId {
        let sender = Sender::new("Sender");
        ctx.store().insert_sender(&sender).await.unwrap();
        Gatekeeper::new(ctx)
            .admit_and_send(sender.id, to, "hello")
            .await
            .unwrap()
    }

    #[tokio::test]
    async fn test_ingest_unknown_message() {
        let ctx = test_ctx().await;

        let err = ReportIngest::new(&ctx)
            .ingest(MessageId::new(), OutcomeKind::Delivered, None)
            .await
            .unwrap_err();

        assert!(err.is_not_found());
        assert_eq!(err.code(), "NOT_FOUND");
    }

    #[tokio::test]
    async fn test_duplicate_reports_counted_once() {
        let ctx = test_ctx().await;
        let message_id = admitted(&ctx, "+15550001111").await;
        let ingest = ReportIngest::new(&ctx);

        let first = ingest
            .ingest(message_id, OutcomeKind::Failed, Some(ReasonCode::Unsubscribed))
            .await
            .unwrap();
        let second = ingest
            .ingest(message_id, OutcomeKind::Failed, Some(ReasonCode::Unsubscribed))
            .await
            .unwrap();

        assert_ne!(first.report_id, second.report_id);
        assert_eq!(first.unsubscribed_count, 1);
        assert_eq!(second.unsubscribed_count, 1);
        assert_eq!(ctx.store().list_reports_for(&message_id).await.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_spam_and_delivered_do_not_count() {
        let ctx = test_ctx().await;
        let message_id = admitted(&ctx, "+15550001111").await;
        let ingest = ReportIngest::new(&ctx);

        let spam = ingest
            .ingest(message_id, OutcomeKind::Failed, Some(ReasonCode::Spam))
            .await
            .unwrap();
        let delivered = ingest
            .ingest(message_id, OutcomeKind::Delivered, Some(ReasonCode::Unsubscribed))
            .await
            .unwrap();

        assert_eq!(spam.unsubscribed_count, 0);
        assert_eq!(delivered.unsubscribed_count, 0);
    }

    #[tokio::test]
    async fn test_ingest_request() {
        let ctx = test_ctx().await;
        let message_id = admitted(&ctx, "+15550001111").await;

        let ack = ReportIngest::new(&ctx)
            .ingest_request(&ReportRequest {
                message_id: message_id.to_string(),
                outcome_kind: "failed".to_string(),
                reason_code: Some(ReasonCode::UNSUBSCRIBED_CODE),
            })
            .await
            .unwrap();

        assert_eq!(ack.message_id, message_id);
        assert_eq!(ack.unsubscribed_count, 1);
    }

    #[tokio::test]
    async fn test_ingest_request_rejects_bad_outcome() {
        let ctx = test_ctx().await;

        let err = ReportIngest::new(&ctx)
            .ingest_request(&ReportRequest {
                message_id: MessageId::new().to_string(),
                outcome_kind: "bounced".to_string(),
                reason_code: None,
            })
            .await
            .unwrap_err();

        assert_eq!(err.code(), "VALIDATION_ERROR");
    }
}
