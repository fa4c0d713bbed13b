//! Gatekeeper - admission control for outbound messages
//!
//! `admit_and_send` is one atomic check-then-insert per destination:
//!
//! 1. validate input before any I/O
//! 2. take the in-process destination lock
//! 3. in one SQLite transaction: touch the guard row (write lock), count
//!    distinct unsubscribed senders, then deny (rollback) or insert and commit
//! 4. retry the transaction on storage conflicts only

use crate::api::{SendReceipt, SendRequest};
use crate::error::{GatekeeperError, GatekeeperResult};
use crate::service::ServiceContext;
use optgate_core::message::validate_body;
use optgate_core::{AdmissionDecision, Destination, MessageId, OutboundMessage, SenderId};
use optgate_persistence::{ComplianceRepo, GuardRepo, MessageRepo};
use tracing::{debug, info};

/// Gatekeeper - the only path that creates outbound messages
pub struct Gatekeeper<'a> {
    ctx: &'a ServiceContext,
}

impl<'a> Gatekeeper<'a> {
    pub fn new(ctx: &'a ServiceContext) -> Self {
        Self { ctx }
    }

    /// Admit and record a message, or deny it for a frequently unsubscribed
    /// destination.
    pub async fn admit_and_send(
        &self,
        sender_id: SenderId,
        destination: &str,
        body: &str,
    ) -> GatekeeperResult<MessageId> {
        let destination = Destination::parse(destination)?;
        let message = OutboundMessage::new(sender_id, destination, body)?;
        self.admit(&message).await
    }

    /// Wire form of [`Gatekeeper::admit_and_send`]
    pub async fn send(&self, request: &SendRequest) -> GatekeeperResult<SendReceipt> {
        let sender_id = request.sender_id()?;
        let message_id = self
            .admit_and_send(sender_id, &request.destination, &request.body)
            .await?;
        Ok(SendReceipt { message_id })
    }

    /// Admit a built message. Public fields can be edited after
    /// `OutboundMessage::new`, so the body is checked again.
    pub(crate) async fn admit(&self, message: &OutboundMessage) -> GatekeeperResult<MessageId> {
        validate_body(&message.body)?;
        let destination = &message.destination;
        let _guard = self.ctx.lock(destination).await;

        let this = self;
        let count = self
            .ctx
            .with_conflict_retry("admit", destination, move || this.try_admit(message))
            .await;

        match count {
            Ok(count) => {
                info!(
                    message_id = %message.id,
                    sender_id = %message.sender_id,
                    destination = %destination,
                    unsubscribed = count,
                    "message admitted"
                );
                Ok(message.id)
            }
            Err(err) => {
                if err.is_denied() {
                    info!(
                        sender_id = %message.sender_id,
                        destination = %destination,
                        code = err.code(),
                        "message denied"
                    );
                }
                Err(err)
            }
        }
    }

    /// One transactional attempt. Returns the count seen on admission.
    async fn try_admit(&self, message: &OutboundMessage) -> GatekeeperResult<usize> {
        let destination = &message.destination;
        let mut tx = self.ctx.store().begin().await?;

        let version = GuardRepo::touch(&mut *tx, destination).await?;
        let count = ComplianceRepo::count_distinct_unsubscribed_senders(&mut *tx, destination).await?;
        debug!(destination = %destination, version, unsubscribed = count, "admission check");

        match AdmissionDecision::for_count(count) {
            AdmissionDecision::Denied { reason } => {
                tx.rollback().await?;
                Err(GatekeeperError::denied(reason))
            }
            AdmissionDecision::Admitted => {
                MessageRepo::insert(&mut *tx, message).await?;
                tx.commit().await?;
                Ok(count)
            }
        }
    }
}
