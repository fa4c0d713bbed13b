//! Request/response shapes for the external interfaces
//!
//! camelCase JSON, so a webhook or HTTP layer can deserialize payloads
//! directly.

use crate::error::{GatekeeperError, GatekeeperResult};
use optgate_core::{MessageId, OutcomeKind, ReasonCode, ReportId, SenderId};
use serde::{Deserialize, Serialize};

/// Send request `{ senderId, destination, body }`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SendRequest {
    pub sender_id: String,
    pub destination: String,
    pub body: String,
}

impl SendRequest {
    pub fn sender_id(&self) -> GatekeeperResult<SenderId> {
        Ok(SenderId::parse(&self.sender_id)?)
    }
}

/// Successful admission
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SendReceipt {
    pub message_id: MessageId,
}

/// Delivery report webhook payload
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReportRequest {
    pub message_id: String,
    pub outcome_kind: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reason_code: Option<i64>,
}

impl ReportRequest {
    /// Validate into typed parts
    pub fn parse(&self) -> GatekeeperResult<(MessageId, OutcomeKind, Option<ReasonCode>)> {
        let message_id = MessageId::parse(&self.message_id)?;
        let outcome = OutcomeKind::parse(&self.outcome_kind)?;
        let reason_code = self.reason_code.map(ReasonCode::from_code).transpose()?;
        Ok((message_id, outcome, reason_code))
    }
}

/// Report acknowledgment
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReportAck {
    pub report_id: ReportId,
    pub message_id: MessageId,
    /// Distinct unsubscribed senders for the message's destination after commit
    pub unsubscribed_count: usize,
}

/// Error body `{ code, message }`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorBody {
    pub code: String,
    pub message: String,
}

impl From<&GatekeeperError> for ErrorBody {
    fn from(err: &GatekeeperError) -> Self {
        Self {
            code: err.code().to_string(),
            message: err.to_string(),
        }
    }
}
