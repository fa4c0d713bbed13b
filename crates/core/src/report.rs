//! # Report Module
//!
//! Delivery reports are append-only outcome events emitted by the carrier for
//! an outbound message. A message may collect any number of them (duplicates,
//! retries, later outcomes).

use crate::error::{CoreError, CoreResult};
use crate::id::uuid_id;
use crate::message::MessageId;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

uuid_id!(
    /// Unique id of a delivery report
    ReportId,
    "report"
);

/// Outcome kind reported by the carrier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutcomeKind {
    Delivered,
    Failed,
}

impl OutcomeKind {
    /// Code string for DB
    pub fn as_str(&self) -> &'static str {
        match self {
            OutcomeKind::Delivered => "delivered",
            OutcomeKind::Failed => "failed",
        }
    }

    pub fn parse(s: &str) -> CoreResult<Self> {
        match s.trim().to_lowercase().as_str() {
            "delivered" => Ok(OutcomeKind::Delivered),
            "failed" => Ok(OutcomeKind::Failed),
            _ => Err(CoreError::UnknownOutcome(s.to_string())),
        }
    }
}

impl FromStr for OutcomeKind {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl fmt::Display for OutcomeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Carrier failure reason codes the platform recognizes.
///
/// - `Unsubscribed` (21610): the recipient opted out. Counts toward the
///   compliance ledger.
/// - `Spam` (30007): the recipient reported spam. Stored but never counted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "i64", into = "i64")]
pub enum ReasonCode {
    Unsubscribed,
    Spam,
}

impl ReasonCode {
    pub const UNSUBSCRIBED_CODE: i64 = 21610;
    pub const SPAM_CODE: i64 = 30007;

    pub fn code(&self) -> i64 {
        match self {
            ReasonCode::Unsubscribed => Self::UNSUBSCRIBED_CODE,
            ReasonCode::Spam => Self::SPAM_CODE,
        }
    }

    pub fn from_code(code: i64) -> CoreResult<Self> {
        match code {
            Self::UNSUBSCRIBED_CODE => Ok(ReasonCode::Unsubscribed),
            Self::SPAM_CODE => Ok(ReasonCode::Spam),
            other => Err(CoreError::UnknownReasonCode(other)),
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            ReasonCode::Unsubscribed => "unsubscribed",
            ReasonCode::Spam => "spam",
        }
    }
}

impl TryFrom<i64> for ReasonCode {
    type Error = CoreError;

    fn try_from(value: i64) -> Result<Self, Self::Error> {
        Self::from_code(value)
    }
}

impl From<ReasonCode> for i64 {
    fn from(value: ReasonCode) -> Self {
        value.code()
    }
}

impl fmt::Display for ReasonCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.label(), self.code())
    }
}

/// Delivery outcome event for one message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeliveryReport {
    pub id: ReportId,
    pub message_id: MessageId,
    pub outcome: OutcomeKind,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason_code: Option<ReasonCode>,
    pub created_at: DateTime<Utc>,
}

impl DeliveryReport {
    pub fn new(message_id: MessageId, outcome: OutcomeKind, reason_code: Option<ReasonCode>) -> Self {
        Self {
            id: ReportId::new(),
            message_id,
            outcome,
            reason_code,
            created_at: Utc::now(),
        }
    }

    pub fn delivered(message_id: MessageId) -> Self {
        Self::new(message_id, OutcomeKind::Delivered, None)
    }

    pub fn unsubscribed(message_id: MessageId) -> Self {
        Self::new(message_id, OutcomeKind::Failed, Some(ReasonCode::Unsubscribed))
    }

    pub fn spam(message_id: MessageId) -> Self {
        Self::new(message_id, OutcomeKind::Failed, Some(ReasonCode::Spam))
    }

    /// Whether this report signals recipient opt-out.
    ///
    /// Requires both a `failed` outcome and the unsubscribed code; a
    /// `delivered` report carrying 21610 does not qualify.
    pub fn is_unsubscribe(&self) -> bool {
        self.outcome == OutcomeKind::Failed && self.reason_code == Some(ReasonCode::Unsubscribed)
    }
}
