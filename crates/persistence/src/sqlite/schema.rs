//! Database schema definitions
//!
//! Row types for sqlx mapping from SQLite tables.
//! The schema is defined in migrations/20260301000000_init.sql

use chrono::{DateTime, Utc};
use optgate_core::{
    DeliveryReport, Destination, MessageId, OutboundMessage, OutcomeKind, ReasonCode, ReportId,
    Sender, SenderId,
};
use serde::{Deserialize, Serialize};

use crate::error::PersistenceError;

/// Row type for table `senders`
#[derive(Debug, Clone, sqlx::FromRow, Serialize, Deserialize)]
pub struct SenderRow {
    pub id: String,
    pub name: String,
    pub created_at: DateTime<Utc>,
}

/// Row type for table `outbound_messages`
#[derive(Debug, Clone, sqlx::FromRow, Serialize, Deserialize)]
pub struct MessageRow {
    pub id: String,
    pub sender_id: String,
    pub destination: String,
    pub body: String,
    pub created_at: DateTime<Utc>,
}

/// Row type for table `delivery_reports`
#[derive(Debug, Clone, sqlx::FromRow, Serialize, Deserialize)]
pub struct ReportRow {
    pub id: String,
    pub message_id: String,
    pub outcome_kind: String,
    pub reason_code: Option<i64>,
    pub created_at: DateTime<Utc>,
}

/// Row type for table `destination_guards`
#[derive(Debug, Clone, sqlx::FromRow, Serialize, Deserialize)]
pub struct GuardRow {
    pub destination: String,
    pub version: i64,
    pub updated_at: DateTime<Utc>,
}

// === Conversion implementations ===

impl From<&Sender> for SenderRow {
    fn from(sender: &Sender) -> Self {
        Self {
            id: sender.id.to_string(),
            name: sender.name.clone(),
            created_at: sender.created_at,
        }
    }
}

impl TryFrom<SenderRow> for Sender {
    type Error = PersistenceError;

    fn try_from(row: SenderRow) -> Result<Self, Self::Error> {
        Ok(Sender {
            id: SenderId::parse(&row.id)?,
            name: row.name,
            created_at: row.created_at,
        })
    }
}

impl From<&OutboundMessage> for MessageRow {
    fn from(message: &OutboundMessage) -> Self {
        Self {
            id: message.id.to_string(),
            sender_id: message.sender_id.to_string(),
            destination: message.destination.to_string(),
            body: message.body.clone(),
            created_at: message.created_at,
        }
    }
}

impl TryFrom<MessageRow> for OutboundMessage {
    type Error = PersistenceError;

    fn try_from(row: MessageRow) -> Result<Self, Self::Error> {
        Ok(OutboundMessage {
            id: MessageId::parse(&row.id)?,
            sender_id: SenderId::parse(&row.sender_id)?,
            destination: Destination::parse(&row.destination)?,
            body: row.body,
            created_at: row.created_at,
        })
    }
}

impl From<&DeliveryReport> for ReportRow {
    fn from(report: &DeliveryReport) -> Self {
        Self {
            id: report.id.to_string(),
            message_id: report.message_id.to_string(),
            outcome_kind: report.outcome.as_str().to_string(),
            reason_code: report.reason_code.map(|code| code.code()),
            created_at: report.created_at,
        }
    }
}

impl TryFrom<ReportRow> for DeliveryReport {
    type Error = PersistenceError;

    fn try_from(row: ReportRow) -> Result<Self, Self::Error> {
        Ok(DeliveryReport {
            id: ReportId::parse(&row.id)?,
            message_id: MessageId::parse(&row.message_id)?,
            outcome: OutcomeKind::parse(&row.outcome_kind)?,
            reason_code: row.reason_code.map(ReasonCode::from_code).transpose()?,
            created_at: row.created_at,
        })
    }
}
