//! # Compliance Module
//!
//! The compliance ledger of a destination is the set of distinct senders that
//! have at least one message to it with a `failed` + unsubscribed report.
//! It is derived, never stored. Once the set reaches
//! [`UNSUBSCRIBE_THRESHOLD`] senders, nobody may message that destination.
//!
//! ```text
//! messages to N          reports                     ledger(N)
//! ├── A#1  ───────────── failed/21610  ───────────►  {A}
//! ├── B#1  ───────────── failed/21610  ───────────►  {A, B}
//! ├── B#2  ───────────── failed/21610  (same B) ──►  {A, B}
//! └── C#1  ───────────── failed/30007  (spam)   ──►  {A, B}
//! ```

use crate::destination::Destination;
use crate::message::{MessageId, OutboundMessage};
use crate::report::DeliveryReport;
use crate::sender::SenderId;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeSet, HashMap};
use std::fmt;

/// Distinct unsubscribed senders at which a destination is blocked
pub const UNSUBSCRIBE_THRESHOLD: usize = 3;

/// Why an admission was denied.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum DenialReason {
    FrequentlyUnsubscribedRecipient,
}

impl DenialReason {
    /// Stable wire code
    pub fn code(&self) -> &'static str {
        match self {
            DenialReason::FrequentlyUnsubscribedRecipient => "FREQUENTLY_UNSUBSCRIBED_RECIPIENT",
        }
    }

    /// Fixed human-readable message surfaced to callers
    pub fn message(&self) -> &'static str {
        match self {
            DenialReason::FrequentlyUnsubscribedRecipient => {
                "Cannot send message - frequently unsubscribed recipient"
            }
        }
    }
}

impl fmt::Display for DenialReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.message())
    }
}

/// Outcome of evaluating a destination's ledger.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum AdmissionDecision {
    Admitted,
    Denied { reason: DenialReason },
}

impl AdmissionDecision {
    /// Decide from a distinct-unsubscribe count
    pub fn for_count(distinct_unsubscribed: usize) -> Self {
        if distinct_unsubscribed >= UNSUBSCRIBE_THRESHOLD {
            AdmissionDecision::Denied {
                reason: DenialReason::FrequentlyUnsubscribedRecipient,
            }
        } else {
            AdmissionDecision::Admitted
        }
    }

    pub fn is_admitted(&self) -> bool {
        matches!(self, AdmissionDecision::Admitted)
    }

    pub fn is_denied(&self) -> bool {
        matches!(self, AdmissionDecision::Denied { .. })
    }
}

/// Derived per-destination set of distinct unsubscribed senders.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ComplianceLedger {
    pub destination: Destination,
    pub unsubscribed_senders: BTreeSet<SenderId>,
}

impl ComplianceLedger {
    /// Build from an already-aggregated sender list (e.g. a SQL result)
    pub fn from_senders(destination: Destination, senders: impl IntoIterator<Item = SenderId>) -> Self {
        Self {
            destination,
            unsubscribed_senders: senders.into_iter().collect(),
        }
    }

    /// Aggregate from raw records.
    ///
    /// Messages to other destinations and reports on unknown messages are
    /// ignored, so callers may pass unfiltered slices.
    pub fn from_records(
        destination: Destination,
        messages: &[OutboundMessage],
        reports: &[DeliveryReport],
    ) -> Self {
        let senders_by_message: HashMap<MessageId, SenderId> = messages
            .iter()
            .filter(|m| m.destination == destination)
            .map(|m| (m.id, m.sender_id))
            .collect();

        let unsubscribed_senders = reports
            .iter()
            .filter(|r| r.is_unsubscribe())
            .filter_map(|r| senders_by_message.get(&r.message_id).copied())
            .collect();

        Self {
            destination,
            unsubscribed_senders,
        }
    }

    pub fn count(&self) -> usize {
        self.unsubscribed_senders.len()
    }

    pub fn contains(&self, sender: &SenderId) -> bool {
        self.unsubscribed_senders.contains(sender)
    }

    pub fn is_blocked(&self) -> bool {
        self.count() >= UNSUBSCRIBE_THRESHOLD
    }

    pub fn decision(&self) -> AdmissionDecision {
        AdmissionDecision::for_count(self.count())
    }
}
