//! # OptGate Core
//!
//! Domain types for the repeated opt-out gatekeeper.
//!
//! ## Modules
//!
//! - [`sender`] - Sender profiles that originate messages
//! - [`destination`] - Normalized destination phone numbers
//! - [`message`] - Outbound messages accepted by the gatekeeper
//! - [`report`] - Delivery reports, outcome kinds and carrier reason codes
//! - [`compliance`] - The derived compliance ledger and admission decision
//! - [`error`] - Domain validation errors

mod id;

pub mod compliance;
pub mod destination;
pub mod error;
pub mod message;
pub mod report;
pub mod sender;

pub use compliance::{AdmissionDecision, ComplianceLedger, DenialReason, UNSUBSCRIBE_THRESHOLD};
pub use destination::Destination;
pub use error::{CoreError, CoreResult};
pub use message::{MessageId, OutboundMessage};
pub use report::{DeliveryReport, OutcomeKind, ReasonCode, ReportId};
pub use sender::{Sender, SenderId};
