//! # OptGate Gatekeeper
//!
//! Admission control for outbound messages. A destination that three or more
//! distinct senders saw unsubscribe is refused further messages.
//!
//! - [`Gatekeeper`] - atomic check-then-insert per destination
//! - [`ReportIngest`] - append delivery outcome events
//! - [`ComplianceAggregator`] - read the derived distinct-unsubscribe ledger
//!
//! ```rust,ignore
//! let ctx = ServiceContext::open(GatekeeperConfig::load(None)?).await?;
//! let message_id = Gatekeeper::new(&ctx)
//!     .admit_and_send(sender_id, "+1 555 000 1111", "hello")
//!     .await?;
//! ReportIngest::new(&ctx)
//!     .ingest(message_id, OutcomeKind::Failed, Some(ReasonCode::Unsubscribed))
//!     .await?;
//! ```

pub mod aggregator;
pub mod api;
pub mod config;
pub mod error;
pub mod gatekeeper;
pub mod ingest;
pub mod locks;
pub mod service;

pub use aggregator::ComplianceAggregator;
pub use api::{ErrorBody, ReportAck, ReportRequest, SendReceipt, SendRequest};
pub use config::{ConfigError, GatekeeperConfig};
pub use error::{GatekeeperError, GatekeeperResult};
pub use gatekeeper::Gatekeeper;
pub use ingest::{IngestReceipt, ReportIngest};
pub use locks::{DestinationGuard, DestinationLocks};
pub use service::ServiceContext;
