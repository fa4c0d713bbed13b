//! # OptGate Persistence
//!
//! Ledger Store for OptGate: senders, outbound messages and delivery reports
//! in SQLite, plus the per-destination guard rows that serialize
//! compliance-relevant writes.
//!
//! ## Architecture
//!
//! ```text
//! ┌───────────────────────────────────────────────────────┐
//! │                     LedgerStore                       │
//! │  ┌─────────────┐   ┌──────────────┐   ┌────────────┐  │
//! │  │ SqlitePool  │   │  migrations  │   │   Repos    │  │
//! │  │   (WAL)     │   │ (sqlx embed) │   │ (&mut conn)│  │
//! │  └─────────────┘   └──────────────┘   └────────────┘  │
//! └───────────────────────────────────────────────────────┘
//! ```
//!
//! ## Usage
//!
//! ```rust,ignore
//! use optgate_persistence::{LedgerStore, StoreOptions};
//!
//! let store = LedgerStore::open(&StoreOptions::new("sqlite:optgate.db?mode=rwc")).await?;
//! let count = store.count_distinct_unsubscribed_senders(&destination).await?;
//!
//! // Compose repository calls inside one transaction
//! let mut tx = store.begin().await?;
//! GuardRepo::touch(&mut tx, &destination).await?;
//! tx.commit().await?;
//! ```

pub mod error;
pub mod sqlite;

pub use error::{PersistenceError, PersistenceResult};
pub use sqlite::schema::{GuardRow, MessageRow, ReportRow, SenderRow};
pub use sqlite::{
    create_pool, init_database, run_migrations, ComplianceRepo, GuardRepo, MessageRepo,
    ReportRepo, SenderRepo, StoreOptions,
};

use optgate_core::{DeliveryReport, Destination, MessageId, OutboundMessage, Sender, SenderId};
use sqlx::{Sqlite, SqlitePool, Transaction};

/// Row counts per table
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StoreStats {
    pub senders: i64,
    pub messages: i64,
    pub reports: i64,
    pub guarded_destinations: i64,
}

/// Ledger Store facade over the SQLite pool
#[derive(Debug, Clone)]
pub struct LedgerStore {
    pool: SqlitePool,
}

impl LedgerStore {
    /// Connect and apply migrations
    pub async fn open(options: &StoreOptions) -> PersistenceResult<Self> {
        let pool = init_database(options).await?;
        Ok(Self { pool })
    }

    /// Connect without touching the schema
    pub async fn connect(options: &StoreOptions) -> PersistenceResult<Self> {
        let pool = create_pool(options).await?;
        Ok(Self { pool })
    }

    /// Get SQLite connection pool
    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    /// Start a transaction for composing repository calls
    pub async fn begin(&self) -> PersistenceResult<Transaction<'static, Sqlite>> {
        Ok(self.pool.begin().await?)
    }

    // === Schema ===

    pub async fn migrate(&self) -> PersistenceResult<()> {
        run_migrations(&self.pool).await
    }

    /// Drop all tables, migration history included
    pub async fn drop_schema(&self) -> PersistenceResult<()> {
        sqlite::drop_schema(&self.pool).await
    }

    /// Drop and re-create the schema
    pub async fn reset(&self) -> PersistenceResult<()> {
        self.drop_schema().await?;
        self.migrate().await
    }

    // === Senders ===

    pub async fn insert_sender(&self, sender: &Sender) -> PersistenceResult<()> {
        let mut conn = self.pool.acquire().await?;
        SenderRepo::insert(&mut conn, sender).await
    }

    pub async fn get_sender(&self, id: &SenderId) -> PersistenceResult<Sender> {
        let mut conn = self.pool.acquire().await?;
        SenderRepo::get_by_id(&mut conn, id).await
    }

    pub async fn list_senders(&self) -> PersistenceResult<Vec<Sender>> {
        let mut conn = self.pool.acquire().await?;
        SenderRepo::list(&mut conn).await
    }

    // === Messages and reports ===

    /// Store a message without any compliance check.
    ///
    /// Admission goes through the gatekeeper; this is the raw storage primitive.
    pub async fn insert_message(&self, message: &OutboundMessage) -> PersistenceResult<MessageId> {
        let mut conn = self.pool.acquire().await?;
        MessageRepo::insert(&mut conn, message).await?;
        Ok(message.id)
    }

    /// Append a report without taking the destination guard.
    pub async fn insert_report(&self, report: &DeliveryReport) -> PersistenceResult<()> {
        let mut conn = self.pool.acquire().await?;
        ReportRepo::insert(&mut conn, report).await
    }

    pub async fn get_message(&self, id: &MessageId) -> PersistenceResult<OutboundMessage> {
        let mut conn = self.pool.acquire().await?;
        MessageRepo::get_by_id(&mut conn, id).await
    }

    pub async fn list_messages_to(&self, destination: &Destination) -> PersistenceResult<Vec<OutboundMessage>> {
        let mut conn = self.pool.acquire().await?;
        MessageRepo::list_by_destination(&mut conn, destination).await
    }

    pub async fn list_reports_for(&self, message_id: &MessageId) -> PersistenceResult<Vec<DeliveryReport>> {
        let mut conn = self.pool.acquire().await?;
        ReportRepo::list_by_message(&mut conn, message_id).await
    }

    pub async fn list_reports_to(&self, destination: &Destination) -> PersistenceResult<Vec<DeliveryReport>> {
        let mut conn = self.pool.acquire().await?;
        ReportRepo::list_by_destination(&mut conn, destination).await
    }

    // === Compliance ===

    pub async fn count_distinct_unsubscribed_senders(&self, destination: &Destination) -> PersistenceResult<usize> {
        let mut conn = self.pool.acquire().await?;
        ComplianceRepo::count_distinct_unsubscribed_senders(&mut conn, destination).await
    }

    pub async fn unsubscribed_senders(&self, destination: &Destination) -> PersistenceResult<Vec<SenderId>> {
        let mut conn = self.pool.acquire().await?;
        ComplianceRepo::unsubscribed_senders(&mut conn, destination).await
    }

    pub async fn stats(&self) -> PersistenceResult<StoreStats> {
        let (senders, messages, reports, guarded_destinations): (i64, i64, i64, i64) = sqlx::query_as(
            r#"
            SELECT
                (SELECT COUNT(*) FROM senders),
                (SELECT COUNT(*) FROM outbound_messages),
                (SELECT COUNT(*) FROM delivery_reports),
                (SELECT COUNT(*) FROM destination_guards)
            "#,
        )
        .fetch_one(&self.pool)
        .await?;

        Ok(StoreStats {
            senders,
            messages,
            reports,
            guarded_destinations,
        })
    }

    pub async fn close(&self) {
        self.pool.close().await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn memory_store() -> LedgerStore {
        LedgerStore::open(&StoreOptions::new("sqlite::memory:")).await.unwrap()
    }

    #[tokio::test]
    async fn test_open_in_memory_and_stats() {
        let store = memory_store().await;
        assert_eq!(store.stats().await.unwrap(), StoreStats::default());

        let sender = Sender::new("Stats");
        store.insert_sender(&sender).await.unwrap();
        let to = Destination::parse("555 010 9999").unwrap();
        let message = OutboundMessage::new(sender.id, to.clone(), "hi").unwrap();
        store.insert_message(&message).await.unwrap();
        store.insert_report(&DeliveryReport::delivered(message.id)).await.unwrap();

        let stats = store.stats().await.unwrap();
        assert_eq!(stats.senders, 1);
        assert_eq!(stats.messages, 1);
        assert_eq!(stats.reports, 1);
        assert_eq!(stats.guarded_destinations, 0);
        assert_eq!(store.list_messages_to(&to).await.unwrap().len(), 1);
        assert_eq!(store.list_reports_to(&to).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_reset_clears_data() {
        let store = memory_store().await;
        store.insert_sender(&Sender::new("Temp")).await.unwrap();

        store.reset().await.unwrap();

        assert!(store.list_senders().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_get_missing_message() {
        let store = memory_store().await;
        let err = store.get_message(&MessageId::new()).await.unwrap_err();
        assert!(err.is_not_found());
    }
}
