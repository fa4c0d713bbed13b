//! Repository implementations for SQLite
//!
//! Every repository function takes `&mut SqliteConnection`, so the same code
//! runs on a pooled connection or inside a transaction (`&mut *tx`).

use crate::error::{PersistenceError, PersistenceResult};
use crate::sqlite::schema::*;
use chrono::Utc;
use optgate_core::{
    DeliveryReport, Destination, MessageId, OutboundMessage, OutcomeKind, ReasonCode, Sender,
    SenderId,
};
use sqlx::migrate::Migrator;
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions};
use sqlx::{SqliteConnection, SqlitePool};
use std::str::FromStr;
use std::time::Duration;
use tracing::{debug, info, warn};

static MIGRATOR: Migrator = sqlx::migrate!("../../migrations");

// ============================================================================
// Sender Repository
// ============================================================================

/// Repository for senders table
pub struct SenderRepo;

impl SenderRepo {
    /// Insert a new sender
    pub async fn insert(conn: &mut SqliteConnection, sender: &Sender) -> PersistenceResult<()> {
        let row = SenderRow::from(sender);
        sqlx::query("INSERT INTO senders (id, name, created_at) VALUES (?, ?, ?)")
            .bind(&row.id)
            .bind(&row.name)
            .bind(row.created_at)
            .execute(&mut *conn)
            .await?;
        Ok(())
    }

    /// Get sender by ID
    pub async fn get_by_id(conn: &mut SqliteConnection, id: &SenderId) -> PersistenceResult<Sender> {
        let row = sqlx::query_as::<_, SenderRow>("SELECT * FROM senders WHERE id = ?")
            .bind(id.to_string())
            .fetch_optional(&mut *conn)
            .await?
            .ok_or_else(|| PersistenceError::not_found("sender", &id.to_string()))?;
        row.try_into()
    }

    /// Check whether a sender exists
    pub async fn exists(conn: &mut SqliteConnection, id: &SenderId) -> PersistenceResult<bool> {
        let row: Option<(i64,)> = sqlx::query_as("SELECT 1 FROM senders WHERE id = ?")
            .bind(id.to_string())
            .fetch_optional(&mut *conn)
            .await?;
        Ok(row.is_some())
    }

    /// List all senders, oldest first
    pub async fn list(conn: &mut SqliteConnection) -> PersistenceResult<Vec<Sender>> {
        let rows = sqlx::query_as::<_, SenderRow>("SELECT * FROM senders ORDER BY created_at, id")
            .fetch_all(&mut *conn)
            .await?;
        rows.into_iter().map(Sender::try_from).collect()
    }
}

// ============================================================================
// Message Repository
// ============================================================================

/// Repository for outbound_messages table
pub struct MessageRepo;

impl MessageRepo {
    /// Insert a message record.
    ///
    /// Does not check compliance; only the gatekeeper calls this, inside its
    /// admission transaction.
    pub async fn insert(conn: &mut SqliteConnection, message: &OutboundMessage) -> PersistenceResult<()> {
        let row = MessageRow::from(message);
        let result = sqlx::query(
            "INSERT INTO outbound_messages (id, sender_id, destination, body, created_at) VALUES (?, ?, ?, ?, ?)",
        )
        .bind(&row.id)
        .bind(&row.sender_id)
        .bind(&row.destination)
        .bind(&row.body)
        .bind(row.created_at)
        .execute(&mut *conn)
        .await;

        match result {
            Ok(_) => Ok(()),
            Err(err) => match PersistenceError::from(err) {
                PersistenceError::ForeignKeyViolation(_) => Err(PersistenceError::not_found(
                    "sender",
                    &message.sender_id.to_string(),
                )),
                other => Err(other),
            },
        }
    }

    /// Find message by ID
    pub async fn find(conn: &mut SqliteConnection, id: &MessageId) -> PersistenceResult<Option<OutboundMessage>> {
        let row = sqlx::query_as::<_, MessageRow>("SELECT * FROM outbound_messages WHERE id = ?")
            .bind(id.to_string())
            .fetch_optional(&mut *conn)
            .await?;
        row.map(OutboundMessage::try_from).transpose()
    }

    /// Get message by ID
    pub async fn get_by_id(conn: &mut SqliteConnection, id: &MessageId) -> PersistenceResult<OutboundMessage> {
        Self::find(conn, id)
            .await?
            .ok_or_else(|| PersistenceError::not_found("message", &id.to_string()))
    }

    /// All messages to a destination, oldest first
    pub async fn list_by_destination(
        conn: &mut SqliteConnection,
        destination: &Destination,
    ) -> PersistenceResult<Vec<OutboundMessage>> {
        let rows = sqlx::query_as::<_, MessageRow>(
            "SELECT * FROM outbound_messages WHERE destination = ? ORDER BY created_at, id",
        )
        .bind(destination.as_str())
        .fetch_all(&mut *conn)
        .await?;
        rows.into_iter().map(OutboundMessage::try_from).collect()
    }
}

// ============================================================================
// Report Repository
// ============================================================================

/// Repository for delivery_reports table
pub struct ReportRepo;

impl ReportRepo {
    /// Append a delivery report.
    ///
    /// Duplicates are stored as separate rows. An unknown message id is
    /// reported as `NotFound`.
    pub async fn insert(conn: &mut SqliteConnection, report: &DeliveryReport) -> PersistenceResult<()> {
        let row = ReportRow::from(report);
        let result = sqlx::query(
            "INSERT INTO delivery_reports (id, message_id, outcome_kind, reason_code, created_at) VALUES (?, ?, ?, ?, ?)",
        )
        .bind(&row.id)
        .bind(&row.message_id)
        .bind(&row.outcome_kind)
        .bind(row.reason_code)
        .bind(row.created_at)
        .execute(&mut *conn)
        .await;

        match result {
            Ok(_) => Ok(()),
            Err(err) => match PersistenceError::from(err) {
                PersistenceError::ForeignKeyViolation(_) => Err(PersistenceError::not_found(
                    "message",
                    &report.message_id.to_string(),
                )),
                other => Err(other),
            },
        }
    }

    /// All reports on a message, oldest first
    pub async fn list_by_message(
        conn: &mut SqliteConnection,
        message_id: &MessageId,
    ) -> PersistenceResult<Vec<DeliveryReport>> {
        let rows = sqlx::query_as::<_, ReportRow>(
            "SELECT * FROM delivery_reports WHERE message_id = ? ORDER BY created_at, id",
        )
        .bind(message_id.to_string())
        .fetch_all(&mut *conn)
        .await?;
        rows.into_iter().map(DeliveryReport::try_from).collect()
    }

    /// All reports on messages to a destination
    pub async fn list_by_destination(
        conn: &mut SqliteConnection,
        destination: &Destination,
    ) -> PersistenceResult<Vec<DeliveryReport>> {
        let rows = sqlx::query_as::<_, ReportRow>(
            r#"
            SELECT r.* FROM delivery_reports r
            JOIN outbound_messages m ON m.id = r.message_id
            WHERE m.destination = ?
            ORDER BY r.created_at, r.id
            "#,
        )
        .bind(destination.as_str())
        .fetch_all(&mut *conn)
        .await?;
        rows.into_iter().map(DeliveryReport::try_from).collect()
    }
}

// ============================================================================
// Compliance Repository
// ============================================================================

/// Read-side queries over the derived compliance ledger
pub struct ComplianceRepo;

impl ComplianceRepo {
    /// Number of distinct senders with a failed/unsubscribed report to `destination`.
    ///
    /// Reads whatever the connection's transaction can see.
    pub async fn count_distinct_unsubscribed_senders(
        conn: &mut SqliteConnection,
        destination: &Destination,
    ) -> PersistenceResult<usize> {
        let row: (i64,) = sqlx::query_as(
            r#"
            SELECT COUNT(DISTINCT m.sender_id)
            FROM outbound_messages m
            JOIN delivery_reports r ON r.message_id = m.id
            WHERE m.destination = ?
              AND r.outcome_kind = ?
              AND r.reason_code = ?
            "#,
        )
        .bind(destination.as_str())
        .bind(OutcomeKind::Failed.as_str())
        .bind(ReasonCode::UNSUBSCRIBED_CODE)
        .fetch_one(&mut *conn)
        .await?;
        Ok(row.0.max(0) as usize)
    }

    /// The distinct unsubscribed senders themselves, ordered by id
    pub async fn unsubscribed_senders(
        conn: &mut SqliteConnection,
        destination: &Destination,
    ) -> PersistenceResult<Vec<SenderId>> {
        let rows: Vec<(String,)> = sqlx::query_as(
            r#"
            SELECT DISTINCT m.sender_id
            FROM outbound_messages m
            JOIN delivery_reports r ON r.message_id = m.id
            WHERE m.destination = ?
              AND r.outcome_kind = ?
              AND r.reason_code = ?
            ORDER BY m.sender_id
            "#,
        )
        .bind(destination.as_str())
        .bind(OutcomeKind::Failed.as_str())
        .bind(ReasonCode::UNSUBSCRIBED_CODE)
        .fetch_all(&mut *conn)
        .await?;

        rows.into_iter()
            .map(|(id,)| SenderId::parse(&id).map_err(PersistenceError::from))
            .collect()
    }
}

// ============================================================================
// Destination Guard Repository
// ============================================================================

/// Per-destination guard rows.
///
/// Touching the guard is the first statement of every compliance-relevant
/// write transaction: it takes SQLite's write lock before the count is read,
/// so no other writer can commit a report or message in between.
pub struct GuardRepo;

impl GuardRepo {
    /// Upsert the guard row and bump its version. Returns the new version.
    pub async fn touch(conn: &mut SqliteConnection, destination: &Destination) -> PersistenceResult<i64> {
        let row: (i64,) = sqlx::query_as(
            r#"
            INSERT INTO destination_guards (destination, version, updated_at)
            VALUES (?, 1, ?)
            ON CONFLICT(destination) DO UPDATE SET
                version = version + 1,
                updated_at = excluded.updated_at
            RETURNING version
            "#,
        )
        .bind(destination.as_str())
        .bind(Utc::now())
        .fetch_one(&mut *conn)
        .await?;
        Ok(row.0)
    }

    /// Guard row for a destination, if it was ever touched
    pub async fn get(conn: &mut SqliteConnection, destination: &Destination) -> PersistenceResult<Option<GuardRow>> {
        let row = sqlx::query_as::<_, GuardRow>("SELECT * FROM destination_guards WHERE destination = ?")
            .bind(destination.as_str())
            .fetch_optional(&mut *conn)
            .await?;
        Ok(row)
    }

    /// Current version, 0 if the destination was never touched
    pub async fn version(conn: &mut SqliteConnection, destination: &Destination) -> PersistenceResult<i64> {
        Ok(Self::get(conn, destination).await?.map(|row| row.version).unwrap_or(0))
    }
}

// ============================================================================
// Database initialization
// ============================================================================

/// Connection settings for the Ledger Store
#[derive(Debug, Clone)]
pub struct StoreOptions {
    /// SQLite URL, e.g. `sqlite:data/optgate.db?mode=rwc`
    pub database_url: String,
    pub max_connections: u32,
    /// How long a writer waits on SQLite's lock before reporting BUSY
    pub busy_timeout: Duration,
}

impl StoreOptions {
    pub fn new(database_url: impl Into<String>) -> Self {
        Self {
            database_url: database_url.into(),
            max_connections: 5,
            busy_timeout: Duration::from_secs(5),
        }
    }

    pub fn with_max_connections(mut self, max_connections: u32) -> Self {
        self.max_connections = max_connections;
        self
    }

    pub fn with_busy_timeout(mut self, busy_timeout: Duration) -> Self {
        self.busy_timeout = busy_timeout;
        self
    }

    fn is_in_memory(&self) -> bool {
        self.database_url.contains(":memory:") || self.database_url.contains("mode=memory")
    }
}

/// Create the connection pool (foreign keys on, WAL journal)
pub async fn create_pool(options: &StoreOptions) -> PersistenceResult<SqlitePool> {
    if options.max_connections == 0 {
        return Err(PersistenceError::Configuration(
            "max_connections must be at least 1".to_string(),
        ));
    }

    let mut connect = SqliteConnectOptions::from_str(&options.database_url)?
        .create_if_missing(true)
        .foreign_keys(true)
        .busy_timeout(options.busy_timeout);

    // Every in-memory connection is a separate database
    let max_connections = if options.is_in_memory() {
        1
    } else {
        connect = connect.journal_mode(SqliteJournalMode::Wal);
        options.max_connections
    };

    let pool = SqlitePoolOptions::new()
        .max_connections(max_connections)
        .connect_with(connect)
        .await?;
    debug!(url = %options.database_url, max_connections, "ledger store pool created");
    Ok(pool)
}

/// Run migrations
pub async fn run_migrations(pool: &SqlitePool) -> PersistenceResult<()> {
    MIGRATOR.run(pool).await?;
    info!(migrations = MIGRATOR.iter().count(), "ledger schema up to date");
    Ok(())
}

/// Drop every table, including the migration bookkeeping table
pub async fn drop_schema(pool: &SqlitePool) -> PersistenceResult<()> {
    let mut tx = pool.begin().await?;
    for table in [
        "delivery_reports",
        "outbound_messages",
        "destination_guards",
        "senders",
        "_sqlx_migrations",
    ] {
        sqlx::query(&format!("DROP TABLE IF EXISTS {}", table))
            .execute(&mut *tx)
            .await?;
    }
    tx.commit().await?;
    warn!("ledger schema dropped");
    Ok(())
}

/// Create pool and apply migrations
pub async fn init_database(options: &StoreOptions) -> PersistenceResult<SqlitePool> {
    let pool = create_pool(options).await?;
    run_migrations(&pool).await?;
    Ok(pool)
}
