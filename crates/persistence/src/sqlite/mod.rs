//! SQLite persistence module
//!
//! Repository pattern for SQLite access. Repositories take a
//! `&mut SqliteConnection` so callers choose the transaction boundary.

pub mod repos;
pub mod schema;

pub use repos::{
    create_pool, drop_schema, init_database, run_migrations, ComplianceRepo, GuardRepo,
    MessageRepo, ReportRepo, SenderRepo, StoreOptions,
};
pub use schema::{GuardRow, MessageRow, ReportRow, SenderRow};
