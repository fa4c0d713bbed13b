//! Subcommand handlers

pub mod ledger;
pub mod message;
pub mod sender;
