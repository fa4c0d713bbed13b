//! # Sender Module
//!
//! A sender (profile) is an identity on whose behalf messages are sent.
//! Senders are provisioned outside the gatekeeper and only referenced by
//! messages.

use crate::id::uuid_id;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

uuid_id!(
    /// Unique id of a sender profile
    SenderId,
    "sender"
);

/// Sender profile.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Sender {
    pub id: SenderId,
    /// Display name
    pub name: String,
    pub created_at: DateTime<Utc>,
}

impl Sender {
    /// Create a new sender with a fresh id
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            id: SenderId::new(),
            name: name.into(),
            created_at: Utc::now(),
        }
    }
}

impl fmt::Display for Sender {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.name, self.id)
    }
}
