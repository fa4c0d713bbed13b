//! # Message Module
//!
//! An outbound message is one accepted send attempt. Messages exist only after
//! passing admission and are never mutated.

use crate::destination::Destination;
use crate::error::{CoreError, CoreResult};
use crate::id::uuid_id;
use crate::sender::SenderId;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

uuid_id!(
    /// Unique id of an outbound message
    MessageId,
    "message"
);

/// Outbound message accepted by the gatekeeper.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OutboundMessage {
    pub id: MessageId,
    pub sender_id: SenderId,
    /// Fixed at creation
    pub destination: Destination,
    pub body: String,
    pub created_at: DateTime<Utc>,
}

impl OutboundMessage {
    /// Build a new message record. Only the gatekeeper should persist these.
    pub fn new(sender_id: SenderId, destination: Destination, body: impl Into<String>) -> CoreResult<Self> {
        let body = body.into();
        validate_body(&body)?;

        Ok(Self {
            id: MessageId::new(),
            sender_id,
            destination,
            body,
            created_at: Utc::now(),
        })
    }
}

/// Body must contain something other than whitespace
pub fn validate_body(body: &str) -> CoreResult<()> {
    if body.trim().is_empty() {
        return Err(CoreError::EmptyBody);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_message_creation() {
        let sender = SenderId::new();
        let to = Destination::parse("+15551234567").unwrap();
        let msg = OutboundMessage::new(sender, to.clone(), "hello there").unwrap();

        assert_eq!(msg.sender_id, sender);
        assert_eq!(msg.destination, to);
        assert_eq!(msg.body, "hello there");
    }

    #[test]
    fn test_empty_body_rejected() {
        let to = Destination::parse("+15551234567").unwrap();
        let result = OutboundMessage::new(SenderId::new(), to, "  \n ");
        assert_eq!(result, Err(CoreError::EmptyBody));
    }
}
