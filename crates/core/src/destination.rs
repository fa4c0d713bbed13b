//! # Destination Module
//!
//! A destination is the recipient phone number. All compliance state is keyed
//! by the normalized form, so `(555) 123-4567` and `555.123.4567` are the same
//! destination.

use crate::error::{CoreError, CoreResult};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Minimum digit count accepted (short local numbers)
const MIN_DIGITS: usize = 7;

/// Maximum digit count per E.164
const MAX_DIGITS: usize = 15;

/// Normalized destination phone number.
///
/// Only an optional leading `+` followed by 7..=15 digits survives
/// normalization. Visual separators (space, `-`, `.`, `(`, `)`) are dropped.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Destination(String);

impl Destination {
    /// Normalize raw input into a destination
    pub fn parse(raw: &str) -> CoreResult<Self> {
        let trimmed = raw.trim();
        if trimmed.is_empty() {
            return Err(CoreError::EmptyDestination);
        }

        let mut normalized = String::with_capacity(trimmed.len());
        for (i, ch) in trimmed.chars().enumerate() {
            match ch {
                '+' if i == 0 => normalized.push('+'),
                '0'..='9' => normalized.push(ch),
                ' ' | '-' | '.' | '(' | ')' => {}
                // Extensions such as "x123" are refused, not stripped
                _ => {
                    return Err(CoreError::invalid_destination(
                        raw,
                        &format!("unexpected character '{}'", ch),
                    ))
                }
            }
        }

        let digits = normalized.trim_start_matches('+').len();
        if digits == 0 {
            return Err(CoreError::EmptyDestination);
        }
        if digits < MIN_DIGITS {
            return Err(CoreError::invalid_destination(
                raw,
                &format!("too few digits ({} < {})", digits, MIN_DIGITS),
            ));
        }
        if digits > MAX_DIGITS {
            return Err(CoreError::invalid_destination(
                raw,
                &format!("too many digits ({} > {})", digits, MAX_DIGITS),
            ));
        }

        Ok(Self(normalized))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl FromStr for Destination {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl TryFrom<String> for Destination {
    type Error = CoreError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

impl From<Destination> for String {
    fn from(value: Destination) -> Self {
        value.0
    }
}

impl AsRef<str> for Destination {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Destination {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}
