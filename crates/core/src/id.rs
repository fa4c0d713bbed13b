//! UUID-backed identifier newtypes.

/// Defines a `Copy` identifier wrapping a v4 UUID, stored as TEXT in SQLite.
macro_rules! uuid_id {
    ($(#[$meta:meta])* $name:ident, $entity:literal) => {
        $(#[$meta])*
        #[derive(
            Debug,
            Clone,
            Copy,
            PartialEq,
            Eq,
            PartialOrd,
            Ord,
            Hash,
            serde::Serialize,
            serde::Deserialize,
        )]
        #[serde(transparent)]
        pub struct $name(uuid::Uuid);

        impl $name {
            /// Generate a fresh random id
            pub fn new() -> Self {
                Self(uuid::Uuid::new_v4())
            }

            /// Parse from the stored string form
            pub fn parse(value: &str) -> $crate::error::CoreResult<Self> {
                uuid::Uuid::parse_str(value.trim())
                    .map(Self)
                    .map_err(|_| $crate::error::CoreError::invalid_id($entity, value))
            }
        }

        impl Default for $name {
            fn default() -> Self {
                Self::new()
            }
        }

        impl From<uuid::Uuid> for $name {
            fn from(value: uuid::Uuid) -> Self {
                Self(value)
            }
        }

        impl std::str::FromStr for $name {
            type Err = $crate::error::CoreError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                Self::parse(s)
            }
        }

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                write!(f, "{}", self.0)
            }
        }
    };
}

pub(crate) use uuid_id;
