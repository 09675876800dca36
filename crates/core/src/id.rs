//! Strongly-typed identifiers used across the domain.

use core::str::FromStr;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::DomainError;

/// Declares a UUID-backed identifier newtype.
///
/// All identifiers are UUIDv7 so that freshly minted ids sort by creation
/// time, which keeps event streams and read-model listings roughly
/// chronological without a separate timestamp sort.
macro_rules! uuid_id {
    ($(#[$doc:meta])* $name:ident) => {
        $(#[$doc])*
        #[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(Uuid);

        impl $name {
            /// Mint a fresh, time-ordered identifier.
            ///
            /// Tests that need determinism should construct ids explicitly
            /// via [`Self::from_uuid`] instead.
            pub fn new() -> Self {
                Self(Uuid::now_v7())
            }

            pub fn from_uuid(uuid: Uuid) -> Self {
                Self(uuid)
            }

            pub fn as_uuid(&self) -> &Uuid {
                &self.0
            }
        }

        impl Default for $name {
            fn default() -> Self {
                Self::new()
            }
        }

        impl core::fmt::Display for $name {
            fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
                core::fmt::Display::fmt(&self.0, f)
            }
        }

        impl From<Uuid> for $name {
            fn from(value: Uuid) -> Self {
                Self(value)
            }
        }

        impl From<$name> for Uuid {
            fn from(value: $name) -> Self {
                value.0
            }
        }

        impl FromStr for $name {
            type Err = DomainError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                Uuid::from_str(s)
                    .map(Self)
                    .map_err(|e| {
                        DomainError::invalid_id(format!("{}: {e}", stringify!($name)))
                    })
            }
        }
    };
}

uuid_id! {
    /// Identity of the user acting on the system.
    ///
    /// Every ledger movement and order transition records the `UserId`
    /// that caused it.
    UserId
}

uuid_id! {
    /// Identity of an aggregate root and of its event stream.
    AggregateId
}
