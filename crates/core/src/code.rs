//! Unique item codes as scanned or typed at the boundary.

use core::str::FromStr;
use serde::{Deserialize, Serialize};

use crate::error::DomainError;

/// Normalized unique code of a stock item (kits carry one; the scanner
/// and order flows look items up by it).
///
/// Construction trims surrounding whitespace and uppercases the input, so
/// `"kit-01"` and `" KIT-01 "` name the same item. An input that is empty
/// after trimming is rejected.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct UniqueCode(String);

impl UniqueCode {
    pub fn parse(input: &str) -> Result<Self, DomainError> {
        let normalized = input.trim().to_uppercase();
        if normalized.is_empty() {
            return Err(DomainError::validation("item code must not be empty"));
        }
        Ok(Self(normalized))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl core::fmt::Display for UniqueCode {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(&self.0)
    }
}

impl FromStr for UniqueCode {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}
