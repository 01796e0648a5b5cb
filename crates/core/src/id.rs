//! Strongly-typed identifiers used across the domain.

use core::str::FromStr;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::DomainError;

/// Identifier of a placed order.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct OrderId(Uuid);

/// Identifier of one stock history (ledger) entry.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct HistoryEntryId(Uuid);

macro_rules! impl_uuid_newtype {
    ($t:ty, $name:literal) => {
        impl $t {
            /// Create a new identifier.
            ///
            /// Uses UUIDv7 (time-ordered). Prefer passing IDs explicitly in tests
            /// for determinism.
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

        impl Default for $t {
            fn default() -> Self {
                Self::new()
            }
        }

        impl core::fmt::Display for $t {
            fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
                core::fmt::Display::fmt(&self.0, f)
            }
        }

        impl From<Uuid> for $t {
            fn from(value: Uuid) -> Self {
                Self(value)
            }
        }

        impl FromStr for $t {
            type Err = DomainError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                let uuid = Uuid::from_str(s)
                    .map_err(|e| DomainError::invalid_id(format!("{}: {}", $name, e)))?;
                Ok(Self(uuid))
            }
        }
    };
}

impl_uuid_newtype!(OrderId, "OrderId");
impl_uuid_newtype!(HistoryEntryId, "HistoryEntryId");

/// Catalog identifier of a product or material (document id in the catalog).
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ItemId(String);

/// Name of a branch (store) of the chain. Branches are identified by name.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct BranchName(String);

/// Stable identity (usually the e-mail) of the operator performing a mutation.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct OperatorId(String);

macro_rules! impl_string_newtype {
    ($t:ty, $name:literal) => {
        impl $t {
            /// Build from a raw string, trimming surrounding whitespace.
            pub fn parse(raw: impl AsRef<str>) -> Result<Self, DomainError> {
                let trimmed = raw.as_ref().trim();
                if trimmed.is_empty() {
                    return Err(DomainError::invalid_id(concat!($name, " cannot be empty")));
                }
                Ok(Self(trimmed.to_string()))
            }

            pub fn as_str(&self) -> &str {
                &self.0
            }

            pub fn is_blank(&self) -> bool {
                self.0.trim().is_empty()
            }
        }

        impl core::fmt::Display for $t {
            fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
                f.write_str(&self.0)
            }
        }

        impl FromStr for $t {
            type Err = DomainError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                Self::parse(s)
            }
        }
    };
}

impl_string_newtype!(ItemId, "ItemId");
impl_string_newtype!(BranchName, "BranchName");
impl_string_newtype!(OperatorId, "OperatorId");

impl BranchName {
    /// Key under which this branch is stored in per-branch maps and document paths.
    ///
    /// Distinct branch names always get distinct keys. Both the aggregate writer and
    /// every reader must go through this function.
    pub fn storage_key(&self) -> String {
        sanitize_key(&self.0)
    }
}

/// Encode an arbitrary label for use as a map/document key.
///
/// Key-reserved punctuation (`/ . # $ [ ] ~ *`), `%` itself and control characters are
/// percent-escaped byte by byte (`/` becomes `%2F`), so the encoding is injective and
/// "A/B" and "A.B" never share a key. The empty label maps to a lone `%`, which no
/// escaped label can produce.
pub fn sanitize_key(raw: &str) -> String {
    if raw.is_empty() {
        return "%".to_string();
    }

    let mut key = String::with_capacity(raw.len());
    for c in raw.chars() {
        if matches!(c, '/' | '.' | '#' | '$' | '[' | ']' | '~' | '*' | '%') || c.is_control() {
            let mut buf = [0u8; 4];
            for byte in c.encode_utf8(&mut buf).bytes() {
                key.push_str(&format!("%{byte:02X}"));
            }
        } else {
            key.push(c);
        }
    }
    key
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn string_ids_are_trimmed_and_non_empty() {
        assert_eq!(BranchName::parse("  Gangnam ").unwrap().as_str(), "Gangnam");
        assert!(matches!(ItemId::parse("   "), Err(DomainError::InvalidId(_))));
    }

    #[test]
    fn storage_key_escapes_unsafe_characters() {
        let branch = BranchName::parse("Seoul/Gangnam.2 [main]").unwrap();
        assert_eq!(branch.storage_key(), "Seoul%2FGangnam%2E2 %5Bmain%5D");
        assert_eq!(sanitize_key("50%"), "50%25");
        assert_eq!(sanitize_key("a\tb"), "a%09b");
        assert_eq!(sanitize_key(""), "%");
    }

    #[test]
    fn distinct_names_never_share_a_key() {
        let names = ["A/B", "A.B", "A_B", "A%2FB", "A#B", "A B"];
        let keys: std::collections::HashSet<_> = names
            .iter()
            .map(|n| BranchName::parse(n).unwrap().storage_key())
            .collect();
        assert_eq!(keys.len(), names.len());
    }

    #[test]
    fn storage_key_is_stable_for_safe_names() {
        let branch = BranchName::parse("Mapo").unwrap();
        assert_eq!(branch.storage_key(), "Mapo");
        assert_eq!(branch.storage_key(), branch.storage_key());
    }

    #[test]
    fn uuid_ids_round_trip_through_display() {
        let id = OrderId::new();
        let parsed: OrderId = id.to_string().parse().unwrap();
        assert_eq!(id, parsed);
    }
}
