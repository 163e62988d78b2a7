//! Deterministic content hashing for stored courses using blake3.
//!
//! A [`ContentHash`] identifies one exact stored state of a course and doubles
//! as its revision token: a writer passes back the hash it last read, and the
//! save fails with [`crate::StorageError::Conflict`] if the stored hash has
//! moved on.
//!
//! # Determinism
//!
//! - Row sets hash element ids and row JSON in position order, with a zero
//!   byte separating each field so adjacent fields cannot run together.
//! - YAML documents hash their raw bytes.

use std::fmt;

use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::types::ElementRow;

/// Hex-encoded blake3 digest of a course's stored content.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ContentHash(blake3::Hash);

impl ContentHash {
    /// Hashes raw bytes (YAML course documents).
    pub fn of_bytes(bytes: &[u8]) -> Self {
        ContentHash(blake3::hash(bytes))
    }

    /// Hashes a row set in position order.
    pub fn of_rows(rows: &[ElementRow]) -> Self {
        let mut ordered: Vec<&ElementRow> = rows.iter().collect();
        ordered.sort_by_key(|row| row.position);

        let mut hasher = blake3::Hasher::new();
        for row in ordered {
            hasher.update(row.element_id.as_bytes());
            hasher.update(&[0]);
            hasher.update(row.json.as_bytes());
            hasher.update(&[0]);
        }
        ContentHash(hasher.finalize())
    }

    /// Parses a hex digest as produced by `Display`.
    pub fn from_hex(hex: &str) -> Option<Self> {
        blake3::Hash::from_hex(hex).ok().map(ContentHash)
    }

    pub fn to_hex(&self) -> String {
        self.0.to_hex().to_string()
    }
}

impl fmt::Display for ContentHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0.to_hex())
    }
}

impl Serialize for ContentHash {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_hex())
    }
}

impl<'de> Deserialize<'de> for ContentHash {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let hex = String::deserialize(deserializer)?;
        ContentHash::from_hex(&hex)
            .ok_or_else(|| serde::de::Error::custom(format!("invalid content hash '{hex}'")))
    }
}
