//! Client-generated idempotency keys for retry-safe mutations.
//!
//! # Contract
//!
//! - The caller creates exactly one [`IdempotencyKey`] per *logical* mutating
//!   operation, before its first physical attempt.
//! - Every physical attempt of that operation carries the same key in the
//!   [`IDEMPOTENCY_KEY_HEADER`] header.
//! - The server deduplicates by key; a replayed key must not repeat the side
//!   effect.
//! - The key is discarded once the operation reaches a final outcome. Two
//!   different operations never share a key, even with identical bodies.

use std::fmt;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Header carrying the idempotency key.
pub const IDEMPOTENCY_KEY_HEADER: &str = "Idempotency-Key";

/// Opaque unique token identifying one logical mutating operation.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct IdempotencyKey(String);

impl IdempotencyKey {
    /// Generate a fresh random key (UUID v4).
    pub fn new() -> Self {
        Self(Uuid::new_v4().to_string())
    }

    /// Wrap a caller-provided key, e.g. one persisted across restarts.
    ///
    /// Returns `None` for blank input.
    pub fn from_existing(key: impl Into<String>) -> Option<Self> {
        let key = key.into();
        let key = key.trim();
        (!key.is_empty()).then(|| Self(key.to_string()))
    }

    /// The header value.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for IdempotencyKey {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for IdempotencyKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for IdempotencyKey {
    fn as_ref(&self) -> &str {
        &self.0
    }
}
