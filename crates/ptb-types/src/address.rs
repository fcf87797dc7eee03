//! 32-byte ledger addresses and hex normalization.
//!
//! Addresses arrive in several spellings: short form (`0x2`), full 64-hex
//! form, or without the prefix. Everything internal uses [`ObjectAddr`];
//! parsing accepts any of the spellings and display always emits the full
//! lowercase form.

use serde::{Deserialize, Serialize};

use crate::error::{ResolveError, Result};

/// A 32-byte ledger object address.
///
/// BCS encodes this as 32 raw bytes with no length prefix.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ObjectAddr(pub [u8; 32]);

impl ObjectAddr {
    pub const ZERO: ObjectAddr = ObjectAddr([0u8; 32]);

    /// Parse from a hex string, with or without `0x`, short or full form.
    pub fn from_hex(s: &str) -> Result<Self> {
        let s = s.trim();
        let hex_part = s
            .strip_prefix("0x")
            .or_else(|| s.strip_prefix("0X"))
            .unwrap_or(s);
        if hex_part.is_empty() || hex_part.len() > 64 {
            return Err(ResolveError::Validation(format!(
                "invalid address `{s}`: expected at most 64 hex characters"
            )));
        }
        let padded = format!("{hex_part:0>64}");
        let bytes = hex::decode(&padded)
            .map_err(|e| ResolveError::Validation(format!("invalid address `{s}`: {e}")))?;
        let mut out = [0u8; 32];
        out.copy_from_slice(&bytes);
        Ok(ObjectAddr(out))
    }

    /// Construct from raw bytes; must be exactly 32 bytes.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        if bytes.len() != 32 {
            return Err(ResolveError::Validation(format!(
                "invalid address payload: expected 32 bytes, got {}",
                bytes.len()
            )));
        }
        let mut out = [0u8; 32];
        out.copy_from_slice(bytes);
        Ok(ObjectAddr(out))
    }

    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }

    /// Full canonical form: `0x` + 64 lowercase hex characters.
    pub fn to_hex(&self) -> String {
        format!("0x{}", hex::encode(self.0))
    }

    /// Short form with leading zeros trimmed (`0x2` instead of `0x00…02`).
    pub fn to_hex_short(&self) -> String {
        let full = hex::encode(self.0);
        let trimmed = full.trim_start_matches('0');
        if trimmed.is_empty() {
            "0x0".to_string()
        } else {
            format!("0x{trimmed}")
        }
    }
}

impl std::fmt::Display for ObjectAddr {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.to_hex())
    }
}

impl std::fmt::Debug for ObjectAddr {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "ObjectAddr({})", self.to_hex_short())
    }
}

impl std::str::FromStr for ObjectAddr {
    type Err = ResolveError;

    fn from_str(s: &str) -> Result<Self> {
        ObjectAddr::from_hex(s)
    }
}

/// Normalize an address string to lowercase, `0x`-prefixed, 64 hex chars.
pub fn normalize_address(addr: &str) -> String {
    let addr = addr.trim();
    let hex_part = addr
        .strip_prefix("0x")
        .or_else(|| addr.strip_prefix("0X"))
        .unwrap_or(addr)
        .to_lowercase();
    if hex_part.len() < 64 {
        format!("0x{hex_part:0>64}")
    } else {
        format!("0x{}", &hex_part[..64])
    }
}
