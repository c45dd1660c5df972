//! Fingerprints
//!
//! [`ContentHash`] is the 32-byte digest behind every comparison the engine
//! makes: bytecode, ABI, function bodies and source spans.

use serde_json::Value;
use sha3::{Digest, Keccak256};
use std::fmt::{self, Display, Formatter};
use std::str::FromStr;

/// 32-byte fingerprint.
///
/// Blake3 for structural fingerprints, keccak-256 for bytecode so that
/// compiled and on-chain code hash identically.
#[derive(Debug, Clone, Copy, Hash, PartialEq, Eq, PartialOrd, Ord)]
pub struct ContentHash([u8; 32]);

impl ContentHash {
    /// All-zero placeholder
    pub const ZERO: Self = Self([0; 32]);

    /// Wrap a raw digest
    #[inline]
    #[must_use]
    pub const fn new(digest: [u8; 32]) -> Self {
        Self(digest)
    }

    /// Raw digest
    #[inline]
    #[must_use]
    pub const fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }

    /// Digest from a slice of exactly 32 bytes
    ///
    /// # Errors
    /// Returns [`HashError::InvalidLength`] for any other length
    pub fn from_slice(raw: &[u8]) -> Result<Self, HashError> {
        <[u8; 32]>::try_from(raw)
            .map(Self)
            .map_err(|_| HashError::InvalidLength {
                expected: 32,
                actual: raw.len(),
            })
    }

    /// Blake3 over `data`
    #[inline]
    #[must_use]
    pub fn compute(data: &[u8]) -> Self {
        Self(blake3::hash(data).into())
    }

    /// Keccak-256 over `data`, as the chain hashes code
    #[inline]
    #[must_use]
    pub fn keccak256(data: &[u8]) -> Self {
        Self(Keccak256::digest(data).into())
    }

    /// Hash a JSON value after canonicalizing it (object keys sorted
    /// recursively, no insignificant whitespace).
    #[must_use]
    pub fn compute_canonical(value: &Value) -> Self {
        Self::compute(canonical_json(value).as_bytes())
    }

    /// First 8 bytes as hex, for logs and listings
    #[inline]
    #[must_use]
    pub fn short(&self) -> String {
        hex::encode(&self.0[..8])
    }

    /// Whether this is the [`ContentHash::ZERO`] placeholder
    #[inline]
    #[must_use]
    pub fn is_zero(&self) -> bool {
        self.0 == [0; 32]
    }
}

impl Default for ContentHash {
    fn default() -> Self {
        Self::ZERO
    }
}

impl Display for ContentHash {
    fn fmt(&self, out: &mut Formatter<'_>) -> fmt::Result {
        out.write_str("0x")?;
        out.write_str(&hex::encode(self.0))
    }
}

impl FromStr for ContentHash {
    type Err = HashError;

    fn from_str(text: &str) -> Result<Self, HashError> {
        Self::from_slice(&decode_hex(text)?)
    }
}

// Serialized as the 0x-prefixed hex string
impl serde::Serialize for ContentHash {
    fn serialize<S: serde::Serializer>(&self, ser: S) -> Result<S::Ok, S::Error> {
        ser.collect_str(self)
    }
}

impl<'de> serde::Deserialize<'de> for ContentHash {
    fn deserialize<D: serde::Deserializer<'de>>(de: D) -> Result<Self, D::Error> {
        let text = <std::borrow::Cow<'de, str>>::deserialize(de)?;
        text.parse().map_err(serde::de::Error::custom)
    }
}

/// Strip an optional `0x` / `0X` prefix
#[inline]
#[must_use]
pub fn strip_0x(s: &str) -> &str {
    s.strip_prefix("0x")
        .or_else(|| s.strip_prefix("0X"))
        .unwrap_or(s)
}

/// Decode a `0x`-prefixed hex string into bytes
///
/// # Errors
/// Returns error on odd length or non-hex characters
pub fn decode_hex(s: &str) -> Result<Vec<u8>, HashError> {
    Ok(hex::decode(strip_0x(s.trim()))?)
}

/// Serialize a JSON value with object keys sorted recursively.
///
/// `serde_json`'s map ordering depends on crate features, so ordering is
/// enforced here instead of relying on it.
#[must_use]
pub fn canonical_json(value: &Value) -> String {
    let mut out = String::new();
    write_canonical(value, &mut out);
    out
}

fn write_canonical(value: &Value, out: &mut String) {
    match value {
        Value::Object(map) => {
            let mut keys: Vec<&String> = map.keys().collect();
            keys.sort();
            out.push('{');
            for (i, key) in keys.iter().enumerate() {
                if i > 0 {
                    out.push(',');
                }
                out.push_str(&Value::String((*key).clone()).to_string());
                out.push(':');
                write_canonical(&map[key.as_str()], out);
            }
            out.push('}');
        }
        Value::Array(items) => {
            out.push('[');
            for (i, item) in items.iter().enumerate() {
                if i > 0 {
                    out.push(',');
                }
                write_canonical(item, out);
            }
            out.push(']');
        }
        scalar => out.push_str(&scalar.to_string()),
    }
}

/// Malformed hex ids, hashes and addresses
#[derive(Debug, thiserror::Error)]
pub enum HashError {
    /// Wrong byte length
    #[error("expected {expected} bytes, found {actual}")]
    InvalidLength { expected: usize, actual: usize },

    #[error("bad hex: {0}")]
    HexDecode(#[from] hex::FromHexError),
}
