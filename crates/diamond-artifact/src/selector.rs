//! Function selectors
//!
//! A [`Selector`] is the 4-byte routing key of a diamond: the first four
//! bytes of keccak-256 over a function's canonical signature.

use crate::hash::{strip_0x, ContentHash, HashError};
use std::fmt::{self, Display, Formatter};
use std::str::FromStr;

/// 4-byte function identifier
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Selector([u8; 4]);

impl Selector {
    /// Create from raw bytes
    #[inline]
    #[must_use]
    pub const fn new(bytes: [u8; 4]) -> Self {
        Self(bytes)
    }

    /// Raw bytes
    #[inline]
    #[must_use]
    pub const fn as_bytes(&self) -> &[u8; 4] {
        &self.0
    }

    /// Derive the selector of a canonical signature such as
    /// `transfer(address,uint256)`.
    #[must_use]
    pub fn from_signature(signature: &str) -> Self {
        let digest = ContentHash::keccak256(signature.as_bytes());
        let mut out = [0u8; 4];
        out.copy_from_slice(&digest.as_bytes()[..4]);
        Self(out)
    }
}

impl Display for Selector {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "0x{}", hex::encode(self.0))
    }
}

impl FromStr for Selector {
    type Err = HashError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let bytes = hex::decode(strip_0x(s.trim()))?;
        let arr: [u8; 4] = bytes
            .as_slice()
            .try_into()
            .map_err(|_| HashError::InvalidLength {
                expected: 4,
                actual: bytes.len(),
            })?;
        Ok(Self(arr))
    }
}

impl serde::Serialize for Selector {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        serializer.serialize_str(&self.to_string())
    }
}

impl<'de> serde::Deserialize<'de> for Selector {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}

/// Key identifying a facet by the set of selectors it serves.
///
/// Sorted, lower-case, comma-joined. Used when bytecode hashes cannot be
/// matched (immutables, linked libraries).
#[must_use]
pub fn selector_key<'a, I>(selectors: I) -> String
where
    I: IntoIterator<Item = &'a Selector>,
{
    let mut sorted: Vec<&Selector> = selectors.into_iter().collect();
    sorted.sort();
    sorted.dedup();
    sorted
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(",")
}

/// A selector as written by a human in an upgrade plan: either a canonical
/// signature or a raw `0x`-prefixed id.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum SelectorRef {
    /// `name(type,...)`
    Signature(String),
    /// `0x12345678`
    Raw(Selector),
}

impl SelectorRef {
    /// Resolved 4-byte id
    #[must_use]
    pub fn selector(&self) -> Selector {
        match self {
            Self::Signature(sig) => Selector::from_signature(sig),
            Self::Raw(sel) => *sel,
        }
    }

    /// Signature, when the plan named one
    #[must_use]
    pub fn signature(&self) -> Option<&str> {
        match self {
            Self::Signature(sig) => Some(sig),
            Self::Raw(_) => None,
        }
    }
}

impl Display for SelectorRef {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            Self::Signature(sig) => f.write_str(sig),
            Self::Raw(sel) => write!(f, "{sel}"),
        }
    }
}

impl FromStr for SelectorRef {
    type Err = HashError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim();
        let is_raw = trimmed.len() == 10
            && (trimmed.starts_with("0x") || trimmed.starts_with("0X"))
            && trimmed[2..].chars().all(|c| c.is_ascii_hexdigit());
        if is_raw {
            return Ok(Self::Raw(trimmed.parse()?));
        }
        // Signatures are hashed verbatim; strip whitespace a human may add.
        Ok(Self::Signature(trimmed.replace(' ', "")))
    }
}

impl serde::Serialize for SelectorRef {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        serializer.serialize_str(&self.to_string())
    }
}

impl<'de> serde::Deserialize<'de> for SelectorRef {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}
