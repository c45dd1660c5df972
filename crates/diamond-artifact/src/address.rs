//! 20-byte ledger account addresses

use crate::hash::{strip_0x, HashError};
use std::fmt::{self, Display, Formatter};
use std::str::FromStr;

/// A ledger account address
///
/// Always rendered lower-case with a `0x` prefix; snapshot store keys rely
/// on that normalization.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct Address([u8; 20]);

impl Address {
    /// The null address, target of Remove instructions
    pub const ZERO: Self = Self([0; 20]);

    /// Create from raw bytes
    #[inline]
    #[must_use]
    pub const fn new(bytes: [u8; 20]) -> Self {
        Self(bytes)
    }

    /// Raw bytes
    #[inline]
    #[must_use]
    pub const fn as_bytes(&self) -> &[u8; 20] {
        &self.0
    }

    /// Create from a byte slice
    ///
    /// # Errors
    /// Returns error if slice length is not exactly 20 bytes
    pub fn from_slice(bytes: &[u8]) -> Result<Self, HashError> {
        let arr: [u8; 20] = bytes.try_into().map_err(|_| HashError::InvalidLength {
            expected: 20,
            actual: bytes.len(),
        })?;
        Ok(Self(arr))
    }

    /// Whether this is the null address
    #[inline]
    #[must_use]
    pub fn is_zero(&self) -> bool {
        self.0 == [0; 20]
    }
}

impl Display for Address {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "0x{}", hex::encode(self.0))
    }
}

impl FromStr for Address {
    type Err = HashError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let bytes = hex::decode(strip_0x(s.trim()))?;
        Self::from_slice(&bytes)
    }
}

impl serde::Serialize for Address {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        serializer.serialize_str(&self.to_string())
    }
}

impl<'de> serde::Deserialize<'de> for Address {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_mixed_case_and_renders_lower_case() {
        let addr: Address = "0xAbCdEf0000000000000000000000000000000001".parse().unwrap();
        assert_eq!(addr.to_string(), "0xabcdef0000000000000000000000000000000001");
    }

    #[test]
    fn rejects_wrong_length() {
        assert!("0x1234".parse::<Address>().is_err());
    }

    #[test]
    fn zero_address() {
        assert!(Address::ZERO.is_zero());
        assert_eq!(
            Address::ZERO.to_string(),
            "0x0000000000000000000000000000000000000000"
        );
    }
}
