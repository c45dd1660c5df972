//! Interface (ABI) parsing and canonicalization
//!
//! Turns a compiler-emitted ABI into the callable surface of a facet:
//! canonical function signatures with their selectors, and event
//! signatures. The ABI hash is taken over the canonical JSON form so key
//! order in the artifact file does not matter.

use crate::hash::ContentHash;
use crate::selector::Selector;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Function state mutability
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StateMutability {
    /// Reads nothing, writes nothing
    Pure,
    /// Reads state
    View,
    /// Writes state
    Nonpayable,
    /// Writes state, accepts value
    Payable,
}

/// One ABI parameter
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AbiParam {
    /// Solidity type, `tuple`, `tuple[]`, `uint256[2]`, ...
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(default)]
    pub name: String,
    /// Tuple members
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub components: Vec<AbiParam>,
}

impl AbiParam {
    /// Canonical type used in signatures: tuples expanded in place.
    #[must_use]
    pub fn canonical_type(&self) -> String {
        match self.kind.strip_prefix("tuple") {
            Some(suffix) => format!("({}){suffix}", canonical_list(&self.components)),
            None => self.kind.clone(),
        }
    }
}

fn canonical_list(params: &[AbiParam]) -> String {
    params
        .iter()
        .map(AbiParam::canonical_type)
        .collect::<Vec<_>>()
        .join(",")
}

/// One raw ABI entry
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AbiEntry {
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub inputs: Vec<AbiParam>,
    #[serde(default)]
    pub state_mutability: Option<StateMutability>,
}

impl AbiEntry {
    /// `name(type,...)`, for named entries
    #[must_use]
    pub fn signature(&self) -> Option<String> {
        let name = self.name.as_deref()?;
        Some(format!("{name}({})", canonical_list(&self.inputs)))
    }
}

/// A callable function of the interface
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AbiFunction {
    pub name: String,
    pub signature: String,
    pub selector: Selector,
    pub mutability: StateMutability,
}

/// The externally visible surface of one compiled module
#[derive(Debug, Clone, Default)]
pub struct AbiSurface {
    /// Functions in ABI order
    pub functions: Vec<AbiFunction>,
    /// Event signatures in ABI order
    pub events: Vec<String>,
    /// Hash over the canonical ABI JSON
    pub abi_hash: ContentHash,
}

impl AbiSurface {
    /// Parse a raw ABI value (the `abi` array of an artifact).
    ///
    /// # Errors
    /// Returns error if the value is not an array of well-formed entries
    pub fn parse(abi: &Value) -> Result<Self, AbiError> {
        if !abi.is_array() {
            return Err(AbiError::NotAnArray);
        }
        let entries: Vec<AbiEntry> =
            serde_json::from_value(abi.clone()).map_err(AbiError::Malformed)?;

        let mut surface = Self {
            abi_hash: ContentHash::compute_canonical(abi),
            ..Self::default()
        };

        for entry in &entries {
            match entry.kind.as_str() {
                "function" => {
                    let signature = entry.signature().ok_or(AbiError::UnnamedFunction)?;
                    surface.functions.push(AbiFunction {
                        name: entry.name.clone().unwrap_or_default(),
                        selector: Selector::from_signature(&signature),
                        signature,
                        mutability: entry
                            .state_mutability
                            .unwrap_or(StateMutability::Nonpayable),
                    });
                }
                "event" => {
                    if let Some(signature) = entry.signature() {
                        surface.events.push(signature);
                    }
                }
                _ => {}
            }
        }
        Ok(surface)
    }

    /// Function by selector
    #[must_use]
    pub fn function(&self, selector: Selector) -> Option<&AbiFunction> {
        self.functions.iter().find(|f| f.selector == selector)
    }
}

/// ABI parsing errors
#[derive(Debug, thiserror::Error)]
pub enum AbiError {
    #[error("abi is not an array")]
    NotAnArray,

    #[error("malformed abi entry: {0}")]
    Malformed(#[source] serde_json::Error),

    #[error("function entry without a name")]
    UnnamedFunction,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn erc20_like() -> Value {
        json!([
            {
                "type": "function",
                "name": "transfer",
                "stateMutability": "nonpayable",
                "inputs": [
                    {"name": "to", "type": "address"},
                    {"name": "amount", "type": "uint256"}
                ],
                "outputs": [{"name": "", "type": "bool"}]
            },
            {
                "type": "event",
                "name": "Transfer",
                "anonymous": false,
                "inputs": [
                    {"name": "from", "type": "address", "indexed": true},
                    {"name": "to", "type": "address", "indexed": true},
                    {"name": "value", "type": "uint256", "indexed": false}
                ]
            },
            {"type": "constructor", "inputs": []}
        ])
    }

    #[test]
    fn parses_functions_and_events() {
        let surface = AbiSurface::parse(&erc20_like()).unwrap();
        assert_eq!(surface.functions.len(), 1);
        let transfer = &surface.functions[0];
        assert_eq!(transfer.signature, "transfer(address,uint256)");
        assert_eq!(transfer.selector.to_string(), "0xa9059cbb");
        assert_eq!(transfer.mutability, StateMutability::Nonpayable);
        assert_eq!(surface.events, vec!["Transfer(address,address,uint256)"]);
    }

    #[test]
    fn expands_tuples_in_signatures() {
        let abi = json!([{
            "type": "function",
            "name": "diamondCut",
            "stateMutability": "nonpayable",
            "inputs": [
                {"name": "_diamondCut", "type": "tuple[]", "components": [
                    {"name": "facetAddress", "type": "address"},
                    {"name": "action", "type": "uint8"},
                    {"name": "functionSelectors", "type": "bytes4[]"}
                ]},
                {"name": "_init", "type": "address"},
                {"name": "_calldata", "type": "bytes"}
            ]
        }]);
        let surface = AbiSurface::parse(&abi).unwrap();
        assert_eq!(
            surface.functions[0].signature,
            "diamondCut((address,uint8,bytes4[])[],address,bytes)"
        );
        assert_eq!(surface.functions[0].selector.to_string(), "0x1f931c1c");
    }

    #[test]
    fn abi_hash_is_stable_under_key_reordering() {
        let a = json!([{"type": "function", "name": "f", "inputs": [], "stateMutability": "view"}]);
        let b = json!([{"stateMutability": "view", "inputs": [], "name": "f", "type": "function"}]);
        assert_eq!(
            AbiSurface::parse(&a).unwrap().abi_hash,
            AbiSurface::parse(&b).unwrap().abi_hash
        );
    }

    #[test]
    fn rejects_non_array() {
        assert!(matches!(
            AbiSurface::parse(&json!({"type": "function"})),
            Err(AbiError::NotAnArray)
        ));
    }
}
