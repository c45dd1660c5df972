//! Low-level cut instructions
//!
//! Mirrors the `diamondCut` argument: an ordered list of
//! `{facetAddress, action, functionSelectors}` plus an optional
//! initialization call.

use diamond_artifact::{Address, Selector};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

/// Cut action, encoded on the wire as its discriminant
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[repr(u8)]
pub enum FacetCutAction {
    Add = 0,
    Replace = 1,
    Remove = 2,
}

impl FacetCutAction {
    /// Wire value
    #[inline]
    #[must_use]
    pub fn as_u8(self) -> u8 {
        self as u8
    }
}

/// One instruction of a cut
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FacetCut {
    pub facet_address: Address,
    pub action: FacetCutAction,
    pub selectors: Vec<Selector>,
}

/// Initialization call executed by the diamond after the cut
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InitCall {
    /// Zero address for no call
    pub address: Address,
    #[serde(with = "hex_bytes")]
    pub calldata: Vec<u8>,
}

impl InitCall {
    /// No initialization
    #[must_use]
    pub fn none() -> Self {
        Self::default()
    }

    /// Whether an initializer will run
    #[inline]
    #[must_use]
    pub fn is_set(&self) -> bool {
        !self.address.is_zero()
    }
}

/// Outcome of a submitted transaction
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CutReceipt {
    pub tx_hash: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub block_number: Option<u64>,
    pub success: bool,
}

/// Instructions for one freshly deployed facet.
///
/// Declared additions become `Add`; every other compiled selector was
/// already routed somewhere and becomes `Replace`, unless this is the
/// first deployment of the diamond.
#[must_use]
pub fn facet_cuts(
    address: Address,
    compiled: &[Selector],
    declared_adds: &[Selector],
    fresh_deployment: bool,
) -> Vec<FacetCut> {
    let adds: BTreeSet<Selector> = declared_adds.iter().copied().collect();
    let mut cuts = Vec::new();

    let mut add_list = Vec::new();
    for sel in declared_adds {
        if !add_list.contains(sel) {
            add_list.push(*sel);
        }
    }
    if !add_list.is_empty() {
        cuts.push(FacetCut {
            facet_address: address,
            action: FacetCutAction::Add,
            selectors: add_list,
        });
    }

    if !fresh_deployment {
        let replace: Vec<Selector> = compiled.iter().copied().filter(|s| !adds.contains(s)).collect();
        if !replace.is_empty() {
            cuts.push(FacetCut {
                facet_address: address,
                action: FacetCutAction::Replace,
                selectors: replace,
            });
        }
    }
    cuts
}

/// Single `Remove` instruction against the null address
#[must_use]
pub fn removal_cut(removals: &[Selector]) -> Option<FacetCut> {
    (!removals.is_empty()).then(|| FacetCut {
        facet_address: Address::ZERO,
        action: FacetCutAction::Remove,
        selectors: removals.to_vec(),
    })
}

mod hex_bytes {
    use serde::{Deserialize, Deserializer, Serializer};

    pub(super) fn serialize<S: Serializer>(bytes: &[u8], serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&format!("0x{}", hex::encode(bytes)))
    }

    pub(super) fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Vec<u8>, D::Error> {
        let s = String::deserialize(deserializer)?;
        diamond_artifact::decode_hex(&s).map_err(serde::de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sel(sig: &str) -> Selector {
        Selector::from_signature(sig)
    }

    #[test]
    fn new_facet_is_a_single_add() {
        let addr = Address::new([0xa1; 20]);
        let cuts = facet_cuts(addr, &[sel("f(uint256)")], &[sel("f(uint256)")], false);
        assert_eq!(
            cuts,
            vec![FacetCut {
                facet_address: addr,
                action: FacetCutAction::Add,
                selectors: vec![sel("f(uint256)")],
            }]
        );
    }

    #[test]
    fn existing_selectors_are_replaced_unless_fresh() {
        let addr = Address::new([0xb2; 20]);
        let compiled = [sel("a()"), sel("b()"), sel("d()")];
        let cuts = facet_cuts(addr, &compiled, &[sel("d()")], false);
        assert_eq!(cuts.len(), 2);
        assert_eq!(cuts[1].action, FacetCutAction::Replace);
        assert_eq!(cuts[1].selectors, vec![sel("a()"), sel("b()")]);

        let fresh = facet_cuts(addr, &compiled, &[sel("d()")], true);
        assert_eq!(fresh.len(), 1);
        assert_eq!(fresh[0].action, FacetCutAction::Add);
    }

    #[test]
    fn removals_target_null_address() {
        let cut = removal_cut(&[sel("c(uint256)")]).unwrap();
        assert!(cut.facet_address.is_zero());
        assert_eq!(cut.action.as_u8(), 2);
        assert!(removal_cut(&[]).is_none());
    }

    #[test]
    fn init_call_serializes_hex() {
        let init = InitCall {
            address: Address::new([1; 20]),
            calldata: vec![0xe1, 0xc7, 0x39, 0x2a],
        };
        let json = serde_json::to_value(&init).unwrap();
        assert_eq!(json["calldata"], "0xe1c7392a");
        let back: InitCall = serde_json::from_value(json).unwrap();
        assert_eq!(back, init);
        assert!(!InitCall::none().is_set());
    }
}
