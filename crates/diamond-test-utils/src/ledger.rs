//! In-memory ledger
//!
//! A single chain holding diamonds and code. Deployments store the creation
//! code verbatim as the account's code. Cuts are applied atomically: any
//! invalid instruction reverts the whole cut (`success: false`).

use crate::facets::CHAIN_ID;
use async_trait::async_trait;
use diamond_artifact::{Address, Selector};
use diamond_cut::{CutReceipt, FacetCut, FacetCutAction, InitCall, LedgerWriter};
use diamond_snapshot::{BlockInfo, LedgerError, LedgerReader, LiveFacet};
use std::collections::{BTreeMap, HashMap};
use std::sync::Mutex;

#[derive(Debug, Default, Clone)]
struct Chain {
    block: u64,
    code: HashMap<Address, Vec<u8>>,
    /// selector -> facet, per diamond
    routes: HashMap<Address, BTreeMap<Selector, Address>>,
    /// facet order as first installed, per diamond
    order: HashMap<Address, Vec<Address>>,
    next_account: u32,
    submitted: Vec<Vec<FacetCut>>,
    revert_next: bool,
}

impl Chain {
    fn mine(&mut self) -> u64 {
        self.block += 1;
        self.block
    }

    fn route(&mut self, diamond: Address, selector: Selector, facet: Address) {
        self.routes.entry(diamond).or_default().insert(selector, facet);
        let order = self.order.entry(diamond).or_default();
        if !order.contains(&facet) {
            order.push(facet);
        }
    }

    fn apply(&mut self, diamond: Address, cuts: &[FacetCut]) -> Result<(), String> {
        for cut in cuts {
            for sel in &cut.selectors {
                let current = self.routes.get(&diamond).and_then(|r| r.get(sel)).copied();
                match cut.action {
                    FacetCutAction::Add => {
                        if current.is_some() {
                            return Err(format!("add: {sel} already exists"));
                        }
                        self.require_code(cut.facet_address)?;
                        self.route(diamond, *sel, cut.facet_address);
                    }
                    FacetCutAction::Replace => {
                        match current {
                            None => return Err(format!("replace: {sel} does not exist")),
                            Some(a) if a == cut.facet_address => {
                                return Err(format!("replace: {sel} already served by {a}"))
                            }
                            Some(_) => {}
                        }
                        self.require_code(cut.facet_address)?;
                        self.route(diamond, *sel, cut.facet_address);
                    }
                    FacetCutAction::Remove => {
                        if !cut.facet_address.is_zero() {
                            return Err("remove: facet address must be zero".to_string());
                        }
                        if current.is_none() {
                            return Err(format!("remove: {sel} does not exist"));
                        }
                        if let Some(routes) = self.routes.get_mut(&diamond) {
                            routes.remove(sel);
                        }
                    }
                }
            }
        }
        Ok(())
    }

    fn require_code(&self, address: Address) -> Result<(), String> {
        if self.code.get(&address).map_or(true, Vec::is_empty) {
            return Err(format!("no code at {address}"));
        }
        Ok(())
    }
}

/// Ledger backed by memory, for headless runs
#[derive(Debug, Default)]
pub struct InMemoryLedger {
    chain: Mutex<Chain>,
}

impl InMemoryLedger {
    pub fn new() -> Self {
        Self::default()
    }

    /// Put `code` at `address` without a deployment
    pub fn set_code(&self, address: Address, code: &[u8]) {
        let mut chain = self.chain.lock().unwrap();
        chain.code.insert(address, code.to_vec());
    }

    /// Install a facet on a diamond directly, bypassing `diamondCut`
    pub fn install(&self, diamond: Address, facet: Address, code: &[u8], selectors: &[Selector]) {
        let mut chain = self.chain.lock().unwrap();
        chain.code.insert(diamond, b"diamond".to_vec());
        chain.code.insert(facet, code.to_vec());
        for sel in selectors {
            chain.route(diamond, *sel, facet);
        }
        chain.mine();
    }

    /// Route one selector to `facet` behind the engine's back
    pub fn reroute(&self, diamond: Address, selector: Selector, facet: Address) {
        let mut chain = self.chain.lock().unwrap();
        chain.route(diamond, selector, facet);
        chain.mine();
    }

    /// Make the next `diamondCut` revert
    pub fn revert_next_cut(&self) {
        self.chain.lock().unwrap().revert_next = true;
    }

    /// Every submitted cut, in order
    pub fn submitted_cuts(&self) -> Vec<Vec<FacetCut>> {
        self.chain.lock().unwrap().submitted.clone()
    }

    /// Facet currently serving `selector`
    pub fn owner_of(&self, diamond: Address, selector: Selector) -> Option<Address> {
        let chain = self.chain.lock().unwrap();
        chain.routes.get(&diamond).and_then(|r| r.get(&selector)).copied()
    }
}

#[async_trait]
impl LedgerReader for InMemoryLedger {
    async fn chain_id(&self) -> Result<u64, LedgerError> {
        Ok(CHAIN_ID)
    }

    async fn latest_block(&self) -> Result<BlockInfo, LedgerError> {
        let block = self.chain.lock().unwrap().block;
        Ok(BlockInfo {
            number: block,
            timestamp: 1_700_000_000 + block * 12,
        })
    }

    async fn facets(&self, diamond: Address) -> Result<Vec<LiveFacet>, LedgerError> {
        let chain = self.chain.lock().unwrap();
        let Some(order) = chain.order.get(&diamond) else {
            return Ok(Vec::new());
        };
        let routes = chain.routes.get(&diamond).cloned().unwrap_or_default();
        Ok(order
            .iter()
            .map(|facet| LiveFacet {
                address: *facet,
                selectors: routes
                    .iter()
                    .filter(|(_, a)| *a == facet)
                    .map(|(s, _)| *s)
                    .collect(),
            })
            .filter(|f| !f.selectors.is_empty())
            .collect())
    }

    async fn code_at(&self, address: Address) -> Result<Vec<u8>, LedgerError> {
        Ok(self
            .chain
            .lock()
            .unwrap()
            .code
            .get(&address)
            .cloned()
            .unwrap_or_default())
    }
}

#[async_trait]
impl LedgerWriter for InMemoryLedger {
    async fn deploy(&self, _from: Address, _facet: &str, creation_code: &[u8]) -> Result<Address, LedgerError> {
        let mut chain = self.chain.lock().unwrap();
        chain.next_account += 1;
        let mut bytes = [0xfa; 20];
        bytes[16..].copy_from_slice(&chain.next_account.to_be_bytes());
        let address = Address::new(bytes);
        chain.code.insert(address, creation_code.to_vec());
        chain.mine();
        Ok(address)
    }

    async fn diamond_cut(
        &self,
        _from: Address,
        diamond: Address,
        cuts: &[FacetCut],
        _init: &InitCall,
    ) -> Result<CutReceipt, LedgerError> {
        let mut chain = self.chain.lock().unwrap();
        chain.submitted.push(cuts.to_vec());
        let block = chain.mine();
        let tx_hash = format!("0x{:064x}", chain.submitted.len());

        let mut next = chain.clone();
        let outcome = if std::mem::take(&mut chain.revert_next) {
            Err("forced revert".to_string())
        } else {
            next.apply(diamond, cuts)
        };
        let success = match outcome {
            Ok(()) => {
                *chain = next;
                true
            }
            Err(_) => false,
        };
        Ok(CutReceipt {
            tx_hash,
            block_number: Some(block),
            success,
        })
    }
}
