//! Write side of the ledger

use crate::instruction::{CutReceipt, FacetCut, InitCall};
use async_trait::async_trait;
use diamond_artifact::Address;
use diamond_snapshot::{LedgerError, LedgerReader};

/// State-changing ledger operations. Each call returns only once its
/// transaction is mined (or has failed); callers never have two writes in
/// flight.
#[async_trait]
pub trait LedgerWriter: Send + Sync {
    /// Deploy `creation_code` from `from`; returns the new contract address
    async fn deploy(
        &self,
        from: Address,
        facet: &str,
        creation_code: &[u8],
    ) -> Result<Address, LedgerError>;

    /// Submit one `diamondCut` transaction and wait for its receipt
    async fn diamond_cut(
        &self,
        from: Address,
        diamond: Address,
        cuts: &[FacetCut],
        init: &InitCall,
    ) -> Result<CutReceipt, LedgerError>;
}

/// A ledger that can be both read and written
pub trait Ledger: LedgerReader + LedgerWriter {}

impl<T: LedgerReader + LedgerWriter> Ledger for T {}
