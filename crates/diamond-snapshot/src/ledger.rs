//! Read side of the ledger
//!
//! The capturer only needs the diamond's introspection surface and the code
//! stored at an address. Backends implement [`LedgerReader`]; the JSON-RPC
//! client and the in-memory test ledger both do.

use async_trait::async_trait;
use diamond_artifact::{Address, Selector};
use serde::{Deserialize, Serialize};

/// Block the capture was taken at
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct BlockInfo {
    pub number: u64,
    pub timestamp: u64,
}

/// One installed facet as reported by the diamond
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LiveFacet {
    pub address: Address,
    pub selectors: Vec<Selector>,
}

/// Ledger access failures
#[derive(Debug, Clone, thiserror::Error)]
pub enum LedgerError {
    #[error("transport error: {0}")]
    Transport(String),

    #[error("rpc error {code}: {message}")]
    Rpc { code: i64, message: String },

    #[error("cannot decode ledger response: {0}")]
    Decode(String),

    #[error("timed out after {secs}s waiting for {what}")]
    Timeout { what: String, secs: u64 },

    #[error("ledger rejected request: {0}")]
    Rejected(String),
}

/// Read-only ledger queries
#[async_trait]
pub trait LedgerReader: Send + Sync {
    /// Chain id of the connected network
    async fn chain_id(&self) -> Result<u64, LedgerError>;

    /// Latest block
    async fn latest_block(&self) -> Result<BlockInfo, LedgerError>;

    /// Installed facets of `diamond`, in the order the diamond reports them
    async fn facets(&self, diamond: Address) -> Result<Vec<LiveFacet>, LedgerError>;

    /// Deployed code at `address`; empty if none
    async fn code_at(&self, address: Address) -> Result<Vec<u8>, LedgerError>;
}
