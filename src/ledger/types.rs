//! Local mirror of ledger coin records.

use chia_protocol::{Bytes32, Coin};

/// A coin as the ledger reports it: identity triple plus confirmation and
/// spend status. Immutable once created; a spend only flips the status and
/// records the spending height.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CoinRecord {
    pub coin: Coin,
    pub confirmed_block_index: u32,
    pub spent_block_index: u32,
    pub spent: bool,
    pub coinbase: bool,
    pub timestamp: u64,
}

impl CoinRecord {
    pub fn coin_id(&self) -> Bytes32 {
        self.coin.coin_id()
    }
}
