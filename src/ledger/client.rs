//! The ledger query interface.
//!
//! Everything the wallet needs from the external ledger service, as one
//! async trait: coin lookups by id, parent and puzzle hash, the reveal and
//! solution of a spent coin, and transaction submission. Implementations
//! must not retry on their own; connectivity failures propagate so the
//! caller decides.

use chia_protocol::{Bytes32, CoinSpend, SpendBundle};

use crate::error::Result;
use crate::ledger::types::CoinRecord;

#[allow(async_fn_in_trait)]
pub trait Ledger {
    /// Fetch the coin record for a coin id, if the ledger knows it.
    async fn coin_record(&self, coin_id: Bytes32) -> Result<Option<CoinRecord>>;

    /// Fetch all coins whose parent is the given coin. Used to walk a
    /// lineage and to detect forks, so the full set is returned.
    async fn coin_records_by_parent(&self, parent_id: Bytes32) -> Result<Vec<CoinRecord>>;

    /// Fetch unspent coins locked by the given puzzle hash.
    async fn unspent_coin_records_by_puzzle_hash(
        &self,
        puzzle_hash: Bytes32,
    ) -> Result<Vec<CoinRecord>>;

    /// Fetch the reveal and solution that spent a coin at a height.
    async fn puzzle_and_solution(&self, coin_id: Bytes32, height: u32) -> Result<CoinSpend>;

    /// Submit an aggregate transaction. `Ok(false)` means the ledger
    /// answered and declined; transport failures are `Err`.
    async fn push_tx(&self, bundle: &SpendBundle) -> Result<bool>;
}
