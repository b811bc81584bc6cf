//! Fee coin selection.
//!
//! First-fit over the wallet's unspent standard coins, no optimization:
//! the first coin with a positive amount funds the fee and the remainder
//! returns to the same puzzle hash. An empty scan is a user-facing
//! insufficient-funds error, never retried.

use chia_bls::Signature;
use chia_protocol::{CoinSpend, Program};
use clvmr::Allocator;
use log::debug;

use crate::error::{Error, Result};
use crate::ledger::{CoinRecord, Ledger};
use crate::record::puzzle::serialize;
use crate::wallet::keys::{conditions_list, create_coin_condition, sign_spend, standard_spend};
use crate::wallet::session::WalletSession;

impl<L: Ledger> WalletSession<L> {
    /// First unspent coin with a positive amount under our standard
    /// puzzle hash.
    pub(crate) async fn find_usable_coin(&self) -> Result<CoinRecord> {
        let records = self
            .ledger
            .unspent_coin_records_by_puzzle_hash(self.keys.puzzle_hash)
            .await?;
        records
            .into_iter()
            .find(|record| record.coin.amount > 0)
            .ok_or(Error::InsufficientFunds)
    }

    /// Build a signed value-transfer spend paying `fee` to the network and
    /// the rest back to us, ready to aggregate into a mutation bundle.
    pub(crate) async fn fee_spend(&self, fee: u64) -> Result<(CoinSpend, Signature)> {
        let record = self.find_usable_coin().await?;
        let coin = record.coin;
        let change = coin.amount.checked_sub(fee).ok_or(Error::InsufficientFunds)?;
        debug!(
            "fee coin 0x{} amount {} change {}",
            hex::encode(coin.coin_id()),
            coin.amount,
            change
        );

        let mut a = Allocator::new();
        let create = create_coin_condition(&mut a, coin.puzzle_hash, change)?;
        let conditions = conditions_list(&mut a, &[create])?;
        let (puzzle, solution, content) = standard_spend(&mut a, &self.keys.synthetic_pk, conditions)?;

        let spend = CoinSpend {
            coin: coin.clone(),
            puzzle_reveal: Program::from(serialize(&a, puzzle)?),
            solution: Program::from(serialize(&a, solution)?),
        };
        let signature = sign_spend(
            &self.keys.synthetic_sk,
            content,
            coin.coin_id(),
            self.genesis_challenge,
        );
        Ok((spend, signature))
    }
}
