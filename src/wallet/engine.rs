//! Mutation engine.
//!
//! Every operation moves a lineage from one tip to the next: resolve the
//! tip, re-derive the current state from the predecessor spend, build the
//! successor reveal and solution, sign, optionally merge a fee spend, and
//! submit one aggregate transaction. There is no partial-commit state: a
//! mutation either fully decodes, builds, signs and submits, or leaves the
//! lineage untouched.
//!
//! Frozen records (version sentinel 0) are refused here, before anything
//! is built; the covenant would reject such a spend anyway, but failing
//! locally gives the caller a precise error. A submission the ledger
//! declines surfaces as `SubmissionRejected` with the locally computed
//! transaction id; the typical cause is a stale tip lost to a concurrent
//! mutation, and the remedy is to re-resolve and retry the whole
//! operation, never to resubmit the same transaction.

use chia_bls::PublicKey;
use chia_protocol::{Bytes, Bytes32, Coin, CoinSpend, Program, SpendBundle};
use chia_puzzle_types::singleton::LauncherSolution;
use chia_puzzles::SINGLETON_LAUNCHER;
use chia_traits::Streamable;
use clvm_traits::ToClvm;
use clvm_utils::tree_hash;
use clvmr::Allocator;
use log::{debug, info};
use sha2::{Digest, Sha256};

use crate::error::{Error, Result};
use crate::ledger::{resolve_lineage, CoinRecord, Ledger};
use crate::record::codec::{
    build_inner_solution, build_singleton_solution, decode, delta_commitment, owner_commitment,
    version_commitment,
};
use crate::record::puzzle::{
    curry_record_puzzle, curry_singleton_puzzle, launcher_puzzle_hash, lineage_proof_for_spend,
    record_puzzle_hash, serialize, singleton_puzzle_hash,
};
use crate::record::state::{Delta, RecordState, FROZEN_VERSION, GENESIS_VERSION};
use crate::wallet::keys::{
    announcement_id, assert_coin_announcement_condition, conditions_list, create_coin_condition,
    sign_spend, standard_spend,
};
use crate::wallet::session::WalletSession;

/// Record coins carry this amount; the singleton covenant requires odd.
const RECORD_COIN_AMOUNT: u64 = 1;

/// Resolved tip plus the decoded state it carries.
struct TipContext {
    tip: CoinRecord,
    parent_spend: Option<CoinSpend>,
    state: RecordState,
}

impl<L: Ledger> WalletSession<L> {
    /// Mint a new record: spend a funding coin into the launcher and its
    /// first state coin (version 1, no entries, our key). Returns the
    /// transaction id and the new record identity.
    pub async fn mint(&self, fee: u64) -> Result<(Bytes32, Bytes32)> {
        let funding = self.find_usable_coin().await?;
        let funding_coin = funding.coin;
        if funding_coin.amount < RECORD_COIN_AMOUNT + fee {
            return Err(Error::InsufficientFunds);
        }

        let launcher_coin = Coin {
            parent_coin_info: funding_coin.coin_id(),
            puzzle_hash: launcher_puzzle_hash(),
            amount: RECORD_COIN_AMOUNT,
        };
        let launcher_id = launcher_coin.coin_id();

        let eve_inner_hash = record_puzzle_hash(&[], GENESIS_VERSION, &self.keys.wallet_pk);
        let eve_puzzle_hash = singleton_puzzle_hash(launcher_id, eve_inner_hash);

        let mut a = Allocator::new();
        let launcher_solution = LauncherSolution {
            singleton_puzzle_hash: eve_puzzle_hash,
            amount: RECORD_COIN_AMOUNT,
            key_value_list: (),
        }
        .to_clvm(&mut a)?;
        let announcement =
            announcement_id(launcher_id, Bytes32::new(tree_hash(&a, launcher_solution).to_bytes()));

        let mut conditions = vec![
            create_coin_condition(&mut a, launcher_puzzle_hash(), RECORD_COIN_AMOUNT)?,
            assert_coin_announcement_condition(&mut a, announcement)?,
        ];
        let change = funding_coin.amount - RECORD_COIN_AMOUNT - fee;
        if change > 0 {
            conditions.push(create_coin_condition(&mut a, funding_coin.puzzle_hash, change)?);
        }
        let conditions = conditions_list(&mut a, &conditions)?;
        let (puzzle, solution, content) = standard_spend(&mut a, &self.keys.synthetic_pk, conditions)?;

        let funding_spend = CoinSpend {
            coin: funding_coin.clone(),
            puzzle_reveal: Program::from(serialize(&a, puzzle)?),
            solution: Program::from(serialize(&a, solution)?),
        };
        let launcher_spend = CoinSpend {
            coin: launcher_coin,
            puzzle_reveal: Program::from(SINGLETON_LAUNCHER.to_vec()),
            solution: Program::from(serialize(&a, launcher_solution)?),
        };
        let signature = sign_spend(
            &self.keys.synthetic_sk,
            content,
            funding_coin.coin_id(),
            self.genesis_challenge,
        );

        let bundle =
            SpendBundle { coin_spends: vec![funding_spend, launcher_spend], aggregated_signature: signature };
        let tx_id = bundle_id(&bundle)?;
        info!(
            "minting record 0x{} in tx 0x{}",
            hex::encode(launcher_id),
            hex::encode(tx_id)
        );
        if self.ledger.push_tx(&bundle).await? {
            Ok((tx_id, launcher_id))
        } else {
            Err(Error::SubmissionRejected {
                tx_id: hex::encode(tx_id),
                op: "mint",
                coin: funding_coin.coin_id(),
                version: GENESIS_VERSION,
            })
        }
    }

    /// Prepend a key-value pair; bumps the version by one.
    pub async fn add_pair(
        &self,
        identity: Bytes32,
        key: Bytes,
        value: Bytes,
        fee: u64,
    ) -> Result<Bytes32> {
        let ctx = self.tip_context(identity).await?;
        self.ensure_mutable(identity, &ctx)?;
        let delta = Delta::Add { key, value };
        let content = delta_commitment(&delta);
        self.submit_record_spend(identity, "add-pair", ctx, Step::Content(delta), None, content, fee)
            .await
    }

    /// Delete the pair at `index`; bumps the version by one. Bounds are
    /// validated against the decoded tip before anything is built, the
    /// same check decoding applies, so a bad index never reaches the
    /// ledger.
    pub async fn remove_pair_at(&self, identity: Bytes32, index: u64, fee: u64) -> Result<Bytes32> {
        let ctx = self.tip_context(identity).await?;
        self.ensure_mutable(identity, &ctx)?;
        if index as usize >= ctx.state.entries.len() {
            return Err(Error::IndexOutOfRange { index, len: ctx.state.entries.len() });
        }
        let delta = Delta::Remove { index };
        let content = delta_commitment(&delta);
        self.submit_record_spend(identity, "remove-pair", ctx, Step::Content(delta), None, content, fee)
            .await
    }

    /// Hand the record to a new owner key. Version and entries are
    /// preserved; only the key changes going forward.
    pub async fn change_owner(
        &self,
        identity: Bytes32,
        new_owner: PublicKey,
        fee: u64,
    ) -> Result<Bytes32> {
        let ctx = self.tip_context(identity).await?;
        self.ensure_mutable(identity, &ctx)?;
        let content = owner_commitment(&new_owner);
        self.submit_record_spend(
            identity,
            "change-owner",
            ctx,
            Step::KeepVersion,
            Some(new_owner),
            content,
            fee,
        )
        .await
    }

    /// Write the terminal version sentinel. Further mutations are refused
    /// by this engine and rejected by the covenant.
    pub async fn freeze(&self, identity: Bytes32, fee: u64) -> Result<Bytes32> {
        let ctx = self.tip_context(identity).await?;
        self.ensure_mutable(identity, &ctx)?;
        let content = version_commitment(FROZEN_VERSION);
        self.submit_record_spend(identity, "freeze", ctx, Step::Freeze, None, content, fee).await
    }

    /// Read the record at the current tip.
    pub async fn get_data(&self, identity: Bytes32) -> Result<RecordState> {
        Ok(self.tip_context(identity).await?.state)
    }

    async fn tip_context(&self, identity: Bytes32) -> Result<TipContext> {
        let (parent, tip) = resolve_lineage(&self.ledger, identity).await?;
        if tip.coin.puzzle_hash == launcher_puzzle_hash() {
            // Identity coin itself is unspent: a lineage of one, readable
            // but with no state coin to mutate yet.
            return Ok(TipContext { tip, parent_spend: None, state: RecordState::genesis(None) });
        }
        let parent_spend =
            self.ledger.puzzle_and_solution(parent.coin_id(), parent.spent_block_index).await?;
        let state = decode(&parent_spend)?;
        debug!(
            "tip 0x{} decodes to version {} with {} entries",
            hex::encode(tip.coin_id()),
            state.version,
            state.entries.len()
        );
        Ok(TipContext { tip, parent_spend: Some(parent_spend), state })
    }

    fn ensure_mutable(&self, identity: Bytes32, ctx: &TipContext) -> Result<()> {
        if ctx.state.is_frozen() {
            return Err(Error::Frozen(identity));
        }
        Ok(())
    }

    async fn submit_record_spend(
        &self,
        identity: Bytes32,
        op: &'static str,
        ctx: TipContext,
        step: Step,
        new_owner: Option<PublicKey>,
        content: Bytes32,
        fee: u64,
    ) -> Result<Bytes32> {
        let parent_spend = ctx.parent_spend.as_ref().ok_or_else(|| {
            Error::Protocol("record has no state coin yet; launcher is unspent".to_string())
        })?;
        let owner = ctx.state.owner.clone().unwrap_or_else(|| self.keys.wallet_pk.clone());
        let tip_coin = ctx.tip.coin;
        let (new_version, delta) = match step {
            Step::Content(delta) => (ctx.state.version + 1, delta),
            Step::KeepVersion => (ctx.state.version, Delta::None),
            Step::Freeze => (FROZEN_VERSION, Delta::None),
        };

        let mut a = Allocator::new();
        let inner = curry_record_puzzle(&mut a, &ctx.state.entries, ctx.state.version, &owner)?;
        let puzzle = curry_singleton_puzzle(&mut a, identity, inner)?;
        let lineage_proof = lineage_proof_for_spend(parent_spend)?;
        let inner_solution = build_inner_solution(&mut a, new_version, &delta, new_owner.as_ref())?;
        let solution = build_singleton_solution(&mut a, lineage_proof, tip_coin.amount, inner_solution)?;

        let record_spend = CoinSpend {
            coin: tip_coin.clone(),
            puzzle_reveal: Program::from(serialize(&a, puzzle)?),
            solution: Program::from(serialize(&a, solution)?),
        };
        let mut signature =
            sign_spend(&self.keys.wallet_sk, content, tip_coin.coin_id(), self.genesis_challenge);

        let mut coin_spends = vec![record_spend];
        if fee > 0 {
            let (fee_spend, fee_signature) = self.fee_spend(fee).await?;
            coin_spends.push(fee_spend);
            signature += &fee_signature;
        }

        let bundle = SpendBundle { coin_spends, aggregated_signature: signature };
        let tx_id = bundle_id(&bundle)?;
        info!(
            "submitting {op} on record 0x{} (version {} -> {}) as tx 0x{}",
            hex::encode(identity),
            ctx.state.version,
            new_version,
            hex::encode(tx_id)
        );
        if self.ledger.push_tx(&bundle).await? {
            Ok(tx_id)
        } else {
            Err(Error::SubmissionRejected {
                tx_id: hex::encode(tx_id),
                op,
                coin: tip_coin.coin_id(),
                version: new_version,
            })
        }
    }
}

/// How an operation derives the successor version.
enum Step {
    /// Content mutation: version + 1 with the given delta.
    Content(Delta),
    /// Ownership transfer: version unchanged, no delta.
    KeepVersion,
    /// Terminal freeze: version sentinel 0, no delta.
    Freeze,
}

/// Locally computed transaction id: hash of the serialized bundle.
fn bundle_id(bundle: &SpendBundle) -> Result<Bytes32> {
    let bytes = bundle
        .to_bytes()
        .map_err(|e| Error::Protocol(format!("cannot serialize transaction: {e}")))?;
    let mut hasher = Sha256::new();
    hasher.update(&bytes);
    Ok(Bytes32::new(hasher.finalize().into()))
}
