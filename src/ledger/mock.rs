//! In-memory ledger used by the test suite.
//!
//! Applies pushed bundles the way the real ledger would as far as this
//! crate can observe it: inputs must exist and be unspent (a stale tip is
//! rejected, which is what the concurrency tests rely on), spends are
//! recorded for `puzzle_and_solution`, and successor coins are created
//! from announced launcher solutions, standard-spend conditions, and the
//! covenant derivation of record singletons.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use chia_protocol::{Bytes32, Coin, CoinSpend, SpendBundle};
use chia_puzzle_types::singleton::LauncherSolution;
use clvm_traits::FromClvm;
use clvmr::serde::node_from_bytes;
use clvmr::{Allocator, NodePtr, SExp};

use crate::error::Result;
use crate::ledger::client::Ledger;
use crate::ledger::types::CoinRecord;
use crate::record::codec;
use crate::record::puzzle::{
    atom_to_u64, launcher_puzzle_hash, record_puzzle_hash, singleton_puzzle_hash,
    uncurry_singleton,
};

const CREATE_COIN: u64 = 51;

#[derive(Default)]
struct MockState {
    records: HashMap<Bytes32, CoinRecord>,
    spends: HashMap<Bytes32, CoinSpend>,
    height: u32,
    reject_next_push: bool,
}

#[derive(Clone, Default)]
pub struct MockLedger {
    state: Arc<Mutex<MockState>>,
}

impl MockLedger {
    pub fn new() -> Self {
        let ledger = Self::default();
        ledger.state.lock().unwrap().height = 1;
        ledger
    }

    /// Register a confirmed, unspent coin.
    pub fn add_coin(&self, coin: Coin) {
        let mut state = self.state.lock().unwrap();
        let height = state.height;
        state.records.insert(coin.coin_id(), unspent_record(coin, height));
    }

    /// Flip a coin to spent without recording a spend (enough for walk and
    /// fork tests that never fetch the reveal).
    pub fn mark_spent(&self, coin_id: Bytes32) {
        let mut state = self.state.lock().unwrap();
        let height = state.height;
        if let Some(record) = state.records.get_mut(&coin_id) {
            record.spent = true;
            record.spent_block_index = height;
        }
    }

    /// Make the next `push_tx` answer with a rejection without applying
    /// anything, the way a node losing a tip race would.
    pub fn reject_next_push(&self) {
        self.state.lock().unwrap().reject_next_push = true;
    }

    fn apply_bundle(&self, bundle: &SpendBundle) -> bool {
        let mut created: Vec<Coin> = Vec::new();
        for spend in &bundle.coin_spends {
            created.extend(derive_children(spend));
        }

        let mut state = self.state.lock().unwrap();
        if state.reject_next_push {
            state.reject_next_push = false;
            return false;
        }
        for spend in &bundle.coin_spends {
            let id = spend.coin.coin_id();
            let known_unspent =
                state.records.get(&id).map(|r| !r.spent).unwrap_or(false);
            let ephemeral = created.iter().any(|c| c.coin_id() == id);
            if !known_unspent && !ephemeral {
                return false;
            }
        }

        state.height += 1;
        let height = state.height;
        for coin in created {
            state
                .records
                .entry(coin.coin_id())
                .or_insert_with(|| unspent_record(coin, height));
        }
        for spend in &bundle.coin_spends {
            let id = spend.coin.coin_id();
            if let Some(record) = state.records.get_mut(&id) {
                record.spent = true;
                record.spent_block_index = height;
            }
            state.spends.insert(id, spend.clone());
        }
        true
    }
}

impl Ledger for MockLedger {
    async fn coin_record(&self, coin_id: Bytes32) -> Result<Option<CoinRecord>> {
        Ok(self.state.lock().unwrap().records.get(&coin_id).cloned())
    }

    async fn coin_records_by_parent(&self, parent_id: Bytes32) -> Result<Vec<CoinRecord>> {
        Ok(self
            .state
            .lock()
            .unwrap()
            .records
            .values()
            .filter(|r| r.coin.parent_coin_info == parent_id)
            .cloned()
            .collect())
    }

    async fn unspent_coin_records_by_puzzle_hash(
        &self,
        puzzle_hash: Bytes32,
    ) -> Result<Vec<CoinRecord>> {
        Ok(self
            .state
            .lock()
            .unwrap()
            .records
            .values()
            .filter(|r| !r.spent && r.coin.puzzle_hash == puzzle_hash)
            .cloned()
            .collect())
    }

    async fn puzzle_and_solution(&self, coin_id: Bytes32, _height: u32) -> Result<CoinSpend> {
        self.state
            .lock()
            .unwrap()
            .spends
            .get(&coin_id)
            .cloned()
            .ok_or(crate::error::Error::CoinNotFound(coin_id))
    }

    async fn push_tx(&self, bundle: &SpendBundle) -> Result<bool> {
        Ok(self.apply_bundle(bundle))
    }
}

fn unspent_record(coin: Coin, height: u32) -> CoinRecord {
    CoinRecord {
        coin,
        confirmed_block_index: height,
        spent_block_index: 0,
        spent: false,
        coinbase: false,
        timestamp: u64::from(height) * 20,
    }
}

/// The coins a spend creates, as far as the mock can tell.
fn derive_children(spend: &CoinSpend) -> Vec<Coin> {
    if spend.coin.puzzle_hash == launcher_puzzle_hash() {
        return launcher_child(spend).into_iter().collect();
    }
    if let Some(child) = singleton_child(spend) {
        return vec![child];
    }
    standard_children(spend).unwrap_or_default()
}

fn launcher_child(spend: &CoinSpend) -> Option<Coin> {
    let mut a = Allocator::new();
    let solution = node_from_bytes(&mut a, spend.solution.as_ref()).ok()?;
    let solution = LauncherSolution::<NodePtr>::from_clvm(&a, solution).ok()?;
    Some(Coin {
        parent_coin_info: spend.coin.coin_id(),
        puzzle_hash: solution.singleton_puzzle_hash,
        amount: solution.amount,
    })
}

/// Re-derive the successor commitment of a record singleton spend the way
/// the covenant does: next curried state is the decoded state.
fn singleton_child(spend: &CoinSpend) -> Option<Coin> {
    let state = codec::decode(spend).ok()?;
    let owner = state.owner.clone()?;

    let mut a = Allocator::new();
    let puzzle = node_from_bytes(&mut a, spend.puzzle_reveal.as_ref()).ok()?;
    let (singleton, _) = uncurry_singleton(&a, puzzle).ok()?;

    let inner_hash = record_puzzle_hash(&state.entries, state.version, &owner);
    Some(Coin {
        parent_coin_info: spend.coin.coin_id(),
        puzzle_hash: singleton_puzzle_hash(singleton.launcher_id, inner_hash),
        amount: spend.coin.amount,
    })
}

/// Standard spends announce their outputs as `(51 puzzle_hash amount)`
/// conditions inside a quoted delegated puzzle.
fn standard_children(spend: &CoinSpend) -> Option<Vec<Coin>> {
    let mut a = Allocator::new();
    let solution = node_from_bytes(&mut a, spend.solution.as_ref()).ok()?;
    let parts = list_items(&a, solution)?;
    if parts.len() != 3 {
        return None;
    }
    let delegated = parts[1];
    let SExp::Pair(quote, conditions) = a.sexp(delegated) else {
        return None;
    };
    if atom_bytes(&a, quote)? != [1] {
        return None;
    }

    let mut coins = Vec::new();
    for condition in list_items(&a, conditions)? {
        let args = list_items(&a, condition)?;
        if args.len() < 3 {
            continue;
        }
        let opcode = atom_to_u64(&atom_bytes(&a, args[0])?).ok()?;
        if opcode != CREATE_COIN {
            continue;
        }
        let puzzle_hash: [u8; 32] = atom_bytes(&a, args[1])?.try_into().ok()?;
        let amount = atom_to_u64(&atom_bytes(&a, args[2])?).ok()?;
        coins.push(Coin {
            parent_coin_info: spend.coin.coin_id(),
            puzzle_hash: Bytes32::new(puzzle_hash),
            amount,
        });
    }
    Some(coins)
}

fn atom_bytes(a: &Allocator, node: NodePtr) -> Option<Vec<u8>> {
    match a.sexp(node) {
        SExp::Atom => Some(a.atom(node).as_ref().to_vec()),
        SExp::Pair(..) => None,
    }
}

fn list_items(a: &Allocator, mut node: NodePtr) -> Option<Vec<NodePtr>> {
    let mut items = Vec::new();
    loop {
        match a.sexp(node) {
            SExp::Atom => {
                if a.atom(node).as_ref().is_empty() {
                    return Some(items);
                }
                return None;
            }
            SExp::Pair(first, rest) => {
                items.push(first);
                node = rest;
            }
        }
    }
}
