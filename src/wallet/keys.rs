//! Key material and signing conventions.
//!
//! The wallet key is derived from the master key at a fixed hardened path;
//! the synthetic key locks the standard spend puzzle used for funding and
//! fee coins. Every signature binds `content_hash || coin_id || domain`
//! so it can be replayed against neither a different coin nor a different
//! pending operation nor another network.

use chia_bls::{sign, DerivableKey, PublicKey, SecretKey, Signature};
use chia_protocol::Bytes32;
use chia_puzzle_types::standard::StandardArgs;
use chia_puzzle_types::DeriveSynthetic;
use chia_puzzles::{P2_DELEGATED_PUZZLE_OR_HIDDEN_PUZZLE, P2_DELEGATED_PUZZLE_OR_HIDDEN_PUZZLE_HASH};
use clvm_traits::ToClvm;
use clvm_utils::{curry_tree_hash, tree_hash, tree_hash_atom, CurriedProgram, TreeHash};
use clvmr::serde::node_from_bytes;
use clvmr::{Allocator, NodePtr};
use sha2::{Digest, Sha256};

use crate::config::Config;
use crate::error::{Error, Result};

/// Standard BIP-12381/8444 wallet key purpose path.
const WALLET_PATH: [u32; 3] = [12381, 8444, 2];

pub const CREATE_COIN: u8 = 51;
pub const ASSERT_COIN_ANNOUNCEMENT: u8 = 61;

/// Keys a session works with, all derived from the configured master key.
#[derive(Clone)]
pub struct WalletKeys {
    pub wallet_sk: SecretKey,
    pub wallet_pk: PublicKey,
    pub synthetic_sk: SecretKey,
    pub synthetic_pk: PublicKey,
    /// Standard puzzle hash our funding and change coins are locked to.
    pub puzzle_hash: Bytes32,
}

impl WalletKeys {
    pub fn from_config(config: &Config) -> Result<Self> {
        let raw = config.master_secret_key.strip_prefix("0x").unwrap_or(&config.master_secret_key);
        let bytes = hex::decode(raw).map_err(|_| Error::Key("master key is not hex".to_string()))?;
        let arr: [u8; 32] = bytes
            .try_into()
            .map_err(|_| Error::Key("master key must be 32 bytes".to_string()))?;
        let master = SecretKey::from_bytes(&arr)
            .map_err(|_| Error::Key("master key bytes are not a valid scalar".to_string()))?;
        Ok(Self::derive(&master, config.key_index))
    }

    /// Hardened derivation at `m/12381'/8444'/2'/index'`.
    pub fn derive(master: &SecretKey, index: u32) -> Self {
        let mut wallet_sk = master.clone();
        for step in WALLET_PATH {
            wallet_sk = wallet_sk.derive_hardened(step);
        }
        wallet_sk = wallet_sk.derive_hardened(index);
        let wallet_pk = wallet_sk.public_key();
        let synthetic_sk = wallet_sk.derive_synthetic();
        let synthetic_pk = wallet_pk.derive_synthetic();
        let puzzle_hash = standard_puzzle_hash(&synthetic_pk);
        Self { wallet_sk, wallet_pk, synthetic_sk, synthetic_pk, puzzle_hash }
    }
}

/// Commitment of the standard puzzle curried with a synthetic key.
pub fn standard_puzzle_hash(synthetic_key: &PublicKey) -> Bytes32 {
    let hash = curry_tree_hash(
        TreeHash::new(P2_DELEGATED_PUZZLE_OR_HIDDEN_PUZZLE_HASH),
        &[tree_hash_atom(&synthetic_key.to_bytes())],
    );
    Bytes32::new(hash.to_bytes())
}

/// Curry the standard puzzle for a synthetic key.
pub fn standard_puzzle_node(a: &mut Allocator, synthetic_key: &PublicKey) -> Result<NodePtr> {
    let program = node_from_bytes(a, &P2_DELEGATED_PUZZLE_OR_HIDDEN_PUZZLE)
        .map_err(|_| Error::clvm("standard puzzle deserialization"))?;
    let curried = CurriedProgram {
        program,
        args: StandardArgs { synthetic_key: synthetic_key.clone() },
    };
    Ok(curried.to_clvm(a)?)
}

/// Build a standard spend around a plain list of conditions. Returns the
/// puzzle and solution nodes plus the delegated-puzzle commitment the
/// signature must bind.
pub fn standard_spend(
    a: &mut Allocator,
    synthetic_key: &PublicKey,
    conditions: NodePtr,
) -> Result<(NodePtr, NodePtr, Bytes32)> {
    let quote = a.one();
    let delegated = a.new_pair(quote, conditions).map_err(|_| Error::clvm("delegated puzzle"))?;
    let content = Bytes32::new(tree_hash(a, delegated).to_bytes());

    let puzzle = standard_puzzle_node(a, synthetic_key)?;
    // (() delegated_puzzle ())
    let tail = a.new_pair(NodePtr::NIL, NodePtr::NIL).map_err(|_| Error::clvm("solution tail"))?;
    let tail = a.new_pair(delegated, tail).map_err(|_| Error::clvm("solution list"))?;
    let solution = a.new_pair(NodePtr::NIL, tail).map_err(|_| Error::clvm("solution list"))?;
    Ok((puzzle, solution, content))
}

/// `(51 puzzle_hash amount)`
pub fn create_coin_condition(a: &mut Allocator, puzzle_hash: Bytes32, amount: u64) -> Result<NodePtr> {
    let items = [
        a.new_atom(&[CREATE_COIN]).map_err(|_| Error::clvm("opcode atom"))?,
        a.new_atom(puzzle_hash.as_ref()).map_err(|_| Error::clvm("puzzle hash atom"))?,
        a.new_atom(&crate::record::puzzle::int_atom(amount)).map_err(|_| Error::clvm("amount atom"))?,
    ];
    conditions_list(a, &items)
}

/// `(61 announcement_id)`
pub fn assert_coin_announcement_condition(
    a: &mut Allocator,
    announcement_id: Bytes32,
) -> Result<NodePtr> {
    let items = [
        a.new_atom(&[ASSERT_COIN_ANNOUNCEMENT]).map_err(|_| Error::clvm("opcode atom"))?,
        a.new_atom(announcement_id.as_ref()).map_err(|_| Error::clvm("announcement atom"))?,
    ];
    conditions_list(a, &items)
}

/// Build a proper list out of already-allocated nodes.
pub fn conditions_list(a: &mut Allocator, items: &[NodePtr]) -> Result<NodePtr> {
    let mut node = NodePtr::NIL;
    for item in items.iter().rev() {
        node = a.new_pair(*item, node).map_err(|_| Error::clvm("condition list"))?;
    }
    Ok(node)
}

/// Announcement assertion id: `sha256(coin_id || message)`.
pub fn announcement_id(coin_id: Bytes32, message: Bytes32) -> Bytes32 {
    let mut hasher = Sha256::new();
    hasher.update(coin_id.as_ref());
    hasher.update(message.as_ref());
    Bytes32::new(hasher.finalize().into())
}

/// Sign `content_hash || coin_id || domain` with the given key.
pub fn sign_spend(
    sk: &SecretKey,
    content_hash: Bytes32,
    coin_id: Bytes32,
    domain: Bytes32,
) -> Signature {
    let mut message = Vec::with_capacity(96);
    message.extend_from_slice(content_hash.as_ref());
    message.extend_from_slice(coin_id.as_ref());
    message.extend_from_slice(domain.as_ref());
    sign(sk, &message)
}
