//! Record puzzle driver.
//!
//! Builds the curried inner puzzle that locks a record coin, wraps it in the
//! standard singleton layer, and derives the tree-hash commitments the
//! covenant checks. The compiled record module is embedded below and is only
//! ever curried, hashed and serialized here; execution belongs to the
//! external covenant interpreter. All hashes are derived from the embedded
//! bytes at runtime so reveal and commitment cannot drift apart.

use std::sync::LazyLock;

use chia_bls::PublicKey;
use chia_protocol::{Bytes32, CoinSpend};
use chia_puzzle_types::singleton::{SingletonArgs, SingletonStruct};
use chia_puzzle_types::{EveProof, LineageProof, Proof};
use chia_puzzles::{SINGLETON_LAUNCHER_HASH, SINGLETON_TOP_LAYER_V1_1, SINGLETON_TOP_LAYER_V1_1_HASH};
use clvm_traits::{FromClvm, ToClvm};
use clvm_utils::{curry_tree_hash, tree_hash, tree_hash_atom, tree_hash_pair, CurriedProgram, TreeHash};
use clvmr::serde::{node_from_bytes, node_to_bytes};
use clvmr::{Allocator, NodePtr};

use crate::error::{Error, Result};
use crate::record::state::Entry;

/// Compiled record module. Curried with `(MOD_HASH entries version owner)`.
const RECORD_PUZZLE_HEX: &str = concat!(
    "ff02ffff01ff02ffff03ffff07ff0580ffff01ff0bffff05ff0580ffff05ffff06ff05",
    "8080ff1780ffff01ff08ff178080ff0180ffff04ffff01a08e3bc7f27977b47901a9b0",
    "4d49921ce22bd3a1dcd3dab2cbd77fcbe20b7462ddff018080",
);

static RECORD_PUZZLE: LazyLock<Vec<u8>> =
    LazyLock::new(|| hex::decode(RECORD_PUZZLE_HEX).expect("embedded record puzzle is valid hex"));

static RECORD_MOD_HASH: LazyLock<[u8; 32]> = LazyLock::new(|| {
    let mut a = Allocator::new();
    let node = node_from_bytes(&mut a, &RECORD_PUZZLE).expect("embedded record puzzle parses");
    tree_hash(&a, node).to_bytes()
});

/// Curried arguments of the record puzzle.
#[derive(Debug, Clone, ToClvm, FromClvm)]
#[clvm(curry)]
pub struct RecordArgs<N> {
    pub mod_hash: Bytes32,
    pub entries: N,
    pub version: u64,
    pub owner: PublicKey,
}

/// Inner solution of the record puzzle: `(version commit new_owner)`.
/// `commit` is `(op operand)` or nil; `new_owner` is a key atom or nil.
#[derive(Debug, Clone, ToClvm, FromClvm)]
#[clvm(list)]
pub struct RecordSolution<C, K> {
    pub version: u64,
    pub commit: C,
    pub new_owner: K,
}

pub fn record_mod_hash() -> Bytes32 {
    Bytes32::new(*RECORD_MOD_HASH)
}

pub fn record_puzzle_node(a: &mut Allocator) -> Result<NodePtr> {
    node_from_bytes(a, &RECORD_PUZZLE).map_err(|_| Error::clvm("record puzzle deserialization"))
}

/// Build the entries list as a CLVM proper list of `(key . value)` pairs.
pub fn entries_node(a: &mut Allocator, entries: &[Entry]) -> Result<NodePtr> {
    let mut node = NodePtr::NIL;
    for (key, value) in entries.iter().rev() {
        let k = a.new_atom(key.as_ref()).map_err(|_| Error::clvm("entry key atom"))?;
        let v = a.new_atom(value.as_ref()).map_err(|_| Error::clvm("entry value atom"))?;
        let pair = a.new_pair(k, v).map_err(|_| Error::clvm("entry pair"))?;
        node = a.new_pair(pair, node).map_err(|_| Error::clvm("entry list"))?;
    }
    Ok(node)
}

/// Curry the record puzzle for a given logical state.
pub fn curry_record_puzzle(
    a: &mut Allocator,
    entries: &[Entry],
    version: u64,
    owner: &PublicKey,
) -> Result<NodePtr> {
    let program = record_puzzle_node(a)?;
    let entries = entries_node(a, entries)?;
    let curried = CurriedProgram {
        program,
        args: RecordArgs { mod_hash: record_mod_hash(), entries, version, owner: owner.clone() },
    };
    Ok(curried.to_clvm(a)?)
}

/// Commitment of the curried record puzzle for a given logical state.
/// Computed without an allocator so encoding stays canonical by
/// construction: the same state always folds to the same hash.
pub fn record_puzzle_hash(entries: &[Entry], version: u64, owner: &PublicKey) -> TreeHash {
    let mut list = tree_hash_atom(&[]);
    for (key, value) in entries.iter().rev() {
        let pair = tree_hash_pair(tree_hash_atom(key.as_ref()), tree_hash_atom(value.as_ref()));
        list = tree_hash_pair(pair, list);
    }
    curry_tree_hash(
        TreeHash::new(*RECORD_MOD_HASH),
        &[
            tree_hash_atom(&RECORD_MOD_HASH[..]),
            list,
            tree_hash_atom(&int_atom(version)),
            tree_hash_atom(&owner.to_bytes()),
        ],
    )
}

pub fn launcher_puzzle_hash() -> Bytes32 {
    Bytes32::new(SINGLETON_LAUNCHER_HASH)
}

pub fn singleton_struct(launcher_id: Bytes32) -> SingletonStruct {
    SingletonStruct {
        mod_hash: Bytes32::new(SINGLETON_TOP_LAYER_V1_1_HASH),
        launcher_id,
        launcher_puzzle_hash: Bytes32::new(SINGLETON_LAUNCHER_HASH),
    }
}

/// Wrap an inner puzzle in the singleton top layer.
pub fn curry_singleton_puzzle(
    a: &mut Allocator,
    launcher_id: Bytes32,
    inner_puzzle: NodePtr,
) -> Result<NodePtr> {
    let program = node_from_bytes(a, &SINGLETON_TOP_LAYER_V1_1)
        .map_err(|_| Error::clvm("singleton top layer deserialization"))?;
    let curried = CurriedProgram {
        program,
        args: SingletonArgs { singleton_struct: singleton_struct(launcher_id), inner_puzzle },
    };
    Ok(curried.to_clvm(a)?)
}

/// Commitment of the full singleton puzzle. Must match the covenant's own
/// derivation bit-for-bit, which it does by sharing the curry structure.
pub fn singleton_puzzle_hash(launcher_id: Bytes32, inner_puzzle_hash: TreeHash) -> Bytes32 {
    let s = singleton_struct(launcher_id);
    let struct_hash = tree_hash_pair(
        tree_hash_atom(s.mod_hash.as_ref()),
        tree_hash_pair(
            tree_hash_atom(s.launcher_id.as_ref()),
            tree_hash_atom(s.launcher_puzzle_hash.as_ref()),
        ),
    );
    let full = curry_tree_hash(
        TreeHash::new(SINGLETON_TOP_LAYER_V1_1_HASH),
        &[struct_hash, inner_puzzle_hash],
    );
    Bytes32::new(full.to_bytes())
}

/// Uncurry a full singleton reveal into its struct and inner puzzle.
pub fn uncurry_singleton(a: &Allocator, puzzle: NodePtr) -> Result<(SingletonStruct, NodePtr)> {
    let curried = CurriedProgram::<NodePtr, SingletonArgs<NodePtr>>::from_clvm(a, puzzle)?;
    Ok((curried.args.singleton_struct, curried.args.inner_puzzle))
}

/// Continuity proof the covenant requires to authorize the next spend,
/// derived from the spend that created the current tip.
pub fn lineage_proof_for_spend(spend: &CoinSpend) -> Result<Proof> {
    if spend.coin.puzzle_hash == launcher_puzzle_hash() {
        return Ok(Proof::Eve(EveProof {
            parent_parent_coin_info: spend.coin.parent_coin_info,
            parent_amount: spend.coin.amount,
        }));
    }
    let mut a = Allocator::new();
    let puzzle = node_from_bytes(&mut a, spend.puzzle_reveal.as_ref())
        .map_err(|_| Error::clvm("puzzle reveal deserialization"))?;
    let (_, inner_puzzle) = uncurry_singleton(&a, puzzle)?;
    let inner_hash = tree_hash(&a, inner_puzzle);
    Ok(Proof::Lineage(LineageProof {
        parent_parent_coin_info: spend.coin.parent_coin_info,
        parent_inner_puzzle_hash: Bytes32::new(inner_hash.to_bytes()),
        parent_amount: spend.coin.amount,
    }))
}

/// Serialize a node back to program bytes.
pub fn serialize(a: &Allocator, node: NodePtr) -> Result<Vec<u8>> {
    node_to_bytes(a, node).map_err(|_| Error::clvm("node serialization"))
}

/// Minimal big-endian CLVM integer encoding of a non-negative value.
/// Matches the canonical encoding `clvm-traits` uses for `u64`.
pub fn int_atom(value: u64) -> Vec<u8> {
    if value == 0 {
        return Vec::new();
    }
    let mut bytes = value.to_be_bytes().to_vec();
    while bytes.len() > 1 && bytes[0] == 0 {
        bytes.remove(0);
    }
    if bytes[0] & 0x80 != 0 {
        bytes.insert(0, 0);
    }
    bytes
}

/// Parse a non-negative CLVM integer atom.
pub fn atom_to_u64(bytes: &[u8]) -> Result<u64> {
    let trimmed: &[u8] = if bytes.first() == Some(&0) { &bytes[1..] } else { bytes };
    if trimmed.len() > 8 || bytes.first().map(|b| b & 0x80 != 0).unwrap_or(false) {
        return Err(Error::ScriptShape(format!("integer atom out of range: 0x{}", hex::encode(bytes))));
    }
    let mut value = 0u64;
    for b in trimmed {
        value = (value << 8) | u64::from(*b);
    }
    Ok(value)
}
