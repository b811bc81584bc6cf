//! State codec: between logical record state and on-chain script arguments.
//!
//! Decoding always works from the spend that produced the current lineage
//! tip: the previous entries live in that spend's curried reveal, and the
//! delta plus the claimed version live in its solution. Only one step of
//! history is ever consulted.

use chia_bls::PublicKey;
use chia_protocol::{Bytes, Bytes32, CoinSpend};
use chia_puzzle_types::singleton::SingletonSolution;
use chia_puzzle_types::Proof;
use clvm_traits::{FromClvm, ToClvm};
use clvm_utils::{tree_hash_atom, tree_hash_pair, CurriedProgram, TreeHash};
use clvmr::serde::node_from_bytes;
use clvmr::{Allocator, NodePtr, SExp};

use crate::error::{Error, Result};
use crate::record::puzzle::{
    atom_to_u64, int_atom, launcher_puzzle_hash, uncurry_singleton, RecordArgs, RecordSolution,
};
use crate::record::state::{Delta, Entry, RecordState, OP_ADD, OP_REMOVE};

/// Reconstruct the record state at the current tip from the spend of its
/// immediate predecessor.
///
/// A launcher spend (or an absent predecessor, handled by the caller) means
/// the record was freshly minted and never mutated: `(1, [])` by convention.
pub fn decode(parent_spend: &CoinSpend) -> Result<RecordState> {
    if parent_spend.coin.puzzle_hash == launcher_puzzle_hash() {
        return Ok(RecordState::genesis(None));
    }

    let mut a = Allocator::new();
    let puzzle = node_from_bytes(&mut a, parent_spend.puzzle_reveal.as_ref())
        .map_err(|_| Error::clvm("puzzle reveal deserialization"))?;
    let solution = node_from_bytes(&mut a, parent_spend.solution.as_ref())
        .map_err(|_| Error::clvm("solution deserialization"))?;

    let (_, inner_puzzle) = uncurry_singleton(&a, puzzle)?;
    let args = CurriedProgram::<NodePtr, RecordArgs<NodePtr>>::from_clvm(&a, inner_puzzle)?.args;

    let outer = SingletonSolution::<NodePtr>::from_clvm(&a, solution)?;
    let inner = RecordSolution::<NodePtr, NodePtr>::from_clvm(&a, outer.inner_solution)?;

    let mut state = RecordState {
        version: inner.version,
        entries: decode_entries(&a, args.entries)?,
        owner: Some(args.owner),
    };
    state.apply(&decode_delta(&a, inner.commit)?)?;
    if let Some(new_owner) = decode_new_owner(&a, inner.new_owner)? {
        state.owner = Some(new_owner);
    }
    Ok(state)
}

/// Curried entries are a proper list of `(key . value)` pairs. A raw scalar
/// is the empty-state sentinel left by mint.
fn decode_entries(a: &Allocator, node: NodePtr) -> Result<Vec<Entry>> {
    match a.sexp(node) {
        SExp::Atom => Ok(Vec::new()),
        SExp::Pair(..) => Ok(Vec::<(Bytes, Bytes)>::from_clvm(a, node)?),
    }
}

/// A commit is nil or the two-element list `(op operand)`.
fn decode_delta(a: &Allocator, node: NodePtr) -> Result<Delta> {
    let (op_node, operand_node) = match a.sexp(node) {
        SExp::Atom if a.atom(node).as_ref().is_empty() => return Ok(Delta::None),
        SExp::Atom => return Err(Error::BadCommit("commit is a non-nil atom".to_string())),
        SExp::Pair(op, rest) => match a.sexp(rest) {
            SExp::Pair(operand, tail) if nilp(a, tail) => (op, operand),
            _ => return Err(Error::BadCommit("commit is not a two-element list".to_string())),
        },
    };
    let op = match a.sexp(op_node) {
        SExp::Atom => atom_to_u64(a.atom(op_node).as_ref())?,
        SExp::Pair(..) => return Err(Error::BadCommit("operation tag is not an atom".to_string())),
    };
    match op {
        op if op == u64::from(OP_ADD) => match a.sexp(operand_node) {
            SExp::Pair(..) => {
                let (key, value) = <(Bytes, Bytes)>::from_clvm(a, operand_node)?;
                Ok(Delta::Add { key, value })
            }
            SExp::Atom => Err(Error::BadCommit("add operand is not a pair".to_string())),
        },
        op if op == u64::from(OP_REMOVE) => match a.sexp(operand_node) {
            SExp::Atom => Ok(Delta::Remove { index: atom_to_u64(a.atom(operand_node).as_ref())? }),
            SExp::Pair(..) => Err(Error::BadCommit("remove operand is not an index".to_string())),
        },
        other => Err(Error::BadCommit(format!("unknown operation {other}"))),
    }
}

fn decode_new_owner(a: &Allocator, node: NodePtr) -> Result<Option<PublicKey>> {
    if nilp(a, node) {
        return Ok(None);
    }
    Ok(Some(PublicKey::from_clvm(a, node)?))
}

fn nilp(a: &Allocator, node: NodePtr) -> bool {
    matches!(a.sexp(node), SExp::Atom) && a.atom(node).as_ref().is_empty()
}

/// Build the commit node for a delta: `(op operand)` or nil.
pub fn delta_node(a: &mut Allocator, delta: &Delta) -> Result<NodePtr> {
    let (op, operand) = match delta {
        Delta::None => return Ok(NodePtr::NIL),
        Delta::Add { key, value } => {
            let k = a.new_atom(key.as_ref()).map_err(|_| Error::clvm("commit key atom"))?;
            let v = a.new_atom(value.as_ref()).map_err(|_| Error::clvm("commit value atom"))?;
            let pair = a.new_pair(k, v).map_err(|_| Error::clvm("commit pair"))?;
            (OP_ADD, pair)
        }
        Delta::Remove { index } => {
            let idx = a
                .new_atom(&int_atom(*index))
                .map_err(|_| Error::clvm("commit index atom"))?;
            (OP_REMOVE, idx)
        }
    };
    let op = a.new_atom(&int_atom(u64::from(op))).map_err(|_| Error::clvm("commit op atom"))?;
    let tail = a.new_pair(operand, NodePtr::NIL).map_err(|_| Error::clvm("commit tail"))?;
    a.new_pair(op, tail).map_err(|_| Error::clvm("commit list"))
}

/// Build the inner record solution `(version commit new_owner)`.
pub fn build_inner_solution(
    a: &mut Allocator,
    version: u64,
    delta: &Delta,
    new_owner: Option<&PublicKey>,
) -> Result<NodePtr> {
    let commit = delta_node(a, delta)?;
    let new_owner = match new_owner {
        Some(key) => key.to_clvm(a)?,
        None => NodePtr::NIL,
    };
    Ok(RecordSolution { version, commit, new_owner }.to_clvm(a)?)
}

/// Build the full singleton solution around an inner solution.
pub fn build_singleton_solution(
    a: &mut Allocator,
    lineage_proof: Proof,
    amount: u64,
    inner_solution: NodePtr,
) -> Result<NodePtr> {
    Ok(SingletonSolution { lineage_proof, amount, inner_solution }.to_clvm(a)?)
}

/// Tree hash of the commit program; the content a mutation signature binds.
pub fn delta_commitment(delta: &Delta) -> Bytes32 {
    let hash = match delta {
        Delta::None => tree_hash_atom(&[]),
        Delta::Add { key, value } => two_element_list(
            tree_hash_atom(&int_atom(u64::from(OP_ADD))),
            tree_hash_pair(tree_hash_atom(key.as_ref()), tree_hash_atom(value.as_ref())),
        ),
        Delta::Remove { index } => two_element_list(
            tree_hash_atom(&int_atom(u64::from(OP_REMOVE))),
            tree_hash_atom(&int_atom(*index)),
        ),
    };
    Bytes32::new(hash.to_bytes())
}

/// Tree hash of a bare integer program; the content a freeze signature binds.
pub fn version_commitment(version: u64) -> Bytes32 {
    Bytes32::new(tree_hash_atom(&int_atom(version)).to_bytes())
}

/// Tree hash of a bare key program; the content an ownership-change
/// signature binds.
pub fn owner_commitment(key: &PublicKey) -> Bytes32 {
    Bytes32::new(tree_hash_atom(&key.to_bytes()).to_bytes())
}

fn two_element_list(first: TreeHash, second: TreeHash) -> TreeHash {
    let nil = tree_hash_atom(&[]);
    tree_hash_pair(first, tree_hash_pair(second, nil))
}
