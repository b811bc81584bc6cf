//! Lineage resolver.
//!
//! Walks the parent/child chain from a record identity to the single
//! unspent coin that currently carries the record. The walk is iterative
//! and unbounded (proportional to mutation count); nothing is cached
//! because every call must reflect ledger-tip truth. Callers that resolve
//! repeatedly should cache externally and invalidate on broadcast.

use chia_protocol::Bytes32;
use log::debug;

use crate::error::{Error, Result};
use crate::ledger::client::Ledger;
use crate::ledger::types::CoinRecord;

/// Resolve a record identity to `(parent, tip)` where `tip` is the unique
/// unspent coin of the lineage and `parent` its immediate predecessor
/// (needed for the continuity proof of the next spend).
///
/// A spent coin with any child count other than one means the ledger
/// violates the singleton covenant; that is fatal and never repaired here.
pub async fn resolve_lineage<L: Ledger>(
    ledger: &L,
    identity: Bytes32,
) -> Result<(CoinRecord, CoinRecord)> {
    debug!("resolving lineage tip for 0x{}", hex::encode(identity));
    let record = ledger
        .coin_record(identity)
        .await?
        .ok_or(Error::CoinNotFound(identity))?;

    if !record.spent {
        // Never-spent identity coin: the lineage is just itself.
        let parent_id = record.coin.parent_coin_info;
        let parent = ledger
            .coin_record(parent_id)
            .await?
            .ok_or(Error::CoinNotFound(parent_id))?;
        return Ok((parent, record));
    }

    let mut current = record;
    loop {
        let mut children = ledger.coin_records_by_parent(current.coin_id()).await?;
        if children.len() != 1 {
            return Err(Error::LineageFork {
                coin: current.coin_id(),
                children: children.len(),
            });
        }
        let child = children.remove(0);
        if child.spent {
            debug!("walked past spent coin 0x{}", hex::encode(child.coin_id()));
            current = child;
        } else {
            return Ok((current, child));
        }
    }
}
