//! Ledger boundary: the query trait, its full-node RPC implementation,
//! and the lineage resolver that runs on top of it.

pub mod client;
#[cfg(test)]
pub mod mock;
pub mod resolver;
pub mod rpc;
pub mod types;

pub use client::Ledger;
pub use resolver::resolve_lineage;
pub use rpc::FullNodeRpc;
pub use types::CoinRecord;
