//! Beacon: small mutable key-value records anchored to a coin lineage.
//!
//! A record lives entirely on a UTXO-style ledger as a chain of singleton
//! coins under one immutable launcher identity. Reads re-derive the state
//! from the tip's immediate predecessor; writes extend the chain with a
//! freshly signed successor spend.

pub mod config;
pub mod error;
pub mod ledger;
pub mod record;
pub mod wallet;

pub use config::Config;
pub use error::{Error, Result};
pub use ledger::{CoinRecord, FullNodeRpc, Ledger};
pub use record::{Delta, RecordState};
pub use wallet::{WalletKeys, WalletSession};
