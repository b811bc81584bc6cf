//! Record domain: logical state, the locking puzzle, and the codec
//! between the two.
//!
//! A record is a small ordered key-value store whose authoritative state is
//! carried by a singleton coin lineage; these modules never talk to the
//! ledger and are fully deterministic.

pub mod codec;
pub mod puzzle;
pub mod state;

pub use state::{Delta, Entry, RecordState, FROZEN_VERSION, GENESIS_VERSION, OP_ADD, OP_REMOVE};
pub use state::{format_identity, parse_identity};
