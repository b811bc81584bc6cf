//! Crate-wide error taxonomy.
//!
//! Failures fall into five families: connectivity (the ledger service is
//! unreachable), lineage integrity (the on-chain singleton chain is broken),
//! decode (a spend does not parse back into a record), insufficient funds,
//! and submission rejection (the ledger declined a built transaction,
//! usually a stale-tip race). Nothing in this crate retries automatically;
//! every variant carries enough context for the caller to decide.

use chia_protocol::Bytes32;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// The ledger service could not be reached or answered garbage.
    /// Retryable from the caller's point of view.
    #[error("cannot reach ledger service: {0}")]
    Connectivity(String),

    /// The ledger answered, but not with what the protocol promises.
    #[error("ledger protocol error: {0}")]
    Protocol(String),

    /// No coin record exists for the given id.
    #[error("coin 0x{} not found on ledger", hex::encode(.0))]
    CoinNotFound(Bytes32),

    /// A spent coin reported a child count other than one. The singleton
    /// covenant makes this impossible on a healthy ledger, so this is fatal
    /// and never repaired client-side.
    #[error("lineage fork at coin 0x{}: expected exactly one child, found {children}", hex::encode(.coin))]
    LineageFork { coin: Bytes32, children: usize },

    /// A commit in a solution had an unknown operation tag or shape.
    #[error("bad commit: {0}")]
    BadCommit(String),

    /// REMOVE addressed an index outside the current entry list.
    #[error("remove index {index} out of range for {len} entries")]
    IndexOutOfRange { index: u64, len: usize },

    /// A puzzle reveal or solution did not have the expected structure.
    #[error("unexpected script shape: {0}")]
    ScriptShape(String),

    /// The record carries the frozen version sentinel; mutations are
    /// refused before any transaction is built.
    #[error("record 0x{} is frozen", hex::encode(.0))]
    Frozen(Bytes32),

    /// No unspent coin was available to fund a spend. User-actionable,
    /// not retryable.
    #[error("no usable coin found in the wallet")]
    InsufficientFunds,

    /// The ledger declined the built transaction. Typically a stale tip:
    /// re-resolve the lineage and retry the whole mutation.
    #[error("transaction 0x{tx_id} rejected by ledger ({op} on coin 0x{}, version {version})", hex::encode(.coin))]
    SubmissionRejected {
        tx_id: String,
        op: &'static str,
        coin: Bytes32,
        version: u64,
    },

    /// An identity string was not `0x` followed by 64 hex characters.
    #[error("invalid identity {0:?}: expected 0x followed by 64 hex characters")]
    InvalidIdentity(String),

    #[error("invalid configuration: {0}")]
    Config(String),

    #[error("invalid key material: {0}")]
    Key(String),

    /// CLVM allocation or (de)serialization failed.
    #[error("clvm error: {0}")]
    Clvm(String),
}

impl Error {
    pub(crate) fn clvm(context: &str) -> Self {
        Error::Clvm(context.to_string())
    }
}

impl From<clvm_traits::ToClvmError> for Error {
    fn from(err: clvm_traits::ToClvmError) -> Self {
        Error::Clvm(err.to_string())
    }
}

impl From<clvm_traits::FromClvmError> for Error {
    fn from(err: clvm_traits::FromClvmError) -> Self {
        Error::ScriptShape(err.to_string())
    }
}

impl From<reqwest::Error> for Error {
    fn from(err: reqwest::Error) -> Self {
        Error::Connectivity(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display_includes_context() {
        let err = Error::SubmissionRejected {
            tx_id: "ab".repeat(32),
            op: "add",
            coin: Bytes32::new([7u8; 32]),
            version: 4,
        };
        let msg = err.to_string();
        assert!(msg.contains("add"));
        assert!(msg.contains("version 4"));
        assert!(msg.contains(&hex::encode([7u8; 32])));
    }

    #[test]
    fn test_fork_is_fatal_context() {
        let err = Error::LineageFork { coin: Bytes32::new([1u8; 32]), children: 2 };
        assert!(err.to_string().contains("found 2"));
    }
}
