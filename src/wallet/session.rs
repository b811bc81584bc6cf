//! Wallet session: the explicit context every operation runs against.
//!
//! Owns the derived key material, the parsed network domain separator and
//! the ledger client. Sessions are plain values: acquiring one performs no
//! I/O beyond what the ledger client needs, and every network handle it
//! owns is released when the session drops, on success and failure alike.
//!
//! There is no mutual exclusion across sessions or operations. Two
//! concurrent mutations of the same record both resolve the same tip and
//! at most one survives submission; the loser surfaces as
//! `Error::SubmissionRejected` and should re-resolve and retry.

use chia_bls::PublicKey;
use chia_protocol::Bytes32;
use log::info;

use crate::config::Config;
use crate::error::Result;
use crate::ledger::{FullNodeRpc, Ledger};
use crate::wallet::keys::WalletKeys;

pub struct WalletSession<L> {
    pub(crate) keys: WalletKeys,
    pub(crate) genesis_challenge: Bytes32,
    pub(crate) ledger: L,
}

impl WalletSession<FullNodeRpc> {
    /// Connect to the configured full node.
    pub fn connect(config: &Config) -> Result<Self> {
        let ledger = FullNodeRpc::new(config)?;
        Self::new(config, ledger)
    }
}

impl<L: Ledger> WalletSession<L> {
    /// Build a session over any ledger implementation.
    pub fn new(config: &Config, ledger: L) -> Result<Self> {
        let keys = WalletKeys::from_config(config)?;
        let genesis_challenge = config.genesis_challenge()?;
        info!(
            "wallet session ready, standard puzzle hash 0x{}",
            hex::encode(keys.puzzle_hash)
        );
        Ok(Self { keys, genesis_challenge, ledger })
    }

    pub fn public_key(&self) -> &PublicKey {
        &self.keys.wallet_pk
    }

    /// Puzzle hash funding and change coins are expected under.
    pub fn puzzle_hash(&self) -> Bytes32 {
        self.keys.puzzle_hash
    }

    pub fn ledger(&self) -> &L {
        &self.ledger
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ledger::mock::MockLedger;

    fn config() -> Config {
        let mut config = Config::default();
        config.master_secret_key = "2b".repeat(32);
        config
    }

    #[test]
    fn test_session_over_mock() {
        let session = WalletSession::new(&config(), MockLedger::new()).unwrap();
        let again = WalletSession::new(&config(), MockLedger::new()).unwrap();
        assert_eq!(session.public_key(), again.public_key());
        assert_eq!(session.puzzle_hash(), again.puzzle_hash());
    }

    #[test]
    fn test_session_requires_key() {
        let mut config = Config::default();
        config.master_secret_key = String::new();
        assert!(WalletSession::new(&config, MockLedger::new()).is_err());
    }
}
