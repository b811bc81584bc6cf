//! Wallet configuration.
//!
//! JSON file with the full node endpoint, optional TLS client identity,
//! the network domain separator used in signing, and the wallet master key.
//! Key custody is out of scope here: the master key is read as hex from the
//! config file and derivation happens in `wallet::keys`.

use std::path::{Path, PathBuf};

use chia_protocol::Bytes32;
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Default config file, next to wherever the binary runs.
pub const CONFIG_FILE: &str = "beacon-config.json";

/// Environment variable overriding the config path.
pub const CONFIG_ENV: &str = "BEACON_CONFIG";

/// Mainnet AGG_SIG_ME domain separator (the genesis challenge).
pub const MAINNET_GENESIS_CHALLENGE: &str =
    "ccd5bb71183532bff220ba46c268991a3ff07eb358e8255a65c30a2dce0e5fbb";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Full node RPC host.
    pub full_node_host: String,
    /// Full node RPC port.
    pub full_node_port: u16,
    /// PEM certificate for mutual TLS, if the node requires one.
    pub cert_file: Option<PathBuf>,
    /// PEM private key matching `cert_file`.
    pub key_file: Option<PathBuf>,
    /// Domain separator mixed into every signature, hex encoded.
    pub genesis_challenge: String,
    /// Wallet master secret key, hex encoded (32 bytes).
    pub master_secret_key: String,
    /// Fixed wallet key derivation index.
    pub key_index: u32,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            full_node_host: "localhost".to_string(),
            full_node_port: 8555,
            cert_file: None,
            key_file: None,
            genesis_challenge: MAINNET_GENESIS_CHALLENGE.to_string(),
            master_secret_key: String::new(),
            key_index: 0,
        }
    }
}

impl Config {
    /// Resolve the config path: `BEACON_CONFIG` if set, else the default file.
    pub fn resolve_path() -> PathBuf {
        std::env::var(CONFIG_ENV)
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from(CONFIG_FILE))
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let data = std::fs::read_to_string(path)
            .map_err(|e| Error::Config(format!("cannot read {}: {e}", path.display())))?;
        serde_json::from_str(&data)
            .map_err(|e| Error::Config(format!("cannot parse {}: {e}", path.display())))
    }

    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let json = serde_json::to_string_pretty(self)
            .map_err(|e| Error::Config(e.to_string()))?;
        std::fs::write(path.as_ref(), json)
            .map_err(|e| Error::Config(format!("cannot write {}: {e}", path.as_ref().display())))
    }

    /// The parsed domain separator.
    pub fn genesis_challenge(&self) -> Result<Bytes32> {
        parse_hex32(&self.genesis_challenge)
            .ok_or_else(|| Error::Config(format!("bad genesis_challenge: {}", self.genesis_challenge)))
    }
}

fn parse_hex32(s: &str) -> Option<Bytes32> {
    let raw = hex::decode(s.strip_prefix("0x").unwrap_or(s)).ok()?;
    let arr: [u8; 32] = raw.try_into().ok()?;
    Some(Bytes32::new(arr))
}
