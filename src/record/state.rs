//! Logical record state and pending deltas.
//!
//! A record is never stored anywhere; it is re-derived on demand from the
//! previous coin's script parameters plus the delta carried in the spend
//! that produced the current tip. This module holds the pure data model and
//! delta application; all CLVM plumbing lives in `record::codec`.

use chia_bls::PublicKey;
use chia_protocol::{Bytes, Bytes32};

use crate::error::{Error, Result};

/// Operation tag for prepending an entry.
pub const OP_ADD: u8 = 16;
/// Operation tag for deleting the entry at an index.
pub const OP_REMOVE: u8 = 17;

/// Version carried by a freshly minted, never-mutated record.
pub const GENESIS_VERSION: u64 = 1;
/// Version sentinel written by a freeze; terminal.
pub const FROZEN_VERSION: u64 = 0;

/// One key-value entry. Keys and values are opaque byte strings.
pub type Entry = (Bytes, Bytes);

/// The mutation a spend commits to, applied when the next reader decodes
/// the lineage tip.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Delta {
    /// Prepend an entry at index 0.
    Add { key: Bytes, value: Bytes },
    /// Delete the entry at `index`; must be within bounds.
    Remove { index: u64 },
    /// No content change (freeze and ownership transfer spends).
    None,
}

/// Reconstructed record state at a lineage tip.
#[derive(Debug, Clone)]
pub struct RecordState {
    pub version: u64,
    pub entries: Vec<Entry>,
    /// Current owner key. `None` when the lineage has never been spent and
    /// the owner is not recoverable from the launcher reveal; the wallet
    /// substitutes its own key in that case.
    pub owner: Option<PublicKey>,
}

impl RecordState {
    /// State of a freshly minted record: version 1, no entries.
    pub fn genesis(owner: Option<PublicKey>) -> Self {
        Self { version: GENESIS_VERSION, entries: Vec::new(), owner }
    }

    pub fn is_frozen(&self) -> bool {
        self.version == FROZEN_VERSION
    }

    /// Apply a pending delta to the entry list. Versions are not touched
    /// here; the claimed version always comes from the spend solution.
    pub fn apply(&mut self, delta: &Delta) -> Result<()> {
        match delta {
            Delta::Add { key, value } => {
                self.entries.insert(0, (key.clone(), value.clone()));
                Ok(())
            }
            Delta::Remove { index } => {
                let i = *index as usize;
                if i >= self.entries.len() {
                    return Err(Error::IndexOutOfRange { index: *index, len: self.entries.len() });
                }
                self.entries.remove(i);
                Ok(())
            }
            Delta::None => Ok(()),
        }
    }
}

/// Parse a record identity from its canonical text form:
/// `0x` followed by exactly 64 hex characters.
pub fn parse_identity(s: &str) -> Result<Bytes32> {
    let bad = || Error::InvalidIdentity(s.to_string());
    if s.len() != 66 || !s.starts_with("0x") {
        return Err(bad());
    }
    let raw = hex::decode(&s[2..]).map_err(|_| bad())?;
    let arr: [u8; 32] = raw.try_into().map_err(|_| bad())?;
    Ok(Bytes32::new(arr))
}

/// Render a record identity in its canonical text form.
pub fn format_identity(id: &Bytes32) -> String {
    format!("0x{}", hex::encode(id))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn b(s: &str) -> Bytes {
        s.as_bytes().to_vec().into()
    }

    fn entry(k: &str, v: &str) -> Entry {
        (b(k), b(v))
    }

    #[test]
    fn test_add_prepends() {
        let mut state = RecordState::genesis(None);
        state.apply(&Delta::Add { key: b("k1"), value: b("v1") }).unwrap();
        state.apply(&Delta::Add { key: b("k2"), value: b("v2") }).unwrap();
        assert_eq!(state.entries.len(), 2);
        assert_eq!(state.entries[0], entry("k2", "v2"));
        assert_eq!(state.entries[1], entry("k1", "v1"));
    }

    #[test]
    fn test_remove_in_bounds() {
        let mut state = RecordState::genesis(None);
        state.entries = vec![entry("a", "1"), entry("b", "2"), entry("c", "3")];
        state.apply(&Delta::Remove { index: 1 }).unwrap();
        assert_eq!(state.entries, vec![entry("a", "1"), entry("c", "3")]);
    }

    #[test]
    fn test_remove_out_of_bounds() {
        let mut state = RecordState::genesis(None);
        state.entries = vec![entry("a", "1")];
        let err = state.apply(&Delta::Remove { index: 1 }).unwrap_err();
        assert!(matches!(err, Error::IndexOutOfRange { index: 1, len: 1 }));
    }

    #[test]
    fn test_replay_matches_direct_application() {
        // Decoding after N operations must equal applying the same ops in
        // order to an initially empty sequence.
        let ops = vec![
            Delta::Add { key: b("k1"), value: b("v1") },
            Delta::Add { key: b("k2"), value: b("v2") },
            Delta::Remove { index: 1 },
        ];
        let mut state = RecordState::genesis(None);
        for op in &ops {
            state.apply(op).unwrap();
        }
        assert_eq!(state.entries, vec![entry("k2", "v2")]);
    }

    #[test]
    fn test_none_is_noop() {
        let mut state = RecordState::genesis(None);
        state.entries = vec![entry("a", "1")];
        state.apply(&Delta::None).unwrap();
        assert_eq!(state.entries.len(), 1);
    }

    #[test]
    fn test_frozen_sentinel() {
        let mut state = RecordState::genesis(None);
        assert!(!state.is_frozen());
        state.version = FROZEN_VERSION;
        assert!(state.is_frozen());
    }

    #[test]
    fn test_identity_format() {
        let id = Bytes32::new([0xab; 32]);
        let text = format_identity(&id);
        assert_eq!(text.len(), 66);
        assert_eq!(parse_identity(&text).unwrap(), id);

        assert!(parse_identity("ab").is_err());
        assert!(parse_identity(&"ab".repeat(33)).is_err());
        let no_prefix = "ab".repeat(33);
        assert!(parse_identity(&no_prefix[..66]).is_err());
        let bad_hex = format!("0x{}", "zz".repeat(32));
        assert!(parse_identity(&bad_hex).is_err());
    }
}
