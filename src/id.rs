//! # Identifiers
//!
//! Every choice, block, transaction, and validator in this crate is addressed
//! by a fixed-width 32-byte identifier. `Id` is deliberately the only
//! identifier type: choice ids, node ids, object ids, and tx refs are all
//! `Id` under a type alias, so the same hashing, ordering, and hex-display
//! logic serves every collaborator interface in `interfaces.rs`.

use std::fmt;

/// A 32-byte opaque identifier, totally ordered by lexicographic byte
/// comparison. Used for choice ids, block/vertex ids, tx refs, and node ids.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, serde::Serialize, serde::Deserialize)]
pub struct Id(pub [u8; 32]);

impl Id {
    /// The zero id. Used as a sentinel for "no preference yet" and as the
    /// genesis parent reference.
    pub const ZERO: Id = Id([0u8; 32]);

    /// Builds an id from a byte slice, zero-padding or truncating to 32 bytes.
    pub fn from_bytes(bytes: &[u8]) -> Self {
        let mut buf = [0u8; 32];
        let n = bytes.len().min(32);
        buf[..n].copy_from_slice(&bytes[..n]);
        Id(buf)
    }

    /// Derives an id by hashing arbitrary bytes with BLAKE3. Useful for
    /// deriving a choice id from a block/vertex payload.
    pub fn derive(data: &[u8]) -> Self {
        Id(*blake3::hash(data).as_bytes())
    }

    /// Derives a domain-separated id, e.g. for certificate binding messages
    /// (prefix ∥ epoch ∥ item_id, per §4.7).
    pub fn derive_domain(domain: &[u8], epoch: u64, item: &Id) -> Self {
        let mut hasher = blake3::Hasher::new();
        hasher.update(domain);
        hasher.update(&epoch.to_le_bytes());
        hasher.update(&item.0);
        Id(*hasher.finalize().as_bytes())
    }

    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }

    pub fn is_zero(&self) -> bool {
        self.0 == [0u8; 32]
    }
}

impl From<[u8; 32]> for Id {
    fn from(bytes: [u8; 32]) -> Self {
        Id(bytes)
    }
}

impl fmt::Display for Id {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", hex::encode(self.0))
    }
}

/// A validator/peer identity. Alias kept distinct from `Id` at the type
/// level for readability even though the representation is identical.
pub type NodeId = Id;

/// A transaction reference, as voted on by the FPC subsystem.
pub type TxRef = Id;

/// A single-owner input reference (§3, "Owned input").
pub type ObjectId = Id;

/// A block/vertex identifier observed by the FPC and DAG-tap collaborators.
pub type BlockId = Id;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn zero_id_is_zero() {
        assert!(Id::ZERO.is_zero());
    }

    #[test]
    fn from_bytes_pads_short_input() {
        let id = Id::from_bytes(&[1, 2, 3]);
        assert_eq!(id.0[0], 1);
        assert_eq!(id.0[3], 0);
    }

    #[test]
    fn derive_is_deterministic() {
        let a = Id::derive(b"hello");
        let b = Id::derive(b"hello");
        assert_eq!(a, b);
        let c = Id::derive(b"world");
        assert_ne!(a, c);
    }

    #[test]
    fn ordering_is_lexicographic() {
        let a = Id::from_bytes(&[1]);
        let b = Id::from_bytes(&[2]);
        assert!(a < b);
    }

    #[test]
    fn display_is_hex() {
        let id = Id::from_bytes(&[0xde, 0xad]);
        assert!(id.to_string().starts_with("dead"));
    }
}
