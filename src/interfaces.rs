//! # Collaborator Interfaces
//!
//! Narrow traits through which the core consumes everything §1 declares out
//! of scope: P2P transport, validator-set/committee membership, the
//! owned-input classifier, DAG ancestry, the mempool-like candidate source,
//! and the post-quantum signing engine. Grounded on the teacher's
//! `network/node.rs`, which defines its networking seam behind
//! `#[async_trait]` traits rather than concrete types.

use async_trait::async_trait;

use crate::id::{BlockId, NodeId, ObjectId, TxRef};

/// A single vote reply from a peer, as yielded by [`Transport::request_votes`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VoteMsg {
    pub item: crate::id::Id,
    pub prefer: bool,
    pub sender: NodeId,
    pub timestamp_ms: u64,
}

/// Requests votes from a set of peers and yields replies as they arrive.
///
/// The "lazy sequence of vote messages" of §4.5/§6 is modeled directly as a
/// bounded `tokio::sync::mpsc::Receiver`, matching the teacher's preference
/// for channel-based async plumbing (`network/consensus_loop.rs`'s
/// `tokio::sync::watch` shutdown channel) over hand-rolled polling.
#[async_trait]
pub trait Transport: Send + Sync {
    /// Issues a vote request to `peers` for `item`, returning a channel of
    /// replies. Implementations must tag replies with a `sender` identity;
    /// duplicate replies from the same sender for the same item-round are
    /// tolerated and deduplicated by the collector, not the transport.
    async fn request_votes(
        &self,
        peers: &[NodeId],
        item: crate::id::Id,
    ) -> tokio::sync::mpsc::Receiver<VoteMsg>;
}

/// Validator-set membership, queried by the FPC subsystem to map an author
/// identity to a committee index (§4.6, §6).
pub trait Committee: Send + Sync {
    /// Total committee size, `N`.
    fn size(&self) -> usize;
    /// Maps an author's identity bytes to a validator index, if known.
    fn index_of(&self, author: &NodeId) -> Option<usize>;
}

/// Classifies transactions by their owned (single-signer) inputs and
/// conflict relation (§4.6, §6).
pub trait Classifier: Send + Sync {
    /// The set of single-owner object ids a tx references. Empty if the tx
    /// has no owned inputs (it is then skipped by the FPC subsystem).
    fn owned_inputs(&self, tx: &TxRef) -> Vec<ObjectId>;
    /// Whether two transactions conflict (reference a shared/contested input).
    fn conflicts(&self, a: &TxRef, b: &TxRef) -> bool;
}

/// DAG ancestry queries used to confirm a vote's witness block is durable
/// before promoting a tx from Executable to Final (§4.6 F4).
pub trait DagTap: Send + Sync {
    /// True iff `block`'s ancestry contains a block carrying the vote for `tx`.
    fn in_ancestry(&self, block: &BlockId, tx: &TxRef) -> bool;
}

/// A mempool-like view of eligible owned transactions, consumed by
/// [`crate::fpc::FpcEngine::next_votes`] (§4.6).
pub trait CandidateSource: Send + Sync {
    /// Up to `max` eligible candidate tx refs.
    fn eligible(&self, max: usize) -> Vec<TxRef>;
}

/// The post-quantum signing engine: BLS aggregation and lattice-based
/// threshold signing. Both primitives are explicitly out of scope (§1) —
/// this crate only defines the interface the dual-cert overlay calls
/// through.
pub trait PqEngine: Send + Sync {
    /// Submits a tx for PQ certification once it crosses 2f+1 votes,
    /// alongside the voter set that crossed the threshold.
    fn submit(&self, tx: &TxRef, voters: &[NodeId]);
    /// Whether a PQ bundle is ready for `tx`.
    fn has_pq(&self, tx: &TxRef) -> bool;
    /// Fetches the PQ bundle for `tx`, if ready.
    fn get_pq(&self, tx: &TxRef) -> Option<PqBundle>;
}

/// Opaque PQ certificate bytes, produced by an external `PqEngine`
/// implementation. The core never inspects the contents.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PqBundle {
    pub bls_aggregate: Vec<u8>,
    pub lattice_threshold: Vec<u8>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    struct FixedCommittee {
        index: HashMap<NodeId, usize>,
    }

    impl Committee for FixedCommittee {
        fn size(&self) -> usize {
            self.index.len()
        }
        fn index_of(&self, author: &NodeId) -> Option<usize> {
            self.index.get(author).copied()
        }
    }

    #[test]
    fn committee_maps_known_author() {
        let node = NodeId::from_bytes(&[1]);
        let mut index = HashMap::new();
        index.insert(node, 0);
        let committee = FixedCommittee { index };
        assert_eq!(committee.index_of(&node), Some(0));
        assert_eq!(committee.size(), 1);
    }

    #[test]
    fn committee_unknown_author_is_none() {
        let committee = FixedCommittee { index: HashMap::new() };
        assert_eq!(committee.index_of(&NodeId::from_bytes(&[9])), None);
    }
}
