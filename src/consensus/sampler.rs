//! # Sampler
//!
//! Weighted, without-replacement peer sampling (§4.3). Grounded on the
//! teacher's `network/gossip.rs` peer table: a `DashMap`-backed registry of
//! peer health/latency stats, read under short-lived locks rather than held
//! across an await point.
//!
//! The scoring function is deliberately simple and deterministic (no RNG):
//! `stake * 1/(1+latency_ms) * health_score`, selected greedily highest-score
//! first. Each selected peer's `health_score` is halved as it's picked, so
//! repeated `sample` calls against an unchanged peer set rotate load across
//! the pool instead of returning the identical top-K forever.

use std::collections::HashMap;

use parking_lot::RwLock;
use tracing::debug;

use crate::id::NodeId;

/// A peer's sampling-relevant stats, updated by [`Sampler::report`].
#[derive(Debug, Clone, Copy)]
struct PeerStats {
    stake: u64,
    latency_ms: u64,
    /// `1 + 0.05 * good_count`, decayed towards 0 on timeout/bad-sig reports.
    health_score: f64,
}

impl PeerStats {
    fn score(&self) -> f64 {
        let latency_term = 1.0 / (1.0 + self.latency_ms as f64);
        self.stake as f64 * latency_term * self.health_score
    }
}

/// Outcome of a vote-request probe, reported back via [`Sampler::report`]
/// (§4.3).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProbeOutcome {
    Good,
    Timeout,
    BadSig,
}

/// Weighted-without-replacement peer sampler (§4.3).
///
/// Interior mutability via `parking_lot::RwLock` lets `sample`/`report` take
/// `&self`, matching the teacher's pattern of sharing a registry behind an
/// `Arc` across tasks without a surrounding `Mutex` at the call site.
pub struct Sampler {
    peers: RwLock<HashMap<NodeId, PeerStats>>,
}

impl Default for Sampler {
    fn default() -> Self {
        Self::new()
    }
}

impl Sampler {
    pub fn new() -> Self {
        Sampler {
            peers: RwLock::new(HashMap::new()),
        }
    }

    /// Registers or resets a peer's stake and latency. Health score starts
    /// at 1.0 (neutral) for a peer not previously seen.
    pub fn register(&self, peer: NodeId, stake: u64, latency_ms: u64) {
        let mut peers = self.peers.write();
        let entry = peers.entry(peer).or_insert(PeerStats {
            stake,
            latency_ms,
            health_score: 1.0,
        });
        entry.stake = stake;
        entry.latency_ms = latency_ms;
    }

    /// Removes a peer from the sampling pool entirely (e.g. on validator-set
    /// rotation).
    pub fn remove(&self, peer: &NodeId) {
        self.peers.write().remove(peer);
    }

    pub fn peer_count(&self) -> usize {
        self.peers.read().len()
    }

    /// Samples up to `k` distinct peers without replacement, greedily by
    /// descending score, then halves each selected peer's `health_score`
    /// (§4.3). `topic` is accepted for future per-topic weighting but does
    /// not currently affect the score (§4.3 leaves per-topic bias
    /// unspecified beyond the base formula).
    ///
    /// Returns fewer than `k` peers if the pool is smaller than `k`; never
    /// panics on an undersized pool (§4.3 edge case).
    pub fn sample(&self, k: usize, _topic: Option<&str>) -> Vec<NodeId> {
        let mut peers = self.peers.write();
        let mut scored: Vec<(NodeId, f64)> = peers
            .iter()
            .map(|(id, stats)| (*id, stats.score()))
            .collect();
        // Stable sort descending by score; ties broken by id for determinism.
        scored.sort_by(|a, b| {
            b.1.partial_cmp(&a.1)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then_with(|| a.0.cmp(&b.0))
        });
        scored.truncate(k);
        let chosen: Vec<NodeId> = scored.into_iter().map(|(id, _)| id).collect();
        for id in &chosen {
            if let Some(stats) = peers.get_mut(id) {
                stats.health_score = (stats.health_score * 0.5).max(0.01);
            }
        }
        debug!(requested = k, got = chosen.len(), "sampled peers");
        chosen
    }

    /// Updates `peer`'s health score based on a probe outcome (§4.3):
    /// `Good` nudges the score up by 0.05 (capped), `Timeout`/`BadSig` halve
    /// it, with a floor near zero so a persistently bad peer eventually
    /// drops out of greedy selection without being forcibly removed.
    pub fn report(&self, peer: &NodeId, outcome: ProbeOutcome) {
        let mut peers = self.peers.write();
        if let Some(stats) = peers.get_mut(peer) {
            match outcome {
                ProbeOutcome::Good => {
                    stats.health_score = (stats.health_score + 0.05).min(2.0);
                }
                ProbeOutcome::Timeout | ProbeOutcome::BadSig => {
                    stats.health_score = (stats.health_score * 0.5).max(0.01);
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn node(n: u8) -> NodeId {
        NodeId::from_bytes(&[n])
    }

    #[test]
    fn sample_returns_fewer_than_k_on_small_pool() {
        let sampler = Sampler::new();
        sampler.register(node(1), 100, 10);
        let chosen = sampler.sample(5, None);
        assert_eq!(chosen.len(), 1);
    }

    #[test]
    fn sample_is_without_replacement() {
        let sampler = Sampler::new();
        for i in 0..5 {
            sampler.register(node(i), 100, 10);
        }
        let chosen = sampler.sample(3, None);
        assert_eq!(chosen.len(), 3);
        let mut uniq = chosen.clone();
        uniq.sort();
        uniq.dedup();
        assert_eq!(uniq.len(), 3);
    }

    #[test]
    fn higher_stake_is_preferred() {
        let sampler = Sampler::new();
        sampler.register(node(1), 10, 10);
        sampler.register(node(2), 1000, 10);
        let chosen = sampler.sample(1, None);
        assert_eq!(chosen, vec![node(2)]);
    }

    #[test]
    fn lower_latency_is_preferred_at_equal_stake() {
        let sampler = Sampler::new();
        sampler.register(node(1), 100, 500);
        sampler.register(node(2), 100, 5);
        let chosen = sampler.sample(1, None);
        assert_eq!(chosen, vec![node(2)]);
    }

    #[test]
    fn timeout_report_demotes_peer_below_a_good_one() {
        let sampler = Sampler::new();
        sampler.register(node(1), 100, 10);
        sampler.register(node(2), 100, 10);
        for _ in 0..5 {
            sampler.report(&node(1), ProbeOutcome::Timeout);
        }
        let chosen = sampler.sample(1, None);
        assert_eq!(chosen, vec![node(2)]);
    }

    #[test]
    fn sample_of_empty_pool_is_empty() {
        let sampler = Sampler::new();
        assert!(sampler.sample(3, None).is_empty());
    }

    #[test]
    fn remove_drops_peer_from_pool() {
        let sampler = Sampler::new();
        sampler.register(node(1), 100, 10);
        sampler.remove(&node(1));
        assert_eq!(sampler.peer_count(), 0);
    }
}
