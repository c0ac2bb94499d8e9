//! # FPCEngine — Fast-Path Certification
//!
//! Per-object non-equivocation tracking and bitset vote tallying for owned
//! (single-signer) transactions, promoting a tx through
//! `Pending -> Executable -> Final` once it crosses a 2f+1 committee
//! threshold and its witnessing block is DAG-durable (§4.6).
//!
//! Grounded on the teacher's `network/mempool.rs` sharded-map pattern:
//! concurrent per-key state lives in `dashmap::DashMap` so readers never
//! block writers on unrelated keys, matching how the teacher shards its
//! pending-transaction pool.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};

use dashmap::DashMap;
use tracing::{debug, warn};

use crate::consensus::params::FpcConfig;
use crate::errors::FpcError;
use crate::id::{BlockId, NodeId, ObjectId, TxRef};
use crate::interfaces::{CandidateSource, Classifier, Committee, DagTap};

/// Lifecycle status of a tracked transaction (§4.6 F2: monotonic, one-way).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TxStatus {
    Pending,
    Executable,
    /// Crossed 2f+1 on a contested input; will never finalize without
    /// external (slow-path) resolution. A terminal state like `Final`.
    Mixed,
    Final,
}

#[derive(Debug, Default, Clone)]
struct VoteBitset {
    bits: Vec<bool>,
}

impl VoteBitset {
    fn sized(n: usize) -> Self {
        VoteBitset { bits: vec![false; n] }
    }

    fn set(&mut self, index: usize) {
        if index >= self.bits.len() {
            self.bits.resize(index + 1, false);
        }
        self.bits[index] = true;
    }

    fn count(&self) -> usize {
        self.bits.iter().filter(|b| **b).count()
    }
}

/// Fast-path certification engine for owned-input transactions (§4.6).
pub struct FpcEngine {
    config: FpcConfig,
    committee: Box<dyn Committee>,
    classifier: Box<dyn Classifier>,
    dag_tap: Box<dyn DagTap>,

    epoch: AtomicU64,
    epoch_closed: AtomicBool,

    votes: DashMap<TxRef, VoteBitset>,
    /// (author, owned object) -> the single tx that author has voted for on
    /// that object this epoch. A second, different tx for the same key is
    /// an equivocation (F1).
    voted_on: DashMap<(NodeId, ObjectId), TxRef>,
    tx_status: DashMap<TxRef, TxStatus>,
    /// Authors observed to have set the epoch-close bit this epoch (§4.6).
    epoch_bit_authors: DashMap<NodeId, ()>,
}

impl FpcEngine {
    pub fn new(
        config: FpcConfig,
        committee: Box<dyn Committee>,
        classifier: Box<dyn Classifier>,
        dag_tap: Box<dyn DagTap>,
    ) -> Self {
        FpcEngine {
            config,
            committee,
            classifier,
            dag_tap,
            epoch: AtomicU64::new(0),
            epoch_closed: AtomicBool::new(false),
            votes: DashMap::new(),
            voted_on: DashMap::new(),
            tx_status: DashMap::new(),
            epoch_bit_authors: DashMap::new(),
        }
    }

    /// 2f+1 where `f = floor((N-1)/3)`, `N` the committee size.
    fn threshold(&self) -> usize {
        let n = self.committee.size();
        let f = n.saturating_sub(1) / 3;
        2 * f + 1
    }

    pub fn epoch(&self) -> u64 {
        self.epoch.load(Ordering::Acquire)
    }

    /// Up to `max` eligible owned-input candidates this node (`me`) picks
    /// for inclusion in the next block it authors (§4.6 `NextVotes`).
    ///
    /// For each candidate, reserves `voted_on[(me, object)] = tx` for every
    /// owned object so the node never later equivocates against its own
    /// pick within the epoch; a candidate conflicting with an
    /// already-reserved object is skipped rather than reserved twice.
    pub fn next_votes(&self, me: NodeId, source: &dyn CandidateSource, max: usize) -> Vec<TxRef> {
        if self.epoch_closed.load(Ordering::Acquire) {
            return Vec::new();
        }
        let mut picked = Vec::new();
        for tx in source.eligible(max) {
            if matches!(self.status(&tx), TxStatus::Final | TxStatus::Mixed) {
                continue;
            }
            let owned = self.classifier.owned_inputs(&tx);
            if owned.is_empty() {
                continue;
            }
            if owned
                .iter()
                .any(|o| self.voted_on.get(&(me, *o)).map(|v| *v != tx).unwrap_or(false))
            {
                continue;
            }
            for object in &owned {
                self.voted_on.entry((me, *object)).or_insert(tx);
            }
            picked.push(tx);
        }
        picked
    }

    /// Records a batch of votes witnessed in `block`. Votes keep tallying
    /// even after the epoch has begun closing — only `next_votes` stops
    /// proposing new local votes during the pause (F5).
    pub fn on_block_observed(
        &self,
        block: BlockId,
        votes: &[(NodeId, TxRef)],
    ) -> Result<(), FpcError> {
        for (author, tx) in votes {
            let index = self
                .committee
                .index_of(author)
                .ok_or(FpcError::UnknownAuthor)?;
            self.record_vote(block, *author, index, *tx);
        }
        Ok(())
    }

    fn record_vote(&self, block: BlockId, author: NodeId, index: usize, tx: TxRef) {
        let owned = self.classifier.owned_inputs(&tx);
        for object in &owned {
            let key = (author, *object);
            match self.voted_on.get(&key).map(|v| *v) {
                Some(existing) if existing != tx => {
                    // Silent no-op (F1): the second vote on an already-claimed
                    // object is dropped. `Mixed` is reserved for the
                    // standalone `Classifier::conflicts`-driven path.
                    warn!(author = %author, object = %object, a = %existing, b = %tx, "equivocation dropped");
                    return;
                }
                _ => {
                    self.voted_on.insert(key, tx);
                }
            }
        }

        let n = self.committee.size();
        let mut bitset = self.votes.entry(tx).or_insert_with(|| VoteBitset::sized(n));
        bitset.set(index);
        let count = bitset.count();
        drop(bitset);

        self.tx_status.entry(tx).or_insert(TxStatus::Pending);
        if count >= self.threshold() {
            self.promote_to_executable(block, tx);
        }
    }

    fn promote_to_executable(&self, block: BlockId, tx: TxRef) {
        let mut entry = self.tx_status.entry(tx).or_insert(TxStatus::Pending);
        if *entry == TxStatus::Pending {
            *entry = TxStatus::Executable;
            debug!(tx = %tx, block = %block, "tx promoted to executable");
        }
    }

    fn mark_mixed(&self, tx: TxRef) {
        let mut entry = self.tx_status.entry(tx).or_insert(TxStatus::Pending);
        if !matches!(*entry, TxStatus::Final) {
            *entry = TxStatus::Mixed;
        }
    }

    /// Promotes every `Executable` tx whose witnessing block's vote is now
    /// durable under `block`'s ancestry to `Final` (F4). If `author` has set
    /// the epoch-close bit on `block`, records it towards
    /// [`Self::epoch_close_ready`]'s 2f+1 quorum.
    pub fn on_block_accepted(&self, block: BlockId, author: NodeId, epoch_bit: bool) {
        let executables: Vec<TxRef> = self
            .tx_status
            .iter()
            .filter(|e| *e.value() == TxStatus::Executable)
            .map(|e| *e.key())
            .collect();
        for tx in executables {
            if self.dag_tap.in_ancestry(&block, &tx) {
                self.tx_status.insert(tx, TxStatus::Final);
                debug!(tx = %tx, block = %block, "tx finalized");
            }
        }

        if epoch_bit {
            self.epoch_bit_authors.insert(author, ());
        }
    }

    /// True once 2f+1 distinct authors have set the epoch-close bit this
    /// epoch — the signal an embedding `Engine` uses to call
    /// [`Self::on_epoch_close_start`].
    pub fn epoch_close_ready(&self) -> bool {
        self.epoch_bit_authors.len() >= self.threshold()
    }

    /// Begins epoch closure: subsequent `next_votes` calls stop proposing
    /// new local votes until [`Self::on_epoch_closed`] completes the
    /// rollover. Incoming votes via `on_block_observed` keep tallying.
    pub fn on_epoch_close_start(&self) {
        self.epoch_closed.store(true, Ordering::Release);
    }

    /// Completes the epoch rollover: bumps the epoch counter and clears the
    /// per-epoch `voted_on` and `epoch_bit_authors` tables (non-equivocation
    /// and close-readiness only apply within an epoch). Vote bitsets and tx
    /// statuses are carried over, since a tx's lifecycle is not epoch-scoped.
    pub fn on_epoch_closed(&self) {
        self.voted_on.clear();
        self.epoch_bit_authors.clear();
        self.epoch.fetch_add(1, Ordering::AcqRel);
        self.epoch_closed.store(false, Ordering::Release);
    }

    pub fn status(&self, tx: &TxRef) -> TxStatus {
        self.tx_status.get(tx).map(|e| *e).unwrap_or(TxStatus::Pending)
    }

    /// Force-marks `tx` as `Mixed`, e.g. on an externally detected conflict
    /// (§4.6). A no-op if `tx` is already `Final`.
    pub fn mark_mixed_external(&self, tx: TxRef) {
        self.mark_mixed(tx);
    }

    pub fn config(&self) -> &FpcConfig {
        &self.config
    }
}
