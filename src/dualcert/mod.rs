//! # DualCertOverlay
//!
//! Binds a finalized decision to an externally-produced BLS aggregate +
//! lattice-based threshold signature bundle, epoch-scoped, backed by a
//! background worker pool that keeps a buffer of precomputed shares ready so
//! certificate generation on the hot path rarely blocks on fresh signing
//! (§4.7). Both signature primitives are out of scope here — they live
//! behind [`crate::interfaces::PqEngine`] — this module only owns the
//! epoch-binding, buffering, and bookkeeping around them.
//!
//! Grounded on the teacher's `network/consensus_loop.rs` background-task
//! pattern: a `tokio::spawn`ed loop cooperating with a
//! `tokio_util::sync::CancellationToken` rather than an ad hoc shutdown flag.

use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use dashmap::DashMap;
use tokio::task::JoinHandle;
use tokio::time::sleep;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::config::DUALCERT_DOMAIN_PREFIX;
use crate::consensus::params::DualCertConfig;
use crate::errors::DualCertError;
use crate::id::{Id, NodeId, TxRef};
use crate::interfaces::{PqBundle, PqEngine};

/// An epoch-bound certificate over a finalized item.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Certificate {
    pub epoch: u64,
    pub binding: Id,
    pub bundle: PqBundle,
}

/// Epoch-bound dual-signature overlay (§4.7).
pub struct DualCertOverlay {
    config: DualCertConfig,
    pq_engine: Arc<dyn PqEngine>,

    current_epoch: AtomicU64,
    /// Items whose underlying core has finalized them, and the epoch at
    /// which that happened — [`Self::generate_certificate`] refuses to act
    /// on an item that was never tracked.
    tracked: DashMap<TxRef, u64>,
    certs: DashMap<TxRef, Certificate>,

    /// Count of currently-buffered precomputed shares (§4.7 worker pool).
    precompute_buffer: Arc<AtomicUsize>,
    cancel: CancellationToken,
}

impl DualCertOverlay {
    pub fn new(config: DualCertConfig, pq_engine: Arc<dyn PqEngine>) -> Self {
        DualCertOverlay {
            config,
            pq_engine,
            current_epoch: AtomicU64::new(0),
            tracked: DashMap::new(),
            certs: DashMap::new(),
            precompute_buffer: Arc::new(AtomicUsize::new(0)),
            cancel: CancellationToken::new(),
        }
    }

    /// Spawns the background precompute worker, topping up the buffer
    /// towards `precompute_depth` (target 50, floor 20 per
    /// `crate::config`). Returns the task handle; drop the returned
    /// `CancellationToken` guard (via [`Self::shutdown`]) to stop it.
    pub fn spawn_precompute_worker(self: &Arc<Self>) -> JoinHandle<()> {
        let buffer = self.precompute_buffer.clone();
        let target = self.config.precompute_depth.max(crate::config::DEFAULT_PRECOMPUTE_MIN);
        let cancel = self.cancel.clone();

        tokio::spawn(async move {
            loop {
                let current = buffer.load(Ordering::Acquire);
                if current < target {
                    // Simulated precompute latency; the actual lattice-share
                    // material is produced by the external `PqEngine`
                    // implementation, not this crate.
                    tokio::select! {
                        _ = sleep(Duration::from_millis(5)) => {
                            buffer.fetch_add(1, Ordering::AcqRel);
                        }
                        _ = cancel.cancelled() => break,
                    }
                } else {
                    tokio::select! {
                        _ = sleep(Duration::from_millis(50)) => {}
                        _ = cancel.cancelled() => break,
                    }
                }
            }
            debug!("precompute worker stopped");
        })
    }

    pub fn shutdown(&self) {
        self.cancel.cancel();
    }

    pub fn precompute_buffer_depth(&self) -> usize {
        self.precompute_buffer.load(Ordering::Acquire)
    }

    pub fn is_under_provisioned(&self) -> bool {
        self.precompute_buffer_depth() < crate::config::DEFAULT_PRECOMPUTE_MIN
    }

    pub fn current_epoch(&self) -> u64 {
        self.current_epoch.load(Ordering::Acquire)
    }

    /// Marks `item` as finalized by the underlying core as of `epoch`,
    /// making it eligible for certificate generation.
    pub fn track(&self, item: TxRef, epoch: u64) {
        self.tracked.insert(item, epoch);
    }

    /// Attempts to produce and bind a certificate for `item`.
    ///
    /// Returns `Ok(true)` if a certificate now exists, `Ok(false)` if the
    /// precompute buffer and the online fallback both came up short (safe
    /// to retry on a later round — this is not treated as an error per the
    /// decided Open Question), and `Err` only for misuse (`item` was never
    /// tracked) or a genuine precompute + online failure.
    pub async fn generate_certificate(
        &self,
        item: TxRef,
        voters: &[NodeId],
    ) -> Result<bool, DualCertError> {
        let tracked_epoch = *self
            .tracked
            .get(&item)
            .ok_or(DualCertError::NotFinalized(item))?;

        if let Some(existing) = self.certs.get(&item) {
            if existing.epoch == self.current_epoch() {
                return Ok(true);
            }
        }

        let had_precomputed = self
            .precompute_buffer
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |n| {
                if n > 0 {
                    Some(n - 1)
                } else {
                    None
                }
            })
            .is_ok();

        if !had_precomputed {
            warn!(item = %item, "precompute buffer empty, falling back to online path");
        }

        self.pq_engine.submit(&item, voters);

        if !self.pq_engine.has_pq(&item) {
            if had_precomputed {
                return Err(DualCertError::PrecomputeAndOnlineFailed(item));
            }
            return Ok(false);
        }

        let bundle = self
            .pq_engine
            .get_pq(&item)
            .ok_or(DualCertError::PrecomputeAndOnlineFailed(item))?;

        let epoch = self.current_epoch();
        let binding = Id::derive_domain(DUALCERT_DOMAIN_PREFIX, epoch, &item);
        let cert = Certificate { epoch, binding, bundle };
        self.certs.insert(item, cert);
        let _ = tracked_epoch;
        info!(item = %item, epoch, "certificate generated");
        Ok(true)
    }

    /// True iff a valid (current-epoch) certificate exists for `item`.
    pub fn has_certificate(&self, item: &TxRef) -> bool {
        self.certs
            .get(item)
            .map(|c| c.epoch == self.current_epoch())
            .unwrap_or(false)
    }

    /// Returns the certificate for `item` if it exists and is bound to the
    /// current epoch; a stale-epoch certificate is evicted and `None` is
    /// returned rather than surfacing `StaleEpoch` here (callers needing the
    /// error variant should check `current_epoch` against the cert directly).
    pub fn get_certificate(&self, item: &TxRef) -> Option<Certificate> {
        let cert = self.certs.get(item)?.clone();
        if cert.epoch != self.current_epoch() {
            self.certs.remove(item);
            return None;
        }
        Some(cert)
    }

    pub fn is_finalized(&self, item: &TxRef) -> bool {
        self.has_certificate(item)
    }

    /// Advances the epoch, invalidating certificates bound to the old one.
    /// Tracked-finalization entries are retained — a decision's finality
    /// does not expire, only its dual-cert binding does.
    pub fn advance_epoch(&self) {
        let new_epoch = self.current_epoch.fetch_add(1, Ordering::AcqRel) + 1;
        self.certs.retain(|_, c| c.epoch == new_epoch);
        info!(epoch = new_epoch, "dual-cert epoch advanced");
    }
}
