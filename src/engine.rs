//! # Engine
//!
//! The top-level façade composing the [`Sampler`], the per-decision
//! [`ProtocolCore`] arena, and the optional FPC and dual-cert overlays into
//! a single driveable unit (§4.8). Grounded on the teacher's
//! `network/consensus_loop.rs`, which plays the same composing-façade role
//! over its own lower-level pieces (block production, vote application, DB
//! commit) behind a handful of explicit methods rather than a hidden loop.

use std::sync::Arc;
use std::time::Duration;

use dashmap::DashMap;
use futures::future::join_all;
use tokio::time::Instant;
use tracing::{debug, warn};

use crate::bag::Bag;
use crate::consensus::params::Parameters;
use crate::consensus::protocol_core::ProtocolCore;
use crate::consensus::round;
use crate::consensus::sampler::Sampler;
use crate::dualcert::DualCertOverlay;
use crate::errors::EngineError;
use crate::fpc::FpcEngine;
use crate::id::Id;
use crate::interfaces::{Transport, VoteMsg};

/// Snapshot returned by [`Engine::health_check`] (§4.8, §4.1
/// `MinPercentConnectedHealthy`).
#[derive(Debug, Clone)]
pub struct HealthReport {
    pub connected_peers: usize,
    pub percent_connected_healthy: f64,
    pub meets_minimum: bool,
    /// Items whose most recent round is older than
    /// `max_item_processing_time` (§3, §4.8) — a sign the round driver isn't
    /// being stepped often enough, or the item is stuck.
    pub stalled_items: Vec<Id>,
}

/// Composes sampling, round-driving, per-decision state, and the optional
/// overlays into the single entry point an embedding binary drives (§4.8).
pub struct Engine {
    params: Parameters,
    sampler: Arc<Sampler>,
    transport: Arc<dyn Transport>,
    cores: DashMap<Id, ProtocolCore>,
    last_round_at: DashMap<Id, Instant>,
    max_item_processing_time: Duration,
    round_timeout: Duration,
    min_round_interval: Duration,
    fpc: Option<Arc<FpcEngine>>,
    dualcert: Option<Arc<DualCertOverlay>>,
}

impl Engine {
    pub fn new(params: Parameters, sampler: Arc<Sampler>, transport: Arc<dyn Transport>) -> Self {
        Engine {
            params,
            sampler,
            transport,
            cores: DashMap::new(),
            last_round_at: DashMap::new(),
            max_item_processing_time: crate::config::DEFAULT_MAX_ITEM_PROCESSING_TIME,
            round_timeout: crate::config::DEFAULT_ROUND_TIMEOUT,
            min_round_interval: crate::config::DEFAULT_MIN_ROUND_INTERVAL,
            fpc: None,
            dualcert: None,
        }
    }

    pub fn with_round_timeout(mut self, timeout: Duration) -> Self {
        self.round_timeout = timeout;
        self
    }

    pub fn with_min_round_interval(mut self, interval: Duration) -> Self {
        self.min_round_interval = interval;
        self
    }

    pub fn with_fpc(mut self, fpc: Arc<FpcEngine>) -> Self {
        self.fpc = Some(fpc);
        self
    }

    pub fn with_dualcert(mut self, dualcert: Arc<DualCertOverlay>) -> Self {
        self.dualcert = Some(dualcert);
        self
    }

    pub fn fpc(&self) -> Option<&Arc<FpcEngine>> {
        self.fpc.as_ref()
    }

    pub fn dualcert(&self) -> Option<&Arc<DualCertOverlay>> {
        self.dualcert.as_ref()
    }

    pub fn params(&self) -> &Parameters {
        &self.params
    }

    /// Registers a new decision to be voted on. Enforces the
    /// `max_outstanding_items` backpressure bound (§3).
    pub fn add_item(&self, item: Id) -> Result<(), EngineError> {
        if self.cores.len() as u32 >= self.params.max_outstanding_items && !self.cores.contains_key(&item) {
            return Err(EngineError::TooManyOutstandingItems(
                self.params.max_outstanding_items as usize,
            ));
        }
        let mut core = self
            .cores
            .entry(item)
            .or_insert_with(|| ProtocolCore::new(self.params));
        core.add(item)?;
        Ok(())
    }

    /// Drives one round for `item` through the sample/request/collect/tally
    /// lifecycle (§4.5). Returns without error on a sampling/timeout hiccup
    /// that leaves the item unfinalized — those are surfaced as `Err`
    /// variants of [`crate::errors::RoundError`] for observability, not as
    /// engine-fatal conditions (§7).
    pub async fn step(&self, item: Id) -> Result<(), EngineError> {
        let mut core = self
            .cores
            .get_mut(&item)
            .ok_or(EngineError::UnknownDecision(item))?;

        round::run_round(
            &mut core,
            item,
            &self.sampler,
            self.transport.as_ref(),
            self.params.k as usize,
            self.round_timeout,
        )
        .await?;

        self.last_round_at.insert(item, Instant::now());

        if core.finalized() {
            if let Some(dualcert) = &self.dualcert {
                dualcert.track(item, dualcert.current_epoch());
            }
            debug!(item = %item, "item finalized");
        }
        Ok(())
    }

    /// True if `item` hasn't been rounded within `min_round_interval`, or
    /// has never been rounded at all (§3 backpressure knob).
    fn round_is_due(&self, item: &Id, now: Instant) -> bool {
        self.last_round_at
            .get(item)
            .map(|t| now.saturating_duration_since(*t) >= self.min_round_interval)
            .unwrap_or(true)
    }

    /// Selects the next eligible decisions — not finalized, not rate-limited
    /// by `min_round_interval` — and drives one round on each concurrently,
    /// in parallel up to `concurrent_polls` (§4.8, §4.5's "multiple items may
    /// advance in parallel subject to concurrent_polls bound"). The batch
    /// size targets `optimal_processing` under normal load but never exceeds
    /// the hard `concurrent_polls` cap.
    pub async fn step_eligible(&self) -> Vec<(Id, Result<(), EngineError>)> {
        let now = Instant::now();
        let batch = self.params.optimal_processing.min(self.params.concurrent_polls) as usize;

        let eligible: Vec<Id> = self
            .cores
            .iter()
            .filter(|e| !e.value().finalized())
            .map(|e| *e.key())
            .filter(|item| self.round_is_due(item, now))
            .take(batch)
            .collect();

        let results = join_all(eligible.iter().map(|item| self.step(*item))).await;
        eligible.into_iter().zip(results).collect()
    }

    /// Feeds a single externally-observed vote directly into its item's
    /// core, independent of the sampling round lifecycle. Useful when votes
    /// arrive via a push-style side channel rather than
    /// `Transport::request_votes`. Silently ignored if the item is already
    /// finalized (§4.4 I5).
    pub fn on_vote(&self, vote: VoteMsg) -> Result<(), EngineError> {
        let mut core = self
            .cores
            .get_mut(&vote.item)
            .ok_or(EngineError::UnknownDecision(vote.item))?;
        if core.finalized() {
            return Ok(());
        }
        let mut bag = Bag::new();
        if vote.prefer {
            bag.add(vote.item);
        }
        core.record_votes(&bag);
        Ok(())
    }

    pub fn is_finalized(&self, item: &Id) -> Result<bool, EngineError> {
        self.cores
            .get(item)
            .map(|c| c.finalized())
            .ok_or(EngineError::UnknownDecision(*item))
    }

    pub fn preference(&self, item: &Id) -> Result<Option<Id>, EngineError> {
        self.cores
            .get(item)
            .map(|c| c.preference())
            .ok_or(EngineError::UnknownDecision(*item))
    }

    /// All known items paired with their current preference.
    pub fn preferred(&self) -> Vec<(Id, Option<Id>)> {
        self.cores.iter().map(|e| (*e.key(), e.value().preference())).collect()
    }

    pub fn outstanding_count(&self) -> usize {
        self.cores.len()
    }

    /// Reports sampler connectivity against `MinPercentConnectedHealthy`
    /// (§4.1) and flags items that haven't been stepped within
    /// `max_item_processing_time`.
    pub fn health_check(&self) -> HealthReport {
        let connected = self.sampler.peer_count();
        let min_required = self.params.min_percent_connected_healthy();
        // Connectivity is expressed as a fraction of the configured sample
        // size K, matching how alpha_conf/K is used to derive the minimum.
        let percent = (connected as f64 / self.params.k as f64).min(1.0);
        let meets_minimum = percent >= min_required;

        let now = Instant::now();
        let stalled_items = self
            .last_round_at
            .iter()
            .filter(|e| now.saturating_duration_since(*e.value()) > self.max_item_processing_time)
            .map(|e| *e.key())
            .collect();

        if !meets_minimum {
            warn!(connected, min_required, "connectivity below minimum healthy threshold");
        }

        HealthReport {
            connected_peers: connected,
            percent_connected_healthy: percent,
            meets_minimum,
            stalled_items,
        }
    }
}
