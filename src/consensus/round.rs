//! # RoundDriver
//!
//! Drives a single decision through one round of the sample/request/collect/
//! tally/advance lifecycle (§4.5). Grounded on the teacher's
//! `network/consensus_loop.rs`, which is structured as exactly this kind of
//! explicit async step sequence rather than a hidden event loop.

use std::time::Duration;

use tracing::{debug, instrument};

use crate::bag::Bag;
use crate::consensus::protocol_core::ProtocolCore;
use crate::consensus::sampler::{ProbeOutcome, Sampler};
use crate::errors::RoundError;
use crate::id::Id;
use crate::interfaces::Transport;

/// The vote-count threshold a round must clear before its tally is even
/// offered to `ProtocolCore::record_votes` (§4.5 step 6).
///
/// When FPC dynamic thresholds are disabled this is just `alpha_pref`,
/// making this pre-gate a no-op — `record_votes` would reject the same
/// rounds anyway via its own fixed `alpha_pref`/`alpha_conf` comparison.
/// When enabled, the threshold decays from `theta_max·K` towards
/// `theta_min·K` as `num_polls` approaches `beta`, tightening agreement
/// requirements early and relaxing them as a decision drags on — the
/// threshold core still applies its own fixed thresholds on top once a
/// round clears this gate.
fn effective_threshold(core: &ProtocolCore, k: u32) -> u32 {
    let params = core.params();
    if !params.fpc.enabled {
        return params.alpha_pref;
    }
    let progress = (core.num_polls() as f64 / params.beta.max(1) as f64).min(1.0);
    let theta = params.fpc.theta_max - (params.fpc.theta_max - params.fpc.theta_min) * progress;
    ((theta * k as f64).ceil() as u32).clamp(1, k)
}

/// Drives one round for `item` against `core`.
///
/// Step order (§4.5):
/// 1. If `core` is already finalized, return `AlreadyDecided` without
///    touching the sampler or transport.
/// 2. Sample `k` peers; if the pool yields zero, treat as an unsuccessful
///    poll and return `SampleUnavailable` (non-fatal — callers retry next
///    round).
/// 3. Request votes and collect replies bounded by `round_timeout`.
/// 4. Report `Good`/`Timeout` back to the sampler per peer based on whether
///    they responded.
/// 5. Compute the effective threshold (FPC-dynamic if enabled, else fixed
///    `alpha_pref`) and derive a prefer-bit from yes/no vote counts; a
///    round that doesn't clear it in either direction is an unsuccessful
///    poll regardless of what `core`'s own fixed thresholds would have
///    allowed.
/// 6. Feed the resulting tally into `core.record_votes`, or
///    `record_unsuccessful_poll` if nothing came back before the deadline
///    or neither side cleared the effective threshold.
#[instrument(skip(core, sampler, transport), fields(item = %item))]
pub async fn run_round(
    core: &mut ProtocolCore,
    item: Id,
    sampler: &Sampler,
    transport: &dyn Transport,
    k: usize,
    round_timeout: Duration,
) -> Result<(), RoundError> {
    if core.finalized() {
        return Err(RoundError::AlreadyDecided(item));
    }

    let peers = sampler.sample(k, None);
    if peers.is_empty() {
        core.record_unsuccessful_poll();
        return Err(RoundError::SampleUnavailable { requested: k });
    }

    let rx = transport.request_votes(&peers, item).await;
    let collected = super::collector::collect(rx, item, round_timeout).await;

    for peer in &peers {
        if collected.responded.contains(peer) {
            sampler.report(peer, ProbeOutcome::Good);
        } else {
            sampler.report(peer, ProbeOutcome::Timeout);
        }
    }

    if collected.timed_out_empty {
        core.record_unsuccessful_poll();
        return Err(RoundError::TimeoutEmpty(item));
    }

    let total_votes = collected.responded.len() as u32;
    let yes_votes = collected.tally.count(&item) as u32;
    let no_votes = total_votes.saturating_sub(yes_votes);
    let threshold = effective_threshold(core, k as u32);

    if yes_votes < threshold && no_votes < threshold {
        debug!(yes_votes, no_votes, threshold, "round below effective threshold on both sides");
        core.record_unsuccessful_poll();
        return Ok(());
    }

    let mut bag: Bag<Id> = Bag::new();
    bag.add_count(item, yes_votes as i64);
    debug!(yes_votes, threshold, responders = peers.len(), "round tallied");
    core.record_votes(&bag);
    Ok(())
}
