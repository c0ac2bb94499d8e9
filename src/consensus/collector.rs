//! # VoteCollector
//!
//! Timeout-bounded tally aggregation over a channel of vote replies (§4.5
//! steps 3-5). Grounded on the teacher's `network/consensus_loop.rs`, which
//! drains a `tokio::sync::mpsc` channel under `tokio::time::timeout` rather
//! than polling.

use std::collections::HashSet;
use std::time::Duration;

use tokio::sync::mpsc::Receiver;
use tokio::time::{timeout, Instant};
use tracing::{debug, warn};

use crate::bag::Bag;
use crate::id::{Id, NodeId};
use crate::interfaces::VoteMsg;

/// Result of draining one round's worth of vote replies.
#[derive(Debug, Clone)]
pub struct CollectedVotes {
    /// Votes in favor of the item, by distinct sender.
    pub tally: Bag<Id>,
    /// Distinct senders that replied at all (for sampler health reporting).
    pub responded: HashSet<NodeId>,
    /// True if the deadline elapsed before any reply arrived.
    pub timed_out_empty: bool,
}

/// Drains `rx` until `deadline` elapses, deduplicating replies by sender and
/// tallying `prefer = true` votes into a [`Bag`] keyed by `item`.
///
/// A sender that replies more than once for the same round has only its
/// first reply counted; later ones are dropped silently, matching the
/// collector-side dedup responsibility documented on
/// [`crate::interfaces::Transport::request_votes`].
pub async fn collect(
    mut rx: Receiver<VoteMsg>,
    item: Id,
    round_timeout: Duration,
) -> CollectedVotes {
    let deadline = Instant::now() + round_timeout;
    let mut tally = Bag::new();
    let mut responded = HashSet::new();

    loop {
        let remaining = deadline.saturating_duration_since(Instant::now());
        if remaining.is_zero() {
            break;
        }
        match timeout(remaining, rx.recv()).await {
            Ok(Some(msg)) => {
                if msg.item != item {
                    continue;
                }
                if !responded.insert(msg.sender) {
                    continue;
                }
                if msg.prefer {
                    tally.add(item);
                }
                debug!(sender = %msg.sender, prefer = msg.prefer, "vote recorded");
            }
            Ok(None) => break, // channel closed, transport is done
            Err(_) => break,   // deadline elapsed
        }
    }

    let timed_out_empty = responded.is_empty();
    if timed_out_empty {
        warn!(item = %item, "round collected zero votes before deadline");
    }

    CollectedVotes {
        tally,
        responded,
        timed_out_empty,
    }
}
