//! End-to-end scenarios driving the full `Engine` through realistic
//! multi-round sequences, in the teacher's integration-test style
//! (a `tests/` binary exercising the public API only, no `pub(crate)` reach-in).

use std::sync::Arc;

use async_trait::async_trait;
use lux_snow_core::consensus::{Parameters, Sampler};
use lux_snow_core::engine::Engine;
use lux_snow_core::id::{Id, NodeId};
use lux_snow_core::interfaces::{Transport, VoteMsg};
use tokio::sync::mpsc;

/// A transport where every sampled peer votes in favor, unconditionally.
struct UnanimousTransport;

#[async_trait]
impl Transport for UnanimousTransport {
    async fn request_votes(&self, peers: &[NodeId], item: Id) -> mpsc::Receiver<VoteMsg> {
        let (tx, rx) = mpsc::channel(peers.len().max(1));
        for peer in peers {
            let _ = tx
                .send(VoteMsg {
                    item,
                    prefer: true,
                    sender: *peer,
                    timestamp_ms: 0,
                })
                .await;
        }
        rx
    }
}

/// A transport that never replies — every round times out empty.
struct SilentTransport;

#[async_trait]
impl Transport for SilentTransport {
    async fn request_votes(&self, _peers: &[NodeId], _item: Id) -> mpsc::Receiver<VoteMsg> {
        let (_tx, rx) = mpsc::channel(1);
        rx
    }
}

/// A transport where peers in `against` vote no, everyone else votes yes.
struct PartisanTransport {
    against: Vec<NodeId>,
}

#[async_trait]
impl Transport for PartisanTransport {
    async fn request_votes(&self, peers: &[NodeId], item: Id) -> mpsc::Receiver<VoteMsg> {
        let (tx, rx) = mpsc::channel(peers.len().max(1));
        for peer in peers {
            let prefer = !self.against.contains(peer);
            let _ = tx
                .send(VoteMsg {
                    item,
                    prefer,
                    sender: *peer,
                    timestamp_ms: 0,
                })
                .await;
        }
        rx
    }
}

fn sampler_with(n: u8) -> Arc<Sampler> {
    let sampler = Arc::new(Sampler::new());
    for i in 0..n {
        sampler.register(NodeId::from_bytes(&[i]), 1, 5);
    }
    sampler
}

// Scenario 1: Unanimous binary — every sampled peer agrees, the item
// finalizes within beta consecutive qualifying rounds.
#[tokio::test]
async fn scenario_unanimous_binary_finalizes() {
    let params = Parameters::new(5, 3, 4, 3, 1, 1, 16, Default::default(), Default::default()).unwrap();
    let engine = Engine::new(params, sampler_with(5), Arc::new(UnanimousTransport));
    let item = Id::from_bytes(&[1]);
    engine.add_item(item).unwrap();

    for _ in 0..params.beta {
        engine.step(item).await.unwrap();
    }
    assert!(engine.is_finalized(&item).unwrap());
    assert_eq!(engine.preference(&item).unwrap(), Some(item));
}

// Scenario 3: Silence — a transport that never replies should never
// finalize an item, and should not panic or error the engine out.
#[tokio::test]
async fn scenario_persistent_silence_never_finalizes() {
    let params = Parameters::local();
    let engine = Engine::new(params, sampler_with(3), Arc::new(SilentTransport));
    let item = Id::from_bytes(&[2]);
    engine.add_item(item).unwrap();

    for _ in 0..10 {
        let _ = engine.step(item).await;
    }
    assert!(!engine.is_finalized(&item).unwrap());
}

// Scenario 4: Finalized locks — once finalized, further rounds for the
// same item are refused as AlreadyDecided and the preference never moves.
#[tokio::test]
async fn scenario_finalized_item_rejects_further_rounds() {
    let params = Parameters::new(3, 2, 3, 1, 1, 1, 8, Default::default(), Default::default()).unwrap();
    let engine = Engine::new(params, sampler_with(3), Arc::new(UnanimousTransport));
    let item = Id::from_bytes(&[3]);
    engine.add_item(item).unwrap();
    engine.step(item).await.unwrap();
    assert!(engine.is_finalized(&item).unwrap());

    let err = engine.step(item).await.unwrap_err();
    assert!(matches!(
        err,
        lux_snow_core::EngineError::Round(lux_snow_core::RoundError::AlreadyDecided(_))
    ));
    assert_eq!(engine.preference(&item).unwrap(), Some(item));
}

// Scenario 5: A minority of peers dissent but never reach alpha_pref; the
// majority still carries the item to finalization.
#[tokio::test]
async fn scenario_minority_dissent_does_not_block_finalization() {
    let params = Parameters::new(5, 3, 4, 2, 1, 1, 8, Default::default(), Default::default()).unwrap();
    let sampler = sampler_with(5);
    let against = vec![NodeId::from_bytes(&[0]), NodeId::from_bytes(&[1])];
    let engine = Engine::new(params, sampler, Arc::new(PartisanTransport { against }));
    let item = Id::from_bytes(&[4]);
    engine.add_item(item).unwrap();

    for _ in 0..params.beta {
        engine.step(item).await.unwrap();
    }
    assert!(engine.is_finalized(&item).unwrap());
}

// Scenario 6: Backpressure — adding beyond max_outstanding_items is refused.
#[tokio::test]
async fn scenario_backpressure_rejects_excess_items() {
    let params = Parameters::new(3, 2, 3, 1, 1, 1, 2, Default::default(), Default::default()).unwrap();
    let engine = Engine::new(params, sampler_with(3), Arc::new(UnanimousTransport));
    engine.add_item(Id::from_bytes(&[1])).unwrap();
    engine.add_item(Id::from_bytes(&[2])).unwrap();
    let err = engine.add_item(Id::from_bytes(&[3])).unwrap_err();
    assert!(matches!(err, lux_snow_core::EngineError::TooManyOutstandingItems(2)));
}

// A health check over a well-connected sampler should meet the configured
// minimum, and outstanding counts should track add_item calls exactly.
#[tokio::test]
async fn health_check_and_outstanding_count_track_engine_state() {
    let params = Parameters::local();
    let engine = Engine::new(params, sampler_with(5), Arc::new(UnanimousTransport));
    assert_eq!(engine.outstanding_count(), 0);
    engine.add_item(Id::from_bytes(&[1])).unwrap();
    engine.add_item(Id::from_bytes(&[2])).unwrap();
    assert_eq!(engine.outstanding_count(), 2);

    let report = engine.health_check();
    assert!(report.meets_minimum);
    assert_eq!(report.connected_peers, 5);
}
