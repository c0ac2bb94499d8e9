//! Interactive walkthrough of the consensus engine lifecycle.
//!
//! Stands up an in-process committee, drives a handful of decisions to
//! finalization through the full sample/request/collect/tally loop, then
//! exercises the FPC fast path and the dual-cert overlay on a finalized
//! item. The output uses ANSI escape codes for colored terminal rendering.
//!
//! Run with:
//!   cargo run --bin demo --release

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Instant;

use async_trait::async_trait;
use tokio::sync::mpsc;

use lux_snow_core::consensus::{DualCertConfig, FpcConfig, Parameters, Sampler};
use lux_snow_core::dualcert::DualCertOverlay;
use lux_snow_core::engine::Engine;
use lux_snow_core::fpc::FpcEngine;
use lux_snow_core::id::{BlockId, Id, NodeId, ObjectId, TxRef};
use lux_snow_core::interfaces::{Classifier, Committee, DagTap, PqBundle, PqEngine, Transport, VoteMsg};

const RESET: &str = "\x1b[0m";
const BOLD: &str = "\x1b[1m";
const DIM: &str = "\x1b[2m";
const GREEN: &str = "\x1b[32m";
const YELLOW: &str = "\x1b[33m";
const CYAN: &str = "\x1b[36m";
const WHITE: &str = "\x1b[37m";
const BG_BLUE: &str = "\x1b[44m";

fn banner() {
    println!();
    println!("{BG_BLUE}{BOLD}{WHITE}                                                          {RESET}");
    println!("{BG_BLUE}{BOLD}{WHITE}    lux-snow-core  --  Interactive Lifecycle Demo         {RESET}");
    println!("{BG_BLUE}{BOLD}{WHITE}    Metastable sampling consensus over an in-process net  {RESET}");
    println!("{BG_BLUE}{BOLD}{WHITE}                                                          {RESET}");
    println!();
}

fn step_header(title: &str) {
    println!("{CYAN}{BOLD}==> {title}{RESET}");
}

/// An in-process transport: every registered peer votes in favor of
/// whatever it's asked about, with a small simulated latency.
struct LoopbackTransport;

#[async_trait]
impl Transport for LoopbackTransport {
    async fn request_votes(&self, peers: &[NodeId], item: Id) -> mpsc::Receiver<VoteMsg> {
        let (tx, rx) = mpsc::channel(peers.len().max(1));
        for peer in peers {
            let tx = tx.clone();
            let peer = *peer;
            tokio::spawn(async move {
                tokio::time::sleep(std::time::Duration::from_millis(2)).await;
                let _ = tx
                    .send(VoteMsg {
                        item,
                        prefer: true,
                        sender: peer,
                        timestamp_ms: 0,
                    })
                    .await;
            });
        }
        rx
    }
}

struct DemoCommittee {
    index: HashMap<NodeId, usize>,
}

impl Committee for DemoCommittee {
    fn size(&self) -> usize {
        self.index.len()
    }
    fn index_of(&self, author: &NodeId) -> Option<usize> {
        self.index.get(author).copied()
    }
}

/// Every tx "owns" exactly one object, derived from the tx id itself — good
/// enough for a demo where we mint distinct object ids per tx.
struct DemoClassifier;

impl Classifier for DemoClassifier {
    fn owned_inputs(&self, tx: &TxRef) -> Vec<ObjectId> {
        vec![ObjectId::derive(tx.as_bytes())]
    }
    fn conflicts(&self, a: &TxRef, b: &TxRef) -> bool {
        a != b
    }
}

struct AlwaysAncestor;

impl DagTap for AlwaysAncestor {
    fn in_ancestry(&self, _block: &BlockId, _tx: &TxRef) -> bool {
        true
    }
}

struct InstantPqEngine;

impl PqEngine for InstantPqEngine {
    fn submit(&self, _tx: &TxRef, _voters: &[NodeId]) {}
    fn has_pq(&self, _tx: &TxRef) -> bool {
        true
    }
    fn get_pq(&self, _tx: &TxRef) -> Option<PqBundle> {
        Some(PqBundle {
            bls_aggregate: vec![0xAB; 48],
            lattice_threshold: vec![0xCD; 64],
        })
    }
}

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt().with_env_filter("info").init();

    banner();

    step_header("Standing up a 7-node committee");
    let params = Parameters::testnet();
    let sampler = Arc::new(Sampler::new());
    let mut index = HashMap::new();
    let mut peers = Vec::new();
    for i in 0..7u8 {
        let node = NodeId::from_bytes(&[i]);
        sampler.register(node, 100 - i as u64 * 5, 10 + i as u64);
        index.insert(node, i as usize);
        peers.push(node);
    }
    println!("{DIM}  registered {} peers, K={}, alpha_pref={}, alpha_conf={}, beta={}{RESET}",
        peers.len(), params.k, params.alpha_pref, params.alpha_conf, params.beta);

    let fpc = Arc::new(FpcEngine::new(
        FpcConfig { enabled: true, ..FpcConfig::default() },
        Box::new(DemoCommittee { index }),
        Box::new(DemoClassifier),
        Box::new(AlwaysAncestor),
    ));
    let dualcert = Arc::new(DualCertOverlay::new(
        DualCertConfig { enabled: true, ..DualCertConfig::default() },
        Arc::new(InstantPqEngine),
    ));
    let _precompute_handle = dualcert.spawn_precompute_worker();

    let engine = Engine::new(params, sampler, Arc::new(LoopbackTransport))
        .with_fpc(fpc.clone())
        .with_dualcert(dualcert.clone());

    step_header("Driving three decisions to finalization");
    let items: Vec<Id> = (0..3u8).map(|n| Id::derive(&[n])).collect();
    for item in &items {
        engine.add_item(*item).expect("room under max_outstanding_items");
    }

    let start = Instant::now();
    let mut round = 0;
    while items.iter().any(|item| !engine.is_finalized(item).unwrap()) {
        tokio::time::sleep(std::time::Duration::from_millis(10)).await;
        for (item, result) in engine.step_eligible().await {
            match result {
                Ok(()) => println!(
                    "{GREEN}  round {round}: item {item} preference={:?} finalized={}{RESET}",
                    engine.preference(&item).unwrap(),
                    engine.is_finalized(&item).unwrap()
                ),
                Err(e) => println!("{YELLOW}  round {round}: item {item} round hiccup: {e}{RESET}"),
            }
        }
        round += 1;
    }
    println!("{DIM}  converged after {round} Step(ctx) calls, took {:?}{RESET}", start.elapsed());

    step_header("Fast-path certification for an owned transaction");
    let tx = TxRef::derive(b"demo-tx-1");
    let block = BlockId::derive(b"demo-block-1");
    let votes: Vec<(NodeId, TxRef)> = (0..5u8).map(|i| (NodeId::from_bytes(&[i]), tx)).collect();
    fpc.on_block_observed(block, &votes).expect("epoch open");
    println!("  tx status after 5/7 votes: {:?}", fpc.status(&tx));
    fpc.on_block_accepted(block, NodeId::from_bytes(&[0]), true);
    println!("  tx status after block acceptance: {:?}", fpc.status(&tx));
    println!("  epoch close ready: {}", fpc.epoch_close_ready());

    step_header("Dual-certificate overlay");
    let finalized_item = items[0];
    dualcert.track(finalized_item, dualcert.current_epoch());
    let voters: Vec<NodeId> = (0..7u8).map(|i| NodeId::from_bytes(&[i])).collect();
    match dualcert.generate_certificate(finalized_item, &voters).await {
        Ok(true) => println!("{GREEN}  certificate generated for {finalized_item}{RESET}"),
        Ok(false) => println!("{YELLOW}  certificate not ready yet, retry next round{RESET}"),
        Err(e) => println!("{YELLOW}  certificate generation failed: {e}{RESET}"),
    }

    dualcert.shutdown();
    println!();
    println!("{BOLD}Demo complete.{RESET}");
}
