//! Core sampling-consensus subsystem: parameters, the per-decision state
//! machine, peer sampling, vote collection, and the round lifecycle that
//! composes them (§3-§5).

pub mod collector;
pub mod params;
pub mod protocol_core;
pub mod round;
pub mod sampler;

pub use collector::CollectedVotes;
pub use params::{DualCertConfig, FpcConfig, Parameters};
pub use protocol_core::{ProtocolCore, StrengthPolicy};
pub use round::run_round;
pub use sampler::{ProbeOutcome, Sampler};
