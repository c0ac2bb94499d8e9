//! # Error Taxonomy
//!
//! One `thiserror`-derived enum per subsystem, unified under
//! [`ConsensusError`] via `#[from]` conversions — the same shape as the
//! teacher's `ConsensusLoopError`, which wraps `BlockProductionError`,
//! `ConsensusError`, and `DbError` rather than flattening everything into a
//! single enum. Conditions the core recovers from locally (SampleUnavailable,
//! RoundTimeout with a non-empty tally, Equivocation, PrecomputeEmpty) are
//! represented here for observability but are not necessarily propagated to
//! the caller — see §7 of SPEC_FULL.md for the propagation policy.

use thiserror::Error;

use crate::id::Id;

/// Errors from [`crate::consensus::params::Parameters`] construction.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ParamsError {
    #[error("invalid K: must be >= 1, got {0}")]
    InvalidK(u32),
    #[error("invalid alpha_pref: must satisfy K/2 < alpha_pref <= K (K={k}, alpha_pref={alpha_pref})")]
    InvalidAlphaPref { k: u32, alpha_pref: u32 },
    #[error("invalid alpha_conf: must satisfy alpha_pref <= alpha_conf <= K (alpha_pref={alpha_pref}, alpha_conf={alpha_conf}, k={k})")]
    InvalidAlphaConf { alpha_pref: u32, alpha_conf: u32, k: u32 },
    #[error("invalid beta: must be >= 1, got {0}")]
    InvalidBeta(u32),
    #[error("invalid fpc threshold bounds: theta_min ({theta_min}) must be <= theta_max ({theta_max}), both in [0,1]")]
    InvalidFpcThresholds { theta_min: f64, theta_max: f64 },
    #[error("invalid concurrent_polls: must be >= 1, got {0}")]
    InvalidConcurrentPolls(u32),
}

/// Errors surfaced by [`crate::consensus::protocol_core::ProtocolCore`].
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum CoreError {
    /// Add on a finalized core; current state unchanged (§7).
    #[error("choice {0} cannot be added: core is already finalized")]
    AlreadyFinalized(Id),
}

/// Errors from a single consensus round (§4.5).
#[derive(Debug, Error)]
pub enum RoundError {
    /// Sampler returned fewer peers than requested `k >= 1`; the round is a
    /// no-op and is treated as an unsuccessful poll.
    #[error("sampler returned no peers for k={requested} >= 1")]
    SampleUnavailable { requested: usize },
    /// The round timed out with zero votes collected; treated as an
    /// unsuccessful poll, not a hard failure.
    #[error("round timed out with no votes collected for item {0}")]
    TimeoutEmpty(Id),
    /// The item's underlying core has already finalized; the round is a
    /// no-op (step 1 of §4.5).
    #[error("item {0} is already decided")]
    AlreadyDecided(Id),
}

/// Errors from the FPC subsystem (§4.6).
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum FpcError {
    #[error("unknown validator author, cannot map to committee index")]
    UnknownAuthor,
}

/// Errors from the dual-certificate overlay (§4.7).
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum DualCertError {
    /// The underlying core has not finalized the item yet.
    #[error("item {0} is not yet finalized by the underlying core")]
    NotFinalized(Id),
    /// The precompute pool was empty and the online fallback also failed to
    /// gather enough shares. Logged as a warning at the call site (§7).
    #[error("precompute pool empty for item {0}, and online signing fallback failed")]
    PrecomputeAndOnlineFailed(Id),
    /// The certificate's epoch no longer matches the current epoch.
    #[error("certificate for item {item} is bound to stale epoch {epoch}")]
    StaleEpoch { item: Id, epoch: u64 },
}

/// Top-level engine errors (§4.8).
#[derive(Debug, Error)]
pub enum EngineError {
    #[error(transparent)]
    Params(#[from] ParamsError),
    #[error(transparent)]
    Core(#[from] CoreError),
    #[error(transparent)]
    Round(#[from] RoundError),
    #[error(transparent)]
    Fpc(#[from] FpcError),
    #[error(transparent)]
    DualCert(#[from] DualCertError),
    #[error("unknown decision id {0}")]
    UnknownDecision(Id),
    #[error("engine has reached max_outstanding_items ({0})")]
    TooManyOutstandingItems(usize),
}

/// Crate-level umbrella error. Most call sites use the narrower per-subsystem
/// error type directly; this exists for callers that want a single type to
/// bubble up through `?` across subsystem boundaries (e.g. a binary built on
/// top of this crate).
pub type ConsensusError = EngineError;
