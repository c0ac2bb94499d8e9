//! # Parameters
//!
//! The immutable configuration tuple driving `ProtocolCore` and
//! `RoundDriver` (§3, §4.1). Grounded on the teacher's
//! `network/consensus::ConsensusConfig`: a plain `Serialize`/`Deserialize`
//! struct with a `Default` impl, except here construction goes through
//! [`Parameters::new`], which validates eagerly and totally — a `Parameters`
//! value either satisfies every inequality in §3 or is rejected, there is no
//! partially-valid state.

use serde::{Deserialize, Serialize};

use crate::errors::ParamsError;

/// FPC dynamic-threshold sub-configuration (§3).
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct FpcConfig {
    pub enabled: bool,
    /// Lower bound on the dynamic threshold, as a fraction of K.
    pub theta_min: f64,
    /// Upper bound on the dynamic threshold, as a fraction of K.
    pub theta_max: f64,
    pub vote_limit_per_block: usize,
}

impl Default for FpcConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            theta_min: 0.5,
            theta_max: 0.8,
            vote_limit_per_block: 256,
        }
    }
}

/// Dual-certificate overlay sub-configuration (§3, §4.7).
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct DualCertConfig {
    pub enabled: bool,
    /// Target security level in bits (informational; the overlay does not
    /// implement the primitives, it only records the intent).
    pub security_level_bits: u32,
    /// Worker-pool precompute buffer depth (§4.7).
    pub precompute_depth: usize,
}

impl Default for DualCertConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            security_level_bits: 128,
            precompute_depth: crate::config::DEFAULT_PRECOMPUTE_TARGET,
        }
    }
}

/// The immutable consensus parameter tuple (§3).
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Parameters {
    /// Sample size per round.
    pub k: u32,
    /// Preference threshold: K/2 < alpha_pref <= K.
    pub alpha_pref: u32,
    /// Confidence threshold: alpha_pref <= alpha_conf <= K.
    pub alpha_conf: u32,
    /// Consecutive successful rounds required for finalization.
    pub beta: u32,
    /// Maximum number of decisions advanced concurrently.
    pub concurrent_polls: u32,
    /// Target number of items processed per round under normal operation.
    pub optimal_processing: u32,
    /// Backpressure cap on outstanding (undecided) items.
    pub max_outstanding_items: u32,
    /// FPC sub-config.
    pub fpc: FpcConfig,
    /// Dual-cert sub-config.
    pub dual_cert: DualCertConfig,
}

impl Parameters {
    /// Constructs and validates a `Parameters` value. Validation is total:
    /// either every inequality in §3 holds, or `Err` is returned describing
    /// which one failed.
    pub fn new(
        k: u32,
        alpha_pref: u32,
        alpha_conf: u32,
        beta: u32,
        concurrent_polls: u32,
        optimal_processing: u32,
        max_outstanding_items: u32,
        fpc: FpcConfig,
        dual_cert: DualCertConfig,
    ) -> Result<Self, ParamsError> {
        if k < 1 {
            return Err(ParamsError::InvalidK(k));
        }
        if !(k / 2 < alpha_pref && alpha_pref <= k) {
            return Err(ParamsError::InvalidAlphaPref { k, alpha_pref });
        }
        if !(alpha_pref <= alpha_conf && alpha_conf <= k) {
            return Err(ParamsError::InvalidAlphaConf {
                alpha_pref,
                alpha_conf,
                k,
            });
        }
        if beta < 1 {
            return Err(ParamsError::InvalidBeta(beta));
        }
        if fpc.theta_min > fpc.theta_max
            || !(0.0..=1.0).contains(&fpc.theta_min)
            || !(0.0..=1.0).contains(&fpc.theta_max)
        {
            return Err(ParamsError::InvalidFpcThresholds {
                theta_min: fpc.theta_min,
                theta_max: fpc.theta_max,
            });
        }
        if concurrent_polls < 1 {
            return Err(ParamsError::InvalidConcurrentPolls(concurrent_polls));
        }

        Ok(Self {
            k,
            alpha_pref,
            alpha_conf,
            beta,
            concurrent_polls,
            optimal_processing,
            max_outstanding_items,
            fpc,
            dual_cert,
        })
    }

    /// `MinPercentConnectedHealthy` (§4.1): `alpha_conf/K * (1 - buffer) +
    /// buffer`, with `buffer` fixed at 0.2.
    pub fn min_percent_connected_healthy(&self) -> f64 {
        let ratio = self.alpha_conf as f64 / self.k as f64;
        ratio * (1.0 - crate::config::HEALTH_BUFFER) + crate::config::HEALTH_BUFFER
    }

    /// Mainnet preset: conservative thresholds, high confidence requirement.
    pub fn mainnet() -> Self {
        Self::new(21, 13, 18, 20, 4, 10, 4096, FpcConfig::default(), DualCertConfig::default())
            .expect("mainnet preset must validate")
    }

    /// Testnet preset: smaller committee, faster finalization for iteration.
    pub fn testnet() -> Self {
        Self::new(11, 7, 9, 8, 4, 10, 2048, FpcConfig::default(), DualCertConfig::default())
            .expect("testnet preset must validate")
    }

    /// Local/devnet preset: single-digit committee for a laptop-sized swarm.
    pub fn local() -> Self {
        Self::new(5, 3, 4, 4, 2, 4, 256, FpcConfig::default(), DualCertConfig::default())
            .expect("local preset must validate")
    }

    /// Test preset: the minimal valid configuration (K=alpha_pref=alpha_conf=beta=1),
    /// used by the boundary-behavior tests of §8.
    pub fn test() -> Self {
        Self::new(1, 1, 1, 1, 1, 1, 16, FpcConfig::default(), DualCertConfig::default())
            .expect("test preset must validate")
    }
}

impl Default for Parameters {
    fn default() -> Self {
        Self::local()
    }
}
