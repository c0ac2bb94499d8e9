//! # Protocol Configuration & Constants
//!
//! Every tunable default lives here, in the spirit of the teacher's
//! `config.rs`: a flat module of `const`s plus the named presets that the
//! rest of the crate builds `Parameters` from (§4.1). Loading these from a
//! file or environment is an embedding binary's job — CLI and config loading
//! are explicitly out of scope per SPEC_FULL.md §1/§4.11.

use std::time::Duration;

/// Default round timeout (`RoundTO`, §4.5) if not overridden.
pub const DEFAULT_ROUND_TIMEOUT: Duration = Duration::from_millis(2_000);

/// Minimum interval between rounds for the same decision (backpressure knob
/// from §3, `min_round_interval`).
pub const DEFAULT_MIN_ROUND_INTERVAL: Duration = Duration::from_millis(10);

/// Default bound on how long an item may take to process before
/// `HealthCheck` reports it unhealthy (§3 `max_item_processing_time`, §4.8).
pub const DEFAULT_MAX_ITEM_PROCESSING_TIME: Duration = Duration::from_secs(30);

/// Health-check buffer used by `MinPercentConnectedHealthy` (§4.1): fixed at
/// 0.2 per spec.
pub const HEALTH_BUFFER: f64 = 0.2;

/// Default target quantity of precomputed lattice shares the dual-cert
/// overlay's worker pool keeps buffered (§4.7).
pub const DEFAULT_PRECOMPUTE_TARGET: usize = 50;

/// Minimum precompute buffer before the overlay should be considered
/// under-provisioned (§4.7).
pub const DEFAULT_PRECOMPUTE_MIN: usize = 20;

/// Default domain-separation prefix for dual-cert binding messages
/// (prefix ∥ epoch ∥ item_id, §4.7).
pub const DUALCERT_DOMAIN_PREFIX: &[u8] = b"lux-snow-core/dualcert/v1";
