//! # ProtocolCore
//!
//! The preference + confidence state machine at the heart of the protocol
//! (§4.4). Grounded on the teacher's `ConsensusEngine`
//! (`network/consensus.rs`): a struct owning round/phase state, advanced by
//! explicit methods that log at `debug`/`info` via `tracing` and return
//! `Result<_, CoreError>` rather than panicking on caller misuse.
//!
//! Per SPEC_FULL.md §9 ("Dynamic choice list with reset semantics"), unary,
//! binary, and n-ary behavior are unified into one generic core
//! parameterized by a [`StrengthPolicy`], rather than three separate types.

use std::collections::HashMap;

use tracing::{debug, info};

use crate::bag::Bag;
use crate::consensus::params::Parameters;
use crate::errors::CoreError;
use crate::id::Id;

/// Governs how `preference_strength` is updated on a qualifying vote,
/// unifying the unary/binary/n-ary variants described in §4.4 and §9.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StrengthPolicy {
    /// A single choice; every qualifying vote boosts it. No resets apply
    /// since there is nothing else to reset.
    UnaryBoost,
    /// Two (or more) choices compete on raw strength; a qualifying vote for
    /// `c` increments `c`'s strength without touching the others —
    /// classical snowball.
    BinaryBoost,
    /// A qualifying vote for `c` increments `c`'s strength and resets every
    /// other choice's strength to zero — the literal §4.4 `recordPoll`
    /// algorithm.
    NaryResetOthers,
}

/// The per-decision voting state machine (§3 `ProtocolCoreState`, §4.4).
#[derive(Debug, Clone)]
pub struct ProtocolCore {
    params: Parameters,
    policy: StrengthPolicy,
    choices: Vec<Id>,
    preference: Option<Id>,
    inner_preference: Option<Id>,
    preference_strength: HashMap<Id, u64>,
    confidence: u32,
    finalized: bool,
    num_polls: u64,
}

impl ProtocolCore {
    /// Constructs a core using the literal n-ary reset-others algorithm of
    /// §4.4 — the single implementation that subsumes unary and binary use.
    pub fn new(params: Parameters) -> Self {
        Self::with_policy(params, StrengthPolicy::NaryResetOthers)
    }

    /// Constructs a core with an explicit strength-update policy (§9).
    pub fn with_policy(params: Parameters, policy: StrengthPolicy) -> Self {
        ProtocolCore {
            params,
            policy,
            choices: Vec::new(),
            preference: None,
            inner_preference: None,
            preference_strength: HashMap::new(),
            confidence: 0,
            finalized: false,
            num_polls: 0,
        }
    }

    pub fn params(&self) -> &Parameters {
        &self.params
    }

    /// Appends `c` to the choice list if new; the first call sets
    /// `preference`. Idempotent on duplicates. Fails if already finalized.
    pub fn add(&mut self, c: Id) -> Result<(), CoreError> {
        if self.finalized {
            return Err(CoreError::AlreadyFinalized(c));
        }
        if self.choices.contains(&c) {
            return Ok(());
        }
        self.choices.push(c);
        self.preference_strength.entry(c).or_insert(0);
        if self.preference.is_none() {
            self.preference = Some(c);
            self.inner_preference = Some(c);
        }
        debug!(choice = %c, "choice added");
        Ok(())
    }

    /// The currently preferred choice. Coincides with `inner_preference`
    /// once finalized.
    pub fn preference(&self) -> Option<Id> {
        self.preference
    }

    pub fn finalized(&self) -> bool {
        self.finalized
    }

    pub fn num_polls(&self) -> u64 {
        self.num_polls
    }

    /// Read-only view of a choice's accumulated preference strength (I2, I4).
    pub fn preference_strength(&self, c: &Id) -> u64 {
        self.preference_strength.get(c).copied().unwrap_or(0)
    }

    /// Single-round update (§4.4 `RecordVotes`).
    pub fn record_votes(&mut self, bag: &Bag<Id>) {
        if self.finalized {
            return;
        }
        self.num_polls += 1;

        // Find the choice in `choices` with the most votes in `bag`; ties
        // broken by earliest-added (I4). Unknown choices in the bag are
        // ignored entirely — they cannot become c* since we only scan
        // `self.choices`.
        let mut best: Option<(Id, u64)> = None;
        for c in &self.choices {
            let count = bag.count(c);
            match best {
                Some((_, best_count)) if count <= best_count => {}
                _ => best = Some((*c, count)),
            }
        }

        match best {
            Some((c, count)) => self.record_poll(count, c),
            None => self.record_unsuccessful_poll(),
        }
    }

    /// Core logic of §4.4 `recordPoll`.
    fn record_poll(&mut self, count: u64, c: Id) {
        if self.finalized {
            return;
        }

        if count as u32 >= self.params.alpha_pref {
            self.bump_strength(c);
            self.preference = self.argmax_strength();
        }

        let inner = self.inner_preference;
        if count as u32 >= self.params.alpha_pref && inner == Some(c) {
            if count as u32 >= self.params.alpha_conf {
                self.confidence += 1;
                if self.confidence >= self.params.beta {
                    self.finalize();
                }
            } else {
                self.confidence = 0;
            }
        } else if count as u32 >= self.params.alpha_pref && inner != Some(c) {
            self.inner_preference = Some(c);
            self.confidence = 1;
            if 1 >= self.params.beta {
                self.finalize();
            }
        } else {
            self.confidence = 0;
        }
    }

    fn bump_strength(&mut self, c: Id) {
        *self.preference_strength.entry(c).or_insert(0) += 1;
        if matches!(self.policy, StrengthPolicy::NaryResetOthers) {
            for (choice, strength) in self.preference_strength.iter_mut() {
                if *choice != c {
                    *strength = 0;
                }
            }
        }
    }

    /// The choice with the greatest `preference_strength`, ties broken by
    /// insertion order (I4).
    fn argmax_strength(&self) -> Option<Id> {
        let mut best: Option<(Id, u64)> = None;
        for c in &self.choices {
            let strength = self.preference_strength(c);
            match best {
                Some((_, best_strength)) if strength <= best_strength => {}
                _ => best = Some((*c, strength)),
            }
        }
        best.map(|(c, _)| c)
    }

    fn finalize(&mut self) {
        self.finalized = true;
        self.preference = self.inner_preference;
        info!(
            preference = ?self.preference,
            polls = self.num_polls,
            "core finalized"
        );
    }

    /// Unconditionally resets confidence to zero (§4.4). No-op if finalized.
    pub fn record_unsuccessful_poll(&mut self) {
        if self.finalized {
            return;
        }
        self.confidence = 0;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::consensus::params::Parameters;

    fn id(n: u8) -> Id {
        Id::from_bytes(&[n])
    }

    #[test]
    fn add_sets_preference_on_first_choice() {
        let mut core = ProtocolCore::new(Parameters::test());
        core.add(id(1)).unwrap();
        assert_eq!(core.preference(), Some(id(1)));
    }

    #[test]
    fn add_is_idempotent() {
        let mut core = ProtocolCore::new(Parameters::test());
        core.add(id(1)).unwrap();
        core.add(id(1)).unwrap();
        assert_eq!(core.preference(), Some(id(1)));
    }

    #[test]
    fn add_after_finalize_fails() {
        let params = Parameters::new(3, 2, 3, 1, 1, 1, 1, Default::default(), Default::default()).unwrap();
        let mut core = ProtocolCore::new(params);
        core.add(id(1)).unwrap();
        core.record_votes(&Bag::of(vec![id(1), id(1), id(1)]));
        assert!(core.finalized());
        let err = core.add(id(2));
        assert_eq!(err, Err(CoreError::AlreadyFinalized(id(2))));
    }

    // Scenario 1, §8: Unanimous binary.
    #[test]
    fn scenario_unanimous_binary() {
        let params = Parameters::new(5, 3, 4, 2, 1, 1, 1, Default::default(), Default::default()).unwrap();
        let mut core = ProtocolCore::new(params);
        core.add(id(b'A')).unwrap();
        core.add(id(b'B')).unwrap();

        let bag_a4 = Bag::of(vec![id(b'A'); 4]);
        core.record_votes(&bag_a4);
        assert_eq!(core.preference(), Some(id(b'A')));
        assert!(!core.finalized());

        core.record_votes(&bag_a4);
        assert_eq!(core.preference(), Some(id(b'A')));
        assert!(core.finalized());
        assert_eq!(core.num_polls(), 2);
    }

    // Scenario 2, §8: Preference switch.
    #[test]
    fn scenario_preference_switch() {
        let params = Parameters::new(5, 3, 4, 3, 1, 1, 1, Default::default(), Default::default()).unwrap();
        let mut core = ProtocolCore::new(params);
        core.add(id(b'A')).unwrap();
        core.add(id(b'B')).unwrap();

        core.record_votes(&Bag::of(vec![id(b'B'); 3]));
        assert_eq!(core.preference(), Some(id(b'B')));
        assert!(!core.finalized());

        core.record_votes(&Bag::of(vec![id(b'B'); 4]));
        assert!(!core.finalized());

        core.record_votes(&Bag::of(vec![id(b'B'); 4]));
        assert!(core.finalized());
    }

    // Scenario 3, §8: Unsuccessful poll resets.
    #[test]
    fn scenario_unsuccessful_poll_resets() {
        let params = Parameters::new(5, 3, 4, 2, 1, 1, 1, Default::default(), Default::default()).unwrap();
        let mut core = ProtocolCore::new(params);
        core.add(id(b'A')).unwrap();

        core.record_votes(&Bag::of(vec![id(b'A'); 4]));
        core.record_unsuccessful_poll();
        core.record_votes(&Bag::of(vec![id(b'A'); 4]));
        assert!(!core.finalized());
        core.record_votes(&Bag::of(vec![id(b'A'); 4]));
        assert!(core.finalized());
    }

    // Scenario 4, §8: Finalized locks.
    #[test]
    fn scenario_finalized_locks() {
        let params = Parameters::new(3, 2, 3, 1, 1, 1, 1, Default::default(), Default::default()).unwrap();
        let mut core = ProtocolCore::new(params);
        core.add(id(b'A')).unwrap();
        core.record_votes(&Bag::of(vec![id(b'A'); 3]));
        assert!(core.finalized());
        assert_eq!(core.preference(), Some(id(b'A')));

        // B was never added; votes for it are ignored entirely.
        core.record_votes(&Bag::of(vec![id(b'B'); 3]));
        assert_eq!(core.preference(), Some(id(b'A')));
        assert!(core.finalized());
    }

    #[test]
    fn empty_bag_is_unsuccessful_poll() {
        let params = Parameters::new(5, 3, 4, 2, 1, 1, 1, Default::default(), Default::default()).unwrap();
        let mut core = ProtocolCore::new(params);
        core.add(id(b'A')).unwrap();
        core.record_votes(&Bag::of(vec![id(b'A'); 4]));
        // Drive confidence up without finalizing (beta=2, so 1 round isn't enough).
        core.record_votes(&Bag::new());
        assert!(!core.finalized());
    }

    #[test]
    fn unknown_choice_in_bag_is_ignored() {
        let params = Parameters::test();
        let mut core = ProtocolCore::new(params);
        core.add(id(1)).unwrap();
        let bag = Bag::of(vec![id(99); 5]);
        core.record_votes(&bag);
        assert!(!core.finalized());
        assert_eq!(core.num_polls(), 1);
    }

    #[test]
    fn minimal_config_finalizes_on_first_qualifying_vote() {
        let mut core = ProtocolCore::new(Parameters::test());
        core.add(id(1)).unwrap();
        core.record_votes(&Bag::of(vec![id(1)]));
        assert!(core.finalized());
        assert_eq!(core.preference(), Some(id(1)));
    }

    #[test]
    fn num_polls_is_monotonic_and_matches_call_count() {
        let mut core = ProtocolCore::new(Parameters::local());
        core.add(id(1)).unwrap();
        for i in 0..5 {
            core.record_votes(&Bag::new());
            assert_eq!(core.num_polls(), i + 1);
        }
    }

    #[test]
    fn preference_strength_never_exceeds_num_polls() {
        let params = Parameters::new(5, 3, 4, 10, 1, 1, 1, Default::default(), Default::default()).unwrap();
        let mut core = ProtocolCore::new(params);
        core.add(id(b'A')).unwrap();
        for _ in 0..4 {
            core.record_votes(&Bag::of(vec![id(b'A'); 4]));
            assert!(core.preference_strength(&id(b'A')) <= core.num_polls());
        }
    }

    #[test]
    fn tie_at_max_is_broken_by_insertion_order() {
        let params = Parameters::new(4, 3, 3, 1, 1, 1, 1, Default::default(), Default::default()).unwrap();
        let mut core = ProtocolCore::new(params);
        core.add(id(b'A')).unwrap();
        core.add(id(b'B')).unwrap();
        let mut bag = Bag::new();
        bag.add_count(id(b'A'), 2);
        bag.add_count(id(b'B'), 2);
        core.record_votes(&bag);
        // Neither reaches alpha_pref (3), so this is an unsuccessful poll —
        // preference stays at the initial choice (A, added first).
        assert_eq!(core.preference(), Some(id(b'A')));
    }

    #[test]
    fn binary_boost_policy_does_not_reset_loser() {
        let params = Parameters::new(5, 3, 10, 10, 1, 1, 1, Default::default(), Default::default()).unwrap();
        let mut core = ProtocolCore::with_policy(params, StrengthPolicy::BinaryBoost);
        core.add(id(b'A')).unwrap();
        core.add(id(b'B')).unwrap();
        core.record_votes(&Bag::of(vec![id(b'A'); 4]));
        assert_eq!(core.preference_strength(&id(b'A')), 1);
        core.record_votes(&Bag::of(vec![id(b'B'); 4]));
        // Under BinaryBoost, A's strength survives B's qualifying vote.
        assert_eq!(core.preference_strength(&id(b'A')), 1);
        assert_eq!(core.preference_strength(&id(b'B')), 1);
    }

    #[test]
    fn nary_reset_others_zeroes_losers() {
        let params = Parameters::new(5, 3, 10, 10, 1, 1, 1, Default::default(), Default::default()).unwrap();
        let mut core = ProtocolCore::new(params);
        core.add(id(b'A')).unwrap();
        core.add(id(b'B')).unwrap();
        core.record_votes(&Bag::of(vec![id(b'A'); 4]));
        assert_eq!(core.preference_strength(&id(b'A')), 1);
        core.record_votes(&Bag::of(vec![id(b'B'); 4]));
        assert_eq!(core.preference_strength(&id(b'A')), 0);
        assert_eq!(core.preference_strength(&id(b'B')), 1);
    }
}
