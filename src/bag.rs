//! # Bag
//!
//! A multiset of votes keyed by choice id (§3, §4.2). Backed by an
//! insertion-ordered map so that [`Bag::mode`] can break ties by
//! first-insertion order, matching the tie-break rule used throughout
//! `ProtocolCore` (§4.4 I4).

use std::collections::HashMap;

/// A multiset mapping `T` to a positive integer count.
///
/// All operations are O(#distinct keys) or O(1) amortized, per §4.2.
/// Adding with count <= 0 is a no-op.
#[derive(Debug, Clone)]
pub struct Bag<T> {
    counts: HashMap<T, u64>,
    // Tracks first-insertion order for deterministic tie-breaking in `mode`.
    order: Vec<T>,
}

impl<T> Default for Bag<T>
where
    T: Eq + std::hash::Hash + Clone,
{
    fn default() -> Self {
        Self::new()
    }
}

impl<T> Bag<T>
where
    T: Eq + std::hash::Hash + Clone,
{
    pub fn new() -> Self {
        Bag {
            counts: HashMap::new(),
            order: Vec::new(),
        }
    }

    /// Builds a bag from an iterator of elements, each contributing count 1.
    pub fn of(items: impl IntoIterator<Item = T>) -> Self {
        let mut bag = Self::new();
        for item in items {
            bag.add(item);
        }
        bag
    }

    /// Adds one occurrence of `e`.
    pub fn add(&mut self, e: T) {
        self.add_count(e, 1);
    }

    /// Adds `count` occurrences of `e`. A no-op if `count <= 0`.
    pub fn add_count(&mut self, e: T, count: i64) {
        if count <= 0 {
            return;
        }
        if !self.counts.contains_key(&e) {
            self.order.push(e.clone());
        }
        *self.counts.entry(e).or_insert(0) += count as u64;
    }

    /// Returns the count for `e`, 0 if absent.
    pub fn count(&self, e: &T) -> u64 {
        self.counts.get(e).copied().unwrap_or(0)
    }

    /// Total count across all distinct keys (sum of counts).
    pub fn len(&self) -> u64 {
        self.counts.values().sum()
    }

    pub fn is_empty(&self) -> bool {
        self.counts.is_empty()
    }

    /// The element with the highest count. Ties are broken by first-insertion
    /// order. Returns `None` if the bag is empty.
    pub fn mode(&self) -> Option<(T, u64)> {
        let mut best: Option<(&T, u64)> = None;
        for key in &self.order {
            let count = self.counts[key];
            match best {
                Some((_, best_count)) if count <= best_count => {}
                _ => best = Some((key, count)),
            }
        }
        best.map(|(k, c)| (k.clone(), c))
    }

    /// All distinct keys, in first-insertion order.
    pub fn list(&self) -> Vec<T> {
        self.order.clone()
    }

    /// Keys with count >= `t`.
    pub fn threshold(&self, t: u64) -> Vec<T> {
        self.order
            .iter()
            .filter(|k| self.counts[*k] >= t)
            .cloned()
            .collect()
    }

    /// Keeps only keys matching `pred`, dropping the rest.
    pub fn filter(&mut self, pred: impl Fn(&T) -> bool) {
        self.order.retain(|k| pred(k));
        self.counts.retain(|k, _| pred(k));
    }

    /// Splits into (keys failing `pred`, keys passing `pred`), each as its
    /// own bag with counts preserved.
    pub fn split(&self, pred: impl Fn(&T) -> bool) -> (Bag<T>, Bag<T>) {
        let mut no = Bag::new();
        let mut yes = Bag::new();
        for key in &self.order {
            let count = self.counts[key];
            if pred(key) {
                yes.add_count(key.clone(), count as i64);
            } else {
                no.add_count(key.clone(), count as i64);
            }
        }
        (no, yes)
    }

    pub fn equals(&self, other: &Bag<T>) -> bool {
        self.counts == other.counts
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn add_and_count() {
        let mut bag = Bag::new();
        bag.add("a");
        bag.add("a");
        bag.add("b");
        assert_eq!(bag.count(&"a"), 2);
        assert_eq!(bag.count(&"b"), 1);
        assert_eq!(bag.count(&"c"), 0);
        assert_eq!(bag.len(), 3);
    }

    #[test]
    fn add_count_nonpositive_is_noop() {
        let mut bag: Bag<&str> = Bag::new();
        bag.add_count("a", 0);
        bag.add_count("a", -5);
        assert_eq!(bag.count(&"a"), 0);
        assert!(bag.is_empty());
    }

    #[test]
    fn mode_breaks_ties_by_insertion_order() {
        let mut bag = Bag::new();
        bag.add("b");
        bag.add("a");
        // both have count 1; "b" was inserted first.
        assert_eq!(bag.mode(), Some(("b", 1)));
    }

    #[test]
    fn mode_picks_strict_max() {
        let mut bag = Bag::new();
        bag.add("a");
        bag.add("b");
        bag.add("b");
        assert_eq!(bag.mode(), Some(("b", 2)));
    }

    #[test]
    fn mode_of_empty_bag_is_none() {
        let bag: Bag<&str> = Bag::new();
        assert_eq!(bag.mode(), None);
    }

    #[test]
    fn threshold_filters_by_count() {
        let mut bag = Bag::new();
        bag.add_count("a", 3);
        bag.add_count("b", 1);
        let mut at_least_2 = bag.threshold(2);
        at_least_2.sort();
        assert_eq!(at_least_2, vec!["a"]);
    }

    #[test]
    fn split_partitions_counts() {
        let mut bag = Bag::new();
        bag.add_count(1, 2);
        bag.add_count(2, 3);
        bag.add_count(3, 1);
        let (odds, evens) = bag.split(|n| n % 2 == 0);
        assert_eq!(odds.count(&1), 2);
        assert_eq!(odds.count(&3), 1);
        assert_eq!(evens.count(&2), 3);
    }

    #[test]
    fn bag_round_trip_of_list() {
        // P7: Bag.Of(L).List() as a multiset equals L as a multiset.
        let list = vec!["x", "y", "x", "z", "x"];
        let bag = Bag::of(list.clone());
        let mut round_tripped: Vec<_> = bag
            .list()
            .into_iter()
            .flat_map(|k| std::iter::repeat(k).take(bag.count(&k) as usize))
            .collect();
        let mut expected = list;
        round_tripped.sort();
        expected.sort();
        assert_eq!(round_tripped, expected);
    }

    #[test]
    fn clone_is_independent() {
        let mut bag = Bag::new();
        bag.add("a");
        let mut cloned = bag.clone();
        cloned.add("a");
        assert_eq!(bag.count(&"a"), 1);
        assert_eq!(cloned.count(&"a"), 2);
    }
}
