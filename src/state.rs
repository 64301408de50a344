//! Cross-pass Apriori state.
//!
//! The driver holds the only mutable binding of a [`PassState`]; stages only
//! read it. Every transition returns a new value.

use crate::itemset::Itemset;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// What the working list currently holds.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum ListPhase {
    /// Frequent itemsets that survived the last completed pass.
    Frequent,
    /// Candidates for the pass that is about to run.
    Candidates,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PassState {
    /// 1-based pass counter.
    pub current_pass: u32,
    pub max_pass: u32,
    pub min_support_count: u64,
    pub working_list: Vec<Itemset>,
    pub list_phase: ListPhase,
    /// Every frequent itemset found so far with its support count.
    pub frequent: BTreeMap<Itemset, u64>,
}

impl PassState {
    /// State before the first pass.
    #[must_use]
    pub fn new(max_pass: u32, min_support_count: u64) -> Self {
        Self {
            current_pass: 1,
            max_pass,
            min_support_count,
            working_list: Vec::new(),
            list_phase: ListPhase::Frequent,
            frequent: BTreeMap::new(),
        }
    }

    /// Stop once past `max_pass`, or after pass 1 when at most one frequent
    /// itemset is left to join.
    #[must_use]
    pub fn has_converged(&self) -> bool {
        self.current_pass > self.max_pass
            || (self.current_pass > 1 && self.working_list.len() <= 1)
    }

    /// Size of the itemsets counted by the current pass.
    #[must_use]
    pub fn itemset_size(&self) -> usize {
        self.current_pass as usize
    }

    /// Install the candidates for the current pass.
    #[must_use]
    pub fn with_candidates(&self, candidates: Vec<Itemset>) -> Self {
        Self {
            working_list: candidates,
            list_phase: ListPhase::Candidates,
            ..self.clone()
        }
    }

    /// Record a finished pass: survivors join the frequent table and become the
    /// working list, and the pass counter moves on.
    #[must_use]
    pub fn with_survivors(&self, survivors: &[(Itemset, u64)]) -> Self {
        let mut frequent = self.frequent.clone();
        frequent.extend(survivors.iter().cloned());
        let mut working_list: Vec<Itemset> = survivors.iter().map(|(s, _)| s.clone()).collect();
        working_list.sort();
        Self {
            current_pass: self.current_pass + 1,
            max_pass: self.max_pass,
            min_support_count: self.min_support_count,
            working_list,
            list_phase: ListPhase::Frequent,
            frequent,
        }
    }

    /// Frequent itemsets of one size, in canonical order.
    pub fn frequent_of_size(&self, size: usize) -> impl Iterator<Item = (&Itemset, u64)> {
        self.frequent
            .iter()
            .filter(move |(s, _)| s.len() == size)
            .map(|(s, c)| (s, *c))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fresh_state_has_not_converged() {
        let s = PassState::new(3, 2);
        assert_eq!(s.current_pass, 1);
        assert_eq!(s.itemset_size(), 1);
        assert!(!s.has_converged());
    }

    #[test]
    fn passing_max_pass_converges() {
        let s = PassState::new(1, 1).with_survivors(&[
            (Itemset::single("a"), 3),
            (Itemset::single("b"), 2),
        ]);
        assert_eq!(s.current_pass, 2);
        assert!(s.has_converged());
    }

    #[test]
    fn single_survivor_converges_after_first_pass() {
        let s = PassState::new(10, 1).with_survivors(&[(Itemset::single("a"), 3)]);
        assert!(s.has_converged());
    }

    #[test]
    fn survivors_accumulate_in_the_frequent_table() {
        let s = PassState::new(5, 1)
            .with_survivors(&[(Itemset::single("b"), 2), (Itemset::single("a"), 3)]);
        assert_eq!(s.working_list, vec![Itemset::single("a"), Itemset::single("b")]);
        assert_eq!(s.itemset_size(), 2);
        let s = s
            .with_candidates(vec![Itemset::new(["a", "b"])])
            .with_survivors(&[(Itemset::new(["a", "b"]), 2)]);
        assert_eq!(s.frequent.len(), 3);
        assert_eq!(s.list_phase, ListPhase::Frequent);
        assert_eq!(s.frequent_of_size(2).count(), 1);
    }
}
