//! Apriori frequent itemset mining.
//!
//! Each pass counts one itemset size with an [`ItemsetCountStage`]. Between
//! passes, [`generate_candidates`] joins the survivors into the next size and
//! prunes candidates with an infrequent subset.

use crate::checkpoint::StateStore;
use crate::combiners::{Combiner, SumCounts, combine_all};
use crate::error::MiningResult;
use crate::itemset::Itemset;
use crate::runner::Runner;
use crate::stage::{Emitter, NaturalOrder, Stage, StageCounters};
use crate::state::PassState;
use crate::transaction::{parse_transaction, preview};
use std::collections::{BTreeSet, HashSet};
use std::path::Path;
use std::sync::Arc;
use tracing::{debug, info, trace};

/// Join frequent (K−1)-itemsets into K-candidates.
///
/// Two itemsets join when they share their first K−2 items and differ in the
/// last one. A candidate is kept only if every (K−1)-subset is in `frequent`.
/// The result is deduplicated and in canonical order.
#[must_use]
pub fn generate_candidates(frequent: &[Itemset]) -> Vec<Itemset> {
    let mut sorted: Vec<&Itemset> = frequent.iter().collect();
    sorted.sort();
    sorted.dedup();
    let known: HashSet<&Itemset> = sorted.iter().copied().collect();

    let mut candidates = BTreeSet::new();
    for (i, left) in sorted.iter().enumerate() {
        let Some(prefix_len) = left.len().checked_sub(1) else {
            continue;
        };
        for right in &sorted[i + 1..] {
            if right.len() != left.len() || right.prefix(prefix_len) != left.prefix(prefix_len) {
                // Sorted input: once the prefix changes no later itemset matches.
                break;
            }
            if left.last() == right.last() {
                continue;
            }
            let candidate = left.union(right);
            if candidate
                .one_smaller_subsets()
                .all(|subset| known.contains(&subset))
            {
                candidates.insert(candidate);
            }
        }
    }
    candidates.into_iter().collect()
}

/// Counts the support of one itemset size over the transactions.
///
/// Pass 1 counts single items. Later passes count the candidates installed in
/// the pass state. Counts below the minimum support are dropped in reduce.
pub struct ItemsetCountStage {
    name: String,
    itemset_size: usize,
    delimiter: String,
    min_support_count: u64,
    candidates: Arc<Vec<Itemset>>,
}

impl ItemsetCountStage {
    #[must_use]
    pub fn new(state: &PassState, delimiter: impl Into<String>) -> Self {
        Self {
            name: format!("apriori-pass-{}", state.current_pass),
            itemset_size: state.itemset_size(),
            delimiter: delimiter.into(),
            min_support_count: state.min_support_count,
            candidates: Arc::new(state.working_list.clone()),
        }
    }
}

impl Stage for ItemsetCountStage {
    type Input = String;
    type Key = Itemset;
    type Value = u64;
    type Output = (Itemset, u64);
    type Ordering = NaturalOrder;

    fn name(&self) -> &str {
        &self.name
    }

    fn map(&self, record: &String, out: &mut Emitter<Itemset, u64>) -> anyhow::Result<()> {
        let txn = match parse_transaction(record, &self.delimiter) {
            Ok(txn) => txn,
            Err(err) if err.is_recoverable() => {
                out.skip(format_args!("{err}; record `{}`", preview(record)));
                return Ok(());
            }
            Err(err) => return Err(err.into()),
        };

        if self.itemset_size == 1 {
            for item in txn.items().iter() {
                out.emit(Itemset::single(item.clone()), 1);
            }
            return Ok(());
        }

        if txn.len() < self.itemset_size {
            return Ok(());
        }
        for candidate in self.candidates.iter() {
            if txn.contains(candidate) {
                out.emit(candidate.clone(), 1);
            }
        }
        Ok(())
    }

    fn combiner(&self) -> Option<&dyn Combiner<u64>> {
        Some(&SumCounts)
    }

    fn ordering(&self) -> &NaturalOrder {
        &NaturalOrder
    }

    fn reduce(&self, itemset: &Itemset, counts: Vec<u64>) -> anyhow::Result<Vec<(Itemset, u64)>> {
        let support = combine_all(&SumCounts, counts)?;
        if support >= self.min_support_count {
            Ok(vec![(itemset.clone(), support)])
        } else {
            Ok(Vec::new())
        }
    }
}

/// Result of one counting pass.
#[derive(Debug)]
pub struct PassOutcome {
    /// State after the pass (counter advanced, survivors recorded).
    pub state: PassState,
    /// Survivors of this pass, sorted by canonical itemset.
    pub survivors: Vec<(Itemset, u64)>,
    pub counters: StageCounters,
}

/// Run the counting pass described by `state`.
///
/// For pass K > 1 the candidates are generated here from the working list,
/// so `state` must hold the frequent itemsets of the previous pass.
///
/// # Errors
///
/// Propagates stage failures.
pub fn run_pass(
    runner: &Runner,
    records: &[String],
    delimiter: &str,
    state: &PassState,
) -> MiningResult<PassOutcome> {
    let counting = if state.current_pass == 1 {
        state.clone()
    } else {
        let candidates = generate_candidates(&state.working_list);
        debug!(
            pass = state.current_pass,
            candidates = candidates.len(),
            "generated candidates"
        );
        trace!(?candidates, "candidate list");
        state.with_candidates(candidates)
    };

    let stage = ItemsetCountStage::new(&counting, delimiter);
    let output = runner.run_stage(&stage, records)?;

    let mut survivors = output.records;
    survivors.sort();
    info!(
        pass = state.current_pass,
        frequent = survivors.len(),
        skipped = output.counters.skipped_records,
        "pass finished"
    );

    Ok(PassOutcome {
        state: counting.with_survivors(&survivors),
        survivors,
        counters: output.counters,
    })
}

/// Every pass of a mining run, in order.
#[derive(Debug)]
pub struct MiningRun {
    pub state: PassState,
    /// Survivors per pass, index 0 is pass 1.
    pub passes: Vec<Vec<(Itemset, u64)>>,
    /// Counters summed over every pass.
    pub counters: StageCounters,
    /// Malformed records. Every pass reads the same input, so this is the
    /// count of a single pass.
    pub skipped_records: u64,
}

/// Run passes until the state converges, saving and reloading it through
/// `store` at every pass boundary. `on_pass` sees each pass's survivors
/// before the state moves on.
///
/// The loop stops once `max_pass` passes ran, or as soon as a pass leaves at
/// most one frequent itemset to join.
///
/// # Examples
///
/// ```
/// use ironbasket::{Itemset, MemoryStateStore, PassState, Runner, mine_frequent_itemsets};
/// use std::path::Path;
///
/// # fn main() -> Result<(), ironbasket::MiningError> {
/// let baskets: Vec<String> = ["a,b,c", "a,b", "a,c", "b,c"]
///     .into_iter()
///     .map(String::from)
///     .collect();
///
/// let mut sizes = Vec::new();
/// let run = mine_frequent_itemsets(
///     &Runner::sequential(),
///     &baskets,
///     ",",
///     PassState::new(5, 2),
///     &MemoryStateStore::new(),
///     Path::new("pass-state"),
///     |pass, survivors| {
///         sizes.push((pass, survivors.len()));
///         Ok(())
///     },
/// )?;
///
/// // Three single items, three pairs, and {a,b,c} below the minimum.
/// assert_eq!(sizes, vec![(1, 3), (2, 3), (3, 0)]);
/// assert_eq!(run.state.frequent.get(&Itemset::new(["a", "b"])), Some(&2));
/// assert!(run.state.has_converged());
/// # Ok(())
/// # }
/// ```
///
/// # Errors
///
/// Stage failures, state persistence failures and errors from `on_pass`.
/// A state that fails to reload is a [`MiningError::StatePersistence`]
/// and stops the run before the next pass.
///
/// [`MiningError::StatePersistence`]: crate::MiningError::StatePersistence
pub fn mine_frequent_itemsets<F>(
    runner: &Runner,
    records: &[String],
    delimiter: &str,
    initial: PassState,
    store: &dyn StateStore,
    state_path: &Path,
    mut on_pass: F,
) -> MiningResult<MiningRun>
where
    F: FnMut(u32, &[(Itemset, u64)]) -> MiningResult<()>,
{
    store.save(state_path, &initial)?;
    let mut passes = Vec::new();
    let mut counters = StageCounters::default();
    let mut skipped_records = 0;

    let mut state = store.load(state_path)?;
    while !state.has_converged() {
        let outcome = run_pass(runner, records, delimiter, &state)?;
        on_pass(state.current_pass, &outcome.survivors)?;
        skipped_records = skipped_records.max(outcome.counters.skipped_records);
        counters.absorb(&outcome.counters);
        passes.push(outcome.survivors);
        store.save(state_path, &outcome.state)?;
        state = store.load(state_path)?;
    }

    info!(
        passes = passes.len(),
        frequent = state.frequent.len(),
        "frequent itemset mining converged"
    );
    Ok(MiningRun {
        state,
        passes,
        counters,
        skipped_records,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sets(list: &[&str]) -> Vec<Itemset> {
        list.iter().map(|s| Itemset::parse_canonical(s)).collect()
    }

    #[test]
    fn pairs_come_from_all_frequent_items() {
        let got = generate_candidates(&sets(&["c", "a", "b"]));
        assert_eq!(got, sets(&["a,b", "a,c", "b,c"]));
    }

    #[test]
    fn join_needs_a_shared_prefix_and_prune_drops_infrequent_subsets() {
        // a,b,c survives; a,b,d needs b,d which is missing.
        let got = generate_candidates(&sets(&["a,b", "a,c", "a,d", "b,c"]));
        assert_eq!(got, sets(&["a,b,c"]));
    }

    #[test]
    fn no_candidates_from_a_single_itemset() {
        assert!(generate_candidates(&sets(&["a,b"])).is_empty());
        assert!(generate_candidates(&[]).is_empty());
    }

    #[test]
    fn counting_stage_skips_malformed_records() -> anyhow::Result<()> {
        let records: Vec<String> = ["a b", "a,b c", "b"].into_iter().map(String::from).collect();
        let state = PassState::new(3, 1);
        let outcome = run_pass(&Runner::sequential(), &records, " ", &state)?;
        assert_eq!(outcome.counters.skipped_records, 1);
        assert_eq!(
            outcome.survivors,
            vec![(Itemset::single("a"), 1), (Itemset::single("b"), 2)]
        );
        assert_eq!(outcome.state.current_pass, 2);
        Ok(())
    }
}
