//! Executes a [`Stage`] sequentially or on rayon.

use crate::error::{MiningError, MiningResult, StagePhase};
use crate::stage::{Emitter, GroupKeyOf, KeyOrdering, Stage, StageCounters, StageOutput};
use rayon::prelude::*;
use std::collections::HashMap;
use std::collections::hash_map::Entry;
use tracing::debug;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ExecMode {
    Sequential,
    /// Run on rayon. `threads` builds a dedicated pool instead of the global one.
    Parallel { threads: Option<usize> },
}

#[derive(Clone, Debug)]
pub struct Runner {
    pub mode: ExecMode,
    /// Number of shuffle partitions.
    pub partitions: usize,
}

impl Default for Runner {
    fn default() -> Self {
        Self {
            mode: ExecMode::Parallel { threads: None },
            partitions: default_partitions(),
        }
    }
}

/// `2 × max(num_cpus, 2)`
#[must_use]
pub fn default_partitions() -> usize {
    2 * num_cpus::get().max(2)
}

/// Failure inside one worker, tagged with the phase it happened in.
type PhaseError = (StagePhase, anyhow::Error);

struct MappedChunk<K, V> {
    buckets: Vec<Vec<(K, V)>>,
    skipped: u64,
    emitted: u64,
    combined: u64,
}

impl Runner {
    #[must_use]
    pub fn sequential() -> Self {
        Self {
            mode: ExecMode::Sequential,
            ..Self::default()
        }
    }

    #[must_use]
    pub fn parallel(threads: Option<usize>) -> Self {
        Self {
            mode: ExecMode::Parallel { threads },
            ..Self::default()
        }
    }

    #[must_use]
    pub fn with_partitions(mut self, partitions: usize) -> Self {
        self.partitions = partitions.max(1);
        self
    }

    /// Run one stage to completion: map per chunk, combine per chunk, shuffle
    /// into partitions, sort and group each partition, then reduce every group.
    ///
    /// Output is concatenated in (partition, group) order, so callers that need
    /// a stable order sort it themselves.
    ///
    /// # Examples
    ///
    /// Counting items over three baskets with the pass-1 counting stage:
    ///
    /// ```
    /// use ironbasket::{Itemset, ItemsetCountStage, PassState, Runner};
    ///
    /// # fn main() -> Result<(), ironbasket::MiningError> {
    /// let baskets = vec![
    ///     "bread,milk".to_string(),
    ///     "bread".to_string(),
    ///     "milk,eggs".to_string(),
    /// ];
    /// let stage = ItemsetCountStage::new(&PassState::new(3, 2), ",");
    ///
    /// let runner = Runner::parallel(None).with_partitions(4);
    /// let mut out = runner.run_stage(&stage, &baskets)?;
    /// out.records.sort();
    ///
    /// assert_eq!(
    ///     out.records,
    ///     vec![(Itemset::single("bread"), 2), (Itemset::single("milk"), 2)]
    /// );
    /// assert_eq!(out.counters.input_records, 3);
    /// assert_eq!(out.counters.reduce_groups, 3);
    /// # Ok(())
    /// # }
    /// ```
    ///
    /// # Errors
    ///
    /// The first failing map, combine or reduce call aborts the stage with
    /// [`MiningError::StageExecution`]; no partial output is returned.
    /// A dedicated thread pool that cannot be built is a
    /// [`MiningError::Configuration`].
    pub fn run_stage<S: Stage>(
        &self,
        stage: &S,
        records: &[S::Input],
    ) -> MiningResult<StageOutput<S::Output>> {
        let partitions = self.partitions.max(1);
        match self.mode {
            ExecMode::Sequential => execute(stage, records, partitions, false),
            ExecMode::Parallel { threads: None } => execute(stage, records, partitions, true),
            ExecMode::Parallel {
                threads: Some(threads),
            } => {
                let pool = rayon::ThreadPoolBuilder::new()
                    .num_threads(threads.max(1))
                    .build()
                    .map_err(|e| {
                        MiningError::configuration(format!(
                            "could not build a {threads}-thread pool: {e}"
                        ))
                    })?;
                pool.install(|| execute(stage, records, partitions, true))
            }
        }
    }
}

fn execute<S: Stage>(
    stage: &S,
    records: &[S::Input],
    partitions: usize,
    parallel: bool,
) -> MiningResult<StageOutput<S::Output>> {
    let wrap = |(phase, source): PhaseError| MiningError::StageExecution {
        stage: stage.name().to_string(),
        phase,
        source,
    };

    // Map side: one chunk per partition slot, never more chunks than records.
    let chunk_count = partitions.min(records.len().max(1));
    let chunk_len = records.len().div_ceil(chunk_count).max(1);
    let chunks: Vec<&[S::Input]> = records.chunks(chunk_len).collect();

    let mapped: Vec<MappedChunk<S::Key, S::Value>> = if parallel {
        chunks
            .par_iter()
            .map(|chunk| map_chunk(stage, chunk, partitions))
            .collect::<Result<Vec<_>, PhaseError>>()
    } else {
        chunks
            .iter()
            .map(|chunk| map_chunk(stage, chunk, partitions))
            .collect::<Result<Vec<_>, PhaseError>>()
    }
    .map_err(wrap)?;

    // Barrier: transpose chunk buckets into partitions, keeping chunk order.
    let mut counters = StageCounters {
        input_records: records.len() as u64,
        ..StageCounters::default()
    };
    let mut shuffled: Vec<Vec<(S::Key, S::Value)>> = (0..partitions).map(|_| Vec::new()).collect();
    for chunk in mapped {
        counters.skipped_records += chunk.skipped;
        counters.map_output_pairs += chunk.emitted;
        counters.combined_pairs += chunk.combined;
        for (target, bucket) in shuffled.iter_mut().zip(chunk.buckets) {
            target.extend(bucket);
        }
    }

    let grouped: Vec<Vec<(GroupKeyOf<S>, Vec<S::Value>)>> = if parallel {
        shuffled
            .into_par_iter()
            .map(|part| sort_and_group(stage, part))
            .collect()
    } else {
        shuffled
            .into_iter()
            .map(|part| sort_and_group(stage, part))
            .collect()
    };

    let groups: Vec<(GroupKeyOf<S>, Vec<S::Value>)> = grouped.into_iter().flatten().collect();
    counters.reduce_groups = groups.len() as u64;

    let reduced: Vec<Vec<S::Output>> = if parallel {
        groups
            .into_par_iter()
            .map(|(key, values)| stage.reduce(&key, values))
            .collect::<anyhow::Result<Vec<_>>>()
    } else {
        groups
            .into_iter()
            .map(|(key, values)| stage.reduce(&key, values))
            .collect::<anyhow::Result<Vec<_>>>()
    }
    .map_err(|e| wrap((StagePhase::Reduce, e)))?;

    let records: Vec<S::Output> = reduced.into_iter().flatten().collect();
    counters.output_records = records.len() as u64;

    debug!(
        stage = stage.name(),
        input = counters.input_records,
        skipped = counters.skipped_records,
        pairs = counters.map_output_pairs,
        combined = counters.combined_pairs,
        groups = counters.reduce_groups,
        output = counters.output_records,
        "stage finished"
    );

    Ok(StageOutput { records, counters })
}

/// Map, combine and bucket one chunk of input.
fn map_chunk<S: Stage>(
    stage: &S,
    chunk: &[S::Input],
    partitions: usize,
) -> Result<MappedChunk<S::Key, S::Value>, PhaseError> {
    let mut out = Emitter::new();
    for record in chunk {
        stage
            .map(record, &mut out)
            .map_err(|e| (StagePhase::Map, e))?;
    }
    let (pairs, skipped) = out.into_parts();
    let emitted = pairs.len() as u64;

    let pairs = match stage.combiner() {
        Some(combiner) => combine_local(combiner, pairs).map_err(|e| (StagePhase::Combine, e))?,
        None => pairs,
    };
    let combined = pairs.len() as u64;

    let ordering = stage.ordering();
    let mut buckets: Vec<Vec<(S::Key, S::Value)>> = (0..partitions).map(|_| Vec::new()).collect();
    for (key, value) in pairs {
        let target = stage.partition(&ordering.group_key(&key), partitions);
        let bucket = buckets.get_mut(target).ok_or_else(|| {
            (
                StagePhase::Map,
                anyhow::anyhow!("partitioner returned {target} for {partitions} partitions"),
            )
        })?;
        bucket.push((key, value));
    }

    Ok(MappedChunk {
        buckets,
        skipped,
        emitted,
        combined,
    })
}

/// Fold values per key, keeping first-seen key order.
fn combine_local<K, V>(
    combiner: &dyn crate::combiners::Combiner<V>,
    pairs: Vec<(K, V)>,
) -> anyhow::Result<Vec<(K, V)>>
where
    K: Clone + Eq + std::hash::Hash,
{
    let mut index: HashMap<K, usize> = HashMap::with_capacity(pairs.len());
    let mut out: Vec<(K, V)> = Vec::new();
    for (key, value) in pairs {
        match index.entry(key) {
            Entry::Occupied(slot) => combiner.add_input(&mut out[*slot.get()].1, value)?,
            Entry::Vacant(slot) => {
                let mut acc = combiner.create();
                combiner.add_input(&mut acc, value)?;
                out.push((slot.key().clone(), acc));
                slot.insert(out.len() - 1);
            }
        }
    }
    Ok(out)
}

/// Stable sort by sort key, then split into runs of equal group key.
fn sort_and_group<S: Stage>(
    stage: &S,
    mut part: Vec<(S::Key, S::Value)>,
) -> Vec<(GroupKeyOf<S>, Vec<S::Value>)> {
    let ordering = stage.ordering();
    part.sort_by_cached_key(|(key, _)| ordering.sort_key(key));

    let mut groups: Vec<(GroupKeyOf<S>, Vec<S::Value>)> = Vec::new();
    for (key, value) in part {
        let group_key = ordering.group_key(&key);
        match groups.last_mut() {
            Some((current, values)) if *current == group_key => values.push(value),
            _ => groups.push((group_key, vec![value])),
        }
    }
    groups
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::combiners::SumCounts;
    use crate::stage::NaturalOrder;

    struct WordCount {
        combine: bool,
    }

    impl Stage for WordCount {
        type Input = String;
        type Key = String;
        type Value = u64;
        type Output = (String, u64);
        type Ordering = NaturalOrder;

        fn name(&self) -> &str {
            "word-count"
        }

        fn map(&self, record: &String, out: &mut Emitter<String, u64>) -> anyhow::Result<()> {
            if record.starts_with('!') {
                out.skip(record);
                return Ok(());
            }
            for word in record.split_whitespace() {
                out.emit(word.to_string(), 1);
            }
            Ok(())
        }

        fn combiner(&self) -> Option<&dyn crate::combiners::Combiner<u64>> {
            self.combine.then_some(&SumCounts as &dyn crate::combiners::Combiner<u64>)
        }

        fn ordering(&self) -> &NaturalOrder {
            &NaturalOrder
        }

        fn reduce(&self, key: &String, values: Vec<u64>) -> anyhow::Result<Vec<(String, u64)>> {
            Ok(vec![(key.clone(), values.into_iter().sum())])
        }
    }

    fn lines() -> Vec<String> {
        ["a b a", "b c", "!broken", "a", ""]
            .into_iter()
            .map(String::from)
            .collect()
    }

    fn sorted(mut v: Vec<(String, u64)>) -> Vec<(String, u64)> {
        v.sort();
        v
    }

    #[test]
    fn sequential_and_parallel_agree() -> anyhow::Result<()> {
        let expected = vec![("a".to_string(), 3), ("b".to_string(), 2), ("c".to_string(), 1)];
        for combine in [false, true] {
            for runner in [
                Runner::sequential().with_partitions(1),
                Runner::sequential().with_partitions(3),
                Runner::parallel(None).with_partitions(4),
                Runner::parallel(Some(2)).with_partitions(5),
            ] {
                let out = runner.run_stage(&WordCount { combine }, &lines())?;
                assert_eq!(sorted(out.records), expected);
                assert_eq!(out.counters.input_records, 5);
                assert_eq!(out.counters.skipped_records, 1);
                assert_eq!(out.counters.map_output_pairs, 6);
                assert_eq!(out.counters.reduce_groups, 3);
                assert_eq!(out.counters.output_records, 3);
            }
        }
        Ok(())
    }

    #[test]
    fn combiner_shrinks_shuffle() -> anyhow::Result<()> {
        let runner = Runner::sequential().with_partitions(1);
        let out = runner.run_stage(&WordCount { combine: true }, &lines())?;
        assert_eq!(out.counters.combined_pairs, 3);
        Ok(())
    }

    #[test]
    fn empty_input_produces_nothing() -> anyhow::Result<()> {
        let out = Runner::default().run_stage(&WordCount { combine: true }, &[])?;
        assert!(out.records.is_empty());
        assert_eq!(out.counters, StageCounters::default());
        Ok(())
    }
}
