//! Stage contract for the map → combine → shuffle → reduce runtime.
//!
//! A [`Stage`] supplies the per-record `map`, an optional map-side
//! [`Combiner`], the [`KeyOrdering`] used by the shuffle and the per-group
//! `reduce`. The [`Runner`](crate::runner::Runner) owns everything in between:
//! chunking, partitioning, sorting, grouping and parallelism.
//!
//! The ordering carries two projections of the intermediate key:
//!
//! - the **sort key** orders entries inside a partition;
//! - the **group key** decides which consecutive entries form one reduce group.
//!
//! The group key may be coarser than the sort key (secondary sort). For that to
//! work the sort key must order by the group key first, so equal group keys
//! end up adjacent after sorting.

use crate::combiners::Combiner;
use std::collections::hash_map::DefaultHasher;
use std::fmt::Display;
use std::hash::{Hash, Hasher};
use tracing::warn;

/// Sort and group projections of an intermediate key.
pub trait KeyOrdering<K>: Send + Sync {
    /// Total order used inside a partition.
    type SortKey: Ord + Send;
    /// Equality that delimits reduce groups.
    type GroupKey: Eq + Hash + Send + Sync;

    fn sort_key(&self, key: &K) -> Self::SortKey;
    fn group_key(&self, key: &K) -> Self::GroupKey;
}

/// Sort and group by the key itself.
#[derive(Clone, Copy, Debug, Default)]
pub struct NaturalOrder;

impl<K> KeyOrdering<K> for NaturalOrder
where
    K: Ord + Hash + Clone + Send + Sync,
{
    type SortKey = K;
    type GroupKey = K;

    fn sort_key(&self, key: &K) -> K {
        key.clone()
    }

    fn group_key(&self, key: &K) -> K {
        key.clone()
    }
}

/// Group key type of a stage.
pub type GroupKeyOf<S> = <<S as Stage>::Ordering as KeyOrdering<<S as Stage>::Key>>::GroupKey;

/// One map/shuffle/reduce step.
///
/// Implementations must be pure per record and per group: the runner calls
/// `map` and `reduce` from several threads at once.
pub trait Stage: Send + Sync {
    type Input: Sync;
    type Key: Clone + Eq + Hash + Send + Sync;
    type Value: Send;
    type Output: Send;
    type Ordering: KeyOrdering<Self::Key>;

    /// Stage name used in logs and errors.
    fn name(&self) -> &str;

    /// Emit zero or more intermediate pairs for one record.
    ///
    /// # Errors
    ///
    /// Any error aborts the whole stage. Malformed records should be reported
    /// through [`Emitter::skip`] instead.
    fn map(
        &self,
        record: &Self::Input,
        out: &mut Emitter<Self::Key, Self::Value>,
    ) -> anyhow::Result<()>;

    /// Map-side combiner applied to each chunk before the shuffle.
    fn combiner(&self) -> Option<&dyn Combiner<Self::Value>> {
        None
    }

    fn ordering(&self) -> &Self::Ordering;

    /// Partition index for a group key, always in `0..partitions`.
    fn partition(&self, group_key: &GroupKeyOf<Self>, partitions: usize) -> usize {
        hash_partition(group_key, partitions)
    }

    /// Reduce one group. `values` arrive in sort-key order.
    ///
    /// # Errors
    ///
    /// Any error aborts the whole stage.
    fn reduce(
        &self,
        group_key: &GroupKeyOf<Self>,
        values: Vec<Self::Value>,
    ) -> anyhow::Result<Vec<Self::Output>>;
}

/// Default partitioner: `((h % n) + n) % n` over a signed hash of the key.
#[must_use]
#[allow(clippy::cast_possible_wrap, clippy::cast_possible_truncation, clippy::cast_sign_loss)]
pub fn hash_partition<G: Hash + ?Sized>(group_key: &G, partitions: usize) -> usize {
    let n = partitions.max(1) as i64;
    let mut hasher = DefaultHasher::new();
    group_key.hash(&mut hasher);
    let h = hasher.finish() as i64;
    (((h % n) + n) % n) as usize
}

/// Collects the pairs a `map` call emits.
#[derive(Debug)]
pub struct Emitter<K, V> {
    pairs: Vec<(K, V)>,
    skipped: u64,
}

impl<K, V> Default for Emitter<K, V> {
    fn default() -> Self {
        Self {
            pairs: Vec::new(),
            skipped: 0,
        }
    }
}

impl<K, V> Emitter<K, V> {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn emit(&mut self, key: K, value: V) {
        self.pairs.push((key, value));
    }

    /// Mark the current record as malformed; it is counted and logged, not fatal.
    pub fn skip<R: Display>(&mut self, reason: R) {
        self.skipped += 1;
        warn!(%reason, "skipping malformed record");
    }

    #[must_use]
    pub fn skipped(&self) -> u64 {
        self.skipped
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.pairs.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.pairs.is_empty()
    }

    pub(crate) fn into_parts(self) -> (Vec<(K, V)>, u64) {
        (self.pairs, self.skipped)
    }
}

/// Counters gathered while a stage runs.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct StageCounters {
    pub input_records: u64,
    pub skipped_records: u64,
    pub map_output_pairs: u64,
    pub combined_pairs: u64,
    pub reduce_groups: u64,
    pub output_records: u64,
}

impl StageCounters {
    /// Field-wise sum, used to total counters across passes.
    pub fn absorb(&mut self, other: &StageCounters) {
        self.input_records += other.input_records;
        self.skipped_records += other.skipped_records;
        self.map_output_pairs += other.map_output_pairs;
        self.combined_pairs += other.combined_pairs;
        self.reduce_groups += other.reduce_groups;
        self.output_records += other.output_records;
    }
}

/// Records produced by a stage plus its counters.
#[derive(Debug)]
pub struct StageOutput<T> {
    pub records: Vec<T>,
    pub counters: StageCounters,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hash_partition_stays_in_range() {
        for n in [1usize, 2, 3, 5, 7, 64] {
            for key in 0..200u32 {
                let p = hash_partition(&format!("key-{key}"), n);
                assert!(p < n, "partition {p} out of range for {n}");
            }
        }
        assert_eq!(hash_partition("anything", 0), 0);
    }

    #[test]
    fn hash_partition_is_stable_for_equal_keys() {
        assert_eq!(hash_partition("milk", 5), hash_partition("milk", 5));
    }

    #[test]
    fn emitter_counts_skips_separately() {
        let mut out: Emitter<&str, u64> = Emitter::new();
        out.emit("a", 1);
        out.skip("bad line");
        out.emit("b", 1);
        assert_eq!(out.len(), 2);
        assert_eq!(out.skipped(), 1);
        let (pairs, skipped) = out.into_parts();
        assert_eq!(pairs, vec![("a", 1), ("b", 1)]);
        assert_eq!(skipped, 1);
    }

    #[test]
    fn counters_absorb_adds_fields() {
        let mut total = StageCounters::default();
        let pass = StageCounters {
            input_records: 4,
            skipped_records: 1,
            map_output_pairs: 9,
            combined_pairs: 6,
            reduce_groups: 3,
            output_records: 2,
        };
        total.absorb(&pass);
        total.absorb(&pass);
        assert_eq!(total.input_records, 8);
        assert_eq!(total.output_records, 4);
    }
}
