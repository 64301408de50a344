//! Map-side combiners.
//!
//! A combiner folds the values of one key inside a map chunk before the
//! shuffle, so fewer pairs cross the barrier. It must agree with the stage's
//! reduce: combining partial results and then reducing has to give the same
//! answer as reducing the raw values.

use anyhow::{Result, anyhow};

/// Associative and commutative fold over the values of one key.
pub trait Combiner<V>: Send + Sync {
    /// Fresh accumulator.
    fn create(&self) -> V;

    /// Fold one input into the accumulator.
    ///
    /// # Errors
    ///
    /// Implementation-defined, e.g. arithmetic overflow.
    fn add_input(&self, acc: &mut V, value: V) -> Result<()>;

    /// Merge two partial accumulators.
    ///
    /// # Errors
    ///
    /// Same as [`add_input`](Self::add_input).
    fn merge(&self, acc: &mut V, other: V) -> Result<()> {
        self.add_input(acc, other)
    }
}

/// Sum of support counts.
#[derive(Clone, Copy, Debug, Default)]
pub struct SumCounts;

impl Combiner<u64> for SumCounts {
    fn create(&self) -> u64 {
        0
    }

    fn add_input(&self, acc: &mut u64, value: u64) -> Result<()> {
        *acc = acc
            .checked_add(value)
            .ok_or_else(|| anyhow!("support count overflow ({acc} + {value})"))?;
        Ok(())
    }
}

/// Fold every value with `combiner`, starting from `create()`.
///
/// # Errors
///
/// Propagates the first error from the combiner.
pub fn combine_all<V, C>(combiner: &C, values: impl IntoIterator<Item = V>) -> Result<V>
where
    C: Combiner<V> + ?Sized,
{
    let mut acc = combiner.create();
    for v in values {
        combiner.merge(&mut acc, v)?;
    }
    Ok(acc)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sum_of_partial_sums_matches_full_sum() -> Result<()> {
        let values = vec![1u64, 1, 1, 1, 1, 1, 1];
        let full = combine_all(&SumCounts, values.clone())?;
        let left = combine_all(&SumCounts, values[..3].to_vec())?;
        let right = combine_all(&SumCounts, values[3..].to_vec())?;
        assert_eq!(combine_all(&SumCounts, [left, right])?, full);
        assert_eq!(full, 7);
        Ok(())
    }

    #[test]
    fn sum_reports_overflow() {
        let err = combine_all(&SumCounts, [u64::MAX, 1]).unwrap_err();
        assert!(err.to_string().contains("overflow"));
    }

    #[test]
    fn empty_input_is_zero() -> Result<()> {
        assert_eq!(combine_all(&SumCounts, Vec::<u64>::new())?, 0);
        Ok(())
    }
}
