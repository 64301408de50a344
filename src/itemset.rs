//! Canonical itemsets.
//!
//! An [`Itemset`] keeps its items sorted and deduplicated, so two itemsets are
//! equal exactly when their canonical strings (`a,b,c`) are equal. The
//! canonical string is what the reports print and what the frequent table is
//! keyed by.

use serde::{Deserialize, Serialize};
use std::fmt::{Display, Formatter, Result as FormatResult};
use std::str::FromStr;

/// Separator used by the canonical string form.
pub const ITEM_SEPARATOR: char = ',';

/// A set of distinct items in canonical (sorted) order.
#[derive(Clone, Debug, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Itemset(Vec<String>);

impl Itemset {
    /// Build an itemset from any items; order and duplicates do not matter.
    pub fn new<I, S>(items: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut items: Vec<String> = items.into_iter().map(Into::into).collect();
        items.sort();
        items.dedup();
        Self(items)
    }

    /// Size-1 itemset.
    pub fn single(item: impl Into<String>) -> Self {
        Self(vec![item.into()])
    }

    /// Parse the canonical `a,b,c` form. Empty segments are dropped.
    #[must_use]
    pub fn parse_canonical(s: &str) -> Self {
        Self::new(
            s.split(ITEM_SEPARATOR)
                .map(str::trim)
                .filter(|item| !item.is_empty()),
        )
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Items in canonical order.
    #[must_use]
    pub fn items(&self) -> &[String] {
        &self.0
    }

    pub fn iter(&self) -> impl Iterator<Item = &String> {
        self.0.iter()
    }

    #[must_use]
    pub fn contains_item(&self, item: &str) -> bool {
        self.0
            .binary_search_by(|probe| probe.as_str().cmp(item))
            .is_ok()
    }

    /// The first `n` items in canonical order.
    #[must_use]
    pub fn prefix(&self, n: usize) -> &[String] {
        &self.0[..n.min(self.0.len())]
    }

    #[must_use]
    pub fn last(&self) -> Option<&String> {
        self.0.last()
    }

    /// `self ⊆ other`, including equality.
    #[must_use]
    pub fn is_subset_of(&self, other: &Itemset) -> bool {
        if self.len() > other.len() {
            return false;
        }
        // Both sides are sorted, so a single merge walk is enough.
        let mut rest = other.0.iter();
        'outer: for item in &self.0 {
            for candidate in rest.by_ref() {
                match candidate.cmp(item) {
                    std::cmp::Ordering::Less => continue,
                    std::cmp::Ordering::Equal => continue 'outer,
                    std::cmp::Ordering::Greater => return false,
                }
            }
            return false;
        }
        true
    }

    /// Copy of this itemset without `item`.
    #[must_use]
    pub fn without(&self, item: &str) -> Itemset {
        Self(self.0.iter().filter(|i| i.as_str() != item).cloned().collect())
    }

    /// Items of `self` that are not in `other`.
    #[must_use]
    pub fn difference(&self, other: &Itemset) -> Itemset {
        Self(
            self.0
                .iter()
                .filter(|i| !other.contains_item(i))
                .cloned()
                .collect(),
        )
    }

    #[must_use]
    pub fn union(&self, other: &Itemset) -> Itemset {
        Self::new(self.0.iter().chain(other.0.iter()).cloned())
    }

    /// All subsets with exactly one item removed, in canonical order of the removed item.
    pub fn one_smaller_subsets(&self) -> impl Iterator<Item = Itemset> + '_ {
        self.0.iter().map(move |item| self.without(item))
    }

    /// Canonical string form, `a,b,c`.
    #[must_use]
    pub fn canonical(&self) -> String {
        self.0.join(",")
    }
}

impl Display for Itemset {
    fn fmt(&self, f: &mut Formatter<'_>) -> FormatResult {
        f.write_str(&self.canonical())
    }
}

impl FromStr for Itemset {
    type Err = std::convert::Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(Self::parse_canonical(s))
    }
}

impl<S: Into<String>> FromIterator<S> for Itemset {
    fn from_iter<I: IntoIterator<Item = S>>(iter: I) -> Self {
        Self::new(iter)
    }
}
