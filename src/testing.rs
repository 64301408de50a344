//! Fixtures and reference implementations for tests.
//!
//! The brute-force helpers count supports by scanning every transaction and
//! enumerating every subset, so they only suit small fixtures. They are the
//! yardstick the staged pipeline is checked against.
//!
//! ```
//! use ironbasket::testing::{brute_force_support, sample_baskets};
//! use ironbasket::Itemset;
//!
//! let baskets = sample_baskets();
//! let bread_milk = Itemset::new(["bread", "milk"]);
//! assert_eq!(brute_force_support(&baskets, ",", &bread_milk), 4);
//! ```

use crate::error::MiningResult;
use crate::io::write_lines;
use crate::itemset::Itemset;
use crate::rules::AssociationRule;
use crate::transaction::{Transaction, parse_transaction};
use std::collections::BTreeMap;
use std::path::Path;

/// A small grocery dataset, comma delimited, with one blank line.
#[must_use]
pub fn sample_baskets() -> Vec<String> {
    [
        "bread,milk",
        "bread,diapers,beer,eggs",
        "milk,diapers,beer,cola",
        "bread,milk,diapers,beer",
        "bread,milk,diapers,cola",
        "",
        "bread, milk ,eggs",
    ]
    .into_iter()
    .map(String::from)
    .collect()
}

/// Transactions of at most two items, so no 3-itemset can be frequent.
#[must_use]
pub fn pair_only_baskets() -> Vec<String> {
    ["a,b", "a,c", "b,c", "a,b", "b,c", "a,c"]
        .into_iter()
        .map(String::from)
        .collect()
}

/// Four transactions where `[a] => b` has support 0.5, confidence 1.0 and
/// lift 2.0 at a minimum support of 0.5.
#[must_use]
pub fn literal_rule_baskets() -> Vec<String> {
    ["a,b", "a,b", "c", "c"].into_iter().map(String::from).collect()
}

/// Write `lines` as an input file at `path`.
///
/// # Errors
///
/// Any write failure.
pub fn write_baskets(path: &Path, lines: &[String]) -> MiningResult<()> {
    write_lines(path, lines).map(|_| ())
}

/// Well-formed transactions of `records`; malformed ones are dropped.
#[must_use]
pub fn transactions(records: &[String], delimiter: &str) -> Vec<Transaction> {
    records
        .iter()
        .filter_map(|r| parse_transaction(r, delimiter).ok())
        .collect()
}

/// Number of transactions containing `itemset`.
#[must_use]
pub fn brute_force_support(records: &[String], delimiter: &str, itemset: &Itemset) -> u64 {
    transactions(records, delimiter)
        .iter()
        .filter(|t| t.contains(itemset))
        .count() as u64
}

/// Every itemset of at most `max_size` items with support `>= min_count`,
/// found by enumerating the subsets of each transaction.
#[must_use]
pub fn brute_force_frequent(
    records: &[String],
    delimiter: &str,
    min_count: u64,
    max_size: usize,
) -> BTreeMap<Itemset, u64> {
    let mut counts: BTreeMap<Itemset, u64> = BTreeMap::new();
    for txn in transactions(records, delimiter) {
        let items = txn.items().items();
        let mut subsets: Vec<Vec<&String>> = vec![Vec::new()];
        for item in items {
            let grown: Vec<Vec<&String>> = subsets
                .iter()
                .filter(|s| s.len() < max_size)
                .map(|s| {
                    let mut next = s.clone();
                    next.push(item);
                    next
                })
                .collect();
            subsets.extend(grown);
        }
        for subset in subsets.into_iter().filter(|s| !s.is_empty()) {
            *counts
                .entry(Itemset::new(subset.into_iter().cloned()))
                .or_insert(0) += 1;
        }
    }
    counts.retain(|_, count| *count >= min_count.max(1));
    counts
}

/// Assert two floats agree to within `1e-9`.
///
/// # Panics
///
/// When they do not.
pub fn assert_close(actual: f64, expected: f64) {
    assert!(
        (actual - expected).abs() < 1e-9,
        "expected {expected}, got {actual}"
    );
}

/// Find the rule `[antecedent] => consequent` in `rules`.
///
/// # Panics
///
/// When no such rule exists.
#[must_use]
pub fn find_rule<'a>(
    rules: &'a [AssociationRule],
    antecedent: &str,
    consequent: &str,
) -> &'a AssociationRule {
    let antecedent = Itemset::parse_canonical(antecedent);
    let consequent = Itemset::parse_canonical(consequent);
    rules
        .iter()
        .find(|r| r.antecedent == antecedent && r.consequent == consequent)
        .unwrap_or_else(|| panic!("no rule [{antecedent}] => {consequent} in {rules:?}"))
}
