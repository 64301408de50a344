//! Parsing one input record into a transaction.

use crate::error::{MiningError, MiningResult};
use crate::itemset::{ITEM_SEPARATOR, Itemset};
use regex::Regex;
use std::sync::LazyLock;

static WHITESPACE_RUN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\s+").expect("valid whitespace regex"));

/// Trim an item and collapse every whitespace run to one space.
#[must_use]
pub fn normalize_item(raw: &str) -> String {
    WHITESPACE_RUN.replace_all(raw.trim(), " ").into_owned()
}

/// The distinct items of one record.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Transaction {
    items: Itemset,
}

impl Transaction {
    #[must_use]
    pub fn items(&self) -> &Itemset {
        &self.items
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.items.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Whether every item of `itemset` occurs in this transaction.
    #[must_use]
    pub fn contains(&self, itemset: &Itemset) -> bool {
        itemset.is_subset_of(&self.items)
    }
}

/// Split `line` on `delimiter`, normalize each item and drop empty ones.
///
/// `delimiter` is matched as a whole string, not as a set of characters.
///
/// A blank line is an empty transaction, not an error.
///
/// # Errors
///
/// [`MiningError::RecordParse`] when an item contains the canonical item
/// separator or an ASCII control character, or when the delimiter is empty.
pub fn parse_transaction(line: &str, delimiter: &str) -> MiningResult<Transaction> {
    if delimiter.is_empty() {
        return Err(MiningError::record_parse("item delimiter is empty"));
    }
    let mut items = Vec::new();
    for raw in line.split(delimiter) {
        let item = normalize_item(raw);
        if item.is_empty() {
            continue;
        }
        if item.contains(ITEM_SEPARATOR) {
            return Err(MiningError::record_parse(format!(
                "item `{item}` contains the reserved separator `{ITEM_SEPARATOR}`"
            )));
        }
        if item.chars().any(|c| c.is_ascii_control()) {
            return Err(MiningError::record_parse(format!(
                "item {item:?} contains a control character"
            )));
        }
        items.push(item);
    }
    Ok(Transaction {
        items: Itemset::new(items),
    })
}

/// Short preview of a record for log lines.
#[must_use]
pub fn preview(line: &str) -> String {
    const MAX: usize = 48;
    match line.char_indices().nth(MAX) {
        Some((cut, _)) => format!("{}…", &line[..cut]),
        None => line.to_string(),
    }
}
