//! Text renderings of the mining results.

use crate::itemset::Itemset;
use crate::rules::AssociationRule;

/// Final report header, emitted once at the top of the table.
#[must_use]
pub fn final_report_header() -> String {
    format!(
        "\t{:<85}\t{:<10}   {:<10}\t      {:<5}",
        "ASSOCIATION RULE", "SUPPORT", "CONFIDENCE", "LIFT"
    )
}

/// `itemset<TAB>count`, highest count first, ties by canonical itemset.
pub fn frequent_itemset_lines<'a, I>(entries: I) -> Vec<String>
where
    I: IntoIterator<Item = (&'a Itemset, u64)>,
{
    let mut entries: Vec<(&Itemset, u64)> = entries.into_iter().collect();
    entries.sort_by(|(set_a, count_a), (set_b, count_b)| {
        count_b
            .cmp(count_a)
            .then_with(|| set_a.canonical().cmp(&set_b.canonical()))
    });
    entries
        .into_iter()
        .map(|(set, count)| format!("{set}\t{count}"))
        .collect()
}

/// `[antecedent] => consequent<TAB>(support, confidence, lift)` with six decimals.
#[must_use]
pub fn rule_line(rule: &AssociationRule) -> String {
    format!(
        "{rule}\t({:.6}, {:.6}, {:.6})",
        rule.support, rule.confidence, rule.lift
    )
}

/// One row of the final table: support and confidence as percentages, lift
/// with the percentage it exceeds 1 by.
#[must_use]
pub fn final_report_row(rule: &AssociationRule) -> String {
    let lift_percent = (rule.lift - 1.0) * 100.0;
    format!(
        " {:<90}\t{:6.2}%\t\t{:3.0}%\t  {:.3} -> {:3.0}%",
        rule.text(),
        rule.support * 100.0,
        rule.confidence * 100.0,
        rule.lift,
        lift_percent
    )
}

/// Header, a blank separator line, then one row per rule in the given order.
#[must_use]
pub fn final_report_lines(rules: &[AssociationRule]) -> Vec<String> {
    let mut lines = Vec::with_capacity(rules.len() + 2);
    lines.push(final_report_header());
    lines.push(String::new());
    lines.extend(rules.iter().map(final_report_row));
    lines
}
